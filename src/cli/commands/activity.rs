use super::operator_session;
use crate::state::SharedState;

pub async fn cmd_activity(state: &SharedState, limit: usize) -> anyhow::Result<()> {
    let session = operator_session(state);
    let recent = state.stats_service.recent(&session, limit).await?;

    if !recent.data_available {
        println!("Activity log is currently unavailable.");
        return Ok(());
    }
    if recent.entries.is_empty() {
        println!("No views recorded yet.");
        return Ok(());
    }

    println!(
        "Recent views ({} of {}):",
        recent.entries.len(),
        recent.total
    );
    println!("{:-<70}", "");
    for entry in recent.entries {
        println!(
            "{} {}  {:<20} {}",
            entry.date, entry.time, entry.username, entry.resource_name
        );
    }
    Ok(())
}
