use super::operator_session;
use crate::state::SharedState;

pub async fn cmd_stats(state: &SharedState, days: u32) -> anyhow::Result<()> {
    let session = operator_session(state);
    let summary = state.stats_service.summary(&session, days).await?;

    if !summary.data_available {
        println!("Activity log is currently unavailable; no statistics.");
        return Ok(());
    }

    println!(
        "Usage {} .. {} ({} days)",
        summary.from, summary.to, summary.days
    );
    println!("{:-<70}", "");
    println!("Views: {}   Distinct users: {}", summary.total_views, summary.unique_users);

    if !summary.top_users.is_empty() {
        println!("\nMost active users:");
        for ranked in &summary.top_users {
            println!("  {:<24} {}", ranked.key, ranked.count);
        }
    }

    if !summary.top_resources.is_empty() {
        println!("\nMost read digests:");
        for ranked in &summary.top_resources {
            println!("  {:<32} {}", ranked.key, ranked.count);
        }
    }

    println!("\n{:<6}{:>8}{:>9}{:>11}{:>9}", "", "night", "morning", "afternoon", "evening");
    for row in &summary.weekday_bands {
        println!(
            "{:<6}{:>8}{:>9}{:>11}{:>9}",
            row.weekday, row.night, row.morning, row.afternoon, row.evening
        );
    }

    Ok(())
}
