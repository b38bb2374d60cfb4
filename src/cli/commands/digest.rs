use anyhow::Context;
use std::path::Path;
use tracing::warn;

use super::operator_session;
use crate::models::digest::{PDF_CONTENT_TYPE, parse_user_date};
use crate::state::SharedState;

pub async fn cmd_digest_list(state: &SharedState) -> anyhow::Result<()> {
    let digests = state.digest_service.list().await?;

    if digests.is_empty() {
        println!("No digests in the archive.");
        return Ok(());
    }

    println!("Digests ({}):", digests.len());
    println!("{:-<70}", "");
    for digest in digests {
        println!("• {}  {}", digest.date.format("%Y-%m-%d"), digest.name);
    }
    Ok(())
}

pub async fn cmd_digest_upload(state: &SharedState, date: &str, file: &Path) -> anyhow::Result<()> {
    let date = parse_user_date(date).map_err(anyhow::Error::msg)?;

    let guessed = mime_guess::from_path(file).first_or_octet_stream();
    if guessed.essence_str() != PDF_CONTENT_TYPE {
        warn!(file = %file.display(), mime = %guessed, "File does not look like a PDF by extension");
    }

    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let session = operator_session(state);
    let digest = state.digest_service.upload(&session, date, bytes).await?;
    println!("✓ Uploaded {} as {}", file.display(), digest.name);
    Ok(())
}

pub async fn cmd_digest_delete(state: &SharedState, date: &str) -> anyhow::Result<()> {
    let date = parse_user_date(date).map_err(anyhow::Error::msg)?;
    let session = operator_session(state);
    state.digest_service.delete(&session, date).await?;
    println!("✓ Deleted digest for {date}");
    Ok(())
}

pub async fn cmd_digest_rename(state: &SharedState, from: &str, to: &str) -> anyhow::Result<()> {
    let from = parse_user_date(from).map_err(anyhow::Error::msg)?;
    let to = parse_user_date(to).map_err(anyhow::Error::msg)?;
    let session = operator_session(state);
    let digest = state.digest_service.rename(&session, from, to).await?;
    println!("✓ Digest for {from} is now {}", digest.name);
    Ok(())
}
