use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use super::table::{Schema, TableError};
use super::{CSV_CONTENT_TYPE, StoreError};
use crate::blob::{BlobError, BlobRepository};
use crate::models::ViewEntry;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";

static ACTIVITY_SCHEMA: Schema = Schema {
    columns: &["date", "time", "username", "resource_name"],
    legacy: &[],
};

/// Result of recording one view.
#[derive(Debug, Clone)]
pub struct AppendOutcome {
    pub entry: ViewEntry,

    /// Set when the existing table could not be read and was started over.
    pub recovered: Option<String>,

    /// The same entry was already present; the table is unchanged in content.
    pub duplicate: bool,
}

/// View events kept as one table blob, rewritten whole on every append.
pub struct ActivityLogStore {
    repo: Arc<dyn BlobRepository>,
    blob_name: String,
}

impl ActivityLogStore {
    pub fn new(repo: Arc<dyn BlobRepository>, blob_name: impl Into<String>) -> Self {
        Self {
            repo,
            blob_name: blob_name.into(),
        }
    }

    /// Every entry in stored order. A missing blob reads as an empty log.
    pub async fn read_all(&self) -> Result<Vec<ViewEntry>, StoreError> {
        let Some(bytes) = self.fetch().await? else {
            return Ok(Vec::new());
        };
        decode_entries(&bytes).map_err(|e| StoreError::Corrupt {
            blob: self.blob_name.clone(),
            reason: e.to_string(),
        })
    }

    /// Records that `username` opened `resource_name` at `when`.
    ///
    /// An unreadable table is replaced by a fresh one holding just this
    /// entry; the outcome reports that so callers can surface it. Failing to
    /// reach the repository is still an error, so a transient outage never
    /// truncates the log.
    pub async fn append(
        &self,
        username: &str,
        resource_name: &str,
        when: NaiveDateTime,
    ) -> Result<AppendOutcome, StoreError> {
        let entry = ViewEntry::new(username, resource_name, when);

        let mut recovered = None;
        let mut entries = match self.fetch().await? {
            None => Vec::new(),
            Some(bytes) => match decode_entries(&bytes) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(blob = %self.blob_name, error = %e, "Activity log unreadable, starting a new one");
                    recovered = Some(e.to_string());
                    Vec::new()
                }
            },
        };

        let before = dedup(&mut entries);
        entries.push(entry.clone());
        let after = dedup(&mut entries);
        let duplicate = after == before;

        self.repo
            .replace(&self.blob_name, encode_entries(&entries), CSV_CONTENT_TYPE)
            .await?;
        debug!(
            blob = %self.blob_name,
            username,
            resource = resource_name,
            entries = entries.len(),
            duplicate,
            "View recorded"
        );

        Ok(AppendOutcome {
            entry,
            recovered,
            duplicate,
        })
    }

    async fn fetch(&self) -> Result<Option<Vec<u8>>, StoreError> {
        let Some(blob) = self.repo.find_by_name(&self.blob_name).await? else {
            return Ok(None);
        };
        match self.repo.get(&blob.id).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(BlobError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Drops repeated `(date, time, username, resource_name)` tuples, keeping the
/// first occurrence in place. Returns the resulting length.
fn dedup(entries: &mut Vec<ViewEntry>) -> usize {
    let mut seen = HashSet::with_capacity(entries.len());
    entries.retain(|entry| seen.insert(entry.clone()));
    entries.len()
}

fn encode_entries(entries: &[ViewEntry]) -> Vec<u8> {
    ACTIVITY_SCHEMA.encode(entries.iter().map(|entry| {
        vec![
            entry.date.format(DATE_FORMAT).to_string(),
            entry.time.format(TIME_FORMAT).to_string(),
            entry.username.clone(),
            entry.resource_name.clone(),
        ]
    }))
}

fn decode_entries(bytes: &[u8]) -> Result<Vec<ViewEntry>, TableError> {
    let decoded = ACTIVITY_SCHEMA.decode(bytes)?;
    decoded
        .rows
        .into_iter()
        .map(|(line, row)| {
            let [date, time, username, resource_name]: [String; 4] =
                row.try_into().map_err(|row: Vec<String>| TableError::FieldCount {
                    line,
                    expected: 4,
                    found: row.len(),
                })?;

            let date = NaiveDate::parse_from_str(date.trim(), DATE_FORMAT).map_err(|_| {
                TableError::InvalidValue {
                    line,
                    reason: format!("unreadable date '{date}'"),
                }
            })?;
            let time = NaiveTime::parse_from_str(time.trim(), TIME_FORMAT).map_err(|_| {
                TableError::InvalidValue {
                    line,
                    reason: format!("unreadable time '{time}'"),
                }
            })?;

            Ok(ViewEntry {
                date,
                time,
                username,
                resource_name,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::MemoryBlobRepository;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    fn store() -> (Arc<MemoryBlobRepository>, ActivityLogStore) {
        let repo = Arc::new(MemoryBlobRepository::new("test"));
        let store = ActivityLogStore::new(repo.clone(), "views.csv");
        (repo, store)
    }

    #[test]
    fn table_layout() {
        let entry = ViewEntry::new("bob", "rassegna_2025.02.03.pdf", at(2025, 2, 3, 9, 5, 7));
        let text = String::from_utf8(encode_entries(&[entry.clone()])).unwrap();
        assert_eq!(
            text,
            "date,time,username,resource_name\n2025-02-03,09:05:07,bob,rassegna_2025.02.03.pdf\n"
        );
        assert_eq!(decode_entries(text.as_bytes()).unwrap(), vec![entry]);
    }

    #[test]
    fn rejects_bad_time() {
        let bad = b"date,time,username,resource_name\n2025-02-03,9am,bob,x.pdf\n";
        assert!(matches!(
            decode_entries(bad),
            Err(TableError::InvalidValue { line: 2, .. })
        ));
    }

    #[tokio::test]
    async fn missing_log_reads_empty() {
        let (_, store) = store();
        assert!(store.read_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn append_suppresses_exact_duplicates() {
        let (_, store) = store();
        let when = at(2025, 2, 3, 9, 5, 7);

        let first = store.append("bob", "a.pdf", when).await.unwrap();
        assert!(!first.duplicate);
        let again = store.append("bob", "a.pdf", when).await.unwrap();
        assert!(again.duplicate);
        store
            .append("bob", "a.pdf", at(2025, 2, 3, 9, 5, 8))
            .await
            .unwrap();

        let entries = store.read_all().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].time, NaiveTime::from_hms_opt(9, 5, 7).unwrap());
    }

    #[tokio::test]
    async fn corrupt_log_is_restarted() {
        let (repo, store) = store();
        repo.put("views.csv", b"garbage without header shape\n".to_vec(), "text/csv")
            .await
            .unwrap();

        assert!(matches!(
            store.read_all().await,
            Err(StoreError::Corrupt { .. })
        ));

        let outcome = store
            .append("bob", "a.pdf", at(2025, 2, 3, 10, 0, 0))
            .await
            .unwrap();
        assert!(outcome.recovered.is_some());
        assert_eq!(store.read_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unreachable_repository_keeps_log() {
        let (repo, store) = store();
        store
            .append("bob", "a.pdf", at(2025, 2, 3, 10, 0, 0))
            .await
            .unwrap();

        repo.set_online(false);
        let err = store
            .append("bob", "b.pdf", at(2025, 2, 3, 11, 0, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));

        repo.set_online(true);
        assert_eq!(store.read_all().await.unwrap().len(), 1);
    }
}
