use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use super::{BlobError, BlobInfo, BlobRepository, NameFilter};

const TEMP_PREFIX: &str = ".tmp-";

/// Directory-backed repository: `<root>/<container>/<name>`.
///
/// The file name doubles as the blob id, so the directory can be browsed or
/// backed up with ordinary tools.
#[derive(Clone)]
pub struct LocalBlobRepository {
    container: String,
    dir: PathBuf,
}

impl LocalBlobRepository {
    pub fn new(root: impl AsRef<Path>, container: impl Into<String>) -> Self {
        let container = container.into();
        let dir = root.as_ref().join(&container);
        Self { container, dir }
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, BlobError> {
        let valid = !name.is_empty()
            && !name.starts_with('.')
            && !name.contains(['/', '\\'])
            && name != "..";
        if !valid {
            return Err(BlobError::Rejected(format!("invalid blob name '{name}'")));
        }
        Ok(self.dir.join(name))
    }
}

fn io_error(context: &str, err: &std::io::Error) -> BlobError {
    match err.kind() {
        ErrorKind::NotFound => BlobError::NotFound(context.to_string()),
        ErrorKind::PermissionDenied => BlobError::Rejected(format!("{context}: {err}")),
        _ => BlobError::Unavailable(format!("{context}: {err}")),
    }
}

#[async_trait]
impl BlobRepository for LocalBlobRepository {
    fn container(&self) -> &str {
        &self.container
    }

    async fn list(&self, filter: Option<&NameFilter>) -> Result<Vec<BlobInfo>, BlobError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&self.dir.display().to_string(), &e)),
        };

        let mut blobs = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error(&self.dir.display().to_string(), &e))?
        {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            let is_file = entry.file_type().await.is_ok_and(|t| t.is_file());
            if is_file && filter.is_none_or(|f| f.matches(&name)) {
                blobs.push(BlobInfo {
                    id: name.clone(),
                    name,
                });
            }
        }
        blobs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(blobs)
    }

    async fn get(&self, id: &str) -> Result<Vec<u8>, BlobError> {
        let path = self.path_for(id)?;
        fs::read(&path).await.map_err(|e| io_error(id, &e))
    }

    async fn put(
        &self,
        name: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, BlobError> {
        let path = self.path_for(name)?;
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_error(&self.dir.display().to_string(), &e))?;

        // Write aside and rename so readers never observe a half-written table.
        let temp = self.dir.join(format!("{TEMP_PREFIX}{}", Uuid::new_v4()));
        fs::write(&temp, &bytes)
            .await
            .map_err(|e| io_error(name, &e))?;
        if let Err(e) = fs::rename(&temp, &path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(io_error(name, &e));
        }

        debug!(blob = name, bytes = bytes.len(), "Stored blob");
        Ok(name.to_string())
    }

    async fn delete(&self, id: &str) -> Result<(), BlobError> {
        let path = self.path_for(id)?;
        fs::remove_file(&path).await.map_err(|e| io_error(id, &e))
    }
}
