//! Google Drive v3 backend.
//!
//! The container is a Drive folder looked up (or created) by name on first
//! use. Authentication is a bearer access token supplied by the deployment;
//! minting tokens from a service account is left to the environment.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

use super::{BlobError, BlobInfo, BlobRepository, NameFilter};

const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
#[derive(Debug, Clone)]
pub struct DriveConfig {
    pub api_base: String,
    pub access_token: String,
    pub folder_name: String,
    pub timeout_seconds: u64,
}

pub struct DriveBlobRepository {
    client: Client,
    config: DriveConfig,
    folder_id: OnceCell<String>,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct CreatedFile {
    id: String,
}

impl DriveBlobRepository {
    pub fn new(config: DriveConfig) -> Result<Self, BlobError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("rassegna/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BlobError::Unavailable(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            folder_id: OnceCell::new(),
        })
    }

    fn url(&self, path: &str) -> Result<Url, BlobError> {
        let base = self.config.api_base.trim_end_matches('/');
        Url::parse(&format!("{base}{path}"))
            .map_err(|e| BlobError::Rejected(format!("Invalid Drive API URL: {e}")))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.config.access_token)
    }

    async fn send(&self, builder: RequestBuilder, what: &str) -> Result<Response, BlobError> {
        let response = builder
            .send()
            .await
            .map_err(|e| BlobError::Unavailable(format!("{what}: {e}")))?;
        check_status(response, what).await
    }

    async fn folder_id(&self) -> Result<&str, BlobError> {
        self.folder_id
            .get_or_try_init(|| self.find_or_create_folder())
            .await
            .map(String::as_str)
    }

    async fn find_or_create_folder(&self) -> Result<String, BlobError> {
        let query = format!(
            "name = '{}' and mimeType = '{FOLDER_MIME}' and trashed = false",
            escape_query(&self.config.folder_name)
        );
        let existing = self.query_files(&query).await?;
        if let Some(folder) = existing.into_iter().next() {
            debug!(folder = %self.config.folder_name, id = %folder.id, "Found Drive folder");
            return Ok(folder.id);
        }

        let mut url = self.url("/drive/v3/files")?;
        url.query_pairs_mut().append_pair("fields", "id");
        let body = serde_json::json!({
            "name": self.config.folder_name,
            "mimeType": FOLDER_MIME,
        });
        let response = self
            .send(self.request(Method::POST, url).json(&body), "create folder")
            .await?;
        let created: CreatedFile = decode(response, "create folder").await?;
        info!(folder = %self.config.folder_name, id = %created.id, "Created Drive folder");
        Ok(created.id)
    }

    async fn query_files(&self, query: &str) -> Result<Vec<BlobInfo>, BlobError> {
        let mut blobs = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = self.url("/drive/v3/files")?;
            {
                let mut pairs = url.query_pairs_mut();
                pairs
                    .append_pair("q", query)
                    .append_pair("fields", "nextPageToken, files(id, name)")
                    .append_pair("pageSize", "1000")
                    .append_pair("orderBy", "name");
                if let Some(token) = &page_token {
                    pairs.append_pair("pageToken", token);
                }
            }

            let response = self
                .send(self.request(Method::GET, url), "list files")
                .await?;
            let page: FileList = decode(response, "list files").await?;
            blobs.extend(page.files.into_iter().map(|f| BlobInfo {
                id: f.id,
                name: f.name,
            }));

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(blobs)
    }
}

#[async_trait]
impl BlobRepository for DriveBlobRepository {
    fn container(&self) -> &str {
        &self.config.folder_name
    }

    async fn list(&self, filter: Option<&NameFilter>) -> Result<Vec<BlobInfo>, BlobError> {
        let folder_id = self.folder_id().await?;
        let query = list_query(folder_id, filter);
        self.query_files(&query).await
    }

    async fn get(&self, id: &str) -> Result<Vec<u8>, BlobError> {
        let mut url = self.url(&format!("/drive/v3/files/{id}"))?;
        url.query_pairs_mut().append_pair("alt", "media");
        let response = self
            .send(self.request(Method::GET, url), "download file")
            .await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| BlobError::Unavailable(format!("download file: {e}")))?;
        Ok(bytes.to_vec())
    }

    async fn put(
        &self,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, BlobError> {
        let folder_id = self.folder_id().await?.to_string();
        let metadata = serde_json::json!({
            "name": name,
            "parents": [folder_id],
        });

        let mut url = self.url("/upload/drive/v3/files")?;
        url.query_pairs_mut()
            .append_pair("uploadType", "multipart")
            .append_pair("fields", "id");

        let boundary = multipart_boundary();
        let body = multipart_related(&boundary, &metadata.to_string(), &bytes, content_type);
        let builder = self
            .request(Method::POST, url)
            .header(
                "Content-Type",
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body);

        let response = self.send(builder, "upload file").await?;
        let created: CreatedFile = decode(response, "upload file").await?;
        debug!(blob = name, id = %created.id, "Uploaded file to Drive");
        Ok(created.id)
    }

    async fn delete(&self, id: &str) -> Result<(), BlobError> {
        let url = self.url(&format!("/drive/v3/files/{id}"))?;
        self.send(self.request(Method::DELETE, url), "delete file")
            .await?;
        Ok(())
    }
}

async fn check_status(response: Response, what: &str) -> Result<Response, BlobError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = format!("{what}: status={status}, body={body}");
    Err(match status {
        StatusCode::NOT_FOUND => BlobError::NotFound(message),
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => {
            BlobError::Unavailable(message)
        }
        s if s.is_server_error() => BlobError::Unavailable(message),
        _ => BlobError::Rejected(message),
    })
}

async fn decode<T: serde::de::DeserializeOwned>(
    response: Response,
    what: &str,
) -> Result<T, BlobError> {
    response
        .json::<T>()
        .await
        .map_err(|e| BlobError::Unavailable(format!("{what}: unreadable response: {e}")))
}

/// Escapes a literal for use inside single quotes in a Drive `q` expression.
fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn list_query(folder_id: &str, filter: Option<&NameFilter>) -> String {
    let mut query = format!(
        "'{}' in parents and trashed = false",
        escape_query(folder_id)
    );
    match filter {
        Some(NameFilter::Exact(name)) => {
            query.push_str(&format!(" and name = '{}'", escape_query(name)));
        }
        Some(NameFilter::Contains(fragment)) => {
            query.push_str(&format!(" and name contains '{}'", escape_query(fragment)));
        }
        None => {}
    }
    query
}

/// Fresh per upload so file contents cannot collide with it.
fn multipart_boundary() -> String {
    format!("rassegna-{}", Uuid::new_v4().simple())
}

fn multipart_related(
    boundary: &str,
    metadata_json: &str,
    bytes: &[u8],
    content_type: &str,
) -> Vec<u8> {
    let mut body = Vec::with_capacity(bytes.len() + metadata_json.len() + 256);
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata_json.as_bytes());
    body.extend_from_slice(format!("\r\n--{boundary}\r\n").as_bytes());
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_escapes_quotes() {
        assert_eq!(escape_query("l'archivio"), "l\\'archivio");
        assert_eq!(escape_query(r"a\b"), r"a\\b");
    }

    #[test]
    fn list_query_includes_filter() {
        assert_eq!(
            list_query("F1", None),
            "'F1' in parents and trashed = false"
        );
        assert_eq!(
            list_query("F1", Some(&NameFilter::Exact("users.csv".to_string()))),
            "'F1' in parents and trashed = false and name = 'users.csv'"
        );
        assert_eq!(
            list_query("F1", Some(&NameFilter::Contains("rassegna_".to_string()))),
            "'F1' in parents and trashed = false and name contains 'rassegna_'"
        );
    }

    #[test]
    fn multipart_body_layout() {
        let body = multipart_related(
            "b0undary",
            "{\"name\":\"a.pdf\"}",
            b"%PDF-1.4",
            "application/pdf",
        );
        let text = String::from_utf8(body).unwrap();
        assert!(text.starts_with("--b0undary\r\n"));
        assert!(text.contains("Content-Type: application/pdf\r\n\r\n%PDF-1.4"));
        assert!(text.ends_with("--b0undary--\r\n"));
    }

    #[test]
    fn boundary_differs_per_upload() {
        let first = multipart_boundary();
        let second = multipart_boundary();
        assert_ne!(first, second);
        assert!(first.starts_with("rassegna-"));

        // A file quoting an earlier boundary does not break a later upload.
        let payload = format!("%PDF-1.4\n--{first}\n");
        let body = multipart_related(&second, "{}", payload.as_bytes(), "application/pdf");
        let text = String::from_utf8(body).unwrap();
        assert_eq!(text.matches(&format!("--{second}")).count(), 3);
    }
}
