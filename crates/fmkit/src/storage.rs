//! Optional upload of output files to a bucket in object storage.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::path::{Component, Path};
use thiserror::Error;
use tracing::debug;

use crate::config::to_env_var;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upload rejected with status {status}: {body}")]
    Status { status: StatusCode, body: String },
}

/// Object storage settings as read from the environment; every field is optional
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default)]
    pub connection_id: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            bucket: None,
            prefix: default_prefix(),
            connection_id: None,
            endpoint: None,
        }
    }
}

fn default_prefix() -> String {
    "chat-responses".to_string()
}

/// Where uploads go once storage is fully configured
#[derive(Debug, Clone, PartialEq)]
pub struct StorageTarget {
    pub bucket: String,
    pub prefix: String,
    pub connection_id: String,
    pub endpoint: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StorageStatus {
    /// Nothing configured; uploads are silently skipped
    Absent,
    /// Partly configured; uploads are skipped with a warning naming what is missing
    Incomplete { missing: Vec<String> },
    Complete(StorageTarget),
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl StorageSettings {
    pub fn status(&self) -> StorageStatus {
        let bucket = present(&self.bucket);
        let connection_id = present(&self.connection_id);
        let endpoint = present(&self.endpoint);

        if bucket.is_none() && connection_id.is_none() {
            return StorageStatus::Absent;
        }

        match (bucket, connection_id, endpoint) {
            (Some(bucket), Some(connection_id), Some(endpoint)) => {
                StorageStatus::Complete(StorageTarget {
                    bucket: bucket.to_string(),
                    prefix: self.prefix.clone(),
                    connection_id: connection_id.to_string(),
                    endpoint: endpoint.to_string(),
                })
            }
            _ => {
                let missing = [
                    ("storage.bucket", bucket),
                    ("storage.connection_id", connection_id),
                    ("storage.endpoint", endpoint),
                ]
                .into_iter()
                .filter(|(_, value)| value.is_none())
                .map(|(field, _)| to_env_var(field))
                .collect();
                StorageStatus::Incomplete { missing }
            }
        }
    }
}

/// Object key for a file: `<prefix>/<relative path>` with `/` separators
pub fn object_key(prefix: &str, relative_path: &Path) -> String {
    let path = relative_path
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/");
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        path
    } else {
        format!("{}/{}", prefix, path)
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write `body` under `key` in the configured bucket
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StorageError>;
}

/// Object store reached with plain HTTP `PUT {endpoint}/{bucket}/{key}`
pub struct HttpObjectStore {
    client: Client,
    target: StorageTarget,
    api_key: String,
}

impl HttpObjectStore {
    pub fn new(target: StorageTarget, api_key: impl Into<String>) -> Result<Self, StorageError> {
        Ok(Self {
            client: Client::builder().build()?,
            target,
            api_key: api_key.into(),
        })
    }

    pub fn target(&self) -> &StorageTarget {
        &self.target
    }

    /// Object key for `path`. A relative path is used as it stands; an absolute
    /// one is taken relative to `base`, or by file name when outside it.
    pub fn key_for(&self, path: &Path, base: &Path) -> String {
        let relative = if path.is_relative() {
            path
        } else {
            match path.strip_prefix(base) {
                Ok(relative) => relative,
                Err(_) => path.file_name().map(Path::new).unwrap_or(path),
            }
        };
        object_key(&self.target.prefix, relative)
    }

    /// Upload a local file, keyed as [`HttpObjectStore::key_for`] describes
    pub async fn upload_file(&self, path: &Path, base: &Path) -> Result<String, StorageError> {
        let body = tokio::fs::read(path).await.map_err(|source| StorageError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let key = self.key_for(path, base);
        self.put(&key, body).await?;
        Ok(key)
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StorageError> {
        let url = format!(
            "{}/{}/{}",
            self.target.endpoint.trim_end_matches('/'),
            self.target.bucket,
            key
        );
        debug!(%url, bytes = body.len(), "uploading object");

        let response = self
            .client
            .put(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("X-Connection-Id", &self.target.connection_id)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(StorageError::Status { status, body })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(bucket: Option<&str>, connection: Option<&str>, endpoint: Option<&str>) -> StorageSettings {
        StorageSettings {
            bucket: bucket.map(str::to_string),
            prefix: "chat-responses".to_string(),
            connection_id: connection.map(str::to_string),
            endpoint: endpoint.map(str::to_string),
        }
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(settings(None, None, None).status(), StorageStatus::Absent);
        assert_eq!(
            settings(None, None, Some("https://s3.example.com")).status(),
            StorageStatus::Absent
        );
        assert_eq!(
            settings(Some("bucket"), None, Some("https://s3.example.com")).status(),
            StorageStatus::Incomplete {
                missing: vec!["FMKIT_STORAGE__CONNECTION_ID".to_string()]
            }
        );
        assert_eq!(
            settings(Some("bucket"), Some(" "), None).status(),
            StorageStatus::Incomplete {
                missing: vec![
                    "FMKIT_STORAGE__CONNECTION_ID".to_string(),
                    "FMKIT_STORAGE__ENDPOINT".to_string()
                ]
            }
        );
        assert!(matches!(
            settings(Some("bucket"), Some("conn"), Some("https://s3.example.com")).status(),
            StorageStatus::Complete(target) if target.bucket == "bucket"
        ));
    }

    #[test]
    fn test_object_key() {
        let relative = PathBuf::from("data").join("raw").join("response.txt");
        assert_eq!(
            object_key("chat-responses", &relative),
            "chat-responses/data/raw/response.txt"
        );
        assert_eq!(object_key("/nested/", Path::new("a.txt")), "nested/a.txt");
        assert_eq!(object_key("", Path::new("./a.txt")), "a.txt");
    }

    #[tokio::test]
    async fn test_upload_file() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/bucket/chat-responses/data/raw/out.txt"))
            .and(header("Authorization", "Bearer secret"))
            .and(header("X-Connection-Id", "conn-1"))
            .and(body_string("Prompt: hi"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir()?;
        let file = dir.path().join("data").join("raw").join("out.txt");
        std::fs::create_dir_all(file.parent().unwrap())?;
        std::fs::write(&file, "Prompt: hi")?;

        let store = HttpObjectStore::new(
            StorageTarget {
                bucket: "bucket".to_string(),
                prefix: "chat-responses".to_string(),
                connection_id: "conn-1".to_string(),
                endpoint: server.uri(),
            },
            "secret",
        )?;
        let key = store.upload_file(&file, dir.path()).await?;
        assert_eq!(key, "chat-responses/data/raw/out.txt");
        Ok(())
    }

    #[test]
    fn test_key_for_paths_under_working_dir() -> anyhow::Result<()> {
        let store = HttpObjectStore::new(
            StorageTarget {
                bucket: "bucket".to_string(),
                prefix: "chat-responses".to_string(),
                connection_id: "conn-1".to_string(),
                endpoint: "https://s3.example.com".to_string(),
            },
            "secret",
        )?;
        let cwd = std::env::current_dir()?;
        let name = "response_20240309_140507_What_is_AI.txt";
        let expected = format!("chat-responses/data/raw/{}", name);

        // the default output dir is relative to the working directory
        let relative = Path::new("data/raw").join(name);
        assert_eq!(store.key_for(&relative, &cwd), expected);
        assert_eq!(store.key_for(&Path::new("./data/raw").join(name), &cwd), expected);
        assert_eq!(store.key_for(&cwd.join(&relative), &cwd), expected);

        let elsewhere = tempfile::tempdir()?;
        assert_eq!(
            store.key_for(&elsewhere.path().join(name), &cwd),
            format!("chat-responses/{}", name)
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_put_rejected() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(403).set_body_string("denied"))
            .mount(&server)
            .await;

        let store = HttpObjectStore::new(
            StorageTarget {
                bucket: "bucket".to_string(),
                prefix: String::new(),
                connection_id: "conn-1".to_string(),
                endpoint: server.uri(),
            },
            "secret",
        )?;
        let result = store.put("a.txt", b"x".to_vec()).await;
        assert!(matches!(
            result,
            Err(StorageError::Status { status, .. }) if status == StatusCode::FORBIDDEN
        ));
        Ok(())
    }
}
