//! Avatar object storage: a local directory served under `/uploads`, or a
//! hosted bucket.

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::config::{self, DaybookConfig};
use crate::error::{DaybookError, Result};
use crate::model::{Profile, UpdateProfileInput};
use crate::storage::StorageBackend;

/// URL prefix the web server mounts the local upload directory on.
pub const LOCAL_UPLOAD_PREFIX: &str = "/uploads";

/// Keep only the final path component and replace anything outside
/// `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .trim();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

/// `{user_id}/{unix_millis}_{filename}`
pub fn object_key(user_id: &str, filename: &str, millis: i64) -> String {
    format!("{}/{millis}_{}", sanitize_filename(user_id), sanitize_filename(filename))
}

/// Content type of an accepted avatar image, by extension. Anything else,
/// SVG included, is refused since uploads are served from the app's origin.
pub fn content_type_for(filename: &str) -> Option<&'static str> {
    let (_, ext) = filename.rsplit_once('.')?;
    match ext.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

pub struct LocalObjectStore {
    dir: PathBuf,
    public_base: String,
}

impl LocalObjectStore {
    pub fn new(dir: impl Into<PathBuf>, public_base: Option<&str>) -> Self {
        Self {
            dir: dir.into(),
            public_base: public_base.unwrap_or("").trim_end_matches('/').to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn upload(&self, key: &str, bytes: &[u8]) -> Result<String> {
        let path = self.dir.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                DaybookError::Storage(format!("failed to create upload directory: {e}"))
            })?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| DaybookError::Storage(format!("failed to write upload: {e}")))?;
        Ok(format!("{}{LOCAL_UPLOAD_PREFIX}/{key}", self.public_base))
    }
}

pub struct RemoteObjectStore {
    base_url: String,
    api_key: String,
    bucket: String,
    http: reqwest::Client,
}

impl RemoteObjectStore {
    pub fn new(base_url: &str, api_key: &str, bucket: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| DaybookError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            bucket: bucket.to_string(),
            http,
        })
    }

    pub fn public_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{key}",
            self.base_url, self.bucket
        )
    }

    async fn upload(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<String> {
        let url = format!("{}/storage/v1/object/{}/{key}", self.base_url, self.bucket);
        let resp = self
            .http
            .post(url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("content-type", content_type)
            .header("x-upsert", "false")
            .body(bytes.to_vec())
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DaybookError::Storage(format!(
                "upload to bucket {} returned {status}: {body}",
                self.bucket
            )));
        }
        Ok(self.public_url(key))
    }
}

pub enum ObjectStore {
    Local(LocalObjectStore),
    Remote(RemoteObjectStore),
}

impl ObjectStore {
    pub fn from_config(config: &DaybookConfig) -> Result<Self> {
        match config.avatars.backend.as_str() {
            "local" => {
                let dir = match &config.avatars.dir {
                    Some(d) => PathBuf::from(d),
                    None => config::data_dir()?.join("uploads"),
                };
                Ok(Self::Local(LocalObjectStore::new(
                    dir,
                    config.web.public_url.as_deref(),
                )))
            }
            "remote" => {
                let (url, key) = config::resolve_remote(&config.remote)?;
                Ok(Self::Remote(RemoteObjectStore::new(
                    &url,
                    &key,
                    &config.avatars.bucket,
                )?))
            }
            other => Err(DaybookError::Config(format!(
                "unknown avatar backend: {other}"
            ))),
        }
    }

    /// Directory to serve under [`LOCAL_UPLOAD_PREFIX`], for the local backend.
    pub fn local_dir(&self) -> Option<&Path> {
        match self {
            Self::Local(s) => Some(s.dir()),
            Self::Remote(_) => None,
        }
    }

    /// Store `bytes` under `key` and return the public URL.
    pub async fn upload(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<String> {
        match self {
            Self::Local(s) => s.upload(key, bytes).await,
            Self::Remote(s) => s.upload(key, bytes, content_type).await,
        }
    }
}

/// Upload an avatar, then point the profile at it. The profile is untouched
/// when the upload fails.
pub async fn upload_avatar(
    objects: &ObjectStore,
    storage: &impl StorageBackend,
    user_id: &str,
    filename: &str,
    bytes: &[u8],
    max_bytes: usize,
) -> Result<Profile> {
    if bytes.is_empty() {
        return Err(DaybookError::InvalidInput("avatar file is empty".into()));
    }
    if bytes.len() > max_bytes {
        return Err(DaybookError::InvalidInput(format!(
            "avatar exceeds maximum size of {max_bytes} bytes"
        )));
    }

    let key = object_key(user_id, filename, Utc::now().timestamp_millis());
    let content_type = content_type_for(&key).ok_or_else(|| {
        DaybookError::InvalidInput("avatar must be a PNG, JPEG, GIF or WebP image".into())
    })?;
    let url = objects.upload(&key, bytes, content_type).await?;
    tracing::info!(%user_id, %key, "uploaded avatar");

    storage
        .update_profile(
            user_id,
            &UpdateProfileInput {
                full_name: None,
                avatar_url: Some(url),
            },
        )
        .await
}
