//! src/services/cloud_storage_service.rs
//!
//! Photo storage in a Google Cloud Storage bucket, accessed through OpenDAL.
//! The adapter uploads and deletes objects and hands out time-limited signed
//! read URLs. It holds one service-account credential for the lifetime of the
//! process, loaded once at construction.

use crate::models::animal::PhotoUpload;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use opendal::{Operator, services};
use serde::Deserialize;
use std::{fs, path::PathBuf, time::Duration};
use thiserror::Error;
use tracing::{error, info};

#[cfg(test)]
use mockall::automock;

/// Validity window of signed URLs when the caller does not pick one.
pub const DEFAULT_SIGNED_URL_MINUTES: u32 = 30;

const GCS_DOWNLOAD_BASE: &str = "https://storage.googleapis.com/download/storage/v1";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("credential `{path}` unusable: {reason}")]
    Credential { path: String, reason: String },
    #[error("storage configuration error: {0}")]
    Configuration(String),
    #[error("object `{key}` not found")]
    NotFound { key: String },
    #[error("operation not supported by storage backend: {0}")]
    Unsupported(String),
    #[error("storage operation failed: {0}")]
    Operation(String),
}

impl StorageError {
    fn from_backend(err: opendal::Error, key: &str) -> Self {
        match err.kind() {
            opendal::ErrorKind::NotFound => Self::NotFound {
                key: key.to_string(),
            },
            opendal::ErrorKind::Unsupported => Self::Unsupported(err.to_string()),
            _ => Self::Operation(err.to_string()),
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Object storage as seen by the animals controller.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CloudStorage: Send + Sync {
    /// Store the photo under `file_name_to_save` and return its direct media link.
    async fn upload_file(
        &self,
        file_to_upload: &PhotoUpload,
        file_name_to_save: &str,
    ) -> StorageResult<String>;

    /// Remove the object. A missing object is an error.
    async fn delete_file(&self, file_name_to_delete: &str) -> StorageResult<()>;

    /// Signed GET URL for the object, valid for `timeout_minutes`.
    async fn get_signed_url(
        &self,
        file_name_to_read: &str,
        timeout_minutes: u32,
    ) -> StorageResult<String>;
}

/// How the credential file is handed to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Read the file and pass its JSON content.
    InlineJson,
    /// Pass the path to the backend's own credential loader.
    File,
}

impl CredentialSource {
    /// `Development` reads the key inline, every other environment uses the file loader.
    pub fn for_environment(environment: &str) -> Self {
        if environment == "Development" {
            Self::InlineJson
        } else {
            Self::File
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub bucket: String,
    pub credential_file: PathBuf,
    pub credential_source: CredentialSource,
}

/// Fields of a Google credential file that decide whether it can sign URLs.
#[derive(Deserialize)]
struct CredentialFile {
    #[serde(rename = "type")]
    kind: Option<String>,
    client_email: Option<String>,
    private_key: Option<String>,
}

/// GCS-backed implementation of [`CloudStorage`].
#[derive(Clone)]
pub struct GcsStorageService {
    operator: Operator,
    bucket: String,
}

impl GcsStorageService {
    /// Load the credential and build the backend.
    ///
    /// Fails if the credential file cannot be read or parsed, or if it is not
    /// a service-account key (only those can sign URLs).
    pub fn from_config(config: &StorageConfig) -> StorageResult<Self> {
        Self::create_operator(config)
            .map(|operator| Self::with_operator(operator, config.bucket.clone()))
            .inspect_err(|err| error!("{}", err))
    }

    /// Wrap an existing operator. The bucket is used to build media links.
    pub fn with_operator(operator: Operator, bucket: impl Into<String>) -> Self {
        Self {
            operator,
            bucket: bucket.into(),
        }
    }

    fn create_operator(config: &StorageConfig) -> StorageResult<Operator> {
        let path = config.credential_file.display().to_string();
        let json = fs::read_to_string(&config.credential_file).map_err(|err| {
            StorageError::Credential {
                path: path.clone(),
                reason: err.to_string(),
            }
        })?;
        ensure_signing_capable(&json, &path)?;

        let builder = services::Gcs::default().bucket(&config.bucket);
        let builder = match config.credential_source {
            CredentialSource::InlineJson => {
                builder.credential(&general_purpose::STANDARD.encode(json.as_bytes()))
            }
            CredentialSource::File => builder.credential_path(&path),
        };

        Ok(Operator::new(builder)
            .map_err(|e| StorageError::Configuration(e.to_string()))?
            .finish())
    }

    /// Direct media link of an object, as returned by the JSON API.
    pub fn media_link(&self, key: &str) -> String {
        format!(
            "{}/b/{}/o/{}?alt=media",
            GCS_DOWNLOAD_BASE,
            urlencoding::encode(&self.bucket),
            urlencoding::encode(key)
        )
    }
}

#[async_trait]
impl CloudStorage for GcsStorageService {
    async fn upload_file(
        &self,
        file_to_upload: &PhotoUpload,
        file_name_to_save: &str,
    ) -> StorageResult<String> {
        info!(
            "Uploading: file {} to storage {}",
            file_name_to_save, self.bucket
        );
        self.operator
            .write_with(file_name_to_save, file_to_upload.content.clone())
            .content_type(&file_to_upload.content_type)
            .await
            .map_err(|err| {
                error!(
                    "Error occurred while uploading file {}: {}",
                    file_name_to_save, err
                );
                StorageError::from_backend(err, file_name_to_save)
            })?;
        info!(
            "Uploaded: file {} to storage {}",
            file_name_to_save, self.bucket
        );
        Ok(self.media_link(file_name_to_save))
    }

    async fn delete_file(&self, file_name_to_delete: &str) -> StorageResult<()> {
        let result = async {
            // The backend's delete succeeds on missing objects, stat first.
            self.operator.stat(file_name_to_delete).await?;
            self.operator.delete(file_name_to_delete).await
        }
        .await;

        match result {
            Ok(()) => {
                info!("File {} deleted", file_name_to_delete);
                Ok(())
            }
            Err(err) => {
                error!(
                    "Error occurred while deleting file {}: {}",
                    file_name_to_delete, err
                );
                Err(StorageError::from_backend(err, file_name_to_delete))
            }
        }
    }

    async fn get_signed_url(
        &self,
        file_name_to_read: &str,
        timeout_minutes: u32,
    ) -> StorageResult<String> {
        let ttl = Duration::from_secs(u64::from(timeout_minutes) * 60);
        match self.operator.presign_read(file_name_to_read, ttl).await {
            Ok(presigned) => {
                info!("Signed URL obtained for file {}", file_name_to_read);
                Ok(presigned.uri().to_string())
            }
            Err(err) => {
                error!(
                    "Error occurred while obtaining signed URL for file {}: {}",
                    file_name_to_read, err
                );
                Err(StorageError::from_backend(err, file_name_to_read))
            }
        }
    }
}

/// Reject credentials that cannot sign: anything but a complete service-account key.
fn ensure_signing_capable(json: &str, path: &str) -> StorageResult<()> {
    let credential: CredentialFile =
        serde_json::from_str(json).map_err(|err| StorageError::Credential {
            path: path.to_string(),
            reason: format!("invalid JSON: {}", err),
        })?;

    let is_set = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.is_empty());
    let reason = match credential.kind.as_deref() {
        Some("service_account") if !is_set(&credential.client_email) => {
            "missing `client_email`".to_string()
        }
        Some("service_account") if !is_set(&credential.private_key) => {
            "missing `private_key`".to_string()
        }
        Some("service_account") => return Ok(()),
        Some(other) => format!("credential type `{}` cannot sign URLs", other),
        None => "missing credential `type`".to_string(),
    };

    Err(StorageError::Credential {
        path: path.to_string(),
        reason,
    })
}
