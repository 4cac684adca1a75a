//! Upload of local artifacts to a workspace datastore.

mod blob;
pub mod digest;
mod shared_key;

pub use blob::BlobStorageClient;

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use strum::{Display, EnumString};
use thiserror::Error;

/// Root under which every uploaded artifact lives.
pub const ARTIFACT_ROOT: &str = "az-ml-artifacts";
/// Metadata key set on the marker blob once an upload has completed.
pub const UPLOAD_STATUS_KEY: &str = "upload_status";
pub const UPLOAD_STATUS_COMPLETED: &str = "COMPLETED";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum StorageType {
    AzureBlob,
    AzureDataLakeGen2,
}

impl StorageType {
    fn host_label(&self) -> &'static str {
        match self {
            StorageType::AzureBlob => "blob",
            StorageType::AzureDataLakeGen2 => "dfs",
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub enum StorageCredential {
    AccountKey(String),
    Sas(String),
    None,
}

impl fmt::Debug for StorageCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageCredential::AccountKey(_) => f.write_str("AccountKey(..)"),
            StorageCredential::Sas(_) => f.write_str("Sas(..)"),
            StorageCredential::None => f.write_str("None"),
        }
    }
}

/// Where an upload lands: one container of one storage account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageTarget {
    pub storage_type: StorageType,
    pub account_name: String,
    pub container_name: String,
    pub credential: StorageCredential,
}

impl StorageTarget {
    /// Builds a target from the datastore's storage type name.
    pub fn new(
        storage_type: &str,
        account_name: impl Into<String>,
        container_name: impl Into<String>,
        credential: StorageCredential,
    ) -> Result<Self, UploadError> {
        let storage_type = StorageType::from_str(storage_type)
            .map_err(|_| UploadError::UnsupportedStorage(storage_type.to_string()))?;
        Ok(Self {
            storage_type,
            account_name: account_name.into(),
            container_name: container_name.into(),
            credential,
        })
    }

    pub fn account_url(&self) -> String {
        format!(
            "https://{}.{}.core.windows.net",
            self.account_name,
            self.storage_type.host_label()
        )
    }
}

/// Relative location of an uploaded artifact inside its datastore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetLocator {
    /// `az-ml-artifacts/{content-uuid}/{name}`
    pub path: String,
    pub is_directory: bool,
    /// Set when the marker showed the content was already present.
    pub reused: bool,
}

impl AssetLocator {
    /// Builds the locator for content identified by `content_id`.
    pub fn for_content(content_id: &uuid::Uuid, name: &str, is_directory: bool) -> Self {
        Self {
            path: format!("{ARTIFACT_ROOT}/{content_id}/{name}"),
            is_directory,
            reused: false,
        }
    }

    pub fn marker_path(content_id: &uuid::Uuid) -> String {
        format!("{ARTIFACT_ROOT}/{content_id}")
    }
}

/// Storage collaborator used by asset registration.
pub trait ArtifactUploader: Send + Sync {
    /// Uploads a local file or directory and returns where it landed.
    ///
    /// Uploads are content addressed: identical bytes always map to the same
    /// locator, and a completed prior upload is detected through the marker
    /// blob instead of being sent again.
    fn upload(&self, target: &StorageTarget, source: &Path) -> Result<AssetLocator, UploadError>;
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Unsupported datastore storage type: {0}. Only AzureBlob and AzureDataLakeGen2 are supported")]
    UnsupportedStorage(String),
    #[error("No usable credential for storage account {0}")]
    MissingCredential(String),
    #[error("The account key of storage account {0} is not valid base64")]
    InvalidAccountKey(String),
    #[error("Path has no usable file name: {0}")]
    InvalidSource(String),
    #[error("Storage request to {url} failed with status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error(transparent)]
    Request(#[from] reqwest::Error),
    #[error(transparent)]
    Walk(#[from] walkdir::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_type_selects_host() {
        let blob = StorageTarget::new("AzureBlob", "acct", "data", StorageCredential::None).unwrap();
        assert_eq!(blob.account_url(), "https://acct.blob.core.windows.net");

        let lake =
            StorageTarget::new("AzureDataLakeGen2", "acct", "data", StorageCredential::None)
                .unwrap();
        assert_eq!(lake.account_url(), "https://acct.dfs.core.windows.net");
    }

    #[test]
    fn other_storage_types_are_rejected() {
        let err = StorageTarget::new("AzureFile", "acct", "share", StorageCredential::None)
            .unwrap_err();
        assert!(matches!(err, UploadError::UnsupportedStorage(kind) if kind == "AzureFile"));
    }

    #[test]
    fn locator_is_rooted_under_content_id() {
        let id = uuid::Uuid::nil();
        let locator = AssetLocator::for_content(&id, "src", true);
        assert_eq!(
            locator.path,
            "az-ml-artifacts/00000000-0000-0000-0000-000000000000/src"
        );
        assert_eq!(
            AssetLocator::marker_path(&id),
            "az-ml-artifacts/00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn credential_debug_hides_secret() {
        let credential = StorageCredential::Sas("sv=2020&sig=secret".to_string());
        assert!(!format!("{credential:?}").contains("secret"));
    }
}
