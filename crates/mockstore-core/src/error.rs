use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("invalid bucket name `{name}`: {reason}")]
    InvalidBucketName { name: String, reason: String },
    #[error("bucket already exists: {0}")]
    BucketAlreadyExists(String),
    #[error("bucket not found: {0}")]
    BucketNotFound(String),
    #[error("the config profile ({0}) could not be found")]
    ProfileNotFound(String),
    #[error("mock backend is already active")]
    AlreadyActive,
    #[error("mock backend is not active")]
    NotActive,
    #[error("unknown naming policy: {0}")]
    InvalidPolicy(String),
}

impl StorageError {
    pub(crate) fn invalid_name(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidBucketName {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
