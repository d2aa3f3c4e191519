use std::{env, sync::Arc};

use tracing::debug;

use crate::{Bucket, MockBackend, StorageError};

pub const PROFILE_VAR: &str = "AWS_PROFILE";
pub const DEFAULT_REGION: &str = "us-east-1";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    pub region: String,
    pub profile: Option<String>,
}

impl ClientConfig {
    /// Reads `AWS_REGION` (falling back to `AWS_DEFAULT_REGION`) and
    /// `AWS_PROFILE`. Empty values count as unset.
    pub fn from_env() -> Self {
        let non_empty = |key: &str| env::var(key).ok().filter(|value| !value.is_empty());
        let region = non_empty("AWS_REGION")
            .or_else(|| non_empty("AWS_DEFAULT_REGION"))
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        Self {
            region,
            profile: non_empty(PROFILE_VAR),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            profile: None,
        }
    }
}

/// Storage client bound to one [`MockBackend`].
#[derive(Clone, Debug)]
pub struct StorageClient {
    backend: Arc<MockBackend>,
    region: String,
}

impl StorageClient {
    /// The mock backend holds no credential profiles, so naming one is an error.
    pub fn new(backend: Arc<MockBackend>, config: ClientConfig) -> Result<Self, StorageError> {
        if let Some(profile) = config.profile {
            return Err(StorageError::ProfileNotFound(profile));
        }
        debug!(region = %config.region, "storage client constructed");
        Ok(Self {
            backend,
            region: config.region,
        })
    }

    pub fn from_env(backend: Arc<MockBackend>) -> Result<Self, StorageError> {
        Self::new(backend, ClientConfig::from_env())
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn backend(&self) -> &Arc<MockBackend> {
        &self.backend
    }

    pub fn create_bucket(&self, name: &str) -> Result<(), StorageError> {
        self.backend.create_bucket(name, &self.region)
    }

    pub fn list_buckets(&self) -> Result<Vec<Bucket>, StorageError> {
        self.backend.list_buckets()
    }

    pub fn bucket_names(&self) -> Result<Vec<String>, StorageError> {
        Ok(self
            .list_buckets()?
            .into_iter()
            .map(|bucket| bucket.name)
            .collect())
    }

    pub fn head_bucket(&self, name: &str) -> Result<Bucket, StorageError> {
        self.backend.head_bucket(name)
    }

    pub fn delete_bucket(&self, name: &str) -> Result<(), StorageError> {
        self.backend.delete_bucket(name)
    }
}
