use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::{Bucket, NamingPolicy, StorageError, validate_bucket_name};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendState {
    Unstarted,
    Active,
    Stopped,
}

/// In-memory stand-in for a storage service.
///
/// The handle is owned by whoever creates it and handed to clients
/// explicitly, so two handles never observe each other's buckets. Buckets
/// only live while the handle is active; `stop` drops them.
#[derive(Debug)]
pub struct MockBackend {
    policy: NamingPolicy,
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    state: BackendState,
    buckets: Vec<Bucket>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::with_policy(NamingPolicy::default())
    }

    pub fn with_policy(policy: NamingPolicy) -> Self {
        Self {
            policy,
            inner: Mutex::new(Inner {
                state: BackendState::Unstarted,
                buckets: Vec::new(),
            }),
        }
    }

    pub fn policy(&self) -> NamingPolicy {
        self.policy
    }

    pub fn state(&self) -> BackendState {
        self.lock().state
    }

    pub fn is_active(&self) -> bool {
        self.state() == BackendState::Active
    }

    pub fn start(&self) -> Result<(), StorageError> {
        let mut inner = self.lock();
        if inner.state == BackendState::Active {
            return Err(StorageError::AlreadyActive);
        }
        inner.state = BackendState::Active;
        inner.buckets.clear();
        debug!(policy = %self.policy, "mock backend started");
        Ok(())
    }

    pub fn stop(&self) -> Result<(), StorageError> {
        let mut inner = self.lock();
        if inner.state != BackendState::Active {
            return Err(StorageError::NotActive);
        }
        inner.state = BackendState::Stopped;
        let dropped = inner.buckets.len();
        inner.buckets.clear();
        debug!(dropped, "mock backend stopped");
        Ok(())
    }

    pub fn create_bucket(&self, name: &str, region: &str) -> Result<(), StorageError> {
        validate_bucket_name(name, self.policy)?;
        let mut inner = self.active()?;
        if inner.buckets.iter().any(|bucket| bucket.name == name) {
            return Err(StorageError::BucketAlreadyExists(name.to_string()));
        }
        inner.buckets.push(Bucket {
            name: name.to_string(),
            region: region.to_string(),
        });
        debug!(bucket = name, region, "bucket created");
        Ok(())
    }

    /// Buckets in creation order.
    pub fn list_buckets(&self) -> Result<Vec<Bucket>, StorageError> {
        let inner = self.active()?;
        debug!(count = inner.buckets.len(), "buckets listed");
        Ok(inner.buckets.clone())
    }

    pub fn head_bucket(&self, name: &str) -> Result<Bucket, StorageError> {
        let inner = self.active()?;
        inner
            .buckets
            .iter()
            .find(|bucket| bucket.name == name)
            .cloned()
            .ok_or_else(|| StorageError::BucketNotFound(name.to_string()))
    }

    pub fn delete_bucket(&self, name: &str) -> Result<(), StorageError> {
        let mut inner = self.active()?;
        let Some(pos) = inner.buckets.iter().position(|bucket| bucket.name == name) else {
            return Err(StorageError::BucketNotFound(name.to_string()));
        };
        inner.buckets.remove(pos);
        debug!(bucket = name, "bucket deleted");
        Ok(())
    }

    fn active(&self) -> Result<MutexGuard<'_, Inner>, StorageError> {
        let inner = self.lock();
        if inner.state != BackendState::Active {
            return Err(StorageError::NotActive);
        }
        Ok(inner)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Every mutation leaves `Inner` consistent, so a poisoned lock is still usable.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}
