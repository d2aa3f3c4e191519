//! Provision-then-list fixture.
//!
//! [`BucketFixture::setup`] builds a client with the credential profile
//! scrubbed from the environment, starts a private [`MockBackend`] and
//! provisions one bucket. The backend is stopped by [`BucketFixture::teardown`]
//! or, failing that, when the fixture is dropped, so a failed assertion in a
//! test body still deactivates the mock.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::{EnvOverride, EnvSnapshot, MockBackend, PROFILE_VAR, StorageClient, StorageError};

pub const TEST_BUCKET: &str = "Test-Bucket";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FixtureState {
    Unstarted,
    MockActive,
    MockStopped,
}

#[derive(Debug)]
pub struct BucketFixture {
    backend: Arc<MockBackend>,
    client: StorageClient,
    bucket: String,
    state: FixtureState,
}

impl BucketFixture {
    pub fn setup() -> Result<Self, StorageError> {
        Self::setup_with_bucket(TEST_BUCKET)
    }

    pub fn setup_with_bucket(bucket: &str) -> Result<Self, StorageError> {
        Self::setup_on(Arc::new(MockBackend::new()), bucket)
    }

    /// Runs setup against a caller-supplied backend, which must not be active yet.
    pub fn setup_on(backend: Arc<MockBackend>, bucket: &str) -> Result<Self, StorageError> {
        let client = {
            let environ = EnvSnapshot::capture_without(PROFILE_VAR);
            let _env = EnvOverride::apply(environ, true);
            StorageClient::from_env(Arc::clone(&backend))?
        };

        backend.start()?;
        if let Err(err) = client.create_bucket(bucket) {
            // Undo the activation so a failed setup leaves nothing running.
            if let Err(stop_err) = backend.stop() {
                warn!(error = %stop_err, "failed to stop mock backend after setup error");
            }
            return Err(err);
        }
        debug!(bucket, "fixture ready");

        Ok(Self {
            backend,
            client,
            bucket: bucket.to_string(),
            state: FixtureState::MockActive,
        })
    }

    pub fn client(&self) -> &StorageClient {
        &self.client
    }

    pub fn backend(&self) -> &Arc<MockBackend> {
        &self.backend
    }

    pub fn bucket_name(&self) -> &str {
        &self.bucket
    }

    pub fn state(&self) -> FixtureState {
        self.state
    }

    pub fn teardown(mut self) -> Result<(), StorageError> {
        self.stop()
    }

    fn stop(&mut self) -> Result<(), StorageError> {
        if self.state != FixtureState::MockActive {
            return Ok(());
        }
        self.state = FixtureState::MockStopped;
        self.backend.stop()
    }
}

impl Drop for BucketFixture {
    fn drop(&mut self) {
        if self.state == FixtureState::MockActive {
            debug!(bucket = %self.bucket, "stopping mock backend on drop");
            if let Err(err) = self.stop() {
                warn!(error = %err, "failed to stop mock backend");
            }
        }
    }
}
