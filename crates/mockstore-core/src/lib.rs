mod backend;
mod bucket;
mod client;
mod env;
mod error;
mod fixture;

pub use backend::{BackendState, MockBackend};
pub use bucket::{Bucket, NamingPolicy, validate_bucket_name};
pub use client::{ClientConfig, DEFAULT_REGION, PROFILE_VAR, StorageClient};
pub use env::{EnvOverride, EnvSnapshot, with_env};
pub use error::StorageError;
pub use fixture::{BucketFixture, FixtureState, TEST_BUCKET};
