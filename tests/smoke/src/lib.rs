#[cfg(test)]
mod tests {
    use std::{collections::BTreeSet, panic, sync::Arc};

    use mockstore_core::{
        BackendState, BucketFixture, MockBackend, PROFILE_VAR, StorageClient, StorageError,
        TEST_BUCKET, with_env,
    };

    #[test]
    fn created_bucket_is_listed() {
        let fixture = BucketFixture::setup().unwrap();

        let bucket_names: Vec<String> = fixture
            .client()
            .list_buckets()
            .unwrap()
            .into_iter()
            .map(|bucket| bucket.name)
            .collect();
        assert!(
            bucket_names.iter().any(|name| name == TEST_BUCKET),
            "expected `{TEST_BUCKET}` in {bucket_names:?}"
        );

        fixture.teardown().unwrap();
    }

    #[test]
    fn fresh_backend_lists_exactly_the_provisioned_bucket() {
        let fixture = BucketFixture::setup().unwrap();
        assert_eq!(fixture.client().bucket_names().unwrap(), vec![TEST_BUCKET]);
        assert_eq!(fixture.backend().list_buckets().unwrap().len(), 1);
        fixture.teardown().unwrap();
    }

    #[test]
    fn listing_is_repeatable_within_one_activation() {
        let fixture = BucketFixture::setup().unwrap();
        let first: BTreeSet<String> = fixture.client().bucket_names().unwrap().into_iter().collect();
        let second: BTreeSet<String> = fixture.client().bucket_names().unwrap().into_iter().collect();
        assert_eq!(first, second);
        fixture.teardown().unwrap();
    }

    #[test]
    fn ambient_profile_does_not_leak_into_setup() {
        let fixture = with_env([(PROFILE_VAR, "production")], false, BucketFixture::setup).unwrap();
        assert_eq!(fixture.client().bucket_names().unwrap(), vec![TEST_BUCKET]);
        fixture.teardown().unwrap();
    }

    #[test]
    fn unscrubbed_profile_breaks_client_construction() {
        let backend = Arc::new(MockBackend::new());
        let err = with_env([(PROFILE_VAR, "production")], false, || {
            StorageClient::from_env(backend)
        })
        .unwrap_err();
        assert_eq!(err, StorageError::ProfileNotFound("production".to_string()));
    }

    #[test]
    fn failed_assertion_still_stops_backend() {
        let fixture = BucketFixture::setup().unwrap();
        let backend = Arc::clone(fixture.backend());

        let outcome = panic::catch_unwind(panic::AssertUnwindSafe(move || {
            let names = fixture.client().bucket_names().unwrap();
            assert!(names.iter().any(|name| name == "Missing-Bucket"));
        }));

        assert!(outcome.is_err());
        assert_eq!(backend.state(), BackendState::Stopped);
        assert_eq!(backend.list_buckets(), Err(StorageError::NotActive));
    }
}
