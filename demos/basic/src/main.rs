use mockstore_core::{BucketFixture, StorageError};

fn main() -> Result<(), StorageError> {
    let fixture = BucketFixture::setup()?;
    fixture.client().create_bucket("demo-reports")?;

    for bucket in fixture.client().list_buckets()? {
        println!("{} ({})", bucket.name, bucket.region);
    }
    fixture.teardown()
}
