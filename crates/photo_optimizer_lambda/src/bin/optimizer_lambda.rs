use std::collections::HashMap;

use aws_sdk_s3::primitives::ByteStream;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use photo_optimizer_core::contract::records_from_s3_event;
use photo_optimizer_lambda::adapters::photo_store::{PhotoStore, StoreError};
use photo_optimizer_lambda::handlers::optimize::{handle_object_created, InvocationSummary};
use serde_json::Value;

struct S3PhotoStore {
    bucket: String,
    s3_client: aws_sdk_s3::Client,
}

impl PhotoStore for S3PhotoStore {
    fn get_metadata(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let bucket = self.bucket.clone();
        let object_key = key.to_string();
        let client = self.s3_client.clone();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let head = client
                    .head_object()
                    .bucket(bucket)
                    .key(object_key)
                    .send()
                    .await
                    .map_err(|error| {
                        if error
                            .as_service_error()
                            .map(|service| service.is_not_found())
                            .unwrap_or(false)
                        {
                            StoreError::NotFound
                        } else {
                            StoreError::Io(format!(
                                "failed to read object metadata from s3: {error}"
                            ))
                        }
                    })?;
                Ok(head.metadata().cloned().unwrap_or_default())
            })
        })
    }

    fn get_payload(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let bucket = self.bucket.clone();
        let object_key = key.to_string();
        let client = self.s3_client.clone();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let output = client
                    .get_object()
                    .bucket(bucket)
                    .key(object_key)
                    .send()
                    .await
                    .map_err(|error| {
                        if error
                            .as_service_error()
                            .map(|service| service.is_no_such_key())
                            .unwrap_or(false)
                        {
                            StoreError::NotFound
                        } else {
                            StoreError::Io(format!("failed to read object from s3: {error}"))
                        }
                    })?;
                let body = output.body.collect().await.map_err(|error| {
                    StoreError::Io(format!("failed to stream object body from s3: {error}"))
                })?;
                Ok(body.into_bytes().to_vec())
            })
        })
    }

    fn put_object(
        &self,
        key: &str,
        body: &[u8],
        content_type: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<(), StoreError> {
        let bucket = self.bucket.clone();
        let object_key = key.to_string();
        let body_bytes = body.to_vec();
        let content_type = content_type.to_string();
        let metadata = metadata.clone();
        let client = self.s3_client.clone();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                client
                    .put_object()
                    .bucket(bucket)
                    .key(object_key)
                    .body(ByteStream::from(body_bytes))
                    .content_type(content_type)
                    .set_metadata(Some(metadata))
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|error| {
                        StoreError::Io(format!("failed to write object to s3: {error}"))
                    })
            })
        })
    }
}

async fn handle_request(event: LambdaEvent<Value>) -> Result<Value, Error> {
    let records = records_from_s3_event(&event.payload)
        .map_err(|message| Error::from(format!("invalid s3 event: {message}")))?;

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let s3_client = aws_sdk_s3::Client::new(&aws_config);

    let mut outcomes = Vec::with_capacity(records.len());
    for record in &records {
        let store = S3PhotoStore {
            bucket: record.bucket_name.clone(),
            s3_client: s3_client.clone(),
        };
        outcomes.push(handle_object_created(record, &store));
    }

    serde_json::to_value(InvocationSummary::new(outcomes))
        .map_err(|error| Error::from(format!("failed to serialize invocation summary: {error}")))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    lambda_runtime::run(service_fn(handle_request)).await
}
