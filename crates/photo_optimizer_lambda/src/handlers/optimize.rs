use std::collections::HashMap;
use std::time::Instant;

use photo_optimizer_core::contract::{
    ObjectCreatedRecord, OptimizationOutcome, OPTIMIZED_METADATA_KEY, OPTIMIZED_METADATA_VALUE,
    OUTPUT_CONTENT_TYPE,
};
use photo_optimizer_core::encode::optimize_image;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::adapters::photo_store::PhotoStore;

/// Response returned to the invoking platform: one outcome per notification
/// record in the triggering event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InvocationSummary {
    pub status: String,
    pub outcomes: Vec<OptimizationOutcome>,
}

impl InvocationSummary {
    pub fn new(outcomes: Vec<OptimizationOutcome>) -> Self {
        Self {
            status: "ok".to_string(),
            outcomes,
        }
    }
}

/// Processes one object-created notification.
///
/// The idempotency check runs before any payload fetch: every write-back
/// carries the `optimized` marker and itself fires a new notification, so the
/// marker is the only thing standing between the pipeline and an infinite
/// trigger loop. A racing duplicate notification for the same key can pass the
/// check twice and double-encode; the second pass merely re-compresses an
/// already-compressed image.
///
/// Every failure is converted into a `failed` outcome rather than propagated;
/// retry policy belongs to the invoking platform.
pub fn handle_object_created(
    record: &ObjectCreatedRecord,
    store: &impl PhotoStore,
) -> OptimizationOutcome {
    let started_at = Instant::now();
    let key = record.object_key.as_str();

    let metadata = match store.get_metadata(key) {
        Ok(metadata) => metadata,
        Err(error) => {
            return fail(
                record,
                started_at,
                format!("failed to read object metadata: {error}"),
            )
        }
    };

    if metadata.get(OPTIMIZED_METADATA_KEY).map(String::as_str) == Some(OPTIMIZED_METADATA_VALUE) {
        log_info(
            "optimization_skipped",
            json!({
                "bucket": record.bucket_name.clone(),
                "key": key,
            }),
        );
        return OptimizationOutcome::skipped(key);
    }

    let payload = match store.get_payload(key) {
        Ok(payload) => payload,
        Err(error) => {
            return fail(
                record,
                started_at,
                format!("failed to read object payload: {error}"),
            )
        }
    };

    let encoded = match optimize_image(&payload) {
        Ok(encoded) => encoded,
        Err(error) => return fail(record, started_at, error.to_string()),
    };

    // Deliberate replacement of all prior metadata with just the marker;
    // custom metadata set before optimization does not survive.
    let marker = HashMap::from([(
        OPTIMIZED_METADATA_KEY.to_string(),
        OPTIMIZED_METADATA_VALUE.to_string(),
    )]);
    if let Err(error) = store.put_object(key, &encoded.bytes, OUTPUT_CONTENT_TYPE, &marker) {
        return fail(
            record,
            started_at,
            format!("failed to write optimized object: {error}"),
        );
    }

    log_info(
        "optimization_completed",
        json!({
            "bucket": record.bucket_name.clone(),
            "key": key,
            "original_bytes": payload.len(),
            "optimized_bytes": encoded.bytes.len(),
            "final_quality": encoded.quality,
            "encode_attempts": encoded.attempts.len(),
            "duration_ms": started_at.elapsed().as_millis(),
        }),
    );

    OptimizationOutcome::optimized(key)
}

fn fail(
    record: &ObjectCreatedRecord,
    started_at: Instant,
    message: String,
) -> OptimizationOutcome {
    log_error(
        "optimization_failed",
        json!({
            "bucket": record.bucket_name.clone(),
            "key": record.object_key.clone(),
            "duration_ms": started_at.elapsed().as_millis(),
            "error": message.clone(),
        }),
    );
    OptimizationOutcome::failed(&record.object_key, message)
}

fn log_info(event: &str, details: serde_json::Value) {
    eprintln!(
        "{}",
        json!({
            "component": "optimization_handler",
            "event": event,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "details": details,
        })
    );
}

fn log_error(event: &str, details: serde_json::Value) {
    eprintln!(
        "{}",
        json!({
            "component": "optimization_handler",
            "level": "error",
            "event": event,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "details": details,
        })
    );
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use photo_optimizer_core::contract::{OutcomeStatus, SIZE_BUDGET_BYTES};

    use crate::adapters::photo_store::StoreError;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct StoredObject {
        body: Vec<u8>,
        content_type: String,
        metadata: HashMap<String, String>,
    }

    struct FakeStore {
        objects: Mutex<HashMap<String, StoredObject>>,
        payload_fetches: AtomicUsize,
        deny_puts: bool,
    }

    impl FakeStore {
        fn new() -> Self {
            Self {
                objects: Mutex::new(HashMap::new()),
                payload_fetches: AtomicUsize::new(0),
                deny_puts: false,
            }
        }

        fn denying_puts() -> Self {
            Self {
                deny_puts: true,
                ..Self::new()
            }
        }

        fn seed_object(&self, key: &str, body: &[u8], metadata: HashMap<String, String>) {
            self.objects.lock().expect("poisoned mutex").insert(
                key.to_string(),
                StoredObject {
                    body: body.to_vec(),
                    content_type: "application/octet-stream".to_string(),
                    metadata,
                },
            );
        }

        fn object(&self, key: &str) -> Option<StoredObject> {
            self.objects
                .lock()
                .expect("poisoned mutex")
                .get(key)
                .cloned()
        }

        fn payload_fetches(&self) -> usize {
            self.payload_fetches.load(Ordering::SeqCst)
        }
    }

    impl PhotoStore for FakeStore {
        fn get_metadata(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
            self.objects
                .lock()
                .expect("poisoned mutex")
                .get(key)
                .map(|object| object.metadata.clone())
                .ok_or(StoreError::NotFound)
        }

        fn get_payload(&self, key: &str) -> Result<Vec<u8>, StoreError> {
            self.payload_fetches.fetch_add(1, Ordering::SeqCst);
            self.objects
                .lock()
                .expect("poisoned mutex")
                .get(key)
                .map(|object| object.body.clone())
                .ok_or(StoreError::NotFound)
        }

        fn put_object(
            &self,
            key: &str,
            body: &[u8],
            content_type: &str,
            metadata: &HashMap<String, String>,
        ) -> Result<(), StoreError> {
            if self.deny_puts {
                return Err(StoreError::Io("simulated write failure".to_string()));
            }

            self.objects.lock().expect("poisoned mutex").insert(
                key.to_string(),
                StoredObject {
                    body: body.to_vec(),
                    content_type: content_type.to_string(),
                    metadata: metadata.clone(),
                },
            );
            Ok(())
        }
    }

    fn sample_record() -> ObjectCreatedRecord {
        ObjectCreatedRecord {
            bucket_name: "family-photos".to_string(),
            object_key: "albums/2026/IMG_0001.jpg".to_string(),
        }
    }

    fn jpeg_fixture(width: u32, height: u32) -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        }));
        let mut buffer = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Jpeg)
            .expect("jpeg fixture should encode");
        buffer
    }

    fn marker_metadata() -> HashMap<String, String> {
        HashMap::from([("optimized".to_string(), "true".to_string())])
    }

    #[test]
    fn marked_object_is_skipped_without_payload_fetch() {
        let store = FakeStore::new();
        let record = sample_record();
        let original = jpeg_fixture(640, 480);
        store.seed_object(&record.object_key, &original, marker_metadata());

        let outcome = handle_object_created(&record, &store);

        assert_eq!(outcome.status, OutcomeStatus::Skipped);
        assert_eq!(outcome.key, record.object_key);
        assert_eq!(store.payload_fetches(), 0);

        let stored = store.object(&record.object_key).expect("object should remain");
        assert_eq!(stored.body, original);
        assert_eq!(stored.metadata, marker_metadata());
    }

    #[test]
    fn unmarked_object_is_optimized_and_marked() {
        let store = FakeStore::new();
        let record = sample_record();
        store.seed_object(&record.object_key, &jpeg_fixture(3000, 2000), HashMap::new());

        let outcome = handle_object_created(&record, &store);

        assert_eq!(outcome.status, OutcomeStatus::Optimized);
        assert_eq!(outcome.error_message, None);

        let stored = store.object(&record.object_key).expect("object should exist");
        assert_eq!(stored.content_type, "image/jpeg");
        assert_eq!(stored.metadata, marker_metadata());
        assert!(stored.body.starts_with(&[0xFF, 0xD8]));
        assert!(stored.body.len() <= SIZE_BUDGET_BYTES);
    }

    #[test]
    fn reprocessing_an_optimized_object_is_a_no_op() {
        let store = FakeStore::new();
        let record = sample_record();
        store.seed_object(&record.object_key, &jpeg_fixture(3000, 2000), HashMap::new());

        let first = handle_object_created(&record, &store);
        assert_eq!(first.status, OutcomeStatus::Optimized);
        let after_first = store.object(&record.object_key).expect("object should exist");

        // The write-back re-fires the trigger; the marker must stop the loop.
        let second = handle_object_created(&record, &store);
        assert_eq!(second.status, OutcomeStatus::Skipped);
        assert_eq!(
            store.object(&record.object_key).expect("object should exist"),
            after_first
        );
    }

    #[test]
    fn prior_custom_metadata_is_replaced_by_the_marker() {
        let store = FakeStore::new();
        let record = sample_record();
        store.seed_object(
            &record.object_key,
            &jpeg_fixture(640, 480),
            HashMap::from([("album".to_string(), "summer".to_string())]),
        );

        let outcome = handle_object_created(&record, &store);

        assert_eq!(outcome.status, OutcomeStatus::Optimized);
        let stored = store.object(&record.object_key).expect("object should exist");
        assert_eq!(stored.metadata, marker_metadata());
        assert!(!stored.metadata.contains_key("album"));
    }

    #[test]
    fn undecodable_payload_fails_and_leaves_object_untouched() {
        let store = FakeStore::new();
        let record = sample_record();
        store.seed_object(&record.object_key, b"not an image", HashMap::new());

        let outcome = handle_object_created(&record, &store);

        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert!(outcome
            .error_message
            .expect("failure should carry a message")
            .contains("failed to decode image"));

        let stored = store.object(&record.object_key).expect("object should remain");
        assert_eq!(stored.body, b"not an image");
        assert!(stored.metadata.is_empty());
    }

    #[test]
    fn missing_object_fails_with_not_found_message() {
        let store = FakeStore::new();
        let outcome = handle_object_created(&sample_record(), &store);

        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert!(outcome
            .error_message
            .expect("failure should carry a message")
            .contains("object not found"));
    }

    #[test]
    fn denied_write_back_fails_with_write_message() {
        let store = FakeStore::denying_puts();
        let record = sample_record();
        store.seed_object(&record.object_key, &jpeg_fixture(640, 480), HashMap::new());

        let outcome = handle_object_created(&record, &store);

        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert!(outcome
            .error_message
            .expect("failure should carry a message")
            .contains("failed to write optimized object"));
    }

    #[test]
    fn invocation_summary_serializes_per_record_outcomes() {
        let summary = InvocationSummary::new(vec![
            OptimizationOutcome::optimized("a.jpg"),
            OptimizationOutcome::failed("b.jpg", "decode failed"),
        ]);

        let value = serde_json::to_value(&summary).expect("summary should serialize");
        assert_eq!(value["status"], "ok");
        assert_eq!(value["outcomes"][0]["status"], "optimized");
        assert_eq!(value["outcomes"][1]["errorMessage"], "decode failed");
    }
}
