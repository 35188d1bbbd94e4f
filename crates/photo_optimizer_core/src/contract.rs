use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum acceptable output size for an optimized image (1 MiB).
pub const SIZE_BUDGET_BYTES: usize = 1_048_576;
/// Long-edge cap for the fit-inside resize.
pub const MAX_LONG_EDGE_PX: u32 = 1920;
pub const INITIAL_QUALITY: u8 = 90;
pub const QUALITY_STEP: u8 = 10;
pub const QUALITY_FLOOR: u8 = 20;
pub const OUTPUT_CONTENT_TYPE: &str = "image/jpeg";
pub const OPTIMIZED_METADATA_KEY: &str = "optimized";
pub const OPTIMIZED_METADATA_VALUE: &str = "true";

/// Minimal trigger contract: one object-creation notification record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ObjectCreatedRecord {
    pub bucket_name: String,
    pub object_key: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Skipped,
    Optimized,
    Failed,
}

/// Per-invocation result returned to the invoking platform. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OptimizationOutcome {
    pub status: OutcomeStatus,
    pub key: String,
    #[serde(rename = "errorMessage", default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl OptimizationOutcome {
    pub fn skipped(key: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Skipped,
            key: key.into(),
            error_message: None,
        }
    }

    pub fn optimized(key: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Optimized,
            key: key.into(),
            error_message: None,
        }
    }

    pub fn failed(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Failed,
            key: key.into(),
            error_message: Some(message.into()),
        }
    }
}

/// Extracts `(bucket, key)` pairs from a raw S3 object-created notification.
pub fn records_from_s3_event(event: &Value) -> Result<Vec<ObjectCreatedRecord>, String> {
    let records = event
        .get("Records")
        .and_then(Value::as_array)
        .ok_or_else(|| "S3 event must include Records array".to_string())?;

    let mut parsed = Vec::with_capacity(records.len());
    for record in records {
        let bucket_name = record
            .get("s3")
            .and_then(|s3| s3.get("bucket"))
            .and_then(|bucket| bucket.get("name"))
            .and_then(Value::as_str)
            .ok_or_else(|| "S3 record must include s3.bucket.name".to_string())?;
        let raw_key = record
            .get("s3")
            .and_then(|s3| s3.get("object"))
            .and_then(|object| object.get("key"))
            .and_then(Value::as_str)
            .ok_or_else(|| "S3 record must include s3.object.key".to_string())?;

        parsed.push(ObjectCreatedRecord {
            bucket_name: bucket_name.to_string(),
            object_key: decode_event_key(raw_key)?,
        });
    }

    Ok(parsed)
}

// S3 notifications URL-encode object keys and encode spaces as '+'.
fn decode_event_key(raw: &str) -> Result<String, String> {
    urlencoding::decode(&raw.replace('+', " "))
        .map(|decoded| decoded.into_owned())
        .map_err(|error| format!("invalid URL-encoded object key: {error}"))
}

/// The exact sequence of JPEG qualities the adaptive encode loop may attempt.
pub fn quality_schedule() -> Vec<u8> {
    let mut qualities = Vec::new();
    let mut quality = INITIAL_QUALITY;
    loop {
        qualities.push(quality);
        if quality <= QUALITY_FLOOR {
            break;
        }
        quality -= QUALITY_STEP;
    }
    qualities
}
