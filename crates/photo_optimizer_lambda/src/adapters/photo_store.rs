use std::collections::HashMap;
use std::fmt;

/// Errors surfaced by object-store round trips.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    NotFound,
    Io(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound => write!(f, "object not found"),
            StoreError::Io(message) => write!(f, "object store I/O failure: {message}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Object-store operations the optimization handler depends on. The bucket is
/// carried by the implementation; keys address objects within it.
pub trait PhotoStore {
    fn get_metadata(&self, key: &str) -> Result<HashMap<String, String>, StoreError>;

    fn get_payload(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Overwrite semantics: payload, content type, and metadata land in a
    /// single put with no partial-write visibility.
    fn put_object(
        &self,
        key: &str,
        body: &[u8],
        content_type: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<(), StoreError>;
}
