/// String-keyed storage holding JSON documents. Implementations decide
/// durability; the catalog service only relies on single-key atomicity.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn put(&self, key: &str, value: String) -> Result<(), StoreError>;
    fn delete(&self, key: &str) -> Result<(), StoreError>;
    /// Every key starting with `prefix`, in any order.
    fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("stored value under {key} is corrupt: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub fn corrupt(key: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Corrupt {
            key: key.into(),
            source,
        }
    }
}
