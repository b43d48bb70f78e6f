//! Key-value persistence trait.

use crate::error::StoreError;

/// String key-value storage used to keep the session across restarts.
///
/// No atomicity is required across keys; each key is last-write-wins.
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Insert or overwrite a value.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Delete a value. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}
