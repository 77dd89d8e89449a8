use keyring::Entry;
use tracing::debug;

use super::storage::{StorageError, TokenStorage};

const SERVICE_NAME: &str = "dashgate";

/// Token storage backed by the OS keychain, one entry per key.
pub struct KeyringStorage {
    service: String,
}

impl KeyringStorage {
    pub fn new() -> Self {
        Self {
            service: SERVICE_NAME.to_string(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry, StorageError> {
        Ok(Entry::new(&self.service, key)?)
    }
}

impl Default for KeyringStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStorage for KeyringStorage {
    /// Retrieve a value from the OS keychain
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Store a value in the OS keychain
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entry(key)?.set_password(value)?;
        debug!(service = %self.service, key, "Stored value in keychain");
        Ok(())
    }

    /// Delete a value; absent entries are not an error
    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyring_roundtrip() {
        let storage = KeyringStorage {
            service: format!("{}-test-{}", SERVICE_NAME, std::process::id()),
        };

        // Sandboxes without a reachable keychain refuse the write outright
        if let Err(e) = storage.set("token", "abc123") {
            eprintln!("skipping keychain round trip: {}", e);
            return;
        }

        assert_eq!(storage.get("token").unwrap().as_deref(), Some("abc123"));
        storage.remove("token").unwrap();
        assert_eq!(storage.get("token").unwrap(), None);
        storage.remove("token").unwrap();
    }
}
