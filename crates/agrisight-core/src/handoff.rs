//! Durable key/value hand-off between screens.
//!
//! # Design
//! - Mirrors browser local storage: string keys, string values, synchronous access.
//! - Keys are enumerated so every producer and consumer agrees on spelling.
//! - Each flow clears its keys once it completes or is cancelled.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Well-known storage keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandoffKey {
    /// Email awaiting signup verification.
    PendingSignupEmail,
    /// New address awaiting email-change verification.
    PendingNewEmail,
    /// Address being replaced by an email change.
    OldEmail,
    /// Path to return to after signing in.
    RedirectAfterLogin,
    /// Serialized signup challenge (issue time, resend count).
    SignupChallenge,
    /// Serialized email-change challenge (issue time, resend count).
    EmailChangeChallenge,
    /// Session cookies persisted between CLI invocations.
    SessionCookies,
}

impl HandoffKey {
    /// Storage key string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PendingSignupEmail => "signupEmail",
            Self::PendingNewEmail => "pendingNewEmail",
            Self::OldEmail => "oldEmail",
            Self::RedirectAfterLogin => "redirectAfterLogin",
            Self::SignupChallenge => "otpChallenge.signup",
            Self::EmailChangeChallenge => "otpChallenge.email_change",
            Self::SessionCookies => "session.cookies",
        }
    }
}

/// Failure to read or write durable storage.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying IO failed.
    #[error("storage {operation} failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Source IO error.
        source: std::io::Error,
    },
    /// Stored document was not valid JSON.
    #[error("stored value for '{key}' is malformed")]
    Malformed {
        /// Key whose value failed to parse.
        key: String,
        /// Source parse error.
        source: serde_json::Error,
    },
}

/// Synchronous string key/value store.
pub trait KeyValueStore: Send {
    /// Read a value.
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value.
    ///
    /// # Errors
    /// Returns [`StorageError`] when the value cannot be persisted.
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a value; missing keys are not an error.
    ///
    /// # Errors
    /// Returns [`StorageError`] when the removal cannot be persisted.
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;

    /// Delete every value.
    ///
    /// # Errors
    /// Returns [`StorageError`] when the removal cannot be persisted.
    fn clear(&mut self) -> Result<(), StorageError>;

    /// Read a well-known key.
    fn get_key(&self, key: HandoffKey) -> Option<String> {
        self.get(key.as_str())
    }

    /// Write a well-known key.
    ///
    /// # Errors
    /// Returns [`StorageError`] when the value cannot be persisted.
    fn set_key(&mut self, key: HandoffKey, value: &str) -> Result<(), StorageError> {
        self.set(key.as_str(), value)
    }

    /// Delete a well-known key.
    ///
    /// # Errors
    /// Returns [`StorageError`] when the removal cannot be persisted.
    fn remove_key(&mut self, key: HandoffKey) -> Result<(), StorageError> {
        self.remove(key.as_str())
    }
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
}

impl MemoryStore {
    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no keys are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.values.remove(key);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        self.values.clear();
        Ok(())
    }
}

/// Email change awaiting confirmation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEmailChange {
    /// Address being replaced.
    pub old_email: String,
    /// Address being verified.
    pub new_email: String,
}

impl PendingEmailChange {
    /// Persist both addresses for the confirmation screen.
    ///
    /// # Errors
    /// Returns [`StorageError`] when either key cannot be written.
    pub fn store(&self, store: &mut dyn KeyValueStore) -> Result<(), StorageError> {
        store.set_key(HandoffKey::PendingNewEmail, &self.new_email)?;
        store.set_key(HandoffKey::OldEmail, &self.old_email)
    }

    /// Load a pending change if both addresses are present.
    #[must_use]
    pub fn load(store: &dyn KeyValueStore) -> Option<Self> {
        Some(Self {
            old_email: store.get_key(HandoffKey::OldEmail)?,
            new_email: store.get_key(HandoffKey::PendingNewEmail)?,
        })
    }

    /// Remove both addresses.
    ///
    /// # Errors
    /// Returns [`StorageError`] when either key cannot be removed.
    pub fn clear(store: &mut dyn KeyValueStore) -> Result<(), StorageError> {
        store.remove_key(HandoffKey::PendingNewEmail)?;
        store.remove_key(HandoffKey::OldEmail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_email_change_round_trips_through_store() -> Result<(), StorageError> {
        let mut store = MemoryStore::default();
        let change = PendingEmailChange {
            old_email: "old@farm.io".to_string(),
            new_email: "new@farm.io".to_string(),
        };
        change.store(&mut store)?;
        assert_eq!(store.get("pendingNewEmail").as_deref(), Some("new@farm.io"));
        assert_eq!(PendingEmailChange::load(&store), Some(change));

        PendingEmailChange::clear(&mut store)?;
        assert!(store.is_empty());
        Ok(())
    }

    #[test]
    fn pending_email_change_requires_both_keys() -> Result<(), StorageError> {
        let mut store = MemoryStore::default();
        store.set_key(HandoffKey::PendingNewEmail, "new@farm.io")?;
        assert!(PendingEmailChange::load(&store).is_none());
        Ok(())
    }
}
