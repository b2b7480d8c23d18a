//! Session cookies issued by the backend.
//!
//! The backend authenticates with HTTP-only cookies. The jar keeps
//! `name=value` pairs from `Set-Cookie`, replays them on every request and
//! can be persisted so a later CLI invocation reuses the session.

use std::collections::BTreeMap;

use agrisight_core::{HandoffKey, KeyValueStore, StorageError};
use reqwest::header::{HeaderMap, SET_COOKIE};

/// Cookies replayed on every request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CookieJar {
    cookies: BTreeMap<String, String>,
}

impl CookieJar {
    /// Whether no cookies are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Value of a cookie.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Record every `Set-Cookie` header, returning whether the jar changed.
    ///
    /// Cookies with an empty value or `Max-Age=0` are removed.
    pub fn capture(&mut self, headers: &HeaderMap) -> bool {
        let mut changed = false;
        for raw in headers.get_all(SET_COOKIE) {
            let Ok(raw) = raw.to_str() else {
                continue;
            };
            changed |= self.apply_set_cookie(raw);
        }
        changed
    }

    fn apply_set_cookie(&mut self, raw: &str) -> bool {
        let mut parts = raw.split(';');
        let Some((name, value)) = parts.next().and_then(|pair| pair.split_once('=')) else {
            return false;
        };
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        let value = value.trim().trim_matches('"');
        let expired = parts.any(|attr| {
            attr.split_once('=').is_some_and(|(key, val)| {
                key.trim().eq_ignore_ascii_case("max-age") && val.trim().starts_with(['0', '-'])
            })
        });
        if value.is_empty() || expired {
            self.cookies.remove(name).is_some()
        } else {
            self.cookies.insert(name.to_string(), value.to_string()).as_deref() != Some(value)
        }
    }

    /// `Cookie` header value, when any cookie is held.
    #[must_use]
    pub fn header_value(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let pairs: Vec<String> = self
            .cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        Some(pairs.join("; "))
    }

    /// Drop every cookie.
    pub fn clear(&mut self) {
        self.cookies.clear();
    }

    /// Load persisted cookies; a malformed entry yields an empty jar.
    #[must_use]
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let cookies = store
            .get_key(HandoffKey::SessionCookies)
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        Self { cookies }
    }

    /// Persist the jar, removing the key when empty.
    ///
    /// # Errors
    /// Returns [`StorageError`] when the store cannot be updated.
    pub fn save(&self, store: &mut dyn KeyValueStore) -> Result<(), StorageError> {
        if self.cookies.is_empty() {
            return store.remove_key(HandoffKey::SessionCookies);
        }
        let encoded =
            serde_json::to_string(&self.cookies).map_err(|source| StorageError::Malformed {
                key: HandoffKey::SessionCookies.as_str().to_string(),
                source,
            })?;
        store.set_key(HandoffKey::SessionCookies, &encoded)
    }
}
