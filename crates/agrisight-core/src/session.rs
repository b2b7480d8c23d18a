//! Authentication primitives shared across the client.
//!
//! # Design
//! - Keep session state as simple data so callers can snapshot it without side effects.
//! - Authentication is derived from the presence of a user, never stored separately.
//! - Leave credential transport (cookies) to the HTTP client.

use serde::{Deserialize, Serialize};

/// Identity of the signed-in user as tracked by the session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    /// Backend user identifier.
    pub id: String,
    /// Current email address, when known.
    #[serde(default)]
    pub email: Option<String>,
    /// Avatar URL, when one was uploaded.
    #[serde(default)]
    pub profile_pic_url: Option<String>,
}

/// Client-held authentication state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Session {
    pub(crate) user: Option<SessionUser>,
    pub(crate) loading: bool,
    pub(crate) error: Option<String>,
}

impl Session {
    /// Signed-in user, if any.
    #[must_use]
    pub const fn user(&self) -> Option<&SessionUser> {
        self.user.as_ref()
    }

    /// Whether a user is signed in.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Whether a session action is in flight.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.loading
    }

    /// Last error recorded by a session action.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}
