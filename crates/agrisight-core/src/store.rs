//! Session actions and the reducer that applies them.
//!
//! # Design
//! - Every mutation of [`Session`] goes through [`Session::reduce`].
//! - Async operations surface as `Pending` followed by exactly one of `Fulfilled` / `Rejected`.
//! - `ForcedLogout` is the only action raised outside an explicit user operation.

use crate::session::{Session, SessionUser};

/// Asynchronous session operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionOp {
    /// Initial session check at start-up.
    Bootstrap,
    /// Email/password sign-in.
    Login,
    /// Explicit sign-out.
    Logout,
    /// Access-token refresh.
    Refresh,
    /// Signup request (sends the signup code, does not sign in).
    Signup,
}

impl SessionOp {
    /// Short label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bootstrap => "bootstrap",
            Self::Login => "login",
            Self::Logout => "logout",
            Self::Refresh => "refresh",
            Self::Signup => "signup",
        }
    }
}

/// Effect a fulfilled operation has on the signed-in user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionOutcome {
    /// A user is now signed in.
    SignedIn(SessionUser),
    /// The session is now signed out.
    SignedOut,
    /// The user is unchanged.
    Unchanged,
}

/// Actions accepted by the session reducer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionAction {
    /// An operation started.
    Pending(SessionOp),
    /// An operation completed successfully.
    Fulfilled(SessionOp, SessionOutcome),
    /// An operation failed with a user-facing message.
    Rejected(SessionOp, String),
    /// The backend rejected credentials; drop everything.
    ForcedLogout,
    /// The signed-in user's email address changed.
    EmailChanged(String),
    /// The signed-in user's avatar changed.
    AvatarChanged(Option<String>),
    /// Clear the recorded error.
    ClearError,
}

impl Session {
    /// Apply an action, returning whether the session changed.
    pub fn reduce(&mut self, action: SessionAction) -> bool {
        let before = self.clone();
        match action {
            SessionAction::Pending(_) => {
                self.loading = true;
                self.error = None;
            }
            SessionAction::Fulfilled(_, outcome) => {
                self.loading = false;
                self.error = None;
                match outcome {
                    SessionOutcome::SignedIn(user) => self.user = Some(user),
                    SessionOutcome::SignedOut => self.user = None,
                    SessionOutcome::Unchanged => {}
                }
            }
            SessionAction::Rejected(op, message) => {
                self.loading = false;
                self.error = Some(message);
                if op == SessionOp::Bootstrap {
                    self.user = None;
                }
            }
            SessionAction::ForcedLogout => {
                *self = Self::default();
            }
            SessionAction::EmailChanged(email) => {
                if let Some(user) = self.user.as_mut() {
                    user.email = Some(email);
                }
            }
            SessionAction::AvatarChanged(url) => {
                if let Some(user) = self.user.as_mut() {
                    user.profile_pic_url = url;
                }
            }
            SessionAction::ClearError => self.error = None,
        }
        *self != before
    }
}
