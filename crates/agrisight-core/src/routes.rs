//! Route table and navigation guards.
//!
//! # Design
//! - Guards are pure functions of the session snapshot and the saved redirect path.
//! - Storage side effects of a decision are applied separately via [`GuardDecision::apply`].
//! - Private routes never redirect while the session is still loading.

use crate::handoff::{HandoffKey, KeyValueStore, StorageError};
use crate::session::Session;

/// Screens of the application.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Route {
    /// Landing page.
    Home,
    /// Sign-in form.
    Login,
    /// Signup form.
    Signup,
    /// Signup code entry.
    VerifySignup,
    /// Password-reset token request.
    ForgotPassword,
    /// Password reset with a token.
    ResetPassword,
    /// Image upload and prediction.
    Upload,
    /// Prediction history.
    History,
    /// Profile management.
    Profile,
    /// Email-change code entry.
    VerifyEmailChange,
    /// Unknown path.
    NotFound,
}

/// Who may see a route.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteAccess {
    /// Only signed-out users; signed-in users are sent onward.
    Open,
    /// Only signed-in users.
    Private,
    /// Everyone.
    Public,
}

const ALL: [Route; 10] = [
    Route::Home,
    Route::Login,
    Route::Signup,
    Route::VerifySignup,
    Route::ForgotPassword,
    Route::ResetPassword,
    Route::Upload,
    Route::History,
    Route::Profile,
    Route::VerifyEmailChange,
];

impl Route {
    /// URL path of the route.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Home => "/",
            Self::Login => "/login",
            Self::Signup => "/signup",
            Self::VerifySignup => "/verify-otp",
            Self::ForgotPassword => "/forgot-password",
            Self::ResetPassword => "/reset-password",
            Self::Upload => "/upload",
            Self::History => "/history",
            Self::Profile => "/profile",
            Self::VerifyEmailChange => "/profile/verify-email",
            Self::NotFound => "/404",
        }
    }

    /// Route for `path`, ignoring query string and trailing slash.
    #[must_use]
    pub fn from_path(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let trimmed = path.trim_end_matches('/');
        let normalized = if trimmed.is_empty() { "/" } else { trimmed };
        ALL.into_iter()
            .find(|route| route.path() == normalized)
            .unwrap_or(Self::NotFound)
    }

    /// Access class of the route.
    #[must_use]
    pub const fn access(self) -> RouteAccess {
        match self {
            Self::Login
            | Self::Signup
            | Self::VerifySignup
            | Self::ForgotPassword
            | Self::ResetPassword => RouteAccess::Open,
            Self::Upload | Self::History | Self::Profile | Self::VerifyEmailChange => {
                RouteAccess::Private
            }
            Self::Home | Self::NotFound => RouteAccess::Public,
        }
    }
}

/// Outcome of evaluating a guard.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardDecision {
    /// Show the requested screen.
    Render,
    /// Session state is not settled; show a placeholder.
    Wait,
    /// Navigate elsewhere.
    Redirect {
        /// Target path.
        to: String,
        /// Path to remember for after sign-in.
        remember: Option<String>,
        /// Whether the remembered path is consumed.
        clear_saved: bool,
    },
}

impl GuardDecision {
    /// Persist or consume the remembered path as the decision requires.
    ///
    /// # Errors
    /// Returns [`StorageError`] when the redirect key cannot be updated.
    pub fn apply(&self, store: &mut dyn KeyValueStore) -> Result<(), StorageError> {
        match self {
            Self::Redirect {
                remember: Some(path),
                ..
            } => store.set_key(HandoffKey::RedirectAfterLogin, path),
            Self::Redirect {
                clear_saved: true, ..
            } => store.remove_key(HandoffKey::RedirectAfterLogin),
            _ => Ok(()),
        }
    }
}

/// Guard for screens meant for signed-out users.
///
/// Signed-in users are sent to the remembered path, or `/` when none was
/// saved, and the remembered path is consumed.
#[must_use]
pub fn open_route(session: &Session, saved_redirect: Option<&str>) -> GuardDecision {
    if !session.is_authenticated() {
        return GuardDecision::Render;
    }
    let to = saved_redirect
        .filter(|path| !path.is_empty())
        .unwrap_or(Route::Home.path())
        .to_string();
    GuardDecision::Redirect {
        to,
        remember: None,
        clear_saved: true,
    }
}

/// Guard for screens that require a signed-in user.
#[must_use]
pub fn private_route(session: &Session, attempted_path: &str) -> GuardDecision {
    if session.is_loading() {
        return GuardDecision::Wait;
    }
    if session.is_authenticated() {
        return GuardDecision::Render;
    }
    GuardDecision::Redirect {
        to: Route::Login.path().to_string(),
        remember: Some(attempted_path.to_string()),
        clear_saved: false,
    }
}

/// Evaluate the guard for `path` and apply its storage side effects.
///
/// # Errors
/// Returns [`StorageError`] when the remembered path cannot be updated.
pub fn navigate(
    session: &Session,
    path: &str,
    store: &mut dyn KeyValueStore,
) -> Result<GuardDecision, StorageError> {
    let decision = match Route::from_path(path).access() {
        RouteAccess::Public => GuardDecision::Render,
        RouteAccess::Private => private_route(session, path),
        RouteAccess::Open => {
            let saved = store.get_key(HandoffKey::RedirectAfterLogin);
            open_route(session, saved.as_deref())
        }
    };
    decision.apply(store)?;
    Ok(decision)
}
