//! Observable session container.
//!
//! # Design
//! - One [`SessionHandle`] is created per client and cloned into every component that needs it.
//! - Mutation goes through [`Session::reduce`]; subscribers see every changed snapshot.
//! - Async operations run through [`SessionHandle::run`], which brackets them with
//!   `Pending` and exactly one of `Fulfilled` or `Rejected`.

use std::future::Future;
use std::sync::Arc;

use agrisight_core::{ApiError, Session, SessionAction, SessionOp, SessionOutcome};
use tokio::sync::watch;

/// Shared handle over the current [`Session`].
#[derive(Clone, Debug)]
pub struct SessionHandle {
    sender: Arc<watch::Sender<Session>>,
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHandle {
    /// Signed-out, idle session.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = watch::channel(Session::default());
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Copy of the current session.
    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.sender.borrow().clone()
    }

    /// Whether a user is signed in.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.sender.borrow().is_authenticated()
    }

    /// Identifier of the signed-in user.
    #[must_use]
    pub fn user_id(&self) -> Option<String> {
        self.sender.borrow().user().map(|user| user.id.clone())
    }

    /// Receiver notified on every change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.sender.subscribe()
    }

    pub(crate) fn dispatch(&self, action: SessionAction) -> bool {
        self.sender.send_if_modified(|session| session.reduce(action))
    }

    /// Reset the session after the backend rejected our credentials.
    pub(crate) fn force_logout(&self) {
        if self.dispatch(SessionAction::ForcedLogout) {
            tracing::info!("session reset after unauthorized response");
        }
    }

    /// Run `operation` as session operation `op`.
    ///
    /// `outcome` maps the successful value onto the session; failures record
    /// the error message and are returned unchanged.
    pub(crate) async fn run<T, F>(
        &self,
        op: SessionOp,
        operation: F,
        outcome: impl FnOnce(&T) -> SessionOutcome,
    ) -> Result<T, ApiError>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        self.dispatch(SessionAction::Pending(op));
        match operation.await {
            Ok(value) => {
                self.dispatch(SessionAction::Fulfilled(op, outcome(&value)));
                Ok(value)
            }
            Err(error) => {
                tracing::debug!(
                    op = op.as_str(),
                    kind = error.kind.as_str(),
                    "session operation failed"
                );
                self.dispatch(SessionAction::Rejected(op, error.message.clone()));
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agrisight_core::SessionUser;

    fn user() -> SessionUser {
        SessionUser {
            id: "u-1".to_string(),
            email: Some("grower@farm.io".to_string()),
            profile_pic_url: None,
        }
    }

    #[tokio::test]
    async fn run_brackets_operation_with_pending_and_fulfilled() {
        let handle = SessionHandle::new();
        let mut updates = handle.subscribe();

        let observer = handle.clone();
        let result = handle
            .run(
                SessionOp::Login,
                async move {
                    assert!(observer.snapshot().is_loading());
                    Ok::<_, ApiError>(user())
                },
                |user| SessionOutcome::SignedIn(user.clone()),
            )
            .await;

        assert!(result.is_ok());
        assert!(updates.has_changed().unwrap_or(false));
        let session = updates.borrow_and_update().clone();
        assert!(session.is_authenticated());
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn rejected_operation_records_error_and_clears_loading() {
        let handle = SessionHandle::new();
        let result: Result<(), ApiError> = handle
            .run(
                SessionOp::Refresh,
                async { Err(ApiError::network("connection refused")) },
                |_| SessionOutcome::Unchanged,
            )
            .await;

        assert!(result.is_err());
        let session = handle.snapshot();
        assert!(!session.is_loading());
        assert_eq!(session.error(), Some("connection refused"));
    }

    #[test]
    fn forced_logout_resets_signed_in_session() {
        let handle = SessionHandle::new();
        handle.dispatch(SessionAction::Fulfilled(
            SessionOp::Login,
            SessionOutcome::SignedIn(user()),
        ));
        assert_eq!(handle.user_id().as_deref(), Some("u-1"));

        handle.force_logout();
        assert!(!handle.is_authenticated());
        assert!(handle.snapshot().user().is_none());
    }
}
