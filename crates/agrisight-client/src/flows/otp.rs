//! Drives an [`OtpMachine`] against the backend.
//!
//! # Design
//! - The machine decides; [`OtpFlow`] performs the effects it returns and feeds network
//!   results back in as events until no effect remains.
//! - Verify and resend calls go through [`OtpTransport`] so tests can script the backend.
//! - Storage failures abort the step; API failures become notices.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;

use agrisight_core::{
    ApiError, Clock, OtpChallenge, OtpEffect, OtpEvent, OtpMachine, OtpNotice, OtpPurpose,
    OtpState, OtpTarget, Route, SessionAction, SystemClock,
};
use async_trait::async_trait;

use crate::flows::{FlowError, FlowResult};
use crate::services::{AuthService, ProfileService};
use crate::session::SessionHandle;
use crate::storage::SharedStore;

#[async_trait]
/// Backend calls made while a code is outstanding.
pub trait OtpTransport: Send + Sync {
    /// Verify `code` for `target`.
    async fn verify(&self, target: &OtpTarget, code: &str) -> Result<(), ApiError>;
    /// Ask for a new code; returns the backend's resend count when reported.
    async fn resend(&self, target: &OtpTarget) -> Result<Option<u32>, ApiError>;
}

/// Transport backed by the auth and profile services.
#[derive(Clone, Debug)]
pub struct BackendTransport {
    auth: AuthService,
    profile: ProfileService,
}

impl BackendTransport {
    /// Transport over the given services.
    #[must_use]
    pub const fn new(auth: AuthService, profile: ProfileService) -> Self {
        Self { auth, profile }
    }
}

#[async_trait]
impl OtpTransport for BackendTransport {
    async fn verify(&self, target: &OtpTarget, code: &str) -> Result<(), ApiError> {
        match target {
            OtpTarget::Signup { email } => self.auth.verify_signup(email, code).await.map(drop),
            OtpTarget::EmailChange {
                old_email,
                new_email,
            } => self
                .profile
                .confirm_email_change(old_email, new_email, code)
                .await
                .map(drop),
        }
    }

    async fn resend(&self, target: &OtpTarget) -> Result<Option<u32>, ApiError> {
        let response = match target {
            OtpTarget::Signup { email } => self.auth.resend_signup(email).await?,
            OtpTarget::EmailChange { .. } => self.profile.resend_email_change().await?,
        };
        Ok(response.resend_count)
    }
}

/// What one step of a flow produced for the caller to show.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlowReport {
    /// Feedback, in order.
    pub notices: Vec<OtpNotice>,
    /// Screen to move to, if any.
    pub navigate: Option<Route>,
    /// Whether the code cells should be emptied.
    pub clear_digits: bool,
}

impl FlowReport {
    /// Whether the step ended with the code accepted.
    #[must_use]
    pub fn verified(&self) -> bool {
        self.notices
            .iter()
            .any(|notice| matches!(notice, OtpNotice::Verified(_)))
    }

    /// Whether the step ended the flow early.
    #[must_use]
    pub fn ended(&self) -> bool {
        self.notices.iter().any(|notice| {
            matches!(
                notice,
                OtpNotice::LimitReached | OtpNotice::Expired | OtpNotice::Cancelled
            )
        })
    }
}

/// One verification flow bound to its storage and session.
pub struct OtpFlow<T> {
    machine: OtpMachine,
    transport: T,
    store: SharedStore,
    session: SessionHandle,
    clock: Arc<dyn Clock>,
}

impl<T> std::fmt::Debug for OtpFlow<T> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("OtpFlow")
            .field("purpose", &self.machine.purpose())
            .field("state", &self.machine.state().label())
            .finish_non_exhaustive()
    }
}

impl<T: OtpTransport> OtpFlow<T> {
    /// Idle flow using the system clock.
    #[must_use]
    pub fn new(
        machine: OtpMachine,
        transport: T,
        store: SharedStore,
        session: SessionHandle,
    ) -> Self {
        Self::with_clock(machine, transport, store, session, Arc::new(SystemClock))
    }

    /// Idle flow using `clock` for cooldowns and timestamps.
    #[must_use]
    pub fn with_clock(
        machine: OtpMachine,
        transport: T,
        store: SharedStore,
        session: SessionHandle,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            machine,
            transport,
            store,
            session,
            clock,
        }
    }

    /// Purpose of this flow.
    #[must_use]
    pub const fn purpose(&self) -> OtpPurpose {
        self.machine.purpose()
    }

    /// Current machine state.
    #[must_use]
    pub const fn state(&self) -> &OtpState {
        self.machine.state()
    }

    /// Seconds until a resend is accepted, `None` without an active challenge.
    #[must_use]
    pub fn resend_remaining_secs(&self) -> Option<u64> {
        self.machine
            .state()
            .challenge()
            .map(|challenge| challenge.cooldown().remaining_secs(self.clock.now()))
    }

    /// Pick up a challenge persisted by an earlier process.
    ///
    /// Returns whether a challenge was restored.
    ///
    /// # Errors
    /// Returns [`FlowError::Storage`] when the stored challenge is unreadable.
    pub fn restore(&mut self) -> FlowResult<bool> {
        let purpose = self.machine.purpose();
        let Some(challenge) = self
            .store
            .with(|store| OtpChallenge::load(store, purpose))?
        else {
            return Ok(false);
        };
        self.machine.apply(OtpEvent::Restore(challenge));
        Ok(self.machine.state().challenge().is_some())
    }

    /// Run `send` as the initial send-code call for `target`.
    ///
    /// # Errors
    /// Returns [`FlowError::PurposeMismatch`] for a target of another purpose and
    /// [`FlowError::Storage`] when the challenge cannot be persisted.
    pub async fn start<F>(&mut self, target: OtpTarget, send: F) -> FlowResult<FlowReport>
    where
        F: Future<Output = Result<(), ApiError>> + Send,
    {
        if target.purpose() != self.machine.purpose() {
            return Err(FlowError::PurposeMismatch {
                expected: self.machine.purpose(),
                actual: target.purpose(),
            });
        }
        let mut report = FlowReport::default();
        let mut effects = self.machine.apply(OtpEvent::RequestStarted);
        let ticket = effects.iter().find_map(|effect| match effect {
            OtpEffect::SendCode { ticket } => Some(*ticket),
            _ => None,
        });
        effects.retain(|effect| !matches!(effect, OtpEffect::SendCode { .. }));
        self.perform(effects, &mut report).await?;
        let Some(ticket) = ticket else {
            return Ok(report);
        };
        let event = match send.await {
            Ok(()) => OtpEvent::RequestSucceeded {
                ticket,
                target,
                at: self.clock.now(),
            },
            Err(error) => OtpEvent::RequestFailed { ticket, error },
        };
        let effects = self.machine.apply(event);
        self.perform(effects, &mut report).await?;
        Ok(report)
    }

    /// Submit the entered code.
    ///
    /// # Errors
    /// Returns [`FlowError::Storage`] when persisted context cannot be updated.
    pub async fn submit(&mut self, code: &str) -> FlowResult<FlowReport> {
        self.step(OtpEvent::Submit {
            code: code.trim().to_string(),
        })
        .await
    }

    /// Ask for a new code, honoring the cooldown and the resend limit.
    ///
    /// # Errors
    /// Returns [`FlowError::Storage`] when persisted context cannot be updated.
    pub async fn resend(&mut self) -> FlowResult<FlowReport> {
        self.step(OtpEvent::ResendRequested {
            at: self.clock.now(),
        })
        .await
    }

    /// Abandon the flow and discard its persisted context.
    ///
    /// # Errors
    /// Returns [`FlowError::Storage`] when persisted context cannot be removed.
    pub async fn cancel(&mut self) -> FlowResult<FlowReport> {
        self.step(OtpEvent::Cancel).await
    }

    async fn step(&mut self, event: OtpEvent) -> FlowResult<FlowReport> {
        let mut report = FlowReport::default();
        let effects = self.machine.apply(event);
        self.perform(effects, &mut report).await?;
        Ok(report)
    }

    async fn perform(
        &mut self,
        effects: Vec<OtpEffect>,
        report: &mut FlowReport,
    ) -> FlowResult<()> {
        let mut queue: VecDeque<OtpEffect> = effects.into();
        while let Some(effect) = queue.pop_front() {
            let follow_up = match effect {
                OtpEffect::SendCode { ticket } => {
                    tracing::debug!(ticket, "send-code effect outside start ignored");
                    None
                }
                OtpEffect::SubmitCode {
                    ticket,
                    target,
                    code,
                } => Some(match self.transport.verify(&target, &code).await {
                    Ok(()) => OtpEvent::VerifySucceeded { ticket },
                    Err(error) => OtpEvent::VerifyFailed { ticket, error },
                }),
                OtpEffect::ResendCode { ticket, target } => {
                    Some(match self.transport.resend(&target).await {
                        Ok(server_count) => OtpEvent::ResendSucceeded {
                            ticket,
                            at: self.clock.now(),
                            server_count,
                        },
                        Err(error) => OtpEvent::ResendFailed { ticket, error },
                    })
                }
                OtpEffect::PersistChallenge(challenge) => {
                    self.store.with(|store| challenge.store(store))?;
                    None
                }
                OtpEffect::ClearChallenge(purpose) => {
                    self.store
                        .with(|store| OtpChallenge::clear_context(store, purpose))?;
                    None
                }
                OtpEffect::ClearDigits => {
                    report.clear_digits = true;
                    None
                }
                OtpEffect::Notify(notice) => {
                    report.notices.push(notice);
                    None
                }
                OtpEffect::Navigate(route) => {
                    report.navigate = Some(route);
                    None
                }
                OtpEffect::ApplyEmailChange(email) => {
                    self.session.dispatch(SessionAction::EmailChanged(email));
                    None
                }
            };
            if let Some(event) = follow_up {
                queue.extend(self.machine.apply(event));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use agrisight_core::{
        FixedClock, HandoffKey, KeyValueStore, SessionOp, SessionOutcome, SessionUser,
    };
    use chrono::{DateTime, Duration, Utc};

    #[derive(Default)]
    struct ScriptedTransport {
        verify_results: Mutex<VecDeque<Result<(), ApiError>>>,
        resends: AtomicU32,
        resend_error: Mutex<Option<ApiError>>,
    }

    #[async_trait]
    impl OtpTransport for Arc<ScriptedTransport> {
        async fn verify(&self, _target: &OtpTarget, _code: &str) -> Result<(), ApiError> {
            self.verify_results
                .lock()
                .expect("lock")
                .pop_front()
                .unwrap_or(Ok(()))
        }

        async fn resend(&self, _target: &OtpTarget) -> Result<Option<u32>, ApiError> {
            if let Some(error) = self.resend_error.lock().expect("lock").clone() {
                return Err(error);
            }
            let count = self.resends.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Some(count))
        }
    }

    fn t0() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).expect("valid timestamp")
    }

    fn signup() -> OtpTarget {
        OtpTarget::Signup {
            email: "grower@farm.io".to_string(),
        }
    }

    struct Harness {
        flow: OtpFlow<Arc<ScriptedTransport>>,
        transport: Arc<ScriptedTransport>,
        clock: Arc<FixedClock>,
        store: SharedStore,
        session: SessionHandle,
    }

    fn harness(purpose: OtpPurpose) -> Harness {
        let transport = Arc::new(ScriptedTransport::default());
        let clock = Arc::new(FixedClock::new(t0()));
        let store = SharedStore::memory();
        let session = SessionHandle::new();
        let flow = OtpFlow::with_clock(
            OtpMachine::new(purpose, 60, 5),
            Arc::clone(&transport),
            store.clone(),
            session.clone(),
            clock.clone(),
        );
        Harness {
            flow,
            transport,
            clock,
            store,
            session,
        }
    }

    #[tokio::test]
    async fn start_persists_challenge_and_reports_code_sent() -> FlowResult<()> {
        let mut h = harness(OtpPurpose::Signup);
        let report = h.flow.start(signup(), async { Ok(()) }).await?;

        assert_eq!(
            report.notices,
            vec![OtpNotice::CodeSent {
                email: "grower@farm.io".to_string()
            }]
        );
        assert!(matches!(h.flow.state(), OtpState::CodeRequested { .. }));
        let stored = h
            .store
            .with(|store| store.get_key(HandoffKey::PendingSignupEmail));
        assert_eq!(stored.as_deref(), Some("grower@farm.io"));
        assert_eq!(h.flow.resend_remaining_secs(), Some(60));
        Ok(())
    }

    #[tokio::test]
    async fn failed_send_leaves_flow_idle() -> FlowResult<()> {
        let mut h = harness(OtpPurpose::Signup);
        let report = h
            .flow
            .start(signup(), async {
                Err(ApiError::from_response(400, "Email already registered"))
            })
            .await?;

        assert_eq!(
            report.notices,
            vec![OtpNotice::RequestFailed(
                "Email already registered".to_string()
            )]
        );
        assert!(matches!(h.flow.state(), OtpState::Idle));
        Ok(())
    }

    #[tokio::test]
    async fn wrong_code_clears_digits_and_keeps_challenge() -> FlowResult<()> {
        let mut h = harness(OtpPurpose::Signup);
        h.flow.start(signup(), async { Ok(()) }).await?;
        h.transport
            .verify_results
            .lock()
            .expect("lock")
            .push_back(Err(ApiError::from_response(400, "Invalid OTP code")));

        let report = h.flow.submit("123456").await?;
        assert!(report.clear_digits);
        assert!(!report.verified());
        assert!(matches!(
            h.flow.state(),
            OtpState::CodeRequested { error: Some(_), .. }
        ));

        let report = h.flow.submit("654321").await?;
        assert!(report.verified());
        assert_eq!(report.navigate, Some(Route::Login));
        assert!(h.store.with(|store| store.get_key(HandoffKey::PendingSignupEmail)).is_none());
        Ok(())
    }

    #[tokio::test]
    async fn sixth_resend_ends_flow_without_network_call() -> FlowResult<()> {
        let mut h = harness(OtpPurpose::Signup);
        h.flow.start(signup(), async { Ok(()) }).await?;

        let report = h.flow.resend().await?;
        assert!(matches!(
            report.notices.as_slice(),
            [OtpNotice::ResendBlocked { remaining_secs: 60 }]
        ));

        for expected_left in (0..5).rev() {
            h.clock.advance(Duration::seconds(60));
            let report = h.flow.resend().await?;
            assert_eq!(
                report.notices,
                vec![OtpNotice::CodeResent {
                    resends_left: expected_left
                }]
            );
        }
        assert_eq!(h.transport.resends.load(Ordering::SeqCst), 5);

        h.clock.advance(Duration::seconds(60));
        let report = h.flow.resend().await?;
        assert!(report.notices.contains(&OtpNotice::LimitReached));
        assert_eq!(report.navigate, Some(Route::Signup));
        assert_eq!(h.transport.resends.load(Ordering::SeqCst), 5);
        assert!(matches!(h.flow.state(), OtpState::Idle));
        Ok(())
    }

    #[tokio::test]
    async fn expired_token_on_resend_restarts_flow() -> FlowResult<()> {
        let mut h = harness(OtpPurpose::Signup);
        h.flow.start(signup(), async { Ok(()) }).await?;
        *h.transport.resend_error.lock().expect("lock") =
            Some(ApiError::from_response(404, "OTP token not found"));

        h.clock.advance(Duration::seconds(61));
        let report = h.flow.resend().await?;
        assert!(report.ended());
        assert!(report.notices.contains(&OtpNotice::Expired));
        let challenge = h
            .store
            .with(|store| OtpChallenge::load(store, OtpPurpose::Signup))?;
        assert!(challenge.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn restore_resumes_persisted_challenge() -> FlowResult<()> {
        let mut first = harness(OtpPurpose::Signup);
        first.flow.start(signup(), async { Ok(()) }).await?;

        let mut resumed = OtpFlow::with_clock(
            OtpMachine::new(OtpPurpose::Signup, 60, 5),
            Arc::clone(&first.transport),
            first.store.clone(),
            SessionHandle::new(),
            first.clock.clone(),
        );
        assert!(resumed.restore()?);
        let report = resumed.submit("123456").await?;
        assert!(report.verified());
        Ok(())
    }

    #[tokio::test]
    async fn email_change_updates_signed_in_session() -> FlowResult<()> {
        let mut h = harness(OtpPurpose::EmailChange);
        h.session.dispatch(SessionAction::Fulfilled(
            SessionOp::Login,
            SessionOutcome::SignedIn(SessionUser {
                id: "u-1".to_string(),
                email: Some("old@farm.io".to_string()),
                profile_pic_url: None,
            }),
        ));
        let target = OtpTarget::EmailChange {
            old_email: "old@farm.io".to_string(),
            new_email: "new@farm.io".to_string(),
        };
        h.flow.start(target, async { Ok(()) }).await?;
        let report = h.flow.submit("123456").await?;

        assert_eq!(report.navigate, Some(Route::Profile));
        let email = h
            .session
            .snapshot()
            .user()
            .and_then(|user| user.email.clone());
        assert_eq!(email.as_deref(), Some("new@farm.io"));
        Ok(())
    }

    #[tokio::test]
    async fn rejected_email_change_code_keeps_pending_change() -> FlowResult<()> {
        let mut h = harness(OtpPurpose::EmailChange);
        let target = OtpTarget::EmailChange {
            old_email: "old@farm.io".to_string(),
            new_email: "new@farm.io".to_string(),
        };
        h.flow.start(target, async { Ok(()) }).await?;
        h.transport
            .verify_results
            .lock()
            .expect("lock")
            .push_back(Err(ApiError::from_response(400, "Invalid or expired OTP")));

        let report = h.flow.submit("111111").await?;
        assert!(report.clear_digits);
        assert!(!report.ended());
        assert_eq!(report.navigate, None);
        assert!(matches!(h.flow.state(), OtpState::CodeRequested { .. }));
        let stored = h
            .store
            .with(|store| OtpChallenge::load(store, OtpPurpose::EmailChange))?;
        assert!(stored.is_some());
        assert_eq!(
            h.store.with(|store| store.get_key(HandoffKey::PendingNewEmail)).as_deref(),
            Some("new@farm.io")
        );
        Ok(())
    }

    #[tokio::test]
    async fn start_rejects_target_of_other_purpose() {
        let mut h = harness(OtpPurpose::EmailChange);
        let result = h.flow.start(signup(), async { Ok(()) }).await;
        assert!(matches!(result, Err(FlowError::PurposeMismatch { .. })));
    }
}
