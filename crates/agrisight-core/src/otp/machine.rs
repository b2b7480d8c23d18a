//! Verification-code state machine.
//!
//! # Design
//! - [`OtpMachine::apply`] is pure: it returns [`OtpEffect`]s and never performs IO.
//! - Every network result carries the ticket it was issued with; results whose ticket no
//!   longer matches the active challenge are dropped, so late responses cannot overwrite
//!   fresher state.
//! - Limit and missing-token failures on resend end the flow and discard persisted context;
//!   a rejected code always returns to code entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::handoff::{HandoffKey, KeyValueStore, PendingEmailChange, StorageError};
use crate::otp::CODE_LENGTH;
use crate::otp::cooldown::Cooldown;
use crate::routes::Route;

/// Why a code is being verified.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    /// Confirming the address of a new account.
    Signup,
    /// Confirming a change of account address.
    EmailChange,
}

impl OtpPurpose {
    /// Short label used in logs and storage keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Signup => "signup",
            Self::EmailChange => "email_change",
        }
    }

    /// Storage key holding the serialized challenge.
    #[must_use]
    pub const fn challenge_key(self) -> HandoffKey {
        match self {
            Self::Signup => HandoffKey::SignupChallenge,
            Self::EmailChange => HandoffKey::EmailChangeChallenge,
        }
    }

    /// Screen that starts this flow; the flow returns here when it ends early.
    #[must_use]
    pub const fn restart_route(self) -> Route {
        match self {
            Self::Signup => Route::Signup,
            Self::EmailChange => Route::Profile,
        }
    }

    /// Screen reached after successful verification.
    #[must_use]
    pub const fn success_route(self) -> Route {
        match self {
            Self::Signup => Route::Login,
            Self::EmailChange => Route::Profile,
        }
    }
}

/// Addresses a challenge verifies.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "purpose", rename_all = "snake_case")]
pub enum OtpTarget {
    /// Signup for `email`.
    Signup {
        /// Address of the new account.
        email: String,
    },
    /// Replace `old_email` with `new_email`.
    EmailChange {
        /// Current account address; receives the code.
        old_email: String,
        /// Address being switched to.
        new_email: String,
    },
}

impl OtpTarget {
    /// Purpose implied by the target.
    #[must_use]
    pub const fn purpose(&self) -> OtpPurpose {
        match self {
            Self::Signup { .. } => OtpPurpose::Signup,
            Self::EmailChange { .. } => OtpPurpose::EmailChange,
        }
    }

    /// Address the code is delivered to.
    #[must_use]
    pub fn email(&self) -> &str {
        match self {
            Self::Signup { email } => email,
            Self::EmailChange { old_email, .. } => old_email,
        }
    }
}

/// An outstanding verification challenge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpChallenge {
    /// Addresses being verified.
    pub target: OtpTarget,
    /// Digits in the code.
    pub code_length: usize,
    /// Seconds between resends.
    pub resend_cooldown_secs: u32,
    /// Resends performed so far.
    pub resend_count: u32,
    /// Resends allowed before the flow must restart.
    pub max_resends: u32,
    /// Instant the current code was sent.
    pub issued_at: DateTime<Utc>,
    /// Ticket identifying this challenge.
    pub generation: u64,
}

impl OtpChallenge {
    /// Purpose of the challenge.
    #[must_use]
    pub const fn purpose(&self) -> OtpPurpose {
        self.target.purpose()
    }

    /// Resend cooldown started by the latest send.
    #[must_use]
    pub const fn cooldown(&self) -> Cooldown {
        Cooldown::new(self.issued_at, self.resend_cooldown_secs)
    }

    /// Resends still available.
    #[must_use]
    pub const fn resends_left(&self) -> u32 {
        self.max_resends.saturating_sub(self.resend_count)
    }

    /// Persist the challenge and the addresses the verify screen reads.
    ///
    /// # Errors
    /// Returns [`StorageError`] when a key cannot be written.
    pub fn store(&self, store: &mut dyn KeyValueStore) -> Result<(), StorageError> {
        let key = self.purpose().challenge_key();
        let encoded = serde_json::to_string(self).map_err(|source| StorageError::Malformed {
            key: key.as_str().to_string(),
            source,
        })?;
        store.set_key(key, &encoded)?;
        match &self.target {
            OtpTarget::Signup { email } => store.set_key(HandoffKey::PendingSignupEmail, email),
            OtpTarget::EmailChange {
                old_email,
                new_email,
            } => PendingEmailChange {
                old_email: old_email.clone(),
                new_email: new_email.clone(),
            }
            .store(store),
        }
    }

    /// Load the persisted challenge for `purpose`.
    ///
    /// # Errors
    /// Returns [`StorageError::Malformed`] when the stored value does not parse.
    pub fn load(
        store: &dyn KeyValueStore,
        purpose: OtpPurpose,
    ) -> Result<Option<Self>, StorageError> {
        let key = purpose.challenge_key();
        let Some(raw) = store.get_key(key) else {
            return Ok(None);
        };
        let challenge: Self =
            serde_json::from_str(&raw).map_err(|source| StorageError::Malformed {
                key: key.as_str().to_string(),
                source,
            })?;
        Ok((challenge.purpose() == purpose).then_some(challenge))
    }

    /// Remove every key written for `purpose`.
    ///
    /// # Errors
    /// Returns [`StorageError`] when a key cannot be removed.
    pub fn clear_context(
        store: &mut dyn KeyValueStore,
        purpose: OtpPurpose,
    ) -> Result<(), StorageError> {
        store.remove_key(purpose.challenge_key())?;
        match purpose {
            OtpPurpose::Signup => store.remove_key(HandoffKey::PendingSignupEmail),
            OtpPurpose::EmailChange => PendingEmailChange::clear(store),
        }
    }
}

/// Flow state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OtpState {
    /// No challenge; the initiating form is shown.
    Idle,
    /// A code was sent and awaits entry.
    CodeRequested {
        /// Active challenge.
        challenge: OtpChallenge,
        /// Last verification or resend failure shown to the user.
        error: Option<String>,
        /// Whether a resend call is in flight.
        resending: bool,
    },
    /// A code was submitted and awaits the backend.
    Verifying {
        /// Active challenge.
        challenge: OtpChallenge,
    },
    /// The code was accepted.
    Verified {
        /// Addresses that were verified.
        target: OtpTarget,
    },
}

impl OtpState {
    /// Active challenge, if any.
    #[must_use]
    pub const fn challenge(&self) -> Option<&OtpChallenge> {
        match self {
            Self::CodeRequested { challenge, .. } | Self::Verifying { challenge } => {
                Some(challenge)
            }
            Self::Idle | Self::Verified { .. } => None,
        }
    }

    /// Short label used in logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::CodeRequested { .. } => "code_requested",
            Self::Verifying { .. } => "verifying",
            Self::Verified { .. } => "verified",
        }
    }
}

/// Inputs to the machine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OtpEvent {
    /// The owning form was submitted; a send-code call is about to start.
    RequestStarted,
    /// The send-code call issued under `ticket` succeeded.
    RequestSucceeded {
        /// Ticket returned by [`OtpEffect::SendCode`].
        ticket: u64,
        /// Addresses the code was sent for.
        target: OtpTarget,
        /// Instant the backend accepted the request.
        at: DateTime<Utc>,
    },
    /// The send-code call issued under `ticket` failed.
    RequestFailed {
        /// Ticket returned by [`OtpEffect::SendCode`].
        ticket: u64,
        /// Normalized failure.
        error: ApiError,
    },
    /// A persisted challenge was found after a reload.
    Restore(OtpChallenge),
    /// The user submitted the entered code.
    Submit {
        /// Digits entered, left to right.
        code: String,
    },
    /// Verification issued under `ticket` succeeded.
    VerifySucceeded {
        /// Challenge generation the call was issued for.
        ticket: u64,
    },
    /// Verification issued under `ticket` failed.
    VerifyFailed {
        /// Challenge generation the call was issued for.
        ticket: u64,
        /// Normalized failure.
        error: ApiError,
    },
    /// The user asked for a new code.
    ResendRequested {
        /// Instant of the request, checked against the cooldown.
        at: DateTime<Utc>,
    },
    /// Resend issued under `ticket` succeeded.
    ResendSucceeded {
        /// Challenge generation the call was issued for.
        ticket: u64,
        /// Instant the new code was sent.
        at: DateTime<Utc>,
        /// Resend count reported by the backend, when present.
        server_count: Option<u32>,
    },
    /// Resend issued under `ticket` failed.
    ResendFailed {
        /// Challenge generation the call was issued for.
        ticket: u64,
        /// Normalized failure.
        error: ApiError,
    },
    /// The user abandoned the flow.
    Cancel,
}

/// User-facing feedback produced by a transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OtpNotice {
    /// A code was sent to `email`.
    CodeSent {
        /// Delivery address.
        email: String,
    },
    /// A new code was sent.
    CodeResent {
        /// Resends still available.
        resends_left: u32,
    },
    /// The code was accepted.
    Verified(OtpPurpose),
    /// The entered code was rejected or incomplete.
    InvalidCode(String),
    /// Resend is still cooling down.
    ResendBlocked {
        /// Seconds until resend is allowed.
        remaining_secs: u64,
    },
    /// Too many resends; the flow must restart.
    LimitReached,
    /// The challenge no longer exists on the backend.
    Expired,
    /// The send-code call failed.
    RequestFailed(String),
    /// The resend call failed but may be retried.
    ResendFailed(String),
    /// The user cancelled.
    Cancelled,
}

/// Side effects requested by a transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OtpEffect {
    /// Issue the send-code call tagged with `ticket`.
    SendCode {
        /// Ticket to report the result with.
        ticket: u64,
    },
    /// Issue the verify call.
    SubmitCode {
        /// Ticket to report the result with.
        ticket: u64,
        /// Addresses being verified.
        target: OtpTarget,
        /// Entered code.
        code: String,
    },
    /// Issue the resend call.
    ResendCode {
        /// Ticket to report the result with.
        ticket: u64,
        /// Addresses being verified.
        target: OtpTarget,
    },
    /// Write the challenge to durable storage.
    PersistChallenge(OtpChallenge),
    /// Remove every stored key of this purpose.
    ClearChallenge(OtpPurpose),
    /// Empty the code cells and focus the first.
    ClearDigits,
    /// Show feedback.
    Notify(OtpNotice),
    /// Move to another screen.
    Navigate(Route),
    /// Record the new address on the signed-in session.
    ApplyEmailChange(String),
}

/// State machine for one verification purpose.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OtpMachine {
    purpose: OtpPurpose,
    resend_cooldown_secs: u32,
    max_resends: u32,
    state: OtpState,
    generation: u64,
    pending_request: Option<u64>,
}

impl OtpMachine {
    /// Idle machine for `purpose`.
    #[must_use]
    pub const fn new(purpose: OtpPurpose, resend_cooldown_secs: u32, max_resends: u32) -> Self {
        Self {
            purpose,
            resend_cooldown_secs,
            max_resends,
            state: OtpState::Idle,
            generation: 0,
            pending_request: None,
        }
    }

    /// Purpose this machine verifies.
    #[must_use]
    pub const fn purpose(&self) -> OtpPurpose {
        self.purpose
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &OtpState {
        &self.state
    }

    /// Whether a resend would be accepted at `now`.
    #[must_use]
    pub fn can_resend(&self, now: DateTime<Utc>) -> bool {
        match &self.state {
            OtpState::CodeRequested {
                challenge,
                resending,
                ..
            } => !resending && challenge.cooldown().is_ready(now),
            _ => false,
        }
    }

    /// Apply `event` and return the effects the caller must perform.
    pub fn apply(&mut self, event: OtpEvent) -> Vec<OtpEffect> {
        let before = self.state.label();
        let effects = self.transition(event);
        tracing::debug!(
            purpose = self.purpose.as_str(),
            from = before,
            to = self.state.label(),
            effects = effects.len(),
            "otp transition"
        );
        effects
    }

    fn transition(&mut self, event: OtpEvent) -> Vec<OtpEffect> {
        match event {
            OtpEvent::RequestStarted => {
                self.generation += 1;
                self.pending_request = Some(self.generation);
                vec![OtpEffect::SendCode {
                    ticket: self.generation,
                }]
            }
            OtpEvent::RequestSucceeded { ticket, target, at } => {
                if self.pending_request != Some(ticket) || target.purpose() != self.purpose {
                    return Vec::new();
                }
                self.pending_request = None;
                let email = target.email().to_string();
                let challenge = OtpChallenge {
                    target,
                    code_length: CODE_LENGTH,
                    resend_cooldown_secs: self.resend_cooldown_secs,
                    resend_count: 0,
                    max_resends: self.max_resends,
                    issued_at: at,
                    generation: ticket,
                };
                self.state = OtpState::CodeRequested {
                    challenge: challenge.clone(),
                    error: None,
                    resending: false,
                };
                vec![
                    OtpEffect::PersistChallenge(challenge),
                    OtpEffect::Notify(OtpNotice::CodeSent { email }),
                ]
            }
            OtpEvent::RequestFailed { ticket, error } => {
                if self.pending_request != Some(ticket) {
                    return Vec::new();
                }
                self.pending_request = None;
                vec![OtpEffect::Notify(OtpNotice::RequestFailed(error.message))]
            }
            OtpEvent::Restore(challenge) => {
                if !matches!(self.state, OtpState::Idle) || challenge.purpose() != self.purpose {
                    return Vec::new();
                }
                self.generation = self.generation.max(challenge.generation);
                self.state = OtpState::CodeRequested {
                    challenge,
                    error: None,
                    resending: false,
                };
                Vec::new()
            }
            OtpEvent::Submit { code } => self.submit(code),
            OtpEvent::VerifySucceeded { ticket } => {
                let OtpState::Verifying { challenge } = &self.state else {
                    return Vec::new();
                };
                if challenge.generation != ticket {
                    return Vec::new();
                }
                let target = challenge.target.clone();
                self.state = OtpState::Verified {
                    target: target.clone(),
                };
                let mut effects = vec![
                    OtpEffect::ClearChallenge(self.purpose),
                    OtpEffect::Notify(OtpNotice::Verified(self.purpose)),
                ];
                if let OtpTarget::EmailChange { new_email, .. } = target {
                    effects.push(OtpEffect::ApplyEmailChange(new_email));
                }
                effects.push(OtpEffect::Navigate(self.purpose.success_route()));
                effects
            }
            OtpEvent::VerifyFailed { ticket, error } => {
                let OtpState::Verifying { challenge } = &self.state else {
                    return Vec::new();
                };
                if challenge.generation != ticket {
                    return Vec::new();
                }
                self.state = OtpState::CodeRequested {
                    challenge: challenge.clone(),
                    error: Some(error.message.clone()),
                    resending: false,
                };
                vec![
                    OtpEffect::ClearDigits,
                    OtpEffect::Notify(OtpNotice::InvalidCode(error.message)),
                ]
            }
            OtpEvent::ResendRequested { at } => self.request_resend(at),
            OtpEvent::ResendSucceeded {
                ticket,
                at,
                server_count,
            } => self.resend_succeeded(ticket, at, server_count),
            OtpEvent::ResendFailed { ticket, error } => {
                let Some(challenge) = self.state.challenge() else {
                    return Vec::new();
                };
                if challenge.generation != ticket {
                    return Vec::new();
                }
                if error.ends_otp_flow() {
                    return self.end_flow(&error);
                }
                if let OtpState::CodeRequested {
                    error: shown,
                    resending,
                    ..
                } = &mut self.state
                {
                    *resending = false;
                    *shown = Some(error.message.clone());
                }
                vec![OtpEffect::Notify(OtpNotice::ResendFailed(error.message))]
            }
            OtpEvent::Cancel => {
                self.state = OtpState::Idle;
                self.pending_request = None;
                vec![
                    OtpEffect::ClearChallenge(self.purpose),
                    OtpEffect::Notify(OtpNotice::Cancelled),
                    OtpEffect::Navigate(self.purpose.restart_route()),
                ]
            }
        }
    }

    fn submit(&mut self, code: String) -> Vec<OtpEffect> {
        let OtpState::CodeRequested { challenge, .. } = &self.state else {
            return Vec::new();
        };
        let well_formed =
            code.len() == challenge.code_length && code.chars().all(|ch| ch.is_ascii_digit());
        if !well_formed {
            let message = format!(
                "please enter the complete {}-digit code",
                challenge.code_length
            );
            return vec![OtpEffect::Notify(OtpNotice::InvalidCode(message))];
        }
        let challenge = challenge.clone();
        let effect = OtpEffect::SubmitCode {
            ticket: challenge.generation,
            target: challenge.target.clone(),
            code,
        };
        self.state = OtpState::Verifying { challenge };
        vec![effect]
    }

    fn request_resend(&mut self, at: DateTime<Utc>) -> Vec<OtpEffect> {
        let OtpState::CodeRequested {
            challenge,
            resending,
            ..
        } = &mut self.state
        else {
            return Vec::new();
        };
        if *resending {
            return Vec::new();
        }
        if challenge.resend_count >= challenge.max_resends {
            return self.end_flow(&ApiError::from_response(429, "Resend limit reached"));
        }
        let remaining_secs = challenge.cooldown().remaining_secs(at);
        if remaining_secs > 0 {
            return vec![OtpEffect::Notify(OtpNotice::ResendBlocked { remaining_secs })];
        }
        *resending = true;
        vec![OtpEffect::ResendCode {
            ticket: challenge.generation,
            target: challenge.target.clone(),
        }]
    }

    fn resend_succeeded(
        &mut self,
        ticket: u64,
        at: DateTime<Utc>,
        server_count: Option<u32>,
    ) -> Vec<OtpEffect> {
        let (challenge, resending) = match &mut self.state {
            OtpState::CodeRequested {
                challenge,
                resending,
                ..
            } => (challenge, Some(resending)),
            OtpState::Verifying { challenge } => (challenge, None),
            OtpState::Idle | OtpState::Verified { .. } => return Vec::new(),
        };
        if challenge.generation != ticket {
            return Vec::new();
        }
        let counted = challenge.resend_count.saturating_add(1);
        challenge.resend_count = counted
            .max(server_count.unwrap_or(0))
            .min(challenge.max_resends);
        challenge.issued_at = at;
        if let Some(flag) = resending {
            *flag = false;
        }
        let updated = challenge.clone();
        vec![
            OtpEffect::PersistChallenge(updated.clone()),
            OtpEffect::Notify(OtpNotice::CodeResent {
                resends_left: updated.resends_left(),
            }),
        ]
    }

    fn end_flow(&mut self, error: &ApiError) -> Vec<OtpEffect> {
        let notice = match error.kind {
            crate::error::ErrorKind::LimitReached => OtpNotice::LimitReached,
            _ => OtpNotice::Expired,
        };
        tracing::info!(
            purpose = self.purpose.as_str(),
            reason = error.kind.as_str(),
            "otp flow ended"
        );
        self.state = OtpState::Idle;
        self.pending_request = None;
        vec![
            OtpEffect::ClearChallenge(self.purpose),
            OtpEffect::Notify(notice),
            OtpEffect::Navigate(self.purpose.restart_route()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn t0() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).expect("valid timestamp")
    }

    fn signup_target() -> OtpTarget {
        OtpTarget::Signup {
            email: "user@example.com".to_string(),
        }
    }

    fn requested(machine: &mut OtpMachine) -> u64 {
        let effects = machine.apply(OtpEvent::RequestStarted);
        let [OtpEffect::SendCode { ticket }] = effects.as_slice() else {
            panic!("expected a single send effect, got {effects:?}");
        };
        let ticket = *ticket;
        machine.apply(OtpEvent::RequestSucceeded {
            ticket,
            target: signup_target(),
            at: t0(),
        });
        ticket
    }

    fn resend_count(machine: &OtpMachine) -> u32 {
        machine
            .state()
            .challenge()
            .map_or(0, |challenge| challenge.resend_count)
    }

    #[test]
    fn request_success_persists_and_moves_to_code_requested() {
        let mut machine = OtpMachine::new(OtpPurpose::Signup, 60, 5);
        let effects = machine.apply(OtpEvent::RequestStarted);
        assert_eq!(effects, vec![OtpEffect::SendCode { ticket: 1 }]);

        let effects = machine.apply(OtpEvent::RequestSucceeded {
            ticket: 1,
            target: signup_target(),
            at: t0(),
        });
        assert!(matches!(machine.state(), OtpState::CodeRequested { .. }));
        assert!(matches!(effects[0], OtpEffect::PersistChallenge(_)));
        assert_eq!(
            effects[1],
            OtpEffect::Notify(OtpNotice::CodeSent {
                email: "user@example.com".to_string()
            })
        );
    }

    #[test]
    fn superseded_request_response_is_ignored() {
        let mut machine = OtpMachine::new(OtpPurpose::Signup, 60, 5);
        machine.apply(OtpEvent::RequestStarted);
        machine.apply(OtpEvent::RequestStarted);

        let stale = machine.apply(OtpEvent::RequestSucceeded {
            ticket: 1,
            target: signup_target(),
            at: t0(),
        });
        assert!(stale.is_empty());
        assert_eq!(machine.state(), &OtpState::Idle);

        machine.apply(OtpEvent::RequestSucceeded {
            ticket: 2,
            target: signup_target(),
            at: t0(),
        });
        assert_eq!(machine.state().challenge().map(|c| c.generation), Some(2));
    }

    #[test]
    fn successful_signup_verification_clears_context_and_goes_to_login() {
        let mut machine = OtpMachine::new(OtpPurpose::Signup, 60, 5);
        let ticket = requested(&mut machine);

        let effects = machine.apply(OtpEvent::Submit {
            code: "123456".to_string(),
        });
        assert_eq!(
            effects,
            vec![OtpEffect::SubmitCode {
                ticket,
                target: signup_target(),
                code: "123456".to_string(),
            }]
        );
        assert!(matches!(machine.state(), OtpState::Verifying { .. }));

        let effects = machine.apply(OtpEvent::VerifySucceeded { ticket });
        assert_eq!(
            effects,
            vec![
                OtpEffect::ClearChallenge(OtpPurpose::Signup),
                OtpEffect::Notify(OtpNotice::Verified(OtpPurpose::Signup)),
                OtpEffect::Navigate(Route::Login),
            ]
        );
        assert!(matches!(machine.state(), OtpState::Verified { .. }));
    }

    #[test]
    fn incomplete_code_is_rejected_before_any_call() {
        let mut machine = OtpMachine::new(OtpPurpose::Signup, 60, 5);
        requested(&mut machine);
        let effects = machine.apply(OtpEvent::Submit {
            code: "12a45".to_string(),
        });
        assert!(matches!(
            effects.as_slice(),
            [OtpEffect::Notify(OtpNotice::InvalidCode(_))]
        ));
        assert!(matches!(machine.state(), OtpState::CodeRequested { .. }));
    }

    #[test]
    fn failed_verification_returns_to_code_entry_and_clears_digits() {
        let mut machine = OtpMachine::new(OtpPurpose::Signup, 60, 5);
        let ticket = requested(&mut machine);
        machine.apply(OtpEvent::Submit {
            code: "000000".to_string(),
        });
        let effects = machine.apply(OtpEvent::VerifyFailed {
            ticket,
            error: ApiError::from_response(400, "Invalid OTP"),
        });
        assert_eq!(effects[0], OtpEffect::ClearDigits);
        let OtpState::CodeRequested { error, .. } = machine.state() else {
            panic!("expected code entry state");
        };
        assert_eq!(error.as_deref(), Some("Invalid OTP"));
    }

    #[test]
    fn resend_is_blocked_during_cooldown_and_allowed_at_zero() {
        let mut machine = OtpMachine::new(OtpPurpose::Signup, 60, 5);
        requested(&mut machine);

        let almost = t0() + Duration::seconds(59);
        assert!(!machine.can_resend(almost));
        assert_eq!(
            machine.apply(OtpEvent::ResendRequested { at: almost }),
            vec![OtpEffect::Notify(OtpNotice::ResendBlocked { remaining_secs: 1 })]
        );

        let ready = t0() + Duration::seconds(60);
        assert!(machine.can_resend(ready));
        let effects = machine.apply(OtpEvent::ResendRequested { at: ready });
        assert!(matches!(effects.as_slice(), [OtpEffect::ResendCode { .. }]));
        assert!(!machine.can_resend(ready), "in-flight resend blocks another");
    }

    #[test]
    fn resend_limit_returns_flow_to_idle() {
        let mut machine = OtpMachine::new(OtpPurpose::Signup, 60, 5);
        let ticket = requested(&mut machine);
        let mut now = t0();

        for round in 1..=4 {
            now += Duration::seconds(60);
            machine.apply(OtpEvent::ResendRequested { at: now });
            machine.apply(OtpEvent::ResendSucceeded {
                ticket,
                at: now,
                server_count: Some(round),
            });
            assert_eq!(resend_count(&machine), round);
        }

        now += Duration::seconds(60);
        machine.apply(OtpEvent::ResendRequested { at: now });
        let effects = machine.apply(OtpEvent::ResendFailed {
            ticket,
            error: ApiError::from_response(429, "Resend limit reached"),
        });
        assert_eq!(machine.state(), &OtpState::Idle);
        assert_eq!(
            effects,
            vec![
                OtpEffect::ClearChallenge(OtpPurpose::Signup),
                OtpEffect::Notify(OtpNotice::LimitReached),
                OtpEffect::Navigate(Route::Signup),
            ]
        );
    }

    #[test]
    fn local_limit_ends_flow_without_network_call() {
        let mut machine = OtpMachine::new(OtpPurpose::Signup, 0, 2);
        let ticket = requested(&mut machine);
        for _ in 0..3 {
            machine.apply(OtpEvent::ResendRequested { at: t0() });
            machine.apply(OtpEvent::ResendSucceeded {
                ticket,
                at: t0(),
                server_count: None,
            });
            assert!(resend_count(&machine) <= 2);
        }
        assert_eq!(machine.state(), &OtpState::Idle);
    }

    #[test]
    fn missing_token_on_resend_ends_flow_as_expired() {
        let mut machine = OtpMachine::new(OtpPurpose::Signup, 0, 5);
        let ticket = requested(&mut machine);
        machine.apply(OtpEvent::ResendRequested { at: t0() });
        let effects = machine.apply(OtpEvent::ResendFailed {
            ticket,
            error: ApiError::from_response(404, "OTP token not found"),
        });
        assert!(effects.contains(&OtpEffect::Notify(OtpNotice::Expired)));
        assert_eq!(machine.state(), &OtpState::Idle);
    }

    #[test]
    fn late_verify_result_after_cancel_is_ignored() {
        let mut machine = OtpMachine::new(OtpPurpose::Signup, 60, 5);
        let ticket = requested(&mut machine);
        machine.apply(OtpEvent::Submit {
            code: "123456".to_string(),
        });
        machine.apply(OtpEvent::Cancel);

        let effects = machine.apply(OtpEvent::VerifySucceeded { ticket });
        assert!(effects.is_empty());
        assert_eq!(machine.state(), &OtpState::Idle);
    }

    #[test]
    fn email_change_success_updates_session_email() {
        let mut machine = OtpMachine::new(OtpPurpose::EmailChange, 60, 5);
        machine.apply(OtpEvent::RequestStarted);
        machine.apply(OtpEvent::RequestSucceeded {
            ticket: 1,
            target: OtpTarget::EmailChange {
                old_email: "old@farm.io".to_string(),
                new_email: "new@farm.io".to_string(),
            },
            at: t0(),
        });
        machine.apply(OtpEvent::Submit {
            code: "654321".to_string(),
        });
        let effects = machine.apply(OtpEvent::VerifySucceeded { ticket: 1 });
        assert!(effects.contains(&OtpEffect::ApplyEmailChange("new@farm.io".to_string())));
        assert!(effects.contains(&OtpEffect::Navigate(Route::Profile)));
    }

    #[test]
    fn rejected_email_change_code_keeps_challenge_even_when_message_says_expired() {
        let mut machine = OtpMachine::new(OtpPurpose::EmailChange, 60, 5);
        machine.apply(OtpEvent::RequestStarted);
        machine.apply(OtpEvent::RequestSucceeded {
            ticket: 1,
            target: OtpTarget::EmailChange {
                old_email: "old@farm.io".to_string(),
                new_email: "new@farm.io".to_string(),
            },
            at: t0(),
        });
        machine.apply(OtpEvent::Submit {
            code: "111111".to_string(),
        });
        let effects = machine.apply(OtpEvent::VerifyFailed {
            ticket: 1,
            error: ApiError::from_response(400, "Invalid or expired OTP"),
        });

        assert_eq!(
            effects,
            vec![
                OtpEffect::ClearDigits,
                OtpEffect::Notify(OtpNotice::InvalidCode(
                    "Invalid or expired OTP".to_string()
                )),
            ]
        );
        let OtpState::CodeRequested { error, .. } = machine.state() else {
            panic!("expected code entry state, got {:?}", machine.state());
        };
        assert_eq!(error.as_deref(), Some("Invalid or expired OTP"));
    }

    #[test]
    fn challenge_context_survives_reload_and_clears_fully() -> Result<(), StorageError> {
        use crate::handoff::MemoryStore;

        let mut store = MemoryStore::default();
        let challenge = OtpChallenge {
            target: OtpTarget::EmailChange {
                old_email: "old@farm.io".to_string(),
                new_email: "new@farm.io".to_string(),
            },
            code_length: CODE_LENGTH,
            resend_cooldown_secs: 60,
            resend_count: 3,
            max_resends: 5,
            issued_at: t0(),
            generation: 4,
        };
        challenge.store(&mut store)?;
        assert_eq!(store.get("oldEmail").as_deref(), Some("old@farm.io"));

        let loaded = OtpChallenge::load(&store, OtpPurpose::EmailChange)?;
        assert_eq!(loaded, Some(challenge));
        assert_eq!(OtpChallenge::load(&store, OtpPurpose::Signup)?, None);

        OtpChallenge::clear_context(&mut store, OtpPurpose::EmailChange)?;
        assert!(store.is_empty());
        Ok(())
    }

    #[test]
    fn restore_resumes_persisted_challenge() {
        let mut machine = OtpMachine::new(OtpPurpose::Signup, 60, 5);
        let challenge = OtpChallenge {
            target: signup_target(),
            code_length: CODE_LENGTH,
            resend_cooldown_secs: 60,
            resend_count: 2,
            max_resends: 5,
            issued_at: t0(),
            generation: 7,
        };
        machine.apply(OtpEvent::Restore(challenge));
        assert_eq!(resend_count(&machine), 2);

        let effects = machine.apply(OtpEvent::RequestStarted);
        assert_eq!(effects, vec![OtpEffect::SendCode { ticket: 8 }]);
    }
}
