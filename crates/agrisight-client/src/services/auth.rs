//! Authentication endpoints and the session operations built on them.

use agrisight_core::validate;
use agrisight_core::{ApiError, SessionOp, SessionOutcome};
use reqwest::Method;
use serde_json::json;

use crate::http::{ApiClient, RequestOptions};
use crate::models::{MessageResponse, ResendResponse, SignupRequest, UserProfile};
use crate::services::log_failure;
use crate::services::profile::fetch_profile;

/// Signup, sign-in and password endpoints.
#[derive(Clone, Debug)]
pub struct AuthService {
    client: ApiClient,
}

impl AuthService {
    /// Service over `client`.
    #[must_use]
    pub const fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Validate the signup form and ask the backend to send a signup code.
    ///
    /// # Errors
    /// Returns a validation error before any call, or the backend failure.
    #[tracing::instrument(skip_all, fields(email = %request.email))]
    pub async fn signup(&self, request: SignupRequest) -> Result<MessageResponse, ApiError> {
        let request = SignupRequest {
            email: validate::email(&request.email)?,
            first_name: validate::require("first_name", &request.first_name)?.to_string(),
            last_name: validate::require("last_name", &request.last_name)?.to_string(),
            ..request
        };
        validate::password_pair(&request.password, &request.confirm_password)?;
        validate::password_strength(&request.password)?;

        let body = json!(request);
        let operation = self.client.call_as::<MessageResponse>(
            Method::POST,
            "/auth/signup/request-otp",
            Some(&body),
            RequestOptions::default(),
        );
        self.client
            .session()
            .run(SessionOp::Signup, operation, |_| SessionOutcome::Unchanged)
            .await
            .inspect_err(|err| log_failure("signup", err))
    }

    /// Verify a signup code.
    ///
    /// # Errors
    /// Returns the backend failure.
    #[tracing::instrument(skip_all, fields(email = %email))]
    pub async fn verify_signup(
        &self,
        email: &str,
        code: &str,
    ) -> Result<MessageResponse, ApiError> {
        let body = json!({ "email": email, "otp_code": code });
        self.client
            .call_as(
                Method::POST,
                "/auth/signup/verify-otp",
                Some(&body),
                RequestOptions::default(),
            )
            .await
            .inspect_err(|err| log_failure("verify_signup", err))
    }

    /// Ask for a new signup code.
    ///
    /// # Errors
    /// Returns the backend failure; limit and missing-token failures are classified accordingly.
    #[tracing::instrument(skip_all, fields(email = %email))]
    pub async fn resend_signup(&self, email: &str) -> Result<ResendResponse, ApiError> {
        let body = json!({ "email": email });
        self.client
            .call_as(
                Method::POST,
                "/auth/signup/resend-otp",
                Some(&body),
                RequestOptions::default(),
            )
            .await
            .inspect_err(|err| log_failure("resend_signup", err))
    }

    /// Sign in and load the profile of the signed-in user.
    ///
    /// # Errors
    /// Returns a validation error before any call, or the backend failure.
    #[tracing::instrument(skip_all, fields(email = %email))]
    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile, ApiError> {
        let email = validate::email(email)?;
        validate::require("password", password)?;

        let body = json!({ "email": email, "password": password });
        let client = &self.client;
        let operation = async move {
            client
                .call(Method::POST, "/auth/login", Some(&body), RequestOptions::default())
                .await?;
            fetch_profile(client).await
        };
        let profile = self
            .client
            .session()
            .run(SessionOp::Login, operation, |profile| {
                SessionOutcome::SignedIn(profile.session_user())
            })
            .await
            .inspect_err(|err| log_failure("login", err))?;
        tracing::info!(user_id = %profile.id, "signed in");
        Ok(profile)
    }

    /// Sign out and drop local credentials.
    ///
    /// Local state is always cleared; a backend failure is logged and
    /// otherwise ignored.
    #[tracing::instrument(skip_all)]
    pub async fn logout(&self) {
        let client = &self.client;
        let operation = async move {
            if let Err(err) = client
                .call(Method::POST, "/auth/logout", None, RequestOptions::default())
                .await
            {
                log_failure("logout", &err);
            }
            client.clear_credentials();
            Ok::<_, ApiError>(())
        };
        let _ = self
            .client
            .session()
            .run(SessionOp::Logout, operation, |_| SessionOutcome::SignedOut)
            .await;
        tracing::info!("signed out");
    }

    /// Refresh the access token.
    ///
    /// # Errors
    /// Returns the backend failure; a 401 also resets the session.
    #[tracing::instrument(skip_all)]
    pub async fn refresh(&self) -> Result<(), ApiError> {
        let operation = async {
            self.client
                .call(Method::POST, "/auth/refresh", None, RequestOptions::default())
                .await
                .map(|_| ())
        };
        self.client
            .session()
            .run(SessionOp::Refresh, operation, |_| SessionOutcome::Unchanged)
            .await
            .inspect_err(|err| log_failure("refresh", err))
    }

    /// Establish the session at start-up from stored credentials.
    ///
    /// Without credentials the session is settled as signed out without a
    /// network call.
    ///
    /// # Errors
    /// Returns the backend failure; the session is left signed out.
    #[tracing::instrument(skip_all)]
    pub async fn bootstrap(&self) -> Result<Option<UserProfile>, ApiError> {
        let client = &self.client;
        let operation = async move {
            if !client.has_credentials() {
                return Ok(None);
            }
            fetch_profile(client).await.map(Some)
        };
        self.client
            .session()
            .run(SessionOp::Bootstrap, operation, |profile| {
                profile.as_ref().map_or(SessionOutcome::SignedOut, |profile| {
                    SessionOutcome::SignedIn(profile.session_user())
                })
            })
            .await
            .inspect_err(|err| log_failure("bootstrap", err))
    }

    /// Email a password-reset token.
    ///
    /// # Errors
    /// Returns a validation error before any call, or the backend failure.
    #[tracing::instrument(skip_all, fields(email = %email))]
    pub async fn request_password_reset(&self, email: &str) -> Result<MessageResponse, ApiError> {
        let body = json!({ "email": validate::email(email)? });
        self.client
            .call_as(
                Method::POST,
                "/auth/reset-password-token",
                Some(&body),
                RequestOptions::default(),
            )
            .await
            .inspect_err(|err| log_failure("request_password_reset", err))
    }

    /// Set a new password with a reset token.
    ///
    /// # Errors
    /// Returns a validation error before any call, or the backend failure.
    #[tracing::instrument(skip_all)]
    pub async fn reset_password(
        &self,
        token: &str,
        password: &str,
        confirmation: &str,
    ) -> Result<MessageResponse, ApiError> {
        let token = validate::require("token", token)?;
        validate::password_pair(password, confirmation)?;
        validate::password_strength(password)?;
        let body = json!({
            "token": token,
            "password": password,
            "confirm_password": confirmation,
        });
        self.client
            .call_as(
                Method::POST,
                "/auth/reset-password",
                Some(&body),
                RequestOptions::default(),
            )
            .await
            .inspect_err(|err| log_failure("reset_password", err))
    }

    /// Change the password of the signed-in user, then require a fresh sign-in.
    ///
    /// # Errors
    /// Returns a validation error before any call, or the backend failure.
    #[tracing::instrument(skip_all)]
    pub async fn change_password(
        &self,
        current: &str,
        new_password: &str,
        confirmation: &str,
    ) -> Result<MessageResponse, ApiError> {
        validate::require("old_password", current)?;
        validate::password_pair(new_password, confirmation)?;
        validate::password_strength(new_password)?;
        let body = json!({
            "user_id": self.client.session().user_id().unwrap_or_default(),
            "old_password": current,
            "new_password": new_password,
            "confirm_password": confirmation,
        });
        let response = self
            .client
            .call_as(
                Method::POST,
                "/auth/change-password",
                Some(&body),
                RequestOptions::default(),
            )
            .await
            .inspect_err(|err| log_failure("change_password", err))?;
        self.client.clear_credentials();
        self.client.session().force_logout();
        Ok(response)
    }
}
