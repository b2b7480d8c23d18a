//! Profile endpoints: details, name, avatar, farm size, email change and deletion.

use agrisight_core::validate;
use agrisight_core::{ApiError, SessionAction};
use reqwest::Method;
use serde_json::{Value, json};

use crate::http::{ApiClient, RequestOptions, Upload};
use crate::models::{MessageResponse, UserProfile};
use crate::services::log_failure;

pub(crate) async fn fetch_profile(client: &ApiClient) -> Result<UserProfile, ApiError> {
    client
        .call_as(Method::GET, "/profile/users", None, RequestOptions::default())
        .await
}

/// Profile management for the signed-in user.
#[derive(Clone, Debug)]
pub struct ProfileService {
    client: ApiClient,
}

impl ProfileService {
    /// Service over `client`.
    #[must_use]
    pub const fn new(client: ApiClient) -> Self {
        Self { client }
    }

    fn user_id(&self) -> String {
        self.client.session().user_id().unwrap_or_default()
    }

    /// Load the signed-in user's profile.
    ///
    /// # Errors
    /// Returns the backend failure.
    #[tracing::instrument(skip_all)]
    pub async fn profile(&self) -> Result<UserProfile, ApiError> {
        fetch_profile(&self.client)
            .await
            .inspect_err(|err| log_failure("profile", err))
    }

    /// Update first and last name.
    ///
    /// # Errors
    /// Returns a validation error when both names are blank, or the backend failure.
    #[tracing::instrument(skip_all)]
    pub async fn update_name(
        &self,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Result<MessageResponse, ApiError> {
        let first_name = first_name.map(str::trim).filter(|name| !name.is_empty());
        let last_name = last_name.map(str::trim).filter(|name| !name.is_empty());
        if first_name.is_none() && last_name.is_none() {
            return Err(agrisight_core::ValidationError::MissingField { field: "name" }.into());
        }
        let body = json!({
            "user_id": self.user_id(),
            "first_name": first_name,
            "last_name": last_name,
        });
        self.client
            .call_as(
                Method::PUT,
                "/profile/update-name",
                Some(&body),
                RequestOptions::default(),
            )
            .await
            .inspect_err(|err| log_failure("update_name", err))
    }

    /// Upload a new avatar and record its URL on the session.
    ///
    /// # Errors
    /// Returns the backend failure.
    #[tracing::instrument(skip_all, fields(file = %upload.file_name, bytes = upload.bytes.len()))]
    pub async fn update_avatar(&self, upload: Upload) -> Result<Option<String>, ApiError> {
        let response = self
            .client
            .upload(
                Method::PUT,
                "/profile/update-profile-picture",
                upload,
                RequestOptions::default(),
            )
            .await
            .inspect_err(|err| log_failure("update_avatar", err))?;
        let url = response
            .get("profile_pic_url")
            .and_then(Value::as_str)
            .map(str::to_string);
        if url.is_some() {
            self.client
                .session()
                .dispatch(SessionAction::AvatarChanged(url.clone()));
        }
        Ok(url)
    }

    /// Update the declared farm size.
    ///
    /// # Errors
    /// Returns a validation error for a blank value, or the backend failure.
    #[tracing::instrument(skip_all)]
    pub async fn update_farm_size(&self, farm_size: &str) -> Result<MessageResponse, ApiError> {
        let farm_size = validate::require("farm_size", farm_size)?;
        let body = json!({ "farm_size": farm_size });
        self.client
            .call_as(
                Method::PUT,
                "/profile/users/update-farm-size",
                Some(&body),
                RequestOptions::default(),
            )
            .await
            .inspect_err(|err| log_failure("update_farm_size", err))
    }

    /// Ask the backend to start an email change, proving the current password.
    ///
    /// # Errors
    /// Returns a validation error before any call, or the backend failure.
    #[tracing::instrument(skip_all, fields(new_email = %new_email))]
    pub async fn request_email_change(
        &self,
        new_email: &str,
        current_password: &str,
    ) -> Result<MessageResponse, ApiError> {
        let new_email = validate::email(new_email)?;
        validate::require("current_password", current_password)?;
        let body = json!({
            "user_id": self.user_id(),
            "new_email": new_email,
            "current_password": current_password,
        });
        self.client
            .call_as(
                Method::POST,
                "/profile/request-email-change",
                Some(&body),
                RequestOptions::default(),
            )
            .await
            .inspect_err(|err| log_failure("request_email_change", err))
    }

    /// Create the OTP token that sends the email-change code.
    ///
    /// # Errors
    /// Returns the backend failure.
    #[tracing::instrument(skip_all, fields(new_email = %new_email))]
    pub async fn create_email_change_token(
        &self,
        old_email: &str,
        new_email: &str,
    ) -> Result<MessageResponse, ApiError> {
        let body = json!({ "email": old_email, "new_email": new_email });
        self.client
            .call_as(
                Method::POST,
                "/auth/otp-token",
                Some(&body),
                RequestOptions::default(),
            )
            .await
            .inspect_err(|err| log_failure("create_email_change_token", err))
    }

    /// Ask for a new email-change code.
    ///
    /// # Errors
    /// Returns the backend failure; 429 and 404 end the flow.
    #[tracing::instrument(skip_all)]
    pub async fn resend_email_change(&self) -> Result<crate::models::ResendResponse, ApiError> {
        self.client
            .call_as(
                Method::POST,
                "/auth/otp-token/resend-otp",
                None,
                RequestOptions::default(),
            )
            .await
            .inspect_err(|err| log_failure("resend_email_change", err))
    }

    /// Confirm an email change with the received code.
    ///
    /// # Errors
    /// Returns the backend failure.
    #[tracing::instrument(skip_all, fields(new_email = %new_email))]
    pub async fn confirm_email_change(
        &self,
        old_email: &str,
        new_email: &str,
        code: &str,
    ) -> Result<MessageResponse, ApiError> {
        let body = json!({
            "user_id": self.user_id(),
            "otp_code": code,
            "new_email": new_email,
            "old_email": old_email,
        });
        self.client
            .call_as(
                Method::POST,
                "/profile/confirm-email-change",
                Some(&body),
                RequestOptions::default(),
            )
            .await
            .inspect_err(|err| log_failure("confirm_email_change", err))
    }

    /// Delete the account, then clear every piece of local state.
    ///
    /// # Errors
    /// Returns a validation error when the confirmation phrase or password is
    /// missing, or the backend failure.
    #[tracing::instrument(skip_all)]
    pub async fn delete_account(
        &self,
        password: &str,
        confirmation: &str,
    ) -> Result<MessageResponse, ApiError> {
        validate::delete_confirmation(confirmation)?;
        validate::require("password", password)?;
        let body = json!({ "user_id": self.user_id(), "password": password });
        let response = self
            .client
            .call_as(
                Method::DELETE,
                "/profile/delete-account",
                Some(&body),
                RequestOptions::default(),
            )
            .await
            .inspect_err(|err| log_failure("delete_account", err))?;
        if let Err(err) = self.client.store().with(|store| store.clear()) {
            tracing::warn!(error = %err, "failed to clear local state after account deletion");
        }
        self.client.clear_credentials();
        self.client.session().force_logout();
        tracing::info!("account deleted");
        Ok(response)
    }
}
