//! Application context, error types, and input helpers for the CLI.

use std::fmt::{self, Display, Formatter};
use std::io::{self, IsTerminal};
use std::path::Path;

use agrisight_client::{AgriSight, FlowError, Upload};
use agrisight_core::routes::navigate;
use agrisight_core::{ApiError, ErrorKind, GuardDecision, Route, RouteAccess, StorageError};
use anyhow::{Context, anyhow};
use url::Url;

use crate::cli::OutputFormat;

/// Command failure: input the user can correct (exit 2) or anything else (exit 3).
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_message())
    }
}

impl std::error::Error for CliError {}

/// Classify a client error: anything the user can fix by changing input is a
/// validation failure.
impl From<ApiError> for CliError {
    fn from(error: ApiError) -> Self {
        match error.kind {
            ErrorKind::Validation
            | ErrorKind::Unauthorized
            | ErrorKind::LimitReached
            | ErrorKind::NotFound
            | ErrorKind::Business => Self::Validation(error.message),
            ErrorKind::Server | ErrorKind::Network | ErrorKind::Decode => {
                let detail = error.status.map_or_else(
                    || error.message.clone(),
                    |status| format!("{} (status {status})", error.message),
                );
                Self::Failure(anyhow!(detail))
            }
        }
    }
}

impl From<FlowError> for CliError {
    fn from(error: FlowError) -> Self {
        Self::failure(error)
    }
}

impl From<StorageError> for CliError {
    fn from(error: StorageError) -> Self {
        Self::failure(error)
    }
}

/// Connected client plus output preference, shared by every handler.
pub(crate) struct AppContext {
    pub(crate) app: AgriSight,
    pub(crate) output: OutputFormat,
}

impl AppContext {
    /// Settle the session and evaluate the guard for `route`.
    ///
    /// Signed-in users reaching an open screen and signed-out users reaching a
    /// private one are stopped with a hint; the attempted path is remembered
    /// so `login` can point back to it.
    pub(crate) async fn enter(&self, route: Route) -> CliResult<()> {
        if route.access() != RouteAccess::Public
            && let Err(err) = self.app.auth().bootstrap().await
            && route.access() == RouteAccess::Private
            && err.kind != ErrorKind::Unauthorized
        {
            return Err(err.into());
        }
        let session = self.app.session().snapshot();
        let decision = self
            .app
            .store()
            .with(|store| navigate(&session, route.path(), store))?;
        tracing::debug!(route = route.path(), ?decision, "guard evaluated");
        match decision {
            GuardDecision::Render => Ok(()),
            GuardDecision::Wait => Err(CliError::failure(anyhow!(
                "session is still loading; try again"
            ))),
            GuardDecision::Redirect { to, .. } if to == Route::Login.path() => {
                Err(CliError::validation(format!(
                    "{} requires a signed-in user; run `agrisight login` first",
                    route.path()
                )))
            }
            GuardDecision::Redirect { .. } => {
                let who = session
                    .user()
                    .and_then(|user| user.email.clone())
                    .unwrap_or_else(|| "another user".to_string());
                Err(CliError::validation(format!(
                    "already signed in as {who}; run `agrisight logout` first"
                )))
            }
        }
    }
}

/// Parse a URL flag.
pub(crate) fn parse_url(input: &str) -> Result<Url, String> {
    input
        .parse::<Url>()
        .map_err(|err| format!("invalid URL '{input}': {err}"))
}

/// Use `value` when given, otherwise prompt without echo on a terminal.
pub(crate) fn resolve_secret(value: Option<String>, prompt: &str) -> CliResult<String> {
    if let Some(value) = value {
        if value.is_empty() {
            return Err(CliError::validation(format!("{prompt} cannot be empty")));
        }
        return Ok(value);
    }

    if io::stdin().is_terminal() {
        let secret = rpassword::prompt_password(format!("{prompt}: ")).map_err(|err| {
            CliError::failure(anyhow!("failed to read {prompt} from stdin: {err}"))
        })?;
        if secret.is_empty() {
            return Err(CliError::validation(format!("{prompt} cannot be empty")));
        }
        Ok(secret)
    } else {
        Err(CliError::validation(format!(
            "{prompt} required; supply it via flag or environment when running non-interactively"
        )))
    }
}

/// Read an image from disk for upload.
pub(crate) fn read_image(path: &Path) -> CliResult<Upload> {
    let mime = match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => {
            return Err(CliError::validation(format!(
                "'{}' is not a JPEG, PNG or WebP image",
                path.display()
            )));
        }
    };
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read {}", path.display()))
        .map_err(CliError::failure)?;
    if bytes.is_empty() {
        return Err(CliError::validation(format!(
            "'{}' is empty",
            path.display()
        )));
    }
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload")
        .to_string();
    Ok(Upload {
        file_name,
        mime: Some(mime.to_string()),
        bytes,
    })
}


#[cfg(test)]
mod tests {
    use super::*;
    use agrisight_core::{HandoffKey, KeyValueStore};
    use httpmock::prelude::*;
    use serde_json::json;

    #[test]
    fn api_errors_map_to_exit_codes() {
        let validation: CliError = ApiError::from_response(422, "email is required").into();
        assert_eq!(validation.exit_code(), 2);
        assert_eq!(validation.display_message(), "email is required");

        let server: CliError = ApiError::from_response(502, "bad gateway").into();
        assert_eq!(server.exit_code(), 3);
        assert_eq!(server.display_message(), "bad gateway (status 502)");

        let network: CliError = ApiError::network("connection refused").into();
        assert_eq!(network.exit_code(), 3);
    }

    #[test]
    fn resolve_secret_prefers_flag_and_rejects_empty() {
        assert_eq!(
            resolve_secret(Some("Harvest2024".to_string()), "password").ok(),
            Some("Harvest2024".to_string())
        );
        assert!(matches!(
            resolve_secret(Some(String::new()), "password"),
            Err(CliError::Validation(_))
        ));
    }

    #[test]
    fn read_image_checks_extension_and_contents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let leaf = dir.path().join("leaf.JPG");
        std::fs::write(&leaf, [0xFF, 0xD8, 0xFF]).expect("write image");
        let upload = read_image(&leaf).expect("image reads");
        assert_eq!(upload.file_name, "leaf.JPG");
        assert_eq!(upload.mime.as_deref(), Some("image/jpeg"));

        let notes = dir.path().join("notes.txt");
        std::fs::write(&notes, "hello").expect("write text");
        assert!(matches!(read_image(&notes), Err(CliError::Validation(_))));

        let empty = dir.path().join("empty.png");
        std::fs::write(&empty, b"").expect("write empty");
        assert!(matches!(read_image(&empty), Err(CliError::Validation(_))));
    }

    #[tokio::test]
    async fn private_route_without_session_remembers_attempt() {
        let server = MockServer::start_async().await;
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = test_support::context(&server, dir.path());

        let err = ctx.enter(Route::History).await.expect_err("guard blocks");
        assert_eq!(err.exit_code(), 2);
        assert!(err.display_message().contains("agrisight login"));
        let saved = ctx
            .app
            .store()
            .with(|store| store.get_key(HandoffKey::RedirectAfterLogin));
        assert_eq!(saved.as_deref(), Some("/history"));
    }

    #[tokio::test]
    async fn open_route_for_signed_in_user_is_refused() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/auth/login");
            then.status(200)
                .header("set-cookie", "access_token=tok; Path=/")
                .json_body(json!({}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/profile/users");
            then.status(200)
                .json_body(json!({"id": "u-1", "email": "grower@farm.io"}));
        });
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = test_support::context(&server, dir.path());
        ctx.app
            .auth()
            .login("grower@farm.io", "Harvest2024")
            .await
            .expect("login succeeds");

        let err = ctx.enter(Route::Signup).await.expect_err("guard blocks");
        assert!(matches!(err, CliError::Validation(message) if message.contains("grower@farm.io")));
    }
}
