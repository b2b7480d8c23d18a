//! Command handlers grouped by screen.

pub(crate) mod auth;
pub(crate) mod email;
pub(crate) mod models;
pub(crate) mod password;
pub(crate) mod predictions;
pub(crate) mod profile;
pub(crate) mod signup;

use agrisight_client::{BackendTransport, OtpFlow};
use agrisight_core::{CodeInput, OtpPurpose};

use crate::client::{AppContext, CliError, CliResult};

/// Flow for `purpose` resumed from the state directory.
pub(crate) fn resume_flow(
    ctx: &AppContext,
    purpose: OtpPurpose,
) -> CliResult<OtpFlow<BackendTransport>> {
    let mut flow = match purpose {
        OtpPurpose::Signup => ctx.app.signup_flow(),
        OtpPurpose::EmailChange => ctx.app.email_change_flow(),
    };
    if flow.restore()? {
        return Ok(flow);
    }
    let hint = match purpose {
        OtpPurpose::Signup => "no signup is awaiting verification; run `agrisight signup` first",
        OtpPurpose::EmailChange => {
            "no email change is awaiting verification; run `agrisight email change` first"
        }
    };
    Err(CliError::validation(hint))
}

/// Normalize typed code input the way pasting into the code cells does.
pub(crate) fn parse_code(raw: &str) -> CliResult<String> {
    CodeInput::from_text(raw)
        .code()
        .map_err(|err| CliError::validation(err.to_string()))
}
