use agrisight_core::{OtpPurpose, OtpTarget, Route, validate};

use crate::cli::{CodeArgs, EmailChangeArgs};
use crate::client::{AppContext, CliError, CliResult, resolve_secret};
use crate::commands::{parse_code, resume_flow};
use crate::output::{next_step, render_report};

pub(crate) async fn handle_change(ctx: &AppContext, args: EmailChangeArgs) -> CliResult<()> {
    ctx.enter(Route::Profile).await?;
    let new_email =
        validate::email(&args.new_email).map_err(|err| CliError::validation(err.to_string()))?;
    let old_email = ctx
        .app
        .session()
        .snapshot()
        .user()
        .and_then(|user| user.email.clone())
        .ok_or_else(|| CliError::validation("the signed-in account has no email address"))?;
    if old_email.eq_ignore_ascii_case(&new_email) {
        return Err(CliError::validation(format!(
            "{new_email} is already the account email"
        )));
    }
    let password = resolve_secret(args.password, "current password")?;

    let mut flow = ctx.app.email_change_flow();
    let profile = ctx.app.profile().clone();
    let target = OtpTarget::EmailChange {
        old_email: old_email.clone(),
        new_email: new_email.clone(),
    };
    let report = flow
        .start(target, async move {
            profile.request_email_change(&new_email, &password).await?;
            profile
                .create_email_change_token(&old_email, &new_email)
                .await
                .map(drop)
        })
        .await?;
    render_report(&report)?;
    println!("next: {}", next_step(Route::VerifyEmailChange));
    Ok(())
}

pub(crate) async fn handle_verify(ctx: &AppContext, args: CodeArgs) -> CliResult<()> {
    ctx.enter(Route::VerifyEmailChange).await?;
    let code = parse_code(&args.code)?;
    let mut flow = resume_flow(ctx, OtpPurpose::EmailChange)?;
    let report = flow.submit(&code).await?;
    render_report(&report)
}

pub(crate) async fn handle_resend(ctx: &AppContext) -> CliResult<()> {
    ctx.enter(Route::VerifyEmailChange).await?;
    let mut flow = resume_flow(ctx, OtpPurpose::EmailChange)?;
    let report = flow.resend().await?;
    render_report(&report)
}

pub(crate) async fn handle_cancel(ctx: &AppContext) -> CliResult<()> {
    let mut flow = resume_flow(ctx, OtpPurpose::EmailChange)?;
    let report = flow.cancel().await?;
    render_report(&report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agrisight_core::OtpChallenge;
    use httpmock::prelude::*;
    use serde_json::json;

    use crate::client::test_support::context;

    fn signed_in_backend(server: &MockServer) {
        server.mock(|when, then| {
            when.method(POST).path("/auth/login");
            then.status(200)
                .header("set-cookie", "access_token=tok-1; Path=/")
                .json_body(json!({}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/profile/users");
            then.status(200)
                .json_body(json!({"id": "u-1", "email": "old@farm.io"}));
        });
    }

    async fn signed_in(server: &MockServer, dir: &std::path::Path) -> AppContext {
        let ctx = context(server, dir);
        ctx.app
            .auth()
            .login("old@farm.io", "Harvest2024")
            .await
            .expect("login succeeds");
        ctx
    }

    fn change_args(new_email: &str) -> EmailChangeArgs {
        EmailChangeArgs {
            new_email: new_email.to_string(),
            password: Some("Harvest2024".to_string()),
        }
    }

    #[tokio::test]
    async fn change_then_verify_in_later_invocation() {
        let server = MockServer::start_async().await;
        signed_in_backend(&server);
        let request = server.mock(|when, then| {
            when.method(POST)
                .path("/profile/request-email-change")
                .json_body(json!({
                    "user_id": "u-1",
                    "new_email": "new@farm.io",
                    "current_password": "Harvest2024"
                }));
            then.status(200).json_body(json!({"message": "ok"}));
        });
        let token = server.mock(|when, then| {
            when.method(POST)
                .path("/auth/otp-token")
                .json_body(json!({"email": "old@farm.io", "new_email": "new@farm.io"}));
            then.status(200).json_body(json!({"message": "sent"}));
        });
        let confirm = server.mock(|when, then| {
            when.method(POST)
                .path("/profile/confirm-email-change")
                .json_body(json!({
                    "user_id": "u-1",
                    "otp_code": "135790",
                    "new_email": "new@farm.io",
                    "old_email": "old@farm.io"
                }));
            then.status(200).json_body(json!({"message": "changed"}));
        });
        let dir = tempfile::tempdir().expect("tempdir");

        let first = signed_in(&server, dir.path()).await;
        handle_change(&first, change_args("new@farm.io"))
            .await
            .expect("change starts");
        request.assert();
        token.assert();
        drop(first);

        let second = context(&server, dir.path());
        handle_verify(
            &second,
            CodeArgs {
                code: "135 790".to_string(),
            },
        )
        .await
        .expect("code accepted");
        confirm.assert();
        let email = second
            .app
            .session()
            .snapshot()
            .user()
            .and_then(|user| user.email.clone());
        assert_eq!(email.as_deref(), Some("new@farm.io"));
        let pending = second
            .app
            .store()
            .with(|store| OtpChallenge::load(store, OtpPurpose::EmailChange))
            .expect("store readable");
        assert!(pending.is_none());
    }

    #[tokio::test]
    async fn rejected_password_leaves_nothing_pending() {
        let server = MockServer::start_async().await;
        signed_in_backend(&server);
        server.mock(|when, then| {
            when.method(POST).path("/profile/request-email-change");
            then.status(400)
                .json_body(json!({"detail": "Current password is incorrect"}));
        });
        let token = server.mock(|when, then| {
            when.method(POST).path("/auth/otp-token");
            then.status(200);
        });
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = signed_in(&server, dir.path()).await;

        let err = handle_change(&ctx, change_args("new@farm.io"))
            .await
            .expect_err("request rejected");
        assert_eq!(err.exit_code(), 2);
        assert_eq!(err.display_message(), "Current password is incorrect");
        assert_eq!(token.hits(), 0);
        let err = handle_verify(
            &ctx,
            CodeArgs {
                code: "135790".to_string(),
            },
        )
        .await
        .expect_err("nothing to verify");
        assert!(matches!(err, CliError::Validation(message) if message.contains("email change")));
    }

    #[tokio::test]
    async fn same_address_is_refused_locally() {
        let server = MockServer::start_async().await;
        signed_in_backend(&server);
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = signed_in(&server, dir.path()).await;

        let err = handle_change(&ctx, change_args("OLD@farm.io"))
            .await
            .expect_err("same address");
        assert_eq!(err.exit_code(), 2);
    }
}
