use agrisight_client::models::SignupRequest;
use agrisight_core::{OtpPurpose, OtpTarget, Route, validate};

use crate::cli::{CodeArgs, SignupArgs};
use crate::client::{AppContext, CliError, CliResult, resolve_secret};
use crate::commands::{parse_code, resume_flow};
use crate::output::{next_step, render_report};

pub(crate) async fn handle_signup(ctx: &AppContext, args: SignupArgs) -> CliResult<()> {
    ctx.enter(Route::Signup).await?;
    let email = validate::email(&args.email).map_err(|err| CliError::validation(err.to_string()))?;
    let password = resolve_secret(args.password, "password")?;
    let request = SignupRequest {
        email: email.clone(),
        first_name: args.first_name,
        last_name: args.last_name,
        confirm_password: password.clone(),
        password,
    };

    let mut flow = ctx.app.signup_flow();
    let auth = ctx.app.auth().clone();
    let report = flow
        .start(OtpTarget::Signup { email }, async move {
            auth.signup(request).await.map(drop)
        })
        .await?;
    render_report(&report)?;
    println!("next: {}", next_step(Route::VerifySignup));
    Ok(())
}

pub(crate) async fn handle_verify(ctx: &AppContext, args: CodeArgs) -> CliResult<()> {
    ctx.enter(Route::VerifySignup).await?;
    let code = parse_code(&args.code)?;
    let mut flow = resume_flow(ctx, OtpPurpose::Signup)?;
    let report = flow.submit(&code).await?;
    render_report(&report)
}

pub(crate) async fn handle_resend(ctx: &AppContext) -> CliResult<()> {
    ctx.enter(Route::VerifySignup).await?;
    let mut flow = resume_flow(ctx, OtpPurpose::Signup)?;
    let report = flow.resend().await?;
    render_report(&report)
}

pub(crate) async fn handle_cancel(ctx: &AppContext) -> CliResult<()> {
    let mut flow = resume_flow(ctx, OtpPurpose::Signup)?;
    let report = flow.cancel().await?;
    render_report(&report)
}
