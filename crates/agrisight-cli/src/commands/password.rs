use agrisight_core::Route;

use crate::cli::{ChangePasswordArgs, ForgotArgs, ResetArgs};
use crate::client::{AppContext, CliResult, resolve_secret};
use crate::output::next_step;

pub(crate) async fn handle_forgot(ctx: &AppContext, args: ForgotArgs) -> CliResult<()> {
    ctx.enter(Route::ForgotPassword).await?;
    ctx.app.auth().request_password_reset(&args.email).await?;
    println!("if an account exists for {}, a reset link was sent", args.email.trim());
    println!("next: {}", next_step(Route::ResetPassword));
    Ok(())
}

pub(crate) async fn handle_reset(ctx: &AppContext, args: ResetArgs) -> CliResult<()> {
    ctx.enter(Route::ResetPassword).await?;
    let (password, confirmation) = new_secret(args.password)?;
    ctx.app
        .auth()
        .reset_password(&args.token, &password, &confirmation)
        .await?;
    println!("password reset");
    println!("next: {}", next_step(Route::Login));
    Ok(())
}

pub(crate) async fn handle_change(ctx: &AppContext, args: ChangePasswordArgs) -> CliResult<()> {
    ctx.enter(Route::Profile).await?;
    let current = resolve_secret(args.current, "current password")?;
    let (new_password, confirmation) = new_secret(args.new)?;
    ctx.app
        .auth()
        .change_password(&current, &new_password, &confirmation)
        .await?;
    println!("password changed; please sign in again");
    println!("next: {}", next_step(Route::Login));
    Ok(())
}

/// A new password and its confirmation; a flag value counts as confirmed.
fn new_secret(value: Option<String>) -> CliResult<(String, String)> {
    if let Some(value) = value {
        let password = resolve_secret(Some(value), "new password")?;
        return Ok((password.clone(), password));
    }
    let password = resolve_secret(None, "new password")?;
    let confirmation = resolve_secret(None, "confirm new password")?;
    Ok((password, confirmation))
}
