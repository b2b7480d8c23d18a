use agrisight_core::routes::navigate;
use agrisight_core::{GuardDecision, Route};

use crate::cli::LoginArgs;
use crate::client::{AppContext, CliResult, resolve_secret};
use crate::output::render_profile;

pub(crate) async fn handle_login(ctx: &AppContext, args: LoginArgs) -> CliResult<()> {
    ctx.enter(Route::Login).await?;
    let password = resolve_secret(args.password, "password")?;
    let profile = ctx.app.auth().login(&args.email, &password).await?;

    let session = ctx.app.session().snapshot();
    let decision = ctx
        .app
        .store()
        .with(|store| navigate(&session, Route::Login.path(), store))?;
    println!(
        "signed in as {}",
        profile.email.as_deref().unwrap_or(&profile.id)
    );
    if let GuardDecision::Redirect { to, .. } = decision
        && to != Route::Home.path()
    {
        println!("continue with: {to}");
    }
    Ok(())
}

pub(crate) async fn handle_logout(ctx: &AppContext) -> CliResult<()> {
    ctx.app.auth().logout().await;
    println!("signed out");
    Ok(())
}

pub(crate) async fn handle_whoami(ctx: &AppContext) -> CliResult<()> {
    ctx.enter(Route::Profile).await?;
    let profile = ctx.app.profile().profile().await?;
    render_profile(&profile, ctx.output)
}
