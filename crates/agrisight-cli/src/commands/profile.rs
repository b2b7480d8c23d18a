use agrisight_core::Route;

use crate::cli::{DeleteAccountArgs, FarmSizeArgs, FileArgs, SetNameArgs};
use crate::client::{AppContext, CliResult, read_image, resolve_secret};
use crate::output::render_profile;

pub(crate) async fn handle_show(ctx: &AppContext) -> CliResult<()> {
    ctx.enter(Route::Profile).await?;
    let profile = ctx.app.profile().profile().await?;
    render_profile(&profile, ctx.output)
}

pub(crate) async fn handle_set_name(ctx: &AppContext, args: SetNameArgs) -> CliResult<()> {
    ctx.enter(Route::Profile).await?;
    ctx.app
        .profile()
        .update_name(args.first_name.as_deref(), args.last_name.as_deref())
        .await?;
    println!("name updated");
    Ok(())
}

pub(crate) async fn handle_avatar(ctx: &AppContext, args: FileArgs) -> CliResult<()> {
    ctx.enter(Route::Profile).await?;
    let upload = read_image(&args.file)?;
    match ctx.app.profile().update_avatar(upload).await? {
        Some(url) => println!("profile picture updated: {url}"),
        None => println!("profile picture updated"),
    }
    Ok(())
}

pub(crate) async fn handle_farm_size(ctx: &AppContext, args: FarmSizeArgs) -> CliResult<()> {
    ctx.enter(Route::Profile).await?;
    ctx.app.profile().update_farm_size(&args.size).await?;
    println!("farm size updated");
    Ok(())
}

pub(crate) async fn handle_delete(ctx: &AppContext, args: DeleteAccountArgs) -> CliResult<()> {
    ctx.enter(Route::Profile).await?;
    let password = resolve_secret(args.password, "password")?;
    ctx.app
        .profile()
        .delete_account(&password, &args.confirm)
        .await?;
    println!("account deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    use crate::client::CliError;
    use crate::client::test_support::context;

    async fn signed_in(server: &MockServer, dir: &std::path::Path) -> AppContext {
        server.mock(|when, then| {
            when.method(POST).path("/auth/login");
            then.status(200)
                .header("set-cookie", "access_token=tok-1; Path=/")
                .json_body(json!({}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/profile/users");
            then.status(200).json_body(json!({
                "id": "u-1",
                "email": "grower@farm.io",
                "first_name": "Ada",
                "farm_size": "12"
            }));
        });
        let ctx = context(server, dir);
        ctx.app
            .auth()
            .login("grower@farm.io", "Harvest2024")
            .await
            .expect("login succeeds");
        ctx
    }

    #[tokio::test]
    async fn set_name_sends_given_parts_and_rejects_blank_input() {
        let server = MockServer::start_async().await;
        let update = server.mock(|when, then| {
            when.method(PUT).path("/profile/update-name").json_body(json!({
                "user_id": "u-1",
                "first_name": null,
                "last_name": "Okafor"
            }));
            then.status(200).json_body(json!({"message": "updated"}));
        });
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = signed_in(&server, dir.path()).await;

        handle_set_name(
            &ctx,
            SetNameArgs {
                first_name: None,
                last_name: Some("Okafor".to_string()),
            },
        )
        .await
        .expect("name updated");
        update.assert();

        let err = handle_set_name(
            &ctx,
            SetNameArgs {
                first_name: Some("  ".to_string()),
                last_name: None,
            },
        )
        .await
        .expect_err("blank name");
        assert!(matches!(err, CliError::Validation(_)));
        assert_eq!(update.hits(), 1);
    }

    #[tokio::test]
    async fn avatar_upload_updates_session_picture() {
        let server = MockServer::start_async().await;
        let upload = server.mock(|when, then| {
            when.method(PUT).path("/profile/update-profile-picture");
            then.status(200)
                .json_body(json!({"profile_pic_url": "https://cdn.test/u-1.png"}));
        });
        let dir = tempfile::tempdir().expect("tempdir");
        let image = dir.path().join("leaf.png");
        std::fs::write(&image, [0x89, b'P', b'N', b'G']).expect("write image");
        let ctx = signed_in(&server, dir.path()).await;

        handle_avatar(&ctx, FileArgs { file: image })
            .await
            .expect("avatar uploaded");
        upload.assert();
        let url = ctx
            .app
            .session()
            .snapshot()
            .user()
            .and_then(|user| user.profile_pic_url.clone());
        assert_eq!(url.as_deref(), Some("https://cdn.test/u-1.png"));
    }

    #[tokio::test]
    async fn delete_requires_typed_confirmation() {
        let server = MockServer::start_async().await;
        let delete = server.mock(|when, then| {
            when.method(DELETE)
                .path("/profile/delete-account")
                .json_body(json!({"user_id": "u-1", "password": "Harvest2024"}));
            then.status(200).json_body(json!({"message": "deleted"}));
        });
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = signed_in(&server, dir.path()).await;

        let err = handle_delete(
            &ctx,
            DeleteAccountArgs {
                confirm: "delete".to_string(),
                password: Some("Harvest2024".to_string()),
            },
        )
        .await
        .expect_err("lowercase confirmation");
        assert!(matches!(err, CliError::Validation(message) if message.contains("DELETE")));
        assert_eq!(delete.hits(), 0);

        handle_delete(
            &ctx,
            DeleteAccountArgs {
                confirm: "DELETE".to_string(),
                password: Some("Harvest2024".to_string()),
            },
        )
        .await
        .expect("account deleted");
        delete.assert();
        assert!(!ctx.app.session().is_authenticated());
        assert!(!ctx.app.client().has_credentials());
    }
}
