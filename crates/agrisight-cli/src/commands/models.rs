use agrisight_core::Route;

use crate::cli::ModelsArgs;
use crate::client::{AppContext, CliResult};
use crate::output::render_models;

pub(crate) async fn handle_models(ctx: &AppContext, args: ModelsArgs) -> CliResult<()> {
    ctx.enter(Route::Upload).await?;
    let models = ctx
        .app
        .models()
        .list(args.status.as_deref(), args.model_type.as_deref())
        .await?;
    render_models(&models, ctx.output)
}
