use agrisight_client::models::HistoryQuery;
use agrisight_core::{PredictionList, Route};

use crate::cli::{DeleteArgs, HistoryArgs, PredictArgs};
use crate::client::{AppContext, CliResult, read_image};
use crate::output::{render_prediction, render_predictions};

pub(crate) async fn handle_predict(ctx: &AppContext, args: PredictArgs) -> CliResult<()> {
    ctx.enter(Route::Upload).await?;
    let upload = read_image(&args.file)?;
    let prediction = ctx.app.predictions().predict(&args.model, upload).await?;
    render_prediction(&prediction, ctx.output)
}

pub(crate) async fn handle_history(ctx: &AppContext, args: HistoryArgs) -> CliResult<()> {
    ctx.enter(Route::History).await?;
    let query = HistoryQuery::page(args.page, args.per_page);
    let list = PredictionList::new(ctx.app.predictions().history(&query).await?);
    let shown = match args.search.as_deref() {
        Some(term) => list.search(term),
        None => list.items().iter().collect(),
    };
    render_predictions(&shown, ctx.output)
}

pub(crate) async fn handle_delete(ctx: &AppContext, args: DeleteArgs) -> CliResult<()> {
    ctx.enter(Route::History).await?;
    let query = HistoryQuery::page(args.page, args.per_page);
    let predictions = ctx.app.predictions();
    let mut list = PredictionList::new(predictions.history(&query).await?);
    if let Err(err) = predictions
        .delete_optimistic(&mut list, &args.id, &query)
        .await
    {
        tracing::debug!(remaining = list.len(), "history refreshed after failed delete");
        return Err(err.into());
    }
    println!("deleted {} ({} left on this page)", args.id, list.len());
    Ok(())
}
