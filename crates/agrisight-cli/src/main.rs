//! Binary entrypoint for the AgriSight CLI.

use std::process;

#[tokio::main]
async fn main() {
    let exit_code = agrisight_cli::run().await;
    process::exit(exit_code);
}
