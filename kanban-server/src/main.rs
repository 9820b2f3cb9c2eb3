use anyhow::Result;
use clap::Parser;
use kanban_server::{serve, telemetry, Args};

#[tokio::main]
async fn main() -> Result<()> {
    // Connection defaults and PORT may live in a local env file.
    let _ = dotenvy::from_filename(".env.local");

    let args = Args::parse();
    telemetry::init_tracing(args.log_json);
    serve(&args).await
}
