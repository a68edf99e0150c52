use datahub_live::cli::output::{LiveOutput, LiveStatus};
use datahub_live::cli::{self, commands, ux, Parser};
use datahub_live::{HttpJobClient, LiveConfig, SharedClient};

use anyhow::Context;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;


async fn run_command(args: cli::Cli) -> anyhow::Result<serde_json::Value> {
    let headers: HashMap<String, String> = args.headers.into_iter().collect();
    let client: SharedClient = Arc::new(
        HttpJobClient::new(&args.url, &headers).context("Failed to set up the HTTP client")?
    );

    match args.command {
        cli::Commands::Query { sql, window, limit, retries } => {
            commands::query(
                client,
                &sql,
                window.offset,
                limit,
                window.timeout_ms.map(Duration::from_millis),
                retries,
            ).await
        }
        cli::Commands::Status { job_id } => {
            commands::status(client, &job_id).await
        }
        cli::Commands::Cancel { job_id } => {
            commands::cancel(client, &job_id).await
        }
        cli::Commands::Watch { sql, window, refresh_ms, page_size, refreshes } => {
            let config = LiveConfig {
                refresh_period: Duration::from_millis(refresh_ms),
                page_size,
                timeout: window.timeout_ms.map(Duration::from_millis),
                ..LiveConfig::new(sql)
            };
            commands::watch(client, config, window.offset, refreshes).await
        }
    }
}


/// Entry point for the datahub-live CLI.
///
/// - `query`: run a query once and print a window of its results.
/// - `status`: show the state of a query job.
/// - `cancel`: request cancellation of a query job.
/// - `watch`: re-run a query periodically, keeping a window of rows loaded.
#[tokio::main]
async fn main() {
    let args: cli::Cli = cli::Cli::parse();

    if let Err(error) = ux::setup_logging(args.verbose, args.quiet, args.json) {
        eprintln!("Failed to set up logging: {error}");
    }

    let json = args.json;
    let command = args.command.to_string();
    let result = LiveOutput::from_result(command, run_command(args).await);

    if json {
        match serde_json::to_string_pretty(&result) {
            Ok(text) => println!("{text}"),
            Err(error) => eprintln!("Failed to serialize output: {error}"),
        }
    } else {
        ux::render_human_output(&result);
    }

    if let LiveStatus::Error = result.status {
        std::process::exit(1);
    }
}
