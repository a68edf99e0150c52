pub mod commands;
pub mod output;
pub mod ux;

use crate::config::DEFAULT_PAGE_SIZE;
pub use clap::{Parser, Subcommand};


#[derive(Parser)]
#[command(name = "datahub-live", version, about = "Run SQL against a query job service and keep the results live.")]
pub struct Cli {
    #[arg(
        long,
        help = "Base URL of the query job API, e.g.:
    https://<tenant>/service/datahub/dremio/api/v3/\n",
        env = "DATAHUB_URL",
    )]
    pub url: String,

    #[arg(
        long = "header",
        value_name = "KEY=VALUE",
        value_parser = parse_header,
        value_delimiter = ',',
        help = "Extra header sent with every request, e.g. an authorization token. Repeatable.",
        env = "DATAHUB_HEADERS",
        hide_env_values = true
    )]
    pub headers: Vec<(String, String)>,

    #[arg(
        short,
        long,
        action = clap::ArgAction::Count,
        help = "Set level of verbosity. [default: INFO]\n\t-v: DEBUG\n\t-vv: TRACE\n--quiet takes precedence over --verbose."
    )]
    pub verbose: u8,

    #[arg(
        short,
        long,
        action = clap::ArgAction::SetTrue,
        help = "Disable all information logs (only ERROR level logs are shown).\n--quiet takes precedence over --verbose."
    )]
    pub quiet: bool,

    #[arg(
        long,
        action = clap::ArgAction::SetTrue,
        help = "Enable JSON output format. Human readable output is disabled when this flag is set."
    )]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Parser)]
pub struct WindowArgs {
    #[arg(
        long,
        default_value_t = 0,
        help = "Index of the first row to show.",
    )]
    pub offset: usize,

    #[arg(
        long,
        help = "Give up on a job that has not finished after this many milliseconds.\nThe job is cancelled.",
    )]
    pub timeout_ms: Option<u64>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run a query once and print a page of its results.")]
    Query {
        sql: String,

        #[command(flatten)]
        window: WindowArgs,

        #[arg(
            long,
            default_value_t = DEFAULT_PAGE_SIZE,
            help = "Number of rows to fetch.",
        )]
        limit: usize,

        #[arg(
            long,
            default_value_t = 0,
            help = "Run the query again this many times if it fails, backing off between attempts.",
        )]
        retries: u32,
    },

    #[command(about = "Show the state of a query job.")]
    Status {
        job_id: String,
    },

    #[command(about = "Request cancellation of a query job.")]
    Cancel {
        job_id: String,
    },

    #[command(about = "Re-run a query periodically and keep a window of its results loaded.
Runs until interrupted unless --refreshes is set.")]
    Watch {
        sql: String,

        #[command(flatten)]
        window: WindowArgs,

        #[arg(
            long,
            default_value_t = 60000,
            help = "Milliseconds between the starts of two refreshes. A refresh still running when the next one is due is cancelled.",
        )]
        refresh_ms: u64,

        #[arg(
            long,
            default_value_t = DEFAULT_PAGE_SIZE,
            help = "Number of rows in the visible window.",
        )]
        page_size: usize,

        #[arg(
            long,
            help = "Stop after this many refresh cycles.",
        )]
        refreshes: Option<usize>,
    },
}

impl std::fmt::Display for Commands {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Commands::Query { .. } => "query",
            Commands::Status { .. } => "status",
            Commands::Cancel { .. } => "cancel",
            Commands::Watch { .. } => "watch",
        };
        write!(f, "{name}")
    }
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("Expected KEY=VALUE, got '{raw}'")),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_and_headers() {
        let cli = Cli::try_parse_from([
            "datahub-live",
            "--url", "http://localhost:9047/api/v3/",
            "--header", "Authorization=Bearer abc",
            "--header", "X-Tenant=acme",
            "-vv",
            "status", "job-1",
        ]).unwrap();

        assert_eq!(cli.url, "http://localhost:9047/api/v3/");
        assert_eq!(
            cli.headers,
            vec![
                ("Authorization".to_string(), "Bearer abc".to_string()),
                ("X-Tenant".to_string(), "acme".to_string()),
            ]
        );
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.command.to_string(), "status");
    }

    #[test]
    fn watch_defaults() {
        let cli = Cli::try_parse_from(["datahub-live", "--url", "http://x/", "watch", "select 1"]).unwrap();

        match cli.command {
            Commands::Watch { sql, window, refresh_ms, page_size, refreshes } => {
                assert_eq!(sql, "select 1");
                assert_eq!(window.offset, 0);
                assert_eq!(window.timeout_ms, None);
                assert_eq!(refresh_ms, 60000);
                assert_eq!(page_size, DEFAULT_PAGE_SIZE);
                assert_eq!(refreshes, None);
            }
            _ => panic!("Expected the watch command"),
        }
    }

    #[test]
    fn malformed_header_is_rejected() {
        assert!(parse_header("no-separator").is_err());
        assert!(parse_header("=value").is_err());
        assert_eq!(parse_header("a=b=c").unwrap(), ("a".into(), "b=c".into()));
    }
}
