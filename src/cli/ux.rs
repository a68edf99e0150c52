use crate::cli::output::{LiveOutput, LiveStatus};
use crate::model::{Field, Row};
use crate::view::ViewEvent;

use serde_json::Value;
use tracing::subscriber::SetGlobalDefaultError;


pub fn setup_logging(verbose: u8, quiet: bool, json: bool) -> Result<(), SetGlobalDefaultError> {
    if json {
        // Mute all logging if JSON output is enabled
        return tracing::subscriber::set_global_default(tracing::subscriber::NoSubscriber::default());
    }

    let level = if quiet {
        tracing::Level::ERROR
    } else { match verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    }};

    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(level)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
}


pub fn show_page(job_id: &str, row_count: u64, start: usize, schema: &[Field], rows: &[Row]) {
    let columns: Vec<String> = if schema.is_empty() {
        columns_of(rows)
    } else {
        schema.iter().map(|field| field.name.clone()).collect()
    };

    tracing::info!(
        "Job {}: rows {}..{} of {}\n{}",
        job_id,
        start,
        start + rows.len(),
        row_count,
        format_table(&columns, rows, start),
    );
}

pub fn show_view_event(event: &ViewEvent) {
    match event {
        ViewEvent::Reset { job_id, row_count } => {
            tracing::info!("Refreshed: job {} has {} rows", job_id, row_count);
        }
        ViewEvent::Rows { start, rows } => {
            tracing::info!("Loaded rows {}..{}\n{}", start, start + rows.len(), format_table(&columns_of(rows), rows, *start));
        }
        ViewEvent::Failed { message } => {
            tracing::warn!("Refresh failed: {}", message);
        }
    }
}

pub fn render_human_output(output: &LiveOutput<Value>) {
    match output.status {
        LiveStatus::Success => tracing::info!("{} finished successfully", output.command),
        LiveStatus::Error => {
            let message = output
                .error
                .as_ref()
                .and_then(|error| serde_json::to_value(error).ok())
                .and_then(|error| error.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_default();
            eprintln!("{} failed: {}", output.command, message);
        }
    }
}


/// Every column name that appears in `rows`, once.
fn columns_of(rows: &[Row]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for key in rows.iter().flat_map(|row| row.keys()) {
        if !columns.contains(key) {
            columns.push(key.clone());
        }
    }
    columns
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

/// Plain text table with a leading row-number column.
fn format_table(columns: &[String], rows: &[Row], start: usize) -> String {
    let mut header = vec!["#".to_string()];
    header.extend(columns.iter().cloned());

    let body: Vec<Vec<String>> = rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut line = vec![(start + i).to_string()];
            line.extend(columns.iter().map(|column| cell_text(row.get(column))));
            line
        })
        .collect();

    let widths: Vec<usize> = (0..header.len())
        .map(|c| {
            body.iter()
                .map(|line| line[c].chars().count())
                .chain(std::iter::once(header[c].chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let render = |line: &[String]| -> String {
        line.iter()
            .zip(&widths)
            .map(|(text, &width)| format!("{text:<width$}"))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut output = render(&header);
    output.push('\n');
    output.push_str(&widths.iter().map(|width| "-".repeat(*width)).collect::<Vec<_>>().join("-+-"));
    for line in &body {
        output.push('\n');
        output.push_str(&render(line));
    }
    output
}
