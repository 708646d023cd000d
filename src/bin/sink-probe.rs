use std::path::PathBuf;

use clap::Parser;

use service_skeleton::config::load_config;
use service_skeleton::logstore::{LogRecord, LogSink, Severity};

#[derive(Parser)]
#[command(name = "sink-probe")]
#[command(about = "Send one record through the configured remote log sink", long_about = None)]
struct Cli {
    /// Service configuration file with a [log_store] section
    #[arg(short, long)]
    config: PathBuf,

    /// Message of the record
    #[arg(short, long)]
    message: String,

    /// Severity of the record
    #[arg(short, long, default_value = "info")]
    level: Severity,

    /// Extra `key=value` fields
    #[arg(short, long = "field", value_parser = parse_field)]
    fields: Vec<(String, String)>,
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    let store = config
        .log_store
        .ok_or("configuration has no [log_store] section")?;

    let sink = LogSink::connect(&store).await?;

    let mut record = LogRecord::new(cli.level, cli.message);
    for (key, value) in cli.fields {
        record.insert(key, value);
    }
    let report = match sink.fire(record).await {
        Some(report) => report,
        None => sink.flush(true).await.unwrap_or_default(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.discarded > 0 {
        std::process::exit(1);
    }
    Ok(())
}
