//! argus-scan: run detection over a JSON request file and print a report.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use argus_detect::config::DetectionMode;
use argus_detect::formatters::{
    FormatterConfig, HumanFormatter, JsonFormatter, MarkdownFormatter, ResultFormatter,
};
use argus_detect::logging::setup::{init_logging, LoggingConfig};
use argus_detect::types::DetectionRequest;
use argus_ml::settings::build_engine;
use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Human,
    Markdown,
}

#[derive(Parser, Debug)]
#[command(name = "argus-scan", version, about = "Scan a time series for anomalies")]
struct Cli {
    /// Request file ({"timestamps": [...], "values": [...]}); reads stdin when omitted
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Detection mode: single or ensemble
    #[arg(long, env = "ARGUS_DETECTION_MODE", default_value = "ensemble")]
    mode: DetectionMode,

    /// JSON engine configuration; overrides --mode
    #[arg(long, env = "ARGUS_CONFIG")]
    config: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Human)]
    format: OutputFormat,

    /// Show at most this many anomalies in human and Markdown reports
    #[arg(long)]
    max_anomalies: Option<usize>,

    /// Include per-detector status in the report
    #[arg(long)]
    detectors: bool,

    #[arg(long)]
    no_color: bool,

    /// Log filter
    #[arg(long, env = "ARGUS_LOG_LEVEL", default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    init_logging(LoggingConfig::default().with_env_filter(cli.log_level.as_str()))
        .map_err(|e| anyhow::anyhow!("failed to initialise logging: {e}"))?;

    let raw = match &cli.input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            buf
        }
    };
    let request: DetectionRequest = match serde_json::from_str(&raw) {
        Ok(request) => request,
        Err(e) => {
            eprintln!("error: malformed request: {e}");
            return Ok(ExitCode::from(2));
        }
    };

    let engine = build_engine(cli.config.as_deref(), cli.mode, None)?;
    let result = match engine.detect(request).await {
        Ok(result) => result,
        Err(e) if e.is_client_error() => {
            eprintln!("error: {e}");
            return Ok(ExitCode::from(2));
        }
        Err(e) => return Err(e.into()),
    };

    let mut config = FormatterConfig::default()
        .with_detectors(cli.detectors)
        .with_colors(!cli.no_color);
    if let Some(max) = cli.max_anomalies {
        config = config.with_max_anomalies(max);
    }
    let report = match cli.format {
        OutputFormat::Json => JsonFormatter::with_config(config).format(&result)?,
        OutputFormat::Human => HumanFormatter::with_config(config).format(&result)?,
        OutputFormat::Markdown => MarkdownFormatter::with_config(config).format(&result)?,
    };
    println!("{report}");

    Ok(ExitCode::SUCCESS)
}
