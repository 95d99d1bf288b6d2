use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use medscan::config::AppConfig;
use medscan::errors::error_logging;
use medscan::observability;
use medscan::pipeline::{analyze_with_timeout, ExtractedRecord, MedicineAnalyzer};
use medscan::OcrError;
use tracing::info;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    /// One compact JSON object per line
    Json,
    /// Indented JSON
    Pretty,
}

/// Extract structured fields from photos of medicine packaging
#[derive(Parser, Debug)]
#[command(name = "medscan", version, about)]
struct Cli {
    /// Output format for each record
    #[arg(long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Per-image timeout; defaults to ANALYSIS_TIMEOUT_SECS
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Image files to analyze, in order
    #[arg(required = true)]
    images: Vec<PathBuf>,
}

const EXIT_INVALID_INPUT: u8 = 1;
const EXIT_NO_TEXT: u8 = 2;

fn render(record: &ExtractedRecord, format: OutputFormat) -> Result<String> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string(record)?,
        OutputFormat::Pretty => serde_json::to_string_pretty(record)?,
    };
    Ok(rendered)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load environment variables from .env file first
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::from_env()?;
    if let Err(e) = config.validate() {
        error_logging::log_config_error(&e, "app_config", "startup_validation");
        return Err(anyhow::anyhow!("Configuration validation failed: {}", e));
    }
    observability::init_observability_with_config(&config.observability)?;
    info!("{}", config.summary());

    let analyzer = MedicineAnalyzer::from_config(&config)?;
    let timeout = Duration::from_secs(
        cli.timeout_secs
            .unwrap_or(config.pipeline.analysis_timeout_secs),
    );

    let mut exit = 0u8;
    for path in &cli.images {
        let display = path.display().to_string();
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                error_logging::log_filesystem_error(&e, "read_image", Some(&display), None);
                eprintln!("{}: cannot read file: {}", display, e);
                exit = exit.max(EXIT_INVALID_INPUT);
                continue;
            }
        };

        match analyze_with_timeout(&analyzer, &bytes, timeout).await {
            Ok(record) => println!("{}", render(&record, cli.format)?),
            Err(OcrError::NoTextExtracted) => {
                eprintln!(
                    "{}: could not extract text, retry with a clearer image",
                    display
                );
                exit = exit.max(EXIT_NO_TEXT);
            }
            Err(OcrError::Timeout(message)) => {
                eprintln!("{}: {}, retry with a clearer image", display, message);
                exit = exit.max(EXIT_NO_TEXT);
            }
            Err(e) => {
                eprintln!("{}: {}", display, e);
                exit = exit.max(EXIT_INVALID_INPUT);
            }
        }
    }

    Ok(ExitCode::from(exit))
}
