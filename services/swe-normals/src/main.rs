//! SWE percent-of-normal generator.
//!
//! Prompts for a target year and month, then for each configured dataset
//! family (regional SNODAS and global Copernicus by default):
//! - Opens the family's Zarr store in Azure Blob storage
//! - Averages the historical first-of-month grids into a monthly normal
//! - Divides the target month by the normal
//! - Writes `{family}_prcnt_of_norm_{mon}_{year}.tif`
//!
//! Exit status is 0 when every family succeeded, 1 when any failed and 2 for
//! invalid input or configuration.

mod config;
mod pipeline;
mod prompt;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use grid_processor::{GeoTiffWriter, ZarrDatasetAccessor};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use config::{FileConfig, PipelineConfig};
use prompt::InputResolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "swe-normals")]
#[command(about = "Compute SWE percent-of-normal rasters for a target month")]
struct Args {
    /// YAML configuration replacing the built-in dataset families
    #[arg(long, env = "SWE_NORMALS_CONFIG")]
    config: Option<PathBuf>,

    /// Directory the rasters are written to
    #[arg(long, env = "SWE_NORMALS_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,
}

const EXIT_FAILURE: u8 = 1;
const EXIT_INVALID: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    if let Err(e) = init_tracing(&args) {
        eprintln!("Failed to initialise logging: {e}");
        return ExitCode::from(EXIT_FAILURE);
    }

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Run aborted");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn init_tracing(args: &Args) -> Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so the prompts on stdout stay readable.
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr);

    match args.log_format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish())?,
    }
    Ok(())
}

async fn run(args: Args) -> Result<ExitCode> {
    let file = match &args.config {
        Some(path) => match FileConfig::load(path) {
            Ok(file) => file,
            Err(e) => {
                error!(error = %format!("{e:#}"), "Invalid configuration");
                return Ok(ExitCode::from(EXIT_INVALID));
            }
        },
        None => FileConfig::default(),
    };

    let config = match PipelineConfig::resolve(file, args.output_dir.clone(), |key| {
        std::env::var(key).ok()
    }) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Ok(ExitCode::from(EXIT_INVALID));
        }
    };

    let today = chrono::Local::now().date_naive();
    let stdin = std::io::stdin();
    let period = match InputResolver::new(stdin.lock(), std::io::stdout(), today).resolve() {
        Ok(period) => period,
        Err(e) => {
            error!(kind = e.kind(), error = %e, "Invalid input");
            println!("Exiting due to invalid input.");
            return Ok(ExitCode::from(EXIT_INVALID));
        }
    };

    info!(
        period = %period,
        families = config.families.len(),
        output_dir = %config.output_dir.display(),
        "Starting percent-of-normal run"
    );

    let report = pipeline::run_all(&config, &period, &ZarrDatasetAccessor, &GeoTiffWriter::new()).await;

    if report.all_succeeded() {
        info!("All dataset families completed");
        Ok(ExitCode::SUCCESS)
    } else {
        for (family, e) in report.failures() {
            error!(dataset = family, kind = e.kind(), "Dataset family did not produce a raster");
        }
        Ok(ExitCode::from(EXIT_FAILURE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["swe-normals"]);
        assert_eq!(args.output_dir, PathBuf::from("."));
        assert_eq!(args.log_level, "info");
        assert_eq!(args.log_format, LogFormat::Text);
    }

    #[test]
    fn test_args_overrides() {
        let args = Args::parse_from([
            "swe-normals",
            "--config",
            "config/swe-normals.yaml",
            "--output-dir",
            "/tmp/out",
            "--log-format",
            "json",
        ]);
        assert_eq!(args.config, Some(PathBuf::from("config/swe-normals.yaml")));
        assert_eq!(args.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(args.log_format, LogFormat::Json);
    }
}
