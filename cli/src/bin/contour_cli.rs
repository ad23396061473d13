use clap::{Parser, Subcommand};
use cli::StudyManifest;
use color_eyre::eyre::{Result, WrapErr};
use polar_contour::{
    ContourConfig, ThresholdDetector, TwoPassTracer, detect_all, reports, trace_all, trace_detected,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Trace every slice of a manifest and write a JSON report
    Trace {
        /// Path to the TOML or JSON slice manifest
        #[arg(short, long)]
        manifest: PathBuf,
        /// Path to a TOML or JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Override a configuration value, e.g. `-D smooth2=20`
        #[arg(short = 'D', value_name = "KEY=VALUE")]
        overrides: Vec<String>,
        /// Run the threshold detector at this level instead of reading
        /// probability maps
        #[arg(long)]
        detector_level: Option<f32>,
        /// Report path; printed to stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the JSON schema of the configuration
    Schema {
        /// Print the manifest schema instead
        #[arg(long)]
        manifest: bool,
    },
    /// Print the default configuration as TOML
    Defaults,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Trace {
            manifest,
            config,
            overrides,
            detector_level,
            output,
        } => {
            trace(manifest, config.as_deref(), overrides, *detector_level, output.as_deref())?;
        }
        Commands::Schema { manifest } => {
            let schema = if *manifest {
                serde_json::to_string_pretty(&schemars::schema_for!(StudyManifest))?
            } else {
                serde_json::to_string_pretty(&ContourConfig::schema())?
            };
            println!("{schema}");
        }
        Commands::Defaults => {
            println!("{}", ContourConfig::default().to_toml()?);
        }
    }

    Ok(())
}

fn trace(
    manifest_path: &Path,
    config_path: Option<&Path>,
    overrides: &[String],
    detector_level: Option<f32>,
    output: Option<&Path>,
) -> Result<()> {
    let config = match config_path {
        Some(path) => ContourConfig::from_file(path).wrap_err_with(|| format!("loading config {path:?}"))?,
        None => ContourConfig::default(),
    }
    .with_overrides(overrides)?;
    info!(mode = %config.threshold_mode(), extend = config.extend, "configuration ready");

    let manifest =
        StudyManifest::from_file(manifest_path).wrap_err_with(|| format!("loading manifest {manifest_path:?}"))?;
    let mut slices = manifest.load_slices()?;
    info!(slices = slices.len(), rows = manifest.rows, cols = manifest.cols, "slices loaded");

    let tracer = TwoPassTracer::new(config);
    let results = match detector_level.or(manifest.detector_level) {
        Some(level) => {
            let detected = detect_all(&mut slices, || ThresholdDetector { level, high: 255.0 });
            trace_detected(&mut slices, detected, &tracer)
        }
        None => trace_all(&mut slices, &tracer),
    };
    let failed = results.iter().filter(|r| r.is_err()).count();
    let reports = reports(&slices, &results);
    let json = serde_json::to_string_pretty(&reports)?;

    match output {
        Some(path) => {
            std::fs::write(path, json)?;
            info!("Report saved to: {:?}", path);
        }
        None => println!("{json}"),
    }
    if failed > 0 {
        warn!(failed, total = slices.len(), "some slices failed");
    } else {
        info!(total = slices.len(), "all slices traced");
    }
    Ok(())
}
