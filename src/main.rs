use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use sysops_report::analyzer::threshold::MethodKind;
use sysops_report::analyzer::Pipeline;
use sysops_report::config::{self, OutputFormat};
use sysops_report::ingest;
use sysops_report::recommend::RecommendationGenerator;
use sysops_report::report::Report;

#[derive(Parser, Debug)]
#[command(name = "sysops-report", about = "Server telemetry health report")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Telemetry CSV to analyze (overrides input.csv_path)
    #[arg(long)]
    csv: Option<String>,

    /// Threshold derivation method (overrides thresholds.method)
    #[arg(short, long, value_enum)]
    method: Option<MethodKind>,

    /// Output format (overrides report.format)
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Validate config and exit
    #[arg(long)]
    check: bool,

    /// Print version and exit
    #[arg(short, long)]
    version: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("sysops-report {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => config::Config::load(path)?,
        None => config::Config::default(),
    };
    if let Some(method) = cli.method {
        config.thresholds.method = method;
    }
    if let Some(format) = cli.format {
        config.report.format = format;
    }
    if let Some(csv) = cli.csv {
        config.input.csv_path = Some(csv);
    }

    let pipeline = Pipeline::new(&config).context("Invalid threshold configuration")?;

    if cli.check {
        println!("Configuration is valid.");
        return Ok(());
    }

    // Initialize logging
    init_logging(&config)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        hostname = %config.report.hostname,
        method = %pipeline.method(),
        "Starting analysis"
    );

    if let Err(e) = run(&config, &pipeline) {
        error!(error = %e, "Analysis failed");
        return Err(e);
    }

    Ok(())
}

fn init_logging(config: &config::Config) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new(&config.report.log_level)
        });

    // logs go to stderr so the report on stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

fn run(config: &config::Config, pipeline: &Pipeline) -> Result<()> {
    let path = config
        .input
        .csv_path
        .as_deref()
        .context("No input file: pass --csv or set input.csv_path")?;

    let dataset = ingest::load_csv(path, &config.input)?;
    let analysis = pipeline.run(&dataset);
    let recommendations = RecommendationGenerator::new(&config.analyzer).generate(&analysis);

    let report = Report::new(config.report.hostname.clone(), dataset.rows(), analysis, recommendations);
    match config.report.format {
        OutputFormat::Text => print!("{}", report.to_text()),
        OutputFormat::Json => println!("{}", report.to_json()?),
    }

    Ok(())
}
