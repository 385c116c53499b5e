use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use carbon_ledger_core::{
    audit_source, render_report, AuditPolicy, CsvSource, DefaultScorer, FileCsvSource,
    OutputFormat, StdinCsvSource, SAMPLE_CSV,
};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

const ENV_PREFIX: &str = "CARBON_LEDGER";
const EXIT_BELOW_THRESHOLD: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "carbon-ledger",
    author,
    version,
    about = "CSRD emissions audit for supplier CSV exports"
)]
struct Cli {
    /// Configuration file (TOML, YAML or JSON) with a `policy` table
    #[arg(long = "config", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Audit a CSV export and print the compliance report
    Audit {
        /// CSV file to audit; reads stdin when omitted or `-`
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,

        /// Report format
        #[arg(long, value_enum, default_value_t = FormatArg::Human)]
        format: FormatArg,

        /// Exit with status 2 when the carbon-debt score is below SCORE
        #[arg(long = "fail-under", value_name = "SCORE")]
        fail_under: Option<u32>,
    },
    /// Print the bundled sample CSV
    Sample,
    /// Print the effective scoring policy as JSON
    Policy,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Human,
    Json,
    Csv,
}

impl From<FormatArg> for OutputFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Human => OutputFormat::Human,
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Csv => OutputFormat::Csv,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AppConfig {
    policy: AuditPolicy,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Audit {
            path,
            format,
            fail_under,
        } => {
            let config = load_config(cli.config.as_deref())?;
            run_audit(path, config.policy, format.into(), fail_under).await
        }
        Commands::Sample => {
            print!("{SAMPLE_CSV}");
            Ok(ExitCode::SUCCESS)
        }
        Commands::Policy => {
            let config = load_config(cli.config.as_deref())?;
            let scorer = DefaultScorer::new(config.policy);
            println!("{}", serde_json::to_string_pretty(scorer.policy())?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_audit(
    path: Option<PathBuf>,
    policy: AuditPolicy,
    format: OutputFormat,
    fail_under: Option<u32>,
) -> Result<ExitCode> {
    let source: Box<dyn CsvSource> = match path {
        Some(path) if path.as_os_str() != "-" => Box::new(FileCsvSource::new(path)),
        _ => Box::new(StdinCsvSource),
    };
    let scorer = DefaultScorer::new(policy);
    let report = audit_source(source.as_ref(), &scorer)
        .await
        .with_context(|| format!("audit of {} failed", source.label()))?;
    info!(
        source = %source.label(),
        carbon_debt = report.carbon_debt,
        violations = report.violations.len(),
        "audit finished"
    );

    print!("{}", render_report(&report, format)?);
    if matches!(format, OutputFormat::Json) {
        println!();
    }

    match fail_under {
        Some(threshold) if report.carbon_debt < threshold => {
            eprintln!(
                "carbon-debt score {} is below the required {}",
                report.carbon_debt, threshold
            );
            Ok(ExitCode::from(EXIT_BELOW_THRESHOLD))
        }
        _ => Ok(ExitCode::SUCCESS),
    }
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path));
    }
    builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );
    let settings = builder.build().with_context(|| match path {
        Some(path) => format!("failed to load configuration from {}", path.display()),
        None => "failed to load configuration from environment".to_string(),
    })?;
    let config: AppConfig = settings
        .try_deserialize()
        .context("invalid configuration")?;
    config
        .policy
        .validate()
        .context("invalid scoring policy")?;
    Ok(config)
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}
