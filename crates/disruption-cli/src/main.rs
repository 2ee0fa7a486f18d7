//! Backend disruption aggregator CLI
//!
//! The `disruption-aggregator` command reads downloaded CI job run artifacts
//! and produces a disruption test suite.
//!
//! ## Commands
//!
//! - `analyze`: Aggregate disruption across job runs and write the suite
//! - `backends`: List every backend that would be checked

mod baseline;
mod fs_job_run;
mod telemetry;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use disruption_aggregator::urls::{DEFAULT_ARTIFACT_URL_BASE, DEFAULT_HUMAN_URL_BASE};
use disruption_aggregator::{
    all_backend_names, default_required_backends, AnalyzerConfig, BackendDisruptionJsonParser,
    CancellationToken, DisruptionAnalyzer, GcsUrlFormatter, RawDataCollector, TestSuite,
    BACKEND_DISRUPTION_PREFIX,
};
use tracing::{info, warn, Level};

use crate::baseline::Baseline;
use crate::fs_job_run::discover_job_runs;

#[derive(Parser)]
#[command(name = "disruption-aggregator")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Aggregate backend disruption across CI job runs", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Where job runs come from and which backends must always be reported.
#[derive(clap::Args, Debug, Clone)]
struct SourceArgs {
    /// Directory with one sub-directory of artifacts per job run
    #[arg(long, env = "DISRUPTION_JOB_RUNS_DIR")]
    job_runs_dir: PathBuf,

    /// File name prefix of disruption artifacts
    #[arg(long, env = "DISRUPTION_ARTIFACT_PREFIX", default_value = BACKEND_DISRUPTION_PREFIX)]
    prefix: String,

    /// Backend that is always checked, even without data (repeatable)
    #[arg(
        long = "required-backend",
        env = "DISRUPTION_REQUIRED_BACKENDS",
        value_delimiter = ','
    )]
    required_backends: Vec<String>,

    /// Do not include the built-in required backends
    #[arg(long)]
    no_default_required: bool,
}

impl SourceArgs {
    fn required_backends(&self) -> BTreeSet<String> {
        let mut required = if self.no_default_required {
            BTreeSet::new()
        } else {
            default_required_backends()
        };
        required.extend(self.required_backends.iter().cloned());
        required
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
    Junit,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate disruption across job runs and write the test suite
    Analyze {
        #[command(flatten)]
        source: SourceArgs,

        /// Bucket path shared by all job runs, e.g. `origin-ci-test/logs/<job>`
        #[arg(long, env = "DISRUPTION_BUCKET_ROOT")]
        bucket_root: String,

        /// Historical baseline (JSON, or YAML by extension)
        #[arg(long, env = "DISRUPTION_BASELINE")]
        baseline: Option<PathBuf>,

        /// Output file for the suite (default: stdout)
        #[arg(short, long, env = "DISRUPTION_OUTPUT")]
        output: Option<PathBuf>,

        /// Suite serialization format (`junit` writes JUnit XML)
        #[arg(long, value_enum, env = "DISRUPTION_FORMAT", default_value = "yaml")]
        format: OutputFormat,

        /// Base URL of the human-facing job run view
        #[arg(long, env = "DISRUPTION_HUMAN_URL_BASE", default_value = DEFAULT_HUMAN_URL_BASE)]
        human_url_base: String,

        /// Base URL of the artifact browser
        #[arg(long, env = "DISRUPTION_ARTIFACT_URL_BASE", default_value = DEFAULT_ARTIFACT_URL_BASE)]
        artifact_url_base: String,

        /// Exit with an error when any test case failed
        #[arg(long, env = "DISRUPTION_FAIL_ON_REGRESSION")]
        fail_on_regression: bool,
    },

    /// List every backend that would be checked
    Backends {
        #[command(flatten)]
        source: SourceArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    telemetry::init_tracing(cli.json, level);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            on_interrupt.cancel();
        }
    });

    match cli.command {
        Commands::Analyze {
            source,
            bucket_root,
            baseline,
            output,
            format,
            human_url_base,
            artifact_url_base,
            fail_on_regression,
        } => {
            let urls = GcsUrlFormatter::new(human_url_base, artifact_url_base);
            let suite = cmd_analyze(
                &cancel,
                &source,
                &bucket_root,
                baseline.as_deref(),
                urls,
            )
            .await?;
            write_suite(&suite, format, output.as_deref())?;

            print_summary(&suite)?;
            if fail_on_regression && suite.num_failed() > 0 {
                bail!("{} test case(s) failed", suite.num_failed());
            }
            Ok(())
        }
        Commands::Backends { source } => {
            for backend in cmd_backends(&cancel, &source).await? {
                println!("{}", backend);
            }
            Ok(())
        }
    }
}

/// Run the analyzer over every job run under `source.job_runs_dir`.
async fn cmd_analyze(
    cancel: &CancellationToken,
    source: &SourceArgs,
    bucket_root: &str,
    baseline_path: Option<&Path>,
    urls: GcsUrlFormatter,
) -> Result<TestSuite> {
    let job_runs = discover_job_runs(&source.job_runs_dir)
        .await
        .with_context(|| format!("Failed to list job runs in {:?}", source.job_runs_dir))?;
    info!(job_runs = job_runs.len(), "discovered job runs");

    let baseline = match baseline_path {
        Some(path) => Baseline::load(path)?,
        None => {
            warn!("no baseline given, every backend check will be skipped");
            Baseline::default()
        }
    };
    let checks = Arc::new(baseline).check_registry()?;

    let config = AnalyzerConfig {
        artifact_prefix: source.prefix.clone(),
        ..AnalyzerConfig::default()
    };
    let analyzer = DisruptionAnalyzer::new(
        config,
        Arc::new(BackendDisruptionJsonParser),
        Arc::new(source.required_backends()),
        checks,
        Arc::new(urls),
    );

    let suite = analyzer
        .calculate_disruption_test_suite(cancel, bucket_root, &job_runs)
        .await
        .context("Disruption analysis failed")?;
    Ok(suite)
}

/// Required backends plus every backend seen in the job runs' artifacts.
async fn cmd_backends(cancel: &CancellationToken, source: &SourceArgs) -> Result<BTreeSet<String>> {
    let job_runs = discover_job_runs(&source.job_runs_dir)
        .await
        .with_context(|| format!("Failed to list job runs in {:?}", source.job_runs_dir))?;
    let collector = RawDataCollector::new(Arc::new(BackendDisruptionJsonParser), &source.prefix);
    let collected = collector.collect(cancel, &job_runs).await?;
    if let Some(err) = &collected.error {
        warn!(error = %err, "some job runs could not be read");
    }
    Ok(all_backend_names(
        &source.required_backends(),
        &collected.by_job_run,
    ))
}

fn write_suite(suite: &TestSuite, format: OutputFormat, output: Option<&Path>) -> Result<()> {
    let rendered = match format {
        OutputFormat::Yaml => serde_yaml::to_string(suite)?,
        OutputFormat::Json => serde_json::to_string_pretty(suite)?,
        OutputFormat::Junit => suite.to_junit_xml(),
    };
    match output {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("Failed to write suite to {:?}", path))?;
            info!(path = %path.display(), "wrote test suite");
        }
        None => println!("{}", rendered),
    }
    Ok(())
}

fn print_summary(suite: &TestSuite) -> Result<()> {
    let digest = suite.content_digest()?;
    eprintln!(
        "{}: {} test case(s), {} failed",
        suite.name(),
        suite.test_cases().len(),
        suite.num_failed()
    );
    for case in suite.failed_cases() {
        eprintln!("  FAIL {}", case.name);
    }
    eprintln!("digest: {}", digest);
    Ok(())
}
