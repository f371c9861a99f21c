//! SBS CLI
//!
//! Replays the queries found in a server log against two backends and
//! reports every query whose results differ.

#![warn(missing_docs)]
#![warn(clippy::all)]

use clap::{Parser, ValueEnum};
use color_eyre::eyre::{bail, WrapErr};
use color_eyre::Result;
use sbs_backend::{Backend, DgraphHttpBackend, ReadMode};
use sbs_log::LogSource;
use sbs_replay::{Coordinator, JsonLinesSink, MismatchSink, ReplayConfig, Tee, TracingSink};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sbs")]
#[command(about = "Side-by-side comparison of two query backends by log replay", long_about = None)]
struct Args {
    /// Path of the server log file to replay
    #[arg(long)]
    log_file: PathBuf,
    /// Endpoint of the left backend
    #[arg(long)]
    alpha_left: String,
    /// Endpoint of the right backend
    #[arg(long)]
    alpha_right: String,
    /// Number of query request workers
    #[arg(long, default_value_t = 16)]
    workers: usize,
    /// Work queue capacity as a multiple of the worker count
    #[arg(long, default_value_t = 5)]
    queue_factor: usize,
    /// Deadline for each backend call, in seconds
    #[arg(long, default_value_t = 1800)]
    query_timeout_secs: u64,
    /// Seconds between progress lines
    #[arg(long, default_value_t = 5)]
    report_interval_secs: u64,
    /// Read at the latest commit instead of best-effort
    #[arg(long)]
    strict_reads: bool,
    /// Also append mismatches to this file as JSON lines
    #[arg(long)]
    mismatch_out: Option<PathBuf>,
    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
    /// Exit with an error if any query mismatched
    #[arg(long)]
    fail_on_mismatch: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

impl Args {
    fn replay_config(&self) -> ReplayConfig {
        let read_mode = if self.strict_reads {
            ReadMode::Strict
        } else {
            ReadMode::BestEffort
        };
        ReplayConfig::default()
            .with_workers(self.workers)
            .with_queue_factor(self.queue_factor)
            .with_query_timeout(Duration::from_secs(self.query_timeout_secs))
            .with_report_interval(Duration::from_secs(self.report_interval_secs))
            .with_read_mode(read_mode)
    }

    fn mismatch_sink(&self) -> Result<Arc<dyn MismatchSink>> {
        let Some(path) = &self.mismatch_out else {
            return Ok(Arc::new(TracingSink));
        };
        let file = JsonLinesSink::create(path)
            .wrap_err_with(|| format!("cannot open mismatch output {}", path.display()))?;
        Ok(Arc::new(Tee(vec![Box::new(TracingSink), Box::new(file)])))
    }
}

/// Directives used when `RUST_LOG` is unset
const DEFAULT_FILTER: &str = "sbs=info,sbs_log=info,sbs_backend=info,sbs_replay=info,sbs_cli=info";

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    init_tracing(args.log_format);

    let config = args.replay_config();
    config.validate()?;

    let source = LogSource::open(&args.log_file).await?;

    let left: Arc<dyn Backend> = Arc::new(DgraphHttpBackend::new(&args.alpha_left)?);
    let right: Arc<dyn Backend> = Arc::new(DgraphHttpBackend::new(&args.alpha_right)?);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping replay");
            on_signal.cancel();
        }
    });

    let coordinator = Coordinator::new(left, right, config)?
        .with_sink(args.mismatch_sink()?)
        .with_cancellation(cancel);
    let summary = coordinator.run(source).await;

    println!(
        "Total: {} Failed: {} (left errors: {}, right errors: {}, lines skipped: {})",
        summary.stats.total,
        summary.stats.failed,
        summary.stats.left_errors,
        summary.stats.right_errors,
        summary.skipped()
    );

    if args.fail_on_mismatch && summary.stats.failed > 0 {
        bail!(
            "{} of {} replayed queries mismatched",
            summary.stats.failed,
            summary.stats.total
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec![
            "sbs",
            "--log-file",
            "/var/log/alpha.log",
            "--alpha-left",
            "localhost:8080",
            "--alpha-right",
            "localhost:8081",
        ];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]);
        assert_eq!(args.workers, 16);
        assert_eq!(args.log_format, LogFormat::Pretty);
        assert!(!args.fail_on_mismatch);

        let config = args.replay_config();
        assert_eq!(config, ReplayConfig::default());
    }

    #[test]
    fn test_overrides() {
        let args = parse(&[
            "--workers",
            "4",
            "--query-timeout-secs",
            "30",
            "--strict-reads",
            "--log-format",
            "json",
        ]);
        let config = args.replay_config();
        assert_eq!(config.workers, 4);
        assert_eq!(config.query_timeout, Duration::from_secs(30));
        assert_eq!(config.read_mode, ReadMode::Strict);
        assert_eq!(args.log_format, LogFormat::Json);
    }

    #[test]
    fn test_missing_endpoint_rejected() {
        let result = Args::try_parse_from(["sbs", "--log-file", "x.log", "--alpha-left", "a:1"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_mismatch_sink_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.jsonl");
        let out_str = out.to_str().unwrap();
        let args = parse(&["--mismatch-out", out_str]);
        assert!(args.mismatch_sink().is_ok());
        assert!(out.exists());
    }
}
