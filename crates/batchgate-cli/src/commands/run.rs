//! Run command - Drive a JSONL batch through the coordinator
//!
//! Provides the `batchgate run` CLI command which:
//! 1. Applies command-line overrides on top of the loaded configuration
//! 2. Reads one JSON work descriptor per non-empty input line
//! 3. Runs the batch against the HTTP endpoint, cancellable with Ctrl+C
//! 4. Prints per-item results and a summary

use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use batchgate_core::{config::Config, domain::BatchError};
use batchgate_engine::{BatchCoordinator, BatchMetrics};
use batchgate_http::HttpExecutor;
use clap::Args;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    output::{get_formatter, item_json, OutputFormat},
    shutdown::shutdown_signal,
    LoadedConfig,
};

#[derive(Debug, Args)]
pub struct RunCommand {
    /// Endpoint receiving one POST per descriptor (overrides executor.endpoint)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// JSONL file with one work descriptor per line ("-" reads stdin)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Upper bound on concurrent calls (overrides concurrency.max)
    #[arg(long)]
    pub max_concurrent: Option<usize>,

    /// Calls per minute (overrides rate_limit.requests_per_minute)
    #[arg(long)]
    pub rpm: Option<u32>,

    /// Also write one JSON result per line to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print Prometheus metrics after the run
    #[arg(long)]
    pub metrics: bool,
}

impl RunCommand {
    pub async fn execute(&self, loaded: LoadedConfig, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);

        let mut config = loaded.config;
        self.apply_overrides(&mut config);

        let errors = config.validate();
        if !errors.is_empty() {
            for e in &errors {
                formatter.error(&e.to_string());
            }
            bail!("Invalid configuration ({} errors)", errors.len());
        }

        let inputs = read_descriptors(&self.input)?;
        info!(
            config_path = %loaded.path.display(),
            items = inputs.len(),
            "Loaded batch"
        );
        if inputs.is_empty() {
            formatter.warn("Input contains no work descriptors");
            return Ok(());
        }

        let executor =
            HttpExecutor::from_config(&config.executor).context("Failed to create HTTP executor")?;
        let metrics = Arc::new(BatchMetrics::new().context("Failed to create metrics registry")?);
        let coordinator = BatchCoordinator::new(&config, Arc::new(executor))?
            .with_metrics(Arc::clone(&metrics));

        let cancel = CancellationToken::new();
        tokio::spawn(shutdown_signal(cancel.clone()));

        let result = match coordinator.run(inputs, cancel.clone()).await {
            Ok(result) => result,
            Err(e @ BatchError::Cancelled { .. }) => {
                formatter.error(&e.to_string());
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };
        // Stop the signal handler
        cancel.cancel();

        for (index, outcome) in result.iter().enumerate() {
            formatter.item(index, outcome);
        }
        formatter.summary(result.stats());

        if let Some(path) = &self.output {
            write_results(path, result.iter())?;
            formatter.success(&format!("Results written to {}", path.display()));
        }

        if self.metrics {
            print!("{}", metrics.encode()?);
        }

        if result.failed() > 0 {
            formatter.warn(&format!(
                "{} of {} items failed",
                result.failed(),
                result.len()
            ));
        }

        Ok(())
    }

    fn apply_overrides(&self, config: &mut Config) {
        if let Some(endpoint) = &self.endpoint {
            config.executor.endpoint = Some(endpoint.clone());
        }
        if let Some(max) = self.max_concurrent {
            config.concurrency.max = max;
            config.concurrency.min = config.concurrency.min.min(max);
        }
        if let Some(rpm) = self.rpm {
            config.rate_limit.requests_per_minute = rpm;
        }
    }
}

/// Reads work descriptors from a JSONL file, or stdin for `-`.
fn read_descriptors(path: &Path) -> Result<Vec<Value>> {
    if path.as_os_str() == "-" {
        return parse_descriptors(std::io::stdin().lock());
    }

    let file = File::open(path)
        .with_context(|| format!("Failed to open input file {}", path.display()))?;
    parse_descriptors(BufReader::new(file))
        .with_context(|| format!("Failed to read input file {}", path.display()))
}

fn parse_descriptors(reader: impl BufRead) -> Result<Vec<Value>> {
    let mut descriptors = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(&line)
            .with_context(|| format!("Line {} is not valid JSON", number + 1))?;
        descriptors.push(value);
    }
    Ok(descriptors)
}

fn write_results<'a>(
    path: &Path,
    outcomes: impl Iterator<Item = &'a batchgate_core::domain::ItemOutcome<Value>>,
) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for (index, outcome) in outcomes.enumerate() {
        writeln!(writer, "{}", item_json(index, outcome))?;
    }
    writer.flush()?;
    Ok(())
}
