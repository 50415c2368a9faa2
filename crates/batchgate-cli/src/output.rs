//! Human and JSON renderings of command output

use batchgate_core::domain::{BatchStats, ItemOutcome};
use serde_json::{json, Value};

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Trait for formatting CLI output
pub trait OutputFormatter {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    fn info(&self, message: &str);
    fn print_json(&self, value: &Value);
    /// One finished work item
    fn item(&self, index: usize, outcome: &ItemOutcome<Value>);
    /// Aggregate numbers for a finished batch
    fn summary(&self, stats: &BatchStats);
}

/// Human-readable output formatter with checkmarks and indentation
pub struct HumanFormatter;

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        println!("\u{2713} {}", message);
    }
    fn error(&self, message: &str) {
        eprintln!("\u{2717} Error: {}", message);
    }
    fn warn(&self, message: &str) {
        eprintln!("\u{26a0} Warning: {}", message);
    }
    fn info(&self, message: &str) {
        println!("  {}", message);
    }
    fn print_json(&self, _value: &Value) {}

    fn item(&self, index: usize, outcome: &ItemOutcome<Value>) {
        match outcome {
            Ok(artifact) => println!("  \u{2713} #{:<4} {}", index, artifact),
            Err(e) => println!("  \u{2717} #{:<4} {}", index, e),
        }
    }

    fn summary(&self, stats: &BatchStats) {
        println!();
        println!(
            "{} of {} succeeded ({:.0}%), {} failed",
            stats.succeeded,
            stats.total,
            stats.success_rate() * 100.0,
            stats.failed
        );
        println!(
            "  {} attempts, {} rate limited, {} transient failures, {:.1}s",
            stats.attempts,
            stats.rate_limited,
            stats.transient_failures,
            stats.elapsed_ms as f64 / 1000.0
        );
    }
}

/// JSON output formatter, one object per line
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn success(&self, message: &str) {
        println!("{}", json!({"success": true, "message": message}));
    }
    fn error(&self, message: &str) {
        eprintln!("{}", json!({"success": false, "error": message}));
    }
    fn warn(&self, message: &str) {
        eprintln!("{}", json!({"level": "warning", "message": message}));
    }
    fn info(&self, _message: &str) {}
    fn print_json(&self, value: &Value) {
        println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
    }

    fn item(&self, index: usize, outcome: &ItemOutcome<Value>) {
        println!("{}", item_json(index, outcome));
    }

    fn summary(&self, stats: &BatchStats) {
        println!("{}", json!({ "summary": stats }));
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Human => Box::new(HumanFormatter),
    }
}

/// JSON record for one item, also used for the `--output` file.
pub fn item_json(index: usize, outcome: &ItemOutcome<Value>) -> Value {
    match outcome {
        Ok(artifact) => json!({"index": index, "status": "succeeded", "artifact": artifact}),
        Err(e) => json!({
            "index": index,
            "status": "failed",
            "error": e,
            "message": e.to_string(),
        }),
    }
}
