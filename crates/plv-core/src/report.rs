//! Batch report and incremental progress output.

use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ValidationOutcome;

/// Receives each outcome as soon as its URL finishes.
pub trait ProgressSink: Send + Sync {
    fn on_outcome(&self, outcome: &ValidationOutcome);
}

/// Discards progress.
pub struct SilentProgress;

impl ProgressSink for SilentProgress {
    fn on_outcome(&self, _outcome: &ValidationOutcome) {}
}

struct StatusState<W> {
    out: W,
    completed: usize,
    failed: usize,
}

/// Prints one `[n/total] ✓ url` line per finished URL.
pub struct StatusPrinter<W: Write + Send> {
    total: usize,
    state: Mutex<StatusState<W>>,
}

impl StatusPrinter<std::io::Stdout> {
    pub fn stdout(total: usize) -> Self {
        Self::new(total, std::io::stdout())
    }
}

impl<W: Write + Send> StatusPrinter<W> {
    pub fn new(total: usize, out: W) -> Self {
        Self {
            total,
            state: Mutex::new(StatusState {
                out,
                completed: 0,
                failed: 0,
            }),
        }
    }

    /// `(completed, failed)` so far.
    pub fn counts(&self) -> (usize, usize) {
        match self.state.lock() {
            Ok(state) => (state.completed, state.failed),
            Err(poisoned) => {
                let state = poisoned.into_inner();
                (state.completed, state.failed)
            }
        }
    }

    pub fn into_inner(self) -> W {
        match self.state.into_inner() {
            Ok(state) => state.out,
            Err(poisoned) => poisoned.into_inner().out,
        }
    }
}

impl<W: Write + Send> ProgressSink for StatusPrinter<W> {
    fn on_outcome(&self, outcome: &ValidationOutcome) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.completed += 1;
        let line = match &outcome.result {
            Ok(detail) => format!(
                "[{}/{}] \u{1b}[32m✓\u{1b}[0m {} ({})",
                state.completed, self.total, outcome.url, detail.first_product.name
            ),
            Err(err) => {
                state.failed += 1;
                format!(
                    "[{}/{}] \u{1b}[31m✗\u{1b}[0m {} ({})",
                    state.completed,
                    self.total,
                    outcome.url,
                    err.friendly_name()
                )
            }
        };
        // Progress output is best effort.
        let _ = writeln!(state.out, "{line}");
    }
}

/// All outcomes of one run, in input order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchReport {
    pub generated_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub outcomes: Vec<ValidationOutcome>,
}

impl BatchReport {
    pub fn new(outcomes: Vec<ValidationOutcome>, duration_ms: u64) -> Self {
        Self {
            generated_at: Utc::now(),
            duration_ms,
            outcomes,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &ValidationOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    pub fn failed_count(&self) -> usize {
        self.failures().count()
    }

    pub fn passed_count(&self) -> usize {
        self.outcomes.len() - self.failed_count()
    }

    /// True when every URL validated. An empty batch is a success.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(ValidationOutcome::is_success)
    }

    /// Multi-line summary with one line per failed URL.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "{}/{} packages validated in {}ms",
            self.passed_count(),
            self.outcomes.len(),
            self.duration_ms
        );
        for outcome in self.failures() {
            if let Some(err) = outcome.error() {
                out.push_str(&format!("\n  ✗ {}: {}", outcome.url, err));
            }
        }
        out
    }

    pub fn write_json(&self, path: &Path) -> std::io::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PackageError;
    use crate::model::{Package, Product, RepoDetail};

    fn detail(name: &str) -> RepoDetail {
        RepoDetail::try_from(Package {
            name: name.to_string(),
            products: vec![Product {
                name: name.to_string(),
                targets: vec![],
                kind: None,
            }],
            targets: vec![],
            dependencies: vec![],
            platforms: vec![],
        })
        .unwrap()
    }

    #[test]
    fn test_status_printer_counts_and_lines() {
        let printer = StatusPrinter::new(2, Vec::new());
        printer.on_outcome(&ValidationOutcome::success("https://github.com/a/lib.git", detail("Lib")));
        printer.on_outcome(&ValidationOutcome::failure(
            "https://github.com/a/broken.git",
            PackageError::DumpTimeout,
        ));
        assert_eq!(printer.counts(), (2, 1));

        let text = String::from_utf8(printer.into_inner()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("[1/2]"));
        assert!(lines[0].contains("(Lib)"));
        assert!(lines[1].contains("Dump Timeout"));
    }

    #[test]
    fn test_batch_report_judgement() {
        let report = BatchReport::new(
            vec![
                ValidationOutcome::success("https://github.com/a/ok.git", detail("Ok")),
                ValidationOutcome::failure(
                    "https://github.com/a/missing.git",
                    PackageError::NoResult("HTTP 404".into()),
                ),
            ],
            42,
        );
        assert!(!report.is_success());
        assert_eq!(report.passed_count(), 1);
        assert_eq!(report.failed_count(), 1);
        let summary = report.summary();
        assert!(summary.starts_with("1/2 packages validated"));
        assert!(summary.contains("missing.git"));
        assert!(summary.contains("HTTP 404"));
    }

    #[test]
    fn test_empty_batch_is_success() {
        assert!(BatchReport::new(vec![], 0).is_success());
    }

    #[test]
    fn test_write_json_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        let report = BatchReport::new(
            vec![ValidationOutcome::failure(
                "https://github.com/a/b.git",
                PackageError::MissingProducts,
            )],
            7,
        );
        report.write_json(&path).unwrap();

        let loaded: BatchReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded, report);
    }
}
