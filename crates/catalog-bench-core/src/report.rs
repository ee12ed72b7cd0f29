//! Run statistics.
//!
//! `RunReport` is shared by every workload task; each finished iteration
//! records its operation, latency and outcome. `RunSummary` is the
//! serializable snapshot produced at the end of a run.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};

use crate::api::ApiError;
use crate::auth::RefreshSummary;
use crate::utils::format_duration;
use crate::workload::{Branch, Operation};

/// Failure label for iterations that found no token in the holder
pub const NO_TOKEN: &str = "no_token";

#[derive(Debug, Clone, Copy, Default)]
struct OperationStats {
    attempts: u64,
    failures: u64,
    total_latency: Duration,
    max_latency: Duration,
}

#[derive(Debug, Default)]
struct ReportState {
    operations: BTreeMap<Operation, OperationStats>,
    failure_kinds: BTreeMap<String, u64>,
}

/// Concurrent collector of operation outcomes. Clone shares the same state.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    state: Arc<Mutex<ReportState>>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, operation: Operation, elapsed: Duration) {
        let mut state = self.state.lock();
        let stats = state.operations.entry(operation).or_default();
        stats.attempts += 1;
        stats.total_latency += elapsed;
        stats.max_latency = stats.max_latency.max(elapsed);
    }

    pub fn record_failure(&self, operation: Operation, elapsed: Duration, kind: &str) {
        let mut state = self.state.lock();
        let stats = state.operations.entry(operation).or_default();
        stats.attempts += 1;
        stats.failures += 1;
        stats.total_latency += elapsed;
        stats.max_latency = stats.max_latency.max(elapsed);
        *state.failure_kinds.entry(kind.to_string()).or_default() += 1;
    }

    /// Record an error, labelled by its `ApiError` kind when there is one.
    pub fn record_error(&self, operation: Operation, elapsed: Duration, error: &anyhow::Error) {
        let kind = error
            .chain()
            .find_map(|cause| cause.downcast_ref::<ApiError>())
            .map(ApiError::kind)
            .unwrap_or("other");
        self.record_failure(operation, elapsed, kind);
    }

    pub fn summarize(&self, started_at: DateTime<Utc>, elapsed: Duration) -> RunSummary {
        let state = self.state.lock();

        let operations: Vec<OperationSummary> = state
            .operations
            .iter()
            .map(|(op, s)| OperationSummary {
                operation: *op,
                branch: op.branch(),
                attempts: s.attempts,
                failures: s.failures,
                mean_latency_ms: if s.attempts == 0 {
                    0.0
                } else {
                    as_millis_f64(s.total_latency) / s.attempts as f64
                },
                max_latency_ms: as_millis_f64(s.max_latency),
            })
            .collect();

        let branch_total = |branch: Branch| {
            operations
                .iter()
                .filter(|o| o.branch == branch)
                .map(|o| o.attempts)
                .sum::<u64>()
        };

        RunSummary {
            started_at,
            elapsed_secs: elapsed.as_secs_f64(),
            total: operations.iter().map(|o| o.attempts).sum(),
            failures: operations.iter().map(|o| o.failures).sum(),
            reads: branch_total(Branch::Read),
            writes: branch_total(Branch::Write),
            failure_kinds: state.failure_kinds.clone(),
            operations,
            refresh: None,
        }
    }
}

fn as_millis_f64(d: Duration) -> f64 {
    d.as_nanos() as f64 / 1_000_000.0
}

#[derive(Debug, Clone, Serialize)]
pub struct OperationSummary {
    pub operation: Operation,
    pub branch: Branch,
    pub attempts: u64,
    pub failures: u64,
    pub mean_latency_ms: f64,
    pub max_latency_ms: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub elapsed_secs: f64,
    pub total: u64,
    pub failures: u64,
    pub reads: u64,
    pub writes: u64,
    pub failure_kinds: BTreeMap<String, u64>,
    pub operations: Vec<OperationSummary>,
    pub refresh: Option<RefreshSummary>,
}

impl RunSummary {
    pub fn throughput(&self) -> f64 {
        if self.elapsed_secs > 0.0 {
            self.total as f64 / self.elapsed_secs
        } else {
            0.0
        }
    }

    /// Emit the summary through tracing.
    pub fn log(&self) {
        info!(
            total = self.total,
            failures = self.failures,
            reads = self.reads,
            writes = self.writes,
            elapsed = %format_duration(Duration::from_secs_f64(self.elapsed_secs)),
            throughput = %format!("{:.1}/s", self.throughput()),
            "Workload finished"
        );
        for op in &self.operations {
            info!(
                operation = %op.operation,
                branch = %op.branch,
                attempts = op.attempts,
                failures = op.failures,
                mean_ms = %format!("{:.1}", op.mean_latency_ms),
                max_ms = %format!("{:.1}", op.max_latency_ms),
                "Operation stats"
            );
        }
        for (kind, count) in &self.failure_kinds {
            warn!(kind = %kind, count, "Failures");
        }
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        Ok(())
    }
}
