//! Workload execution.
//!
//! The runner owns the selector and the arrival schedule. Arrivals are
//! decided sequentially on the driving task (so a seeded run always picks
//! the same operations in the same order); each arrival then runs as its own
//! Tokio task.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, trace};

use crate::auth::CredentialHolder;
use crate::report::{RunReport, RunSummary, NO_TOKEN};

use super::{
    InjectionProfile, Invocation, OperationExecutor, OperationFeeders, WorkloadSelector,
};

pub struct WorkloadRunner<E> {
    executor: Arc<E>,
    holder: CredentialHolder,
    feeders: Arc<OperationFeeders>,
    selector: WorkloadSelector,
    arrival_rng: StdRng,
    report: RunReport,
}

impl<E> WorkloadRunner<E>
where
    E: OperationExecutor + 'static,
{
    pub fn new(
        executor: Arc<E>,
        holder: CredentialHolder,
        feeders: OperationFeeders,
        selector: WorkloadSelector,
        arrival_seed: Option<u64>,
    ) -> Self {
        let arrival_rng = match arrival_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            executor,
            holder,
            feeders: Arc::new(feeders),
            selector,
            arrival_rng,
            report: RunReport::new(),
        }
    }

    fn next_invocation(&mut self) -> Option<Invocation> {
        let operation = self.selector.next_operation();
        let invocation = self.feeders.draw(operation);
        if invocation.is_none() {
            debug!(%operation, "Feeder exhausted, skipping iteration");
        }
        invocation
    }

    /// Inject arrivals according to `profile`, then wait for every started
    /// iteration to finish.
    pub async fn run(&mut self, profile: &InjectionProfile) -> Result<RunSummary> {
        let started_at = Utc::now();
        let start = Instant::now();
        let end = start + profile.duration();
        let limiter = profile.max_in_flight().map(|n| Arc::new(Semaphore::new(n)));

        info!(
            rate = profile.rate(),
            duration_secs = profile.duration().as_secs_f64(),
            expected = profile.expected_arrivals() as u64,
            "Injecting workload"
        );

        let mut tasks = JoinSet::new();
        let mut next_arrival = start;
        let mut started: u64 = 0;

        while next_arrival < end {
            tokio::time::sleep_until(next_arrival).await;

            let permit = match &limiter {
                Some(semaphore) => tokio::select! {
                    permit = Arc::clone(semaphore).acquire_owned() => Some(permit?),
                    _ = tokio::time::sleep_until(end) => break,
                },
                None => None,
            };
            // Waiting for a permit may have run past the end of the profile
            if Instant::now() >= end {
                break;
            }

            if let Some(invocation) = self.next_invocation() {
                let executor = Arc::clone(&self.executor);
                let holder = self.holder.clone();
                let report = self.report.clone();
                tasks.spawn(async move {
                    execute_invocation(executor.as_ref(), &holder, &report, invocation).await;
                    drop(permit);
                });
                started += 1;
            }

            match next_arrival.checked_add(profile.next_gap(&mut self.arrival_rng)) {
                Some(at) => next_arrival = at,
                None => break,
            }

            while let Some(joined) = tasks.try_join_next() {
                if let Err(e) = joined {
                    error!(error = %e, "Workload task panicked");
                }
            }
        }

        debug!(
            started,
            in_flight = tasks.len(),
            "Injection finished, draining in-flight iterations"
        );
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Workload task panicked");
            }
        }

        Ok(self.report.summarize(started_at, start.elapsed()))
    }
}

/// Execute one invocation with the token currently in the holder and record
/// the outcome.
pub async fn execute_invocation<E>(
    executor: &E,
    holder: &CredentialHolder,
    report: &RunReport,
    invocation: Invocation,
) where
    E: OperationExecutor + ?Sized,
{
    let operation = invocation.operation;
    let Some(token) = holder.get() else {
        report.record_failure(operation, Duration::ZERO, NO_TOKEN);
        return;
    };

    let started = Instant::now();
    let result = executor.execute(&invocation, &token).await;
    let elapsed = started.elapsed();

    match result {
        Ok(()) => {
            trace!(
                %operation,
                elapsed_ms = elapsed.as_millis() as u64,
                "Operation succeeded"
            );
            report.record_success(operation, elapsed);
        }
        Err(e) => {
            debug!(%operation, error = %e, "Operation failed");
            report.record_error(operation, elapsed, &e);
        }
    }
}
