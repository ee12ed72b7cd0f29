//! End-to-end benchmark run.
//!
//! Order of events: the refresh loop starts, the gate waits for the first
//! token, the workload is injected and drained, and only then is the refresh
//! loop told to stop and joined.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};

use crate::auth::{spawn_refresh_loop, wait_for_token, Authenticator, CredentialHolder};
use crate::config::Config;
use crate::dataset::TreeDataset;
use crate::report::RunSummary;
use crate::workload::{
    InjectionProfile, OperationExecutor, OperationFeeders, WorkloadRunner, WorkloadSelector,
};

/// Run one benchmark against `executor`, authenticating through `authenticator`.
pub async fn run_benchmark<A, E>(
    config: &Config,
    dataset: &TreeDataset,
    authenticator: A,
    executor: Arc<E>,
) -> Result<RunSummary>
where
    A: Authenticator + 'static,
    E: OperationExecutor + 'static,
{
    let workload = &config.workload;
    let feeders = OperationFeeders::from_dataset(dataset);
    let selector = WorkloadSelector::new(
        workload.read_ratio,
        workload.write_ratio,
        workload.seed,
        |op| feeders.is_available(op),
    )?;
    let profile = InjectionProfile::from_config(workload)?;

    let holder = CredentialHolder::new();
    let refresh = spawn_refresh_loop(authenticator, holder.clone(), config.refresh.interval());

    let gate = wait_for_token(
        &holder,
        config.refresh.gate_poll_interval(),
        config.refresh.gate_timeout(),
    )
    .await;
    if let Err(e) = gate {
        error!(error = %e, "Gate did not open, aborting run");
        holder.request_stop();
        if let Err(join) = refresh.await {
            error!(error = %join, "Token refresh task failed");
        }
        return Err(e.into());
    }

    // Arrival spacing gets its own stream so it does not shift operation picks
    let arrival_seed = workload.seed.map(|seed| seed.wrapping_add(1));
    let mut runner = WorkloadRunner::new(executor, holder.clone(), feeders, selector, arrival_seed);
    let result = runner.run(&profile).await;

    holder.request_stop();
    let refresh_summary = refresh.await.context("Token refresh task failed")?;
    info!(
        ticks = refresh_summary.ticks,
        successes = refresh_summary.successes,
        failures = refresh_summary.failures,
        "Token refresh loop joined"
    );

    let mut summary = result?;
    summary.refresh = Some(refresh_summary);
    Ok(summary)
}
