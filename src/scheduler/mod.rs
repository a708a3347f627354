//! Pod scheduler
//!
//! Assigns every unscheduled pod to a node, round-robin over the node list
//! as it stands at the start of each tick. Node membership is re-read every
//! tick and already assigned pods are never moved.

use crate::api::{FieldSelector, HasMetadata, Pod};
use crate::client::ClusterApi;
use crate::config::SchedulerConfig;
use crate::error::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Outcome of one scheduling pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Nodes seen this tick
    pub nodes: usize,
    /// Pods assigned to a node
    pub scheduled: usize,
    /// Pods whose assignment failed; retried next tick
    pub failed: usize,
}

/// Round-robin pod scheduler
pub struct Scheduler {
    api: Arc<dyn ClusterApi>,
    interval: Duration,
}

impl Scheduler {
    /// Create a scheduler polling at the configured interval
    pub fn new(api: Arc<dyn ClusterApi>, config: &SchedulerConfig) -> Self {
        Self {
            api,
            interval: config.interval,
        }
    }

    /// Run one scheduling pass.
    ///
    /// Failing to list nodes or pods fails the whole tick. A failed patch
    /// only affects its own pod. Cancellation is checked before every call
    /// to the API server; patches already sent are kept.
    pub async fn tick(&self, cancel: &CancellationToken) -> Result<TickReport> {
        let mut report = TickReport::default();
        if cancel.is_cancelled() {
            return Ok(report);
        }

        let nodes = self.api.list_nodes().await?;
        report.nodes = nodes.len();
        if nodes.is_empty() {
            debug!("No nodes registered, skipping tick");
            return Ok(report);
        }

        if cancel.is_cancelled() {
            return Ok(report);
        }

        let unscheduled = FieldSelector::new("spec.nodeName", "");
        let pods = self.api.list_pods(&unscheduled).await?;

        for (i, pod) in pods.iter().enumerate() {
            if cancel.is_cancelled() {
                break;
            }

            let node = nodes[i % nodes.len()].name();
            match self.api.patch_pod(pod.name(), &Pod::node_assignment(node)).await {
                Ok(_) => {
                    info!(pod = %pod.name(), node = %node, "Scheduled pod");
                    report.scheduled += 1;
                }
                Err(e) => {
                    warn!(pod = %pod.name(), node = %node, error = %e, "Failed to schedule pod");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Tick until `cancel` fires
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval_ms = self.interval.as_millis() as u64, "Scheduler started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    match self.tick(&cancel).await {
                        Ok(report) => debug!(?report, "Scheduler tick complete"),
                        Err(e) => error!(error = %e, "Scheduler tick failed"),
                    }
                }
            }
        }

        info!("Scheduler stopped");
    }
}
