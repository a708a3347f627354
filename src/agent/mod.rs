//! Node agent
//!
//! Polls the API server for the pods assigned to this node and converges
//! one task per declared container. Failures stay local to the container
//! that caused them; the next tick is the retry.

pub mod converge;

pub use converge::{Convergence, Converger};

use crate::api::{FieldSelector, HasMetadata};
use crate::client::ClusterApi;
use crate::config::AgentConfig;
use crate::error::Result;
use crate::network::NetworkAttacher;
use crate::runtime::ContainerRuntime;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Result of converging one container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerOutcome {
    /// Owning pod
    pub pod: String,
    /// Runtime container ID
    pub container_id: String,
    /// What happened, or why it failed
    pub result: std::result::Result<Convergence, String>,
}

/// Outcome of one agent pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Pods assigned to this node
    pub pods: usize,
    /// Per-container results, in pod and declaration order
    pub containers: Vec<ContainerOutcome>,
}

impl TickReport {
    /// Containers that converged this tick
    pub fn converged(&self) -> usize {
        self.containers.iter().filter(|c| c.result.is_ok()).count()
    }

    /// Containers that failed this tick
    pub fn failed(&self) -> usize {
        self.containers.iter().filter(|c| c.result.is_err()).count()
    }
}

/// Per-node convergence loop
pub struct NodeAgent {
    api: Arc<dyn ClusterApi>,
    runtime: Arc<dyn ContainerRuntime>,
    network: Arc<dyn NetworkAttacher>,
    node_name: String,
    interval: Duration,
}

impl NodeAgent {
    pub fn new(
        api: Arc<dyn ClusterApi>,
        runtime: Arc<dyn ContainerRuntime>,
        network: Arc<dyn NetworkAttacher>,
        config: &AgentConfig,
    ) -> Self {
        Self {
            api,
            runtime,
            network,
            node_name: config.node_name.clone(),
            interval: config.interval,
        }
    }

    /// Node this agent manages
    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// Run one convergence pass over this node's pods.
    ///
    /// Only listing pods can fail the tick. Cancellation is checked before
    /// listing, before each container and between the state-changing steps
    /// of convergence; a container interrupted that way is reported as failed.
    pub async fn tick(&self, cancel: &CancellationToken) -> Result<TickReport> {
        let mut report = TickReport::default();
        if cancel.is_cancelled() {
            return Ok(report);
        }

        let selector = FieldSelector::new("spec.nodeName", &self.node_name);
        let pods = self.api.list_pods(&selector).await?;
        report.pods = pods.len();

        let converger = Converger::new(self.runtime.as_ref(), self.network.as_ref());

        'pods: for pod in &pods {
            for container in &pod.spec.containers {
                if cancel.is_cancelled() {
                    break 'pods;
                }

                let container_id = pod.container_id(container);
                let result = match converger.converge(&container_id, &container.image, cancel).await {
                    Ok(outcome) => {
                        if outcome != Convergence::AlreadyRunning {
                            info!(pod = %pod.name(), container = %container_id, outcome = %outcome, "Converged container");
                        }
                        Ok(outcome)
                    }
                    Err(e) => {
                        warn!(pod = %pod.name(), container = %container_id, error = %e, "Failed to converge container");
                        Err(e.to_string())
                    }
                };

                report.containers.push(ContainerOutcome {
                    pod: pod.name().to_string(),
                    container_id,
                    result,
                });
            }
        }

        Ok(report)
    }

    /// Tick until `cancel` fires
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(node = %self.node_name, interval_ms = self.interval.as_millis() as u64, "Node agent started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    match self.tick(&cancel).await {
                        Ok(report) => debug!(
                            pods = report.pods,
                            converged = report.converged(),
                            failed = report.failed(),
                            "Agent tick complete"
                        ),
                        Err(e) => error!(node = %self.node_name, error = %e, "Agent tick failed"),
                    }
                }
            }
        }

        info!(node = %self.node_name, "Node agent stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Pod;
    use crate::client::LocalCluster;
    use crate::network::BridgeNetwork;
    use crate::registry::MemoryRegistry;
    use crate::runtime::{InMemoryRuntime, TaskStatus};

    struct Fixture {
        cluster: LocalCluster,
        runtime: InMemoryRuntime,
        network: BridgeNetwork,
        agent: NodeAgent,
    }

    fn fixture(node: &str) -> Fixture {
        let cluster = LocalCluster::new(Arc::new(MemoryRegistry::new()));
        let runtime = InMemoryRuntime::new();
        let network = BridgeNetwork::new("10.88.0.0/16").unwrap();
        let config = AgentConfig {
            node_name: node.to_string(),
            ..AgentConfig::default()
        };
        let agent = NodeAgent::new(
            Arc::new(cluster.clone()),
            Arc::new(runtime.clone()),
            Arc::new(network.clone()),
            &config,
        );

        Fixture {
            cluster,
            runtime,
            network,
            agent,
        }
    }

    async fn place(cluster: &LocalCluster, pod: Pod, node: &str) {
        let mut pod = pod;
        pod.spec.node_name = node.to_string();
        cluster.pods().create(pod).await.unwrap();
    }

    #[tokio::test]
    async fn test_converges_only_own_pods() {
        let f = fixture("worker-1");
        place(
            &f.cluster,
            Pod::new("web").container("nginx", "nginx").container("sidecar", "envoy"),
            "worker-1",
        )
        .await;
        place(&f.cluster, Pod::new("db").container("postgres", "postgres"), "worker-2").await;
        f.cluster.pods().create(Pod::new("queued").container("app", "app")).await.unwrap();

        let report = f.agent.tick(&CancellationToken::new()).await.unwrap();

        assert_eq!(report.pods, 1);
        assert_eq!(report.converged(), 2);
        let ids: Vec<&str> = report.containers.iter().map(|c| c.container_id.as_str()).collect();
        assert_eq!(ids, vec!["web-nginx", "web-sidecar"]);
        assert!(report
            .containers
            .iter()
            .all(|c| c.result == Ok(Convergence::Started)));

        assert_eq!(f.runtime.containers().unwrap().len(), 2);
        assert_eq!(f.runtime.running_count().unwrap(), 2);
        assert_eq!(f.network.attachments().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_second_tick_is_steady() {
        let f = fixture("worker-1");
        place(&f.cluster, Pod::new("web").container("nginx", "nginx"), "worker-1").await;
        let cancel = CancellationToken::new();

        f.agent.tick(&cancel).await.unwrap();
        let report = f.agent.tick(&cancel).await.unwrap();

        assert_eq!(report.containers[0].result, Ok(Convergence::AlreadyRunning));
        assert_eq!(f.runtime.tasks().unwrap().len(), 1);
        assert_eq!(f.network.attachments().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_crashed_task_is_replaced() {
        let f = fixture("worker-1");
        place(&f.cluster, Pod::new("web").container("nginx", "nginx"), "worker-1").await;
        let cancel = CancellationToken::new();

        f.agent.tick(&cancel).await.unwrap();
        let first_pid = f.runtime.tasks().unwrap()[0].0.pid;
        f.runtime.set_task_status("web-nginx", TaskStatus::Stopped).unwrap();

        let report = f.agent.tick(&cancel).await.unwrap();

        assert_eq!(
            report.containers[0].result,
            Ok(Convergence::Restarted(TaskStatus::Stopped))
        );
        let (task, status) = f.runtime.tasks().unwrap().remove(0);
        assert_eq!(status, TaskStatus::Running);
        assert_ne!(task.pid, first_pid);
        assert_eq!(f.network.attachments().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_isolated_to_container() {
        let f = fixture("worker-1");
        f.runtime.block_pull("private/app").unwrap();
        place(
            &f.cluster,
            Pod::new("web").container("app", "private/app").container("nginx", "nginx"),
            "worker-1",
        )
        .await;
        place(&f.cluster, Pod::new("api").container("server", "api"), "worker-1").await;

        let report = f.agent.tick(&CancellationToken::new()).await.unwrap();

        assert_eq!(report.pods, 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.converged(), 2);
        assert_eq!(f.runtime.running_count().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_tick_does_nothing() {
        let f = fixture("worker-1");
        place(&f.cluster, Pod::new("web").container("nginx", "nginx"), "worker-1").await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = f.agent.tick(&cancel).await.unwrap();
        assert!(report.containers.is_empty());
        assert!(f.runtime.containers().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_teardown_failure_isolated_to_container() {
        let cluster = LocalCluster::new(Arc::new(MemoryRegistry::new()));
        let (runtime, mut network, _log) = converge::testing::recording();
        network.fail_detach = Some("web-nginx".to_string());
        let runtime = Arc::new(runtime);
        let agent = NodeAgent::new(
            Arc::new(cluster.clone()),
            runtime.clone(),
            Arc::new(network),
            &AgentConfig {
                node_name: "worker-1".to_string(),
                ..AgentConfig::default()
            },
        );
        place(&cluster, Pod::new("web").container("nginx", "nginx"), "worker-1").await;
        place(&cluster, Pod::new("api").container("server", "api"), "worker-1").await;
        let cancel = CancellationToken::new();

        assert_eq!(agent.tick(&cancel).await.unwrap().converged(), 2);
        runtime.inner.set_task_status("web-nginx", TaskStatus::Stopped).unwrap();
        runtime.inner.set_task_status("api-server", TaskStatus::Stopped).unwrap();

        let report = agent.tick(&cancel).await.unwrap();

        let outcome = |id: &str| {
            report
                .containers
                .iter()
                .find(|c| c.container_id == id)
                .map(|c| c.result.clone())
                .unwrap()
        };
        assert!(outcome("web-nginx").is_err());
        assert_eq!(outcome("api-server"), Ok(Convergence::Restarted(TaskStatus::Stopped)));

        let tasks = runtime.inner.tasks().unwrap();
        let status = |id: &str| tasks.iter().find(|(t, _)| t.container_id == id).unwrap().1;
        assert_eq!(status("web-nginx"), TaskStatus::Stopped);
        assert_eq!(status("api-server"), TaskStatus::Running);
    }
}
