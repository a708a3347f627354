//! Full control-plane round trip over a real TCP listener

use rudder::agent::{Convergence, NodeAgent};
use rudder::api::{Node, Pod};
use rudder::client::HttpClient;
use rudder::config::{AgentConfig, ApiServerConfig, SchedulerConfig};
use rudder::daemon::ApiServer;
use rudder::network::BridgeNetwork;
use rudder::runtime::{InMemoryRuntime, TaskStatus};
use rudder::scheduler::Scheduler;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

async fn start_server(cancel: &CancellationToken) -> (String, tokio::task::JoinHandle<rudder::Result<()>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = ApiServer::new(ApiServerConfig::default()).unwrap();

    let handle = tokio::spawn(server.serve(listener, cancel.clone()));
    (format!("http://{}", addr), handle)
}

#[tokio::test]
async fn test_schedule_and_run_pod() {
    let cancel = CancellationToken::new();
    let (url, server) = start_server(&cancel).await;
    let client = HttpClient::new(&url).unwrap();

    let node = client.create(&Node::new("worker-1")).await.unwrap();
    assert!(!node.metadata.uid.is_empty());

    let pod = client
        .create(&Pod::new("web").container("nginx", "docker.io/library/nginx:latest"))
        .await
        .unwrap();
    assert!(pod.is_unscheduled());
    assert!(!pod.metadata.uid.is_empty());
    assert_ne!(pod.metadata.uid, node.metadata.uid);

    let scheduler = Scheduler::new(Arc::new(client.clone()), &SchedulerConfig::default());
    let report = scheduler.tick(&cancel).await.unwrap();
    assert_eq!(report.scheduled, 1);

    let scheduled: Pod = client.get("web").await.unwrap();
    assert_eq!(scheduled.spec.node_name, "worker-1");
    assert_eq!(scheduled.metadata.uid, pod.metadata.uid);

    let runtime = InMemoryRuntime::new();
    let network = BridgeNetwork::new("10.88.0.0/16").unwrap();
    let agent = NodeAgent::new(
        Arc::new(client.clone()),
        Arc::new(runtime.clone()),
        Arc::new(network.clone()),
        &AgentConfig {
            node_name: "worker-1".to_string(),
            ..AgentConfig::default()
        },
    );

    let report = agent.tick(&cancel).await.unwrap();
    assert_eq!(report.containers.len(), 1);
    assert_eq!(report.containers[0].result, Ok(Convergence::Started));

    let containers = runtime.containers().unwrap();
    assert_eq!(containers.len(), 1);
    assert_eq!(containers[0].id, "web-nginx");

    let tasks = runtime.tasks().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].1, TaskStatus::Running);

    let attachments = network.attachments().unwrap();
    assert_eq!(attachments.len(), 1);
    assert_eq!(attachments[0].task_id, tasks[0].0.id);

    // Steady state: nothing left to schedule or start
    assert_eq!(scheduler.tick(&cancel).await.unwrap().scheduled, 0);
    let report = agent.tick(&cancel).await.unwrap();
    assert_eq!(report.containers[0].result, Ok(Convergence::AlreadyRunning));

    cancel.cancel();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_remote_errors_surface_status() {
    let cancel = CancellationToken::new();
    let (url, server) = start_server(&cancel).await;
    let client = HttpClient::new(&url).unwrap();

    let err = client
        .patch("ghost", &Pod::node_assignment("worker-1"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let err = client.create(&Pod::new("Bad Name")).await.unwrap_err();
    assert!(matches!(err, rudder::RudderError::Api { status: 400, .. }));

    let response = reqwest::get(format!("{}/services", url)).await.unwrap();
    assert_eq!(response.status().as_u16(), 404);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "This route does not exist");

    cancel.cancel();
    server.await.unwrap().unwrap();
}
