mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use common::{local_dev, service, test_config, topology, Behavior, CallKind, FakeRuntime};
use tl_core::error::LauncherError;
use tl_core::models::{EdgeKind, LaunchEvent, RunState, ServiceDefinition};
use tl_core::services::graph::DependencyGraph;
use tl_core::services::launcher::TopologyLauncher;

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

#[tokio::test(start_paused = true)]
async fn dependents_start_after_dependencies_are_ready() {
    let runtime = Arc::new(FakeRuntime::new(&[
        ("azure-storage", Behavior::ReadyAfter(secs(2))),
        ("kafka", Behavior::ReadyAfter(secs(3))),
        ("schema-registry", Behavior::ReadyAfter(secs(1))),
        ("pyspark-notebook", Behavior::ReadyAfter(secs(1))),
    ]));
    let launcher = TopologyLauncher::new(runtime.clone(), test_config());

    let report = launcher.launch_topology(&local_dev()).await.unwrap();
    assert_eq!(report.count(RunState::Ready), 4);

    let start = |s: &str| runtime.time_of(CallKind::Start, s).unwrap();
    let ready = |s: &str| runtime.time_of(CallKind::Ready, s).unwrap();

    // Independent services start together.
    assert_eq!(start("azure-storage"), start("kafka"));
    assert!(start("schema-registry") >= ready("kafka"));
    assert!(start("pyspark-notebook") >= ready("kafka"));
    assert!(start("pyspark-notebook") >= ready("azure-storage"));
    // Registry does not wait for storage.
    assert!(start("schema-registry") < ready("kafka") + secs(1));
}

#[tokio::test(start_paused = true)]
async fn failed_dependency_skips_transitive_dependents() {
    let runtime = Arc::new(FakeRuntime::new(&[
        ("azure-storage", Behavior::ReadyAfter(secs(1))),
        ("kafka", Behavior::NeverReady),
    ]));
    let launcher = TopologyLauncher::new(runtime.clone(), test_config());

    let report = launcher.launch_topology(&local_dev()).await.unwrap();

    assert_eq!(report.state("azure-storage"), Some(RunState::Ready));
    assert_eq!(report.state("kafka"), Some(RunState::Failed));
    assert_eq!(
        report.state("schema-registry"),
        Some(RunState::SkippedDueToDependencyFailure)
    );
    assert_eq!(
        report.state("pyspark-notebook"),
        Some(RunState::SkippedDueToDependencyFailure)
    );
    let kafka_reason = report.services["kafka"].reason.clone().unwrap();
    assert!(kafka_reason.contains("not ready within 5s"), "{kafka_reason}");

    let started = runtime.services_with(CallKind::Start);
    assert!(!started.contains(&"schema-registry".to_string()));
    assert!(!started.contains(&"pyspark-notebook".to_string()));
}

#[tokio::test(start_paused = true)]
async fn skip_cascades_through_chains() {
    let runtime = Arc::new(FakeRuntime::new(&[("kafka", Behavior::StartFails)]));
    let launcher = TopologyLauncher::new(runtime.clone(), test_config());
    let topology = topology(vec![
        service("kafka", &[], None),
        service("schema-registry", &["kafka"], None),
        service("redpanda-console", &["schema-registry"], None),
        service("azurite", &[], None),
    ]);

    let report = launcher.launch_topology(&topology).await.unwrap();
    assert_eq!(report.state("kafka"), Some(RunState::Failed));
    assert!(report.services["kafka"]
        .reason
        .as_deref()
        .unwrap()
        .contains("pull access denied"));
    assert_eq!(
        report.state("redpanda-console"),
        Some(RunState::SkippedDueToDependencyFailure)
    );
    assert_eq!(report.state("azurite"), Some(RunState::Ready));
}

#[tokio::test(start_paused = true)]
async fn failed_dependency_skips_without_waiting_for_slower_ones() {
    let runtime = Arc::new(FakeRuntime::new(&[
        ("azure-storage", Behavior::NeverReady),
        ("kafka", Behavior::StartFails),
    ]));
    let mut config = test_config();
    config.readiness_timeout = secs(120);
    let launcher = TopologyLauncher::new(runtime.clone(), config);
    let cancel = launcher.cancel_token();
    let topology = topology(vec![
        service("azure-storage", &[], None),
        service("kafka", &[], None),
        service("pyspark-notebook", &["azure-storage", "kafka"], None),
    ]);

    let task = {
        let launcher = launcher.clone();
        tokio::spawn(async move { launcher.launch_topology(&topology).await })
    };

    tokio::time::sleep(secs(10)).await;
    let snapshot = launcher.snapshot().await;
    assert_eq!(snapshot.state("azure-storage"), Some(RunState::Starting));
    assert_eq!(snapshot.state("kafka"), Some(RunState::Failed));
    assert_eq!(
        snapshot.state("pyspark-notebook"),
        Some(RunState::SkippedDueToDependencyFailure)
    );
    assert!(snapshot.services["pyspark-notebook"]
        .reason
        .as_deref()
        .unwrap()
        .contains("'kafka'"));

    cancel.cancel();
    let report = match task.await.unwrap() {
        Err(LauncherError::NoServiceReady(report)) => report,
        other => panic!("expected NoServiceReady, got {other:?}"),
    };
    assert_eq!(report.state("azure-storage"), Some(RunState::Cancelled));
    assert_eq!(
        report.state("pyspark-notebook"),
        Some(RunState::SkippedDueToDependencyFailure)
    );
}

#[tokio::test(start_paused = true)]
async fn per_service_timeout_overrides_default() {
    let runtime = Arc::new(FakeRuntime::new(&[("kafka", Behavior::ReadyAfter(secs(30)))]));
    let launcher = TopologyLauncher::new(runtime.clone(), test_config());
    let mut kafka = service("kafka", &[], None);
    kafka.readiness_timeout_secs = Some(60);

    let report = launcher.launch_topology(&topology(vec![kafka])).await.unwrap();
    assert_eq!(report.state("kafka"), Some(RunState::Ready));
}

#[tokio::test(start_paused = true)]
async fn no_ready_service_fails_with_report() {
    let runtime = Arc::new(FakeRuntime::new(&[
        ("kafka", Behavior::StartFails),
        ("schema-registry", Behavior::ReadyAfter(secs(1))),
    ]));
    let launcher = TopologyLauncher::new(runtime, test_config());
    let topology = topology(vec![
        service("kafka", &[], None),
        service("schema-registry", &["kafka"], None),
    ]);

    match launcher.launch_topology(&topology).await {
        Err(LauncherError::NoServiceReady(report)) => {
            assert_eq!(report.state("kafka"), Some(RunState::Failed));
            assert_eq!(
                report.state("schema-registry"),
                Some(RunState::SkippedDueToDependencyFailure)
            );
        }
        other => panic!("expected NoServiceReady, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn unknown_dependency_aborts_before_starting() {
    let runtime = Arc::new(FakeRuntime::default());
    let launcher = TopologyLauncher::new(runtime.clone(), test_config());
    let topology = topology(vec![service("azurite", &[], None)]);

    let mut graph = DependencyGraph::new();
    graph.add_service("azurite");
    graph.add_edge("azurite", "kafka", EdgeKind::WaitFor).unwrap();

    let result = launcher.launch(topology.definitions(), &graph).await;
    assert!(matches!(result, Err(LauncherError::UnknownService { .. })));
    assert!(runtime.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn empty_launch_is_successful() {
    let launcher = TopologyLauncher::new(Arc::new(FakeRuntime::default()), test_config());
    let definitions: Vec<ServiceDefinition> = Vec::new();
    let report = launcher
        .launch(&definitions, &DependencyGraph::new())
        .await
        .unwrap();
    assert!(report.services.is_empty());
}

#[tokio::test(start_paused = true)]
async fn parent_edges_impose_no_start_order() {
    let runtime = Arc::new(FakeRuntime::new(&[
        ("kafka", Behavior::NeverReady),
        ("kafka-connect", Behavior::ReadyAfter(secs(1))),
    ]));
    let launcher = TopologyLauncher::new(runtime.clone(), test_config());
    let topology = topology(vec![
        service("kafka", &[], None),
        service("kafka-connect", &[], Some("kafka")),
    ]);

    let report = launcher.launch_topology(&topology).await.unwrap();
    assert_eq!(report.state("kafka"), Some(RunState::Failed));
    assert_eq!(report.state("kafka-connect"), Some(RunState::Ready));
    assert_eq!(
        runtime.time_of(CallKind::Start, "kafka"),
        runtime.time_of(CallKind::Start, "kafka-connect")
    );
}

#[tokio::test(start_paused = true)]
async fn cancel_stops_started_services_in_reverse_order() {
    let runtime = Arc::new(FakeRuntime::new(&[
        ("azure-storage", Behavior::ReadyAfter(secs(1))),
        ("kafka", Behavior::NeverReady),
    ]));
    let mut config = test_config();
    config.readiness_timeout = secs(60);
    let launcher = TopologyLauncher::new(runtime.clone(), config);
    let cancel = launcher.cancel_token();

    let topology = local_dev();
    let task = {
        let launcher = launcher.clone();
        tokio::spawn(async move { launcher.launch_topology(&topology).await })
    };

    tokio::time::sleep(secs(5)).await;
    cancel.cancel();
    let report = task.await.unwrap().unwrap();

    assert_eq!(report.state("azure-storage"), Some(RunState::Ready));
    assert_eq!(report.state("kafka"), Some(RunState::Cancelled));
    assert_eq!(report.state("schema-registry"), Some(RunState::Cancelled));
    assert_eq!(report.state("pyspark-notebook"), Some(RunState::Cancelled));
    assert_eq!(
        runtime.services_with(CallKind::Stop),
        vec!["kafka", "azure-storage"]
    );
    assert!(launcher.running().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn launch_after_cancel_starts_normally() {
    let runtime = Arc::new(FakeRuntime::new(&[("kafka", Behavior::NeverReady)]));
    let mut config = test_config();
    config.readiness_timeout = secs(60);
    let launcher = TopologyLauncher::new(runtime.clone(), config);
    let first = launcher.cancel_token();

    let stuck = topology(vec![service("kafka", &[], None)]);
    let task = {
        let launcher = launcher.clone();
        tokio::spawn(async move { launcher.launch_topology(&stuck).await })
    };
    tokio::time::sleep(secs(2)).await;
    first.cancel();
    match task.await.unwrap() {
        Err(LauncherError::NoServiceReady(report)) => {
            assert_eq!(report.state("kafka"), Some(RunState::Cancelled));
        }
        other => panic!("expected NoServiceReady, got {other:?}"),
    }

    assert!(!launcher.cancel_token().is_cancelled());
    let report = launcher
        .launch_topology(&topology(vec![service("azurite", &[], None)]))
        .await
        .unwrap();
    assert_eq!(report.state("azurite"), Some(RunState::Ready));
}

#[tokio::test(start_paused = true)]
async fn stop_service_cascades_to_children_deepest_first() {
    let runtime = Arc::new(FakeRuntime::default());
    let launcher = TopologyLauncher::new(runtime.clone(), test_config());
    let topology = topology(vec![
        service("kafka", &[], None),
        service("schema-registry", &["kafka"], Some("kafka")),
        service("redpanda-console", &[], Some("schema-registry")),
        service("azurite", &[], None),
    ]);
    launcher.launch_topology(&topology).await.unwrap();

    let stopped = launcher.stop_service("kafka").await.unwrap();
    assert_eq!(stopped, vec!["redpanda-console", "schema-registry", "kafka"]);
    assert_eq!(runtime.services_with(CallKind::Stop), stopped);

    // Already stopped services are skipped.
    assert!(launcher.stop_service("kafka").await.unwrap().is_empty());
    assert!(matches!(
        launcher.stop_service("cosmos").await,
        Err(LauncherError::ServiceNotFound(_))
    ));

    launcher.shutdown().await.unwrap();
    assert_eq!(
        runtime.services_with(CallKind::Stop).last().map(String::as_str),
        Some("azurite")
    );
}

#[tokio::test(start_paused = true)]
async fn shutdown_uses_reverse_topological_order() {
    let runtime = Arc::new(FakeRuntime::default());
    let launcher = TopologyLauncher::new(runtime.clone(), test_config());
    launcher.launch_topology(&local_dev()).await.unwrap();

    launcher.shutdown().await.unwrap();
    assert_eq!(
        runtime.services_with(CallKind::Stop),
        vec!["pyspark-notebook", "schema-registry", "kafka", "azure-storage"]
    );
}

#[tokio::test(start_paused = true)]
async fn events_report_each_transition() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let runtime = Arc::new(FakeRuntime::new(&[("kafka", Behavior::ReadyAfter(secs(1)))]));
    let launcher = TopologyLauncher::new(runtime, test_config()).with_events(tx);
    let topology = topology(vec![
        service("kafka", &[], None),
        service("schema-registry", &["kafka"], None),
    ]);
    launcher.launch_topology(&topology).await.unwrap();
    drop(launcher);

    let mut kafka_states = Vec::new();
    let mut started = Vec::new();
    while let Some(event) = rx.recv().await {
        match event {
            LaunchEvent::StateChanged { service, state, .. } if service == "kafka" => {
                kafka_states.push(state)
            }
            LaunchEvent::ContainerStarted { handle } => started.push(handle.service),
            _ => {}
        }
    }
    assert_eq!(kafka_states, vec![RunState::Starting, RunState::Ready]);
    assert_eq!(started, vec!["kafka", "schema-registry"]);
}

#[tokio::test(start_paused = true)]
async fn snapshot_tracks_timestamps() {
    let runtime = Arc::new(FakeRuntime::default());
    let launcher = TopologyLauncher::new(runtime, test_config());
    launcher
        .launch_topology(&topology(vec![service("azurite", &[], None)]))
        .await
        .unwrap();

    let snapshot = launcher.snapshot().await;
    let azurite = &snapshot.services["azurite"];
    assert_eq!(azurite.state, RunState::Ready);
    assert!(azurite.started_at.is_some());
    assert!(azurite.ready_at.is_some());
    assert!(azurite.reason.is_none());
}
