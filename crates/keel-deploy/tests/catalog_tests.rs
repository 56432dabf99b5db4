//! Service catalog publishing tests

mod common;

use common::*;
use keel_deploy::{DeploymentOrchestrator, HandlerChain};
use std::path::Path;
use std::sync::Arc;

fn simple_bundle(repository: &Path, name: &str) -> std::path::PathBuf {
    BundleBuilder::new(name)
        .depends_on("svc", None)
        .artifact(ArtifactBuilder::new("svc"))
        .pack(repository, &format!("{}.car", name))
}

fn catalog_orchestrator(
    env: &TestEnv,
    publisher: &RecordingPublisher,
    handlers: HandlerChain,
) -> DeploymentOrchestrator {
    DeploymentOrchestrator::builder(env.config.clone())
        .handlers(handlers)
        .catalog_publisher(Arc::new(publisher.clone()))
        .build()
}

#[tokio::test]
async fn test_initial_pass_runs_once_all_bundles_are_processed() {
    let env = TestEnv::new().with_catalog();
    let publisher = RecordingPublisher::new();
    let orchestrator = catalog_orchestrator(&env, &publisher, HandlerChain::empty());
    let alpha = simple_bundle(env.repository(), "alpha");
    let beta = simple_bundle(env.repository(), "beta");

    orchestrator.deploy(&alpha).await.unwrap();
    assert!(!orchestrator.catalog_initialized());

    orchestrator.deploy(&beta).await.unwrap();
    assert!(orchestrator.catalog_initialized());

    orchestrator.shutdown().await;
    let initial = publisher.initial_jobs();
    assert_eq!(initial.len(), 1);
    assert_eq!(initial[0].bundle_name, None);
    assert_eq!(initial[0].repository, env.repository());
    assert_eq!(
        initial[0].config.endpoint.as_deref(),
        Some("http://catalog.local")
    );
    assert!(publisher.incremental_bundles().is_empty());
}

#[tokio::test]
async fn test_later_deployments_publish_incrementally() {
    let env = TestEnv::new().with_catalog();
    let publisher = RecordingPublisher::new();
    let orchestrator = catalog_orchestrator(&env, &publisher, HandlerChain::empty());
    let alpha = simple_bundle(env.repository(), "alpha");
    orchestrator.deploy(&alpha).await.unwrap();

    let gamma = simple_bundle(env.repository(), "gamma");
    let delta = simple_bundle(env.repository(), "delta");
    orchestrator.deploy(&gamma).await.unwrap();
    orchestrator.deploy(&delta).await.unwrap();

    // Undeploy never publishes
    orchestrator.undeploy(&gamma).await.unwrap();

    orchestrator.shutdown().await;
    assert_eq!(publisher.initial_jobs().len(), 1);
    assert_eq!(publisher.incremental_bundles(), vec!["gamma.car", "delta.car"]);
}

#[tokio::test]
async fn test_faulty_bundles_count_towards_initial_pass() {
    let env = TestEnv::new().with_catalog();
    let publisher = RecordingPublisher::new();
    let log = CallLog::new();
    let chain = HandlerChain::builder()
        .register(MockHandler::new("broken", &log).failing_deploy())
        .build();
    let orchestrator = catalog_orchestrator(&env, &publisher, chain);
    let alpha = simple_bundle(env.repository(), "alpha");

    orchestrator.deploy(&alpha).await.unwrap();

    assert!(orchestrator.catalog_initialized());
    orchestrator.shutdown().await;
    assert_eq!(publisher.initial_jobs().len(), 1);
}

#[tokio::test]
async fn test_not_ready_bundle_holds_back_initial_pass() {
    let env = TestEnv::new().with_catalog();
    let publisher = RecordingPublisher::new();
    let orchestrator = catalog_orchestrator(&env, &publisher, HandlerChain::empty());
    let alpha = simple_bundle(env.repository(), "alpha");
    let broken = BundleBuilder::new("broken")
        .depends_on("missing", None)
        .pack(env.repository(), "broken.car");

    orchestrator.deploy(&alpha).await.unwrap();
    orchestrator.deploy(&broken).await.unwrap();

    assert!(!orchestrator.catalog_initialized());
    orchestrator.shutdown().await;
    assert!(publisher.jobs().is_empty());
}

#[tokio::test]
async fn test_disabled_catalog_publishes_nothing() {
    let env = TestEnv::new();
    let publisher = RecordingPublisher::new();
    let orchestrator = catalog_orchestrator(&env, &publisher, HandlerChain::empty());
    let alpha = simple_bundle(env.repository(), "alpha");

    orchestrator.deploy(&alpha).await.unwrap();

    assert!(!orchestrator.catalog_initialized());
    orchestrator.shutdown().await;
    assert!(publisher.jobs().is_empty());
}
