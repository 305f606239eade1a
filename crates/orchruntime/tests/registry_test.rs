mod common;

use common::{FnAgent, LifecycleAgent};
use orchcore::{AgentState, RegistryError};
use orchruntime::AgentRegistry;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

#[tokio::test]
async fn test_register_and_get() {
    let registry = AgentRegistry::new();
    let agent = LifecycleAgent::new("task.extract");
    registry.register(agent.clone()).await.unwrap();

    assert_eq!(registry.len().await, 1);
    assert_eq!(agent.initializations(), 1);
    let fetched = registry.get("task.extract").await.unwrap();
    assert_eq!(fetched.id(), "task.extract");
    assert!(registry.contains("task.extract").await);
}

#[tokio::test]
async fn test_duplicate_registration_is_rejected() {
    let registry = AgentRegistry::new();
    registry.register(LifecycleAgent::new("dup")).await.unwrap();

    let second = LifecycleAgent::new("dup");
    let err = registry.register(second.clone()).await.unwrap_err();

    assert_eq!(err, RegistryError::DuplicateAgent("dup".to_string()));
    assert_eq!(registry.len().await, 1);
    assert_eq!(second.initializations(), 0, "duplicate must not be initialized");
}

#[tokio::test]
async fn test_failed_initialization_leaves_registry_unchanged() {
    let registry = AgentRegistry::new();
    registry.register(LifecycleAgent::new("ok")).await.unwrap();

    let err = registry
        .register(LifecycleAgent::failing_init("broken"))
        .await
        .unwrap_err();

    assert!(matches!(err, RegistryError::InitializationFailed { ref agent_id, .. } if agent_id == "broken"));
    assert_eq!(registry.len().await, 1);
    assert!(!registry.contains("broken").await);
}

#[tokio::test]
async fn test_get_missing_agent() {
    let registry = AgentRegistry::new();
    let err = registry.get("nope").await.err().unwrap();
    assert_eq!(err, RegistryError::AgentNotFound("nope".to_string()));
}

#[tokio::test]
async fn test_get_all_is_sorted() {
    let registry = AgentRegistry::new();
    for id in ["cost.estimate", "resource.analyze", "task.extract"] {
        registry.register(FnAgent::returning(id, json!({}))).await.unwrap();
    }

    let ids: Vec<String> = registry
        .get_all()
        .await
        .iter()
        .map(|a| a.id().to_string())
        .collect();
    assert_eq!(ids, vec!["cost.estimate", "resource.analyze", "task.extract"]);

    let descriptors = registry.descriptors().await;
    assert!(descriptors.iter().all(|d| d.state == AgentState::Ready));
}

#[tokio::test]
async fn test_clear_disposes_each_agent_once() {
    let registry = AgentRegistry::new();
    let a = LifecycleAgent::new("a");
    let b = LifecycleAgent::new("b");
    registry.register(a.clone()).await.unwrap();
    registry.register(b.clone()).await.unwrap();

    let disposed = registry.clear().await;
    assert_eq!(disposed.len(), 2);
    assert!(disposed.iter().all(|d| d.state == AgentState::Disposed));
    assert_eq!(a.cleanups(), 1);
    assert_eq!(b.cleanups(), 1);
    assert!(registry.get_all().await.is_empty());

    // Second clear is a no-op
    assert!(registry.clear().await.is_empty());
    assert_eq!(a.cleanups(), 1);
    assert_eq!(b.cleanups(), 1);
    assert!(registry.is_empty().await);
}

#[tokio::test]
async fn test_failing_cleanup_does_not_stop_clear() {
    let registry = AgentRegistry::new();
    let broken = LifecycleAgent::failing_cleanup("a.broken");
    let healthy = LifecycleAgent::new("b.healthy");
    registry.register(broken.clone()).await.unwrap();
    registry.register(healthy.clone()).await.unwrap();

    let disposed = registry.clear().await;

    assert_eq!(broken.cleanups(), 1);
    assert_eq!(healthy.cleanups(), 1);
    let ids: Vec<&str> = disposed.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["a.broken", "b.healthy"]);
    assert!(disposed.iter().all(|d| d.state == AgentState::Disposed));
    assert!(registry.is_empty().await);
    assert!(registry.descriptors().await.is_empty());
}

#[tokio::test]
async fn test_slow_initialization_is_visible_and_does_not_block_lookups() {
    let registry = Arc::new(AgentRegistry::new());
    registry.register(LifecycleAgent::new("ready")).await.unwrap();

    let gate = Arc::new(Notify::new());
    let slow = LifecycleAgent::gated("slow", gate.clone());
    let pending = {
        let registry = registry.clone();
        let slow = slow.clone();
        tokio::spawn(async move { registry.register(slow).await })
    };

    let mut seen_pending = false;
    for _ in 0..100 {
        let descriptors = registry.descriptors().await;
        if descriptors
            .iter()
            .any(|d| d.id == "slow" && d.state == AgentState::Uninitialized)
        {
            seen_pending = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(seen_pending, "reservation never became visible");

    // Lookups proceed while `slow` is still initializing
    let ready = tokio::time::timeout(Duration::from_secs(1), registry.get("ready"))
        .await
        .expect("lookup blocked by initialization");
    assert!(ready.is_ok());
    assert_eq!(
        registry.get("slow").await.err(),
        Some(RegistryError::AgentNotFound("slow".to_string()))
    );
    assert_eq!(registry.len().await, 1);

    // A second registration under the reserved id is rejected uninitialized
    let duplicate = LifecycleAgent::new("slow");
    assert_eq!(
        registry.register(duplicate.clone()).await.unwrap_err(),
        RegistryError::DuplicateAgent("slow".to_string())
    );
    assert_eq!(duplicate.initializations(), 0);

    gate.notify_one();
    pending.await.unwrap().unwrap();

    assert_eq!(slow.initializations(), 1);
    assert_eq!(registry.len().await, 2);
    assert!(registry
        .descriptors()
        .await
        .iter()
        .all(|d| d.state == AgentState::Ready));
}
