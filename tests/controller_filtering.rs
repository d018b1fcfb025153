//! Live path: filter policy, submission and runtime reconfiguration.

mod helpers;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use helpers::{
    controller_with, full_exchange, request_only_exchange, service, settings, RejectingStore,
};
use traffic_indexer::exchange::{Exchange, ToolFlags};
use traffic_indexer::storage::InMemoryStore;
use traffic_indexer::{ErrorType, IndexSettings, InfoType, StoreError, TaskFailure};

#[tokio::test]
async fn test_proxy_responses_only_policy() {
    let store = Arc::new(InMemoryStore::new());
    let (controller, stats) =
        controller_with(store.clone(), &settings(ToolFlags::PROXY, true)).await;

    // Request notification from the proxy: dropped.
    assert!(controller
        .on_exchange(ToolFlags::PROXY, true, request_only_exchange("/req"))
        .is_none());

    // Response notification from the proxy: indexed.
    let handle = controller
        .on_exchange(ToolFlags::PROXY, false, full_exchange("/resp"))
        .expect("response from proxy is accepted");
    let id = handle.await.expect("document stored");
    assert!(!id.is_empty());

    // Scanner is not selected.
    assert!(controller
        .on_exchange(ToolFlags::SCANNER, false, full_exchange("/scan"))
        .is_none());

    assert_eq!(stats.get_info_count(InfoType::ExchangeFiltered), 2);
    assert_eq!(stats.get_info_count(InfoType::DocumentIndexed), 1);
    let docs = store.documents(&controller.index());
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0]["request"]["url"], "https://shop.example.com/resp");
    assert_eq!(docs[0]["response"]["status"], 200);
}

#[tokio::test]
async fn test_requests_accepted_when_not_responses_only() {
    let store = Arc::new(InMemoryStore::new());
    let tools = ToolFlags::PROXY | ToolFlags::REPEATER;
    let (controller, _) = controller_with(store.clone(), &settings(tools, false)).await;

    let a = controller
        .on_exchange(ToolFlags::PROXY, true, request_only_exchange("/a"))
        .unwrap();
    let b = controller
        .on_exchange(ToolFlags::REPEATER, false, full_exchange("/b"))
        .unwrap();
    a.await.unwrap();
    b.await.unwrap();
    assert_eq!(store.document_count(&controller.index()), 2);
}

#[tokio::test]
async fn test_empty_exchange_is_not_submitted() {
    let store = Arc::new(InMemoryStore::new());
    let (controller, stats) = controller_with(store, &settings(ToolFlags::PROXY, false)).await;
    assert!(controller
        .on_exchange(ToolFlags::PROXY, false, Exchange::new(service()))
        .is_none());
    assert_eq!(stats.get_info_count(InfoType::ExchangeSkipped), 1);
}

#[tokio::test]
async fn test_store_rejection_surfaces_through_handle() {
    let store = Arc::new(RejectingStore::new("/bad"));
    let (controller, stats) =
        controller_with(store.clone(), &settings(ToolFlags::PROXY, true)).await;

    let bad = controller
        .on_exchange(ToolFlags::PROXY, false, full_exchange("/bad"))
        .unwrap();
    let good = controller
        .on_exchange(ToolFlags::PROXY, false, full_exchange("/good"))
        .unwrap();

    match bad.await {
        Err(TaskFailure::Failed(e)) => {
            assert!(format!("{:#}", e).contains("rejected by test store"));
        }
        other => panic!("expected a failed task, got {:?}", other),
    }
    good.await.expect("later exchange still indexed");

    assert_eq!(store.single_writes.load(Ordering::SeqCst), 2);
    assert_eq!(stats.get_error_count(ErrorType::StoreRejected), 1);
    assert_eq!(store.stored(&controller.index()).len(), 1);
}

#[tokio::test]
async fn test_live_path_uses_capture_time() {
    let store = Arc::new(InMemoryStore::new());
    let (controller, _) = controller_with(store.clone(), &settings(ToolFlags::PROXY, true)).await;

    let at = Utc.with_ymd_and_hms(2021, 6, 1, 12, 0, 0).unwrap();
    let exchange = full_exchange("/t").with_captured_at(at);
    controller
        .on_exchange(ToolFlags::PROXY, false, exchange)
        .unwrap()
        .await
        .unwrap();

    let docs = store.documents(&controller.index());
    assert_eq!(
        docs[0]["timestamp"],
        serde_json::to_value(at.fixed_offset()).unwrap()
    );
    // The live path never moves the bulk carry.
    assert!(controller.last_timestamp().is_none());
}

#[tokio::test]
async fn test_apply_config_switches_index_and_policy() {
    let store = Arc::new(InMemoryStore::new());
    let (controller, _) = controller_with(store.clone(), &settings(ToolFlags::PROXY, true)).await;
    let first = controller.index();
    assert_eq!(first.as_str(), "wase-burp-tests");

    let next = IndexSettings {
        project: "Second Round".to_string(),
        tools: ToolFlags::SCANNER,
        responses_only: false,
        ..Default::default()
    };
    let index = controller.apply_config(&next).await.unwrap();
    assert_eq!(index.as_str(), "wase-burp-second-round");
    assert_eq!(controller.index(), index);

    assert!(controller
        .on_exchange(ToolFlags::PROXY, false, full_exchange("/p"))
        .is_none());
    controller
        .on_exchange(ToolFlags::SCANNER, true, request_only_exchange("/s"))
        .unwrap()
        .await
        .unwrap();

    assert_eq!(store.document_count(&first), 0);
    assert_eq!(store.document_count(&index), 1);
}

#[tokio::test]
async fn test_failed_apply_config_keeps_previous_settings() {
    let store = Arc::new(InMemoryStore::new());
    let (controller, _) = controller_with(store, &settings(ToolFlags::PROXY, true)).await;
    let before = controller.index();

    let broken = IndexSettings {
        prefix: "__".to_string(),
        project: String::new(),
        tools: ToolFlags::SCANNER,
        ..Default::default()
    };
    let err = controller.apply_config(&broken).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidIndexName(_)));

    assert_eq!(controller.index(), before);
    assert!(controller.policy().accepts(ToolFlags::PROXY, false));
    assert!(!controller.policy().accepts(ToolFlags::SCANNER, false));
}
