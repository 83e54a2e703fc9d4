use std::sync::Arc;
use std::time::Duration;

use tasksync_lib::application::ports::{CheckpointStore, LocalStore, PendingActionLog};
use tasksync_lib::domain::entities::{CycleOutcome, RecordInput, SyncTrigger};
use tasksync_lib::domain::value_objects::{RecordId, SyncStatus};

use crate::common::mocks::{InMemoryRemote, RemoteCall};
use crate::common::offline_support::{
    EngineHarness, manual_settings, memory_store, payload, start_engine, tasks, title_of,
    wait_until,
};

#[tokio::test]
async fn offline_create_is_pushed_after_reconnect() {
    let (store, _pool) = memory_store().await;
    let engine = start_engine(store, InMemoryRemote::new(), false, manual_settings(3)).await;

    let created = engine
        .state
        .access
        .write(&tasks(), RecordInput::create(payload("Written on the train")))
        .await
        .unwrap();
    assert!(created.id.as_str().starts_with("offline-"));
    assert_eq!(engine.pending_count().await, 1);
    assert!(engine.remote.calls().is_empty());

    engine.monitor.report_platform_signal(true);
    wait_until(|| async { engine.pending_count().await == 0 }).await;
    wait_until(|| async { !engine.state.scheduler.is_syncing() }).await;

    let remote_rows = engine.remote.rows(&tasks());
    assert_eq!(remote_rows.len(), 1);
    assert_eq!(remote_rows[0].offline_id, Some(created.id.clone()));

    let local = engine.visible().await;
    assert_eq!(local.len(), 1);
    assert_eq!(local[0].id, remote_rows[0].id);
    assert_eq!(local[0].sync_status, SyncStatus::Synced);
    assert!(!local[0].needs_sync);

    // offline 識別子でも同じレコードに解決できる
    let by_offline = engine
        .state
        .access
        .get(&tasks(), &created.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_offline.id, remote_rows[0].id);

    engine.state.shutdown().await;
}

#[tokio::test]
async fn successive_offline_updates_replay_in_order() {
    let (store, _pool) = memory_store().await;
    let engine = start_engine(store, InMemoryRemote::new(), false, manual_settings(3)).await;
    let access = &engine.state.access;

    let created = access
        .write(&tasks(), RecordInput::create(payload("first")))
        .await
        .unwrap();
    access
        .write(
            &tasks(),
            RecordInput::update(created.id.clone(), payload("second"), false),
        )
        .await
        .unwrap();
    access
        .write(
            &tasks(),
            RecordInput::update(created.id.clone(), payload("third"), true),
        )
        .await
        .unwrap();
    assert_eq!(engine.pending_count().await, 3);

    engine.monitor.report_platform_signal(true);
    wait_until(|| async { engine.pending_count().await == 0 }).await;
    wait_until(|| async { !engine.state.scheduler.is_syncing() }).await;

    let rows = engine.remote.rows(&tasks());
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].payload.as_json()["title"], "third");
    assert!(rows[0].completed);

    let mutations: Vec<_> = engine
        .remote
        .calls()
        .into_iter()
        .filter(|call| !matches!(call, RemoteCall::Select { .. }))
        .collect();
    assert_eq!(
        mutations,
        vec![
            RemoteCall::Insert {
                table: "tasks".to_string(),
                offline_id: created.id.as_str().to_string(),
            },
            RemoteCall::Update {
                table: "tasks".to_string(),
                id: rows[0].id.as_str().to_string(),
            },
            RemoteCall::Update {
                table: "tasks".to_string(),
                id: rows[0].id.as_str().to_string(),
            },
        ]
    );

    let local = engine.visible().await;
    assert_eq!(title_of(&local[0]), "third");

    engine.state.shutdown().await;
}

#[tokio::test]
async fn disconnect_between_push_and_pull_keeps_the_checkpoint() {
    let (store, _pool) = memory_store().await;
    let engine = start_engine(store, InMemoryRemote::new(), false, manual_settings(3)).await;
    engine
        .state
        .access
        .write(&tasks(), RecordInput::create(payload("pushed before the drop")))
        .await
        .unwrap();

    let monitor = engine.monitor.clone();
    engine.remote.drop_connection_on_next_select(move || {
        monitor.report_platform_signal(false);
    });

    engine.monitor.report_platform_signal(true);
    wait_until(|| async { engine.state.scheduler.metrics().total_aborted == 1 }).await;

    assert!(!engine.monitor.is_online());
    assert_eq!(engine.remote.rows(&tasks()).len(), 1);
    assert_eq!(engine.pending_count().await, 0);
    assert_eq!(engine.store.load_checkpoint().await.unwrap(), None);
    assert_eq!(engine.state.scheduler.consecutive_failures(), 0);
    let record = &engine.visible().await[0];
    assert_eq!(record.sync_status, SyncStatus::Synced);

    engine.monitor.report_platform_signal(true);
    wait_until(|| async { engine.store.load_checkpoint().await.unwrap().is_some() }).await;
    assert_eq!(engine.remote.rows(&tasks()).len(), 1);
    assert_eq!(engine.remote.mutation_count(), 1);

    engine.state.shutdown().await;
}

#[tokio::test]
async fn triggers_during_a_cycle_are_coalesced() {
    let (store, _pool) = memory_store().await;
    let remote = InMemoryRemote::new();
    remote.set_latency(Duration::from_millis(150));
    let engine = start_engine(store, remote, false, manual_settings(3)).await;
    engine
        .state
        .access
        .write(&tasks(), RecordInput::create(payload("slow network")))
        .await
        .unwrap();

    engine.monitor.report_platform_signal(true);
    wait_until(|| async { engine.state.scheduler.is_syncing() }).await;

    assert!(engine.state.scheduler.request_sync(SyncTrigger::Periodic));
    assert!(engine.state.scheduler.request_sync(SyncTrigger::LocalWrite));
    let queued = engine.state.scheduler.run(SyncTrigger::Manual).await.unwrap();
    assert_eq!(queued, CycleOutcome::Coalesced);

    let metrics = engine.state.scheduler.metrics();
    assert_eq!(metrics.total_success, 1);
    assert_eq!(metrics.last_trigger.as_deref(), Some("reconnected"));
    assert_eq!(engine.remote.mutation_count(), 1);
    assert_eq!(engine.pending_count().await, 0);

    engine.state.shutdown().await;
}

#[tokio::test]
async fn remote_changes_are_pulled_without_queueing() {
    let (store, _pool) = memory_store().await;
    let remote = InMemoryRemote::new();
    let seeded = remote.seed(&tasks(), payload("made on the web"), false);
    let engine = start_engine(store, remote, true, manual_settings(3)).await;

    let outcome = engine.sync().await;
    assert_eq!(outcome.report().unwrap().pulled_count, 1);

    let local = engine.visible().await;
    assert_eq!(local.len(), 1);
    assert_eq!(local[0].id, seeded.id);
    assert_eq!(local[0].sync_status, SyncStatus::Synced);
    assert_eq!(engine.store.count().await.unwrap(), 0);

    engine.remote.edit(&tasks(), &seeded.id, payload("edited on the web"));
    engine.sync().await;

    let local = engine.visible().await;
    assert_eq!(title_of(&local[0]), "edited on the web");
    assert_eq!(engine.store.count().await.unwrap(), 0);

    engine.state.shutdown().await;
}

#[tokio::test]
async fn rejected_record_fails_and_can_be_retried() {
    let (store, _pool) = memory_store().await;
    let remote = InMemoryRemote::new();
    let engine = start_engine(store, remote.clone(), false, manual_settings(2)).await;

    let created = engine
        .state
        .access
        .write(&tasks(), RecordInput::create(payload("violates a constraint")))
        .await
        .unwrap();
    remote.reject_offline_id(&created.id);

    engine.monitor.report_platform_signal(true);
    wait_until(|| async { engine.state.scheduler.metrics().total_success == 1 }).await;
    engine.sync().await;

    let status = engine.state.access.status().await.unwrap();
    assert_eq!(status.pending_count, 0);
    assert_eq!(status.failed_count, 1);
    assert_eq!(remote.inserts_for(&created.id), 2);
    let failed = engine.store.get(&tasks(), &created.id).await.unwrap().unwrap();
    assert_eq!(failed.sync_status, SyncStatus::Failed);
    assert!(failed.last_error.is_some());

    remote.accept_offline_id(&created.id);
    engine
        .state
        .access
        .retry_failed(&tasks(), &created.id)
        .await
        .unwrap();
    engine.sync_until_drained(3).await;

    let synced = engine.visible().await;
    assert_eq!(synced.len(), 1);
    assert_eq!(synced[0].sync_status, SyncStatus::Synced);
    assert_eq!(remote.rows(&tasks()).len(), 1);

    engine.state.shutdown().await;
}

#[tokio::test]
async fn local_write_while_online_triggers_a_cycle() {
    let (store, _pool) = memory_store().await;
    let remote = InMemoryRemote::new();
    let engine = start_engine(store, remote.clone(), true, manual_settings(3)).await;

    engine
        .state
        .access
        .write(&tasks(), RecordInput::create(payload("no manual sync")))
        .await
        .unwrap();

    wait_until(|| async { remote.rows(&tasks()).len() == 1 }).await;
    wait_until(|| async { engine.pending_count().await == 0 }).await;

    engine.state.shutdown().await;
}

#[tokio::test]
async fn delete_of_an_unsynced_record_removes_it_everywhere() {
    let (store, _pool) = memory_store().await;
    let remote = InMemoryRemote::new();
    let engine = start_engine(Arc::clone(&store), remote.clone(), false, manual_settings(3)).await;
    let access = &engine.state.access;

    let created = access
        .write(&tasks(), RecordInput::create(payload("short lived")))
        .await
        .unwrap();
    access.delete(&tasks(), &created.id).await.unwrap();

    engine.monitor.report_platform_signal(true);
    wait_until(|| async { engine.pending_count().await == 0 }).await;
    wait_until(|| async { !engine.state.scheduler.is_syncing() }).await;

    assert!(remote.rows(&tasks()).is_empty());
    assert!(store.get(&tasks(), &created.id).await.unwrap().is_none());

    engine.state.shutdown().await;
}

async fn drop_create_of_caller_named_record(
    engine: &EngineHarness,
    remote: &InMemoryRemote,
) -> RecordId {
    let caller_id = RecordId::new("client-42".to_string()).unwrap();
    remote.reject_offline_id(&caller_id);
    engine
        .state
        .access
        .write(
            &tasks(),
            RecordInput::update(caller_id.clone(), payload("named by the caller"), false),
        )
        .await
        .unwrap();

    engine.monitor.report_platform_signal(true);
    wait_until(|| async { engine.state.scheduler.metrics().total_success == 1 }).await;
    let failed = engine.store.get(&tasks(), &caller_id).await.unwrap().unwrap();
    assert_eq!(failed.sync_status, SyncStatus::Failed);
    assert_eq!(engine.pending_count().await, 0);

    remote.accept_offline_id(&caller_id);
    caller_id
}

fn sent_updates(remote: &InMemoryRemote) -> usize {
    remote
        .calls()
        .iter()
        .filter(|call| matches!(call, RemoteCall::Update { .. }))
        .count()
}

#[tokio::test]
async fn retried_caller_named_record_is_inserted_after_its_create_was_dropped() {
    let (store, _pool) = memory_store().await;
    let remote = InMemoryRemote::new();
    let engine = start_engine(store, remote.clone(), false, manual_settings(1)).await;
    let caller_id = drop_create_of_caller_named_record(&engine, &remote).await;

    engine
        .state
        .access
        .retry_failed(&tasks(), &caller_id)
        .await
        .unwrap();
    engine.sync_until_drained(3).await;

    let rows = remote.rows(&tasks());
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].offline_id, Some(caller_id.clone()));
    assert_eq!(sent_updates(&remote), 0);

    let local = engine.visible().await;
    assert_eq!(local.len(), 1);
    assert_eq!(local[0].id, rows[0].id);
    assert_eq!(local[0].sync_status, SyncStatus::Synced);
    assert!(!local[0].needs_sync);

    engine.state.shutdown().await;
}

#[tokio::test]
async fn later_edit_of_caller_named_record_reaches_the_remote() {
    let (store, _pool) = memory_store().await;
    let remote = InMemoryRemote::new();
    let engine = start_engine(store, remote.clone(), false, manual_settings(1)).await;
    let caller_id = drop_create_of_caller_named_record(&engine, &remote).await;

    engine
        .state
        .access
        .write(
            &tasks(),
            RecordInput::update(caller_id.clone(), payload("edited later"), true),
        )
        .await
        .unwrap();
    engine.sync_until_drained(3).await;

    let rows = remote.rows(&tasks());
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].payload.as_json()["title"], "edited later");
    assert!(rows[0].completed);
    assert_eq!(sent_updates(&remote), 0);
    assert_eq!(title_of(&engine.visible().await[0]), "edited later");

    engine.state.shutdown().await;
}
