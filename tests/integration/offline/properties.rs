use std::collections::BTreeMap;

use tasksync_lib::application::ports::{LocalStore, PendingActionLog};
use tasksync_lib::domain::entities::{RecordFilter, RecordInput};
use tasksync_lib::domain::value_objects::{RecordId, SyncStatus};

use crate::common::mocks::{InMemoryRemote, RemoteCall};
use crate::common::offline_support::{
    EngineHarness, manual_settings, memory_store, payload, start_engine, tasks, title_of,
    wait_until,
};

async fn finished_cycles(engine: &EngineHarness) -> u64 {
    let metrics = engine.state.scheduler.metrics();
    metrics.total_success + metrics.total_failure + metrics.total_aborted
}

async fn reconnect_and_wait(engine: &EngineHarness) {
    let before = finished_cycles(engine).await;
    engine.monitor.report_platform_signal(true);
    wait_until(|| async { finished_cycles(engine).await > before }).await;
}

#[tokio::test]
async fn local_and_remote_converge_after_intermittent_connectivity() {
    let (store, _pool) = memory_store().await;
    let remote = InMemoryRemote::new();
    let engine = start_engine(store, remote.clone(), false, manual_settings(5)).await;
    let access = &engine.state.access;

    let a = access
        .write(&tasks(), RecordInput::create(payload("a1")))
        .await
        .unwrap();
    let b = access
        .write(&tasks(), RecordInput::create(payload("b1")))
        .await
        .unwrap();
    let c = access
        .write(&tasks(), RecordInput::create(payload("c1")))
        .await
        .unwrap();
    access
        .write(&tasks(), RecordInput::update(a.id.clone(), payload("a2"), true))
        .await
        .unwrap();
    access.delete(&tasks(), &c.id).await.unwrap();

    remote.fail_next(2);
    reconnect_and_wait(&engine).await;
    engine.monitor.report_platform_signal(false);

    access
        .write(&tasks(), RecordInput::update(b.id.clone(), payload("b2"), false))
        .await
        .unwrap();
    let d = access
        .write(&tasks(), RecordInput::create(payload("d1")))
        .await
        .unwrap();
    access.delete(&tasks(), &a.id).await.unwrap();
    remote.seed(&tasks(), payload("e1"), false);

    reconnect_and_wait(&engine).await;
    engine.sync_until_drained(10).await;
    engine.sync().await;

    let local: BTreeMap<String, (String, bool)> = engine
        .visible()
        .await
        .iter()
        .map(|record| {
            assert_eq!(record.sync_status, SyncStatus::Synced);
            assert!(!record.needs_sync);
            (record.id.as_str().to_string(), (title_of(record), record.completed))
        })
        .collect();
    let remote_rows: BTreeMap<String, (String, bool)> = remote
        .rows(&tasks())
        .iter()
        .map(|row| {
            let title = row.payload.as_json()["title"].as_str().unwrap().to_string();
            (row.id.as_str().to_string(), (title, row.completed))
        })
        .collect();

    assert_eq!(local, remote_rows);
    let titles: Vec<_> = local.values().map(|(title, _)| title.as_str()).collect();
    assert_eq!(titles.len(), 3);
    assert!(titles.contains(&"b2"));
    assert!(titles.contains(&"d1"));
    assert!(titles.contains(&"e1"));
    assert!(access.get(&tasks(), &d.id).await.unwrap().is_some());
    assert_eq!(engine.pending_count().await, 0);

    engine.state.shutdown().await;
}

#[tokio::test]
async fn create_then_update_never_reaches_remote_out_of_order() {
    let (store, _pool) = memory_store().await;
    let remote = InMemoryRemote::new();
    let engine = start_engine(store, remote.clone(), false, manual_settings(5)).await;
    let access = &engine.state.access;

    let created = access
        .write(&tasks(), RecordInput::create(payload("created")))
        .await
        .unwrap();
    access
        .write(
            &tasks(),
            RecordInput::update(created.id.clone(), payload("updated"), false),
        )
        .await
        .unwrap();

    // 最初の insert だけ失敗させ、後続の update が追い越さないことを確かめる
    remote.fail_next(1);
    reconnect_and_wait(&engine).await;
    assert_eq!(remote.mutation_count(), 1);
    assert!(remote.rows(&tasks()).is_empty());

    engine.sync_until_drained(5).await;

    let rows = remote.rows(&tasks());
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].payload.as_json()["title"], "updated");
    let mutations: Vec<_> = remote
        .calls()
        .into_iter()
        .filter(|call| !matches!(call, RemoteCall::Select { .. }))
        .collect();
    assert!(matches!(mutations[1], RemoteCall::Insert { .. }));
    assert!(matches!(mutations[2], RemoteCall::Update { .. }));

    engine.state.shutdown().await;
}

#[tokio::test]
async fn always_failing_action_is_sent_exactly_max_retry_times() {
    let (store, _pool) = memory_store().await;
    let remote = InMemoryRemote::new();
    let engine = start_engine(store, remote.clone(), true, manual_settings(3)).await;

    let record_id = RecordId::generate_offline();
    remote.reject_offline_id(&record_id);
    engine
        .state
        .access
        .write(
            &tasks(),
            RecordInput::update(record_id.clone(), payload("never accepted"), false),
        )
        .await
        .unwrap();

    for _ in 0..6 {
        engine.sync().await;
    }

    assert_eq!(remote.inserts_for(&record_id), 3);
    assert_eq!(engine.pending_count().await, 0);
    let failed = engine.store.get(&tasks(), &record_id).await.unwrap().unwrap();
    assert_eq!(failed.sync_status, SyncStatus::Failed);

    engine.state.shutdown().await;
}

#[tokio::test]
async fn retried_action_is_never_queued_twice() {
    let (store, _pool) = memory_store().await;
    let remote = InMemoryRemote::new();
    let engine = start_engine(store, remote.clone(), false, manual_settings(5)).await;

    let created = engine
        .state
        .access
        .write(&tasks(), RecordInput::create(payload("flaky")))
        .await
        .unwrap();

    remote.fail_next(3);
    reconnect_and_wait(&engine).await;
    engine.sync().await;
    engine.sync().await;

    let queued = engine.store.peek_all().await.unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].retry_count, 3);
    assert_eq!(queued[0].record_id, created.id);

    engine.sync().await;
    assert_eq!(engine.store.count().await.unwrap(), 0);
    assert_eq!(remote.rows(&tasks()).len(), 1);
    assert_eq!(remote.inserts_for(&created.id), 4);

    engine.state.shutdown().await;
}

#[tokio::test]
async fn repeated_pulls_leave_local_state_unchanged() {
    let (store, _pool) = memory_store().await;
    let remote = InMemoryRemote::new();
    remote.seed(&tasks(), payload("one"), false);
    remote.seed(&tasks(), payload("two"), true);
    let engine = start_engine(store, remote.clone(), true, manual_settings(3)).await;

    engine.sync().await;
    let first = engine
        .store
        .list(&tasks(), &RecordFilter::default())
        .await
        .unwrap();

    // 同じ行を再度プルしても結果は変わらない
    engine.sync().await;
    engine.sync().await;
    let again = engine
        .store
        .list(&tasks(), &RecordFilter::default())
        .await
        .unwrap();

    assert_eq!(first.len(), 2);
    assert_eq!(first, again);
    assert_eq!(engine.store.count().await.unwrap(), 0);
    assert_eq!(remote.mutation_count(), 0);

    engine.state.shutdown().await;
}
