use tasksync_lib::application::ports::{LocalStore, PendingActionLog, RemoteClient};
use tasksync_lib::domain::entities::RecordInput;
use tasksync_lib::domain::value_objects::SyncStatus;

use crate::common::mocks::InMemoryRemote;
use crate::common::offline_support::{
    manual_settings, memory_store, payload, start_engine, tasks, wait_until,
};

#[tokio::test]
async fn queued_writes_survive_a_restart() {
    let (store, _pool) = memory_store().await;
    let remote = InMemoryRemote::new();

    let engine = start_engine(store.clone(), remote.clone(), false, manual_settings(3)).await;
    let first = engine
        .state
        .access
        .write(&tasks(), RecordInput::create(payload("before restart 1")))
        .await
        .unwrap();
    let second = engine
        .state
        .access
        .write(&tasks(), RecordInput::create(payload("before restart 2")))
        .await
        .unwrap();
    engine.state.shutdown().await;

    let restarted = start_engine(store, remote.clone(), false, manual_settings(3)).await;
    assert_eq!(restarted.state.recovery_report.pending_action_count, 2);
    assert_eq!(restarted.pending_count().await, 2);

    restarted.monitor.report_platform_signal(true);
    wait_until(|| async { restarted.pending_count().await == 0 }).await;

    assert_eq!(remote.inserts_for(&first.id), 1);
    assert_eq!(remote.inserts_for(&second.id), 1);
    assert_eq!(remote.rows(&tasks()).len(), 2);

    restarted.state.shutdown().await;
}

#[tokio::test]
async fn records_left_syncing_by_a_crash_return_to_pending() {
    let (store, _pool) = memory_store().await;
    let remote = InMemoryRemote::new();

    let engine = start_engine(store.clone(), remote.clone(), false, manual_settings(3)).await;
    let record = engine
        .state
        .access
        .write(&tasks(), RecordInput::create(payload("interrupted")))
        .await
        .unwrap();
    engine.state.shutdown().await;
    store
        .set_sync_state(&tasks(), &record.id, SyncStatus::Syncing, true, None)
        .await
        .unwrap();

    let restarted = start_engine(store.clone(), remote, false, manual_settings(3)).await;

    assert_eq!(restarted.state.recovery_report.reverted_syncing_count, 1);
    let recovered = store.get(&tasks(), &record.id).await.unwrap().unwrap();
    assert_eq!(recovered.sync_status, SyncStatus::Pending);
    assert!(recovered.needs_sync);
    assert_eq!(restarted.pending_count().await, 1);

    restarted.state.shutdown().await;
}

#[tokio::test]
async fn flagged_record_without_queued_action_is_requeued() {
    let (store, pool) = memory_store().await;
    let remote = InMemoryRemote::new();

    let engine = start_engine(store.clone(), remote.clone(), false, manual_settings(3)).await;
    let record = engine
        .state
        .access
        .write(&tasks(), RecordInput::create(payload("lost its action")))
        .await
        .unwrap();
    engine.state.shutdown().await;
    sqlx::query("DELETE FROM pending_actions")
        .execute(pool.get_pool())
        .await
        .unwrap();

    let restarted = start_engine(store.clone(), remote.clone(), false, manual_settings(3)).await;

    assert_eq!(
        restarted.state.recovery_report.requeued_record_ids,
        vec![format!("tasks/{}", record.id)]
    );
    assert_eq!(restarted.pending_count().await, 1);

    restarted.monitor.report_platform_signal(true);
    wait_until(|| async { restarted.pending_count().await == 0 }).await;
    assert_eq!(remote.inserts_for(&record.id), 1);

    restarted.state.shutdown().await;
}

#[tokio::test]
async fn create_accepted_before_a_crash_is_not_duplicated() {
    let (store, _pool) = memory_store().await;
    let remote = InMemoryRemote::new();

    let engine = start_engine(store.clone(), remote.clone(), false, manual_settings(3)).await;
    let record = engine
        .state
        .access
        .write(&tasks(), RecordInput::create(payload("sent twice")))
        .await
        .unwrap();
    engine.state.shutdown().await;

    // リモートは受理したが、応答を受け取る前にプロセスが落ちた状態
    remote
        .insert(&tasks(), &record.id, &record.snapshot())
        .await
        .unwrap();
    assert_eq!(store.count().await.unwrap(), 1);

    let restarted = start_engine(store.clone(), remote.clone(), true, manual_settings(3)).await;
    restarted.sync_until_drained(3).await;

    let rows = remote.rows(&tasks());
    assert_eq!(rows.len(), 1);
    let local = restarted.visible().await;
    assert_eq!(local.len(), 1);
    assert_eq!(local[0].id, rows[0].id);
    assert_eq!(local[0].offline_id, Some(record.id.clone()));

    restarted.state.shutdown().await;
}
