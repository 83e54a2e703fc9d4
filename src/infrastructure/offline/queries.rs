pub(super) const SELECT_RECORD_BY_ID: &str = r#"
    SELECT table_name, record_id, offline_id, payload, completed, created_at, updated_at,
           needs_sync, sync_status, is_deleted, last_error
    FROM local_records
    WHERE table_name = ?1 AND (record_id = ?2 OR offline_id = ?2)
    ORDER BY (record_id = ?2) DESC
    LIMIT 1
"#;

pub(super) const SELECT_PROMOTED_ID: &str = r#"
    SELECT record_id FROM local_records
    WHERE table_name = ?1 AND offline_id = ?2 AND record_id <> ?2
    LIMIT 1
"#;

pub(super) const SELECT_RECORDS_BY_TABLE: &str = r#"
    SELECT table_name, record_id, offline_id, payload, completed, created_at, updated_at,
           needs_sync, sync_status, is_deleted, last_error
    FROM local_records
    WHERE table_name = ?1
      AND is_deleted = 0
      AND (?2 IS NULL OR completed = ?2)
      AND (?3 IS NULL OR sync_status = ?3)
    ORDER BY created_at ASC, record_id ASC
    LIMIT ?4
"#;

pub(super) const SELECT_UNSYNCED_RECORDS: &str = r#"
    SELECT table_name, record_id, offline_id, payload, completed, created_at, updated_at,
           needs_sync, sync_status, is_deleted, last_error
    FROM local_records
    WHERE needs_sync = 1
    ORDER BY updated_at ASC
"#;

pub(super) const SELECT_KNOWN_TABLES: &str = r#"
    SELECT table_name FROM local_records
    UNION
    SELECT target_table FROM pending_actions
    ORDER BY 1
"#;

pub(super) const UPSERT_LOCAL_RECORD: &str = r#"
    INSERT INTO local_records (
        table_name, record_id, offline_id, payload, completed, created_at, updated_at,
        needs_sync, sync_status, is_deleted, last_error
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
    ON CONFLICT(table_name, record_id) DO UPDATE SET
        offline_id = COALESCE(local_records.offline_id, excluded.offline_id),
        payload = excluded.payload,
        completed = excluded.completed,
        updated_at = excluded.updated_at,
        needs_sync = excluded.needs_sync,
        sync_status = excluded.sync_status,
        is_deleted = excluded.is_deleted,
        last_error = excluded.last_error
"#;

pub(super) const UPSERT_REMOTE_RECORD: &str = r#"
    INSERT INTO local_records (
        table_name, record_id, offline_id, payload, completed, created_at, updated_at,
        needs_sync, sync_status, is_deleted, last_error
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, 'synced', 0, NULL)
    ON CONFLICT(table_name, record_id) DO UPDATE SET
        offline_id = COALESCE(local_records.offline_id, excluded.offline_id),
        payload = excluded.payload,
        completed = excluded.completed,
        created_at = excluded.created_at,
        updated_at = excluded.updated_at,
        needs_sync = 0,
        sync_status = 'synced',
        is_deleted = 0,
        last_error = NULL
"#;

pub(super) const UPDATE_SYNC_STATE: &str = r#"
    UPDATE local_records
    SET sync_status = ?3, needs_sync = ?4, last_error = ?5
    WHERE table_name = ?1 AND record_id = ?2
"#;

pub(super) const DELETE_RECORD: &str = r#"
    DELETE FROM local_records
    WHERE table_name = ?1 AND record_id = ?2
"#;

pub(super) const RENAME_RECORD: &str = r#"
    UPDATE local_records
    SET record_id = ?3
    WHERE table_name = ?1 AND record_id = ?2
"#;

pub(super) const RENAME_ACTION_TARGET: &str = r#"
    UPDATE pending_actions
    SET record_id = ?3
    WHERE target_table = ?1 AND record_id = ?2
"#;

pub(super) const RESET_SYNCING_RECORDS: &str = r#"
    UPDATE local_records
    SET sync_status = 'pending'
    WHERE sync_status = 'syncing'
"#;

pub(super) const COUNT_RECORDS_BY_STATUS: &str = r#"
    SELECT COUNT(*) FROM local_records WHERE sync_status = ?1
"#;

pub(super) const INSERT_PENDING_ACTION: &str = r#"
    INSERT INTO pending_actions (
        action_kind, target_table, record_id, payload, retry_count, created_at, updated_at
    ) VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)
"#;

pub(super) const SELECT_PENDING_ACTIONS: &str = r#"
    SELECT id, action_kind, target_table, record_id, payload, retry_count, last_error,
           created_at, updated_at
    FROM pending_actions
    ORDER BY id ASC
"#;

pub(super) const DELETE_PENDING_ACTION: &str = r#"
    DELETE FROM pending_actions WHERE id = ?1
"#;

pub(super) const INCREMENT_ACTION_RETRY: &str = r#"
    UPDATE pending_actions
    SET retry_count = retry_count + 1, last_error = ?2, updated_at = ?3
    WHERE id = ?1
    RETURNING retry_count
"#;

pub(super) const COUNT_PENDING_ACTIONS: &str = r#"
    SELECT COUNT(*) FROM pending_actions
"#;

pub(super) const EXISTS_PENDING_FOR_RECORD: &str = r#"
    SELECT EXISTS(
        SELECT 1 FROM pending_actions WHERE target_table = ?1 AND record_id = ?2
    )
"#;

pub(super) const SELECT_CHECKPOINT: &str = r#"
    SELECT checkpoint FROM sync_checkpoints WHERE scope = ?1
"#;

pub(super) const UPSERT_CHECKPOINT: &str = r#"
    INSERT INTO sync_checkpoints (scope, checkpoint, updated_at)
    VALUES (?1, ?2, ?3)
    ON CONFLICT(scope) DO UPDATE SET
        checkpoint = excluded.checkpoint,
        updated_at = excluded.updated_at
"#;
