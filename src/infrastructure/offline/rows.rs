use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct LocalRecordRow {
    pub table_name: String,
    pub record_id: String,
    pub offline_id: Option<String>,
    pub payload: String,
    pub completed: bool,
    pub created_at: i64,
    pub updated_at: i64,
    pub needs_sync: bool,
    pub sync_status: String,
    pub is_deleted: bool,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct PendingActionRow {
    pub id: i64,
    pub action_kind: String,
    pub target_table: String,
    pub record_id: String,
    pub payload: String,
    pub retry_count: i64,
    pub last_error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}
