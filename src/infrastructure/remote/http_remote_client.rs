use super::error::{RemoteError, Result as RemoteResult};
use crate::application::ports::RemoteClient;
use crate::domain::entities::{RecordSnapshot, RemoteRecord};
use crate::domain::value_objects::{RecordId, RecordPayload, TableName};
use crate::shared::config::RemoteConfig;
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, Method, RequestBuilder};
use serde_json::{Map, Value};
use std::time::Duration;

const REST_PREFIX: &str = "/rest/v1";
const ROW_FIELDS: [&str; 5] = ["id", "offline_id", "completed", "created_at", "updated_at"];

/// PostgREST 形式の REST API を話すリモートクライアント。
#[derive(Clone)]
pub struct HttpRemoteClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpRemoteClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| AppError::ConfigurationError(err.to_string()))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    pub fn from_config(config: &RemoteConfig) -> Result<Self, AppError> {
        Self::new(
            config.base_url.clone(),
            config.api_key.clone(),
            Duration::from_secs(config.request_timeout),
        )
    }

    fn request(&self, method: Method, table: &TableName) -> RequestBuilder {
        let url = format!("{}{}/{}", self.base_url, REST_PREFIX, table);
        let builder = self.client.request(method, url);
        match &self.api_key {
            Some(key) => builder.header("apikey", key).bearer_auth(key),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> RemoteResult<String> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(RemoteError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl RemoteClient for HttpRemoteClient {
    async fn insert(
        &self,
        table: &TableName,
        offline_id: &RecordId,
        snapshot: &RecordSnapshot,
    ) -> Result<RemoteRecord, AppError> {
        let mut row = encode_fields(snapshot);
        row.insert("offline_id".into(), Value::String(offline_id.to_string()));
        row.insert(
            "created_at".into(),
            Value::String(format_timestamp(snapshot.created_at)),
        );

        // offline_id の一意制約で重複挿入を吸収する
        let builder = self
            .request(Method::POST, table)
            .query(&[("on_conflict", "offline_id")])
            .header("Prefer", "return=representation,resolution=merge-duplicates")
            .json(&Value::Object(row));

        tracing::debug!(target: "remote::http", table = %table, offline_id = %offline_id, "insert");
        let body = self.send(builder).await?;
        let rows = decode_rows(&body)?;
        let record = rows.into_iter().next().ok_or_else(|| {
            RemoteError::InvalidResponse(format!("insert into {table} returned no rows"))
        })?;
        Ok(record)
    }

    async fn update(
        &self,
        table: &TableName,
        id: &RecordId,
        patch: &RecordSnapshot,
    ) -> Result<(), AppError> {
        let builder = self
            .request(Method::PATCH, table)
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=minimal")
            .json(&Value::Object(encode_fields(patch)));

        tracing::debug!(target: "remote::http", table = %table, record_id = %id, "update");
        self.send(builder).await?;
        Ok(())
    }

    async fn delete(&self, table: &TableName, id: &RecordId) -> Result<(), AppError> {
        let builder = self
            .request(Method::DELETE, table)
            .query(&[("id", format!("eq.{id}"))]);

        tracing::debug!(target: "remote::http", table = %table, record_id = %id, "delete");
        self.send(builder).await?;
        Ok(())
    }

    async fn delete_by_offline_id(
        &self,
        table: &TableName,
        offline_id: &RecordId,
    ) -> Result<(), AppError> {
        let builder = self
            .request(Method::DELETE, table)
            .query(&[("offline_id", format!("eq.{offline_id}"))]);

        tracing::debug!(
            target: "remote::http",
            table = %table,
            offline_id = %offline_id,
            "delete by offline id"
        );
        self.send(builder).await?;
        Ok(())
    }

    async fn select_since(
        &self,
        table: &TableName,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RemoteRecord>, AppError> {
        let mut params = vec![
            ("select", "*".to_string()),
            ("order", "updated_at.asc".to_string()),
        ];
        if let Some(since) = since {
            params.push(("updated_at", format!("gte.{}", format_timestamp(since))));
        }
        let builder = self.request(Method::GET, table).query(&params);

        let body = self.send(builder).await?;
        let rows = decode_rows(&body)?;
        tracing::debug!(
            target: "remote::http",
            table = %table,
            since = ?since,
            rows = rows.len(),
            "select since checkpoint"
        );
        Ok(rows)
    }
}

fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// ペイロードのフィールドを行の列として平坦化する。予約列はペイロードより優先する。
fn encode_fields(snapshot: &RecordSnapshot) -> Map<String, Value> {
    let mut row = match snapshot.payload.as_json() {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    for field in ROW_FIELDS {
        row.remove(field);
    }
    row.insert("completed".into(), Value::Bool(snapshot.completed));
    row
}

fn decode_rows(body: &str) -> RemoteResult<Vec<RemoteRecord>> {
    let rows: Vec<Value> =
        serde_json::from_str(body).map_err(|err| RemoteError::Decode(err.to_string()))?;
    rows.into_iter().map(decode_row).collect()
}

fn decode_row(row: Value) -> RemoteResult<RemoteRecord> {
    let Value::Object(mut fields) = row else {
        return Err(RemoteError::Decode("row is not a JSON object".into()));
    };

    let id = match fields.remove("id") {
        Some(Value::String(id)) => id,
        Some(Value::Number(id)) => id.to_string(),
        other => {
            return Err(RemoteError::Decode(format!("row has no usable id: {other:?}")));
        }
    };
    let id = RecordId::new(id).map_err(RemoteError::Decode)?;

    let offline_id = match fields.remove("offline_id") {
        Some(Value::String(value)) if !value.is_empty() => {
            Some(RecordId::new(value).map_err(RemoteError::Decode)?)
        }
        _ => None,
    };
    let completed = fields
        .remove("completed")
        .and_then(|value| value.as_bool())
        .unwrap_or(false);
    let updated_at = parse_timestamp(fields.remove("updated_at"), "updated_at")?
        .ok_or_else(|| RemoteError::Decode(format!("row {id} has no updated_at")))?;
    let created_at = parse_timestamp(fields.remove("created_at"), "created_at")?.unwrap_or(updated_at);

    let payload = RecordPayload::new(Value::Object(fields)).map_err(RemoteError::Decode)?;

    Ok(RemoteRecord {
        id,
        offline_id,
        payload,
        completed,
        created_at,
        updated_at,
    })
}

fn parse_timestamp(value: Option<Value>, field: &str) -> RemoteResult<Option<DateTime<Utc>>> {
    match value {
        Some(Value::String(raw)) => DateTime::parse_from_rfc3339(&raw)
            .map(|parsed| Some(parsed.with_timezone(&Utc)))
            .map_err(|err| RemoteError::Decode(format!("invalid {field} '{raw}': {err}"))),
        Some(Value::Null) | None => Ok(None),
        Some(other) => Err(RemoteError::Decode(format!(
            "invalid {field}: {other}"
        ))),
    }
}
