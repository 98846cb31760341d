use anyhow::{Context, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, error};

use crate::record::{Record, RecordUpdate};

/// Semantic operations the pipeline requires of the record store.
///
/// `query` returns every record of a table projected to the requested
/// fields, `batch_update` patches several records in one request and
/// `update` patches a single record, optionally asking the store to coerce
/// value types.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn query(&self, table: &str, fields: &[&str]) -> anyhow::Result<Vec<Record>>;

    async fn batch_update(&self, table: &str, updates: &[RecordUpdate]) -> anyhow::Result<()>;

    async fn update(
        &self,
        table: &str,
        id: &str,
        fields: Map<String, Value>,
        typecast: bool,
    ) -> anyhow::Result<()>;
}

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    records: Vec<Record>,
    #[serde(default)]
    offset: Option<String>,
}

/// Record store backed by the Airtable REST API.
pub struct AirtableStore {
    client: Client,
    base_url: String,
    base_id: String,
    api_key: String,
}

impl AirtableStore {
    pub fn new(
        base_url: impl Into<String>,
        base_id: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            base_id: base_id.into(),
            api_key: api_key.into(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.base_id, table)
    }

    async fn check(resp: reqwest::Response, what: &str) -> anyhow::Result<reqwest::Response> {
        if resp.status().is_success() {
            Ok(resp)
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            error!(%status, %body, "record store error");
            Err(anyhow!("{what} failed with {status}: {body}"))
        }
    }
}

#[async_trait]
impl RecordStore for AirtableStore {
    async fn query(&self, table: &str, fields: &[&str]) -> anyhow::Result<Vec<Record>> {
        let url = self.table_url(table);
        let mut records = Vec::new();
        let mut offset: Option<String> = None;
        loop {
            let mut query: Vec<(&str, String)> = fields
                .iter()
                .map(|f| ("fields[]", f.to_string()))
                .collect();
            if let Some(o) = &offset {
                query.push(("offset", o.clone()));
            }
            debug!(%table, page_offset = ?offset, "listing records");
            let resp = self
                .client
                .get(&url)
                .bearer_auth(&self.api_key)
                .query(&query)
                .send()
                .await
                .context("record store list request failed")?;
            let page: ListResponse = Self::check(resp, "list").await?.json().await?;
            records.extend(page.records);
            match page.offset {
                Some(o) => offset = Some(o),
                None => break,
            }
        }
        Ok(records)
    }

    async fn batch_update(&self, table: &str, updates: &[RecordUpdate]) -> anyhow::Result<()> {
        debug!(%table, count = updates.len(), "batch update");
        let resp = self
            .client
            .patch(self.table_url(table))
            .bearer_auth(&self.api_key)
            .json(&json!({ "records": updates }))
            .send()
            .await
            .context("record store batch update failed")?;
        Self::check(resp, "batch update").await?;
        Ok(())
    }

    async fn update(
        &self,
        table: &str,
        id: &str,
        fields: Map<String, Value>,
        typecast: bool,
    ) -> anyhow::Result<()> {
        debug!(%table, %id, "update record");
        let resp = self
            .client
            .patch(format!("{}/{}", self.table_url(table), id))
            .bearer_auth(&self.api_key)
            .json(&json!({ "fields": fields, "typecast": typecast }))
            .send()
            .await
            .context("record store update failed")?;
        Self::check(resp, "update").await?;
        Ok(())
    }
}

/// In-memory implementation used for tests. Mimics the API without
/// persistence and records every write it receives.
#[derive(Default)]
pub struct InMemoryRecordStore {
    tables: Mutex<HashMap<String, Vec<Record>>>,
    /// Table names for which single-record updates must fail.
    fail_updates_for: Mutex<Vec<String>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, table: &str, record: Record) {
        self.tables
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .push(record);
    }

    pub fn records(&self, table: &str) -> Vec<Record> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn record(&self, table: &str, id: &str) -> Option<Record> {
        self.records(table).into_iter().find(|r| r.id == id)
    }

    pub fn fail_updates_for(&self, table: &str) {
        self.fail_updates_for
            .lock()
            .unwrap()
            .push(table.to_string());
    }

    fn apply(&self, table: &str, id: &str, fields: &Map<String, Value>) -> anyhow::Result<()> {
        let mut tables = self.tables.lock().unwrap();
        let records = tables
            .get_mut(table)
            .ok_or_else(|| anyhow!("unknown table {table}"))?;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| anyhow!("unknown record {id}"))?;
        for (k, v) in fields {
            record.fields.insert(k.clone(), v.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn query(&self, table: &str, _fields: &[&str]) -> anyhow::Result<Vec<Record>> {
        Ok(self.records(table))
    }

    async fn batch_update(&self, table: &str, updates: &[RecordUpdate]) -> anyhow::Result<()> {
        for update in updates {
            self.apply(table, &update.id, &update.fields)?;
        }
        Ok(())
    }

    async fn update(
        &self,
        table: &str,
        id: &str,
        fields: Map<String, Value>,
        _typecast: bool,
    ) -> anyhow::Result<()> {
        if self
            .fail_updates_for
            .lock()
            .unwrap()
            .iter()
            .any(|t| t == table)
        {
            return Err(anyhow!("simulated update failure"));
        }
        self.apply(table, id, &fields)
    }
}
