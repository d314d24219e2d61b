//! ERP data access: the store trait handlers talk to, and an in-memory implementation.

use std::collections::BTreeMap;

use async_trait::async_trait;
use direkt_core::{ErrorCode, HandlerError};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::RwLock;

use super::records::Filter;

/// One stored row: field name -> JSON value. The `id` field is owned by the store.
pub type Record = Map<String, Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Categories,
    Orders,
    OrderLines,
    /// Delivery delay codes: `code`, `label`, `active`.
    Availability,
}

impl Table {
    pub fn as_str(self) -> &'static str {
        match self {
            Table::Categories => "categories",
            Table::Orders => "orders",
            Table::OrderLines => "order_lines",
            Table::Availability => "availability",
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("query on {table} failed: {message}")]
    Query { table: &'static str, message: String },
}

impl From<StoreError> for HandlerError {
    fn from(e: StoreError) -> Self {
        tracing::warn!(error = %e, "store error");
        HandlerError::Code(ErrorCode::Sql)
    }
}

/// Persistence collaborator of the ERP handler groups.
#[async_trait]
pub trait ErpStore: Send + Sync {
    async fn fetch(&self, table: Table, id: i64) -> Result<Option<Record>, StoreError>;

    /// Rows matching `filter`, in ascending id order.
    async fn list(&self, table: Table, filter: &Filter) -> Result<Vec<Record>, StoreError>;

    /// Insert and return the new id.
    async fn insert(&self, table: Table, record: Record) -> Result<i64, StoreError>;

    /// Merge `fields` into the row. `false` when there is no such row.
    async fn update(&self, table: Table, id: i64, fields: Record) -> Result<bool, StoreError>;

    /// `false` when there is no such row.
    async fn delete(&self, table: Table, id: i64) -> Result<bool, StoreError>;
}

#[derive(Default)]
struct Tables {
    rows: BTreeMap<Table, BTreeMap<i64, Record>>,
    next_id: BTreeMap<Table, i64>,
}

/// Availability codes a fresh ERP ships with.
pub const DEFAULT_AVAILABILITY: [(&str, &str); 4] = [
    ("AV_NOW", "Immediate"),
    ("AV_1W", "1 week"),
    ("AV_2W", "2 weeks"),
    ("AV_3W", "3 weeks"),
];

/// Store kept in process memory. Ids start at 1 per table.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Empty tables, except availability which holds [`DEFAULT_AVAILABILITY`].
    pub fn new() -> Self {
        let mut tables = Tables::default();
        let rows: BTreeMap<i64, Record> = DEFAULT_AVAILABILITY
            .iter()
            .zip(1..)
            .map(|((code, label), id)| {
                let mut row = Record::new();
                row.insert("id".into(), Value::from(id));
                row.insert("code".into(), Value::from(*code));
                row.insert("label".into(), Value::from(*label));
                row.insert("active".into(), Value::from(1));
                (id, row)
            })
            .collect();
        tables.next_id.insert(Table::Availability, rows.len() as i64);
        tables.rows.insert(Table::Availability, rows);
        Self {
            tables: RwLock::new(tables),
        }
    }
}

#[async_trait]
impl ErpStore for MemoryStore {
    async fn fetch(&self, table: Table, id: i64) -> Result<Option<Record>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.rows.get(&table).and_then(|rows| rows.get(&id)).cloned())
    }

    async fn list(&self, table: Table, filter: &Filter) -> Result<Vec<Record>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .rows
            .get(&table)
            .map(|rows| rows.values().filter(|r| filter.matches(r)).cloned().collect())
            .unwrap_or_default())
    }

    async fn insert(&self, table: Table, mut record: Record) -> Result<i64, StoreError> {
        let mut tables = self.tables.write().await;
        let next = tables.next_id.entry(table).or_insert(0);
        *next += 1;
        let id = *next;
        record.insert("id".into(), Value::from(id));
        tables.rows.entry(table).or_default().insert(id, record);
        Ok(id)
    }

    async fn update(&self, table: Table, id: i64, fields: Record) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(row) = tables.rows.get_mut(&table).and_then(|rows| rows.get_mut(&id)) else {
            return Ok(false);
        };
        for (key, value) in fields {
            if key != "id" {
                row.insert(key, value);
            }
        }
        Ok(true)
    }

    async fn delete(&self, table: Table, id: i64) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .rows
            .get_mut(&table)
            .is_some_and(|rows| rows.remove(&id).is_some()))
    }
}
