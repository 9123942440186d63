//! Generic document store over SQLite.
//!
//! Documents are JSON rows keyed by collection table. The billing core
//! consumes this through the [`DocumentStore`] trait so tests can swap in
//! doubles; uniqueness of external ids is enforced by expression indexes
//! independent of the find-then-branch upsert.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::types::Value as SqlValue;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::DbPool;
use crate::error::{AppError, Result};

pub mod collections {
    pub const USERS: &str = "users";
    pub const SESSIONS: &str = "sessions";
    pub const PRODUCTS: &str = "products";
    pub const PRICES: &str = "prices";
    pub const SUBSCRIPTIONS: &str = "subscriptions";

    pub const ALL: &[&str] = &[USERS, SESSIONS, PRODUCTS, PRICES, SUBSCRIPTIONS];
}

/// Structured filter expression over document fields.
#[derive(Debug, Clone)]
pub enum Filter {
    Eq(String, Value),
    In(String, Vec<Value>),
    And(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Filter::Eq(field.to_string(), value.into())
    }

    pub fn any_in(field: &str, values: Vec<Value>) -> Self {
        Filter::In(field.to_string(), values)
    }

    fn sql(&self, params: &mut Vec<SqlValue>) -> String {
        match self {
            Filter::Eq(field, value) => {
                params.push(json_to_sql(value));
                format!("json_extract(data, '$.{}') = ?", field)
            }
            Filter::In(field, values) => {
                if values.is_empty() {
                    // Empty IN matches nothing.
                    return "0 = 1".to_string();
                }
                let placeholders: Vec<&str> = values
                    .iter()
                    .map(|v| {
                        params.push(json_to_sql(v));
                        "?"
                    })
                    .collect();
                format!(
                    "json_extract(data, '$.{}') IN ({})",
                    field,
                    placeholders.join(", ")
                )
            }
            Filter::And(filters) => {
                let clauses: Vec<String> = filters.iter().map(|f| f.sql(params)).collect();
                if clauses.is_empty() {
                    "1 = 1".to_string()
                } else {
                    format!("({})", clauses.join(" AND "))
                }
            }
        }
    }
}

fn json_to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(*b as i64),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Integer(i)
            } else {
                SqlValue::Real(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

/// The storage contract the billing core consumes.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        limit: Option<u32>,
    ) -> Result<Vec<Value>>;

    async fn create(&self, collection: &str, data: Value) -> Result<Value>;

    /// Shallow-merges `data` onto the stored document and returns the
    /// updated document.
    async fn update(&self, collection: &str, id: &str, data: Value) -> Result<Value>;
}

pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn check_collection(collection: &str) -> Result<()> {
        if collections::ALL.contains(&collection) {
            Ok(())
        } else {
            Err(AppError::store(collection, "unknown collection"))
        }
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        limit: Option<u32>,
    ) -> Result<Vec<Value>> {
        Self::check_collection(collection)?;
        let conn = self.pool.get()?;

        let mut params: Vec<SqlValue> = Vec::new();
        let where_clause = filter.sql(&mut params);
        let mut sql = format!("SELECT data FROM {} WHERE {}", collection, where_clause);
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| AppError::store(collection, e))?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(params), |row| {
                row.get::<_, String>(0)
            })
            .map_err(|e| AppError::store(collection, e))?;

        let mut docs = Vec::new();
        for raw in rows {
            let raw = raw.map_err(|e| AppError::store(collection, e))?;
            docs.push(serde_json::from_str(&raw).map_err(|e| AppError::store(collection, e))?);
        }
        Ok(docs)
    }

    async fn create(&self, collection: &str, data: Value) -> Result<Value> {
        Self::check_collection(collection)?;
        let conn = self.pool.get()?;

        let mut doc = match data {
            Value::Object(map) => map,
            _ => return Err(AppError::store(collection, "document must be an object")),
        };

        let id = doc
            .get("id")
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let now = Utc::now().to_rfc3339();
        doc.insert("id".to_string(), Value::String(id.clone()));
        doc.insert("createdAt".to_string(), Value::String(now.clone()));
        doc.insert("updatedAt".to_string(), Value::String(now));

        let doc = Value::Object(doc);
        conn.execute(
            &format!("INSERT INTO {} (id, data) VALUES (?1, ?2)", collection),
            rusqlite::params![id, doc.to_string()],
        )
        .map_err(|e| AppError::store(collection, e))?;

        Ok(doc)
    }

    async fn update(&self, collection: &str, id: &str, data: Value) -> Result<Value> {
        Self::check_collection(collection)?;
        let conn = self.pool.get()?;

        let existing: Option<String> = conn
            .query_row(
                &format!("SELECT data FROM {} WHERE id = ?1", collection),
                rusqlite::params![id],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(AppError::store(collection, other)),
            })?;

        let existing = existing.ok_or_else(|| {
            AppError::NotFound(format!("Document {} not found in {}", id, collection))
        })?;

        let mut doc: Map<String, Value> =
            serde_json::from_str(&existing).map_err(|e| AppError::store(collection, e))?;

        if let Value::Object(patch) = data {
            for (key, value) in patch {
                if key == "id" {
                    continue;
                }
                doc.insert(key, value);
            }
        } else {
            return Err(AppError::store(collection, "update data must be an object"));
        }
        doc.insert(
            "updatedAt".to_string(),
            Value::String(Utc::now().to_rfc3339()),
        );

        let doc = Value::Object(doc);
        conn.execute(
            &format!("UPDATE {} SET data = ?1 WHERE id = ?2", collection),
            rusqlite::params![doc.to_string(), id],
        )
        .map_err(|e| AppError::store(collection, e))?;

        Ok(doc)
    }
}
