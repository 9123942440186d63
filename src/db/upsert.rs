//! Find-or-create primitive shared by the price mirror and catalog writes.

use serde_json::Value;

use super::store::{DocumentStore, Filter};
use crate::error::{AppError, Result};

fn qualify(collection: &str, err: AppError) -> AppError {
    match err {
        AppError::Store { .. } => err,
        other => AppError::store(collection, other),
    }
}

/// Find at most one document matching `filter`; update it by id when found,
/// otherwise create a new document from `data`.
///
/// Not atomic: a concurrent caller racing between the find and the create
/// can reach the create twice. Collections whose external id carries a
/// unique index (prices) reject the duplicate at the storage layer; other
/// callers accept best-effort semantics.
pub async fn upsert(
    store: &dyn DocumentStore,
    collection: &str,
    filter: &Filter,
    data: Value,
) -> Result<Value> {
    let existing = store
        .find(collection, filter, Some(1))
        .await
        .map_err(|e| qualify(collection, e))?;

    let existing_id = existing
        .first()
        .and_then(|doc| doc.get("id"))
        .and_then(Value::as_str)
        .map(String::from);

    match existing_id {
        Some(id) => store
            .update(collection, &id, data)
            .await
            .map_err(|e| qualify(collection, e)),
        None => store
            .create(collection, data)
            .await
            .map_err(|e| qualify(collection, e)),
    }
}
