//! Generic entity repository.
//!
//! Every table gets the same four operations. Reads never fail from the
//! caller's point of view: a store error is logged and an empty collection
//! comes back. Writes return a [`CrmResult`] carrying either the stored
//! record or the message to show.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{CrmError, CrmResult};
use crate::store::{Filter, OrderBy, Row, RowStore, StoreError, Table};

/// A record type kept in one store table.
pub trait Entity: DeserializeOwned + Clone + Send + Sync + 'static {
    const TABLE: Table;

    /// Ordering for `list`: newest first unless the table says otherwise.
    const ORDER: OrderBy = OrderBy::desc("created_at");

    fn id(&self) -> &str;
}

/// A write payload. `check` runs before the store is contacted.
pub trait Payload: Serialize + Sync {
    fn check(&self) -> CrmResult<()> {
        Ok(())
    }
}

/// Turns a payload into a store row.
pub fn to_row<P: Serialize>(payload: &P) -> Result<Row, StoreError> {
    match serde_json::to_value(payload)? {
        Value::Object(row) => Ok(row),
        other => Err(StoreError::Encoding(format!(
            "expected an object payload, got {other}"
        ))),
    }
}

fn from_row<E: Entity>(row: Row) -> Result<E, StoreError> {
    Ok(serde_json::from_value(Value::Object(row))?)
}

pub struct Repository<E> {
    store: Arc<dyn RowStore>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for Repository<E> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> Repository<E> {
    pub fn new(store: Arc<dyn RowStore>) -> Self {
        Self {
            store,
            _entity: PhantomData,
        }
    }

    pub async fn list(&self) -> Vec<E> {
        self.list_where(None).await
    }

    pub async fn list_where(&self, filter: Option<Filter>) -> Vec<E> {
        let rows = match self.store.list(E::TABLE, filter, E::ORDER).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!(table = %E::TABLE, error = %e, "list failed");
                return Vec::new();
            }
        };

        rows.into_iter()
            .filter_map(|row| match from_row::<E>(row) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(table = %E::TABLE, error = %e, "skipping malformed row");
                    None
                }
            })
            .collect()
    }

    pub async fn find(&self, id: &str) -> Option<E> {
        self.list_where(Some(Filter::eq("id", id)))
            .await
            .into_iter()
            .next()
    }

    pub async fn add<P: Payload>(&self, payload: &P) -> CrmResult<E> {
        payload.check()?;
        let row = to_row(payload)?;
        let created = self.store.insert(E::TABLE, row).await?;
        let record: E = from_row(created)?;
        tracing::info!(table = %E::TABLE, id = record.id(), "created");
        Ok(record)
    }

    pub async fn update<P: Payload>(&self, id: &str, payload: &P) -> CrmResult<E> {
        payload.check()?;
        let patch = to_row(payload)?;
        let updated = self.store.update(E::TABLE, id, patch).await?;
        tracing::info!(table = %E::TABLE, id, "updated");
        Ok(from_row(updated)?)
    }

    /// Deletes by id. Whether the id exists is the store's concern.
    pub async fn delete(&self, id: &str) -> CrmResult<()> {
        if id.is_empty() {
            return Err(CrmError::validation("Nothing selected to delete."));
        }
        self.store.delete(E::TABLE, id).await?;
        tracing::info!(table = %E::TABLE, id, "deleted");
        Ok(())
    }
}
