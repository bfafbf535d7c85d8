use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};
use serde_json::{Number, Value};
use uuid::Uuid;

use crate::store::{
    Column, ColumnKind, Filter, OrderBy, Row, RowStore, StoreError, StoreResult, Table,
};

/// SQLite-backed row store.
pub struct Database {
    pub conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| StoreError::Database(e.to_string()))?;
        }

        let conn = Connection::open(path)?;
        Ok(Database {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Database {
            conn: Mutex::new(conn),
        })
    }

    pub fn initialize(&self) -> StoreResult<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            "
            -- Branches
            CREATE TABLE IF NOT EXISTS branches (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                name TEXT NOT NULL,
                city TEXT
            );

            -- Clients, owned by a branch
            CREATE TABLE IF NOT EXISTS clients (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                name TEXT NOT NULL,
                phone TEXT,
                city TEXT,
                branch_id TEXT
            );

            -- Products
            CREATE TABLE IF NOT EXISTS products (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                name TEXT NOT NULL,
                category TEXT,
                price REAL NOT NULL,
                branch_id TEXT
            );

            -- Sales
            CREATE TABLE IF NOT EXISTS sales (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                client_id TEXT,
                product_id TEXT,
                qty INTEGER NOT NULL DEFAULT 1,
                total REAL NOT NULL DEFAULT 0,
                final_price REAL,
                payment_type TEXT,
                branch_id TEXT,
                created_by TEXT,
                date TEXT DEFAULT (date('now'))
            );

            -- Staff profiles, keyed by the identity provider's user id
            CREATE TABLE IF NOT EXISTS profiles (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                requested_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                email TEXT,
                full_name TEXT,
                role TEXT NOT NULL DEFAULT 'pending',
                branch_id TEXT,
                approved INTEGER NOT NULL DEFAULT 0
            );

            -- Leads from the public enquiry form
            CREATE TABLE IF NOT EXISTS leads (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                name TEXT NOT NULL,
                phone TEXT,
                city TEXT,
                product_interest TEXT
            );
            ",
        )?;

        Ok(())
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Database(e.to_string()))
    }
}

fn select_list(table: Table) -> String {
    table
        .columns()
        .iter()
        .map(|c| c.name)
        .collect::<Vec<_>>()
        .join(", ")
}

fn placeholders(from: usize, count: usize) -> String {
    (from..from + count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn to_sql(column: Column, value: Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(b as i64),
        Value::Number(n) => match column.kind {
            ColumnKind::Text => SqlValue::Text(n.to_string()),
            ColumnKind::Bool => SqlValue::Integer((n.as_f64().unwrap_or(0.0) != 0.0) as i64),
            ColumnKind::Integer if n.is_i64() => SqlValue::Integer(n.as_i64().unwrap_or_default()),
            ColumnKind::Integer | ColumnKind::Real => SqlValue::Real(n.as_f64().unwrap_or(0.0)),
        },
        Value::String(s) => SqlValue::Text(s),
        other => SqlValue::Text(other.to_string()),
    }
}

fn from_sql(column: Column, value: ValueRef<'_>) -> Value {
    match (column.kind, value) {
        (_, ValueRef::Null) => Value::Null,
        (ColumnKind::Bool, ValueRef::Integer(i)) => Value::Bool(i != 0),
        (ColumnKind::Bool, ValueRef::Text(t)) => Value::Bool(matches!(t, b"true" | b"1")),
        (_, ValueRef::Integer(i)) => Value::from(i),
        (_, ValueRef::Real(f)) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        (_, ValueRef::Text(t)) => Value::String(String::from_utf8_lossy(t).into_owned()),
        (_, ValueRef::Blob(_)) => Value::Null,
    }
}

fn read_row(table: Table, row: &rusqlite::Row<'_>) -> rusqlite::Result<Row> {
    let mut out = Row::new();
    for (i, column) in table.columns().iter().enumerate() {
        out.insert(column.name.to_string(), from_sql(*column, row.get_ref(i)?));
    }
    Ok(out)
}

fn fetch_rows(
    conn: &Connection,
    table: Table,
    filter: Option<Filter>,
    order: &OrderBy,
) -> StoreResult<Vec<Row>> {
    let order_column = table.column(order.column)?;
    let direction = if order.ascending { "ASC" } else { "DESC" };

    let mut params = Vec::new();
    let mut sql = format!("SELECT {} FROM {}", select_list(table), table);
    if let Some(filter) = filter {
        let column = table.column(filter.column)?;
        sql.push_str(&format!(" WHERE {} = ?1", column.name));
        params.push(to_sql(column, filter.value));
    }
    sql.push_str(&format!(
        " ORDER BY {} {direction}, rowid {direction}",
        order_column.name
    ));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(params), |row| read_row(table, row))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn fetch_by_id(conn: &Connection, table: Table, id: &str) -> StoreResult<Row> {
    fetch_rows(conn, table, Some(Filter::eq("id", id)), &OrderBy::asc("id"))?
        .into_iter()
        .next()
        .ok_or_else(|| StoreError::NotFound {
            table,
            id: id.to_string(),
        })
}

fn insert_row(conn: &Connection, table: Table, mut row: Row) -> StoreResult<Row> {
    let id = match row.remove("id") {
        Some(Value::String(id)) if !id.is_empty() => id,
        _ => Uuid::new_v4().to_string(),
    };

    let mut names = vec!["id"];
    let mut values = vec![SqlValue::Text(id.clone())];
    for (key, value) in row {
        let column = table.column(&key)?;
        names.push(column.name);
        values.push(to_sql(column, value));
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        names.join(", "),
        placeholders(1, names.len())
    );
    conn.execute(&sql, params_from_iter(values))?;

    fetch_by_id(conn, table, &id)
}

fn update_row(conn: &Connection, table: Table, id: &str, mut patch: Row) -> StoreResult<Row> {
    patch.remove("id");
    if patch.is_empty() {
        return fetch_by_id(conn, table, id);
    }

    let mut assignments = Vec::with_capacity(patch.len());
    let mut values = Vec::with_capacity(patch.len() + 1);
    for (i, (key, value)) in patch.into_iter().enumerate() {
        let column = table.column(&key)?;
        assignments.push(format!("{} = ?{}", column.name, i + 1));
        values.push(to_sql(column, value));
    }
    values.push(SqlValue::Text(id.to_string()));

    let sql = format!(
        "UPDATE {} SET {} WHERE id = ?{}",
        table,
        assignments.join(", "),
        values.len()
    );
    let changed = conn.execute(&sql, params_from_iter(values))?;
    if changed == 0 {
        return Err(StoreError::NotFound {
            table,
            id: id.to_string(),
        });
    }

    fetch_by_id(conn, table, id)
}

#[async_trait]
impl RowStore for Database {
    async fn list(
        &self,
        table: Table,
        filter: Option<Filter>,
        order: OrderBy,
    ) -> StoreResult<Vec<Row>> {
        let conn = self.lock()?;
        fetch_rows(&conn, table, filter, &order)
    }

    async fn insert(&self, table: Table, row: Row) -> StoreResult<Row> {
        let conn = self.lock()?;
        insert_row(&conn, table, row)
    }

    async fn update(&self, table: Table, id: &str, patch: Row) -> StoreResult<Row> {
        let conn = self.lock()?;
        update_row(&conn, table, id, patch)
    }

    async fn delete(&self, table: Table, id: &str) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute(&format!("DELETE FROM {table} WHERE id = ?1"), [id])?;
        Ok(())
    }
}
