//! Row-store capability set.
//!
//! Persistence lives behind [`RowStore`]: one generic list/insert/update/delete
//! API over JSON rows, shared by every table. Implementations decide how rows
//! are kept; [`crate::db::Database`] keeps them in SQLite.

use std::fmt;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// A single record as exchanged with the store.
pub type Row = Map<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("No {table} row with id {id}")]
    NotFound { table: Table, id: String },

    #[error("Unknown column \"{column}\" on {table}")]
    UnknownColumn { table: Table, column: String },

    #[error("Encoding error: {0}")]
    Encoding(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Encoding(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// How a column's values are stored and handed back as JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Real,
    Integer,
    Bool,
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
}

const fn col(name: &'static str, kind: ColumnKind) -> Column {
    Column { name, kind }
}

use ColumnKind::{Bool, Integer, Real, Text};

const BRANCH_COLUMNS: &[Column] = &[
    col("id", Text),
    col("created_at", Text),
    col("name", Text),
    col("city", Text),
];

const CLIENT_COLUMNS: &[Column] = &[
    col("id", Text),
    col("created_at", Text),
    col("name", Text),
    col("phone", Text),
    col("city", Text),
    col("branch_id", Text),
];

const PRODUCT_COLUMNS: &[Column] = &[
    col("id", Text),
    col("created_at", Text),
    col("name", Text),
    col("category", Text),
    col("price", Real),
    col("branch_id", Text),
];

const SALE_COLUMNS: &[Column] = &[
    col("id", Text),
    col("created_at", Text),
    col("client_id", Text),
    col("product_id", Text),
    col("qty", Integer),
    col("total", Real),
    col("final_price", Real),
    col("payment_type", Text),
    col("branch_id", Text),
    col("created_by", Text),
    col("date", Text),
];

const PROFILE_COLUMNS: &[Column] = &[
    col("id", Text),
    col("created_at", Text),
    col("requested_at", Text),
    col("email", Text),
    col("full_name", Text),
    col("role", Text),
    col("branch_id", Text),
    col("approved", Bool),
];

const LEAD_COLUMNS: &[Column] = &[
    col("id", Text),
    col("created_at", Text),
    col("name", Text),
    col("phone", Text),
    col("city", Text),
    col("product_interest", Text),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Branches,
    Clients,
    Products,
    Sales,
    Profiles,
    Leads,
}

impl Table {
    pub const ALL: [Table; 6] = [
        Table::Branches,
        Table::Clients,
        Table::Products,
        Table::Sales,
        Table::Profiles,
        Table::Leads,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Table::Branches => "branches",
            Table::Clients => "clients",
            Table::Products => "products",
            Table::Sales => "sales",
            Table::Profiles => "profiles",
            Table::Leads => "leads",
        }
    }

    pub fn columns(self) -> &'static [Column] {
        match self {
            Table::Branches => BRANCH_COLUMNS,
            Table::Clients => CLIENT_COLUMNS,
            Table::Products => PRODUCT_COLUMNS,
            Table::Sales => SALE_COLUMNS,
            Table::Profiles => PROFILE_COLUMNS,
            Table::Leads => LEAD_COLUMNS,
        }
    }

    pub fn column(self, name: &str) -> StoreResult<Column> {
        self.columns()
            .iter()
            .find(|c| c.name == name)
            .copied()
            .ok_or_else(|| StoreError::UnknownColumn {
                table: self,
                column: name.to_string(),
            })
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: &'static str,
    pub ascending: bool,
}

impl OrderBy {
    pub const fn desc(column: &'static str) -> Self {
        Self {
            column,
            ascending: false,
        }
    }

    pub const fn asc(column: &'static str) -> Self {
        Self {
            column,
            ascending: true,
        }
    }
}

/// Equality filter on one column.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: &'static str,
    pub value: Value,
}

impl Filter {
    pub fn eq(column: &'static str, value: impl Into<Value>) -> Self {
        Self {
            column,
            value: value.into(),
        }
    }
}

/// External row store. Each call resolves independently; there is no
/// transaction spanning calls and no retry.
#[async_trait]
pub trait RowStore: Send + Sync {
    async fn list(
        &self,
        table: Table,
        filter: Option<Filter>,
        order: OrderBy,
    ) -> StoreResult<Vec<Row>>;

    /// Inserts `row` and returns it as stored, including the generated id
    /// and timestamps.
    async fn insert(&self, table: Table, row: Row) -> StoreResult<Row>;

    async fn update(&self, table: Table, id: &str, patch: Row) -> StoreResult<Row>;

    async fn delete(&self, table: Table, id: &str) -> StoreResult<()>;
}
