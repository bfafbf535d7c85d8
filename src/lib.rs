//! Multi-branch retail CRM core.
//!
//! Clients, products, sales and branches live in an external row store.
//! Every write is followed by a full re-fetch into an immutable
//! [`Snapshot`], from which analytics and table views are recomputed and
//! handed to a [`Renderer`].

pub mod analytics;
pub mod app;
pub mod commands;
pub mod config;
pub mod db;
pub mod editing;
pub mod error;
pub mod format;
pub mod identity;
pub mod logger;
pub mod models;
pub mod render;
pub mod repository;
pub mod state;
pub mod store;
pub mod views;

#[cfg(test)]
mod tests;

pub use analytics::AnalyticsReport;
pub use app::{Crm, Session, Visibility};
pub use config::Config;
pub use db::Database;
pub use editing::{EditTable, Editable, RowMode};
pub use error::{CrmError, CrmResult, SessionError};
pub use identity::{IdentityProvider, LocalIdentity};
pub use render::{HtmlRenderer, Renderer};
pub use state::Snapshot;
pub use store::{RowStore, Table};
