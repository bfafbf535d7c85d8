//! Table view-models built from a snapshot.
//!
//! Foreign ids are resolved here; a reference that does not resolve becomes
//! a placeholder label instead of an error.

use serde::Serialize;

use crate::app::Session;
use crate::format::{format_number, PLACEHOLDER, UNKNOWN};
use crate::models::{Role, StaffProfile};
use crate::state::Snapshot;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientRow {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub city: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductRow {
    pub id: String,
    pub name: String,
    pub category: String,
    pub price: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaleRow {
    pub id: String,
    pub date: String,
    pub client: String,
    pub product: String,
    pub qty: String,
    pub payment_type: String,
    pub total: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BranchRow {
    pub id: String,
    pub name: String,
    pub city: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingUserRow {
    pub id: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub role: String,
    pub branch: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserTables {
    pub pending: Vec<PendingUserRow>,
    pub approved: Vec<UserRow>,
}

/// `(value, label)` pair for a select control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SaleFormOptions {
    pub clients: Vec<SelectOption>,
    pub products: Vec<SelectOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettingsView {
    pub email: String,
    pub role: String,
    pub branch: String,
    pub full_name: String,
}

pub fn client_rows(snapshot: &Snapshot) -> Vec<ClientRow> {
    snapshot
        .clients
        .iter()
        .map(|c| ClientRow {
            id: c.id.clone(),
            name: c.name.clone(),
            phone: c.phone.clone(),
            city: c.city.clone(),
        })
        .collect()
}

pub fn product_rows(snapshot: &Snapshot) -> Vec<ProductRow> {
    snapshot
        .products
        .iter()
        .map(|p| ProductRow {
            id: p.id.clone(),
            name: p.name.clone(),
            category: p.category.clone().unwrap_or_default(),
            price: format_number(p.price),
        })
        .collect()
}

pub fn sale_rows(snapshot: &Snapshot) -> Vec<SaleRow> {
    snapshot
        .sales
        .iter()
        .map(|s| SaleRow {
            id: s.id.clone(),
            date: s.date.clone().unwrap_or_default(),
            client: snapshot
                .client(&s.client_id)
                .map(|c| c.name.clone())
                .unwrap_or_else(|| UNKNOWN.to_string()),
            product: snapshot
                .product(&s.product_id)
                .map(|p| p.name.clone())
                .unwrap_or_else(|| UNKNOWN.to_string()),
            qty: format_number(s.qty),
            payment_type: s
                .payment_type
                .clone()
                .unwrap_or_else(|| PLACEHOLDER.to_string()),
            total: format_number(s.total),
        })
        .collect()
}

pub fn branch_rows(snapshot: &Snapshot) -> Vec<BranchRow> {
    snapshot
        .branches
        .iter()
        .map(|b| BranchRow {
            id: b.id.clone(),
            name: b.name.clone(),
            city: b.city.clone().unwrap_or_default(),
        })
        .collect()
}

fn branch_name(snapshot: &Snapshot, id: Option<&str>) -> String {
    id.and_then(|id| snapshot.branch(id))
        .map(|b| b.name.clone())
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}

/// Splits profiles into the approval queue and the approved staff list.
pub fn user_tables(snapshot: &Snapshot) -> UserTables {
    let (approved, pending): (Vec<&StaffProfile>, Vec<&StaffProfile>) =
        snapshot.profiles.iter().partition(|p| p.approved);

    UserTables {
        pending: pending
            .into_iter()
            .map(|p| PendingUserRow {
                id: p.id.clone(),
                email: p.email.clone().unwrap_or_default(),
            })
            .collect(),
        approved: approved
            .into_iter()
            .map(|p| UserRow {
                id: p.id.clone(),
                email: p.email.clone().unwrap_or_default(),
                role: p.role.as_str().to_string(),
                branch: branch_name(snapshot, p.branch_id.as_deref()),
            })
            .collect(),
    }
}

pub fn sale_form_options(snapshot: &Snapshot) -> SaleFormOptions {
    SaleFormOptions {
        clients: snapshot
            .clients
            .iter()
            .map(|c| SelectOption {
                value: c.id.clone(),
                label: c.name.clone(),
            })
            .collect(),
        products: snapshot
            .products
            .iter()
            .map(|p| SelectOption {
                value: p.id.clone(),
                label: format!("{} ({})", p.name, format_number(p.price)),
            })
            .collect(),
    }
}

/// Options for granting a role on approval.
pub fn role_options() -> Vec<SelectOption> {
    Role::ASSIGNABLE
        .iter()
        .map(|r| SelectOption {
            value: r.as_str().to_string(),
            label: r.label().to_string(),
        })
        .collect()
}

pub fn settings_view(snapshot: &Snapshot, session: Option<&Session>) -> SettingsView {
    let profile = session.map(|s| &s.profile);
    SettingsView {
        email: profile
            .and_then(|p| p.email.clone())
            .unwrap_or_else(|| PLACEHOLDER.to_string()),
        role: profile
            .map(|p| p.role.label().to_string())
            .unwrap_or_else(|| PLACEHOLDER.to_string()),
        branch: branch_name(snapshot, profile.and_then(|p| p.branch_id.as_deref())),
        full_name: profile.and_then(|p| p.full_name.clone()).unwrap_or_default(),
    }
}
