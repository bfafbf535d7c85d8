use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::format::{lenient_number, lenient_optional_number, non_empty, null_default};

pub const UNCATEGORIZED: &str = "Uncategorized";

// ===== RECORDS =====

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Branch {
    pub id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "non_empty")]
    pub city: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Client {
    pub id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub phone: String,
    #[serde(default, deserialize_with = "null_default")]
    pub city: String,
    #[serde(default, deserialize_with = "non_empty")]
    pub branch_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Product {
    pub id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "non_empty")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub price: f64,
    #[serde(default, deserialize_with = "non_empty")]
    pub branch_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Product {
    pub fn category_or_default(&self) -> &str {
        self.category.as_deref().unwrap_or(UNCATEGORIZED)
    }
}

/// A recorded sale. `qty` and `total` are coerced on read, so a malformed
/// stored value counts as zero rather than failing the whole listing.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Sale {
    pub id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub client_id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub product_id: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub qty: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub total: f64,
    #[serde(default, deserialize_with = "lenient_optional_number")]
    pub final_price: Option<f64>,
    #[serde(default, deserialize_with = "non_empty")]
    pub payment_type: Option<String>,
    #[serde(default, deserialize_with = "non_empty")]
    pub branch_id: Option<String>,
    #[serde(default, deserialize_with = "non_empty")]
    pub created_by: Option<String>,
    #[serde(default, deserialize_with = "non_empty")]
    pub date: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Ceo,
    Admin,
    BranchManager,
    SalesStaff,
    /// Also used for any role string this build does not know.
    #[default]
    #[serde(other)]
    Pending,
}

impl Role {
    /// Roles an approver can grant, in the order they are offered.
    pub const ASSIGNABLE: [Role; 4] = [Role::SalesStaff, Role::BranchManager, Role::Admin, Role::Ceo];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Ceo => "ceo",
            Role::Admin => "admin",
            Role::BranchManager => "branch_manager",
            Role::SalesStaff => "sales_staff",
            Role::Pending => "pending",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Role::Ceo => "CEO",
            Role::Admin => "Administrator",
            Role::BranchManager => "Branch Manager",
            Role::SalesStaff => "Sales Representative",
            Role::Pending => "Pending Approval",
        }
    }

    pub fn can_see_analytics(self) -> bool {
        matches!(self, Role::Ceo | Role::Admin | Role::BranchManager)
    }

    pub fn can_manage_users(self) -> bool {
        matches!(self, Role::Ceo | Role::Admin)
    }

    pub fn can_manage_branches(self) -> bool {
        matches!(self, Role::Ceo | Role::Admin)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StaffProfile {
    pub id: String,
    #[serde(default, deserialize_with = "non_empty")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub role: Role,
    #[serde(default, deserialize_with = "non_empty")]
    pub branch_id: Option<String>,
    /// Only a literal `true` counts as approved.
    #[serde(default, deserialize_with = "strictly_true")]
    pub approved: bool,
    #[serde(default, deserialize_with = "non_empty")]
    pub full_name: Option<String>,
    #[serde(default)]
    pub requested_at: Option<String>,
}

fn strictly_true<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(matches!(Option::<Value>::deserialize(deserializer)?, Some(Value::Bool(true))))
}

/// An enquiry left through the public form. Not part of the snapshot.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Lead {
    pub id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "non_empty")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "non_empty")]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "non_empty")]
    pub product_interest: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

// ===== FORM INPUT =====
//
// Raw text as typed into the add forms and inline-edit inputs. Nothing here
// has been checked yet.

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BranchForm {
    pub name: String,
    pub city: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientForm {
    pub name: String,
    pub phone: String,
    pub city: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductForm {
    pub name: String,
    pub category: String,
    pub price: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SaleForm {
    pub client_id: String,
    pub product_id: String,
    pub qty: String,
    /// Optional override of the computed total.
    pub final_price: String,
    pub payment_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeadForm {
    pub name: String,
    pub phone: String,
    pub city: String,
    pub product_interest: String,
}

// ===== PAYLOADS =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateBranch {
    pub name: String,
    pub city: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateBranch {
    pub name: String,
    pub city: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateClient {
    pub name: String,
    pub phone: String,
    pub city: String,
    pub branch_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateClient {
    pub name: String,
    pub phone: String,
    pub city: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub name: String,
    pub category: Option<String>,
    pub price: f64,
    pub branch_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateProduct {
    pub name: String,
    pub category: Option<String>,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSale {
    pub client_id: String,
    pub product_id: String,
    pub qty: i64,
    pub total: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_type: Option<String>,
    pub branch_id: String,
    pub created_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateProfile {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
    pub role: Role,
    pub approved: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApproveProfile {
    pub approved: bool,
    pub role: Role,
    pub branch_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateFullName {
    pub full_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateLead {
    pub name: String,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub product_interest: Option<String>,
}
