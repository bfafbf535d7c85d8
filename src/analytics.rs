//! Sales rollups for the analytics page.
//!
//! Everything here is a pure function of the snapshot. Amounts are read
//! through the coercion applied when sales are loaded, so a non-numeric
//! `total` or `qty` contributes zero. Keys are visited in the order they are
//! first seen in the sales list; leaders are picked with a strict `>` so the
//! earliest key keeps the title on a tie.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::format::{format_number, round_half_up, PLACEHOLDER, UNKNOWN};
use crate::models::{Branch, Client, Product, Sale, StaffProfile};
use crate::state::Snapshot;

/// Bucket key for sales that carry no branch or no creator.
pub const UNKNOWN_KEY: &str = "unknown";

/// Label for a branch id that does not resolve.
pub const UNRESOLVED_BRANCH: &str = "Branch";

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Bucket {
    revenue: f64,
    count: usize,
    qty: f64,
}

/// Per-key accumulator that remembers first-seen key order.
#[derive(Debug, Default)]
struct Rollup {
    index: HashMap<String, usize>,
    buckets: Vec<(String, Bucket)>,
}

impl Rollup {
    fn add(&mut self, key: &str, sale: &Sale) {
        let slot = match self.index.get(key) {
            Some(&slot) => slot,
            None => {
                self.index.insert(key.to_string(), self.buckets.len());
                self.buckets.push((key.to_string(), Bucket::default()));
                self.buckets.len() - 1
            }
        };
        let bucket = &mut self.buckets[slot].1;
        bucket.revenue += sale.total;
        bucket.count += 1;
        bucket.qty += sale.qty;
    }

    fn iter(&self) -> impl Iterator<Item = (&str, &Bucket)> {
        self.buckets.iter().map(|(k, b)| (k.as_str(), b))
    }

    /// First key whose value strictly beats everything before it.
    fn leader(&self, floor: f64, value: impl Fn(&Bucket) -> f64) -> Option<(&str, f64)> {
        let mut best: Option<(&str, f64)> = None;
        let mut best_value = floor;
        for (key, bucket) in self.iter() {
            let v = value(bucket);
            if v > best_value {
                best_value = v;
                best = Some((key, v));
            }
        }
        best
    }
}

fn rollup_by<'a>(sales: &'a [Sale], key: impl Fn(&'a Sale) -> &'a str) -> Rollup {
    let mut rollup = Rollup::default();
    for sale in sales {
        rollup.add(key(sale), sale);
    }
    rollup
}

// ===== TOTALS =====

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Totals {
    pub revenue: f64,
    pub count: usize,
    pub average_order: i64,
}

impl Totals {
    pub fn rounded_revenue(&self) -> i64 {
        round_half_up(self.revenue)
    }
}

pub fn totals(sales: &[Sale]) -> Totals {
    let revenue: f64 = sales.iter().map(|s| s.total).sum();
    let count = sales.len();
    Totals {
        revenue,
        count,
        average_order: average(revenue, count),
    }
}

fn average(revenue: f64, count: usize) -> i64 {
    if count == 0 {
        0
    } else {
        round_half_up(revenue / count as f64)
    }
}

// ===== CATEGORY / DATE =====

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryRevenue {
    pub category: String,
    pub revenue: i64,
}

/// Revenue per product category. Sales whose product is not in `products`
/// are left out of this rollup only.
pub fn revenue_by_category(sales: &[Sale], products: &[Product]) -> Vec<CategoryRevenue> {
    let mut by_id: HashMap<&str, &Product> = HashMap::with_capacity(products.len());
    for product in products {
        by_id.entry(product.id.as_str()).or_insert(product);
    }

    let mut rollup = Rollup::default();
    for sale in sales {
        if let Some(product) = by_id.get(sale.product_id.as_str()) {
            rollup.add(product.category_or_default(), sale);
        }
    }

    rollup
        .iter()
        .map(|(category, bucket)| CategoryRevenue {
            category: category.to_string(),
            revenue: round_half_up(bucket.revenue),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateRevenue {
    pub date: String,
    pub revenue: i64,
}

/// Revenue per sale date, ascending by the date string.
pub fn revenue_by_date(sales: &[Sale]) -> Vec<DateRevenue> {
    let mut by_date: BTreeMap<&str, f64> = BTreeMap::new();
    for sale in sales {
        let date = sale.date.as_deref().unwrap_or(UNKNOWN);
        *by_date.entry(date).or_insert(0.0) += sale.total;
    }

    by_date
        .into_iter()
        .map(|(date, revenue)| DateRevenue {
            date: date.to_string(),
            revenue: round_half_up(revenue),
        })
        .collect()
}

// ===== LEADERS =====

/// Winner of a "top" rollup. `name` is `None` when the id does not resolve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Leader {
    pub id: String,
    pub name: Option<String>,
    pub value: f64,
}

pub fn top_product_by_quantity(sales: &[Sale], products: &[Product]) -> Option<Leader> {
    let rollup = rollup_by(sales, |s| s.product_id.as_str());
    let (id, qty) = rollup.leader(0.0, |b| b.qty)?;
    Some(Leader {
        id: id.to_string(),
        name: products.iter().find(|p| p.id == id).map(|p| p.name.clone()),
        value: qty,
    })
}

pub fn best_client_by_spend(sales: &[Sale], clients: &[Client]) -> Option<Leader> {
    let rollup = rollup_by(sales, |s| s.client_id.as_str());
    let (id, spend) = rollup.leader(0.0, |b| b.revenue)?;
    Some(Leader {
        id: id.to_string(),
        name: clients.iter().find(|c| c.id == id).map(|c| c.name.clone()),
        value: spend,
    })
}

// ===== BRANCHES =====

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BranchPerformance {
    pub branch_id: String,
    pub name: String,
    pub revenue: f64,
    pub orders: usize,
    pub average_order: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BranchReport {
    pub rows: Vec<BranchPerformance>,
    pub top: Option<Leader>,
}

fn branch_label(branch_id: &str, branches: &[Branch]) -> String {
    match branches.iter().find(|b| b.id == branch_id) {
        Some(branch) => branch.name.clone(),
        None if branch_id == UNKNOWN_KEY => UNKNOWN.to_string(),
        None => UNRESOLVED_BRANCH.to_string(),
    }
}

pub fn branch_performance(sales: &[Sale], branches: &[Branch]) -> BranchReport {
    let rollup = rollup_by(sales, |s| s.branch_id.as_deref().unwrap_or(UNKNOWN_KEY));

    let rows = rollup
        .iter()
        .map(|(branch_id, bucket)| BranchPerformance {
            branch_id: branch_id.to_string(),
            name: branch_label(branch_id, branches),
            revenue: bucket.revenue,
            orders: bucket.count,
            average_order: average(bucket.revenue, bucket.count),
        })
        .collect();

    // Starts below zero so a branch with zero revenue can still lead.
    let top = rollup.leader(-1.0, |b| b.revenue).map(|(id, revenue)| Leader {
        id: id.to_string(),
        name: branches.iter().find(|b| b.id == id).map(|b| b.name.clone()),
        value: revenue,
    });

    BranchReport { rows, top }
}

// ===== EMPLOYEES =====

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmployeePerformance {
    pub staff_id: String,
    pub label: String,
    pub revenue: i64,
    pub orders: usize,
}

fn employee_label(staff_id: &str, profiles: &[StaffProfile]) -> String {
    let email = profiles
        .iter()
        .find(|p| p.id == staff_id)
        .filter(|p| p.approved)
        .and_then(|p| p.email.clone());

    match email {
        Some(email) => email,
        None if staff_id == UNKNOWN_KEY => UNKNOWN.to_string(),
        None => staff_id.to_string(),
    }
}

/// Revenue per creating staff member, highest first. Only approved profiles
/// lend their email as the label.
pub fn employee_ranking(sales: &[Sale], profiles: &[StaffProfile]) -> Vec<EmployeePerformance> {
    let rollup = rollup_by(sales, |s| s.created_by.as_deref().unwrap_or(UNKNOWN_KEY));

    let mut rows: Vec<EmployeePerformance> = rollup
        .iter()
        .map(|(staff_id, bucket)| EmployeePerformance {
            staff_id: staff_id.to_string(),
            label: employee_label(staff_id, profiles),
            revenue: round_half_up(bucket.revenue),
            orders: bucket.count,
        })
        .collect();

    rows.sort_by(|a, b| b.revenue.cmp(&a.revenue));
    rows
}

// ===== REPORT =====

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsReport {
    pub totals: Totals,
    pub by_category: Vec<CategoryRevenue>,
    pub by_date: Vec<DateRevenue>,
    pub top_product: Option<Leader>,
    pub best_client: Option<Leader>,
    pub branches: BranchReport,
    pub employees: Vec<EmployeePerformance>,
}

impl AnalyticsReport {
    pub fn compute(snapshot: &Snapshot) -> Self {
        let sales = &snapshot.sales;
        Self {
            totals: totals(sales),
            by_category: revenue_by_category(sales, &snapshot.products),
            by_date: revenue_by_date(sales),
            top_product: top_product_by_quantity(sales, &snapshot.products),
            best_client: best_client_by_spend(sales, &snapshot.clients),
            branches: branch_performance(sales, &snapshot.branches),
            employees: employee_ranking(sales, &snapshot.profiles),
        }
    }

    pub fn top_product_text(&self) -> String {
        match &self.top_product {
            Some(Leader {
                name: Some(name),
                value,
                ..
            }) => format!("{name} ({} sold)", format_number(*value)),
            _ => PLACEHOLDER.to_string(),
        }
    }

    pub fn best_client_text(&self) -> String {
        match &self.best_client {
            Some(Leader {
                name: Some(name),
                value,
                ..
            }) => format!("{name} ({})", round_half_up(*value)),
            _ => PLACEHOLDER.to_string(),
        }
    }

    /// Empty when the leading bucket is not a known branch.
    pub fn top_branch_text(&self) -> String {
        match &self.branches.top {
            Some(Leader {
                name: Some(name),
                value,
                ..
            }) => format!("Top branch: {name} ({} revenue)", round_half_up(*value)),
            _ => String::new(),
        }
    }
}
