//! Rendering adapter.
//!
//! [`Renderer`] is the seam between the pure layer and whatever paints the
//! screen. [`HtmlRenderer`] writes table bodies and text into named slots,
//! one per element id of the page. Every value coming from the store is
//! escaped on the way out.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::analytics::AnalyticsReport;
use crate::app::{Session, Visibility};
use crate::editing::{Control, Draft, Editable};
use crate::format::{escape_attr, escape_html, round_half_up};
use crate::state::Snapshot;
use crate::views;

/// Everything one paint needs.
pub struct Frame<'a> {
    pub snapshot: &'a Snapshot,
    pub report: &'a AnalyticsReport,
    pub session: Option<&'a Session>,
    pub visibility: Visibility,
    pub generation: u64,
}

pub trait Renderer {
    fn render(&mut self, frame: &Frame<'_>);
}

/// Lets the caller keep a handle on a renderer it hands to the orchestrator.
impl<R: Renderer> Renderer for Arc<Mutex<R>> {
    fn render(&mut self, frame: &Frame<'_>) {
        match self.lock() {
            Ok(mut inner) => inner.render(frame),
            Err(poisoned) => poisoned.into_inner().render(frame),
        }
    }
}

#[derive(Debug, Default)]
pub struct HtmlRenderer {
    slots: BTreeMap<&'static str, String>,
    renders: u64,
    last_generation: u64,
}

impl HtmlRenderer {
    pub fn slot(&self, id: &str) -> Option<&str> {
        self.slots.get(id).map(String::as_str)
    }

    pub fn renders(&self) -> u64 {
        self.renders
    }

    pub fn last_generation(&self) -> u64 {
        self.last_generation
    }

    fn put(&mut self, id: &'static str, html: String) {
        self.slots.insert(id, html);
    }
}

fn cell(text: &str) -> String {
    format!("<td>{}</td>", escape_html(text))
}

fn named_cell(name: &str, text: &str) -> String {
    format!("<td data-cell=\"{name}\">{}</td>", escape_html(text))
}

fn button(control: Control, id: &str) -> String {
    let attr = match control {
        Control::Edit => "data-edit",
        Control::Delete => "data-del",
        Control::Save => "data-save",
        Control::Cancel => "data-cancel",
    };
    format!(
        "<button {attr}=\"{}\">{}</button>",
        escape_attr(id),
        control.label()
    )
}

fn actions(id: &str, controls: &[Control]) -> String {
    let buttons: String = controls.iter().map(|c| button(*c, id)).collect();
    format!("<td>{buttons}</td>")
}

fn options(items: &[views::SelectOption]) -> String {
    items
        .iter()
        .map(|o| {
            format!(
                "<option value=\"{}\">{}</option>",
                escape_attr(&o.value),
                escape_html(&o.label)
            )
        })
        .collect()
}

/// Markup for a row in editing: one bound input per field, then Save/Cancel.
pub fn edit_row<E: Editable>(id: &str, draft: &Draft) -> String {
    let inputs: String = E::FIELDS
        .iter()
        .map(|f| {
            format!(
                "<td data-cell=\"{}\"><input type=\"{}\" value=\"{}\" /></td>",
                f.name,
                f.input.html_type(),
                escape_attr(draft.get(f.name))
            )
        })
        .collect();
    format!(
        "<tr>{inputs}{}</tr>",
        actions(id, &[Control::Save, Control::Cancel])
    )
}

impl HtmlRenderer {
    fn render_analytics(&mut self, report: &AnalyticsReport) {
        self.put("total-revenue", report.totals.rounded_revenue().to_string());
        self.put("total-sales", report.totals.count.to_string());
        self.put("avg-order", report.totals.average_order.to_string());

        let categories = report
            .by_category
            .iter()
            .map(|c| format!("<tr>{}<td>{}</td></tr>", cell(&c.category), c.revenue))
            .collect();
        self.put("category-table", categories);

        let dates = report
            .by_date
            .iter()
            .map(|d| format!("<tr>{}<td>{}</td></tr>", cell(&d.date), d.revenue))
            .collect();
        self.put("date-table", dates);

        self.put("top-product", escape_html(&report.top_product_text()));
        self.put("best-client", escape_html(&report.best_client_text()));

        let branches = report
            .branches
            .rows
            .iter()
            .map(|b| {
                format!(
                    "<tr>{}<td>{}</td><td>{}</td><td>{}</td></tr>",
                    cell(&b.name),
                    round_half_up(b.revenue),
                    b.orders,
                    b.average_order
                )
            })
            .collect();
        self.put("branch-performance-table", branches);
        self.put("top-branch-text", escape_html(&report.top_branch_text()));

        let reps = report
            .employees
            .iter()
            .map(|e| {
                format!(
                    "<tr>{}<td>{}</td><td>{}</td></tr>",
                    cell(&e.label),
                    e.revenue,
                    e.orders
                )
            })
            .collect();
        self.put("rep-performance-table", reps);
    }

    fn render_tables(&mut self, snapshot: &Snapshot) {
        let view_controls = [Control::Edit, Control::Delete];

        let clients = views::client_rows(snapshot)
            .iter()
            .map(|c| {
                format!(
                    "<tr>{}{}{}{}</tr>",
                    named_cell("name", &c.name),
                    named_cell("phone", &c.phone),
                    named_cell("city", &c.city),
                    actions(&c.id, &view_controls)
                )
            })
            .collect();
        self.put("clients-table", clients);

        let products = views::product_rows(snapshot)
            .iter()
            .map(|p| {
                format!(
                    "<tr>{}{}{}{}</tr>",
                    named_cell("name", &p.name),
                    named_cell("category", &p.category),
                    named_cell("price", &p.price),
                    actions(&p.id, &view_controls)
                )
            })
            .collect();
        self.put("products-table", products);

        let sales = views::sale_rows(snapshot)
            .iter()
            .map(|s| {
                format!(
                    "<tr>{}{}{}{}{}{}{}</tr>",
                    cell(&s.date),
                    cell(&s.client),
                    cell(&s.product),
                    cell(&s.qty),
                    cell(&s.payment_type),
                    cell(&s.total),
                    actions(&s.id, &[Control::Delete])
                )
            })
            .collect();
        self.put("sales-table", sales);

        let branches = views::branch_rows(snapshot)
            .iter()
            .map(|b| {
                format!(
                    "<tr>{}{}{}</tr>",
                    named_cell("name", &b.name),
                    named_cell("city", &b.city),
                    actions(&b.id, &view_controls)
                )
            })
            .collect();
        self.put("branches-table", branches);

        let form = views::sale_form_options(snapshot);
        self.put("sale-client", options(&form.clients));
        self.put("sale-product", options(&form.products));
    }

    fn render_users(&mut self, snapshot: &Snapshot) {
        let tables = views::user_tables(snapshot);
        let roles = options(&views::role_options());
        let branch_options: Vec<views::SelectOption> = snapshot
            .branches
            .iter()
            .map(|b| views::SelectOption {
                value: b.id.clone(),
                label: b.name.clone(),
            })
            .collect();
        let branch_options = options(&branch_options);

        let pending = tables
            .pending
            .iter()
            .map(|p| {
                let id = escape_attr(&p.id);
                format!(
                    "<tr>{}<td>Pending</td><td><select id=\"role-{id}\">{roles}</select></td>\
                     <td><select id=\"branch-{id}\">{branch_options}</select></td>\
                     <td><button data-approve=\"{id}\">Approve</button></td></tr>",
                    cell(&p.email)
                )
            })
            .collect();
        self.put("pending-users-table", pending);

        let approved = tables
            .approved
            .iter()
            .map(|u| {
                format!(
                    "<tr>{}{}{}<td>✅</td></tr>",
                    cell(&u.email),
                    cell(&u.role),
                    cell(&u.branch)
                )
            })
            .collect();
        self.put("all-users-table", approved);
    }

    fn render_settings(&mut self, snapshot: &Snapshot, session: Option<&Session>) {
        let settings = views::settings_view(snapshot, session);
        self.put("set-email", escape_html(&settings.email));
        self.put("set-role", escape_html(&settings.role));
        self.put("set-branch", escape_html(&settings.branch));
        self.put("set-fullname-input", escape_attr(&settings.full_name));
    }
}

impl Renderer for HtmlRenderer {
    fn render(&mut self, frame: &Frame<'_>) {
        let stats = frame.snapshot.stats();
        self.put("stat-clients", stats.clients.to_string());
        self.put("stat-products", stats.products.to_string());
        self.put("stat-sales", stats.sales.to_string());

        self.render_tables(frame.snapshot);
        if frame.visibility.analytics {
            self.render_analytics(frame.report);
        }
        if frame.visibility.users {
            self.render_users(frame.snapshot);
        }
        self.render_settings(frame.snapshot, frame.session);

        tracing::trace!(generation = frame.generation, "rendered");

        self.renders += 1;
        self.last_generation = frame.generation;
    }
}
