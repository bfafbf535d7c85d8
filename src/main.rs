use std::sync::Arc;

use retail_crm_lib::identity::AuthUser;
use retail_crm_lib::models::{CreateProfile, Role, StaffProfile};
use retail_crm_lib::store::Filter;
use retail_crm_lib::{logger, AnalyticsReport, Config, Crm, CrmResult, Database, LocalIdentity};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Makes sure the configured CEO can sign in, creating an approved
/// profile the first time round.
async fn bootstrap_admin(
    crm: &Crm,
    identity: &LocalIdentity,
    email: &str,
    password: &str,
) -> CrmResult<()> {
    let email = email.trim().to_lowercase();
    let existing = crm
        .repository::<StaffProfile>()
        .list_where(Some(Filter::eq("email", email.as_str())))
        .await
        .into_iter()
        .next();

    let id = match existing {
        Some(profile) => profile.id,
        None => {
            let payload = CreateProfile {
                id: uuid::Uuid::new_v4().to_string(),
                email: email.clone(),
                full_name: None,
                role: Role::Ceo,
                approved: true,
            };
            let profile = crm.repository::<StaffProfile>().add(&payload).await?;
            tracing::info!(%email, "bootstrap profile created");
            profile.id
        }
    };

    if let Err(e) = identity.add_account(AuthUser { id, email }, password) {
        tracing::warn!(error = %e, "bootstrap account not registered");
    }
    Ok(())
}

fn print_summary(report: &AnalyticsReport) {
    println!("Total revenue: {}", report.totals.rounded_revenue());
    println!("Sales:         {}", report.totals.count);
    println!("Average order: {}", report.totals.average_order);
    println!("Top product:   {}", report.top_product_text());
    println!("Best client:   {}", report.best_client_text());

    let top_branch = report.top_branch_text();
    if !top_branch.is_empty() {
        println!("{top_branch}");
    }

    if !report.by_category.is_empty() {
        println!("\nRevenue by category");
        for row in &report.by_category {
            println!("  {:<24} {}", row.category, row.revenue);
        }
    }

    if !report.employees.is_empty() {
        println!("\nRevenue by staff");
        for row in &report.employees {
            println!("  {:<32} {:>10} ({} orders)", row.label, row.revenue, row.orders);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let _ = dotenvy::dotenv();

    let config = Config::from_env();
    logger::init_logger(&config.log_level, config.log_dir.as_deref());
    tracing::info!(database = %config.database_path, "starting retail-crm");

    let db = if config.in_memory() {
        Database::open_in_memory()?
    } else {
        Database::open(&config.database_path)?
    };
    db.initialize()?;

    let identity = Arc::new(LocalIdentity::new());
    let crm = Crm::new(Arc::new(db), identity.clone());

    let Some((email, password)) = config.admin.as_ref() else {
        tracing::warn!("no CRM_ADMIN_EMAIL configured, nobody can sign in");
        return Ok(());
    };

    bootstrap_admin(&crm, &identity, email, password).await?;
    let session = crm.login(email, password).await?;
    tracing::info!(role = session.profile.role.label(), "session ready");

    let report = AnalyticsReport::compute(&crm.snapshot());
    if crm.visibility().analytics {
        print_summary(&report);
    } else {
        println!("Analytics are not available for your role.");
    }

    crm.logout().await;
    Ok(())
}
