//! Integration tests for the CRM flows.
//! These tests run against an in-memory SQLite row store and the in-process
//! identity provider.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::{json, Value};
    use tokio::sync::Notify;

    use crate::app::Crm;
    use crate::db::Database;
    use crate::editing::{Control, Draft, EditTable, RowMode};
    use crate::error::{CrmError, SessionError};
    use crate::identity::{AuthUser, IdentityProvider, LocalIdentity};
    use crate::models::{
        Branch, BranchForm, Client, ClientForm, Lead, LeadForm, Product, ProductForm, Role, Sale,
        SaleForm, StaffProfile,
    };
    use crate::render::{edit_row, HtmlRenderer};
    use crate::repository::Repository;
    use crate::state::Snapshot;
    use crate::store::{Filter, OrderBy, Row, RowStore, StoreError, StoreResult, Table};
    use crate::views;

    const PASSWORD: &str = "secret1";

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            other => panic!("expected an object, got {other}"),
        }
    }

    /// Create an initialized in-memory store
    fn setup_test_db() -> Arc<Database> {
        let db = Database::open_in_memory().expect("Failed to create in-memory database");
        db.initialize().expect("Failed to create schema");
        Arc::new(db)
    }

    struct Fixture {
        crm: Crm,
        db: Arc<Database>,
        identity: Arc<LocalIdentity>,
        html: Arc<Mutex<HtmlRenderer>>,
        branch_id: String,
    }

    impl Fixture {
        fn html(&self) -> std::sync::MutexGuard<'_, HtmlRenderer> {
            self.html.lock().expect("renderer lock")
        }
    }

    fn crm_over(store: Arc<dyn RowStore>, identity: Arc<LocalIdentity>) -> (Crm, Arc<Mutex<HtmlRenderer>>) {
        let html = Arc::new(Mutex::new(HtmlRenderer::default()));
        let crm = Crm::new(store, identity).with_renderer(Arc::clone(&html));
        (crm, html)
    }

    /// Registers an account and files an approved profile for it.
    async fn seed_staff(
        db: &Database,
        identity: &LocalIdentity,
        email: &str,
        role: Role,
        branch_id: Option<&str>,
    ) -> AuthUser {
        let profile = db
            .insert(
                Table::Profiles,
                row(json!({
                    "email": email,
                    "role": role.as_str(),
                    "branch_id": branch_id,
                    "approved": true,
                })),
            )
            .await
            .expect("Failed to insert profile");
        let id = profile["id"].as_str().expect("profile id").to_string();
        identity
            .add_account(
                AuthUser {
                    id,
                    email: email.to_string(),
                },
                PASSWORD,
            )
            .expect("Failed to register account")
    }

    /// Seed a branch and sign in a member of it with `role`
    async fn signed_in(role: Role) -> Fixture {
        let db = setup_test_db();
        let identity = Arc::new(LocalIdentity::new());

        let branch = db
            .insert(Table::Branches, row(json!({ "name": "Downtown", "city": "Tirana" })))
            .await
            .expect("Failed to insert branch");
        let branch_id = branch["id"].as_str().expect("branch id").to_string();

        seed_staff(&db, &identity, "boss@shop.test", role, Some(&branch_id)).await;

        let (crm, html) = crm_over(db.clone(), identity.clone());
        crm.login("boss@shop.test", PASSWORD)
            .await
            .expect("Failed to sign in");

        Fixture {
            crm,
            db,
            identity,
            html,
            branch_id,
        }
    }

    fn client_form(name: &str) -> ClientForm {
        ClientForm {
            name: name.to_string(),
            phone: "555-0100".to_string(),
            city: "Durres".to_string(),
        }
    }

    fn product_form(name: &str, price: &str) -> ProductForm {
        ProductForm {
            name: name.to_string(),
            category: "Shoes".to_string(),
            price: price.to_string(),
        }
    }

    fn sale_form(client: &Client, product: &Product, qty: &str) -> SaleForm {
        SaleForm {
            client_id: client.id.clone(),
            product_id: product.id.clone(),
            qty: qty.to_string(),
            ..Default::default()
        }
    }

    // ===== TEST STORES =====

    /// Counts writes reaching the wrapped store.
    struct CountingStore {
        inner: Arc<Database>,
        writes: AtomicUsize,
    }

    #[async_trait]
    impl RowStore for CountingStore {
        async fn list(&self, table: Table, filter: Option<Filter>, order: OrderBy) -> StoreResult<Vec<Row>> {
            self.inner.list(table, filter, order).await
        }

        async fn insert(&self, table: Table, row: Row) -> StoreResult<Row> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.insert(table, row).await
        }

        async fn update(&self, table: Table, id: &str, patch: Row) -> StoreResult<Row> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.update(table, id, patch).await
        }

        async fn delete(&self, table: Table, id: &str) -> StoreResult<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.delete(table, id).await
        }
    }

    /// Reads pass through; writes to one table fail with a fixed message.
    struct FailingStore {
        inner: Arc<Database>,
        table: Table,
        fail_reads: bool,
    }

    fn refused() -> StoreError {
        StoreError::Database("connection refused".to_string())
    }

    #[async_trait]
    impl RowStore for FailingStore {
        async fn list(&self, table: Table, filter: Option<Filter>, order: OrderBy) -> StoreResult<Vec<Row>> {
            if self.fail_reads && table == self.table {
                return Err(refused());
            }
            self.inner.list(table, filter, order).await
        }

        async fn insert(&self, table: Table, row: Row) -> StoreResult<Row> {
            if table == self.table {
                return Err(refused());
            }
            self.inner.insert(table, row).await
        }

        async fn update(&self, table: Table, id: &str, patch: Row) -> StoreResult<Row> {
            if table == self.table {
                return Err(refused());
            }
            self.inner.update(table, id, patch).await
        }

        async fn delete(&self, table: Table, id: &str) -> StoreResult<()> {
            if table == self.table {
                return Err(refused());
            }
            self.inner.delete(table, id).await
        }
    }

    /// Holds the first sales listing until released.
    struct GatedStore {
        inner: Arc<Database>,
        armed: AtomicBool,
        reached: Notify,
        release: Notify,
    }

    #[async_trait]
    impl RowStore for GatedStore {
        async fn list(&self, table: Table, filter: Option<Filter>, order: OrderBy) -> StoreResult<Vec<Row>> {
            if table == Table::Sales && self.armed.swap(false, Ordering::SeqCst) {
                self.reached.notify_one();
                self.release.notified().await;
            }
            self.inner.list(table, filter, order).await
        }

        async fn insert(&self, table: Table, row: Row) -> StoreResult<Row> {
            self.inner.insert(table, row).await
        }

        async fn update(&self, table: Table, id: &str, patch: Row) -> StoreResult<Row> {
            self.inner.update(table, id, patch).await
        }

        async fn delete(&self, table: Table, id: &str) -> StoreResult<()> {
            self.inner.delete(table, id).await
        }
    }

    // ===== STORE TESTS =====

    #[tokio::test]
    async fn test_insert_assigns_id_and_timestamp() {
        let db = setup_test_db();
        let created = db
            .insert(Table::Clients, row(json!({ "name": "Ana", "phone": "1", "city": "Vlore" })))
            .await
            .unwrap();

        assert!(!created["id"].as_str().unwrap().is_empty());
        assert!(created["created_at"].as_str().is_some());
        assert_eq!(created["name"], "Ana");
    }

    #[tokio::test]
    async fn test_sale_date_defaults_to_today() {
        let db = setup_test_db();
        let sale = db
            .insert(Table::Sales, row(json!({ "qty": 1, "total": 5.0 })))
            .await
            .unwrap();

        let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
        assert_eq!(sale["date"], Value::String(today));
    }

    #[tokio::test]
    async fn test_unknown_column_rejected() {
        let db = setup_test_db();
        let err = db
            .insert(Table::Branches, row(json!({ "name": "X", "colour": "red" })))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::UnknownColumn { .. }));
        assert!(db.list(Table::Branches, None, OrderBy::desc("created_at")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_missing_row_is_not_found() {
        let db = setup_test_db();
        let err = db
            .update(Table::Products, "nope", row(json!({ "name": "X" })))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_missing_row_succeeds() {
        let db = setup_test_db();
        assert!(db.delete(Table::Clients, "nope").await.is_ok());
    }

    #[tokio::test]
    async fn test_schema_covers_every_table() {
        let db = setup_test_db();
        for table in Table::ALL {
            let rows = db
                .list(table, None, OrderBy::desc("created_at"))
                .await
                .unwrap_or_else(|e| panic!("{table}: {e}"));
            assert!(rows.is_empty(), "{table}");
            assert_eq!(table.columns()[0].name, "id");
        }
    }

    #[tokio::test]
    async fn test_list_newest_first_with_insertion_tiebreak() {
        let db = setup_test_db();
        for name in ["first", "second", "third"] {
            db.insert(
                Table::Branches,
                row(json!({ "name": name, "created_at": "2024-01-01T00:00:00.000Z" })),
            )
            .await
            .unwrap();
        }

        let names: Vec<Branch> = Repository::<Branch>::new(db).list().await;
        let names: Vec<&str> = names.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["third", "second", "first"]);
    }

    #[tokio::test]
    async fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("data").join("crm.db");

        {
            let db = Database::open(&path).unwrap();
            db.initialize().unwrap();
            db.insert(Table::Branches, row(json!({ "name": "Harbour" })))
                .await
                .unwrap();
        }

        let db = Arc::new(Database::open(&path).unwrap());
        db.initialize().unwrap();
        let branches = Repository::<Branch>::new(db).list().await;
        assert_eq!(branches.len(), 1);
        assert_eq!(branches[0].name, "Harbour");
    }

    #[tokio::test]
    async fn test_malformed_numbers_coerce_to_zero() {
        let db = setup_test_db();
        db.insert(Table::Sales, row(json!({ "qty": "two", "total": "abc" })))
            .await
            .unwrap();

        let sales = Repository::<Sale>::new(db).list().await;
        assert_eq!(sales.len(), 1);
        assert_eq!(sales[0].total, 0.0);
        assert_eq!(sales[0].qty, 0.0);
    }

    // ===== REPOSITORY TESTS =====

    #[tokio::test]
    async fn test_add_client_round_trip() {
        let fx = signed_in(Role::SalesStaff).await;

        let created = fx.crm.add_client(&client_form("  Ana  ")).await.unwrap();
        assert_eq!(created.name, "Ana");
        assert_eq!(created.branch_id.as_deref(), Some(fx.branch_id.as_str()));

        let snapshot = fx.crm.snapshot();
        assert_eq!(snapshot.clients.len(), 1);
        let listed = &snapshot.clients[0];
        assert_eq!(listed.id, created.id);
        assert_eq!(listed.name, "Ana");
        assert_eq!(listed.phone, "555-0100");
        assert_eq!(listed.city, "Durres");
        assert_eq!(listed.branch_id.as_deref(), Some(fx.branch_id.as_str()));
    }

    #[tokio::test]
    async fn test_add_product_round_trip() {
        let fx = signed_in(Role::SalesStaff).await;

        let created = fx.crm.add_product(&product_form("Boot", "49.9")).await.unwrap();

        let snapshot = fx.crm.snapshot();
        assert_eq!(snapshot.products.len(), 1);
        let listed = &snapshot.products[0];
        assert_eq!(listed.id, created.id);
        assert_eq!(listed.name, "Boot");
        assert_eq!(listed.category.as_deref(), Some("Shoes"));
        assert_eq!(listed.price, 49.9);
        assert_eq!(listed.branch_id.as_deref(), Some(fx.branch_id.as_str()));
    }

    #[tokio::test]
    async fn test_invalid_price_never_reaches_store() {
        let db = setup_test_db();
        let store = Arc::new(CountingStore {
            inner: db,
            writes: AtomicUsize::new(0),
        });
        let (crm, _) = crm_over(store.clone(), Arc::new(LocalIdentity::new()));

        for price in ["-5", "0", "abc", ""] {
            let err = crm.add_product(&product_form("Boot", price)).await.unwrap_err();
            assert_eq!(err, CrmError::validation("Price must be a positive number."));
        }
        let err = crm.add_product(&product_form("  ", "10")).await.unwrap_err();
        assert_eq!(err.to_string(), "Name is required.");

        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_client_requires_all_fields() {
        let fx = signed_in(Role::SalesStaff).await;
        let mut form = client_form("Ana");
        form.city = "   ".to_string();

        let err = fx.crm.add_client(&form).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "All fields are required.");
    }

    #[tokio::test]
    async fn test_remote_error_message_passes_through() {
        let db = setup_test_db();
        let store = Arc::new(FailingStore {
            inner: db,
            table: Table::Branches,
            fail_reads: false,
        });
        let (crm, _) = crm_over(store, Arc::new(LocalIdentity::new()));

        let err = crm
            .add_branch(&BranchForm {
                name: "North".to_string(),
                city: String::new(),
            })
            .await
            .unwrap_err();

        assert_eq!(err, CrmError::Remote("Database error: connection refused".to_string()));
    }

    #[tokio::test]
    async fn test_failed_list_yields_empty_collection() {
        let db = setup_test_db();
        db.insert(Table::Products, row(json!({ "name": "Boot", "price": 10.0 })))
            .await
            .unwrap();
        db.insert(Table::Clients, row(json!({ "name": "Ana", "phone": "1", "city": "X" })))
            .await
            .unwrap();
        let store = Arc::new(FailingStore {
            inner: db,
            table: Table::Products,
            fail_reads: true,
        });
        let (crm, _) = crm_over(store, Arc::new(LocalIdentity::new()));

        crm.refresh().await;
        let snapshot = crm.snapshot();
        assert!(snapshot.products.is_empty());
        assert_eq!(snapshot.clients.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_requires_an_id() {
        let db = setup_test_db();
        let err = Repository::<Client>::new(db).delete("").await.unwrap_err();
        assert_eq!(err.to_string(), "Nothing selected to delete.");
    }

    // ===== EDIT TESTS =====

    #[tokio::test]
    async fn test_edit_controls_follow_row_mode() {
        let fx = signed_in(Role::SalesStaff).await;
        let client = fx.crm.add_client(&client_form("Ana")).await.unwrap();
        let mut table = EditTable::<Client>::new();

        assert_eq!(table.mode(&client.id, &fx.crm), RowMode::Viewing);
        assert_eq!(table.controls(&client.id, &fx.crm), [Control::Edit, Control::Delete]);

        let draft = table.begin_edit(&client, &fx.crm);
        assert_eq!(draft.get("name"), "Ana");
        assert_eq!(table.controls(&client.id, &fx.crm), [Control::Save, Control::Cancel]);
    }

    #[tokio::test]
    async fn test_delete_blocked_while_editing() {
        let fx = signed_in(Role::SalesStaff).await;
        let client = fx.crm.add_client(&client_form("Ana")).await.unwrap();
        let mut table = EditTable::<Client>::new();
        table.begin_edit(&client, &fx.crm);

        let err = table.delete(&client.id, &fx.crm).await.unwrap_err();
        assert!(matches!(err, CrmError::InvalidState(_)));
        assert_eq!(fx.crm.snapshot().clients.len(), 1);
    }

    #[tokio::test]
    async fn test_save_failure_keeps_row_editing() {
        let fx = signed_in(Role::SalesStaff).await;
        let product = fx.crm.add_product(&product_form("Boot", "10")).await.unwrap();
        let mut table = EditTable::<Product>::new();
        table.begin_edit(&product, &fx.crm).set("price", "-5");

        let err = table.save(&product.id, &fx.crm).await.unwrap_err();
        assert_eq!(err.to_string(), "Price must be a positive number.");
        assert_eq!(table.mode(&product.id, &fx.crm), RowMode::Editing);
        assert_eq!(table.draft(&product.id, &fx.crm).unwrap().get("price"), "-5");
        assert_eq!(fx.crm.snapshot().products[0].price, 10.0);

        // Correct the draft in place and retry.
        assert!(table.draft_mut(&product.id, &fx.crm).unwrap().set("price", "12"));
        let saved = table.save(&product.id, &fx.crm).await.unwrap();
        assert_eq!(saved.price, 12.0);
        assert_eq!(table.mode(&product.id, &fx.crm), RowMode::Viewing);
        assert!(table.draft_mut(&product.id, &fx.crm).is_none());
    }

    #[tokio::test]
    async fn test_delete_remote_failure_keeps_state() {
        let db = setup_test_db();
        let client = db
            .insert(Table::Clients, row(json!({ "name": "Ana", "phone": "1", "city": "X" })))
            .await
            .unwrap();
        let id = client["id"].as_str().unwrap().to_string();
        let store = Arc::new(FailingStore {
            inner: db,
            table: Table::Clients,
            fail_reads: false,
        });
        let (crm, html) = crm_over(store, Arc::new(LocalIdentity::new()));
        crm.refresh_and_render().await;
        let generation = crm.generation();

        let mut table = EditTable::<Client>::new();
        let err = table.delete(&id, &crm).await.unwrap_err();

        assert_eq!(err, CrmError::Remote("Database error: connection refused".to_string()));
        assert_eq!(crm.generation(), generation);
        assert_eq!(html.lock().unwrap().renders(), 1);
        assert!(crm.snapshot().client(&id).is_some());
        assert_eq!(table.mode(&id, &crm), RowMode::Viewing);
    }

    #[tokio::test]
    async fn test_save_remote_failure_keeps_row_editing() {
        let db = setup_test_db();
        let client = db
            .insert(Table::Clients, row(json!({ "name": "Ana", "phone": "1", "city": "X" })))
            .await
            .unwrap();
        let store = Arc::new(FailingStore {
            inner: db,
            table: Table::Clients,
            fail_reads: false,
        });
        let (crm, _) = crm_over(store, Arc::new(LocalIdentity::new()));
        crm.refresh().await;

        let client: Client = crm.snapshot().client(client["id"].as_str().unwrap()).cloned().unwrap();
        let mut table = EditTable::<Client>::new();
        table.begin_edit(&client, &crm).set("name", "Anna");

        let err = table.save(&client.id, &crm).await.unwrap_err();
        assert!(matches!(err, CrmError::Remote(_)));
        assert_eq!(table.mode(&client.id, &crm), RowMode::Editing);
    }

    #[tokio::test]
    async fn test_save_success_returns_all_rows_to_viewing() {
        let fx = signed_in(Role::SalesStaff).await;
        let ana = fx.crm.add_client(&client_form("Ana")).await.unwrap();
        let ben = fx.crm.add_client(&client_form("Ben")).await.unwrap();
        let mut table = EditTable::<Client>::new();

        table.begin_edit(&ana, &fx.crm).set("name", "Anna");
        table.begin_edit(&ben, &fx.crm);

        let saved = table.save(&ana.id, &fx.crm).await.unwrap();
        assert_eq!(saved.name, "Anna");
        assert_eq!(table.mode(&ana.id, &fx.crm), RowMode::Viewing);
        assert_eq!(table.mode(&ben.id, &fx.crm), RowMode::Viewing);
        assert_eq!(fx.crm.snapshot().client(&ana.id).unwrap().name, "Anna");
    }

    #[tokio::test]
    async fn test_cancel_discards_draft() {
        let fx = signed_in(Role::SalesStaff).await;
        let branch = fx.crm.snapshot().branch(&fx.branch_id).cloned().unwrap();
        let mut table = EditTable::<Branch>::new();

        table.begin_edit(&branch, &fx.crm).set("name", "Uptown");
        table.cancel(&branch.id, &fx.crm).await.unwrap();

        assert_eq!(table.mode(&branch.id, &fx.crm), RowMode::Viewing);
        assert_eq!(fx.crm.snapshot().branch(&branch.id).unwrap().name, "Downtown");
        assert!(matches!(
            table.cancel(&branch.id, &fx.crm).await,
            Err(CrmError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_any_refresh_resets_other_tables() {
        let fx = signed_in(Role::SalesStaff).await;
        let product = fx.crm.add_product(&product_form("Boot", "10")).await.unwrap();
        let mut products = EditTable::<Product>::new();
        products.begin_edit(&product, &fx.crm).set("name", "Sandal");

        fx.crm.add_client(&client_form("Ana")).await.unwrap();

        assert_eq!(products.mode(&product.id, &fx.crm), RowMode::Viewing);
        assert!(products.draft(&product.id, &fx.crm).is_none());
        let draft = products.begin_edit(&product, &fx.crm);
        assert_eq!(draft.get("name"), "Boot");
    }

    #[tokio::test]
    async fn test_save_without_editing_is_invalid() {
        let fx = signed_in(Role::SalesStaff).await;
        let client = fx.crm.add_client(&client_form("Ana")).await.unwrap();
        let mut table = EditTable::<Client>::new();

        let err = table.save(&client.id, &fx.crm).await.unwrap_err();
        assert_eq!(err, CrmError::invalid_state("This row is not being edited."));
    }

    #[tokio::test]
    async fn test_delete_from_viewing_refreshes() {
        let fx = signed_in(Role::SalesStaff).await;
        let client = fx.crm.add_client(&client_form("Ana")).await.unwrap();
        let product = fx.crm.add_product(&product_form("Boot", "10")).await.unwrap();
        let sale = fx.crm.add_sale(&sale_form(&client, &product, "1")).await.unwrap();

        let mut sales = EditTable::<Sale>::new();
        sales.delete(&sale.id, &fx.crm).await.unwrap();
        assert!(fx.crm.snapshot().sales.is_empty());
    }

    // ===== SESSION TESTS =====

    #[tokio::test]
    async fn test_login_bad_password() {
        let db = setup_test_db();
        let identity = Arc::new(LocalIdentity::new());
        seed_staff(&db, &identity, "a@shop.test", Role::Admin, None).await;
        let (crm, _) = crm_over(db, identity);

        let err = crm.login("a@shop.test", "wrong!!").await.unwrap_err();
        assert_eq!(
            err,
            CrmError::Session(SessionError::InvalidCredentials(
                "Invalid login credentials".to_string()
            ))
        );
        assert!(crm.session().is_none());
    }

    #[tokio::test]
    async fn test_missing_profile_blocks_session() {
        let db = setup_test_db();
        let identity = Arc::new(LocalIdentity::new());
        identity
            .add_account(
                AuthUser {
                    id: "ghost".to_string(),
                    email: "ghost@shop.test".to_string(),
                },
                PASSWORD,
            )
            .unwrap();
        let (crm, _) = crm_over(db, identity);

        let err = crm.login("ghost@shop.test", PASSWORD).await.unwrap_err();
        assert_eq!(err.to_string(), "Profile not found. Check profiles table for this user.");
    }

    #[tokio::test]
    async fn test_pending_profile_is_signed_out() {
        let db = setup_test_db();
        let identity = Arc::new(LocalIdentity::new());
        let (crm, html) = crm_over(db, identity.clone());

        let profile = crm
            .request_access("New@Shop.test", PASSWORD, "New Person")
            .await
            .unwrap();
        assert_eq!(profile.role, Role::Pending);
        assert!(!profile.approved);
        assert_eq!(profile.email.as_deref(), Some("new@shop.test"));

        let err = crm.login("new@shop.test", PASSWORD).await.unwrap_err();
        assert_eq!(err, CrmError::Session(SessionError::PendingApproval));
        assert!(identity.current_user().await.is_none());
        assert_eq!(html.lock().unwrap().renders(), 0);
    }

    #[tokio::test]
    async fn test_request_access_validation() {
        let db = setup_test_db();
        let (crm, _) = crm_over(db, Arc::new(LocalIdentity::new()));

        let err = crm.request_access("x@shop.test", "12345", "").await.unwrap_err();
        assert_eq!(err.to_string(), "Password must be at least 6 characters.");
        assert!(crm.request_access("not-an-email", PASSWORD, "").await.unwrap_err().is_validation());

        crm.request_access("x@shop.test", PASSWORD, "").await.unwrap();
        let err = crm.request_access("x@shop.test", PASSWORD, "").await.unwrap_err();
        assert_eq!(err, CrmError::Remote("User already registered".to_string()));
    }

    #[tokio::test]
    async fn test_boot_resumes_identity_session() {
        let fx = signed_in(Role::Admin).await;
        let (crm, html) = crm_over(fx.db.clone(), fx.identity.clone());

        let session = crm.boot().await.unwrap();
        assert_eq!(session.user.email, "boss@shop.test");
        assert_eq!(html.lock().unwrap().renders(), 1);

        crm.logout().await;
        assert!(crm.session().is_none());
        assert_eq!(crm.boot().await.unwrap_err(), CrmError::Session(SessionError::NotSignedIn));
    }

    #[tokio::test]
    async fn test_visibility_by_role() {
        let cases = [
            (Role::Ceo, true, true),
            (Role::Admin, true, true),
            (Role::BranchManager, true, false),
            (Role::SalesStaff, false, false),
        ];
        for (role, analytics, manage) in cases {
            let fx = signed_in(role).await;
            let visibility = fx.crm.visibility();
            assert_eq!(visibility.analytics, analytics, "{role:?}");
            assert_eq!(visibility.users, manage, "{role:?}");
            assert_eq!(visibility.branches, manage, "{role:?}");
        }
    }

    // ===== USER TESTS =====

    #[tokio::test]
    async fn test_approve_user_then_login() {
        let fx = signed_in(Role::Ceo).await;
        let pending = fx.crm.request_access("rep@shop.test", PASSWORD, "").await.unwrap();

        let tables = views::user_tables(&fx.crm.snapshot());
        assert!(tables.pending.is_empty());
        fx.crm.refresh().await;
        let tables = views::user_tables(&fx.crm.snapshot());
        assert_eq!(tables.pending.len(), 1);
        assert_eq!(tables.approved.len(), 1);

        let approved = fx
            .crm
            .approve_user(&pending.id, Role::SalesStaff, &fx.branch_id)
            .await
            .unwrap();
        assert!(approved.approved);
        assert_eq!(approved.role, Role::SalesStaff);
        let listed = fx.crm.snapshot().profile(&pending.id).cloned().unwrap();
        assert_eq!(listed.branch_id.as_deref(), Some(fx.branch_id.as_str()));

        let tables = views::user_tables(&fx.crm.snapshot());
        assert!(tables.pending.is_empty());
        let rep = tables.approved.iter().find(|u| u.id == pending.id).unwrap();
        assert_eq!(rep.role, "sales_staff");
        assert_eq!(rep.branch, "Downtown");

        fx.crm.logout().await;
        let session = fx.crm.login("rep@shop.test", PASSWORD).await.unwrap();
        assert_eq!(session.profile.role, Role::SalesStaff);
    }

    #[tokio::test]
    async fn test_approve_requires_role_and_branch() {
        let fx = signed_in(Role::Ceo).await;
        let pending = fx.crm.request_access("rep@shop.test", PASSWORD, "").await.unwrap();

        let err = fx.crm.approve_user(&pending.id, Role::Pending, &fx.branch_id).await;
        assert!(err.unwrap_err().is_validation());
        let err = fx.crm.approve_user(&pending.id, Role::Admin, " ").await;
        assert!(err.unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn test_change_password() {
        let fx = signed_in(Role::SalesStaff).await;

        let err = fx.crm.change_password("abc").await.unwrap_err();
        assert_eq!(err.to_string(), "Password must be at least 6 characters.");

        fx.crm.change_password("brand-new").await.unwrap();
        fx.crm.logout().await;
        assert!(fx.crm.login("boss@shop.test", PASSWORD).await.is_err());
        assert!(fx.crm.login("boss@shop.test", "brand-new").await.is_ok());
    }

    #[tokio::test]
    async fn test_update_full_name_updates_session_and_settings() {
        let fx = signed_in(Role::SalesStaff).await;

        let err = fx.crm.update_full_name("   ").await.unwrap_err();
        assert_eq!(err.to_string(), "Please enter your name.");

        let saved = fx.crm.update_full_name(" Dora Marku ").await.unwrap();
        assert_eq!(saved, "Dora Marku");
        let session = fx.crm.session().unwrap();
        assert_eq!(session.profile.full_name.as_deref(), Some("Dora Marku"));
        assert_eq!(fx.html().slot("set-fullname-input"), Some("Dora Marku"));
    }

    #[tokio::test]
    async fn test_update_full_name_after_session_expired() {
        let fx = signed_in(Role::SalesStaff).await;
        fx.identity.sign_out().await;

        let err = fx.crm.update_full_name("Dora").await.unwrap_err();
        assert_eq!(err, CrmError::Session(SessionError::Expired));
        assert_eq!(err.to_string(), "Session expired. Please log in again.");
    }

    // ===== LEAD TESTS =====

    #[tokio::test]
    async fn test_lead_requires_name() {
        let db = setup_test_db();
        let store = Arc::new(CountingStore {
            inner: db,
            writes: AtomicUsize::new(0),
        });
        let (crm, _) = crm_over(store.clone(), Arc::new(LocalIdentity::new()));

        let form = LeadForm {
            name: "   ".to_string(),
            phone: "555".to_string(),
            ..Default::default()
        };
        let err = crm.submit_lead(&form).await.unwrap_err();

        assert_eq!(err, CrmError::validation("Name is required."));
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_submit_lead_without_session() {
        let db = setup_test_db();
        let (crm, html) = crm_over(db.clone(), Arc::new(LocalIdentity::new()));

        let lead = crm
            .submit_lead(&LeadForm {
                name: " Mira ".to_string(),
                phone: "555-0199".to_string(),
                city: String::new(),
                product_interest: "Boots".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(lead.name, "Mira");
        assert_eq!(lead.city, None);
        let stored = Repository::<Lead>::new(db).list().await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, lead.id);
        assert_eq!(stored[0].phone.as_deref(), Some("555-0199"));
        assert_eq!(stored[0].product_interest.as_deref(), Some("Boots"));
        assert_eq!(crm.generation(), 0);
        assert_eq!(html.lock().unwrap().renders(), 0);
    }

    #[tokio::test]
    async fn test_lead_remote_error_passes_through() {
        let db = setup_test_db();
        let store = Arc::new(FailingStore {
            inner: db,
            table: Table::Leads,
            fail_reads: false,
        });
        let (crm, _) = crm_over(store, Arc::new(LocalIdentity::new()));

        let form = LeadForm {
            name: "Mira".to_string(),
            ..Default::default()
        };
        let err = crm.submit_lead(&form).await.unwrap_err();
        assert_eq!(err.to_string(), "Database error: connection refused");
    }

    // ===== SALE TESTS =====

    #[tokio::test]
    async fn test_add_sale_computes_total() {
        let fx = signed_in(Role::SalesStaff).await;
        let client = fx.crm.add_client(&client_form("Ana")).await.unwrap();
        let product = fx.crm.add_product(&product_form("Boot", "12.5")).await.unwrap();

        let sale = fx.crm.add_sale(&sale_form(&client, &product, "3")).await.unwrap();
        assert_eq!(sale.total, 37.5);
        assert_eq!(sale.qty, 3.0);
        assert_eq!(sale.final_price, None);
        assert_eq!(sale.branch_id.as_deref(), Some(fx.branch_id.as_str()));
        assert_eq!(sale.created_by, Some(fx.crm.session().unwrap().user.id));
        let snapshot = fx.crm.snapshot();
        assert_eq!(snapshot.sales.len(), 1);
        assert_eq!(snapshot.sale(&sale.id).map(|s| s.total), Some(37.5));
    }

    #[tokio::test]
    async fn test_add_sale_final_price_override() {
        let fx = signed_in(Role::SalesStaff).await;
        let client = fx.crm.add_client(&client_form("Ana")).await.unwrap();
        let product = fx.crm.add_product(&product_form("Boot", "10")).await.unwrap();

        let mut form = sale_form(&client, &product, "3");
        form.final_price = "25".to_string();
        form.payment_type = "card".to_string();

        let sale = fx.crm.add_sale(&form).await.unwrap();
        assert_eq!(sale.total, 25.0);
        assert_eq!(sale.final_price, Some(25.0));
        assert_eq!(sale.payment_type.as_deref(), Some("card"));
    }

    #[tokio::test]
    async fn test_add_sale_validation() {
        let fx = signed_in(Role::SalesStaff).await;
        let client = fx.crm.add_client(&client_form("Ana")).await.unwrap();
        let product = fx.crm.add_product(&product_form("Boot", "10")).await.unwrap();

        let mut form = sale_form(&client, &product, "1");
        form.client_id.clear();
        assert_eq!(
            fx.crm.add_sale(&form).await.unwrap_err().to_string(),
            "Select client + product."
        );

        for qty in ["0", "-1", "1.5", "x", ""] {
            let err = fx.crm.add_sale(&sale_form(&client, &product, qty)).await.unwrap_err();
            assert_eq!(err.to_string(), "Quantity must be 1 or more.", "qty {qty:?}");
        }

        let mut form = sale_form(&client, &product, "1");
        form.product_id = "missing".to_string();
        assert_eq!(
            fx.crm.add_sale(&form).await.unwrap_err().to_string(),
            "Product not found (refresh)."
        );
        assert!(fx.crm.snapshot().sales.is_empty());
    }

    #[tokio::test]
    async fn test_add_sale_requires_branch() {
        let db = setup_test_db();
        let identity = Arc::new(LocalIdentity::new());
        seed_staff(&db, &identity, "solo@shop.test", Role::SalesStaff, None).await;
        let (crm, _) = crm_over(db, identity);
        crm.login("solo@shop.test", PASSWORD).await.unwrap();

        let client = crm.add_client(&client_form("Ana")).await.unwrap();
        let product = crm.add_product(&product_form("Boot", "10")).await.unwrap();
        assert_eq!(client.branch_id, None);

        let err = crm.add_sale(&sale_form(&client, &product, "1")).await.unwrap_err();
        assert_eq!(err.to_string(), "No branch assigned to your account.");
    }

    #[tokio::test]
    async fn test_add_sale_requires_session() {
        let fx = signed_in(Role::SalesStaff).await;
        let client = fx.crm.add_client(&client_form("Ana")).await.unwrap();
        let product = fx.crm.add_product(&product_form("Boot", "10")).await.unwrap();
        fx.identity.sign_out().await;

        let err = fx.crm.add_sale(&sale_form(&client, &product, "1")).await.unwrap_err();
        assert_eq!(err, CrmError::Session(SessionError::Lost));
    }

    // ===== VIEW TESTS =====

    fn snapshot_from(value: Value) -> Snapshot {
        let get = |key: &str| value.get(key).cloned().unwrap_or(json!([]));
        Snapshot {
            branches: serde_json::from_value(get("branches")).unwrap(),
            clients: serde_json::from_value(get("clients")).unwrap(),
            products: serde_json::from_value(get("products")).unwrap(),
            sales: serde_json::from_value(get("sales")).unwrap(),
            profiles: serde_json::from_value(get("profiles")).unwrap(),
            fetched_at: None,
        }
    }

    #[test]
    fn test_sale_rows_resolve_placeholders() {
        let snapshot = snapshot_from(json!({
            "clients": [{ "id": "c1", "name": "Ana", "phone": "1", "city": "X" }],
            "products": [{ "id": "p1", "name": "Boot", "price": 10 }],
            "sales": [
                { "id": "s1", "client_id": "c1", "product_id": "p1", "qty": 2, "total": 20,
                  "payment_type": "cash", "date": "2024-03-01" },
                { "id": "s2", "client_id": "gone", "product_id": "gone", "qty": 1, "total": 5 }
            ]
        }));

        let rows = views::sale_rows(&snapshot);
        assert_eq!(rows[0].client, "Ana");
        assert_eq!(rows[0].product, "Boot");
        assert_eq!(rows[0].payment_type, "cash");
        assert_eq!(rows[1].client, "Unknown");
        assert_eq!(rows[1].product, "Unknown");
        assert_eq!(rows[1].payment_type, "—");
        assert_eq!(rows[1].date, "");
    }

    #[test]
    fn test_user_tables_split_on_literal_true() {
        let snapshot = snapshot_from(json!({
            "branches": [{ "id": "b1", "name": "Downtown" }],
            "profiles": [
                { "id": "u1", "email": "a@x", "role": "admin", "branch_id": "b1", "approved": true },
                { "id": "u2", "email": "b@x", "approved": "true" },
                { "id": "u3", "email": "c@x", "role": "ceo", "approved": true, "branch_id": "gone" },
                { "id": "u4", "email": "d@x", "approved": null }
            ]
        }));

        let tables = views::user_tables(&snapshot);
        let pending: Vec<&str> = tables.pending.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(pending, ["u2", "u4"]);
        assert_eq!(tables.approved[0].branch, "Downtown");
        assert_eq!(tables.approved[1].branch, "—");
    }

    #[test]
    fn test_sale_form_options_label_price() {
        let snapshot = snapshot_from(json!({
            "products": [{ "id": "p1", "name": "Boot", "price": 12.5 }]
        }));
        let options = views::sale_form_options(&snapshot);
        assert_eq!(options.products[0].label, "Boot (12.5)");
    }

    // ===== RENDER TESTS =====

    #[tokio::test]
    async fn test_render_escapes_store_text() {
        let fx = signed_in(Role::Ceo).await;
        fx.crm
            .add_client(&client_form("<img src=x onerror=alert(1)>"))
            .await
            .unwrap();

        let html = fx.html();
        let table = html.slot("clients-table").unwrap();
        assert!(table.contains("&lt;img src=x onerror=alert(1)&gt;"));
        assert!(!table.contains("<img"));
    }

    #[tokio::test]
    async fn test_render_slots_follow_visibility() {
        let fx = signed_in(Role::SalesStaff).await;
        {
            let html = fx.html();
            assert_eq!(html.slot("stat-clients"), Some("0"));
            assert!(html.slot("total-revenue").is_none());
            assert!(html.slot("pending-users-table").is_none());
            assert_eq!(html.last_generation(), fx.crm.generation());
        }

        let fx = signed_in(Role::Ceo).await;
        let html = fx.html();
        assert_eq!(html.slot("total-revenue"), Some("0"));
        assert_eq!(html.slot("top-product"), Some("—"));
        assert_eq!(html.slot("top-branch-text"), Some(""));
        assert!(html.slot("all-users-table").unwrap().contains("boss@shop.test"));
    }

    #[tokio::test]
    async fn test_render_analytics_after_sale() {
        let fx = signed_in(Role::BranchManager).await;
        let client = fx.crm.add_client(&client_form("Ana")).await.unwrap();
        let product = fx.crm.add_product(&product_form("Boot", "10")).await.unwrap();
        fx.crm.add_sale(&sale_form(&client, &product, "2")).await.unwrap();

        let html = fx.html();
        assert_eq!(html.slot("total-revenue"), Some("20"));
        assert_eq!(html.slot("total-sales"), Some("1"));
        assert_eq!(html.slot("top-product"), Some("Boot (2 sold)"));
        assert_eq!(html.slot("best-client"), Some("Ana (20)"));
        assert_eq!(html.slot("top-branch-text"), Some("Top branch: Downtown (20 revenue)"));
        assert!(html.slot("rep-performance-table").unwrap().contains("boss@shop.test"));
    }

    #[test]
    fn test_edit_row_escapes_inputs() {
        let client: Client = serde_json::from_value(json!({
            "id": "c\"1",
            "name": "O'Brien \"Jr\"",
            "phone": "<1>",
            "city": "X",
        }))
        .unwrap();

        let markup = edit_row::<Client>(&client.id, &Draft::of(&client));
        assert!(markup.contains("value=\"O&#39;Brien &quot;Jr&quot;\""));
        assert!(markup.contains("value=\"&lt;1&gt;\""));
        assert!(markup.contains("data-save=\"c&quot;1\""));
        assert!(markup.contains("Cancel"));
        assert!(!markup.contains("Delete"));
    }

    // ===== REFRESH TESTS =====

    #[tokio::test]
    async fn test_slower_refresh_overwrites_newer() {
        let db = setup_test_db();
        let store = Arc::new(GatedStore {
            inner: db.clone(),
            armed: AtomicBool::new(true),
            reached: Notify::new(),
            release: Notify::new(),
        });
        let (crm, _) = crm_over(store.clone(), Arc::new(LocalIdentity::new()));

        let slow = crm.refresh();
        let fast = async {
            store.reached.notified().await;
            db.insert(Table::Clients, row(json!({ "name": "Ana", "phone": "1", "city": "X" })))
                .await
                .unwrap();
            let generation = crm.refresh().await;
            assert_eq!(crm.snapshot().clients.len(), 1);
            store.release.notify_one();
            generation
        };

        let (slow_generation, fast_generation) = tokio::join!(slow, fast);
        assert_eq!(fast_generation, 1);
        assert_eq!(slow_generation, 2);
        // The stale fetch landed last and wins.
        assert!(crm.snapshot().clients.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_fetches_all_collections() {
        let fx = signed_in(Role::Ceo).await;
        let generation = fx.crm.generation();
        fx.crm.add_branch(&BranchForm {
            name: "Harbour".to_string(),
            city: " ".to_string(),
        })
        .await
        .unwrap();

        let snapshot = fx.crm.snapshot();
        assert_eq!(fx.crm.generation(), generation + 1);
        assert_eq!(snapshot.branches.len(), 2);
        assert_eq!(snapshot.branches[0].name, "Harbour");
        assert_eq!(snapshot.branches[0].city, None);
        assert_eq!(snapshot.profiles.len(), 1);
        assert!(snapshot.fetched_at.is_some());
        let profile: &StaffProfile = &snapshot.profiles[0];
        assert_eq!(profile.role, Role::Ceo);
    }
}
