//! Orchestrator: session, refresh cycle and rendering.
//!
//! Every write ends in [`Crm::refresh_and_render`], which re-fetches all
//! collections and paints everything again. Nothing is patched locally.

use std::sync::{Arc, Mutex, RwLock};

use serde::Serialize;

use crate::analytics::AnalyticsReport;
use crate::error::{CrmResult, SessionError};
use crate::identity::{AuthUser, IdentityProvider};
use crate::models::{Branch, Client, Product, Sale, StaffProfile};
use crate::render::{Frame, HtmlRenderer, Renderer};
use crate::repository::{Entity, Repository};
use crate::state::{AppState, Snapshot};
use crate::store::RowStore;

/// The signed-in user together with their approved profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub user: AuthUser,
    pub profile: StaffProfile,
}

/// Which pages the current role may open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Visibility {
    pub analytics: bool,
    pub users: bool,
    pub branches: bool,
}

pub struct Crm {
    pub(crate) store: Arc<dyn RowStore>,
    pub(crate) identity: Arc<dyn IdentityProvider>,
    state: AppState,
    session: RwLock<Option<Session>>,
    renderer: Mutex<Box<dyn Renderer + Send>>,
}

impl Crm {
    pub fn new(store: Arc<dyn RowStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            store,
            identity,
            state: AppState::new(),
            session: RwLock::new(None),
            renderer: Mutex::new(Box::new(HtmlRenderer::default())),
        }
    }

    pub fn with_renderer(self, renderer: impl Renderer + Send + 'static) -> Self {
        Self {
            renderer: Mutex::new(Box::new(renderer)),
            ..self
        }
    }

    pub fn repository<E: Entity>(&self) -> Repository<E> {
        Repository::new(Arc::clone(&self.store))
    }

    pub fn identity(&self) -> &dyn IdentityProvider {
        self.identity.as_ref()
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.state.snapshot()
    }

    /// Render count; bumps on every refresh.
    pub fn generation(&self) -> u64 {
        self.state.generation()
    }

    pub fn session(&self) -> Option<Session> {
        match self.session.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub(crate) fn profile(&self) -> Option<StaffProfile> {
        self.session().map(|s| s.profile)
    }

    pub(crate) fn set_session(&self, session: Option<Session>) {
        match self.session.write() {
            Ok(mut guard) => *guard = session,
            Err(poisoned) => *poisoned.into_inner() = session,
        }
    }

    pub fn visibility(&self) -> Visibility {
        match self.profile() {
            Some(profile) if profile.approved => Visibility {
                analytics: profile.role.can_see_analytics(),
                users: profile.role.can_manage_users(),
                branches: profile.role.can_manage_branches(),
            },
            _ => Visibility::default(),
        }
    }

    // ===== SESSION =====

    /// Resumes an existing identity session, if there is one.
    pub async fn boot(&self) -> CrmResult<Session> {
        let user = self
            .identity
            .current_user()
            .await
            .ok_or(SessionError::NotSignedIn)?;
        self.start_session(user).await
    }

    pub async fn login(&self, email: &str, password: &str) -> CrmResult<Session> {
        let user = self
            .identity
            .sign_in(email.trim(), password)
            .await
            .map_err(|e| SessionError::InvalidCredentials(e.to_string()))?;
        self.start_session(user).await
    }

    pub async fn logout(&self) {
        self.identity.sign_out().await;
        self.set_session(None);
        tracing::info!("signed out");
    }

    async fn start_session(&self, user: AuthUser) -> CrmResult<Session> {
        let Some(profile) = self.repository::<StaffProfile>().find(&user.id).await else {
            tracing::warn!(user = %user.id, "no profile for user");
            self.set_session(None);
            return Err(SessionError::ProfileMissing.into());
        };

        if !profile.approved {
            tracing::info!(user = %user.id, "profile awaiting approval");
            self.identity.sign_out().await;
            self.set_session(None);
            return Err(SessionError::PendingApproval.into());
        }

        let session = Session { user, profile };
        self.set_session(Some(session.clone()));
        tracing::info!(email = %session.user.email, role = session.profile.role.as_str(), "signed in");

        self.refresh_and_render().await;
        Ok(session)
    }

    // ===== REFRESH =====

    /// Fetches every collection. Failed lists come back empty.
    pub async fn fetch_snapshot(&self) -> Snapshot {
        let branches = self.repository::<Branch>().list().await;
        let profiles = self.repository::<StaffProfile>().list().await;
        let clients = self.repository::<Client>().list().await;
        let products = self.repository::<Product>().list().await;
        let sales = self.repository::<Sale>().list().await;

        Snapshot {
            branches,
            clients,
            products,
            sales,
            profiles,
            fetched_at: Some(chrono::Utc::now()),
        }
    }

    /// Fetches and installs a new snapshot; returns its generation.
    pub async fn refresh(&self) -> u64 {
        let snapshot = self.fetch_snapshot().await;
        let stats = snapshot.stats();
        let generation = self.state.install(snapshot);
        tracing::debug!(
            generation,
            clients = stats.clients,
            products = stats.products,
            sales = stats.sales,
            "snapshot installed"
        );
        generation
    }

    pub async fn refresh_and_render(&self) {
        self.refresh().await;
        self.render();
    }

    /// Paints the current snapshot without fetching.
    pub fn render(&self) {
        let snapshot = self.snapshot();
        let report = AnalyticsReport::compute(&snapshot);
        let session = self.session();
        let frame = Frame {
            snapshot: &snapshot,
            report: &report,
            session: session.as_ref(),
            visibility: self.visibility(),
            generation: self.generation(),
        };

        match self.renderer.lock() {
            Ok(mut renderer) => renderer.render(&frame),
            Err(poisoned) => poisoned.into_inner().render(&frame),
        }
    }
}
