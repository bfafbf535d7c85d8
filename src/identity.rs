//! Identity capability set.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// The signed-in account as reported by the identity provider. Its `id`
/// is also the id of the matching staff profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Invalid login credentials")]
    InvalidCredentials,

    #[error("User already registered")]
    AlreadyRegistered,

    #[error("Auth session missing!")]
    NoSession,

    #[error("{0}")]
    Provider(String),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_user(&self) -> Option<AuthUser>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AuthError>;

    async fn sign_out(&self);

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser, AuthError>;

    async fn update_password(&self, new_password: &str) -> Result<(), AuthError>;
}

struct Account {
    user: AuthUser,
    password: String,
}

#[derive(Default)]
struct Accounts {
    by_email: HashMap<String, Account>,
    current: Option<AuthUser>,
}

/// In-process identity provider holding accounts in memory.
#[derive(Default)]
pub struct LocalIdentity {
    inner: Mutex<Accounts>,
}

impl LocalIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Accounts>, AuthError> {
        self.inner
            .lock()
            .map_err(|e| AuthError::Provider(e.to_string()))
    }

    /// Registers an account under a known user id, e.g. one whose profile
    /// already exists in the row store.
    pub fn add_account(&self, user: AuthUser, password: &str) -> Result<AuthUser, AuthError> {
        let mut accounts = self.lock()?;
        let key = Self::normalize(&user.email);
        if accounts.by_email.contains_key(&key) {
            return Err(AuthError::AlreadyRegistered);
        }

        let user = AuthUser {
            id: user.id,
            email: key.clone(),
        };
        accounts.by_email.insert(
            key,
            Account {
                user: user.clone(),
                password: password.to_string(),
            },
        );
        Ok(user)
    }

    fn normalize(email: &str) -> String {
        email.trim().to_lowercase()
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentity {
    async fn current_user(&self) -> Option<AuthUser> {
        self.lock().ok().and_then(|accounts| accounts.current.clone())
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        let mut accounts = self.lock()?;
        let user = match accounts.by_email.get(&Self::normalize(email)) {
            Some(account) if account.password == password => account.user.clone(),
            _ => return Err(AuthError::InvalidCredentials),
        };
        accounts.current = Some(user.clone());
        Ok(user)
    }

    async fn sign_out(&self) {
        if let Ok(mut accounts) = self.lock() {
            accounts.current = None;
        }
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        let user = AuthUser {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
        };
        self.add_account(user, password)
    }

    async fn update_password(&self, new_password: &str) -> Result<(), AuthError> {
        let mut accounts = self.lock()?;
        let email = accounts
            .current
            .as_ref()
            .map(|u| u.email.clone())
            .ok_or(AuthError::NoSession)?;
        match accounts.by_email.get_mut(&email) {
            Some(account) => {
                account.password = new_password.to_string();
                Ok(())
            }
            None => Err(AuthError::NoSession),
        }
    }
}
