use crate::app::Crm;
use crate::error::{CrmError, CrmResult, SessionError};
use crate::models::{ApproveProfile, CreateProfile, Role, StaffProfile, UpdateFullName};
use crate::repository::{Entity, Payload};
use crate::store::{OrderBy, Table};

const MIN_PASSWORD: usize = 6;
const PASSWORD_SHORT: &str = "Password must be at least 6 characters.";
const NAME_MISSING: &str = "Please enter your name.";

impl Entity for StaffProfile {
    const TABLE: Table = Table::Profiles;
    const ORDER: OrderBy = OrderBy::desc("requested_at");

    fn id(&self) -> &str {
        &self.id
    }
}

fn check_password(password: &str) -> CrmResult<()> {
    if password.chars().count() < MIN_PASSWORD {
        return Err(CrmError::validation(PASSWORD_SHORT));
    }
    Ok(())
}

fn check_email(email: &str) -> CrmResult<()> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !email.contains(' '),
        None => false,
    };
    if !valid {
        return Err(CrmError::validation("Please enter a valid email."));
    }
    Ok(())
}

impl Payload for CreateProfile {
    fn check(&self) -> CrmResult<()> {
        if self.id.is_empty() {
            return Err(SessionError::Lost.into());
        }
        check_email(&self.email)
    }
}

impl Payload for ApproveProfile {
    fn check(&self) -> CrmResult<()> {
        if self.role == Role::Pending {
            return Err(CrmError::validation("Choose a role to grant."));
        }
        if self.branch_id.trim().is_empty() {
            return Err(CrmError::validation("Choose a branch for this user."));
        }
        Ok(())
    }
}

impl Payload for UpdateFullName {
    fn check(&self) -> CrmResult<()> {
        if self.full_name.trim().is_empty() {
            return Err(CrmError::validation(NAME_MISSING));
        }
        Ok(())
    }
}

impl Crm {
    /// Registers an account and files a pending profile for it.
    /// Sign-up leaves nobody signed in; the account waits for approval.
    pub async fn request_access(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> CrmResult<StaffProfile> {
        let email = email.trim().to_lowercase();
        check_email(&email)?;
        check_password(password)?;

        let user = self
            .identity
            .sign_up(&email, password)
            .await
            .map_err(|e| CrmError::Remote(e.to_string()))?;

        let full_name = full_name.trim();
        let payload = CreateProfile {
            id: user.id,
            email: user.email,
            full_name: (!full_name.is_empty()).then(|| full_name.to_string()),
            role: Role::Pending,
            approved: false,
        };
        let profile = self.repository::<StaffProfile>().add(&payload).await?;
        tracing::info!(email = %payload.email, "access requested");
        Ok(profile)
    }

    /// Grants a role and branch to a pending profile in one update.
    pub async fn approve_user(
        &self,
        profile_id: &str,
        role: Role,
        branch_id: &str,
    ) -> CrmResult<StaffProfile> {
        let payload = ApproveProfile {
            approved: true,
            role,
            branch_id: branch_id.trim().to_string(),
        };
        let profile = self
            .repository::<StaffProfile>()
            .update(profile_id, &payload)
            .await?;
        self.refresh_and_render().await;
        Ok(profile)
    }

    pub async fn change_password(&self, new_password: &str) -> CrmResult<()> {
        check_password(new_password)?;
        self.identity
            .update_password(new_password)
            .await
            .map_err(|e| CrmError::Remote(e.to_string()))?;
        tracing::info!("password updated");
        Ok(())
    }

    /// Saves the display name and repaints the settings from the session.
    pub async fn update_full_name(&self, full_name: &str) -> CrmResult<String> {
        let full_name = full_name.trim();
        if full_name.is_empty() {
            return Err(CrmError::validation(NAME_MISSING));
        }

        let user = self
            .identity
            .current_user()
            .await
            .ok_or(SessionError::Expired)?;

        let payload = UpdateFullName {
            full_name: full_name.to_string(),
        };
        let profile = self
            .repository::<StaffProfile>()
            .update(&user.id, &payload)
            .await?;
        let saved = profile.full_name.unwrap_or_default();

        if let Some(mut session) = self.session() {
            session.profile.full_name = Some(saved.clone());
            self.set_session(Some(session));
        }
        self.render();
        Ok(saved)
    }
}
