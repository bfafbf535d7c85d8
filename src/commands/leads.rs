use crate::app::Crm;
use crate::error::{CrmError, CrmResult};
use crate::models::{CreateLead, Lead, LeadForm};
use crate::repository::{Entity, Payload};
use crate::store::Table;

const NAME_REQUIRED: &str = "Name is required.";

/// Shown once a lead has been stored.
pub const LEAD_RECEIVED: &str = "Submitted ✅ We will contact you soon.";

impl Entity for Lead {
    const TABLE: Table = Table::Leads;

    fn id(&self) -> &str {
        &self.id
    }
}

fn optional(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

impl LeadForm {
    /// Only the name is mandatory.
    pub fn validate(&self) -> CrmResult<CreateLead> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(CrmError::validation(NAME_REQUIRED));
        }
        Ok(CreateLead {
            name: name.to_string(),
            phone: optional(&self.phone),
            city: optional(&self.city),
            product_interest: optional(&self.product_interest),
        })
    }
}

impl Payload for CreateLead {
    fn check(&self) -> CrmResult<()> {
        if self.name.trim().is_empty() {
            return Err(CrmError::validation(NAME_REQUIRED));
        }
        Ok(())
    }
}

impl Crm {
    /// Public enquiry form submission. Works without a session and leaves the
    /// snapshot alone, since leads are not shown in any table.
    pub async fn submit_lead(&self, form: &LeadForm) -> CrmResult<Lead> {
        let payload = form.validate()?;
        self.repository::<Lead>().add(&payload).await
    }
}
