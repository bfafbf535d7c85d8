use crate::app::Crm;
use crate::editing::{Draft, Editable, Field};
use crate::error::{CrmError, CrmResult};
use crate::models::{Branch, BranchForm, CreateBranch, UpdateBranch};
use crate::repository::{Entity, Payload};
use crate::store::Table;

const NAME_REQUIRED: &str = "Branch name is required.";

impl Entity for Branch {
    const TABLE: Table = Table::Branches;

    fn id(&self) -> &str {
        &self.id
    }
}

fn optional(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

impl BranchForm {
    pub fn validate(&self) -> CrmResult<CreateBranch> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(CrmError::validation(NAME_REQUIRED));
        }
        Ok(CreateBranch {
            name: name.to_string(),
            city: optional(&self.city),
        })
    }
}

impl Payload for CreateBranch {
    fn check(&self) -> CrmResult<()> {
        if self.name.trim().is_empty() {
            return Err(CrmError::validation(NAME_REQUIRED));
        }
        Ok(())
    }
}

impl Payload for UpdateBranch {
    fn check(&self) -> CrmResult<()> {
        if self.name.trim().is_empty() {
            return Err(CrmError::validation(NAME_REQUIRED));
        }
        Ok(())
    }
}

impl Editable for Branch {
    type Changes = UpdateBranch;

    const FIELDS: &'static [Field] = &[Field::text("name"), Field::text("city")];

    fn field_value(&self, field: &str) -> String {
        match field {
            "name" => self.name.clone(),
            "city" => self.city.clone().unwrap_or_default(),
            _ => String::new(),
        }
    }

    fn changes(draft: &Draft) -> CrmResult<UpdateBranch> {
        let form = BranchForm {
            name: draft.get("name").to_string(),
            city: draft.get("city").to_string(),
        };
        let CreateBranch { name, city } = form.validate()?;
        Ok(UpdateBranch { name, city })
    }
}

impl Crm {
    /// Add-branch form submission.
    pub async fn add_branch(&self, form: &BranchForm) -> CrmResult<Branch> {
        let payload = form.validate()?;
        let branch = self.repository::<Branch>().add(&payload).await?;
        self.refresh_and_render().await;
        Ok(branch)
    }
}
