use crate::app::Crm;
use crate::editing::{Draft, Editable, Field};
use crate::error::{CrmError, CrmResult};
use crate::models::{Client, ClientForm, CreateClient, UpdateClient};
use crate::repository::{Entity, Payload};
use crate::store::Table;

const ALL_REQUIRED: &str = "All fields are required.";

impl Entity for Client {
    const TABLE: Table = Table::Clients;

    fn id(&self) -> &str {
        &self.id
    }
}

impl ClientForm {
    /// Name, phone and city are all mandatory.
    pub fn validate(&self) -> CrmResult<UpdateClient> {
        let (name, phone, city) = (self.name.trim(), self.phone.trim(), self.city.trim());
        if name.is_empty() || phone.is_empty() || city.is_empty() {
            return Err(CrmError::validation(ALL_REQUIRED));
        }
        Ok(UpdateClient {
            name: name.to_string(),
            phone: phone.to_string(),
            city: city.to_string(),
        })
    }
}

fn require_all(fields: [&str; 3]) -> CrmResult<()> {
    if fields.iter().any(|f| f.trim().is_empty()) {
        return Err(CrmError::validation(ALL_REQUIRED));
    }
    Ok(())
}

impl Payload for CreateClient {
    fn check(&self) -> CrmResult<()> {
        require_all([self.name.as_str(), self.phone.as_str(), self.city.as_str()])
    }
}

impl Payload for UpdateClient {
    fn check(&self) -> CrmResult<()> {
        require_all([self.name.as_str(), self.phone.as_str(), self.city.as_str()])
    }
}

impl Editable for Client {
    type Changes = UpdateClient;

    const FIELDS: &'static [Field] = &[Field::text("name"), Field::text("phone"), Field::text("city")];

    fn field_value(&self, field: &str) -> String {
        match field {
            "name" => self.name.clone(),
            "phone" => self.phone.clone(),
            "city" => self.city.clone(),
            _ => String::new(),
        }
    }

    fn changes(draft: &Draft) -> CrmResult<UpdateClient> {
        ClientForm {
            name: draft.get("name").to_string(),
            phone: draft.get("phone").to_string(),
            city: draft.get("city").to_string(),
        }
        .validate()
    }
}

impl Crm {
    /// Add-client form submission. The client belongs to the signed-in
    /// user's branch, if they have one.
    pub async fn add_client(&self, form: &ClientForm) -> CrmResult<Client> {
        let UpdateClient { name, phone, city } = form.validate()?;
        let payload = CreateClient {
            name,
            phone,
            city,
            branch_id: self.profile().and_then(|p| p.branch_id),
        };

        let client = self.repository::<Client>().add(&payload).await?;
        self.refresh_and_render().await;
        Ok(client)
    }
}
