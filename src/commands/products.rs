use crate::app::Crm;
use crate::editing::{Draft, Editable, Field};
use crate::error::{CrmError, CrmResult};
use crate::format::format_number;
use crate::models::{CreateProduct, Product, ProductForm, UpdateProduct};
use crate::repository::{Entity, Payload};
use crate::store::Table;

const NAME_REQUIRED: &str = "Name is required.";
const PRICE_POSITIVE: &str = "Price must be a positive number.";

impl Entity for Product {
    const TABLE: Table = Table::Products;

    fn id(&self) -> &str {
        &self.id
    }
}

fn check_price(price: f64) -> CrmResult<f64> {
    if price.is_finite() && price > 0.0 {
        Ok(price)
    } else {
        Err(CrmError::validation(PRICE_POSITIVE))
    }
}

impl ProductForm {
    /// Name and a positive price are required; a blank category is stored as none.
    pub fn validate(&self) -> CrmResult<UpdateProduct> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(CrmError::validation(NAME_REQUIRED));
        }

        let price = self
            .price
            .trim()
            .parse::<f64>()
            .map_err(|_| CrmError::validation(PRICE_POSITIVE))
            .and_then(check_price)?;

        let category = self.category.trim();
        Ok(UpdateProduct {
            name: name.to_string(),
            category: (!category.is_empty()).then(|| category.to_string()),
            price,
        })
    }
}

impl Payload for CreateProduct {
    fn check(&self) -> CrmResult<()> {
        if self.name.trim().is_empty() {
            return Err(CrmError::validation(NAME_REQUIRED));
        }
        check_price(self.price).map(drop)
    }
}

impl Payload for UpdateProduct {
    fn check(&self) -> CrmResult<()> {
        if self.name.trim().is_empty() {
            return Err(CrmError::validation(NAME_REQUIRED));
        }
        check_price(self.price).map(drop)
    }
}

impl Editable for Product {
    type Changes = UpdateProduct;

    const FIELDS: &'static [Field] = &[
        Field::text("name"),
        Field::text("category"),
        Field::number("price"),
    ];

    fn field_value(&self, field: &str) -> String {
        match field {
            "name" => self.name.clone(),
            "category" => self.category.clone().unwrap_or_default(),
            "price" => format_number(self.price),
            _ => String::new(),
        }
    }

    fn changes(draft: &Draft) -> CrmResult<UpdateProduct> {
        ProductForm {
            name: draft.get("name").to_string(),
            category: draft.get("category").to_string(),
            price: draft.get("price").to_string(),
        }
        .validate()
    }
}

impl Crm {
    /// Add-product form submission.
    pub async fn add_product(&self, form: &ProductForm) -> CrmResult<Product> {
        let UpdateProduct {
            name,
            category,
            price,
        } = form.validate()?;
        let payload = CreateProduct {
            name,
            category,
            price,
            branch_id: self.profile().and_then(|p| p.branch_id),
        };

        let product = self.repository::<Product>().add(&payload).await?;
        self.refresh_and_render().await;
        Ok(product)
    }
}
