use crate::app::Crm;
use crate::error::{CrmError, CrmResult, SessionError};
use crate::models::{CreateSale, Sale, SaleForm};
use crate::repository::{Entity, Payload};
use crate::store::Table;

const SELECT_BOTH: &str = "Select client + product.";
const QTY_MIN: &str = "Quantity must be 1 or more.";
const FINAL_PRICE: &str = "Final price must be a non-negative number.";
const NO_BRANCH: &str = "No branch assigned to your account.";
const PRODUCT_MISSING: &str = "Product not found (refresh).";

impl Entity for Sale {
    const TABLE: Table = Table::Sales;

    fn id(&self) -> &str {
        &self.id
    }
}

/// A sale form that passed the checks needing no lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct SaleInput {
    pub client_id: String,
    pub product_id: String,
    pub qty: i64,
    pub final_price: Option<f64>,
    pub payment_type: Option<String>,
}

impl SaleForm {
    pub fn validate(&self) -> CrmResult<SaleInput> {
        let client_id = self.client_id.trim();
        let product_id = self.product_id.trim();
        if client_id.is_empty() || product_id.is_empty() {
            return Err(CrmError::validation(SELECT_BOTH));
        }

        let qty = match self.qty.trim().parse::<f64>() {
            Ok(q) if q.is_finite() && q >= 1.0 && q.fract() == 0.0 && q < i64::MAX as f64 => q,
            _ => return Err(CrmError::validation(QTY_MIN)),
        };

        let final_price = match self.final_price.trim() {
            "" => None,
            raw => match raw.parse::<f64>() {
                Ok(p) if p.is_finite() && p >= 0.0 => Some(p),
                _ => return Err(CrmError::validation(FINAL_PRICE)),
            },
        };

        let payment_type = self.payment_type.trim();
        Ok(SaleInput {
            client_id: client_id.to_string(),
            product_id: product_id.to_string(),
            qty: qty as i64,
            final_price,
            payment_type: (!payment_type.is_empty()).then(|| payment_type.to_string()),
        })
    }
}

impl Payload for CreateSale {
    fn check(&self) -> CrmResult<()> {
        if self.client_id.is_empty() || self.product_id.is_empty() {
            return Err(CrmError::validation(SELECT_BOTH));
        }
        if self.qty < 1 {
            return Err(CrmError::validation(QTY_MIN));
        }
        if !self.total.is_finite() || self.total < 0.0 {
            return Err(CrmError::validation("Total must be a non-negative number."));
        }
        if self.branch_id.is_empty() {
            return Err(CrmError::validation(NO_BRANCH));
        }
        if self.created_by.is_empty() {
            return Err(SessionError::Lost.into());
        }
        Ok(())
    }
}

impl Crm {
    /// Add-sale form submission.
    ///
    /// The total is the product's current price times the quantity, unless a
    /// final price is given, in which case that amount is the total.
    pub async fn add_sale(&self, form: &SaleForm) -> CrmResult<Sale> {
        let input = form.validate()?;

        let user = self
            .identity
            .current_user()
            .await
            .ok_or(SessionError::Lost)?;

        let branch_id = self
            .profile()
            .and_then(|p| p.branch_id)
            .ok_or_else(|| CrmError::validation(NO_BRANCH))?;

        let snapshot = self.snapshot();
        let product = snapshot
            .product(&input.product_id)
            .ok_or_else(|| CrmError::validation(PRODUCT_MISSING))?;

        let total = input
            .final_price
            .unwrap_or(product.price * input.qty as f64);

        let payload = CreateSale {
            client_id: input.client_id,
            product_id: input.product_id,
            qty: input.qty,
            total,
            final_price: input.final_price,
            payment_type: input.payment_type,
            branch_id,
            created_by: user.id,
        };

        let sale = self.repository::<Sale>().add(&payload).await?;
        self.refresh_and_render().await;
        Ok(sale)
    }
}
