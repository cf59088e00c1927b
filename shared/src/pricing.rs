//! Order-level pricing attached at checkout

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An amount in a specific currency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Money {
    /// ISO 4217 code, e.g. `GBP`
    pub currency: String,
    pub amount: Decimal,
}

impl Money {
    pub fn new(currency: impl Into<String>, amount: Decimal) -> Self {
        Money {
            currency: currency.into(),
            amount,
        }
    }
}

/// Totals computed at checkout time. The platform receives the grand
/// total as `customer_payment`; shipping and discount are retained for
/// receipts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPricing {
    pub total_cost: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_shipping_cost: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promo_discount: Option<Money>,
}

impl OrderPricing {
    pub fn new(total_cost: Money) -> Self {
        OrderPricing {
            total_cost,
            total_shipping_cost: None,
            promo_discount: None,
        }
    }

    pub fn with_shipping(mut self, shipping: Money) -> Self {
        self.total_shipping_cost = Some(shipping);
        self
    }

    pub fn with_promo_discount(mut self, discount: Money) -> Self {
        self.promo_discount = Some(discount);
        self
    }
}
