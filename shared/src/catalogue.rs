//! Product catalogue entries

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A printable product as configured on the platform dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Identifier the platform routes print jobs by
    pub template_id: String,
    /// Human readable name shown in order summaries
    pub name: String,
    /// How many customer images fit on one printed sheet. Square prints
    /// pack several photos per sheet; single-photo products use 1.
    pub quantity_per_sheet: u32,
    /// Unit cost per sheet keyed by ISO currency code
    #[serde(default)]
    pub costs: HashMap<String, Decimal>,
}

impl Product {
    pub fn new(template_id: impl Into<String>, name: impl Into<String>) -> Self {
        Product {
            template_id: template_id.into(),
            name: name.into(),
            quantity_per_sheet: 1,
            costs: HashMap::new(),
        }
    }

    pub fn with_quantity_per_sheet(mut self, quantity: u32) -> Self {
        self.quantity_per_sheet = quantity;
        self
    }

    pub fn with_cost(mut self, currency: impl Into<String>, amount: Decimal) -> Self {
        self.costs.insert(currency.into(), amount);
        self
    }

    pub fn cost_for_currency(&self, currency: &str) -> Option<Decimal> {
        self.costs.get(currency).copied()
    }

    pub fn supported_currencies(&self) -> impl Iterator<Item = &str> {
        self.costs.keys().map(String::as_str)
    }
}
