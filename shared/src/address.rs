//! Shipping address

use serde::{Deserialize, Serialize};

/// Postal address an order ships to.
///
/// Field names follow the platform's order payload so the struct
/// serializes straight into the `shipping_address` object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub recipient_name: String,
    pub address_line_1: String,
    #[serde(default)]
    pub address_line_2: String,
    pub city: String,
    #[serde(default)]
    pub county_state: String,
    pub postcode: String,
    /// ISO 3166-1 alpha-3 code, e.g. `GBR` or `USA`
    pub country_code: String,
}

impl Address {
    /// Single-line rendering for receipts and logs, skipping empty parts
    pub fn display_text(&self) -> String {
        [
            self.recipient_name.as_str(),
            self.address_line_1.as_str(),
            self.address_line_2.as_str(),
            self.city.as_str(),
            self.county_state.as_str(),
            self.postcode.as_str(),
            self.country_code.as_str(),
        ]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(", ")
    }
}
