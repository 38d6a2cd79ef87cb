//! Shopify storefront response types for `/products/<handle>.json`.
//!
//! ### `price` / `compare_at_price`
//! Decimal strings (`"30.00"`). `compare_at_price` is explicitly `null` when
//! the variant is not discounted, and some stores send `"0.00"` or a value
//! equal to `price` instead; only a value above `price` means a sale.
//!
//! ### `available`
//! Present on most stores; absent on some older themes. Defaults to `true`.
//!
//! ### `position`
//! `1` for the storefront-default variant.

use serde::Deserialize;

/// Envelope returned by `GET /products/<handle>.json`.
#[derive(Debug, Deserialize)]
pub struct ShopifyProductResponse {
    pub product: ShopifyProduct,
}

#[derive(Debug, Deserialize)]
pub struct ShopifyProduct {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub variants: Vec<ShopifyVariant>,
}

#[derive(Debug, Deserialize)]
pub struct ShopifyVariant {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    pub price: String,
    #[serde(default)]
    pub compare_at_price: Option<String>,
    #[serde(default = "default_available")]
    pub available: bool,
    #[serde(default)]
    pub position: Option<i32>,
}

fn default_available() -> bool {
    true
}

impl ShopifyProduct {
    /// Picks the variant a shopper would see: the one named by `variant_id`
    /// when it exists, else the storefront default (position 1), else the
    /// first listed.
    #[must_use]
    pub fn select_variant(&self, variant_id: Option<i64>) -> Option<&ShopifyVariant> {
        variant_id
            .and_then(|id| self.variants.iter().find(|v| v.id == id))
            .or_else(|| self.variants.iter().find(|v| v.position == Some(1)))
            .or_else(|| self.variants.first())
    }
}
