//! schema.org JSON-LD offer extraction, used when no price selector matches.

use std::sync::LazyLock;

use scraper::{Html, Selector};
use serde_json::Value;

static JSONLD_SCRIPT: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"script[type="application/ld+json"]"#).expect("valid selector")
});

/// Price data read from a schema.org `Offer`.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonLdOffer {
    /// Price as text, ready for [`crate::price::parse_price`].
    pub price_text: String,
    /// `availability` value, e.g. `"https://schema.org/OutOfStock"`.
    pub availability: Option<String>,
}

/// Finds the first `Product` offer with a price in the page's JSON-LD blocks.
///
/// Accepts top-level objects, arrays, and `@graph` containers. Blocks that
/// fail to parse are skipped.
#[must_use]
pub fn extract_jsonld_offer(html: &str) -> Option<JsonLdOffer> {
    let document = Html::parse_document(html);

    for script in document.select(&JSONLD_SCRIPT) {
        let json_text = script.text().collect::<String>();
        let Ok(value) = serde_json::from_str::<Value>(json_text.trim()) else {
            continue;
        };

        let mut candidates: Vec<&Value> = match &value {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };

        let graph_items: Vec<&Value> = candidates
            .iter()
            .filter_map(|item| item.get("@graph").and_then(Value::as_array))
            .flatten()
            .collect();
        candidates.extend(graph_items);

        if let Some(offer) = candidates.into_iter().find_map(product_offer) {
            return Some(offer);
        }
    }

    None
}

fn is_product(item: &Value) -> bool {
    let Some(type_node) = item.get("@type") else {
        return false;
    };
    let matches =
        |s: &str| s.eq_ignore_ascii_case("Product") || s.eq_ignore_ascii_case("ProductGroup");
    match type_node {
        Value::String(s) => matches(s),
        Value::Array(types) => types.iter().filter_map(Value::as_str).any(matches),
        _ => false,
    }
}

fn product_offer(item: &Value) -> Option<JsonLdOffer> {
    if !is_product(item) {
        return None;
    }

    // `offers` may be a single Offer, an AggregateOffer, or an array of Offers.
    let offers = item.get("offers")?;
    let offer_list: Vec<&Value> = match offers {
        Value::Array(list) => list.iter().collect(),
        single => vec![single],
    };

    offer_list.into_iter().find_map(|offer| {
        let price = offer.get("price").or_else(|| offer.get("lowPrice"))?;
        let price_text = match price {
            Value::String(s) => s.trim().to_owned(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        if price_text.is_empty() {
            return None;
        }
        let availability = offer
            .get("availability")
            .and_then(Value::as_str)
            .map(str::to_owned);
        Some(JsonLdOffer {
            price_text,
            availability,
        })
    })
}
