//! Tier output before validation, and the typed fields it validates into.
//!
//! Every tier hands the pipeline a [`RawExtractionPayload`]; nothing
//! downstream sees unvalidated price text.

use serde::{Deserialize, Serialize};

use crate::error::ScrapeError;
use crate::extract::is_in_stock;
use crate::price::{parse_price, price_rejection_reason, validate_price};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum RawExtractionPayload {
    /// Selector (or JSON-LD) text from a fetched page.
    Html {
        price_text: String,
        sale_price_text: String,
        availability_text: String,
    },
    /// A variant from a structured product endpoint.
    JsonBackdoor {
        price: String,
        compare_at_price: Option<String>,
        available: bool,
    },
    /// Fields returned by the language-model extractor.
    AiFallback {
        price_text: String,
        original_price_text: Option<String>,
        in_stock: Option<bool>,
    },
}

/// A validated price with its sale context.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedFields {
    pub price: f64,
    /// Pre-sale price; always greater than `price` when present.
    pub original_price: Option<f64>,
    pub in_stock: bool,
    /// The text `price` was parsed from.
    pub raw_price_text: String,
}

impl RawExtractionPayload {
    /// Parses and validates the payload.
    ///
    /// For HTML, a parseable sale price lower than the regular price becomes
    /// the price and the regular price becomes `original_price`. The chosen
    /// price must pass [`validate_price`] against `retail_price_hint`.
    ///
    /// # Errors
    ///
    /// - [`ScrapeError::NoPriceFound`] when no price text parses.
    /// - [`ScrapeError::InvalidPrice`] when the parsed price is implausible.
    pub fn into_priced(
        self,
        url: &str,
        retail_price_hint: Option<f64>,
    ) -> Result<PricedFields, ScrapeError> {
        let no_price = || ScrapeError::NoPriceFound {
            url: url.to_owned(),
        };

        let (price, raw_price_text, original, in_stock) = match self {
            Self::Html {
                price_text,
                sale_price_text,
                availability_text,
            } => {
                let regular = parse_price(&price_text);
                let sale = parse_price(&sale_price_text);
                let in_stock = is_in_stock(&availability_text);
                match (regular, sale) {
                    (Some(r), Some(s)) if s < r && validate_price(s, retail_price_hint) => {
                        (s, sale_price_text, Some(r), in_stock)
                    }
                    (Some(r), _) => (r, price_text, None, in_stock),
                    (None, Some(s)) => (s, sale_price_text, None, in_stock),
                    (None, None) => return Err(no_price()),
                }
            }
            Self::JsonBackdoor {
                price,
                compare_at_price,
                available,
            } => {
                let parsed = parse_price(&price).ok_or_else(no_price)?;
                let original = compare_at_price.as_deref().and_then(parse_price);
                (parsed, price, original, available)
            }
            Self::AiFallback {
                price_text,
                original_price_text,
                in_stock,
            } => {
                let parsed = parse_price(&price_text).ok_or_else(no_price)?;
                let original = original_price_text.as_deref().and_then(parse_price);
                (parsed, price_text, original, in_stock.unwrap_or(true))
            }
        };

        if let Some(reason) = price_rejection_reason(price, retail_price_hint) {
            return Err(ScrapeError::InvalidPrice {
                price,
                reason,
                raw_text: raw_price_text,
            });
        }

        let original_price = original.filter(|o| *o > price && validate_price(*o, None));
        Ok(PricedFields {
            price,
            original_price,
            in_stock,
            raw_price_text,
        })
    }

    /// The primary price text carried by the payload, for attempt records.
    #[must_use]
    pub fn price_text(&self) -> &str {
        match self {
            Self::Html { price_text, .. } | Self::AiFallback { price_text, .. } => price_text,
            Self::JsonBackdoor { price, .. } => price,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://shop.example/p";

    fn html(price: &str, sale: &str, availability: &str) -> RawExtractionPayload {
        RawExtractionPayload::Html {
            price_text: price.to_owned(),
            sale_price_text: sale.to_owned(),
            availability_text: availability.to_owned(),
        }
    }

    #[test]
    fn html_regular_price_only() {
        let fields = html("$129.99", "", "").into_priced(URL, None).unwrap();
        assert!((fields.price - 129.99).abs() < 1e-9);
        assert!(fields.original_price.is_none());
        assert!(fields.in_stock);
        assert_eq!(fields.raw_price_text, "$129.99");
    }

    #[test]
    fn html_lower_sale_price_wins() {
        let fields = html("$100.00", "$79.00", "").into_priced(URL, None).unwrap();
        assert!((fields.price - 79.0).abs() < 1e-9);
        assert_eq!(fields.original_price, Some(100.0));
        assert_eq!(fields.raw_price_text, "$79.00");
    }

    #[test]
    fn html_sale_not_lower_is_ignored() {
        let fields = html("$100.00", "$120.00", "").into_priced(URL, None).unwrap();
        assert!((fields.price - 100.0).abs() < 1e-9);
        assert!(fields.original_price.is_none());
    }

    #[test]
    fn html_implausible_sale_falls_back_to_regular() {
        let fields = html("$100.00", "$0.50", "").into_priced(URL, None).unwrap();
        assert!((fields.price - 100.0).abs() < 1e-9);
    }

    #[test]
    fn html_out_of_stock() {
        let fields = html("$10.00", "", "Sold out").into_priced(URL, None).unwrap();
        assert!(!fields.in_stock);
    }

    #[test]
    fn html_without_any_price_is_no_price_found() {
        let err = html("", "", "").into_priced(URL, None).unwrap_err();
        assert!(matches!(err, ScrapeError::NoPriceFound { .. }));
    }

    #[test]
    fn html_unparseable_text_is_no_price_found() {
        let err = html("Call for price", "", "").into_priced(URL, None).unwrap_err();
        assert!(matches!(err, ScrapeError::NoPriceFound { .. }));
    }

    #[test]
    fn price_above_double_hint_is_invalid() {
        let err = html("$150.00", "", "").into_priced(URL, Some(50.0)).unwrap_err();
        assert!(
            matches!(err, ScrapeError::InvalidPrice { ref raw_text, .. } if raw_text == "$150.00"),
            "got: {err:?}"
        );
    }

    #[test]
    fn below_minimum_is_invalid() {
        let err = html("$0.50", "", "").into_priced(URL, None).unwrap_err();
        assert!(matches!(err, ScrapeError::InvalidPrice { .. }));
    }

    #[test]
    fn json_backdoor_compare_at_only_when_greater() {
        let on_sale = RawExtractionPayload::JsonBackdoor {
            price: "28.00".into(),
            compare_at_price: Some("35.00".into()),
            available: true,
        }
        .into_priced(URL, None)
        .unwrap();
        assert_eq!(on_sale.original_price, Some(35.0));

        let not_on_sale = RawExtractionPayload::JsonBackdoor {
            price: "28.00".into(),
            compare_at_price: Some("28.00".into()),
            available: false,
        }
        .into_priced(URL, None)
        .unwrap();
        assert!(not_on_sale.original_price.is_none());
        assert!(!not_on_sale.in_stock);
    }

    #[test]
    fn ai_fallback_defaults_in_stock() {
        let fields = RawExtractionPayload::AiFallback {
            price_text: "89.00".into(),
            original_price_text: None,
            in_stock: None,
        }
        .into_priced(URL, None)
        .unwrap();
        assert!(fields.in_stock);
        assert!((fields.price - 89.0).abs() < 1e-9);
    }

    #[test]
    fn serializes_with_source_tag() {
        let payload = RawExtractionPayload::JsonBackdoor {
            price: "1.00".into(),
            compare_at_price: None,
            available: true,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["source"], "json_backdoor");
    }
}
