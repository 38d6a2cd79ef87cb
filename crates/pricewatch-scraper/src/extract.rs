//! Selector-driven field extraction over parsed HTML.
//!
//! A missing selector is an expected outcome here, not an error: the
//! extractor walks candidate selectors in priority order and returns the
//! first non-empty text, or an empty string.

use pricewatch_core::RetailerConfig;
use scraper::{ElementRef, Html, Selector};

/// Price selectors used when a retailer is unknown or has none configured.
pub const GENERIC_PRICE_SELECTORS: &[&str] = &[
    r#"meta[property="og:price:amount"]"#,
    r#"meta[property="product:price:amount"]"#,
    r#"meta[itemprop="price"]"#,
    r#"[itemprop="price"]"#,
    r#"[data-testid="price"]"#,
    ".product-price",
    ".price__regular .price-item",
    ".price",
];

/// Sale price selectors used when a retailer is unknown or has none configured.
pub const GENERIC_SALE_PRICE_SELECTORS: &[&str] = &[
    r#"meta[property="product:sale_price:amount"]"#,
    r#"[data-testid="sale-price"]"#,
    ".price__sale .price-item--sale",
    ".sale-price",
    ".price--sale",
];

/// Availability selectors used when a retailer is unknown or has none configured.
pub const GENERIC_AVAILABILITY_SELECTORS: &[&str] = &[
    r#"meta[property="og:availability"]"#,
    r#"meta[property="product:availability"]"#,
    r#"[itemprop="availability"]"#,
    ".availability",
    ".stock-status",
    ".product-form__submit",
];

/// Phrases that mark a product as unavailable. Anything else is in stock.
/// The compact forms cover schema.org values such as
/// `https://schema.org/OutOfStock`.
const OUT_OF_STOCK_PHRASES: [&str; 5] = [
    "out of stock",
    "sold out",
    "unavailable",
    "outofstock",
    "soldout",
];

/// Ordered selector candidates for each extracted field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorSet {
    pub price: Vec<String>,
    pub sale_price: Vec<String>,
    pub availability: Vec<String>,
}

impl SelectorSet {
    /// Generic selectors for every field.
    #[must_use]
    pub fn generic() -> Self {
        Self {
            price: owned(GENERIC_PRICE_SELECTORS),
            sale_price: owned(GENERIC_SALE_PRICE_SELECTORS),
            availability: owned(GENERIC_AVAILABILITY_SELECTORS),
        }
    }

    /// Selectors for `retailer`, falling back to generic ones per field when
    /// the configured list is empty (or the retailer is unknown).
    #[must_use]
    pub fn for_retailer(retailer: Option<&RetailerConfig>) -> Self {
        let Some(retailer) = retailer else {
            return Self::generic();
        };
        Self {
            price: or_generic(&retailer.price_selectors, GENERIC_PRICE_SELECTORS),
            sale_price: or_generic(&retailer.sale_price_selectors, GENERIC_SALE_PRICE_SELECTORS),
            availability: or_generic(
                &retailer.availability_selectors,
                GENERIC_AVAILABILITY_SELECTORS,
            ),
        }
    }
}

fn owned(selectors: &[&str]) -> Vec<String> {
    selectors.iter().map(|s| (*s).to_owned()).collect()
}

fn or_generic(configured: &[String], generic: &[&str]) -> Vec<String> {
    if configured.is_empty() {
        owned(generic)
    } else {
        configured.to_vec()
    }
}

/// Raw text found for each field. Empty strings mean "not found".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedFields {
    pub price_text: String,
    pub sale_price_text: String,
    pub availability_text: String,
}

/// Returns the trimmed text of the first candidate selector that matches a
/// node with non-empty content, or an empty string.
///
/// `meta` elements yield their `content` attribute. Other elements yield
/// their text, or their `content` attribute when the text is empty (as with
/// `<span itemprop="price" content="19.99">`). Selector strings that fail to
/// parse are skipped.
#[must_use]
pub fn extract_field<S: AsRef<str>>(document: &Html, selector_candidates: &[S]) -> String {
    for candidate in selector_candidates {
        let candidate = candidate.as_ref();
        let selector = match Selector::parse(candidate) {
            Ok(selector) => selector,
            Err(e) => {
                tracing::debug!(selector = candidate, error = ?e, "skipping unparseable selector");
                continue;
            }
        };

        let Some(element) = document.select(&selector).next() else {
            continue;
        };

        let value = element_value(element);
        if !value.is_empty() {
            return value;
        }
    }
    String::new()
}

fn element_value(element: ElementRef<'_>) -> String {
    let content = element
        .value()
        .attr("content")
        .map(str::trim)
        .unwrap_or_default();

    if element.value().name().eq_ignore_ascii_case("meta") {
        return content.to_owned();
    }

    let text = element.text().collect::<String>();
    let text = text.trim();
    if text.is_empty() {
        content.to_owned()
    } else {
        text.to_owned()
    }
}

/// Extracts price, sale price, and availability text from raw HTML.
#[must_use]
pub fn extract_fields(html: &str, selectors: &SelectorSet) -> ExtractedFields {
    let document = Html::parse_document(html);
    ExtractedFields {
        price_text: extract_field(&document, &selectors.price),
        sale_price_text: extract_field(&document, &selectors.sale_price),
        availability_text: extract_field(&document, &selectors.availability),
    }
}

/// Optimistic stock check: only an explicit negative phrase means out of stock.
#[must_use]
pub fn is_in_stock(availability_text: &str) -> bool {
    let lower = availability_text.to_lowercase();
    !OUT_OF_STOCK_PHRASES
        .iter()
        .any(|phrase| lower.contains(phrase))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(html: &str) -> Html {
        Html::parse_document(html)
    }

    #[test]
    fn returns_first_non_empty_match_trimmed() {
        let document = doc(r#"<div class="a"></div><div class="b">  $120.00  </div>"#);
        assert_eq!(extract_field(&document, &[".a", ".b"]), "$120.00");
    }

    #[test]
    fn respects_candidate_order() {
        let document = doc(r#"<span class="sale">$80</span><span class="reg">$100</span>"#);
        assert_eq!(extract_field(&document, &[".reg", ".sale"]), "$100");
    }

    #[test]
    fn only_first_matching_node_per_selector_is_considered() {
        let document = doc(r#"<p class="p"></p><p class="p">$5</p><i class="q">$7</i>"#);
        assert_eq!(extract_field(&document, &[".p", ".q"]), "$7");
    }

    #[test]
    fn meta_reads_content_attribute() {
        let document =
            doc(r#"<head><meta property="og:price:amount" content="129.99"></head>"#);
        assert_eq!(
            extract_field(&document, &[r#"meta[property="og:price:amount"]"#]),
            "129.99"
        );
    }

    #[test]
    fn empty_element_falls_back_to_content_attribute() {
        let document = doc(r#"<span itemprop="price" content="19.99"></span>"#);
        assert_eq!(extract_field(&document, &[r#"[itemprop="price"]"#]), "19.99");
    }

    #[test]
    fn no_match_returns_empty_string() {
        let document = doc("<p>nothing here</p>");
        assert_eq!(extract_field(&document, &[".price", "#cost"]), "");
    }

    #[test]
    fn empty_candidate_list_returns_empty_string() {
        let document = doc("<p class=\"price\">$1</p>");
        let none: [&str; 0] = [];
        assert_eq!(extract_field(&document, &none), "");
    }

    #[test]
    fn invalid_selector_is_skipped() {
        let document = doc(r#"<b class="price">$42</b>"#);
        assert_eq!(extract_field(&document, &["[[broken", ".price"]), "$42");
    }

    #[test]
    fn nested_text_is_concatenated() {
        let document = doc(r#"<div class="price"><sup>$</sup>49<sup>.99</sup></div>"#);
        assert_eq!(extract_field(&document, &[".price"]), "$49.99");
    }

    #[test]
    fn extract_fields_reads_all_three() {
        let html = r#"
            <span class="reg">$100.00</span>
            <span class="sale">$79.00</span>
            <div class="stock">Sold Out</div>
        "#;
        let selectors = SelectorSet {
            price: vec![".reg".into()],
            sale_price: vec![".sale".into()],
            availability: vec![".stock".into()],
        };
        let fields = extract_fields(html, &selectors);
        assert_eq!(fields.price_text, "$100.00");
        assert_eq!(fields.sale_price_text, "$79.00");
        assert_eq!(fields.availability_text, "Sold Out");
    }

    #[test]
    fn in_stock_when_text_empty() {
        assert!(is_in_stock(""));
    }

    #[test]
    fn in_stock_when_no_negative_phrase() {
        assert!(is_in_stock("In stock - ships tomorrow"));
        assert!(is_in_stock("instock"));
    }

    #[test]
    fn out_of_stock_phrases_are_case_insensitive() {
        assert!(!is_in_stock("OUT OF STOCK"));
        assert!(!is_in_stock("This item is Sold Out"));
        assert!(!is_in_stock("Currently unavailable"));
    }

    #[test]
    fn schema_org_out_of_stock_url_is_out_of_stock() {
        assert!(!is_in_stock("https://schema.org/OutOfStock"));
        assert!(!is_in_stock("https://schema.org/SoldOut"));
        assert!(is_in_stock("https://schema.org/InStock"));
    }

    #[test]
    fn selector_set_for_unknown_retailer_is_generic() {
        assert_eq!(SelectorSet::for_retailer(None), SelectorSet::generic());
    }

    #[test]
    fn selector_set_falls_back_per_field() {
        let mut retailer = RetailerConfig::new("zara.com", "Zara");
        retailer.price_selectors = vec!["span.money-amount__main".into()];
        let set = SelectorSet::for_retailer(Some(&retailer));
        assert_eq!(set.price, vec!["span.money-amount__main"]);
        assert_eq!(set.sale_price.len(), GENERIC_SALE_PRICE_SELECTORS.len());
        assert_eq!(set.availability.len(), GENERIC_AVAILABILITY_SELECTORS.len());
    }
}
