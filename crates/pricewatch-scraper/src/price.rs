//! Pure price parsing and plausibility checks.
//!
//! Both functions are side-effect free; the pipeline runs every extracted
//! price string through [`parse_price`] and every parsed value through
//! [`validate_price`] regardless of which tier produced it.

use std::sync::LazyLock;

use regex::Regex;

/// Upper bound for a plausible retail price. Larger values are usually a SKU
/// or a cents-as-dollars mistake.
pub const MAX_PRICE: f64 = 50_000.0;

/// Lower bound for a plausible retail price. Smaller values are usually a
/// mis-parsed cents component.
pub const MIN_PRICE: f64 = 1.0;

/// A scraped price may be at most this multiple of the reference retail price.
pub const MAX_MARKUP_RATIO: f64 = 2.0;

static NON_PRICE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^0-9.,]").expect("valid regex"));

/// Trailing `,dd` marks a European-style decimal comma (`"99,99"`, `"1.234,56"`).
static EUROPEAN_DECIMAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\d{2}$").expect("valid regex"));

/// Converts raw price text into a number.
///
/// Everything except digits, `.` and `,` is stripped. A trailing two-digit
/// group after a comma is read as a decimal comma (dots and other commas are
/// then thousands separators); otherwise commas are thousands separators.
///
/// Returns `None` when nothing numeric remains or the value is zero.
///
/// | Input | Output |
/// |-------|--------|
/// | `"$99.99"` | `99.99` |
/// | `"99,99 €"` | `99.99` |
/// | `"¥9,999"` | `9999.0` |
/// | `"1.234,56"` | `1234.56` |
#[must_use]
pub fn parse_price(text: &str) -> Option<f64> {
    let cleaned = NON_PRICE_CHARS.replace_all(text, "");
    if cleaned.is_empty() {
        return None;
    }

    let normalized = if EUROPEAN_DECIMAL.is_match(&cleaned) {
        let (whole, fraction) = cleaned.rsplit_once(',')?;
        let whole: String = whole.chars().filter(char::is_ascii_digit).collect();
        format!("{whole}.{fraction}")
    } else {
        cleaned.replace(',', "")
    };

    let value = normalized.parse::<f64>().ok()?;
    if value.is_nan() || value == 0.0 {
        return None;
    }
    Some(value)
}

/// Returns why `price` is implausible, or `None` if it passes every check.
///
/// `retail_price_hint` is a known reference price for the product; when it
/// is supplied, a scraped price more than [`MAX_MARKUP_RATIO`] times the
/// reference is rejected as an unrelated number picked up from the page.
#[must_use]
pub fn price_rejection_reason(price: f64, retail_price_hint: Option<f64>) -> Option<&'static str> {
    if !price.is_finite() {
        return Some("not a finite number");
    }
    if price <= 0.0 {
        return Some("not positive");
    }
    if price < MIN_PRICE {
        return Some("below minimum plausible price");
    }
    if price > MAX_PRICE {
        return Some("above maximum plausible price");
    }
    if let Some(hint) = retail_price_hint.filter(|h| h.is_finite() && *h > 0.0) {
        if price > hint * MAX_MARKUP_RATIO {
            return Some("more than double the reference retail price");
        }
    }
    None
}

/// Returns `true` when `price` is a plausible retail price.
#[must_use]
pub fn validate_price(price: f64, retail_price_hint: Option<f64>) -> bool {
    price_rejection_reason(price, retail_price_hint).is_none()
}

#[cfg(test)]
#[path = "price_test.rs"]
mod tests;
