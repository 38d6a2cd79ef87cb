//! Product URL validation and breaker scoping.

use pricewatch_core::RetailerConfig;
use reqwest::Url;

use crate::error::ScrapeError;

/// Parses `url` as an absolute `http`/`https` URL with a host.
///
/// # Errors
///
/// Returns [`ScrapeError::InvalidUrl`] for relative URLs, other schemes, or
/// URLs without a host.
pub fn parse_product_url(url: &str) -> Result<Url, ScrapeError> {
    let invalid = |reason: &str| ScrapeError::InvalidUrl {
        url: url.to_owned(),
        reason: reason.to_owned(),
    };

    let parsed = Url::parse(url.trim()).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host"));
    }
    Ok(parsed)
}

/// The part of a breaker key that identifies the site: the retailer's
/// configured domain, or the bare host for unknown retailers.
#[must_use]
pub fn breaker_scope(retailer: Option<&RetailerConfig>, url: &Url) -> String {
    if let Some(retailer) = retailer {
        return retailer.domain_key();
    }
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    host.strip_prefix("www.").map_or_else(|| host.clone(), str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_absolute_https() {
        let url = parse_product_url("https://www.everlane.com/products/tee?variant=1").unwrap();
        assert_eq!(url.host_str(), Some("www.everlane.com"));
    }

    #[test]
    fn rejects_relative_url() {
        let err = parse_product_url("/products/tee").unwrap_err();
        assert!(matches!(err, ScrapeError::InvalidUrl { .. }));
    }

    #[test]
    fn rejects_non_http_scheme() {
        let err = parse_product_url("ftp://shop.example/p").unwrap_err();
        assert!(err.to_string().contains("scheme"), "got: {err}");
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_product_url("not a url").is_err());
        assert!(parse_product_url("").is_err());
    }

    #[test]
    fn scope_prefers_retailer_domain() {
        let url = parse_product_url("https://www.zara.com/us/en/p.html").unwrap();
        let retailer = RetailerConfig::new("Zara.com", "Zara");
        assert_eq!(breaker_scope(Some(&retailer), &url), "zara.com");
    }

    #[test]
    fn scope_falls_back_to_host_without_www() {
        let url = parse_product_url("https://WWW.Unknown-Shop.example/p").unwrap();
        assert_eq!(breaker_scope(None, &url), "unknown-shop.example");
    }
}
