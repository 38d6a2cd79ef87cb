//! Maps low-level failures onto the closed [`ErrorCategory`] taxonomy.
//!
//! The category drives two decisions: whether the retry policy may try the
//! same tier again, and whether the dispatcher escalates to the anti-bot
//! tier. It is also the label operators see in monitoring.

use pricewatch_core::ErrorCategory;

/// Wording that indicates a scraped price failed validation.
const VALIDATION_MARKERS: [&str; 3] = ["failed validation", "validation failed", "invalid price"];

/// Wording that indicates a transport-level fetch failure.
const TRANSPORT_MARKERS: [&str; 7] = [
    "fetch failed",
    "failed to fetch",
    "error sending request",
    "connection",
    "dns",
    "network",
    "tls",
];

/// Classifies a failure from its message and optional HTTP status.
///
/// Decision order:
/// 1. status 403 or 429 → [`ErrorCategory::BotDetection`]
/// 2. status ≥ 500 → [`ErrorCategory::NetworkError`]
/// 3. "timeout" / "timed out" → [`ErrorCategory::Timeout`]
/// 4. "no price found" → [`ErrorCategory::ParseError`]
/// 5. validation wording → [`ErrorCategory::InvalidPrice`]
/// 6. transport/fetch wording → [`ErrorCategory::NetworkError`]
/// 7. otherwise [`ErrorCategory::Unknown`]
#[must_use]
pub fn classify(message: &str, http_status: Option<u16>) -> ErrorCategory {
    match http_status {
        Some(403 | 429) => return ErrorCategory::BotDetection,
        Some(status) if status >= 500 => return ErrorCategory::NetworkError,
        _ => {}
    }

    let lower = message.to_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        ErrorCategory::Timeout
    } else if lower.contains("no price found") {
        ErrorCategory::ParseError
    } else if VALIDATION_MARKERS.iter().any(|m| lower.contains(m)) {
        ErrorCategory::InvalidPrice
    } else if TRANSPORT_MARKERS.iter().any(|m| lower.contains(m)) {
        ErrorCategory::NetworkError
    } else {
        ErrorCategory::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScrapeError;
    use crate::retry::{RetryPolicy, RetrySettings};
    use pricewatch_core::Tier;

    #[test]
    fn forbidden_and_too_many_requests_are_bot_detection() {
        assert_eq!(classify("anything", Some(403)), ErrorCategory::BotDetection);
        assert_eq!(classify("anything", Some(429)), ErrorCategory::BotDetection);
    }

    #[test]
    fn server_errors_are_network_errors() {
        assert_eq!(classify("bad gateway", Some(502)), ErrorCategory::NetworkError);
        assert_eq!(classify("", Some(500)), ErrorCategory::NetworkError);
    }

    #[test]
    fn status_takes_precedence_over_message() {
        assert_eq!(
            classify("request timed out", Some(429)),
            ErrorCategory::BotDetection
        );
    }

    #[test]
    fn timeout_wording_is_timeout() {
        assert_eq!(classify("Request Timeout", None), ErrorCategory::Timeout);
        assert_eq!(
            classify("operation timed out", Some(404)),
            ErrorCategory::Timeout
        );
    }

    #[test]
    fn no_price_found_is_parse_error() {
        assert_eq!(
            classify("No price found at https://x.example", None),
            ErrorCategory::ParseError
        );
    }

    #[test]
    fn validation_wording_is_invalid_price() {
        assert_eq!(
            classify("price 0.5 failed validation: below minimum", None),
            ErrorCategory::InvalidPrice
        );
    }

    #[test]
    fn transport_wording_is_network_error() {
        assert_eq!(
            classify("fetch failed: connection reset", None),
            ErrorCategory::NetworkError
        );
        assert_eq!(classify("DNS lookup failed", None), ErrorCategory::NetworkError);
    }

    #[test]
    fn unrecognised_message_is_unknown() {
        assert_eq!(classify("something odd", None), ErrorCategory::Unknown);
        assert_eq!(classify("", Some(404)), ErrorCategory::Unknown);
    }

    #[test]
    fn scrape_error_status_403_is_bot_detection() {
        let err = ScrapeError::Status {
            status: 403,
            url: "https://shop.example/p".to_owned(),
        };
        assert_eq!(err.category(), ErrorCategory::BotDetection);
    }

    #[test]
    fn scrape_error_client_status_is_not_retried() {
        let settings = RetrySettings::default();
        for status in [404, 410] {
            let err = ScrapeError::Status {
                status,
                url: "https://shop.example/p".to_owned(),
            };
            assert_eq!(err.category(), ErrorCategory::Unknown);
            for tier in Tier::ALL {
                assert!(!RetryPolicy::for_tier(tier, &settings).is_retryable(err.category()));
            }
        }
    }

    #[test]
    fn url_words_never_change_the_category() {
        let no_price = ScrapeError::NoPriceFound {
            url: "https://shop.example/products/timeout-runner".to_owned(),
        };
        assert_eq!(no_price.category(), ErrorCategory::ParseError);

        let gone = ScrapeError::Status {
            status: 404,
            url: "https://shop.example/products/timed-out-tee".to_owned(),
        };
        assert_eq!(gone.category(), ErrorCategory::Unknown);

        let unavailable = ScrapeError::Status {
            status: 503,
            url: "https://shop.example/products/timeout-runner".to_owned(),
        };
        assert_eq!(unavailable.category(), ErrorCategory::NetworkError);
    }

    #[test]
    fn scrape_error_cancelled_is_timeout() {
        assert_eq!(ScrapeError::Cancelled.category(), ErrorCategory::Timeout);
    }

    #[test]
    fn scrape_error_fixed_mappings() {
        let invalid_url = ScrapeError::InvalidUrl {
            url: "nope".to_owned(),
            reason: "relative URL without a base".to_owned(),
        };
        assert_eq!(invalid_url.category(), ErrorCategory::ParseError);

        let challenge = ScrapeError::BotChallenge {
            url: "https://shop.example".to_owned(),
        };
        assert_eq!(challenge.category(), ErrorCategory::BotDetection);

        let json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let deserialize = ScrapeError::Deserialize {
            context: "product json".to_owned(),
            source: json,
        };
        assert_eq!(deserialize.category(), ErrorCategory::ParseError);
    }

    #[test]
    fn scrape_error_extraction_failures_have_fixed_categories() {
        let no_price = ScrapeError::NoPriceFound {
            url: "https://shop.example".to_owned(),
        };
        assert_eq!(no_price.category(), ErrorCategory::ParseError);

        let invalid = ScrapeError::InvalidPrice {
            price: 0.5,
            reason: "below minimum",
            raw_text: "$0.50".to_owned(),
        };
        assert_eq!(invalid.category(), ErrorCategory::InvalidPrice);

        let timeout = ScrapeError::Timeout {
            operation: "standard-fetch".to_owned(),
            after_ms: 15_000,
        };
        assert_eq!(timeout.category(), ErrorCategory::Timeout);
    }
}
