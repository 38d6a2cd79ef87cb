use pricewatch_core::{ErrorCategory, Tier};
use thiserror::Error;

use crate::classify::classify;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("fetch failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("fetch failed with HTTP status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("bot challenge page served for {url}")]
    BotChallenge { url: String },

    #[error("{operation} timed out after {after_ms}ms")]
    Timeout { operation: String, after_ms: u64 },

    #[error("extraction cancelled by caller")]
    Cancelled,

    #[error("invalid URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("no price found at {url}")]
    NoPriceFound { url: String },

    #[error("price {price} failed validation: {reason}")]
    InvalidPrice {
        price: f64,
        reason: &'static str,
        /// Price text the rejected value was parsed from.
        raw_text: String,
    },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("AI extraction response unusable: {0}")]
    AiResponse(String),

    #[error("{tier} has no service endpoint configured")]
    NotConfigured { tier: Tier },
}

impl ScrapeError {
    /// HTTP status attached to the failure, if the server answered at all.
    #[must_use]
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Maps this error onto the closed [`ErrorCategory`] taxonomy.
    ///
    /// Variants whose category is fixed by construction are mapped directly.
    /// Transport and status failures go through [`classify`] with the
    /// request URL left out, so words in a product path never change the
    /// category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Cancelled | Self::Timeout { .. } => ErrorCategory::Timeout,
            Self::Http(e) if e.is_timeout() => ErrorCategory::Timeout,
            Self::BotChallenge { .. } => ErrorCategory::BotDetection,
            Self::NotConfigured { .. } => ErrorCategory::Unknown,
            Self::NoPriceFound { .. }
            | Self::InvalidUrl { .. }
            | Self::Deserialize { .. }
            | Self::AiResponse(_) => ErrorCategory::ParseError,
            Self::InvalidPrice { .. } => ErrorCategory::InvalidPrice,
            Self::Status { status, .. } => {
                classify(&format!("HTTP status {status}"), Some(*status))
            }
            Self::Http(e) => {
                let mut message = e.to_string();
                if let Some(url) = e.url() {
                    message = message.replace(url.as_str(), "");
                }
                classify(&message, self.http_status())
            }
        }
    }
}
