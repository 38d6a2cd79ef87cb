//! Result types produced by the price-extraction pipeline.
//!
//! These are the shapes handed to callers and persistence sinks. Per-tier
//! [`ExtractionAttempt`] records travel with the result for logging and
//! monitoring but are never serialized.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One extraction strategy in the fallback chain, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Structured product endpoint (e.g. Shopify `/products/<handle>.json`).
    JsonBackdoor,
    /// Plain HTTP GET with browser-like headers.
    StandardFetch,
    /// Headless render of a JavaScript-dependent page.
    RenderedFetch,
    /// Headless render through a residential-proxy-backed endpoint.
    UnblockedFetch,
    /// Language-model extraction over previously fetched HTML.
    AiFallback,
}

impl Tier {
    /// Every tier, highest priority first.
    pub const ALL: [Tier; 5] = [
        Tier::JsonBackdoor,
        Tier::StandardFetch,
        Tier::RenderedFetch,
        Tier::UnblockedFetch,
        Tier::AiFallback,
    ];

    /// Kebab-case name used in breaker keys and log fields.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::JsonBackdoor => "json-backdoor",
            Tier::StandardFetch => "standard-fetch",
            Tier::RenderedFetch => "rendered-fetch",
            Tier::UnblockedFetch => "unblocked-fetch",
            Tier::AiFallback => "ai-fallback",
        }
    }

    /// `true` for tiers that go through the proxy-backed bypass service.
    #[must_use]
    pub fn is_bypass(self) -> bool {
        matches!(self, Tier::UnblockedFetch)
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed failure taxonomy used for monitoring and tier-fallback decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    NetworkError,
    ParseError,
    BotDetection,
    Timeout,
    InvalidPrice,
    /// Catch-all for failures the classifier does not recognise yet.
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorCategory::NetworkError => "network_error",
            ErrorCategory::ParseError => "parse_error",
            ErrorCategory::BotDetection => "bot_detection",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::InvalidPrice => "invalid_price",
            ErrorCategory::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// How a single tier invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Failure(ErrorCategory),
    /// The tier's circuit breaker was open; the tier was not tried.
    Rejected,
}

/// Execution record for one tier invocation within a single extraction call.
#[derive(Debug, Clone)]
pub struct ExtractionAttempt {
    pub tier: Tier,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub outcome: AttemptOutcome,
    /// Price text exactly as found on the page or in the payload.
    pub raw_price_text: Option<String>,
    pub parsed_price: Option<f64>,
    pub error: Option<String>,
}

/// Final output of one extraction call.
///
/// Construct through [`PriceExtractionResult::succeeded`] or
/// [`PriceExtractionResult::failed`]; `success` is `true` exactly when
/// `price` is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceExtractionResult {
    pub url: String,
    pub price: Option<f64>,
    /// Pre-sale price when the page shows a discount.
    pub original_price: Option<f64>,
    pub in_stock: bool,
    pub store_name: Option<String>,
    pub source_tier: Option<Tier>,
    pub success: bool,
    pub error: Option<String>,
    pub error_category: Option<ErrorCategory>,
    #[serde(skip)]
    pub attempts: Vec<ExtractionAttempt>,
}

impl PriceExtractionResult {
    /// A validated price found by `tier`.
    #[must_use]
    pub fn succeeded(
        url: &str,
        price: f64,
        original_price: Option<f64>,
        in_stock: bool,
        store_name: Option<String>,
        tier: Tier,
    ) -> Self {
        Self {
            url: url.to_owned(),
            price: Some(price),
            original_price,
            in_stock,
            store_name,
            source_tier: Some(tier),
            success: true,
            error: None,
            error_category: None,
            attempts: Vec::new(),
        }
    }

    /// A failed extraction. `category` is `None` only when no tier could be
    /// attempted at all (e.g. every eligible tier's breaker was open).
    #[must_use]
    pub fn failed(
        url: &str,
        error: impl Into<String>,
        category: Option<ErrorCategory>,
        store_name: Option<String>,
    ) -> Self {
        Self {
            url: url.to_owned(),
            price: None,
            original_price: None,
            in_stock: true,
            store_name,
            source_tier: None,
            success: false,
            error: Some(error.into()),
            error_category: category,
            attempts: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_attempts(mut self, attempts: Vec<ExtractionAttempt>) -> Self {
        self.attempts = attempts;
        self
    }

    /// Returns `true` if the page shows a sale (original price above current).
    #[must_use]
    pub fn is_on_sale(&self) -> bool {
        matches!((self.price, self.original_price), (Some(p), Some(o)) if o > p)
    }
}
