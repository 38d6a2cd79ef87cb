pub mod breaker;
pub mod classify;
pub mod client;
pub mod error;
pub mod extract;
pub mod jsonld;
pub mod payload;
pub mod pipeline;
pub mod price;
pub mod registry;
pub mod retry;
pub mod sink;
pub mod tiers;
pub mod types;

pub use breaker::{
    BreakerConfig, BreakerError, BreakerOpen, BreakerPermit, BreakerRegistry, BreakerSnapshot,
    CircuitBreaker, CircuitState,
};
pub use classify::classify;
pub use client::HttpFetcher;
pub use error::ScrapeError;
pub use extract::{extract_field, extract_fields, is_in_stock, ExtractedFields, SelectorSet};
pub use payload::{PricedFields, RawExtractionPayload};
pub use pipeline::{breaker_key, EngineSettings, ExtractOptions, PriceEngine, TierPlan};
pub use price::{parse_price, validate_price};
pub use registry::{RetailerRegistry, SharedRegistry};
pub use retry::{RetryPolicy, RetrySettings};
pub use sink::{JsonLinesSink, PriceRecord, ResultSink, SinkError};
pub use tiers::{AiService, RenderService};
