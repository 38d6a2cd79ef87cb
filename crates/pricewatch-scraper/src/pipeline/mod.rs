//! The tier dispatcher.
//!
//! One call to [`PriceEngine::extract_price`] walks the retailer's tier plan
//! in order, one tier at a time, until a tier yields a validated price. Each
//! tier runs behind its own circuit breaker and retry policy, every attempt
//! is bounded by the tier timeout, and the whole walk is bounded by an
//! overall deadline and the caller's cancellation token. Failures never
//! escape: they become a classified, unsuccessful result.

mod plan;

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use pricewatch_core::{
    AppConfig, AttemptOutcome, ErrorCategory, ExtractionAttempt, PriceExtractionResult,
    RetailerConfig, Tier, DEFAULT_USER_AGENT,
};
use reqwest::Url;
use tokio_util::sync::CancellationToken;

use crate::breaker::{BreakerConfig, BreakerRegistry};
use crate::client::{breaker_scope, parse_product_url, HttpFetcher};
use crate::error::ScrapeError;
use crate::extract::SelectorSet;
use crate::payload::{PricedFields, RawExtractionPayload};
use crate::registry::SharedRegistry;
use crate::retry::{RetryPolicy, RetrySettings};
use crate::sink::{PriceRecord, ResultSink};
use crate::tiers::{self, AiService, FetchedHtml, RenderService};

pub use plan::{NextStep, ServiceAvailability, TierPlan};

/// Operation prefix of every breaker the engine creates.
pub const BREAKER_PREFIX: &str = "price-scrape";

/// `price-scrape:<scope>:<tier>`, where scope is the retailer domain (or
/// host for unknown retailers).
#[must_use]
pub fn breaker_key(scope: &str, tier: Tier) -> String {
    format!("{BREAKER_PREFIX}:{scope}:{tier}")
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub user_agent: String,
    /// Per-attempt timeout for JsonBackdoor and StandardFetch.
    pub request_timeout: Duration,
    pub render: Option<RenderService>,
    pub unblock: Option<RenderService>,
    pub ai: Option<AiService>,
    pub retry: RetrySettings,
    pub breaker: BreakerConfig,
    /// Overall deadline for one extraction. Derived from the tier budgets
    /// when `None`.
    pub deadline: Option<Duration>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            request_timeout: Duration::from_secs(15),
            render: None,
            unblock: None,
            ai: None,
            retry: RetrySettings::default(),
            breaker: BreakerConfig::default(),
            deadline: None,
        }
    }
}

impl EngineSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        let render_timeout = Duration::from_secs(config.render_timeout_secs);
        let render_service = |url: &String| RenderService {
            url: url.clone(),
            api_key: config.render_api_key.clone(),
            timeout: render_timeout,
        };

        Self {
            user_agent: config.user_agent.clone(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            render: config.render_url.as_ref().map(render_service),
            unblock: config.unblock_url.as_ref().map(render_service),
            ai: config.ai_url.as_ref().map(|base_url| AiService {
                base_url: base_url.clone(),
                api_key: config.ai_api_key.clone(),
                model: config.ai_model.clone(),
                timeout: Duration::from_secs(config.ai_timeout_secs),
                max_html_chars: config.ai_max_html_chars,
            }),
            retry: RetrySettings::from_app_config(config),
            breaker: BreakerConfig::from_app_config(config),
            deadline: None,
        }
    }

    #[must_use]
    pub fn services(&self) -> ServiceAvailability {
        ServiceAvailability {
            render: self.render.is_some(),
            unblock: self.unblock.is_some(),
            ai: self.ai.is_some(),
        }
    }

    /// Timeout for a single attempt of `tier`.
    #[must_use]
    pub fn tier_timeout(&self, tier: Tier) -> Duration {
        match tier {
            Tier::JsonBackdoor | Tier::StandardFetch => self.request_timeout,
            Tier::RenderedFetch => self
                .render
                .as_ref()
                .map_or(self.request_timeout, |s| s.timeout),
            Tier::UnblockedFetch => self
                .unblock
                .as_ref()
                .map_or(self.request_timeout, |s| s.timeout),
            Tier::AiFallback => self.ai.as_ref().map_or(self.request_timeout, |s| s.timeout),
        }
    }

    /// Worst case for one tier: every attempt times out, plus backoff with
    /// maximum jitter between attempts.
    #[must_use]
    pub fn tier_budget(&self, tier: Tier) -> Duration {
        let attempts = self.retry.max_attempts.max(1);
        let policy = RetryPolicy::for_tier(tier, &self.retry);
        let backoff: Duration = (1..attempts).map(|retry| policy.base_backoff(retry)).sum();
        self.tier_timeout(tier) * attempts + backoff + backoff.mul_f64(self.retry.jitter_ratio)
    }

    /// Overall deadline for a plan.
    #[must_use]
    pub fn pipeline_deadline(&self, plan: &TierPlan) -> Duration {
        self.deadline.unwrap_or_else(|| {
            plan.all_tiers()
                .into_iter()
                .map(|tier| self.tier_budget(tier))
                .sum()
        })
    }
}

/// Per-call options for [`PriceEngine::extract_price_with`].
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Known reference price; prices above twice this are rejected.
    pub retail_price_hint: Option<f64>,
    /// Cancelling aborts the in-flight tier and ends the extraction.
    pub cancel: Option<CancellationToken>,
}

struct ExtractionContext<'a> {
    url: &'a str,
    parsed: Url,
    scope: String,
    selectors: SelectorSet,
    retail_price_hint: Option<f64>,
    fetched: FetchedHtml,
}

enum TierOutcome {
    Found(PricedFields),
    Failed {
        error: String,
        category: ErrorCategory,
    },
    Rejected,
}

enum PlanOutcome {
    Found { tier: Tier, fields: PricedFields },
    Failed {
        error: String,
        category: Option<ErrorCategory>,
    },
}

impl PlanOutcome {
    fn from_error(err: &ScrapeError) -> Self {
        Self::Failed {
            error: err.to_string(),
            category: Some(err.category()),
        }
    }
}

/// Resilient price extraction over every configured tier.
///
/// Cheap to share behind an `Arc`; the retailer and breaker registries are
/// the only state shared between concurrent extractions.
pub struct PriceEngine {
    registry: Arc<SharedRegistry>,
    breakers: Arc<BreakerRegistry>,
    fetcher: HttpFetcher,
    settings: EngineSettings,
    sink: Option<Arc<dyn ResultSink>>,
}

impl PriceEngine {
    /// # Errors
    ///
    /// Returns [`ScrapeError::Http`] if the HTTP client cannot be built.
    pub fn new(registry: Arc<SharedRegistry>, settings: EngineSettings) -> Result<Self, ScrapeError> {
        let fetcher = HttpFetcher::new(&settings.user_agent, settings.request_timeout)?;
        let breakers = Arc::new(BreakerRegistry::new(settings.breaker));
        Ok(Self {
            registry,
            breakers,
            fetcher,
            settings,
            sink: None,
        })
    }

    /// Shares an existing breaker registry, e.g. one with per-prefix overrides.
    #[must_use]
    pub fn with_breakers(mut self, breakers: Arc<BreakerRegistry>) -> Self {
        self.breakers = breakers;
        self
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    #[must_use]
    pub fn breakers(&self) -> &BreakerRegistry {
        &self.breakers
    }

    #[must_use]
    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub async fn extract_price(&self, url: &str) -> PriceExtractionResult {
        self.extract_price_with(url, ExtractOptions::default()).await
    }

    pub async fn extract_price_with(
        &self,
        url: &str,
        options: ExtractOptions,
    ) -> PriceExtractionResult {
        let url = url.trim();
        let parsed = match parse_product_url(url) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::info!(url, error = %err, "rejected product url");
                return PriceExtractionResult::failed(url, err.to_string(), Some(err.category()), None);
            }
        };

        let registry = self.registry.current();
        let retailer = registry.lookup(url);
        let plan = TierPlan::build(retailer, self.settings.services());
        let deadline = self.settings.pipeline_deadline(&plan);
        let ctx = ExtractionContext {
            url,
            scope: breaker_scope(retailer, &parsed),
            parsed,
            selectors: SelectorSet::for_retailer(retailer),
            retail_price_hint: options.retail_price_hint,
            fetched: FetchedHtml::default(),
        };

        tracing::debug!(
            url,
            retailer = retailer.map(|r| r.name.as_str()),
            tiers = ?plan.all_tiers(),
            deadline_ms = millis(deadline),
            "starting price extraction"
        );

        let mut attempts = Vec::new();
        let outcome = {
            let run = self.run_plan(&ctx, &plan, &mut attempts);
            tokio::select! {
                biased;
                () = wait_cancelled(options.cancel.as_ref()) => {
                    tracing::info!(url, "price extraction cancelled");
                    PlanOutcome::from_error(&ScrapeError::Cancelled)
                }
                finished = tokio::time::timeout(deadline, run) => finished.unwrap_or_else(|_| {
                    tracing::warn!(url, deadline_ms = millis(deadline), "price extraction deadline exceeded");
                    PlanOutcome::from_error(&ScrapeError::Timeout {
                        operation: "price extraction".to_owned(),
                        after_ms: millis(deadline),
                    })
                }),
            }
        };

        let result = finish(url, retailer, outcome).with_attempts(attempts);
        if result.success {
            self.store(&result).await;
        }
        result
    }

    async fn run_plan(
        &self,
        ctx: &ExtractionContext<'_>,
        plan: &TierPlan,
        attempts: &mut Vec<ExtractionAttempt>,
    ) -> PlanOutcome {
        let tiers = plan.tiers();
        let mut last_failure: Option<(String, ErrorCategory)> = None;
        let mut position = 0;

        while let Some(&tier) = tiers.get(position) {
            match self.run_tier(tier, ctx, attempts).await {
                TierOutcome::Found(fields) => return PlanOutcome::Found { tier, fields },
                TierOutcome::Rejected => position += 1,
                TierOutcome::Failed { error, category } => {
                    last_failure = Some((error, category));
                    match plan.after_failure(position, category) {
                        NextStep::Continue => position += 1,
                        NextStep::JumpTo(index) => {
                            tracing::info!(url = ctx.url, from = %tier, to = %tiers[index], "bot detection; escalating");
                            position = index;
                        }
                        NextStep::Stop => {
                            tracing::info!(url = ctx.url, %tier, "bot detection; retailer not eligible for bypass");
                            break;
                        }
                    }
                }
            }
        }

        if plan.ai_enabled() && ctx.fetched.has_page() {
            match self.run_tier(Tier::AiFallback, ctx, attempts).await {
                TierOutcome::Found(fields) => {
                    return PlanOutcome::Found {
                        tier: Tier::AiFallback,
                        fields,
                    }
                }
                TierOutcome::Failed { error, category } => last_failure = Some((error, category)),
                TierOutcome::Rejected => {}
            }
        }

        match last_failure {
            Some((error, category)) => PlanOutcome::Failed {
                error,
                category: Some(category),
            },
            None => PlanOutcome::Failed {
                error: "every eligible tier was rejected by an open circuit breaker".to_owned(),
                category: None,
            },
        }
    }

    async fn run_tier(
        &self,
        tier: Tier,
        ctx: &ExtractionContext<'_>,
        attempts: &mut Vec<ExtractionAttempt>,
    ) -> TierOutcome {
        let breaker = self.breakers.get(&breaker_key(&ctx.scope, tier));
        let started_at = Utc::now();
        let clock = Instant::now();

        let permit = match breaker.try_acquire() {
            Ok(permit) => permit,
            Err(open) => {
                tracing::info!(url = ctx.url, %tier, breaker = %open.name, "tier skipped; circuit open");
                attempts.push(ExtractionAttempt {
                    tier,
                    started_at,
                    duration_ms: 0,
                    outcome: AttemptOutcome::Rejected,
                    raw_price_text: None,
                    parsed_price: None,
                    error: Some(open.to_string()),
                });
                return TierOutcome::Rejected;
            }
        };

        let policy = RetryPolicy::for_tier(tier, &self.settings.retry);
        let timeout = self.settings.tier_timeout(tier);
        tracing::debug!(url = ctx.url, %tier, timeout_ms = millis(timeout), "running tier");

        let result = policy.retry(|| self.attempt_tier(tier, ctx, timeout)).await;
        let duration_ms = millis(clock.elapsed());

        match result {
            Ok(fields) => {
                permit.record_success();
                attempts.push(ExtractionAttempt {
                    tier,
                    started_at,
                    duration_ms,
                    outcome: AttemptOutcome::Success,
                    raw_price_text: Some(fields.raw_price_text.clone()),
                    parsed_price: Some(fields.price),
                    error: None,
                });
                TierOutcome::Found(fields)
            }
            Err(err) => {
                permit.record_failure();
                let category = err.category();
                if category == ErrorCategory::Unknown {
                    tracing::warn!(url = ctx.url, %tier, error = %err, "unclassified tier failure");
                } else {
                    tracing::info!(url = ctx.url, %tier, %category, error = %err, "tier failed");
                }
                let (raw_price_text, parsed_price) = match &err {
                    ScrapeError::InvalidPrice {
                        price, raw_text, ..
                    } => (Some(raw_text.clone()), Some(*price)),
                    _ => (None, None),
                };
                attempts.push(ExtractionAttempt {
                    tier,
                    started_at,
                    duration_ms,
                    outcome: AttemptOutcome::Failure(category),
                    raw_price_text,
                    parsed_price,
                    error: Some(err.to_string()),
                });
                TierOutcome::Failed {
                    error: err.to_string(),
                    category,
                }
            }
        }
    }

    async fn attempt_tier(
        &self,
        tier: Tier,
        ctx: &ExtractionContext<'_>,
        timeout: Duration,
    ) -> Result<PricedFields, ScrapeError> {
        let payload = tokio::time::timeout(timeout, self.fetch_payload(tier, ctx))
            .await
            .map_err(|_| ScrapeError::Timeout {
                operation: tier.as_str().to_owned(),
                after_ms: millis(timeout),
            })??;
        payload.into_priced(ctx.url, ctx.retail_price_hint)
    }

    async fn fetch_payload(
        &self,
        tier: Tier,
        ctx: &ExtractionContext<'_>,
    ) -> Result<RawExtractionPayload, ScrapeError> {
        match tier {
            Tier::JsonBackdoor => tiers::json_backdoor::fetch(&self.fetcher, &ctx.parsed).await,
            Tier::StandardFetch => {
                let html = self.fetcher.get_html(ctx.url).await?;
                tiers::html::payload_from_html(ctx.url, html, &ctx.selectors, &ctx.fetched)
            }
            Tier::RenderedFetch | Tier::UnblockedFetch => {
                let service = if tier == Tier::RenderedFetch {
                    self.settings.render.as_ref()
                } else {
                    self.settings.unblock.as_ref()
                }
                .ok_or(ScrapeError::NotConfigured { tier })?;
                let html = tiers::render::fetch_rendered(&self.fetcher, service, ctx.url).await?;
                tiers::html::payload_from_html(ctx.url, html, &ctx.selectors, &ctx.fetched)
            }
            Tier::AiFallback => {
                let service = self
                    .settings
                    .ai
                    .as_ref()
                    .ok_or(ScrapeError::NotConfigured { tier })?;
                let html = ctx.fetched.get().ok_or_else(|| ScrapeError::NoPriceFound {
                    url: ctx.url.to_owned(),
                })?;
                tiers::ai::extract_with_model(&self.fetcher, service, ctx.url, &html).await
            }
        }
    }

    async fn store(&self, result: &PriceExtractionResult) {
        let Some(sink) = &self.sink else {
            return;
        };
        let record = PriceRecord::new(result.clone());
        if let Err(err) = sink.store(&record).await {
            tracing::warn!(url = %result.url, record_id = %record.id, error = %err, "failed to store price record");
        }
    }
}

fn finish(
    url: &str,
    retailer: Option<&RetailerConfig>,
    outcome: PlanOutcome,
) -> PriceExtractionResult {
    let store_name = retailer.map(|r| r.name.clone());
    match outcome {
        PlanOutcome::Found { tier, fields } => {
            tracing::info!(url, %tier, price = fields.price, in_stock = fields.in_stock, "price extracted");
            PriceExtractionResult::succeeded(
                url,
                fields.price,
                fields.original_price,
                fields.in_stock,
                store_name,
                tier,
            )
        }
        PlanOutcome::Failed { error, category } => {
            tracing::info!(url, category = ?category, error = %error, "price extraction failed");
            PriceExtractionResult::failed(url, error, category, store_name)
        }
    }
}

async fn wait_cancelled(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
