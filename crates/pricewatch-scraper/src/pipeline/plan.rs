//! Which tiers run for a retailer, and where to go after a failure.

use pricewatch_core::{ErrorCategory, RetailerConfig, Tier};

/// Which optional services are configured for this engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceAvailability {
    pub render: bool,
    pub unblock: bool,
    pub ai: bool,
}

/// Ordered fetch tiers for one extraction, plus whether the language-model
/// tier may run afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierPlan {
    tiers: Vec<Tier>,
    ai_enabled: bool,
}

/// What the dispatcher does after a tier fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    /// Run the next tier in the plan.
    Continue,
    /// Skip ahead to the tier at this plan index.
    JumpTo(usize),
    /// Run no further fetch tiers.
    Stop,
}

impl TierPlan {
    /// Builds the plan for `retailer` (generic selectors and StandardFetch
    /// only when unknown). Tiers whose service is missing are left out with
    /// a warning.
    #[must_use]
    pub fn build(retailer: Option<&RetailerConfig>, services: ServiceAvailability) -> Self {
        let mut tiers = Vec::with_capacity(4);

        if retailer.is_some_and(|r| r.is_json_backdoor_eligible) {
            tiers.push(Tier::JsonBackdoor);
        }
        tiers.push(Tier::StandardFetch);

        if let Some(r) = retailer {
            if r.requires_js_rendering {
                if services.render {
                    tiers.push(Tier::RenderedFetch);
                } else {
                    tracing::warn!(retailer = %r.name, "retailer needs rendering but no render service is configured");
                }
            }
            if r.requires_anti_bot_bypass {
                if services.unblock {
                    tiers.push(Tier::UnblockedFetch);
                } else {
                    tracing::warn!(retailer = %r.name, "retailer needs anti-bot bypass but no unblock service is configured");
                }
            }
        }

        Self {
            tiers,
            ai_enabled: services.ai,
        }
    }

    #[must_use]
    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    /// `true` when the language-model tier may run once fetch tiers are done.
    #[must_use]
    pub fn ai_enabled(&self) -> bool {
        self.ai_enabled
    }

    /// Every tier that could run, in order, including the language-model tier.
    #[must_use]
    pub fn all_tiers(&self) -> Vec<Tier> {
        let mut all = self.tiers.clone();
        if self.ai_enabled {
            all.push(Tier::AiFallback);
        }
        all
    }

    /// Decides what follows a failure of the tier at `position`.
    ///
    /// Bot detection on StandardFetch or RenderedFetch is never retried on
    /// the same kind of fetch: it jumps straight to UnblockedFetch when the
    /// plan has it, and otherwise ends the fetch tiers. JsonBackdoor failures
    /// always fall through to the page fetch.
    #[must_use]
    pub fn after_failure(&self, position: usize, category: ErrorCategory) -> NextStep {
        let Some(tier) = self.tiers.get(position).copied() else {
            return NextStep::Stop;
        };
        if category != ErrorCategory::BotDetection
            || tier == Tier::JsonBackdoor
            || tier.is_bypass()
        {
            return NextStep::Continue;
        }

        match self.tiers.iter().position(|t| t.is_bypass()) {
            Some(index) if index > position => NextStep::JumpTo(index),
            _ => NextStep::Stop,
        }
    }
}
