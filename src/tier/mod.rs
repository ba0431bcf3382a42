//! Tier Policy Resolver.
//!
//! Maps a subscription tier to its ordered backend chain, feature flags and
//! admission ceilings. Policies are built once at startup from the built-in
//! table plus optional config overrides and are only ever handed out by
//! shared reference.

use crate::config::{ChainEntryConfig, Provider, TierOverride, TiersConfig};
use serde::Serialize;
use std::fmt;

/// Subscription tier. Closed set: unknown input resolves to [`Tier::Free`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Pro,
    Team,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Free, Tier::Pro, Tier::Team];

    /// The most restrictive tier; target of every unrecognized value.
    pub const MOST_RESTRICTIVE: Tier = Tier::Free;

    /// Resolve a raw tier value, failing closed.
    ///
    /// ```
    /// use diagnose::tier::Tier;
    ///
    /// assert_eq!(Tier::resolve(" Team "), Tier::Team);
    /// assert_eq!(Tier::resolve("enterprise"), Tier::Free);
    /// assert_eq!(Tier::resolve(""), Tier::Free);
    /// ```
    pub fn resolve(raw: &str) -> Tier {
        match raw.trim().to_ascii_lowercase().as_str() {
            "free" => Tier::Free,
            "pro" => Tier::Pro,
            "team" => Tier::Team,
            other => {
                tracing::warn!(tier = %other, "Unrecognized tier, using most restrictive");
                Tier::MOST_RESTRICTIVE
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Pro => "pro",
            Tier::Team => "team",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a fallback chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendConfig {
    pub provider: Provider,
    pub model: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
    /// Index in the chain; 0 is the primary.
    pub position: usize,
}

impl BackendConfig {
    pub fn new(provider: Provider, model: &str, max_output_tokens: u32, temperature: f32) -> Self {
        Self {
            provider,
            model: model.to_string(),
            max_output_tokens,
            temperature,
            position: 0,
        }
    }

    pub fn terminal() -> Self {
        Self::new(Provider::Canned, crate::agent::canned::CANNED_MODEL, 0, 0.0)
    }

    pub fn is_terminal(&self) -> bool {
        self.provider == Provider::Canned
    }
}

impl From<&ChainEntryConfig> for BackendConfig {
    fn from(entry: &ChainEntryConfig) -> Self {
        Self::new(
            entry.provider,
            &entry.model,
            entry.max_output_tokens,
            entry.temperature,
        )
    }
}

/// Per-tier feature switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FeatureFlags {
    pub conversation_memory: bool,
    /// Fold externally fetched reference snippets into the prompt.
    pub reference_lookup: bool,
    pub batch: bool,
    /// Allow answering a vague conversational message with follow-up questions.
    pub clarification: bool,
}

/// Read-only policy for one tier.
///
/// The chain is never empty and always ends with the in-process terminal
/// fallback, so walking it can always produce an answer.
#[derive(Debug, Clone, Serialize)]
pub struct TierPolicy {
    tier: Tier,
    chain: Vec<BackendConfig>,
    features: FeatureFlags,
    concurrency: u32,
    per_minute: u32,
}

impl TierPolicy {
    /// Build a policy, appending the terminal fallback if the chain lacks it.
    pub fn new(
        tier: Tier,
        chain: Vec<BackendConfig>,
        features: FeatureFlags,
        concurrency: u32,
        per_minute: u32,
    ) -> Self {
        let mut chain: Vec<BackendConfig> = chain.into_iter().filter(|b| !b.is_terminal()).collect();
        chain.push(BackendConfig::terminal());
        for (position, backend) in chain.iter_mut().enumerate() {
            backend.position = position;
        }

        Self {
            tier,
            chain,
            features,
            concurrency: concurrency.max(1),
            per_minute: per_minute.max(1),
        }
    }

    /// Built-in policy table.
    pub fn builtin(tier: Tier) -> Self {
        match tier {
            Tier::Free => Self::new(
                tier,
                vec![
                    BackendConfig::new(Provider::Google, "gemini-1.5-flash", 1024, 0.3),
                    BackendConfig::new(Provider::Anthropic, "claude-3-haiku-20240307", 1024, 0.3),
                ],
                FeatureFlags::default(),
                2,
                10,
            ),
            Tier::Pro => Self::new(
                tier,
                vec![
                    BackendConfig::new(Provider::Anthropic, "claude-3-5-sonnet-latest", 2048, 0.3),
                    BackendConfig::new(Provider::OpenAI, "gpt-4o-mini", 2048, 0.3),
                    BackendConfig::new(Provider::Google, "gemini-1.5-flash", 2048, 0.3),
                ],
                FeatureFlags {
                    conversation_memory: true,
                    reference_lookup: true,
                    batch: false,
                    clarification: true,
                },
                5,
                30,
            ),
            Tier::Team => Self::new(
                tier,
                vec![
                    BackendConfig::new(Provider::Anthropic, "claude-3-5-sonnet-latest", 4096, 0.3),
                    BackendConfig::new(Provider::OpenAI, "gpt-4o", 4096, 0.3),
                    BackendConfig::new(Provider::Google, "gemini-1.5-pro", 4096, 0.3),
                ],
                FeatureFlags {
                    conversation_memory: true,
                    reference_lookup: true,
                    batch: true,
                    clarification: true,
                },
                10,
                120,
            ),
        }
    }

    fn with_override(self, over: &TierOverride) -> Self {
        let chain = match &over.chain {
            Some(entries) => entries.iter().map(BackendConfig::from).collect(),
            None => self.chain,
        };
        Self::new(
            self.tier,
            chain,
            self.features,
            over.concurrency.unwrap_or(self.concurrency),
            over.per_minute.unwrap_or(self.per_minute),
        )
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn chain(&self) -> &[BackendConfig] {
        &self.chain
    }

    pub fn primary(&self) -> &BackendConfig {
        &self.chain[0]
    }

    pub fn features(&self) -> FeatureFlags {
        self.features
    }

    /// Maximum in-flight requests per caller.
    pub fn concurrency(&self) -> u32 {
        self.concurrency
    }

    /// Maximum requests per caller in the trailing window.
    pub fn per_minute(&self) -> u32 {
        self.per_minute
    }
}

/// Exactly one policy per tier for the life of the process.
#[derive(Debug, Clone)]
pub struct TierPolicies {
    free: TierPolicy,
    pro: TierPolicy,
    team: TierPolicy,
}

impl TierPolicies {
    pub fn builtin() -> Self {
        Self {
            free: TierPolicy::builtin(Tier::Free),
            pro: TierPolicy::builtin(Tier::Pro),
            team: TierPolicy::builtin(Tier::Team),
        }
    }

    /// Built-in table with config overrides applied.
    pub fn from_config(config: &TiersConfig) -> Self {
        let apply = |tier: Tier, over: &Option<TierOverride>| match over {
            Some(o) => TierPolicy::builtin(tier).with_override(o),
            None => TierPolicy::builtin(tier),
        };
        Self {
            free: apply(Tier::Free, &config.free),
            pro: apply(Tier::Pro, &config.pro),
            team: apply(Tier::Team, &config.team),
        }
    }

    /// Replace a single tier's policy. Intended for startup wiring only.
    pub fn with_policy(mut self, policy: TierPolicy) -> Self {
        match policy.tier {
            Tier::Free => self.free = policy,
            Tier::Pro => self.pro = policy,
            Tier::Team => self.team = policy,
        }
        self
    }

    pub fn policy(&self, tier: Tier) -> &TierPolicy {
        match tier {
            Tier::Free => &self.free,
            Tier::Pro => &self.pro,
            Tier::Team => &self.team,
        }
    }

    /// Resolve a raw tier value straight to its policy, failing closed.
    pub fn resolve(&self, raw: &str) -> &TierPolicy {
        self.policy(Tier::resolve(raw))
    }

    pub fn iter(&self) -> impl Iterator<Item = &TierPolicy> {
        Tier::ALL.into_iter().map(move |t| self.policy(t))
    }
}

impl Default for TierPolicies {
    fn default() -> Self {
        Self::builtin()
    }
}
