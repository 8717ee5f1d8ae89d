// Generation statistics
// Cost and token usage of finished generations, fetched with bounded retries
// and cached for a while since the records never change once available

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::{ProviderError, ProviderResult, SharedProvider};

/// How long looked up statistics stay cached
pub const STATISTICS_TTL: Duration = Duration::from_secs(30 * 60);

/// Usage record of one generation as reported by the provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Generation {
    pub id: String,
    pub model: String,
    pub total_cost: f64,
    pub is_byok: bool,
    pub upstream_inference_cost: Option<f64>,
    pub provider_name: Option<String>,
    /// Time to first token in milliseconds
    pub latency: Option<i64>,
    /// Generation time in milliseconds
    pub generation_time: Option<i64>,
    pub tokens_prompt: Option<i64>,
    pub tokens_completion: Option<i64>,
    pub native_tokens_prompt: Option<i64>,
    pub native_tokens_completion: Option<i64>,
    pub native_tokens_reasoning: Option<i64>,
    pub finish_reason: Option<String>,
}

/// Summary returned to the client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub model: String,
    pub cost: f64,
    pub ttft: i64,
    pub time: i64,
    pub input: i64,
    pub output: i64,
}

impl From<&Generation> for Statistics {
    fn from(generation: &Generation) -> Self {
        let mut cost = generation.total_cost;

        if generation.is_byok {
            cost += generation.upstream_inference_cost.unwrap_or_default();
        }

        let native_in = generation.native_tokens_prompt.unwrap_or_default();
        let normal_in = generation.tokens_prompt.unwrap_or_default();

        let native_out = generation.native_tokens_completion.unwrap_or_default()
            + generation.native_tokens_reasoning.unwrap_or_default();
        let normal_out = generation.tokens_completion.unwrap_or_default();

        Self {
            provider: generation.provider_name.clone(),
            model: generation.model.clone(),
            cost,
            ttft: generation.latency.unwrap_or_default(),
            time: generation.generation_time.unwrap_or_default(),
            input: native_in.max(normal_in),
            output: native_out.max(normal_out),
        }
    }
}

/// Bounded exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial: Duration,
    pub max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 4,
            initial: Duration::from_secs(1),
            max: Duration::from_secs(4),
        }
    }
}

#[derive(Debug, Clone)]
enum CachedLookup {
    Found(Statistics),
    Missing,
}

/// Cached, retrying statistics lookup
pub struct StatisticsLookup {
    provider: SharedProvider,
    policy: RetryPolicy,
    ttl: Duration,
    cache: RwLock<HashMap<String, (Instant, CachedLookup)>>,
}

impl StatisticsLookup {
    pub fn new(provider: SharedProvider) -> Self {
        Self::with_policy(provider, RetryPolicy::default(), STATISTICS_TTL)
    }

    pub fn with_policy(provider: SharedProvider, policy: RetryPolicy, ttl: Duration) -> Self {
        Self {
            provider,
            policy,
            ttl,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Look up statistics for a generation id; `NotFound` when the provider has no record
    pub async fn lookup(&self, id: &str) -> ProviderResult<Statistics> {
        if let Some(cached) = self.cached(id).await {
            return match cached {
                CachedLookup::Found(statistics) => Ok(statistics),
                CachedLookup::Missing => Err(ProviderError::NotFound(format!("generation {}", id))),
            };
        }

        let result = self.fetch_with_retry(id).await;

        let entry = match &result {
            Ok(statistics) => Some(CachedLookup::Found(statistics.clone())),
            Err(e) if e.is_not_found() => Some(CachedLookup::Missing),
            Err(_) => None,
        };

        if let Some(entry) = entry {
            let mut cache = self.cache.write().await;
            let ttl = self.ttl;

            cache.retain(|_, (stored, _)| stored.elapsed() < ttl);
            cache.insert(id.to_string(), (Instant::now(), entry));
        }

        result
    }

    async fn cached(&self, id: &str) -> Option<CachedLookup> {
        let cache = self.cache.read().await;

        cache
            .get(id)
            .filter(|(stored, _)| stored.elapsed() < self.ttl)
            .map(|(_, entry)| entry.clone())
    }

    async fn fetch_with_retry(&self, id: &str) -> ProviderResult<Statistics> {
        let mut backoff = self.policy.initial;
        let mut attempt = 0;

        loop {
            attempt += 1;

            match self.provider.fetch_generation(id).await {
                Ok(generation) => return Ok(Statistics::from(&generation)),
                Err(e) if attempt >= self.policy.attempts => return Err(e),
                Err(e) => {
                    log::debug!(
                        "[provider] generation {} attempt {} failed: {}",
                        id,
                        attempt,
                        e
                    );

                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(self.policy.max);
                }
            }
        }
    }
}
