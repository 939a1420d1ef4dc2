//! Model catalog: decides which models to try, in which order.
//!
//! A static preference list is refined by whatever the provider reports as
//! available. Discovery results are kept in an explicit [`ModelCache`].

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use common::LlmConfig;

use super::LlmProvider;
use crate::types::ModelCandidate;

pub const DEFAULT_PREFERRED_MODELS: &[&str] = &["gemini-2.0-flash", "gemini-1.5-flash", "gemini-1.5-pro", "gemini-pro"];
pub const DEFAULT_EXCLUDED_PATTERNS: &[&str] = &["exp", "preview", "experimental", "thinking", "tts"];
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

/// Ordering policy for candidate models
#[derive(Debug, Clone)]
pub struct CatalogPolicy {
    /// Tokens matched against discovered identifiers, most preferred first
    pub preferred: Vec<String>,
    /// Identifiers containing any of these are never attempted
    pub excluded: Vec<String>,
    /// Attempted when nothing else is left
    pub default_model: String,
}

impl Default for CatalogPolicy {
    fn default() -> Self {
        Self {
            preferred: DEFAULT_PREFERRED_MODELS.iter().map(|s| s.to_string()).collect(),
            excluded: DEFAULT_EXCLUDED_PATTERNS.iter().map(|s| s.to_string()).collect(),
            default_model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl CatalogPolicy {
    pub fn from_config(config: &LlmConfig) -> Self {
        let defaults = Self::default();
        Self {
            preferred: config.preferred_models.clone().unwrap_or(defaults.preferred),
            excluded: config.excluded_patterns.clone().unwrap_or(defaults.excluded),
            default_model: config.default_model.clone().unwrap_or(defaults.default_model),
        }
    }

    fn is_excluded(&self, identifier: &str) -> bool {
        let lower = identifier.to_lowercase();
        self.excluded.iter().any(|pattern| lower.contains(&pattern.to_lowercase()))
    }
}

/// Time-bounded cache of the discovered model list.
///
/// A zero TTL disables caching.
pub struct ModelCache {
    ttl: Duration,
    entry: RwLock<Option<(Instant, Vec<String>)>>,
}

impl ModelCache {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entry: RwLock::new(None) }
    }

    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The cached list, unless it is missing or older than the TTL
    pub async fn get(&self) -> Option<Vec<String>> {
        if self.ttl.is_zero() {
            return None;
        }
        let entry = self.entry.read().await;
        match entry.as_ref() {
            Some((stored_at, models)) if stored_at.elapsed() < self.ttl => Some(models.clone()),
            _ => None,
        }
    }

    pub async fn store(&self, models: Vec<String>) {
        if self.ttl.is_zero() {
            return;
        }
        *self.entry.write().await = Some((Instant::now(), models));
    }

    pub async fn invalidate(&self) {
        *self.entry.write().await = None;
    }
}

pub struct ModelCatalog {
    provider: Arc<dyn LlmProvider>,
    policy: CatalogPolicy,
    cache: Arc<ModelCache>,
}

impl ModelCatalog {
    pub fn new(provider: Arc<dyn LlmProvider>, policy: CatalogPolicy, cache: Arc<ModelCache>) -> Self {
        Self { provider, policy, cache }
    }

    pub fn policy(&self) -> &CatalogPolicy {
        &self.policy
    }

    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }

    /// Ordered candidate queue; never empty.
    pub async fn candidates(&self) -> Vec<ModelCandidate> {
        let discovered = match self.cache.get().await {
            Some(models) => {
                debug!(count = models.len(), "catalog: using cached model list");
                Some(models)
            }
            None => match self.provider.list_models().await {
                Ok(models) => {
                    info!(count = models.len(), "catalog: model discovery succeeded");
                    self.cache.store(models.clone()).await;
                    Some(models)
                }
                Err(e) => {
                    warn!("catalog: model discovery failed, using preference list: {:#}", e);
                    None
                }
            },
        };

        build_queue(&self.policy, discovered.as_deref())
    }
}

/// Builds the attempt queue from the policy and an optional discovery result.
///
/// Without discovery the preference list is used as is. With discovery, each
/// preferred token claims the first usable identifier containing it, the rest
/// follow in discovery order. The default model is the floor.
pub fn build_queue(policy: &CatalogPolicy, discovered: Option<&[String]>) -> Vec<ModelCandidate> {
    let mut queue: Vec<String> = Vec::new();

    match discovered {
        None => {
            for preferred in &policy.preferred {
                if !queue.contains(preferred) {
                    queue.push(preferred.clone());
                }
            }
        }
        Some(found) => {
            let usable: Vec<&String> = found.iter().filter(|id| !policy.is_excluded(id)).collect();

            for token in &policy.preferred {
                let claimed = usable
                    .iter()
                    .find(|id| id.contains(token.as_str()) && !queue.contains(**id));
                if let Some(id) = claimed {
                    queue.push((*id).clone());
                }
            }
            for id in usable {
                if !queue.contains(id) {
                    queue.push(id.clone());
                }
            }
        }
    }

    if queue.is_empty() {
        queue.push(policy.default_model.clone());
    }

    queue
        .into_iter()
        .enumerate()
        .map(|(priority_rank, identifier)| ModelCandidate { identifier, priority_rank })
        .collect()
}
