//! Gateway orchestrator
//!
//! One request flows: abuse check, cache lookup, prompt assembly, upstream
//! call under a deadline, sanitization, then history and cache writes. Every
//! failure becomes a fixed reply; `submit` never returns an error.

pub mod admin;
pub mod replies;
pub mod sanitize;

pub use admin::{GatewayStats, PurgeReport, UnblockOutcome};

use crate::config::Settings;
use crate::core::error::{RulesError, UpstreamError};
use crate::core::llm::Upstream;
use crate::core::prompt::PromptBuilder;
use crate::core::rules::{RulesDocument, RulesStore};
use crate::core::types::Surface;
use crate::moderation::{AbuseTracker, AttemptReason, ContentClassifier, Verdict};
use crate::storage::{CacheKey, HistoryLimits, HistoryStore, ResponseCache};
use sanitize::sanitize_response;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, Instant};

/// Outcome of one maintenance pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub idle_logs_removed: usize,
    pub abuse_records_reaped: usize,
    pub model_ready: bool,
}

pub struct Gateway {
    owner_id: String,
    classifier: Arc<ContentClassifier>,
    tracker: AbuseTracker,
    history: HistoryStore,
    cache: ResponseCache,
    rules: RulesStore,
    prompt: PromptBuilder,
    upstream: Arc<dyn Upstream>,
    upstream_timeout: Duration,
}

impl Gateway {
    pub fn new(
        settings: &Settings,
        upstream: Arc<dyn Upstream>,
        classifier: Arc<ContentClassifier>,
        rules: RulesDocument,
    ) -> Self {
        let gateway = &settings.gateway;
        let tracker = AbuseTracker::new(
            gateway.owner_id.clone(),
            classifier.clone(),
            settings.abuse.ban_threshold,
            settings.abuse.window(),
            settings.abuse.ban_duration(),
        );
        let history = HistoryStore::new(HistoryLimits {
            max_history: gateway.max_history,
            user_turn_chars: gateway.user_turn_chars,
            assistant_turn_chars: gateway.assistant_turn_chars,
            idle_expiry: settings.maintenance.idle_expiry(),
        });

        tracing::info!(
            "[Gateway] Ready (model tier ready: {}, cache {} entries / {:?})",
            classifier.model_ready(),
            settings.cache.capacity,
            settings.cache.ttl()
        );

        Self {
            owner_id: gateway.owner_id.clone(),
            classifier,
            tracker,
            history,
            cache: ResponseCache::new(settings.cache.ttl(), settings.cache.capacity),
            rules: RulesStore::new(rules),
            prompt: PromptBuilder::from_config(gateway),
            upstream,
            upstream_timeout: settings.llm.timeout(),
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Process one chat request. Always yields text for the user.
    pub async fn submit(&self, identity: &str, text: &str, surface: Surface, context: &str) -> String {
        let decision = self.tracker.track_attempt(identity, text).await;

        if decision.is_owner {
            // Owners are never banned, but blocked content still stops here
            let verdict = self.classifier.classify(text).await;
            if !verdict.safe {
                tracing::warn!(reason = %verdict.reason, "[Gateway] Owner request matched a blocked pattern");
                return replies::OWNER_DENIED.to_string();
            }
        } else if !decision.allowed {
            return match decision.reason {
                AttemptReason::Banned => replies::BANNED,
                _ => replies::WARNING,
            }
            .to_string();
        }

        let key = CacheKey::derive(identity, surface, text, context);
        if let Some(hit) = self.cache.get(&key).await {
            tracing::debug!(identity = %identity, surface = %surface, "[Gateway] Cache hit");
            return hit;
        }

        let rules = self.rules.current().await;
        let history = if surface.keeps_history() {
            self.history.get(surface, identity).await
        } else {
            Vec::new()
        };
        let messages = self.prompt.build(&rules, surface, &history, text, context);

        let started = Instant::now();
        let result = match timeout(self.upstream_timeout, self.upstream.complete(messages)).await {
            Ok(Ok(raw)) => {
                let cleaned = sanitize_response(&raw, &rules);
                if cleaned.is_empty() {
                    Err(UpstreamError::EmptyResponse)
                } else {
                    Ok(cleaned)
                }
            }
            Ok(Err(UpstreamError::Timeout(_))) | Err(_) => Err(UpstreamError::Timeout(self.upstream_timeout)),
            Ok(Err(e)) => Err(e),
        };

        match result {
            Ok(answer) => {
                tracing::debug!(
                    identity = %identity,
                    surface = %surface,
                    "[Gateway] Upstream answered in {:?} ({} chars)",
                    started.elapsed(),
                    answer.chars().count()
                );
                if surface.keeps_history() {
                    self.history.append(surface, identity, text, &answer).await;
                }
                self.cache.put(key, answer.clone()).await;
                answer
            }
            Err(e) => {
                match &e {
                    UpstreamError::Authentication(_) => {
                        tracing::error!("[Gateway] Upstream rejected credentials: {}", e)
                    }
                    e if e.is_transient() => {
                        tracing::warn!(identity = %identity, "[Gateway] Upstream call failed: {}", e)
                    }
                    _ => tracing::error!(identity = %identity, "[Gateway] Upstream call failed: {}", e),
                }
                replies::for_upstream_error(&e).to_string()
            }
        }
    }

    /// User-requested reset of their own conversation state
    pub async fn reset(&self, identity: &str) -> bool {
        let had_history = self.history.clear(identity).await;
        let dropped = self.cache.clear_identity(identity).await;
        tracing::debug!(identity = %identity, "[Gateway] Reset (cache entries dropped: {})", dropped);
        had_history || dropped > 0
    }

    pub async fn classify(&self, text: &str) -> Verdict {
        self.classifier.classify(text).await
    }

    /// Accept the outcome of an external rules load. Failures keep the live copy.
    pub async fn reload_rules(&self, update: Result<RulesDocument, RulesError>) -> bool {
        self.rules.reload(update).await
    }

    pub async fn rules(&self) -> Arc<RulesDocument> {
        self.rules.current().await
    }

    pub async fn run_maintenance(&self) -> MaintenanceReport {
        self.run_maintenance_at(Instant::now()).await
    }

    pub async fn run_maintenance_at(&self, now: Instant) -> MaintenanceReport {
        MaintenanceReport {
            idle_logs_removed: self.history.sweep_idle(now).await,
            abuse_records_reaped: self.tracker.reap_expired(now).await,
            model_ready: self.classifier.ensure_ready().await,
        }
    }
}
