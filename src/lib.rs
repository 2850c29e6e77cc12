//! Chatwarden - moderation and conversational-cache gateway
//!
//! Sits between a chat client and a language-model upstream: classifies
//! every message, escalates repeat offenders to timed bans, keeps bounded
//! per-user conversation logs and deduplicates identical requests.

pub mod actors;
mod config;
pub mod core;
pub mod gateway;
pub mod moderation;
pub mod storage;
pub mod utils;

pub mod cli;

pub use crate::config::Settings;
pub use crate::core::error::{AdminError, RulesError, UpstreamError};
pub use crate::core::llm::{ChatMessage, LLMClient, Upstream};
pub use crate::core::rules::RulesDocument;
pub use crate::core::types::Surface;
pub use crate::gateway::Gateway;
pub use crate::moderation::{ContentClassifier, Verdict};

use crate::actors::{load_rules_file, RulesWatcherHandle, SweeperHandle};
use crate::moderation::{HttpClassifier, NoopClassifier, ProbabilisticClassifier};
use std::sync::Arc;

/// A running gateway plus its background actors
pub struct System {
    gateway: Arc<Gateway>,
    sweeper: SweeperHandle,
    watcher: Option<RulesWatcherHandle>,
}

impl System {
    /// Start against the HTTP upstream configured in `settings`
    pub async fn start(settings: Settings) -> anyhow::Result<Self> {
        let api_key = Settings::api_key()?;
        let upstream = LLMClient::new(api_key, settings.llm.clone())?;
        Self::with_upstream(settings, Arc::new(upstream)).await
    }

    pub async fn with_upstream(settings: Settings, upstream: Arc<dyn Upstream>) -> anyhow::Result<Self> {
        let classifier = build_classifier(&settings).await?;

        let rules = match &settings.maintenance.rules_path {
            Some(path) => load_rules_file(path).await.unwrap_or_else(|e| {
                tracing::warn!("Could not load rules from {:?}, using built-in rules: {}", path, e);
                RulesDocument::default()
            }),
            None => RulesDocument::default(),
        };

        let gateway = Arc::new(Gateway::new(&settings, upstream, classifier, rules));
        let sweeper = SweeperHandle::new(gateway.clone(), settings.maintenance.sweep_interval());
        let watcher = settings.maintenance.rules_path.clone().map(|path| {
            RulesWatcherHandle::new(
                gateway.clone(),
                path,
                settings.maintenance.rules_poll_interval(),
            )
        });

        tracing::info!("Chatwarden system initialized");
        Ok(Self {
            gateway,
            sweeper,
            watcher,
        })
    }

    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    /// Stop the background actors
    pub async fn shutdown(&self) -> anyhow::Result<()> {
        self.sweeper.shutdown().await?;
        if let Some(watcher) = &self.watcher {
            watcher.shutdown().await?;
        }
        tracing::info!("Chatwarden system shutdown complete");
        Ok(())
    }
}

/// Classifier tiers as configured, without an upstream
pub async fn build_classifier(settings: &Settings) -> anyhow::Result<Arc<ContentClassifier>> {
    Ok(Arc::new(ContentClassifier::new(
        build_model_tier(settings).await?,
        settings.classifier.threshold,
    )))
}

async fn build_model_tier(settings: &Settings) -> anyhow::Result<Arc<dyn ProbabilisticClassifier>> {
    match &settings.classifier.endpoint {
        Some(endpoint) => {
            let http = HttpClassifier::new(
                endpoint.clone(),
                Settings::classifier_token(),
                std::time::Duration::from_millis(settings.classifier.timeout_ms),
            )?;
            http.warm_up().await;
            Ok(Arc::new(http))
        }
        None => {
            tracing::info!("No classifier endpoint configured, using pattern tiers only");
            Ok(Arc::new(NoopClassifier))
        }
    }
}
