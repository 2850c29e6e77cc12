//! Rules file watcher
//!
//! Polls the rules file and hands each load outcome to the gateway. The
//! gateway decides whether to apply it; this actor only does the IO.

use crate::core::error::RulesError;
use crate::core::rules::RulesDocument;
use crate::gateway::Gateway;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::fs;
use tokio::sync::mpsc::{channel, Receiver, Sender};
use tokio::sync::oneshot;
use tokio::time::{Duration, MissedTickBehavior};

pub async fn load_rules_file(path: &Path) -> Result<RulesDocument, RulesError> {
    let json = fs::read_to_string(path).await?;
    RulesDocument::parse(&json)
}

#[derive(Debug)]
pub enum WatcherMessage {
    /// Check the file now; replies whether the live rules changed
    CheckNow(oneshot::Sender<bool>),
    Shutdown,
}

pub struct RulesWatcherHandle {
    sender: Sender<WatcherMessage>,
}

impl RulesWatcherHandle {
    pub fn new(gateway: Arc<Gateway>, path: PathBuf, poll_interval: Duration) -> Self {
        let (sender, receiver) = channel(8);
        let poll_interval = super::tick_period(poll_interval, "RulesWatcher");
        tokio::spawn(rules_watcher_actor(receiver, gateway, path, poll_interval));
        Self { sender }
    }

    pub async fn send_message(&self, message: WatcherMessage) -> anyhow::Result<()> {
        self.sender
            .send(message)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to send message to rules watcher: {}", e))
    }

    pub async fn check_now(&self) -> anyhow::Result<bool> {
        let (tx, rx) = oneshot::channel();
        self.send_message(WatcherMessage::CheckNow(tx)).await?;
        rx.await
            .map_err(|e| anyhow::anyhow!("Rules watcher dropped the request: {}", e))
    }

    pub async fn shutdown(&self) -> anyhow::Result<()> {
        self.send_message(WatcherMessage::Shutdown).await
    }
}

/// Modification time plus length; catches rewrites inside one mtime tick
type Fingerprint = (Option<SystemTime>, u64);

struct WatchState {
    path: PathBuf,
    last_seen: Option<Fingerprint>,
    missing_logged: bool,
}

impl WatchState {
    async fn check(&mut self, gateway: &Gateway) -> bool {
        let fingerprint = match fs::metadata(&self.path).await {
            Ok(meta) => (meta.modified().ok(), meta.len()),
            Err(e) => {
                if !self.missing_logged {
                    tracing::warn!("[RulesWatcher] Cannot stat {:?}: {}", self.path, e);
                    self.missing_logged = true;
                }
                return false;
            }
        };
        self.missing_logged = false;

        if self.last_seen == Some(fingerprint) {
            return false;
        }
        self.last_seen = Some(fingerprint);

        tracing::debug!("[RulesWatcher] Change detected in {:?}", self.path);
        gateway.reload_rules(load_rules_file(&self.path).await).await
    }
}

async fn rules_watcher_actor(
    mut receiver: Receiver<WatcherMessage>,
    gateway: Arc<Gateway>,
    path: PathBuf,
    poll_interval: Duration,
) {
    let mut state = WatchState {
        path,
        last_seen: None,
        missing_logged: false,
    };
    let mut timer = tokio::time::interval(poll_interval);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!("Rules watcher actor started for {:?}", state.path);

    loop {
        tokio::select! {
            message = receiver.recv() => match message {
                Some(WatcherMessage::CheckNow(response)) => {
                    let changed = state.check(&gateway).await;
                    let _ = response.send(changed);
                }
                Some(WatcherMessage::Shutdown) | None => {
                    tracing::info!("Rules watcher shutting down");
                    break;
                }
            },
            _ = timer.tick() => {
                state.check(&gateway).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::core::error::UpstreamError;
    use crate::core::llm::{ChatMessage, Upstream};
    use crate::moderation::ContentClassifier;
    use async_trait::async_trait;
    use tempfile::tempdir;

    struct Silent;

    #[async_trait]
    impl Upstream for Silent {
        async fn complete(&self, _messages: Vec<ChatMessage>) -> Result<String, UpstreamError> {
            Err(UpstreamError::EmptyResponse)
        }
    }

    fn gateway() -> Arc<Gateway> {
        Arc::new(Gateway::new(
            &Settings::default(),
            Arc::new(Silent),
            Arc::new(ContentClassifier::regex_only()),
            RulesDocument::default(),
        ))
    }

    #[tokio::test]
    async fn test_load_rules_file_errors() {
        let dir = tempdir().unwrap();
        let missing = load_rules_file(&dir.path().join("nope.json")).await.unwrap_err();
        assert!(matches!(missing, RulesError::Io(_)));
    }

    #[tokio::test]
    async fn test_watcher_applies_valid_and_keeps_previous_on_invalid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rules.json");
        std::fs::write(
            &path,
            r#"{"core": "core v1", "public": "p", "private": "q", "search": "s"}"#,
        )
        .unwrap();

        let gateway = gateway();
        let watcher = RulesWatcherHandle::new(gateway.clone(), path.clone(), Duration::from_secs(3600));

        // the interval's first tick may have loaded the file already
        watcher.check_now().await.unwrap();
        assert_eq!(gateway.rules().await.core, "core v1");

        std::fs::write(&path, "{ this is not json at all }").unwrap();
        assert!(!watcher.check_now().await.unwrap());
        assert_eq!(gateway.rules().await.core, "core v1");

        std::fs::write(
            &path,
            r#"{"core": "core version two", "public": "p", "private": "q", "search": "s"}"#,
        )
        .unwrap();
        assert!(watcher.check_now().await.unwrap());
        assert_eq!(gateway.rules().await.core, "core version two");

        watcher.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_zero_poll_interval_still_serves_checks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rules.json");
        std::fs::write(
            &path,
            r#"{"core": "polled core", "public": "p", "private": "q", "search": "s"}"#,
        )
        .unwrap();

        let gateway = gateway();
        let watcher = RulesWatcherHandle::new(gateway.clone(), path, Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(10)).await;

        watcher.check_now().await.unwrap();
        assert_eq!(gateway.rules().await.core, "polled core");
        watcher.shutdown().await.unwrap();
    }
}
