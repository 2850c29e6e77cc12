use crate::gateway::{Gateway, MaintenanceReport};
use std::sync::Arc;
use tokio::sync::mpsc::{channel, Receiver, Sender};
use tokio::sync::oneshot;
use tokio::time::{Duration, MissedTickBehavior};

#[derive(Debug)]
pub enum SweeperMessage {
    SweepNow(oneshot::Sender<MaintenanceReport>),
    Shutdown,
}

/// Periodic idle-history and ban reclamation. A single task owns the timer,
/// so one sweep never overlaps the next.
pub struct SweeperHandle {
    sender: Sender<SweeperMessage>,
}

impl SweeperHandle {
    pub fn new(gateway: Arc<Gateway>, interval: Duration) -> Self {
        let (sender, receiver) = channel(8);
        let interval = super::tick_period(interval, "Sweeper");
        tokio::spawn(sweeper_actor(receiver, gateway, interval));
        Self { sender }
    }

    pub async fn send_message(&self, message: SweeperMessage) -> anyhow::Result<()> {
        self.sender
            .send(message)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to send message to sweeper: {}", e))
    }

    pub async fn sweep_now(&self) -> anyhow::Result<MaintenanceReport> {
        let (tx, rx) = oneshot::channel();
        self.send_message(SweeperMessage::SweepNow(tx)).await?;
        rx.await
            .map_err(|e| anyhow::anyhow!("Sweeper dropped the request: {}", e))
    }

    pub async fn shutdown(&self) -> anyhow::Result<()> {
        self.send_message(SweeperMessage::Shutdown).await
    }
}

async fn sweeper_actor(mut receiver: Receiver<SweeperMessage>, gateway: Arc<Gateway>, interval: Duration) {
    let mut timer = tokio::time::interval(interval);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // first tick completes immediately
    timer.tick().await;

    tracing::info!("Sweeper actor started (every {:?})", interval);

    loop {
        tokio::select! {
            message = receiver.recv() => match message {
                Some(SweeperMessage::SweepNow(response)) => {
                    let report = sweep(&gateway).await;
                    let _ = response.send(report);
                }
                Some(SweeperMessage::Shutdown) => {
                    tracing::info!("Sweeper received shutdown signal");
                    break;
                }
                None => {
                    tracing::info!("Sweeper channel closed, shutting down");
                    break;
                }
            },
            _ = timer.tick() => {
                sweep(&gateway).await;
            }
        }
    }
}

async fn sweep(gateway: &Gateway) -> MaintenanceReport {
    let report = gateway.run_maintenance().await;
    tracing::debug!(
        "[Sweeper] Removed {} idle logs, reaped {} abuse records",
        report.idle_logs_removed,
        report.abuse_records_reaped
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::core::error::UpstreamError;
    use crate::core::llm::{ChatMessage, Upstream};
    use crate::core::rules::RulesDocument;
    use crate::core::types::Surface;
    use crate::moderation::ContentClassifier;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl Upstream for Echo {
        async fn complete(&self, _messages: Vec<ChatMessage>) -> Result<String, UpstreamError> {
            Ok("echo".to_string())
        }
    }

    #[tokio::test]
    async fn test_sweep_now_reclaims_idle_logs() {
        let mut settings = Settings::default();
        settings.maintenance.idle_expiry_ms = 1;
        let gateway = Arc::new(Gateway::new(
            &settings,
            Arc::new(Echo),
            Arc::new(ContentClassifier::regex_only()),
            RulesDocument::default(),
        ));

        gateway.submit("u1", "hello", Surface::Public, "").await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let sweeper = SweeperHandle::new(gateway.clone(), Duration::from_secs(3600));
        let report = sweeper.sweep_now().await.unwrap();
        assert_eq!(report.idle_logs_removed, 1);

        sweeper.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_zero_interval_keeps_actor_alive() {
        let gateway = Arc::new(Gateway::new(
            &Settings::default(),
            Arc::new(Echo),
            Arc::new(ContentClassifier::regex_only()),
            RulesDocument::default(),
        ));

        let sweeper = SweeperHandle::new(gateway, Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(10)).await;

        let report = sweeper.sweep_now().await.unwrap();
        assert_eq!(report.idle_logs_removed, 0);
        assert!(!report.model_ready);
        sweeper.shutdown().await.unwrap();
    }
}
