//! Administrative surface
//!
//! Every call checks the acting identity first; anyone but the owner gets
//! `AdminError::Unauthorized` and nothing changes.

use super::Gateway;
use crate::core::error::AdminError;
use crate::moderation::BanStatus;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnblockOutcome {
    Unbanned,
    NotBanned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurgeReport {
    pub history_cleared: bool,
    pub cache_entries_removed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatewayStats {
    pub active_bans: usize,
    pub tracked_identities: usize,
    pub cache_entries: usize,
    pub cache_capacity: usize,
    pub conversation_logs: usize,
    pub conversation_turns: usize,
    pub ban_duration_secs: u64,
    pub model_tier_ready: bool,
}

impl Gateway {
    fn authorize(&self, actor: &str) -> Result<(), AdminError> {
        if actor == self.owner_id {
            Ok(())
        } else {
            tracing::warn!(actor = %actor, "[Gateway] Unauthorized admin call");
            Err(AdminError::Unauthorized)
        }
    }

    pub async fn is_blocked(&self, actor: &str, identity: &str) -> Result<Option<BanStatus>, AdminError> {
        self.authorize(actor)?;
        Ok(self.tracker.ban_status(identity).await)
    }

    pub async fn block(&self, actor: &str, identity: &str, reason: &str) -> Result<BanStatus, AdminError> {
        self.authorize(actor)?;
        if self.tracker.is_owner(identity) {
            return Err(AdminError::OwnerImmune);
        }
        Ok(self.tracker.ban(identity, reason).await)
    }

    /// Lift a ban and wipe the identity's attempts, history and cache.
    /// A no-op on identities that are not banned.
    pub async fn unblock(&self, actor: &str, identity: &str) -> Result<UnblockOutcome, AdminError> {
        self.authorize(actor)?;
        if self.tracker.ban_status(identity).await.is_none() {
            return Ok(UnblockOutcome::NotBanned);
        }

        self.tracker.unban(identity).await;
        self.history.clear(identity).await;
        self.cache.clear_identity(identity).await;
        Ok(UnblockOutcome::Unbanned)
    }

    /// Erase everything held about an identity except an active ban
    pub async fn purge(&self, actor: &str, identity: &str) -> Result<PurgeReport, AdminError> {
        self.authorize(actor)?;
        let history_cleared = self.history.clear(identity).await;
        let cache_entries_removed = self.cache.clear_identity(identity).await;
        self.tracker.clear_attempts(identity).await;
        tracing::info!(identity = %identity, "[Gateway] Purged identity state");
        Ok(PurgeReport {
            history_cleared,
            cache_entries_removed,
        })
    }

    pub async fn stats(&self, actor: &str) -> Result<GatewayStats, AdminError> {
        self.authorize(actor)?;
        let (conversation_logs, conversation_turns) = self.history.counts().await;
        Ok(GatewayStats {
            active_bans: self.tracker.active_ban_count().await,
            tracked_identities: self.tracker.tracked_count().await,
            cache_entries: self.cache.len().await,
            cache_capacity: self.cache.capacity(),
            conversation_logs,
            conversation_turns,
            ban_duration_secs: self.tracker.ban_duration().as_secs(),
            model_tier_ready: self.classifier.model_ready(),
        })
    }

    pub async fn set_ban_duration(&self, actor: &str, duration: Duration) -> Result<Duration, AdminError> {
        self.authorize(actor)?;
        self.tracker.set_ban_duration(duration)?;
        Ok(duration)
    }
}
