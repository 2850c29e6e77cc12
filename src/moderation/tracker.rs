//! Abuse tracker and ban escalation
//!
//! Each identity moves through `clear -> warned -> banned -> clear`. Attempt
//! timestamps and the ban record for one identity share a shard lock so a
//! burst of concurrent requests cannot skip the transition to banned.

use crate::core::error::AdminError;
use crate::moderation::classifier::{ContentClassifier, Verdict};
use crate::storage::shard::ShardedMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const AUTO_BAN_REASON: &str = "repeated unsafe content";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptReason {
    Owner,
    Clean,
    Warning,
    Banned,
}

#[derive(Debug, Clone)]
pub struct AttemptDecision {
    pub allowed: bool,
    pub reason: AttemptReason,
    pub is_owner: bool,
    /// Unsafe events inside the window after this attempt
    pub strikes: usize,
    pub verdict: Option<Verdict>,
}

impl AttemptDecision {
    fn owner() -> Self {
        Self {
            allowed: true,
            reason: AttemptReason::Owner,
            is_owner: true,
            strikes: 0,
            verdict: None,
        }
    }

    fn banned(verdict: Option<Verdict>, strikes: usize) -> Self {
        Self {
            allowed: false,
            reason: AttemptReason::Banned,
            is_owner: false,
            strikes,
            verdict,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BanStatus {
    pub expires_at: Instant,
    pub remaining: Duration,
    pub reason: String,
}

#[derive(Debug, Clone)]
struct BanRecord {
    expires_at: Instant,
    reason: String,
}

#[derive(Debug, Default)]
struct IdentityRecord {
    attempts: VecDeque<Instant>,
    ban: Option<BanRecord>,
}

impl IdentityRecord {
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(oldest) = self.attempts.front() {
            if now.saturating_duration_since(*oldest) < window {
                break;
            }
            self.attempts.pop_front();
        }
    }

    /// Drops a lapsed ban and returns the live one, if any
    fn active_ban(&mut self, now: Instant) -> Option<&BanRecord> {
        if matches!(&self.ban, Some(ban) if now >= ban.expires_at) {
            self.ban = None;
        }
        self.ban.as_ref()
    }

    fn is_empty(&self) -> bool {
        self.attempts.is_empty() && self.ban.is_none()
    }
}

pub struct AbuseTracker {
    owner_id: String,
    classifier: Arc<ContentClassifier>,
    records: ShardedMap<IdentityRecord>,
    threshold: usize,
    window: Duration,
    ban_duration_ms: AtomicU64,
}

impl AbuseTracker {
    pub fn new(
        owner_id: impl Into<String>,
        classifier: Arc<ContentClassifier>,
        threshold: usize,
        window: Duration,
        ban_duration: Duration,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            classifier,
            records: ShardedMap::new(),
            threshold: threshold.max(1),
            window,
            ban_duration_ms: AtomicU64::new(
                u64::try_from(ban_duration.as_millis()).unwrap_or(u64::MAX),
            ),
        }
    }

    pub fn is_owner(&self, identity: &str) -> bool {
        identity == self.owner_id
    }

    pub fn ban_duration(&self) -> Duration {
        Duration::from_millis(self.ban_duration_ms.load(Ordering::SeqCst))
    }

    /// Rejects durations that round to zero milliseconds or overflow u64 milliseconds
    pub fn set_ban_duration(&self, duration: Duration) -> Result<(), AdminError> {
        let millis = u64::try_from(duration.as_millis()).map_err(|_| AdminError::InvalidDuration)?;
        if millis == 0 {
            return Err(AdminError::InvalidDuration);
        }
        self.ban_duration_ms.store(millis, Ordering::SeqCst);
        tracing::info!("[AbuseTracker] Ban duration set to {:?}", duration);
        Ok(())
    }

    pub async fn track_attempt(&self, identity: &str, text: &str) -> AttemptDecision {
        self.track_attempt_at(identity, text, Instant::now()).await
    }

    pub async fn track_attempt_at(&self, identity: &str, text: &str, now: Instant) -> AttemptDecision {
        if self.is_owner(identity) {
            return AttemptDecision::owner();
        }

        if self.ban_status_at(identity, now).await.is_some() {
            tracing::debug!(identity = %identity, "[AbuseTracker] Request from banned identity");
            return AttemptDecision::banned(None, 0);
        }

        let verdict = self.classifier.classify(text).await;
        if verdict.safe {
            return AttemptDecision {
                allowed: true,
                reason: AttemptReason::Clean,
                is_owner: false,
                strikes: 0,
                verdict: Some(verdict),
            };
        }

        let threshold = self.threshold;
        let window = self.window;
        let ban_duration = self.ban_duration();

        let (reason, strikes) = self
            .records
            .with(identity, |records| {
                let record = records.entry(identity.to_string()).or_default();
                // A concurrent request may have escalated while we classified
                if record.active_ban(now).is_some() {
                    return (AttemptReason::Banned, 0);
                }

                record.attempts.push_back(now);
                record.prune(now, window);
                let strikes = record.attempts.len();

                if strikes >= threshold {
                    record.ban = Some(BanRecord {
                        expires_at: now + ban_duration,
                        reason: AUTO_BAN_REASON.to_string(),
                    });
                    record.attempts.clear();
                    (AttemptReason::Banned, strikes)
                } else {
                    (AttemptReason::Warning, strikes)
                }
            })
            .await;

        match reason {
            AttemptReason::Banned if strikes == 0 => {
                tracing::debug!(identity = %identity, "[AbuseTracker] Identity banned mid-request")
            }
            AttemptReason::Banned => tracing::warn!(
                identity = %identity,
                reason = %verdict.reason,
                "[AbuseTracker] Ban threshold reached ({} strikes), banned for {:?}",
                strikes,
                ban_duration
            ),
            _ => tracing::warn!(
                identity = %identity,
                reason = %verdict.reason,
                "[AbuseTracker] Unsafe content, strike {}/{}",
                strikes,
                threshold
            ),
        }

        match reason {
            AttemptReason::Banned => AttemptDecision::banned(Some(verdict), strikes),
            _ => AttemptDecision {
                allowed: false,
                reason,
                is_owner: false,
                strikes,
                verdict: Some(verdict),
            },
        }
    }

    pub async fn ban_status(&self, identity: &str) -> Option<BanStatus> {
        self.ban_status_at(identity, Instant::now()).await
    }

    pub async fn ban_status_at(&self, identity: &str, now: Instant) -> Option<BanStatus> {
        self.records
            .with(identity, |records| {
                let record = records.get_mut(identity)?;
                let status = record.active_ban(now).map(|ban| BanStatus {
                    expires_at: ban.expires_at,
                    remaining: ban.expires_at.saturating_duration_since(now),
                    reason: ban.reason.clone(),
                });
                if status.is_none() {
                    record.prune(now, self.window);
                    if record.is_empty() {
                        records.remove(identity);
                    }
                }
                status
            })
            .await
    }

    /// Manual ban for the configured duration; replaces any existing ban
    pub async fn ban(&self, identity: &str, reason: &str) -> BanStatus {
        self.ban_at(identity, reason, Instant::now()).await
    }

    pub async fn ban_at(&self, identity: &str, reason: &str, now: Instant) -> BanStatus {
        let duration = self.ban_duration();
        let expires_at = now + duration;
        self.records
            .with(identity, |records| {
                let record = records.entry(identity.to_string()).or_default();
                record.ban = Some(BanRecord {
                    expires_at,
                    reason: reason.to_string(),
                });
                record.attempts.clear();
            })
            .await;
        tracing::warn!(identity = %identity, "[AbuseTracker] Identity banned for {:?}", duration);
        BanStatus {
            expires_at,
            remaining: duration,
            reason: reason.to_string(),
        }
    }

    /// Clears the ban and attempt record. Returns whether a live ban was lifted.
    pub async fn unban(&self, identity: &str) -> bool {
        let now = Instant::now();
        let lifted = self
            .records
            .remove(identity)
            .await
            .map(|mut record| record.active_ban(now).is_some())
            .unwrap_or(false);
        if lifted {
            tracing::info!(identity = %identity, "[AbuseTracker] Ban lifted");
        }
        lifted
    }

    /// Drop attempt history but keep any live ban
    pub async fn clear_attempts(&self, identity: &str) {
        self.records
            .with(identity, |records| {
                if let Some(record) = records.get_mut(identity) {
                    record.attempts.clear();
                    if record.ban.is_none() {
                        records.remove(identity);
                    }
                }
            })
            .await;
    }

    /// Reap lapsed bans and stale attempts. Returns the number of identities dropped.
    pub async fn reap_expired(&self, now: Instant) -> usize {
        let window = self.window;
        self.records
            .retain(|_, record| {
                record.active_ban(now);
                record.prune(now, window);
                !record.is_empty()
            })
            .await
    }

    pub async fn active_ban_count(&self) -> usize {
        let now = Instant::now();
        self.records
            .fold(0, |count, _, record| match &record.ban {
                Some(ban) if now < ban.expires_at => count + 1,
                _ => count,
            })
            .await
    }

    pub async fn tracked_count(&self) -> usize {
        self.records
            .fold(0, |count, _, record| count + usize::from(!record.attempts.is_empty()))
            .await
    }
}
