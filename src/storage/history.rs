use crate::core::types::{truncate_chars, ConversationTurn, Role, Surface};
use crate::storage::shard::ShardedMap;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
pub struct HistoryLimits {
    /// Turn pairs kept; the log is capped at twice this many turns
    pub max_history: usize,
    pub user_turn_chars: usize,
    pub assistant_turn_chars: usize,
    pub idle_expiry: Duration,
}

impl HistoryLimits {
    fn max_turns(&self) -> usize {
        self.max_history * 2
    }
}

#[derive(Debug)]
struct ConversationHistory {
    turns: VecDeque<ConversationTurn>,
    last_access: Instant,
}

impl ConversationHistory {
    fn new(now: Instant) -> Self {
        Self {
            turns: VecDeque::new(),
            last_access: now,
        }
    }
}

type SurfaceLogs = HashMap<Surface, ConversationHistory>;

/// Per identity, per surface ordered turn logs with idle reclamation
pub struct HistoryStore {
    logs: ShardedMap<SurfaceLogs>,
    limits: HistoryLimits,
}

impl HistoryStore {
    pub fn new(limits: HistoryLimits) -> Self {
        Self {
            logs: ShardedMap::new(),
            limits,
        }
    }

    /// Snapshot of the log, oldest first. Creates an empty log on first use
    /// and refreshes its idle timer.
    pub async fn get(&self, surface: Surface, identity: &str) -> Vec<ConversationTurn> {
        self.get_at(surface, identity, Instant::now()).await
    }

    pub async fn get_at(&self, surface: Surface, identity: &str, now: Instant) -> Vec<ConversationTurn> {
        self.logs
            .with(identity, |logs| {
                let history = logs
                    .entry(identity.to_string())
                    .or_default()
                    .entry(surface)
                    .or_insert_with(|| ConversationHistory::new(now));
                history.last_access = now;
                history.turns.iter().cloned().collect()
            })
            .await
    }

    pub async fn append(&self, surface: Surface, identity: &str, user_text: &str, assistant_text: &str) {
        self.append_at(surface, identity, user_text, assistant_text, Instant::now())
            .await
    }

    pub async fn append_at(
        &self,
        surface: Surface,
        identity: &str,
        user_text: &str,
        assistant_text: &str,
        now: Instant,
    ) {
        let limits = self.limits;
        let len = self
            .logs
            .with(identity, |logs| {
                let history = logs
                    .entry(identity.to_string())
                    .or_default()
                    .entry(surface)
                    .or_insert_with(|| ConversationHistory::new(now));

                history.turns.push_back(ConversationTurn {
                    role: Role::User,
                    text: truncate_chars(user_text, limits.user_turn_chars),
                    created_at: now,
                });
                history.turns.push_back(ConversationTurn {
                    role: Role::Assistant,
                    text: truncate_chars(assistant_text, limits.assistant_turn_chars),
                    created_at: now,
                });
                while history.turns.len() > limits.max_turns() {
                    history.turns.pop_front();
                }
                history.last_access = now;
                history.turns.len()
            })
            .await;
        tracing::debug!(identity = %identity, surface = %surface, "[HistoryStore] Log now holds {} turns", len);
    }

    /// Drop every surface for `identity`. Returns whether anything was held.
    pub async fn clear(&self, identity: &str) -> bool {
        self.logs.remove(identity).await.is_some()
    }

    /// Remove logs idle past the expiry threshold, each surface on its own.
    /// Returns the number of logs removed.
    pub async fn sweep_idle(&self, now: Instant) -> usize {
        let idle_expiry = self.limits.idle_expiry;
        let mut expired = 0;
        self.logs
            .retain(|_, logs| {
                let before = logs.len();
                logs.retain(|_, history| now.saturating_duration_since(history.last_access) < idle_expiry);
                expired += before - logs.len();
                !logs.is_empty()
            })
            .await;
        if expired > 0 {
            tracing::info!("[HistoryStore] Reclaimed {} idle conversation logs", expired);
        }
        expired
    }

    /// (logs, turns) across all identities
    pub async fn counts(&self) -> (usize, usize) {
        self.logs
            .fold((0, 0), |(logs, turns), _, surfaces| {
                let held: usize = surfaces.values().map(|h| h.turns.len()).sum();
                (logs + surfaces.len(), turns + held)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(max_history: usize) -> HistoryStore {
        HistoryStore::new(HistoryLimits {
            max_history,
            user_turn_chars: 500,
            assistant_turn_chars: 1200,
            idle_expiry: Duration::from_secs(7200),
        })
    }

    #[tokio::test]
    async fn test_get_creates_empty_log() {
        let store = store(10);
        assert!(store.get(Surface::Public, "u1").await.is_empty());
        assert_eq!(store.counts().await, (1, 0));
    }

    #[tokio::test]
    async fn test_cap_drops_oldest_turns() {
        let store = store(2);
        for i in 0..5 {
            store
                .append(Surface::Public, "u1", &format!("q{}", i), &format!("a{}", i))
                .await;
            assert!(store.get(Surface::Public, "u1").await.len() <= 4);
        }

        let turns = store.get(Surface::Public, "u1").await;
        let texts: Vec<&str> = turns.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["q3", "a3", "q4", "a4"]);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_turns_are_truncated_on_write() {
        let store = store(10);
        store
            .append(Surface::Private, "u1", &"u".repeat(800), &"a".repeat(2000))
            .await;
        let turns = store.get(Surface::Private, "u1").await;
        assert_eq!(turns[0].char_len(), 500);
        assert_eq!(turns[1].char_len(), 1200);
    }

    #[tokio::test]
    async fn test_surfaces_are_separate_and_clear_drops_all() {
        let store = store(10);
        store.append(Surface::Public, "u1", "q", "a").await;
        store.append(Surface::Private, "u1", "q2", "a2").await;
        store.append(Surface::Public, "u2", "q", "a").await;

        assert_eq!(store.get(Surface::Public, "u1").await.len(), 2);
        assert_eq!(store.get(Surface::Private, "u1").await[0].text, "q2");

        assert!(store.clear("u1").await);
        assert!(!store.clear("u1").await);
        assert!(store.get(Surface::Public, "u1").await.is_empty());
        assert_eq!(store.get(Surface::Public, "u2").await.len(), 2);
    }

    #[tokio::test]
    async fn test_sweep_expires_each_surface_independently() {
        let store = store(10);
        let t0 = Instant::now();
        store.append_at(Surface::Public, "u1", "q", "a", t0).await;
        store.append_at(Surface::Private, "u1", "q", "a", t0).await;
        store
            .get_at(Surface::Private, "u1", t0 + Duration::from_secs(3600))
            .await;

        let removed = store.sweep_idle(t0 + Duration::from_secs(7201)).await;
        assert_eq!(removed, 1);
        assert_eq!(store.counts().await, (1, 2));

        let removed = store.sweep_idle(t0 + Duration::from_secs(3600 + 7201)).await;
        assert_eq!(removed, 1);
        assert_eq!(store.counts().await, (0, 0));
    }
}
