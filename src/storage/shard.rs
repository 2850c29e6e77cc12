//! Identity-sharded state
//!
//! Per-identity records live in one of a fixed number of shards. A shard lock
//! is held only for the closure passed in, so two identities on different
//! shards never wait on each other and no lock spans an await.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use tokio::sync::Mutex;

const DEFAULT_SHARDS: usize = 16;

pub struct ShardedMap<V> {
    shards: Vec<Mutex<HashMap<String, V>>>,
}

impl<V> ShardedMap<V> {
    pub fn new() -> Self {
        Self::with_shards(DEFAULT_SHARDS)
    }

    pub fn with_shards(count: usize) -> Self {
        let count = count.max(1);
        Self {
            shards: (0..count).map(|_| Mutex::new(HashMap::new())).collect(),
        }
    }

    fn shard(&self, identity: &str) -> &Mutex<HashMap<String, V>> {
        let mut hasher = DefaultHasher::new();
        identity.hash(&mut hasher);
        let idx = (hasher.finish() as usize) % self.shards.len();
        &self.shards[idx]
    }

    /// Run `f` with exclusive access to the shard owning `identity`
    pub async fn with<R>(&self, identity: &str, f: impl FnOnce(&mut HashMap<String, V>) -> R) -> R {
        let mut shard = self.shard(identity).lock().await;
        f(&mut shard)
    }

    pub async fn remove(&self, identity: &str) -> Option<V> {
        self.with(identity, |map| map.remove(identity)).await
    }

    /// Visit every record shard by shard; records for which `keep` returns
    /// false are dropped. Returns the number dropped.
    pub async fn retain(&self, mut keep: impl FnMut(&str, &mut V) -> bool) -> usize {
        let mut removed = 0;
        for shard in &self.shards {
            let mut map = shard.lock().await;
            let before = map.len();
            map.retain(|identity, value| keep(identity, value));
            removed += before - map.len();
        }
        removed
    }

    /// Fold over every record without removing any
    pub async fn fold<A>(&self, init: A, mut f: impl FnMut(A, &str, &V) -> A) -> A {
        let mut acc = init;
        for shard in &self.shards {
            let map = shard.lock().await;
            for (identity, value) in map.iter() {
                acc = f(acc, identity, value);
            }
        }
        acc
    }
}

impl<V> Default for ShardedMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_and_retain() {
        let map: ShardedMap<u32> = ShardedMap::with_shards(4);
        for (i, id) in ["a", "b", "c", "d", "e"].iter().enumerate() {
            map.with(id, |m| m.insert(id.to_string(), i as u32)).await;
        }

        let total = map.fold(0, |acc, _, v| acc + v).await;
        assert_eq!(total, 10);

        let removed = map.retain(|_, v| *v % 2 == 0).await;
        assert_eq!(removed, 2);
        assert_eq!(map.remove("a").await, Some(0));
        assert_eq!(map.remove("b").await, None);
    }
}
