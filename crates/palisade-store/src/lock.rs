//! Per-key locks for replaceable event writes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use palisade_types::{Event, KindClass};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Identity of a replaceable slot: author, kind, and (for addressable
/// kinds) the `d` tag value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReplaceKey {
    pubkey: String,
    kind: u32,
    d_tag: Option<String>,
}

impl ReplaceKey {
    /// The slot `ev` competes for.
    pub fn of(ev: &Event) -> Self {
        let d_tag = (ev.kind_class() == KindClass::Addressable).then(|| ev.d_tag().to_string());
        Self {
            pubkey: ev.pubkey.clone(),
            kind: ev.kind,
            d_tag,
        }
    }
}

type LockTable = HashMap<ReplaceKey, Arc<AsyncMutex<()>>>;

/// A table of async mutexes keyed by [`ReplaceKey`].
///
/// Replaces of the same slot run one at a time; replaces of different slots
/// never wait on each other. Entries are dropped once no task holds or
/// awaits them.
#[derive(Debug, Clone, Default)]
pub struct ReplaceLocks {
    table: Arc<Mutex<LockTable>>,
}

impl ReplaceLocks {
    /// Waits for exclusive access to `key`.
    pub async fn acquire(&self, key: ReplaceKey) -> ReplaceGuard {
        let slot = {
            let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
            table.entry(key.clone()).or_default().clone()
        };
        let guard = slot.lock_owned().await;
        ReplaceGuard {
            table: Arc::clone(&self.table),
            key,
            _guard: guard,
        }
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.table.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether no key is currently tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive access to one replace key, released on drop.
pub struct ReplaceGuard {
    table: Arc<Mutex<LockTable>>,
    key: ReplaceKey,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for ReplaceGuard {
    fn drop(&mut self) {
        let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        // Two references left means only the table and this guard: nobody
        // else is waiting, so the slot can go.
        if table
            .get(&self.key)
            .is_some_and(|slot| Arc::strong_count(slot) <= 2)
        {
            table.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use palisade_types::Tag;
    use std::time::Duration;

    fn event(kind: u32, d: Option<&str>) -> Event {
        Event {
            id: "id".into(),
            pubkey: "alice".into(),
            created_at: 1,
            kind,
            tags: d.map(|d| vec![Tag::new(["d", d])]).unwrap_or_default(),
            content: String::new(),
            sig: String::new(),
        }
    }

    #[test]
    fn keys_distinguish_addresses() {
        assert_eq!(ReplaceKey::of(&event(0, None)), ReplaceKey::of(&event(0, Some("x"))));
        assert_ne!(
            ReplaceKey::of(&event(30063, Some("a"))),
            ReplaceKey::of(&event(30063, Some("b")))
        );
        assert_eq!(
            ReplaceKey::of(&event(30063, None)),
            ReplaceKey::of(&event(30063, Some("")))
        );
    }

    #[tokio::test]
    async fn same_key_is_exclusive_and_table_drains() {
        let locks = ReplaceLocks::default();
        let key = ReplaceKey::of(&event(0, None));

        let first = locks.acquire(key.clone()).await;
        let contender = {
            let locks = locks.clone();
            let key = key.clone();
            tokio::spawn(async move {
                let _g = locks.acquire(key).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished(), "second acquire must wait");

        drop(first);
        contender.await.unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn different_keys_do_not_block() {
        let locks = ReplaceLocks::default();
        let _a = locks.acquire(ReplaceKey::of(&event(0, None))).await;
        let b = tokio::time::timeout(
            Duration::from_millis(100),
            locks.acquire(ReplaceKey::of(&event(3, None))),
        )
        .await;
        assert!(b.is_ok());
        assert_eq!(locks.len(), 2);
    }
}
