//! Per-key advisory locks
//!
//! Serializes concurrent first-write attempts for the same idempotency key
//! without contending across unrelated keys. Keys are reduced to the 64-bit
//! prefix of their SHA-256, the in-process equivalent of an advisory lock
//! keyed by a 64-bit hash. Map entries are removed when the last holder
//! releases, so the map stays bounded by in-flight keys.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// 64-bit advisory lock key for an idempotency key.
pub(crate) fn key_hash64(key: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(b"idem:");
    hasher.update(key.as_bytes());
    let digest = hasher.finalize();
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}

/// Keyed advisory lock table.
#[derive(Debug, Default)]
pub(crate) struct KeyLocks {
    locks: StdMutex<HashMap<u64, Arc<Mutex<()>>>>,
}

impl KeyLocks {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Acquire the lock for `key`, waiting if another task holds it.
    pub(crate) async fn acquire(self: &Arc<Self>, key: u64) -> KeyGuard {
        let slot = {
            let mut map = self
                .locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            map.entry(key).or_default().clone()
        };
        let guard = slot.lock_owned().await;
        KeyGuard {
            owner: Arc::clone(self),
            key,
            guard: Some(guard),
        }
    }
}

/// Holds the advisory lock until dropped.
pub(crate) struct KeyGuard {
    owner: Arc<KeyLocks>,
    key: u64,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        // Release the mutex before inspecting refcounts.
        self.guard.take();
        let mut map = self
            .owner
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(slot) = map.get(&self.key) {
            // Only the map itself still references the slot: nobody is
            // waiting, safe to drop the entry.
            if Arc::strong_count(slot) == 1 {
                map.remove(&self.key);
            }
        }
    }
}
