//! Per-hostname mutual exclusion
//!
//! The binding store only offers single-key operations. Holding a hostname's
//! lock across a check-then-write sequence makes that sequence atomic with
//! respect to every other lifecycle operation on the same hostname.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::validate::Hostname;

/// Registry of in-process hostname locks
///
/// Entries exist only while some task holds or waits for them.
#[derive(Debug, Default)]
pub struct HostnameLocks {
    entries: Mutex<HashMap<Hostname, LockEntry>>,
}

#[derive(Debug, Default)]
struct LockEntry {
    lock: Arc<AsyncMutex<()>>,
    /// Tasks holding or waiting for `lock`
    users: usize,
}

impl HostnameLocks {
    /// Create an empty lock registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `hostname`
    ///
    /// Cancel-safe: dropping the future while it waits unregisters the
    /// caller.
    pub async fn lock(&self, hostname: &Hostname) -> HostnameGuard<'_> {
        let (claim, lock) = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            let entry = entries.entry(hostname.clone()).or_default();
            entry.users += 1;
            let claim = Claim {
                locks: self,
                hostname: hostname.clone(),
            };
            (claim, Arc::clone(&entry.lock))
        };

        let guard = lock.lock_owned().await;
        HostnameGuard {
            _guard: guard,
            _claim: claim,
        }
    }

    /// Number of hostnames currently locked or waited on
    pub fn active(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Exclusive access to one hostname, released on drop
#[derive(Debug)]
pub struct HostnameGuard<'a> {
    // Declaration order is drop order: unlock first, then unregister.
    _guard: OwnedMutexGuard<()>,
    _claim: Claim<'a>,
}

/// One task's registration on a hostname entry
#[derive(Debug)]
struct Claim<'a> {
    locks: &'a HostnameLocks,
    hostname: Hostname,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        let mut entries = self
            .locks
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(entry) = entries.get_mut(&self.hostname) {
            entry.users -= 1;
            if entry.users == 0 {
                entries.remove(&self.hostname);
            }
        }
    }
}
