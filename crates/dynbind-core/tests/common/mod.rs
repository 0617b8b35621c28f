//! Test doubles and common utilities for lifecycle contract tests
//!
//! These doubles stand in for the DNS-update agent so tests can inspect
//! exactly which transactions the controller produced.

#![allow(dead_code)]

use dynbind_core::error::{Error, ExecutionFailure, Result};
use dynbind_core::traits::{BindingStore, TransactionExecutor};
use dynbind_core::transaction::TransactionScript;
use dynbind_core::validate::{Hostname, Token};
use dynbind_core::{DynbindConfig, LifecycleController, LifecycleEvent, MemoryBindingStore};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

pub const SERVER: &str = "ns1.example.net";
pub const ZONE: &str = "dyn.example.net";

/// An executor that records every script and can be told to fail
#[derive(Clone, Default)]
pub struct RecordingExecutor {
    scripts: Arc<Mutex<Vec<TransactionScript>>>,
    fail: Arc<AtomicBool>,
    delay: Option<Duration>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold each execution for `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make subsequent executions fail (or succeed again)
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// All scripts executed so far, in order
    pub fn scripts(&self) -> Vec<TransactionScript> {
        self.scripts.lock().unwrap().clone()
    }

    /// Number of executions so far
    pub fn call_count(&self) -> usize {
        self.scripts.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl TransactionExecutor for RecordingExecutor {
    async fn execute(&self, script: &TransactionScript) -> Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.scripts.lock().unwrap().push(script.clone());

        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Execution(ExecutionFailure::ExitCode {
                code: 2,
                stderr: "update failed: SERVFAIL".to_string(),
            }));
        }
        Ok(())
    }

    fn executor_name(&self) -> &'static str {
        "recording"
    }
}

/// An executor that tracks how many executions overlap
#[derive(Clone, Default)]
pub struct OverlapExecutor {
    inside: Arc<AtomicUsize>,
    max_inside: Arc<AtomicUsize>,
}

impl OverlapExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_inside.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl TransactionExecutor for OverlapExecutor {
    async fn execute(&self, _script: &TransactionScript) -> Result<()> {
        let now = self.inside.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_inside.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.inside.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    fn executor_name(&self) -> &'static str {
        "overlap"
    }
}

/// A memory store whose next `remove_hostname` calls fail with a storage error
#[derive(Clone, Default)]
pub struct FlakyMarkerStore {
    inner: MemoryBindingStore,
    marker_failures: Arc<AtomicUsize>,
}

impl FlakyMarkerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` marker removals
    pub fn fail_marker_removals(&self, count: usize) {
        self.marker_failures.store(count, Ordering::SeqCst);
    }

    /// The wrapped store, for inspection
    pub fn inner(&self) -> &MemoryBindingStore {
        &self.inner
    }
}

#[async_trait::async_trait]
impl BindingStore for FlakyMarkerStore {
    async fn create(&self, hostname: &Hostname) -> Result<Token> {
        self.inner.create(hostname).await
    }

    async fn lookup(&self, token: &str) -> Result<Hostname> {
        self.inner.lookup(token).await
    }

    async fn delete(&self, token: &str) -> Result<()> {
        self.inner.delete(token).await
    }

    async fn restore(&self, token: &Token, hostname: &Hostname) -> Result<()> {
        self.inner.restore(token, hostname).await
    }

    async fn exists_hostname(&self, hostname: &Hostname) -> Result<bool> {
        self.inner.exists_hostname(hostname).await
    }

    async fn remove_hostname(&self, hostname: &Hostname) -> Result<()> {
        let failing = self
            .marker_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(Error::storage("EIO"));
        }
        self.inner.remove_hostname(hostname).await
    }

    fn store_name(&self) -> &'static str {
        "flaky-marker"
    }
}

/// Minimal configuration for tests
pub fn minimal_config() -> DynbindConfig {
    DynbindConfig::new(SERVER, ZONE)
}

/// Controller over a fresh memory store and the given executor
pub fn controller_with(
    executor: Arc<dyn TransactionExecutor>,
) -> (
    LifecycleController,
    MemoryBindingStore,
    mpsc::Receiver<LifecycleEvent>,
) {
    let store = MemoryBindingStore::new();
    let (controller, events) =
        LifecycleController::new(Arc::new(store.clone()), executor, &minimal_config())
            .expect("controller construction succeeds");
    (controller, store, events)
}

/// Drain every event currently queued
pub fn drain(events: &mut mpsc::Receiver<LifecycleEvent>) -> Vec<LifecycleEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}
