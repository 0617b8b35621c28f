//! Binding lifecycle controller
//!
//! The LifecycleController is responsible for:
//! - Validating request fields
//! - Claiming and releasing hostnames in the BindingStore
//! - Building update transactions for a binding
//! - Applying them through the TransactionExecutor
//!
//! ## Architecture
//!
//! ```text
//!   create / update / delete
//!              │
//!              ▼
//!   ┌─────────────────────┐
//!   │ LifecycleController │── per-hostname lock
//!   └─────────────────────┘
//!              │
//!     ┌────────┼─────────────────┬────────────────────┐
//!     ▼        ▼                 ▼                    ▼
//! ┌────────┐ ┌──────────────┐ ┌─────────────┐ ┌─────────────────────┐
//! │validate│ │ BindingStore │ │ transaction │ │ TransactionExecutor │
//! └────────┘ └──────────────┘ └─────────────┘ └─────────────────────┘
//! ```
//!
//! ## State Machine
//!
//! Per hostname, observed through the store:
//!
//! ```text
//! UNCLAIMED ──create──▶ CLAIMED ──update──▶ CLAIMED
//!     ▲                    │
//!     └──────delete────────┘
//! ```
//!
//! `create` writes no DNS record; the first `update` does.

pub mod locks;

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::DynbindConfig;
use crate::error::{Error, Result};
use crate::response::Response;
use crate::traits::{BindingStore, TransactionExecutor};
use crate::transaction::{RecordOperation, RecordType, UpdateTarget, build_transaction};
use crate::validate::{Hostname, Token, classify_ip, validate_hostname, validate_token_format};

pub use locks::{HostnameGuard, HostnameLocks};

/// Events emitted by the LifecycleController
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// A hostname was claimed
    BindingCreated { hostname: Hostname },

    /// A record was asserted for a hostname
    RecordApplied {
        hostname: Hostname,
        record_type: RecordType,
        value: IpAddr,
    },

    /// A binding and its records were removed
    BindingDeleted { hostname: Hostname },

    /// An operation failed
    OperationFailed {
        operation: &'static str,
        error: String,
    },
}

/// Record written by a successful update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedRecord {
    /// A or AAAA
    pub record_type: RecordType,
    /// Address now published
    pub value: IpAddr,
}

/// Core lifecycle controller
///
/// Cheap to share behind an `Arc`; every operation takes `&self` and may run
/// concurrently with any other.
///
/// ## Concurrency
///
/// Operations on the same hostname are serialised with [`HostnameLocks`]:
/// - `create` holds the lock across the existence check and the store write,
///   so only one of several racing creates can claim a hostname
/// - `update` and `delete` re-resolve the token under the lock, so an update
///   never applies a record for a binding deleted while it waited
pub struct LifecycleController {
    /// Token/hostname bindings
    store: Arc<dyn BindingStore>,

    /// DNS-update agent
    executor: Arc<dyn TransactionExecutor>,

    /// Server, zone and TTL for every transaction
    target: UpdateTarget,

    /// Per-hostname mutual exclusion
    locks: HostnameLocks,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<LifecycleEvent>,
}

impl LifecycleController {
    /// Create a new lifecycle controller
    ///
    /// # Returns
    ///
    /// A tuple of (controller, event_receiver) where event_receiver yields
    /// lifecycle events
    pub fn new(
        store: Arc<dyn BindingStore>,
        executor: Arc<dyn TransactionExecutor>,
        config: &DynbindConfig,
    ) -> Result<(Self, mpsc::Receiver<LifecycleEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.controller.event_channel_capacity);

        let controller = Self {
            store,
            executor,
            target: config.dns.target(),
            locks: HostnameLocks::new(),
            event_tx: tx,
        };

        info!(
            "Lifecycle controller ready: zone {} via {} ({} store, {} executor)",
            controller.target.zone,
            controller.target.server,
            controller.store.store_name(),
            controller.executor.executor_name()
        );

        Ok((controller, rx))
    }

    /// Claim `hostname` and issue a token for it
    ///
    /// # Errors
    ///
    /// - `MissingField`: no hostname given
    /// - `InvalidHostname`: hostname fails validation
    /// - `HostnameTaken`: hostname already claimed
    pub async fn create(&self, hostname: Option<&str>) -> Result<Token> {
        let result = self.create_binding(hostname).await;
        self.observe("create", result)
    }

    /// Publish `ip` for the hostname bound to `token`
    ///
    /// IPv4 replaces the A record, IPv6 replaces the AAAA record.
    ///
    /// # Errors
    ///
    /// - `MissingField`: no token or no ip given
    /// - `UnknownToken`: token unknown, malformed, or its hostname is no
    ///   longer claimed
    /// - `InvalidIp`: ip is neither IPv4 nor IPv6
    /// - `Execution`: the agent failed
    pub async fn update(&self, token: Option<&str>, ip: Option<&str>) -> Result<AppliedRecord> {
        let result = self.update_binding(token, ip).await;
        self.observe("update", result)
    }

    /// Remove the binding for `token` along with its records
    ///
    /// # Errors
    ///
    /// - `MissingField`: no token given
    /// - `UnknownToken`: token unknown or malformed
    /// - `Execution`: the agent failed; the binding is left intact
    /// - `Storage`: the marker could not be removed; the token entry is
    ///   restored so the delete can be retried
    pub async fn delete(&self, token: Option<&str>) -> Result<()> {
        let result = self.delete_binding(token).await;
        self.observe("delete", result)
    }

    /// Run the operation named `operation` with request `fields`
    ///
    /// Accepts `new` (or `create`), `update` and `delete`; reads the
    /// `hostname`, `token` and `ip` fields.
    pub async fn dispatch(&self, operation: &str, fields: &HashMap<String, String>) -> Response {
        let field = |name: &str| fields.get(name).map(String::as_str);

        let result = match operation {
            "new" | "create" => self
                .create(field("hostname"))
                .await
                .map(|token| Response::ok().with_field("token", token.as_str())),
            "update" => self
                .update(field("token"), field("ip"))
                .await
                .map(|applied| {
                    let key = match applied.record_type {
                        RecordType::A => "a",
                        RecordType::Aaaa => "aaaa",
                    };
                    Response::ok().with_field(key, applied.value.to_string())
                }),
            "delete" => self.delete(field("token")).await.map(|()| Response::ok()),
            other => Err(Error::UnknownOperation(other.to_string())),
        };

        result.unwrap_or_else(|e| Response::failure(&e))
    }

    async fn create_binding(&self, hostname: Option<&str>) -> Result<Token> {
        let hostname = validate_hostname(required(hostname, "hostname")?)?;

        let _guard = self.locks.lock(&hostname).await;

        if self.store.exists_hostname(&hostname).await? {
            return Err(Error::HostnameTaken(hostname.to_string()));
        }

        let token = self.store.create(&hostname).await?;
        info!("Claimed {} (token {}…)", hostname, token.redacted());

        self.emit_event(LifecycleEvent::BindingCreated { hostname });
        Ok(token)
    }

    async fn update_binding(&self, token: Option<&str>, ip: Option<&str>) -> Result<AppliedRecord> {
        let token = required(token, "token")?;
        let hostname = self.store.lookup(token).await?;

        let _guard = self.locks.lock(&hostname).await;
        self.ensure_bound(token, &hostname).await?;

        if !self.store.exists_hostname(&hostname).await? {
            warn!("Token resolves to {} but the hostname is not claimed", hostname);
            return Err(Error::UnknownToken);
        }

        let (value, _) = classify_ip(required(ip, "ip")?)?;
        let (operation, record_type) = match value {
            IpAddr::V4(v4) => (RecordOperation::CreateA(v4), RecordType::A),
            IpAddr::V6(v6) => (RecordOperation::CreateAaaa(v6), RecordType::Aaaa),
        };

        let script = build_transaction(operation, &hostname, &self.target);
        debug!("Applying {} {} for {}", record_type, value, hostname);
        self.executor.execute(&script).await?;

        info!("Updated {} {} -> {}", self.target.fqdn(&hostname), record_type, value);
        self.emit_event(LifecycleEvent::RecordApplied {
            hostname,
            record_type,
            value,
        });

        Ok(AppliedRecord { record_type, value })
    }

    async fn delete_binding(&self, token: Option<&str>) -> Result<()> {
        let token = required(token, "token")?;
        let hostname = self.store.lookup(token).await?;

        let _guard = self.locks.lock(&hostname).await;
        self.ensure_bound(token, &hostname).await?;

        let script = build_transaction(RecordOperation::DeleteAll, &hostname, &self.target);
        self.executor.execute(&script).await?;

        self.store.delete(token).await?;
        match self.store.remove_hostname(&hostname).await {
            Ok(()) => {}
            Err(Error::UnknownHostname(_)) => {
                warn!("Hostname marker for {} was already gone", hostname);
            }
            Err(e) => {
                self.restore_token(token, &hostname).await;
                return Err(e);
            }
        }

        info!("Released {}", hostname);
        self.emit_event(LifecycleEvent::BindingDeleted { hostname });
        Ok(())
    }

    /// Put back a token entry removed by a release that failed halfway,
    /// so the same token can retry the delete
    async fn restore_token(&self, raw: &str, hostname: &Hostname) {
        let restored = match validate_token_format(raw) {
            Ok(token) => self.store.restore(&token, hostname).await,
            Err(e) => Err(e),
        };
        if let Err(e) = restored {
            error!(
                "Could not restore token for {}; its marker is now orphaned: {}",
                hostname, e
            );
        }
    }

    /// Re-check under the hostname lock that `token` still maps to `hostname`
    async fn ensure_bound(&self, token: &str, hostname: &Hostname) -> Result<()> {
        if self.store.lookup(token).await? != *hostname {
            return Err(Error::UnknownToken);
        }
        Ok(())
    }

    fn observe<T>(&self, operation: &'static str, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            debug!("{} failed: {}", operation, e);
            self.emit_event(LifecycleEvent::OperationFailed {
                operation,
                error: e.to_string(),
            });
        }
        result
    }

    /// Emit a lifecycle event
    fn emit_event(&self, event: LifecycleEvent) {
        // A full channel means nobody is keeping up; drop rather than block.
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full or closed, dropping lifecycle event");
        }
    }
}

/// Treat absent and empty fields alike
fn required<'a>(value: Option<&'a str>, name: &'static str) -> Result<&'a str> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(Error::MissingField(name)),
    }
}
