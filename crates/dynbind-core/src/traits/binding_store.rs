// # Binding Store Trait
//
// Defines the interface for persisting token/hostname bindings.
//
// ## Purpose
//
// A binding is two entries kept in two namespaces:
// - `tokens/<token>` holding the bound hostname
// - `hostnames/<hostname>` acting as an existence marker
//
// A hostname is claimed if and only if some token maps to it.
//
// ## Implementations
//
// - File-based: one file per key (`FileBindingStore`)
// - In-memory: `MemoryBindingStore`
//
// ## Usage
//
// ```rust,ignore
// use dynbind_core::BindingStore;
// use dynbind_core::validate::validate_hostname;
//
// let store = /* BindingStore implementation */;
// let hostname = validate_hostname("myhost")?;
//
// if !store.exists_hostname(&hostname).await? {
//     let token = store.create(&hostname).await?;
//     assert_eq!(store.lookup(token.as_str()).await?, hostname);
// }
// ```

use async_trait::async_trait;

use crate::validate::{Hostname, Token};

/// Trait for binding store implementations
///
/// The store provides single-key operations only. Pairing the two halves of a
/// binding, and serialising access per hostname, belongs to the
/// `LifecycleController`.
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
///
/// # Implementation Guidelines
///
/// - **Async I/O only**: never block the runtime
/// - **Whole-value writes**: a concurrent reader sees the old value or the new
///   one, never a partial write
/// - **No uniqueness policy**: `create` does not check `exists_hostname`
#[async_trait]
pub trait BindingStore: Send + Sync {
    /// Issue a new token bound to `hostname`
    ///
    /// Writes `tokens/<token> = hostname`, then `hostnames/<hostname>`.
    ///
    /// # Returns
    ///
    /// - `Ok(Token)`: The freshly generated token
    /// - `Err(Error)`: Storage error
    async fn create(&self, hostname: &Hostname) -> Result<Token, crate::Error>;

    /// Resolve a raw token string to its hostname
    ///
    /// # Returns
    ///
    /// - `Ok(Hostname)`: The bound hostname
    /// - `Err(Error::UnknownToken)`: Malformed token or no entry
    /// - `Err(Error)`: Storage error
    async fn lookup(&self, token: &str) -> Result<Hostname, crate::Error>;

    /// Remove the `tokens/<token>` entry
    ///
    /// The caller removes the matching hostname marker separately.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Entry removed
    /// - `Err(Error::UnknownToken)`: Malformed token or no entry
    /// - `Err(Error)`: Storage error
    async fn delete(&self, token: &str) -> Result<(), crate::Error>;

    /// Rewrite `tokens/<token> = hostname` for a token that was just deleted
    ///
    /// Used to undo `delete` when the rest of a release fails, so the
    /// release can be retried with the same token. Leaves the hostname
    /// marker alone.
    async fn restore(&self, token: &Token, hostname: &Hostname) -> Result<(), crate::Error>;

    /// Check whether `hostnames/<hostname>` exists
    async fn exists_hostname(&self, hostname: &Hostname) -> Result<bool, crate::Error>;

    /// Remove the `hostnames/<hostname>` marker
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Marker removed
    /// - `Err(Error::UnknownHostname)`: No marker
    /// - `Err(Error)`: Storage error
    async fn remove_hostname(&self, hostname: &Hostname) -> Result<(), crate::Error>;

    /// Backend name (for logging)
    fn store_name(&self) -> &'static str;
}
