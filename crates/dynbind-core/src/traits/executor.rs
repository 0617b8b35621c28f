// # Transaction Executor Trait
//
// Defines the interface for applying a transaction script to DNS.
//
// ## Implementations
//
// - `ProcessExecutor`: pipes the script into an external agent such as
//   `nsupdate` and maps its exit status
//
// ## Usage
//
// ```rust,ignore
// use dynbind_core::TransactionExecutor;
//
// let executor = /* TransactionExecutor implementation */;
// executor.execute(&script).await?;
// ```

use async_trait::async_trait;

use crate::transaction::TransactionScript;

/// Trait for transaction executor implementations
///
/// # Rules
///
/// - One script, one attempt: executors never retry
/// - No knowledge of bindings or tokens
/// - Success means the agent reported success; anything else is
///   `Error::Execution`
#[async_trait]
pub trait TransactionExecutor: Send + Sync {
    /// Apply a transaction script
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The agent applied the transaction
    /// - `Err(Error::Execution)`: The agent failed, could not start, or timed out
    async fn execute(&self, script: &TransactionScript) -> Result<(), crate::Error>;

    /// Executor name (for logging)
    fn executor_name(&self) -> &'static str;
}
