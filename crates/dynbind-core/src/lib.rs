// # dynbind-core
//
// Core library for token-authenticated dynamic hostname bindings.
//
// ## Architecture Overview
//
// A client claims a hostname under a managed zone and receives a token. The
// token is the only credential needed to point the hostname's A/AAAA record
// at a new address, or to release the hostname again.
//
// - **validate**: Pure checks for hostnames, IP addresses and tokens
// - **BindingStore**: Trait for persisting token/hostname bindings
// - **transaction**: Renders update transactions for the DNS-update agent
// - **TransactionExecutor**: Trait for applying a transaction
// - **LifecycleController**: Orchestrates create → update* → delete
//
// ## Design Principles
//
// 1. **Validate first**: nothing unvalidated reaches the store or the agent
// 2. **Swappable backends**: store and executor sit behind traits
// 3. **No cached DNS state**: every update re-asserts the record
// 4. **Library-First**: the daemon is a thin transport over this crate

pub mod config;
pub mod controller;
pub mod error;
pub mod executor;
pub mod response;
pub mod store;
pub mod traits;
pub mod transaction;
pub mod validate;

// Re-export core types for convenience
pub use config::{AgentConfig, ControllerConfig, DnsConfig, DynbindConfig, StoreConfig};
pub use controller::{AppliedRecord, LifecycleController, LifecycleEvent};
pub use error::{Error, ErrorKind, ExecutionFailure, Result};
pub use executor::ProcessExecutor;
pub use response::Response;
pub use store::{FileBindingStore, MemoryBindingStore, open_store};
pub use traits::{BindingStore, TransactionExecutor};
pub use transaction::{RecordOperation, RecordType, TransactionScript, UpdateTarget};
pub use validate::{Hostname, IpVersion, Token};
