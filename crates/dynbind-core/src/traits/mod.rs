//! Core traits for dynbind
//!
//! This module defines the abstract interfaces the lifecycle controller drives.
//!
//! - [`BindingStore`]: Persist token/hostname bindings
//! - [`TransactionExecutor`]: Apply update transactions to DNS

pub mod binding_store;
pub mod executor;

pub use binding_store::BindingStore;
pub use executor::TransactionExecutor;
