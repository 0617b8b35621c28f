// # Binding Store Implementations
//
// This module provides implementations of the BindingStore trait for
// different persistence strategies.

pub mod file;
pub mod memory;

pub use file::FileBindingStore;
pub use memory::MemoryBindingStore;

use std::sync::Arc;

use crate::config::StoreConfig;
use crate::error::Result;
use crate::traits::BindingStore;

/// Open the binding store described by `config`
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn BindingStore>> {
    match config {
        StoreConfig::File { path } => Ok(Arc::new(FileBindingStore::open(path).await?)),
        StoreConfig::Memory => Ok(Arc::new(MemoryBindingStore::new())),
    }
}
