// # Memory Binding Store
//
// In-memory implementation of BindingStore.
//
// ## Purpose
//
// A fast store that doesn't persist across restarts. Useful for tests and for
// throwaway deployments.
//
// ## Crash Behavior
//
// - All bindings are lost on restart/crash
// - Issued tokens stop working; DNS records they created stay in place

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::binding_store::BindingStore;
use crate::validate::{Hostname, Token, validate_token_format};

/// In-memory binding store implementation
///
/// Both namespaces live behind one `RwLock`, but each trait method still
/// touches a single key, matching the file store's semantics.
#[derive(Debug, Clone, Default)]
pub struct MemoryBindingStore {
    inner: Arc<RwLock<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    tokens: HashMap<Token, Hostname>,
    hostnames: HashSet<Hostname>,
}

impl MemoryBindingStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of token entries
    pub async fn len(&self) -> usize {
        self.inner.read().await.tokens.len()
    }

    /// Check if the store holds no token entries
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.tokens.is_empty()
    }
}

#[async_trait]
impl BindingStore for MemoryBindingStore {
    async fn create(&self, hostname: &Hostname) -> Result<Token, Error> {
        let mut state = self.inner.write().await;

        let mut token = Token::generate();
        while state.tokens.contains_key(&token) {
            token = Token::generate();
        }

        state.tokens.insert(token.clone(), hostname.clone());
        state.hostnames.insert(hostname.clone());
        Ok(token)
    }

    async fn lookup(&self, token: &str) -> Result<Hostname, Error> {
        let token = validate_token_format(token).map_err(|_| Error::UnknownToken)?;
        self.inner
            .read()
            .await
            .tokens
            .get(&token)
            .cloned()
            .ok_or(Error::UnknownToken)
    }

    async fn delete(&self, token: &str) -> Result<(), Error> {
        let token = validate_token_format(token).map_err(|_| Error::UnknownToken)?;
        self.inner
            .write()
            .await
            .tokens
            .remove(&token)
            .map(|_| ())
            .ok_or(Error::UnknownToken)
    }

    async fn restore(&self, token: &Token, hostname: &Hostname) -> Result<(), Error> {
        self.inner
            .write()
            .await
            .tokens
            .insert(token.clone(), hostname.clone());
        Ok(())
    }

    async fn exists_hostname(&self, hostname: &Hostname) -> Result<bool, Error> {
        Ok(self.inner.read().await.hostnames.contains(hostname))
    }

    async fn remove_hostname(&self, hostname: &Hostname) -> Result<(), Error> {
        if self.inner.write().await.hostnames.remove(hostname) {
            Ok(())
        } else {
            Err(Error::UnknownHostname(hostname.to_string()))
        }
    }

    fn store_name(&self) -> &'static str {
        "memory"
    }
}
