use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{DEFAULT_TOKEN_PREFIX, TokenBatch, TokenVault};
use crate::core::{Result, StoreError};

/// Process-local vault. Values live only as long as the vault does.
#[derive(Debug)]
pub struct InMemoryTokenVault {
    prefix: String,
    tokens: RwLock<HashMap<String, String>>,
    fail_next: AtomicBool,
    calls: AtomicUsize,
}

impl Default for InMemoryTokenVault {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTokenVault {
    pub fn new() -> Self {
        Self::with_prefix(DEFAULT_TOKEN_PREFIX)
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            tokens: RwLock::new(HashMap::new()),
            fail_next: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    /// Raw value behind `token`, if the vault holds it.
    pub async fn value_of(&self, token: &str) -> Option<String> {
        self.tokens.read().await.get(token).cloned()
    }

    pub async fn len(&self) -> usize {
        self.tokens.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tokens.read().await.is_empty()
    }

    /// Make the next `reconcile` call fail without applying anything.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Number of `reconcile` calls received, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn mint(&self) -> String {
        format!("{}{}", self.prefix, Uuid::new_v4().simple())
    }
}

#[async_trait]
impl TokenVault for InMemoryTokenVault {
    async fn reconcile(&self, batch: TokenBatch) -> Result<BTreeMap<String, String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(StoreError::vault("injected vault failure"));
        }

        let mut tokens = self.tokens.write().await;

        // Validate the whole batch before mutating anything.
        if let Some(unknown) = batch.update.keys().find(|t| !tokens.contains_key(*t)) {
            return Err(StoreError::vault(format!("cannot update unknown token {unknown}")));
        }

        for token in &batch.delete {
            tokens.remove(token);
        }

        for (token, value) in batch.update {
            tokens.insert(token, value);
        }

        let mut created = BTreeMap::new();
        for (column, value) in batch.create {
            let token = self.mint();
            tokens.insert(token.clone(), value);
            created.insert(column, token);
        }

        Ok(created)
    }
}
