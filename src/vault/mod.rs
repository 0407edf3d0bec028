pub mod http;
pub mod memory;
pub mod reconciler;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::Result;

pub use http::HttpTokenVault;
pub use memory::InMemoryTokenVault;
pub use reconciler::{TokenPlan, TokenReconciler};

pub const DEFAULT_TOKEN_PREFIX: &str = "tk_";

/// One bulk request to the vault.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenBatch {
    /// column → raw value; a token is minted per entry
    pub create: BTreeMap<String, String>,
    /// existing token → replacement raw value
    pub update: BTreeMap<String, String>,
    /// tokens to release
    pub delete: Vec<String>,
}

impl TokenBatch {
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }
}

/// External system of record for sensitive values.
///
/// `reconcile` is all-or-nothing from the caller's point of view: on
/// error nothing in the batch may be assumed applied. On success it
/// returns the minted token for every `create` column.
#[async_trait]
pub trait TokenVault: Send + Sync {
    async fn reconcile(&self, batch: TokenBatch) -> Result<BTreeMap<String, String>>;
}
