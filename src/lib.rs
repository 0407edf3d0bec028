// ============================================================================
// userstore Library
// ============================================================================

pub mod core;
pub mod model;
pub mod query;
pub mod storage;
pub mod store;
pub mod vault;

// Re-export main types for convenience
pub use crate::core::{Result, StoreError, Value};
pub use model::{Record, UserStatus};
pub use query::{Dialect, SortOrder, UserQuery};
pub use storage::{SqliteBackend, StorageBackend};
pub use store::{StoreConfig, UserStore};
pub use vault::{HttpTokenVault, InMemoryTokenVault, TokenBatch, TokenVault};

// ============================================================================
// Quick start
// ============================================================================

/// Open an in-memory SQLite store with the table provisioned.
///
/// Handy for tests and prototyping; production callers build a
/// [`UserStore`] from their own backend and vault.
///
/// # Examples
///
/// ```
/// # #[tokio::main]
/// # async fn main() -> userstore::Result<()> {
/// use userstore::{Record, UserQuery};
///
/// let store = userstore::open_in_memory(userstore::StoreConfig::default()).await?;
///
/// let mut user = Record::new_user();
/// user.set_email("ada@example.com").set_status("active");
/// store.user_create(&mut user).await?;
///
/// let count = store.user_count(&UserQuery::new().status("active")).await?;
/// assert_eq!(count, 1);
/// # Ok(())
/// # }
/// ```
pub async fn open_in_memory(config: StoreConfig) -> Result<UserStore> {
    let backend = std::sync::Arc::new(SqliteBackend::open_in_memory()?);
    let store = UserStore::new(config)?.with_backend(backend);
    store.auto_migrate().await?;
    Ok(store)
}
