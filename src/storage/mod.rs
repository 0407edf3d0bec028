pub mod sqlite;

use async_trait::async_trait;

use crate::core::{Result, Row};
use crate::query::Statement;

pub use sqlite::SqliteBackend;

/// The narrow contract the store needs from a database.
///
/// Implementations own connection pooling and thread safety; the store
/// issues one statement per call and holds no locks between calls.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Run a statement that returns no rows. Returns the affected row count.
    async fn execute(&self, statement: &Statement) -> Result<u64>;

    /// Run a query, returning each row as a column → text map.
    async fn query(&self, statement: &Statement) -> Result<Vec<Row>>;
}
