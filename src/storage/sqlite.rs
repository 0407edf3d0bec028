use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, params_from_iter};
use tracing::debug;

use super::StorageBackend;
use crate::core::{Result, Row, StoreError, Value, format_datetime};
use crate::query::Statement;

/// SQLite storage over a single serialized connection.
///
/// Every call runs on tokio's blocking pool, so driver I/O never stalls
/// the async workers. Statements still execute one at a time.
pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBackend {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    async fn with_connection<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| StoreError::storage("sqlite connection lock poisoned"))?;
            work(&conn)
        })
        .await
        .map_err(|err| StoreError::storage(format!("sqlite worker failed: {err}")))?
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    async fn execute(&self, statement: &Statement) -> Result<u64> {
        let sql = statement.sql.clone();
        let params = bind_values(&statement.params);

        let affected = self
            .with_connection(move |conn| Ok(conn.execute(&sql, params_from_iter(params))?))
            .await?;

        debug!(sql = %statement.sql, affected, "sqlite execute");
        Ok(affected as u64)
    }

    async fn query(&self, statement: &Statement) -> Result<Vec<Row>> {
        let sql = statement.sql.clone();
        let params = bind_values(&statement.params);

        let mapped = self
            .with_connection(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let columns: Vec<String> =
                    stmt.column_names().into_iter().map(String::from).collect();

                let mut rows = stmt.query(params_from_iter(params))?;
                let mut mapped = Vec::new();
                while let Some(row) = rows.next()? {
                    let mut out = Row::with_capacity(columns.len());
                    for (idx, name) in columns.iter().enumerate() {
                        out.insert(name.clone(), value_to_text(row.get_ref(idx)?));
                    }
                    mapped.push(out);
                }
                Ok(mapped)
            })
            .await?;

        debug!(sql = %statement.sql, rows = mapped.len(), "sqlite query");
        Ok(mapped)
    }
}

fn bind_values(params: &[Value]) -> Vec<SqlValue> {
    params
        .iter()
        .map(|value| match value {
            Value::Null => SqlValue::Null,
            Value::Text(text) => SqlValue::Text(text.clone()),
            Value::Integer(i) => SqlValue::Integer(*i),
            Value::Timestamp(ts) => SqlValue::Text(format_datetime(*ts)),
        })
        .collect()
}

fn value_to_text(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => String::from_utf8_lossy(bytes).into_owned(),
    }
}
