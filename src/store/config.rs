use std::env;

use crate::core::{Result, StoreError};
use crate::model::RESERVED_COLUMNS;
use crate::query::{Dialect, is_valid_identifier};
use crate::vault::DEFAULT_TOKEN_PREFIX;

/// Immutable store configuration, injected at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Primary table name
    pub table_name: String,

    /// Columns whose values live in the token vault
    pub sensitive_columns: Vec<String>,

    /// Marker that identifies a stored value as a token reference
    pub token_prefix: String,

    /// Placeholder style for rendered statements
    pub dialect: Dialect,

    /// Create the table on first use
    pub automigrate: bool,

    /// Log every rendered statement at debug level
    pub debug: bool,
}

impl StoreConfig {
    pub fn new(table_name: &str) -> Self {
        Self {
            table_name: table_name.to_string(),
            sensitive_columns: Vec::new(),
            token_prefix: DEFAULT_TOKEN_PREFIX.to_string(),
            dialect: Dialect::Sqlite,
            automigrate: false,
            debug: false,
        }
    }

    /// Set the tokenized columns
    pub fn sensitive_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sensitive_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn token_prefix(mut self, prefix: &str) -> Self {
        self.token_prefix = prefix.to_string();
        self
    }

    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn automigrate(mut self, enabled: bool) -> Self {
        self.automigrate = enabled;
        self
    }

    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    /// Read configuration from `USERSTORE_*` environment variables,
    /// loading a `.env` file first if one exists.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let table = env::var("USERSTORE_TABLE").unwrap_or_else(|_| "users".to_string());
        let mut config = Self::new(&table);

        if let Ok(raw) = env::var("USERSTORE_SENSITIVE_COLUMNS") {
            config = config.sensitive_columns(
                raw.split(',')
                    .map(str::trim)
                    .filter(|c| !c.is_empty()),
            );
        }

        if let Ok(prefix) = env::var("USERSTORE_TOKEN_PREFIX") {
            config = config.token_prefix(&prefix);
        }

        if let Ok(dialect) = env::var("USERSTORE_DIALECT") {
            config = config.dialect(dialect.parse()?);
        }

        config = config
            .automigrate(env_flag("USERSTORE_AUTOMIGRATE")?)
            .debug(env_flag("USERSTORE_DEBUG")?);

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !is_valid_identifier(&self.table_name) {
            return Err(StoreError::config(format!(
                "invalid table name '{}'",
                self.table_name
            )));
        }

        if self.token_prefix.is_empty() {
            return Err(StoreError::config("token prefix cannot be empty"));
        }

        for (idx, column) in self.sensitive_columns.iter().enumerate() {
            if !is_valid_identifier(column) {
                return Err(StoreError::config(format!(
                    "invalid sensitive column '{column}'"
                )));
            }
            if RESERVED_COLUMNS.contains(&column.as_str()) {
                return Err(StoreError::config(format!(
                    "column '{column}' is managed by the store and cannot be tokenized"
                )));
            }
            if self.sensitive_columns[..idx].contains(column) {
                return Err(StoreError::config(format!(
                    "sensitive column '{column}' listed twice"
                )));
            }
        }

        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new("users")
    }
}

fn env_flag(name: &str) -> Result<bool> {
    match env::var(name) {
        Err(_) => Ok(false),
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            _ => Err(StoreError::config(format!("{name} must be a boolean, got '{raw}'"))),
        },
    }
}
