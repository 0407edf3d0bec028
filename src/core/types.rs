use std::collections::HashMap;

use super::{Result, StoreError};
use crate::query::is_valid_identifier;

/// A result row as returned by a storage backend. NULL reads as "".
pub type Row = HashMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Varchar(u32),
    Text,
    DateTime,
}

impl DataType {
    pub fn sql_name(&self) -> String {
        match self {
            Self::Varchar(len) => format!("VARCHAR({len})"),
            Self::Text => "TEXT".to_string(),
            Self::DateTime => "DATETIME".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    pub primary_key: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
            primary_key: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }
}

/// Persisted table layout, used for provisioning.
#[derive(Debug, Clone)]
pub struct Schema {
    pub table: String,
    pub columns: Vec<Column>,
}

impl Schema {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
        }
    }

    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn validate(&self) -> Result<()> {
        if !is_valid_identifier(&self.table) {
            return Err(StoreError::config(format!(
                "invalid table name '{}'",
                self.table
            )));
        }

        if self.columns.is_empty() {
            return Err(StoreError::config("schema has no columns"));
        }

        for (idx, column) in self.columns.iter().enumerate() {
            if !is_valid_identifier(&column.name) {
                return Err(StoreError::config(format!(
                    "invalid column name '{}'",
                    column.name
                )));
            }
            if self.columns[..idx].iter().any(|c| c.name == column.name) {
                return Err(StoreError::config(format!(
                    "duplicate column '{}'",
                    column.name
                )));
            }
        }

        Ok(())
    }
}
