use std::fmt;
use std::str::FromStr;

use crate::core::{Column, DataType, Schema, StoreError};

pub const COLUMN_ID: &str = "id";
pub const COLUMN_EMAIL: &str = "email";
pub const COLUMN_FIRST_NAME: &str = "first_name";
pub const COLUMN_LAST_NAME: &str = "last_name";
pub const COLUMN_STATUS: &str = "status";
pub const COLUMN_MEMO: &str = "memo";
pub const COLUMN_CREATED_AT: &str = "created_at";
pub const COLUMN_UPDATED_AT: &str = "updated_at";
pub const COLUMN_SOFT_DELETED_AT: &str = "soft_deleted_at";

/// Columns the store manages itself; never eligible for tokenization.
pub const RESERVED_COLUMNS: [&str; 4] = [
    COLUMN_ID,
    COLUMN_CREATED_AT,
    COLUMN_UPDATED_AT,
    COLUMN_SOFT_DELETED_AT,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserStatus {
    Active,
    Unverified,
    Inactive,
    Deleted,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Unverified => "unverified",
            Self::Inactive => "inactive",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = StoreError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "unverified" => Ok(Self::Unverified),
            "inactive" => Ok(Self::Inactive),
            "deleted" => Ok(Self::Deleted),
            _ => Err(StoreError::invalid_argument(format!(
                "unknown user status: {raw}"
            ))),
        }
    }
}

/// Table layout for the user entity. Sensitive columns hold token
/// references, so they get a generous text type; a sensitive column that
/// matches a built-in column keeps its position and is only widened.
pub fn user_schema(table: &str, sensitive_columns: &[String]) -> Schema {
    let is_sensitive = |name: &str| sensitive_columns.iter().any(|c| c == name);
    let text_or = |name: &str, fallback: DataType| {
        if is_sensitive(name) {
            DataType::Text
        } else {
            fallback
        }
    };

    let mut schema = Schema::new(table)
        .column(Column::new(COLUMN_ID, DataType::Varchar(40)).primary_key())
        .column(Column::new(COLUMN_STATUS, text_or(COLUMN_STATUS, DataType::Varchar(40))).not_null())
        .column(Column::new(COLUMN_FIRST_NAME, text_or(COLUMN_FIRST_NAME, DataType::Varchar(50))).not_null())
        .column(Column::new(COLUMN_LAST_NAME, text_or(COLUMN_LAST_NAME, DataType::Varchar(50))).not_null())
        .column(Column::new(COLUMN_EMAIL, text_or(COLUMN_EMAIL, DataType::Varchar(255))).not_null())
        .column(Column::new(COLUMN_MEMO, DataType::Text).not_null());

    for column in sensitive_columns {
        if !schema.has_column(column) {
            schema = schema.column(Column::new(column.as_str(), DataType::Text).not_null());
        }
    }

    schema
        .column(Column::new(COLUMN_CREATED_AT, DataType::DateTime).not_null())
        .column(Column::new(COLUMN_UPDATED_AT, DataType::DateTime).not_null())
        .column(Column::new(COLUMN_SOFT_DELETED_AT, DataType::DateTime).not_null())
}
