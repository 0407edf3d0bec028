//! Decides which vault operations a pending record write needs.
//!
//! The record's `original` snapshot is what the primary table holds now and
//! its changed columns are the proposed write. For every changed sensitive
//! column:
//!
//! | stored value | proposed value | vault operation                  |
//! |--------------|----------------|----------------------------------|
//! | token        | raw, non-empty | update that token in place       |
//! | not a token  | raw, non-empty | create a token                   |
//! | token        | empty          | delete the token, store ""       |
//! | not a token  | empty          | none                             |
//! | token `a`    | token `b`      | delete `a`                       |
//!
//! Only sensitive columns are inspected. A value in any other column is
//! plain data even when it happens to start with the token prefix, and an
//! unchanged sensitive column is never part of the batch.

use std::collections::BTreeMap;

use super::TokenBatch;
use crate::core::{Result, StoreError};
use crate::model::Record;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenPlan {
    pub batch: TokenBatch,
    /// column → token it keeps pointing at after an in-place update
    pub reuse: BTreeMap<String, String>,
    /// columns to persist as "" because their token is released
    pub cleared: Vec<String>,
}

impl TokenPlan {
    pub fn is_empty(&self) -> bool {
        self.batch.is_empty() && self.cleared.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct TokenReconciler {
    sensitive: Vec<String>,
    prefix: String,
}

impl TokenReconciler {
    pub fn new(sensitive_columns: &[String], prefix: impl Into<String>) -> Self {
        Self {
            sensitive: sensitive_columns.to_vec(),
            prefix: prefix.into(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.sensitive.is_empty()
    }

    pub fn sensitive_columns(&self) -> &[String] {
        &self.sensitive
    }

    pub fn is_sensitive(&self, column: &str) -> bool {
        self.sensitive.iter().any(|c| c == column)
    }

    pub fn is_token(&self, value: &str) -> bool {
        !self.prefix.is_empty() && value.starts_with(&self.prefix)
    }

    /// Split proposed column values into `(tokenized, regular)`.
    pub fn partition(
        &self,
        proposed: &BTreeMap<String, String>,
    ) -> (BTreeMap<String, String>, BTreeMap<String, String>) {
        proposed
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .partition(|(column, _)| self.is_sensitive(column))
    }

    pub fn plan(&self, record: &Record) -> TokenPlan {
        let mut plan = TokenPlan::default();
        let (tokenized, _) = self.partition(&record.changed_columns());

        for (column, value) in &tokenized {
            let stored = record.get_original(column);
            let stored_token = self.is_token(stored);

            if self.is_token(value) {
                if stored_token && stored != value {
                    plan.batch.delete.push(stored.to_string());
                }
            } else if value.is_empty() {
                if stored_token {
                    plan.batch.delete.push(stored.to_string());
                    plan.cleared.push(column.clone());
                }
            } else if stored_token {
                plan.batch.update.insert(stored.to_string(), value.clone());
                plan.reuse.insert(column.clone(), stored.to_string());
            } else {
                plan.batch.create.insert(column.clone(), value.clone());
            }
        }

        plan
    }

    /// Write vault results back into the record. Afterwards no changed
    /// sensitive column holds a raw value.
    pub fn apply(
        &self,
        record: &mut Record,
        plan: &TokenPlan,
        created: &BTreeMap<String, String>,
    ) -> Result<()> {
        for column in plan.batch.create.keys() {
            let token = created.get(column).ok_or_else(|| {
                StoreError::vault(format!("vault returned no token for column {column}"))
            })?;
            if !self.is_token(token) {
                return Err(StoreError::vault(format!(
                    "vault returned a token without the '{}' prefix for column {column}",
                    self.prefix
                )));
            }
            record.set(column.as_str(), token.as_str());
        }

        for (column, token) in &plan.reuse {
            record.set(column.as_str(), token.as_str());
        }

        for column in &plan.cleared {
            record.set(column.as_str(), "");
        }

        self.ensure_no_raw_values(record)
    }

    fn ensure_no_raw_values(&self, record: &Record) -> Result<()> {
        for (column, value) in record.changed_columns() {
            if self.is_sensitive(&column) && !value.is_empty() && !self.is_token(&value) {
                return Err(StoreError::vault(format!(
                    "column {column} would be persisted without tokenization"
                )));
            }
        }
        Ok(())
    }
}
