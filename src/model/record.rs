use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::*;
use crate::core::{MAX_DATETIME, now_utc_string, parse_datetime};

/// Attribute map with original/current snapshots.
///
/// `original` holds what was loaded or last persisted; `current` holds
/// pending mutations. Only the store calls [`Record::mark_clean`], after a
/// successful write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    original: BTreeMap<String, String>,
    current: BTreeMap<String, String>,
}

impl Record {
    /// An empty record. Every column set on it counts as changed.
    pub fn new() -> Self {
        Self::default()
    }

    /// A clean record built from a storage row.
    pub fn from_existing<I, K, V>(data: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let current: BTreeMap<String, String> = data
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            original: current.clone(),
            current,
        }
    }

    /// A new user with a fresh id, `unverified` status and the
    /// never-deleted soft-delete sentinel.
    pub fn new_user() -> Self {
        let now = now_utc_string();
        let mut record = Self::new();
        record
            .set(COLUMN_ID, Uuid::new_v4().simple().to_string())
            .set(COLUMN_STATUS, UserStatus::Unverified.as_str())
            .set(COLUMN_FIRST_NAME, "")
            .set(COLUMN_LAST_NAME, "")
            .set(COLUMN_EMAIL, "")
            .set(COLUMN_MEMO, "")
            .set(COLUMN_CREATED_AT, now.clone())
            .set(COLUMN_UPDATED_AT, now)
            .set(COLUMN_SOFT_DELETED_AT, MAX_DATETIME);
        record
    }

    pub fn get(&self, column: &str) -> &str {
        self.current.get(column).map(String::as_str).unwrap_or("")
    }

    /// The value as last loaded or persisted.
    pub fn get_original(&self, column: &str) -> &str {
        self.original.get(column).map(String::as_str).unwrap_or("")
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.current.insert(column.into(), value.into());
        self
    }

    pub fn has(&self, column: &str) -> bool {
        self.current.contains_key(column)
    }

    pub fn data(&self) -> &BTreeMap<String, String> {
        &self.current
    }

    pub fn changed_columns(&self) -> BTreeMap<String, String> {
        self.current
            .iter()
            .filter(|(k, v)| self.original.get(*k) != Some(*v))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn is_dirty(&self) -> bool {
        self.current
            .iter()
            .any(|(k, v)| self.original.get(k) != Some(v))
    }

    pub fn mark_clean(&mut self) {
        self.original = self.current.clone();
    }

    pub fn to_map(&self) -> HashMap<String, String> {
        self.current
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    // ---- user accessors -------------------------------------------------

    pub fn id(&self) -> &str {
        self.get(COLUMN_ID)
    }

    pub fn set_id(&mut self, id: impl Into<String>) -> &mut Self {
        self.set(COLUMN_ID, id)
    }

    pub fn email(&self) -> &str {
        self.get(COLUMN_EMAIL)
    }

    pub fn set_email(&mut self, email: impl Into<String>) -> &mut Self {
        self.set(COLUMN_EMAIL, email)
    }

    pub fn first_name(&self) -> &str {
        self.get(COLUMN_FIRST_NAME)
    }

    pub fn set_first_name(&mut self, first_name: impl Into<String>) -> &mut Self {
        self.set(COLUMN_FIRST_NAME, first_name)
    }

    pub fn last_name(&self) -> &str {
        self.get(COLUMN_LAST_NAME)
    }

    pub fn set_last_name(&mut self, last_name: impl Into<String>) -> &mut Self {
        self.set(COLUMN_LAST_NAME, last_name)
    }

    pub fn status(&self) -> &str {
        self.get(COLUMN_STATUS)
    }

    pub fn set_status(&mut self, status: impl Into<String>) -> &mut Self {
        self.set(COLUMN_STATUS, status)
    }

    pub fn memo(&self) -> &str {
        self.get(COLUMN_MEMO)
    }

    pub fn set_memo(&mut self, memo: impl Into<String>) -> &mut Self {
        self.set(COLUMN_MEMO, memo)
    }

    pub fn created_at(&self) -> &str {
        self.get(COLUMN_CREATED_AT)
    }

    pub fn set_created_at(&mut self, created_at: impl Into<String>) -> &mut Self {
        self.set(COLUMN_CREATED_AT, created_at)
    }

    pub fn updated_at(&self) -> &str {
        self.get(COLUMN_UPDATED_AT)
    }

    pub fn set_updated_at(&mut self, updated_at: impl Into<String>) -> &mut Self {
        self.set(COLUMN_UPDATED_AT, updated_at)
    }

    pub fn soft_deleted_at(&self) -> &str {
        self.get(COLUMN_SOFT_DELETED_AT)
    }

    pub fn set_soft_deleted_at(&mut self, soft_deleted_at: impl Into<String>) -> &mut Self {
        self.set(COLUMN_SOFT_DELETED_AT, soft_deleted_at)
    }

    pub fn created_at_time(&self) -> Option<DateTime<Utc>> {
        parse_datetime(self.created_at()).ok()
    }

    pub fn updated_at_time(&self) -> Option<DateTime<Utc>> {
        parse_datetime(self.updated_at()).ok()
    }

    pub fn soft_deleted_at_time(&self) -> Option<DateTime<Utc>> {
        parse_datetime(self.soft_deleted_at()).ok()
    }

    /// Set and not in the future.
    pub fn is_soft_deleted(&self) -> bool {
        self.soft_deleted_at_time()
            .is_some_and(|ts| ts <= Utc::now())
    }

    pub fn is_active(&self) -> bool {
        self.status() == UserStatus::Active.as_str()
    }

    pub fn is_unverified(&self) -> bool {
        self.status() == UserStatus::Unverified.as_str()
    }

    pub fn is_inactive(&self) -> bool {
        self.status() == UserStatus::Inactive.as_str()
    }

    pub fn is_deleted(&self) -> bool {
        self.status() == UserStatus::Deleted.as_str()
    }
}
