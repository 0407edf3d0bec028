use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use super::is_valid_identifier;
use crate::core::{Result, StoreError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for SortOrder {
    type Err = StoreError;

    fn from_str(raw: &str) -> Result<Self> {
        if raw.eq_ignore_ascii_case("asc") {
            Ok(Self::Asc)
        } else if raw.eq_ignore_ascii_case("desc") {
            Ok(Self::Desc)
        } else {
            Err(StoreError::invalid_argument(format!(
                "sort order must be ASC or DESC, got '{raw}'"
            )))
        }
    }
}

/// Which users to select.
///
/// Built by chaining setters; each returns a new value. Setters that can
/// reject input (`limit`, `offset`, `order_by`) return `Result<Self>`.
/// Empty strings passed to the equality setters mean "no filter".
///
/// # Examples
///
/// ```
/// use userstore::query::{SortOrder, UserQuery};
///
/// # fn main() -> userstore::Result<()> {
/// let query = UserQuery::new()
///     .status("active")
///     .limit(10)?
///     .order_by("created_at")?
///     .sort_order(SortOrder::Asc);
///
/// assert_eq!(query.get_limit(), Some(10));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserQuery {
    id: Option<String>,
    id_in: Vec<String>,
    status: Option<String>,
    status_in: Vec<String>,
    email: Option<String>,
    created_at_gte: Option<DateTime<Utc>>,
    created_at_lte: Option<DateTime<Utc>>,
    limit: Option<u64>,
    offset: Option<u64>,
    order_by: Option<String>,
    sort_order: SortOrder,
    count_only: bool,
    with_soft_deleted: bool,
}

fn non_empty(value: impl Into<String>) -> Option<String> {
    let value = value.into();
    if value.is_empty() { None } else { Some(value) }
}

impl UserQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = non_empty(id);
        self
    }

    pub fn id_in<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.id_in = ids.into_iter().filter_map(non_empty).collect();
        self
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = non_empty(status);
        self
    }

    pub fn status_in<I, S>(mut self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.status_in = statuses.into_iter().filter_map(non_empty).collect();
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = non_empty(email);
        self
    }

    pub fn created_at_gte(mut self, ts: DateTime<Utc>) -> Self {
        self.created_at_gte = Some(ts);
        self
    }

    pub fn created_at_lte(mut self, ts: DateTime<Utc>) -> Self {
        self.created_at_lte = Some(ts);
        self
    }

    pub fn limit(mut self, limit: i64) -> Result<Self> {
        self.limit = Some(non_negative("limit", limit)?);
        Ok(self)
    }

    pub fn offset(mut self, offset: i64) -> Result<Self> {
        self.offset = Some(non_negative("offset", offset)?);
        Ok(self)
    }

    pub fn order_by(mut self, column: impl Into<String>) -> Result<Self> {
        let column = column.into();
        if column.is_empty() {
            self.order_by = None;
            return Ok(self);
        }
        if !is_valid_identifier(&column) {
            return Err(StoreError::invalid_argument(format!(
                "order by column '{column}' is not a valid identifier"
            )));
        }
        self.order_by = Some(column);
        Ok(self)
    }

    pub fn sort_order(mut self, order: SortOrder) -> Self {
        self.sort_order = order;
        self
    }

    pub fn count_only(mut self, count_only: bool) -> Self {
        self.count_only = count_only;
        self
    }

    pub fn with_soft_deleted(mut self, with_soft_deleted: bool) -> Self {
        self.with_soft_deleted = with_soft_deleted;
        self
    }

    pub fn get_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn get_id_in(&self) -> &[String] {
        &self.id_in
    }

    pub fn get_status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn get_status_in(&self) -> &[String] {
        &self.status_in
    }

    pub fn get_email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn get_created_at_gte(&self) -> Option<DateTime<Utc>> {
        self.created_at_gte
    }

    pub fn get_created_at_lte(&self) -> Option<DateTime<Utc>> {
        self.created_at_lte
    }

    pub fn get_limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn get_offset(&self) -> Option<u64> {
        self.offset
    }

    pub fn get_order_by(&self) -> Option<&str> {
        self.order_by.as_deref()
    }

    pub fn get_sort_order(&self) -> SortOrder {
        self.sort_order
    }

    pub fn is_count_only(&self) -> bool {
        self.count_only
    }

    pub fn is_with_soft_deleted(&self) -> bool {
        self.with_soft_deleted
    }
}

fn non_negative(name: &str, value: i64) -> Result<u64> {
    u64::try_from(value)
        .map_err(|_| StoreError::invalid_argument(format!("{name} cannot be negative, got {value}")))
}
