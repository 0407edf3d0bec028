use chrono::{DateTime, Utc};

use super::filter::UserQuery;
use super::is_valid_identifier;
use super::predicate::{OrderBy, Predicate, Projection};
use crate::core::{Result, StoreError, Value};
use crate::model::{COLUMN_CREATED_AT, COLUMN_EMAIL, COLUMN_ID, COLUMN_SOFT_DELETED_AT, COLUMN_STATUS};

/// Backend-agnostic SELECT: what to read, from where, under which
/// conditions. Rendered to SQL by [`super::Dialect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    pub table: String,
    pub projection: Projection,
    pub predicates: Vec<Predicate>,
    pub order: Option<OrderBy>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl QueryPlan {
    pub fn is_count(&self) -> bool {
        self.projection == Projection::Count
    }

    pub fn predicates_on<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a Predicate> + 'a {
        self.predicates.iter().filter(move |p| p.column == column)
    }
}

pub struct QueryCompiler;

impl QueryCompiler {
    /// Compile `query` against `table`, evaluating soft-delete visibility
    /// at `now`.
    pub fn compile(query: &UserQuery, table: &str, now: DateTime<Utc>) -> Result<QueryPlan> {
        if !is_valid_identifier(table) {
            return Err(StoreError::query(format!("invalid table name '{table}'")));
        }

        let mut predicates = Vec::new();

        if let Some(id) = query.get_id() {
            predicates.push(Predicate::eq(COLUMN_ID, id));
        }

        if let Some(p) = Predicate::is_in(COLUMN_ID, query.get_id_in().iter().map(String::as_str)) {
            predicates.push(p);
        }

        if let Some(status) = query.get_status() {
            predicates.push(Predicate::eq(COLUMN_STATUS, status));
        }

        if let Some(p) = Predicate::is_in(
            COLUMN_STATUS,
            query.get_status_in().iter().map(String::as_str),
        ) {
            predicates.push(p);
        }

        if let Some(email) = query.get_email() {
            predicates.push(Predicate::eq(COLUMN_EMAIL, email));
        }

        if let Some(gte) = query.get_created_at_gte() {
            predicates.push(Predicate::gte(COLUMN_CREATED_AT, gte));
        }

        if let Some(lte) = query.get_created_at_lte() {
            predicates.push(Predicate::lte(COLUMN_CREATED_AT, lte));
        }

        if !query.is_with_soft_deleted() {
            predicates.push(Predicate::gt(COLUMN_SOFT_DELETED_AT, Value::Timestamp(now)));
        }

        if query.is_count_only() {
            return Ok(QueryPlan {
                table: table.to_string(),
                projection: Projection::Count,
                predicates,
                order: None,
                limit: None,
                offset: None,
            });
        }

        let order = match query.get_order_by() {
            Some(column) if !is_valid_identifier(column) => {
                return Err(StoreError::query(format!(
                    "invalid order by column '{column}'"
                )));
            }
            Some(column) => Some(OrderBy {
                column: column.to_string(),
                order: query.get_sort_order(),
            }),
            None => None,
        };

        Ok(QueryPlan {
            table: table.to_string(),
            projection: Projection::All,
            predicates,
            order,
            limit: query.get_limit().filter(|n| *n > 0),
            offset: query.get_offset().filter(|n| *n > 0),
        })
    }
}
