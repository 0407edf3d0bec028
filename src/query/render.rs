use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::compiler::QueryPlan;
use super::is_valid_identifier;
use super::predicate::{Operator, Predicate, Projection};
use crate::core::{DataType, Result, Schema, StoreError, Value};
use crate::model::COLUMN_ID;

/// SQL text plus positional parameters. Values never appear in `sql`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Dialect {
    /// `?1, ?2, ...`
    #[default]
    Sqlite,
    /// `$1, $2, ...`
    Postgres,
}

impl FromStr for Dialect {
    type Err = StoreError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            _ => Err(StoreError::config(format!(
                "dialect must be one of: sqlite, postgres (got '{raw}')"
            ))),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite => f.write_str("sqlite"),
            Self::Postgres => f.write_str("postgres"),
        }
    }
}

struct Binder {
    dialect: Dialect,
    params: Vec<Value>,
}

impl Binder {
    fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            params: Vec::new(),
        }
    }

    fn bind(&mut self, value: Value) -> String {
        self.params.push(value);
        match self.dialect {
            Dialect::Sqlite => format!("?{}", self.params.len()),
            Dialect::Postgres => format!("${}", self.params.len()),
        }
    }

    fn finish(self, sql: String) -> Statement {
        Statement {
            sql,
            params: self.params,
        }
    }
}

fn quote(identifier: &str) -> Result<String> {
    if !is_valid_identifier(identifier) {
        return Err(StoreError::query(format!(
            "invalid identifier '{identifier}'"
        )));
    }
    Ok(format!("\"{identifier}\""))
}

impl Dialect {
    pub fn select(&self, plan: &QueryPlan) -> Result<Statement> {
        let mut binder = Binder::new(*self);
        let mut sql = match plan.projection {
            Projection::All => "SELECT *".to_string(),
            Projection::Count => "SELECT COUNT(*) AS \"count\"".to_string(),
        };
        sql.push_str(" FROM ");
        sql.push_str(&quote(&plan.table)?);

        let mut conditions = Vec::with_capacity(plan.predicates.len());
        for predicate in &plan.predicates {
            conditions.push(self.condition(predicate, &mut binder)?);
        }
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }

        if plan.is_count() {
            return Ok(binder.finish(sql));
        }

        if let Some(order) = &plan.order {
            sql.push_str(" ORDER BY ");
            sql.push_str(&quote(&order.column)?);
            sql.push(' ');
            sql.push_str(order.order.as_sql());
        }

        match (plan.limit, plan.offset) {
            (Some(limit), offset) => {
                sql.push_str(" LIMIT ");
                sql.push_str(&binder.bind(Value::Integer(to_i64(limit)?)));
                if let Some(offset) = offset {
                    sql.push_str(" OFFSET ");
                    sql.push_str(&binder.bind(Value::Integer(to_i64(offset)?)));
                }
            }
            (None, Some(offset)) => {
                // SQLite only accepts OFFSET after a LIMIT clause.
                if *self == Dialect::Sqlite {
                    sql.push_str(" LIMIT -1");
                }
                sql.push_str(" OFFSET ");
                sql.push_str(&binder.bind(Value::Integer(to_i64(offset)?)));
            }
            (None, None) => {}
        }

        Ok(binder.finish(sql))
    }

    fn condition(&self, predicate: &Predicate, binder: &mut Binder) -> Result<String> {
        let column = quote(&predicate.column)?;
        match predicate.op {
            Operator::In => {
                if predicate.values.is_empty() {
                    return Err(StoreError::query(format!(
                        "IN predicate on '{}' has no values",
                        predicate.column
                    )));
                }
                let placeholders: Vec<String> = predicate
                    .values
                    .iter()
                    .map(|v| binder.bind(v.clone()))
                    .collect();
                Ok(format!("{column} IN ({})", placeholders.join(", ")))
            }
            op => {
                let [value] = predicate.values.as_slice() else {
                    return Err(StoreError::query(format!(
                        "{} predicate on '{}' expects exactly one value",
                        op.as_sql(),
                        predicate.column
                    )));
                };
                Ok(format!("{column} {} {}", op.as_sql(), binder.bind(value.clone())))
            }
        }
    }

    pub fn insert(&self, table: &str, data: &BTreeMap<String, String>) -> Result<Statement> {
        if data.is_empty() {
            return Err(StoreError::query("insert requires at least one column"));
        }

        let mut binder = Binder::new(*self);
        let mut columns = Vec::with_capacity(data.len());
        let mut placeholders = Vec::with_capacity(data.len());
        for (column, value) in data {
            columns.push(quote(column)?);
            placeholders.push(binder.bind(Value::Text(value.clone())));
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote(table)?,
            columns.join(", "),
            placeholders.join(", ")
        );
        Ok(binder.finish(sql))
    }

    pub fn update_by_id(
        &self,
        table: &str,
        changes: &BTreeMap<String, String>,
        id: &str,
    ) -> Result<Statement> {
        if changes.is_empty() {
            return Err(StoreError::query("update requires at least one column"));
        }
        if changes.contains_key(COLUMN_ID) {
            return Err(StoreError::query("id column cannot be updated"));
        }

        let mut binder = Binder::new(*self);
        let mut assignments = Vec::with_capacity(changes.len());
        for (column, value) in changes {
            let column = quote(column)?;
            assignments.push(format!("{column} = {}", binder.bind(Value::Text(value.clone()))));
        }

        let sql = format!(
            "UPDATE {} SET {} WHERE {} = {}",
            quote(table)?,
            assignments.join(", "),
            quote(COLUMN_ID)?,
            binder.bind(Value::Text(id.to_string()))
        );
        Ok(binder.finish(sql))
    }

    pub fn delete_by_id(&self, table: &str, id: &str) -> Result<Statement> {
        let mut binder = Binder::new(*self);
        let sql = format!(
            "DELETE FROM {} WHERE {} = {}",
            quote(table)?,
            quote(COLUMN_ID)?,
            binder.bind(Value::Text(id.to_string()))
        );
        Ok(binder.finish(sql))
    }

    pub fn create_table(&self, schema: &Schema) -> Result<Statement> {
        schema.validate()?;

        let mut definitions = Vec::with_capacity(schema.columns.len());
        for column in &schema.columns {
            let mut definition = format!("{} {}", quote(&column.name)?, self.type_name(column.data_type));
            if !column.nullable {
                definition.push_str(" NOT NULL");
            }
            if column.primary_key {
                definition.push_str(" PRIMARY KEY");
            }
            definitions.push(definition);
        }

        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote(&schema.table)?,
            definitions.join(", ")
        );
        Ok(Statement {
            sql,
            params: Vec::new(),
        })
    }

    fn type_name(&self, data_type: DataType) -> String {
        match (self, data_type) {
            (Dialect::Postgres, DataType::DateTime) => "TIMESTAMP".to_string(),
            (_, other) => other.sql_name(),
        }
    }
}

fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| StoreError::query(format!("{value} exceeds the bindable range")))
}
