use crate::core::Value;

use super::filter::SortOrder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    In,
    Gt,
    Gte,
    Lte,
}

impl Operator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::In => "IN",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lte => "<=",
        }
    }
}

/// One `column <op> value(s)` condition. Plans AND all of them together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub column: String,
    pub op: Operator,
    pub values: Vec<Value>,
}

impl Predicate {
    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Self::single(column, Operator::Eq, value.into())
    }

    pub fn gt(column: &str, value: impl Into<Value>) -> Self {
        Self::single(column, Operator::Gt, value.into())
    }

    pub fn gte(column: &str, value: impl Into<Value>) -> Self {
        Self::single(column, Operator::Gte, value.into())
    }

    pub fn lte(column: &str, value: impl Into<Value>) -> Self {
        Self::single(column, Operator::Lte, value.into())
    }

    /// Returns `None` for an empty list: an absent filter constrains nothing.
    pub fn is_in<I, V>(column: &str, values: I) -> Option<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return None;
        }
        Some(Self {
            column: column.to_string(),
            op: Operator::In,
            values,
        })
    }

    fn single(column: &str, op: Operator, value: Value) -> Self {
        Self {
            column: column.to_string(),
            op,
            values: vec![value],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub order: SortOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    All,
    Count,
}
