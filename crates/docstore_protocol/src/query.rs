//! Structured queries.

use crate::path::FieldPath;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Comparison operator of a field filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `<`
    LessThan,
    /// `<=`
    LessThanOrEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanOrEqual,
}

impl FilterOp {
    /// Parses an operator string such as `"<="`.
    pub fn parse(op: &str) -> Option<Self> {
        match op {
            "==" => Some(FilterOp::Equal),
            "!=" => Some(FilterOp::NotEqual),
            "<" => Some(FilterOp::LessThan),
            "<=" => Some(FilterOp::LessThanOrEqual),
            ">" => Some(FilterOp::GreaterThan),
            ">=" => Some(FilterOp::GreaterThanOrEqual),
            _ => None,
        }
    }
}

/// A filter comparing one field against a constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldFilter {
    /// Field to compare.
    pub field: FieldPath,
    /// Comparison operator.
    pub op: FilterOp,
    /// Constant operand.
    pub value: Value,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

/// One ordering clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Field to order by.
    pub field: FieldPath,
    /// Direction.
    pub direction: Direction,
}

/// A query over the documents of one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredQuery {
    /// Id of the queried collection under the request's parent.
    pub collection_id: String,
    /// Conjunction of field filters.
    pub filters: Vec<FieldFilter>,
    /// Ordering clauses, applied in sequence.
    pub order_by: Vec<Order>,
    /// Maximum number of results.
    pub limit: Option<u32>,
}

impl StructuredQuery {
    /// Creates an unfiltered query over a collection.
    pub fn new(collection_id: impl Into<String>) -> Self {
        Self {
            collection_id: collection_id.into(),
            filters: Vec::new(),
            order_by: Vec::new(),
            limit: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_operators() {
        assert_eq!(FilterOp::parse("=="), Some(FilterOp::Equal));
        assert_eq!(FilterOp::parse(">="), Some(FilterOp::GreaterThanOrEqual));
        assert_eq!(FilterOp::parse("=~"), None);
    }
}
