//! Field filter expressions and queries
//!
//! Filters are plain data so a document-store client can translate them to
//! its native query form; [`Filter::matches`] evaluates them against a JSON
//! document for stores that filter in process.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

use crate::index::Direction;
use crate::record::fields;

/// Filter operator for field comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    /// Equal to
    Eq,
    /// Not equal to
    Ne,
    /// Greater than
    Gt,
    /// Less than
    Lt,
    /// Greater than or equal
    Gte,
    /// Less than or equal
    Lte,
    /// Contains substring (strings) or element (arrays)
    Contains,
    /// In list of values
    In,
    /// Field presence (value is a bool)
    Exists,
    /// Matches regular expression
    Regex,
}

/// A single field comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterExpr {
    /// Field to filter on; dots descend into nested objects
    pub field: String,
    /// Operator to apply
    pub operator: FilterOperator,
    /// Value to compare against
    pub value: Value,
}

impl FilterExpr {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    /// Evaluate against a document.
    pub fn matches(&self, doc: &Value) -> bool {
        let found = lookup(doc, &self.field);
        let actual = found.unwrap_or(&Value::Null);
        match self.operator {
            FilterOperator::Exists => found.is_some() == self.value.as_bool().unwrap_or(true),
            FilterOperator::Eq => values_equal(actual, &self.value),
            FilterOperator::Ne => !values_equal(actual, &self.value),
            FilterOperator::Gt => compare(actual, &self.value) == Some(Ordering::Greater),
            FilterOperator::Lt => compare(actual, &self.value) == Some(Ordering::Less),
            FilterOperator::Gte => matches!(
                compare(actual, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FilterOperator::Lte => matches!(
                compare(actual, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            FilterOperator::Contains => match (actual, &self.value) {
                (Value::String(s), Value::String(needle)) => s.contains(needle.as_str()),
                (Value::Array(items), needle) => items.iter().any(|i| values_equal(i, needle)),
                _ => false,
            },
            FilterOperator::In => match &self.value {
                Value::Array(candidates) => candidates.iter().any(|c| values_equal(actual, c)),
                _ => false,
            },
            FilterOperator::Regex => match (actual, &self.value) {
                (Value::String(s), Value::String(pattern)) => {
                    Regex::new(pattern).map(|re| re.is_match(s)).unwrap_or(false)
                }
                _ => false,
            },
        }
    }
}

/// Boolean combination of field expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    Expr(FilterExpr),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn expr(field: impl Into<String>, operator: FilterOperator, value: impl Into<Value>) -> Self {
        Filter::Expr(FilterExpr::new(field, operator, value.into()))
    }

    /// Create an equality filter.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::expr(field, FilterOperator::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::expr(field, FilterOperator::Ne, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::expr(field, FilterOperator::Gt, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::expr(field, FilterOperator::Lt, value)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::expr(field, FilterOperator::Gte, value)
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::expr(field, FilterOperator::Lte, value)
    }

    /// Create a contains filter.
    pub fn contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::expr(field, FilterOperator::Contains, value)
    }

    pub fn is_in(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::expr(field, FilterOperator::In, Value::Array(values))
    }

    pub fn exists(field: impl Into<String>, present: bool) -> Self {
        Self::expr(field, FilterOperator::Exists, present)
    }

    pub fn regex(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::expr(field, FilterOperator::Regex, pattern.into())
    }

    /// Records whose identifier is `id`.
    pub fn id(id: uuid::Uuid) -> Self {
        Self::eq(fields::ID, id.to_string())
    }

    /// Records whose identifier is one of `ids`.
    pub fn ids(ids: &[uuid::Uuid]) -> Self {
        Self::is_in(
            fields::ID,
            ids.iter().map(|id| Value::String(id.to_string())).collect(),
        )
    }

    /// Records that have not been soft-deleted. A missing flag counts as
    /// not deleted.
    pub fn not_deleted() -> Self {
        Self::ne(fields::IS_DELETED, true)
    }

    /// Conjunction, flattening nested `And`s.
    pub fn and(self, other: Filter) -> Self {
        match (self, other) {
            (Filter::And(mut left), Filter::And(right)) => {
                left.extend(right);
                Filter::And(left)
            }
            (Filter::And(mut left), right) => {
                left.push(right);
                Filter::And(left)
            }
            (left, Filter::And(mut right)) => {
                right.insert(0, left);
                Filter::And(right)
            }
            (left, right) => Filter::And(vec![left, right]),
        }
    }

    pub fn or(self, other: Filter) -> Self {
        match self {
            Filter::Or(mut left) => {
                left.push(other);
                Filter::Or(left)
            }
            left => Filter::Or(vec![left, other]),
        }
    }

    pub fn negate(self) -> Self {
        Filter::Not(Box::new(self))
    }

    /// Evaluate against a document.
    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Filter::Expr(expr) => expr.matches(doc),
            Filter::And(filters) => filters.iter().all(|f| f.matches(doc)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(doc)),
            Filter::Not(inner) => !inner.matches(doc),
        }
    }
}

/// Conjoin an optional filter with a required one.
pub fn and_optional(filter: Option<Filter>, required: Filter) -> Filter {
    match filter {
        Some(f) => f.and(required),
        None => required,
    }
}

/// One sort key of a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    pub direction: Direction,
}

/// Filter, sort and paging over one collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub filter: Option<Filter>,
    pub sort: Vec<SortKey>,
    pub skip: usize,
    pub limit: Option<usize>,
}

impl Query {
    /// Every record in the collection.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn filtered(filter: Filter) -> Self {
        Self {
            filter: Some(filter),
            ..Default::default()
        }
    }

    /// Narrow the query with an additional conjunct.
    pub fn and_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(and_optional(self.filter.take(), filter));
        self
    }

    pub fn sort_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.sort.push(SortKey {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn take(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Apply the whole query to in-process documents.
    pub fn apply<'a, I>(&self, docs: I) -> Vec<Value>
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut matched: Vec<Value> = docs
            .into_iter()
            .filter(|doc| self.filter.as_ref().map_or(true, |f| f.matches(doc)))
            .cloned()
            .collect();

        if !self.sort.is_empty() {
            matched.sort_by(|a, b| {
                for key in &self.sort {
                    let left = lookup(a, &key.field).unwrap_or(&Value::Null);
                    let right = lookup(b, &key.field).unwrap_or(&Value::Null);
                    let ord = total_order(left, right);
                    let ord = match key.direction {
                        Direction::Ascending => ord,
                        Direction::Descending => ord.reverse(),
                    };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
        }

        let limit = self.limit.unwrap_or(usize::MAX);
        matched.into_iter().skip(self.skip).take(limit).collect()
    }
}

/// Resolve a dotted field path.
pub fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |current, segment| current.get(segment))
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn total_order(a: &Value, b: &Value) -> Ordering {
    compare(a, b).unwrap_or_else(|| type_rank(a).cmp(&type_rank(b)))
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// A filter and its negation never both match.
        #[test]
        fn prop_negation_is_complement(rank in -1000i64..1000, pivot in -1000i64..1000) {
            let doc = json!({ "rank": rank });
            let f = Filter::gt("rank", pivot);
            prop_assert_ne!(f.matches(&doc), f.clone().negate().matches(&doc));
        }

        /// Query paging never returns more than the limit.
        #[test]
        fn prop_query_respects_limit(count in 0usize..50, skip in 0usize..20, limit in 0usize..20) {
            let docs: Vec<Value> = (0..count).map(|i| json!({ "rank": i })).collect();
            let result = Query::all().skip(skip).take(limit).apply(&docs);
            prop_assert!(result.len() <= limit);
            prop_assert_eq!(result.len(), count.saturating_sub(skip).min(limit));
        }
    }
}
