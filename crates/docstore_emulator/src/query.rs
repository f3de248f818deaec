//! Structured query evaluation.

use crate::store::{DocumentStore, StoredDocument};
use docstore_protocol::{
    field_value, Direction, FieldFilter, FilterOp, ResourcePath, StructuredQuery, Value,
};
use std::cmp::Ordering;

/// Returns the documents of `parent/collection_id` matching `query`, in
/// query order. Ties (and unordered queries) fall back to path order.
pub(crate) fn run_query<'a>(
    store: &'a DocumentStore,
    parent: &ResourcePath,
    query: &StructuredQuery,
) -> Vec<(&'a ResourcePath, &'a StoredDocument)> {
    let collection = parent.child(query.collection_id.clone());
    let mut results: Vec<_> = store
        .children(&collection)
        .filter(|(_, doc)| query.filters.iter().all(|f| matches(f, doc)))
        // Documents missing an ordered field are excluded
        .filter(|(_, doc)| {
            query
                .order_by
                .iter()
                .all(|o| field_value(&doc.fields, &o.field).is_some())
        })
        .collect();

    results.sort_by(|(a_path, a), (b_path, b)| {
        for order in &query.order_by {
            let ordering = match (
                field_value(&a.fields, &order.field),
                field_value(&b.fields, &order.field),
            ) {
                (Some(x), Some(y)) => total_order(x, y),
                _ => Ordering::Equal,
            };
            let ordering = match order.direction {
                Direction::Ascending => ordering,
                Direction::Descending => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        a_path.cmp(b_path)
    });

    if let Some(limit) = query.limit {
        results.truncate(limit as usize);
    }
    results
}

fn matches(filter: &FieldFilter, doc: &StoredDocument) -> bool {
    let Some(value) = field_value(&doc.fields, &filter.field) else {
        return false;
    };
    let ordering = compare_values(value, &filter.value);
    match filter.op {
        FilterOp::Equal => ordering == Some(Ordering::Equal),
        FilterOp::NotEqual => ordering != Some(Ordering::Equal),
        FilterOp::LessThan => ordering == Some(Ordering::Less),
        FilterOp::LessThanOrEqual => {
            matches!(ordering, Some(Ordering::Less | Ordering::Equal))
        }
        FilterOp::GreaterThan => ordering == Some(Ordering::Greater),
        FilterOp::GreaterThanOrEqual => {
            matches!(ordering, Some(Ordering::Greater | Ordering::Equal))
        }
    }
}

/// Compares two values of the same type. Values of different types (and
/// objects, which only compare for equality) yield `None`.
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Array(x), Value::Array(y)) => {
            for (l, r) in x.iter().zip(y) {
                match compare_values(l, r)? {
                    Ordering::Equal => continue,
                    other => return Some(other),
                }
            }
            Some(x.len().cmp(&y.len()))
        }
        (Value::Object(_), Value::Object(_)) => (a == b).then_some(Ordering::Equal),
        _ => None,
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn total_order(a: &Value, b: &Value) -> Ordering {
    type_rank(a)
        .cmp(&type_rank(b))
        .then_with(|| compare_values(a, b).unwrap_or(Ordering::Equal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use docstore_protocol::{FieldPath, Order};
    use serde_json::json;

    fn store() -> DocumentStore {
        let mut store = DocumentStore::new();
        for (id, age, name) in [("a", 30, "ann"), ("b", 20, "bob"), ("c", 40, "cid")] {
            store.put(
                ResourcePath::parse_document(&format!("users/{id}")).unwrap(),
                json!({"age": age, "name": name}).as_object().cloned().unwrap(),
            );
        }
        store.put(
            ResourcePath::parse_document("users/d").unwrap(),
            json!({"name": "dee"}).as_object().cloned().unwrap(),
        );
        store
    }

    fn ids(results: &[(&ResourcePath, &StoredDocument)]) -> Vec<String> {
        results
            .iter()
            .map(|(p, _)| p.last_segment().unwrap_or_default().to_string())
            .collect()
    }

    fn filter(field: &str, op: FilterOp, value: Value) -> FieldFilter {
        FieldFilter {
            field: FieldPath::parse(field).unwrap(),
            op,
            value,
        }
    }

    #[test]
    fn unfiltered_query_returns_collection_in_path_order() {
        let store = store();
        let results = run_query(&store, &ResourcePath::root(), &StructuredQuery::new("users"));
        assert_eq!(ids(&results), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn filters_skip_missing_fields() {
        let store = store();
        let mut query = StructuredQuery::new("users");
        query.filters.push(filter("age", FilterOp::NotEqual, json!(30)));
        let results = run_query(&store, &ResourcePath::root(), &query);
        assert_eq!(ids(&results), vec!["b", "c"]);
    }

    #[test]
    fn range_filter_order_and_limit() {
        let store = store();
        let mut query = StructuredQuery::new("users");
        query
            .filters
            .push(filter("age", FilterOp::GreaterThanOrEqual, json!(25)));
        query.order_by.push(Order {
            field: FieldPath::parse("age").unwrap(),
            direction: Direction::Descending,
        });
        query.limit = Some(1);

        let results = run_query(&store, &ResourcePath::root(), &query);
        assert_eq!(ids(&results), vec!["c"]);
    }

    #[test]
    fn mixed_types_do_not_match_ranges() {
        assert_eq!(compare_values(&json!(1), &json!("1")), None);
        assert_eq!(compare_values(&json!(1), &json!(1.0)), Some(Ordering::Equal));
        assert_eq!(total_order(&json!(null), &json!(false)), Ordering::Less);
    }
}
