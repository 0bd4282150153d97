//! # Query Vocabulary
//!
//! A deliberately small query language shared by every document store
//! adapter: equality and range filters on top-level fields, one sort key,
//! a limit, and a start-after cursor.
//!
//! ## Cursor Semantics
//! ```text
//!   ORDER BY date DESC, id DESC
//!
//!   ┌──────────────┬────────┐
//!   │ date         │ id     │
//!   ├──────────────┼────────┤
//!   │ 1710000300   │ c      │
//!   │ 1710000200   │ b      │
//!   │ 1710000200   │ a      │ ◄── last item of page 1 → Cursor { value, id: "a" }
//!   ├──────────────┼────────┤
//!   │ 1710000100   │ z      │ ◄── page 2 starts strictly after the cursor
//!   └──────────────┴────────┘
//! ```
//!
//! Ties on the sort field are broken by document id in the same direction,
//! so a cursor identifies one exact position even when many sales share a
//! date.
//!
//! ## Value Ordering
//! Field values compare the way SQLite compares `json_extract` results:
//! null never compares (filters and cursors exclude it, sorting puts it
//! first), numbers and booleans compare numerically and sort before text,
//! text compares bytewise.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

use crate::error::{CoreError, CoreResult, ValidationError};

// =============================================================================
// Collection
// =============================================================================

/// The five collections of the document store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Sales,
    Villages,
    Pricing,
    Customers,
    Notes,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Sales,
        Collection::Villages,
        Collection::Pricing,
        Collection::Customers,
        Collection::Notes,
    ];

    /// Name of the collection in the store.
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Sales => "sales",
            Collection::Villages => "villages",
            Collection::Pricing => "pricing",
            Collection::Customers => "customers",
            Collection::Notes => "notes",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_str() == name)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Filters & Ordering
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    Eq,
    Gte,
    Lte,
}

impl FilterOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Gte => ">=",
            FilterOp::Lte => "<=",
        }
    }
}

/// A predicate on one top-level document field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Filter {
            field: field.to_string(),
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    pub fn gte(field: &str, value: impl Into<Value>) -> Self {
        Filter {
            field: field.to_string(),
            op: FilterOp::Gte,
            value: value.into(),
        }
    }

    pub fn lte(field: &str, value: impl Into<Value>) -> Self {
        Filter {
            field: field.to_string(),
            op: FilterOp::Lte,
            value: value.into(),
        }
    }

    /// Evaluates the predicate against a document body.
    pub fn matches(&self, data: &Value) -> bool {
        let Some(ord) = compare_values(field_value(data, &self.field), &self.value) else {
            return false;
        };
        match self.op {
            FilterOp::Eq => ord == Ordering::Equal,
            FilterOp::Gte => ord != Ordering::Less,
            FilterOp::Lte => ord != Ordering::Greater,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn asc(field: &str) -> Self {
        OrderBy {
            field: field.to_string(),
            direction: Direction::Ascending,
        }
    }

    pub fn desc(field: &str) -> Self {
        OrderBy {
            field: field.to_string(),
            direction: Direction::Descending,
        }
    }
}

// =============================================================================
// Cursor
// =============================================================================

/// Position of the last item of a page under some ordering.
///
/// Opaque to callers: hand it back to fetch the next page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    pub value: Value,
    pub id: String,
}

impl Cursor {
    /// Cursor positioned at `doc` under `order`.
    pub fn at(doc: &Document, order: &OrderBy) -> Self {
        Cursor {
            value: field_value(&doc.data, &order.field).clone(),
            id: doc.id.clone(),
        }
    }

    /// Whether a document sits strictly after this cursor under `order`.
    pub fn precedes(&self, doc: &Document, order: &OrderBy) -> bool {
        let Some(ord) = compare_values(field_value(&doc.data, &order.field), &self.value) else {
            return false;
        };
        let ord = ord.then_with(|| doc.id.as_str().cmp(self.id.as_str()));
        match order.direction {
            Direction::Ascending => ord == Ordering::Greater,
            Direction::Descending => ord == Ordering::Less,
        }
    }
}

// =============================================================================
// Document Query
// =============================================================================

/// A query against one collection.
///
/// ## Example
/// ```rust
/// use goldtea_core::query::{DocumentQuery, Filter, OrderBy};
///
/// let query = DocumentQuery::new()
///     .filter(Filter::gte("date", 1_700_000_000_000_i64))
///     .order_by(OrderBy::desc("date"))
///     .limit(50);
/// assert!(query.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentQuery {
    pub filters: Vec<Filter>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
    pub start_after: Option<Cursor>,
}

impl DocumentQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn filters(mut self, filters: impl IntoIterator<Item = Filter>) -> Self {
        self.filters.extend(filters);
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by = Some(order);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn start_after(mut self, cursor: Option<Cursor>) -> Self {
        self.start_after = cursor;
        self
    }

    /// Rejects field names that could not be safely embedded in a JSON path.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for filter in &self.filters {
            validate_field_name(&filter.field)?;
        }
        if let Some(order) = &self.order_by {
            validate_field_name(&order.field)?;
        }
        Ok(())
    }

    /// Sort comparator implementing `ORDER BY field <dir>, id <dir>`.
    ///
    /// Without an explicit order, documents sort by id ascending.
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        match &self.order_by {
            None => a.id.cmp(&b.id),
            Some(order) => {
                let ord = sort_values(
                    field_value(&a.data, &order.field),
                    field_value(&b.data, &order.field),
                )
                .then_with(|| a.id.cmp(&b.id));
                match order.direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            }
        }
    }
}

/// Field names are restricted to `[A-Za-z0-9_]`.
pub fn validate_field_name(field: &str) -> Result<(), ValidationError> {
    if field.is_empty() || !field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ValidationError::InvalidFormat {
            field: "field".to_string(),
            reason: format!("'{}' must match [A-Za-z0-9_]+", field),
        });
    }
    Ok(())
}

// =============================================================================
// Document
// =============================================================================

/// A stored document: its store-assigned id plus a JSON body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

impl Document {
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Document {
            id: id.into(),
            data,
        }
    }

    /// Serializes a record into a document body.
    pub fn from_record<T: Serialize>(id: impl Into<String>, record: &T) -> CoreResult<Self> {
        let id = id.into();
        let data = serde_json::to_value(record).map_err(|e| CoreError::MalformedDocument {
            entity: std::any::type_name::<T>().to_string(),
            id: id.clone(),
            reason: e.to_string(),
        })?;
        Ok(Document { id, data })
    }

    /// Parses the body into a record.
    pub fn decode<T: DeserializeOwned>(&self) -> CoreResult<T> {
        serde_json::from_value(self.data.clone()).map_err(|e| CoreError::MalformedDocument {
            entity: std::any::type_name::<T>().to_string(),
            id: self.id.clone(),
            reason: e.to_string(),
        })
    }

    pub fn field(&self, name: &str) -> &Value {
        field_value(&self.data, name)
    }
}

// =============================================================================
// Value Comparison
// =============================================================================

fn field_value<'a>(data: &'a Value, field: &str) -> &'a Value {
    data.get(field).unwrap_or(&Value::Null)
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) | Value::Number(_) => 1,
        _ => 2,
    }
}

fn as_number(value: &Value) -> f64 {
    match value {
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Total order used for sorting; null sorts first.
fn sort_values(a: &Value, b: &Value) -> Ordering {
    type_rank(a).cmp(&type_rank(b)).then_with(|| match type_rank(a) {
        0 => Ordering::Equal,
        1 => as_number(a).total_cmp(&as_number(b)),
        _ => as_text(a).cmp(&as_text(b)),
    })
}

/// Comparison used by filters and cursors; `None` when either side is null.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    if a.is_null() || b.is_null() {
        return None;
    }
    Some(sort_values(a, b))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_collection_names_round_trip() {
        for c in Collection::ALL {
            assert_eq!(Collection::parse(c.as_str()), Some(c));
        }
        assert_eq!(Collection::parse("products"), None);
    }

    #[test]
    fn test_filter_matching() {
        let doc = json!({ "name": "Rampur", "date": 200 });
        assert!(Filter::eq("name", "Rampur").matches(&doc));
        assert!(!Filter::eq("name", "rampur").matches(&doc));
        assert!(Filter::gte("date", 200).matches(&doc));
        assert!(Filter::lte("date", 250).matches(&doc));
        assert!(!Filter::gte("date", 201).matches(&doc));
        // Missing fields never match
        assert!(!Filter::eq("day", "Monday").matches(&doc));
    }

    #[test]
    fn test_numbers_sort_before_text() {
        assert_eq!(sort_values(&json!(5), &json!("1")), Ordering::Less);
        assert_eq!(sort_values(&Value::Null, &json!(0)), Ordering::Less);
        assert_eq!(compare_values(&Value::Null, &json!(0)), None);
    }

    #[test]
    fn test_cursor_breaks_ties_by_id() {
        let order = OrderBy::desc("date");
        let last = Document::new("b", json!({ "date": 100 }));
        let cursor = Cursor::at(&last, &order);

        assert!(cursor.precedes(&Document::new("a", json!({ "date": 100 })), &order));
        assert!(!cursor.precedes(&Document::new("c", json!({ "date": 100 })), &order));
        assert!(cursor.precedes(&Document::new("z", json!({ "date": 99 })), &order));
        assert!(!cursor.precedes(&Document::new("z", json!({ "date": 101 })), &order));
    }

    #[test]
    fn test_query_compare_descending() {
        let query = DocumentQuery::new().order_by(OrderBy::desc("date"));
        let mut docs = vec![
            Document::new("a", json!({ "date": 1 })),
            Document::new("b", json!({ "date": 3 })),
            Document::new("c", json!({ "date": 3 })),
        ];
        docs.sort_by(|a, b| query.compare(a, b));
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_rejects_unsafe_field_names() {
        let query = DocumentQuery::new().filter(Filter::eq("name') OR 1=1 --", "x"));
        assert!(query.validate().is_err());
        assert!(validate_field_name("customer_name").is_ok());
        assert!(validate_field_name("").is_err());
    }

    #[test]
    fn test_decode_reports_malformed_document() {
        let doc = Document::new("v1", json!({ "day": 3 }));
        let result: CoreResult<crate::types::Village> = doc.decode();
        assert!(matches!(result, Err(CoreError::MalformedDocument { .. })));
    }
}
