//! Filter evaluation against in-memory records.
//!
//! Field names are dotted paths. Comparison follows the document-database conventions the
//! MongoDB backend exposes: numbers compare across integer and float types, equality on an
//! array field matches any element, and `Ne` / `NoneOf` match records lacking the field.

use bson::{Bson, Document, datetime::DateTime};
use std::cmp::Ordering;

use docmodel_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, FieldOp, QueryVisitor},
};

/// Resolves a dotted path inside a record.
pub(crate) fn lookup<'a>(record: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = record.get(segments.next()?)?;

    for segment in segments {
        current = current.as_document()?.get(segment)?;
    }

    Some(current)
}

/// Numeric view of a value, for sums and increments.
pub(crate) fn numeric(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(v) => Some(*v as f64),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    }
}

/// A value normalized for comparison; all numbers become `f64`.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    /// Compared by plain BSON equality (documents, object ids, binary, ...).
    Other(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(items) => Comparable::Array(items.iter().map(Comparable::from).collect()),
            other => match numeric(other) {
                Some(number) => Comparable::Number(number),
                None => Comparable::Other(other),
            },
        }
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Other(a), Comparable::Other(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Comparable<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::Other(Bson::ObjectId(a)), Comparable::Other(Bson::ObjectId(b))) => {
                a.partial_cmp(b)
            }
            _ => None,
        }
    }
}

/// Orders two optional values for sorting; missing and incomparable values sort first.
pub(crate) fn compare(left: Option<&Bson>, right: Option<&Bson>) -> Ordering {
    let left = left.map(Comparable::from).unwrap_or(Comparable::Null);
    let right = right.map(Comparable::from).unwrap_or(Comparable::Null);

    match (&left, &right) {
        (Comparable::Null, Comparable::Null) => Ordering::Equal,
        (Comparable::Null, _) => Ordering::Less,
        (_, Comparable::Null) => Ordering::Greater,
        _ => left.partial_cmp(&right).unwrap_or(Ordering::Equal),
    }
}

pub(crate) struct RecordEvaluator<'a> {
    record: &'a Document,
}

impl<'a> RecordEvaluator<'a> {
    pub fn new(record: &'a Document) -> Self {
        Self { record }
    }

    /// Returns whether `record` satisfies `filter`; no filter matches everything.
    pub fn matches(record: &'a Document, filter: Option<&Expr>) -> DocumentStoreResult<bool> {
        match filter {
            Some(expr) => RecordEvaluator::new(record).visit_expr(expr),
            None => Ok(true),
        }
    }

    fn equals(field_value: &Bson, value: &Bson) -> bool {
        let expected = Comparable::from(value);

        match Comparable::from(field_value) {
            Comparable::Array(items) => {
                items.iter().any(|item| item == &expected) || Comparable::from(field_value) == expected
            }
            actual => actual == expected,
        }
    }

    fn any_of(field_value: Option<&Bson>, values: &Bson) -> DocumentStoreResult<bool> {
        let candidates = match values {
            Bson::Array(items) => items,
            other => {
                return Err(DocumentStoreError::InvalidOptions(format!(
                    "AnyOf/NoneOf expects an array, got {:?}",
                    other.element_type()
                )));
            }
        };

        Ok(match field_value {
            Some(field_value) => candidates
                .iter()
                .any(|candidate| Self::equals(field_value, candidate)),
            None => candidates.iter().any(|candidate| candidate == &Bson::Null),
        })
    }
}

impl QueryVisitor for RecordEvaluator<'_> {
    type Output = bool;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_expr(expr)?)
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(lookup(self.record, field).is_some() == should_exist)
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let field_value = lookup(self.record, field);

        match op {
            FieldOp::Eq => Ok(match field_value {
                Some(field_value) => Self::equals(field_value, value),
                None => value == &Bson::Null,
            }),
            FieldOp::Ne => Ok(match field_value {
                Some(field_value) => !Self::equals(field_value, value),
                None => value != &Bson::Null,
            }),
            FieldOp::Gt | FieldOp::Gte | FieldOp::Lt | FieldOp::Lte => {
                let Some(field_value) = field_value else {
                    return Ok(false);
                };

                Ok(match Comparable::from(field_value).partial_cmp(&Comparable::from(value)) {
                    Some(ordering) => match op {
                        FieldOp::Gt => ordering == Ordering::Greater,
                        FieldOp::Gte => ordering != Ordering::Less,
                        FieldOp::Lt => ordering == Ordering::Less,
                        _ => ordering != Ordering::Greater,
                    },
                    None => false,
                })
            }
            FieldOp::Contains => Ok(match (field_value, value) {
                (Some(Bson::String(haystack)), Bson::String(needle)) => haystack.contains(needle.as_str()),
                (Some(Bson::Array(items)), _) => {
                    let expected = Comparable::from(value);
                    items.iter().any(|item| Comparable::from(item) == expected)
                }
                _ => false,
            }),
            FieldOp::StartsWith => Ok(match (field_value, value) {
                (Some(Bson::String(text)), Bson::String(prefix)) => text.starts_with(prefix.as_str()),
                _ => false,
            }),
            FieldOp::AnyOf => Self::any_of(field_value, value),
            FieldOp::NoneOf => Ok(!Self::any_of(field_value, value)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{doc, oid::ObjectId};
    use docmodel_core::query::Filter;

    fn matches(record: &Document, expr: Expr) -> bool {
        RecordEvaluator::matches(record, Some(&expr)).unwrap()
    }

    #[test]
    fn test_lookup_dotted_path() {
        let record = doc! { "address": { "city": "Oslo" } };

        assert_eq!(lookup(&record, "address.city"), Some(&Bson::String("Oslo".into())));
        assert_eq!(lookup(&record, "address.zip"), None);
        assert_eq!(lookup(&record, "address.city.name"), None);
    }

    #[test]
    fn test_numbers_compare_across_types() {
        let record = doc! { "age": 30_i32, "score": 2.5 };

        assert!(matches(&record, Filter::eq("age", 30_i64)));
        assert!(matches(&record, Filter::gte("age", 30.0)));
        assert!(matches(&record, Filter::lt("score", 3)));
        assert!(!matches(&record, Filter::gt("age", "29")));
    }

    #[test]
    fn test_object_ids_compare_by_value() {
        let id = ObjectId::new();
        let record = doc! { "_id": id };

        assert!(matches(&record, Filter::eq("_id", id)));
        assert!(!matches(&record, Filter::eq("_id", ObjectId::new())));
    }

    #[test]
    fn test_missing_fields() {
        let record = doc! { "name": "a" };

        assert!(matches(&record, Filter::ne("age", 3)));
        assert!(matches(&record, Filter::eq("age", Bson::Null)));
        assert!(matches(&record, Filter::not_exists("age")));
        assert!(matches(&record, Filter::none_of("age", vec![1, 2])));
        assert!(!matches(&record, Filter::gt("age", 3)));
    }

    #[test]
    fn test_arrays_and_strings() {
        let record = doc! { "tags": ["rust", "db"], "title": "Hello world" };

        assert!(matches(&record, Filter::eq("tags", "db")));
        assert!(matches(&record, Filter::contains("tags", "rust")));
        assert!(matches(&record, Filter::contains("title", "lo wo")));
        assert!(matches(&record, Filter::starts_with("title", "Hell")));
        assert!(matches(&record, Filter::any_of("tags", vec!["go", "db"])));
        assert!(!matches(&record, Filter::any_of("tags", vec!["go"])));
    }

    #[test]
    fn test_logical_operators() {
        let record = doc! { "a": 1, "b": 2 };

        assert!(matches(&record, Filter::eq("a", 1).and(Filter::eq("b", 2))));
        assert!(matches(&record, Filter::eq("a", 9).or(Filter::eq("b", 2))));
        assert!(matches(&record, Filter::eq("a", 9).not()));
    }

    #[test]
    fn test_any_of_requires_array() {
        let record = doc! { "a": 1 };

        assert!(RecordEvaluator::matches(&record, Some(&Filter::any_of("a", 1))).is_err());
    }

    #[test]
    fn test_compare_missing_sorts_first() {
        let a = Bson::Int32(1);
        let b = Bson::Int32(2);

        assert_eq!(compare(None, Some(&a)), Ordering::Less);
        assert_eq!(compare(Some(&a), Some(&b)), Ordering::Less);
        assert_eq!(compare(Some(&b), None), Ordering::Greater);
    }
}
