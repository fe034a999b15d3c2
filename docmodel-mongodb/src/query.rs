//! Query translation from docmodel filters to MongoDB query syntax.
//!
//! This module translates docmodel's filter expressions into MongoDB BSON documents for
//! execution by the MongoDB query engine.

use bson::{Bson, Document, doc};

use docmodel_core::{
    error::DocumentStoreError,
    query::{Expr, FieldOp, QueryVisitor},
};

/// Translates docmodel filter expressions into MongoDB query documents.
///
/// This struct implements the [`QueryVisitor`] trait to convert abstract
/// query expressions into MongoDB's native BSON query syntax.
pub(crate) struct MongoQueryTranslator;

impl MongoQueryTranslator {
    /// Translates an optional filter; no filter matches every document.
    pub(crate) fn translate(filter: Option<&Expr>) -> Result<Document, DocumentStoreError> {
        match filter {
            Some(expr) => MongoQueryTranslator.visit_expr(expr),
            None => Ok(Document::new()),
        }
    }
}

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$and": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$or": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        // $not only applies to operator expressions, $nor negates whole filters
        Ok(doc! {
            "$nor": [self.visit_expr(expr)?],
        })
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: { "$exists": should_exist },
        })
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: match op {
                FieldOp::Eq => doc! { "$eq": value },
                FieldOp::Ne => doc! { "$ne": value },
                FieldOp::Gt => doc! { "$gt": value },
                FieldOp::Gte => doc! { "$gte": value },
                FieldOp::Lt => doc! { "$lt": value },
                FieldOp::Lte => doc! { "$lte": value },
                FieldOp::Contains => match value {
                    Bson::String(s) => doc! { "$regex": regex::escape(s) },
                    other => doc! { "$elemMatch": { "$eq": other } },
                },
                FieldOp::StartsWith => match value {
                    Bson::String(s) => doc! { "$regex": format!("^{}", regex::escape(s)) },
                    _ => return Err(DocumentStoreError::InvalidOptions("StartsWith operator requires a string value".to_string())),
                },
                FieldOp::AnyOf | FieldOp::NoneOf => {
                    if !matches!(value, Bson::Array(_)) {
                        return Err(DocumentStoreError::InvalidOptions("AnyOf/NoneOf operators require an array value".to_string()));
                    }
                    match op {
                        FieldOp::AnyOf => doc! { "$in": value },
                        _ => doc! { "$nin": value },
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docmodel_core::query::Filter;

    fn translate(expr: Expr) -> Document {
        MongoQueryTranslator::translate(Some(&expr)).unwrap()
    }

    #[test]
    fn test_no_filter_matches_all() {
        assert_eq!(MongoQueryTranslator::translate(None).unwrap(), Document::new());
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(translate(Filter::eq("name", "a")), doc! { "name": { "$eq": "a" } });
        assert_eq!(translate(Filter::gte("age", 18)), doc! { "age": { "$gte": 18 } });
        assert_eq!(translate(Filter::exists("email")), doc! { "email": { "$exists": true } });
    }

    #[test]
    fn test_logical_operators() {
        assert_eq!(
            translate(Filter::eq("a", 1).and(Filter::eq("b", 2))),
            doc! { "$and": [{ "a": { "$eq": 1 } }, { "b": { "$eq": 2 } }] }
        );
        assert_eq!(
            translate(Filter::eq("a", 1).not()),
            doc! { "$nor": [{ "a": { "$eq": 1 } }] }
        );
    }

    #[test]
    fn test_string_operators_escape_input() {
        assert_eq!(
            translate(Filter::contains("title", "a.b")),
            doc! { "title": { "$regex": "a\\.b" } }
        );
        assert_eq!(
            translate(Filter::starts_with("title", "(x")),
            doc! { "title": { "$regex": "^\\(x" } }
        );
        assert_eq!(
            translate(Filter::contains("tags", 3)),
            doc! { "tags": { "$elemMatch": { "$eq": 3 } } }
        );
    }

    #[test]
    fn test_set_membership() {
        assert_eq!(
            translate(Filter::any_of("role", vec!["admin", "owner"])),
            doc! { "role": { "$in": ["admin", "owner"] } }
        );
        assert_eq!(
            translate(Filter::none_of("role", vec!["guest"])),
            doc! { "role": { "$nin": ["guest"] } }
        );
        assert!(MongoQueryTranslator::translate(Some(&Filter::any_of("role", "admin"))).is_err());
    }
}
