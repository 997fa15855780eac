//! Query document evaluation for in-memory document filtering.
//!
//! This module interprets the query documents produced by the condition compiler against
//! stored BSON documents: field keys map to a literal or an operator document, and `$and` /
//! `$or` map to arrays of nested query documents.

use std::{cmp::Ordering, collections::HashMap};

use bson::{Bson, DateTime, Document};
use regex::RegexBuilder;

use docmap_core::error::{StoreError, StoreResult};

/// Type-erased, comparable representation of BSON values.
///
/// Int32 and Int64 are normalized to i64 and compare exactly. A comparison involving a Double
/// is made in f64.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    DateTime(DateTime),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
    /// Values without a meaningful comparison, e.g. binary data.
    Opaque(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Int(i64::from(*value)),
            Bson::Int64(value) => Comparable::Int(*value),
            Bson::Double(value) => Comparable::Double(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(array) => Comparable::Array(array.iter().map(Comparable::from).collect()),
            Bson::Document(document) => Comparable::Map(
                document
                    .iter()
                    .map(|(key, value)| (key.as_str(), Comparable::from(value)))
                    .collect(),
            ),
            other => Comparable::Opaque(other),
        }
    }
}

impl Comparable<'_> {
    fn as_f64(&self) -> Option<f64> {
        match self {
            Comparable::Int(value) => Some(*value as f64),
            Comparable::Double(value) => Some(*value),
            _ => None,
        }
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Int(a), Comparable::Int(b)) => a == b,
            (Comparable::Int(_) | Comparable::Double(_), Comparable::Int(_) | Comparable::Double(_)) => {
                self.as_f64() == other.as_f64()
            }
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            (Comparable::Opaque(a), Comparable::Opaque(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Comparable<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Int(a), Comparable::Int(b)) => a.partial_cmp(b),
            (Comparable::Int(_) | Comparable::Double(_), Comparable::Int(_) | Comparable::Double(_)) => {
                self.as_f64()?.partial_cmp(&other.as_f64()?)
            }
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Resolves a dotted field path such as `address.city`.
pub(crate) fn resolve<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = current.as_document()?.get(segment)?;
    }

    Some(current)
}

fn invalid(message: impl Into<String>) -> StoreError {
    StoreError::InvalidDocument(message.into())
}

/// Matches one stored document against query documents.
pub struct QueryEvaluator<'a> {
    document: &'a Document,
}

impl<'a> QueryEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Returns whether the document satisfies every key of `query`.
    pub fn matches(&self, query: &Document) -> StoreResult<bool> {
        for (key, condition) in query {
            let matched = match key.as_str() {
                "$and" | "$or" => self.matches_logical(key, condition)?,
                key if key.starts_with('$') => {
                    return Err(invalid(format!("unsupported top-level operator {key}")));
                }
                path => self.matches_field(path, condition)?,
            };

            if !matched {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Returns the documents of `documents` matching `query`, in order.
    pub fn filter_documents<'d>(
        documents: impl IntoIterator<Item = &'d Document>,
        query: &Document,
    ) -> StoreResult<Vec<&'d Document>> {
        let mut matched = Vec::new();

        for document in documents {
            if QueryEvaluator::new(document).matches(query)? {
                matched.push(document);
            }
        }

        Ok(matched)
    }

    fn matches_logical(&self, key: &str, condition: &Bson) -> StoreResult<bool> {
        match condition {
            Bson::Array(queries) => {
                for query in queries {
                    let query = query
                        .as_document()
                        .ok_or_else(|| invalid(format!("{key} expects an array of documents")))?;
                    let matched = self.matches(query)?;

                    match (key, matched) {
                        ("$and", false) => return Ok(false),
                        ("$or", true) => return Ok(true),
                        _ => {}
                    }
                }

                Ok(key == "$and")
            }
            // negation of a whole logical clause, `{"$and": {"$not": [..]}}`
            Bson::Document(negated) if negated.len() == 1 => match negated.get("$not") {
                Some(inner) => Ok(!self.matches_logical(key, inner)?),
                None => Err(invalid(format!("{key} expects an array of documents"))),
            },
            _ => Err(invalid(format!("{key} expects an array of documents"))),
        }
    }

    fn matches_field(&self, path: &str, condition: &Bson) -> StoreResult<bool> {
        let value = resolve(self.document, path);

        match condition {
            Bson::Document(operators) if operators.keys().all(|key| key.starts_with('$')) => {
                self.matches_operators(value, operators)
            }
            literal => Ok(Self::equals(value, literal)),
        }
    }

    fn matches_operators(&self, value: Option<&Bson>, operators: &Document) -> StoreResult<bool> {
        for (operator, operand) in operators {
            let matched = match operator.as_str() {
                "$eq" => Self::equals(value, operand),
                "$ne" => !Self::equals(value, operand),
                "$gt" => Self::compare(value, operand) == Some(Ordering::Greater),
                "$gte" => matches!(
                    Self::compare(value, operand),
                    Some(Ordering::Greater | Ordering::Equal)
                ),
                "$lt" => Self::compare(value, operand) == Some(Ordering::Less),
                "$lte" => matches!(
                    Self::compare(value, operand),
                    Some(Ordering::Less | Ordering::Equal)
                ),
                "$exists" => value.is_some() == Self::truthy(operand),
                "$regex" => {
                    let options = operators.get_str("$options").unwrap_or_default();
                    Self::matches_regex(value, operand, options)?
                }
                "$options" => true,
                "$not" => match operand {
                    Bson::Document(inner) => !self.matches_operators(value, inner)?,
                    Bson::RegularExpression(_) => !Self::matches_regex(value, operand, "")?,
                    _ => return Err(invalid("$not expects an operator document")),
                },
                other => return Err(invalid(format!("unsupported query operator {other}"))),
            };

            if !matched {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn equals(value: Option<&Bson>, operand: &Bson) -> bool {
        let expected = Comparable::from(operand);

        match value {
            None => expected == Comparable::Null,
            Some(Bson::Array(items)) if !matches!(operand, Bson::Array(_)) => {
                items.iter().any(|item| Comparable::from(item) == expected)
            }
            Some(value) => Comparable::from(value) == expected,
        }
    }

    fn compare(value: Option<&Bson>, operand: &Bson) -> Option<Ordering> {
        Comparable::from(value?).partial_cmp(&Comparable::from(operand))
    }

    fn truthy(operand: &Bson) -> bool {
        match operand {
            Bson::Boolean(value) => *value,
            Bson::Int32(value) => *value != 0,
            Bson::Int64(value) => *value != 0,
            Bson::Double(value) => *value != 0.0,
            Bson::Null => false,
            _ => true,
        }
    }

    fn matches_regex(value: Option<&Bson>, pattern: &Bson, options: &str) -> StoreResult<bool> {
        let (pattern, options) = match pattern {
            Bson::String(pattern) => (pattern.as_str(), options),
            Bson::RegularExpression(regex) => (regex.pattern.as_str(), regex.options.as_str()),
            _ => return Err(invalid("$regex expects a string pattern")),
        };

        let regex = RegexBuilder::new(pattern)
            .case_insensitive(options.contains('i'))
            .multi_line(options.contains('m'))
            .build()
            .map_err(|err| invalid(format!("invalid pattern {pattern}: {err}")))?;

        Ok(match value {
            Some(Bson::String(text)) => regex.is_match(text),
            Some(Bson::Array(items)) => items
                .iter()
                .filter_map(Bson::as_str)
                .any(|text| regex.is_match(text)),
            _ => false,
        })
    }
}
