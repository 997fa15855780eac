//! Filter condition trees.
//!
//! A [`Condition`] is an immutable boolean expression over document attributes. Trees are
//! usually produced by [`parse_filter`](crate::filter::parse_filter) from a filter string,
//! built with the helper constructors, or decoded from a structured document with
//! [`Condition::from_document`]. The [`ConditionVisitor`] trait is the seam used to interpret
//! a tree, e.g. by the [`QueryCompiler`](crate::compiler::QueryCompiler).
//!
//! # Example
//!
//! ```ignore
//! use docmap::condition::{Condition, Operator};
//!
//! let adult = Condition::operand("age", Operator::Ge, 18);
//! let named = Condition::operand("name", Operator::Sw, "A");
//! let condition = Condition::and(adult, Condition::group(named));
//! ```

use std::{fmt, str::FromStr};

use bson::{Bson, Document};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CompileError, CompileResult, StoreError};

/// Comparison operators of the filter grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    /// Equal to.
    Eq,
    /// Not equal to.
    Ne,
    /// String contains value.
    Co,
    /// String starts with value.
    Sw,
    /// String ends with value.
    Ew,
    /// Attribute is present; the value is ignored.
    Pr,
    /// Greater than.
    Gt,
    /// Greater than or equal to.
    Ge,
    /// Less than.
    Lt,
    /// Less than or equal to.
    Le,
}

impl Operator {
    /// All operators, in grammar order.
    pub const ALL: [Operator; 10] = [
        Operator::Eq,
        Operator::Ne,
        Operator::Co,
        Operator::Sw,
        Operator::Ew,
        Operator::Pr,
        Operator::Gt,
        Operator::Ge,
        Operator::Lt,
        Operator::Le,
    ];

    /// Returns the grammar token for this operator.
    pub fn token(&self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Co => "co",
            Operator::Sw => "sw",
            Operator::Ew => "ew",
            Operator::Pr => "pr",
            Operator::Gt => "gt",
            Operator::Ge => "ge",
            Operator::Lt => "lt",
            Operator::Le => "le",
        }
    }
}

impl FromStr for Operator {
    type Err = CompileError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        Operator::ALL
            .into_iter()
            .find(|op| op.token().eq_ignore_ascii_case(token))
            .ok_or_else(|| CompileError::UnsupportedOperator(token.to_string()))
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Binary logical combinators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    /// Returns the grammar token for this combinator.
    pub fn token(&self) -> &'static str {
        match self {
            LogicalOp::And => "and",
            LogicalOp::Or => "or",
        }
    }
}

impl FromStr for LogicalOp {
    type Err = CompileError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        if token.eq_ignore_ascii_case("and") {
            Ok(LogicalOp::And)
        } else if token.eq_ignore_ascii_case("or") {
            Ok(LogicalOp::Or)
        } else {
            Err(CompileError::UnsupportedLogical(token.to_string()))
        }
    }
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// A literal value compared against an attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Timestamp(DateTime<Utc>),
}

impl Literal {
    /// Projects the literal onto its BSON representation.
    ///
    /// Timestamps become BSON dates and therefore lose sub-millisecond precision.
    pub fn to_bson(&self) -> Bson {
        match self {
            Literal::Null => Bson::Null,
            Literal::Bool(value) => Bson::Boolean(*value),
            Literal::Int(value) => Bson::Int64(*value),
            Literal::Double(value) => Bson::Double(*value),
            Literal::String(value) => Bson::String(value.clone()),
            Literal::Timestamp(value) => Bson::DateTime(bson::DateTime::from_chrono(*value)),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => f.write_str("null"),
            Literal::Bool(value) => write!(f, "{value}"),
            Literal::Int(value) => write!(f, "{value}"),
            Literal::Double(value) => write!(f, "{value}"),
            Literal::String(value) => f.write_str(value),
            Literal::Timestamp(value) => {
                f.write_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
        }
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::String(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Literal::String(value)
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Bool(value)
    }
}

impl From<i32> for Literal {
    fn from(value: i32) -> Self {
        Literal::Int(value.into())
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Literal::Int(value)
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Literal::Double(value)
    }
}

impl From<DateTime<Utc>> for Literal {
    fn from(value: DateTime<Utc>) -> Self {
        Literal::Timestamp(value)
    }
}

impl<T: Into<Literal>> From<Option<T>> for Literal {
    fn from(value: Option<T>) -> Self {
        value.map_or(Literal::Null, Into::into)
    }
}

impl TryFrom<&Bson> for Literal {
    type Error = CompileError;

    fn try_from(value: &Bson) -> Result<Self, Self::Error> {
        match value {
            Bson::Null => Ok(Literal::Null),
            Bson::Boolean(value) => Ok(Literal::Bool(*value)),
            Bson::Int32(value) => Ok(Literal::Int((*value).into())),
            Bson::Int64(value) => Ok(Literal::Int(*value)),
            Bson::Double(value) => Ok(Literal::Double(*value)),
            Bson::String(value) => Ok(Literal::String(value.clone())),
            Bson::DateTime(value) => Ok(Literal::Timestamp(value.to_chrono())),
            other => Err(CompileError::UnsupportedCondition(format!(
                "literal of type {:?}",
                other.element_type()
            ))),
        }
    }
}

/// Comparison leaf: `attribute operator value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operand {
    /// Field path the operator applies to.
    pub attribute: String,
    pub operator: Operator,
    pub value: Literal,
}

impl Operand {
    pub fn new(attribute: impl Into<String>, operator: Operator, value: impl Into<Literal>) -> Self {
        Self {
            attribute: attribute.into(),
            operator,
            value: value.into(),
        }
    }
}

/// Binary combinator of two conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Logic {
    pub logical: LogicalOp,
    pub left: Box<Condition>,
    pub right: Box<Condition>,
}

/// A boolean filter expression.
///
/// The variant set is closed; interpreters match on it exhaustively or implement
/// [`ConditionVisitor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// Comparison leaf.
    Operand(Operand),
    /// `left and right` / `left or right`.
    Logic(Logic),
    /// Negation of the inner condition.
    Not(Box<Condition>),
    /// Parenthesised condition; semantically transparent.
    Grouping(Box<Condition>),
}

impl Condition {
    /// Creates a comparison leaf.
    pub fn operand(attribute: impl Into<String>, operator: Operator, value: impl Into<Literal>) -> Self {
        Condition::Operand(Operand::new(attribute, operator, value))
    }

    /// Creates a presence check; `pr` carries no value.
    pub fn present(attribute: impl Into<String>) -> Self {
        Condition::operand(attribute, Operator::Pr, Literal::Null)
    }

    /// Combines two conditions with the given logical operator.
    pub fn logic(logical: LogicalOp, left: Condition, right: Condition) -> Self {
        Condition::Logic(Logic {
            logical,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn and(left: Condition, right: Condition) -> Self {
        Condition::logic(LogicalOp::And, left, right)
    }

    pub fn or(left: Condition, right: Condition) -> Self {
        Condition::logic(LogicalOp::Or, left, right)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: Condition) -> Self {
        Condition::Not(Box::new(inner))
    }

    pub fn group(inner: Condition) -> Self {
        Condition::Grouping(Box::new(inner))
    }

    /// Decodes a condition that travelled as structured data.
    ///
    /// The document holds exactly one of the keys `operand`, `logic`, `not` or `group`:
    ///
    /// ```ignore
    /// doc! {
    ///     "logic": {
    ///         "logical": "and",
    ///         "left": { "operand": { "attribute": "age", "operator": "gt", "value": 18 } },
    ///         "right": { "not": { "operand": { "attribute": "email", "operator": "pr" } } },
    ///     }
    /// }
    /// ```
    ///
    /// # Errors
    ///
    /// Unknown condition kinds, operator tokens and logical tokens are reported as
    /// [`CompileError::UnsupportedCondition`], [`CompileError::UnsupportedOperator`] and
    /// [`CompileError::UnsupportedLogical`] respectively.
    pub fn from_document(document: &Document) -> CompileResult<Self> {
        let mut entries = document.iter();
        let (kind, body) = match (entries.next(), entries.next()) {
            (Some(entry), None) => entry,
            _ => {
                return Err(CompileError::UnsupportedCondition(format!(
                    "expected a single condition key, found {}",
                    document.len()
                )));
            }
        };

        match kind.as_str() {
            "operand" => {
                let body = Self::expect_document(kind, body)?;
                let attribute = body
                    .get("attribute")
                    .and_then(Bson::as_str)
                    .ok_or_else(|| CompileError::UnsupportedCondition("operand without attribute".into()))?;
                let operator = body
                    .get("operator")
                    .and_then(Bson::as_str)
                    .ok_or_else(|| CompileError::UnsupportedCondition("operand without operator".into()))?
                    .parse::<Operator>()?;
                let value = match body.get("value") {
                    Some(value) => Literal::try_from(value)?,
                    None => Literal::Null,
                };

                Ok(Condition::operand(attribute, operator, value))
            }
            "logic" => {
                let body = Self::expect_document(kind, body)?;
                let logical = body
                    .get("logical")
                    .and_then(Bson::as_str)
                    .ok_or_else(|| CompileError::UnsupportedCondition("logic without logical".into()))?
                    .parse::<LogicalOp>()?;
                let left = body
                    .get("left")
                    .ok_or_else(|| CompileError::UnsupportedCondition("logic without left".into()))?;
                let right = body
                    .get("right")
                    .ok_or_else(|| CompileError::UnsupportedCondition("logic without right".into()))?;

                Ok(Condition::logic(
                    logical,
                    Self::from_document(Self::expect_document("left", left)?)?,
                    Self::from_document(Self::expect_document("right", right)?)?,
                ))
            }
            "not" => Ok(Condition::not(Self::from_document(Self::expect_document(kind, body)?)?)),
            "group" => Ok(Condition::group(Self::from_document(Self::expect_document(kind, body)?)?)),
            other => Err(CompileError::UnsupportedCondition(other.to_string())),
        }
    }

    fn expect_document<'a>(kind: &str, value: &'a Bson) -> CompileResult<&'a Document> {
        value.as_document().ok_or_else(|| {
            CompileError::UnsupportedCondition(format!(
                "{kind} must be a document, found {:?}",
                value.element_type()
            ))
        })
    }
}

/// Visitor over the closed set of condition variants.
///
/// Implementors provide one method per variant; [`visit_condition`](Self::visit_condition)
/// dispatches and [`visit_grouping`](Self::visit_grouping) is transparent by default.
pub trait ConditionVisitor {
    type Output;
    type Error: Into<StoreError>;

    fn visit_operand(&mut self, operand: &Operand) -> Result<Self::Output, Self::Error>;
    fn visit_logic(&mut self, logic: &Logic) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, inner: &Condition) -> Result<Self::Output, Self::Error>;

    fn visit_grouping(&mut self, inner: &Condition) -> Result<Self::Output, Self::Error> {
        self.visit_condition(inner)
    }

    fn visit_condition(&mut self, condition: &Condition) -> Result<Self::Output, Self::Error> {
        match condition {
            Condition::Operand(operand) => self.visit_operand(operand),
            Condition::Logic(logic) => self.visit_logic(logic),
            Condition::Not(inner) => self.visit_not(inner),
            Condition::Grouping(inner) => self.visit_grouping(inner),
        }
    }
}
