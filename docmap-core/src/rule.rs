//! Pluggable per-type conversion rules.
//!
//! A [`TypeRule`] takes over the conversion of one semantic field type. The
//! [`Converter`](crate::converter::Converter) consults its [`RuleRegistry`] before falling
//! back to structural conversion, and the first rule whose [`TypeRule::check`] matches wins.
//! Registration order is therefore significant: a later rule for an already covered type is
//! never reached.

use std::{fmt, sync::Arc};

use bson::Bson;
use chrono::{DateTime, Utc};

use crate::{
    error::{ConversionError, ConversionResult},
    record::{FieldType, Value},
    timestamp::Timestamp,
};

/// A conversion strategy for one semantic type.
pub trait TypeRule: fmt::Debug + Send + Sync {
    /// Returns whether this rule handles fields of the given declared type.
    fn check(&self, field_type: &FieldType) -> bool;

    /// Converts a record value into its document value.
    fn encode(&self, value: &Value) -> ConversionResult<Bson>;

    /// Converts a document value into a record value of the declared type.
    fn decode(&self, value: &Bson, field_type: &FieldType) -> ConversionResult<Value>;
}

fn parse_rfc3339(text: &str) -> ConversionResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|datetime| datetime.with_timezone(&Utc))
        .map_err(|err| ConversionError::BadTimestamp(format!("{text}: {err}")))
}

/// Converts wire [`Timestamp`] fields to and from store-native dates.
///
/// Encoding narrows to millisecond resolution. Both the wall-clock and the store-native
/// representation are accepted and normalized to a `Timestamp`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TimestampRule;

impl TypeRule for TimestampRule {
    fn check(&self, field_type: &FieldType) -> bool {
        matches!(field_type, FieldType::Timestamp)
    }

    fn encode(&self, value: &Value) -> ConversionResult<Bson> {
        let timestamp = match value {
            Value::Timestamp(timestamp) => *timestamp,
            Value::DateTime(datetime) => Timestamp::from(*datetime),
            Value::BsonDateTime(datetime) => return Ok(Bson::DateTime(*datetime)),
            other => return Err(ConversionError::mismatch(FieldType::Timestamp, other.kind())),
        };

        Ok(Bson::DateTime(bson::DateTime::from_millis(timestamp.to_millis()?)))
    }

    fn decode(&self, value: &Bson, _field_type: &FieldType) -> ConversionResult<Value> {
        match value {
            Bson::DateTime(datetime) => Ok(Value::Timestamp(Timestamp::from_millis(
                datetime.timestamp_millis(),
            )?)),
            Bson::String(text) => {
                let timestamp = Timestamp::from(parse_rfc3339(text)?);
                timestamp.validate()?;
                Ok(Value::Timestamp(timestamp))
            }
            other => Err(ConversionError::mismatch(
                FieldType::Timestamp,
                format!("{:?}", other.element_type()),
            )),
        }
    }
}

/// Converts wall-clock `DateTime<Utc>` fields directly to and from store-native dates.
#[derive(Debug, Default, Clone, Copy)]
pub struct DateRule;

impl TypeRule for DateRule {
    fn check(&self, field_type: &FieldType) -> bool {
        matches!(field_type, FieldType::DateTime)
    }

    fn encode(&self, value: &Value) -> ConversionResult<Bson> {
        match value {
            Value::DateTime(datetime) => Ok(Bson::DateTime(bson::DateTime::from_chrono(*datetime))),
            Value::BsonDateTime(datetime) => Ok(Bson::DateTime(*datetime)),
            other => Err(ConversionError::mismatch(FieldType::DateTime, other.kind())),
        }
    }

    fn decode(&self, value: &Bson, _field_type: &FieldType) -> ConversionResult<Value> {
        match value {
            Bson::DateTime(datetime) => Ok(Value::DateTime(datetime.to_chrono())),
            Bson::String(text) => Ok(Value::DateTime(parse_rfc3339(text)?)),
            other => Err(ConversionError::mismatch(
                FieldType::DateTime,
                format!("{:?}", other.element_type()),
            )),
        }
    }
}

/// Ordered collection of type rules.
#[derive(Debug, Default, Clone)]
pub struct RuleRegistry {
    rules: Vec<Arc<dyn TypeRule>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a rule after all previously registered ones.
    pub fn push(&mut self, rule: Arc<dyn TypeRule>) {
        self.rules.push(rule);
    }

    /// Returns the first registered rule that handles `field_type`.
    pub fn find(&self, field_type: &FieldType) -> Option<&dyn TypeRule> {
        self.rules
            .iter()
            .find(|rule| rule.check(field_type))
            .map(|rule| rule.as_ref())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn TypeRule>> {
        self.rules.iter()
    }
}

impl FromIterator<Arc<dyn TypeRule>> for RuleRegistry {
    fn from_iter<I: IntoIterator<Item = Arc<dyn TypeRule>>>(iter: I) -> Self {
        Self {
            rules: iter.into_iter().collect(),
        }
    }
}

/// The built-in rules: [`TimestampRule`] then [`DateRule`].
pub fn default_rules() -> Vec<Arc<dyn TypeRule>> {
    vec![Arc::new(TimestampRule), Arc::new(DateRule)]
}
