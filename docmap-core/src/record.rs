//! Record model: statically declared structured types and their field values.
//!
//! A [`Record`] exposes its declared fields as a list of [`FieldSpec`]s and can be taken
//! apart into, and rebuilt from, an ordered list of [`Value`]s. The
//! [`Converter`](crate::converter::Converter) uses this to map records onto documents
//! without per-type marshalling code. Implementations are normally derived:
//!
//! ```ignore
//! use docmap::prelude::*;
//!
//! #[derive(Debug, Clone, Record)]
//! pub struct Person {
//!     #[record(id)]
//!     pub email: String,
//!     pub name: String,
//!     pub age: i32,
//!     #[record(rename = "created")]
//!     pub created_at: chrono::DateTime<chrono::Utc>,
//! }
//! ```

use std::{
    any::{Any, TypeId},
    collections::{BTreeSet, HashSet},
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

use chrono::{DateTime, Utc};

use crate::{
    error::{ConversionError, ConversionResult},
    timestamp::Timestamp,
};

/// Identity and field list of a record type.
///
/// The field list is produced lazily so that self-referencing record types can be described.
#[derive(Clone, Copy)]
pub struct RecordType {
    id: TypeId,
    name: &'static str,
    fields: fn() -> Vec<FieldSpec>,
}

impl RecordType {
    pub fn new<R: 'static>(name: &'static str, fields: fn() -> Vec<FieldSpec>) -> Self {
        Self {
            id: TypeId::of::<R>(),
            name,
            fields,
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the declared fields in declaration order.
    pub fn fields(&self) -> Vec<FieldSpec> {
        (self.fields)()
    }
}

impl fmt::Debug for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RecordType").field(&self.name).finish()
    }
}

impl PartialEq for RecordType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for RecordType {}

impl Hash for RecordType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Declared semantic type of a record field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    Bool,
    Int32,
    Int64,
    Double,
    String,
    /// Wall-clock time, `chrono::DateTime<Utc>`.
    DateTime,
    /// Wire timestamp, [`Timestamp`].
    Timestamp,
    /// Store-native date, `bson::DateTime`.
    BsonDateTime,
    Optional(Box<FieldType>),
    Seq(Box<FieldType>),
    Set(Box<FieldType>),
    Record(RecordType),
    /// Application type that can only be converted by a registered rule.
    Custom(&'static str),
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Bool => f.write_str("bool"),
            FieldType::Int32 => f.write_str("i32"),
            FieldType::Int64 => f.write_str("i64"),
            FieldType::Double => f.write_str("f64"),
            FieldType::String => f.write_str("String"),
            FieldType::DateTime => f.write_str("DateTime<Utc>"),
            FieldType::Timestamp => f.write_str("Timestamp"),
            FieldType::BsonDateTime => f.write_str("bson::DateTime"),
            FieldType::Optional(inner) => write!(f, "Option<{inner}>"),
            FieldType::Seq(inner) => write!(f, "Vec<{inner}>"),
            FieldType::Set(inner) => write!(f, "Set<{inner}>"),
            FieldType::Record(record) => f.write_str(record.name()),
            FieldType::Custom(name) => f.write_str(name),
        }
    }
}

/// A declared field of a record type.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub field_type: FieldType,
    /// Document key declared on the type, used instead of the camel-case projection.
    pub rename: Option<&'static str>,
    /// Whether the field is declared as the record's identity.
    pub identity: bool,
}

impl FieldSpec {
    pub fn new(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            rename: None,
            identity: false,
        }
    }

    pub fn rename(mut self, key: &'static str) -> Self {
        self.rename = Some(key);
        self
    }

    pub fn identity(mut self) -> Self {
        self.identity = true;
        self
    }
}

/// Opaque application value, convertible only through a type rule.
#[derive(Clone)]
pub struct CustomValue {
    type_name: &'static str,
    inner: Arc<dyn Any + Send + Sync>,
}

impl CustomValue {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            inner: Arc::new(value),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

impl fmt::Debug for CustomValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CustomValue").field(&self.type_name).finish()
    }
}

impl PartialEq for CustomValue {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Record-side dynamic value of a single field.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Double(f64),
    String(String),
    DateTime(DateTime<Utc>),
    Timestamp(Timestamp),
    BsonDateTime(bson::DateTime),
    /// Elements of a sequence or set.
    Seq(Vec<Value>),
    /// Field values of a nested record, in declaration order.
    Record(Vec<Value>),
    Custom(CustomValue),
}

impl Value {
    /// Short name of the value's kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int32(_) => "i32",
            Value::Int64(_) => "i64",
            Value::Double(_) => "f64",
            Value::String(_) => "String",
            Value::DateTime(_) => "DateTime<Utc>",
            Value::Timestamp(_) => "Timestamp",
            Value::BsonDateTime(_) => "bson::DateTime",
            Value::Seq(_) => "sequence",
            Value::Record(_) => "record",
            Value::Custom(value) => value.type_name(),
        }
    }
}

/// Maps a Rust type onto a [`FieldType`] and its [`Value`] representation.
pub trait FieldValue: Sized {
    fn field_type() -> FieldType;
    fn into_value(self) -> Value;
    fn from_value(value: Value) -> ConversionResult<Self>;
}

/// A statically declared structured type that can be converted to and from documents.
pub trait Record: Sized + Send + Sync + 'static {
    fn record_type() -> RecordType;

    /// Takes the record apart into its field values, in declaration order.
    fn into_values(self) -> Vec<Value>;

    /// Rebuilds the record from field values in declaration order.
    fn from_values(values: Vec<Value>) -> ConversionResult<Self>;
}

/// Takes the next field value and converts it, attributing failures to `name`.
#[doc(hidden)]
pub fn take_field<T: FieldValue>(
    values: &mut std::vec::IntoIter<Value>,
    name: &str,
) -> ConversionResult<T> {
    let value = values
        .next()
        .ok_or_else(|| ConversionError::FieldMismatch(name.to_string(), "missing value".into()))?;

    T::from_value(value).map_err(|err| err.in_field(name))
}

/// [`FieldValue::from_value`] for nested records.
#[doc(hidden)]
pub fn record_from_value<R: Record + FieldValue>(value: Value) -> ConversionResult<R> {
    match value {
        Value::Record(values) => R::from_values(values),
        other => Err(ConversionError::mismatch(R::field_type(), other.kind())),
    }
}

macro_rules! primitive_field_value {
    ($type:ty, $field_type:ident, $variant:ident) => {
        impl FieldValue for $type {
            fn field_type() -> FieldType {
                FieldType::$field_type
            }

            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn from_value(value: Value) -> ConversionResult<Self> {
                match value {
                    Value::$variant(inner) => Ok(inner),
                    other => Err(ConversionError::mismatch(Self::field_type(), other.kind())),
                }
            }
        }
    };
}

primitive_field_value!(bool, Bool, Bool);
primitive_field_value!(i32, Int32, Int32);
primitive_field_value!(i64, Int64, Int64);
primitive_field_value!(f64, Double, Double);
primitive_field_value!(String, String, String);
primitive_field_value!(DateTime<Utc>, DateTime, DateTime);
primitive_field_value!(Timestamp, Timestamp, Timestamp);
primitive_field_value!(bson::DateTime, BsonDateTime, BsonDateTime);

impl<T: FieldValue> FieldValue for Option<T> {
    fn field_type() -> FieldType {
        FieldType::Optional(Box::new(T::field_type()))
    }

    fn into_value(self) -> Value {
        self.map_or(Value::Null, FieldValue::into_value)
    }

    fn from_value(value: Value) -> ConversionResult<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

fn elements<T: FieldValue, C: FromIterator<T>>(expected: FieldType, value: Value) -> ConversionResult<C> {
    match value {
        Value::Seq(items) => items.into_iter().map(T::from_value).collect(),
        other => Err(ConversionError::mismatch(expected, other.kind())),
    }
}

impl<T: FieldValue> FieldValue for Vec<T> {
    fn field_type() -> FieldType {
        FieldType::Seq(Box::new(T::field_type()))
    }

    fn into_value(self) -> Value {
        Value::Seq(self.into_iter().map(FieldValue::into_value).collect())
    }

    fn from_value(value: Value) -> ConversionResult<Self> {
        elements(Self::field_type(), value)
    }
}

impl<T: FieldValue + Ord> FieldValue for BTreeSet<T> {
    fn field_type() -> FieldType {
        FieldType::Set(Box::new(T::field_type()))
    }

    fn into_value(self) -> Value {
        Value::Seq(self.into_iter().map(FieldValue::into_value).collect())
    }

    fn from_value(value: Value) -> ConversionResult<Self> {
        elements(Self::field_type(), value)
    }
}

impl<T: FieldValue + Eq + Hash> FieldValue for HashSet<T> {
    fn field_type() -> FieldType {
        FieldType::Set(Box::new(T::field_type()))
    }

    fn into_value(self) -> Value {
        Value::Seq(self.into_iter().map(FieldValue::into_value).collect())
    }

    fn from_value(value: Value) -> ConversionResult<Self> {
        elements(Self::field_type(), value)
    }
}

/// Camel-case projection of a field name: `created_at` becomes `createdAt`, `Email`
/// becomes `email`. Leading underscores are kept.
pub fn camel_case(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut chars = name.chars().peekable();

    while let Some('_') = chars.peek() {
        result.push('_');
        chars.next();
    }
    if let Some(first) = chars.next() {
        result.extend(first.to_lowercase());
    }

    let mut upper_next = false;
    for c in chars {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            result.extend(c.to_uppercase());
            upper_next = false;
        } else {
            result.push(c);
        }
    }

    result
}

/// A field of a [`RecordDescriptor`] with its resolved document key.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub field_type: FieldType,
    pub key: String,
}

/// Cached metadata of a record type: ordered fields, declared types and resolved keys.
///
/// Descriptors are immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordDescriptor {
    pub record_type: RecordType,
    pub fields: Vec<FieldDescriptor>,
    /// Index of the identity field; `None` for nested records.
    pub identity: Option<usize>,
}

impl RecordDescriptor {
    pub fn type_name(&self) -> &'static str {
        self.record_type.name()
    }

    pub fn identity_field(&self) -> Option<&FieldDescriptor> {
        self.identity.and_then(|index| self.fields.get(index))
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }
}
