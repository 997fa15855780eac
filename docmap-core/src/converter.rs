//! Generic record ↔ document conversion.
//!
//! The [`Converter`] walks a record's declared fields in order. For each field it resolves
//! the document key, hands the value to the first matching [`TypeRule`] and otherwise falls
//! back to structural conversion: primitives pass through, nested records recurse, and
//! sequences and sets convert element-wise.
//!
//! # Example
//!
//! ```ignore
//! use docmap::prelude::*;
//!
//! let converter = Converter::default().with_name_mapping("email", "_id");
//!
//! let document = converter.encode(person.clone())?;
//! let decoded: Person = converter.decode(document)?;
//! ```
//!
//! A converter is immutable once built and can be shared between concurrent callers.
//! Descriptors of the record types it sees are cached on first use.

use std::{any::TypeId, collections::HashSet, sync::Arc};

use bson::{Bson, Document};
use tracing::trace;

use crate::{
    cache::DescriptorCache,
    error::{ConversionError, ConversionResult},
    record::{FieldDescriptor, FieldSpec, FieldType, Record, RecordDescriptor, RecordType, Value, camel_case},
    rule::{RuleRegistry, TypeRule, default_rules},
};

/// The store's identity key unless configured otherwise.
pub const DEFAULT_IDENTITY_KEY: &str = "_id";

#[derive(Debug)]
pub struct Converter {
    rules: RuleRegistry,
    name_mappings: Vec<(String, String)>,
    identity_field: Option<String>,
    identity_key: String,
    records: DescriptorCache,
    nested: DescriptorCache,
}

impl Default for Converter {
    /// A converter with the [default rules](default_rules).
    fn default() -> Self {
        Self::new().with_rules(default_rules())
    }
}

impl Converter {
    /// Creates a converter without any type rules.
    pub fn new() -> Self {
        Self {
            rules: RuleRegistry::new(),
            name_mappings: Vec::new(),
            identity_field: None,
            identity_key: DEFAULT_IDENTITY_KEY.to_string(),
            records: DescriptorCache::new(),
            nested: DescriptorCache::new(),
        }
    }

    /// Maps a field, given by its Rust name or camel-case projection, to a document key.
    pub fn with_name_mapping(mut self, field: impl Into<String>, key: impl Into<String>) -> Self {
        self.name_mappings.push((field.into(), key.into()));
        self.reset()
    }

    /// Registers a rule after the already registered ones.
    pub fn with_rule(mut self, rule: impl TypeRule + 'static) -> Self {
        self.rules.push(Arc::new(rule));
        self.reset()
    }

    pub fn with_rules(mut self, rules: impl IntoIterator<Item = Arc<dyn TypeRule>>) -> Self {
        for rule in rules {
            self.rules.push(rule);
        }
        self.reset()
    }

    /// Designates the identity field of top-level records.
    pub fn with_identity_field(mut self, field: impl Into<String>) -> Self {
        self.identity_field = Some(field.into());
        self.reset()
    }

    pub fn with_identity_key(mut self, key: impl Into<String>) -> Self {
        self.identity_key = key.into();
        self.reset()
    }

    fn reset(mut self) -> Self {
        self.records = DescriptorCache::new();
        self.nested = DescriptorCache::new();
        self
    }

    pub fn identity_key(&self) -> &str {
        &self.identity_key
    }

    pub fn rules(&self) -> &RuleRegistry {
        &self.rules
    }

    /// Returns the cached descriptor of a top-level record type.
    pub fn descriptor<R: Record>(&self) -> ConversionResult<Arc<RecordDescriptor>> {
        let record_type = R::record_type();
        self.records
            .get_or_try_insert_with(TypeId::of::<R>(), || self.build_descriptor(record_type))
    }

    /// Converts a record into a document.
    pub fn encode<R: Record>(&self, record: R) -> ConversionResult<Document> {
        let descriptor = self.descriptor::<R>()?;
        let document = self.encode_fields(&descriptor, record.into_values())?;
        trace!(record = descriptor.type_name(), keys = document.len(), "encoded record");

        Ok(document)
    }

    /// Constructs a record from a document.
    ///
    /// Missing keys decode as null and keys the record does not declare are ignored.
    pub fn decode<R: Record>(&self, document: Document) -> ConversionResult<R> {
        let descriptor = self.descriptor::<R>()?;
        let values = self.decode_fields(&descriptor, document)?;
        trace!(record = descriptor.type_name(), "decoded record");

        R::from_values(values)
    }

    fn mapping_for(&self, spec: &FieldSpec) -> Option<&str> {
        self.name_mappings
            .iter()
            .find(|(field, _)| field == spec.name || *field == camel_case(spec.name))
            .map(|(_, key)| key.as_str())
    }

    fn build_descriptor(&self, record_type: RecordType) -> ConversionResult<RecordDescriptor> {
        let specs = record_type.fields();
        if specs.is_empty() {
            return Err(ConversionError::UnsupportedType(format!(
                "{} declares no identity field",
                record_type.name()
            )));
        }

        let mapped: Vec<Option<&str>> = specs.iter().map(|spec| self.mapping_for(spec)).collect();

        let identity = if let Some(index) = mapped
            .iter()
            .position(|key| *key == Some(self.identity_key.as_str()))
        {
            index
        } else if let Some(field) = &self.identity_field {
            specs
                .iter()
                .position(|spec| spec.name == field.as_str() || camel_case(spec.name) == *field)
                .ok_or_else(|| {
                    ConversionError::FieldMismatch(
                        field.clone(),
                        format!("not a field of {}", record_type.name()),
                    )
                })?
        } else {
            specs.iter().position(|spec| spec.identity).unwrap_or(0)
        };

        let fields = specs
            .into_iter()
            .zip(mapped)
            .enumerate()
            .map(|(index, (spec, mapped))| {
                let key = match mapped {
                    Some(key) => key.to_string(),
                    None if index == identity => self.identity_key.clone(),
                    None => Self::declared_key(&spec),
                };
                FieldDescriptor {
                    name: spec.name,
                    field_type: spec.field_type,
                    key,
                }
            })
            .collect();

        Self::checked(record_type, fields, Some(identity))
    }

    fn build_nested(record_type: RecordType) -> ConversionResult<RecordDescriptor> {
        let fields = record_type
            .fields()
            .into_iter()
            .map(|spec| FieldDescriptor {
                key: Self::declared_key(&spec),
                name: spec.name,
                field_type: spec.field_type,
            })
            .collect();

        Self::checked(record_type, fields, None)
    }

    fn declared_key(spec: &FieldSpec) -> String {
        spec.rename
            .map_or_else(|| camel_case(spec.name), ToString::to_string)
    }

    fn checked(
        record_type: RecordType,
        fields: Vec<FieldDescriptor>,
        identity: Option<usize>,
    ) -> ConversionResult<RecordDescriptor> {
        let mut seen = HashSet::new();
        if let Some(field) = fields.iter().find(|field| !seen.insert(field.key.as_str())) {
            return Err(ConversionError::FieldMismatch(
                field.name.to_string(),
                format!("duplicate document key {} in {}", field.key, record_type.name()),
            ));
        }

        Ok(RecordDescriptor {
            record_type,
            fields,
            identity,
        })
    }

    fn nested_descriptor(&self, record_type: &RecordType) -> ConversionResult<Arc<RecordDescriptor>> {
        self.nested
            .get_or_try_insert_with(record_type.id(), || Self::build_nested(*record_type))
    }

    fn encode_fields(&self, descriptor: &RecordDescriptor, values: Vec<Value>) -> ConversionResult<Document> {
        if values.len() != descriptor.fields.len() {
            return Err(ConversionError::FieldMismatch(
                descriptor.type_name().to_string(),
                format!("expected {} values, found {}", descriptor.fields.len(), values.len()),
            ));
        }

        let mut document = Document::new();
        for (field, value) in descriptor.fields.iter().zip(values) {
            let encoded = self
                .encode_value(&field.field_type, value)
                .map_err(|err| err.in_field(field.name))?;
            document.insert(field.key.clone(), encoded);
        }

        Ok(document)
    }

    fn decode_fields(&self, descriptor: &RecordDescriptor, mut document: Document) -> ConversionResult<Vec<Value>> {
        descriptor
            .fields
            .iter()
            .map(|field| {
                let value = document.remove(&field.key).unwrap_or(Bson::Null);
                self.decode_value(&field.field_type, value)
                    .map_err(|err| err.in_field(field.name))
            })
            .collect()
    }

    fn encode_value(&self, field_type: &FieldType, value: Value) -> ConversionResult<Bson> {
        if let Some(rule) = self.rules.find(field_type) {
            return rule.encode(&value);
        }

        match (field_type, value) {
            (FieldType::Optional(_), Value::Null) => Ok(Bson::Null),
            (FieldType::Optional(inner), value) => self.encode_value(inner, value),
            (FieldType::Bool, Value::Bool(value)) => Ok(Bson::Boolean(value)),
            (FieldType::Int32, Value::Int32(value)) => Ok(Bson::Int32(value)),
            (FieldType::Int64, Value::Int64(value)) => Ok(Bson::Int64(value)),
            (FieldType::Double, Value::Double(value)) => Ok(Bson::Double(value)),
            (FieldType::String, Value::String(value)) => Ok(Bson::String(value)),
            (FieldType::BsonDateTime, Value::BsonDateTime(value)) => Ok(Bson::DateTime(value)),
            (FieldType::Seq(inner) | FieldType::Set(inner), Value::Seq(items)) => items
                .into_iter()
                .map(|item| self.encode_value(inner, item))
                .collect::<ConversionResult<Vec<_>>>()
                .map(Bson::Array),
            (FieldType::Record(record_type), Value::Record(values)) => {
                let descriptor = self.nested_descriptor(record_type)?;
                self.encode_fields(&descriptor, values).map(Bson::Document)
            }
            (FieldType::DateTime | FieldType::Timestamp | FieldType::Custom(_), _) => {
                Err(ConversionError::UnsupportedType(field_type.to_string()))
            }
            (expected, value) => Err(ConversionError::mismatch(expected, value.kind())),
        }
    }

    fn decode_value(&self, field_type: &FieldType, value: Bson) -> ConversionResult<Value> {
        if let Some(rule) = self.rules.find(field_type) {
            return rule.decode(&value, field_type);
        }

        match (field_type, value) {
            (FieldType::Optional(_), Bson::Null) => Ok(Value::Null),
            (FieldType::Optional(inner), value) => self.decode_value(inner, value),
            (FieldType::Bool, Bson::Boolean(value)) => Ok(Value::Bool(value)),
            (FieldType::Int32, Bson::Int32(value)) => Ok(Value::Int32(value)),
            (FieldType::Int32, Bson::Int64(value)) => i32::try_from(value)
                .map(Value::Int32)
                .map_err(|_| ConversionError::mismatch(FieldType::Int32, format!("integer {value}"))),
            (FieldType::Int64, Bson::Int64(value)) => Ok(Value::Int64(value)),
            (FieldType::Int64, Bson::Int32(value)) => Ok(Value::Int64(value.into())),
            (FieldType::Double, Bson::Double(value)) => Ok(Value::Double(value)),
            (FieldType::Double, Bson::Int32(value)) => Ok(Value::Double(value.into())),
            (FieldType::Double, Bson::Int64(value)) => Ok(Value::Double(value as f64)),
            (FieldType::String, Bson::String(value)) => Ok(Value::String(value)),
            (FieldType::BsonDateTime, Bson::DateTime(value)) => Ok(Value::BsonDateTime(value)),
            (FieldType::Seq(inner) | FieldType::Set(inner), Bson::Array(items)) => items
                .into_iter()
                .map(|item| self.decode_value(inner, item))
                .collect::<ConversionResult<Vec<_>>>()
                .map(Value::Seq),
            (FieldType::Record(record_type), Bson::Document(document)) => {
                let descriptor = self.nested_descriptor(record_type)?;
                self.decode_fields(&descriptor, document).map(Value::Record)
            }
            (FieldType::DateTime | FieldType::Timestamp | FieldType::Custom(_), _) => {
                Err(ConversionError::UnsupportedType(field_type.to_string()))
            }
            (expected, value) => Err(ConversionError::mismatch(
                expected,
                format!("{:?}", value.element_type()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use bson::doc;
    use chrono::{DateTime, SubsecRound, Utc};
    use docmap_macros::Record;

    use super::*;
    use crate::{
        record::{CustomValue, FieldValue},
        timestamp::Timestamp,
    };

    #[derive(Debug, Clone, PartialEq, Record)]
    struct Person {
        email: String,
        name: String,
        age: i32,
        score: f64,
        active: bool,
        created_at: DateTime<Utc>,
        seen: Timestamp,
    }

    fn person() -> Person {
        Person {
            email: "test@test.de".into(),
            name: "Test".into(),
            age: 42,
            score: 0.5,
            active: true,
            created_at: DateTime::from_timestamp(1_700_000_000, 123_456_789).unwrap(),
            seen: Timestamp::new(1_700_000_100, 987_654_321),
        }
    }

    #[test]
    fn round_trip_truncates_to_millis() {
        let converter = Converter::default();
        let original = person();

        let decoded: Person = converter.decode(converter.encode(original.clone()).unwrap()).unwrap();

        assert_ne!(decoded, original);
        assert_eq!(
            decoded,
            Person {
                created_at: original.created_at.trunc_subsecs(3),
                seen: Timestamp::new(1_700_000_100, 987_000_000),
                ..original
            }
        );
    }

    #[test]
    fn identity_field_maps_to_identity_key() {
        let document = Converter::default().encode(person()).unwrap();

        assert_eq!(document.get_str("_id").unwrap(), "test@test.de");
        assert!(!document.contains_key("email"));
        assert_eq!(
            document.keys().collect::<Vec<_>>(),
            ["_id", "name", "age", "score", "active", "createdAt", "seen"]
        );
        assert_eq!(
            document.get("createdAt"),
            Some(&Bson::DateTime(bson::DateTime::from_millis(1_700_000_000_123)))
        );
    }

    #[test]
    fn explicit_mapping_overrides_identity() {
        let converter = Converter::default()
            .with_name_mapping("name", "_id")
            .with_name_mapping("createdAt", "created");

        let document = converter.encode(person()).unwrap();

        assert_eq!(document.get_str("_id").unwrap(), "Test");
        assert_eq!(document.get_str("email").unwrap(), "test@test.de");
        assert!(document.contains_key("created"));
        assert_eq!(
            converter.descriptor::<Person>().unwrap().identity_field().map(|f| f.name),
            Some("name")
        );
    }

    #[test]
    fn configured_identity_field() {
        let converter = Converter::default().with_identity_field("age");
        let document = converter.encode(person()).unwrap();
        assert_eq!(document.get_i32("_id").unwrap(), 42);
        assert_eq!(document.get_str("email").unwrap(), "test@test.de");

        let err = Converter::default()
            .with_identity_field("phone")
            .encode(person())
            .unwrap_err();
        assert!(matches!(err, ConversionError::FieldMismatch(field, _) if field == "phone"));
    }

    #[derive(Debug, Clone, PartialEq, Record)]
    struct Address {
        street: String,
        #[record(rename = "zip")]
        postal_code: String,
    }

    #[derive(Debug, Clone, PartialEq, Record)]
    struct Order {
        number: i64,
        #[record(id)]
        order_id: String,
        shipping_address: Address,
        items: Vec<i64>,
        labels: BTreeSet<String>,
        note: Option<String>,
        #[record(rename = "placed")]
        placed_at: Option<DateTime<Utc>>,
    }

    fn order() -> Order {
        Order {
            number: 7,
            order_id: "o-1".into(),
            shipping_address: Address {
                street: "Main 1".into(),
                postal_code: "12345".into(),
            },
            items: vec![3, 1, 2],
            labels: BTreeSet::from(["b".to_string(), "a".to_string()]),
            note: None,
            placed_at: Some(DateTime::from_timestamp(1_000, 0).unwrap()),
        }
    }

    #[test]
    fn structural_conversion_of_nested_values() {
        let converter = Converter::default();

        let document = converter.encode(order()).unwrap();

        assert_eq!(
            document,
            doc! {
                "number": 7_i64,
                "_id": "o-1",
                "shippingAddress": { "street": "Main 1", "zip": "12345" },
                "items": [3_i64, 1_i64, 2_i64],
                "labels": ["a", "b"],
                "note": null,
                "placed": bson::DateTime::from_millis(1_000_000),
            }
        );
        assert_eq!(converter.decode::<Order>(document).unwrap(), order());
    }

    #[test]
    fn decode_tolerates_missing_optionals_and_unknown_keys() {
        let document = doc! {
            "number": 7,
            "_id": "o-1",
            "shippingAddress": { "street": "Main 1", "zip": "12345", "country": "DE" },
            "items": [],
            "labels": [],
            "extra": true,
        };

        let decoded: Order = Converter::default().decode(document).unwrap();

        assert_eq!(decoded.number, 7);
        assert_eq!(decoded.note, None);
        assert_eq!(decoded.placed_at, None);
        assert!(decoded.items.is_empty());
    }

    #[test]
    fn decode_reports_field_path() {
        let document = doc! {
            "number": 7_i64,
            "_id": "o-1",
            "shippingAddress": { "street": 5 },
            "items": [],
            "labels": [],
        };

        let err = Converter::default().decode::<Order>(document).unwrap_err();

        assert!(matches!(
            err,
            ConversionError::FieldMismatch(field, _) if field == "shipping_address.street"
        ));
    }

    #[test]
    fn missing_required_field_is_a_mismatch() {
        let err = Converter::default()
            .decode::<Person>(doc! { "_id": "a", "name": "b" })
            .unwrap_err();
        assert!(matches!(err, ConversionError::FieldMismatch(field, _) if field == "age"));
    }

    #[test]
    fn integers_narrow_only_when_representable() {
        let document = |age: i64| {
            doc! {
                "_id": "a", "name": "b", "age": age, "score": 1, "active": false,
                "createdAt": bson::DateTime::from_millis(0),
                "seen": bson::DateTime::from_millis(0),
            }
        };
        let converter = Converter::default();

        let decoded: Person = converter.decode(document(30)).unwrap();
        assert_eq!(decoded.age, 30);
        assert_eq!(decoded.score, 1.0);

        let err = converter.decode::<Person>(document(i64::MAX)).unwrap_err();
        assert!(matches!(err, ConversionError::FieldMismatch(field, _) if field == "age"));
    }

    #[test]
    fn temporal_fields_need_rules() {
        let err = Converter::new().encode(person()).unwrap_err();
        assert_eq!(err, ConversionError::UnsupportedType("DateTime<Utc>".into()));
    }

    #[derive(Debug)]
    struct Tagging(&'static str);

    impl TypeRule for Tagging {
        fn check(&self, field_type: &FieldType) -> bool {
            *field_type == FieldType::String
        }

        fn encode(&self, value: &Value) -> ConversionResult<Bson> {
            match value {
                Value::String(text) => Ok(Bson::String(format!("{}:{text}", self.0))),
                other => Err(ConversionError::mismatch("String", other.kind())),
            }
        }

        fn decode(&self, value: &Bson, _field_type: &FieldType) -> ConversionResult<Value> {
            Ok(Value::String(format!("{}<-{}", self.0, value.as_str().unwrap_or_default())))
        }
    }

    #[derive(Debug, Clone, PartialEq, Record)]
    struct Labelled {
        id: i32,
        label: String,
    }

    #[test]
    fn first_registered_rule_wins() {
        let labelled = Labelled {
            id: 1,
            label: "x".into(),
        };

        for (first, second) in [("a", "b"), ("b", "a")] {
            let converter = Converter::new()
                .with_rule(Tagging(first))
                .with_rule(Tagging(second));

            let document = converter.encode(labelled.clone()).unwrap();
            assert_eq!(document.get_str("label").unwrap(), format!("{first}:x"));

            let decoded: Labelled = converter.decode(doc! { "_id": 1, "label": "y" }).unwrap();
            assert_eq!(decoded.label, format!("{first}<-y"));
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Money(i64);

    impl FieldValue for Money {
        fn field_type() -> FieldType {
            FieldType::Custom("Money")
        }

        fn into_value(self) -> Value {
            Value::Custom(CustomValue::new(self))
        }

        fn from_value(value: Value) -> ConversionResult<Self> {
            match value {
                Value::Custom(custom) => custom
                    .downcast_ref::<Money>()
                    .cloned()
                    .ok_or_else(|| ConversionError::mismatch("Money", custom.type_name())),
                other => Err(ConversionError::mismatch("Money", other.kind())),
            }
        }
    }

    #[derive(Debug)]
    struct MoneyRule;

    impl TypeRule for MoneyRule {
        fn check(&self, field_type: &FieldType) -> bool {
            *field_type == FieldType::Custom("Money")
        }

        fn encode(&self, value: &Value) -> ConversionResult<Bson> {
            match value {
                Value::Custom(custom) => custom
                    .downcast_ref::<Money>()
                    .map(|money| Bson::Int64(money.0))
                    .ok_or_else(|| ConversionError::mismatch("Money", custom.type_name())),
                other => Err(ConversionError::mismatch("Money", other.kind())),
            }
        }

        fn decode(&self, value: &Bson, _field_type: &FieldType) -> ConversionResult<Value> {
            match value {
                Bson::Int64(cents) => Ok(Money(*cents).into_value()),
                other => Err(ConversionError::mismatch("Money", format!("{:?}", other.element_type()))),
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Record)]
    struct Invoice {
        number: String,
        total: Money,
        refunds: Vec<Money>,
    }

    #[test]
    fn custom_types_convert_through_rules() {
        let invoice = Invoice {
            number: "i-1".into(),
            total: Money(1_250),
            refunds: vec![Money(250)],
        };

        let err = Converter::default().encode(invoice.clone()).unwrap_err();
        assert_eq!(err, ConversionError::UnsupportedType("Money".into()));

        let converter = Converter::default().with_rule(MoneyRule);
        let document = converter.encode(invoice.clone()).unwrap();
        assert_eq!(document, doc! { "_id": "i-1", "total": 1_250_i64, "refunds": [250_i64] });
        assert_eq!(converter.decode::<Invoice>(document).unwrap(), invoice);
    }

    #[test]
    fn descriptors_are_cached_per_type() {
        let converter = Converter::default();

        let first = converter.descriptor::<Person>().unwrap();
        let second = converter.descriptor::<Person>().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.type_name(), "Person");
        assert_eq!(first.field("created_at").map(|f| f.key.as_str()), Some("createdAt"));
    }
}
