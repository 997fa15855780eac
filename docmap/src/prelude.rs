//! Convenient re-exports of commonly used types from docmap.
//!
//! ```ignore
//! use docmap::prelude::*;
//! ```

pub use docmap_core::{
    client::{FindOptions, FindResult, StoreClient},
    compiler::{QueryCompiler, compile, compile_filter},
    condition::{Condition, ConditionVisitor, Literal, LogicalOp, Operand, Operator},
    converter::Converter,
    error::{CompileError, ConversionError, FilterParseError, StoreError, StoreResult},
    filter::parse_filter,
    handler::{CrudHandler, FilterRequest, FilterResult},
    record::{FieldType, FieldValue, Record, Value},
    rule::{DateRule, RuleRegistry, TimestampRule, TypeRule, default_rules},
    timestamp::Timestamp,
};
pub use docmap_macros::Record;
pub use docmap_memory::InMemoryStore;
