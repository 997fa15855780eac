//! Compilation of condition trees into native query documents.
//!
//! The output follows the store's boolean query model: a field key maps to an operator
//! document (`{"age": {"$gt": 18}}`), and `$and`/`$or` map to an ordered array of nested
//! query documents. Each binary [`Logic`] node yields exactly one nested pair; chains are
//! never flattened.

use bson::{Bson, Document, doc};
use tracing::trace;

use crate::{
    condition::{Condition, ConditionVisitor, Logic, LogicalOp, Operand, Operator},
    error::{CompileError, CompileResult, StoreError},
    filter::parse_filter,
};

/// Translates [`Condition`] trees into query documents.
///
/// The compiler is stateless; one value can be shared freely between callers.
#[derive(Debug, Default, Clone, Copy)]
pub struct QueryCompiler;

impl QueryCompiler {
    fn pattern(operand: &Operand) -> String {
        let escaped = regex::escape(&operand.value.to_string());

        match operand.operator {
            Operator::Sw => format!("^{escaped}"),
            Operator::Ew => format!("{escaped}$"),
            _ => escaped,
        }
    }
}

impl ConditionVisitor for QueryCompiler {
    type Output = Document;
    type Error = CompileError;

    fn visit_operand(&mut self, operand: &Operand) -> Result<Self::Output, Self::Error> {
        if operand.attribute.is_empty() {
            return Err(CompileError::UnsupportedCondition("operand with empty attribute".into()));
        }

        let attribute = operand.attribute.as_str();
        let value = operand.value.to_bson();

        Ok(doc! {
            attribute: match operand.operator {
                Operator::Eq => doc! { "$eq": value },
                Operator::Ne => doc! { "$ne": value },
                Operator::Gt => doc! { "$gt": value },
                Operator::Ge => doc! { "$gte": value },
                Operator::Lt => doc! { "$lt": value },
                Operator::Le => doc! { "$lte": value },
                Operator::Pr => doc! { "$exists": true },
                Operator::Co | Operator::Sw | Operator::Ew => doc! { "$regex": Self::pattern(operand) },
            }
        })
    }

    fn visit_logic(&mut self, logic: &Logic) -> Result<Self::Output, Self::Error> {
        let left = self.visit_condition(&logic.left)?;
        let right = self.visit_condition(&logic.right)?;

        Ok(match logic.logical {
            LogicalOp::And => doc! { "$and": [left, right] },
            LogicalOp::Or => doc! { "$or": [left, right] },
        })
    }

    fn visit_not(&mut self, inner: &Condition) -> Result<Self::Output, Self::Error> {
        // negation applies to every top-level key separately
        Ok(self
            .visit_condition(inner)?
            .into_iter()
            .map(|(key, value)| (key, Bson::Document(doc! { "$not": value })))
            .collect())
    }
}

/// Compiles a condition tree into a query document.
///
/// No partial document is returned when any part of the tree fails to compile.
pub fn compile(condition: &Condition) -> CompileResult<Document> {
    let document = QueryCompiler.visit_condition(condition)?;
    trace!(query = %document, "compiled condition");

    Ok(document)
}

/// Parses and compiles a filter string.
///
/// A blank filter compiles to the empty document, which matches every document.
pub fn compile_filter(filter: &str) -> Result<Document, StoreError> {
    if filter.trim().is_empty() {
        return Ok(Document::new());
    }

    Ok(compile(&parse_filter(filter)?)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Literal;

    #[test]
    fn every_operator_maps_to_its_operator_document() {
        let cases = [
            (Operator::Eq, doc! { "a": { "$eq": "v" } }),
            (Operator::Ne, doc! { "a": { "$ne": "v" } }),
            (Operator::Co, doc! { "a": { "$regex": "v" } }),
            (Operator::Sw, doc! { "a": { "$regex": "^v" } }),
            (Operator::Ew, doc! { "a": { "$regex": "v$" } }),
            (Operator::Pr, doc! { "a": { "$exists": true } }),
            (Operator::Gt, doc! { "a": { "$gt": "v" } }),
            (Operator::Ge, doc! { "a": { "$gte": "v" } }),
            (Operator::Lt, doc! { "a": { "$lt": "v" } }),
            (Operator::Le, doc! { "a": { "$lte": "v" } }),
        ];

        assert_eq!(cases.len(), Operator::ALL.len());
        for (op, expected) in cases {
            let compiled = compile(&Condition::operand("a", op, "v")).unwrap();
            assert_eq!(compiled, expected, "operator {op}");
        }
    }

    #[test]
    fn presence_ignores_value() {
        let compiled = compile(&Condition::operand("email", Operator::Pr, 42)).unwrap();
        assert_eq!(compiled, doc! { "email": { "$exists": true } });
    }

    #[test]
    fn pattern_operators_match_literally() {
        let compiled = compile(&Condition::operand("host", Operator::Co, "a.b*")).unwrap();
        assert_eq!(compiled, doc! { "host": { "$regex": r"a\.b\*" } });

        let compiled = compile(&Condition::operand("code", Operator::Sw, 12)).unwrap();
        assert_eq!(compiled, doc! { "code": { "$regex": "^12" } });
    }

    #[test]
    fn greater_than_number() {
        let compiled = compile(&Condition::operand("age", Operator::Gt, 18)).unwrap();
        assert_eq!(compiled, doc! { "age": { "$gt": 18_i64 } });
    }

    #[test]
    fn parsed_identity_filter() {
        let compiled = compile_filter("_id eq 'test@test.de'").unwrap();
        assert_eq!(compiled, doc! { "_id": { "$eq": "test@test.de" } });
    }

    #[test]
    fn logic_preserves_order() {
        let left = Condition::operand("a", Operator::Eq, 1);
        let right = Condition::operand("b", Operator::Lt, 2);

        for (logical, key) in [(LogicalOp::And, "$and"), (LogicalOp::Or, "$or")] {
            let compiled = compile(&Condition::logic(logical, left.clone(), right.clone())).unwrap();
            let expected = doc! { key: [compile(&left).unwrap(), compile(&right).unwrap()] };
            assert_eq!(compiled, expected);
        }
    }

    #[test]
    fn nested_and_is_not_flattened() {
        let a = Condition::operand("a", Operator::Eq, 1);
        let b = Condition::operand("b", Operator::Eq, 2);
        let c = Condition::operand("c", Operator::Eq, 3);

        let compiled = compile(&Condition::and(Condition::and(a, b), c)).unwrap();

        assert_eq!(
            compiled,
            doc! {
                "$and": [
                    { "$and": [{ "a": { "$eq": 1_i64 } }, { "b": { "$eq": 2_i64 } }] },
                    { "c": { "$eq": 3_i64 } },
                ]
            }
        );
    }

    #[test]
    fn not_wraps_operator_document() {
        let compiled = compile(&Condition::not(Condition::operand("email", Operator::Eq, "x"))).unwrap();
        assert_eq!(compiled, doc! { "email": { "$not": { "$eq": "x" } } });
    }

    #[test]
    fn not_applies_per_top_level_key() {
        let inner = Condition::and(
            Condition::operand("a", Operator::Eq, 1),
            Condition::operand("b", Operator::Eq, 2),
        );

        let compiled = compile(&Condition::not(inner)).unwrap();

        assert_eq!(
            compiled,
            doc! {
                "$and": { "$not": [{ "a": { "$eq": 1_i64 } }, { "b": { "$eq": 2_i64 } }] }
            }
        );
    }

    #[test]
    fn grouping_is_transparent() {
        let conditions = [
            Condition::operand("a", Operator::Ge, 1.5),
            Condition::or(
                Condition::present("a"),
                Condition::not(Condition::operand("b", Operator::Ew, "z")),
            ),
            Condition::group(Condition::operand("c", Operator::Eq, Literal::Null)),
        ];

        for condition in conditions {
            assert_eq!(
                compile(&Condition::group(condition.clone())).unwrap(),
                compile(&condition).unwrap()
            );
        }
    }

    #[test]
    fn empty_attribute_fails_without_document() {
        let condition = Condition::and(
            Condition::operand("a", Operator::Eq, 1),
            Condition::operand("", Operator::Eq, 2),
        );

        assert!(matches!(
            compile(&condition),
            Err(CompileError::UnsupportedCondition(_))
        ));
    }

    #[test]
    fn structured_condition_errors_surface_before_compilation() {
        let err = Condition::from_document(&doc! { "operand": { "attribute": "a", "operator": "xx" } })
            .and_then(|condition| compile(&condition))
            .unwrap_err();
        assert_eq!(err, CompileError::UnsupportedOperator("xx".into()));
    }

    #[test]
    fn blank_filter_matches_everything() {
        assert_eq!(compile_filter("  ").unwrap(), Document::new());
        assert!(matches!(compile_filter("a eq"), Err(StoreError::Parse(_))));
    }
}
