//! Filter-string parsing.
//!
//! Turns a human readable filter such as `age gt 18 and (name sw 'A' or email pr)` into a
//! [`Condition`] tree. Keywords and operator tokens are case-insensitive, `and` binds tighter
//! than `or`, and chains fold to the left without flattening.

use winnow::{
    ascii::{Caseless, digit1, multispace0, multispace1},
    combinator::{alt, delimited, eof, opt, peek, preceded, repeat, terminated},
    error::ContextError,
    prelude::*,
    token::{literal, one_of, take_while},
};

use crate::{
    condition::{Condition, Literal, Operator},
    error::FilterParseError,
};

type Input<'a> = &'a str;
type ParserResult<T> = winnow::Result<T>;

/// Matches a keyword that is followed by whitespace or an opening parenthesis.
fn keyword<'a>(word: &'static str) -> impl Parser<Input<'a>, &'a str, ContextError> {
    terminated(
        literal(Caseless(word)),
        peek(one_of(|c: char| c.is_whitespace() || c == '(')),
    )
}

/// Parses a single-quoted string literal.
fn parse_string(input: &mut Input<'_>) -> ParserResult<Literal> {
    let chunk = alt((take_while(1.., |c| c != '\''), "''".value("'")));

    delimited(
        '\'',
        repeat(0.., chunk).fold(String::new, |mut text, chunk: &str| {
            text.push_str(chunk);
            text
        }),
        '\'',
    )
    .map(Literal::from)
    .parse_next(input)
}

/// Parses an integer or decimal literal.
fn parse_number(input: &mut Input<'_>) -> ParserResult<Literal> {
    alt((
        (opt(one_of(['+', '-'])), digit1, '.', digit1)
            .take()
            .try_map(|text: &str| text.parse::<f64>().map(Literal::Double)),
        (opt(one_of(['+', '-'])), digit1)
            .take()
            .try_map(|text: &str| text.parse::<i64>().map(Literal::Int)),
    ))
    .parse_next(input)
}

fn parse_value(input: &mut Input<'_>) -> ParserResult<Literal> {
    alt((
        parse_string,
        parse_number,
        literal(Caseless("true")).value(Literal::Bool(true)),
        literal(Caseless("false")).value(Literal::Bool(false)),
        literal(Caseless("null")).value(Literal::Null),
    ))
    .parse_next(input)
}

/// Parses a field path such as `_id`, `address.city` or `$text`.
fn parse_attribute<'a>(input: &mut Input<'a>) -> ParserResult<&'a str> {
    (
        one_of(|c: char| c.is_ascii_alphabetic() || c == '_' || c == '$'),
        take_while(0.., |c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '$')),
    )
        .take()
        .parse_next(input)
}

fn parse_operator(input: &mut Input<'_>) -> ParserResult<Operator> {
    take_while(1.., |c: char| c.is_ascii_alphabetic())
        .try_map(|token: &str| token.parse::<Operator>())
        .parse_next(input)
}

/// Parses `attribute operator value`, or `attribute pr`.
fn parse_operand(input: &mut Input<'_>) -> ParserResult<Condition> {
    let attribute = parse_attribute.parse_next(input)?;
    let operator = preceded(multispace1, parse_operator).parse_next(input)?;

    if operator == Operator::Pr {
        return Ok(Condition::present(attribute));
    }

    let value = preceded(multispace0, parse_value).parse_next(input)?;

    Ok(Condition::operand(attribute, operator, value))
}

/// Parses a parenthesised expression or an operand.
fn parse_term(input: &mut Input<'_>) -> ParserResult<Condition> {
    alt((
        delimited(('(', multispace0), parse_expression, (multispace0, ')')).map(Condition::group),
        parse_operand,
    ))
    .parse_next(input)
}

fn parse_unary(input: &mut Input<'_>) -> ParserResult<Condition> {
    alt((
        preceded((keyword("not"), multispace0), parse_unary).map(Condition::not),
        parse_term,
    ))
    .parse_next(input)
}

fn parse_and_expression(input: &mut Input<'_>) -> ParserResult<Condition> {
    let left = parse_unary.parse_next(input)?;

    let trailing_parser = preceded((multispace0, keyword("and"), multispace0), parse_unary);

    let mut folded_and_parser = repeat(0.., trailing_parser)
        .fold(move || left.clone(), Condition::and);

    folded_and_parser.parse_next(input)
}

fn parse_or_expression(input: &mut Input<'_>) -> ParserResult<Condition> {
    let left = parse_and_expression.parse_next(input)?;

    let trailing_parser = preceded((multispace0, keyword("or"), multispace0), parse_and_expression);

    let mut folded_or_parser = repeat(0.., trailing_parser)
        .fold(move || left.clone(), Condition::or);

    folded_or_parser.parse_next(input)
}

fn parse_expression(input: &mut Input<'_>) -> ParserResult<Condition> {
    delimited(multispace0, parse_or_expression, multispace0).parse_next(input)
}

/// Parses a filter string into a [`Condition`] tree.
///
/// # Example
///
/// ```ignore
/// let condition = parse_filter("_id eq 'test@test.de'")?;
/// assert_eq!(condition, Condition::operand("_id", Operator::Eq, "test@test.de"));
/// ```
pub fn parse_filter(filter: &str) -> Result<Condition, FilterParseError> {
    terminated(parse_expression, eof)
        .parse(filter)
        .map_err(|err| FilterParseError(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_equality() {
        assert_eq!(
            parse_filter("_id eq 'test@test.de'").unwrap(),
            Condition::operand("_id", Operator::Eq, "test@test.de")
        );
    }

    #[test]
    fn literal_kinds() {
        assert_eq!(
            parse_filter("age gt 18").unwrap(),
            Condition::operand("age", Operator::Gt, 18_i64)
        );
        assert_eq!(
            parse_filter("score le -2.5").unwrap(),
            Condition::operand("score", Operator::Le, -2.5)
        );
        assert_eq!(
            parse_filter("active eq TRUE").unwrap(),
            Condition::operand("active", Operator::Eq, true)
        );
        assert_eq!(
            parse_filter("deletedAt eq null").unwrap(),
            Condition::operand("deletedAt", Operator::Eq, Literal::Null)
        );
    }

    #[test]
    fn doubled_quote_escapes_a_quote() {
        assert_eq!(
            parse_filter("name eq 'O''Brien'").unwrap(),
            Condition::operand("name", Operator::Eq, "O'Brien")
        );
        assert_eq!(
            parse_filter("name eq ''''").unwrap(),
            Condition::operand("name", Operator::Eq, "'")
        );
        assert_eq!(
            parse_filter("name eq '' and age gt 1").unwrap(),
            Condition::and(
                Condition::operand("name", Operator::Eq, ""),
                Condition::operand("age", Operator::Gt, 1_i64),
            )
        );
        assert!(parse_filter("name eq 'O'Brien'").is_err());
    }

    #[test]
    fn presence_takes_no_value() {
        assert_eq!(parse_filter("email pr").unwrap(), Condition::present("email"));
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let condition = parse_filter("a eq 1 or b eq 2 and c eq 3").unwrap();
        assert_eq!(
            condition,
            Condition::or(
                Condition::operand("a", Operator::Eq, 1),
                Condition::and(
                    Condition::operand("b", Operator::Eq, 2),
                    Condition::operand("c", Operator::Eq, 3),
                ),
            )
        );
    }

    #[test]
    fn chains_fold_left() {
        let condition = parse_filter("a eq 1 AND b eq 2 and c eq 3").unwrap();
        assert_eq!(
            condition,
            Condition::and(
                Condition::and(
                    Condition::operand("a", Operator::Eq, 1),
                    Condition::operand("b", Operator::Eq, 2),
                ),
                Condition::operand("c", Operator::Eq, 3),
            )
        );
    }

    #[test]
    fn grouping_and_negation() {
        let condition = parse_filter("not (name sw 'A' or address.city ew 'burg')").unwrap();
        assert_eq!(
            condition,
            Condition::not(Condition::group(Condition::or(
                Condition::operand("name", Operator::Sw, "A"),
                Condition::operand("address.city", Operator::Ew, "burg"),
            )))
        );
    }

    #[test]
    fn keywords_need_a_boundary() {
        assert_eq!(
            parse_filter("notes co 'x'").unwrap(),
            Condition::operand("notes", Operator::Co, "x")
        );
        assert_eq!(
            parse_filter("a eq 1 or order eq 2").unwrap(),
            Condition::or(
                Condition::operand("a", Operator::Eq, 1),
                Condition::operand("order", Operator::Eq, 2),
            )
        );
    }

    #[test]
    fn unknown_operator_is_a_syntax_error() {
        assert!(parse_filter("age between 1").is_err());
    }

    #[test]
    fn dangling_logical_is_a_syntax_error() {
        assert!(parse_filter("a eq 1 and").is_err());
        assert!(parse_filter("(a eq 1").is_err());
        assert!(parse_filter("").is_err());
    }
}
