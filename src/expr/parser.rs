//! Expression grammar.
//!
//! ```text
//! expression := term (('+' | '-') term)*
//! term       := factor (('*' | '/') factor)*
//! factor     := '(' expression ')' | sign? number
//! sign       := '-' | '+'
//! number     := digit+ ('.' digit+)?
//! ```
//!
//! Whitespace is removed before parsing, so every position reported in a
//! [`ParseError`] is a byte offset into the whitespace-free text. A unary `+`
//! is only legal as the first character of the text or directly after `(`;
//! a unary `-` is legal in any operand position.
//!
//! Parenthesis nesting and tree depth are both capped at [`MAX_DEPTH`], so
//! evaluation and scheduling walks stay within a worker thread's stack.

use nom::{
    IResult,
    bytes::complete::take_while,
    character::complete::{char, digit1, one_of},
    combinator::{all_consuming, map_opt, opt, recognize},
    error::ErrorKind,
    sequence::pair,
};
use thiserror::Error;

use super::{OperationNode, Operator};

/// Deepest parenthesis nesting, and deepest operation tree, accepted.
/// A chain of `n` same-precedence operators is a tree of depth `n`.
pub const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty expression")]
    Empty,

    #[error("unexpected unary plus at position {position}")]
    UnexpectedUnaryPlus { position: usize },

    #[error("expected number at position {position}")]
    ExpectedNumber { position: usize },

    #[error("invalid number {token:?} at position {position}")]
    InvalidNumber { position: usize, token: String },

    #[error("missing closing parenthesis at position {position}")]
    UnclosedParenthesis { position: usize },

    #[error("unexpected token at position {position}")]
    UnexpectedToken { position: usize },

    #[error("expression nested deeper than {max} levels at position {position}", max = MAX_DEPTH)]
    TooDeep { position: usize },
}

impl ParseError {
    /// Offset of the offending character, if the error has one.
    pub fn position(&self) -> Option<usize> {
        match self {
            ParseError::Empty => None,
            ParseError::UnexpectedUnaryPlus { position }
            | ParseError::ExpectedNumber { position }
            | ParseError::InvalidNumber { position, .. }
            | ParseError::UnclosedParenthesis { position }
            | ParseError::UnexpectedToken { position }
            | ParseError::TooDeep { position } => Some(*position),
        }
    }
}

/// Parse expression text into an operation tree.
pub fn parse(text: &str) -> Result<OperationNode, ParseError> {
    let source: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if source.is_empty() {
        return Err(ParseError::Empty);
    }

    match expression(&source, true, 0) {
        Ok(("", tree)) => Ok(tree.node),
        Ok((rest, _)) => Err(ParseError::UnexpectedToken {
            position: source.len() - rest.len(),
        }),
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => Err(e.into_parse_error(&source)),
        Err(nom::Err::Incomplete(_)) => Err(ParseError::ExpectedNumber {
            position: source.len(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Grammar
// ---------------------------------------------------------------------------

type PResult<'a, T> = IResult<&'a str, T, GrammarError<'a>>;

/// Why a production failed. Converted to a [`ParseError`] once the length of
/// the unparsed remainder can be turned into a position.
#[derive(Debug)]
enum Reason {
    UnaryPlus,
    ExpectedNumber,
    InvalidNumber(String),
    UnclosedParenthesis,
    Unexpected,
    TooDeep,
}

#[derive(Debug)]
struct GrammarError<'a> {
    rest: &'a str,
    reason: Reason,
}

impl<'a> GrammarError<'a> {
    fn into_parse_error(self, source: &str) -> ParseError {
        let position = source.len() - self.rest.len();
        match self.reason {
            Reason::UnaryPlus => ParseError::UnexpectedUnaryPlus { position },
            Reason::ExpectedNumber => ParseError::ExpectedNumber { position },
            Reason::InvalidNumber(token) => ParseError::InvalidNumber { position, token },
            Reason::UnclosedParenthesis => ParseError::UnclosedParenthesis { position },
            Reason::Unexpected => ParseError::UnexpectedToken { position },
            Reason::TooDeep => ParseError::TooDeep { position },
        }
    }
}

impl<'a> nom::error::ParseError<&'a str> for GrammarError<'a> {
    fn from_error_kind(input: &'a str, _kind: ErrorKind) -> Self {
        GrammarError {
            rest: input,
            reason: Reason::Unexpected,
        }
    }

    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

fn fail<T>(rest: &str, reason: Reason) -> PResult<'_, T> {
    Err(nom::Err::Failure(GrammarError { rest, reason }))
}

/// A parsed subtree and the depth of its deepest operation.
struct Subtree {
    node: OperationNode,
    depth: usize,
}

impl Subtree {
    fn leaf(value: f64) -> Self {
        Subtree {
            node: OperationNode::leaf(value),
            depth: 0,
        }
    }
}

/// Combine two subtrees under `operator`, which starts at `at`.
fn join<'a>(
    at: &'a str,
    operator: Operator,
    left: Subtree,
    right: Subtree,
) -> Result<Subtree, nom::Err<GrammarError<'a>>> {
    let depth = 1 + left.depth.max(right.depth);
    if depth > MAX_DEPTH {
        return Err(nom::Err::Failure(GrammarError {
            rest: at,
            reason: Reason::TooDeep,
        }));
    }
    Ok(Subtree {
        node: OperationNode::operation(operator, left.node, right.node),
        depth,
    })
}

/// `leading` is true when the production starts the whole text or directly
/// follows `(`, the only places a unary `+` may appear. `nesting` counts the
/// open parentheses around it.
fn expression(input: &str, leading: bool, nesting: usize) -> PResult<'_, Subtree> {
    let (mut input, mut tree) = term(input, leading, nesting)?;
    loop {
        let next: PResult<'_, Operator> = map_opt(one_of("+-"), Operator::from_symbol)(input);
        let Ok((rest, operator)) = next else {
            break;
        };
        let (rest, right) = term(rest, false, nesting)?;
        tree = join(input, operator, tree, right)?;
        input = rest;
    }
    Ok((input, tree))
}

fn term(input: &str, leading: bool, nesting: usize) -> PResult<'_, Subtree> {
    let (mut input, mut tree) = factor(input, leading, nesting)?;
    loop {
        let next: PResult<'_, Operator> = map_opt(one_of("*/"), Operator::from_symbol)(input);
        let Ok((rest, operator)) = next else {
            break;
        };
        let (rest, right) = factor(rest, false, nesting)?;
        tree = join(input, operator, tree, right)?;
        input = rest;
    }
    Ok((input, tree))
}

fn factor(input: &str, leading: bool, nesting: usize) -> PResult<'_, Subtree> {
    let open: PResult<'_, char> = char('(')(input);
    if let Ok((rest, _)) = open {
        if nesting >= MAX_DEPTH {
            return fail(input, Reason::TooDeep);
        }
        let (rest, tree) = expression(rest, true, nesting + 1)?;
        let close: PResult<'_, char> = char(')')(rest);
        return match close {
            Ok((rest, _)) => Ok((rest, tree)),
            Err(_) => fail(rest, Reason::UnclosedParenthesis),
        };
    }

    let (unsigned, sign) = opt(one_of("+-"))(input)?;
    if sign == Some('+') && !leading {
        return fail(input, Reason::UnaryPlus);
    }

    let (rest, token) = take_while(|c: char| c.is_ascii_digit() || c == '.')(unsigned)?;
    if token.is_empty() {
        return fail(input, Reason::ExpectedNumber);
    }

    let literal: PResult<'_, &str> = all_consuming(number)(token);
    let magnitude = literal
        .ok()
        .and_then(|(_, digits)| digits.parse::<f64>().ok());
    let Some(magnitude) = magnitude else {
        return fail(input, Reason::InvalidNumber(token.to_string()));
    };

    let value = if sign == Some('-') {
        -magnitude
    } else {
        magnitude
    };
    Ok((rest, Subtree::leaf(value)))
}

fn number(input: &str) -> PResult<'_, &str> {
    recognize(pair(digit1, opt(pair(char('.'), digit1))))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(operator: Operator, left: OperationNode, right: OperationNode) -> OperationNode {
        OperationNode::operation(operator, left, right)
    }

    fn leaf(value: f64) -> OperationNode {
        OperationNode::leaf(value)
    }

    #[test]
    fn parses_single_literal() {
        assert_eq!(parse("42").unwrap(), leaf(42.0));
        assert_eq!(parse("3.25").unwrap(), leaf(3.25));
        assert_eq!(parse("-7").unwrap(), leaf(-7.0));
    }

    #[test]
    fn strips_whitespace_before_parsing() {
        assert_eq!(
            parse(" 1 +\t2 ").unwrap(),
            op(Operator::Add, leaf(1.0), leaf(2.0))
        );
    }

    #[test]
    fn same_precedence_chains_are_left_deep() {
        assert_eq!(
            parse("1-2-3").unwrap(),
            op(
                Operator::Subtract,
                op(Operator::Subtract, leaf(1.0), leaf(2.0)),
                leaf(3.0)
            )
        );
        assert_eq!(
            parse("8/4/2").unwrap(),
            op(
                Operator::Divide,
                op(Operator::Divide, leaf(8.0), leaf(4.0)),
                leaf(2.0)
            )
        );
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        assert_eq!(
            parse("2+2*2").unwrap(),
            op(
                Operator::Add,
                leaf(2.0),
                op(Operator::Multiply, leaf(2.0), leaf(2.0))
            )
        );
    }

    #[test]
    fn parentheses_override_precedence() {
        assert_eq!(
            parse("(2+3)*4").unwrap(),
            op(
                Operator::Multiply,
                op(Operator::Add, leaf(2.0), leaf(3.0)),
                leaf(4.0)
            )
        );
    }

    #[test]
    fn empty_input_is_rejected() {
        assert_eq!(parse(""), Err(ParseError::Empty));
        assert_eq!(parse("   "), Err(ParseError::Empty));
    }

    #[test]
    fn unmatched_open_parenthesis_is_rejected() {
        assert_eq!(
            parse("(2+3"),
            Err(ParseError::UnclosedParenthesis { position: 4 })
        );
    }

    #[test]
    fn missing_operand_is_rejected() {
        assert_eq!(parse("2+"), Err(ParseError::ExpectedNumber { position: 2 }));
        assert_eq!(parse("()"), Err(ParseError::ExpectedNumber { position: 1 }));
        assert_eq!(parse("-"), Err(ParseError::ExpectedNumber { position: 0 }));
    }

    #[test]
    fn trailing_input_is_rejected() {
        assert_eq!(
            parse("2)"),
            Err(ParseError::UnexpectedToken { position: 1 })
        );
        assert_eq!(
            parse("2(3)"),
            Err(ParseError::UnexpectedToken { position: 1 })
        );
        assert_eq!(
            parse("1e5"),
            Err(ParseError::UnexpectedToken { position: 1 })
        );
    }

    #[test]
    fn unary_plus_only_at_start_or_after_open_parenthesis() {
        assert_eq!(parse("+2").unwrap(), leaf(2.0));
        assert_eq!(
            parse("(+2)*3").unwrap(),
            op(Operator::Multiply, leaf(2.0), leaf(3.0))
        );
        assert_eq!(
            parse("2++2"),
            Err(ParseError::UnexpectedUnaryPlus { position: 2 })
        );
        assert_eq!(
            parse("2*+3"),
            Err(ParseError::UnexpectedUnaryPlus { position: 2 })
        );
    }

    #[test]
    fn unary_minus_is_accepted_anywhere() {
        assert_eq!(
            parse("2--3").unwrap(),
            op(Operator::Subtract, leaf(2.0), leaf(-3.0))
        );
        assert_eq!(
            parse("4*-1.5").unwrap(),
            op(Operator::Multiply, leaf(4.0), leaf(-1.5))
        );
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        for (text, token) in [("1.", "1."), ("1.2.3", "1.2.3"), (".5", ".5")] {
            assert_eq!(
                parse(text),
                Err(ParseError::InvalidNumber {
                    position: 0,
                    token: token.to_string()
                }),
                "{text}"
            );
        }
    }

    fn nested(depth: usize) -> String {
        format!("{}1{}", "(".repeat(depth), ")".repeat(depth))
    }

    fn chain(terms: usize, operator: &str) -> String {
        vec!["1"; terms].join(operator)
    }

    #[test]
    fn nesting_is_capped() {
        assert_eq!(parse(&nested(MAX_DEPTH)).unwrap(), leaf(1.0));
        assert_eq!(
            parse(&nested(MAX_DEPTH + 1)),
            Err(ParseError::TooDeep {
                position: MAX_DEPTH
            })
        );
        assert!(matches!(
            parse(&nested(100_000)),
            Err(ParseError::TooDeep { .. })
        ));
    }

    #[test]
    fn long_operator_chains_are_capped() {
        // The k-th operator of a chain of single digits sits at 2k - 1.
        for operator in ["+", "*"] {
            assert!(parse(&chain(MAX_DEPTH + 1, operator)).is_ok(), "{operator}");
            assert_eq!(
                parse(&chain(MAX_DEPTH + 2, operator)),
                Err(ParseError::TooDeep {
                    position: 2 * (MAX_DEPTH + 1) - 1
                }),
                "{operator}"
            );
            assert!(matches!(
                parse(&chain(100_000, operator)),
                Err(ParseError::TooDeep { .. })
            ));
        }
    }

    #[test]
    fn nesting_and_chains_share_the_cap() {
        // Each level adds two operations of depth but only one parenthesis.
        let levels = |n: usize| format!("{}1{}", "(".repeat(n), ")*1*1".repeat(n));

        assert!(parse(&levels(MAX_DEPTH / 2)).is_ok());
        assert!(matches!(
            parse(&levels(MAX_DEPTH / 2 + 1)),
            Err(ParseError::TooDeep { .. })
        ));
    }

    #[test]
    fn errors_report_their_position() {
        assert_eq!(parse("2++2").unwrap_err().position(), Some(2));
        assert_eq!(parse("").unwrap_err().position(), None);
    }
}
