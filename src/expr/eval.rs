//! Direct recursive evaluation of an operation tree.

use thiserror::Error;

use super::OperationNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("division by zero")]
    DivisionByZero,
}

/// Evaluate a tree, children before parents.
///
/// Non-finite results are returned as-is; rejecting them is the caller's
/// decision.
pub fn evaluate(node: &OperationNode) -> Result<f64, EvalError> {
    match node {
        OperationNode::Leaf { value } => Ok(*value),
        OperationNode::Operation {
            operator,
            left,
            right,
            ..
        } => {
            let left = evaluate(left)?;
            let right = evaluate(right)?;
            operator.apply(left, right)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parse;

    fn eval(text: &str) -> Result<f64, EvalError> {
        evaluate(&parse(text).expect("test expression should parse"))
    }

    fn assert_close(text: &str, expected: f64) {
        let got = eval(text).unwrap();
        assert!(
            (got - expected).abs() < 1e-9,
            "{text}: expected {expected}, got {got}"
        );
    }

    #[test]
    fn evaluates_with_standard_precedence() {
        assert_close("5-3", 2.0);
        assert_close("2+2*2", 6.0);
        assert_close("(2+3)*4", 20.0);
        assert_close("10-4-3", 3.0);
        assert_close("100/10/5", 2.0);
        assert_close("2*(3+4)*5", 70.0);
        assert_close("-2*-3", 6.0);
        assert_close("+1.5+2.25", 3.75);
        assert_close("((7))", 7.0);
        assert_close("1/3*3", 1.0);
        assert_close("(1+2)*(3+4)-(5-6)/2", 21.5);
    }

    #[test]
    fn deepest_accepted_chain_evaluates() {
        let terms = crate::expr::parser::MAX_DEPTH + 1;
        assert_close(&vec!["1"; terms].join("+"), terms as f64);
    }

    #[test]
    fn division_by_zero_fails() {
        assert_eq!(eval("1/0"), Err(EvalError::DivisionByZero));
        assert_eq!(eval("1/(2-2)"), Err(EvalError::DivisionByZero));
        assert_eq!(eval("0/0"), Err(EvalError::DivisionByZero));
    }

    #[test]
    fn overflow_is_not_an_eval_error() {
        let text = format!("{max}*{max}", max = "9".repeat(200));
        assert!(eval(&text).unwrap().is_infinite());
    }
}
