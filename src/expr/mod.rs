//! Arithmetic expressions: the operation tree, its grammar, and its evaluation.

pub mod eval;
pub mod parser;

pub use eval::{EvalError, evaluate};
pub use parser::{ParseError, parse};

use serde::{Deserialize, Serialize};

/// A binary arithmetic operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Subtract,
    #[serde(rename = "*")]
    Multiply,
    #[serde(rename = "/")]
    Divide,
}

impl Operator {
    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            '+' => Some(Operator::Add),
            '-' => Some(Operator::Subtract),
            '*' => Some(Operator::Multiply),
            '/' => Some(Operator::Divide),
            _ => None,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Subtract => '-',
            Operator::Multiply => '*',
            Operator::Divide => '/',
        }
    }

    /// Apply the operator to two operands.
    ///
    /// A right operand of exactly zero fails division before dividing.
    /// Overflow to infinity is not an error here.
    pub fn apply(self, left: f64, right: f64) -> Result<f64, EvalError> {
        match self {
            Operator::Add => Ok(left + right),
            Operator::Subtract => Ok(left - right),
            Operator::Multiply => Ok(left * right),
            Operator::Divide if right == 0.0 => Err(EvalError::DivisionByZero),
            Operator::Divide => Ok(left / right),
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl std::str::FromStr for Operator {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Operator::from_symbol(c),
            _ => None,
        }
        .ok_or_else(|| crate::error::Error::Other(format!("unknown operator: {s}")))
    }
}

/// A node of the operation-dependency tree.
///
/// Trees are rebuilt from text on every scheduling pass and never carry
/// computed values for operation nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationNode {
    /// A resolved operand.
    Leaf { value: f64 },
    /// A binary operation over two owned subtrees.
    Operation {
        operator: Operator,
        left: Box<OperationNode>,
        right: Box<OperationNode>,
        /// Set once this node produced a work item during the current walk.
        scheduled: bool,
    },
}

impl OperationNode {
    pub fn leaf(value: f64) -> Self {
        OperationNode::Leaf { value }
    }

    pub fn operation(operator: Operator, left: OperationNode, right: OperationNode) -> Self {
        OperationNode::Operation {
            operator,
            left: Box::new(left),
            right: Box::new(right),
            scheduled: false,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, OperationNode::Leaf { .. })
    }

    pub fn leaf_value(&self) -> Option<f64> {
        match self {
            OperationNode::Leaf { value } => Some(*value),
            OperationNode::Operation { .. } => None,
        }
    }
}
