//! Error types for distcalc.

use thiserror::Error;

use crate::expr::{EvalError, ParseError};
use crate::model::WorkState;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid expression: {0}")]
    Parse(#[from] ParseError),

    #[error("evaluation failed: {0}")]
    Eval(#[from] EvalError),

    #[error("result is out of range: {0}")]
    NonFinite(f64),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition { from: WorkState, to: WorkState },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for errors caused by the submitted expression itself rather than
    /// by the service.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Error::Parse(_) | Error::Eval(_) | Error::NonFinite(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
