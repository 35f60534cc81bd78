//! Error types for the contract algebra

use crate::perceivable::ValueKind;
use chrono::NaiveDate;
use std::fmt;
use thiserror::Error;

/// Result type for contract algebra operations
pub type Result<T> = std::result::Result<T, Error>;

/// Contract algebra errors
#[derive(Error, Debug)]
pub enum Error {
    /// A perceivable referenced a variable the environment does not bind
    #[error("Unbound variable: {name}")]
    UnboundVariable {
        /// Variable name
        name: String,
    },

    /// A binding or sub-expression produced a value of the wrong kind
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Kind required by the expression
        expected: ValueKind,
        /// Kind actually produced
        found: ValueKind,
    },

    /// Decimal arithmetic left the representable range
    #[error("Arithmetic overflow in {operation}")]
    ArithmeticOverflow {
        /// Operation that overflowed
        operation: &'static str,
    },

    /// Division with a zero divisor
    #[error("Division by zero")]
    DivisionByZero,

    /// A period date was evaluated outside of a roll-out body
    #[error("Period date evaluated outside of a roll-out")]
    UnresolvedPeriodDate,

    /// Construction used a form that cannot be expressed
    #[error("Disallowed construct: {0}")]
    DisallowedConstruct(Construct),

    /// Roll-out would generate more periods than allowed
    #[error("Roll-out from {start} to {end} exceeds {limit} periods")]
    RollOutTooLong {
        /// First period start
        start: NaiveDate,
        /// Roll-out end
        end: NaiveDate,
        /// Configured period limit
        limit: usize,
    },

    /// A date string could not be parsed
    #[error("Invalid date '{input}': {reason}")]
    InvalidDate {
        /// Text that failed to parse
        input: String,
        /// Parser message
        reason: String,
    },

    /// Calendar arithmetic left chrono's supported range
    #[error("Date out of range: {0}")]
    DateOutOfRange(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Builder forms rejected when an arrangement is finalised
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Construct {
    /// `action(..)` called directly on a contract builder
    UnscopedAction {
        /// Action name
        name: String,
    },
    /// `anytime(..)` outside an actor-scoped block
    UnscopedAnytime {
        /// Action name
        name: String,
    },
    /// `given_that(..)` outside an actor-scoped block
    UnscopedGivenThat {
        /// Action name
        name: String,
    },
    /// `may(..)` outside an `actions` block
    UnscopedMay,
    /// `may(..)` with nobody allowed to act
    EmptyActorSet,
    /// `next()` outside a roll-out body
    ContinuationOutsideRollOut,
    /// period start/end referenced outside a roll-out body
    PeriodDateOutsideRollOut,
}

impl fmt::Display for Construct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Construct::UnscopedAction { name } => {
                write!(f, "action '{}' must be declared inside an actor scope", name)
            }
            Construct::UnscopedAnytime { name } => {
                write!(f, "anytime '{}' is only available inside an actor scope", name)
            }
            Construct::UnscopedGivenThat { name } => {
                write!(f, "given_that '{}' is only available inside an actor scope", name)
            }
            Construct::UnscopedMay => write!(f, "may is only available inside an actions block"),
            Construct::EmptyActorSet => write!(f, "an action scope needs at least one actor"),
            Construct::ContinuationOutsideRollOut => {
                write!(f, "next() is only available inside a roll-out body")
            }
            Construct::PeriodDateOutsideRollOut => {
                write!(f, "period dates are only available inside a roll-out body")
            }
        }
    }
}
