//! Error types for transaction verification

use contract_core::SecureHash;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type for verification operations
pub type Result<T> = std::result::Result<T, Error>;

/// Verification errors
#[derive(Error, Debug)]
pub enum Error {
    /// Zero or several commands target the program
    #[error("Expected exactly one command for {program}, found {found}")]
    CommandResolution {
        /// Contract name
        program: &'static str,
        /// Number of commands carrying the program id
        found: usize,
    },

    /// The single command does not map to a command of the contract
    #[error("Unrecognised command for {program}: {command}")]
    UnrecognizedCommand {
        /// Contract name
        program: &'static str,
        /// Command name
        command: String,
    },

    /// A state declares the program id but carries another contract's data
    #[error("State declares program {program_id} but carries {found} data")]
    ProgramMismatch {
        /// Declared program id
        program_id: SecureHash,
        /// Kind of data found
        found: &'static str,
    },

    /// One or more named predicates do not hold
    #[error("Predicates violated:\n{0}")]
    PredicatesViolated(Violations),

    /// No registered program matches a state's or command's program id
    #[error("Unknown program: {0}")]
    UnknownProgram(SecureHash),

    /// A perceivable could not be evaluated against the transaction
    #[error("Evaluation error: {0}")]
    Evaluation(#[from] contract_core::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Violated predicates, empty for other errors
    pub fn violations(&self) -> &[PredicateViolation] {
        match self {
            Error::PredicatesViolated(violations) => &violations.violations,
            _ => &[],
        }
    }

    /// True when the named predicate is among the violations
    pub fn violates(&self, requirement: &str) -> bool {
        self.violations()
            .iter()
            .any(|v| v.requirement == requirement)
    }
}

/// Named predicate that failed for one state group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateViolation {
    /// Group index, in grouping order
    pub group: usize,
    /// Predicate name
    pub requirement: String,
}

impl fmt::Display for PredicateViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group {}: {}", self.group, self.requirement)
    }
}

/// Every violation found while verifying one program
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Violations {
    /// Violations in evaluation order
    pub violations: Vec<PredicateViolation>,
}

impl Violations {
    /// Record a violation
    pub fn push(&mut self, group: usize, requirement: impl Into<String>) {
        self.violations.push(PredicateViolation {
            group,
            requirement: requirement.into(),
        });
    }

    /// Nothing recorded
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Number of violations
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// Iterate violations
    pub fn iter(&self) -> impl Iterator<Item = &PredicateViolation> {
        self.violations.iter()
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for violation in &self.violations {
            writeln!(f, "- {}", violation)?;
        }
        Ok(())
    }
}

impl FromIterator<PredicateViolation> for Violations {
    fn from_iter<T: IntoIterator<Item = PredicateViolation>>(iter: T) -> Self {
        Self {
            violations: iter.into_iter().collect(),
        }
    }
}
