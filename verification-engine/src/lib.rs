//! Verification Engine
//!
//! Decides whether a proposed ledger transaction is a legal transition of
//! the contract states it consumes and creates.
//!
//! # Architecture
//!
//! For every program present on a transaction:
//!
//! 1. **Program check**: states declaring the program carry its data
//! 2. **Resolve command**: exactly one command addresses the program
//! 3. **Group**: states are partitioned by the contract's projection
//! 4. **Dispatch**: each group is checked against named predicates
//! 5. **Aggregate**: every violated predicate is reported together
//!
//! Verification is synchronous and pure: the same transaction always yields
//! the same outcome and the same violation list.
//!
//! # Example
//!
//! ```
//! use chrono::Utc;
//! use verification_engine::{
//!     commercial_paper::commercial_paper_program_id, CommandData, Config,
//!     TransactionForVerification, Verifier,
//! };
//! use contract_core::{PublicKey, SecureHash};
//!
//! let verifier = Verifier::standard(Config::default()).unwrap();
//! let tx = TransactionForVerification::new(SecureHash::sha256("tx-1"), Utc::now())
//!     .with_command(commercial_paper_program_id(), CommandData::Move, [PublicKey::NULL]);
//!
//! // a command without states has nothing to check
//! assert!(verifier.verify(&tx).is_accepted());
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod commercial_paper;
pub mod config;
pub mod contract;
pub mod error;
pub mod grouping;
pub mod requirements;
pub mod settlement;
pub mod transaction;
pub mod universal;
pub mod verifier;

// Re-exports
pub use commercial_paper::{CommercialPaper, CommercialPaperCommand, CommercialPaperState, InstitutionReference};
pub use config::Config;
pub use contract::{verify_contract, Contract, Program, ResolvedCommand, VerificationContext};
pub use error::{Error, PredicateViolation, Result, Violations};
pub use settlement::{CashSettlement, CashState, SettlementOracle};
pub use transaction::{Command, CommandData, ProgramId, StateData, TransactionForVerification, TransactionState};
pub use universal::{UniversalCommand, UniversalContract, UniversalState};
pub use verifier::{ProgramOutcome, VerificationReport, Verifier};
