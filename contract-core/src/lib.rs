//! Universal Contracts Core
//!
//! Composable algebra for multi-party financial agreements.
//!
//! # Architecture
//!
//! - **Perceivable**: typed expressions over observable values
//! - **Arrangement**: immutable tree of obligations, choices and roll-outs
//! - **Builder**: staged, scoped construction of arrangements
//! - **Calendar**: period arithmetic and business-day adjustment
//!
//! # Invariants
//!
//! - Exact arithmetic: amounts are fixed-point decimals
//! - Deterministic: same inputs → structurally identical arrangements
//! - Canonical sets: `And`/`Actions` are de-duplicated with ≥2 members
//! - Immutable: arrangements are never modified after construction

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod arrangement;
pub mod builder;
pub mod calendar;
pub mod config;
pub mod error;
pub mod perceivable;
pub mod rollout;
pub mod types;

// Re-exports
pub use arrangement::{Action, Arrangement, Obligation, RollOut};
pub use builder::{arrange, arrange_with, ActionBuilder, ActionsBuilder, ContractBuilder};
pub use calendar::{BusinessCalendar, Calendar, DateRollConvention, Frequency};
pub use config::Config;
pub use error::{Construct, Error, Result};
pub use perceivable::{after, before, constant, variable, DateRef, Environment, Perceivable, Value};
pub use types::{millions, thousands, Amount, Currency, Party, PublicKey, SecureHash};
