//! Settlement oracle
//!
//! Contracts that are paid in cash only ask how much a key received in a
//! transaction's outputs; cash itself is verified by its own program.

use crate::{
    transaction::{ProgramId, StateData, TransactionState},
    Error, Result,
};
use contract_core::{Amount, Currency, PublicKey, SecureHash};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Cash holding
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CashState {
    /// Current holder
    pub owner: PublicKey,
    /// Amount held
    pub amount: Amount,
}

/// Program id of cash states
pub fn cash_program_id() -> ProgramId {
    SecureHash::sha256("cash")
}

/// Answers how much cash a key receives
pub trait SettlementOracle: Debug + Send + Sync {
    /// Total of `currency` paid to `owner` by `outputs`
    ///
    /// A total that cannot be represented is an error, never a capped value.
    fn sum_received_by(
        &self,
        outputs: &[TransactionState],
        owner: &PublicKey,
        currency: Currency,
    ) -> Result<Amount>;
}

/// Sums cash outputs declared under the cash program
#[derive(Debug, Clone, Copy, Default)]
pub struct CashSettlement;

impl SettlementOracle for CashSettlement {
    fn sum_received_by(
        &self,
        outputs: &[TransactionState],
        owner: &PublicKey,
        currency: Currency,
    ) -> Result<Amount> {
        let program_id = cash_program_id();
        outputs
            .iter()
            .filter(|state| state.program_ref == program_id)
            .filter_map(|state| match &state.data {
                StateData::Cash(cash) if cash.owner == *owner => Some(cash.amount),
                _ => None,
            })
            .filter(|amount| amount.currency == currency)
            .try_fold(Amount::zero(currency), |total, amount| {
                total.checked_add(&amount).ok_or(Error::Evaluation(
                    contract_core::Error::ArithmeticOverflow {
                        operation: "received cash total",
                    },
                ))
            })
    }
}
