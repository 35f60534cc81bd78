//! Contract verification pipeline
//!
//! Every contract goes through the same steps for a transaction:
//!
//! 1. **Program check**: states declaring the program id must carry the
//!    contract's data; states of other programs are never looked at
//! 2. **Resolve command**: exactly one command addresses the program
//! 3. **Group** states by the contract's projection
//! 4. **Dispatch** each group to the contract's rules
//! 5. **Aggregate** every violated predicate of every group

use crate::{
    error::Violations,
    grouping::{group_states, StateGroup},
    requirements::Requirements,
    settlement::SettlementOracle,
    transaction::{CommandData, ProgramId, StateData, TransactionForVerification, TransactionState},
    Error, Result,
};
use contract_core::{Calendar, PublicKey, SecureHash};
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, warn};

/// Collaborators shared by every contract verified on a transaction
#[derive(Clone, Copy)]
pub struct VerificationContext<'a> {
    /// Transaction under verification
    pub tx: &'a TransactionForVerification,
    /// Cash settlement lookups
    pub settlement: &'a dyn SettlementOracle,
    /// Calendar for roll-out expansion
    pub calendar: &'a dyn Calendar,
    /// Roll-out period limit
    pub max_periods: usize,
}

impl fmt::Debug for VerificationContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationContext")
            .field("tx", &self.tx.id)
            .field("settlement", &self.settlement)
            .field("max_periods", &self.max_periods)
            .finish()
    }
}

/// Contract command together with the keys that signed it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommand<'a, T> {
    /// Typed command
    pub value: T,
    /// Validated signers
    pub signers: &'a BTreeSet<PublicKey>,
}

impl<T> ResolvedCommand<'_, T> {
    /// Signed by `key`
    pub fn is_signed_by(&self, key: &PublicKey) -> bool {
        self.signers.contains(key)
    }
}

/// Verification rules of one contract type
pub trait Contract: fmt::Debug + Send + Sync {
    /// Name used in errors and logs
    const NAME: &'static str;

    /// State payload
    type State: fmt::Debug;
    /// Recognised commands
    type Command: fmt::Debug;
    /// Grouping projection
    type Key: Ord;

    /// Program id states must declare
    fn program_id(&self) -> ProgramId;

    /// Hash of the legal prose the code implements
    fn legal_contract_reference(&self) -> SecureHash;

    /// Payload if `data` belongs to this contract
    fn state(data: &StateData) -> Option<&Self::State>;

    /// Typed command if `data` is one this contract understands
    fn command(data: &CommandData) -> Option<Self::Command>;

    /// Projection deciding which states form one group
    fn grouping_key(state: &Self::State) -> Self::Key;

    /// Named predicates for one group
    fn verify_group(
        &self,
        ctx: &VerificationContext<'_>,
        command: &ResolvedCommand<'_, Self::Command>,
        group: &StateGroup<'_, Self::State, Self::Key>,
    ) -> Result<Requirements>;
}

/// Object-safe view of a contract, for registries
pub trait Program: fmt::Debug + Send + Sync {
    /// Contract name
    fn name(&self) -> &'static str;

    /// Program id
    fn id(&self) -> ProgramId;

    /// Verify the transaction against this program
    fn verify(&self, ctx: &VerificationContext<'_>) -> Result<()>;
}

impl<C: Contract> Program for C {
    fn name(&self) -> &'static str {
        C::NAME
    }

    fn id(&self) -> ProgramId {
        self.program_id()
    }

    fn verify(&self, ctx: &VerificationContext<'_>) -> Result<()> {
        verify_contract(self, ctx)
    }
}

fn program_states<'a, C: Contract>(
    program_id: &ProgramId,
    states: &'a [TransactionState],
) -> Result<Vec<&'a C::State>> {
    states
        .iter()
        .filter(|state| state.program_ref == *program_id)
        .map(|state| {
            C::state(&state.data).ok_or(Error::ProgramMismatch {
                program_id: *program_id,
                found: state.data.kind(),
            })
        })
        .collect()
}

/// Run the full pipeline for one contract
pub fn verify_contract<C: Contract>(contract: &C, ctx: &VerificationContext<'_>) -> Result<()> {
    let program_id = Contract::program_id(contract);
    let tx = ctx.tx;

    let inputs = program_states::<C>(&program_id, &tx.inputs)?;
    let outputs = program_states::<C>(&program_id, &tx.outputs)?;

    let commands = tx.commands_for(&program_id);
    let command = match commands.as_slice() {
        [command] => *command,
        _ => {
            warn!(
                program = C::NAME,
                tx = %tx.id,
                found = commands.len(),
                "Command resolution failed"
            );
            return Err(Error::CommandResolution {
                program: C::NAME,
                found: commands.len(),
            });
        }
    };
    let resolved = ResolvedCommand {
        value: C::command(&command.data).ok_or_else(|| Error::UnrecognizedCommand {
            program: C::NAME,
            command: command.data.to_string(),
        })?,
        signers: &command.signers,
    };

    let groups = group_states(&inputs, &outputs, C::grouping_key);
    debug!(
        program = C::NAME,
        tx = %tx.id,
        command = ?resolved.value,
        groups = groups.len(),
        "Verifying contract"
    );

    let mut violations = Violations::default();
    for (index, group) in groups.iter().enumerate() {
        let requirements = contract.verify_group(ctx, &resolved, group)?;
        for requirement in requirements.violations() {
            violations.push(index, requirement);
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        warn!(
            program = C::NAME,
            tx = %tx.id,
            violations = violations.len(),
            "Transaction rejected"
        );
        Err(Error::PredicatesViolated(violations))
    }
}
