//! Arrangement-governed contract
//!
//! The state carries the remaining [`Arrangement`]; a transaction is legal if
//! its outputs are exactly what the arrangement becomes after the asserted
//! step. All universal states on a transaction form one group.

use crate::{
    contract::{Contract, ResolvedCommand, VerificationContext},
    grouping::StateGroup,
    requirements::{require_that, Requirements},
    transaction::{CommandData, ProgramId, StateData},
    Error, Result,
};
use contract_core::{Arrangement, Currency, PublicKey, SecureHash};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Program id of universal states
pub fn universal_program_id() -> ProgramId {
    SecureHash::sha256("universal-contracts/universal/v1")
}

/// Position governed by an arrangement
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UniversalState {
    /// Remaining obligations and choices
    pub details: Arrangement,
}

impl UniversalState {
    /// Create new state
    pub fn new(details: Arrangement) -> Self {
        Self { details }
    }
}

/// Universal contract commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UniversalCommand {
    /// Create a new arrangement
    Issue,
    /// Exercise the named action
    Exercise(String),
    /// Discharge the obligations due now
    Settle,
}

/// Universal contract rules
#[derive(Debug, Clone, Copy, Default)]
pub struct UniversalContract;

fn outputs_arrangement(group: &StateGroup<'_, UniversalState, ()>) -> Arrangement {
    Arrangement::all(group.outputs.iter().map(|state| state.details.clone()))
}

impl UniversalContract {
    fn verify_issue(
        &self,
        command: &ResolvedCommand<'_, UniversalCommand>,
        group: &StateGroup<'_, UniversalState, ()>,
    ) -> Requirements {
        let output = group.single_output();
        require_that(|r| {
            r.require("there is no input state", group.inputs.is_empty());
            r.require("there is exactly one output state", output.is_some());
            r.require(
                "the arrangement is well formed",
                output.is_some_and(|state| state.details.validate().is_ok()),
            );
            r.require(
                "the issuance is signed by all liable parties",
                output.is_some_and(|state| {
                    state
                        .details
                        .liable_parties()
                        .iter()
                        .all(|party| command.is_signed_by(&party.owning_key()))
                }),
            );
        })
    }

    fn verify_exercise(
        &self,
        ctx: &VerificationContext<'_>,
        command: &ResolvedCommand<'_, UniversalCommand>,
        name: &str,
        group: &StateGroup<'_, UniversalState, ()>,
    ) -> Result<Requirements> {
        let Some(input) = group.single_input() else {
            return Ok(require_that(|r| {
                r.require("there is exactly one input state", false);
            }));
        };

        let arrangement = input.details.expand(ctx.calendar, ctx.max_periods)?;
        let candidates: Vec<_> = arrangement
            .actions()
            .into_iter()
            .filter(|action| action.name() == name)
            .collect();
        let action = match candidates.as_slice() {
            [action] => Some(*action),
            _ => None,
        };

        let condition_holds = match action {
            Some(action) => action.condition().evaluate(&ctx.tx.environment())?,
            None => false,
        };
        let outputs_match = action
            .and_then(|action| arrangement.exercise(action))
            .is_some_and(|expected| outputs_arrangement(group) == expected);

        Ok(require_that(|r| {
            r.require("there is exactly one input state", true);
            r.require("the action is defined", !candidates.is_empty());
            r.require("the action is unique", candidates.len() <= 1);
            r.require(
                "the action is authorised by one of its actors",
                action.is_some_and(|action| {
                    action
                        .actors()
                        .iter()
                        .any(|actor| command.is_signed_by(&actor.owning_key()))
                }),
            );
            r.require("the condition of the action holds", condition_holds);
            r.require("the outputs match the exercised arrangement", outputs_match);
        }))
    }

    fn verify_settle(
        &self,
        ctx: &VerificationContext<'_>,
        command: &ResolvedCommand<'_, UniversalCommand>,
        group: &StateGroup<'_, UniversalState, ()>,
    ) -> Result<Requirements> {
        let Some(input) = group.single_input() else {
            return Ok(require_that(|r| {
                r.require("there is exactly one input state", false);
            }));
        };

        let arrangement = input.details.expand(ctx.calendar, ctx.max_periods)?;
        let obligations = arrangement.obligations();
        let env = ctx.tx.environment();

        let mut due: BTreeMap<(PublicKey, Currency), Decimal> = BTreeMap::new();
        for obligation in &obligations {
            let amount = obligation.amount.evaluate(&env)?;
            let total = due
                .entry((obligation.beneficiary.owning_key(), obligation.currency))
                .or_default();
            *total = total.checked_add(amount).ok_or(Error::Evaluation(
                contract_core::Error::ArithmeticOverflow {
                    operation: "settlement total",
                },
            ))?;
        }

        let mut paid_in_full = true;
        for ((beneficiary, currency), amount) in &due {
            let received = ctx
                .settlement
                .sum_received_by(&ctx.tx.outputs, beneficiary, *currency)?;
            paid_in_full &= received.quantity >= *amount;
        }
        let signed_by_obligors = obligations
            .iter()
            .all(|obligation| command.is_signed_by(&obligation.obligor.owning_key()));

        Ok(require_that(|r| {
            r.require("there is exactly one input state", true);
            r.require("there are obligations due", !obligations.is_empty());
            r.require("every beneficiary is paid in full", paid_in_full);
            r.require("the transaction is signed by every obligor", signed_by_obligors);
            r.require(
                "the outputs match the remaining arrangement",
                outputs_arrangement(group) == arrangement.without_obligations(),
            );
        }))
    }
}

impl Contract for UniversalContract {
    const NAME: &'static str = "UniversalContract";

    type State = UniversalState;
    type Command = UniversalCommand;
    type Key = ();

    fn program_id(&self) -> ProgramId {
        universal_program_id()
    }

    fn legal_contract_reference(&self) -> SecureHash {
        SecureHash::sha256("universal-contracts/universal/legal-prose")
    }

    fn state(data: &StateData) -> Option<&UniversalState> {
        match data {
            StateData::Universal(state) => Some(state),
            _ => None,
        }
    }

    fn command(data: &CommandData) -> Option<UniversalCommand> {
        match data {
            CommandData::Issue { .. } => Some(UniversalCommand::Issue),
            CommandData::Exercise { action } => Some(UniversalCommand::Exercise(action.clone())),
            CommandData::Settle => Some(UniversalCommand::Settle),
            _ => None,
        }
    }

    fn grouping_key(_state: &UniversalState) {}

    fn verify_group(
        &self,
        ctx: &VerificationContext<'_>,
        command: &ResolvedCommand<'_, UniversalCommand>,
        group: &StateGroup<'_, UniversalState, ()>,
    ) -> Result<Requirements> {
        match &command.value {
            UniversalCommand::Issue => Ok(self.verify_issue(command, group)),
            UniversalCommand::Exercise(name) => self.verify_exercise(ctx, command, name, group),
            UniversalCommand::Settle => self.verify_settle(ctx, command, group),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_mapping() {
        assert_eq!(
            UniversalContract::command(&CommandData::exercise("call")),
            Some(UniversalCommand::Exercise("call".to_string()))
        );
        assert_eq!(UniversalContract::command(&CommandData::issue()), Some(UniversalCommand::Issue));
        assert_eq!(UniversalContract::command(&CommandData::Redeem), None);
    }

    #[test]
    fn test_state_mapping() {
        let state = StateData::Universal(UniversalState::new(Arrangement::ZERO));
        assert!(UniversalContract::state(&state).is_some());
        assert_eq!(state.kind(), "universal");
    }
}
