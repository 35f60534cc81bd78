//! Commercial paper
//!
//! A company issues paper with a face value and a maturity date, sells it
//! below face value, and pays the face value in cash to whoever holds it on
//! redemption. Paper cannot be split or merged.

use crate::{
    contract::{Contract, ResolvedCommand, VerificationContext},
    grouping::StateGroup,
    requirements::{require_that, Requirements},
    transaction::{CommandData, ProgramId, StateData},
    Result,
};
use chrono::{DateTime, Utc};
use contract_core::{Amount, Party, PublicKey, SecureHash};
use serde::{Deserialize, Serialize};

/// Program id of commercial paper states
pub fn commercial_paper_program_id() -> ProgramId {
    SecureHash::sha256("universal-contracts/commercial-paper/v1")
}

/// Issuer together with its reference for the issuance
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstitutionReference {
    /// Issuing institution
    pub institution: Party,
    /// Issuer's reference
    pub reference: String,
}

/// Commercial paper position
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommercialPaperState {
    /// Issuance the paper belongs to
    pub issuance: InstitutionReference,
    /// Current holder
    pub owner: PublicKey,
    /// Amount paid on redemption
    pub face_value: Amount,
    /// Earliest redemption time (exclusive)
    pub maturity_date: DateTime<Utc>,
}

impl CommercialPaperState {
    /// Same paper with the null owner; grouping only
    pub fn without_owner(&self) -> Self {
        Self {
            owner: PublicKey::NULL,
            ..self.clone()
        }
    }

    /// Same paper held by `owner`
    pub fn with_owner(&self, owner: PublicKey) -> Self {
        Self {
            owner,
            ..self.clone()
        }
    }
}

/// Commercial paper commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommercialPaperCommand {
    /// Bring new paper into existence
    Issue {
        /// Number used once
        nonce: u64,
    },
    /// Transfer to a new owner
    Move,
    /// Retire against cash
    Redeem,
}

/// Commercial paper rules
#[derive(Debug, Clone, Copy, Default)]
pub struct CommercialPaper;

impl Contract for CommercialPaper {
    const NAME: &'static str = "CommercialPaper";

    type State = CommercialPaperState;
    type Command = CommercialPaperCommand;
    type Key = CommercialPaperState;

    fn program_id(&self) -> ProgramId {
        commercial_paper_program_id()
    }

    fn legal_contract_reference(&self) -> SecureHash {
        SecureHash::sha256("https://en.wikipedia.org/wiki/Commercial_paper")
    }

    fn state(data: &StateData) -> Option<&CommercialPaperState> {
        match data {
            StateData::CommercialPaper(state) => Some(state),
            _ => None,
        }
    }

    fn command(data: &CommandData) -> Option<CommercialPaperCommand> {
        match data {
            CommandData::Issue { nonce } => Some(CommercialPaperCommand::Issue { nonce: *nonce }),
            CommandData::Move => Some(CommercialPaperCommand::Move),
            CommandData::Redeem => Some(CommercialPaperCommand::Redeem),
            _ => None,
        }
    }

    // any change besides the owner makes it a different paper
    fn grouping_key(state: &CommercialPaperState) -> CommercialPaperState {
        state.without_owner()
    }

    fn verify_group(
        &self,
        ctx: &VerificationContext<'_>,
        command: &ResolvedCommand<'_, CommercialPaperCommand>,
        group: &StateGroup<'_, CommercialPaperState, CommercialPaperState>,
    ) -> Result<Requirements> {
        let tx = ctx.tx;
        let signed_by_owner =
            |state: Option<&CommercialPaperState>| state.is_some_and(|s| command.is_signed_by(&s.owner));

        Ok(match command.value {
            CommercialPaperCommand::Move => {
                let input = group.single_input();
                require_that(|r| {
                    r.require("there is exactly one input state", input.is_some());
                    r.require("the transaction is signed by the owner of the CP", signed_by_owner(input));
                    r.require("the state is propagated", group.outputs.len() == 1);
                })
            }

            CommercialPaperCommand::Redeem => {
                let input = group.single_input();
                let received = input
                    .map(|paper| {
                        ctx.settlement.sum_received_by(
                            &tx.outputs,
                            &paper.owner,
                            paper.face_value.currency,
                        )
                    })
                    .transpose()?;
                let paid_in_full = input
                    .zip(received)
                    .is_some_and(|(paper, received)| received == paper.face_value);
                require_that(|r| {
                    r.require("there is exactly one input state", input.is_some());
                    r.require(
                        "the paper must have matured",
                        input.is_some_and(|paper| paper.maturity_date < tx.time),
                    );
                    r.require("the received amount equals the face value", paid_in_full);
                    r.require("the paper must be destroyed", group.outputs.is_empty());
                    r.require("the transaction is signed by the owner of the CP", signed_by_owner(input));
                })
            }

            CommercialPaperCommand::Issue { .. } => {
                let output = group.single_output();
                require_that(|r| {
                    r.require("there is exactly one output state", output.is_some());
                    // nobody may issue paper under another institution's name
                    r.require(
                        "the issuance is signed by the claimed issuer of the paper",
                        output.is_some_and(|paper| {
                            command.is_signed_by(&paper.issuance.institution.owning_key())
                        }),
                    );
                    r.require(
                        "the face value is not zero",
                        output.is_some_and(|paper| paper.face_value.is_positive()),
                    );
                    r.require(
                        "the maturity date is not in the past",
                        output.is_some_and(|paper| paper.maturity_date > tx.time),
                    );
                    r.require("there is no input state", group.inputs.is_empty());
                })
            }
        })
    }
}
