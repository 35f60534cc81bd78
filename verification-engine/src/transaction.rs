//! Transactions as seen by contract verification
//!
//! States and commands arrive already deserialized and signature-checked;
//! this module only models them.

use crate::{
    commercial_paper::CommercialPaperState, settlement::CashState, universal::UniversalState,
};
use chrono::{DateTime, Utc};
use contract_core::{perceivable::Value, Environment, PublicKey, SecureHash};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Content hash binding a state to its verification rules
pub type ProgramId = SecureHash;

/// Contract payload of a ledger state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateData {
    /// Commercial paper position
    CommercialPaper(CommercialPaperState),
    /// Arrangement-governed position
    Universal(UniversalState),
    /// Cash, verified by an external program
    Cash(CashState),
}

impl StateData {
    /// Payload kind, for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            StateData::CommercialPaper(_) => "commercial paper",
            StateData::Universal(_) => "universal",
            StateData::Cash(_) => "cash",
        }
    }
}

/// Ledger state referenced by a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionState {
    /// Program the state declares
    pub program_ref: ProgramId,
    /// Payload
    pub data: StateData,
}

impl TransactionState {
    /// Create new state
    pub fn new(program_ref: ProgramId, data: StateData) -> Self {
        Self { program_ref, data }
    }
}

/// Transition asserted by a command
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CommandData {
    /// Create new states; the nonce makes the transaction id unique
    Issue {
        /// Number used once
        nonce: u64,
    },
    /// Change owner
    Move,
    /// Retire against payment
    Redeem,
    /// Exercise a named action of an arrangement
    Exercise {
        /// Action name
        action: String,
    },
    /// Discharge the obligations due now
    Settle,
    /// Anything else
    Other(String),
}

impl CommandData {
    /// Issue command with a random nonce
    pub fn issue() -> Self {
        CommandData::Issue {
            nonce: rand::random(),
        }
    }

    /// Exercise command
    pub fn exercise(action: impl Into<String>) -> Self {
        CommandData::Exercise {
            action: action.into(),
        }
    }

    /// Command name
    pub fn name(&self) -> &str {
        match self {
            CommandData::Issue { .. } => "Issue",
            CommandData::Move => "Move",
            CommandData::Redeem => "Redeem",
            CommandData::Exercise { .. } => "Exercise",
            CommandData::Settle => "Settle",
            CommandData::Other(name) => name,
        }
    }
}

impl fmt::Display for CommandData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandData::Exercise { action } => write!(f, "Exercise({})", action),
            other => write!(f, "{}", other.name()),
        }
    }
}

/// Command together with the keys that authorised it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Program the command addresses
    pub program_id: ProgramId,
    /// Asserted transition
    pub data: CommandData,
    /// Keys whose signatures were already validated
    pub signers: BTreeSet<PublicKey>,
}

impl Command {
    /// Create new command
    pub fn new(
        program_id: ProgramId,
        data: CommandData,
        signers: impl IntoIterator<Item = PublicKey>,
    ) -> Self {
        Self {
            program_id,
            data,
            signers: signers.into_iter().collect(),
        }
    }

    /// Signed by `key`
    pub fn is_signed_by(&self, key: &PublicKey) -> bool {
        self.signers.contains(key)
    }
}

/// Transaction handed to contract verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionForVerification {
    /// Transaction id
    pub id: SecureHash,
    /// Consumed states
    pub inputs: Vec<TransactionState>,
    /// Created states
    pub outputs: Vec<TransactionState>,
    /// Commands
    pub commands: Vec<Command>,
    /// Transaction timestamp
    pub time: DateTime<Utc>,
    /// Oracle-supplied observable values
    pub facts: BTreeMap<String, Value>,
}

impl TransactionForVerification {
    /// Empty transaction
    pub fn new(id: SecureHash, time: DateTime<Utc>) -> Self {
        Self {
            id,
            inputs: Vec::new(),
            outputs: Vec::new(),
            commands: Vec::new(),
            time,
            facts: BTreeMap::new(),
        }
    }

    /// Add a consumed state
    pub fn with_input(mut self, program_ref: ProgramId, data: StateData) -> Self {
        self.inputs.push(TransactionState::new(program_ref, data));
        self
    }

    /// Add a created state
    pub fn with_output(mut self, program_ref: ProgramId, data: StateData) -> Self {
        self.outputs.push(TransactionState::new(program_ref, data));
        self
    }

    /// Add a command
    pub fn with_command(
        mut self,
        program_id: ProgramId,
        data: CommandData,
        signers: impl IntoIterator<Item = PublicKey>,
    ) -> Self {
        self.commands.push(Command::new(program_id, data, signers));
        self
    }

    /// Add an observed fact
    pub fn with_fact(mut self, name: impl Into<String>, value: Value) -> Self {
        self.facts.insert(name.into(), value);
        self
    }

    /// Commands addressed to `program_id`
    pub fn commands_for(&self, program_id: &ProgramId) -> Vec<&Command> {
        self.commands
            .iter()
            .filter(|c| c.program_id == *program_id)
            .collect()
    }

    /// Every program referenced by a state or a command, in id order
    pub fn programs(&self) -> BTreeSet<ProgramId> {
        self.inputs
            .iter()
            .chain(self.outputs.iter())
            .map(|s| s.program_ref)
            .chain(self.commands.iter().map(|c| c.program_id))
            .collect()
    }

    /// Perceivable environment: transaction time plus facts
    pub fn environment(&self) -> Environment {
        let mut env = Environment::new().at(self.time);
        for (name, value) in &self.facts {
            env.bind_value(name.clone(), *value);
        }
        env
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn test_issue_nonces_differ() {
        // a collision has probability 2^-64
        assert_ne!(CommandData::issue(), CommandData::issue());
    }

    #[test]
    fn test_commands_for_program() {
        let cp = SecureHash::sha256("cp");
        let other = SecureHash::sha256("other");
        let key = PublicKey::from_bytes([1; 32]);
        let tx = TransactionForVerification::new(SecureHash::sha256("tx"), Utc::now())
            .with_command(cp, CommandData::Move, [key])
            .with_command(other, CommandData::Redeem, [key]);

        let commands = tx.commands_for(&cp);
        assert_eq!(commands.len(), 1);
        assert!(commands[0].is_signed_by(&key));
        assert_eq!(tx.programs().len(), 2);
    }

    #[test]
    fn test_environment_binds_time_and_facts() {
        let time = Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap();
        let tx = TransactionForVerification::new(SecureHash::sha256("tx"), time)
            .with_fact("libor", Value::Decimal(dec!(0.031)));

        let env = tx.environment();
        assert_eq!(env.time(), Some(time));
        assert_eq!(env.get("libor"), Some(&Value::Decimal(dec!(0.031))));
    }

    #[test]
    fn test_command_display() {
        assert_eq!(CommandData::exercise("call").to_string(), "Exercise(call)");
        assert_eq!(CommandData::Other("Split".into()).to_string(), "Split");
    }
}
