//! Program registry and transaction verification
//!
//! A [`Verifier`] holds the programs it knows, the programs it trusts to be
//! verified elsewhere (cash), and the collaborators contracts consult. It is
//! immutable once built and can be shared across threads.

use crate::{
    commercial_paper::CommercialPaper,
    config::Config,
    contract::{Program, VerificationContext},
    settlement::{cash_program_id, CashSettlement, SettlementOracle},
    transaction::{ProgramId, TransactionForVerification},
    universal::UniversalContract,
    Error, Result,
};
use contract_core::{BusinessCalendar, SecureHash};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Outcome for one program present on a transaction
#[derive(Debug)]
pub struct ProgramOutcome {
    /// Program id
    pub program_id: ProgramId,
    /// Contract name, `None` for unknown programs
    pub program: Option<&'static str>,
    /// Verification result
    pub result: Result<()>,
}

/// Result of verifying one transaction
#[derive(Debug)]
pub struct VerificationReport {
    /// Transaction id
    pub transaction: SecureHash,
    /// One outcome per verified program, in program id order
    pub outcomes: Vec<ProgramOutcome>,
}

impl VerificationReport {
    /// Every verified program accepted the transaction
    pub fn is_accepted(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    /// Errors of the rejecting programs
    pub fn errors(&self) -> impl Iterator<Item = &Error> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().err())
    }

    /// Outcome of a program
    pub fn outcome(&self, program_id: &ProgramId) -> Option<&ProgramOutcome> {
        self.outcomes.iter().find(|o| o.program_id == *program_id)
    }

    /// First error, if any
    pub fn into_result(self) -> Result<()> {
        self.outcomes
            .into_iter()
            .map(|o| o.result)
            .find(|r| r.is_err())
            .unwrap_or(Ok(()))
    }
}

/// Verifies transactions against registered programs
#[derive(Debug)]
pub struct Verifier {
    config: Config,
    calendar: BusinessCalendar,
    programs: BTreeMap<ProgramId, Box<dyn Program>>,
    trusted: BTreeSet<ProgramId>,
    settlement: Box<dyn SettlementOracle>,
}

impl Verifier {
    /// Empty registry settling through cash outputs
    pub fn new(config: Config) -> Result<Self> {
        let calendar = config
            .contracts
            .business_calendar()
            .map_err(|e| Error::Config(e.to_string()))?;
        Ok(Self {
            config,
            calendar,
            programs: BTreeMap::new(),
            trusted: BTreeSet::new(),
            settlement: Box::new(CashSettlement),
        })
    }

    /// Commercial paper and universal contracts, cash trusted
    pub fn standard(config: Config) -> Result<Self> {
        let mut verifier = Self::new(config)?;
        verifier
            .register(CommercialPaper)
            .register(UniversalContract)
            .trust(cash_program_id());
        info!(
            service = %verifier.config.service_name,
            version = %verifier.config.service_version,
            programs = verifier.programs.len(),
            "Verifier initialised"
        );
        Ok(verifier)
    }

    /// Register a program; replaces any program with the same id
    pub fn register(&mut self, program: impl Program + 'static) -> &mut Self {
        self.programs.insert(program.id(), Box::new(program));
        self
    }

    /// Treat a program as verified elsewhere
    pub fn trust(&mut self, program_id: ProgramId) -> &mut Self {
        self.trusted.insert(program_id);
        self
    }

    /// Replace the settlement oracle
    pub fn with_settlement(mut self, settlement: impl SettlementOracle + 'static) -> Self {
        self.settlement = Box::new(settlement);
        self
    }

    /// Configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn context<'a>(&'a self, tx: &'a TransactionForVerification) -> VerificationContext<'a> {
        VerificationContext {
            tx,
            settlement: self.settlement.as_ref(),
            calendar: &self.calendar,
            max_periods: self.config.contracts.roll_out.max_periods,
        }
    }

    /// Verify one registered program
    pub fn verify_program(
        &self,
        tx: &TransactionForVerification,
        program_id: &ProgramId,
    ) -> Result<()> {
        let program = self
            .programs
            .get(program_id)
            .ok_or(Error::UnknownProgram(*program_id))?;
        program.verify(&self.context(tx))
    }

    /// Verify every program present on the transaction
    pub fn verify(&self, tx: &TransactionForVerification) -> VerificationReport {
        let ctx = self.context(tx);
        let mut outcomes = Vec::new();

        for program_id in tx.programs() {
            if let Some(program) = self.programs.get(&program_id) {
                outcomes.push(ProgramOutcome {
                    program_id,
                    program: Some(program.name()),
                    result: program.verify(&ctx),
                });
            } else if self.trusted.contains(&program_id) {
                debug!(program = %program_id, tx = %tx.id, "Trusted program, skipping");
            } else if self.config.reject_unknown_programs {
                warn!(program = %program_id, tx = %tx.id, "Unknown program, rejecting");
                outcomes.push(ProgramOutcome {
                    program_id,
                    program: None,
                    result: Err(Error::UnknownProgram(program_id)),
                });
            } else {
                warn!(program = %program_id, tx = %tx.id, "Unknown program, skipping");
            }
        }

        VerificationReport {
            transaction: tx.id,
            outcomes,
        }
    }
}
