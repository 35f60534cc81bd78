//! Staged construction of arrangements
//!
//! ```text
//! arrange(|c| {
//!     c.owes(&issuer, &holder, millions(1), Currency::USD);
//!     c.actions(|a| {
//!         a.may([holder.clone()], |ab| {
//!             ab.given_that("exercise", after(maturity), |c| { ... });
//!         });
//!     });
//! })
//! ```
//!
//! Builders only record what the closures ask for. Forms that cannot be
//! expressed (unscoped actions, `next()` outside a roll-out, empty actor
//! sets) are recorded too and reported by `finish`, the single point where
//! an arrangement is finalised.

use crate::{
    arrangement::{Action, Arrangement, Obligation, RollOut},
    calendar::{BusinessCalendar, Calendar, Frequency},
    config::RollOutConfig,
    error::Construct,
    perceivable::{constant, DateRef, Perceivable},
    types::{Currency, Party},
    Error, Result,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::fmt;
use tracing::trace;

/// Build a top-level arrangement with a plain calendar
pub fn arrange(init: impl FnOnce(&mut ContractBuilder<'_>)) -> Result<Arrangement> {
    let calendar = BusinessCalendar::new();
    arrange_with(&calendar, RollOutConfig::default().max_periods, init)
}

/// Build a top-level arrangement, generating roll-outs with `calendar`
pub fn arrange_with(
    calendar: &dyn Calendar,
    max_periods: usize,
    init: impl FnOnce(&mut ContractBuilder<'_>),
) -> Result<Arrangement> {
    let mut builder = ContractBuilder::new(Scope {
        calendar,
        max_periods,
        in_roll_out: false,
    });
    init(&mut builder);
    let arrangement = builder.finish()?;
    arrangement.validate()?;
    Ok(arrangement)
}

#[derive(Clone, Copy)]
struct Scope<'a> {
    calendar: &'a dyn Calendar,
    max_periods: usize,
    in_roll_out: bool,
}

impl fmt::Debug for Scope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("max_periods", &self.max_periods)
            .field("in_roll_out", &self.in_roll_out)
            .finish()
    }
}

#[derive(Debug)]
enum Entry {
    Arrangement(Arrangement),
    Failed(Error),
}

fn finish_entries(entries: Vec<Entry>) -> Result<Vec<Arrangement>> {
    entries
        .into_iter()
        .map(|entry| match entry {
            Entry::Arrangement(arrangement) => Ok(arrangement),
            Entry::Failed(err) => Err(err),
        })
        .collect()
}

fn disallowed(construct: Construct) -> Entry {
    Entry::Failed(Error::DisallowedConstruct(construct))
}

/// Collects obligations, action sets and roll-outs
#[derive(Debug)]
pub struct ContractBuilder<'a> {
    scope: Scope<'a>,
    entries: Vec<Entry>,
}

impl<'a> ContractBuilder<'a> {
    fn new(scope: Scope<'a>) -> Self {
        Self {
            scope,
            entries: Vec::new(),
        }
    }

    fn push(&mut self, arrangement: Arrangement) -> &mut Self {
        self.entries.push(Entry::Arrangement(arrangement));
        self
    }

    /// `obligor` owes `beneficiary` a fixed amount
    pub fn owes(
        &mut self,
        obligor: &Party,
        beneficiary: &Party,
        amount: Decimal,
        currency: Currency,
    ) -> &mut Self {
        self.owes_perceivable(obligor, beneficiary, constant(amount), currency)
    }

    /// `obligor` owes `beneficiary` an observed amount
    pub fn owes_perceivable(
        &mut self,
        obligor: &Party,
        beneficiary: &Party,
        amount: Perceivable<Decimal>,
        currency: Currency,
    ) -> &mut Self {
        self.push(Arrangement::Obligation(Obligation {
            amount,
            currency,
            obligor: obligor.clone(),
            beneficiary: beneficiary.clone(),
            period: None,
        }))
    }

    /// Alternative actions, each bound to the actors of its `may` block
    pub fn actions(&mut self, init: impl FnOnce(&mut ActionsBuilder<'a>)) -> &mut Self {
        let mut builder = ActionsBuilder {
            scope: self.scope,
            actions: Vec::new(),
            failures: Vec::new(),
        };
        init(&mut builder);
        let entry = match builder.finish() {
            Ok(arrangement) => Entry::Arrangement(arrangement),
            Err(err) => Entry::Failed(err),
        };
        self.entries.push(entry);
        self
    }

    /// Periodic instances of the body between `start` and `end`
    ///
    /// The generated chain is appended, not the template.
    pub fn roll_out(
        &mut self,
        start: NaiveDate,
        end: NaiveDate,
        frequency: Frequency,
        init: impl FnOnce(&mut ContractBuilder<'a>),
    ) -> &mut Self {
        let mut body = ContractBuilder::new(Scope {
            in_roll_out: true,
            ..self.scope
        });
        init(&mut body);
        let generated = body.finish().and_then(|body| {
            RollOut::new(start, end, frequency, body)
                .generate(self.scope.calendar, self.scope.max_periods)
        });
        let entry = match generated {
            Ok(arrangement) => Entry::Arrangement(arrangement),
            Err(err) => Entry::Failed(err),
        };
        self.entries.push(entry);
        self
    }

    /// Next scheduled instance; roll-out bodies only
    pub fn next(&mut self) -> &mut Self {
        if self.scope.in_roll_out {
            self.push(Arrangement::Continuation)
        } else {
            self.entries
                .push(disallowed(Construct::ContinuationOutsideRollOut));
            self
        }
    }

    /// Start date of the current roll-out period
    pub fn start(&self) -> DateRef {
        DateRef::PeriodStart
    }

    /// End date of the current roll-out period
    pub fn end(&self) -> DateRef {
        DateRef::PeriodEnd
    }

    /// Append an already built arrangement
    pub fn include(&mut self, arrangement: Arrangement) -> &mut Self {
        self.push(arrangement)
    }

    /// Parse a date with the builder's calendar
    pub fn date(&self, text: &str) -> Result<NaiveDate> {
        self.scope.calendar.parse_date(text)
    }

    /// Unscoped action; rejected, use `actions` and `may`
    pub fn action(
        &mut self,
        name: impl Into<String>,
        _condition: Perceivable<bool>,
        _actors: BTreeSet<Party>,
        _arrangement: Arrangement,
    ) -> &mut Self {
        self.entries
            .push(disallowed(Construct::UnscopedAction { name: name.into() }));
        self
    }

    /// Unscoped `anytime`; rejected, use `actions` and `may`
    pub fn anytime(
        &mut self,
        name: impl Into<String>,
        _init: impl FnOnce(&mut ContractBuilder<'a>),
    ) -> &mut Self {
        self.entries
            .push(disallowed(Construct::UnscopedAnytime { name: name.into() }));
        self
    }

    /// Unscoped `given_that`; rejected, use `actions` and `may`
    pub fn given_that(
        &mut self,
        name: impl Into<String>,
        _condition: Perceivable<bool>,
        _init: impl FnOnce(&mut ContractBuilder<'a>),
    ) -> &mut Self {
        self.entries
            .push(disallowed(Construct::UnscopedGivenThat { name: name.into() }));
        self
    }

    /// Unscoped `may`; rejected, use `actions`
    pub fn may(
        &mut self,
        _actors: impl IntoIterator<Item = Party>,
        _init: impl FnOnce(&mut ActionBuilder<'a>),
    ) -> &mut Self {
        self.entries.push(disallowed(Construct::UnscopedMay));
        self
    }

    /// Finalise: `[] → Zero`, `[a] → a`, otherwise `And`
    pub fn finish(self) -> Result<Arrangement> {
        let arrangements = finish_entries(self.entries)?;
        trace!(
            entries = arrangements.len(),
            in_roll_out = self.scope.in_roll_out,
            "Finalising contract builder"
        );
        Ok(Arrangement::all(arrangements))
    }
}

/// Collects actor-scoped actions
#[derive(Debug)]
pub struct ActionsBuilder<'a> {
    scope: Scope<'a>,
    actions: Vec<Action>,
    failures: Vec<Error>,
}

impl<'a> ActionsBuilder<'a> {
    /// Actions `actors` may choose from
    pub fn may(
        &mut self,
        actors: impl IntoIterator<Item = Party>,
        init: impl FnOnce(&mut ActionBuilder<'a>),
    ) -> &mut Self {
        let actors: BTreeSet<Party> = actors.into_iter().collect();
        if actors.is_empty() {
            self.failures
                .push(Error::DisallowedConstruct(Construct::EmptyActorSet));
            return self;
        }
        let mut builder = ActionBuilder {
            scope: self.scope,
            actors,
            actions: Vec::new(),
            failures: Vec::new(),
        };
        init(&mut builder);
        self.actions.extend(builder.actions);
        self.failures.extend(builder.failures);
        self
    }

    /// Finalise: `[] → Zero`, `[a] → Action`, otherwise `Actions`
    pub fn finish(self) -> Result<Arrangement> {
        if let Some(err) = self.failures.into_iter().next() {
            return Err(err);
        }
        trace!(actions = self.actions.len(), "Finalising actions builder");
        Ok(Arrangement::any_of(self.actions))
    }
}

/// Declares actions for one actor set
#[derive(Debug)]
pub struct ActionBuilder<'a> {
    scope: Scope<'a>,
    actors: BTreeSet<Party>,
    actions: Vec<Action>,
    failures: Vec<Error>,
}

impl<'a> ActionBuilder<'a> {
    /// Actors every action of this block is bound to
    pub fn actors(&self) -> &BTreeSet<Party> {
        &self.actors
    }

    /// Action available while `condition` holds
    pub fn given_that(
        &mut self,
        name: impl Into<String>,
        condition: Perceivable<bool>,
        init: impl FnOnce(&mut ContractBuilder<'a>),
    ) -> &mut Self {
        let mut builder = ContractBuilder::new(self.scope);
        init(&mut builder);
        match builder.finish() {
            Ok(arrangement) => self.given_that_then(name, condition, arrangement),
            Err(err) => {
                self.failures.push(err);
                self
            }
        }
    }

    /// Action available at any time
    pub fn anytime(
        &mut self,
        name: impl Into<String>,
        init: impl FnOnce(&mut ContractBuilder<'a>),
    ) -> &mut Self {
        self.given_that(name, constant(true), init)
    }

    /// Action leading to an already built arrangement
    pub fn given_that_then(
        &mut self,
        name: impl Into<String>,
        condition: Perceivable<bool>,
        arrangement: Arrangement,
    ) -> &mut Self {
        self.actions.push(Action::new(
            name,
            condition,
            self.actors.clone(),
            arrangement,
        ));
        self
    }
}
