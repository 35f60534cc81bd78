//! Roll-out generation
//!
//! A roll-out template is turned into a chain of period instances. Period
//! boundaries are computed from the anchor date on the raw calendar and then
//! adjusted for business days; the count depends only on raw dates so the
//! schedule never changes with the holiday list.

use crate::{
    arrangement::{Arrangement, RollOut},
    calendar::{Calendar, Frequency},
    Error, Result,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// One generated period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Period {
    /// Zero-based position in the schedule
    pub index: usize,
    /// Adjusted period start
    pub start: NaiveDate,
    /// Adjusted period end
    pub end: NaiveDate,
}

/// Periods covering `[start, end)` stepping by `frequency`
///
/// The last period is cut short at `end`. An empty range yields no periods.
pub fn schedule(
    calendar: &dyn Calendar,
    start: NaiveDate,
    end: NaiveDate,
    frequency: Frequency,
    max_periods: usize,
) -> Result<Vec<Period>> {
    let mut periods = Vec::new();
    let mut raw_start = start;
    let mut index: u32 = 0;

    while raw_start < end {
        if periods.len() >= max_periods {
            return Err(Error::RollOutTooLong {
                start,
                end,
                limit: max_periods,
            });
        }
        let periods_ahead = next_index(start, index)?;
        let raw_next = calendar.advance(start, frequency, periods_ahead)?;
        let raw_end = raw_next.min(end);
        periods.push(Period {
            index: periods.len(),
            start: calendar.adjust(raw_start)?,
            end: calendar.adjust(raw_end)?,
        });
        raw_start = raw_next;
        index = periods_ahead;
    }

    Ok(periods)
}

fn next_index(start: NaiveDate, index: u32) -> Result<u32> {
    index
        .checked_add(1)
        .ok_or_else(|| Error::DateOutOfRange(format!("more than {} periods from {}", index, start)))
}

impl RollOut {
    /// Create a roll-out template
    pub fn new(start: NaiveDate, end: NaiveDate, frequency: Frequency, body: Arrangement) -> Self {
        Self {
            start,
            end,
            frequency,
            body: Arc::new(body),
        }
    }

    /// Periods this roll-out generates
    pub fn periods(&self, calendar: &dyn Calendar, max_periods: usize) -> Result<Vec<Period>> {
        schedule(calendar, self.start, self.end, self.frequency, max_periods)
    }

    /// Chain of period instances
    ///
    /// The first period's instance is returned; `Continuation` in each
    /// instance is the following period's instance, `Zero` after the last.
    pub fn generate(&self, calendar: &dyn Calendar, max_periods: usize) -> Result<Arrangement> {
        let periods = self.periods(calendar, max_periods)?;
        debug!(
            start = %self.start,
            end = %self.end,
            frequency = ?self.frequency,
            periods = periods.len(),
            "Generating roll-out"
        );

        Ok(periods
            .iter()
            .rev()
            .fold(Arrangement::Zero, |next, period| {
                self.body.resolve_period(period, &next)
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrangement::{Action, Obligation};
    use crate::calendar::{BusinessCalendar, DateRollConvention};
    use crate::perceivable::{before, constant, DateRef};
    use crate::types::{Currency, Party, PublicKey};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn party(name: &str, seed: u8) -> Party {
        Party::new(name, PublicKey::from_bytes([seed; 32]))
    }

    #[test]
    fn test_schedule_quarterly() {
        let calendar = BusinessCalendar::new();
        let periods = schedule(
            &calendar,
            date(2026, 1, 1),
            date(2027, 1, 1),
            Frequency::Quarterly,
            100,
        )
        .unwrap();

        assert_eq!(periods.len(), 4);
        assert_eq!(periods[0].start, date(2026, 1, 1));
        assert_eq!(periods[0].end, date(2026, 4, 1));
        assert_eq!(periods[3].end, date(2027, 1, 1));
    }

    #[test]
    fn test_schedule_stub_period() {
        let calendar = BusinessCalendar::new();
        let periods = schedule(
            &calendar,
            date(2026, 1, 1),
            date(2026, 2, 15),
            Frequency::Monthly,
            100,
        )
        .unwrap();

        assert_eq!(periods.len(), 2);
        assert_eq!(periods[1].start, date(2026, 2, 1));
        assert_eq!(periods[1].end, date(2026, 2, 15));
    }

    #[test]
    fn test_schedule_empty_and_bounded() {
        let calendar = BusinessCalendar::new();
        let start = date(2026, 1, 1);
        assert!(schedule(&calendar, start, start, Frequency::Daily, 10).unwrap().is_empty());

        let err = schedule(&calendar, start, date(2027, 1, 1), Frequency::Daily, 10).unwrap_err();
        assert!(matches!(err, Error::RollOutTooLong { limit: 10, .. }));
    }

    #[test]
    fn test_period_index_overflow_is_out_of_range() {
        let start = date(2026, 1, 1);
        assert_eq!(next_index(start, 41).unwrap(), 42);
        assert!(matches!(
            next_index(start, u32::MAX),
            Err(Error::DateOutOfRange(_))
        ));
    }

    #[test]
    fn test_schedule_adjusts_dates() {
        // 2026-01-31 is a Saturday, 2026-02-28 is a Saturday
        let calendar = BusinessCalendar::new().with_convention(DateRollConvention::ModifiedFollowing);
        let periods = schedule(
            &calendar,
            date(2026, 1, 31),
            date(2026, 3, 31),
            Frequency::Monthly,
            100,
        )
        .unwrap();

        assert_eq!(periods.len(), 2);
        assert_eq!(periods[0].start, date(2026, 1, 30));
        assert_eq!(periods[0].end, date(2026, 2, 27));
        assert_eq!(periods[1].end, date(2026, 3, 31));
    }

    #[test]
    fn test_generate_chains_continuations() {
        let holder = party("Holder", 1);
        let issuer = party("Issuer", 2);
        let coupon = Obligation {
            amount: constant(dec!(25)),
            currency: Currency::EUR,
            obligor: issuer.clone(),
            beneficiary: holder.clone(),
            period: None,
        };
        let body = Arrangement::Action(Action::new(
            "coupon",
            before(DateRef::PeriodEnd),
            [holder].into(),
            Arrangement::all(vec![Arrangement::Obligation(coupon.clone()), Arrangement::Continuation]),
        ));
        let roll_out = RollOut::new(date(2026, 1, 1), date(2026, 3, 1), Frequency::Monthly, body);

        let first = roll_out.generate(&BusinessCalendar::new(), 100).unwrap();
        assert!(first.validate().is_ok());

        let action = first.actions()[0].clone();
        assert_eq!(action.condition(), &before(date(2026, 2, 1)));

        let second = first.exercise(&action).unwrap();
        let action = second.actions()[0].clone();
        assert_eq!(action.condition(), &before(date(2026, 3, 1)));

        // last period continues into Zero, leaving only its coupon
        let last = roll_out.periods(&BusinessCalendar::new(), 100).unwrap()[1];
        assert_eq!(
            second.exercise(&action),
            Some(Arrangement::Obligation(Obligation {
                period: Some(last),
                ..coupon
            }))
        );
    }

    #[test]
    fn test_generate_keeps_equal_periods_apart() {
        let holder = party("Holder", 1);
        let issuer = party("Issuer", 2);
        let coupon = Arrangement::Obligation(Obligation {
            amount: constant(dec!(25)),
            currency: Currency::USD,
            obligor: issuer,
            beneficiary: holder,
            period: None,
        });
        let roll_out = RollOut::new(
            date(2026, 1, 1),
            date(2027, 1, 1),
            Frequency::Quarterly,
            Arrangement::all(vec![coupon, Arrangement::Continuation]),
        );
        let calendar = BusinessCalendar::new();

        let generated = roll_out.generate(&calendar, 100).unwrap();
        let obligations = generated.obligations();
        assert_eq!(obligations.len(), 4);

        let total: rust_decimal::Decimal = obligations
            .iter()
            .map(|o| o.amount.evaluate(&crate::Environment::new()).unwrap())
            .sum();
        assert_eq!(total, dec!(100));

        let periods: Vec<_> = obligations.iter().filter_map(|o| o.period).collect();
        assert_eq!(periods, roll_out.periods(&calendar, 100).unwrap());
    }

    #[test]
    fn test_generate_empty_range_is_zero() {
        let roll_out = RollOut::new(
            date(2026, 1, 1),
            date(2025, 1, 1),
            Frequency::Annual,
            Arrangement::Continuation,
        );
        assert_eq!(
            roll_out.generate(&BusinessCalendar::new(), 10).unwrap(),
            Arrangement::Zero
        );
    }
}
