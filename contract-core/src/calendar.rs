//! Business calendar
//!
//! Period arithmetic for roll-outs and string-to-date parsing. Period dates
//! are always computed from the anchor (`start + n * period`) so that
//! month-end anchors do not drift (31 Jan → 28 Feb → 31 Mar).

use crate::{config::CalendarConfig, Error, Result};
use chrono::{Datelike, Duration, Months, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Default date format for parsing (ISO 8601 calendar date)
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Longest run of non-working days a roll is allowed to skip
const MAX_ROLL_DAYS: u32 = 366;

/// Payment frequency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Frequency {
    /// Once a year
    Annual,
    /// Twice a year
    SemiAnnual,
    /// Four times a year
    Quarterly,
    /// Every month
    Monthly,
    /// Every two weeks
    BiWeekly,
    /// Every week
    Weekly,
    /// Every day
    Daily,
}

impl Frequency {
    /// Number of periods in a year
    pub fn annual_compound_count(&self) -> u32 {
        match self {
            Frequency::Annual => 1,
            Frequency::SemiAnnual => 2,
            Frequency::Quarterly => 4,
            Frequency::Monthly => 12,
            Frequency::BiWeekly => 26,
            Frequency::Weekly => 52,
            Frequency::Daily => 365,
        }
    }

    fn step(&self) -> Step {
        match self {
            Frequency::Annual => Step::Months(12),
            Frequency::SemiAnnual => Step::Months(6),
            Frequency::Quarterly => Step::Months(3),
            Frequency::Monthly => Step::Months(1),
            Frequency::BiWeekly => Step::Days(14),
            Frequency::Weekly => Step::Days(7),
            Frequency::Daily => Step::Days(1),
        }
    }
}

enum Step {
    Months(u32),
    Days(i64),
}

/// How a date falling on a non-working day is moved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DateRollConvention {
    /// Keep the date as is
    #[default]
    Actual,
    /// Next working day
    Following,
    /// Next working day unless that changes the month, then previous
    ModifiedFollowing,
    /// Previous working day
    Preceding,
    /// Previous working day unless that changes the month, then next
    ModifiedPreceding,
}

/// Date arithmetic consumed by roll-out generation
pub trait Calendar {
    /// Unadjusted date `periods` steps of `frequency` after `anchor`
    fn advance(&self, anchor: NaiveDate, frequency: Frequency, periods: u32) -> Result<NaiveDate>;

    /// Move a date onto a working day
    fn adjust(&self, date: NaiveDate) -> Result<NaiveDate> {
        Ok(date)
    }

    /// Parse a date string
    fn parse_date(&self, text: &str) -> Result<NaiveDate>;
}

/// Calendar with weekends, holidays and a roll convention
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusinessCalendar {
    holidays: BTreeSet<NaiveDate>,
    convention: DateRollConvention,
    date_format: String,
}

impl BusinessCalendar {
    /// Plain calendar: no holidays, dates are not rolled
    pub fn new() -> Self {
        Self {
            holidays: BTreeSet::new(),
            convention: DateRollConvention::Actual,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }

    /// Build from configuration; holidays are parsed with the configured format
    pub fn from_config(config: &CalendarConfig) -> Result<Self> {
        let mut calendar = Self::new()
            .with_convention(config.convention)
            .with_date_format(config.date_format.clone());
        let holidays = config
            .holidays
            .iter()
            .map(|h| calendar.parse_date(h))
            .collect::<Result<BTreeSet<_>>>()?;
        calendar.holidays = holidays;
        Ok(calendar)
    }

    /// Replace the roll convention
    pub fn with_convention(mut self, convention: DateRollConvention) -> Self {
        self.convention = convention;
        self
    }

    /// Add holidays
    pub fn with_holidays(mut self, holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.holidays.extend(holidays);
        self
    }

    /// Replace the parse format
    pub fn with_date_format(mut self, format: impl Into<String>) -> Self {
        self.date_format = format.into();
        self
    }

    /// Roll convention in use
    pub fn convention(&self) -> DateRollConvention {
        self.convention
    }

    /// Neither a weekend nor a holiday
    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !self.holidays.contains(&date)
    }

    fn roll(&self, date: NaiveDate, forward: bool) -> Result<NaiveDate> {
        let mut current = date;
        for _ in 0..MAX_ROLL_DAYS {
            if self.is_working_day(current) {
                return Ok(current);
            }
            let next = if forward {
                current.succ_opt()
            } else {
                current.pred_opt()
            };
            current = next.ok_or_else(|| Error::DateOutOfRange(format!("rolling {}", date)))?;
        }
        Err(Error::DateOutOfRange(format!(
            "no working day within {} days of {}",
            MAX_ROLL_DAYS, date
        )))
    }
}

impl Default for BusinessCalendar {
    fn default() -> Self {
        Self::new()
    }
}

impl Calendar for BusinessCalendar {
    fn advance(&self, anchor: NaiveDate, frequency: Frequency, periods: u32) -> Result<NaiveDate> {
        let out_of_range = || {
            Error::DateOutOfRange(format!("{} + {} x {:?}", anchor, periods, frequency))
        };
        match frequency.step() {
            Step::Months(months) => {
                let total = months.checked_mul(periods).ok_or_else(out_of_range)?;
                anchor
                    .checked_add_months(Months::new(total))
                    .ok_or_else(out_of_range)
            }
            Step::Days(days) => {
                let total = days.checked_mul(i64::from(periods)).ok_or_else(out_of_range)?;
                anchor
                    .checked_add_signed(Duration::days(total))
                    .ok_or_else(out_of_range)
            }
        }
    }

    fn adjust(&self, date: NaiveDate) -> Result<NaiveDate> {
        match self.convention {
            DateRollConvention::Actual => Ok(date),
            DateRollConvention::Following => self.roll(date, true),
            DateRollConvention::Preceding => self.roll(date, false),
            DateRollConvention::ModifiedFollowing => {
                let rolled = self.roll(date, true)?;
                if rolled.month() == date.month() {
                    Ok(rolled)
                } else {
                    self.roll(date, false)
                }
            }
            DateRollConvention::ModifiedPreceding => {
                let rolled = self.roll(date, false)?;
                if rolled.month() == date.month() {
                    Ok(rolled)
                } else {
                    self.roll(date, true)
                }
            }
        }
    }

    fn parse_date(&self, text: &str) -> Result<NaiveDate> {
        NaiveDate::parse_from_str(text.trim(), &self.date_format).map_err(|e| Error::InvalidDate {
            input: text.to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_month_end_anchor_does_not_drift() {
        let calendar = BusinessCalendar::new();
        let anchor = date(2026, 1, 31);

        assert_eq!(calendar.advance(anchor, Frequency::Monthly, 1).unwrap(), date(2026, 2, 28));
        assert_eq!(calendar.advance(anchor, Frequency::Monthly, 2).unwrap(), date(2026, 3, 31));
        assert_eq!(calendar.advance(anchor, Frequency::Quarterly, 1).unwrap(), date(2026, 4, 30));
    }

    #[test]
    fn test_day_based_frequencies() {
        let calendar = BusinessCalendar::new();
        let anchor = date(2026, 3, 2);

        assert_eq!(calendar.advance(anchor, Frequency::Weekly, 2).unwrap(), date(2026, 3, 16));
        assert_eq!(calendar.advance(anchor, Frequency::BiWeekly, 1).unwrap(), date(2026, 3, 16));
        assert_eq!(calendar.advance(anchor, Frequency::Daily, 0).unwrap(), anchor);
    }

    #[test]
    fn test_following_skips_weekend_and_holiday() {
        // 2026-05-30 is a Saturday; Monday 2026-06-01 is a holiday
        let calendar = BusinessCalendar::new()
            .with_convention(DateRollConvention::Following)
            .with_holidays([date(2026, 6, 1)]);

        assert_eq!(calendar.adjust(date(2026, 5, 30)).unwrap(), date(2026, 6, 2));
        assert!(calendar.is_working_day(date(2026, 6, 2)));
    }

    #[test]
    fn test_modified_following_stays_in_month() {
        // 2026-10-31 is a Saturday
        let calendar =
            BusinessCalendar::new().with_convention(DateRollConvention::ModifiedFollowing);
        assert_eq!(calendar.adjust(date(2026, 10, 31)).unwrap(), date(2026, 10, 30));
    }

    #[test]
    fn test_actual_keeps_date() {
        let calendar = BusinessCalendar::new();
        assert_eq!(calendar.adjust(date(2026, 10, 31)).unwrap(), date(2026, 10, 31));
    }

    #[test]
    fn test_parse_date() {
        let calendar = BusinessCalendar::new();
        assert_eq!(calendar.parse_date(" 2027-09-01 ").unwrap(), date(2027, 9, 1));
        assert!(matches!(
            calendar.parse_date("01/09/2027"),
            Err(Error::InvalidDate { .. })
        ));

        let calendar = calendar.with_date_format("%d/%m/%Y");
        assert_eq!(calendar.parse_date("01/09/2027").unwrap(), date(2027, 9, 1));
    }

    #[test]
    fn test_from_config_parses_holidays() {
        let config = CalendarConfig {
            holidays: vec!["2026-12-25".to_string()],
            convention: DateRollConvention::Following,
            ..CalendarConfig::default()
        };
        let calendar = BusinessCalendar::from_config(&config).unwrap();
        assert!(!calendar.is_working_day(date(2026, 12, 25)));
        assert_eq!(calendar.convention(), DateRollConvention::Following);

        let broken = CalendarConfig {
            holidays: vec!["Christmas".to_string()],
            ..CalendarConfig::default()
        };
        assert!(BusinessCalendar::from_config(&broken).is_err());
    }
}
