use chrono::{Datelike, Duration, NaiveDate};
use model::entities::recurrence_rule::{self, FrequencyType};

use crate::error::{EngineError, Result};

/// Returns the number of days in the given month using chrono.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    // Create a date for the first day of the next month
    let next_month_year = year + (month / 12) as i32;
    let next_month = (month % 12) + 1;

    // Get the first day of the next month
    let first_day_next_month = NaiveDate::from_ymd_opt(next_month_year, next_month, 1).unwrap();

    // Go back one day to get the last day of the current month
    let last_day_current_month = first_day_next_month.pred_opt().unwrap();

    last_day_current_month.day()
}

/// A validated frequency descriptor: how often a rule fires and, for the
/// month-based types, which day of month occurrences anchor to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frequency {
    pub frequency_type: FrequencyType,
    pub interval: i32,
    pub anchor_day: Option<i32>,
}

impl Frequency {
    pub fn new(
        frequency_type: FrequencyType,
        interval: i32,
        anchor_day: Option<i32>,
    ) -> Result<Self> {
        let frequency = Self {
            frequency_type,
            interval,
            anchor_day,
        };
        frequency.validate()?;
        Ok(frequency)
    }

    /// Builds the frequency from the columns a rule persists.
    pub fn from_rule(rule: &recurrence_rule::Model) -> Result<Self> {
        Self::new(rule.frequency_type, rule.frequency_interval, rule.anchor_day)
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval <= 0 {
            return Err(EngineError::InvalidFrequency(format!(
                "interval must be positive, got {}",
                self.interval
            )));
        }

        if let Some(day) = self.anchor_day {
            match self.frequency_type {
                FrequencyType::Monthly | FrequencyType::Yearly => {
                    if !(1..=31).contains(&day) {
                        return Err(EngineError::InvalidFrequency(format!(
                            "anchor day must be between 1 and 31, got {day}"
                        )));
                    }
                }
                FrequencyType::Daily | FrequencyType::Weekly => {
                    return Err(EngineError::InvalidFrequency(
                        "anchor day is only valid for monthly and yearly rules".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Computes the due date that follows `anchor`.
    ///
    /// Month-based types clamp to the last day of shorter months: a day-31
    /// anchor yields Jan 31, Feb 28, Mar 31, ... and never rolls over into
    /// the next month. The anchor day (when set) is what keeps the target
    /// day from eroding after a clamped month.
    pub fn next_due_date(&self, anchor: NaiveDate) -> Result<NaiveDate> {
        self.validate()?;

        let next = match self.frequency_type {
            FrequencyType::Daily => anchor + Duration::days(self.interval as i64),
            FrequencyType::Weekly => anchor + Duration::days(self.interval as i64 * 7),
            FrequencyType::Monthly => add_months(anchor, self.interval, self.target_day(anchor)),
            FrequencyType::Yearly => {
                let year = anchor.year() + self.interval;
                let month = anchor.month();
                let day = std::cmp::min(self.target_day(anchor), days_in_month(year, month));
                NaiveDate::from_ymd_opt(year, month, day).unwrap()
            }
        };

        Ok(next)
    }

    fn target_day(&self, anchor: NaiveDate) -> u32 {
        self.anchor_day.map(|d| d as u32).unwrap_or_else(|| anchor.day())
    }
}

/// Advances `date` by `months`, clamping `target_day` to the resulting month.
fn add_months(date: NaiveDate, months: i32, target_day: u32) -> NaiveDate {
    let zero_based = date.year() * 12 + date.month0() as i32 + months;
    let year = zero_based.div_euclid(12);
    let month = zero_based.rem_euclid(12) as u32 + 1;
    let day = std::cmp::min(target_day, days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_daily_and_weekly_advance() {
        let daily = Frequency::new(FrequencyType::Daily, 3, None).unwrap();
        assert_eq!(daily.next_due_date(date(2025, 6, 29)).unwrap(), date(2025, 7, 2));

        let weekly = Frequency::new(FrequencyType::Weekly, 2, None).unwrap();
        let next = weekly.next_due_date(date(2025, 6, 2)).unwrap();
        assert_eq!(next, date(2025, 6, 16));
        // Same weekday preserved
        assert_eq!(next.weekday(), date(2025, 6, 2).weekday());
    }

    #[test]
    fn test_monthly_end_of_month_clamping() {
        let monthly = Frequency::new(FrequencyType::Monthly, 1, Some(31)).unwrap();

        let feb = monthly.next_due_date(date(2025, 1, 31)).unwrap();
        assert_eq!(feb, date(2025, 2, 28));

        // The anchor day recovers to 31 in longer months instead of eroding.
        let mar = monthly.next_due_date(feb).unwrap();
        assert_eq!(mar, date(2025, 3, 31));

        let apr = monthly.next_due_date(mar).unwrap();
        assert_eq!(apr, date(2025, 4, 30));
    }

    #[test]
    fn test_monthly_clamps_in_leap_february() {
        let monthly = Frequency::new(FrequencyType::Monthly, 1, Some(31)).unwrap();
        assert_eq!(
            monthly.next_due_date(date(2024, 1, 31)).unwrap(),
            date(2024, 2, 29)
        );
    }

    #[test]
    fn test_monthly_without_anchor_uses_current_day() {
        let monthly = Frequency::new(FrequencyType::Monthly, 1, None).unwrap();
        assert_eq!(
            monthly.next_due_date(date(2025, 6, 15)).unwrap(),
            date(2025, 7, 15)
        );
    }

    #[test]
    fn test_monthly_interval_crosses_year_boundary() {
        let monthly = Frequency::new(FrequencyType::Monthly, 3, None).unwrap();
        assert_eq!(
            monthly.next_due_date(date(2025, 11, 10)).unwrap(),
            date(2026, 2, 10)
        );
    }

    #[test]
    fn test_yearly_leap_day_clamps_to_feb_28() {
        let yearly = Frequency::new(FrequencyType::Yearly, 1, None).unwrap();
        assert_eq!(
            yearly.next_due_date(date(2024, 2, 29)).unwrap(),
            date(2025, 2, 28)
        );

        let every_four = Frequency::new(FrequencyType::Yearly, 4, None).unwrap();
        assert_eq!(
            every_four.next_due_date(date(2024, 2, 29)).unwrap(),
            date(2028, 2, 29)
        );
    }

    #[test]
    fn test_invalid_interval_rejected() {
        assert!(matches!(
            Frequency::new(FrequencyType::Daily, 0, None),
            Err(EngineError::InvalidFrequency(_))
        ));
        assert!(matches!(
            Frequency::new(FrequencyType::Monthly, -1, Some(15)),
            Err(EngineError::InvalidFrequency(_))
        ));
    }

    #[test]
    fn test_invalid_anchor_day_rejected() {
        assert!(matches!(
            Frequency::new(FrequencyType::Monthly, 1, Some(0)),
            Err(EngineError::InvalidFrequency(_))
        ));
        assert!(matches!(
            Frequency::new(FrequencyType::Yearly, 1, Some(32)),
            Err(EngineError::InvalidFrequency(_))
        ));
        assert!(matches!(
            Frequency::new(FrequencyType::Weekly, 1, Some(5)),
            Err(EngineError::InvalidFrequency(_))
        ));
    }
}
