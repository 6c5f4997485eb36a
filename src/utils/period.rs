//! Calendar helpers: time buckets for velocity views and date ranges for filters.

use chrono::{Datelike, Days, Months, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Time bucket size of the sales velocity view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeGranularity {
    Weekly,
    #[default]
    Monthly,
    Quarterly,
    Yearly,
}

impl TimeGranularity {
    /// Bucket key of `date`: `YYYY-Www` (ISO 8601 week), `YYYY-MM`, `YYYY-Qn` or `YYYY`.
    pub fn bucket_key(self, date: NaiveDate) -> String {
        match self {
            TimeGranularity::Weekly => iso_week_key(date),
            TimeGranularity::Monthly => format!("{}-{:02}", date.year(), date.month()),
            TimeGranularity::Quarterly => {
                format!("{}-Q{}", date.year(), (date.month() - 1) / 3 + 1)
            }
            TimeGranularity::Yearly => date.year().to_string(),
        }
    }
}

/// ISO 8601 week key. Weeks start on Monday and week 1 is the week holding January 4th,
/// so early-January dates can belong to the previous ISO year and vice versa.
pub fn iso_week_key(date: NaiveDate) -> String {
    let week = date.iso_week();
    format!("{}-W{:02}", week.year(), week.week())
}

/// Monday and Sunday of an ISO week key such as `2025-W27`.
pub fn week_date_range(key: &str) -> Option<(NaiveDate, NaiveDate)> {
    let (year, week) = key.split_once("-W")?;
    let year: i32 = year.parse().ok()?;
    let week: u32 = week.parse().ok()?;
    let monday = NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)?;
    let sunday = monday.checked_add_days(Days::new(6))?;
    Some((monday, sunday))
}

/// `YYYY/MM/DD ~ YYYY/MM/DD` for an ISO week key, or the key itself when it does not parse.
pub fn format_week_range(key: &str) -> String {
    match week_date_range(key) {
        Some((start, end)) => format!(
            "{} ~ {}",
            start.format("%Y/%m/%d"),
            end.format("%Y/%m/%d")
        ),
        None => key.to_string(),
    }
}

/// Inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, AnalysisError> {
        if start > end {
            return Err(AnalysisError::Validation(format!(
                "date range starts after it ends ({} > {})",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// The span ending at `today` described by `<n>d`, `<n>m` or `<n>y`.
    pub fn trailing(value: &str, today: NaiveDate) -> Result<Self, AnalysisError> {
        let invalid = || AnalysisError::Validation(format!("unknown relative range '{}'", value));

        let value = value.trim();
        let unit = value.chars().last().ok_or_else(invalid)?;
        let amount: u32 = value[..value.len() - unit.len_utf8()]
            .parse()
            .map_err(|_| invalid())?;

        let start = match unit {
            'd' => today.checked_sub_days(Days::new(u64::from(amount))),
            'm' => today.checked_sub_months(Months::new(amount)),
            'y' => amount
                .checked_mul(12)
                .and_then(|months| today.checked_sub_months(Months::new(months))),
            _ => None,
        }
        .ok_or_else(invalid)?;

        Self::new(start, today)
    }
}
