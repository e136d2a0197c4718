use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use thiserror::Error;

use crate::types::Frequency;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid period '{0}', expected M01-M12, Q1-Q4, S1-S2 or Y")]
pub struct InvalidPeriod(pub String);

/// A reporting period within a year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Period {
    Month(u8),
    Quarter(u8),
    Semester(u8),
    Year,
}

impl Period {
    #[must_use]
    pub fn frequency(self) -> Frequency {
        match self {
            Period::Month(_) => Frequency::Monthly,
            Period::Quarter(_) => Frequency::Quarterly,
            Period::Semester(_) => Frequency::Semester,
            Period::Year => Frequency::Annual,
        }
    }

    /// Every period an indicator with the given frequency reports on.
    #[must_use]
    pub fn all_for(frequency: Frequency) -> Vec<Period> {
        match frequency {
            Frequency::Monthly => (1..=12).map(Period::Month).collect(),
            Frequency::Quarterly => (1..=4).map(Period::Quarter).collect(),
            Frequency::Semester => (1..=2).map(Period::Semester).collect(),
            Frequency::Annual => vec![Period::Year],
        }
    }

    /// Last month covered by this period.
    fn last_month(self) -> u32 {
        match self {
            Period::Month(m) => u32::from(m),
            Period::Quarter(q) => u32::from(q) * 3,
            Period::Semester(s) => u32::from(s) * 6,
            Period::Year => 12,
        }
    }

    /// Last calendar day of the period in the given year.
    #[must_use]
    pub fn end_date(self, year: i32) -> Option<NaiveDate> {
        let month = self.last_month();
        let (next_year, next_month) = if month == 12 {
            (year + 1, 1)
        } else {
            (year, month + 1)
        };
        NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
    }

    /// Human-readable Indonesian label, e.g. "Triwulan II".
    #[must_use]
    pub fn label(self) -> String {
        const MONTHS: [&str; 12] = [
            "Januari", "Februari", "Maret", "April", "Mei", "Juni", "Juli", "Agustus",
            "September", "Oktober", "November", "Desember",
        ];
        const ROMAN: [&str; 4] = ["I", "II", "III", "IV"];

        match self {
            Period::Month(m) => MONTHS[usize::from(m) - 1].to_string(),
            Period::Quarter(q) => format!("Triwulan {}", ROMAN[usize::from(q) - 1]),
            Period::Semester(s) => format!("Semester {}", ROMAN[usize::from(s) - 1]),
            Period::Year => "Tahunan".to_string(),
        }
    }

    /// The period containing the given date at this frequency.
    #[must_use]
    pub fn containing(frequency: Frequency, date: NaiveDate) -> Period {
        let month = date.month() as u8;
        match frequency {
            Frequency::Monthly => Period::Month(month),
            Frequency::Quarterly => Period::Quarter((month - 1) / 3 + 1),
            Frequency::Semester => Period::Semester((month - 1) / 6 + 1),
            Frequency::Annual => Period::Year,
        }
    }
}

impl FromStr for Period {
    type Err = InvalidPeriod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidPeriod(s.to_string());
        let code = s.trim().to_ascii_uppercase();

        if code == "Y" {
            return Ok(Period::Year);
        }

        let (kind, rest) = code.split_at_checked(1).ok_or_else(invalid)?;
        let n: u8 = rest.parse().map_err(|_| invalid())?;

        let period = match kind {
            "M" if rest.len() == 2 && (1..=12).contains(&n) => Period::Month(n),
            "Q" if rest.len() == 1 && (1..=4).contains(&n) => Period::Quarter(n),
            "S" if rest.len() == 1 && (1..=2).contains(&n) => Period::Semester(n),
            _ => return Err(invalid()),
        };
        Ok(period)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Month(m) => write!(f, "M{m:02}"),
            Period::Quarter(q) => write!(f, "Q{q}"),
            Period::Semester(s) => write!(f, "S{s}"),
            Period::Year => f.write_str("Y"),
        }
    }
}

/// Parses a period code and checks it matches the indicator's frequency.
pub fn parse_for_frequency(code: &str, frequency: Frequency) -> Result<Period, String> {
    let period: Period = code.parse().map_err(|e: InvalidPeriod| e.to_string())?;
    if period.frequency() != frequency {
        return Err(format!(
            "period '{period}' does not match the indicator's {frequency} frequency"
        ));
    }
    Ok(period)
}
