//! Preset date ranges offered by the filter form.

use std::fmt;
use std::str::FromStr;

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use super::DAY_FORMAT;

/// The date-range selector's options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateRangeOption {
    Today,
    Yesterday,
    /// Trailing seven days including today (the selector's default).
    #[default]
    Week,
    /// Trailing thirty days including today.
    Month,
    /// Explicit from/to supplied by the user.
    Custom,
}

impl fmt::Display for DateRangeOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Today => write!(f, "today"),
            Self::Yesterday => write!(f, "yesterday"),
            Self::Week => write!(f, "week"),
            Self::Month => write!(f, "month"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

impl FromStr for DateRangeOption {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "today" => Ok(Self::Today),
            "yesterday" => Ok(Self::Yesterday),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "custom" => Ok(Self::Custom),
            other => Err(format!(
                "unknown date range '{other}' (expected today, yesterday, week, month or custom)"
            )),
        }
    }
}

/// An inclusive calendar-date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    /// `from` at 00:00:00.
    pub fn start(&self) -> NaiveDateTime {
        start_of_day(self.from)
    }

    /// `to` at 23:59:59.
    pub fn end(&self) -> NaiveDateTime {
        end_of_day(self.to)
    }

    pub fn from_label(&self) -> String {
        self.from.format(DAY_FORMAT).to_string()
    }

    pub fn to_label(&self) -> String {
        self.to.format(DAY_FORMAT).to_string()
    }
}

pub fn start_of_day(day: NaiveDate) -> NaiveDateTime {
    day.and_time(NaiveTime::MIN)
}

pub fn end_of_day(day: NaiveDate) -> NaiveDateTime {
    day.and_hms_opt(23, 59, 59)
        .unwrap_or_else(|| day.and_time(NaiveTime::MIN))
}

/// Resolve a preset into an inclusive range relative to `today`.
///
/// Returns `None` for [`DateRangeOption::Custom`]; the caller supplies
/// explicit bounds in that case.
pub fn derive_date_range(option: DateRangeOption, today: NaiveDate) -> Option<DateRange> {
    let back = |days: u64| today.checked_sub_days(Days::new(days));

    let range = match option {
        DateRangeOption::Today => DateRange { from: today, to: today },
        DateRangeOption::Yesterday => {
            let yesterday = back(1)?;
            DateRange { from: yesterday, to: yesterday }
        }
        DateRangeOption::Week => DateRange { from: back(6)?, to: today },
        DateRangeOption::Month => DateRange { from: back(29)?, to: today },
        DateRangeOption::Custom => return None,
    };
    Some(range)
}
