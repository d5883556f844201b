use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Longest span a single query may cover.
pub const MAX_QUERY_DAYS: u32 = 366;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateRangeError {
    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("start date {start} is after end date {end}")]
    StartAfterEnd { start: NaiveDate, end: NaiveDate },
    #[error("startDate and endDate must be given together")]
    HalfOpenRange,
    #[error("query covers {requested} days, at most {max} are allowed")]
    TooManyDays { requested: i64, max: u32 },
    #[error("date range falls outside the supported calendar")]
    OutOfRange,
}

/// Which calendar days a query covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DateSelector {
    Range { start: NaiveDate, end: NaiveDate },
    LastNDays(u32),
    #[default]
    Today,
}

impl DateSelector {
    /// Build a selector from raw query parameters. An explicit range takes
    /// precedence over `last_n_days`.
    pub fn from_params(
        start: Option<&str>,
        end: Option<&str>,
        last_n_days: Option<u32>,
    ) -> Result<Self, DateRangeError> {
        match (start, end) {
            (Some(start), Some(end)) => Ok(DateSelector::Range {
                start: parse_date(start)?,
                end: parse_date(end)?,
            }),
            (Some(_), None) | (None, Some(_)) => Err(DateRangeError::HalfOpenRange),
            (None, None) => Ok(match last_n_days {
                Some(n) if n > 0 => DateSelector::LastNDays(n),
                _ => DateSelector::Today,
            }),
        }
    }
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, DateRangeError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| DateRangeError::InvalidDate(raw.to_string()))
}

/// Expand a selector into ascending, de-duplicated calendar dates.
///
/// A reversed range is rejected rather than silently producing nothing.
pub fn expand_dates(selector: DateSelector, today: NaiveDate) -> Result<Vec<NaiveDate>, DateRangeError> {
    match selector {
        DateSelector::Range { start, end } => {
            if start > end {
                return Err(DateRangeError::StartAfterEnd { start, end });
            }
            check_span(end.signed_duration_since(start).num_days() + 1)?;
            Ok(start.iter_days().take_while(|d| *d <= end).collect())
        }
        DateSelector::LastNDays(0) | DateSelector::Today => Ok(vec![today]),
        DateSelector::LastNDays(n) => {
            check_span(i64::from(n))?;
            let first = today
                .checked_sub_signed(Duration::days(i64::from(n) - 1))
                .ok_or(DateRangeError::OutOfRange)?;
            Ok(first.iter_days().take(n as usize).collect())
        }
    }
}

fn check_span(days: i64) -> Result<(), DateRangeError> {
    if days > i64::from(MAX_QUERY_DAYS) {
        return Err(DateRangeError::TooManyDays {
            requested: days,
            max: MAX_QUERY_DAYS,
        });
    }
    Ok(())
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}
