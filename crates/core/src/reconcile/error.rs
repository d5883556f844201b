use chrono::NaiveDate;
use thiserror::Error;

use crate::ownership::OwnershipError;
use crate::source::{format_date, DateRangeError, UnknownRegion};
use crate::storage::StoreError;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    BadRegion(#[from] UnknownRegion),

    #[error(transparent)]
    InvalidDateRange(#[from] DateRangeError),

    #[error(transparent)]
    Unauthorized(#[from] OwnershipError),

    #[error("no articles found for region '{region}' on {}", span(.dates))]
    NotFound { region: String, dates: Vec<NaiveDate> },

    #[error("failed to load articles for region '{region}' on {}: {source}", span(.dates))]
    Upstream {
        region: String,
        dates: Vec<NaiveDate>,
        #[source]
        source: StoreError,
    },
}

fn span(dates: &[NaiveDate]) -> String {
    match (dates.first(), dates.last()) {
        (Some(first), Some(last)) if first == last => format_date(*first),
        (Some(first), Some(last)) => format!("{}..{}", format_date(*first), format_date(*last)),
        _ => "no dates".to_string(),
    }
}
