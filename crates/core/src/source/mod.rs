//! Source enumeration: which days, and which object-store prefixes per day.

pub mod dates;
pub mod namespace;

pub use dates::{expand_dates, format_date, parse_date, DateRangeError, DateSelector, MAX_QUERY_DAYS};
pub use namespace::{Namespace, Region, UnknownRegion, KNOWN_REGIONS};
