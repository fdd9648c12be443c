//! Repositories for accounts and prediction records
//!
//! Timestamps are stored as RFC 3339 text in UTC with microsecond precision,
//! so lexical order matches chronological order.

pub mod predictions;
pub mod users;

use camel_common::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};

pub use predictions::{
    count_predictions, delete_prediction, get_prediction, insert_prediction, list_predictions,
};
pub use users::{create_user, find_credentials_by_username, get_user};

pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid stored timestamp '{}': {}", value, e)))
}
