use std::time::{SystemTime, UNIX_EPOCH};

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Wall clock now as an ISO-8601 (RFC 3339) string, e.g.
/// `2024-05-01T12:30:45.123Z`. Used for payload timestamps and the batch
/// `sent_at` field.
pub(crate) fn now_iso8601() -> String {
    to_iso8601(OffsetDateTime::now_utc())
}

pub(crate) fn to_iso8601(at: OffsetDateTime) -> String {
    at.format(&Rfc3339).expect("RFC 3339 formatting of a UTC instant cannot fail")
}

/// return millisecond
pub(crate) fn get_now_as_millis() -> u128 {
    let now = SystemTime::now();
    let since_epoch = now.duration_since(UNIX_EPOCH).expect("Time went backwards");
    since_epoch.as_millis()
}
