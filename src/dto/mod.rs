//! Wire-facing data shapes for REST and WebSocket traffic.

use std::time::{Duration, UNIX_EPOCH};

use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub mod health;
pub mod sprint;
pub mod ws;

/// Format unix epoch milliseconds as an RFC 3339 string.
fn format_epoch_ms(epoch_ms: u64) -> String {
    OffsetDateTime::from(UNIX_EPOCH + Duration::from_millis(epoch_ms))
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
