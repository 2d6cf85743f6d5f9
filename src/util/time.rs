use std::time::{SystemTime, UNIX_EPOCH};

/// Wall clock milliseconds since the UNIX epoch, as written to the CSV logs. A clock set before
///  the epoch yields 0 rather than failing the transport loop.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
