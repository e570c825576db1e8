use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in whole Unix seconds, used for record `ctime`.
pub fn unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
