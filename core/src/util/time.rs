use std::time::Duration;

use serde::Serializer;

/// Duration in whole milliseconds, saturating at `u64::MAX`.
pub fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// `serialize_with` helper writing a `Duration` as integer milliseconds.
pub fn serialize_duration_ms<S>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u64(millis(*d))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millis_truncates() {
        assert_eq!(millis(Duration::from_micros(2_999)), 2);
        assert_eq!(millis(Duration::ZERO), 0);
    }
}
