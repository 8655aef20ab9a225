//! Time and gap formatting shared by overlays
//!
//! Absent lap times always render the fixed `--:--.---` placeholder;
//! a missing value must never show up as a zero time.

pub const NO_LAPTIME: &str = "--:--.---";

/// `m:ss.fff` representation of a lap time
pub fn format_laptime(laptime_ms: Option<i32>) -> String {
    let Some(ms) = laptime_ms else {
        return NO_LAPTIME.to_string();
    };
    if ms <= 0 {
        return NO_LAPTIME.to_string();
    }

    let minutes = ms / 60_000;
    let seconds = (ms % 60_000) / 1000;
    let millis = ms % 1000;
    format!("{minutes}:{seconds:02}.{millis:03}")
}

/// Like [`format_laptime`] but drops the minute part under one minute,
/// used for interval/delta columns.
pub fn format_time_diff(laptime_ms: Option<i32>) -> String {
    let Some(ms) = laptime_ms else {
        return NO_LAPTIME.to_string();
    };
    if ms <= 0 {
        return NO_LAPTIME.to_string();
    }
    if ms < 60_000 {
        return format!("{}.{:03}", ms / 1000, ms % 1000);
    }
    format_laptime(Some(ms))
}

/// `h:mm:ss` for session/fuel clocks
pub fn format_clock(total_secs: f64) -> String {
    let total = total_secs.max(0.0) as u64;
    format!(
        "{}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_laptime_renders_placeholder() {
        assert_eq!(format_laptime(None), "--:--.---");
        // Zero means "no lap yet", never a real time
        assert_eq!(format_laptime(Some(0)), "--:--.---");
        assert_eq!(format_laptime(Some(-1)), "--:--.---");
    }

    #[test]
    fn test_laptime_formatting() {
        assert_eq!(format_laptime(Some(83_123)), "1:23.123");
        assert_eq!(format_laptime(Some(59_999)), "0:59.999");
        assert_eq!(format_laptime(Some(600_001)), "10:00.001");
    }

    #[test]
    fn test_time_diff_short_form_under_a_minute() {
        assert_eq!(format_time_diff(Some(1_500)), "1.500");
        assert_eq!(format_time_diff(Some(61_001)), "1:01.001");
        assert_eq!(format_time_diff(None), "--:--.---");
    }

    #[test]
    fn test_clock() {
        assert_eq!(format_clock(0.0), "0:00:00");
        assert_eq!(format_clock(3_725.9), "1:02:05");
        assert_eq!(format_clock(-5.0), "0:00:00");
    }
}
