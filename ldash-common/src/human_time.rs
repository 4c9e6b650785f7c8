//! Human-readable time formatting for presentation adapters
//!
//! The orchestration core only produces numbers (seconds, milliseconds) or the
//! `Eta::Unknown` sentinel. Turning those into display text happens here, at the edge.

use crate::events::Eta;

/// Bucket thresholds (seconds)
const MINUTE: u64 = 60;
const HOUR: u64 = 3600;

/// Format a remaining-time estimate for display.
///
/// Buckets:
/// - unknown → `calculating...`
/// - 0 → `complete`
/// - < 1 minute → `~N s`
/// - < 1 hour → `~M min S s`
/// - otherwise → `~H h M min`
///
/// # Examples
///
/// ```
/// use ldash_common::events::Eta;
/// use ldash_common::human_time::format_eta;
///
/// assert_eq!(format_eta(&Eta::Unknown), "calculating...");
/// assert_eq!(format_eta(&Eta::Seconds(0.0)), "complete");
/// assert_eq!(format_eta(&Eta::Seconds(42.4)), "~42 s");
/// assert_eq!(format_eta(&Eta::Seconds(330.0)), "~5 min 30 s");
/// assert_eq!(format_eta(&Eta::Seconds(7290.0)), "~2 h 2 min");
/// ```
pub fn format_eta(eta: &Eta) -> String {
    let seconds = match eta {
        Eta::Unknown => return "calculating...".to_string(),
        Eta::Seconds(s) if !s.is_finite() => return "calculating...".to_string(),
        Eta::Seconds(s) => s.max(0.0).round() as u64,
    };

    if seconds == 0 {
        "complete".to_string()
    } else if seconds < MINUTE {
        format!("~{} s", seconds)
    } else if seconds < HOUR {
        format!("~{} min {} s", seconds / MINUTE, seconds % MINUTE)
    } else {
        format!("~{} h {} min", seconds / HOUR, (seconds % HOUR) / MINUTE)
    }
}

/// Format an elapsed duration in milliseconds as seconds with one decimal (`3.2s`).
///
/// ```
/// use ldash_common::human_time::format_elapsed_ms;
///
/// assert_eq!(format_elapsed_ms(3240), "3.2s");
/// assert_eq!(format_elapsed_ms(0), "0.0s");
/// ```
pub fn format_elapsed_ms(elapsed_ms: u64) -> String {
    format!("{:.1}s", elapsed_ms as f64 / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_boundaries() {
        assert_eq!(format_eta(&Eta::Seconds(59.4)), "~59 s");
        assert_eq!(format_eta(&Eta::Seconds(60.0)), "~1 min 0 s");
        assert_eq!(format_eta(&Eta::Seconds(3599.0)), "~59 min 59 s");
        assert_eq!(format_eta(&Eta::Seconds(3600.0)), "~1 h 0 min");
        assert_eq!(format_eta(&Eta::Seconds(86400.0)), "~24 h 0 min");
    }

    #[test]
    fn test_degenerate_values() {
        assert_eq!(format_eta(&Eta::Seconds(0.2)), "complete");
        assert_eq!(format_eta(&Eta::Seconds(-5.0)), "complete");
        assert_eq!(format_eta(&Eta::Seconds(f64::NAN)), "calculating...");
        assert_eq!(format_eta(&Eta::Seconds(f64::INFINITY)), "calculating...");
    }

    #[test]
    fn test_elapsed_rounding() {
        assert_eq!(format_elapsed_ms(1049), "1.0s");
        assert_eq!(format_elapsed_ms(61_500), "61.5s");
    }
}
