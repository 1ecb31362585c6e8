//! Backfill window planning
//!
//! Splits `[start, end)` into consecutive fixed-width windows, the last one
//! clipped to `end`.

use crate::error::{Error, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use serde::Serialize;
use std::fmt;

/// Half-open time interval `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BackfillWindow {
    /// Inclusive start
    pub start: DateTime<Utc>,
    /// Exclusive end
    pub end: DateTime<Utc>,
}

impl BackfillWindow {
    /// Create a window
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Window length
    pub fn width(&self) -> Duration {
        self.end - self.start
    }
}

impl fmt::Display for BackfillWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {})",
            format_timestamp(self.start),
            format_timestamp(self.end)
        )
    }
}

/// Plans backfill windows
#[derive(Debug, Clone)]
pub struct WindowPlanner {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    width: Duration,
}

impl WindowPlanner {
    /// Planner over `[start, end)` with windows of `width`
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, width: Duration) -> Result<Self> {
        if width <= Duration::zero() {
            return Err(Error::invalid_value(
                "backfill.window",
                "window width must be positive",
            ));
        }
        Ok(Self { start, end, width })
    }

    /// Create from string values; `end` may be `now`
    pub fn from_strings(start: &str, end: &str, width: &str) -> Result<Self> {
        let start = parse_datetime(start)?;
        let end = if end == "now" {
            Utc::now()
        } else {
            parse_datetime(end)?
        };
        Self::new(start, end, parse_duration(width)?)
    }

    /// Ascending, contiguous, non-overlapping windows covering `[start, end)`
    ///
    /// Empty when `start >= end`.
    pub fn windows(&self) -> Vec<BackfillWindow> {
        let mut windows = Vec::new();
        let mut current = self.start;

        while current < self.end {
            // A width past chrono's range ends the window at `end`
            let window_end = match current.checked_add_signed(self.width) {
                Some(next) if next < self.end => next,
                _ => self.end,
            };
            windows.push(BackfillWindow::new(current, window_end));
            current = window_end;
        }

        windows
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Render a timestamp the way the REST watermark params expect
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse a datetime string into UTC DateTime
///
/// Accepts RFC 3339, `YYYY-MM-DDTHH:MM:SS`, `YYYY-MM-DD HH:MM:SS` and
/// plain dates (midnight UTC).
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(DateTime::from_naive_utc_and_offset(ndt, Utc));
        }
    }

    for fmt in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            let ndt = date.and_time(NaiveTime::default());
            return Ok(DateTime::from_naive_utc_and_offset(ndt, Utc));
        }
    }

    Err(Error::config(format!("Invalid datetime format: {s}")))
}

/// Parse a duration string like "7d", "1w", "2h", "30m", "45s", "500ms"
///
/// A bare number means days.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();

    let (num_str, unit) = if let Some(stripped) = s.strip_suffix("ms") {
        (stripped, "ms")
    } else if let Some(stripped) = s.strip_suffix('w') {
        (stripped, "w")
    } else if let Some(stripped) = s.strip_suffix('d') {
        (stripped, "d")
    } else if let Some(stripped) = s.strip_suffix('h') {
        (stripped, "h")
    } else if let Some(stripped) = s.strip_suffix('m') {
        (stripped, "m")
    } else if let Some(stripped) = s.strip_suffix('s') {
        (stripped, "s")
    } else {
        (s, "d")
    };

    let num: i64 = num_str
        .trim()
        .parse()
        .map_err(|_| Error::config(format!("Invalid duration: {s}")))?;

    let duration = match unit {
        "w" => Duration::try_weeks(num),
        "d" => Duration::try_days(num),
        "h" => Duration::try_hours(num),
        "m" => Duration::try_minutes(num),
        "s" => Duration::try_seconds(num),
        _ => Duration::try_milliseconds(num),
    };

    duration.ok_or_else(|| Error::config(format!("Duration out of range: {s}")))
}

/// Parse a duration string into a `std::time::Duration`
///
/// Negative durations are rejected.
pub fn parse_std_duration(s: &str) -> Result<std::time::Duration> {
    parse_duration(s)?
        .to_std()
        .map_err(|_| Error::config(format!("Duration must not be negative: {s}")))
}
