//! Processing window resolution
//!
//! Every run covers exactly one half-open day window `[start, start + 1d)`.
//! The default window is yesterday in UTC, matching the daily schedule that
//! triggers the pipeline shortly after midnight.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};

use crate::error::{EtlError, EtlResult};

/// The one-day half-open window a run processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessingWindow {
    start_date: NaiveDate,
}

impl ProcessingWindow {
    pub fn for_date(start_date: NaiveDate) -> Self {
        Self { start_date }
    }

    /// Parse a `YYYY-MM-DD` override. Anything else is rejected.
    pub fn parse(input: &str) -> EtlResult<Self> {
        NaiveDate::parse_from_str(input, "%Y-%m-%d")
            .map(Self::for_date)
            .map_err(|_| EtlError::InvalidRunDate {
                input: input.to_string(),
            })
    }

    /// The default window: yesterday in UTC.
    pub fn yesterday_utc() -> Self {
        Self::for_date(Utc::now().date_naive() - Duration::days(1))
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    /// Inclusive lower bound.
    pub fn start(&self) -> NaiveDateTime {
        self.start_date.and_time(NaiveTime::MIN)
    }

    /// Exclusive upper bound: midnight of the next day.
    pub fn end(&self) -> NaiveDateTime {
        (self.start_date + Duration::days(1)).and_time(NaiveTime::MIN)
    }

    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        ts >= self.start() && ts < self.end()
    }

    /// Date label used in export file names.
    pub fn label(&self) -> String {
        self.start_date.format("%Y-%m-%d").to_string()
    }
}

impl std::fmt::Display for ProcessingWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start(), self.end())
    }
}

/// Drop sub-second precision from a source timestamp.
///
/// Applied on both sides of the time-dimension join: once when the
/// dimension row is derived and again when facts resolve their time key,
/// so the two always agree.
pub fn truncate_to_second(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_nanosecond(0).unwrap_or(ts)
}
