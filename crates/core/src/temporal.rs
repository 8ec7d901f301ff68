//! Temporal grounding for the system prompt.
//!
//! Every field is derived from a single captured instant so that "today" and
//! "tomorrow" can never straddle a midnight boundary within one prompt.

use chrono::{DateTime, Days, NaiveDate, SecondsFormat, Utc};

use crate::clock::Clock;

const HUMAN_DATE_FORMAT: &str = "%A, %B %-d, %Y";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TemporalContext {
    pub captured_at: DateTime<Utc>,
    /// RFC 3339 / ISO-8601 UTC timestamp with millisecond precision.
    pub now_utc_iso: String,
    pub today_date: NaiveDate,
    pub today_human: String,
    pub tomorrow_date: NaiveDate,
    pub tomorrow_human: String,
    /// `YYYY-MM-DD` form of `tomorrow_date`.
    pub tomorrow_iso: String,
}

impl TemporalContext {
    pub fn capture(clock: &dyn Clock) -> Self {
        Self::at(clock.now())
    }

    pub fn at(instant: DateTime<Utc>) -> Self {
        let today_date = instant.date_naive();
        // Only fails at NaiveDate::MAX, which no clock will report.
        let tomorrow_date = today_date.checked_add_days(Days::new(1)).unwrap_or(today_date);

        Self {
            captured_at: instant,
            now_utc_iso: instant.to_rfc3339_opts(SecondsFormat::Millis, true),
            today_date,
            today_human: today_date.format(HUMAN_DATE_FORMAT).to_string(),
            tomorrow_date,
            tomorrow_human: tomorrow_date.format(HUMAN_DATE_FORMAT).to_string(),
            tomorrow_iso: tomorrow_date.format("%Y-%m-%d").to_string(),
        }
    }
}
