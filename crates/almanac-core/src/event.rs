use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// An event record as delivered by the data source or a reminder payload.
///
/// Timestamps stay in their raw form; they are parsed on demand with a
/// [`crate::datetime::TimestampFormat`] so that one bad record never
/// prevents the rest of the collection from loading.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub title: String,

    pub start_date: String,

    pub end_date: String,

    /// Lead time in minutes; fractional values are kept as given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder: Option<f64>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Event {
    pub fn new(title: impl Into<String>, start_date: impl Into<String>, end_date: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            start_date: start_date.into(),
            end_date: end_date.into(),
            reminder: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_reminder(mut self, minutes: f64) -> Self {
        self.reminder = Some(minutes);
        self
    }
}

/// A parsed event timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTime {
    /// A point in time with a UTC offset (RFC 3339).
    Instant(DateTime<FixedOffset>),
    /// A wall-clock date-time with no offset.
    Floating(NaiveDateTime),
    Date(NaiveDate),
}

impl EventTime {
    /// The calendar day this timestamp falls on, time-of-day stripped.
    ///
    /// Instants keep the date as written unless a calendar zone is given,
    /// in which case they are shifted into that zone first. Floating and
    /// date-only values are never shifted.
    pub fn calendar_date(&self, zone: Option<&Tz>) -> NaiveDate {
        match self {
            EventTime::Instant(dt) => match zone {
                Some(tz) => dt.with_timezone(tz).date_naive(),
                None => dt.date_naive(),
            },
            EventTime::Floating(ndt) => ndt.date(),
            EventTime::Date(date) => *date,
        }
    }

    /// Wall-clock time, or `None` for date-only values.
    pub fn time_of_day(&self, zone: Option<&Tz>) -> Option<NaiveTime> {
        match self {
            EventTime::Instant(dt) => Some(match zone {
                Some(tz) => dt.with_timezone(tz).time(),
                None => dt.time(),
            }),
            EventTime::Floating(ndt) => Some(ndt.time()),
            EventTime::Date(_) => None,
        }
    }
}
