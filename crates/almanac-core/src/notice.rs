use anyhow::Context;
use chrono_tz::Tz;

use crate::datetime::TimestampFormat;
use crate::error::{ParseError, TimestampField};
use crate::event::{Event, EventTime};

/// Toast text for a reminder pushed by the notification channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderNotice {
    pub title: String,
    pub starts: String,
    pub ends: String,
}

impl ReminderNotice {
    pub fn from_event(event: &Event, format: &TimestampFormat, zone: Option<&Tz>) -> Result<Self, ParseError> {
        let start = format.parse(&event.start_date, TimestampField::Start)?;
        let end = format.parse(&event.end_date, TimestampField::End)?;

        Ok(Self {
            title: event.title.clone(),
            starts: clock_label(&start, zone),
            ends: clock_label(&end, zone),
        })
    }

    /// Decodes a reminder payload carrying the event shape.
    pub fn from_payload(payload: &str, format: &TimestampFormat, zone: Option<&Tz>) -> anyhow::Result<Self> {
        let event: Event = serde_json::from_str(payload.trim()).context("invalid reminder payload")?;
        Ok(Self::from_event(&event, format, zone)?)
    }

    pub fn message(&self) -> String {
        format!("You have \"{}\" scheduled from {} to {}", self.title, self.starts, self.ends)
    }
}

impl std::fmt::Display for ReminderNotice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message())
    }
}

// HH:MM, or the date for all-day values.
fn clock_label(time: &EventTime, zone: Option<&Tz>) -> String {
    match time.time_of_day(zone) {
        Some(clock) => clock.format("%H:%M").to_string(),
        None => time.calendar_date(zone).format("%Y-%m-%d").to_string(),
    }
}
