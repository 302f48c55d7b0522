//! Event-to-cell resolution.
//!
//! Both resolvers are stable filters: the
//! returned events borrow from the input
//! slice and keep its order. Nothing here
//! holds state between calls.

use std::str::FromStr;

use anyhow::anyhow;
use chrono::{
  Datelike,
  NaiveDate
};
use chrono_tz::Tz;
use tracing::{
  trace,
  warn
};

use crate::config::Config;
use crate::datetime::{
  TimestampFormat,
  calendar_timezone
};
use crate::error::{
  ParseError,
  ResolveError,
  ResolveResult,
  TimestampField
};
use crate::event::Event;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum Granularity {
  Day,
  Month
}

/// How a month cell is compared with an
/// event's start date.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
)]
pub enum MonthMatching {
  /// Year and month must both match.
  #[default]
  YearAndMonth,
  /// Only the month number is compared,
  /// so an event shows up in the same
  /// month of every year.
  MonthOfYear
}

impl FromStr for MonthMatching {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "year-and-month" => {
        Ok(Self::YearAndMonth)
      }
      | "month-of-year" => {
        Ok(Self::MonthOfYear)
      }
      | other => {
        Err(anyhow!(
          "invalid month.match \
           setting: {other} (expected \
           year-and-month or \
           month-of-year)"
        ))
      }
    }
  }
}

/// What to do with an event whose
/// timestamp does not parse.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
)]
pub enum ParsePolicy {
  /// Exclude the event and report it in
  /// [`Resolution::rejected`].
  #[default]
  Skip,
  /// Fail the whole call.
  Strict
}

impl FromStr for ParsePolicy {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "skip" => Ok(Self::Skip),
      | "strict" => Ok(Self::Strict),
      | other => {
        Err(anyhow!(
          "invalid parse.policy \
           setting: {other} (expected \
           skip or strict)"
        ))
      }
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected {
  /// Position in the input collection.
  pub index: usize,
  pub error: ParseError
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution<'a> {
  pub events:   Vec<&'a Event>,
  pub rejected: Vec<Rejected>
}

impl Resolution<'_> {
  pub fn is_empty(&self) -> bool {
    self.events.is_empty()
  }

  pub fn len(&self) -> usize {
    self.events.len()
  }
}

#[derive(Debug, Clone, Default)]
pub struct Resolver {
  format:         TimestampFormat,
  month_matching: MonthMatching,
  parse_policy:   ParsePolicy,
  zone:           Option<Tz>
}

impl Resolver {
  pub fn new() -> Self {
    Self::default()
  }

  /// Builds a resolver from the
  /// `timestamp.*`, `month.match`,
  /// `parse.policy` and `timezone`
  /// keys.
  #[tracing::instrument(skip(cfg))]
  pub fn from_config(
    cfg: &Config
  ) -> anyhow::Result<Self> {
    let defaults =
      TimestampFormat::default();
    let format = TimestampFormat::new(
      cfg
        .get("timestamp.datetime")
        .unwrap_or_else(|| {
          defaults
            .datetime_pattern()
            .to_string()
        }),
      cfg
        .get("timestamp.date")
        .unwrap_or_else(|| {
          defaults
            .date_pattern()
            .to_string()
        })
    );

    let month_matching = cfg
      .get("month.match")
      .map(|raw| raw.parse::<MonthMatching>())
      .transpose()?
      .unwrap_or_default();
    let parse_policy = cfg
      .get("parse.policy")
      .map(|raw| raw.parse::<ParsePolicy>())
      .transpose()?
      .unwrap_or_default();
    let zone = calendar_timezone(
      cfg.get("timezone").as_deref()
    )?;

    Ok(Self {
      format,
      month_matching,
      parse_policy,
      zone
    })
  }

  pub fn with_format(
    mut self,
    format: TimestampFormat
  ) -> Self {
    self.format = format;
    self
  }

  pub fn with_month_matching(
    mut self,
    month_matching: MonthMatching
  ) -> Self {
    self.month_matching = month_matching;
    self
  }

  pub fn with_parse_policy(
    mut self,
    parse_policy: ParsePolicy
  ) -> Self {
    self.parse_policy = parse_policy;
    self
  }

  pub fn with_zone(
    mut self,
    zone: Option<Tz>
  ) -> Self {
    self.zone = zone;
    self
  }

  pub fn format(
    &self
  ) -> &TimestampFormat {
    &self.format
  }

  pub fn month_matching(
    &self
  ) -> MonthMatching {
    self.month_matching
  }

  pub fn parse_policy(
    &self
  ) -> ParsePolicy {
    self.parse_policy
  }

  pub fn zone(&self) -> Option<&Tz> {
    self.zone.as_ref()
  }

  pub fn resolve<'a>(
    &self,
    granularity: Granularity,
    events: &'a [Event],
    reference: NaiveDate
  ) -> ResolveResult<Resolution<'a>> {
    match granularity {
      | Granularity::Day => {
        self.resolve_day_events(
          events, reference
        )
      }
      | Granularity::Month => {
        self.resolve_month_events(
          events, reference
        )
      }
    }
  }

  /// Events whose inclusive
  /// `[start_date, end_date]` range,
  /// truncated to calendar dates,
  /// contains `day`. An inverted range
  /// matches nothing.
  #[tracing::instrument(skip(self, events), fields(events = events.len()))]
  pub fn resolve_day_events<'a>(
    &self,
    events: &'a [Event],
    day: NaiveDate
  ) -> ResolveResult<Resolution<'a>> {
    self.collect(events, |event| {
      let start = self.calendar_date(
        &event.start_date,
        TimestampField::Start
      )?;
      let end = self.calendar_date(
        &event.end_date,
        TimestampField::End
      )?;
      Ok(start <= day && day <= end)
    })
  }

  /// Events whose `start_date` falls in
  /// the month of `month_reference`.
  /// `end_date` is not consulted.
  #[tracing::instrument(skip(self, events), fields(events = events.len()))]
  pub fn resolve_month_events<'a>(
    &self,
    events: &'a [Event],
    month_reference: NaiveDate
  ) -> ResolveResult<Resolution<'a>> {
    self.collect(events, |event| {
      let start = self.calendar_date(
        &event.start_date,
        TimestampField::Start
      )?;
      Ok(match self.month_matching {
        | MonthMatching::YearAndMonth => {
          start.year()
            == month_reference.year()
            && start.month()
              == month_reference.month()
        }
        | MonthMatching::MonthOfYear => {
          start.month()
            == month_reference.month()
        }
      })
    })
  }

  fn calendar_date(
    &self,
    raw: &str,
    field: TimestampField
  ) -> Result<NaiveDate, ParseError> {
    self
      .format
      .parse(raw, field)
      .map(|time| {
        time.calendar_date(
          self.zone.as_ref()
        )
      })
  }

  fn collect<'a, F>(
    &self,
    events: &'a [Event],
    mut matches: F
  ) -> ResolveResult<Resolution<'a>>
  where
    F: FnMut(
      &Event
    )
      -> Result<bool, ParseError>
  {
    let mut out = Resolution {
      events:   Vec::new(),
      rejected: Vec::new()
    };

    for (index, event) in
      events.iter().enumerate()
    {
      match matches(event) {
        | Ok(true) => out.events.push(event),
        | Ok(false) => {}
        | Err(error) => {
          match self.parse_policy {
            | ParsePolicy::Strict => {
              return Err(
                ResolveError::Parse {
                  index,
                  source: error
                }
              );
            }
            | ParsePolicy::Skip => {
              warn!(
                index,
                title = %event.title,
                error = %error,
                "skipping event with unparseable timestamp"
              );
              out.rejected.push(
                Rejected {
                  index,
                  error
                }
              );
            }
          }
        }
      }
    }

    trace!(
      matched = out.events.len(),
      rejected = out.rejected.len(),
      "resolved cell"
    );
    Ok(out)
  }
}

/// [`Resolver::resolve_day_events`]
/// with default settings.
pub fn resolve_day_events(
  events: &[Event],
  day: NaiveDate
) -> ResolveResult<Resolution<'_>> {
  Resolver::default()
    .resolve_day_events(events, day)
}

/// [`Resolver::resolve_month_events`]
/// with default settings.
pub fn resolve_month_events(
  events: &[Event],
  month_reference: NaiveDate
) -> ResolveResult<Resolution<'_>> {
  Resolver::default()
    .resolve_month_events(
      events,
      month_reference
    )
}
