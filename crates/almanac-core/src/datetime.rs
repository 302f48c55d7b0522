use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Datelike,
  NaiveDate,
  NaiveDateTime,
  TimeDelta,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;
use serde::Deserialize;

use crate::error::{
  ParseError,
  TimestampField
};
use crate::event::EventTime;

const TIMEZONE_CONFIG_FILE: &str =
  "almanac-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "ALMANAC_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "ALMANAC_TIME_CONFIG";

pub const DEFAULT_DATETIME_PATTERN:
  &str = "%Y-%m-%dT%H:%M:%S";
pub const DEFAULT_DATE_PATTERN: &str =
  "%Y-%m-%d";

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
  timezone: Option<String>,
  time:     Option<TimezoneSection>
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
  timezone: Option<String>
}

/// Accepted layouts for event
/// timestamps, tried in order: RFC 3339,
/// then the floating date-time pattern,
/// then the date-only pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampFormat {
  datetime_pattern: String,
  date_pattern:     String
}

impl Default for TimestampFormat {
  fn default() -> Self {
    Self {
      datetime_pattern:
        DEFAULT_DATETIME_PATTERN
          .to_string(),
      date_pattern:
        DEFAULT_DATE_PATTERN.to_string()
    }
  }
}

impl TimestampFormat {
  pub fn new(
    datetime_pattern: impl Into<String>,
    date_pattern: impl Into<String>
  ) -> Self {
    Self {
      datetime_pattern: datetime_pattern
        .into(),
      date_pattern:     date_pattern
        .into()
    }
  }

  pub fn datetime_pattern(
    &self
  ) -> &str {
    &self.datetime_pattern
  }

  pub fn date_pattern(&self) -> &str {
    &self.date_pattern
  }

  pub fn parse(
    &self,
    raw: &str,
    field: TimestampField
  ) -> Result<EventTime, ParseError> {
    let token = raw.trim();
    if token.is_empty() {
      return Err(ParseError::new(
        field,
        raw,
        "timestamp is empty"
      ));
    }

    if let Ok(dt) =
      DateTime::parse_from_rfc3339(token)
    {
      return Ok(EventTime::Instant(dt));
    }

    if let Ok(ndt) =
      NaiveDateTime::parse_from_str(
        token,
        &self.datetime_pattern
      )
    {
      return Ok(EventTime::Floating(
        ndt
      ));
    }

    if let Ok(date) =
      NaiveDate::parse_from_str(
        token,
        &self.date_pattern
      )
    {
      return Ok(EventTime::Date(date));
    }

    Err(ParseError::new(
      field,
      raw,
      format!(
        "expected RFC 3339, '{}' or \
         '{}'",
        self.datetime_pattern,
        self.date_pattern
      )
    ))
  }
}

/// Calendar time zone used to place
/// offset-aware instants on a day.
///
/// An explicitly configured value must
/// be valid; the environment and the
/// `almanac-time.toml` fallbacks are
/// best-effort. `None` means dates are
/// taken as written.
pub fn calendar_timezone(
  configured: Option<&str>
) -> anyhow::Result<Option<Tz>> {
  if let Some(raw) = configured {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      let tz =
        trimmed.parse::<Tz>().map_err(
          |err| {
            anyhow!(
              "invalid timezone \
               setting '{trimmed}': \
               {err}"
            )
          }
        )?;
      return Ok(Some(tz));
    }
  }

  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) =
      parse_timezone(&raw, TIMEZONE_ENV_VAR)
  {
    return Ok(Some(tz));
  }

  if let Some(path) =
    timezone_config_path()
    && let Some(tz) =
      load_timezone_from_file(&path)
  {
    return Ok(Some(tz));
  }

  tracing::debug!(
    "no calendar timezone configured; \
     using dates as written"
  );
  Ok(None)
}

fn timezone_config_path()
-> Option<PathBuf> {
  if let Ok(raw) = std::env::var(
    TIMEZONE_CONFIG_ENV_VAR
  ) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  std::env::current_dir().ok().map(
    |dir| {
      dir.join(TIMEZONE_CONFIG_FILE)
    }
  )
}

fn load_timezone_from_file(
  path: &Path
) -> Option<Tz> {
  let raw = fs::read_to_string(path).ok()?;

  let parsed = match toml::from_str::<
    TimezoneConfig
  >(&raw)
  {
    | Ok(parsed) => parsed,
    | Err(err) => {
      tracing::warn!(
        file = %path.display(),
        error = %err,
        "ignoring unparseable timezone file"
      );
      return None;
    }
  };

  let timezone =
    parsed.timezone.or_else(|| {
      parsed.time.and_then(|section| {
        section.timezone
      })
    })?;
  parse_timezone(
    &timezone,
    &format!("file:{}", path.display())
  )
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "configured calendar timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::warn!(
        source,
        timezone = %trimmed,
        error = %err,
        "ignoring invalid timezone id"
      );
      None
    }
  }
}

/// Parses a reference date typed on
/// the command line, relative to
/// `today`.
#[tracing::instrument(skip(today), fields(input = input))]
pub fn parse_reference_date(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "today" => return Ok(today),
    | "tomorrow" => {
      return add_days(today, 1)
        .ok_or_else(|| {
          anyhow!("date out of range")
        });
    }
    | "yesterday" => {
      return add_days(today, -1)
        .ok_or_else(|| {
          anyhow!("date out of range")
        });
    }
    | _ => {}
  }

  if token.len() == 4
    && token
      .chars()
      .all(|c| c.is_ascii_digit())
  {
    let year: i32 =
      token.parse().context(
        "invalid 4-digit year"
      )?;
    return NaiveDate::from_ymd_opt(
      year, 1, 1
    )
    .ok_or_else(|| {
      anyhow!(
        "invalid year value: {year}"
      )
    });
  }

  if let Some(target_weekday) =
    parse_weekday_name(&lower)
  {
    return next_weekday_date(
      today,
      target_weekday
    )
    .ok_or_else(|| {
      anyhow!("date out of range")
    });
  }

  if let Some(target_month) =
    parse_month_name(&lower)
  {
    return NaiveDate::from_ymd_opt(
      today.year(),
      target_month,
      1
    )
    .ok_or_else(|| {
      anyhow!(
        "invalid month value: \
         {target_month}"
      )
    });
  }

  let rel_re = Regex::new(r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dwm])$")
        .map_err(|e| anyhow!("internal regex compile failure: {e}"))?;

  if let Some(caps) =
    rel_re.captures(&lower)
  {
    let sign = caps
      .name("sign")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!("missing relative sign")
      })?;
    let num: i64 = caps
      .name("num")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!(
          "missing relative amount"
        )
      })?
      .parse()
      .context(
        "invalid relative number"
      )?;
    let unit = caps
      .name("unit")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!("missing relative unit")
      })?;
    let signed =
      if sign == "-" { -num } else { num };

    let shifted = match unit {
      | "d" => add_days(today, signed),
      | "w" => {
        signed.checked_mul(7).and_then(
          |days| add_days(today, days)
        )
      }
      | "m" => shift_months(today, signed),
      | _ => {
        return Err(anyhow!(
          "unknown relative unit: \
           {unit}"
        ));
      }
    };
    return shifted.ok_or_else(|| {
      anyhow!(
        "relative offset out of range: \
         {input}"
      )
    });
  }

  let month_re = Regex::new(r"^\d{4}-\d{2}$")
        .map_err(|e| anyhow!("internal regex compile failure: {e}"))?;
  if month_re.is_match(token) {
    return NaiveDate::parse_from_str(
      &format!("{token}-01"),
      "%Y-%m-%d"
    )
    .with_context(|| {
      format!(
        "invalid month reference: \
         {token}"
      )
    });
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      token, "%Y-%m-%d"
    )
  {
    return Ok(date);
  }

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(token)
  {
    return Ok(dt.date_naive());
  }

  Err(anyhow!(
    "unrecognized date expression: \
     {input}"
  ))
  .with_context(|| {
    "supported formats: \
     today/tomorrow/yesterday, 4-digit \
     year, weekday names (e.g. \
     monday), month names (e.g. \
     march), +Nd/+Nw/+Nm, YYYY-MM, \
     YYYY-MM-DD, RFC3339"
  })
}

pub fn first_day_of_month(
  year: i32,
  month: u32
) -> NaiveDate {
  NaiveDate::from_ymd_opt(
    year, month, 1
  )
  .unwrap_or(NaiveDate::MIN)
}

pub fn last_day_of_month(
  year: i32,
  month: u32
) -> NaiveDate {
  let (next_year, next_month) =
    if month >= 12 {
      (year.saturating_add(1), 1_u32)
    } else {
      (year, month + 1)
    };
  first_day_of_month(
    next_year, next_month
  )
  .pred_opt()
  .unwrap_or(NaiveDate::MAX)
}

pub fn days_in_month(
  year: i32,
  month: u32
) -> u32 {
  last_day_of_month(year, month).day()
}

fn add_days(
  date: NaiveDate,
  days: i64
) -> Option<NaiveDate> {
  date.checked_add_signed(
    TimeDelta::try_days(days)?
  )
}

fn shift_months(
  date: NaiveDate,
  delta: i64
) -> Option<NaiveDate> {
  let total = i64::from(date.year())
    .checked_mul(12)?
    .checked_add(i64::from(
      date.month0()
    ))?
    .checked_add(delta)?;
  let year =
    i32::try_from(total.div_euclid(12))
      .ok()?;
  let month =
    total.rem_euclid(12) as u32 + 1;
  let day = date
    .day()
    .min(days_in_month(year, month));
  NaiveDate::from_ymd_opt(
    year, month, day
  )
}

fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token.trim() {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "tuesday" | "tue" | "tues" => {
      Some(Weekday::Tue)
    }
    | "wednesday" | "wed" => {
      Some(Weekday::Wed)
    }
    | "thursday" | "thu" | "thur"
    | "thurs" => Some(Weekday::Thu),
    | "friday" | "fri" => {
      Some(Weekday::Fri)
    }
    | "saturday" | "sat" => {
      Some(Weekday::Sat)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

fn next_weekday_date(
  from: NaiveDate,
  target: Weekday
) -> Option<NaiveDate> {
  let from_idx = from
    .weekday()
    .num_days_from_monday()
    as i64;
  let target_idx = target
    .num_days_from_monday()
    as i64;
  let mut delta =
    (7 + target_idx - from_idx) % 7;
  if delta == 0 {
    delta = 7;
  }
  add_days(from, delta)
}

fn parse_month_name(
  token: &str
) -> Option<u32> {
  match token.trim() {
    | "january" | "jan" => Some(1),
    | "february" | "feb" => Some(2),
    | "march" | "mar" => Some(3),
    | "april" | "apr" => Some(4),
    | "may" => Some(5),
    | "june" | "jun" => Some(6),
    | "july" | "jul" => Some(7),
    | "august" | "aug" => Some(8),
    | "september" | "sep" | "sept" => {
      Some(9)
    }
    | "october" | "oct" => Some(10),
    | "november" | "nov" => Some(11),
    | "december" | "dec" => Some(12),
    | _ => None
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use std::fs;

  use tempfile::tempdir;

  use super::{
    TimestampFormat,
    calendar_timezone,
    days_in_month,
    load_timezone_from_file,
    parse_reference_date
  };
  use crate::error::TimestampField;
  use crate::event::EventTime;

  fn ymd(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  #[test]
  fn parses_each_timestamp_layout() {
    let format =
      TimestampFormat::default();

    let instant = format
      .parse(
        "2024-03-10T23:30:00+02:00",
        TimestampField::Start
      )
      .expect("rfc3339");
    assert!(matches!(
      instant,
      EventTime::Instant(_)
    ));
    assert_eq!(
      instant.calendar_date(None),
      ymd(2024, 3, 10)
    );

    let floating = format
      .parse(
        "2024-03-10T08:00:00",
        TimestampField::Start
      )
      .expect("floating");
    assert!(matches!(
      floating,
      EventTime::Floating(_)
    ));

    let date = format
      .parse(
        " 2024-03-10 ",
        TimestampField::End
      )
      .expect("date only");
    assert_eq!(
      date,
      EventTime::Date(ymd(2024, 3, 10))
    );
  }

  #[test]
  fn rejects_timestamps_outside_the_layouts(
  ) {
    let format =
      TimestampFormat::default();

    for raw in [
      "",
      "10/03/2024",
      "2024-13-01",
      "2024-03-10 08:00",
      "not a date"
    ] {
      let err = format
        .parse(
          raw,
          TimestampField::Start
        )
        .expect_err("should fail");
      assert_eq!(
        err.field,
        TimestampField::Start
      );
      assert_eq!(err.value, raw);
    }
  }

  #[test]
  fn custom_patterns_replace_defaults() {
    let format = TimestampFormat::new(
      "%d.%m.%Y %H:%M",
      "%d.%m.%Y"
    );
    assert_eq!(
      format
        .parse(
          "11.03.2024",
          TimestampField::Start
        )
        .expect("custom date")
        .calendar_date(None),
      ymd(2024, 3, 11)
    );
    assert!(
      format
        .parse(
          "2024-03-11",
          TimestampField::Start
        )
        .is_err()
    );
  }

  #[test]
  fn parses_relative_reference_dates() {
    let today = ymd(2026, 1, 31);

    let cases = [
      ("today", ymd(2026, 1, 31)),
      ("tomorrow", ymd(2026, 2, 1)),
      ("yesterday", ymd(2026, 1, 30)),
      ("+2d", ymd(2026, 2, 2)),
      ("-1w", ymd(2026, 1, 24)),
      ("+1m", ymd(2026, 2, 28)),
      ("-2m", ymd(2025, 11, 30))
    ];
    for (input, expected) in cases {
      assert_eq!(
        parse_reference_date(
          input, today
        )
        .expect("parse reference"),
        expected,
        "{input}"
      );
    }

    for input in [
      "+99999999999999d",
      "+9223372036854775807w",
      "+9223372036854775807m",
      "-9223372036854775807m",
      "+99999999m"
    ] {
      let err =
        parse_reference_date(input, today)
          .expect_err("out of range");
      assert!(
        err
          .to_string()
          .contains("out of range"),
        "{input}: {err}"
      );
    }
  }

  #[test]
  fn parses_named_and_absolute_reference_dates(
  ) {
    let today = ymd(2026, 2, 17);

    let cases = [
      ("wednesday", ymd(2026, 2, 18)),
      ("tue", ymd(2026, 2, 24)),
      ("march", ymd(2026, 3, 1)),
      ("jan", ymd(2026, 1, 1)),
      ("2028", ymd(2028, 1, 1)),
      ("2024-03", ymd(2024, 3, 1)),
      ("2024-03-11", ymd(2024, 3, 11)),
      (
        "2024-03-11T22:00:00-05:00",
        ymd(2024, 3, 11)
      )
    ];
    for (input, expected) in cases {
      assert_eq!(
        parse_reference_date(
          input, today
        )
        .expect("parse reference"),
        expected,
        "{input}"
      );
    }

    assert!(
      parse_reference_date(
        "someday", today
      )
      .is_err()
    );
    assert!(
      parse_reference_date(
        "2024-13", today
      )
      .is_err()
    );
  }

  #[test]
  fn month_lengths_follow_leap_years() {
    assert_eq!(days_in_month(2024, 2), 29);
    assert_eq!(days_in_month(2025, 2), 28);
    assert_eq!(days_in_month(2025, 12), 31);
  }

  #[test]
  fn configured_timezone_must_be_valid() {
    let tz = calendar_timezone(Some(
      "Europe/Moscow"
    ))
    .expect("valid zone");
    assert_eq!(
      tz,
      Some(chrono_tz::Europe::Moscow)
    );

    assert!(
      calendar_timezone(Some(
        "Mars/Olympus"
      ))
      .is_err()
    );
  }

  #[test]
  fn timezone_file_is_best_effort() {
    let temp = tempdir().expect("tempdir");

    let nested =
      temp.path().join("nested.toml");
    fs::write(
      &nested,
      "[time]\ntimezone = \"Asia/Tokyo\"\n"
    )
    .expect("write nested");
    assert_eq!(
      load_timezone_from_file(&nested),
      Some(chrono_tz::Asia::Tokyo)
    );

    let top =
      temp.path().join("top.toml");
    fs::write(
      &top,
      "timezone = \"Europe/Moscow\"\n"
    )
    .expect("write top-level");
    assert_eq!(
      load_timezone_from_file(&top),
      Some(chrono_tz::Europe::Moscow)
    );

    let broken =
      temp.path().join("broken.toml");
    fs::write(&broken, "timezone = [")
      .expect("write broken");
    assert_eq!(
      load_timezone_from_file(&broken),
      None
    );

    let unknown =
      temp.path().join("unknown.toml");
    fs::write(
      &unknown,
      "timezone = \"Mars/Olympus\"\n"
    )
    .expect("write unknown");
    assert_eq!(
      load_timezone_from_file(&unknown),
      None
    );

    assert_eq!(
      load_timezone_from_file(
        &temp.path().join("missing.toml")
      ),
      None
    );
  }
}
