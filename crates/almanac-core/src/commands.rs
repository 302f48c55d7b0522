use std::collections::BTreeMap;
use std::io::{
  self,
  Read
};

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  Local,
  NaiveDate,
  Utc
};
use chrono_tz::Tz;
use tracing::{
  debug,
  info,
  instrument
};

use crate::cli::Invocation;
use crate::config::Config;
use crate::datetime::parse_reference_date;
use crate::notice::ReminderNotice;
use crate::panel::{
  self,
  PanelMode
};
use crate::render::Renderer;
use crate::resolver::Resolver;
use crate::source::EventSource;

pub fn known_command_names()
-> Vec<&'static str> {
  vec![
    "day", "month", "select",
    "calendar", "remind", "_show",
    "help", "version",
  ]
}

pub fn expand_command_abbrev<'a>(
  token: &'a str,
  known: &[&'a str]
) -> Option<&'a str> {
  if known.contains(&token) {
    return Some(token);
  }

  let mut matches =
    known.iter().copied().filter(
      |name| name.starts_with(token)
    );
  let first = matches.next()?;
  if matches.next().is_some() {
    None
  } else {
    Some(first)
  }
}

#[instrument(skip(
  source, cfg, renderer, inv
))]
pub fn dispatch(
  source: &dyn EventSource,
  cfg: &Config,
  renderer: &Renderer,
  inv: Invocation
) -> anyhow::Result<()> {
  let command = inv.command.as_str();

  match command {
    | "_show" => return cmd_show(cfg),
    | "help" => return cmd_help(),
    | "version" => {
      println!(
        "{}",
        env!("CARGO_PKG_VERSION")
      );
      return Ok(());
    }
    | _ => {}
  }

  let resolver =
    Resolver::from_config(cfg)?;
  let today =
    today_in_zone(resolver.zone());

  debug!(
      command,
      args = ?inv.command_args,
      %today,
      "dispatching command"
  );

  match command {
    | "day" => {
      let day = reference_arg(
        command,
        &inv.command_args,
        today
      )?;
      cmd_day(
        source, &resolver, renderer,
        day
      )
    }
    | "month" => {
      let month = reference_arg(
        command,
        &inv.command_args,
        today
      )?;
      cmd_month(
        source, &resolver, renderer,
        month
      )
    }
    | "select" => {
      let date = reference_arg(
        command,
        &inv.command_args,
        today
      )?;
      cmd_select(
        source,
        &resolver,
        renderer,
        panel_mode(cfg)?,
        date
      )
    }
    | "calendar" => {
      let focus = optional_reference_arg(
        command,
        &inv.command_args,
        today
      )?;
      cmd_calendar(
        source,
        &resolver,
        renderer,
        panel_mode(cfg)?,
        focus,
        cfg
          .get_bool(
            "calendar.show_empty"
          )
          .unwrap_or(false)
      )
    }
    | "remind" => {
      let notice = cmd_remind(
        io::stdin().lock(),
        &resolver
      )?;
      println!("{notice}");
      Ok(())
    }
    | other => {
      Err(anyhow!(
        "unknown command: {other}"
      ))
    }
  }
}

#[instrument(skip(
  source, resolver, renderer
))]
fn cmd_day(
  source: &dyn EventSource,
  resolver: &Resolver,
  renderer: &Renderer,
  day: NaiveDate
) -> anyhow::Result<()> {
  info!("command day");
  let events = source.load()?;
  let found = resolver
    .resolve_day_events(&events, day)
    .with_context(|| {
      format!(
        "failed resolving events for \
         {day}"
      )
    })?;
  renderer
    .print_rejected(&found.rejected)?;
  renderer.print_events(&found.events)
}

#[instrument(skip(
  source, resolver, renderer
))]
fn cmd_month(
  source: &dyn EventSource,
  resolver: &Resolver,
  renderer: &Renderer,
  month: NaiveDate
) -> anyhow::Result<()> {
  info!("command month");
  let events = source.load()?;
  let found = resolver
    .resolve_month_events(
      &events, month
    )
    .with_context(|| {
      format!(
        "failed resolving events for \
         {}",
        month.format("%Y-%m")
      )
    })?;
  renderer
    .print_rejected(&found.rejected)?;
  renderer.print_events(&found.events)
}

#[instrument(skip(
  source, resolver, renderer
))]
fn cmd_select(
  source: &dyn EventSource,
  resolver: &Resolver,
  renderer: &Renderer,
  mode: PanelMode,
  date: NaiveDate
) -> anyhow::Result<()> {
  info!("command select");
  let events = source.load()?;
  let found = panel::select(
    resolver, &events, mode, date
  )
  .with_context(|| {
    format!(
      "failed resolving selection \
       {date}"
    )
  })?;
  renderer
    .print_rejected(&found.rejected)?;
  renderer.print_events(&found.events)
}

#[instrument(skip(
  source, resolver, renderer
))]
fn cmd_calendar(
  source: &dyn EventSource,
  resolver: &Resolver,
  renderer: &Renderer,
  mode: PanelMode,
  focus: NaiveDate,
  show_empty: bool
) -> anyhow::Result<()> {
  info!("command calendar");
  let events = source.load()?;
  let rendered = panel::render_panel(
    resolver, &events, mode, focus
  )
  .context("failed rendering panel")?;
  renderer
    .print_rejected(&rendered.rejected)?;
  renderer
    .print_panel(&rendered, show_empty)
}

fn cmd_remind<R: Read>(
  mut input: R,
  resolver: &Resolver
) -> anyhow::Result<ReminderNotice> {
  info!("command remind");

  let mut payload = String::new();
  input
    .read_to_string(&mut payload)
    .context("failed reading stdin")?;
  if payload.trim().is_empty() {
    return Err(anyhow!(
      "remind: empty input"
    ));
  }

  ReminderNotice::from_payload(
    &payload,
    resolver.format(),
    resolver.zone()
  )
}

fn cmd_show(
  cfg: &Config
) -> anyhow::Result<()> {
  let sorted: BTreeMap<_, _> =
    cfg.iter().collect();
  for (k, v) in sorted {
    println!("{k}={v}");
  }
  Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
  println!(
    "Commands: day <date>, month \
     <date>, select <date>, calendar \
     [date], remind (payload on \
     stdin), _show, help, version"
  );
  Ok(())
}

fn panel_mode(
  cfg: &Config
) -> anyhow::Result<PanelMode> {
  cfg
    .get("calendar.mode")
    .map(|raw| raw.parse::<PanelMode>())
    .transpose()
    .map(Option::unwrap_or_default)
}

fn reference_arg(
  command: &str,
  args: &[String],
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  match args {
    | [single] => {
      parse_reference_date(
        single, today
      )
    }
    | [] => {
      Err(anyhow!(
        "{command}: missing date \
         argument"
      ))
    }
    | _ => {
      Err(anyhow!(
        "{command}: expected one date, \
         got {}",
        args.len()
      ))
    }
  }
}

fn optional_reference_arg(
  command: &str,
  args: &[String],
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  if args.is_empty() {
    return Ok(today);
  }
  reference_arg(command, args, today)
}

fn today_in_zone(
  zone: Option<&Tz>
) -> NaiveDate {
  match zone {
    | Some(tz) => {
      Utc::now()
        .with_timezone(tz)
        .date_naive()
    }
    | None => Local::now().date_naive()
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;
  use crate::source::FileSource;

  fn ymd(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  #[test]
  fn abbreviations_must_be_unique() {
    let known = known_command_names();
    assert_eq!(
      expand_command_abbrev("cal", &known),
      Some("calendar")
    );
    assert_eq!(
      expand_command_abbrev("d", &known),
      Some("day")
    );
    assert_eq!(
      expand_command_abbrev("_", &known),
      Some("_show")
    );
    assert_eq!(
      expand_command_abbrev("x", &known),
      None
    );
  }

  #[test]
  fn reference_argument_count_is_checked() {
    let today = ymd(2024, 3, 11);
    assert_eq!(
      reference_arg(
        "day",
        &["tomorrow".to_string()],
        today
      )
      .expect("one arg"),
      ymd(2024, 3, 12)
    );
    assert!(
      reference_arg("day", &[], today)
        .is_err()
    );
    assert!(
      reference_arg(
        "day",
        &[
          "today".to_string(),
          "tomorrow".to_string()
        ],
        today
      )
      .is_err()
    );
    assert_eq!(
      optional_reference_arg(
        "calendar",
        &[],
        today
      )
      .expect("defaults to today"),
      today
    );
  }

  #[test]
  fn panel_mode_comes_from_config() {
    let mut cfg = Config::default();
    assert_eq!(
      panel_mode(&cfg).expect("default"),
      PanelMode::Month
    );
    cfg.apply_overrides(vec![(
      "calendar.mode".to_string(),
      "year".to_string()
    )]);
    assert_eq!(
      panel_mode(&cfg).expect("year"),
      PanelMode::Year
    );
    cfg.apply_overrides(vec![(
      "calendar.mode".to_string(),
      "week".to_string()
    )]);
    assert!(panel_mode(&cfg).is_err());
  }

  #[test]
  fn remind_reads_payload() {
    let payload = br#"{"title":"Call","start_date":"2024-03-11T14:00:00Z","end_date":"2024-03-11T14:30:00Z","reminder":10}"#;
    let notice = cmd_remind(
      &payload[..],
      &Resolver::default()
    )
    .expect("notice");
    assert_eq!(
      notice.message(),
      "You have \"Call\" scheduled from \
       14:00 to 14:30"
    );

    assert!(
      cmd_remind(
        &b"  \n"[..],
        &Resolver::default()
      )
      .is_err()
    );
  }

  #[test]
  fn config_commands_survive_bad_resolver_settings(
  ) {
    let mut cfg = Config::default();
    cfg.apply_overrides(vec![
      (
        "month.match".to_string(),
        "yearly".to_string()
      ),
      (
        "timezone".to_string(),
        "Mars/Olympus".to_string()
      ),
    ]);
    let source =
      FileSource::new("missing.json");
    let renderer = Renderer::new(&cfg)
      .expect("renderer");
    let invoke = |command: &str| {
      dispatch(
        &source,
        &cfg,
        &renderer,
        Invocation {
          command:      command
            .to_string(),
          command_args: vec![]
        }
      )
    };

    for command in
      ["_show", "help", "version"]
    {
      invoke(command).unwrap_or_else(
        |err| panic!("{command}: {err:#}")
      );
    }

    let err = invoke("calendar")
      .expect_err("resolver settings");
    assert!(
      err
        .to_string()
        .contains("month.match"),
      "{err:#}"
    );
  }
}
