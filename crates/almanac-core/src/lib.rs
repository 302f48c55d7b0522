//! Places calendar events on day and month cells.
//!
//! The [`resolver`] module is the reusable core; the remaining modules
//! load events, lay out calendar panels and drive the `almanac` CLI.

pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod error;
pub mod event;
pub mod notice;
pub mod panel;
pub mod render;
pub mod resolver;
pub mod source;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

pub use error::{
  ParseError,
  ResolveError
};
pub use event::{
  Event,
  EventTime
};
pub use resolver::{
  Granularity,
  MonthMatching,
  ParsePolicy,
  Resolution,
  Resolver,
  resolve_day_events,
  resolve_month_events
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting almanac CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.almanacrc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let events_path =
    config::resolve_events_path(
      &cfg,
      cli.events.as_deref()
    )
    .context(
      "failed to resolve event file"
    )?;
  let source =
    source::FileSource::new(
      events_path
    );

  let renderer =
    render::Renderer::new(&cfg)?;
  let inv = cli::Invocation::parse(
    &cfg, cli.rest
  )?;

  commands::dispatch(
    &source, &cfg, &renderer, inv
  )?;

  info!("done");
  Ok(())
}
