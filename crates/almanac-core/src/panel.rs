use std::str::FromStr;

use anyhow::anyhow;
use chrono::{Datelike, NaiveDate};
use tracing::debug;

use crate::datetime::{days_in_month, first_day_of_month};
use crate::error::ResolveResult;
use crate::event::Event;
use crate::resolver::{Granularity, Rejected, Resolution, Resolver};

/// Which panel the calendar is showing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PanelMode {
    /// One month, one cell per day.
    #[default]
    Month,
    /// One year, one cell per month.
    Year,
}

impl PanelMode {
    /// Granularity of a single cell in this panel.
    pub fn granularity(self) -> Granularity {
        match self {
            PanelMode::Month => Granularity::Day,
            PanelMode::Year => Granularity::Month,
        }
    }
}

impl FromStr for PanelMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            other => Err(anyhow!(
                "invalid calendar.mode setting: {other} (expected month or year)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelCell<'a> {
    pub date: NaiveDate,
    pub events: Vec<&'a Event>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Panel<'a> {
    pub mode: PanelMode,
    pub focus: NaiveDate,
    pub cells: Vec<PanelCell<'a>>,
    /// Unparseable events, reported once per panel rather than per cell.
    pub rejected: Vec<Rejected>,
}

/// Dates of every cell in the panel around `focus`.
pub fn panel_cells(mode: PanelMode, focus: NaiveDate) -> Vec<NaiveDate> {
    match mode {
        PanelMode::Month => (1..=days_in_month(focus.year(), focus.month()))
            .filter_map(|day| NaiveDate::from_ymd_opt(focus.year(), focus.month(), day))
            .collect(),
        PanelMode::Year => (1..=12)
            .map(|month| first_day_of_month(focus.year(), month))
            .collect(),
    }
}

#[tracing::instrument(skip(resolver, events), fields(events = events.len()))]
pub fn render_panel<'a>(
    resolver: &Resolver,
    events: &'a [Event],
    mode: PanelMode,
    focus: NaiveDate,
) -> ResolveResult<Panel<'a>> {
    let granularity = mode.granularity();
    let mut cells = Vec::new();
    let mut rejected: Vec<Rejected> = Vec::new();

    for date in panel_cells(mode, focus) {
        let resolution = resolver.resolve(granularity, events, date)?;
        for entry in resolution.rejected {
            if !rejected.iter().any(|seen| seen.index == entry.index) {
                rejected.push(entry);
            }
        }
        cells.push(PanelCell {
            date,
            events: resolution.events,
        });
    }

    debug!(
        cells = cells.len(),
        busy = cells.iter().filter(|cell| !cell.events.is_empty()).count(),
        rejected = rejected.len(),
        "panel rendered"
    );

    Ok(Panel {
        mode,
        focus,
        cells,
        rejected,
    })
}

/// Resolves a selected cell the way the panel it was picked from does.
pub fn select<'a>(
    resolver: &Resolver,
    events: &'a [Event],
    mode: PanelMode,
    date: NaiveDate,
) -> ResolveResult<Resolution<'a>> {
    resolver.resolve(mode.granularity(), events, date)
}
