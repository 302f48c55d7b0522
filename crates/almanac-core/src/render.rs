use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::event::Event;
use crate::panel::{Panel, PanelMode};
use crate::resolver::Rejected;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    #[tracing::instrument(skip(self, out, events))]
    pub fn write_events<W: Write>(&self, mut out: W, events: &[&Event]) -> anyhow::Result<()> {
        if events.is_empty() {
            writeln!(out, "No events.")?;
            return Ok(());
        }

        let headers = vec![
            "#".to_string(),
            "Title".to_string(),
            "Start".to_string(),
            "End".to_string(),
            "Reminder".to_string(),
        ];

        let rows = events
            .iter()
            .enumerate()
            .map(|(idx, event)| {
                vec![
                    self.paint(&(idx + 1).to_string(), "33"),
                    event.title.clone(),
                    event.start_date.clone(),
                    event.end_date.clone(),
                    event
                        .reminder
                        .map(|minutes| format!("{minutes}m"))
                        .unwrap_or_default(),
                ]
            })
            .collect();

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, out, panel))]
    pub fn write_panel<W: Write>(&self, mut out: W, panel: &Panel<'_>, show_empty: bool) -> anyhow::Result<()> {
        let title = match panel.mode {
            PanelMode::Month => panel.focus.format("%B %Y").to_string(),
            PanelMode::Year => panel.focus.format("%Y").to_string(),
        };
        writeln!(out, "{}", self.paint(&title, "1"))?;

        let headers = vec!["Cell".to_string(), "Count".to_string(), "Events".to_string()];
        let rows: Vec<Vec<String>> = panel
            .cells
            .iter()
            .filter(|cell| show_empty || !cell.events.is_empty())
            .map(|cell| {
                let label = match panel.mode {
                    PanelMode::Month => cell.date.format("%a %d").to_string(),
                    PanelMode::Year => cell.date.format("%b").to_string(),
                };
                let titles = cell
                    .events
                    .iter()
                    .map(|event| event.title.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                vec![label, cell.events.len().to_string(), titles]
            })
            .collect();

        if rows.is_empty() {
            writeln!(out, "No events.")?;
        } else {
            write_table(&mut out, headers, rows)?;
        }
        Ok(())
    }

    pub fn write_rejected<W: Write>(&self, mut out: W, rejected: &[Rejected]) -> anyhow::Result<()> {
        for entry in rejected {
            writeln!(
                out,
                "{} event #{} skipped: {}",
                self.paint("warning:", "31"),
                entry.index + 1,
                entry.error
            )?;
        }
        Ok(())
    }

    pub fn print_events(&self, events: &[&Event]) -> anyhow::Result<()> {
        let stdout = io::stdout();
        self.for_stream(&stdout).write_events(stdout.lock(), events)
    }

    pub fn print_panel(&self, panel: &Panel<'_>, show_empty: bool) -> anyhow::Result<()> {
        let stdout = io::stdout();
        self.for_stream(&stdout).write_panel(stdout.lock(), panel, show_empty)
    }

    pub fn print_rejected(&self, rejected: &[Rejected]) -> anyhow::Result<()> {
        let stderr = io::stderr();
        self.for_stream(&stderr).write_rejected(stderr.lock(), rejected)
    }

    /// Colour only when enabled and `stream` is a terminal.
    fn for_stream(&self, stream: &impl IsTerminal) -> Self {
        Self {
            color: self.color && stream.is_terminal(),
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for (idx, header) in headers.iter().enumerate() {
        write!(writer, "{:width$} ", header, width = widths[idx])?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
