use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tracing::{debug, info};

use crate::event::Event;

/// Supplies the full event collection for one render pass.
pub trait EventSource {
    fn load(&self) -> anyhow::Result<Vec<Event>>;
}

/// Events stored in a file, either as a JSON array or as JSON Lines.
#[derive(Debug, Clone)]
pub struct FileSource {
    pub path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl EventSource for FileSource {
    #[tracing::instrument(skip(self), fields(path = %self.path.display()))]
    fn load(&self) -> anyhow::Result<Vec<Event>> {
        let events = load_events(&self.path)
            .with_context(|| format!("failed to load events from {}", self.path.display()))?;
        info!(count = events.len(), "loaded events");
        Ok(events)
    }
}

fn load_events(path: &Path) -> anyhow::Result<Vec<Event>> {
    let text = fs::read_to_string(path)?;
    parse_events(&text)
}

/// Parses a JSON array or one event per non-blank line.
pub fn parse_events(text: &str) -> anyhow::Result<Vec<Event>> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('[') {
        debug!("parsing events as JSON array");
        return serde_json::from_str(trimmed).context("failed parsing JSON array of events");
    }

    debug!("parsing events as JSON lines");
    let mut out = Vec::new();
    for (line_num, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let event: Event = serde_json::from_str(trimmed)
            .map_err(|e| anyhow!("invalid event on line {}: {e}", line_num + 1))?;
        out.push(event);
    }
    Ok(out)
}
