use std::fs;

use almanac_core::config::Config;
use almanac_core::panel::{PanelMode, render_panel, select};
use almanac_core::source::{EventSource, FileSource};
use almanac_core::{Granularity, ResolveError, Resolver};
use chrono::NaiveDate;
use tempfile::tempdir;

const EVENTS: &str = r#"[
    {"id": 1, "title": "Conference", "start_date": "2024-03-10T00:00:00Z", "end_date": "2024-03-12T00:00:00Z", "reminder": 60},
    {"id": 2, "title": "Rollover", "start_date": "2024-02-28", "end_date": "2024-03-02"},
    {"id": 3, "title": "Broken", "start_date": "03/11/2024", "end_date": "2024-03-11"},
    {"id": 4, "title": "Planning", "start_date": "2023-03-20T09:00:00", "end_date": "2023-03-20T10:00:00"}
]"#;

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn titles(events: &[&almanac_core::Event]) -> Vec<String> {
    events.iter().map(|event| event.title.clone()).collect()
}

fn config_with(overrides: &[(&str, &str)]) -> Config {
    let mut cfg = Config::default();
    cfg.apply_overrides(
        overrides
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string())),
    );
    cfg
}

#[test]
fn file_events_resolve_with_default_settings() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("events.json");
    fs::write(&path, EVENTS).expect("write events");

    let events = FileSource::new(&path).load().expect("load events");
    assert_eq!(events.len(), 4);

    let resolver = Resolver::from_config(&config_with(&[("timezone", "UTC")])).expect("resolver from config");

    let day = resolver
        .resolve(Granularity::Day, &events, ymd(2024, 3, 11))
        .expect("skip policy never fails");
    assert_eq!(titles(&day.events), vec!["Conference"]);
    assert_eq!(day.rejected.len(), 1);
    assert_eq!(day.rejected[0].index, 2);

    let march = resolver
        .resolve(Granularity::Month, &events, ymd(2024, 3, 1))
        .expect("skip policy never fails");
    assert_eq!(titles(&march.events), vec!["Conference"]);

    let february = resolver
        .resolve(Granularity::Month, &events, ymd(2024, 2, 1))
        .expect("skip policy never fails");
    assert_eq!(titles(&february.events), vec!["Rollover"]);
}

#[test]
fn legacy_month_matching_repeats_every_year() {
    let events = almanac_core::source::parse_events(EVENTS).expect("parse events");
    let resolver = Resolver::from_config(&config_with(&[("month.match", "month-of-year"), ("timezone", "UTC")]))
        .expect("resolver from config");

    let march = resolver
        .resolve_month_events(&events, ymd(2024, 3, 1))
        .expect("resolve");
    assert_eq!(titles(&march.events), vec!["Conference", "Planning"]);

    let next_march = resolver
        .resolve_month_events(&events, ymd(2031, 3, 1))
        .expect("resolve");
    assert_eq!(titles(&next_march.events), vec!["Conference", "Planning"]);
}

#[test]
fn strict_policy_from_config_fails_on_bad_record() {
    let events = almanac_core::source::parse_events(EVENTS).expect("parse events");
    let resolver = Resolver::from_config(&config_with(&[("parse.policy", "strict"), ("timezone", "UTC")]))
        .expect("resolver from config");

    let err = resolver
        .resolve_day_events(&events, ymd(2024, 3, 11))
        .expect_err("strict policy");
    assert!(matches!(err, ResolveError::Parse { index: 2, .. }));
    assert!(err.to_string().starts_with("event #2: invalid start_date"));
}

#[test]
fn invalid_settings_are_reported() {
    assert!(Resolver::from_config(&config_with(&[("month.match", "yearly")])).is_err());
    assert!(Resolver::from_config(&config_with(&[("parse.policy", "ignore")])).is_err());
    assert!(Resolver::from_config(&config_with(&[("timezone", "Nowhere/Special")])).is_err());
}

#[test]
fn panels_and_selection_agree() {
    let events = almanac_core::source::parse_events(EVENTS).expect("parse events");
    let resolver = Resolver::default();

    let month_panel = render_panel(&resolver, &events, PanelMode::Month, ymd(2024, 3, 11)).expect("month panel");
    for cell in &month_panel.cells {
        let picked = select(&resolver, &events, PanelMode::Month, cell.date).expect("select day");
        assert_eq!(picked.events, cell.events);
    }

    let year_panel = render_panel(&resolver, &events, PanelMode::Year, ymd(2024, 11, 30)).expect("year panel");
    let busy: Vec<String> = year_panel
        .cells
        .iter()
        .filter(|cell| !cell.events.is_empty())
        .map(|cell| cell.date.format("%Y-%m").to_string())
        .collect();
    assert_eq!(busy, vec!["2024-02", "2024-03"]);
    assert_eq!(year_panel.rejected.len(), 1);
}
