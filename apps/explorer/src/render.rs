use std::fmt::Write as _;

use client_core::{ViewSlice, ViewState};
use serde::Serialize;
use shared::protocol::{Launch, Rocket};

/// One rendered page of the launch list, as emitted by `list --json`.
#[derive(Debug, Serialize)]
pub struct ListPage<'a> {
    pub page: usize,
    pub page_count: usize,
    pub total_matches: usize,
    pub launches: &'a [&'a Launch],
}

impl<'a> ListPage<'a> {
    pub fn new(slice: &'a ViewSlice<'a>, view: &ViewState) -> Self {
        Self {
            page: view.page,
            page_count: slice.page_count(view.page_size),
            total_matches: slice.total_matches,
            launches: &slice.visible,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LaunchDetail<'a> {
    pub launch: &'a Launch,
    pub rocket: Option<&'a Rocket>,
}

pub fn outcome_label(success: Option<bool>) -> &'static str {
    match success {
        Some(true) => "success",
        Some(false) => "failure",
        None => "unknown",
    }
}

fn launch_date(launch: &Launch) -> String {
    launch.date_utc.format("%Y-%m-%d %H:%M UTC").to_string()
}

pub fn launch_table(slice: &ViewSlice<'_>, view: &ViewState) -> String {
    let mut out = String::new();
    if slice.visible.is_empty() {
        let _ = writeln!(out, "no launches match \"{}\"", view.search);
    }
    for launch in &slice.visible {
        let _ = writeln!(
            out,
            "{:<26} {:<22} {:<9} {}",
            launch.id,
            launch_date(launch),
            outcome_label(launch.success),
            launch.name
        );
    }
    let _ = write!(
        out,
        "page {}/{} ({} matches, sorted by {} {})",
        view.page,
        slice.page_count(view.page_size),
        slice.total_matches,
        view.sort_field,
        view.sort_direction
    );
    out
}

pub fn launch_detail(launch: &Launch, rocket: Option<&Rocket>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} ({})", launch.name, launch.id);
    if let Some(flight) = launch.flight_number {
        let _ = writeln!(out, "flight:   #{flight}");
    }
    let _ = writeln!(out, "date:     {}", launch_date(launch));
    let _ = writeln!(out, "outcome:  {}", outcome_label(launch.success));
    if let Some(details) = &launch.details {
        let _ = writeln!(out, "details:  {details}");
    }

    match rocket {
        Some(rocket) => {
            let _ = writeln!(out, "rocket:   {}", rocket.name);
            if let Some(meters) = rocket.height_meters() {
                let _ = writeln!(out, "  height: {meters} m");
            }
            if let Some(kg) = rocket.mass_kg() {
                let _ = writeln!(out, "  mass:   {kg} kg");
            }
            if !rocket.description.is_empty() {
                let _ = writeln!(out, "  {}", rocket.description);
            }
        }
        None if launch.has_rocket() => {
            let _ = writeln!(out, "rocket:   {} (unavailable)", launch.rocket);
        }
        None => {}
    }

    for failure in &launch.failures {
        let _ = writeln!(out, "failure:  T+{}s {}", failure.time, failure.reason);
    }
    for core in &launch.cores {
        let landing = match core.landing_success {
            Some(true) => "landed",
            Some(false) => "lost",
            None => "no landing",
        };
        let _ = writeln!(
            out,
            "core:     {} {}{}",
            core.core.as_deref().unwrap_or("unknown"),
            landing,
            if core.reused == Some(true) { " (reused)" } else { "" }
        );
    }

    let links = [
        ("patch", launch.patch_large().or(launch.patch_small())),
        ("webcast", launch.links.webcast.as_deref()),
        ("article", launch.links.article.as_deref()),
        ("wikipedia", launch.links.wikipedia.as_deref()),
    ];
    for (label, url) in links {
        if let Some(url) = url {
            let _ = writeln!(out, "{label:<9} {url}");
        }
    }
    out.trim_end().to_string()
}
