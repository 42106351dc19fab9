use crate::batch::{Artifact, Pipeline};
use crate::client::ImageSource;
use crate::encoder::VideoEncoder;
use crate::mode::Mode;
use crate::place::Place;
use crate::util::format_duration;
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use comfy_table::Table;
use std::fs;
use std::thread::sleep;
use strum::IntoEnumIterator;
use tracing::{error, info};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub built: usize,
    pub failed: usize,
}

/// Rebuilds the video for every place and mode, carrying on past failures.
pub fn refresh_all<S: ImageSource, E: VideoEncoder>(
    pipeline: &Pipeline<S, E>,
    places: &[Place],
    now: DateTime<Utc>,
) -> RefreshSummary {
    let mut summary = RefreshSummary::default();
    for place in places {
        for mode in Mode::iter() {
            match pipeline.assemble_batch_at(place, mode, now) {
                Ok(Some(_)) => summary.built += 1,
                Ok(None) => summary.failed += 1,
                Err(e) => {
                    error!("Error processing {mode} {place}: {e:#}");
                    summary.failed += 1;
                }
            }
        }
    }
    summary
}

/// Fixed interval timer that skips runs it was too busy to start.
#[derive(Debug)]
pub struct Schedule {
    interval: Duration,
    next_due: DateTime<Utc>,
}

impl Schedule {
    /// The first run is due immediately.
    pub fn new(interval: Duration, now: DateTime<Utc>) -> Self {
        Self {
            interval,
            next_due: now,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.next_due
    }

    pub fn next_due(&self) -> DateTime<Utc> {
        self.next_due
    }

    pub fn advance(&mut self, now: DateTime<Utc>) {
        self.next_due += self.interval;
        while self.next_due <= now {
            self.next_due += self.interval;
        }
    }
}

pub fn monitor<S: ImageSource, E: VideoEncoder>(
    pipeline: &Pipeline<S, E>,
    places: &[Place],
    interval: Duration,
) -> Result<()> {
    let removed = pipeline.clean_partial_files()?;
    if removed > 0 {
        info!("Removed {removed} abandoned partial files");
    }

    let mut schedule = Schedule::new(interval, Utc::now());
    loop {
        let now = Utc::now();
        if schedule.is_due(now) {
            let summary = refresh_all(pipeline, places, now);
            schedule.advance(Utc::now());
            info!(
                "Built {} videos, {} failed. Next refresh in {}",
                summary.built,
                summary.failed,
                format_duration(schedule.next_due() - Utc::now())
            );
        }
        sleep(std::time::Duration::from_secs(1));
    }
}

pub fn status_table<S: ImageSource, E: VideoEncoder>(
    pipeline: &Pipeline<S, E>,
    places: &[Place],
    now: DateTime<Utc>,
) -> Table {
    let mut table = Table::new();
    let mut header = vec!["Place".to_string()];
    header.extend(Mode::iter().map(|m| m.to_string()));
    table.set_header(header);

    for place in places {
        let mut row = vec![place.to_string()];
        for mode in Mode::iter() {
            let cell = match pipeline.latest(place, mode) {
                Artifact::Ready(path) => match fs::metadata(&path).and_then(|m| m.modified()) {
                    Ok(modified) => {
                        let modified: DateTime<Utc> = modified.into();
                        format!("{} old", format_duration(now - modified))
                    }
                    Err(_) => "ready".to_string(),
                },
                Artifact::NotReady => "not ready".to_string(),
            };
            row.push(cell);
        }
        table.add_row(row);
    }
    table
}
