use crate::label::{LabelFormat, OffsetUnit};
use crate::place::Place;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// The kind of imagery a batch is built from.
#[derive(
    Clone,
    Copy,
    Debug,
    Display,
    EnumIter,
    EnumString,
    PartialEq,
    Eq,
    Hash,
    Deserialize,
    Serialize,
    clap::ValueEnum,
)]
pub enum Mode {
    /// Recent satellite captures
    #[strum(serialize = "sat")]
    #[serde(rename = "sat")]
    #[clap(name = "sat")]
    Satellite,
    /// Cloud coverage prediction
    #[strum(serialize = "pre")]
    #[serde(rename = "pre")]
    #[clap(name = "pre")]
    Prediction,
}

/// Keeps early frames of a delayed run away from hours that have not been published.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct OffsetFloor {
    pub threshold: i64,
    pub bump: i64,
}

impl Default for OffsetFloor {
    fn default() -> Self {
        // 27 rather than a multiple of the cadence. Upstream behaviour, keep as is.
        Self {
            threshold: 27,
            bump: 24,
        }
    }
}

impl OffsetFloor {
    pub fn apply(&self, base: i64) -> i64 {
        if base < self.threshold {
            base + self.bump
        } else {
            base
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum RunSchedule {
    /// Model runs every `cadence_hours`, usable `latency_hours` after the run time
    Forecast {
        cadence_hours: u32,
        latency_hours: u32,
        /// Short horizon source. When false, use the long horizon source and step
        /// back one cadence
        flash: bool,
        delayed_floor: Option<OffsetFloor>,
    },
    /// Captures every `spacing_minutes`, usable `latency_minutes` afterwards
    Capture {
        spacing_minutes: u32,
        latency_minutes: u32,
    },
}

impl RunSchedule {
    pub fn offset_unit(&self) -> OffsetUnit {
        match self {
            Self::Forecast { .. } => OffsetUnit::Hours,
            Self::Capture { .. } => OffsetUnit::Minutes,
        }
    }

    pub fn is_flash(&self) -> bool {
        matches!(self, Self::Forecast { flash: true, .. })
    }

    /// Runs and captures are found by dividing by the step, so it can't be zero.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Forecast {
                cadence_hours: 0, ..
            } => bail!("cadence_hours must be at least 1"),
            Self::Capture {
                spacing_minutes: 0, ..
            } => bail!("spacing_minutes must be at least 1"),
            _ => Ok(()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStrategy {
    Sequential,
    Concurrent,
}

/// Everything that differs between the satellite and prediction pipelines.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ModeConfig {
    pub schedule: RunSchedule,
    pub frame_count: u32,
    /// Supports {label}, {place} and {flash} placeholders
    pub url_template: String,
    pub label_format: LabelFormat,
    pub fetch_strategy: FetchStrategy,
    /// File name under the footer asset directory
    pub footer: String,
}

impl ModeConfig {
    pub fn satellite() -> Self {
        Self {
            schedule: RunSchedule::Capture {
                spacing_minutes: 15,
                latency_minutes: 30,
            },
            frame_count: 15,
            url_template: "https://img4.kachelmannwetter.com/images/data/cache/sat/\
                sat_{label}_{place}_543.jpg"
                .to_string(),
            label_format: LabelFormat::DateHourMinute,
            fetch_strategy: FetchStrategy::Concurrent,
            footer: "satellite.png".to_string(),
        }
    }

    pub fn prediction() -> Self {
        Self {
            schedule: RunSchedule::Forecast {
                cadence_hours: 6,
                latency_hours: 3,
                flash: true,
                delayed_floor: Some(OffsetFloor::default()),
            },
            frame_count: 25,
            url_template: "https://img4.meteologix.com/images/data/cache/model/\
                model_moddeuhd{flash}_{label}_{place}_101.png"
                .to_string(),
            label_format: LabelFormat::DateHourOffset,
            fetch_strategy: FetchStrategy::Sequential,
            footer: "clouds.png".to_string(),
        }
    }

    pub fn url(&self, place: &Place, label: &str) -> String {
        let flash = if self.schedule.is_flash() { "2" } else { "" };
        self.url_template
            .replace("{label}", label)
            .replace("{place}", &place.code.to_string())
            .replace("{flash}", flash)
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ModeSet {
    pub sat: ModeConfig,
    pub pre: ModeConfig,
}

impl Default for ModeSet {
    fn default() -> Self {
        Self {
            sat: ModeConfig::satellite(),
            pre: ModeConfig::prediction(),
        }
    }
}

impl ModeSet {
    pub fn get(&self, mode: Mode) -> &ModeConfig {
        match mode {
            Mode::Satellite => &self.sat,
            Mode::Prediction => &self.pre,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Mode, &ModeConfig)> {
        Mode::iter().map(move |mode| (mode, self.get(mode)))
    }

    pub fn validate(&self) -> Result<()> {
        for (mode, config) in self.iter() {
            config
                .schedule
                .validate()
                .with_context(|| format!("Invalid schedule for {mode} mode"))?;
        }
        Ok(())
    }
}
