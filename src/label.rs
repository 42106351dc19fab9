use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use strum::Display;

#[derive(
    Clone, Copy, Debug, Display, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum OffsetUnit {
    Hours,
    Minutes,
}

/// Distance of a frame from the start of its run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameOffset {
    pub count: i64,
    pub unit: OffsetUnit,
}

impl FrameOffset {
    pub fn hours(count: i64) -> Self {
        Self {
            count,
            unit: OffsetUnit::Hours,
        }
    }

    pub fn minutes(count: i64) -> Self {
        Self {
            count,
            unit: OffsetUnit::Minutes,
        }
    }

    pub fn duration(&self) -> Duration {
        match self.unit {
            OffsetUnit::Hours => Duration::hours(self.count),
            OffsetUnit::Minutes => Duration::minutes(self.count),
        }
    }
}

impl fmt::Display for FrameOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.count)
    }
}

/// Field layout of the key that names a frame both upstream and in the cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelFormat {
    /// Run date and hour followed by the offset e.g. 2024010106_06
    DateHourOffset,
    /// Capture date, hour and minute e.g. 2024_01_01_11_15
    DateHourMinute,
}

impl LabelFormat {
    pub fn encode(&self, run: DateTime<Utc>, offset: FrameOffset) -> String {
        match self {
            Self::DateHourOffset => format!("{}_{offset}", run.format("%Y%m%d%H")),
            Self::DateHourMinute => (run + offset.duration())
                .format("%Y_%m_%d_%H_%M")
                .to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashMap;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn forecast_label_pads_every_field() {
        let run = utc(2024, 1, 2, 6, 0);
        assert_eq!(
            LabelFormat::DateHourOffset.encode(run, FrameOffset::hours(6)),
            "2024010206_06"
        );
        assert_eq!(
            LabelFormat::DateHourOffset.encode(run, FrameOffset::hours(30)),
            "2024010206_30"
        );
    }

    #[test]
    fn capture_label_uses_capture_time() {
        let run = utc(2024, 3, 9, 8, 15);
        assert_eq!(
            LabelFormat::DateHourMinute.encode(run, FrameOffset::minutes(0)),
            "2024_03_09_08_15"
        );
        assert_eq!(
            LabelFormat::DateHourMinute.encode(run, FrameOffset::minutes(105)),
            "2024_03_09_10_00"
        );
    }

    #[test]
    fn encoding_is_deterministic() {
        let run = utc(2024, 11, 5, 18, 0);
        let offset = FrameOffset::hours(9);
        let first = LabelFormat::DateHourOffset.encode(run, offset);
        let second = LabelFormat::DateHourOffset.encode(run, offset);
        assert_eq!(first, second);
    }

    // Without month padding 2024-11-05 and 2024-01-15 would both start 2024115
    #[test]
    fn no_collisions_across_a_year() {
        let start = utc(2024, 1, 1, 0, 0);
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = || {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            seed
        };

        let mut forecast = HashMap::new();
        let mut capture = HashMap::new();
        for _ in 0..1000 {
            // Runs land on 6 hour boundaries, captures on 15 minute ones
            let run = start + Duration::hours((next() % (365 * 4)) as i64 * 6);
            let offset = FrameOffset::hours((next() % 61) as i64);
            let label = LabelFormat::DateHourOffset.encode(run, offset);
            if let Some(previous) = forecast.insert(label.clone(), (run, offset)) {
                assert_eq!(previous, (run, offset), "collision on {label}");
            }

            let capture_time = start + Duration::minutes((next() % (365 * 96)) as i64 * 15);
            let label = LabelFormat::DateHourMinute.encode(capture_time, FrameOffset::minutes(0));
            if let Some(previous) = capture.insert(label.clone(), capture_time) {
                assert_eq!(previous, capture_time, "collision on {label}");
            }
        }
    }
}
