use crate::label::FrameOffset;
use crate::mode::{ModeConfig, RunSchedule};
use chrono::{DateTime, Duration, Timelike, Utc};

/// The upstream run a batch is built from and the offsets to request from it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedRun {
    pub run: DateTime<Utc>,
    /// Ascending, so iterating them is chronological
    pub offsets: Vec<FrameOffset>,
}

impl ResolvedRun {
    pub fn frame_time(&self, offset: FrameOffset) -> DateTime<Utc> {
        self.run + offset.duration()
    }
}

fn floor_to(datetime: DateTime<Utc>, step: Duration) -> DateTime<Utc> {
    let step = step.num_seconds();
    let remainder = datetime.timestamp().rem_euclid(step);
    datetime
        - Duration::seconds(remainder)
        - Duration::nanoseconds(datetime.timestamp_subsec_nanos() as i64)
}

pub fn resolve_run(now: DateTime<Utc>, config: &ModeConfig) -> ResolvedRun {
    let count = config.frame_count as i64;
    match config.schedule {
        RunSchedule::Forecast {
            cadence_hours,
            latency_hours,
            flash,
            delayed_floor,
        } => {
            let cadence = cadence_hours as i64;
            let latency = latency_hours as i64;
            let this_hour = floor_to(now, Duration::hours(1));
            let published = floor_to(now - Duration::hours(latency), Duration::hours(1));
            let since_boundary = published.hour() as i64 % cadence;

            let mut run = this_hour - Duration::hours(since_boundary + latency);
            if !flash {
                run -= Duration::hours(cadence);
            }

            let mut base = (this_hour - run).num_hours();
            if !flash {
                if let Some(floor) = delayed_floor {
                    base = floor.apply(base);
                }
            }

            ResolvedRun {
                run,
                offsets: (base..base + count).map(FrameOffset::hours).collect(),
            }
        }
        RunSchedule::Capture {
            spacing_minutes,
            latency_minutes,
        } => {
            let spacing = spacing_minutes as i64;
            let latest = floor_to(now, Duration::minutes(spacing))
                - Duration::minutes(latency_minutes as i64);
            let run = latest - Duration::minutes(spacing * (count - 1).max(0));

            ResolvedRun {
                run,
                offsets: (0..count).map(|i| FrameOffset::minutes(i * spacing)).collect(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(d: u32, h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, h, m, s).unwrap()
    }

    fn hours(range: std::ops::RangeInclusive<i64>) -> Vec<FrameOffset> {
        range.map(FrameOffset::hours).collect()
    }

    fn delayed() -> ModeConfig {
        let mut config = ModeConfig::prediction();
        if let RunSchedule::Forecast { flash, .. } = &mut config.schedule {
            *flash = false;
        }
        config
    }

    #[test]
    fn flash_run_on_a_cadence_boundary() {
        let resolved = resolve_run(at(1, 12, 0, 0), &ModeConfig::prediction());
        assert_eq!(resolved.run, at(1, 6, 0, 0));
        assert_eq!(resolved.offsets, hours(6..=30));
    }

    #[test]
    fn flash_run_either_side_of_the_boundary() {
        let config = ModeConfig::prediction();

        let before = resolve_run(at(1, 11, 59, 59), &config);
        assert_eq!(before.run, at(1, 6, 0, 0));
        assert_eq!(before.offsets, hours(5..=29));

        let after = resolve_run(at(1, 12, 0, 1), &config);
        assert_eq!(after.run, at(1, 6, 0, 0));
        assert_eq!(after.offsets, hours(6..=30));
    }

    #[test]
    fn flash_run_switches_once_latency_has_passed() {
        let config = ModeConfig::prediction();

        let waiting = resolve_run(at(1, 8, 59, 59), &config);
        assert_eq!(waiting.run, at(1, 0, 0, 0));
        assert_eq!(waiting.offsets[0], FrameOffset::hours(8));

        let published = resolve_run(at(1, 9, 0, 0), &config);
        assert_eq!(published.run, at(1, 6, 0, 0));
        assert_eq!(published.offsets[0], FrameOffset::hours(3));
    }

    #[test]
    fn flash_run_across_midnight() {
        let resolved = resolve_run(at(2, 1, 30, 0), &ModeConfig::prediction());
        assert_eq!(resolved.run, at(1, 18, 0, 0));
        assert_eq!(resolved.offsets[0], FrameOffset::hours(7));
    }

    #[test]
    fn delayed_run_steps_back_and_applies_floor() {
        let resolved = resolve_run(at(1, 12, 0, 0), &delayed());
        assert_eq!(resolved.run, at(1, 0, 0, 0));
        // 12 hours since the run is below the floor of 27
        assert_eq!(resolved.offsets, hours(36..=60));
    }

    #[test]
    fn delayed_run_without_floor_keeps_elapsed_hours() {
        let mut config = delayed();
        if let RunSchedule::Forecast { delayed_floor, .. } = &mut config.schedule {
            *delayed_floor = None;
        }
        let resolved = resolve_run(at(1, 12, 0, 0), &config);
        assert_eq!(resolved.offsets, hours(12..=36));
    }

    #[test]
    fn captures_end_latency_before_the_last_boundary() {
        let resolved = resolve_run(at(1, 12, 7, 30), &ModeConfig::satellite());
        assert_eq!(resolved.offsets.len(), 15);
        assert_eq!(resolved.run, at(1, 8, 0, 0));
        let last = *resolved.offsets.last().unwrap();
        assert_eq!(last, FrameOffset::minutes(210));
        assert_eq!(resolved.frame_time(last), at(1, 11, 30, 0));

        let on_boundary = resolve_run(at(1, 12, 15, 0), &ModeConfig::satellite());
        assert_eq!(on_boundary.frame_time(last), at(1, 11, 45, 0));
    }

    #[test]
    fn offsets_are_chronological() {
        for config in [ModeConfig::prediction(), ModeConfig::satellite(), delayed()] {
            let resolved = resolve_run(at(3, 17, 42, 9), &config);
            assert!(resolved.offsets.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
