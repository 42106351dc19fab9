use crate::client::ImageSource;
use crate::compositor::{Compositor, DisplayOptions};
use crate::encoder::VideoEncoder;
use crate::error::FrameError;
use crate::fetcher::{FrameFetcher, PARTIAL_PREFIX};
use crate::label::FrameOffset;
use crate::mode::{FetchStrategy, Mode, ModeSet};
use crate::place::Place;
use crate::resolver::{resolve_run, ResolvedRun};
use crate::util::format_duration;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use tempfile::Builder;
use tracing::{debug, error, info, warn};

/// Frames gathered for one batch, oldest first.
#[derive(Debug, Default)]
pub struct FrameBatch {
    frames: Vec<(FrameOffset, PathBuf)>,
    requested: usize,
}

impl FrameBatch {
    /// Keeps the frames that were produced and logs the ones that were not.
    pub fn from_results(mut results: Vec<(FrameOffset, Result<PathBuf, FrameError>)>) -> Self {
        let requested = results.len();
        results.sort_by_key(|(offset, _)| *offset);
        let mut frames = Vec::with_capacity(requested);
        for (offset, result) in results {
            match result {
                Ok(path) => frames.push((offset, path)),
                Err(e) => warn!("Skipping frame at offset {offset}. {e}"),
            }
        }
        Self { frames, requested }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn missing(&self) -> usize {
        self.requested - self.frames.len()
    }

    pub fn offsets(&self) -> Vec<FrameOffset> {
        self.frames.iter().map(|(offset, _)| *offset).collect()
    }

    pub fn paths(&self) -> Vec<&Path> {
        self.frames.iter().map(|(_, path)| path.as_path()).collect()
    }
}

/// What a front end should do when asked for a video.
#[derive(Debug, PartialEq, Eq)]
pub enum Artifact {
    Ready(PathBuf),
    NotReady,
}

impl Artifact {
    pub const NOT_READY_MESSAGE: &'static str = "Video is not ready. Try again in 15 minutes.";
}

type BatchKey = (String, Mode);

/// Builds and stores the latest video for each place and mode.
pub struct Pipeline<S, E> {
    source: S,
    encoder: E,
    data_dir: PathBuf,
    modes: ModeSet,
    compositors: HashMap<Mode, Compositor>,
    locks: Mutex<HashMap<BatchKey, Arc<Mutex<()>>>>,
}

impl<S: ImageSource, E: VideoEncoder> Pipeline<S, E> {
    /// Loads the overlays and font for every mode from `asset_dir`.
    pub fn new(
        source: S,
        encoder: E,
        data_dir: &Path,
        asset_dir: &Path,
        display: &DisplayOptions,
        modes: ModeSet,
    ) -> Result<Self> {
        let mut compositors = HashMap::new();
        for (mode, config) in modes.iter() {
            let compositor = Compositor::new(asset_dir, &config.footer, display)
                .with_context(|| {
                    format!("Failed to load {mode} assets from {}", asset_dir.display())
                })?;
            compositors.insert(mode, compositor);
        }
        Ok(Self::with_compositors(source, encoder, data_dir, modes, compositors))
    }

    pub fn with_compositors(
        source: S,
        encoder: E,
        data_dir: &Path,
        modes: ModeSet,
        compositors: HashMap<Mode, Compositor>,
    ) -> Self {
        Self {
            source,
            encoder,
            data_dir: data_dir.to_path_buf(),
            modes,
            compositors,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn frame_dir(&self, mode: Mode) -> PathBuf {
        self.data_dir.join("cache").join(mode.to_string())
    }

    pub fn output_dir(&self) -> PathBuf {
        self.data_dir.join("output")
    }

    pub fn artifact_path(&self, place: &Place, mode: Mode) -> PathBuf {
        self.output_dir()
            .join(format!("{mode}_{}_latest.mp4", place.id))
    }

    pub fn latest(&self, place: &Place, mode: Mode) -> Artifact {
        let path = self.artifact_path(place, mode);
        if path.exists() {
            Artifact::Ready(path)
        } else {
            Artifact::NotReady
        }
    }

    fn lock_for(&self, place: &Place, mode: Mode) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry((place.id.clone(), mode))
            .or_default()
            .clone()
    }

    pub fn assemble_batch(&self, place: &Place, mode: Mode) -> Result<Option<PathBuf>> {
        self.assemble_batch_at(place, mode, Utc::now())
    }

    /// Builds a video from the frames available at `now`.
    ///
    /// Returns `None` when nothing could be encoded, in which case any
    /// previous video is left in place.
    pub fn assemble_batch_at(
        &self,
        place: &Place,
        mode: Mode,
        now: DateTime<Utc>,
    ) -> Result<Option<PathBuf>> {
        let lock = self.lock_for(place, mode);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        let started = Utc::now();

        let batch = self.collect_frames(place, mode, now)?;
        if batch.is_empty() {
            error!("No frames available for {mode} {}", place.id);
            return Ok(None);
        }
        if batch.missing() > 0 {
            warn!(
                "{mode} {} is missing {} of {} frames",
                place.id,
                batch.missing(),
                batch.missing() + batch.len()
            );
        }

        let output = self.artifact_path(place, mode);
        let output_dir = self.output_dir();
        fs::create_dir_all(&output_dir)?;
        let partial = Builder::new()
            .prefix(PARTIAL_PREFIX)
            .suffix(".mp4")
            .tempfile_in(&output_dir)?;

        if let Err(e) = self.encoder.encode(&batch.paths(), partial.path()) {
            error!("Cannot create a video for {mode} {}. {e}", place.id);
            return Ok(None);
        }
        partial.persist(&output)?;

        info!(
            "Wrote {} with {} frames in {}",
            output.display(),
            batch.len(),
            format_duration(Utc::now() - started)
        );
        Ok(Some(output))
    }

    /// Fetches and composites every frame of the current run for a place.
    pub fn collect_frames(
        &self,
        place: &Place,
        mode: Mode,
        now: DateTime<Utc>,
    ) -> Result<FrameBatch> {
        let config = self.modes.get(mode);
        let compositor = self
            .compositors
            .get(&mode)
            .ok_or_else(|| anyhow!("No compositor loaded for {mode}"))?;
        let resolved = resolve_run(now, config);
        debug!(
            "{mode} {} run {} with {} offsets",
            place.id,
            resolved.run,
            resolved.offsets.len()
        );

        let cache_dir = self.frame_dir(mode);
        let fetcher = FrameFetcher {
            source: &self.source,
            compositor,
            config,
            cache_dir: &cache_dir,
        };

        let results = match config.fetch_strategy {
            FetchStrategy::Sequential => fetch_sequential(&fetcher, place, &resolved),
            FetchStrategy::Concurrent => fetch_concurrent(&fetcher, place, &resolved),
        };
        Ok(FrameBatch::from_results(results))
    }

    /// Removes downloads and encodes that were interrupted part way.
    pub fn clean_partial_files(&self) -> Result<usize> {
        let mut dirs: Vec<PathBuf> = self
            .modes
            .iter()
            .map(|(mode, _)| self.frame_dir(mode))
            .collect();
        dirs.push(self.output_dir());

        let mut removed = 0;
        for dir in dirs {
            let Ok(entries) = fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries {
                let entry = entry?;
                if entry.file_name().to_string_lossy().starts_with(PARTIAL_PREFIX) {
                    debug!("Removing abandoned file {}", entry.path().display());
                    fs::remove_file(entry.path())?;
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}

type FrameResult = (FrameOffset, Result<PathBuf, FrameError>);

fn fetch_sequential(
    fetcher: &FrameFetcher,
    place: &Place,
    resolved: &ResolvedRun,
) -> Vec<FrameResult> {
    resolved
        .offsets
        .iter()
        .map(|&offset| (offset, fetcher.fetch_frame(place, resolved.run, offset)))
        .collect()
}

fn fetch_concurrent(
    fetcher: &FrameFetcher,
    place: &Place,
    resolved: &ResolvedRun,
) -> Vec<FrameResult> {
    thread::scope(|scope| {
        let handles: Vec<_> = resolved
            .offsets
            .iter()
            .map(|&offset| {
                let handle = scope.spawn(move || fetcher.fetch_frame(place, resolved.run, offset));
                (offset, handle)
            })
            .collect();

        // Completion order is arbitrary, FrameBatch puts them back in order
        handles
            .into_iter()
            .map(|(offset, handle)| {
                let result = handle.join().unwrap_or_else(|_| {
                    let url = fetcher.frame_url(place, resolved.run, offset);
                    Err(FrameError::download(&url, "fetch thread panicked"))
                });
                (offset, result)
            })
            .collect()
    })
}
