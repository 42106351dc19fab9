use crate::client::ImageSource;
use crate::compositor::Compositor;
use crate::error::FrameError;
use crate::label::FrameOffset;
use crate::mode::ModeConfig;
use crate::place::Place;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::Builder;
use tracing::debug;

/// Prefix of in-progress downloads. Anything left with it was abandoned.
pub const PARTIAL_PREFIX: &str = ".partial-";

/// Downloads and composites frames into a per-mode cache directory.
pub struct FrameFetcher<'a> {
    pub source: &'a dyn ImageSource,
    pub compositor: &'a Compositor,
    pub config: &'a ModeConfig,
    pub cache_dir: &'a Path,
}

impl<'a> FrameFetcher<'a> {
    pub fn frame_path(&self, place: &Place, label: &str) -> PathBuf {
        self.cache_dir.join(format!("{}_{label}.png", place.id))
    }

    pub fn frame_url(&self, place: &Place, run: DateTime<Utc>, offset: FrameOffset) -> String {
        let label = self.config.label_format.encode(run, offset);
        self.config.url(place, &label)
    }

    /// Returns the finished frame, downloading it only when it is not cached.
    pub fn fetch_frame(
        &self,
        place: &Place,
        run: DateTime<Utc>,
        offset: FrameOffset,
    ) -> Result<PathBuf, FrameError> {
        let label = self.config.label_format.encode(run, offset);
        let path = self.frame_path(place, &label);
        if path.exists() {
            debug!("Using cached frame {}", path.display());
            return Ok(path);
        }

        let url = self.frame_url(place, run, offset);
        fs::create_dir_all(self.cache_dir)?;
        // Same directory as the cache so the final rename is atomic
        let mut partial = Builder::new()
            .prefix(PARTIAL_PREFIX)
            .tempfile_in(self.cache_dir)?;
        let size = self.source.download(&url, partial.as_file_mut())?;
        debug!("Downloaded {size} bytes from {url}");

        self.compositor
            .composite(partial.path(), place, run + offset.duration())?;
        partial.persist(&path).map_err(|e| FrameError::Io(e.error))?;
        Ok(path)
    }
}
