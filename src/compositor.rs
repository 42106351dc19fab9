use crate::error::FrameError;
use crate::place::Place;
use chrono::{DateTime, Duration, Utc};
use image::io::Reader as ImageReader;
use image::{imageops, DynamicImage, ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::draw_text_mut;
use rusttype::{Font, Scale};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

pub const FRAME_SIZE: u32 = 760;
const TEXT_SCALE: f32 = 16.0;
const TIME_POSITION: (i32, i32) = (655, 630);
const DATE_POSITION: (i32, i32) = (650, 650);

/// How timestamps are printed onto frames.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DisplayOptions {
    pub utc_offset_hours: i64,
    pub timezone_name: String,
    /// File name under the font asset directory
    pub font: String,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            utc_offset_hours: 3,
            timezone_name: "MSK".to_string(),
            font: "sans.ttf".to_string(),
        }
    }
}

/// Returns the time and date lines printed in the corner of a frame.
pub fn timestamp_lines(frame_time: DateTime<Utc>, display: &DisplayOptions) -> (String, String) {
    let local = frame_time + Duration::hours(display.utc_offset_hours);
    (
        format!("{} {}", local.format("%H:%M"), display.timezone_name),
        local.format("%-d %b %Y").to_string(),
    )
}

fn decode(path: &Path) -> Result<DynamicImage, FrameError> {
    ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| FrameError::composite(path, e))
}

/// Layers a base map and footer over downloaded frames of one mode.
pub struct Compositor {
    map_dir: PathBuf,
    footer: DynamicImage,
    font: Option<Font<'static>>,
    display: DisplayOptions,
}

impl Compositor {
    pub fn new(
        asset_dir: &Path,
        footer: &str,
        display: &DisplayOptions,
    ) -> Result<Self, FrameError> {
        let footer = decode(&asset_dir.join("footer").join(footer))?;
        let font_path = asset_dir.join("font").join(&display.font);
        let font = Font::try_from_vec(fs::read(&font_path)?)
            .ok_or_else(|| FrameError::composite(&font_path, "not a usable font"))?;
        Ok(Self::from_parts(asset_dir, footer, Some(font), display.clone()))
    }

    pub fn from_parts(
        asset_dir: &Path,
        footer: DynamicImage,
        font: Option<Font<'static>>,
        display: DisplayOptions,
    ) -> Self {
        Self {
            map_dir: asset_dir.join("map"),
            footer,
            font,
            display,
        }
    }

    pub fn map_path(&self, place: &Place) -> PathBuf {
        self.map_dir.join(format!("{}.png", place.code))
    }

    /// Replaces the image at `frame_path` with the finished frame.
    pub fn composite(
        &self,
        frame_path: &Path,
        place: &Place,
        frame_time: DateTime<Utc>,
    ) -> Result<(), FrameError> {
        debug!("Compositing {} for {}", frame_path.display(), place.id);
        let frame = decode(frame_path)?;
        let map = decode(&self.map_path(place))?;

        let mut canvas = RgbaImage::new(FRAME_SIZE, FRAME_SIZE);
        imageops::overlay(&mut canvas, &frame, 0, 0);
        imageops::overlay(&mut canvas, &self.footer, 0, 0);
        imageops::overlay(&mut canvas, &map, 0, 0);

        if let Some(font) = &self.font {
            let (time, date) = timestamp_lines(frame_time, &self.display);
            let white = Rgba([255, 255, 255, 255]);
            let scale = Scale::uniform(TEXT_SCALE);
            let (x, y) = TIME_POSITION;
            draw_text_mut(&mut canvas, white, x, y, scale, font, &time);
            let (x, y) = DATE_POSITION;
            draw_text_mut(&mut canvas, white, x, y, scale, font, &date);
        } else {
            trace!("No font loaded, skipping timestamp");
        }

        canvas
            .save_with_format(frame_path, ImageFormat::Png)
            .map_err(|e| FrameError::composite(frame_path, e))
    }
}
