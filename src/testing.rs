use crate::client::ImageSource;
use crate::compositor::{Compositor, DisplayOptions, FRAME_SIZE};
use crate::encoder::VideoEncoder;
use crate::error::FrameError;
use image::{DynamicImage, ImageOutputFormat, Rgba, RgbaImage};
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread::sleep;
use std::time::Duration;

pub fn png_bytes(width: u32, height: u32, colour: Rgba<u8>) -> Vec<u8> {
    let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, colour));
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageOutputFormat::Png).unwrap();
    buf.into_inner()
}

/// Writes a transparent map for each place code and one footer per mode.
pub fn write_assets(asset_dir: &Path, codes: &[u32]) {
    let transparent = png_bytes(FRAME_SIZE, FRAME_SIZE, Rgba([0, 0, 0, 0]));
    fs::create_dir_all(asset_dir.join("map")).unwrap();
    fs::create_dir_all(asset_dir.join("footer")).unwrap();
    for code in codes {
        fs::write(asset_dir.join("map").join(format!("{code}.png")), &transparent).unwrap();
    }
    for footer in ["clouds.png", "satellite.png"] {
        fs::write(asset_dir.join("footer").join(footer), &transparent).unwrap();
    }
}

pub fn compositor(asset_dir: &Path) -> Compositor {
    Compositor::from_parts(
        asset_dir,
        DynamicImage::ImageRgba8(RgbaImage::new(FRAME_SIZE, FRAME_SIZE)),
        None,
        DisplayOptions::default(),
    )
}

/// Serves a fixed PNG, failing for URLs that contain any of `failing`.
pub struct FakeSource {
    body: Vec<u8>,
    failing: Vec<String>,
    scramble: bool,
    calls: AtomicUsize,
    pub requested: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self {
            body: png_bytes(FRAME_SIZE, FRAME_SIZE, Rgba([40, 80, 120, 255])),
            failing: Vec::new(),
            scramble: false,
            calls: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(mut self, fragments: &[&str]) -> Self {
        self.failing = fragments.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn with_body(mut self, body: &[u8]) -> Self {
        self.body = body.to_vec();
        self
    }

    /// Later requests finish first
    pub fn scrambled(mut self) -> Self {
        self.scramble = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ImageSource for FakeSource {
    fn download(&self, url: &str, dest: &mut dyn Write) -> Result<u64, FrameError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().unwrap().push(url.to_string());
        if self.scramble {
            sleep(Duration::from_millis(60u64.saturating_sub(call as u64 * 4)));
        }
        if self.failing.iter().any(|f| url.contains(f.as_str())) {
            return Err(FrameError::download(url, "HTTP 404"));
        }
        dest.write_all(&self.body)?;
        Ok(self.body.len() as u64)
    }
}

/// Records what it was asked to encode and writes a marker file.
pub struct FakeEncoder {
    fail: bool,
    pub batches: Mutex<Vec<Vec<PathBuf>>>,
}

impl FakeEncoder {
    pub fn new() -> Self {
        Self {
            fail: false,
            batches: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            batches: Mutex::new(Vec::new()),
        }
    }

    pub fn last_batch(&self) -> Vec<PathBuf> {
        self.batches.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

impl VideoEncoder for FakeEncoder {
    fn encode(&self, frames: &[&Path], output: &Path) -> Result<(), FrameError> {
        self.batches
            .lock()
            .unwrap()
            .push(frames.iter().map(|p| p.to_path_buf()).collect());
        if self.fail {
            return Err(FrameError::encode(output, "ffmpeg exited with status 1"));
        }
        fs::write(output, format!("{} frames", frames.len()))?;
        Ok(())
    }
}
