use crate::compositor::FRAME_SIZE;
use crate::error::FrameError;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::NamedTempFile;
use tracing::debug;

/// Turns an ordered list of stills into a single video.
pub trait VideoEncoder: Sync {
    fn encode(&self, frames: &[&Path], output: &Path) -> Result<(), FrameError>;
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct EncoderOptions {
    pub ffmpeg: PathBuf,
    pub fps: u32,
    /// Seconds each frame stays on screen
    pub frame_hold: f32,
    pub video_codec: String,
    pub video_bitrate: String,
    pub audio_codec: String,
    pub audio_bitrate: String,
    pub audio_channels: u8,
    pub pixel_format: String,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            fps: 25,
            frame_hold: 0.4,
            video_codec: "libx264".to_string(),
            video_bitrate: "1024k".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate: "128k".to_string(),
            audio_channels: 2,
            pixel_format: "yuv420p".to_string(),
        }
    }
}

pub struct FfmpegEncoder {
    opts: EncoderOptions,
}

impl FfmpegEncoder {
    pub fn new(opts: EncoderOptions) -> Self {
        Self { opts }
    }

    /// Input for ffmpeg's concat demuxer. Relative entries would resolve
    /// against the list file's directory, so every entry is absolute.
    pub fn concat_list(&self, frames: &[&Path]) -> Result<String, FrameError> {
        let mut list = String::from("ffconcat version 1.0\n");
        let mut last = None;
        for frame in frames {
            let absolute = std::path::absolute(frame)?;
            let escaped = absolute.to_string_lossy().replace('\'', r"'\''");
            let entry = format!("file '{escaped}'\n");
            list.push_str(&entry);
            list.push_str(&format!("duration {}\n", self.opts.frame_hold));
            last = Some(entry);
        }
        // The demuxer ignores the duration of the final entry unless it is repeated
        if let Some(entry) = last {
            list.push_str(&entry);
        }
        Ok(list)
    }

    pub fn args(&self, list: &Path, output: &Path) -> Vec<OsString> {
        let o = &self.opts;
        let mut args = Vec::from(["-y", "-hide_banner", "-loglevel", "error"].map(OsString::from));
        args.extend(["-f", "concat", "-safe", "0", "-i"].map(OsString::from));
        args.push(list.as_os_str().to_owned());
        // Silent track so players that expect audio behave
        args.extend(
            [
                "-f",
                "lavfi",
                "-i",
                "anullsrc=channel_layout=stereo:sample_rate=44100",
                "-shortest",
            ]
            .map(OsString::from),
        );
        let filters = format!(
            "scale={FRAME_SIZE}:{FRAME_SIZE},fps={},format={}",
            o.fps, o.pixel_format
        );
        for arg in [
            "-vf".to_string(),
            filters,
            "-c:v".to_string(),
            o.video_codec.clone(),
            "-b:v".to_string(),
            o.video_bitrate.clone(),
            "-c:a".to_string(),
            o.audio_codec.clone(),
            "-b:a".to_string(),
            o.audio_bitrate.clone(),
            "-ac".to_string(),
            o.audio_channels.to_string(),
            "-f".to_string(),
            "mp4".to_string(),
        ] {
            args.push(arg.into());
        }
        args.push(output.as_os_str().to_owned());
        args
    }
}

impl VideoEncoder for FfmpegEncoder {
    fn encode(&self, frames: &[&Path], output: &Path) -> Result<(), FrameError> {
        if frames.is_empty() {
            return Err(FrameError::encode(output, "no frames"));
        }
        let mut list = NamedTempFile::new()?;
        list.write_all(self.concat_list(frames)?.as_bytes())?;
        list.flush()?;

        let args = self.args(list.path(), output);
        debug!("Running {} {:?}", self.opts.ffmpeg.display(), args);
        let result = Command::new(&self.opts.ffmpeg)
            .args(&args)
            .output()
            .map_err(|e| FrameError::encode(output, format!("failed to run ffmpeg: {e}")))?;

        if !result.status.success() {
            return Err(FrameError::encode(
                output,
                format!(
                    "ffmpeg exited with {}: {}",
                    result.status,
                    String::from_utf8_lossy(&result.stderr).trim()
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concat_list_holds_each_frame_and_repeats_the_last() {
        let encoder = FfmpegEncoder::new(EncoderOptions::default());
        let a = Path::new("/cache/pre/LEN_2024010106_06.png");
        let b = Path::new("/cache/pre/LEN_2024010106_07.png");
        let list = encoder.concat_list(&[a, b]).unwrap();
        assert_eq!(
            list,
            "ffconcat version 1.0\n\
             file '/cache/pre/LEN_2024010106_06.png'\nduration 0.4\n\
             file '/cache/pre/LEN_2024010106_07.png'\nduration 0.4\n\
             file '/cache/pre/LEN_2024010106_07.png'\n"
        );
    }

    #[test]
    fn quotes_in_paths_are_escaped() {
        let encoder = FfmpegEncoder::new(EncoderOptions::default());
        let list = encoder
            .concat_list(&[Path::new("/tmp/it's.png")])
            .unwrap();
        assert!(list.contains(r"file '/tmp/it'\''s.png'"));
    }

    #[test]
    fn relative_frames_are_listed_by_absolute_path() {
        let encoder = FfmpegEncoder::new(EncoderOptions::default());
        let frame = Path::new("data/cache/pre/LEN_2024010106_06.png");
        let list = encoder.concat_list(&[frame]).unwrap();

        let expected = std::env::current_dir().unwrap().join(frame);
        let entry = format!("file '{}'", expected.display());
        assert_eq!(list.matches(&entry).count(), 2, "{list}");
        assert!(!list.contains("file 'data/"));
    }

    #[test]
    fn args_fix_the_output_format() {
        let encoder = FfmpegEncoder::new(EncoderOptions::default());
        let args: Vec<String> = encoder
            .args(Path::new("/tmp/list"), Path::new("/out/pre_LEN.mp4"))
            .into_iter()
            .map(|a| a.to_string_lossy().to_string())
            .collect();
        let joined = args.join(" ");
        assert!(joined.contains("-f concat -safe 0 -i /tmp/list"));
        assert!(joined.contains("scale=760:760,fps=25,format=yuv420p"));
        assert!(joined.contains("-c:v libx264 -b:v 1024k"));
        assert!(joined.contains("-c:a aac -b:a 128k -ac 2"));
        assert!(joined.ends_with("-f mp4 /out/pre_LEN.mp4"));
    }

    #[test]
    fn empty_batch_is_rejected() {
        let encoder = FfmpegEncoder::new(EncoderOptions::default());
        assert!(encoder.encode(&[], Path::new("/tmp/never.mp4")).is_err());
    }
}
