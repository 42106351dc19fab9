use std::path::PathBuf;
use thiserror::Error;

/// Failures while producing a single frame or encoding a batch.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("failed to download {url}: {reason}")]
    Download { url: String, reason: String },
    #[error("failed to composite {}: {reason}", .path.display())]
    Composite { path: PathBuf, reason: String },
    #[error("failed to encode {}: {reason}", .output.display())]
    Encode { output: PathBuf, reason: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FrameError {
    pub fn download(url: &str, reason: impl ToString) -> Self {
        Self::Download {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn composite(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Composite {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn encode(output: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Encode {
            output: output.into(),
            reason: reason.to_string(),
        }
    }
}
