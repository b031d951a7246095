//! Source catalog backed by the `videos/` directory.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::error::{Result, ServerError};
use crate::media::{FrameSource, SourceFactory};

/// Name under which the capture device is listed.
pub const CAMERA_SOURCE: &str = "camera";

const SUPPORTED_EXTENSIONS: [&str; 4] = ["mp4", "mkv", "avi", "mov"];

/// What a play request resolves to. File playback and live capture share
/// the pacing/encoding core; this is the only fork between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamSource {
    File { path: std::path::PathBuf },
    Camera,
}

/// Lists playable sources and opens them through a [`SourceFactory`].
pub struct SourceCatalog {
    dir: PathBuf,
    factory: Arc<dyn SourceFactory>,
}

impl SourceCatalog {
    pub fn new(dir: impl Into<PathBuf>, factory: Arc<dyn SourceFactory>) -> Self {
        Self {
            dir: dir.into(),
            factory,
        }
    }

    /// Video files in the directory plus the camera entry. The directory
    /// is created when missing.
    pub fn list(&self) -> Vec<String> {
        let mut names = self.video_files();
        names.push(CAMERA_SOURCE.to_string());
        names
    }

    fn video_files(&self) -> Vec<String> {
        if !self.dir.exists() {
            info!(dir = %self.dir.display(), "video directory missing, creating");
            let _ = std::fs::create_dir_all(&self.dir);
            return Vec::new();
        }
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .flatten()
            .filter(|entry| entry.path().is_file())
            .filter(|entry| {
                entry
                    .path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| {
                        let ext = ext.to_ascii_lowercase();
                        SUPPORTED_EXTENSIONS.contains(&ext.as_str())
                    })
                    .unwrap_or(false)
            })
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        names.sort();
        names
    }

    /// Resolve a requested name to a concrete source.
    pub fn resolve(&self, name: &str) -> Result<StreamSource> {
        if name == CAMERA_SOURCE {
            return Ok(StreamSource::Camera);
        }
        // Names are plain file names from `list`; refuse path traversal.
        if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
            return Err(ServerError::UnknownSource { name: name.into() });
        }
        let path = self.dir.join(name);
        if !path.is_file() {
            return Err(ServerError::UnknownSource { name: name.into() });
        }
        Ok(StreamSource::File { path })
    }

    /// Open a listed source by name.
    pub fn open(&self, name: &str) -> Result<Box<dyn FrameSource>> {
        match self.resolve(name)? {
            StreamSource::Camera => self.factory.open_camera(),
            StreamSource::File { path } => self.factory.open_file(&path),
        }
    }
}
