//! Frame sources.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use image::RgbImage;
use log::{debug, info};

use crate::error::{Result, WatchError};

/// Sequential supplier of decoded frames.
///
/// `None` marks the end of the stream; `Some(Err(_))` is a single frame that
/// could not be read, and the stream may go on after it.
pub trait FrameSource {
    fn next_frame(&mut self) -> Option<Result<RgbImage>>;

    /// Nominal frames per second, when the source knows it.
    fn frame_rate(&self) -> Option<f32> {
        None
    }
}

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "ppm"];

/// A directory of still frames, played in file name order.
#[derive(Debug)]
pub struct ImageSequenceSource {
    paths: VecDeque<PathBuf>,
    frame_rate: Option<f32>,
    size: Option<(u32, u32)>,
}

impl ImageSequenceSource {
    pub fn open(dir: impl AsRef<Path>, frame_rate: Option<f32>) -> Result<Self> {
        let dir = dir.as_ref();
        let open_error = |reason: String| WatchError::SourceOpen {
            path: dir.to_path_buf(),
            reason,
        };

        let entries = fs::read_dir(dir).map_err(|e| open_error(e.to_string()))?;
        let mut paths = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| open_error(e.to_string()))?.path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
            if is_image {
                paths.push(path);
            }
        }
        if paths.is_empty() {
            return Err(open_error("no image frames found".into()));
        }
        paths.sort();

        info!("opened {} frames from {}", paths.len(), dir.display());
        Ok(Self {
            paths: paths.into(),
            frame_rate,
            size: None,
        })
    }

    pub fn remaining(&self) -> usize {
        self.paths.len()
    }

    fn read(&mut self, path: &Path) -> Result<RgbImage> {
        debug!("reading frame {}", path.display());
        let image = image::open(path)?.to_rgb8();
        let got = image.dimensions();
        match self.size {
            Some(expected) if expected != got => Err(WatchError::FrameSize { expected, got }),
            Some(_) => Ok(image),
            None => {
                self.size = Some(got);
                Ok(image)
            }
        }
    }
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Option<Result<RgbImage>> {
        let path = self.paths.pop_front()?;
        Some(self.read(&path))
    }

    fn frame_rate(&self) -> Option<f32> {
        self.frame_rate
    }
}

/// Frames already in memory, mostly for tests and embedding.
#[derive(Debug, Default)]
pub struct MemorySource {
    frames: VecDeque<Result<RgbImage>>,
    frame_rate: Option<f32>,
}

impl MemorySource {
    pub fn new(frames: impl IntoIterator<Item = Result<RgbImage>>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            frame_rate: None,
        }
    }

    pub fn with_frame_rate(mut self, frame_rate: f32) -> Self {
        self.frame_rate = Some(frame_rate);
        self
    }
}

impl FrameSource for MemorySource {
    fn next_frame(&mut self) -> Option<Result<RgbImage>> {
        self.frames.pop_front()
    }

    fn frame_rate(&self) -> Option<f32> {
        self.frame_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_sequence_order_and_size_check() {
        let dir = tempfile::tempdir().unwrap();
        RgbImage::new(8, 6).save(dir.path().join("frame_002.png")).unwrap();
        RgbImage::new(8, 6).save(dir.path().join("frame_001.png")).unwrap();
        RgbImage::new(4, 4).save(dir.path().join("frame_003.png")).unwrap();
        fs::write(dir.path().join("notes.txt"), "not a frame").unwrap();

        let mut source = ImageSequenceSource::open(dir.path(), Some(25.0)).unwrap();
        assert_eq!(source.remaining(), 3);
        assert_eq!(source.frame_rate(), Some(25.0));

        assert_eq!(source.next_frame().unwrap().unwrap().dimensions(), (8, 6));
        assert_eq!(source.next_frame().unwrap().unwrap().dimensions(), (8, 6));
        assert!(matches!(
            source.next_frame(),
            Some(Err(WatchError::FrameSize { expected: (8, 6), got: (4, 4) }))
        ));
        assert!(source.next_frame().is_none());
    }

    #[test]
    fn test_undecodable_frame_is_transient() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.png"), b"garbage").unwrap();
        RgbImage::new(2, 2).save(dir.path().join("b.png")).unwrap();

        let mut source = ImageSequenceSource::open(dir.path(), None).unwrap();
        assert!(matches!(source.next_frame(), Some(Err(WatchError::Image(_)))));
        assert!(source.next_frame().unwrap().is_ok());
    }

    #[test]
    fn test_missing_or_empty_dir_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ImageSequenceSource::open(dir.path(), None),
            Err(WatchError::SourceOpen { .. })
        ));
        assert!(matches!(
            ImageSequenceSource::open(dir.path().join("missing"), None),
            Err(WatchError::SourceOpen { .. })
        ));
    }
}
