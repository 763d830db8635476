//! Capture sources
//!
//! The detector only needs a decoded frame per tick. Live capture from a
//! streaming application happens outside this crate and hands frames over
//! through [`CaptureSource`]; the sources here read frames from disk for
//! replaying recorded sessions.

use std::fs;
use std::path::{Path, PathBuf};

use super::bitmap::BitmapView;
use crate::{Error, Result};

const FRAME_EXTENSIONS: &[&str] = &["png", "bmp", "jpg", "jpeg"];

/// Anything that can produce frames on demand
pub trait CaptureSource: Send {
    /// Capture the next frame
    fn capture(&mut self) -> Result<BitmapView>;

    /// Whether a frame can be captured right now.
    ///
    /// For temporary outages only. A source that has run out returns
    /// [`Error::SourceExhausted`] from [`capture`](Self::capture) instead.
    fn is_available(&self) -> bool {
        true
    }
}

/// Re-reads a single image file on every capture.
///
/// Useful when another program periodically overwrites a screenshot file.
pub struct FileCapture {
    path: PathBuf,
}

impl FileCapture {
    /// Capture from the image file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CaptureSource for FileCapture {
    fn capture(&mut self) -> Result<BitmapView> {
        let bytes = fs::read(&self.path)?;
        BitmapView::decode(&bytes)
    }

    fn is_available(&self) -> bool {
        self.path.is_file()
    }
}

/// Plays back a directory of frames in file-name order
pub struct FrameSequenceCapture {
    frames: Vec<PathBuf>,
    position: usize,
    loop_playback: bool,
}

impl FrameSequenceCapture {
    /// Collect every image file in `dir`
    pub fn from_directory(dir: impl AsRef<Path>, loop_playback: bool) -> Result<Self> {
        let mut frames: Vec<PathBuf> = fs::read_dir(dir.as_ref())?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_frame_file(path))
            .collect();
        frames.sort();

        log::debug!(
            "Frame sequence {}: {} frames",
            dir.as_ref().display(),
            frames.len()
        );

        Ok(Self {
            frames,
            position: 0,
            loop_playback,
        })
    }

    /// Number of frames in the sequence
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the directory held no frames
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl CaptureSource for FrameSequenceCapture {
    fn capture(&mut self) -> Result<BitmapView> {
        if self.position >= self.frames.len() {
            if !self.loop_playback || self.frames.is_empty() {
                return Err(Error::SourceExhausted);
            }
            self.position = 0;
        }

        let path = &self.frames[self.position];
        self.position += 1;
        let bytes = fs::read(path)?;
        BitmapView::decode(&bytes)
    }
}

fn is_frame_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn write_frame(dir: &Path, name: &str, level: u8) {
        RgbaImage::from_pixel(2, 2, Rgba([level, 0, 0, 255]))
            .save(dir.join(name))
            .unwrap();
    }

    fn red_of(view: &BitmapView) -> u8 {
        view.source().to_rgba8().get_pixel(0, 0)[0]
    }

    #[test]
    fn test_sequence_order_and_exhaustion() {
        let dir = tempfile::tempdir().unwrap();
        write_frame(dir.path(), "frame_002.png", 2);
        write_frame(dir.path(), "frame_001.png", 1);
        fs::write(dir.path().join("notes.txt"), "not a frame").unwrap();

        let mut source = FrameSequenceCapture::from_directory(dir.path(), false).unwrap();
        assert_eq!(source.len(), 2);
        assert_eq!(red_of(&source.capture().unwrap()), 1);
        assert_eq!(red_of(&source.capture().unwrap()), 2);
        assert!(matches!(source.capture(), Err(Error::SourceExhausted)));
    }

    #[test]
    fn test_sequence_loops() {
        let dir = tempfile::tempdir().unwrap();
        write_frame(dir.path(), "a.png", 10);

        let mut source = FrameSequenceCapture::from_directory(dir.path(), true).unwrap();
        for _ in 0..3 {
            assert_eq!(red_of(&source.capture().unwrap()), 10);
        }
    }

    #[test]
    fn test_empty_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FrameSequenceCapture::from_directory(dir.path(), true).unwrap();
        assert!(source.is_empty());
        assert!(matches!(source.capture(), Err(Error::SourceExhausted)));
    }

    #[test]
    fn test_file_capture() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FileCapture::new(dir.path().join("screen.png"));
        assert!(!source.is_available());
        assert!(matches!(source.capture(), Err(Error::Io(_))));

        write_frame(dir.path(), "screen.png", 42);
        assert!(source.is_available());
        assert_eq!(red_of(&source.capture().unwrap()), 42);
    }
}
