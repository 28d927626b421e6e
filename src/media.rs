//! Media capture feeding content blocks.
//!
//! Capturing is a side effect owned by the host (file picker, microphone).
//! Whatever the capture yields ends up as a media block inserted after a
//! given position; a refused capability never touches the blocks.
use std::{
    collections::VecDeque,
    fs,
    path::{Path, PathBuf},
};

use chrono::Utc;
use log::{debug, error, info, warn};

use crate::{BlockKind, ContentBlocks, DeskError, Result};

/// JPEG-style quality used when compressing picked images
pub const IMAGE_QUALITY: f32 = 0.8;

/// A binary payload produced by a capture device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedMedia {
    pub data: Vec<u8>,
    pub filename: String,
}

/// Host capture capabilities.
pub trait MediaCapture {
    /// Opens the microphone. Fails with `CapabilityDenied` when refused or unsupported.
    fn acquire_audio_stream(&mut self) -> Result<()>;

    fn start_recording(&mut self) -> Result<()>;

    /// Stops the recording and releases the stream.
    fn stop_recording(&mut self) -> Result<CapturedMedia>;

    /// `Ok(None)` means the user dismissed the picker.
    fn pick_image_file(&mut self) -> Result<Option<CapturedMedia>>;

    fn compress_image(&self, image: CapturedMedia, quality: f32) -> Result<CapturedMedia>;
}

/// Picks an image, compresses it and inserts it after `index`.
///
/// Returns the new block id, or `None` when nothing was inserted because the
/// picker was dismissed or compression failed.
pub fn attach_image<C: MediaCapture>(
    capture: &mut C,
    blocks: &mut ContentBlocks,
    index: usize,
) -> Result<Option<String>> {
    let Some(picked) = capture.pick_image_file()? else {
        debug!("Image picker dismissed");
        return Ok(None);
    };

    let compressed = match capture.compress_image(picked, IMAGE_QUALITY) {
        Ok(image) => image,
        Err(e) => {
            error!("Compression failed: {}", e);
            return Ok(None);
        }
    };

    let id = blocks.insert_media_after(index, BlockKind::Image, compressed.data, compressed.filename);
    Ok(Some(id))
}

/// Opens the microphone and starts recording.
pub fn start_audio_capture<C: MediaCapture>(capture: &mut C) -> Result<()> {
    capture.acquire_audio_stream().map_err(|e| {
        warn!("Audio recording not supported or permission denied: {}", e);
        e
    })?;
    capture.start_recording()
}

/// Stops a recording started with [`start_audio_capture`] and inserts the
/// result after `index`.
pub fn finish_audio_capture<C: MediaCapture>(
    capture: &mut C,
    blocks: &mut ContentBlocks,
    index: usize,
) -> Result<String> {
    let recording = capture.stop_recording()?;
    info!("Captured audio recording {}", recording.filename);
    Ok(blocks.insert_media_after(index, BlockKind::Audio, recording.data, recording.filename))
}

/// Default name for a fresh recording.
pub fn recording_filename() -> String {
    format!("recording-{}.wav", Utc::now().timestamp_millis())
}

/// Capture backend for terminal hosts: images come from files queued up
/// front, there is no microphone.
#[derive(Debug, Default)]
pub struct FileMedia {
    images: VecDeque<PathBuf>,
}

impl FileMedia {
    pub fn new(images: impl IntoIterator<Item = PathBuf>) -> Self {
        FileMedia {
            images: images.into_iter().collect(),
        }
    }

    /// Reads any file into a payload named after the file.
    pub fn read_file(path: &Path) -> Result<CapturedMedia> {
        let data = fs::read(path).map_err(|e| {
            error!("Failed to read media file {}: {}", path.display(), e);
            DeskError::CapabilityDenied {
                capability: "file".to_string(),
                message: format!("{}: {}", path.display(), e),
            }
        })?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "attachment".to_string());
        Ok(CapturedMedia { data, filename })
    }
}

impl MediaCapture for FileMedia {
    fn acquire_audio_stream(&mut self) -> Result<()> {
        Err(DeskError::CapabilityDenied {
            capability: "microphone".to_string(),
            message: "audio recording is not supported by this host".to_string(),
        })
    }

    fn start_recording(&mut self) -> Result<()> {
        self.acquire_audio_stream()
    }

    fn stop_recording(&mut self) -> Result<CapturedMedia> {
        Err(DeskError::CapabilityDenied {
            capability: "microphone".to_string(),
            message: "no recording in progress".to_string(),
        })
    }

    fn pick_image_file(&mut self) -> Result<Option<CapturedMedia>> {
        match self.images.pop_front() {
            Some(path) => FileMedia::read_file(&path).map(Some),
            None => Ok(None),
        }
    }

    fn compress_image(&self, image: CapturedMedia, quality: f32) -> Result<CapturedMedia> {
        // No image codec in this build; payloads are stored as picked.
        debug!(
            "Keeping {} as-is ({} bytes, quality {})",
            image.filename,
            image.data.len(),
            quality
        );
        Ok(image)
    }
}
