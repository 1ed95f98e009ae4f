//! Whole-video decoding into fitted RGB frames.

use std::path::{Path, PathBuf};

use image::RgbImage;
use opencv::{
    core::{Mat, CV_8U},
    prelude::*,
    videoio::{self, VideoCapture},
};

use crate::{
    error::{DataError, DataResult},
    geometry::{self, Raster, Size},
};

/// All frames of one video, fitted to a common target size.
#[derive(Debug, Clone)]
pub struct VideoStream {
    /// Frames in decode order, each of the target size.
    pub frames: Vec<RgbImage>,
    /// Size of the first decoded frame, before fitting.
    pub original_size: Size,
    /// Source file.
    pub path: PathBuf,
}

impl VideoStream {
    /// Number of frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the stream holds no frames. Never true for a decoded video.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Opens `path` with whichever OpenCV backend accepts it.
///
/// # Errors
///
/// Returns [`DataError::DecodeFailure`] if no backend can open the file.
pub fn open_capture(path: &Path) -> DataResult<VideoCapture> {
    let name = path.to_str().ok_or_else(|| DataError::decode(path, "path is not UTF-8"))?;
    let capture = VideoCapture::from_file(name, videoio::CAP_ANY)
        .map_err(|e| DataError::decode(path, e))?;

    if !capture.is_opened().map_err(|e| DataError::decode(path, e))? {
        return Err(DataError::decode(path, "no backend could open the video"));
    }
    Ok(capture)
}

/// Converts a decoded 8-bit frame from OpenCV's BGR(A) or gray layout to RGB.
fn to_rgb(frame: &Mat, path: &Path) -> DataResult<RgbImage> {
    if frame.depth() != CV_8U {
        return Err(DataError::decode(path, "frame is not 8-bit"));
    }

    let owned;
    let frame = if frame.is_continuous() {
        frame
    } else {
        owned = frame.try_clone().map_err(|e| DataError::decode(path, e))?;
        &owned
    };
    let bytes = frame.data_bytes().map_err(|e| DataError::decode(path, e))?;

    let pixels: Vec<u8> = match frame.channels() {
        1 => bytes.iter().flat_map(|&v| [v, v, v]).collect(),
        3 => bytes
            .chunks_exact(3)
            .flat_map(|bgr| [bgr[2], bgr[1], bgr[0]])
            .collect(),
        4 => bytes
            .chunks_exact(4)
            .flat_map(|bgra| [bgra[2], bgra[1], bgra[0]])
            .collect(),
        channels => {
            return Err(DataError::decode(
                path,
                format!("unsupported channel count {channels}"),
            ))
        }
    };

    RgbImage::from_raw(frame.cols() as u32, frame.rows() as u32, pixels)
        .ok_or_else(|| DataError::decode(path, "frame buffer size mismatch"))
}

/// Decodes every frame of the video at `path` and fits each one to `target`.
///
/// Frames are read until the decoder reports the end of the stream. The original size is
/// taken from the first frame and assumed constant for the whole video.
///
/// # Errors
///
/// Returns [`DataError::DecodeFailure`] if the file cannot be opened, if any frame cannot be
/// decoded, or if the video holds no frames.
pub fn decode_video<P: AsRef<Path>>(path: P, target: Size) -> DataResult<VideoStream> {
    let path = path.as_ref();
    let mut capture = open_capture(path)?;

    let mut original_size = None;
    let mut frames = Vec::new();
    let mut frame = Mat::default();
    while capture
        .read(&mut frame)
        .map_err(|e| DataError::decode(path, e))?
    {
        if frame.rows() <= 0 || frame.cols() <= 0 {
            break;
        }
        let rgb = to_rgb(&frame, path)?;
        original_size.get_or_insert(Raster::size(&rgb));
        frames.push(geometry::fit(rgb, target)?);
    }

    let original_size =
        original_size.ok_or_else(|| DataError::decode(path, "video contains no frames"))?;

    tracing::info!(
        path = %path.display(),
        frames = frames.len(),
        %original_size,
        "decoded video"
    );

    Ok(VideoStream {
        frames,
        original_size,
        path: path.to_path_buf(),
    })
}
