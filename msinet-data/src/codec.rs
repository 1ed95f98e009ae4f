//! Reconstruction and encoding of predicted saliency maps.

use std::{
    fs::{self, File},
    io::BufWriter,
    path::{Path, PathBuf},
};

use burn::tensor::{backend::Backend, Tensor};
use image::{
    codecs::jpeg::JpegEncoder,
    error::{ParameterError, ParameterErrorKind},
    GrayImage, ImageError,
};
use opencv::{
    core::Mat,
    prelude::*,
    videoio::{self, VideoWriter},
};

use crate::{
    error::{DataError, DataResult},
    geometry::{self, Raster, Size},
};

/// JPEG quality of written saliency maps.
pub const JPEG_QUALITY: u8 = 100;

/// Frame rate of written saliency videos.
pub const OUTPUT_FRAMES_PER_SECOND: u32 = 25;

/// Brings one predicted map back to the stimulus it was computed for.
///
/// `map` is `[1, height, width]` with values in `[0, 1]`. It is scaled to `0..=255`, grown
/// to cover `original`, center-cropped to exactly `original`, rounded and clamped.
///
/// # Errors
///
/// Returns [`DataError::GeometryPrecondition`] if `map` has a zero dimension.
pub fn postprocess_saliency_map<B: Backend>(
    map: Tensor<B, 3>,
    original: Size,
) -> DataResult<GrayImage> {
    let restored = geometry::restore(map.mul_scalar(255.0), original)?;
    let [_, height, width] = restored.dims();

    let pixels: Vec<u8> = restored
        .round()
        .clamp(0.0, 255.0)
        .into_data()
        .iter::<f32>()
        .map(|value| value as u8)
        .collect();

    GrayImage::from_raw(width as u32, height as u32, pixels).ok_or(
        DataError::GeometryPrecondition {
            operation: "reconstruct",
            current_height: height as u32,
            current_width: width as u32,
            target_height: original.height,
            target_width: original.width,
        },
    )
}

/// Applies [`postprocess_saliency_map`] to every map of a `[N, 1, height, width]` batch.
///
/// # Errors
///
/// See [`postprocess_saliency_map`].
pub fn postprocess_batch<B: Backend>(
    maps: Tensor<B, 4>,
    original: Size,
) -> DataResult<Vec<GrayImage>> {
    maps.iter_dim(0)
        .map(|map| postprocess_saliency_map(map.squeeze::<3>(0), original))
        .collect()
}

fn create_parent(path: &Path) -> DataResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| DataError::io(parent, e))
        }
        _ => Ok(()),
    }
}

/// Writes `map` as a maximum-quality grayscale JPEG, creating parent directories.
///
/// # Errors
///
/// Returns [`DataError::Io`] if the file cannot be created and [`DataError::Encode`] if
/// encoding fails.
pub fn write_saliency_image<P: AsRef<Path>>(map: &GrayImage, path: P) -> DataResult<()> {
    let path = path.as_ref();
    create_parent(path)?;

    let file = File::create(path).map_err(|e| DataError::io(path, e))?;
    JpegEncoder::new_with_quality(BufWriter::new(file), JPEG_QUALITY)
        .encode_image(map)
        .map_err(|source| DataError::Encode {
            path: path.to_path_buf(),
            source,
        })?;

    tracing::debug!(path = %path.display(), "saliency map written");
    Ok(())
}

fn to_mat(frame: &GrayImage) -> opencv::Result<Mat> {
    let row = Mat::from_slice(frame.as_raw())?;
    let mat = row.reshape(1, frame.height() as i32)?.try_clone()?;
    Ok(mat)
}

/// Streams reconstructed maps into a 25 fps grayscale Motion-JPEG video.
pub struct SaliencyVideoWriter {
    writer: VideoWriter,
    path: PathBuf,
    size: Size,
    frames: usize,
}

impl SaliencyVideoWriter {
    /// Creates the video at `path` for frames of `size`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Io`] if the parent directory cannot be created and
    /// [`DataError::Video`] if no OpenCV backend can open the output.
    pub fn create<P: AsRef<Path>>(path: P, size: Size) -> DataResult<Self> {
        let path = path.as_ref();
        create_parent(path)?;

        let name = path.to_str().ok_or_else(|| {
            DataError::video(
                path,
                opencv::Error::new(opencv::core::StsBadArg, "path is not UTF-8"),
            )
        })?;
        let fourcc =
            VideoWriter::fourcc('M', 'J', 'P', 'G').map_err(|e| DataError::video(path, e))?;
        let frame_size = opencv::core::Size::new(size.width as i32, size.height as i32);

        let mut writer = VideoWriter::new(
            name,
            fourcc,
            f64::from(OUTPUT_FRAMES_PER_SECOND),
            frame_size,
            false,
        )
        .map_err(|e| DataError::video(path, e))?;
        if !writer.is_opened().map_err(|e| DataError::video(path, e))? {
            return Err(DataError::video(
                path,
                opencv::Error::new(opencv::core::StsError, "no backend could open the output"),
            ));
        }
        // Honored by the built-in MJPEG writer; other backends ignore it.
        writer
            .set(videoio::VIDEOWRITER_PROP_QUALITY, f64::from(JPEG_QUALITY))
            .map_err(|e| DataError::video(path, e))?;

        Ok(Self {
            writer,
            path: path.to_path_buf(),
            size,
            frames: 0,
        })
    }

    /// Appends one frame; it must have the size the writer was created with.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Encode`] for a frame of the wrong size and [`DataError::Video`]
    /// if OpenCV rejects the frame.
    pub fn write(&mut self, frame: &GrayImage) -> DataResult<()> {
        if Raster::size(frame) != self.size {
            return Err(DataError::Encode {
                path: self.path.clone(),
                source: ImageError::Parameter(ParameterError::from_kind(
                    ParameterErrorKind::DimensionMismatch,
                )),
            });
        }

        let mat = to_mat(frame).map_err(|e| DataError::video(&self.path, e))?;
        self.writer
            .write(&mat)
            .map_err(|e| DataError::video(&self.path, e))?;

        self.frames += 1;
        Ok(())
    }

    /// Frames written so far.
    pub const fn frame_count(&self) -> usize {
        self.frames
    }

    /// Flushes and closes the container.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Video`] if the container cannot be finalized.
    pub fn finish(mut self) -> DataResult<()> {
        self.writer
            .release()
            .map_err(|e| DataError::video(&self.path, e))?;
        tracing::info!(
            path = %self.path.display(),
            frames = self.frames,
            "saliency video written"
        );
        Ok(())
    }
}

/// Writes `frames` as a saliency video of `size` at `path`, returning the frame count.
///
/// The output file is removed again if any frame fails, so an interrupted video never
/// lands next to the complete ones.
///
/// # Errors
///
/// Returns the first error yielded by `frames` or raised while writing.
pub fn write_saliency_video<P, I>(frames: I, path: P, size: Size) -> DataResult<usize>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = DataResult<GrayImage>>,
{
    let path = path.as_ref();
    let mut writer = SaliencyVideoWriter::create(path, size)?;

    let result = frames
        .into_iter()
        .try_for_each(|frame| writer.write(&frame?))
        .and_then(|()| {
            let count = writer.frame_count();
            writer.finish().map(|()| count)
        });

    if let Err(e) = &result {
        tracing::warn!(path = %path.display(), error = %e, "removing incomplete video");
        if let Err(remove) = fs::remove_file(path) {
            tracing::warn!(path = %path.display(), error = %remove, "failed to remove video");
        }
    }
    result
}
