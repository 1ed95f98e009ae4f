//! Samples, corpora and per-sample decoding.

use std::{
    fs,
    path::{Path, PathBuf},
};

use image::{GrayImage, ImageFormat, RgbImage};

use crate::{
    error::{DataError, DataResult},
    files::base_name,
    geometry::{self, Raster, Size},
};

/// One stimulus and, for labelled data, its ground-truth map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    /// Path of the stimulus image.
    pub stimulus: PathBuf,
    /// Path of the ground-truth map, absent for inference-only data.
    pub ground_truth: Option<PathBuf>,
}

impl Sample {
    /// The base name identifying this sample.
    pub fn name(&self) -> String {
        base_name(&self.stimulus)
    }
}

/// An ordered sequence of samples from one dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Corpus {
    samples: Vec<Sample>,
}

impl Corpus {
    /// Pairs positionally aligned stimulus and ground-truth lists.
    ///
    /// Lists are expected to have passed
    /// [`check_consistency`](crate::files::check_consistency); any surplus in the longer
    /// list is dropped.
    pub fn paired(stimuli: Vec<PathBuf>, ground_truth: Vec<PathBuf>) -> Self {
        let samples = stimuli
            .into_iter()
            .zip(ground_truth)
            .map(|(stimulus, ground_truth)| Sample {
                stimulus,
                ground_truth: Some(ground_truth),
            })
            .collect();
        Self { samples }
    }

    /// Wraps a list of stimuli without ground truth.
    pub fn unlabeled(stimuli: Vec<PathBuf>) -> Self {
        let samples = stimuli
            .into_iter()
            .map(|stimulus| Sample {
                stimulus,
                ground_truth: None,
            })
            .collect();
        Self { samples }
    }

    /// Returns the samples at `indices`, in that order.
    ///
    /// # Panics
    ///
    /// Panics if an index is out of bounds.
    pub fn select(&self, indices: &[usize]) -> Self {
        let samples = indices.iter().map(|&i| self.samples[i].clone()).collect();
        Self { samples }
    }

    /// Appends all samples of `other`.
    pub fn extend(&mut self, other: Self) {
        self.samples.extend(other.samples);
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the corpus holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The samples, in order.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Consumes the corpus, returning its samples.
    pub fn into_samples(self) -> Vec<Sample> {
        self.samples
    }
}

/// A decoded, fitted sample ready for batching.
///
/// Pixel data is row-major `[height, width, channels]` with values in `0..=255`.
#[derive(Debug, Clone)]
pub struct SaliencyItem {
    /// Stimulus pixels, three channels.
    pub stimulus: Vec<f32>,
    /// Ground-truth pixels, one channel.
    pub ground_truth: Option<Vec<f32>>,
    /// Size of `stimulus` and `ground_truth`.
    pub size: Size,
    /// Size of the stimulus file before fitting.
    pub original_size: Size,
    /// Stimulus path.
    pub path: PathBuf,
}

/// Decodes an image file, detecting JPEG by content and treating anything else as PNG.
fn decode(path: &Path) -> DataResult<image::DynamicImage> {
    let bytes = fs::read(path).map_err(|e| DataError::io(path, e))?;

    let format = match image::guess_format(&bytes) {
        Ok(ImageFormat::Jpeg) => ImageFormat::Jpeg,
        _ => ImageFormat::Png,
    };

    image::load_from_memory_with_format(&bytes, format).map_err(|e| DataError::decode(path, e))
}

/// Decodes a stimulus as three-channel RGB.
///
/// # Errors
///
/// Returns [`DataError::Io`] if the file cannot be read and [`DataError::DecodeFailure`] if
/// it is neither a valid JPEG nor PNG.
pub fn load_stimulus<P: AsRef<Path>>(path: P) -> DataResult<RgbImage> {
    decode(path.as_ref()).map(|image| image.to_rgb8())
}

/// Decodes a ground-truth map as single-channel luminance.
///
/// # Errors
///
/// See [`load_stimulus`].
pub fn load_ground_truth<P: AsRef<Path>>(path: P) -> DataResult<GrayImage> {
    decode(path.as_ref()).map(|image| image.to_luma8())
}

fn to_floats(raw: Vec<u8>) -> Vec<f32> {
    raw.into_iter().map(f32::from).collect()
}

/// Decodes `sample` and fits stimulus and ground truth to `target`.
///
/// # Errors
///
/// Propagates decoding failures; see [`load_stimulus`].
pub fn load_sample(sample: &Sample, target: Size) -> DataResult<SaliencyItem> {
    let stimulus = load_stimulus(&sample.stimulus)?;
    let original_size = Raster::size(&stimulus);
    let stimulus = geometry::fit(stimulus, target)?;

    let ground_truth = sample
        .ground_truth
        .as_deref()
        .map(|path| load_ground_truth(path).and_then(|map| geometry::fit(map, target)))
        .transpose()?;

    Ok(SaliencyItem {
        stimulus: to_floats(stimulus.into_raw()),
        ground_truth: ground_truth.map(|map| to_floats(map.into_raw())),
        size: target,
        original_size,
        path: sample.stimulus.clone(),
    })
}
