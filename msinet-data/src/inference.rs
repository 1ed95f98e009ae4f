//! Inference over images and videos.
//!
//! The model is reached only through [`SaliencyModel`]. Every input file is processed
//! independently: a file that fails to decode or encode is logged and skipped, while
//! failures that would affect every file (missing input, unwritable output) stop the run.

use std::path::{Path, PathBuf};

use burn::tensor::{backend::Backend, Tensor};

use crate::{
    codec::{
        postprocess_batch, postprocess_saliency_map, write_saliency_image, write_saliency_video,
    },
    config::{PathConfig, PipelineConfig},
    dataset::pixels_to_tensor,
    error::DataResult,
    files::{is_video, resolve_files},
    geometry::{self, Raster, Size},
    pipeline::BatchPipeline,
    sample::load_stimulus,
    video::decode_video,
};

/// A saliency predictor.
pub trait SaliencyModel<B: Backend> {
    /// Maps stimuli `[N, 3, H, W]` with values in `0..=255` to saliency maps `[N, 1, H, W]`
    /// with values in `[0, 1]`.
    fn predict(&self, stimuli: Tensor<B, 4>) -> Tensor<B, 4>;
}

/// Predicts normalized luminance. Useful for exercising the pipeline without weights.
#[derive(Debug, Clone, Copy, Default)]
pub struct LuminanceModel;

impl<B: Backend> SaliencyModel<B> for LuminanceModel {
    fn predict(&self, stimuli: Tensor<B, 4>) -> Tensor<B, 4> {
        let red = stimuli.clone().narrow(1, 0, 1);
        let green = stimuli.clone().narrow(1, 1, 1);
        let blue = stimuli.narrow(1, 2, 1);

        (red.mul_scalar(0.299) + green.mul_scalar(0.587) + blue.mul_scalar(0.114))
            .div_scalar(255.0)
            .clamp(0.0, 1.0)
    }
}

/// Outcome of an inference run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InferenceReport {
    /// Outputs written, in input order.
    pub written: Vec<PathBuf>,
    /// Inputs skipped because of a per-file failure.
    pub skipped: Vec<PathBuf>,
}

/// Runs `model` on every image and video under `paths.data`, writing reconstructed maps to
/// mirrored paths under `paths.images`.
///
/// Images produce a JPEG map; videos produce a 25 fps grayscale video of the original frame
/// size. Inputs are fitted to `target` before prediction.
///
/// # Errors
///
/// Returns [`DataError::NotFound`](crate::DataError::NotFound) if there is no input, and any
/// error that is not scoped to a single file.
pub fn run_inference<B, M>(
    model: &M,
    target: Size,
    paths: &PathConfig,
    config: &PipelineConfig,
    device: &B::Device,
) -> DataResult<InferenceReport>
where
    B: Backend,
    M: SaliencyModel<B>,
{
    let inputs = resolve_files(&paths.data)?;
    let pipeline = config.inference_pipeline();
    let mut report = InferenceReport::default();

    tracing::info!(
        input = %paths.data.display(),
        output = %paths.images.display(),
        files = inputs.len(),
        %target,
        "running inference"
    );

    for input in inputs {
        let result = if is_video(&input) {
            infer_video::<B, M>(model, &input, target, paths, pipeline, device)
        } else {
            infer_image::<B, M>(model, &input, target, paths, device)
        };

        match result {
            Ok(output) => report.written.push(output),
            Err(e) if e.is_per_file() => {
                tracing::error!(path = %input.display(), error = %e, "failed to process file");
                report.skipped.push(input);
            }
            Err(e) => return Err(e),
        }
    }

    tracing::info!(
        written = report.written.len(),
        skipped = report.skipped.len(),
        "inference completed"
    );
    Ok(report)
}

/// Predicts the saliency map of one image and writes it as JPEG.
///
/// Returns the output path.
///
/// # Errors
///
/// Propagates decoding, reconstruction and encoding failures.
pub fn infer_image<B, M>(
    model: &M,
    input: &Path,
    target: Size,
    paths: &PathConfig,
    device: &B::Device,
) -> DataResult<PathBuf>
where
    B: Backend,
    M: SaliencyModel<B>,
{
    tracing::info!(path = %input.display(), "processing image");

    let stimulus = load_stimulus(input)?;
    let original = Raster::size(&stimulus);
    let fitted = geometry::fit(stimulus, target)?;

    let pixels = fitted.into_raw().into_iter().map(f32::from).collect();
    let prediction = model.predict(pixels_to_tensor(pixels, 1, target, 3, device));
    let map = postprocess_saliency_map(prediction.squeeze::<3>(0), original)?;

    let output = paths.output_path(input).with_extension("jpg");
    write_saliency_image(&map, &output)?;

    tracing::info!(path = %output.display(), "saved result");
    Ok(output)
}

/// Predicts a saliency video frame by frame, in batches, and writes it at the original
/// frame size. A video that fails part way is not left at the output path.
///
/// Returns the output path.
///
/// # Errors
///
/// Propagates decoding, reconstruction and encoding failures.
pub fn infer_video<B, M>(
    model: &M,
    input: &Path,
    target: Size,
    paths: &PathConfig,
    pipeline: BatchPipeline,
    device: &B::Device,
) -> DataResult<PathBuf>
where
    B: Backend,
    M: SaliencyModel<B>,
{
    tracing::info!(path = %input.display(), "processing video");

    let stream = decode_video(input, target)?;
    let original = stream.original_size;

    let output = paths.output_path(input);
    let batches = pipeline.run(stream.frames, |frames| {
        let count = frames.len();
        let pixels: Vec<f32> = frames
            .into_iter()
            .flat_map(|frame| frame.into_raw())
            .map(f32::from)
            .collect();
        (pixels, count)
    });

    let maps = batches.flat_map(|(pixels, count)| {
        let prediction = model.predict(pixels_to_tensor(pixels, count, target, 3, device));
        match postprocess_batch(prediction, original) {
            Ok(frames) => frames.into_iter().map(Ok).collect::<Vec<_>>(),
            Err(e) => vec![Err(e)],
        }
    });
    write_saliency_video(maps, &output, original)?;

    Ok(output)
}
