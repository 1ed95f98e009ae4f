//! Subcommand implementations shared by the `msinet` binary.

use std::{fmt, fs, path::Path};

use anyhow::{Context, Result};
use msinet_data::{
    dataloaders, pipeline::num_batches, run_inference, verified_dataloaders, DatasetKind,
    InferenceReport, LuminanceModel, PathConfig, Phase, PipelineConfig, SaliencyLoader,
    SaliencyLoaders,
};

use crate::backend::{create_device, SelectedBackend};

/// Loads a JSON pipeline configuration, or the defaults when no path is given.
pub fn load_pipeline_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let Some(path) = path else {
        return Ok(PipelineConfig::new());
    };

    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Size of one prepared split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitSummary {
    pub name: &'static str,
    pub samples: usize,
    pub batches: usize,
}

impl fmt::Display for SplitSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<5} {:>6} samples {:>6} batches",
            self.name, self.samples, self.batches
        )
    }
}

/// Per-split sample and batch counts of `loaders` under `config`.
pub fn summarize(
    loaders: &SaliencyLoaders<SelectedBackend>,
    config: &PipelineConfig,
) -> [SplitSummary; 2] {
    let summary = |name, loader: &SaliencyLoader<SelectedBackend>| {
        let samples = loader.num_items();
        SplitSummary {
            name,
            samples,
            batches: num_batches(samples, config.batch_size),
        }
    };

    [
        summary("train", &loaders.train),
        summary("valid", &loaders.valid),
    ]
}

/// Resolves, checks and partitions `dataset` below `data`, then builds its data loaders.
///
/// With `verify` every sample is decoded once, so a corrupt file fails here instead of in
/// the middle of an epoch.
pub fn prepare_dataset(
    dataset: DatasetKind,
    root: &Path,
    data: &Path,
    config: &PipelineConfig,
    verify: bool,
) -> Result<SaliencyLoaders<SelectedBackend>> {
    let paths = PathConfig::new(root, data, Phase::Train(dataset));
    let splits = msinet_data::dataset::prepare_with_seed(dataset, &paths, config.partition_seed)
        .with_context(|| format!("Failed to prepare {dataset} under {}", paths.data.display()))?;

    let device = create_device();
    let target = dataset.target_size();
    if verify {
        verified_dataloaders(splits, target, config, &device)
            .with_context(|| format!("Failed to verify {dataset} samples"))
    } else {
        Ok(dataloaders(splits, target, config, &device))
    }
}

/// Predicts every image and video under `data` with the luminance model at the input size of
/// `dataset`, writing results below `root`.
pub fn infer(
    dataset: DatasetKind,
    root: &Path,
    data: &Path,
    config: &PipelineConfig,
) -> Result<InferenceReport> {
    let paths = PathConfig::new(root, data, Phase::Test);
    let device = create_device();

    run_inference::<SelectedBackend, _>(
        &LuminanceModel,
        dataset.target_size(),
        &paths,
        config,
        &device,
    )
    .with_context(|| format!("Inference failed on {}", paths.data.display()))
}
