//! Configuration for data preparation and inference.
//!
//! All filesystem locations are resolved once into a [`PathConfig`] and passed explicitly to
//! whatever needs them.

use std::path::{Component, Path, PathBuf};

use burn::config::Config;
use serde::{Deserialize, Serialize};

use crate::{dataset::DatasetKind, partition::PARTITION_SEED, pipeline::BatchPipeline};

/// Batching, loading and shuffling parameters.
#[derive(Config, Debug)]
pub struct PipelineConfig {
    /// Batch size used for training and validation splits.
    #[config(default = "1")]
    pub batch_size: usize,
    /// Number of video frames per inference batch.
    #[config(default = "100")]
    pub inference_batch_size: usize,
    /// Number of video batches prepared ahead of the consumer.
    #[config(default = "2")]
    pub prefetch: usize,
    /// Worker threads decoding training and validation samples.
    #[config(default = "1")]
    pub num_workers: usize,
    /// Seed of the training loader's shuffle; a fresh seed is drawn when unset.
    #[config(default = "None")]
    pub shuffle_seed: Option<u64>,
    /// Seed of the train/validation partition.
    #[config(default = "PARTITION_SEED")]
    pub partition_seed: u32,
}

impl PipelineConfig {
    /// Order-preserving pipeline for video frames.
    pub fn inference_pipeline(&self) -> BatchPipeline {
        BatchPipeline::inference(self.inference_batch_size).with_prefetch(self.prefetch)
    }
}

/// Whether the pipeline prepares data for training or runs inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Training on the given dataset.
    Train(DatasetKind),
    /// Inference on arbitrary stimuli.
    Test,
}

/// Every location read or written by a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathConfig {
    /// Dataset root for training, or the file or directory to run inference on.
    pub data: PathBuf,
    /// Training history.
    pub history: PathBuf,
    /// Saliency maps and videos produced by inference.
    pub images: PathBuf,
    /// Best checkpoint so far.
    pub best: PathBuf,
    /// Most recent checkpoint.
    pub latest: PathBuf,
    /// Pretrained weights.
    pub weights: PathBuf,
}

impl PathConfig {
    /// Lays out the run directories under `root`.
    ///
    /// When training, the dataset's name is appended to `data` unless one of its components
    /// already is that name, so both `data/` and `data/salicon/` point at the same dataset.
    pub fn new(root: impl AsRef<Path>, data: impl Into<PathBuf>, phase: Phase) -> Self {
        let root = root.as_ref();
        let mut data = data.into();

        if let Phase::Train(kind) = phase {
            let name = kind.name();
            let named = data
                .components()
                .any(|component| component.as_os_str() == name);
            if !named {
                data.push(name);
            }
        }

        let results = root.join("results");
        let checkpoints = results.join("ckpts");

        Self {
            data,
            history: results.join("history"),
            images: results.join("images"),
            best: checkpoints.join("best"),
            latest: checkpoints.join("latest"),
            weights: root.join("weights"),
        }
    }

    /// Where the output for `input` is written: its path relative to the common ancestor of
    /// the data and images roots, re-rooted under the images root.
    pub fn output_path(&self, input: &Path) -> PathBuf {
        let common = common_ancestor(&self.data, &self.images);

        let relative = input
            .strip_prefix(&common)
            .ok()
            .filter(|relative| !relative.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .or_else(|| input.file_name().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("output"));

        self.images.join(relative)
    }
}

fn common_ancestor(a: &Path, b: &Path) -> PathBuf {
    a.components()
        .zip(b.components())
        .take_while(|(x, y)| x == y)
        .map(|(component, _)| component)
        .filter(|component| !matches!(component, Component::CurDir))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_defaults() {
        let config = PipelineConfig::new();

        assert_eq!(config.batch_size, 1);
        assert_eq!(config.inference_batch_size, 100);
        assert_eq!(config.prefetch, 2);
        assert_eq!(config.num_workers, 1);
        assert_eq!(config.shuffle_seed, None);
        assert_eq!(config.partition_seed, 42);
    }

    #[test]
    fn inference_pipeline_follows_config() {
        let config = PipelineConfig::new()
            .with_inference_batch_size(64)
            .with_prefetch(4);

        let inference = config.inference_pipeline();
        assert_eq!(inference.batch_size(), 64);
        assert_eq!(inference.prefetch(), 4);
    }

    #[test]
    fn config_round_trips_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        let config = PipelineConfig::new().with_batch_size(8);

        config.save(&path).unwrap();
        let loaded = PipelineConfig::load(&path).unwrap();

        assert_eq!(loaded.batch_size, 8);
        assert_eq!(loaded.inference_batch_size, 100);
    }

    #[test]
    fn training_appends_dataset_name_once() {
        let appended = PathConfig::new("/run", "/run/data", Phase::Train(DatasetKind::Salicon));
        let kept = PathConfig::new(
            "/run",
            "/run/data/salicon",
            Phase::Train(DatasetKind::Salicon),
        );

        assert_eq!(appended.data, PathBuf::from("/run/data/salicon"));
        assert_eq!(kept.data, PathBuf::from("/run/data/salicon"));
    }

    #[test]
    fn run_directories_are_laid_out_under_root() {
        let paths = PathConfig::new("/run", "/videos", Phase::Test);

        assert_eq!(paths.data, PathBuf::from("/videos"));
        assert_eq!(paths.history, PathBuf::from("/run/results/history"));
        assert_eq!(paths.images, PathBuf::from("/run/results/images"));
        assert_eq!(paths.best, PathBuf::from("/run/results/ckpts/best"));
        assert_eq!(paths.latest, PathBuf::from("/run/results/ckpts/latest"));
        assert_eq!(paths.weights, PathBuf::from("/run/weights"));
    }

    #[test]
    fn output_path_mirrors_input_below_common_ancestor() {
        let paths = PathConfig::new("/home/me/msinet", "/home/me/clips", Phase::Test);

        let output = paths.output_path(Path::new("/home/me/clips/day1/walk.avi"));

        assert_eq!(
            output,
            PathBuf::from("/home/me/msinet/results/images/clips/day1/walk.avi")
        );
    }

    #[test]
    fn output_path_falls_back_to_file_name() {
        let paths = PathConfig::new("/run", "/data", Phase::Test);

        let output = paths.output_path(Path::new("relative/walk.avi"));

        assert_eq!(output, PathBuf::from("/run/results/images/walk.avi"));
    }
}
