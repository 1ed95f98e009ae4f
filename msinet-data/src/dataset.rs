//! Dataset kinds, dataset preparation and burn dataset/batcher integration.
//!
//! Preparation follows the same path for every kind: resolve the stimulus and ground-truth
//! lists, verify them against the kind's known cardinality, and partition the resulting
//! corpus with the kind's strategy. Decoding happens later, per sample, through
//! [`SaliencyDataset`].

use std::{
    fmt,
    marker::PhantomData,
    path::{Path, PathBuf},
    str::FromStr,
};

use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    tensor::{backend::Backend, Int, Tensor, TensorData},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    config::PathConfig,
    error::DataResult,
    files::{check_consistency, resolve_files},
    geometry::Size,
    partition::{PartitionStrategy, PARTITION_SEED},
    sample::{load_sample, Corpus, SaliencyItem, Sample},
};

/// Number of equal-size categories in CAT2000.
pub const CAT2000_CATEGORIES: usize = 20;

/// A supported training dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    /// SALICON, shipped with separate training and validation directories.
    Salicon,
    /// MIT1003, one pool split at random.
    Mit1003,
    /// CAT2000, twenty categories split proportionally.
    Cat2000,
}

impl DatasetKind {
    /// Every supported dataset.
    pub const ALL: [Self; 3] = [Self::Salicon, Self::Mit1003, Self::Cat2000];

    /// Lowercase identifier, also the dataset's directory name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Salicon => "salicon",
            Self::Mit1003 => "mit1003",
            Self::Cat2000 => "cat2000",
        }
    }

    /// Input size of models trained on this dataset.
    pub const fn target_size(self) -> Size {
        match self {
            Self::Salicon => Size::new(240, 320),
            Self::Mit1003 => Size::new(360, 360),
            Self::Cat2000 => Size::new(216, 384),
        }
    }

    /// Number of training samples.
    pub const fn train_size(self) -> usize {
        match self {
            Self::Salicon => 10000,
            Self::Mit1003 => 803,
            Self::Cat2000 => 1600,
        }
    }

    /// Number of validation samples.
    pub const fn valid_size(self) -> usize {
        match self {
            Self::Salicon => 5000,
            Self::Mit1003 => 200,
            Self::Cat2000 => 400,
        }
    }

    /// How the corpus is split, with `seed` for the shuffling strategies.
    pub const fn strategy(self, seed: u32) -> PartitionStrategy {
        match self {
            Self::Salicon => PartitionStrategy::Precomputed,
            Self::Mit1003 => PartitionStrategy::SeededRandom { seed },
            Self::Cat2000 => PartitionStrategy::CategoryInterleaved {
                categories: CAT2000_CATEGORIES,
                seed,
            },
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A dataset identifier that names no supported dataset.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown dataset {0:?}, expected one of salicon, mit1003, cat2000")]
pub struct UnknownDataset(pub String);

impl FromStr for DatasetKind {
    type Err = UnknownDataset;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownDataset(s.to_owned()))
    }
}

/// Training and validation corpora of one dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Splits {
    /// Training samples.
    pub train: Corpus,
    /// Validation samples.
    pub valid: Corpus,
}

fn paired_corpus(stimuli: &Path, saliency: &Path, expected_pairs: usize) -> DataResult<Corpus> {
    let stimuli = resolve_files(stimuli)?;
    let saliency = resolve_files(saliency)?;
    check_consistency(&[&stimuli[..], &saliency[..]], 2 * expected_pairs)?;
    Ok(Corpus::paired(stimuli, saliency))
}

/// Resolves, verifies and partitions the dataset under `paths.data`.
///
/// # Errors
///
/// Any structural problem is fatal: [`NotFound`](crate::DataError::NotFound) for empty
/// directories, [`CountMismatch`](crate::DataError::CountMismatch) and
/// [`NameMismatch`](crate::DataError::NameMismatch) for inconsistent lists, and
/// [`InvalidPartition`](crate::DataError::InvalidPartition) if the split is impossible.
pub fn prepare(kind: DatasetKind, paths: &PathConfig) -> DataResult<Splits> {
    prepare_with_seed(kind, paths, PARTITION_SEED)
}

/// [`prepare`] with an explicit partition seed.
///
/// # Errors
///
/// See [`prepare`].
pub fn prepare_with_seed(kind: DatasetKind, paths: &PathConfig, seed: u32) -> DataResult<Splits> {
    let stimuli = paths.data.join("stimuli");
    let saliency = paths.data.join("saliency");
    let (n_train, n_valid) = (kind.train_size(), kind.valid_size());

    let corpus = match kind {
        DatasetKind::Salicon => {
            let mut corpus =
                paired_corpus(&stimuli.join("train"), &saliency.join("train"), n_train)?;
            corpus.extend(paired_corpus(
                &stimuli.join("val"),
                &saliency.join("val"),
                n_valid,
            )?);
            corpus
        }
        DatasetKind::Mit1003 | DatasetKind::Cat2000 => {
            paired_corpus(&stimuli, &saliency, n_train + n_valid)?
        }
    };

    let partition = kind.strategy(seed).partition(corpus.len(), n_train, n_valid)?;

    tracing::info!(
        dataset = %kind,
        path = %paths.data.display(),
        train = partition.train.len(),
        valid = partition.valid.len(),
        "dataset prepared"
    );

    Ok(Splits {
        train: corpus.select(&partition.train),
        valid: corpus.select(&partition.valid),
    })
}

/// Samples of one split, decoded and fitted on access.
#[derive(Debug, Clone)]
pub struct SaliencyDataset {
    samples: Vec<Sample>,
    target: Size,
}

impl SaliencyDataset {
    /// Serves `corpus` at `target` size.
    pub fn new(corpus: Corpus, target: Size) -> Self {
        Self {
            samples: corpus.into_samples(),
            target,
        }
    }

    /// Size every item is fitted to.
    pub const fn target_size(&self) -> Size {
        self.target
    }

    /// Decodes every sample once, reporting the first one that cannot be loaded.
    ///
    /// [`Dataset::get`] panics on an undecodable sample, so running this before training
    /// turns a mid-epoch abort into an error up front.
    ///
    /// # Errors
    ///
    /// Returns the first [`DecodeFailure`](crate::DataError::DecodeFailure) or I/O error.
    pub fn verify(&self) -> DataResult<()> {
        for sample in &self.samples {
            load_sample(sample, self.target)?;
        }
        tracing::info!(samples = self.samples.len(), "verified dataset");
        Ok(())
    }
}

impl Dataset<SaliencyItem> for SaliencyDataset {
    /// Decodes and fits the sample at `index`.
    ///
    /// # Panics
    ///
    /// Panics if the sample at an in-range `index` cannot be loaded. Returning `None` there
    /// would end the loader's epoch early without an error.
    fn get(&self, index: usize) -> Option<SaliencyItem> {
        let sample = self.samples.get(index)?;

        match load_sample(sample, self.target) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::error!(
                    path = %sample.stimulus.display(),
                    error = %e,
                    "failed to load sample"
                );
                panic!("sample {} cannot be loaded: {e}", sample.stimulus.display());
            }
        }
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// A batch of fitted samples.
#[derive(Debug, Clone)]
pub struct SaliencyBatch<B: Backend> {
    /// Stimuli `[batch, 3, height, width]` in `0..=255`.
    pub stimuli: Tensor<B, 4>,
    /// Ground truth `[batch, 1, height, width]` in `0..=255`, when every item has one.
    pub ground_truth: Option<Tensor<B, 4>>,
    /// Pre-fit `[height, width]` of every stimulus, `[batch, 2]`.
    pub original_sizes: Tensor<B, 2, Int>,
    /// Stimulus paths.
    pub paths: Vec<PathBuf>,
}

/// Converts row-major `[count, height, width, channels]` pixels to a `[count, channels,
/// height, width]` tensor.
pub fn pixels_to_tensor<B: Backend>(
    pixels: Vec<f32>,
    count: usize,
    size: Size,
    channels: usize,
    device: &B::Device,
) -> Tensor<B, 4> {
    let shape = [count, size.height as usize, size.width as usize, channels];
    Tensor::<B, 4>::from_data(TensorData::new(pixels, shape), device).permute([0, 3, 1, 2])
}

/// Stacks [`SaliencyItem`]s into a [`SaliencyBatch`].
#[derive(Clone, Default)]
pub struct SaliencyBatcher<B: Backend> {
    _phantom: PhantomData<B>,
}

impl<B: Backend> SaliencyBatcher<B> {
    /// Create a new batcher.
    pub const fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<B: Backend> Batcher<B, SaliencyItem, SaliencyBatch<B>> for SaliencyBatcher<B> {
    fn batch(&self, items: Vec<SaliencyItem>, device: &B::Device) -> SaliencyBatch<B> {
        let count = items.len();
        let size = items.first().map_or(Size::new(0, 0), |item| item.size);
        let labelled = items.iter().all(|item| item.ground_truth.is_some());

        let pixels = size.height as usize * size.width as usize;
        let mut stimuli = Vec::with_capacity(count * pixels * 3);
        let mut ground_truth = Vec::new();
        let mut original_sizes = Vec::with_capacity(count * 2);
        let mut paths = Vec::with_capacity(count);

        for item in items {
            stimuli.extend(item.stimulus);
            if labelled {
                ground_truth.extend(item.ground_truth.unwrap_or_default());
            }
            original_sizes.push(i64::from(item.original_size.height));
            original_sizes.push(i64::from(item.original_size.width));
            paths.push(item.path);
        }

        SaliencyBatch {
            stimuli: pixels_to_tensor(stimuli, count, size, 3, device),
            ground_truth: labelled
                .then(|| pixels_to_tensor(ground_truth, count, size, 1, device)),
            original_sizes: Tensor::from_data(
                TensorData::new(original_sizes, [count, 2]),
                device,
            ),
            paths,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use burn::backend::NdArray;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    use super::*;
    use crate::{config::Phase, DataError};

    type TestBackend = NdArray;

    fn write_pair(root: &Path, split: &str, name: &str) {
        let stimuli = root.join("stimuli").join(split);
        let saliency = root.join("saliency").join(split);
        fs::create_dir_all(&stimuli).unwrap();
        fs::create_dir_all(&saliency).unwrap();
        fs::write(stimuli.join(format!("{name}.jpg")), b"").unwrap();
        fs::write(saliency.join(format!("{name}_fixMap.png")), b"").unwrap();
    }

    #[test]
    fn kinds_parse_case_insensitively() {
        assert_eq!("salicon".parse::<DatasetKind>(), Ok(DatasetKind::Salicon));
        assert_eq!("MIT1003".parse::<DatasetKind>(), Ok(DatasetKind::Mit1003));
        assert_eq!("cat2000".parse::<DatasetKind>(), Ok(DatasetKind::Cat2000));
        assert_eq!(
            "imagenet".parse::<DatasetKind>(),
            Err(UnknownDataset("imagenet".into()))
        );
    }

    #[test]
    fn kind_sizes_add_up_to_corpus() {
        let total = |kind: DatasetKind| kind.train_size() + kind.valid_size();

        assert_eq!(total(DatasetKind::Salicon), 15000);
        assert_eq!(total(DatasetKind::Mit1003), 1003);
        assert_eq!(total(DatasetKind::Cat2000), 2000);
        assert_eq!(DatasetKind::Cat2000.target_size(), Size::new(216, 384));
    }

    #[test]
    fn mit1003_is_split_at_random_with_fixed_seed() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..1003 {
            write_pair(dir.path(), "", &format!("i{i:04}"));
        }
        let paths = PathConfig::new(dir.path(), dir.path(), Phase::Test);

        let splits = prepare(DatasetKind::Mit1003, &paths).unwrap();

        assert_eq!(splits.train.len(), 803);
        assert_eq!(splits.valid.len(), 200);
        // First shuffled indices for seed 42 over 1003 samples.
        let first: Vec<String> = splits.train.samples()[..3]
            .iter()
            .map(Sample::name)
            .collect();
        assert_eq!(first, ["i0626", "i0629", "i0847"]);
        assert!(splits
            .train
            .samples()
            .iter()
            .all(|sample| sample.ground_truth.is_some()));
    }

    #[test]
    fn missing_ground_truth_is_a_count_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..1003 {
            write_pair(dir.path(), "", &format!("i{i:04}"));
        }
        fs::remove_file(dir.path().join("saliency/i0500_fixMap.png")).unwrap();
        let paths = PathConfig::new(dir.path(), dir.path(), Phase::Test);

        let result = prepare(DatasetKind::Mit1003, &paths);

        assert!(matches!(result, Err(DataError::CountMismatch { .. })));
    }

    #[test]
    fn missing_directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let paths = PathConfig::new(dir.path(), dir.path().join("nothing"), Phase::Test);

        let result = prepare(DatasetKind::Cat2000, &paths);

        assert!(matches!(result, Err(DataError::NotFound { .. })));
    }

    #[test]
    fn salicon_keeps_its_shipped_split() {
        let dir = tempfile::tempdir().unwrap();
        write_pair(dir.path(), "train", "COCO_train_1");
        write_pair(dir.path(), "val", "COCO_val_1");

        // With one pair per split the counts cannot match SALICON's.
        let paths = PathConfig::new(dir.path(), dir.path(), Phase::Test);
        let result = prepare(DatasetKind::Salicon, &paths);
        assert!(matches!(
            result,
            Err(DataError::CountMismatch {
                expected: 20000,
                actual: 2
            })
        ));
    }

    fn write_decodable(dir: &Path, name: &str) -> (PathBuf, PathBuf) {
        let stimulus = dir.join(format!("{name}.png"));
        let ground_truth = dir.join(format!("{name}_fixMap.png"));
        RgbImage::from_pixel(40, 20, Rgb([1, 2, 3]))
            .save(&stimulus)
            .unwrap();
        GrayImage::from_pixel(40, 20, Luma([9]))
            .save(&ground_truth)
            .unwrap();
        (stimulus, ground_truth)
    }

    /// Three samples, the middle one's stimulus truncated.
    fn corpus_with_corrupt_middle(dir: &Path) -> Corpus {
        let (first, first_map) = write_decodable(dir, "a");
        let (middle, middle_map) = write_decodable(dir, "b");
        let (last, last_map) = write_decodable(dir, "c");
        fs::write(&middle, b"broken").unwrap();
        Corpus::paired(vec![first, middle, last], vec![first_map, middle_map, last_map])
    }

    #[test]
    fn dataset_decodes_and_fits_samples() {
        let dir = tempfile::tempdir().unwrap();
        let (stimulus, ground_truth) = write_decodable(dir.path(), "a");

        let corpus = Corpus::paired(vec![stimulus.clone()], vec![ground_truth]);
        let dataset = SaliencyDataset::new(corpus, Size::new(16, 16));

        assert_eq!(dataset.len(), 1);
        let item = dataset.get(0).unwrap();
        assert_eq!(item.original_size, Size::new(20, 40));
        assert_eq!(item.size, Size::new(16, 16));
        assert_eq!(item.path, stimulus);
        assert!(dataset.get(1).is_none());
        assert!(dataset.verify().is_ok());
    }

    #[test]
    #[should_panic(expected = "b.png cannot be loaded")]
    fn corrupt_sample_aborts_instead_of_ending_the_epoch() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = SaliencyDataset::new(corpus_with_corrupt_middle(dir.path()), Size::new(8, 8));

        assert!(dataset.get(0).is_some());
        dataset.get(1);
    }

    #[test]
    fn samples_after_a_corrupt_one_stay_reachable() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = SaliencyDataset::new(corpus_with_corrupt_middle(dir.path()), Size::new(8, 8));

        assert_eq!(dataset.len(), 3);
        let last = dataset.get(2).unwrap();
        assert_eq!(last.path, dir.path().join("c.png"));
    }

    #[test]
    fn verify_reports_the_corrupt_sample() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = SaliencyDataset::new(corpus_with_corrupt_middle(dir.path()), Size::new(8, 8));

        match dataset.verify() {
            Err(DataError::DecodeFailure { path, .. }) => {
                assert_eq!(path, dir.path().join("b.png"));
            }
            other => panic!("expected a decode failure, got {other:?}"),
        }
    }

    #[test]
    fn batcher_stacks_items_channels_first() {
        let device = Default::default();
        let batcher = SaliencyBatcher::<TestBackend>::new();
        let size = Size::new(4, 6);
        let item = |value: f32, path: &str| SaliencyItem {
            stimulus: [value, 0.0, 255.0].repeat(24),
            ground_truth: Some(vec![value; 24]),
            size,
            original_size: Size::new(40, 60),
            path: path.into(),
        };

        let batch = batcher.batch(vec![item(10.0, "a.jpg"), item(20.0, "b.jpg")], &device);

        assert_eq!(batch.stimuli.dims(), [2, 3, 4, 6]);
        assert_eq!(
            batch.ground_truth.as_ref().map(Tensor::dims),
            Some([2, 1, 4, 6])
        );
        assert_eq!(batch.original_sizes.dims(), [2, 2]);
        assert_eq!(batch.paths, [PathBuf::from("a.jpg"), PathBuf::from("b.jpg")]);

        let red: f32 = batch.stimuli.clone().slice([1..2, 0..1, 0..1, 0..1]).into_scalar();
        let blue: f32 = batch.stimuli.slice([1..2, 2..3, 3..4, 5..6]).into_scalar();
        assert_eq!(red, 20.0);
        assert_eq!(blue, 255.0);

        let sizes = batch.original_sizes.into_data().to_vec::<i64>().unwrap();
        assert_eq!(sizes, [40, 60, 40, 60]);
    }

    #[test]
    fn unlabelled_items_have_no_ground_truth_tensor() {
        let batcher = SaliencyBatcher::<TestBackend>::new();
        let item = SaliencyItem {
            stimulus: vec![0.0; 12],
            ground_truth: None,
            size: Size::new(2, 2),
            original_size: Size::new(2, 2),
            path: "x.jpg".into(),
        };

        let batch = batcher.batch(vec![item], &Default::default());

        assert!(batch.ground_truth.is_none());
    }
}
