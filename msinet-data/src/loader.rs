//! Train and validation batch streams over prepared splits.
//!
//! Both loaders decode samples on burn worker threads through [`SaliencyDataset`] and stack
//! them with [`SaliencyBatcher`]. The training loader reshuffles every epoch from a seed;
//! the validation loader keeps corpus order.

use std::sync::Arc;

use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    tensor::backend::Backend,
};

use crate::{
    config::PipelineConfig,
    dataset::{SaliencyBatch, SaliencyBatcher, SaliencyDataset, Splits},
    error::DataResult,
    geometry::Size,
};

/// Batch stream of one split.
pub type SaliencyLoader<B> = Arc<dyn DataLoader<B, SaliencyBatch<B>>>;

/// Loaders for the training and validation splits of one dataset.
pub struct SaliencyLoaders<B: Backend> {
    /// Shuffled training batches.
    pub train: SaliencyLoader<B>,
    /// Validation batches in corpus order.
    pub valid: SaliencyLoader<B>,
    /// Seed the training loader shuffles with.
    pub seed: u64,
}

/// Builds data loaders serving `splits` fitted to `target`.
///
/// Batches hold `config.batch_size` samples, the last one of a split possibly fewer. When
/// `config.shuffle_seed` is unset a fresh seed is drawn and reported in the returned
/// loaders.
pub fn dataloaders<B: Backend>(
    splits: Splits,
    target: Size,
    config: &PipelineConfig,
    device: &B::Device,
) -> SaliencyLoaders<B> {
    let seed = config.shuffle_seed.unwrap_or_else(rand::random);
    let batch_size = config.batch_size.max(1);

    let train = DataLoaderBuilder::new(SaliencyBatcher::<B>::new())
        .batch_size(batch_size)
        .shuffle(seed)
        .num_workers(config.num_workers)
        .set_device(device.clone())
        .build(SaliencyDataset::new(splits.train, target));

    let valid = DataLoaderBuilder::new(SaliencyBatcher::<B>::new())
        .batch_size(batch_size)
        .num_workers(config.num_workers)
        .set_device(device.clone())
        .build(SaliencyDataset::new(splits.valid, target));

    tracing::info!(
        train = train.num_items(),
        valid = valid.num_items(),
        batch_size,
        workers = config.num_workers,
        seed,
        "built data loaders"
    );

    SaliencyLoaders { train, valid, seed }
}

/// Like [`dataloaders`], but decodes every sample first so a corrupt file is reported as an
/// error instead of aborting an epoch.
///
/// # Errors
///
/// Returns the first sample that fails to load; see [`SaliencyDataset::verify`].
pub fn verified_dataloaders<B: Backend>(
    splits: Splits,
    target: Size,
    config: &PipelineConfig,
    device: &B::Device,
) -> DataResult<SaliencyLoaders<B>> {
    SaliencyDataset::new(splits.train.clone(), target).verify()?;
    SaliencyDataset::new(splits.valid.clone(), target).verify()?;
    Ok(dataloaders(splits, target, config, device))
}
