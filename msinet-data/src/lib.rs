//! # MSI-Net data
//!
//! Data preparation for saliency prediction: discovering and pairing dataset files,
//! deterministic train/validation partitioning, aspect-preserving resize/pad/crop shared by
//! preprocessing and reconstruction, whole-video decoding, batch loading and encoding of
//! predicted maps.
//!
//! ```ignore
//! let paths = PathConfig::new(".", "data", Phase::Train(DatasetKind::Mit1003));
//! let splits = prepare(DatasetKind::Mit1003, &paths)?;
//! let loaders = dataloaders::<B>(splits, DatasetKind::Mit1003.target_size(), &config, &device);
//! for batch in loaders.train.iter() {
//!     // batch.stimuli: [batch, 3, 360, 480]
//! }
//! ```

pub mod codec;
pub mod config;
pub mod dataset;
pub mod error;
pub mod files;
pub mod geometry;
pub mod inference;
pub mod loader;
pub mod partition;
pub mod pipeline;
pub mod sample;
pub mod video;

// Re-export commonly used types
pub use codec::{
    postprocess_saliency_map, write_saliency_image, write_saliency_video, SaliencyVideoWriter,
};
pub use config::{PathConfig, Phase, PipelineConfig};
pub use dataset::{
    prepare, DatasetKind, SaliencyBatch, SaliencyBatcher, SaliencyDataset, Splits,
    UnknownDataset,
};
pub use error::{DataError, DataResult};
pub use files::{check_consistency, resolve_files};
pub use geometry::{Raster, ResizeMode, Size};
pub use inference::{run_inference, InferenceReport, LuminanceModel, SaliencyModel};
pub use loader::{dataloaders, verified_dataloaders, SaliencyLoader, SaliencyLoaders};
pub use partition::{Partition, PartitionStrategy, PARTITION_SEED};
pub use pipeline::{BatchPipeline, Prefetch};
pub use sample::{Corpus, SaliencyItem, Sample};
pub use video::{decode_video, VideoStream};
