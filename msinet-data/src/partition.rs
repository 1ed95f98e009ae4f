//! Train/validation partitioning strategies.
//!
//! Every strategy is deterministic. The seeded strategies reproduce, index for index, the
//! permutation of a legacy MT19937 generator seeded with [`PARTITION_SEED`] and shuffled with
//! bounded rejection sampling, so splits stay comparable across runs and implementations.

use rand_mt::Mt;
use serde::{Deserialize, Serialize};

use crate::error::{DataError, DataResult};

/// Seed shared by the seeded-random and category-interleaved strategies.
pub const PARTITION_SEED: u32 = 42;

/// Disjoint training and validation index sets over one corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// Indices of training samples, in selection order.
    pub train: Vec<usize>,
    /// Indices of validation samples, in selection order.
    pub valid: Vec<usize>,
}

/// How a corpus is divided into training and validation samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartitionStrategy {
    /// The corpus is the training sub-corpus followed by the validation sub-corpus.
    Precomputed,
    /// One shuffle of `[0, n)`; the first `n_train` indices train, the rest validate.
    SeededRandom {
        /// Shuffle seed.
        seed: u32,
    },
    /// The corpus is `categories` equal contiguous blocks. One shuffle of the in-block
    /// offsets is applied to every block, so each category contributes the same share.
    CategoryInterleaved {
        /// Number of equal-size blocks.
        categories: usize,
        /// Shuffle seed.
        seed: u32,
    },
}

impl PartitionStrategy {
    /// Splits a corpus of `corpus_size` samples into `n_train` training and `n_valid`
    /// validation indices.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::InvalidPartition`] when the requested sizes do not add up to the
    /// corpus size, or when a category block cannot hold the per-category share.
    pub fn partition(
        &self,
        corpus_size: usize,
        n_train: usize,
        n_valid: usize,
    ) -> DataResult<Partition> {
        if n_train + n_valid != corpus_size {
            return Err(invalid(
                corpus_size,
                format!("{n_train} training + {n_valid} validation samples requested"),
            ));
        }

        let partition = match *self {
            Self::Precomputed => Partition {
                train: (0..n_train).collect(),
                valid: (n_train..corpus_size).collect(),
            },
            Self::SeededRandom { seed } => {
                let mut indices = shuffled_indices(corpus_size, seed);
                let valid = indices.split_off(n_train);
                Partition {
                    train: indices,
                    valid,
                }
            }
            Self::CategoryInterleaved { categories, seed } => {
                category_interleaved(corpus_size, categories, n_train, n_valid, seed)?
            }
        };

        tracing::debug!(
            strategy = ?self,
            train = partition.train.len(),
            valid = partition.valid.len(),
            "partitioned corpus"
        );
        Ok(partition)
    }
}

fn invalid(corpus_size: usize, reason: String) -> DataError {
    DataError::InvalidPartition {
        corpus_size,
        reason,
    }
}

fn category_interleaved(
    corpus_size: usize,
    categories: usize,
    n_train: usize,
    n_valid: usize,
    seed: u32,
) -> DataResult<Partition> {
    if categories == 0 || corpus_size % categories != 0 {
        return Err(invalid(
            corpus_size,
            format!("corpus does not divide into {categories} equal categories"),
        ));
    }

    let block = corpus_size / categories;
    let per_category_train = n_train * block / corpus_size;
    let per_category_valid = n_valid * block / corpus_size;

    if per_category_train + per_category_valid > block {
        return Err(invalid(
            corpus_size,
            format!(
                "{per_category_train} + {per_category_valid} samples per category exceed block of {block}"
            ),
        ));
    }
    if per_category_train + per_category_valid < block {
        tracing::warn!(
            block,
            per_category_train,
            per_category_valid,
            "category shares do not cover every block; some samples stay unused"
        );
    }

    let offsets = shuffled_indices(block, seed);
    let replicate = |chosen: &[usize]| -> Vec<usize> {
        (0..categories)
            .flat_map(|category| chosen.iter().map(move |offset| offset + category * block))
            .collect()
    };

    Ok(Partition {
        train: replicate(&offsets[..per_category_train]),
        valid: replicate(&offsets[block - per_category_valid..]),
    })
}

/// Returns `[0, n)` shuffled by a Fisher-Yates pass driven by MT19937 seeded with `seed`.
///
/// The swap partner for position `i` is drawn uniformly from `[0, i]` by masking generator
/// output to the smallest covering bit width and rejecting values above `i`. This matches
/// the legacy NumPy `RandomState(seed).shuffle` sequence exactly.
pub fn shuffled_indices(n: usize, seed: u32) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = Mt::new(seed);

    for i in (1..n).rev() {
        let j = bounded(&mut rng, i as u64) as usize;
        indices.swap(i, j);
    }

    indices
}

fn bounded(rng: &mut Mt, max: u64) -> u64 {
    if max == 0 {
        return 0;
    }

    let mut mask = max;
    for shift in [1, 2, 4, 8, 16, 32] {
        mask |= mask >> shift;
    }

    loop {
        let value = if max <= u64::from(u32::MAX) {
            u64::from(rng.next_u32()) & mask
        } else {
            ((u64::from(rng.next_u32()) << 32) | u64::from(rng.next_u32())) & mask
        };
        if value <= max {
            return value;
        }
    }
}
