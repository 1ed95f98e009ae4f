//! Error types for the msinet-data crate.
//!
//! Structural errors (missing files, inconsistent lists, impossible partitions) are fatal for
//! dataset preparation. Decode errors are scoped to a single file so that inference over a
//! directory can report them and move on.

use std::path::PathBuf;

use thiserror::Error;

/// Error type for data preparation and reconstruction.
#[derive(Error, Debug)]
pub enum DataError {
    /// No matching stimulus or ground-truth file was found under a path.
    #[error("No data was found in: {path}")]
    NotFound {
        /// The path that was searched.
        path: PathBuf,
    },

    /// The number of collected files differs from the dataset's known cardinality.
    #[error("Files are missing: expected {expected} files, found {actual}")]
    CountMismatch {
        /// The expected number of files.
        expected: usize,
        /// The number of files actually collected.
        actual: usize,
    },

    /// A stimulus and its ground-truth map do not share a base name.
    #[error("File name mismatch at index {index}: {names:?}")]
    NameMismatch {
        /// Position of the offending pair.
        index: usize,
        /// Base names of the pair after suffix stripping.
        names: Vec<String>,
    },

    /// The requested split cannot be drawn from the corpus.
    #[error("Invalid partition of {corpus_size} samples: {reason}")]
    InvalidPartition {
        /// Number of samples in the corpus.
        corpus_size: usize,
        /// Why the split is impossible.
        reason: String,
    },

    /// A stimulus, ground-truth map or video could not be decoded.
    #[error("Failed to decode {path}: {reason}")]
    DecodeFailure {
        /// The file that failed to decode.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// A resize, pad or crop was invoked on an image violating its size precondition.
    #[error("Cannot {operation} {current_height}x{current_width} to {target_height}x{target_width}")]
    GeometryPrecondition {
        /// The failed operation ("resize", "pad", "crop" or "reconstruct").
        operation: &'static str,
        /// Current image height.
        current_height: u32,
        /// Current image width.
        current_width: u32,
        /// Requested height.
        target_height: u32,
        /// Requested width.
        target_width: u32,
    },

    /// Filesystem access failed.
    #[error("I/O error at {path}")]
    Io {
        /// The path being accessed.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Encoding an output image or video frame failed.
    #[error("Failed to encode {path}")]
    Encode {
        /// The output path.
        path: PathBuf,
        /// The underlying image error.
        #[source]
        source: image::ImageError,
    },

    /// Opening or writing an output video failed.
    #[error("Failed to write video {path}")]
    Video {
        /// The output path.
        path: PathBuf,
        /// The underlying OpenCV error.
        #[source]
        source: opencv::Error,
    },
}

impl DataError {
    pub(crate) fn decode(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::DecodeFailure {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn video(path: impl Into<PathBuf>, source: opencv::Error) -> Self {
        Self::Video {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the error concerns a single input file and can be skipped over during
    /// inference.
    pub const fn is_per_file(&self) -> bool {
        matches!(
            self,
            Self::DecodeFailure { .. } | Self::Encode { .. } | Self::Video { .. }
        )
    }
}

/// A specialized `Result` type for data preparation.
pub type DataResult<T> = Result<T, DataError>;
