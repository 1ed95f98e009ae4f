//! MSI-Net tools
//!
//! Command-line front end for `msinet-data`.
//!
//! ## Usage
//!
//! ```bash
//! # Check a dataset and print its split sizes
//! cargo run --bin msinet -- prepare --dataset mit1003 --data data
//!
//! # Also decode every sample once
//! cargo run --bin msinet -- prepare --dataset mit1003 --data data --verify
//!
//! # Predict every image and video under a directory
//! cargo run --bin msinet -- infer --dataset salicon --data input/
//!
//! # Run on the GPU
//! cargo run --bin msinet --no-default-features --features wgpu -- infer --data input/
//! ```

pub mod backend;
pub mod commands;

// Re-export commonly used items
pub use backend::{create_device, SelectedBackend, SelectedDevice, BACKEND_NAME};
pub use commands::{infer, load_pipeline_config, prepare_dataset, summarize, SplitSummary};
