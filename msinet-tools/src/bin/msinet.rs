//! Dataset preparation and saliency inference.
//!
//! ```bash
//! RUST_LOG=debug cargo run --bin msinet -- prepare --dataset cat2000 --data data
//! cargo run --bin msinet -- infer --data clips/ --config pipeline.json
//! ```

use std::{path::PathBuf, time::Instant};

use anyhow::Result;
use clap::{Parser, Subcommand};
use msinet_data::DatasetKind;
use msinet_tools::{infer, load_pipeline_config, prepare_dataset, summarize, BACKEND_NAME};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory receiving results, checkpoints and weights
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Pipeline configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve, check and partition a training dataset
    Prepare {
        /// Dataset to prepare (salicon, mit1003, cat2000)
        #[arg(short, long)]
        dataset: DatasetKind,

        /// Parent directory of the dataset
        #[arg(long, default_value = "data")]
        data: PathBuf,

        /// Decode every sample once before reporting
        #[arg(long)]
        verify: bool,
    },
    /// Predict saliency for an image, a video or a directory of them
    Infer {
        /// Dataset whose input size is used
        #[arg(short, long, default_value = "salicon")]
        dataset: DatasetKind,

        /// Input file or directory
        #[arg(long)]
        data: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = load_pipeline_config(args.config.as_deref())?;

    match args.command {
        Command::Prepare {
            dataset,
            data,
            verify,
        } => {
            let loaders = prepare_dataset(dataset, &args.root, &data, &config, verify)?;

            println!(
                "{dataset} (batch size {}, shuffle seed {}):",
                config.batch_size, loaders.seed
            );
            for split in summarize(&loaders, &config) {
                println!("  {split}");
            }
        }
        Command::Infer { dataset, data } => {
            println!("Using backend: {BACKEND_NAME}");

            let start = Instant::now();
            let report = infer(dataset, &args.root, &data, &config)?;

            println!(
                "Wrote {} result(s) in {:.2?}",
                report.written.len(),
                start.elapsed()
            );
            if !report.skipped.is_empty() {
                println!("Skipped {} file(s):", report.skipped.len());
                for path in &report.skipped {
                    println!("  {}", path.display());
                }
            }
        }
    }

    Ok(())
}
