//! One-shot training run: dataset in, fitted model artifact out.

use crate::error::{Error, Result};
use crate::model::{IrrigationModel, KnnParams};
use crate::reading::{load_csv, to_dataset};
use crate::split::{DEFAULT_SEED, DEFAULT_TEST_RATIO, train_test_split};
use std::path::PathBuf;

/// Default dataset location, relative to the working directory.
pub const DEFAULT_DATA_PATH: &str = "TARP.csv";
/// Default artifact location, shared with the server.
pub const DEFAULT_MODEL_PATH: &str = "knn_model.msgpack";

#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub data_path: PathBuf,
    pub model_path: PathBuf,
    pub test_ratio: f64,
    pub seed: u64,
    pub params: KnnParams,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            test_ratio: DEFAULT_TEST_RATIO,
            seed: DEFAULT_SEED,
            params: KnnParams::default(),
        }
    }
}

/// Outcome of a training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainReport {
    pub train_rows: usize,
    pub test_rows: usize,
    pub dropped_rows: usize,
    /// Holdout accuracy in `[0, 1]`.
    pub accuracy: f64,
}

/// Loads the dataset, fits the classifier on the training split, reports holdout
/// accuracy and writes the artifact.
///
/// The model is saved whatever its accuracy.
pub fn run(config: &TrainConfig) -> Result<TrainReport> {
    println!("📂 Loading dataset from {:?}", config.data_path);
    let data = load_csv(&config.data_path)?;
    if data.dropped > 0 {
        println!("🧹 Dropped {} incomplete rows", data.dropped);
    }

    let split = train_test_split(&data.readings, config.test_ratio, config.seed);
    if split.train.is_empty() || split.test.is_empty() {
        return Err(Error::NotEnoughRows {
            usable: data.readings.len(),
            train: split.train.len(),
            test: split.test.len(),
        });
    }

    println!(
        "🧠 Training {}-NN model on {} rows ({} held out)...",
        config.params.n_neighbors,
        split.train.len(),
        split.test.len()
    );
    let train = to_dataset(&split.train)?;
    let test = to_dataset(&split.test)?;
    let model = IrrigationModel::fit(config.params, &train)?;

    let accuracy = model.score(&test)?;
    println!("✅ Accuracy: {:.2}%", accuracy * 100.0);

    println!("💾 Saving model to {:?}", config.model_path);
    model.save_to_file(&config.model_path)?;

    Ok(TrainReport {
        train_rows: split.train.len(),
        test_rows: split.test.len(),
        dropped_rows: data.dropped,
        accuracy,
    })
}
