//! # irrigation-knn 🌱💧
//!
//! Predict whether a plant needs watering from soil and weather sensor readings
//! using a distance-weighted k-nearest-neighbours classifier.
//!
//! Neighbour search is done with [`linfa-nn`](https://crates.io/crates/linfa-nn),
//! and training data is handled as [`linfa`](https://crates.io/crates/linfa)
//! datasets. The fitted model is served over HTTP with
//! [`axum`](https://crates.io/crates/axum).
//!
//! ## Features
//! - CSV ingestion with incomplete rows dropped
//! - Seeded, reproducible 80/20 train/test split
//! - 5-NN classifier with inverse-distance voting
//! - Model persistence with `rmp-serde` (MessagePack), checked against the
//!   feature layout on load
//! - `POST /predict` endpoint returning `{"needs_watering": <label>}`
//!
//! ## Example
//! ```no_run
//! use std::path::Path;
//! use irrigation_knn::{IrrigationModel, SensorReading};
//!
//! let model = IrrigationModel::load_from_file(Path::new("knn_model.msgpack"))?;
//! let reading = SensorReading {
//!     soil_moisture: 450.0,
//!     temperature: 25.0,
//!     soil_humidity: 60.0,
//!     ph: 6.5,
//!     rainfall: 5.0,
//!     air_humidity: 55.0,
//! };
//! println!("Status: {}", model.predict(&reading.to_features())?);
//! # Ok::<(), irrigation_knn::Error>(())
//! ```

pub mod error;
pub mod model;
pub mod reading;
pub mod server;
pub mod split;
pub mod train;

pub use error::{Error, Result};
pub use model::{IrrigationModel, KnnParams, Weighting};
pub use reading::{FEATURE_NAMES, LabelledReading, SensorReading, load_csv};
pub use server::{ServerConfig, serve};
pub use split::{DatasetSplit, train_test_split};
pub use train::{TrainConfig, TrainReport};
