//! Error types for irrigation-knn

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for library operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Listener could not be bound or failed while serving
    #[error("Server error on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Dataset header lacks one or more required columns
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    /// Too few complete rows survived filtering to form both partitions
    #[error("Not enough rows to split: {usable} usable ({train} train / {test} test)")]
    NotEnoughRows {
        usable: usize,
        train: usize,
        test: usize,
    },

    #[error("Cannot fit a model on an empty training set")]
    EmptyTrainingSet,

    #[error("Cannot score a model on an empty test set")]
    EmptyTestSet,

    #[error("Number of neighbors must be at least 1")]
    InvalidNeighbors,

    #[error("Malformed training data: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("Failed to build neighbor index: {0}")]
    Index(#[from] linfa_nn::BuildError),

    #[error("Neighbor search failed: {0}")]
    Search(#[from] linfa_nn::NnError),

    #[error("Failed to serialize model: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("Failed to deserialize model: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// Artifact was trained on a different feature layout
    #[error("Model feature schema {found:?} does not match expected {expected:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Unsupported model format version {found} (expected {expected})")]
    UnsupportedVersion { expected: u32, found: u32 },

    #[error("Corrupt model: {0}")]
    Corrupt(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
