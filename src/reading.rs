//! Sensor readings and CSV ingestion.

use crate::error::{Error, Result};
use linfa::Dataset;
use ndarray::{Array1, Array2, Ix1};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

/// Number of numeric features in a reading.
pub const N_FEATURES: usize = 6;

/// Feature names in the exact column order the model is trained and queried with.
pub const FEATURE_NAMES: [&str; N_FEATURES] = [
    "soil_moisture",
    "temperature",
    "soil_humidity",
    "ph",
    "rainfall",
    "air_humidity",
];

/// Dataset headers for each feature, aligned with [`FEATURE_NAMES`].
pub const CSV_FEATURE_COLUMNS: [&str; N_FEATURES] = [
    "Soil Moisture",
    "Temperature",
    "Soil Humidity",
    "ph",
    "rainfall",
    "Air humidity (%)",
];

/// Dataset header holding the irrigation status label.
pub const CSV_LABEL_COLUMN: &str = "Status";

/// One set of sensor measurements. Doubles as the body of a prediction request,
/// so every field is required and must be numeric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub soil_moisture: f64,
    pub temperature: f64,
    pub soil_humidity: f64,
    pub ph: f64,
    pub rainfall: f64,
    pub air_humidity: f64,
}

impl SensorReading {
    /// Arranges the reading into a feature vector ordered like [`FEATURE_NAMES`].
    pub fn to_features(&self) -> [f64; N_FEATURES] {
        [
            self.soil_moisture,
            self.temperature,
            self.soil_humidity,
            self.ph,
            self.rainfall,
            self.air_humidity,
        ]
    }

    /// Inverse of [`SensorReading::to_features`].
    pub fn from_features(f: [f64; N_FEATURES]) -> Self {
        SensorReading {
            soil_moisture: f[0],
            temperature: f[1],
            soil_humidity: f[2],
            ph: f[3],
            rainfall: f[4],
            air_humidity: f[5],
        }
    }
}

/// A reading with its known irrigation status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelledReading {
    pub reading: SensorReading,
    pub label: String,
}

/// Complete rows loaded from a dataset file.
#[derive(Debug)]
pub struct SensorDataset {
    pub readings: Vec<LabelledReading>,
    /// Rows discarded for a missing or non-numeric required value.
    pub dropped: usize,
}

// Unparseable cells become `None` so the whole row can be dropped.
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "Soil Moisture", deserialize_with = "csv::invalid_option")]
    soil_moisture: Option<f64>,
    #[serde(rename = "Temperature", deserialize_with = "csv::invalid_option")]
    temperature: Option<f64>,
    #[serde(rename = "Soil Humidity", deserialize_with = "csv::invalid_option")]
    soil_humidity: Option<f64>,
    #[serde(rename = "ph", deserialize_with = "csv::invalid_option")]
    ph: Option<f64>,
    #[serde(rename = "rainfall", deserialize_with = "csv::invalid_option")]
    rainfall: Option<f64>,
    #[serde(rename = "Air humidity (%)", deserialize_with = "csv::invalid_option")]
    air_humidity: Option<f64>,
    #[serde(rename = "Status")]
    status: Option<String>,
}

impl CsvRow {
    fn into_labelled(self) -> Option<LabelledReading> {
        let features = [
            self.soil_moisture?,
            self.temperature?,
            self.soil_humidity?,
            self.ph?,
            self.rainfall?,
            self.air_humidity?,
        ];
        // "NaN" parses as a float but marks a missing measurement.
        if features.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let label = self.status?.trim().to_string();
        if label.is_empty() {
            return None;
        }
        Some(LabelledReading {
            reading: SensorReading::from_features(features),
            label,
        })
    }
}

/// Loads labelled readings from a CSV file, dropping incomplete rows.
///
/// Headers are matched after trimming surrounding whitespace. Columns other than
/// the six features and the label are ignored.
pub fn load_csv(path: &Path) -> Result<SensorDataset> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = rdr.headers()?.clone();
    let missing: Vec<String> = CSV_FEATURE_COLUMNS
        .iter()
        .chain(std::iter::once(&CSV_LABEL_COLUMN))
        .filter(|col| !headers.iter().any(|h| h == **col))
        .map(|col| col.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(Error::MissingColumns(missing));
    }

    let mut readings = vec![];
    let mut dropped = 0;
    for result in rdr.deserialize() {
        let row: CsvRow = result?;
        match row.into_labelled() {
            Some(r) => readings.push(r),
            None => dropped += 1,
        }
    }

    Ok(SensorDataset { readings, dropped })
}

/// Packs readings into a linfa dataset with one record row per reading.
pub fn to_dataset(readings: &[LabelledReading]) -> Result<Dataset<f64, String, Ix1>> {
    let flat: Vec<f64> = readings
        .iter()
        .flat_map(|r| r.reading.to_features())
        .collect();
    let records = Array2::from_shape_vec((readings.len(), N_FEATURES), flat)?;
    let targets = Array1::from_iter(readings.iter().map(|r| r.label.clone()));

    Ok(Dataset::new(records, targets).with_feature_names(FEATURE_NAMES.to_vec()))
}
