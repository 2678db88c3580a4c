//! Distance-weighted k-nearest-neighbours classifier and its on-disk artifact.

use crate::error::{Error, Result};
use crate::reading::{FEATURE_NAMES, N_FEATURES};
use linfa::Dataset;
use linfa_nn::distance::{Distance, L2Dist};
use linfa_nn::{CommonNearestNeighbour, NearestNeighbour, NearestNeighbourIndex};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Ix1};
use rmp_serde::{decode::from_read, encode::write_named};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Bumped whenever the serialized layout of [`IrrigationModel`] changes.
pub const FORMAT_VERSION: u32 = 1;

/// Index used for every neighbour lookup, single or batched.
const SEARCH: CommonNearestNeighbour = CommonNearestNeighbour::KdTree;

// Widens the k-th distance so that every point tied with it is collected.
const TIE_SLACK: f64 = 1e-9;

/// How each neighbour's vote is weighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Weighting {
    /// Every neighbour counts once.
    Uniform,
    /// Neighbours count by inverse distance; exact matches override all others.
    #[default]
    Distance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnnParams {
    pub n_neighbors: usize,
    pub weighting: Weighting,
}

impl Default for KnnParams {
    fn default() -> Self {
        KnnParams {
            n_neighbors: 5,
            weighting: Weighting::Distance,
        }
    }
}

/// Fitted irrigation classifier.
///
/// Holds the raw training matrix and labels. Features are not scaled, so
/// distances are dominated by the columns with the largest magnitudes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrrigationModel {
    format_version: u32,
    schema: Vec<String>,
    params: KnnParams,
    records: Array2<f64>,
    labels: Vec<String>,
}

impl IrrigationModel {
    /// Stores the training set for neighbour lookups.
    pub fn fit(params: KnnParams, dataset: &Dataset<f64, String, Ix1>) -> Result<Self> {
        if params.n_neighbors == 0 {
            return Err(Error::InvalidNeighbors);
        }
        let records = dataset.records().clone();
        if records.nrows() == 0 {
            return Err(Error::EmptyTrainingSet);
        }
        if records.ncols() != N_FEATURES {
            return Err(Error::SchemaMismatch {
                expected: schema(),
                found: dataset.feature_names(),
            });
        }

        Ok(IrrigationModel {
            format_version: FORMAT_VERSION,
            schema: schema(),
            params,
            records,
            labels: dataset.targets().to_vec(),
        })
    }

    /// Neighbour count and weighting the model was fitted with.
    pub fn params(&self) -> KnnParams {
        self.params
    }

    /// Number of stored training samples.
    pub fn n_samples(&self) -> usize {
        self.labels.len()
    }

    /// Every label the model can return.
    pub fn labels(&self) -> BTreeSet<&str> {
        self.labels.iter().map(String::as_str).collect()
    }

    /// Number of stored training samples per label.
    pub fn label_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for label in &self.labels {
            *counts.entry(label.as_str()).or_insert(0) += 1;
        }
        counts
    }

    /// Predicts the irrigation label for one feature vector.
    pub fn predict(&self, features: &[f64; N_FEATURES]) -> Result<String> {
        let index = SEARCH.from_batch(&self.records, L2Dist)?;
        let query = ArrayView1::from(&features[..]);
        self.vote(index.as_ref(), query).map(str::to_string)
    }

    /// Predicts every row of `features` against one shared index.
    pub fn predict_batch(&self, features: &[[f64; N_FEATURES]]) -> Result<Vec<String>> {
        let flat: Vec<f64> = features.iter().flatten().copied().collect();
        let rows = Array2::from_shape_vec((features.len(), N_FEATURES), flat)?;
        self.predict_records(rows.view())
    }

    fn predict_records(&self, rows: ArrayView2<f64>) -> Result<Vec<String>> {
        let index = SEARCH.from_batch(&self.records, L2Dist)?;
        rows.outer_iter()
            .map(|row| self.vote(index.as_ref(), row).map(str::to_string))
            .collect()
    }

    /// Fraction of `dataset` rows whose label is predicted correctly.
    pub fn score(&self, dataset: &Dataset<f64, String, Ix1>) -> Result<f64> {
        let truth: &Array1<String> = dataset.targets();
        if truth.is_empty() {
            return Err(Error::EmptyTestSet);
        }

        let predicted = self.predict_records(dataset.records().view())?;
        let correct = predicted
            .iter()
            .zip(truth.iter())
            .filter(|(p, t)| p == t)
            .count();

        Ok(correct as f64 / truth.len() as f64)
    }

    /// The `k` closest stored samples as `(index, distance)`, ordered by
    /// distance and then by sample index.
    fn neighbours(
        &self,
        index: &dyn NearestNeighbourIndex<f64>,
        query: ArrayView1<f64>,
    ) -> Result<Vec<(usize, f64)>> {
        let k = self.params.n_neighbors.min(self.n_samples());
        let kth = index
            .k_nearest(query, k)?
            .into_iter()
            .map(|(point, _)| L2Dist.distance(query, point))
            .fold(0.0, f64::max);

        // Which of several equidistant points k_nearest keeps depends on the
        // index layout, so gather all of them and pick by sample index.
        let mut candidates: Vec<(usize, f64)> = index
            .within_range(query, kth * (1.0 + TIE_SLACK) + TIE_SLACK)?
            .into_iter()
            .map(|(point, idx)| (idx, L2Dist.distance(query, point)))
            .collect();
        candidates.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        candidates.truncate(k);
        Ok(candidates)
    }

    fn vote<'a>(
        &'a self,
        index: &dyn NearestNeighbourIndex<f64>,
        query: ArrayView1<f64>,
    ) -> Result<&'a str> {
        let neighbours = self.neighbours(index, query)?;

        let exact = self.params.weighting == Weighting::Distance
            && neighbours.iter().any(|(_, d)| *d == 0.0);

        let mut scores: BTreeMap<&str, f64> = BTreeMap::new();
        for (idx, dist) in neighbours {
            let weight = match self.params.weighting {
                Weighting::Uniform => 1.0,
                Weighting::Distance if exact => {
                    if dist != 0.0 {
                        continue;
                    }
                    1.0
                }
                Weighting::Distance => 1.0 / dist,
            };
            *scores.entry(self.labels[idx].as_str()).or_insert(0.0) += weight;
        }

        // Labels iterate in order and only a strictly higher score replaces the
        // leader, so ties resolve to the smallest label.
        let mut best: Option<(&str, f64)> = None;
        for (label, score) in scores {
            if best.is_none_or(|(_, top)| score > top) {
                best = Some((label, score));
            }
        }
        best.map(|(label, _)| label)
            .ok_or_else(|| Error::Corrupt("no neighbours found".to_string()))
    }

    /// Prints the label distribution of the stored training set.
    pub fn show_summary(&self) {
        println!(
            "Model: k={}, weighting={:?}, {} samples",
            self.params.n_neighbors,
            self.params.weighting,
            self.n_samples()
        );
        for (label, count) in self.label_counts() {
            let share = count as f64 / self.n_samples() as f64;
            println!("{:>25} | {:>6} ({:.1}%)", label, count, share * 100.0);
        }
    }

    /// Saves the model to a binary `.msgpack` file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| Error::io(path, e))?;
        let mut writer = BufWriter::new(file);
        write_named(&mut writer, self)?;
        writer.flush().map_err(|e| Error::io(path, e))
    }

    /// Loads a model from a binary `.msgpack` file and checks that it was
    /// trained on the current feature layout.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let reader = BufReader::new(file);
        let model: IrrigationModel = from_read(reader)?;
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<()> {
        if self.format_version != FORMAT_VERSION {
            return Err(Error::UnsupportedVersion {
                expected: FORMAT_VERSION,
                found: self.format_version,
            });
        }
        if self.schema != schema() {
            return Err(Error::SchemaMismatch {
                expected: schema(),
                found: self.schema.clone(),
            });
        }
        if self.records.ncols() != N_FEATURES || self.records.nrows() != self.labels.len() {
            return Err(Error::Corrupt(format!(
                "{}x{} records for {} labels",
                self.records.nrows(),
                self.records.ncols(),
                self.labels.len()
            )));
        }
        if self.labels.is_empty() {
            return Err(Error::EmptyTrainingSet);
        }
        if self.params.n_neighbors == 0 {
            return Err(Error::InvalidNeighbors);
        }
        Ok(())
    }
}

fn schema() -> Vec<String> {
    FEATURE_NAMES.iter().map(|s| s.to_string()).collect()
}
