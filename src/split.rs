//! Seeded train/test partitioning.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Fraction of rows withheld for the holdout set.
pub const DEFAULT_TEST_RATIO: f64 = 0.2;
/// Seed that makes repeated training runs reproducible.
pub const DEFAULT_SEED: u64 = 42;

/// A helper type for holding train/test splits.
#[derive(Debug)]
pub struct DatasetSplit<T> {
    pub train: Vec<T>,
    pub test: Vec<T>,
}

/// Shuffles `data` with a seeded RNG and withholds `ceil(len * test_ratio)` rows
/// as the test set.
///
/// The same input and seed always produce the same partition.
pub fn train_test_split<T: Clone>(data: &[T], test_ratio: f64, seed: u64) -> DatasetSplit<T> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = data.to_vec();
    data.shuffle(&mut rng);

    let test_size = ((data.len() as f64) * test_ratio.clamp(0.0, 1.0)).ceil() as usize;
    let train = data.split_off(test_size);

    DatasetSplit { train, test: data }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sizes() {
        let data: Vec<u32> = (0..10).collect();
        let split = train_test_split(&data, 0.2, DEFAULT_SEED);
        assert_eq!(split.test.len(), 2);
        assert_eq!(split.train.len(), 8);

        // Partial rows round up into the test set.
        let split = train_test_split(&data[..7], 0.2, DEFAULT_SEED);
        assert_eq!(split.test.len(), 2);
        assert_eq!(split.train.len(), 5);
    }

    #[test]
    fn test_split_is_a_partition() {
        let data: Vec<u32> = (0..50).collect();
        let split = train_test_split(&data, 0.2, 7);

        let mut all: Vec<u32> = split.train.iter().chain(&split.test).copied().collect();
        all.sort();
        assert_eq!(all, data);
    }

    #[test]
    fn test_split_is_reproducible() {
        let data: Vec<u32> = (0..100).collect();
        let a = train_test_split(&data, 0.2, DEFAULT_SEED);
        let b = train_test_split(&data, 0.2, DEFAULT_SEED);
        assert_eq!(a.train, b.train);
        assert_eq!(a.test, b.test);

        let c = train_test_split(&data, 0.2, DEFAULT_SEED + 1);
        assert_ne!(a.test, c.test);
    }

    #[test]
    fn test_split_single_row_goes_to_test() {
        let split = train_test_split(&["only"], 0.2, DEFAULT_SEED);
        assert_eq!(split.test, vec!["only"]);
        assert!(split.train.is_empty());
    }
}
