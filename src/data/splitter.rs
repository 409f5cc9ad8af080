// ============================================================
// Train/Validation Splitter
// ============================================================
// Two strategies, mirroring how a dataset usually arrives:
//
//   ByColumn — the dataset already carries a validity flag
//              column; rows with a truthy flag become the
//              validation set. Deterministic.
//   Random   — shuffle with a SEEDED RNG and cut off a
//              fraction. The same seed always produces the
//              same split, so runs are reproducible.
//
// When the caller supplies no strategy, it is inferred: a
// dataset carrying the validity column splits on it, anything
// else splits randomly.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::domain::record::{column_present, Record};

/// Conventional name of the validity flag column.
pub const VALID_COLUMN: &str = "is_valid";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SplitStrategy {
    /// Rows whose named flag is true go to validation.
    ByColumn(String),
    /// Seeded shuffle, then `valid_fraction` goes to validation.
    Random { valid_fraction: f64, seed: u64 },
}

impl SplitStrategy {
    pub fn random(valid_fraction: f64, seed: u64) -> Self {
        SplitStrategy::Random { valid_fraction, seed }
    }
}

/// Infer the strategy from the data itself.
pub fn infer_split(records: &[Record], valid_fraction: f64, seed: u64) -> SplitStrategy {
    if column_present(records, VALID_COLUMN) {
        SplitStrategy::ByColumn(VALID_COLUMN.to_string())
    } else {
        SplitStrategy::Random { valid_fraction, seed }
    }
}

/// Split records into (train, validation) per the strategy.
pub fn split_records(records: Vec<Record>, strategy: &SplitStrategy) -> (Vec<Record>, Vec<Record>) {
    match strategy {
        SplitStrategy::ByColumn(column) => {
            let mut train = Vec::new();
            let mut valid = Vec::new();
            for record in records {
                // absent or unparseable flag counts as training
                if record.flag(column).unwrap_or(false) {
                    valid.push(record);
                } else {
                    train.push(record);
                }
            }
            tracing::debug!(
                "Split by column '{}': {} train, {} validation",
                column,
                train.len(),
                valid.len()
            );
            (train, valid)
        }
        SplitStrategy::Random { valid_fraction, seed } => {
            let mut records = records;
            let mut rng = StdRng::seed_from_u64(*seed);
            records.shuffle(&mut rng);

            let total = records.len();
            let valid_count = ((total as f64) * valid_fraction).round() as usize;
            let valid = records.split_off(total - valid_count.min(total));

            tracing::debug!(
                "Random split (seed {}): {} train, {} validation",
                seed,
                records.len(),
                valid.len()
            );
            (records, valid)
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| Record::from_pairs([("text", format!("row {i}"))]))
            .collect()
    }

    #[test]
    fn test_column_split_honors_flag() {
        let mut records = numbered(4);
        records[1].insert(VALID_COLUMN, true);
        records[3].insert(VALID_COLUMN, "true");

        let strategy = infer_split(&records, 0.2, 42);
        assert!(matches!(strategy, SplitStrategy::ByColumn(_)));

        let (train, valid) = split_records(records, &strategy);
        assert_eq!(train.len(), 2);
        assert_eq!(valid.len(), 2);
        assert_eq!(valid[0].text("text").as_deref(), Some("row 1"));
    }

    #[test]
    fn test_random_split_sizes() {
        let (train, valid) = split_records(numbered(100), &SplitStrategy::random(0.2, 7));
        assert_eq!(train.len(), 80);
        assert_eq!(valid.len(), 20);
    }

    #[test]
    fn test_random_split_is_reproducible_under_fixed_seed() {
        let order = |seed| {
            let (train, valid) = split_records(numbered(50), &SplitStrategy::random(0.3, seed));
            (
                train.iter().map(|r| r.text("text").unwrap()).collect::<Vec<_>>(),
                valid.iter().map(|r| r.text("text").unwrap()).collect::<Vec<_>>(),
            )
        };
        assert_eq!(order(42), order(42));
        assert_ne!(order(42), order(43));
    }

    #[test]
    fn test_no_rows_lost() {
        let (train, valid) = split_records(numbered(13), &SplitStrategy::random(0.25, 1));
        assert_eq!(train.len() + valid.len(), 13);
    }

    #[test]
    fn test_infer_falls_back_to_random() {
        let records = numbered(5);
        assert!(matches!(
            infer_split(&records, 0.2, 42),
            SplitStrategy::Random { .. }
        ));
    }

    #[test]
    fn test_empty_dataset() {
        let (train, valid) = split_records(Vec::new(), &SplitStrategy::random(0.2, 42));
        assert!(train.is_empty());
        assert!(valid.is_empty());
    }
}
