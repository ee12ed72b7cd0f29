use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::config::ConfigError;

use super::{Branch, Operation};

/// Weighted read/write dispatcher.
///
/// Each call picks the branch with probability proportional to its weight,
/// then one of the branch's available operations uniformly.
#[derive(Debug)]
pub struct WorkloadSelector {
    read_weight: u64,
    write_weight: u64,
    reads: Vec<Operation>,
    writes: Vec<Operation>,
    rng: StdRng,
}

impl WorkloadSelector {
    /// `available` filters out operations whose feeders have nothing to offer.
    /// A branch left without operations gets an effective weight of zero.
    pub fn new<F>(
        read_ratio: u32,
        write_ratio: u32,
        seed: Option<u64>,
        available: F,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(Operation) -> bool,
    {
        let reads: Vec<Operation> =
            Operation::READS.into_iter().filter(|op| available(*op)).collect();
        let writes: Vec<Operation> =
            Operation::WRITES.into_iter().filter(|op| available(*op)).collect();

        let read_weight = if reads.is_empty() { 0 } else { u64::from(read_ratio) };
        let write_weight = if writes.is_empty() { 0 } else { u64::from(write_ratio) };

        if read_ratio > 0 && reads.is_empty() {
            warn!("Read branch has no operations with data, disabling it");
        }
        if write_ratio > 0 && writes.is_empty() {
            warn!("Write branch has no operations with data, disabling it");
        }
        if read_weight + write_weight == 0 {
            return Err(ConfigError::Invalid(
                "no operation can run: both branches have zero weight or no data".into(),
            ));
        }

        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        debug!(
            read_weight,
            write_weight,
            reads = reads.len(),
            writes = writes.len(),
            ?seed,
            "Workload selector ready"
        );

        Ok(Self {
            read_weight,
            write_weight,
            reads,
            writes,
            rng,
        })
    }

    /// Selector over all twelve operations.
    pub fn with_all_operations(
        read_ratio: u32,
        write_ratio: u32,
        seed: Option<u64>,
    ) -> Result<Self, ConfigError> {
        Self::new(read_ratio, write_ratio, seed, |_| true)
    }

    pub fn total_weight(&self) -> u64 {
        self.read_weight + self.write_weight
    }

    pub fn next_branch(&mut self) -> Branch {
        if self.rng.gen_range(0..self.total_weight()) < self.read_weight {
            Branch::Read
        } else {
            Branch::Write
        }
    }

    pub fn next_operation(&mut self) -> Operation {
        let ops = match self.next_branch() {
            Branch::Read => &self.reads,
            Branch::Write => &self.writes,
        };
        ops[self.rng.gen_range(0..ops.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn split(read: u32, write: u32, iterations: usize, seed: u64) -> (usize, usize) {
        let mut selector = WorkloadSelector::with_all_operations(read, write, Some(seed)).unwrap();
        let mut reads = 0;
        let mut writes = 0;
        for _ in 0..iterations {
            match selector.next_operation().branch() {
                Branch::Read => reads += 1,
                Branch::Write => writes += 1,
            }
        }
        (reads, writes)
    }

    #[test]
    fn test_seventy_thirty_over_thousand_iterations() {
        let (reads, writes) = split(70, 30, 1000, 7);
        assert_eq!(reads + writes, 1000);
        // Binomial std-dev is ~14.5; allow > 4 sigma
        assert!((640..=760).contains(&reads), "reads = {}", reads);
        assert!((240..=360).contains(&writes), "writes = {}", writes);
    }

    #[test]
    fn test_split_converges_for_various_ratios() {
        for (read, write) in [(1, 1), (90, 10), (1, 3), (5, 95), (100, 0), (0, 100)] {
            let n = 20_000;
            let (reads, _) = split(read, write, n, 42);
            let expected = read as f64 / (read + write) as f64;
            let observed = reads as f64 / n as f64;
            assert!(
                (observed - expected).abs() < 0.02,
                "ratio {}:{} observed {:.3} expected {:.3}",
                read,
                write,
                observed,
                expected
            );
        }
    }

    #[test]
    fn test_operations_uniform_within_branch() {
        let mut selector = WorkloadSelector::with_all_operations(1, 0, Some(3)).unwrap();
        let mut counts: HashMap<Operation, usize> = HashMap::new();
        for _ in 0..9_000 {
            *counts.entry(selector.next_operation()).or_default() += 1;
        }
        assert_eq!(counts.len(), 9);
        assert!(counts.values().all(|&c| (800..=1200).contains(&c)), "{:?}", counts);
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = WorkloadSelector::with_all_operations(60, 40, Some(99)).unwrap();
        let mut b = WorkloadSelector::with_all_operations(60, 40, Some(99)).unwrap();
        let seq_a: Vec<_> = (0..100).map(|_| a.next_operation()).collect();
        let seq_b: Vec<_> = (0..100).map(|_| b.next_operation()).collect();
        assert_eq!(seq_a, seq_b);
    }

    #[test]
    fn test_unavailable_operations_never_chosen() {
        let mut selector = WorkloadSelector::new(50, 50, Some(1), |op| {
            !matches!(op, Operation::FetchView | Operation::UpdateViewProperties)
        })
        .unwrap();
        for _ in 0..2_000 {
            let op = selector.next_operation();
            assert_ne!(op, Operation::FetchView);
            assert_ne!(op, Operation::UpdateViewProperties);
        }
    }

    #[test]
    fn test_branch_without_data_is_disabled() {
        let mut selector =
            WorkloadSelector::new(50, 50, Some(1), |op| op.branch() == Branch::Read).unwrap();
        assert_eq!(selector.total_weight(), 50);
        for _ in 0..500 {
            assert_eq!(selector.next_branch(), Branch::Read);
        }
    }

    #[test]
    fn test_zero_weights_rejected() {
        assert!(WorkloadSelector::with_all_operations(0, 0, None).is_err());
        assert!(WorkloadSelector::new(0, 10, None, |op| op.branch() == Branch::Read).is_err());
    }
}
