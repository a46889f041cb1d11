//! Stress and model-checking runs.
//!
//! Every run mirrors the map into a `BTreeMap` and compares the two after
//! each operation, so a divergence is reported at the step that caused it.

use crate::generators::TrieOperation;
use pmtrie_core::{CoreResult, RadixTreeMap};
use pmtrie_pool::{DurablePool, Handle};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Operations whose outcome matched the model.
    pub successful_ops: usize,
    /// Operations that failed or diverged from the model.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
    /// First divergence from the model, if any.
    pub first_failure: Option<String>,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
            first_failure: None,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
        if let Some(failure) = &self.first_failure {
            println!("First failure: {}", failure);
        }
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of operations to perform.
    pub operations: usize,
    /// Number of distinct keys drawn from.
    pub key_count: usize,
    /// Maximum key length in bytes.
    pub max_key_len: usize,
    /// Seed of the random generator.
    pub seed: u64,
    /// Run a full structural verification every this many operations
    /// (0 = only at the end).
    pub verify_every: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 10_000,
            key_count: 500,
            max_key_len: 12,
            seed: 0x5eed,
            verify_every: 1_000,
        }
    }
}

/// A map paired with a `BTreeMap` model of its contents.
pub struct ModelChecker<'m, P: DurablePool> {
    map: &'m RadixTreeMap<P>,
    model: BTreeMap<Vec<u8>, Handle>,
}

impl<'m, P: DurablePool> ModelChecker<'m, P> {
    /// Starts checking `map`, which must be empty.
    pub fn new(map: &'m RadixTreeMap<P>) -> Self {
        Self {
            map,
            model: BTreeMap::new(),
        }
    }

    /// Returns the model contents.
    pub fn model(&self) -> &BTreeMap<Vec<u8>, Handle> {
        &self.model
    }

    /// Applies `op` to both map and model and compares the outcomes.
    pub fn apply(&mut self, op: &TrieOperation) -> Result<(), String> {
        match op {
            TrieOperation::Insert { key, value } => {
                self.map.insert(key, *value).map_err(|e| e.to_string())?;
                self.model.insert(key.clone(), *value);
                self.expect_get(key)
            }
            TrieOperation::Remove { key } => {
                let got = self.map.remove(key).map_err(|e| e.to_string())?;
                let want = self.model.remove(key);
                if got != want {
                    return Err(format!("remove {key:?}: got {got:?}, want {want:?}"));
                }
                self.expect_get(key)
            }
            TrieOperation::Get { key } => self.expect_get(key),
        }
    }

    fn expect_get(&self, key: &[u8]) -> Result<(), String> {
        let got = self.map.get(key).map_err(|e| e.to_string())?;
        let want = self.model.get(key).copied();
        if got != want {
            return Err(format!("get {key:?}: got {got:?}, want {want:?}"));
        }
        Ok(())
    }

    /// Compares the full contents and verifies the tree structure.
    pub fn check_contents(&self) -> Result<(), String> {
        let mut entries = self.map.entries().map_err(|e| e.to_string())?;
        entries.sort();
        let expected: Vec<_> = self.model.iter().map(|(k, v)| (k.clone(), *v)).collect();
        if entries != expected {
            return Err(format!(
                "contents diverged: map has {} entries, model has {}",
                entries.len(),
                expected.len()
            ));
        }
        self.map.verify().map_err(|e| e.to_string())
    }
}

/// Applies `ops` in order, checking every step against the model.
pub fn run_operations<P: DurablePool>(
    map: &RadixTreeMap<P>,
    ops: &[TrieOperation],
) -> Result<(), String> {
    let mut checker = ModelChecker::new(map);
    for (i, op) in ops.iter().enumerate() {
        checker.apply(op).map_err(|e| format!("op {i}: {e}"))?;
    }
    checker.check_contents()
}

fn random_key(rng: &mut StdRng, config: &StressConfig) -> Vec<u8> {
    // Derive the key from an index so the key space stays bounded.
    let index = rng.gen_range(0..config.key_count.max(1));
    let mut key_rng = StdRng::seed_from_u64(config.seed ^ index as u64);
    let len = key_rng.gen_range(0..=config.max_key_len);
    (0..len).map(|_| b"abcd"[key_rng.gen_range(0..4)]).collect()
}

/// Runs a random mix of inserts, removals and lookups against the model.
pub fn stress_random_operations<P: DurablePool>(
    map: &RadixTreeMap<P>,
    config: &StressConfig,
) -> StressTestResult {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut checker = ModelChecker::new(map);
    let mut successful = 0usize;
    let mut failed = 0usize;
    let mut first_failure = None;

    let start = Instant::now();
    for i in 0..config.operations {
        let key = random_key(&mut rng, config);
        let op = match rng.gen_range(0..10) {
            0..=4 => TrieOperation::Insert {
                key,
                value: Handle::from_raw(rng.gen_range(1..u64::MAX)),
            },
            5..=7 => TrieOperation::Remove { key },
            _ => TrieOperation::Get { key },
        };

        let mut outcome = checker.apply(&op);
        if outcome.is_ok() && config.verify_every > 0 && (i + 1) % config.verify_every == 0 {
            outcome = checker.check_contents();
        }
        match outcome {
            Ok(()) => successful += 1,
            Err(e) => {
                failed += 1;
                first_failure.get_or_insert_with(|| format!("op {i}: {e}"));
            }
        }
    }
    if let Err(e) = checker.check_contents() {
        failed += 1;
        first_failure.get_or_insert(e);
    }

    let mut result = StressTestResult::new(successful, failed, start.elapsed());
    result.first_failure = first_failure;
    result
}

/// Inserts `count` keys, removes them all, and checks the map is empty.
pub fn stress_fill_and_drain<P: DurablePool>(
    map: &RadixTreeMap<P>,
    count: usize,
) -> CoreResult<StressTestResult> {
    let start = Instant::now();
    let keys: Vec<Vec<u8>> = (0..count)
        .map(|i| format!("{:x}", i.wrapping_mul(2_654_435_761)).into_bytes())
        .collect();

    for (i, key) in keys.iter().enumerate() {
        map.insert(key, Handle::from_raw(i as u64 + 1))?;
    }
    let mut successful = 0;
    let mut failed = 0;
    for (i, key) in keys.iter().enumerate() {
        if map.remove(key)? == Some(Handle::from_raw(i as u64 + 1)) {
            successful += 1;
        } else {
            failed += 1;
        }
    }
    if !map.is_empty()? {
        failed += 1;
    }
    Ok(StressTestResult::new(successful, failed, start.elapsed()))
}
