//! Failure atomicity and crash recovery testing.
//!
//! This module provides utilities for checking that a failed or
//! interrupted map mutation leaves the pool exactly as it was.
//!
//! ## Test Strategy
//!
//! 1. **Allocation failure** - fail every allocation the operation makes, one at a time
//! 2. **Snapshot failure** - fail every undo-log snapshot, one at a time
//! 3. **Commit failure** - fail the final commit
//! 4. **Crash mid-transaction** - lose power before the commit
//! 5. **Crash after commit** - committed data must survive
//!
//! ## Usage
//!
//! ```rust
//! use pmtrie_pool::Handle;
//! use pmtrie_testkit::crash::CrashRecoveryHarness;
//!
//! let mut harness = CrashRecoveryHarness::new([("ab", 1), ("ac", 2)]);
//! let result = harness.test_alloc_failures("split under a branch", |map| {
//!     map.insert(b"abd", Handle::from_raw(3))
//! });
//! assert!(result.passed, "{result:?}");
//! ```

use crate::fault::FaultyPool;
use pmtrie_core::{CoreResult, RadixTreeMap};
use pmtrie_pool::{DurablePool, Handle, InMemoryPool};
use std::sync::Arc;
use tracing::debug;

/// Pool type driven by the harness.
pub type HarnessPool = FaultyPool<InMemoryPool>;

/// Map type driven by the harness.
pub type HarnessMap = RadixTreeMap<HarnessPool>;

/// Upper bound on injected faults per scenario.
const MAX_FAULTS: usize = 256;

/// Result of a crash recovery test.
#[derive(Debug, Clone)]
pub struct CrashRecoveryResult {
    /// Whether the test passed.
    pub passed: bool,
    /// Description of what was tested.
    pub description: String,
    /// Number of fault points exercised.
    pub cases: usize,
    /// Any error message.
    pub error: Option<String>,
}

impl CrashRecoveryResult {
    /// Creates a passing result.
    pub fn pass(description: &str, cases: usize) -> Self {
        Self {
            passed: true,
            description: description.to_string(),
            cases,
            error: None,
        }
    }

    /// Creates a failing result.
    pub fn fail(description: &str, cases: usize, error: &str) -> Self {
        Self {
            passed: false,
            description: description.to_string(),
            cases,
            error: Some(error.to_string()),
        }
    }
}

/// What the pool looked like before an operation ran.
#[derive(Debug, PartialEq, Eq)]
struct Baseline {
    entries: Vec<(Vec<u8>, Handle)>,
    objects: usize,
    used_bytes: usize,
}

impl Baseline {
    fn capture(map: &HarnessMap) -> CoreResult<Self> {
        let inner = map.pool().inner();
        Ok(Self {
            entries: map.entries()?,
            objects: inner.object_count(),
            used_bytes: inner.used_bytes(),
        })
    }
}

/// Test harness for failure atomicity and crash scenarios.
///
/// Every scenario starts from a fresh pool holding the seed entries.
pub struct CrashRecoveryHarness {
    seed: Vec<(Vec<u8>, Handle)>,
    /// Results of crash recovery tests.
    pub results: Vec<CrashRecoveryResult>,
}

impl CrashRecoveryHarness {
    /// Creates a harness whose scenarios start from `seed`.
    pub fn new<K, I>(seed: I) -> Self
    where
        K: AsRef<[u8]>,
        I: IntoIterator<Item = (K, u64)>,
    {
        Self {
            seed: seed
                .into_iter()
                .map(|(key, value)| (key.as_ref().to_vec(), Handle::from_raw(value)))
                .collect(),
            results: Vec::new(),
        }
    }

    /// Builds a fresh pool and a map holding the seed entries.
    pub fn build(&self) -> CoreResult<(Arc<HarnessPool>, HarnessMap)> {
        let pool = Arc::new(FaultyPool::new(InMemoryPool::new()));
        let map = RadixTreeMap::create(Arc::clone(&pool))?;
        for (key, value) in &self.seed {
            map.insert(key, *value)?;
        }
        Ok((pool, map))
    }

    /// Returns true if every recorded scenario passed.
    pub fn all_passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }

    fn record(&mut self, result: CrashRecoveryResult) -> CrashRecoveryResult {
        debug!(
            description = %result.description,
            passed = result.passed,
            cases = result.cases,
            "crash scenario finished"
        );
        self.results.push(result.clone());
        result
    }

    /// Checks that `map` still matches `before` after a failed operation.
    fn check_unchanged(map: &HarnessMap, before: &Baseline) -> Result<(), String> {
        let pool = map.pool();
        if pool.tx_depth() != 0 {
            return Err(format!("transaction left open at depth {}", pool.tx_depth()));
        }
        let after = Baseline::capture(map).map_err(|e| e.to_string())?;
        if &after != before {
            return Err(format!("state changed: before {before:?}, after {after:?}"));
        }
        map.verify().map_err(|e| e.to_string())
    }

    /// Fails each allocation `op` makes in turn and checks that every
    /// failure leaves the map unchanged.
    ///
    /// The scenario ends once `op` runs to completion without reaching
    /// the armed fault.
    pub fn test_alloc_failures<F>(&mut self, description: &str, op: F) -> CrashRecoveryResult
    where
        F: Fn(&HarnessMap) -> CoreResult<()>,
    {
        let result = self.run_faults(description, &op, |pool, n| pool.fail_alloc_after(n));
        self.record(result)
    }

    /// Fails each snapshot `op` takes in turn and checks that every
    /// failure leaves the map unchanged.
    pub fn test_snapshot_failures<F>(&mut self, description: &str, op: F) -> CrashRecoveryResult
    where
        F: Fn(&HarnessMap) -> CoreResult<()>,
    {
        let result = self.run_faults(description, &op, |pool, n| pool.fail_snapshot_after(n));
        self.record(result)
    }

    fn run_faults<F, A>(&self, description: &str, op: &F, arm: A) -> CrashRecoveryResult
    where
        F: Fn(&HarnessMap) -> CoreResult<()>,
        A: Fn(&HarnessPool, usize),
    {
        for n in 0..MAX_FAULTS {
            let (pool, map) = match self.build() {
                Ok(built) => built,
                Err(e) => return CrashRecoveryResult::fail(description, n, &e.to_string()),
            };
            let before = match Baseline::capture(&map) {
                Ok(before) => before,
                Err(e) => return CrashRecoveryResult::fail(description, n, &e.to_string()),
            };

            arm(&pool, n);
            let outcome = op(&map);
            let injected = pool.fault_count() > 0;
            pool.reset();

            match (outcome, injected) {
                (Ok(()), false) => return CrashRecoveryResult::pass(description, n),
                (Ok(()), true) => {
                    return CrashRecoveryResult::fail(
                        description,
                        n,
                        &format!("operation succeeded despite fault {n}"),
                    )
                }
                (Err(e), false) => {
                    return CrashRecoveryResult::fail(description, n, &e.to_string())
                }
                (Err(_), true) => {
                    if let Err(e) = Self::check_unchanged(&map, &before) {
                        return CrashRecoveryResult::fail(
                            description,
                            n,
                            &format!("fault {n}: {e}"),
                        );
                    }
                }
            }
        }
        CrashRecoveryResult::fail(description, MAX_FAULTS, "operation never completed")
    }

    /// Fails the commit of `op` and checks that nothing of it survives.
    pub fn test_commit_failure<F>(&mut self, description: &str, op: F) -> CrashRecoveryResult
    where
        F: Fn(&HarnessMap) -> CoreResult<()>,
    {
        let result = (|| {
            let (pool, map) = self.build().map_err(|e| e.to_string())?;
            let before = Baseline::capture(&map).map_err(|e| e.to_string())?;

            pool.set_fail_on_commit(true);
            let outcome = op(&map);
            pool.reset();

            if outcome.is_ok() {
                return Err("operation succeeded despite failed commit".to_string());
            }
            Self::check_unchanged(&map, &before)
        })();

        let result = match result {
            Ok(()) => CrashRecoveryResult::pass(description, 1),
            Err(e) => CrashRecoveryResult::fail(description, 1, &e),
        };
        self.record(result)
    }

    /// Runs `op` inside an outer transaction, crashes before the commit,
    /// and checks that recovery restores the previous tree.
    pub fn test_crash_before_commit<F>(&mut self, description: &str, op: F) -> CrashRecoveryResult
    where
        F: Fn(&HarnessMap) -> CoreResult<()>,
    {
        let result = (|| {
            let (pool, map) = self.build().map_err(|e| e.to_string())?;
            let before = Baseline::capture(&map).map_err(|e| e.to_string())?;

            pool.begin().map_err(|e| e.to_string())?;
            op(&map).map_err(|e| e.to_string())?;
            if !pool.inner().simulate_crash() {
                return Err("no transaction was open at the crash".to_string());
            }

            let recovered =
                RadixTreeMap::open(Arc::clone(&pool), map.handle()).map_err(|e| e.to_string())?;
            Self::check_unchanged(&recovered, &before)
        })();

        let result = match result {
            Ok(()) => CrashRecoveryResult::pass(description, 1),
            Err(e) => CrashRecoveryResult::fail(description, 1, &e),
        };
        self.record(result)
    }

    /// Runs `op` to completion, crashes, and checks that the committed
    /// result survives recovery.
    pub fn test_committed_survives<F>(&mut self, description: &str, op: F) -> CrashRecoveryResult
    where
        F: Fn(&HarnessMap) -> CoreResult<()>,
    {
        let result = (|| {
            let (pool, map) = self.build().map_err(|e| e.to_string())?;
            op(&map).map_err(|e| e.to_string())?;
            let committed = Baseline::capture(&map).map_err(|e| e.to_string())?;

            if pool.inner().simulate_crash() {
                return Err("transaction left open after commit".to_string());
            }
            let recovered =
                RadixTreeMap::open(Arc::clone(&pool), map.handle()).map_err(|e| e.to_string())?;
            Self::check_unchanged(&recovered, &committed)
        })();

        let result = match result {
            Ok(()) => CrashRecoveryResult::pass(description, 1),
            Err(e) => CrashRecoveryResult::fail(description, 1, &e),
        };
        self.record(result)
    }

    /// Runs every scenario against `op`.
    pub fn run_all<F>(&mut self, description: &str, op: F) -> bool
    where
        F: Fn(&HarnessMap) -> CoreResult<()>,
    {
        self.test_alloc_failures(&format!("{description}: alloc failures"), &op);
        self.test_snapshot_failures(&format!("{description}: snapshot failures"), &op);
        self.test_commit_failure(&format!("{description}: commit failure"), &op);
        self.test_crash_before_commit(&format!("{description}: crash before commit"), &op);
        self.test_committed_survives(&format!("{description}: committed survives"), &op);
        self.all_passed()
    }
}
