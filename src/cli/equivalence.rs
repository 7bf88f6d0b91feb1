//! Randomized equivalence check of `IndexMap<i32, i32>` against `BTreeMap`
//!
//! Each cycle grows both containers to `max` elements with random keys,
//! compares every read operation, shrinks them to `min` with random erases,
//! compares again, then closes and reopens the index and checks it survived.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound;
use std::path::PathBuf;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use super::errors::{CliError, CliResult};
use crate::index::{Cursor, IndexConfig, IndexMap, MapKind, Unique};
use crate::storage::OpenMode;

type Map = IndexMap<i32, i32>;
type MapCursor<'a> = Cursor<'a, MapKind<i32, i32, Unique>>;

/// Parameters of one equivalence run
#[derive(Debug, Clone)]
pub struct EquivalenceOptions {
    pub dir: PathBuf,
    pub max: u32,
    pub min: u32,
    pub low: i32,
    /// 0 selects `low + 2 * max`
    pub high: i32,
    pub cycles: u32,
    pub seed: u64,
    pub node_size: u32,
}

impl EquivalenceOptions {
    /// Returns the inclusive key range, checking it can hold `max` keys.
    fn key_range(&self) -> CliResult<(i32, i32)> {
        if self.min >= self.max {
            return Err(CliError::invalid_args(format!(
                "min ({}) must be less than max ({})",
                self.min, self.max
            )));
        }
        let high = if self.high == 0 {
            i64::from(self.low) + 2 * i64::from(self.max)
        } else {
            i64::from(self.high)
        };
        let high = i32::try_from(high)
            .map_err(|_| CliError::invalid_args(format!("high ({}) does not fit in i32", high)))?;
        if i64::from(high) - i64::from(self.low) <= i64::from(self.max) {
            return Err(CliError::invalid_args("(high - low) must be greater than max"));
        }
        Ok((self.low, high))
    }

    fn config(&self) -> IndexConfig {
        IndexConfig::in_dir(&self.dir, "equivalence")
            .mode(OpenMode::Truncate)
            .node_size(self.node_size)
    }
}

/// Cumulative operation counts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Counts {
    pub insert_success: u64,
    pub insert_fail: u64,
    pub erase_success: u64,
    pub erase_fail: u64,
    pub iterate_forward: u64,
    pub iterate_backward: u64,
    pub find_success: u64,
    pub find_fail: u64,
    pub lower_bound_exist: u64,
    pub lower_bound_may_exist: u64,
    pub upper_bound_exist: u64,
    pub upper_bound_may_exist: u64,
    pub cycles_complete: u32,
    pub size: usize,
}

impl Counts {
    pub fn total(&self) -> u64 {
        self.insert_success
            + self.insert_fail
            + self.erase_success
            + self.erase_fail
            + self.iterate_forward
            + self.iterate_backward
            + self.find_success
            + self.find_fail
            + self.lower_bound_exist
            + self.lower_bound_may_exist
            + self.upper_bound_exist
            + self.upper_bound_may_exist
    }
}

impl fmt::Display for Counts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Cumulative counts:")?;
        writeln!(f, "  insert, inserted            {}", self.insert_success)?;
        writeln!(f, "  insert, not inserted        {}", self.insert_fail)?;
        writeln!(f, "  erase, return > 0           {}", self.erase_success)?;
        writeln!(f, "  erase, return == 0          {}", self.erase_fail)?;
        writeln!(f, "  iterate forward             {}", self.iterate_forward)?;
        writeln!(f, "  iterate backward            {}", self.iterate_backward)?;
        writeln!(f, "  find, return element        {}", self.find_success)?;
        writeln!(f, "  find, return end            {}", self.find_fail)?;
        writeln!(f, "  lower_bound, key exists     {}", self.lower_bound_exist)?;
        writeln!(f, "  lower_bound, key may exist  {}", self.lower_bound_may_exist)?;
        writeln!(f, "  upper_bound, key exists     {}", self.upper_bound_exist)?;
        writeln!(f, "  upper_bound, key may exist  {}", self.upper_bound_may_exist)?;
        writeln!(f, "  total                       {}", self.total())?;
        writeln!(f, "  cycles complete             {}", self.cycles_complete)?;
        writeln!(f, "  current size                {}", self.size)
    }
}

struct Harness {
    bt: Map,
    stl: BTreeMap<i32, i32>,
    counts: Counts,
    low: i32,
    high: i32,
}

/// Compares the element under `bt` with the element `stl` expects.
fn check(what: &str, stl: Option<(&i32, &i32)>, bt: MapCursor<'_>) -> CliResult<()> {
    match (stl, bt.is_end()) {
        (None, true) => Ok(()),
        (None, false) => Err(CliError::divergence(format!(
            "{}: BTreeMap at end, index at {:?}",
            what,
            bt.value()?
        ))),
        (Some((k, _)), true) => Err(CliError::divergence(format!(
            "{}: index at end, BTreeMap at key {}",
            what, k
        ))),
        (Some((&k, &v)), false) => {
            let found = bt.value()?;
            if found != (k, v) {
                return Err(CliError::divergence(format!(
                    "{}: index at {:?}, BTreeMap at {:?}",
                    what,
                    found,
                    (k, v)
                )));
            }
            Ok(())
        }
    }
}

impl Harness {
    fn probe_key(&self, seed: i32) -> i32 {
        StdRng::seed_from_u64(seed as u64).gen_range(self.low..=self.high)
    }

    fn insert_test(&mut self, rng: &mut StdRng, max: usize) -> CliResult<()> {
        while self.stl.len() < max {
            let k = rng.gen_range(self.low..=self.high);
            // Mapped value equals the key, so BTreeMap's replace is harmless.
            let stl_inserted = self.stl.insert(k, k).is_none();
            let (_, bt_inserted) = self.bt.insert(&k, &k)?;
            if stl_inserted != bt_inserted {
                return Err(CliError::divergence(format!(
                    "insert({}): index reported {}, BTreeMap {}",
                    k, bt_inserted, stl_inserted
                )));
            }
            if stl_inserted {
                self.counts.insert_success += 1;
            } else {
                self.counts.insert_fail += 1;
            }
        }
        self.check_size("insert")
    }

    fn erase_test(&mut self, rng: &mut StdRng, min: usize) -> CliResult<()> {
        while self.stl.len() > min {
            let k = rng.gen_range(self.low..=self.high);
            let stl_erased = usize::from(self.stl.remove(&k).is_some());
            let bt_erased = self.bt.erase_key(&k)?;
            if stl_erased != bt_erased {
                return Err(CliError::divergence(format!(
                    "erase({}): index removed {}, BTreeMap {}",
                    k, bt_erased, stl_erased
                )));
            }
            if stl_erased > 0 {
                self.counts.erase_success += 1;
            } else {
                self.counts.erase_fail += 1;
            }
        }
        self.check_size("erase")
    }

    fn check_size(&self, what: &str) -> CliResult<()> {
        let bt_len = self.bt.len()?;
        if bt_len != self.stl.len() {
            return Err(CliError::divergence(format!(
                "{}: index size {} != BTreeMap size {}",
                what,
                bt_len,
                self.stl.len()
            )));
        }
        Ok(())
    }

    fn iteration_test(&mut self) -> CliResult<()> {
        let mut bt_iter = self.bt.iter()?;
        for (&k, &v) in &self.stl {
            match bt_iter.next() {
                Some(found) => {
                    let found = found?;
                    if found != (k, v) {
                        return Err(CliError::divergence(format!(
                            "iteration: index at {:?}, BTreeMap at {:?}",
                            found,
                            (k, v)
                        )));
                    }
                }
                None => return Err(CliError::divergence("iteration: index ended early")),
            }
            self.counts.iterate_forward += 1;
        }
        if bt_iter.next().is_some() {
            return Err(CliError::divergence("iteration: BTreeMap ended early"));
        }
        Ok(())
    }

    fn backward_iteration_test(&mut self) -> CliResult<()> {
        let begin = self.bt.begin()?;
        let mut cursor = self.bt.end()?;
        for entry in self.stl.iter().rev() {
            if cursor == begin {
                return Err(CliError::divergence("backward iteration: index ended early"));
            }
            cursor.move_prev();
            check("backward iteration", Some(entry), cursor)?;
            self.counts.iterate_backward += 1;
        }
        if cursor != begin {
            return Err(CliError::divergence("backward iteration: BTreeMap ended early"));
        }
        Ok(())
    }

    fn find_test(&mut self) -> CliResult<()> {
        for &k in self.stl.keys() {
            check("find", self.stl.get_key_value(&k), self.bt.find(&k)?)?;
            self.counts.find_success += 1;

            let probe = self.probe_key(k);
            let expected = self.stl.get_key_value(&probe);
            check("find may exist", expected, self.bt.find(&probe)?)?;
            if expected.is_some() {
                self.counts.find_success += 1;
            } else {
                self.counts.find_fail += 1;
            }
        }
        Ok(())
    }

    fn lower_bound_test(&mut self) -> CliResult<()> {
        for &k in self.stl.keys() {
            check("lower_bound", self.stl.range(k..).next(), self.bt.lower_bound(&k)?)?;
            self.counts.lower_bound_exist += 1;

            let probe = self.probe_key(k);
            check(
                "lower_bound may exist",
                self.stl.range(probe..).next(),
                self.bt.lower_bound(&probe)?,
            )?;
            self.counts.lower_bound_may_exist += 1;
        }
        Ok(())
    }

    fn upper_bound_test(&mut self) -> CliResult<()> {
        for &k in self.stl.keys() {
            let above = |key: i32| (Bound::Excluded(key), Bound::Unbounded);
            check(
                "upper_bound",
                self.stl.range(above(k)).next(),
                self.bt.upper_bound(&k)?,
            )?;
            self.counts.upper_bound_exist += 1;

            let probe = self.probe_key(k);
            check(
                "upper_bound may exist",
                self.stl.range(above(probe)).next(),
                self.bt.upper_bound(&probe)?,
            )?;
            self.counts.upper_bound_may_exist += 1;
        }
        Ok(())
    }

    fn read_tests(&mut self) -> CliResult<()> {
        self.iteration_test()?;
        self.backward_iteration_test()?;
        self.find_test()?;
        self.lower_bound_test()?;
        self.upper_bound_test()
    }

    /// Closes the index and opens it again over the same files.
    fn reopen_test(&mut self, config: &IndexConfig) -> CliResult<()> {
        self.bt.close()?;
        self.bt.open(&config.clone().mode(OpenMode::ReadWrite))?;
        self.check_size("reopen")?;
        self.iteration_test()
    }
}

/// Runs every cycle and returns the final counts.
pub fn run_equivalence(options: &EquivalenceOptions) -> CliResult<Counts> {
    let (low, high) = options.key_range()?;
    let config = options.config();

    let mut bt = Map::new();
    bt.open(&config)?;
    let mut harness = Harness {
        bt,
        stl: BTreeMap::new(),
        counts: Counts::default(),
        low,
        high,
    };

    let mut insert_rng = StdRng::seed_from_u64(options.seed);
    let mut erase_rng = StdRng::seed_from_u64(options.seed);

    for cycle in 1..=options.cycles {
        info!(cycle, "EQUIVALENCE_CYCLE_STARTED");
        harness.insert_test(&mut insert_rng, options.max as usize)?;
        harness.read_tests()?;
        harness.erase_test(&mut erase_rng, options.min as usize)?;
        harness.read_tests()?;
        harness.reopen_test(&config)?;

        harness.counts.cycles_complete += 1;
        info!(
            cycle,
            size = harness.stl.len(),
            total = harness.counts.total(),
            "EQUIVALENCE_CYCLE_COMPLETE"
        );
    }

    harness.counts.size = harness.stl.len();
    harness.bt.close()?;
    Ok(harness.counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn options(dir: &TempDir) -> EquivalenceOptions {
        EquivalenceOptions {
            dir: dir.path().to_path_buf(),
            max: 300,
            min: 20,
            low: 0,
            high: 0,
            cycles: 2,
            seed: 7,
            node_size: 64,
        }
    }

    #[test]
    fn test_small_run_agrees() {
        let dir = TempDir::new().unwrap();
        let counts = run_equivalence(&options(&dir)).unwrap();

        assert_eq!(counts.cycles_complete, 2);
        assert_eq!(counts.size, 20);
        assert!(counts.insert_success >= 300);
        assert!(counts.erase_success >= 280);
        assert!(counts.total() > 0);
    }

    #[test]
    fn test_same_seed_same_counts() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        let mut first = options(&a);
        first.cycles = 1;
        let mut second = options(&b);
        second.cycles = 1;

        assert_eq!(
            run_equivalence(&first).unwrap(),
            run_equivalence(&second).unwrap()
        );
    }

    #[test]
    fn test_key_range_must_exceed_max() {
        let dir = TempDir::new().unwrap();
        let mut opts = options(&dir);
        opts.high = 100;
        let err = run_equivalence(&opts).unwrap_err();
        assert_eq!(err.code_str(), "FLATDEX_CLI_INVALID_ARGS");
    }

    #[test]
    fn test_min_below_max() {
        let dir = TempDir::new().unwrap();
        let mut opts = options(&dir);
        opts.min = opts.max;
        assert!(run_equivalence(&opts).is_err());
    }
}
