//! Backend C: constraint-checked rejection sampling.
//!
//! Shuffle the value multiset, zip it with the keys, check every constraint
//! as a batch, accept or reject. No partial-state machinery at all, which
//! makes it the fastest backend when valid solutions are dense - the
//! production problem (~200 locations, ~30 item kinds, loose forbids)
//! usually accepts within a handful of attempts.

use std::time::{Duration, Instant};

use hashbrown::HashMap;
use log::debug;

use crate::rng::SeededRng;
use crate::solver::{Problem, Solver, SolverKey, SolverValue};

/// Attempt cap. Tightly bound `at_least_one_of` constraints can push the
/// accept rate low; the cap is never exceeded, the solver just returns
/// absent and lets the caller pick another backend or seed.
pub const DEFAULT_ATTEMPT_CAP: usize = 10_000;

pub struct RejectionSolver<K, V> {
    problem: Problem<K, V>,
    pub attempt_cap: usize,
}

impl<K: SolverKey, V: SolverValue> RejectionSolver<K, V> {
    pub fn new() -> RejectionSolver<K, V> {
        RejectionSolver {
            problem: Problem::new(),
            attempt_cap: DEFAULT_ATTEMPT_CAP,
        }
    }
}

impl<K: SolverKey, V: SolverValue> Default for RejectionSolver<K, V> {
    fn default() -> Self {
        RejectionSolver::new()
    }
}

impl<K: SolverKey, V: SolverValue> Solver<K, V> for RejectionSolver<K, V> {
    fn add_permutation_problem(&mut self, keys: Vec<K>, values: Vec<V>) {
        self.problem.set_permutation(keys, values);
    }

    fn forbid(&mut self, key: K, value: V) {
        self.problem.forbid(key, value);
    }

    fn require(&mut self, key: K, value: V) {
        self.problem.require(key, value);
    }

    fn forbid_all(&mut self, keys: &[K], values: &[V]) {
        for &key in keys {
            for &value in values {
                self.problem.forbid(key, value);
            }
        }
    }

    fn at_least_one_of(&mut self, keys: &[K], values: &[V]) {
        self.problem.at_least_one_of(keys, values);
    }

    fn add_forbidden_solution_map(&mut self, map: &HashMap<K, V>) {
        self.problem.forbidden_solutions.push(map.clone());
    }

    fn solve(&mut self, seed: u64, time_limit: Duration) -> Option<HashMap<K, V>> {
        if self.problem.is_infeasible() || self.problem.len() == 0 {
            return None;
        }
        let mut rng = SeededRng::new(seed);
        let n = self.problem.len();

        // Pre-shuffling the key order decorrelates which key receives the
        // i-th value slot across seeds.
        let mut key_order: Vec<usize> = (0..n).collect();
        let mut value_order: Vec<usize> = (0..n).collect();
        rng.shuffle(&mut key_order);
        rng.shuffle(&mut value_order);

        let start = Instant::now();
        let mut assignment = vec![0usize; n];
        for attempt in 0..self.attempt_cap {
            // Elapsed check sits between attempts so a timeout never leaves
            // half-built state behind.
            if start.elapsed() >= time_limit {
                debug!("rejection sampling timed out after {attempt} attempts");
                return None;
            }
            rng.shuffle(&mut value_order);
            for i in 0..n {
                assignment[key_order[i]] = value_order[i];
            }
            if self.problem.check_complete(&assignment) {
                debug!("rejection sampling accepted on attempt {}", attempt + 1);
                return Some(self.problem.to_map(&assignment));
            }
        }
        debug!("rejection sampling exhausted {} attempts", self.attempt_cap);
        None
    }
}
