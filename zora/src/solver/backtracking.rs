//! Backend B: randomized greedy placement with bounded backtracking.
//!
//! Each iteration shuffles the key order, applies the `require`
//! pre-assignments, then fills the remaining keys by drawing a valid value
//! uniformly at random; a dead end triggers backtracking over the still-open
//! keys, most-constrained-first, up to a small depth bound. If the bounded
//! search keeps failing, a full (unbounded) backtracking pass settles the
//! question. A solution that matches the blacklist restarts the whole solve
//! with a sub-seed derived from the attempt number.

use std::time::{Duration, Instant};

use hashbrown::HashMap;
use log::debug;

use crate::rng::SeededRng;
use crate::solver::{Problem, Solver, SolverKey, SolverValue, UNASSIGNED};

pub const DEFAULT_MAX_ITERATIONS: usize = 100;
pub const DEFAULT_BACKTRACK_DEPTH: usize = 5;
const MAX_BLACKLIST_RESTARTS: usize = 25;

pub struct BacktrackingSolver<K, V> {
    problem: Problem<K, V>,
    pub max_iterations: usize,
    pub max_backtrack_depth: usize,
}

impl<K: SolverKey, V: SolverValue> BacktrackingSolver<K, V> {
    pub fn new() -> BacktrackingSolver<K, V> {
        BacktrackingSolver {
            problem: Problem::new(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_backtrack_depth: DEFAULT_BACKTRACK_DEPTH,
        }
    }

    fn valid_values(&self, key: usize, used: &[bool]) -> Vec<usize> {
        (0..self.problem.len())
            .filter(|&v| !used[v] && !self.problem.forbidden_pairs.contains(&(key, v)))
            .collect()
    }

    fn apply_required(&self, assignment: &mut [usize], used: &mut [bool]) -> bool {
        for &(k, v) in &self.problem.required {
            if used[v] {
                return false;
            }
            assignment[k] = v;
            used[v] = true;
        }
        true
    }

    /// One greedy pass. Returns a complete assignment or gives up.
    fn greedy_pass(&self, rng: &mut SeededRng) -> Option<Vec<usize>> {
        let n = self.problem.len();
        let mut key_order: Vec<usize> = (0..n).collect();
        rng.shuffle(&mut key_order);

        let mut assignment = vec![UNASSIGNED; n];
        let mut used = vec![false; n];
        if !self.apply_required(&mut assignment, &mut used) {
            return None;
        }

        for &key in &key_order {
            if assignment[key] != UNASSIGNED {
                continue;
            }
            let valid = self.valid_values(key, &used);
            if valid.is_empty() {
                // Dead end; let the bounded search try to finish the rest.
                if !self.backtrack(rng, &mut assignment, &mut used, 0, self.max_backtrack_depth) {
                    return None;
                }
                break;
            }
            let v = *rng.choice(&valid);
            assignment[key] = v;
            used[v] = true;
        }

        if assignment.contains(&UNASSIGNED) {
            return None;
        }
        self.problem
            .satisfies_at_least_one(&assignment)
            .then_some(assignment)
    }

    /// Recursive most-constrained-first search over the unassigned keys.
    fn backtrack(
        &self,
        rng: &mut SeededRng,
        assignment: &mut [usize],
        used: &mut [bool],
        depth: usize,
        max_depth: usize,
    ) -> bool {
        let n = self.problem.len();
        if !assignment.contains(&UNASSIGNED) {
            return self.problem.satisfies_at_least_one(assignment);
        }
        if depth > max_depth {
            return false;
        }
        if self.problem.at_least_one_dead(assignment) {
            return false;
        }

        // Most-constrained-first, ties broken by lowest key index.
        let mut key = None;
        let mut best = n + 1;
        for k in 0..n {
            if assignment[k] == UNASSIGNED {
                let count = self.valid_values(k, used).len();
                if count < best {
                    best = count;
                    key = Some(k);
                }
            }
        }
        let key = key.unwrap();

        let mut valid = self.valid_values(key, used);
        if valid.is_empty() {
            return false;
        }
        rng.shuffle(&mut valid);
        for v in valid {
            assignment[key] = v;
            used[v] = true;
            if self.backtrack(rng, assignment, used, depth + 1, max_depth) {
                return true;
            }
            assignment[key] = UNASSIGNED;
            used[v] = false;
        }
        false
    }

    /// Unbounded fallback, starting over from the required assignments only.
    fn full_backtrack(&self, rng: &mut SeededRng) -> Option<Vec<usize>> {
        let n = self.problem.len();
        let mut assignment = vec![UNASSIGNED; n];
        let mut used = vec![false; n];
        if !self.apply_required(&mut assignment, &mut used) {
            return None;
        }
        self.backtrack(rng, &mut assignment, &mut used, 0, usize::MAX)
            .then_some(assignment)
    }

    fn solve_once(
        &self,
        rng: &mut SeededRng,
        start: Instant,
        time_limit: Duration,
    ) -> Option<Vec<usize>> {
        for iteration in 0..self.max_iterations {
            if start.elapsed() >= time_limit {
                debug!("backtracking timed out after {iteration} greedy iterations");
                return None;
            }
            if let Some(assignment) = self.greedy_pass(rng) {
                return Some(assignment);
            }
        }
        debug!(
            "greedy placement failed {} times; falling back to full backtracking",
            self.max_iterations
        );
        if start.elapsed() >= time_limit {
            return None;
        }
        self.full_backtrack(rng)
    }
}

impl<K: SolverKey, V: SolverValue> Default for BacktrackingSolver<K, V> {
    fn default() -> Self {
        BacktrackingSolver::new()
    }
}

impl<K: SolverKey, V: SolverValue> Solver<K, V> for BacktrackingSolver<K, V> {
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
        let start = Instant::now();
        for attempt in 0..MAX_BLACKLIST_RESTARTS {
            if start.elapsed() >= time_limit {
                return None;
            }
            // Attempt 0 uses the caller's seed untouched; blacklist restarts
            // derive a fresh deterministic sub-seed from the attempt number.
            let mut rng = if attempt == 0 {
                SeededRng::new(seed)
            } else {
                SeededRng::new(seed).derive(attempt as u64)
            };
            let Some(assignment) = self.solve_once(&mut rng, start, time_limit) else {
                return None;
            };
            if self.problem.is_blacklisted(&assignment) {
                debug!("solution matched the blacklist; restarting (attempt {attempt})");
                continue;
            }
            return Some(self.problem.to_map(&assignment));
        }
        None
    }
}
