//! Backend A: integer-model search with all-different propagation.
//!
//! The model has one integer variable per key ranging over value indices,
//! an all-different constraint (modulo value multiplicity, since equal
//! values are interchangeable occurrences), and the pruning constraints. The
//! search itself is deterministic - most-constrained variable first, values
//! in a fixed order with forward checking - and the seed enters exactly
//! once, as a random permutation of the value indices applied before the
//! model is built. Two runs with one seed walk the identical tree; two
//! seeds walk different regions of it.

use std::time::{Duration, Instant};

use hashbrown::HashMap;
use log::debug;

use crate::rng::SeededRng;
use crate::solver::{Problem, Solver, SolverKey, SolverValue, UNASSIGNED};

/// How often the search polls the clock, in node expansions.
const TIME_CHECK_INTERVAL: usize = 256;

pub struct AssignmentSolver<K, V> {
    problem: Problem<K, V>,
}

struct Search<'a, K, V> {
    problem: &'a Problem<K, V>,
    /// Per-key candidate value indices, in seed-permuted order.
    domains: Vec<Vec<usize>>,
    start: Instant,
    time_limit: Duration,
    nodes: usize,
    timed_out: bool,
}

impl<K: SolverKey, V: SolverValue> Search<'_, K, V> {
    fn run(&mut self) -> Option<Vec<usize>> {
        let n = self.problem.len();
        let mut assignment = vec![UNASSIGNED; n];
        let mut used = vec![false; n];
        for &(k, v) in &self.problem.required {
            if used[v] {
                return None;
            }
            assignment[k] = v;
            used[v] = true;
        }
        self.dfs(&mut assignment, &mut used)
            .then_some(assignment)
    }

    fn dfs(&mut self, assignment: &mut [usize], used: &mut [bool]) -> bool {
        if self.timed_out {
            return false;
        }
        self.nodes += 1;
        if self.nodes % TIME_CHECK_INTERVAL == 0 && self.start.elapsed() >= self.time_limit {
            self.timed_out = true;
            return false;
        }
        if self.problem.at_least_one_dead(assignment) {
            return false;
        }

        // Most-constrained variable, ties to the lowest key index.
        let mut next = None;
        let mut best = usize::MAX;
        for k in 0..assignment.len() {
            if assignment[k] != UNASSIGNED {
                continue;
            }
            let count = self.domains[k].iter().filter(|&&v| !used[v]).count();
            if count == 0 {
                return false;
            }
            if count < best {
                best = count;
                next = Some(k);
            }
        }
        let Some(key) = next else {
            return self.problem.satisfies_at_least_one(assignment)
                && !self.problem.is_blacklisted(assignment);
        };

        for i in 0..self.domains[key].len() {
            let v = self.domains[key][i];
            if used[v] {
                continue;
            }
            assignment[key] = v;
            used[v] = true;
            if self.dfs(assignment, used) {
                return true;
            }
            assignment[key] = UNASSIGNED;
            used[v] = false;
        }
        false
    }
}

impl<K: SolverKey, V: SolverValue> AssignmentSolver<K, V> {
    pub fn new() -> AssignmentSolver<K, V> {
        AssignmentSolver {
            problem: Problem::new(),
        }
    }
}

impl<K: SolverKey, V: SolverValue> Default for AssignmentSolver<K, V> {
    fn default() -> Self {
        AssignmentSolver::new()
    }
}

impl<K: SolverKey, V: SolverValue> Solver<K, V> for AssignmentSolver<K, V> {
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

        // The seed's only entry point: permute the value-index order the
        // search tries, so each seed explores a different region.
        let mut rng = SeededRng::new(seed);
        let mut order: Vec<usize> = (0..self.problem.len()).collect();
        rng.shuffle(&mut order);
        let rank: Vec<usize> = {
            let mut rank = vec![0usize; order.len()];
            for (pos, &v) in order.iter().enumerate() {
                rank[v] = pos;
            }
            rank
        };
        let mut domains = self.problem.domains();
        for domain in domains.iter_mut() {
            domain.sort_by_key(|&v| rank[v]);
        }

        let mut search = Search {
            problem: &self.problem,
            domains,
            start: Instant::now(),
            time_limit,
            nodes: 0,
            timed_out: false,
        };
        let result = search.run();
        debug!(
            "assignment search finished after {} nodes (timed_out={})",
            search.nodes, search.timed_out
        );
        result.map(|assignment| self.problem.to_map(&assignment))
    }
}
