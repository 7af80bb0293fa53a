//! Three interchangeable permutation solvers behind one contract.
//!
//! A problem is a bijection from `keys` onto the multiset `values` (the same
//! value may occur several times; equal occurrences are interchangeable).
//! Constraints prune it: `forbid`/`forbid_all` remove values from a key's
//! domain, `require` pre-assigns and consumes one occurrence, and
//! `at_least_one_of` is a disjunctive global constraint. Whole assignments
//! can be blacklisted to keep a retry from rediscovering a rejected solution.
//!
//! Failure is an absent result, never an error: an over-subscribed
//! `require`, a falsified `at_least_one_of`, or an exhausted attempt/time
//! budget all return `None` and leave retry policy to the caller.
//!
//! Determinism contract: the same problem, constraints and seed produce the
//! identical assignment on every platform; different seeds explore
//! independently.

pub mod assignment;
pub mod backtracking;
pub mod rejection;

use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;

use hashbrown::{HashMap, HashSet};
use log::warn;
use serde_derive::{Deserialize, Serialize};

pub use assignment::AssignmentSolver;
pub use backtracking::BacktrackingSolver;
pub use rejection::RejectionSolver;

pub trait SolverKey: Copy + Eq + Hash + Ord + Debug {}
impl<T: Copy + Eq + Hash + Ord + Debug> SolverKey for T {}

pub trait SolverValue: Copy + Eq + Hash + Ord + Debug {}
impl<T: Copy + Eq + Hash + Ord + Debug> SolverValue for T {}

pub trait Solver<K: SolverKey, V: SolverValue> {
    fn add_permutation_problem(&mut self, keys: Vec<K>, values: Vec<V>);
    fn forbid(&mut self, key: K, value: V);
    fn require(&mut self, key: K, value: V);
    fn forbid_all(&mut self, keys: &[K], values: &[V]);
    fn at_least_one_of(&mut self, keys: &[K], values: &[V]);
    fn add_forbidden_solution_map(&mut self, map: &HashMap<K, V>);
    fn solve(&mut self, seed: u64, time_limit: Duration) -> Option<HashMap<K, V>>;
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverKind {
    /// Integer-model search with all-different propagation.
    Assignment,
    /// Randomized greedy with bounded backtracking, full search fallback.
    Backtracking,
    /// Constraint-checked rejection sampling; fastest at high solution density.
    #[default]
    Rejection,
}

/// Factory. Backends are selected by configuration, not conditional imports.
pub fn create_solver<K: SolverKey + 'static, V: SolverValue + 'static>(
    kind: SolverKind,
) -> Box<dyn Solver<K, V>> {
    match kind {
        SolverKind::Assignment => Box::new(AssignmentSolver::new()),
        SolverKind::Backtracking => Box::new(BacktrackingSolver::new()),
        SolverKind::Rejection => Box::new(RejectionSolver::new()),
    }
}

pub(crate) const UNASSIGNED: usize = usize::MAX;

/// Index-space representation shared by the three backends. Working with key
/// and value indices keeps duplicate values interchangeable and keeps all
/// iteration over plain vectors, which the determinism contract needs.
pub(crate) struct Problem<K, V> {
    pub keys: Vec<K>,
    pub values: Vec<V>,
    key_index: HashMap<K, usize>,
    pub forbidden_pairs: HashSet<(usize, usize)>,
    /// key index -> value index, occurrence-resolved.
    pub required: Vec<(usize, usize)>,
    pub at_least_one: Vec<(Vec<usize>, Vec<usize>)>,
    pub forbidden_solutions: Vec<HashMap<K, V>>,
    /// Set when a constraint could not be installed (missing key/value,
    /// over-subscribed require); solve then returns absent.
    pub infeasible: bool,
}

impl<K: SolverKey, V: SolverValue> Problem<K, V> {
    pub fn new() -> Problem<K, V> {
        Problem {
            keys: Vec::new(),
            values: Vec::new(),
            key_index: HashMap::new(),
            forbidden_pairs: HashSet::new(),
            required: Vec::new(),
            at_least_one: Vec::new(),
            forbidden_solutions: Vec::new(),
            infeasible: false,
        }
    }

    pub fn set_permutation(&mut self, keys: Vec<K>, values: Vec<V>) {
        assert_eq!(
            keys.len(),
            values.len(),
            "keys and values must have the same length"
        );
        self.key_index = keys.iter().enumerate().map(|(i, &k)| (k, i)).collect();
        self.keys = keys;
        self.values = values;
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    fn key_idx(&self, key: K) -> Option<usize> {
        self.key_index.get(&key).copied()
    }

    fn value_indices(&self, value: V) -> Vec<usize> {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, &v)| v == value)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn forbid(&mut self, key: K, value: V) {
        let Some(k) = self.key_idx(key) else {
            warn!("forbid: key {key:?} not in problem");
            return;
        };
        let occurrences = self.value_indices(value);
        if occurrences.is_empty() {
            warn!("forbid: value {value:?} not in problem");
            return;
        }
        for v in occurrences {
            self.forbidden_pairs.insert((k, v));
        }
    }

    /// Pre-assign `value` to `key`, consuming one occurrence. A second
    /// require on the same key, or more requires of a value than there are
    /// occurrences, makes the problem infeasible.
    pub fn require(&mut self, key: K, value: V) {
        let Some(k) = self.key_idx(key) else {
            warn!("require: key {key:?} not in problem");
            self.infeasible = true;
            return;
        };
        if self.required.iter().any(|&(rk, _)| rk == k) {
            self.infeasible = true;
            return;
        }
        let taken: HashSet<usize> = self.required.iter().map(|&(_, v)| v).collect();
        let available = self
            .value_indices(value)
            .into_iter()
            .find(|v| !taken.contains(v));
        match available {
            Some(v) => self.required.push((k, v)),
            None => {
                warn!("require: value {value:?} over-subscribed");
                self.infeasible = true;
            }
        }
    }

    pub fn at_least_one_of(&mut self, keys: &[K], values: &[V]) {
        let mut key_indices = Vec::new();
        for &key in keys {
            match self.key_idx(key) {
                Some(k) => key_indices.push(k),
                None => warn!("at_least_one_of: key {key:?} not in problem"),
            }
        }
        let mut value_indices: Vec<usize> = Vec::new();
        for &value in values {
            value_indices.extend(self.value_indices(value));
        }
        value_indices.sort_unstable();
        value_indices.dedup();
        if key_indices.is_empty() || value_indices.is_empty() {
            self.infeasible = true;
            return;
        }
        self.at_least_one.push((key_indices, value_indices));
    }

    /// Whether no assignment can exist at all: a constraint failed to
    /// install, or a pre-assignment contradicts a forbid.
    pub fn is_infeasible(&self) -> bool {
        self.infeasible
            || self
                .required
                .iter()
                .any(|&(k, v)| self.forbidden_pairs.contains(&(k, v)))
    }

    /// Per-key domains after `forbid` pruning, as ascending value indices.
    pub fn domains(&self) -> Vec<Vec<usize>> {
        (0..self.len())
            .map(|k| {
                (0..self.len())
                    .filter(|&v| !self.forbidden_pairs.contains(&(k, v)))
                    .collect()
            })
            .collect()
    }

    pub fn satisfies_at_least_one(&self, assignment: &[usize]) -> bool {
        self.at_least_one.iter().all(|(keys, values)| {
            keys.iter()
                .any(|&k| assignment[k] != UNASSIGNED && values.contains(&assignment[k]))
        })
    }

    /// Disjunctive constraints that can no longer be satisfied by any
    /// completion of a partial assignment.
    pub fn at_least_one_dead(&self, assignment: &[usize]) -> bool {
        self.at_least_one.iter().any(|(keys, values)| {
            keys.iter().all(|&k| assignment[k] != UNASSIGNED)
                && !keys
                    .iter()
                    .any(|&k| values.contains(&assignment[k]))
        })
    }

    pub fn satisfies_required(&self, assignment: &[usize]) -> bool {
        // Occurrence indices are interchangeable, so compare by value.
        self.required.iter().all(|&(k, v)| {
            assignment[k] != UNASSIGNED && self.values[assignment[k]] == self.values[v]
        })
    }

    /// Full-assignment constraint check used by the sampling backend.
    pub fn check_complete(&self, assignment: &[usize]) -> bool {
        if !self.satisfies_required(assignment) {
            return false;
        }
        for k in 0..self.len() {
            if self.forbidden_pairs.contains(&(k, assignment[k])) {
                return false;
            }
        }
        if !self.satisfies_at_least_one(assignment) {
            return false;
        }
        !self.is_blacklisted(assignment)
    }

    /// Whether the assignment reproduces a blacklisted solution. Comparison
    /// is by value, so interchangeable occurrences cannot sneak one past.
    pub fn is_blacklisted(&self, assignment: &[usize]) -> bool {
        self.forbidden_solutions.iter().any(|forbidden| {
            self.keys
                .iter()
                .enumerate()
                .all(|(k, key)| match forbidden.get(key) {
                    Some(&v) => assignment[k] != UNASSIGNED && self.values[assignment[k]] == v,
                    None => false,
                })
        })
    }

    pub fn to_map(&self, assignment: &[usize]) -> HashMap<K, V> {
        self.keys
            .iter()
            .enumerate()
            .map(|(k, &key)| (key, self.values[assignment[k]]))
            .collect()
    }
}
