//! Contract tests run against all three solver backends: identical problem
//! semantics, identical failure modes, per-seed determinism and cross-seed
//! independence.

use std::time::Duration;

use hashbrown::{HashMap, HashSet};

use zora::solver::{create_solver, Solver, SolverKind};

const BACKENDS: [SolverKind; 3] = [
    SolverKind::Assignment,
    SolverKind::Backtracking,
    SolverKind::Rejection,
];

const LIMIT: Duration = Duration::from_secs(10);

/// A problem shaped like the production one: many locations, a smaller set
/// of item kinds with lots of duplicate occurrences, a few loose forbids.
fn production_like(kind: SolverKind) -> Box<dyn Solver<u32, u8>> {
    let keys: Vec<u32> = (0..150).collect();
    let values: Vec<u8> = (0..150).map(|i| (i % 30) as u8).collect();
    let mut solver = create_solver::<u32, u8>(kind);
    solver.add_permutation_problem(keys, values);
    solver.forbid(0, 7);
    solver.forbid(1, 7);
    solver.forbid_all(&[10, 11, 12], &[3, 4]);
    solver
}

fn solution_fingerprint(map: &HashMap<u32, u8>) -> Vec<(u32, u8)> {
    let mut v: Vec<(u32, u8)> = map.iter().map(|(&k, &val)| (k, val)).collect();
    v.sort();
    v
}

#[test]
fn same_seed_same_solution() {
    for kind in BACKENDS {
        let a = production_like(kind).solve(42, LIMIT).unwrap();
        let b = production_like(kind).solve(42, LIMIT).unwrap();
        assert_eq!(
            solution_fingerprint(&a),
            solution_fingerprint(&b),
            "{kind:?} is not deterministic"
        );
    }
}

#[test]
fn twenty_seeds_are_nearly_all_distinct() {
    for kind in BACKENDS {
        let mut distinct = HashSet::new();
        for seed in 0..20u64 {
            let solution = production_like(kind)
                .solve(seed, LIMIT)
                .unwrap_or_else(|| panic!("{kind:?} failed on seed {seed}"));
            distinct.insert(solution_fingerprint(&solution));
        }
        assert!(
            distinct.len() >= 19,
            "{kind:?}: only {} distinct assignments across 20 seeds",
            distinct.len()
        );
    }
}

#[test]
fn solutions_are_permutations_of_the_value_multiset() {
    for kind in BACKENDS {
        let solution = production_like(kind).solve(7, LIMIT).unwrap();
        assert_eq!(solution.len(), 150);
        let mut counts = [0usize; 30];
        for &v in solution.values() {
            counts[v as usize] += 1;
        }
        assert!(counts.iter().all(|&c| c == 5), "{kind:?}: {counts:?}");
    }
}

#[test]
fn forbid_is_honored() {
    for kind in BACKENDS {
        let solution = production_like(kind).solve(3, LIMIT).unwrap();
        assert_ne!(solution[&0], 7, "{kind:?}");
        assert_ne!(solution[&1], 7, "{kind:?}");
        for key in [10, 11, 12] {
            assert!(![3u8, 4].contains(&solution[&key]), "{kind:?}");
        }
    }
}

#[test]
fn require_pins_a_key_and_consumes_one_occurrence() {
    for kind in BACKENDS {
        let mut solver = create_solver::<u32, u8>(kind);
        solver.add_permutation_problem(vec![1, 2, 3], vec![b'a', b'a', b'b']);
        solver.require(1, b'a');
        solver.require(2, b'a');
        let solution = solver.solve(11, LIMIT).unwrap();
        assert_eq!(solution[&1], b'a', "{kind:?}");
        assert_eq!(solution[&2], b'a', "{kind:?}");
        assert_eq!(solution[&3], b'b', "{kind:?}");
    }
}

#[test]
fn over_subscribed_require_returns_absent() {
    for kind in BACKENDS {
        let mut solver = create_solver::<u32, u8>(kind);
        solver.add_permutation_problem(vec![1, 2, 3], vec![b'a', b'a', b'b']);
        solver.require(1, b'a');
        solver.require(2, b'a');
        solver.require(3, b'a');
        assert!(solver.solve(1, LIMIT).is_none(), "{kind:?}");
    }
}

#[test]
fn two_requires_on_one_key_return_absent() {
    // The canonical infeasible problem: one key, two distinct pinned values.
    for kind in BACKENDS {
        let mut solver = create_solver::<u32, u8>(kind);
        solver.add_permutation_problem(vec![1, 2], vec![b'a', b'b']);
        solver.require(1, b'a');
        solver.require(1, b'b');
        assert!(solver.solve(5, LIMIT).is_none(), "{kind:?}");
    }
}

#[test]
fn at_least_one_of_is_satisfied() {
    for kind in BACKENDS {
        let mut solver = create_solver::<u32, u8>(kind);
        solver.add_permutation_problem((0..10).collect(), (0..10).map(|i| i as u8).collect());
        solver.at_least_one_of(&[0, 1], &[8, 9]);
        let solution = solver.solve(13, LIMIT).unwrap();
        assert!(
            [8, 9].contains(&solution[&0]) || [8, 9].contains(&solution[&1]),
            "{kind:?}: {solution:?}"
        );
    }
}

#[test]
fn at_least_one_of_falsified_by_forbids_returns_absent() {
    for kind in BACKENDS {
        let mut solver = create_solver::<u32, u8>(kind);
        solver.add_permutation_problem(vec![1, 2], vec![b'x', b'y']);
        solver.at_least_one_of(&[1], &[b'x']);
        solver.forbid(1, b'x');
        assert!(solver.solve(9, LIMIT).is_none(), "{kind:?}");
    }
}

#[test]
fn blacklisted_solution_is_not_returned() {
    for kind in BACKENDS {
        // Two keys, two values: exactly two assignments exist. Blacklist one
        // and the solver must find the other.
        let mut first = create_solver::<u32, u8>(kind);
        first.add_permutation_problem(vec![1, 2], vec![b'a', b'b']);
        let initial = first.solve(21, LIMIT).unwrap();

        let mut second = create_solver::<u32, u8>(kind);
        second.add_permutation_problem(vec![1, 2], vec![b'a', b'b']);
        second.add_forbidden_solution_map(&initial);
        let other = second.solve(21, LIMIT).unwrap();
        assert_ne!(
            solution_fingerprint(&initial),
            solution_fingerprint(&other),
            "{kind:?}"
        );
    }
}

#[test]
fn blacklisting_every_solution_returns_absent() {
    for kind in BACKENDS {
        let mut solver = create_solver::<u32, u8>(kind);
        solver.add_permutation_problem(vec![1, 2], vec![b'a', b'b']);
        let both: [HashMap<u32, u8>; 2] = [
            [(1, b'a'), (2, b'b')].into_iter().collect(),
            [(1, b'b'), (2, b'a')].into_iter().collect(),
        ];
        for solution in &both {
            solver.add_forbidden_solution_map(solution);
        }
        assert!(solver.solve(2, LIMIT).is_none(), "{kind:?}");
    }
}

#[test]
fn duplicate_occurrences_are_interchangeable() {
    for kind in BACKENDS {
        let mut solver = create_solver::<u32, u8>(kind);
        solver.add_permutation_problem(vec![1, 2, 3], vec![b'a', b'a', b'b']);
        // Forbidding one value forbids every occurrence of it.
        solver.forbid(3, b'a');
        let solution = solver.solve(17, LIMIT).unwrap();
        assert_eq!(solution[&3], b'b', "{kind:?}");
        assert_eq!(solution[&1], b'a', "{kind:?}");
        assert_eq!(solution[&2], b'a', "{kind:?}");
    }
}

#[test]
fn zero_time_budget_returns_absent_between_attempts() {
    // The sampling and greedy backends check the clock before the first
    // attempt; a zero budget means no attempt is made at all.
    for kind in [SolverKind::Backtracking, SolverKind::Rejection] {
        let mut solver = production_like(kind);
        assert!(solver.solve(1, Duration::ZERO).is_none(), "{kind:?}");
    }
}
