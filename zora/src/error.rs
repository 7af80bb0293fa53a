use thiserror::Error;

use zora_game::{GameDataError, Item};

/// Failure taxonomy for a generation run. Solver and validator failures are
/// retried inside the randomizer before they surface here; data-model
/// violations are always fatal.
#[derive(Debug, Error)]
pub enum RandomizeError {
    #[error(transparent)]
    GameData(#[from] GameDataError),
    #[error("invalid flag combination: {reason}")]
    ConstraintConflict { reason: String },
    #[error("no feasible assignment for seed {seed} after {attempts} solver attempts")]
    NoFeasibleAssignment { seed: u64, attempts: usize },
    #[error(
        "validator rejected every shuffle for seed {seed} (flags {flagstring}) after {attempts} attempts; still missing {missing:?}"
    )]
    Unbeatable {
        seed: u64,
        flagstring: String,
        attempts: usize,
        missing: Vec<Item>,
    },
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
