pub mod error;
pub mod flags;
pub mod overworld;
pub mod patch;
pub mod randomize;
pub mod rng;
pub mod solver;
pub mod validate;
