use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use log::{error, info};

use zora::error::RandomizeError;
use zora::flags::Flags;
use zora::randomize::Randomizer;
use zora::solver::SolverKind;

#[derive(Parser)]
#[command(name = "zora-cli", about = "Item and overworld randomizer")]
struct Args {
    /// Seed for the run; the same seed, flagstring and base image always
    /// produce the same output.
    #[arg(long)]
    seed: u64,

    /// Encoded flag set (see the flag registry for the format).
    #[arg(long, default_value = "BBBBB")]
    flagstring: String,

    /// Base image to randomize.
    #[arg(long)]
    input_file: PathBuf,

    /// Directory the output image is written into.
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Log level filter (error, warn, info, debug, trace).
    #[arg(long, default_value = "info")]
    loglevel: String,

    /// Solver backend: assignment, backtracking or rejection.
    #[arg(long, default_value = "rejection")]
    solver: String,
}

const EXIT_INVALID_FLAGS: u8 = 2;
const EXIT_NO_FEASIBLE_ASSIGNMENT: u8 = 3;
const EXIT_UNBEATABLE: u8 = 4;
const EXIT_IO: u8 = 5;

fn run(args: &Args, flags: &Flags, solver_kind: SolverKind) -> Result<(), RandomizeError> {
    let base = std::fs::read(&args.input_file)?;
    let randomizer = Randomizer::new(solver_kind);
    let (output, summary) = randomizer.generate(args.seed, flags, &base)?;

    let file_name = format!("zora-{}-{}.nes", summary.seed, summary.flagstring);
    let out_path = args.output_dir.join(file_name);
    std::fs::write(&out_path, output)?;
    info!(
        "wrote {} (patch hash {:016x}, {} shuffle attempt(s))",
        out_path.display(),
        summary.patch_hash,
        summary.shuffle_attempts
    );
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(args.loglevel.as_str()),
    )
        .format_timestamp_millis()
        .init();

    let Some(flags) = Flags::decode_flagstring(&args.flagstring) else {
        error!("invalid flagstring {:?}", args.flagstring);
        return ExitCode::from(EXIT_INVALID_FLAGS);
    };
    let solver_kind = match args.solver.as_str() {
        "assignment" => SolverKind::Assignment,
        "backtracking" => SolverKind::Backtracking,
        "rejection" => SolverKind::Rejection,
        other => {
            error!("unknown solver backend {other:?}");
            return ExitCode::from(EXIT_INVALID_FLAGS);
        }
    };

    match run(&args, &flags, solver_kind).context("generation failed") {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            match err.downcast_ref::<RandomizeError>() {
                Some(RandomizeError::ConstraintConflict { .. }) => {
                    ExitCode::from(EXIT_INVALID_FLAGS)
                }
                Some(RandomizeError::NoFeasibleAssignment { .. }) => {
                    ExitCode::from(EXIT_NO_FEASIBLE_ASSIGNMENT)
                }
                Some(RandomizeError::Unbeatable { .. }) => ExitCode::from(EXIT_UNBEATABLE),
                _ => ExitCode::from(EXIT_IO),
            }
        }
    }
}
