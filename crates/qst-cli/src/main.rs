use std::error::Error;

use clap::{ArgAction, Parser, Subcommand};
use commands::{
    energy::{self, EnergyArgs},
    evaluate::{self, EvaluateArgs},
    inspect::{self, InspectArgs},
    sample::{self, SampleArgs},
    train::{self, TrainArgs},
    validate::{self, ValidateArgs},
};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "qst", version, about = "RBM quantum state tomography")]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug); RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train a wavefunction on measurement data.
    Train(TrainArgs),
    /// Draw configurations from a saved model.
    Sample(SampleArgs),
    /// Compare a saved model against a target state or data.
    Evaluate(EvaluateArgs),
    /// Follow a sampled observable as Gibbs chains equilibrate.
    Energy(EnergyArgs),
    /// Check data files for consistency without training.
    Validate(ValidateArgs),
    /// Print the header and metadata of a saved model.
    Inspect(InspectArgs),
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match cli.command {
        Command::Train(args) => train::run(&args),
        Command::Sample(args) => sample::run(&args),
        Command::Evaluate(args) => evaluate::run(&args),
        Command::Energy(args) => energy::run(&args),
        Command::Validate(args) => validate::run(&args),
        Command::Inspect(args) => inspect::run(&args),
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
