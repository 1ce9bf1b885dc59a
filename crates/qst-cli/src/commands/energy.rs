use std::error::Error;
use std::path::PathBuf;

use clap::{Args, ValueEnum};
use qst_core::{hilbert_space, RngHandle, MAX_EXACT_SITES};
use qst_obs::{
    energy_convergence, NeighbourInteraction, Observable, SigmaX, SigmaY, SigmaZ,
    TfimChainEnergy,
};
use qst_train::determinism::sampling_seed;
use serde::Serialize;

use super::{load_model, print_json};

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservableArg {
    Tfim,
    SigmaX,
    SigmaY,
    SigmaZ,
    Neighbour,
}

#[derive(Args, Debug)]
pub struct EnergyArgs {
    /// Saved model (JSON or binary).
    #[arg(long)]
    pub model: PathBuf,
    /// Observable to track.
    #[arg(long, value_enum, default_value_t = ObservableArg::Tfim)]
    pub observable: ObservableArg,
    /// Transverse field of the Ising chain.
    #[arg(long, default_value_t = 1.0)]
    pub field: f64,
    /// Report the total instead of the per-site value.
    #[arg(long)]
    pub total: bool,
    /// Cumulative Gibbs step counts at which to record the estimate.
    #[arg(long, value_delimiter = ',', default_values_t = vec![0, 1, 2, 5, 10, 20, 50, 100])]
    pub steps: Vec<usize>,
    /// Number of chains.
    #[arg(long, default_value_t = 1000)]
    pub num_samples: usize,
    /// Reference value; computed exactly for small systems when omitted.
    #[arg(long)]
    pub reference: Option<f64>,
    /// Sampling seed.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
}

#[derive(Debug, Serialize)]
struct EnergyReport {
    observable: String,
    reference: f64,
    points: Vec<qst_obs::ConvergencePoint>,
}

fn build_observable(args: &EnergyArgs) -> Box<dyn Observable> {
    match args.observable {
        ObservableArg::Tfim => Box::new(TfimChainEnergy {
            field: args.field,
            density: !args.total,
        }),
        ObservableArg::SigmaX => Box::new(SigmaX::default()),
        ObservableArg::SigmaY => Box::new(SigmaY::default()),
        ObservableArg::SigmaZ => Box::new(SigmaZ::default()),
        ObservableArg::Neighbour => Box::new(NeighbourInteraction::default()),
    }
}

pub fn run(args: &EnergyArgs) -> Result<(), Box<dyn Error>> {
    let model = load_model(&args.model)?;
    let model = model.as_wavefunction();
    let observable = build_observable(args);
    let reference = match args.reference {
        Some(value) => value,
        None if model.num_visible() <= MAX_EXACT_SITES => {
            observable.exact_expectation(model, &hilbert_space(model.num_visible())?)?
        }
        None => return Err("--reference is required for systems too large to enumerate".into()),
    };
    let mut rng = RngHandle::from_seed(sampling_seed(args.seed, 1));
    let points = energy_convergence(
        model,
        observable.as_ref(),
        &args.steps,
        args.num_samples,
        reference,
        &mut rng,
    )?;
    print_json(&EnergyReport {
        observable: observable.name(),
        reference,
        points,
    })
}
