use std::collections::BTreeMap;
use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use qst_core::hilbert_space;
use qst_data::{load_bases, load_samples, load_unique_bases, load_wavefunction, TrainingSet};
use qst_train::{fidelity, kl_divergence, negative_log_likelihood};

use super::{load_model, print_json};

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Saved model (JSON or binary).
    #[arg(long)]
    pub model: PathBuf,
    /// Exact target wavefunction for fidelity and KL.
    #[arg(long)]
    pub target: Option<PathBuf>,
    /// Bases over which KL is averaged.
    #[arg(long)]
    pub unique_bases: Option<PathBuf>,
    /// Measurement data for the negative log-likelihood.
    #[arg(long)]
    pub samples: Option<PathBuf>,
    /// Basis of each measurement line in `--samples`.
    #[arg(long, requires = "samples")]
    pub sample_bases: Option<PathBuf>,
}

pub fn run(args: &EvaluateArgs) -> Result<(), Box<dyn Error>> {
    if args.target.is_none() && args.samples.is_none() {
        return Err("nothing to evaluate: pass --target and/or --samples".into());
    }
    let model = load_model(&args.model)?;
    let model = model.as_wavefunction();
    let space = hilbert_space(model.num_visible())?;
    let mut report = BTreeMap::new();

    if let Some(path) = &args.target {
        let target = load_wavefunction(path)?;
        let bases = args.unique_bases.as_deref().map(load_unique_bases).transpose()?;
        report.insert("fidelity", fidelity(model, &target, &space)?);
        report.insert("kl", kl_divergence(model, &target, &space, bases.as_deref())?);
    }
    if let Some(path) = &args.samples {
        let bases = args.sample_bases.as_deref().map(load_bases).transpose()?;
        let data = TrainingSet::new(load_samples(path)?, bases)?;
        data.validate(model.num_visible(), model.unitaries(), None)?;
        report.insert(
            "nll",
            negative_log_likelihood(model, data.samples(), data.bases(), &space)?,
        );
    }
    print_json(&report)
}
