use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use qst_core::UnitaryDict;
use qst_data::{load_data, DataPaths};
use serde::Serialize;

use super::print_json;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Measurement outcomes, one configuration per line.
    #[arg(long)]
    pub train_samples: PathBuf,
    /// Basis of each measurement line.
    #[arg(long)]
    pub train_bases: Option<PathBuf>,
    /// Every basis that may appear in the data.
    #[arg(long)]
    pub unique_bases: Option<PathBuf>,
    /// Exact target wavefunction.
    #[arg(long)]
    pub target: Option<PathBuf>,
    /// Expected number of sites; inferred from the data when omitted.
    #[arg(long)]
    pub num_visible: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ValidationReport {
    rows: usize,
    sites: usize,
    reference_rows: usize,
    bases: Vec<String>,
    has_target: bool,
}

pub fn run(args: &ValidateArgs) -> Result<(), Box<dyn Error>> {
    let data = load_data(&DataPaths {
        train_samples: args.train_samples.clone(),
        train_bases: args.train_bases.clone(),
        unique_bases: args.unique_bases.clone(),
        target: args.target.clone(),
    })?;
    let training = &data.training;
    training.validate(
        args.num_visible.unwrap_or(training.num_visible()),
        &UnitaryDict::standard(),
        data.unique_bases.as_deref(),
    )?;
    print_json(&ValidationReport {
        rows: training.len(),
        sites: training.num_visible(),
        reference_rows: training.reference_samples().nrows(),
        bases: training
            .unique_bases()
            .iter()
            .map(|basis| basis.to_string())
            .collect(),
        has_target: data.target.is_some(),
    })
}
