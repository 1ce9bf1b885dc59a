use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use qst_core::RngHandle;
use qst_data::write_samples;
use qst_train::determinism::sampling_seed;

use super::load_model;

#[derive(Args, Debug)]
pub struct SampleArgs {
    /// Saved model (JSON or binary).
    #[arg(long)]
    pub model: PathBuf,
    /// Number of independent chains.
    #[arg(long, default_value_t = 1000)]
    pub num_samples: usize,
    /// Gibbs steps per chain.
    #[arg(short, long, default_value_t = 100)]
    pub k: usize,
    /// Sampling seed.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
    /// Output file; samples are printed when omitted.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

pub fn run(args: &SampleArgs) -> Result<(), Box<dyn Error>> {
    if args.num_samples == 0 {
        return Err("--num-samples must be positive".into());
    }
    let model = load_model(&args.model)?;
    let mut rng = RngHandle::from_seed(sampling_seed(args.seed, 0));
    let samples = model
        .as_wavefunction()
        .sample(args.k, args.num_samples, None, &mut rng)?;
    match &args.out {
        Some(path) => write_samples(path, &samples)?,
        None => {
            for row in samples.row_iter() {
                let line: Vec<String> = row.iter().map(|bit| format!("{bit:.0}")).collect();
                println!("{}", line.join(" "));
            }
        }
    }
    Ok(())
}
