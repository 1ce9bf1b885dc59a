use std::collections::BTreeMap;
use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use qst_rbm::ModelArtifact;
use serde::Serialize;

use super::print_json;

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Saved model (JSON or binary).
    #[arg(long)]
    pub model: PathBuf,
}

#[derive(Debug, Serialize)]
struct ModelSummary {
    schema_version: String,
    kind: String,
    num_visible: usize,
    num_hidden: usize,
    num_params: usize,
    params_hash: String,
    unitaries: Vec<String>,
    metadata: BTreeMap<String, String>,
}

pub fn run(args: &InspectArgs) -> Result<(), Box<dyn Error>> {
    let artifact = ModelArtifact::load(&args.model)?;
    let networks = artifact.networks()?;
    let version = artifact.schema_version;
    print_json(&ModelSummary {
        schema_version: format!("{}.{}.{}", version.major, version.minor, version.patch),
        kind: artifact.kind.as_str().to_string(),
        num_visible: artifact.num_visible,
        num_hidden: artifact.num_hidden,
        num_params: networks.iter().map(|rbm| rbm.num_params()).sum(),
        params_hash: artifact.params_hash.clone(),
        unitaries: artifact.unitaries.keys().cloned().collect(),
        metadata: artifact.metadata.clone(),
    })
}
