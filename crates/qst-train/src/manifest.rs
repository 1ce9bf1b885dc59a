use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use qst_core::errors::{ErrorInfo, QstError};
use qst_core::RunProvenance;
use qst_data::TrainingSet;
use qst_rbm::ModelKind;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::TrainConfig;

/// Structured manifest describing a completed training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    /// Configuration used for the run.
    pub config: TrainConfig,
    /// Master seed used to derive every random stream.
    pub master_seed: u64,
    /// Optional seed label captured from the configuration.
    pub seed_label: Option<String>,
    /// Model family.
    pub model_kind: ModelKind,
    /// Sites of the model.
    pub num_visible: usize,
    /// Hidden units per network.
    pub num_hidden: usize,
    /// Epoch the run started from (non-zero when resumed).
    pub starting_epoch: usize,
    /// Last completed epoch.
    pub last_epoch: usize,
    /// True when early stopping ended the run.
    pub stopped_early: bool,
    /// Canonical hash of the final parameters.
    pub params_hash: String,
    /// Model file relative to the run directory.
    pub model_file: Option<PathBuf>,
    /// Metrics file relative to the run directory.
    pub metrics_file: Option<PathBuf>,
    /// Checkpoints still on disk, relative to the run directory.
    pub checkpoints: Vec<PathBuf>,
    /// Final metric values.
    #[serde(default)]
    pub final_metrics: BTreeMap<String, f64>,
    /// Input hash, timestamp and tool versions.
    pub provenance: RunProvenance,
}

impl RunManifest {
    /// Writes the manifest to a JSON file.
    pub fn write(&self, path: &Path) -> Result<(), QstError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| QstError::io("manifest-mkdir", parent, err))?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|err| QstError::io("manifest-serialize", path, err))?;
        fs::write(path, json).map_err(|err| QstError::io("manifest-write", path, err))
    }

    /// Loads a manifest from disk.
    pub fn load(path: &Path) -> Result<Self, QstError> {
        let contents =
            fs::read_to_string(path).map_err(|err| QstError::io("manifest-read", path, err))?;
        serde_json::from_str(&contents).map_err(|err| {
            QstError::Serde(
                ErrorInfo::new("manifest-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }
}

/// SHA-256 over the sample bits and bases of a training record.
pub fn input_hash(data: &TrainingSet) -> String {
    let mut hasher = Sha256::new();
    hasher.update((data.len() as u64).to_le_bytes());
    hasher.update((data.num_visible() as u64).to_le_bytes());
    for row in data.samples().row_iter() {
        let bits: Vec<u8> = row.iter().map(|&bit| u8::from(bit > 0.5)).collect();
        hasher.update(&bits);
    }
    if let Some(bases) = data.bases() {
        for basis in bases {
            hasher.update(basis.to_string().as_bytes());
            hasher.update(b"\n");
        }
    }
    hex::encode(hasher.finalize())
}

/// Provenance record stamped with the current UTC time.
pub fn provenance(data: &TrainingSet, seed: u64) -> RunProvenance {
    let mut tool_versions = BTreeMap::new();
    tool_versions.insert(
        env!("CARGO_PKG_NAME").to_string(),
        env!("CARGO_PKG_VERSION").to_string(),
    );
    RunProvenance {
        input_hash: input_hash(data),
        seed,
        created_at: chrono::Utc::now().to_rfc3339(),
        tool_versions,
    }
}
