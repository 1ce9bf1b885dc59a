use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use nalgebra::{DMatrix, DVector};
use qst_core::errors::{ErrorInfo, QstError};
use qst_core::{SchemaVersion, UnitaryDict, UnitaryPlanes};
use serde::{Deserialize, Serialize};

use crate::complex::ComplexWaveFunction;
use crate::hash::params_hash;
use crate::positive::PositiveWaveFunction;
use crate::rbm::BinaryRbm;
use crate::wavefunction::{ModelKind, WaveFunction};

/// Schema written into every artifact.
pub const ARTIFACT_SCHEMA: SchemaVersion = SchemaVersion::new(1, 0, 0);

/// Named tensors of one RBM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RbmTensors {
    /// Weight rows, one per hidden unit.
    pub weights: Vec<Vec<f64>>,
    /// Visible bias.
    pub visible_bias: Vec<f64>,
    /// Hidden bias.
    pub hidden_bias: Vec<f64>,
}

impl RbmTensors {
    /// Copies the tensors of `rbm`.
    pub fn from_rbm(rbm: &BinaryRbm) -> Self {
        let weights = rbm
            .weights()
            .row_iter()
            .map(|row| row.iter().copied().collect())
            .collect();
        Self {
            weights,
            visible_bias: rbm.visible_bias().iter().copied().collect(),
            hidden_bias: rbm.hidden_bias().iter().copied().collect(),
        }
    }

    /// Rebuilds the RBM, validating every shape.
    pub fn to_rbm(&self) -> Result<BinaryRbm, QstError> {
        let num_hidden = self.weights.len();
        let num_visible = self.visible_bias.len();
        if let Some(row) = self.weights.iter().position(|row| row.len() != num_visible) {
            return Err(QstError::Serde(
                ErrorInfo::new("ragged-weights", "weight rows differ in length")
                    .with_context("row", row.to_string())
                    .with_context("expected", num_visible.to_string()),
            ));
        }
        let weights = DMatrix::from_fn(num_hidden, num_visible, |row, col| self.weights[row][col]);
        BinaryRbm::from_parts(
            weights,
            DVector::from_vec(self.visible_bias.clone()),
            DVector::from_vec(self.hidden_bias.clone()),
        )
    }
}

/// On-disk encoding of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactFormat {
    /// Pretty-printed JSON.
    Json,
    /// Compact `bincode` payload.
    Binary,
}

impl ArtifactFormat {
    /// `.json` files are JSON, everything else is binary.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ArtifactFormat::Json,
            _ => ArtifactFormat::Binary,
        }
    }
}

/// Self-describing snapshot of a trained model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// Payload schema.
    pub schema_version: SchemaVersion,
    /// Model family.
    pub kind: ModelKind,
    /// Number of sites.
    pub num_visible: usize,
    /// Hidden units of the amplitude network.
    pub num_hidden: usize,
    /// Amplitude network tensors.
    pub amplitude: RbmTensors,
    /// Phase network tensors (complex models only).
    #[serde(default)]
    pub phase: Option<RbmTensors>,
    /// Unitary dictionary as real/imaginary planes.
    pub unitaries: BTreeMap<String, UnitaryPlanes>,
    /// Canonical parameter hash at save time.
    pub params_hash: String,
    /// User supplied metadata.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl ModelArtifact {
    /// Captures the parameters of `model`.
    pub fn from_model<W: WaveFunction + ?Sized>(
        model: &W,
        metadata: BTreeMap<String, String>,
    ) -> Self {
        Self {
            schema_version: ARTIFACT_SCHEMA,
            kind: model.kind(),
            num_visible: model.num_visible(),
            num_hidden: model.num_hidden(),
            amplitude: RbmTensors::from_rbm(model.amplitude_rbm()),
            phase: model.phase_rbm().map(RbmTensors::from_rbm),
            unitaries: model.unitaries().to_planes(),
            params_hash: model.params_hash(),
            metadata,
        }
    }

    /// Rebuilds the stored networks, amplitude first.
    pub fn networks(&self) -> Result<Vec<BinaryRbm>, QstError> {
        let mut networks = vec![self.amplitude.to_rbm()?];
        match (self.kind, &self.phase) {
            (ModelKind::Positive, None) => {}
            (ModelKind::Complex, Some(phase)) => networks.push(phase.to_rbm()?),
            (kind, phase) => {
                return Err(QstError::Serde(
                    ErrorInfo::new("artifact-kind-mismatch", "phase tensors do not match model kind")
                        .with_context("kind", kind.as_str())
                        .with_context("has_phase", phase.is_some().to_string()),
                ))
            }
        }
        if networks[0].num_visible() != self.num_visible
            || networks[0].num_hidden() != self.num_hidden
        {
            return Err(QstError::Serde(
                ErrorInfo::new("artifact-shape-mismatch", "stored sizes disagree with tensors")
                    .with_context("num_visible", self.num_visible.to_string())
                    .with_context("num_hidden", self.num_hidden.to_string()),
            ));
        }
        let refs: Vec<&BinaryRbm> = networks.iter().collect();
        let recomputed = params_hash(self.kind, &refs);
        if recomputed != self.params_hash {
            return Err(QstError::Serde(
                ErrorInfo::new("hash-mismatch", "artifact parameters do not match stored hash")
                    .with_context("stored", self.params_hash.clone())
                    .with_context("recomputed", recomputed),
            ));
        }
        Ok(networks)
    }

    /// Writes the artifact, choosing the encoding from the file extension.
    pub fn store(&self, path: &Path) -> Result<(), QstError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|err| QstError::io("artifact-mkdir", parent, err))?;
            }
        }
        let bytes = match ArtifactFormat::from_path(path) {
            ArtifactFormat::Json => serde_json::to_vec_pretty(self)
                .map_err(|err| QstError::io("artifact-serialize", path, err))?,
            ArtifactFormat::Binary => bincode::serialize(self)
                .map_err(|err| QstError::io("artifact-serialize", path, err))?,
        };
        fs::write(path, bytes).map_err(|err| QstError::io("artifact-write", path, err))
    }

    /// Reads an artifact written by [`ModelArtifact::store`].
    pub fn load(path: &Path) -> Result<Self, QstError> {
        let bytes = fs::read(path).map_err(|err| QstError::io("artifact-read", path, err))?;
        let artifact: ModelArtifact = match ArtifactFormat::from_path(path) {
            ArtifactFormat::Json => serde_json::from_slice(&bytes)
                .map_err(|err| QstError::io("artifact-parse", path, err))?,
            ArtifactFormat::Binary => bincode::deserialize(&bytes)
                .map_err(|err| QstError::io("artifact-parse", path, err))?,
        };
        if !ARTIFACT_SCHEMA.is_compatible_with(&artifact.schema_version) {
            return Err(QstError::Serde(
                ErrorInfo::new("schema-mismatch", "unsupported artifact schema")
                    .with_context("path", path.display().to_string())
                    .with_context(
                        "found",
                        format!(
                            "{}.{}.{}",
                            artifact.schema_version.major,
                            artifact.schema_version.minor,
                            artifact.schema_version.patch
                        ),
                    ),
            ));
        }
        Ok(artifact)
    }

    /// Reconstructs the model described by the artifact.
    pub fn to_model(&self) -> Result<LoadedModel, QstError> {
        let unitaries = UnitaryDict::from_planes(&self.unitaries)?;
        let mut networks = self.networks()?.into_iter();
        let rbm_am = networks.next().ok_or_else(|| {
            QstError::Serde(ErrorInfo::new("artifact-empty", "artifact holds no networks"))
        })?;
        match self.kind {
            ModelKind::Positive => Ok(LoadedModel::Positive(
                PositiveWaveFunction::from_rbm(rbm_am).with_unitaries(unitaries),
            )),
            ModelKind::Complex => {
                let rbm_ph = networks.next().ok_or_else(|| {
                    QstError::Serde(ErrorInfo::new(
                        "artifact-kind-mismatch",
                        "complex artifact holds no phase network",
                    ))
                })?;
                Ok(LoadedModel::Complex(ComplexWaveFunction::from_rbms(
                    rbm_am, rbm_ph, unitaries,
                )?))
            }
        }
    }
}

/// Model reconstructed by [`autoload`].
#[derive(Debug, Clone, PartialEq)]
pub enum LoadedModel {
    /// Positive wavefunction.
    Positive(PositiveWaveFunction),
    /// Complex wavefunction.
    Complex(ComplexWaveFunction),
}

impl LoadedModel {
    /// Borrows the model through the common trait.
    pub fn as_wavefunction(&self) -> &dyn WaveFunction {
        match self {
            LoadedModel::Positive(model) => model,
            LoadedModel::Complex(model) => model,
        }
    }

    /// Mutably borrows the model through the common trait.
    pub fn as_wavefunction_mut(&mut self) -> &mut dyn WaveFunction {
        match self {
            LoadedModel::Positive(model) => model,
            LoadedModel::Complex(model) => model,
        }
    }

    /// Model family.
    pub fn kind(&self) -> ModelKind {
        self.as_wavefunction().kind()
    }
}

/// Rebuilds a model, its sizes and its unitary dictionary from `path` alone.
///
/// Returns the model together with the user metadata stored beside it.
pub fn autoload(path: &Path) -> Result<(LoadedModel, BTreeMap<String, String>), QstError> {
    let artifact = ModelArtifact::load(path)?;
    let model = artifact.to_model()?;
    Ok((model, artifact.metadata))
}
