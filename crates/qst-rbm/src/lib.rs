#![deny(missing_docs)]

//! Binary RBMs, block Gibbs sampling and the RBM wavefunction families used
//! for quantum-state reconstruction.

/// Model persistence: artifacts, storage formats and autoloading.
pub mod artifact;
/// Complex wavefunction with separate amplitude and phase networks.
pub mod complex;
/// Parameter-shaped gradient containers.
pub mod gradient;
/// Canonical parameter hashing.
pub mod hash;
/// Positive (real, non-negative) wavefunction.
pub mod positive;
/// Binary restricted Boltzmann machine and Gibbs sampler.
pub mod rbm;
/// Common wavefunction trait and contrastive-divergence gradients.
pub mod wavefunction;

pub use artifact::{autoload, ArtifactFormat, LoadedModel, ModelArtifact, RbmTensors, ARTIFACT_SCHEMA};
pub use complex::ComplexWaveFunction;
pub use gradient::RbmGradient;
pub use hash::params_hash;
pub use positive::PositiveWaveFunction;
pub use rbm::{BinaryRbm, RbmInit};
pub use wavefunction::{ModelKind, WaveFunction};
