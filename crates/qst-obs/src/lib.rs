#![deny(missing_docs)]

//! Observables estimated from samples of an RBM wavefunction.
//!
//! Every observable reduces to a per-sample local value; expectations are
//! sample means, or exact probability-weighted sums over the enumerated
//! Hilbert space for small systems.

/// Convergence of sampled estimates with the number of Gibbs steps.
pub mod convergence;
/// Diagonal neighbour couplings.
pub mod interactions;
/// The `Observable` trait and shared local-estimator helpers.
pub mod observable;
/// Single-site Pauli magnetisations.
pub mod pauli;
/// Transverse-field Ising chain energy.
pub mod tfim;

pub use convergence::{energy_convergence, ConvergencePoint};
pub use interactions::NeighbourInteraction;
pub use observable::Observable;
pub use pauli::{SigmaX, SigmaY, SigmaZ};
pub use tfim::TfimChainEnergy;
