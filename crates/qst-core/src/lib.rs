#![deny(missing_docs)]
#![doc = "Core types for RBM quantum-state reconstruction: errors, seeding, complex helpers, bases, unitary rotations and exact Hilbert-space enumeration."]

pub mod basis;
pub mod cplx;
pub mod errors;
pub mod provenance;
pub mod rng;
pub mod space;
pub mod unitaries;

pub use basis::{Basis, REFERENCE_LABEL};
pub use cplx::Complex64;
pub use errors::{ErrorInfo, QstError};
pub use provenance::{RunProvenance, SchemaVersion};
pub use rng::{derive_substream_seed, RngHandle};
pub use space::{hilbert_space, state_index, to_01, to_pm1, MAX_EXACT_SITES};
pub use unitaries::{
    rotate_basis_state, rotate_psi, rotate_psi_inner_prod, RotatedAmplitude, RotatedState,
    Unitary, UnitaryDict, UnitaryPlanes,
};

/// Batch of binary configurations, one sample per row.
pub type Configurations = nalgebra::DMatrix<f64>;
