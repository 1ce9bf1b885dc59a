#![deny(missing_docs)]

//! Loading and validating measurement records for quantum-state reconstruction.

/// Sample/basis pairing and consistency checks.
pub mod dataset;
/// Text-file readers and writers.
pub mod ingest;

pub use dataset::TrainingSet;
pub use ingest::{
    load_bases, load_data, load_samples, load_unique_bases, load_wavefunction, parse_bases,
    parse_samples, parse_wavefunction, write_samples, DataPaths, LoadedData,
};
