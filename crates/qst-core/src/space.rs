//! Exact enumeration of the computational basis.

use nalgebra::DMatrix;

use crate::errors::{ErrorInfo, QstError};

/// Largest system that may be enumerated exactly.
pub const MAX_EXACT_SITES: usize = 20;

/// Returns all `2^num_sites` configurations, one per row.
///
/// Row `i` holds the big-endian bits of `i`: site 0 is the most significant
/// bit, so the row order matches the amplitude order of wavefunction files.
pub fn hilbert_space(num_sites: usize) -> Result<DMatrix<f64>, QstError> {
    if num_sites > MAX_EXACT_SITES {
        return Err(QstError::Space(
            ErrorInfo::new("space-too-large", "Hilbert space too large to enumerate")
                .with_context("sites", num_sites.to_string())
                .with_context("max_sites", MAX_EXACT_SITES.to_string()),
        ));
    }
    let dim = 1usize << num_sites;
    Ok(DMatrix::from_fn(dim, num_sites, |row, site| {
        ((row >> (num_sites - 1 - site)) & 1) as f64
    }))
}

/// Index of a configuration in [`hilbert_space`] order.
pub fn state_index<'a, I>(config: I) -> usize
where
    I: IntoIterator<Item = &'a f64>,
{
    config
        .into_iter()
        .fold(0usize, |acc, &bit| (acc << 1) | usize::from(bit > 0.5))
}

/// Maps a 0/1 occupation to a -1/+1 spin.
pub fn to_pm1(bit: f64) -> f64 {
    2.0 * bit - 1.0
}

/// Maps a -1/+1 spin back to a 0/1 occupation.
pub fn to_01(spin: f64) -> f64 {
    (spin + 1.0) / 2.0
}
