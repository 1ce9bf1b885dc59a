//! Measurement basis labels.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, QstError};

/// Label of the computational basis.
pub const REFERENCE_LABEL: char = 'Z';

/// Per-site measurement basis, e.g. `XZ` for a two-site rotation of site 0.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Basis(Vec<char>);

impl Basis {
    /// Creates a basis from explicit site labels.
    pub fn new(labels: Vec<char>) -> Self {
        Self(labels)
    }

    /// Reference basis over `num_sites` sites.
    pub fn reference(num_sites: usize) -> Self {
        Self(vec![REFERENCE_LABEL; num_sites])
    }

    /// Parses a basis line, ignoring whitespace between labels.
    pub fn parse(line: &str) -> Result<Self, QstError> {
        let labels: Vec<char> = line.chars().filter(|c| !c.is_whitespace()).collect();
        if labels.is_empty() {
            return Err(QstError::Basis(ErrorInfo::new(
                "empty-basis",
                "basis line contains no labels",
            )));
        }
        if let Some(bad) = labels.iter().find(|c| !c.is_alphanumeric()) {
            return Err(QstError::Basis(
                ErrorInfo::new("invalid-basis-label", "basis labels must be alphanumeric")
                    .with_context("label", bad.to_string())
                    .with_context("line", line.to_string()),
            ));
        }
        Ok(Self(labels))
    }

    /// Site labels in order.
    pub fn labels(&self) -> &[char] {
        &self.0
    }

    /// Number of sites covered by the basis.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true for a zero-site basis.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true when every site is measured in the computational basis.
    pub fn is_reference(&self) -> bool {
        self.0.iter().all(|&label| label == REFERENCE_LABEL)
    }

    /// Indices of sites measured in a rotated basis.
    pub fn rotated_sites(&self) -> Vec<usize> {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, &label)| label != REFERENCE_LABEL)
            .map(|(site, _)| site)
            .collect()
    }
}

impl Display for Basis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for label in &self.0 {
            write!(f, "{label}")?;
        }
        Ok(())
    }
}
