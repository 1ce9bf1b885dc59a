use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use nalgebra::DMatrix;
use qst_core::errors::{ErrorInfo, QstError};
use qst_core::{Basis, Complex64};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dataset::TrainingSet;

/// Locations of the files making up a measurement record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPaths {
    /// Measurement outcomes, one sample per line.
    pub train_samples: PathBuf,
    /// Basis of every sample line.
    #[serde(default)]
    pub train_bases: Option<PathBuf>,
    /// Distinct bases that appear in the record.
    #[serde(default)]
    pub unique_bases: Option<PathBuf>,
    /// Exact state used to score the reconstruction.
    #[serde(default)]
    pub target: Option<PathBuf>,
}

/// Everything read by [`load_data`].
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedData {
    /// Samples with their bases.
    pub training: TrainingSet,
    /// Listed distinct bases, if a file was given.
    pub unique_bases: Option<Vec<Basis>>,
    /// Target amplitudes, if a file was given.
    pub target: Option<Vec<Complex64>>,
}

fn read_text(path: &Path) -> Result<String, QstError> {
    fs::read_to_string(path).map_err(|err| QstError::io("read-failed", path, err))
}

fn content_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty())
}

fn data_error(code: &str, message: &str, source: &str, line: usize) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("source", source)
        .with_context("line", line.to_string())
}

fn parse_bit(token: &str, source: &str, line: usize) -> Result<f64, QstError> {
    match token.parse::<f64>() {
        Ok(value) if value == 0.0 || value == 1.0 => Ok(value),
        _ => Err(QstError::Data(
            data_error("invalid-bit", "measurement outcomes must be 0 or 1", source, line)
                .with_context("token", token),
        )),
    }
}

fn parse_sample_line(text: &str, source: &str, line: usize) -> Result<Vec<f64>, QstError> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.len() == 1 && tokens[0].len() > 1 && tokens[0].chars().all(|c| c.is_ascii_digit()) {
        return tokens[0]
            .chars()
            .map(|c| parse_bit(c.encode_utf8(&mut [0; 4]), source, line))
            .collect();
    }
    tokens
        .into_iter()
        .map(|token| parse_bit(token, source, line))
        .collect()
}

/// Parses measurement outcomes, one sample per line.
///
/// A line holds either whitespace-separated values or a run of contiguous
/// `0`/`1` digits. Blank lines are skipped; every sample must have the same
/// number of sites.
pub fn parse_samples(text: &str, source: &str) -> Result<DMatrix<f64>, QstError> {
    let mut rows: Vec<Vec<f64>> = Vec::new();
    for (line, content) in content_lines(text) {
        let row = parse_sample_line(content, source, line)?;
        if let Some(first) = rows.first() {
            if first.len() != row.len() {
                return Err(QstError::Data(
                    data_error("ragged-rows", "samples differ in site count", source, line)
                        .with_context("expected", first.len().to_string())
                        .with_context("found", row.len().to_string()),
                ));
            }
        }
        rows.push(row);
    }
    if rows.is_empty() {
        return Err(QstError::Data(
            ErrorInfo::new("empty-data", "no samples found").with_context("source", source),
        ));
    }
    let num_sites = rows[0].len();
    Ok(DMatrix::from_fn(rows.len(), num_sites, |row, col| rows[row][col]))
}

/// Parses one basis per non-blank line.
pub fn parse_bases(text: &str, source: &str) -> Result<Vec<Basis>, QstError> {
    let mut bases = Vec::new();
    for (line, content) in content_lines(text) {
        let basis = Basis::parse(content).map_err(|err| {
            err.with_context("source", source)
                .with_context("line", line.to_string())
        })?;
        bases.push(basis);
    }
    Ok(bases)
}

/// Parses target amplitudes: `re im` per line, or a single real column.
pub fn parse_wavefunction(text: &str, source: &str) -> Result<Vec<Complex64>, QstError> {
    let mut amplitudes = Vec::new();
    let mut width = None;
    for (line, content) in content_lines(text) {
        let values = content
            .split_whitespace()
            .map(|token| {
                token.parse::<f64>().map_err(|_| {
                    QstError::Data(
                        data_error("invalid-number", "amplitude is not a number", source, line)
                            .with_context("token", token),
                    )
                })
            })
            .collect::<Result<Vec<f64>, _>>()?;
        if values.is_empty() || values.len() > 2 || width.map_or(false, |w| w != values.len()) {
            return Err(QstError::Data(
                data_error(
                    "ragged-rows",
                    "amplitude lines need one or two columns consistently",
                    source,
                    line,
                )
                .with_context("found", values.len().to_string()),
            ));
        }
        width = Some(values.len());
        amplitudes.push(Complex64::new(values[0], values.get(1).copied().unwrap_or(0.0)));
    }
    if amplitudes.is_empty() || !amplitudes.len().is_power_of_two() {
        return Err(QstError::Data(
            ErrorInfo::new(
                "psi-length",
                "wavefunction length must be a non-zero power of two",
            )
            .with_context("source", source)
            .with_context("amplitudes", amplitudes.len().to_string()),
        ));
    }
    Ok(amplitudes)
}

/// Reads a training-samples file.
pub fn load_samples(path: &Path) -> Result<DMatrix<f64>, QstError> {
    let samples = parse_samples(&read_text(path)?, &path.display().to_string())?;
    debug!(path = %path.display(), rows = samples.nrows(), sites = samples.ncols(), "loaded samples");
    Ok(samples)
}

/// Reads a per-sample bases file.
pub fn load_bases(path: &Path) -> Result<Vec<Basis>, QstError> {
    let bases = parse_bases(&read_text(path)?, &path.display().to_string())?;
    debug!(path = %path.display(), rows = bases.len(), "loaded bases");
    Ok(bases)
}

/// Reads a unique-bases file; repeated entries are an error.
pub fn load_unique_bases(path: &Path) -> Result<Vec<Basis>, QstError> {
    let bases = load_bases(path)?;
    let mut seen = std::collections::BTreeSet::new();
    for basis in &bases {
        if !seen.insert(basis.clone()) {
            return Err(QstError::Data(
                ErrorInfo::new("duplicate-basis", "unique-bases file repeats a basis")
                    .with_context("path", path.display().to_string())
                    .with_context("basis", basis.to_string()),
            ));
        }
    }
    Ok(bases)
}

/// Reads a target wavefunction file.
pub fn load_wavefunction(path: &Path) -> Result<Vec<Complex64>, QstError> {
    parse_wavefunction(&read_text(path)?, &path.display().to_string())
}

/// Reads every file named in `paths` and pairs samples with their bases.
pub fn load_data(paths: &DataPaths) -> Result<LoadedData, QstError> {
    let samples = load_samples(&paths.train_samples)?;
    let bases = paths.train_bases.as_deref().map(load_bases).transpose()?;
    let training = TrainingSet::new(samples, bases)?;
    let unique_bases = paths
        .unique_bases
        .as_deref()
        .map(load_unique_bases)
        .transpose()?;
    let target = paths.target.as_deref().map(load_wavefunction).transpose()?;
    if let Some(target) = &target {
        let expected = u32::try_from(training.num_visible())
            .ok()
            .and_then(|sites| 1usize.checked_shl(sites));
        if expected != Some(target.len()) {
            return Err(QstError::Data(
                ErrorInfo::new("psi-size-mismatch", "target size does not match sample width")
                    .with_context("sites", training.num_visible().to_string())
                    .with_context("found", target.len().to_string()),
            ));
        }
    }
    Ok(LoadedData {
        training,
        unique_bases,
        target,
    })
}

/// Writes samples as space-separated `0`/`1` values, one per line.
pub fn write_samples(path: &Path, samples: &DMatrix<f64>) -> Result<(), QstError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|err| QstError::io("write-failed", parent, err))?;
        }
    }
    let mut file = fs::File::create(path).map_err(|err| QstError::io("write-failed", path, err))?;
    let mut buffer = String::with_capacity(samples.nrows() * samples.ncols() * 2);
    for row in samples.row_iter() {
        let line: Vec<&str> = row
            .iter()
            .map(|&bit| if bit > 0.5 { "1" } else { "0" })
            .collect();
        buffer.push_str(&line.join(" "));
        buffer.push('\n');
    }
    file.write_all(buffer.as_bytes())
        .map_err(|err| QstError::io("write-failed", path, err))
}
