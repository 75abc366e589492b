//! Batch warp driver: one landmark-derived transform applied to a single ion
//! image or to every ion image in a directory.
//!
//! Shared inputs (landmarks, optical image, input path) are validated before
//! anything is written. Per-file failures are reported and skipped.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::affine::{estimate_from_pairs, fit_stats, AffineTransform, EstimateError, FitStats};
use crate::grid::{Image, LoadError};
use crate::landmarks::CorrespondenceSet;
use crate::resample::{warp, WarpConfig};
use crate::table::{self, TableError};

pub const DEFAULT_WARP_DIR: &str = "EITwarp";
pub const DEFAULT_PREFIX: &str = "wpd";

/// Output naming, input selection and resampling parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub out_dir: PathBuf,
    pub prefix: String,
    /// Extensions (without dot, case-insensitive) picked up from directories.
    pub extensions: Vec<String>,
    pub warp: WarpConfig,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from(DEFAULT_WARP_DIR),
            prefix: DEFAULT_PREFIX.to_string(),
            extensions: vec!["csv".to_string()],
            warp: WarpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarpInput {
    File(PathBuf),
    Directory(PathBuf),
}

#[derive(Debug, Clone)]
pub struct WarpJob {
    pub landmarks: PathBuf,
    pub optical: PathBuf,
    pub input: WarpInput,
    pub config: BatchConfig,
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("cannot load landmarks: {0}")]
    Landmarks(#[source] TableError),
    #[error("cannot load optical image: {0}")]
    Optical(#[source] LoadError),
    #[error("input {path} does not exist")]
    MissingInput { path: PathBuf },
    #[error("{path} is not a regular file")]
    NotAFile { path: PathBuf },
    #[error("{path} is not a directory")]
    NotADirectory { path: PathBuf },
    #[error("failed to list {path}: {source}")]
    ListDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("transform estimation failed: {0}")]
    Estimate(#[from] EstimateError),
    #[error("failed to create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A file that could not be warped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub transform: AffineTransform,
    pub stats: FitStats,
    pub written: Vec<PathBuf>,
    pub failed: Vec<FileFailure>,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// `<out_dir>/<prefix><file name>`.
pub fn output_path(out_dir: &Path, prefix: &str, input: &Path) -> PathBuf {
    let mut name = std::ffi::OsString::from(prefix);
    if let Some(file_name) = input.file_name() {
        name.push(file_name);
    }
    out_dir.join(name)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|known| known.eq_ignore_ascii_case(ext)))
}

/// Resolve the job input into the ordered list of files to warp.
///
/// Directories are scanned non-recursively; only regular files with a
/// matching extension are kept, sorted by name.
pub fn select_inputs(input: &WarpInput, extensions: &[String]) -> Result<Vec<PathBuf>, BatchError> {
    match input {
        WarpInput::File(path) => {
            if !path.exists() {
                return Err(BatchError::MissingInput { path: path.clone() });
            }
            if !path.is_file() {
                return Err(BatchError::NotAFile { path: path.clone() });
            }
            Ok(vec![path.clone()])
        }
        WarpInput::Directory(dir) => {
            if !dir.exists() {
                return Err(BatchError::MissingInput { path: dir.clone() });
            }
            if !dir.is_dir() {
                return Err(BatchError::NotADirectory { path: dir.clone() });
            }
            let list_err = |source| BatchError::ListDir {
                path: dir.clone(),
                source,
            };
            let mut files = Vec::new();
            for entry in fs::read_dir(dir).map_err(list_err)? {
                let path = entry.map_err(list_err)?.path();
                if path.is_file() && has_extension(&path, extensions) {
                    files.push(path);
                }
            }
            files.sort();
            Ok(files)
        }
    }
}

fn warp_file(
    input: &Path,
    transform: &AffineTransform,
    output_shape: [usize; 2],
    config: &BatchConfig,
) -> Result<PathBuf, TableError> {
    let source = table::read_image_table(input)?;
    let warped = warp(&source, transform, output_shape, &config.warp);
    let out = output_path(&config.out_dir, &config.prefix, input);
    table::write_image_table(&out, &warped)?;
    Ok(out)
}

/// Estimate the transform from the landmark file and warp every selected
/// input onto the optical image grid.
pub fn run_warp_job(job: &WarpJob) -> Result<BatchReport, BatchError> {
    let set = CorrespondenceSet::read(&job.landmarks).map_err(BatchError::Landmarks)?;
    let transform = estimate_from_pairs(set.pairs())?;
    let stats = fit_stats(&transform, set.pairs());
    tracing::info!(
        pairs = stats.n_pairs,
        rms_px = stats.rms_px,
        max_px = stats.max_px,
        "affine transform estimated"
    );

    let optical = Image::open(&job.optical).map_err(BatchError::Optical)?;
    let output_shape = optical.shape();
    let inputs = select_inputs(&job.input, &job.config.extensions)?;

    let out_dir = &job.config.out_dir;
    fs::create_dir_all(out_dir).map_err(|source| BatchError::CreateDir {
        path: out_dir.clone(),
        source,
    })?;

    let mut written = Vec::with_capacity(inputs.len());
    let mut failed = Vec::new();
    for input in &inputs {
        match warp_file(input, &transform, output_shape, &job.config) {
            Ok(out) => {
                tracing::debug!(input = %input.display(), output = %out.display(), "warped");
                written.push(out);
            }
            Err(e) => {
                tracing::warn!(input = %input.display(), error = %e, "skipping file");
                failed.push(FileFailure {
                    path: input.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    tracing::info!(
        written = written.len(),
        failed = failed.len(),
        out_dir = %out_dir.display(),
        "batch warp finished"
    );
    Ok(BatchReport {
        transform,
        stats,
        written,
        failed,
    })
}
