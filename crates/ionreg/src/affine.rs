//! 2-D affine transform estimation from landmark correspondences.
//!
//! Provides:
//! - Least-squares affine fit from ≥3 non-collinear point pairs, with
//!   Hartley normalization and an explicit rank check.
//! - Point mapping, inversion and composition.
//! - Residual statistics for a fitted transform.

use std::cmp::Ordering;

use nalgebra::{DMatrix, Matrix3};
use thiserror::Error;

use crate::landmarks::LandmarkPair;

/// Minimum number of pairs for a determined affine fit.
pub const MIN_PAIRS: usize = 3;

/// Relative singular-value threshold below which the design matrix is
/// considered rank-deficient.
const RANK_TOL: f64 = 1e-10;

// ── Error type ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EstimateError {
    #[error("too few landmark pairs: need {needed}, got {got}")]
    TooFewPairs { needed: usize, got: usize },
    #[error("source and destination point counts differ ({src} vs {dst})")]
    LengthMismatch { src: usize, dst: usize },
    #[error("landmark pair {index} has a non-finite coordinate")]
    NonFinite { index: usize },
    #[error("degenerate landmark configuration: {pairs} pairs span rank {rank} (points are collinear or coincident)")]
    Degenerate { pairs: usize, rank: usize },
    #[error("numerical failure: {0}")]
    NumericalFailure(String),
}

// ── Transform ────────────────────────────────────────────────────────────

/// Affine map `[x', y'] = A [x, y] + t`, stored as a homogeneous 3×3
/// matrix whose last row is `[0, 0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineTransform {
    m: Matrix3<f64>,
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl AffineTransform {
    pub fn identity() -> Self {
        Self {
            m: Matrix3::identity(),
        }
    }

    /// Pure translation by `(tx, ty)`.
    pub fn translation(tx: f64, ty: f64) -> Self {
        Self::from_params([1.0, 0.0, tx, 0.0, 1.0, ty])
    }

    /// `[a, b, c, d, e, f]` with `x' = a x + b y + c`, `y' = d x + e y + f`.
    pub fn from_params(p: [f64; 6]) -> Self {
        Self {
            m: Matrix3::new(p[0], p[1], p[2], p[3], p[4], p[5], 0.0, 0.0, 1.0),
        }
    }

    /// Accept a homogeneous matrix only if its last row is `[0, 0, 1]`.
    pub fn from_matrix(m: Matrix3<f64>) -> Option<Self> {
        let affine = m[(2, 0)].abs() < 1e-12 && m[(2, 1)].abs() < 1e-12 && (m[(2, 2)] - 1.0).abs() < 1e-12;
        affine.then_some(Self { m })
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.m
    }

    /// Parameters in the order accepted by [`from_params`](Self::from_params).
    pub fn params(&self) -> [f64; 6] {
        let m = &self.m;
        [m[(0, 0)], m[(0, 1)], m[(0, 2)], m[(1, 0)], m[(1, 1)], m[(1, 2)]]
    }

    /// Row-major 3×3 array, for serialization.
    pub fn to_array(&self) -> [[f64; 3]; 3] {
        let m = &self.m;
        [
            [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
            [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
            [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
        ]
    }

    /// Map a point.
    #[inline]
    pub fn apply(&self, p: [f64; 2]) -> [f64; 2] {
        let m = &self.m;
        [
            m[(0, 0)] * p[0] + m[(0, 1)] * p[1] + m[(0, 2)],
            m[(1, 0)] * p[0] + m[(1, 1)] * p[1] + m[(1, 2)],
        ]
    }

    /// Inverse map, or `None` when the linear part is singular.
    pub fn inverse(&self) -> Option<Self> {
        let inv = self.m.try_inverse()?;
        Self::from_matrix(inv)
    }

    /// `self ∘ other`: apply `other` first, then `self`.
    pub fn compose(&self, other: &Self) -> Self {
        Self { m: self.m * other.m }
    }

    /// Determinant of the linear part.
    pub fn determinant(&self) -> f64 {
        self.m[(0, 0)] * self.m[(1, 1)] - self.m[(0, 1)] * self.m[(1, 0)]
    }
}

/// Serialized as the row-major 3×3 array.
impl serde::Serialize for AffineTransform {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serde::Serialize::serialize(&self.to_array(), serializer)
    }
}

// ── Hartley normalization ────────────────────────────────────────────────

/// Compute a normalizing similarity: translate the centroid to the origin
/// and scale so the mean distance from the origin is sqrt(2).
fn normalize_points(pts: &[[f64; 2]]) -> (Matrix3<f64>, Vec<[f64; 2]>) {
    let n = pts.len() as f64;
    let cx: f64 = pts.iter().map(|p| p[0]).sum::<f64>() / n;
    let cy: f64 = pts.iter().map(|p| p[1]).sum::<f64>() / n;

    let mean_dist: f64 = pts
        .iter()
        .map(|p| ((p[0] - cx).powi(2) + (p[1] - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;

    let s = if mean_dist > 1e-15 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    let normalized = pts
        .iter()
        .map(|p| [s * (p[0] - cx), s * (p[1] - cy)])
        .collect();

    (t, normalized)
}

// ── Least squares ────────────────────────────────────────────────────────

/// Estimate the affine transform mapping `src` onto `dst` in the
/// least-squares sense.
///
/// The six parameters decouple into two 3-unknown problems sharing the
/// design matrix `[x, y, 1]`; both are solved through one SVD.
pub fn estimate_affine(
    src: &[[f64; 2]],
    dst: &[[f64; 2]],
) -> Result<AffineTransform, EstimateError> {
    if src.len() != dst.len() {
        return Err(EstimateError::LengthMismatch {
            src: src.len(),
            dst: dst.len(),
        });
    }
    let n = src.len();
    if n < MIN_PAIRS {
        return Err(EstimateError::TooFewPairs {
            needed: MIN_PAIRS,
            got: n,
        });
    }
    if let Some(index) = src
        .iter()
        .zip(dst)
        .position(|(s, d)| !(s[0].is_finite() && s[1].is_finite() && d[0].is_finite() && d[1].is_finite()))
    {
        return Err(EstimateError::NonFinite { index });
    }

    let (t_src, src_n) = normalize_points(src);
    let (t_dst, dst_n) = normalize_points(dst);

    let a = DMatrix::from_fn(n, 3, |i, j| match j {
        0 => src_n[i][0],
        1 => src_n[i][1],
        _ => 1.0,
    });
    let b = DMatrix::from_fn(n, 2, |i, j| dst_n[i][j]);

    let svd = a.svd(true, true);
    let sv_max = svd.singular_values.max();
    let rank = svd
        .singular_values
        .iter()
        .filter(|&&s| s > RANK_TOL * sv_max.max(f64::MIN_POSITIVE))
        .count();
    if rank < 3 {
        return Err(EstimateError::Degenerate { pairs: n, rank });
    }

    let x = svd
        .solve(&b, RANK_TOL * sv_max)
        .map_err(|e| EstimateError::NumericalFailure(e.to_string()))?;

    // Columns of x hold [a, b, c] for x' and [d, e, f] for y'.
    #[rustfmt::skip]
    let h_norm = Matrix3::new(
        x[(0, 0)], x[(1, 0)], x[(2, 0)],
        x[(0, 1)], x[(1, 1)], x[(2, 1)],
        0.0, 0.0, 1.0,
    );

    let t_dst_inv = t_dst
        .try_inverse()
        .ok_or_else(|| EstimateError::NumericalFailure("T_dst not invertible".into()))?;
    let m = t_dst_inv * h_norm * t_src;

    let params = [m[(0, 0)], m[(0, 1)], m[(0, 2)], m[(1, 0)], m[(1, 1)], m[(1, 2)]];
    if params.iter().any(|v| !v.is_finite()) {
        return Err(EstimateError::NumericalFailure(
            "non-finite affine parameters".into(),
        ));
    }
    Ok(AffineTransform::from_params(params))
}

/// Estimate from landmark pairs (source = first panel, destination = second).
pub fn estimate_from_pairs(pairs: &[LandmarkPair]) -> Result<AffineTransform, EstimateError> {
    let src: Vec<[f64; 2]> = pairs.iter().map(|p| p.src).collect();
    let dst: Vec<[f64; 2]> = pairs.iter().map(|p| p.dst).collect();
    estimate_affine(&src, &dst)
}

// ── Residuals ────────────────────────────────────────────────────────────

/// Residual statistics of a fitted transform over its landmarks (pixels).
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FitStats {
    pub n_pairs: usize,
    pub rms_px: f64,
    pub mean_px: f64,
    pub p95_px: f64,
    pub max_px: f64,
}

/// Per-pair distance `||T(src) - dst||`.
pub fn residuals(t: &AffineTransform, src: &[[f64; 2]], dst: &[[f64; 2]]) -> Vec<f64> {
    src.iter()
        .zip(dst)
        .map(|(s, d)| {
            let p = t.apply(*s);
            ((p[0] - d[0]).powi(2) + (p[1] - d[1]).powi(2)).sqrt()
        })
        .collect()
}

/// Mean and P95 summary for a mutable error slice.
fn mean_and_p95(errors: &mut [f64]) -> (f64, f64) {
    if errors.is_empty() {
        return (0.0, 0.0);
    }
    errors.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mean = errors.iter().sum::<f64>() / errors.len() as f64;
    let idx = ((errors.len() as f64 * 0.95) as usize).min(errors.len() - 1);
    (mean, errors[idx])
}

pub fn fit_stats(t: &AffineTransform, pairs: &[LandmarkPair]) -> FitStats {
    let src: Vec<[f64; 2]> = pairs.iter().map(|p| p.src).collect();
    let dst: Vec<[f64; 2]> = pairs.iter().map(|p| p.dst).collect();
    let mut errors = residuals(t, &src, &dst);
    let rms = if errors.is_empty() {
        0.0
    } else {
        (errors.iter().map(|e| e * e).sum::<f64>() / errors.len() as f64).sqrt()
    };
    let (mean, p95) = mean_and_p95(&mut errors);
    FitStats {
        n_pairs: pairs.len(),
        rms_px: rms,
        mean_px: mean,
        p95_px: p95,
        max_px: errors.last().copied().unwrap_or(0.0),
    }
}

// ── Tests ────────────────────────────────────────────────────────────────
