//! Landmark pairs and the ordered correspondence set collected by a session.

use std::path::Path;

use crate::table::{self, TableError};

/// Default name of the landmark ("hook points") file.
pub const DEFAULT_LANDMARK_FILE: &str = "hooks.tis";

/// Number of columns per landmark row: `src_x, src_y, dst_x, dst_y`.
pub const LANDMARK_COLUMNS: usize = 4;

/// One correspondence between the first panel's image (source) and the
/// second panel's image (destination), each in its own pixel-index space.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LandmarkPair {
    pub src: [f64; 2],
    pub dst: [f64; 2],
}

impl LandmarkPair {
    pub fn new(src: [f64; 2], dst: [f64; 2]) -> Self {
        Self { src, dst }
    }

    /// Row layout used by the landmark file.
    pub fn to_row(&self) -> [f64; 4] {
        [self.src[0], self.src[1], self.dst[0], self.dst[1]]
    }

    pub fn from_row(row: &[f64]) -> Option<Self> {
        match *row {
            [sx, sy, dx, dy] => Some(Self::new([sx, sy], [dx, dy])),
            _ => None,
        }
    }
}

/// Ordered landmark pairs in click order, plus at most one trailing pair
/// whose destination has not been clicked yet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorrespondenceSet {
    complete: Vec<LandmarkPair>,
    pending_src: Option<[f64; 2]>,
}

impl CorrespondenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs(pairs: Vec<LandmarkPair>) -> Self {
        Self {
            complete: pairs,
            pending_src: None,
        }
    }

    /// Number of complete pairs.
    pub fn len(&self) -> usize {
        self.complete.len()
    }

    pub fn is_empty(&self) -> bool {
        self.complete.is_empty() && self.pending_src.is_none()
    }

    /// Complete pairs in click order.
    pub fn pairs(&self) -> &[LandmarkPair] {
        &self.complete
    }

    /// Source point of the incomplete trailing pair, if any.
    pub fn pending(&self) -> Option<[f64; 2]> {
        self.pending_src
    }

    /// Start a new pair from its source point. Returns the pair index.
    ///
    /// A previously pending source point is replaced.
    pub(crate) fn begin_pair(&mut self, src: [f64; 2]) -> usize {
        self.pending_src = Some(src);
        self.complete.len()
    }

    /// Complete the pending pair with its destination point.
    pub(crate) fn complete_pair(&mut self, dst: [f64; 2]) -> Option<usize> {
        let src = self.pending_src.take()?;
        self.complete.push(LandmarkPair::new(src, dst));
        Some(self.complete.len() - 1)
    }

    /// Drop everything. Returns how many pairs (complete or pending) were
    /// discarded.
    pub fn clear(&mut self) -> usize {
        let discarded = self.complete.len() + usize::from(self.pending_src.is_some());
        self.complete.clear();
        self.pending_src = None;
        discarded
    }

    pub fn src_points(&self) -> Vec<[f64; 2]> {
        self.complete.iter().map(|p| p.src).collect()
    }

    pub fn dst_points(&self) -> Vec<[f64; 2]> {
        self.complete.iter().map(|p| p.dst).collect()
    }

    /// Rows for persistence. Only complete pairs are emitted.
    pub fn to_rows(&self) -> Vec<[f64; 4]> {
        self.complete.iter().map(LandmarkPair::to_row).collect()
    }

    /// Write complete pairs as a 4-column table (whole-file overwrite).
    pub fn write(&self, path: &Path) -> Result<(), TableError> {
        table::write_table(path, self.to_rows())
    }

    /// Read a landmark file. Every row must have exactly four columns.
    pub fn read(path: &Path) -> Result<Self, TableError> {
        let rows = table::read_table(path, Some(LANDMARK_COLUMNS))?;
        let pairs = rows
            .iter()
            .filter_map(|row| LandmarkPair::from_row(row))
            .collect();
        Ok(Self::from_pairs(pairs))
    }
}
