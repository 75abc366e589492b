//! Two-panel correspondence session.
//!
//! Clicks must alternate: a point in the first panel opens a landmark pair,
//! the matching point in the second panel closes it. The session never
//! draws; callers render from the returned [`ClickOutcome`].

use std::path::{Path, PathBuf};

use crate::landmarks::CorrespondenceSet;
use crate::table::TableError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    AwaitingFirstPanelClick,
    AwaitingSecondPanelClick,
}

impl SessionState {
    /// Panel index that accepts the next click.
    pub fn active_panel(self) -> usize {
        match self {
            Self::AwaitingFirstPanelClick => 0,
            Self::AwaitingSecondPanelClick => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClickOutcome {
    /// The point was recorded.
    Accepted {
        panel: usize,
        point: [f64; 2],
        pair_index: usize,
        /// `true` when this click closed a pair.
        completed: bool,
    },
    /// Click on the inactive panel; nothing changed.
    OutOfTurn { expected: usize, got: usize },
}

/// Result of writing the collected pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub path: PathBuf,
    pub pairs_written: usize,
    /// 0-based panel whose click is missing from a trailing incomplete pair.
    pub missing_panel: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct CorrespondenceSession {
    state: SessionState,
    set: CorrespondenceSet,
}

impl CorrespondenceSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn active_panel(&self) -> usize {
        self.state.active_panel()
    }

    pub fn correspondences(&self) -> &CorrespondenceSet {
        &self.set
    }

    /// Record a pixel clicked on `panel`.
    pub fn click(&mut self, panel: usize, pixel: [usize; 2]) -> ClickOutcome {
        let expected = self.active_panel();
        if panel != expected {
            tracing::debug!(expected, got = panel, "click on inactive panel ignored");
            return ClickOutcome::OutOfTurn {
                expected,
                got: panel,
            };
        }

        let point = [pixel[0] as f64, pixel[1] as f64];
        match self.state {
            SessionState::AwaitingFirstPanelClick => {
                let pair_index = self.set.begin_pair(point);
                self.state = SessionState::AwaitingSecondPanelClick;
                tracing::debug!(pair_index, x = point[0], y = point[1], "pair opened");
                ClickOutcome::Accepted {
                    panel,
                    point,
                    pair_index,
                    completed: false,
                }
            }
            SessionState::AwaitingSecondPanelClick => {
                // The first state always leaves a pending source behind.
                let pair_index = self.set.complete_pair(point).unwrap_or(self.set.len());
                self.state = SessionState::AwaitingFirstPanelClick;
                tracing::debug!(pair_index, x = point[0], y = point[1], "pair completed");
                ClickOutcome::Accepted {
                    panel,
                    point,
                    pair_index,
                    completed: true,
                }
            }
        }
    }

    /// Discard every pair and return to the first panel.
    pub fn cancel(&mut self) -> usize {
        let discarded = self.set.clear();
        self.state = SessionState::AwaitingFirstPanelClick;
        tracing::info!(discarded, "correspondence session cleared");
        discarded
    }

    /// Write complete pairs to `path`, overwriting it.
    ///
    /// A trailing incomplete pair is left out and reported; the session state
    /// is not changed.
    pub fn save(&self, path: &Path) -> Result<SaveReport, TableError> {
        let missing_panel = match self.state {
            SessionState::AwaitingSecondPanelClick => Some(1),
            SessionState::AwaitingFirstPanelClick => None,
        };
        if let Some(idx) = missing_panel {
            tracing::warn!("missing point in panel {}", idx + 1);
        }

        self.set.write(path)?;
        let report = SaveReport {
            path: path.to_path_buf(),
            pairs_written: self.set.len(),
            missing_panel,
        };
        tracing::info!(
            path = %report.path.display(),
            pairs = report.pairs_written,
            "landmarks saved"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::LandmarkPair;

    #[test]
    fn alternating_clicks_build_pairs_in_order() {
        let mut s = CorrespondenceSession::new();
        let clicks = [([1, 2], [10, 20]), ([3, 4], [30, 40]), ([5, 6], [50, 60])];
        for (i, (a, b)) in clicks.iter().enumerate() {
            assert_eq!(
                s.click(0, *a),
                ClickOutcome::Accepted {
                    panel: 0,
                    point: [a[0] as f64, a[1] as f64],
                    pair_index: i,
                    completed: false
                }
            );
            assert_eq!(s.state(), SessionState::AwaitingSecondPanelClick);
            assert!(matches!(
                s.click(1, *b),
                ClickOutcome::Accepted {
                    panel: 1,
                    completed: true,
                    pair_index,
                    ..
                } if pair_index == i
            ));
        }

        let pairs = s.correspondences().pairs();
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[1], LandmarkPair::new([3.0, 4.0], [30.0, 40.0]));
        assert_eq!(s.state(), SessionState::AwaitingFirstPanelClick);
    }

    #[test]
    fn second_panel_click_first_is_out_of_turn() {
        let mut s = CorrespondenceSession::new();
        assert_eq!(
            s.click(1, [5, 5]),
            ClickOutcome::OutOfTurn {
                expected: 0,
                got: 1
            }
        );
        assert!(s.correspondences().is_empty());
        assert_eq!(s.active_panel(), 0);
    }

    #[test]
    fn repeated_first_panel_click_is_out_of_turn() {
        let mut s = CorrespondenceSession::new();
        s.click(0, [1, 1]);
        assert!(matches!(s.click(0, [2, 2]), ClickOutcome::OutOfTurn { expected: 1, got: 0 }));
        assert_eq!(s.correspondences().pending(), Some([1.0, 1.0]));
    }

    #[test]
    fn cancel_resets_from_either_state() {
        let mut s = CorrespondenceSession::new();
        assert_eq!(s.cancel(), 0);

        s.click(0, [1, 1]);
        s.click(1, [2, 2]);
        s.click(0, [3, 3]);
        assert_eq!(s.cancel(), 2);
        assert_eq!(s.state(), SessionState::AwaitingFirstPanelClick);
        assert!(s.correspondences().is_empty());

        s.click(0, [4, 4]);
        s.click(1, [5, 5]);
        assert_eq!(s.cancel(), 1);
        assert!(s.correspondences().is_empty());
    }

    #[test]
    fn save_skips_incomplete_pair_and_reports_panel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hooks.tis");
        let mut s = CorrespondenceSession::new();
        s.click(0, [1, 2]);
        s.click(1, [3, 4]);
        s.click(0, [7, 8]);

        let report = s.save(&path).unwrap();
        assert_eq!(report.pairs_written, 1);
        assert_eq!(report.missing_panel, Some(1));
        assert_eq!(s.state(), SessionState::AwaitingSecondPanelClick);

        let back = CorrespondenceSet::read(&path).unwrap();
        assert_eq!(back.pairs(), &[LandmarkPair::new([1.0, 2.0], [3.0, 4.0])]);
    }

    #[test]
    fn save_overwrites_and_handles_zero_pairs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hooks.tis");
        std::fs::write(&path, "9,9,9,9\n").unwrap();

        let report = CorrespondenceSession::new().save(&path).unwrap();
        assert_eq!(report.pairs_written, 0);
        assert_eq!(report.missing_panel, None);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn save_to_missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope").join("hooks.tis");
        assert!(matches!(
            CorrespondenceSession::new().save(&path),
            Err(TableError::Write { .. })
        ));
    }
}
