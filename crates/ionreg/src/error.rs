use thiserror::Error;

use crate::affine::EstimateError;
use crate::batch::BatchError;
use crate::config::ConfigError;
use crate::extract::ExtractError;
use crate::grid::{LoadError, ShapeError};
use crate::surface::{HookError, SurfaceError};
use crate::table::TableError;

/// Any error raised by this crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Shape(#[from] ShapeError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Table(#[from] TableError),
    #[error(transparent)]
    Estimate(#[from] EstimateError),
    #[error(transparent)]
    Surface(#[from] SurfaceError),
    #[error(transparent)]
    Hook(#[from] HookError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Batch(#[from] BatchError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    fn fit_three() -> Result<()> {
        crate::affine::estimate_affine(&[[0.0, 0.0]], &[[1.0, 1.0]])?;
        Ok(())
    }

    #[test]
    fn module_errors_convert_with_question_mark() {
        let err = fit_three().unwrap_err();
        assert!(matches!(err, Error::Estimate(EstimateError::TooFewPairs { got: 1, .. })));
        assert_eq!(err.to_string(), "too few landmark pairs: need 3, got 1");
    }
}
