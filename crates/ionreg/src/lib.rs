//! ionreg: co-registration of mass-spectrometry ion images with optical
//! tissue images.
//!
//! The workflow has two stages:
//!
//! 1. **Correspondence collection** – the optical image and an ion image are
//!    shown side by side; alternating clicks on the two panels are mapped back
//!    to native pixel coordinates and accumulated as landmark pairs
//!    ([`FigureLayout`], [`CorrespondenceSession`], [`HookAdapter`]).
//! 2. **Registration** – an affine transform is fitted to the landmarks
//!    ([`estimate_affine`]) and ion images are resampled onto the optical
//!    grid ([`warp`], [`run_warp_job`]).
//!
//! Ion images are produced by an [`IonImageExtractor`]; [`SpectralDataset`]
//! is the in-memory implementation.
//!
//! All images travel as comma-delimited numeric tables on disk; landmark
//! files hold one `src_x, src_y, dst_x, dst_y` row per pair.

pub mod affine;
pub mod batch;
pub mod canvas;
pub mod config;
mod error;
pub mod extract;
pub mod grid;
pub mod landmarks;
pub mod layout;
pub mod resample;
pub mod session;
pub mod surface;
pub mod table;

pub use affine::{estimate_affine, estimate_from_pairs, fit_stats, AffineTransform, EstimateError, FitStats};
pub use batch::{run_warp_job, BatchConfig, BatchError, BatchReport, FileFailure, WarpInput, WarpJob};
pub use canvas::{CanvasSurface, MarkerStyle};
pub use config::{ConfigError, HookConfig, IonregConfig};
pub use error::{Error, Result};
pub use extract::{extract_ion_images, parse_mass_list, ExtractConfig, ExtractError, IonImageExtractor, SpectralDataset, Spectrum};
pub use grid::{Image, LoadError, ShapeError};
pub use landmarks::{CorrespondenceSet, LandmarkPair};
pub use layout::{Control, ControlKind, FigureLayout, LayoutConfig, Panel, PointerButton, PointerEvent, Rect, Target};
pub use resample::{warp, Interpolation, WarpConfig};
pub use session::{ClickOutcome, CorrespondenceSession, SaveReport, SessionState};
pub use surface::{load_event_script, replay, EventResponse, HookAdapter, HookError, RenderSurface, SurfaceError, SurfaceEvent};
pub use table::TableError;
