//! Rendering capability and the event adapter that drives a
//! [`CorrespondenceSession`] from surface events.
//!
//! The host event loop forwards pointer presses and control activations to
//! [`HookAdapter::dispatch`]. The adapter resolves them through the
//! [`FigureLayout`], feeds the session and issues draw commands based on what
//! the session returned.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{read_json, ConfigError};
use crate::grid::Image;
use crate::layout::{ControlKind, FigureLayout, PointerButton, PointerEvent, Target, PANEL_COUNT};
use crate::session::{ClickOutcome, CorrespondenceSession, SaveReport};
use crate::table::TableError;

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("panel {panel} does not exist")]
    NoSuchPanel { panel: usize },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Drawing capability of an interactive or headless figure.
pub trait RenderSurface {
    /// Show `image` in `panel`, replacing whatever was there.
    fn draw_image(&mut self, panel: usize, image: &Image) -> Result<(), SurfaceError>;

    /// Overlay a landmark marker at pixel coordinates of the panel's image.
    fn draw_marker(&mut self, panel: usize, point: [f64; 2]) -> Result<(), SurfaceError>;

    fn clear_markers(&mut self, panel: usize) -> Result<(), SurfaceError>;

    fn redraw(&mut self) -> Result<(), SurfaceError>;

    /// True while a pan/zoom tool owns pointer input.
    fn navigation_active(&self) -> bool {
        false
    }
}

/// Event delivered by the host loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SurfaceEvent {
    Pointer(PointerEvent),
    Control {
        control: ControlKind,
        button: PointerButton,
    },
}

impl SurfaceEvent {
    pub fn click(x: f64, y: f64) -> Self {
        Self::Pointer(PointerEvent::primary(x, y))
    }

    pub fn activate(control: ControlKind) -> Self {
        Self::Control {
            control,
            button: PointerButton::Primary,
        }
    }
}

/// What the adapter did with one event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventResponse {
    /// Wrong button or navigation tool active.
    Ignored,
    /// Pointer landed outside every panel and control.
    NoTarget,
    /// Pointer landed on panel padding.
    OffImage { panel: usize },
    /// Pointer landed on a control; activation arrives as a control event.
    OnControl(ControlKind),
    OutOfTurn { expected: usize, got: usize },
    Marked {
        panel: usize,
        point: [f64; 2],
        pair_index: usize,
        completed: bool,
    },
    Cleared { discarded: usize },
    Saved(SaveReport),
}

#[derive(Debug, Error)]
pub enum HookError {
    /// Rendering failed. A click that reached the session before the
    /// failure stays recorded; only its marker is missing.
    #[error(transparent)]
    Surface(#[from] SurfaceError),
    #[error("saving landmarks failed: {0}")]
    Save(#[from] TableError),
}

/// Couples a surface, a figure layout and a correspondence session.
pub struct HookAdapter<S: RenderSurface> {
    layout: FigureLayout,
    surface: S,
    session: CorrespondenceSession,
    landmark_path: PathBuf,
}

impl<S: RenderSurface> HookAdapter<S> {
    /// Draw both images and start an empty session. Saves go to
    /// `landmark_path`.
    pub fn new(
        layout: FigureLayout,
        mut surface: S,
        landmark_path: impl Into<PathBuf>,
        optical: &Image,
        ion: &Image,
    ) -> Result<Self, HookError> {
        surface.draw_image(0, optical)?;
        surface.draw_image(1, ion)?;
        surface.redraw()?;
        Ok(Self {
            layout,
            surface,
            session: CorrespondenceSession::new(),
            landmark_path: landmark_path.into(),
        })
    }

    pub fn layout(&self) -> &FigureLayout {
        &self.layout
    }

    pub fn session(&self) -> &CorrespondenceSession {
        &self.session
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn into_surface(self) -> S {
        self.surface
    }

    pub fn landmark_path(&self) -> &Path {
        &self.landmark_path
    }

    /// Handle one event to completion.
    ///
    /// Accepted clicks are committed to the session before the marker is
    /// drawn, so a [`HookError::Surface`] leaves the session advanced.
    pub fn dispatch(&mut self, event: &SurfaceEvent) -> Result<EventResponse, HookError> {
        match *event {
            SurfaceEvent::Pointer(mut ev) => {
                ev.navigation_claimed |= self.surface.navigation_active();
                self.on_pointer(&ev)
            }
            SurfaceEvent::Control { control, button } => self.on_control(control, button),
        }
    }

    fn on_pointer(&mut self, ev: &PointerEvent) -> Result<EventResponse, HookError> {
        let (panel, pixel) = match self.layout.locate(ev) {
            Target::Ignored => return Ok(EventResponse::Ignored),
            Target::NoTarget => return Ok(EventResponse::NoTarget),
            Target::Control(kind) => return Ok(EventResponse::OnControl(kind)),
            Target::OffImage { panel } => {
                tracing::debug!(panel, "click outside image data");
                return Ok(EventResponse::OffImage { panel });
            }
            Target::Panel { panel, pixel } => (panel, pixel),
        };

        match self.session.click(panel, pixel) {
            ClickOutcome::OutOfTurn { expected, got } => {
                Ok(EventResponse::OutOfTurn { expected, got })
            }
            ClickOutcome::Accepted {
                panel,
                point,
                pair_index,
                completed,
            } => {
                self.surface.draw_marker(panel, point)?;
                self.surface.redraw()?;
                Ok(EventResponse::Marked {
                    panel,
                    point,
                    pair_index,
                    completed,
                })
            }
        }
    }

    fn on_control(
        &mut self,
        control: ControlKind,
        button: PointerButton,
    ) -> Result<EventResponse, HookError> {
        if button != PointerButton::Primary {
            return Ok(EventResponse::Ignored);
        }
        match control {
            ControlKind::Cancel => {
                let discarded = self.session.cancel();
                for panel in 0..PANEL_COUNT {
                    self.surface.clear_markers(panel)?;
                }
                self.surface.redraw()?;
                Ok(EventResponse::Cleared { discarded })
            }
            ControlKind::Save => {
                let report = self.session.save(&self.landmark_path)?;
                Ok(EventResponse::Saved(report))
            }
        }
    }
}

/// Feed recorded events through the adapter the way a host loop would: a
/// primary press on a control region also activates that control.
pub fn replay<S: RenderSurface>(
    adapter: &mut HookAdapter<S>,
    events: &[SurfaceEvent],
) -> Result<Vec<EventResponse>, HookError> {
    let mut responses = Vec::with_capacity(events.len());
    for event in events {
        let response = adapter.dispatch(event)?;
        let activated = match response {
            EventResponse::OnControl(kind) => Some(kind),
            _ => None,
        };
        responses.push(response);
        if let Some(kind) = activated {
            responses.push(adapter.dispatch(&SurfaceEvent::activate(kind))?);
        }
    }
    Ok(responses)
}

/// Load a JSON array of recorded surface events.
pub fn load_event_script(path: &Path) -> Result<Vec<SurfaceEvent>, ConfigError> {
    read_json(path)
}
