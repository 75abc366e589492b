//! Headless raster implementation of [`RenderSurface`].
//!
//! Composes both panels, landmark markers and the control buttons into one
//! RGB frame on every redraw, optionally writing it to a PNG.

use std::path::PathBuf;

use image::{imageops, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect as PixelRect;
use serde::{Deserialize, Serialize};

use crate::grid::Image;
use crate::layout::{FigureLayout, Rect, PANEL_COUNT};
use crate::surface::{RenderSurface, SurfaceError};

const FIGURE_BG: Rgb<u8> = Rgb([255, 255, 255]);
const AXES_EDGE: Rgb<u8> = Rgb([0, 0, 0]);
const BUTTON_FACE: Rgb<u8> = Rgb([217, 217, 217]);
const BUTTON_EDGE: Rgb<u8> = Rgb([128, 128, 128]);

/// Landmark marker appearance: a `+` in figure pixels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerStyle {
    /// Full arm-to-arm span.
    pub size_px: u32,
    pub thickness: u32,
    pub color: [u8; 3],
}

impl Default for MarkerStyle {
    fn default() -> Self {
        Self {
            size_px: 20,
            thickness: 5,
            color: [0, 255, 0],
        }
    }
}

/// Raster figure matching a [`FigureLayout`].
pub struct CanvasSurface {
    layout: FigureLayout,
    marker: MarkerStyle,
    images: [Option<RgbImage>; PANEL_COUNT],
    markers: [Vec<[f64; 2]>; PANEL_COUNT],
    frame: RgbImage,
    output: Option<PathBuf>,
    redraws: usize,
}

impl CanvasSurface {
    pub fn new(layout: FigureLayout, marker: MarkerStyle) -> Self {
        let [w, h] = layout.figure_size;
        let frame = RgbImage::from_pixel(w.round().max(1.0) as u32, h.round().max(1.0) as u32, FIGURE_BG);
        Self {
            layout,
            marker,
            images: [None, None],
            markers: [Vec::new(), Vec::new()],
            frame,
            output: None,
            redraws: 0,
        }
    }

    /// Write the composed frame to `path` on every redraw.
    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    /// Last composed frame.
    pub fn frame(&self) -> &RgbImage {
        &self.frame
    }

    pub fn markers(&self, panel: usize) -> &[[f64; 2]] {
        self.markers.get(panel).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn redraw_count(&self) -> usize {
        self.redraws
    }

    fn check_panel(panel: usize) -> Result<(), SurfaceError> {
        if panel < PANEL_COUNT {
            Ok(())
        } else {
            Err(SurfaceError::NoSuchPanel { panel })
        }
    }

    fn compose(&mut self) {
        let mut frame = RgbImage::from_pixel(self.frame.width(), self.frame.height(), FIGURE_BG);

        for (idx, panel) in self.layout.panels.iter().enumerate() {
            let area = panel.image_rect();
            if let Some(img) = &self.images[idx] {
                imageops::overlay(&mut frame, img, area.x.round() as i64, area.y.round() as i64);
            }
            if let Some(r) = pixel_rect(&area) {
                draw_hollow_rect_mut(&mut frame, r, AXES_EDGE);
            }
        }

        for control in &self.layout.controls {
            if let Some(r) = pixel_rect(&control.bounds) {
                draw_filled_rect_mut(&mut frame, r, BUTTON_FACE);
                draw_hollow_rect_mut(&mut frame, r, BUTTON_EDGE);
            }
        }

        let color = Rgb(self.marker.color);
        let half = (self.marker.size_px / 2) as i32;
        let thick = self.marker.thickness.max(1);
        let span = self.marker.size_px.max(1);
        for (idx, panel) in self.layout.panels.iter().enumerate() {
            for point in &self.markers[idx] {
                let [fx, fy] = panel.to_figure(*point);
                let (cx, cy) = (fx.round() as i32, fy.round() as i32);
                let t = (thick / 2) as i32;
                draw_filled_rect_mut(&mut frame, PixelRect::at(cx - half, cy - t).of_size(span, thick), color);
                draw_filled_rect_mut(&mut frame, PixelRect::at(cx - t, cy - half).of_size(thick, span), color);
            }
        }

        self.frame = frame;
    }
}

fn pixel_rect(r: &Rect) -> Option<PixelRect> {
    let w = r.width.round();
    let h = r.height.round();
    if w < 1.0 || h < 1.0 {
        return None;
    }
    Some(PixelRect::at(r.x.round() as i32, r.y.round() as i32).of_size(w as u32, h as u32))
}

impl RenderSurface for CanvasSurface {
    fn draw_image(&mut self, panel: usize, image: &Image) -> Result<(), SurfaceError> {
        Self::check_panel(panel)?;
        let area = self.layout.panels[panel].image_rect();
        let w = area.width.round().max(1.0) as u32;
        let h = area.height.round().max(1.0) as u32;
        let display = image.to_display_rgb();
        self.images[panel] = Some(imageops::resize(&display, w, h, imageops::FilterType::Nearest));
        Ok(())
    }

    fn draw_marker(&mut self, panel: usize, point: [f64; 2]) -> Result<(), SurfaceError> {
        Self::check_panel(panel)?;
        self.markers[panel].push(point);
        Ok(())
    }

    fn clear_markers(&mut self, panel: usize) -> Result<(), SurfaceError> {
        Self::check_panel(panel)?;
        self.markers[panel].clear();
        Ok(())
    }

    fn redraw(&mut self) -> Result<(), SurfaceError> {
        self.compose();
        self.redraws += 1;
        if let Some(path) = &self.output {
            self.frame.save(path).map_err(|source| SurfaceError::Write {
                path: path.clone(),
                source,
            })?;
        }
        Ok(())
    }
}
