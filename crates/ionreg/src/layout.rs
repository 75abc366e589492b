//! Figure layout and pointer-to-pixel mapping.
//!
//! Figure coordinates are surface pixels with the origin at the top-left
//! corner and y pointing down. Each [`Panel`] shows one image letterboxed
//! into its bounding box with the aspect ratio preserved; image pixel centers
//! sit at integer data coordinates, so the displayed image spans
//! `[-0.5, w - 0.5] x [-0.5, h - 0.5]` in data space.

use serde::{Deserialize, Serialize};

/// Number of image panels in a correspondence figure.
pub const PANEL_COUNT: usize = 2;

/// Axis-aligned rectangle in figure coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle given as figure fractions `[left, bottom, width, height]`
    /// measured from the bottom-left corner.
    pub fn from_figure_fractions(figure_size: [f64; 2], frac: [f64; 4]) -> Self {
        let [fw, fh] = figure_size;
        let [left, bottom, w, h] = frac;
        Self::new(left * fw, (1.0 - bottom - h) * fh, w * fw, h * fh)
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Inclusive containment test.
    pub fn contains(&self, p: [f64; 2]) -> bool {
        p[0] >= self.x && p[0] <= self.right() && p[1] >= self.y && p[1] <= self.bottom()
    }
}

/// Pointer button of a click event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerButton {
    Primary,
    Middle,
    Secondary,
}

/// A pointer press in figure coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    pub position: [f64; 2],
    pub button: PointerButton,
    /// Set by the surface when a navigation tool (pan/zoom) owns the event.
    #[serde(default)]
    pub navigation_claimed: bool,
}

impl PointerEvent {
    pub fn primary(x: f64, y: f64) -> Self {
        Self {
            position: [x, y],
            button: PointerButton::Primary,
            navigation_claimed: false,
        }
    }
}

/// UI controls that sit on the figure next to the panels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlKind {
    Cancel,
    Save,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Control {
    pub kind: ControlKind,
    pub bounds: Rect,
}

/// A display region bound to one image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Panel {
    bounds: Rect,
    image_rect: Rect,
    /// `[width, height]` of the bound image in pixels.
    image_size: [usize; 2],
    scale: f64,
}

impl Panel {
    /// Letterbox an image of `image_size = [width, height]` into `bounds`.
    pub fn new(bounds: Rect, image_size: [usize; 2]) -> Self {
        let [w, h] = image_size;
        let (w, h) = (w.max(1) as f64, h.max(1) as f64);
        let scale = (bounds.width / w).min(bounds.height / h);
        let (iw, ih) = (w * scale, h * scale);
        let image_rect = Rect::new(
            bounds.x + (bounds.width - iw) / 2.0,
            bounds.y + (bounds.height - ih) / 2.0,
            iw,
            ih,
        );
        Self {
            bounds,
            image_rect,
            image_size,
            scale,
        }
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Part of the bounds actually covered by image data.
    pub fn image_rect(&self) -> Rect {
        self.image_rect
    }

    pub fn image_size(&self) -> [usize; 2] {
        self.image_size
    }

    /// Figure pixels per image pixel.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Figure position → continuous data coordinates.
    pub fn to_data(&self, p: [f64; 2]) -> [f64; 2] {
        [
            (p[0] - self.image_rect.x) / self.scale - 0.5,
            (p[1] - self.image_rect.y) / self.scale - 0.5,
        ]
    }

    /// Data coordinates → figure position.
    pub fn to_figure(&self, d: [f64; 2]) -> [f64; 2] {
        [
            self.image_rect.x + (d[0] + 0.5) * self.scale,
            self.image_rect.y + (d[1] + 0.5) * self.scale,
        ]
    }

    /// Figure position → integer pixel, rounded to nearest. `None` when the
    /// rounded pixel lies outside the image (padding or axes decoration).
    pub fn to_pixel(&self, p: [f64; 2]) -> Option<[usize; 2]> {
        let d = self.to_data(p);
        let x = d[0].round();
        let y = d[1].round();
        if !(x >= 0.0 && y >= 0.0) {
            return None;
        }
        let (xi, yi) = (x as usize, y as usize);
        (xi < self.image_size[0] && yi < self.image_size[1]).then_some([xi, yi])
    }
}

/// Where a pointer event landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Non-primary button or claimed by a navigation tool.
    Ignored,
    /// On a control; the control's own handler deals with it.
    Control(ControlKind),
    /// On image data of one panel.
    Panel { panel: usize, pixel: [usize; 2] },
    /// Inside a panel's bounds but off its image data.
    OffImage { panel: usize },
    /// Outside every panel and control.
    NoTarget,
}

/// Placement parameters for the default side-by-side figure.
///
/// Fractions follow the usual subplot convention: measured from the
/// bottom-left corner of the figure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Figure size in surface pixels `[width, height]`.
    pub figure_size: [f64; 2],
    pub subplot_left: f64,
    pub subplot_right: f64,
    pub subplot_bottom: f64,
    pub subplot_top: f64,
    /// Horizontal gap between panels as a fraction of the panel width.
    pub wspace: f64,
    /// Cancel button `[left, bottom, width, height]`.
    pub cancel_button: [f64; 4],
    /// Save button `[left, bottom, width, height]`.
    pub save_button: [f64; 4],
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            figure_size: [640.0, 480.0],
            subplot_left: 0.125,
            subplot_right: 0.9,
            subplot_bottom: 0.11,
            subplot_top: 0.88,
            wspace: 0.2,
            cancel_button: [0.7, 0.05, 0.1, 0.075],
            save_button: [0.81, 0.05, 0.1, 0.075],
        }
    }
}

/// Two panels plus controls on one figure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FigureLayout {
    pub figure_size: [f64; 2],
    pub panels: [Panel; PANEL_COUNT],
    pub controls: Vec<Control>,
}

impl FigureLayout {
    /// Default figure: optical image left (panel 0), ion image right
    /// (panel 1), Cancel/Save buttons bottom-right.
    ///
    /// Image sizes are `[width, height]`.
    pub fn side_by_side(first: [usize; 2], second: [usize; 2], config: &LayoutConfig) -> Self {
        let size = config.figure_size;
        let total = config.subplot_right - config.subplot_left;
        let panel_w = total / (PANEL_COUNT as f64 + config.wspace * (PANEL_COUNT as f64 - 1.0));
        let panel_h = config.subplot_top - config.subplot_bottom;
        let frac = |i: usize| {
            [
                config.subplot_left + i as f64 * panel_w * (1.0 + config.wspace),
                config.subplot_bottom,
                panel_w,
                panel_h,
            ]
        };

        let panels = [
            Panel::new(Rect::from_figure_fractions(size, frac(0)), first),
            Panel::new(Rect::from_figure_fractions(size, frac(1)), second),
        ];
        let controls = vec![
            Control {
                kind: ControlKind::Cancel,
                bounds: Rect::from_figure_fractions(size, config.cancel_button),
            },
            Control {
                kind: ControlKind::Save,
                bounds: Rect::from_figure_fractions(size, config.save_button),
            },
        ];

        Self {
            figure_size: size,
            panels,
            controls,
        }
    }

    /// Control under a figure position, if any.
    pub fn control_at(&self, p: [f64; 2]) -> Option<ControlKind> {
        self.controls
            .iter()
            .find(|c| c.bounds.contains(p))
            .map(|c| c.kind)
    }

    /// Resolve a pointer event against controls and panels.
    pub fn locate(&self, event: &PointerEvent) -> Target {
        if event.button != PointerButton::Primary || event.navigation_claimed {
            return Target::Ignored;
        }
        if let Some(kind) = self.control_at(event.position) {
            return Target::Control(kind);
        }

        let mut hits = self
            .panels
            .iter()
            .enumerate()
            .filter(|(_, p)| p.bounds.contains(event.position));
        let (Some((panel, p)), None) = (hits.next(), hits.next()) else {
            return Target::NoTarget;
        };

        match p.to_pixel(event.position) {
            Some(pixel) => Target::Panel { panel, pixel },
            None => Target::OffImage { panel },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn layout() -> FigureLayout {
        // Wide optical image, tall ion image.
        FigureLayout::side_by_side([200, 100], [40, 80], &LayoutConfig::default())
    }

    #[test]
    fn figure_fractions_flip_to_top_left_origin() {
        let r = Rect::from_figure_fractions([640.0, 480.0], [0.7, 0.05, 0.1, 0.075]);
        assert_relative_eq!(r.x, 448.0, epsilon = 1e-9);
        assert_relative_eq!(r.width, 64.0, epsilon = 1e-9);
        assert_relative_eq!(r.bottom(), 456.0, epsilon = 1e-9);
        assert_relative_eq!(r.height, 36.0, epsilon = 1e-9);
    }

    #[test]
    fn panel_letterboxes_and_roundtrips() {
        let p = Panel::new(Rect::new(10.0, 20.0, 100.0, 100.0), [50, 25]);
        assert_relative_eq!(p.scale(), 2.0);
        assert_relative_eq!(p.image_rect().y, 45.0);
        assert_relative_eq!(p.image_rect().height, 50.0);

        let fig = p.to_figure([3.0, 7.0]);
        let back = p.to_data(fig);
        assert_relative_eq!(back[0], 3.0, epsilon = 1e-12);
        assert_relative_eq!(back[1], 7.0, epsilon = 1e-12);
        assert_eq!(p.to_pixel(fig), Some([3, 7]));
    }

    #[test]
    fn clicks_round_to_nearest_pixel() {
        let p = Panel::new(Rect::new(0.0, 0.0, 40.0, 40.0), [4, 4]);
        // scale 10: pixel 1 spans figure x 10..20, center 15.
        assert_eq!(p.to_pixel([14.0, 15.0]), Some([1, 1]));
        assert_eq!(p.to_pixel([20.5, 15.0]), Some([2, 1]));
        assert_eq!(p.to_pixel([1.0, 1.0]), Some([0, 0]));
        assert_eq!(p.to_pixel([39.9, 39.9]), Some([3, 3]));
    }

    #[test]
    fn padding_is_off_image() {
        let l = layout();
        let panel = &l.panels[1];
        // Tall image: horizontal padding on both sides.
        assert!(panel.image_rect().x > panel.bounds().x + 1.0);
        let pad = [panel.bounds().x + 0.5, panel.bounds().y + panel.bounds().height / 2.0];
        assert_eq!(
            l.locate(&PointerEvent::primary(pad[0], pad[1])),
            Target::OffImage { panel: 1 }
        );
    }

    #[test]
    fn clicks_on_image_data_resolve_to_panel_pixels() {
        let l = layout();
        for (idx, pixel) in [(0usize, [123usize, 45usize]), (1, [7, 66])] {
            let pos = l.panels[idx].to_figure([pixel[0] as f64, pixel[1] as f64]);
            assert_eq!(
                l.locate(&PointerEvent::primary(pos[0], pos[1])),
                Target::Panel { panel: idx, pixel }
            );
        }
    }

    #[test]
    fn events_outside_everything_have_no_target() {
        let l = layout();
        for p in [[1.0, 1.0], [639.0, 10.0], [320.0, 2.0], [5.0, 470.0]] {
            assert_eq!(l.locate(&PointerEvent::primary(p[0], p[1])), Target::NoTarget, "{p:?}");
        }
    }

    #[test]
    fn controls_take_precedence_over_panels() {
        let l = layout();
        let save = l.controls[1].bounds;
        let center = [save.x + save.width / 2.0, save.y + 1.0];
        assert_eq!(
            l.locate(&PointerEvent::primary(center[0], center[1])),
            Target::Control(ControlKind::Save)
        );
        let cancel = l.controls[0].bounds;
        assert_eq!(
            l.control_at([cancel.x + 1.0, cancel.y + 1.0]),
            Some(ControlKind::Cancel)
        );
    }

    #[test]
    fn non_primary_and_navigation_events_are_ignored() {
        let l = layout();
        let pos = l.panels[0].to_figure([10.0, 10.0]);
        let mut ev = PointerEvent::primary(pos[0], pos[1]);
        ev.button = PointerButton::Secondary;
        assert_eq!(l.locate(&ev), Target::Ignored);

        let mut ev = PointerEvent::primary(pos[0], pos[1]);
        ev.navigation_claimed = true;
        assert_eq!(l.locate(&ev), Target::Ignored);
    }

    #[test]
    fn buttons_are_named_in_event_records() {
        let ev: PointerEvent = serde_json::from_str(
            r#"{"position": [1.0, 2.0], "button": "secondary", "navigation_claimed": false}"#,
        )
        .unwrap();
        assert_eq!(ev.button, PointerButton::Secondary);
        assert!(serde_json::from_str::<PointerButton>("3").is_err());
    }
}
