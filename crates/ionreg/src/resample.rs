//! Inverse-mapping image warp.
//!
//! Every output pixel center `(x, y)` is pushed through the transform into
//! source coordinates and sampled there. The transform is therefore the
//! output→source map: for landmarks saved as optical→ion pairs it takes the
//! optical grid into the ion image, which is what resampling an ion image
//! onto the optical grid needs.

use crate::affine::AffineTransform;
use crate::grid::Image;

/// Interpolation order used when sampling the source image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    /// Order 0: value of the nearest source pixel.
    Nearest,
    /// Order 1: bilinear blend of the 2×2 neighbourhood.
    #[default]
    Bilinear,
}

/// Resampling parameters.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct WarpConfig {
    pub interpolation: Interpolation,
    /// Value assigned to output pixels that map outside the source.
    pub background: f64,
}

impl Default for WarpConfig {
    fn default() -> Self {
        Self {
            interpolation: Interpolation::Bilinear,
            background: 0.0,
        }
    }
}

/// Sample channel `c` at sub-pixel `(x, y)` with bilinear interpolation.
///
/// Returns `None` outside `[0, w-1] x [0, h-1]`. On the last row/column the
/// missing neighbour carries zero weight, so integer positions reproduce the
/// source exactly.
#[inline]
pub fn sample_bilinear(img: &Image, x: f64, y: f64, c: usize) -> Option<f64> {
    let (w, h) = (img.width(), img.height());
    if w == 0 || h == 0 || !(x >= 0.0 && y >= 0.0) {
        return None;
    }
    if x > (w - 1) as f64 || y > (h - 1) as f64 {
        return None;
    }

    let x0 = (x.floor() as usize).min(w - 1);
    let y0 = (y.floor() as usize).min(h - 1);
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let p00 = img.get(x0, y0, c);
    let p10 = img.get(x1, y0, c);
    let p01 = img.get(x0, y1, c);
    let p11 = img.get(x1, y1, c);

    Some(
        (1.0 - fx) * (1.0 - fy) * p00
            + fx * (1.0 - fy) * p10
            + (1.0 - fx) * fy * p01
            + fx * fy * p11,
    )
}

/// Sample channel `c` at the pixel nearest to `(x, y)`.
#[inline]
pub fn sample_nearest(img: &Image, x: f64, y: f64, c: usize) -> Option<f64> {
    let xr = x.round();
    let yr = y.round();
    if !(xr >= 0.0 && yr >= 0.0) {
        return None;
    }
    let (xi, yi) = (xr as usize, yr as usize);
    if xi >= img.width() || yi >= img.height() {
        return None;
    }
    Some(img.get(xi, yi, c))
}

/// Resample `source` onto an output grid of `output_shape = [height, width]`.
///
/// Pure: the source is only read. All channels are carried over.
pub fn warp(
    source: &Image,
    transform: &AffineTransform,
    output_shape: [usize; 2],
    config: &WarpConfig,
) -> Image {
    let [out_h, out_w] = output_shape;
    let channels = source.channels();
    let mut out = Image::filled(out_w, out_h, channels, config.background);

    let sample = match config.interpolation {
        Interpolation::Nearest => sample_nearest,
        Interpolation::Bilinear => sample_bilinear,
    };

    let [a, b, c, d, e, f] = transform.params();
    for y in 0..out_h {
        let yf = y as f64;
        for x in 0..out_w {
            let xf = x as f64;
            let sx = a * xf + b * yf + c;
            let sy = d * xf + e * yf + f;
            for ch in 0..channels {
                if let Some(v) = sample(source, sx, sy, ch) {
                    out.set(x, y, ch, v);
                }
            }
        }
    }
    out
}
