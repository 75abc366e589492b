//! Dense numeric image grid shared by every registration stage.
//!
//! Samples are `f64`, row-major, interleaved by channel. Scalar ion images
//! have one channel; optical images decoded from raster files have one
//! (grayscale) or three (RGB) channels with values in `[0, 1]`.

use std::path::{Path, PathBuf};

use image::{DynamicImage, RgbImage};
use thiserror::Error;

use crate::table::{self, TableError};

/// Extensions treated as delimited numeric tables rather than raster files.
pub const TABLE_EXTENSIONS: &[&str] = &["csv", "txt", "tis"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    #[error("buffer length {actual} does not match {width}x{height}x{channels}")]
    BufferLength {
        width: usize,
        height: usize,
        channels: usize,
        actual: usize,
    },
    #[error("row {row} has {found} values, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("channel count must be 1 or 3, got {0}")]
    Channels(usize),
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to decode image {path}: {source}")]
    Raster {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error(transparent)]
    Table(#[from] TableError),
}

/// Row-major `height x width x channels` grid of `f64` samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    width: usize,
    height: usize,
    channels: usize,
    data: Vec<f64>,
}

impl Image {
    /// Zero-filled image.
    pub fn new(width: usize, height: usize, channels: usize) -> Self {
        Self::filled(width, height, channels, 0.0)
    }

    /// Image with every sample set to `value`.
    pub fn filled(width: usize, height: usize, channels: usize, value: f64) -> Self {
        Self {
            width,
            height,
            channels,
            data: vec![value; width * height * channels],
        }
    }

    /// Wrap an existing interleaved buffer.
    pub fn from_vec(
        width: usize,
        height: usize,
        channels: usize,
        data: Vec<f64>,
    ) -> Result<Self, ShapeError> {
        if channels != 1 && channels != 3 {
            return Err(ShapeError::Channels(channels));
        }
        if data.len() != width * height * channels {
            return Err(ShapeError::BufferLength {
                width,
                height,
                channels,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Build a scalar image from table rows. All rows must have equal length.
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self, ShapeError> {
        let height = rows.len();
        let width = rows.first().map_or(0, |r| r.as_ref().len());
        let mut data = Vec::with_capacity(width * height);
        for (row, values) in rows.iter().enumerate() {
            let values = values.as_ref();
            if values.len() != width {
                return Err(ShapeError::RaggedRow {
                    row,
                    expected: width,
                    found: values.len(),
                });
            }
            data.extend_from_slice(values);
        }
        Self::from_vec(width, height, 1, data)
    }

    /// Convert a decoded raster. Color inputs keep three channels, grayscale
    /// inputs keep one; alpha is dropped. Samples are scaled to `[0, 1]`.
    pub fn from_dynamic(img: &DynamicImage) -> Self {
        let (width, height) = (img.width() as usize, img.height() as usize);
        if img.color().has_color() {
            let rgb = img.to_rgb32f();
            let data = rgb.as_raw().iter().map(|&v| v as f64).collect();
            Self {
                width,
                height,
                channels: 3,
                data,
            }
        } else {
            let luma = img.to_luma32f();
            let data = luma.as_raw().iter().map(|&v| v as f64).collect();
            Self {
                width,
                height,
                channels: 1,
                data,
            }
        }
    }

    /// Load an image from disk: delimited tables by extension, raster
    /// formats through the `image` crate otherwise.
    pub fn open(path: &Path) -> Result<Self, LoadError> {
        if is_table_path(path) {
            return Ok(table::read_image_table(path)?);
        }
        let img = image::open(path).map_err(|source| LoadError::Raster {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_dynamic(&img))
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// `[height, width]`, the order used for output shapes.
    pub fn shape(&self) -> [usize; 2] {
        [self.height, self.width]
    }

    /// `[width, height]`, the order used for pixel bounds checks.
    pub fn dims(&self) -> [usize; 2] {
        [self.width, self.height]
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    #[inline]
    fn index(&self, x: usize, y: usize, c: usize) -> usize {
        (y * self.width + x) * self.channels + c
    }

    /// Sample at integer pixel `(x, y)`, channel `c`.
    ///
    /// Panics when out of bounds, like slice indexing.
    #[inline]
    pub fn get(&self, x: usize, y: usize, c: usize) -> f64 {
        self.data[self.index(x, y, c)]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, c: usize, value: f64) {
        let idx = self.index(x, y, c);
        self.data[idx] = value;
    }

    /// All channels of pixel `(x, y)`.
    pub fn pixel(&self, x: usize, y: usize) -> &[f64] {
        let start = self.index(x, y, 0);
        &self.data[start..start + self.channels]
    }

    /// Rows of a scalar image. Multi-channel images yield interleaved rows.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        self.data.chunks(self.width.max(1) * self.channels)
    }

    /// Minimum and maximum over finite samples.
    pub fn finite_range(&self) -> Option<(f64, f64)> {
        self.data
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// 8-bit RGB rendering for display.
    ///
    /// Data already in `[0, 1]` is shown as-is; anything else is min-max
    /// stretched. Non-finite samples render black.
    pub fn to_display_rgb(&self) -> RgbImage {
        let (lo, hi) = self.finite_range().unwrap_or((0.0, 1.0));
        let (offset, scale) = if lo >= 0.0 && hi <= 1.0 {
            (0.0, 1.0)
        } else if hi > lo {
            (lo, 1.0 / (hi - lo))
        } else {
            (lo, 0.0)
        };
        let to_u8 = |v: f64| -> u8 {
            if !v.is_finite() {
                return 0;
            }
            (((v - offset) * scale).clamp(0.0, 1.0) * 255.0).round() as u8
        };

        let mut out = RgbImage::new(self.width as u32, self.height as u32);
        for (x, y, px) in out.enumerate_pixels_mut() {
            let p = self.pixel(x as usize, y as usize);
            px.0 = if self.channels == 3 {
                [to_u8(p[0]), to_u8(p[1]), to_u8(p[2])]
            } else {
                let g = to_u8(p[0]);
                [g, g, g]
            };
        }
        out
    }
}

/// True when the path's extension names a delimited table.
pub fn is_table_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            TABLE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb};

    #[test]
    fn from_rows_rejects_ragged_input() {
        let rows = vec![vec![1.0, 2.0], vec![3.0]];
        let err = Image::from_rows(&rows).unwrap_err();
        assert_eq!(
            err,
            ShapeError::RaggedRow {
                row: 1,
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn from_rows_is_row_major() {
        let img = Image::from_rows(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]).unwrap();
        assert_eq!(img.shape(), [2, 3]);
        assert_eq!(img.get(2, 0, 0), 3.0);
        assert_eq!(img.get(0, 1, 0), 4.0);
        let rows: Vec<&[f64]> = img.rows().collect();
        assert_eq!(rows[1], &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn from_vec_checks_length_and_channels() {
        assert!(matches!(
            Image::from_vec(2, 2, 1, vec![0.0; 3]),
            Err(ShapeError::BufferLength { actual: 3, .. })
        ));
        assert_eq!(
            Image::from_vec(1, 1, 2, vec![0.0; 2]).unwrap_err(),
            ShapeError::Channels(2)
        );
    }

    #[test]
    fn from_dynamic_keeps_gray_and_color_channels() {
        let mut gray = GrayImage::new(3, 2);
        gray.put_pixel(1, 1, Luma([255]));
        let img = Image::from_dynamic(&DynamicImage::ImageLuma8(gray));
        assert_eq!(img.channels(), 1);
        assert!((img.get(1, 1, 0) - 1.0).abs() < 1e-6);

        let mut rgb = RgbImage::new(2, 2);
        rgb.put_pixel(0, 1, Rgb([255, 0, 0]));
        let img = Image::from_dynamic(&DynamicImage::ImageRgb8(rgb));
        assert_eq!(img.channels(), 3);
        assert_eq!(img.pixel(0, 1).len(), 3);
        assert!((img.get(0, 1, 0) - 1.0).abs() < 1e-6);
        assert_eq!(img.get(0, 1, 1), 0.0);
    }

    #[test]
    fn display_stretches_out_of_range_data() {
        let img = Image::from_rows(&[[10.0, 20.0], [f64::NAN, 15.0]]).unwrap();
        let rgb = img.to_display_rgb();
        assert_eq!(rgb.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(rgb.get_pixel(1, 0).0, [255, 255, 255]);
        assert_eq!(rgb.get_pixel(0, 1).0, [0, 0, 0]);
        assert_eq!(rgb.get_pixel(1, 1).0[0], 128);
    }

    #[test]
    fn table_extension_detection_is_case_insensitive() {
        assert!(is_table_path(Path::new("a/mz_100.0.CSV")));
        assert!(is_table_path(Path::new("hooks.tis")));
        assert!(!is_table_path(Path::new("tissue.png")));
        assert!(!is_table_path(Path::new("noext")));
    }
}
