//! Delimited numeric tables: the on-disk format for ion images, warped
//! images and landmark files.
//!
//! Values are written in `%.18e`-style scientific notation with a comma
//! delimiter. Reading accepts blank lines and `#` comments, trims whitespace
//! around fields and treats empty fields as NaN.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::grid::{Image, ShapeError};

pub const DELIMITER: char = ',';

#[derive(Debug, Error)]
pub enum TableError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}:{line}: column {column}: cannot parse '{value}' as a number")]
    Parse {
        path: PathBuf,
        line: usize,
        column: usize,
        value: String,
    },
    #[error("{path}:{line}: expected {expected} columns, found {found}")]
    Ragged {
        path: PathBuf,
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("{path}: table has no rows")]
    Empty { path: PathBuf },
    #[error("{path}: {source}")]
    Shape {
        path: PathBuf,
        #[source]
        source: ShapeError,
    },
    #[error("{path}: only single-channel images can be written as tables (got {channels} channels)")]
    Channels { path: PathBuf, channels: usize },
}

/// Parse table text. `expected_columns` pins the column count; otherwise the
/// first data row defines it. `path` is only used for error context.
pub fn parse_table(
    text: &str,
    expected_columns: Option<usize>,
    path: &Path,
) -> Result<Vec<Vec<f64>>, TableError> {
    let mut rows: Vec<Vec<f64>> = Vec::new();
    let mut width = expected_columns;

    for (line_idx, raw_line) in text.lines().enumerate() {
        let line = raw_line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let line_no = line_idx + 1;

        let mut row = Vec::with_capacity(width.unwrap_or(8));
        for (column, field) in line.split(DELIMITER).enumerate() {
            let field = field.trim();
            let value = if field.is_empty() {
                f64::NAN
            } else {
                field.parse::<f64>().map_err(|_| TableError::Parse {
                    path: path.to_path_buf(),
                    line: line_no,
                    column: column + 1,
                    value: field.to_string(),
                })?
            };
            row.push(value);
        }

        match width {
            Some(expected) if expected != row.len() => {
                return Err(TableError::Ragged {
                    path: path.to_path_buf(),
                    line: line_no,
                    expected,
                    found: row.len(),
                });
            }
            Some(_) => {}
            None => width = Some(row.len()),
        }
        rows.push(row);
    }

    Ok(rows)
}

/// Read a table from disk.
pub fn read_table(path: &Path, expected_columns: Option<usize>) -> Result<Vec<Vec<f64>>, TableError> {
    let text = fs::read_to_string(path).map_err(|source| TableError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_table(&text, expected_columns, path)
}

/// Format one value the way `numpy.savetxt` does by default.
#[inline]
pub fn format_value(v: f64) -> String {
    format!("{v:.18e}")
}

/// Render rows as table text, one line per row.
pub fn render_table<R: AsRef<[f64]>>(rows: impl IntoIterator<Item = R>) -> String {
    let mut out = String::new();
    for row in rows {
        let line: Vec<String> = row.as_ref().iter().map(|&v| format_value(v)).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

/// Write `contents` to `path` through a temporary sibling file and a rename,
/// so readers never observe a partially written file.
pub fn write_atomically(path: &Path, contents: &str) -> Result<(), TableError> {
    let mut tmp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    tmp_name.push(".partial");
    let tmp_path = path.with_file_name(tmp_name);

    let write_err = |source| TableError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Err(e) = fs::write(&tmp_path, contents) {
        let _ = fs::remove_file(&tmp_path);
        return Err(write_err(e));
    }
    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        write_err(e)
    })
}

/// Write rows to `path` (whole-file overwrite).
pub fn write_table<R: AsRef<[f64]>>(
    path: &Path,
    rows: impl IntoIterator<Item = R>,
) -> Result<(), TableError> {
    write_atomically(path, &render_table(rows))
}

/// Read a scalar image stored as a table.
pub fn read_image_table(path: &Path) -> Result<Image, TableError> {
    let rows = read_table(path, None)?;
    if rows.is_empty() {
        return Err(TableError::Empty {
            path: path.to_path_buf(),
        });
    }
    Image::from_rows(&rows).map_err(|source| TableError::Shape {
        path: path.to_path_buf(),
        source,
    })
}

/// Write a scalar image as a table.
pub fn write_image_table(path: &Path, image: &Image) -> Result<(), TableError> {
    if image.channels() != 1 {
        return Err(TableError::Channels {
            path: path.to_path_buf(),
            channels: image.channels(),
        });
    }
    write_table(path, image.rows())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_skips_comments_and_blank_lines() {
        let text = "# header\n1,2,3\n\n4, 5 ,6  # trailing\n";
        let rows = parse_table(text, None, Path::new("t.csv")).unwrap();
        assert_eq!(rows, vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
    }

    #[test]
    fn parse_reads_numpy_scientific_notation_and_missing_fields() {
        let text = "1.000000000000000000e+01,,-2.5e-3\n";
        let rows = parse_table(text, Some(3), Path::new("t.csv")).unwrap();
        assert_eq!(rows[0][0], 10.0);
        assert!(rows[0][1].is_nan());
        assert_eq!(rows[0][2], -0.0025);
    }

    #[test]
    fn parse_reports_line_and_column_of_bad_value() {
        let err = parse_table("1,2\n3,abc\n", None, Path::new("bad.csv")).unwrap_err();
        match err {
            TableError::Parse {
                line, column, value, ..
            } => {
                assert_eq!((line, column), (2, 2));
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn parse_rejects_ragged_rows() {
        let err = parse_table("1,2,3,4\n1,2,3\n", Some(4), Path::new("h.tis")).unwrap_err();
        assert!(matches!(
            err,
            TableError::Ragged {
                line: 2,
                expected: 4,
                found: 3,
                ..
            }
        ));
    }

    #[test]
    fn formatted_values_parse_back_exactly() {
        for v in [0.0, 1.0, -3.25, 1.0 / 3.0, 1e-300, 6.02e23] {
            let s = format_value(v);
            assert_eq!(s.parse::<f64>().unwrap(), v, "{s}");
        }
    }

    #[test]
    fn image_table_write_then_read_preserves_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mz_100.0.csv");
        let img = Image::from_rows(&[[0.5, 1.5, 2.5], [3.5, 4.5, 5.5]]).unwrap();
        write_image_table(&path, &img).unwrap();
        let back = read_image_table(&path).unwrap();
        assert_eq!(back, img);
        assert!(!dir.path().join("mz_100.0.csv.partial").exists());
    }

    #[test]
    fn empty_image_table_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        fs::write(&path, "# nothing\n").unwrap();
        assert!(matches!(
            read_image_table(&path),
            Err(TableError::Empty { .. })
        ));
    }

    #[test]
    fn multichannel_images_are_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgb.csv");
        let img = Image::new(2, 2, 3);
        assert!(matches!(
            write_image_table(&path, &img),
            Err(TableError::Channels { channels: 3, .. })
        ));
        assert!(!path.exists());
    }
}
