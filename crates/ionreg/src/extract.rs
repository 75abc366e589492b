//! Ion-image extraction.
//!
//! An ion image is the per-pixel sum of spectrum intensities whose m/z lies
//! within `mz ± tol`. Raw container parsing lives outside this crate; any
//! source of spectra plugs in through [`IonImageExtractor`].

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{read_json, ConfigError};
use crate::grid::Image;
use crate::table::{self, TableError};

pub const DEFAULT_EIT_DIR: &str = "EIT";
pub const DEFAULT_TOLERANCE: f64 = 1.0;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("invalid m/z value '{token}' in mass list")]
    InvalidMass { token: String },
    #[error("mass list is empty")]
    EmptyMassList,
    #[error("m/z tolerance must be finite and non-negative, got {0}")]
    InvalidTolerance(f64),
    #[error("spectrum {index}: pixel coordinates are 1-based, got {coordinate:?}")]
    InvalidCoordinate { index: usize, coordinate: [usize; 2] },
    #[error("spectrum {index}: {mzs} m/z values but {intensities} intensities")]
    SpectrumLength {
        index: usize,
        mzs: usize,
        intensities: usize,
    },
    #[error("spectrum {index}: m/z values are not in ascending order")]
    UnsortedSpectrum { index: usize },
    #[error("dataset has no spectra")]
    EmptyDataset,
    #[error(transparent)]
    Dataset(#[from] ConfigError),
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Table(#[from] TableError),
}

/// Source of extracted ion images.
pub trait IonImageExtractor {
    /// Image of summed intensity within `mz ± tol`.
    fn ion_image(&self, mz: f64, tol: f64) -> Result<Image, ExtractError>;
}

/// Extraction parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    pub out_dir: PathBuf,
    pub tolerance: f64,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from(DEFAULT_EIT_DIR),
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

/// One pixel's spectrum. `coordinate` is `[x, y]`, 1-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spectrum {
    pub coordinate: [usize; 2],
    pub mzs: Vec<f64>,
    pub intensities: Vec<f64>,
}

impl Spectrum {
    /// Sum of intensities with `|m/z - mz| <= tol`. Expects ascending m/z.
    pub fn window_sum(&self, mz: f64, tol: f64) -> f64 {
        let lo = self.mzs.partition_point(|&v| v < mz - tol);
        let hi = self.mzs.partition_point(|&v| v <= mz + tol);
        self.intensities.iter().take(hi).skip(lo).sum()
    }
}

/// In-memory collection of spectra, e.g. exported from an imzML reader.
///
/// Always validated: construction and deserialization both reject zero
/// coordinates, length mismatches and unsorted m/z arrays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DatasetRecord")]
pub struct SpectralDataset {
    spectra: Vec<Spectrum>,
}

#[derive(Deserialize)]
struct DatasetRecord {
    spectra: Vec<Spectrum>,
}

impl TryFrom<DatasetRecord> for SpectralDataset {
    type Error = ExtractError;

    fn try_from(record: DatasetRecord) -> Result<Self, Self::Error> {
        Self::new(record.spectra)
    }
}

impl SpectralDataset {
    pub fn new(spectra: Vec<Spectrum>) -> Result<Self, ExtractError> {
        let ds = Self { spectra };
        ds.validate()?;
        Ok(ds)
    }

    /// Load `{"spectra": [{"coordinate": [x, y], "mzs": [...], "intensities": [...]}]}`.
    pub fn from_json_file(path: &Path) -> Result<Self, ExtractError> {
        let ds: Self = read_json(path)?;
        tracing::info!(path = %path.display(), spectra = ds.spectra().len(), "spectral dataset loaded");
        Ok(ds)
    }

    fn validate(&self) -> Result<(), ExtractError> {
        if self.spectra.is_empty() {
            return Err(ExtractError::EmptyDataset);
        }
        for (index, s) in self.spectra.iter().enumerate() {
            if s.coordinate[0] == 0 || s.coordinate[1] == 0 {
                return Err(ExtractError::InvalidCoordinate {
                    index,
                    coordinate: s.coordinate,
                });
            }
            if s.mzs.len() != s.intensities.len() {
                return Err(ExtractError::SpectrumLength {
                    index,
                    mzs: s.mzs.len(),
                    intensities: s.intensities.len(),
                });
            }
            if s.mzs.windows(2).any(|w| w[1] < w[0]) {
                return Err(ExtractError::UnsortedSpectrum { index });
            }
        }
        Ok(())
    }

    pub fn spectra(&self) -> &[Spectrum] {
        &self.spectra
    }

    /// `[width, height]` spanned by the pixel coordinates.
    pub fn dims(&self) -> [usize; 2] {
        self.spectra.iter().fold([0, 0], |acc, s| {
            [acc[0].max(s.coordinate[0]), acc[1].max(s.coordinate[1])]
        })
    }
}

impl IonImageExtractor for SpectralDataset {
    fn ion_image(&self, mz: f64, tol: f64) -> Result<Image, ExtractError> {
        if !(tol.is_finite() && tol >= 0.0) {
            return Err(ExtractError::InvalidTolerance(tol));
        }
        let [w, h] = self.dims();
        let mut img = Image::new(w, h, 1);
        for s in &self.spectra {
            let [x, y] = s.coordinate;
            img.set(x - 1, y - 1, 0, s.window_sum(mz, tol));
        }
        Ok(img)
    }
}

/// Parse a comma-separated list of m/z values, e.g. `"885.5, 766.5"`.
pub fn parse_mass_list(text: &str) -> Result<Vec<f64>, ExtractError> {
    let masses = text
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|token| match token.parse::<f64>() {
            Ok(v) if v.is_finite() && v > 0.0 => Ok(v),
            _ => Err(ExtractError::InvalidMass {
                token: token.to_string(),
            }),
        })
        .collect::<Result<Vec<_>, _>>()?;
    if masses.is_empty() {
        return Err(ExtractError::EmptyMassList);
    }
    Ok(masses)
}

/// File name of the ion image for `mz`, e.g. `mz_885.5.csv`.
pub fn ion_image_file_name(mz: f64) -> String {
    format!("mz_{mz:?}.csv")
}

/// Extract one image per mass and write each as a table into `out_dir`.
///
/// All images are extracted before the directory is created, so a bad mass
/// or tolerance leaves the filesystem untouched.
pub fn extract_ion_images<E: IonImageExtractor + ?Sized>(
    extractor: &E,
    masses: &[f64],
    tol: f64,
    out_dir: &Path,
) -> Result<Vec<PathBuf>, ExtractError> {
    if masses.is_empty() {
        return Err(ExtractError::EmptyMassList);
    }
    let images = masses
        .iter()
        .map(|&mz| extractor.ion_image(mz, tol))
        .collect::<Result<Vec<_>, _>>()?;

    fs::create_dir_all(out_dir).map_err(|source| ExtractError::CreateDir {
        path: out_dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::with_capacity(images.len());
    for (&mz, img) in masses.iter().zip(&images) {
        let path = out_dir.join(ion_image_file_name(mz));
        table::write_image_table(&path, img)?;
        tracing::info!(mz, path = %path.display(), "ion image written");
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> SpectralDataset {
        let spectrum = |x, y, ints: [f64; 4]| Spectrum {
            coordinate: [x, y],
            mzs: vec![99.0, 100.0, 101.5, 200.0],
            intensities: ints.to_vec(),
        };
        SpectralDataset::new(vec![
            spectrum(1, 1, [1.0, 2.0, 4.0, 8.0]),
            spectrum(2, 1, [0.0, 1.0, 0.0, 3.0]),
            spectrum(1, 2, [5.0, 0.0, 0.0, 0.0]),
        ])
        .unwrap()
    }

    #[test]
    fn window_sum_is_inclusive_on_both_ends() {
        let ds = dataset();
        assert_eq!(ds.spectra()[0].window_sum(100.0, 1.0), 3.0);
        assert_eq!(ds.spectra()[0].window_sum(100.5, 1.0), 6.0);
        assert_eq!(ds.spectra()[0].window_sum(150.0, 1.0), 0.0);
    }

    #[test]
    fn ion_image_places_spectra_at_one_based_coordinates() {
        let img = dataset().ion_image(200.0, 0.5).unwrap();
        assert_eq!(img.shape(), [2, 2]);
        assert_eq!(img.get(0, 0, 0), 8.0);
        assert_eq!(img.get(1, 0, 0), 3.0);
        assert_eq!(img.get(0, 1, 0), 0.0);
        // Pixel without a spectrum stays zero.
        assert_eq!(img.get(1, 1, 0), 0.0);
    }

    #[test]
    fn invalid_datasets_are_rejected() {
        let bad = |s: Spectrum| SpectralDataset::new(vec![s]).unwrap_err();
        assert!(matches!(
            bad(Spectrum { coordinate: [0, 1], mzs: vec![], intensities: vec![] }),
            ExtractError::InvalidCoordinate { index: 0, .. }
        ));
        assert!(matches!(
            bad(Spectrum { coordinate: [1, 1], mzs: vec![1.0], intensities: vec![] }),
            ExtractError::SpectrumLength { mzs: 1, intensities: 0, .. }
        ));
        assert!(matches!(
            bad(Spectrum { coordinate: [1, 1], mzs: vec![2.0, 1.0], intensities: vec![1.0, 1.0] }),
            ExtractError::UnsortedSpectrum { index: 0 }
        ));
        assert!(matches!(SpectralDataset::new(vec![]), Err(ExtractError::EmptyDataset)));
    }

    #[test]
    fn mass_list_parsing() {
        assert_eq!(parse_mass_list("885.5, 766.5,").unwrap(), vec![885.5, 766.5]);
        assert!(matches!(
            parse_mass_list("885.5, abc"),
            Err(ExtractError::InvalidMass { token }) if token == "abc"
        ));
        assert!(matches!(parse_mass_list(" , "), Err(ExtractError::EmptyMassList)));
        assert!(matches!(parse_mass_list("-3"), Err(ExtractError::InvalidMass { .. })));
    }

    #[test]
    fn file_names_keep_decimal_point() {
        assert_eq!(ion_image_file_name(885.5), "mz_885.5.csv");
        assert_eq!(ion_image_file_name(100.0), "mz_100.0.csv");
    }

    #[test]
    fn extraction_writes_one_table_per_mass() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("EIT");
        let written = extract_ion_images(&dataset(), &[100.0, 200.0], 1.0, &out).unwrap();
        assert_eq!(written, vec![out.join("mz_100.0.csv"), out.join("mz_200.0.csv")]);

        let back = table::read_image_table(&written[1]).unwrap();
        assert_eq!(back, dataset().ion_image(200.0, 1.0).unwrap());
    }

    #[test]
    fn bad_tolerance_creates_no_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("EIT");
        assert!(matches!(
            extract_ion_images(&dataset(), &[100.0], f64::NAN, &out),
            Err(ExtractError::InvalidTolerance(_))
        ));
        assert!(!out.exists());
    }

    #[test]
    fn deserialization_validates_coordinates() {
        let parsed: Result<SpectralDataset, _> = serde_json::from_str(
            r#"{"spectra": [{"coordinate": [0, 0], "mzs": [1.0], "intensities": [1.0]}]}"#,
        );
        let err = parsed.unwrap_err();
        assert!(err.to_string().contains("1-based"), "{err}");

        let parsed: Result<SpectralDataset, _> = serde_json::from_str(
            r#"{"spectra": [{"coordinate": [1, 1], "mzs": [2.0, 1.0], "intensities": [1.0, 1.0]}]}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn zero_coordinate_in_json_file_is_an_error_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spectra.json");
        std::fs::write(
            &path,
            r#"{"spectra": [{"coordinate": [0, 1], "mzs": [1.0], "intensities": [1.0]}]}"#,
        )
        .unwrap();
        assert!(matches!(
            SpectralDataset::from_json_file(&path),
            Err(ExtractError::Dataset(ConfigError::Parse { .. }))
        ));
    }

    #[test]
    fn dataset_loads_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spectra.json");
        std::fs::write(
            &path,
            r#"{"spectra": [{"coordinate": [2, 3], "mzs": [10.0], "intensities": [7.0]}]}"#,
        )
        .unwrap();
        let ds = SpectralDataset::from_json_file(&path).unwrap();
        assert_eq!(ds.dims(), [2, 3]);
        assert_eq!(ds.ion_image(10.0, 0.1).unwrap().get(1, 2, 0), 7.0);
    }
}
