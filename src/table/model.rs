use std::fmt;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// TableError – shape / axis problems found while assembling a table
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq)]
pub enum TableError {
    #[error("temperature has {temperature} values but density has {density}")]
    DensityLength { temperature: usize, density: usize },

    #[error("intensity has shape {actual:?}, expected ({rows}, {cols}) (temperature, wavelength)")]
    IntensityShape {
        actual: (usize, usize),
        rows: usize,
        cols: usize,
    },

    #[error("temperature axis must be strictly increasing and positive (index {index})")]
    TemperatureOrder { index: usize },

    #[error("table has an empty {0} axis")]
    EmptyAxis(&'static str),
}

// ---------------------------------------------------------------------------
// TableMetadata – how the table was computed
// ---------------------------------------------------------------------------

/// Provenance recorded by the table computer. Every field is optional because
/// tables read from some file formats (CSV) or third-party tools carry none.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ioneq_filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abundance_filename: Option<String>,
    /// `None` means every available ion was included.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ion_list: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_continuum: Option<bool>,
}

// ---------------------------------------------------------------------------
// SpectralTable – emissivity as a function of (temperature, wavelength)
// ---------------------------------------------------------------------------

/// Default unit attached to tables that do not state one.
pub const DEFAULT_INTENSITY_UNIT: &str = "cm3 ph Angstrom-1 s-1 sr-1";

/// A spectral response table.
///
/// Rows are temperatures, columns are wavelengths. Density is not an
/// independent axis: `density[i]` is the density at which row `i` was
/// computed.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralTable {
    /// Temperature axis in K, strictly increasing.
    pub temperature: Vec<f64>,
    /// Electron density in cm^-3, one per temperature.
    pub density: Vec<f64>,
    /// Wavelength axis in Å.
    pub wavelength: Vec<f64>,
    /// Intensity, shape `(temperature.len(), wavelength.len())`.
    pub intensity: Array2<f64>,
    pub intensity_unit: String,
    pub metadata: TableMetadata,
}

impl SpectralTable {
    /// Assemble a table, checking that the axes agree with the intensity grid.
    pub fn new(
        temperature: Vec<f64>,
        density: Vec<f64>,
        wavelength: Vec<f64>,
        intensity: Array2<f64>,
        intensity_unit: impl Into<String>,
        metadata: TableMetadata,
    ) -> Result<Self, TableError> {
        if temperature.is_empty() {
            return Err(TableError::EmptyAxis("temperature"));
        }
        if wavelength.is_empty() {
            return Err(TableError::EmptyAxis("wavelength"));
        }
        if density.len() != temperature.len() {
            return Err(TableError::DensityLength {
                temperature: temperature.len(),
                density: density.len(),
            });
        }
        if intensity.dim() != (temperature.len(), wavelength.len()) {
            return Err(TableError::IntensityShape {
                actual: intensity.dim(),
                rows: temperature.len(),
                cols: wavelength.len(),
            });
        }
        if temperature[0] <= 0.0 {
            return Err(TableError::TemperatureOrder { index: 0 });
        }
        if let Some(i) = temperature.windows(2).position(|w| w[1] <= w[0]) {
            return Err(TableError::TemperatureOrder { index: i + 1 });
        }

        Ok(SpectralTable {
            temperature,
            density,
            wavelength,
            intensity,
            intensity_unit: intensity_unit.into(),
            metadata,
        })
    }

    pub fn n_temperature(&self) -> usize {
        self.temperature.len()
    }

    pub fn n_wavelength(&self) -> usize {
        self.wavelength.len()
    }

    /// log10 of the temperature axis.
    pub fn log_temperature(&self) -> Vec<f64> {
        self.temperature.iter().map(|t| t.log10()).collect()
    }

    /// Spectrum at an arbitrary temperature, linearly interpolated in log10 T.
    ///
    /// Temperatures outside the tabulated range contribute nothing and give an
    /// all-zero spectrum.
    pub fn response_at(&self, temperature: f64) -> Array1<f64> {
        let log_axis = self.log_temperature();
        let n = log_axis.len();
        let zeros = || Array1::zeros(self.n_wavelength());

        if n == 0 || !(temperature > 0.0) {
            return zeros();
        }
        let log_t = temperature.log10();
        if log_t < log_axis[0] || log_t > log_axis[n - 1] {
            return zeros();
        }
        if n == 1 {
            return self.intensity.row(0).to_owned();
        }

        // First index whose log T is >= log_t, at least 1 so `hi - 1` is valid.
        let hi = log_axis.partition_point(|&v| v < log_t).clamp(1, n - 1);
        let lo = hi - 1;
        let w = (log_t - log_axis[lo]) / (log_axis[hi] - log_axis[lo]);

        &self.intensity.row(lo) * (1.0 - w) + &self.intensity.row(hi) * w
    }
}

impl fmt::Display for SpectralTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let first = |v: &[f64]| v.first().copied().unwrap_or(f64::NAN);
        let last = |v: &[f64]| v.last().copied().unwrap_or(f64::NAN);
        write!(
            f,
            "SpectralTable[{} T x {} λ] T = {:.3e}..{:.3e} K, λ = {:.3}..{:.3} Å ({})",
            self.n_temperature(),
            self.n_wavelength(),
            first(&self.temperature),
            last(&self.temperature),
            first(&self.wavelength),
            last(&self.wavelength),
            self.intensity_unit,
        )
    }
}
