//! Physical parameters for computing a spectral table.
//!
//! [`SpectralParameters`] is what a caller (or a JSON config file) supplies;
//! every field is optional. [`SpectralParameters::resolve`] fills the gaps
//! and yields the [`ResolvedParameters`] handed to the table computer.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Constant pressure `n T` assumed when no density is given, in cm^-3 K.
pub const PRESSURE: f64 = 1e15;

/// Default temperature grid: 5.5 to 7.5 inclusive in steps of 0.1, forwarded
/// to the computer as K without rescaling.
pub const TEMPERATURE_MIN: f64 = 5.5;
pub const TEMPERATURE_MAX: f64 = 7.5;
pub const TEMPERATURE_STEP: f64 = 0.1;

/// Default wavelength range in Å.
pub const WAVE_MIN: f64 = 0.5;
pub const WAVE_MAX: f64 = 60.5;
/// Default wavelength bin width in mÅ.
pub const DELTA_WAVE: f64 = 25.0;

pub const IONEQ_FILENAME: &str = "chianti.ioneq";
pub const ABUNDANCE_FILENAME: &str = "sun_coronal_1992_feldman.abund";

/// The default temperature grid (21 points, 5.5 ..= 7.5).
pub fn default_temperature() -> Vec<f64> {
    let n = ((TEMPERATURE_MAX - TEMPERATURE_MIN) / TEMPERATURE_STEP).round() as usize;
    (0..=n)
        .map(|i| TEMPERATURE_MIN + i as f64 * TEMPERATURE_STEP)
        .collect()
}

/// Density at constant pressure: `PRESSURE / T` for each temperature.
pub fn constant_pressure_density(temperature: &[f64]) -> Vec<f64> {
    temperature.iter().map(|t| PRESSURE / t).collect()
}

/// Caller-supplied overrides. `None` means "use the default".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpectralParameters {
    /// Temperatures in K.
    pub temperature: Option<Vec<f64>>,
    /// Densities in cm^-3, one per temperature.
    pub density: Option<Vec<f64>>,
    /// Å
    pub wave_min: Option<f64>,
    /// Å
    pub wave_max: Option<f64>,
    /// mÅ
    pub delta_wave: Option<f64>,
    pub ioneq_filename: Option<String>,
    pub abundance_filename: Option<String>,
    /// Restrict the calculation to these ions, e.g. `["fe_18", "o_8"]`.
    pub ion_list: Option<Vec<String>>,
    pub include_continuum: Option<bool>,
    /// Atomic database location; the computer's own lookup applies when unset.
    pub chianti_dir: Option<PathBuf>,
}

/// Fully specified parameters, as forwarded to a [`crate::compute::TableComputer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedParameters {
    pub temperature: Vec<f64>,
    pub density: Vec<f64>,
    pub wave_min: f64,
    pub wave_max: f64,
    pub delta_wave: f64,
    pub ioneq_filename: String,
    pub abundance_filename: String,
    pub ion_list: Option<Vec<String>>,
    pub include_continuum: bool,
    pub chianti_dir: Option<PathBuf>,
}

impl SpectralParameters {
    /// Read overrides from a JSON file. Unknown keys are rejected.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading parameter file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("parsing parameter file {}", path.display()))
    }

    /// Fill in every unset field. No validation is performed; the computer
    /// decides what it accepts.
    ///
    /// The density, when absent, is derived from whichever temperature grid
    /// ends up being used, so overriding only `temperature` still gives a
    /// constant-pressure density on the new grid.
    pub fn resolve(self) -> ResolvedParameters {
        let temperature = self.temperature.unwrap_or_else(default_temperature);
        let density = self
            .density
            .unwrap_or_else(|| constant_pressure_density(&temperature));

        ResolvedParameters {
            temperature,
            density,
            wave_min: self.wave_min.unwrap_or(WAVE_MIN),
            wave_max: self.wave_max.unwrap_or(WAVE_MAX),
            delta_wave: self.delta_wave.unwrap_or(DELTA_WAVE),
            ioneq_filename: self
                .ioneq_filename
                .unwrap_or_else(|| IONEQ_FILENAME.to_string()),
            abundance_filename: self
                .abundance_filename
                .unwrap_or_else(|| ABUNDANCE_FILENAME.to_string()),
            ion_list: self.ion_list,
            include_continuum: self.include_continuum.unwrap_or(true),
            chianti_dir: self.chianti_dir,
        }
    }
}

impl Default for ResolvedParameters {
    fn default() -> Self {
        SpectralParameters::default().resolve()
    }
}
