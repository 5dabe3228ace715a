//! Writes a synthetic spectral table for trying out the pipeline without an
//! atomic database. Line strengths are Gaussian contribution functions in
//! log T, not real atomic data.

use std::path::Path;

use anyhow::Result;
use ndarray::Array2;

use dem_spectra::params::SpectralParameters;
use dem_spectra::table::{self, SpectralTable, TableMetadata, DEFAULT_INTENSITY_UNIT};

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// (ion, wavelength Å, log10 T of peak formation, peak emissivity)
const LINES: [(&str, f64, f64, f64); 7] = [
    ("fe_25", 1.85, 7.4, 2e-25),
    ("si_13", 6.65, 7.0, 6e-25),
    ("mg_11", 9.17, 6.8, 5e-25),
    ("ne_9", 13.45, 6.6, 8e-25),
    ("fe_17", 15.01, 6.6, 1.5e-24),
    ("o_8", 18.97, 6.5, 1.2e-24),
    ("o_7", 21.60, 6.3, 9e-25),
];

/// Rough free-free shape: exp(-hc / λkT) / λ², in the same units as the lines.
fn continuum(wavelength: f64, temperature: f64) -> f64 {
    const HC_OVER_K: f64 = 1.4388e8; // Å K
    1e-27 * (-HC_OVER_K / (wavelength * temperature)).exp() / wavelength.powi(2)
        / temperature.sqrt()
}

fn main() -> Result<()> {
    env_logger::init();
    // Contribution functions peak at coronal temperatures, so the grid is
    // 10^5.5 ..= 10^7.5 K rather than the bare default values.
    let temperature = (0..=20)
        .map(|i| 10f64.powf(5.5 + 0.1 * i as f64))
        .collect();
    let params = SpectralParameters {
        temperature: Some(temperature),
        ..Default::default()
    }
    .resolve();

    let step = params.delta_wave / 1000.0;
    let n_wave = ((params.wave_max - params.wave_min) / step).round() as usize + 1;
    let wavelength: Vec<f64> = (0..n_wave)
        .map(|i| params.wave_min + i as f64 * step)
        .collect();

    let mut intensity = Array2::zeros((params.temperature.len(), n_wave));
    for (mut row, &t) in intensity.rows_mut().into_iter().zip(&params.temperature) {
        let log_t = t.log10();
        for (value, &wl) in row.iter_mut().zip(&wavelength) {
            let lines: f64 = LINES
                .iter()
                .map(|&(_, center, peak_log_t, amp)| {
                    gaussian(log_t, peak_log_t, 0.15, amp) * gaussian(wl, center, step, 1.0) / step
                })
                .sum();
            *value = lines + continuum(wl, t);
        }
    }

    let metadata = TableMetadata {
        ioneq_filename: Some(params.ioneq_filename.clone()),
        abundance_filename: Some(params.abundance_filename.clone()),
        ion_list: Some(LINES.iter().map(|(ion, ..)| ion.to_string()).collect()),
        include_continuum: Some(params.include_continuum),
    };
    let spectral_table = SpectralTable::new(
        params.temperature,
        params.density,
        wavelength,
        intensity,
        DEFAULT_INTENSITY_UNIT,
        metadata,
    )?;

    let output_path = Path::new("sample_table.parquet");
    table::write_file(output_path, &spectral_table)?;

    println!("Wrote {spectral_table} to {}", output_path.display());
    Ok(())
}
