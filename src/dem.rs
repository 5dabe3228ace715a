//! Folding a differential emission measure through a spectral table.

use log::debug;
use ndarray::{s, Array2, Array3};
use thiserror::Error;

use crate::table::SpectralTable;

#[derive(Debug, Error, PartialEq)]
pub enum DemError {
    #[error("DEM has {axis} temperature bins but {temperature} temperatures")]
    TemperatureMismatch { axis: usize, temperature: usize },

    #[error("DEM has no temperature bins")]
    Empty,

    #[error("spectral table intensity has shape {actual:?}, expected ({temperature}, {wavelength}) from its axes")]
    TableShape {
        actual: (usize, usize),
        temperature: usize,
        wavelength: usize,
    },

    #[error("spectral table has no temperatures")]
    EmptyTable,
}

/// Emission measure per pixel and temperature bin.
#[derive(Debug, Clone, PartialEq)]
pub struct DemCube {
    /// Temperature bin centres in K.
    pub temperature: Vec<f64>,
    /// Emission measure in cm^-5, shape `(y, x, temperature)`.
    pub emission_measure: Array3<f64>,
}

impl DemCube {
    pub fn new(temperature: Vec<f64>, emission_measure: Array3<f64>) -> Result<Self, DemError> {
        if temperature.is_empty() {
            return Err(DemError::Empty);
        }
        let axis = emission_measure.dim().2;
        if axis != temperature.len() {
            return Err(DemError::TemperatureMismatch {
                axis,
                temperature: temperature.len(),
            });
        }
        Ok(DemCube {
            temperature,
            emission_measure,
        })
    }
}

/// Spectrum per pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralCube {
    /// Wavelength axis in Å, taken from the table.
    pub wavelength: Vec<f64>,
    /// Shape `(y, x, wavelength)`.
    pub data: Array3<f64>,
    pub unit: String,
}

/// Response of `table` at each DEM temperature, shape `(temperature, wavelength)`.
pub fn response_matrix(table: &SpectralTable, temperature: &[f64]) -> Array2<f64> {
    let mut response = Array2::zeros((temperature.len(), table.n_wavelength()));
    for (mut row, &t) in response.rows_mut().into_iter().zip(temperature) {
        row.assign(&table.response_at(t));
    }
    response
}

/// The intensity grid must match the table's own axes before any row is indexed.
fn check_table(table: &SpectralTable) -> Result<(), DemError> {
    if table.temperature.is_empty() {
        return Err(DemError::EmptyTable);
    }
    let expected = (table.n_temperature(), table.n_wavelength());
    if table.intensity.dim() != expected {
        return Err(DemError::TableShape {
            actual: table.intensity.dim(),
            temperature: expected.0,
            wavelength: expected.1,
        });
    }
    Ok(())
}

/// `data[y, x, λ] = Σ_T EM[y, x, T] · G(T, λ)`.
pub fn synthesize(table: &SpectralTable, dem: &DemCube) -> Result<SpectralCube, DemError> {
    check_table(table)?;
    let (ny, nx, nt) = dem.emission_measure.dim();
    if nt != dem.temperature.len() {
        return Err(DemError::TemperatureMismatch {
            axis: nt,
            temperature: dem.temperature.len(),
        });
    }
    let response = response_matrix(table, &dem.temperature);
    debug!(
        "folding {ny}x{nx} DEM over {} temperatures into {} wavelengths",
        dem.temperature.len(),
        table.n_wavelength()
    );

    let mut data = Array3::zeros((ny, nx, table.n_wavelength()));
    for iy in 0..ny {
        for ix in 0..nx {
            let em = dem.emission_measure.slice(s![iy, ix, ..]);
            data.slice_mut(s![iy, ix, ..]).assign(&em.dot(&response));
        }
    }

    Ok(SpectralCube {
        wavelength: table.wavelength.clone(),
        data,
        unit: format!("({}) cm-5", table.intensity_unit),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{TableMetadata, DEFAULT_INTENSITY_UNIT};
    use approx::assert_relative_eq;
    use ndarray::array;

    fn table() -> SpectralTable {
        SpectralTable::new(
            vec![1e6, 1e7],
            vec![1e9, 1e8],
            vec![10.0, 20.0],
            array![[1.0, 0.0], [0.0, 2.0]],
            DEFAULT_INTENSITY_UNIT,
            TableMetadata::default(),
        )
        .unwrap()
    }

    #[test]
    fn rejects_mismatched_temperature_axis() {
        let err = DemCube::new(vec![1e6], Array3::zeros((1, 1, 2))).unwrap_err();
        assert_eq!(
            err,
            DemError::TemperatureMismatch {
                axis: 2,
                temperature: 1
            }
        );
        assert_eq!(
            DemCube::new(vec![], Array3::zeros((1, 1, 0))).unwrap_err(),
            DemError::Empty
        );
    }

    #[test]
    fn pixels_sum_weighted_responses() {
        let mut em = Array3::zeros((1, 2, 2));
        em[[0, 0, 0]] = 3.0;
        em[[0, 1, 0]] = 1.0;
        em[[0, 1, 1]] = 5.0;
        let dem = DemCube::new(vec![1e6, 1e7], em).unwrap();

        let cube = synthesize(&table(), &dem).unwrap();
        assert_eq!(cube.wavelength, vec![10.0, 20.0]);
        assert_eq!(cube.data.dim(), (1, 2, 2));
        assert_relative_eq!(cube.data[[0, 0, 0]], 3.0);
        assert_relative_eq!(cube.data[[0, 0, 1]], 0.0);
        assert_relative_eq!(cube.data[[0, 1, 0]], 1.0);
        assert_relative_eq!(cube.data[[0, 1, 1]], 10.0);
    }

    #[test]
    fn bins_outside_table_contribute_nothing() {
        let mut em = Array3::zeros((1, 1, 2));
        em[[0, 0, 0]] = 100.0;
        em[[0, 0, 1]] = 1.0;
        let dem = DemCube::new(vec![1e4, 1e7], em).unwrap();

        let cube = synthesize(&table(), &dem).unwrap();
        assert_relative_eq!(cube.data[[0, 0, 0]], 0.0);
        assert_relative_eq!(cube.data[[0, 0, 1]], 2.0);
    }

    #[test]
    fn table_with_short_intensity_grid_is_rejected() {
        let table = SpectralTable {
            temperature: vec![1e6, 2e6],
            density: vec![1e9, 5e8],
            wavelength: vec![10.0],
            intensity: Array2::zeros((1, 1)),
            intensity_unit: DEFAULT_INTENSITY_UNIT.to_string(),
            metadata: TableMetadata::default(),
        };
        let dem = DemCube::new(vec![1.5e6], Array3::ones((1, 1, 1))).unwrap();

        assert_eq!(
            synthesize(&table, &dem).unwrap_err(),
            DemError::TableShape {
                actual: (1, 1),
                temperature: 2,
                wavelength: 1
            }
        );
    }

    #[test]
    fn table_without_temperatures_is_rejected() {
        let table = SpectralTable {
            temperature: vec![],
            density: vec![],
            wavelength: vec![10.0],
            intensity: Array2::zeros((0, 1)),
            intensity_unit: DEFAULT_INTENSITY_UNIT.to_string(),
            metadata: TableMetadata::default(),
        };
        let dem = DemCube::new(vec![1e6], Array3::ones((1, 1, 1))).unwrap();
        assert_eq!(synthesize(&table, &dem).unwrap_err(), DemError::EmptyTable);
    }

    #[test]
    fn response_matrix_interpolates_between_rows() {
        let response = response_matrix(&table(), &[10f64.powf(6.5)]);
        assert_relative_eq!(response[[0, 0]], 0.5, epsilon = 1e-12);
        assert_relative_eq!(response[[0, 1]], 1.0, epsilon = 1e-12);
    }
}
