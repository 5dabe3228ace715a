//! `SpectralModel`: picks the spectral table from one of three sources.

use std::path::{Path, PathBuf};

use anyhow::Result;
use log::info;

use crate::compute::TableComputer;
use crate::dem::{self, DemCube, DemError, SpectralCube};
use crate::params::SpectralParameters;
use crate::table::{self, SpectralTable};

// ---------------------------------------------------------------------------
// Table sources
// ---------------------------------------------------------------------------

/// Where a [`SpectralModel`] gets its spectral table from.
#[derive(Debug, Clone)]
pub enum TableSource {
    /// Compute a new table from the (defaulted) parameters.
    Default,
    /// Use an already assembled table as is.
    Table(SpectralTable),
    /// Read a stored table.
    Reference(PathBuf),
}

impl From<SpectralTable> for TableSource {
    fn from(table: SpectralTable) -> Self {
        TableSource::Table(table)
    }
}

impl From<PathBuf> for TableSource {
    fn from(path: PathBuf) -> Self {
        TableSource::Reference(path)
    }
}

impl From<Option<SpectralTable>> for TableSource {
    fn from(table: Option<SpectralTable>) -> Self {
        table.map_or(TableSource::Default, TableSource::Table)
    }
}

/// Reads a stored spectral table given a reference to it.
pub trait TableReader {
    fn read(&self, reference: &Path) -> Result<SpectralTable>;
}

impl<R: TableReader + ?Sized> TableReader for &R {
    fn read(&self, reference: &Path) -> Result<SpectralTable> {
        (**self).read(reference)
    }
}

/// Reads tables from the local filesystem with [`table::load_file`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FileTableReader;

impl TableReader for FileTableReader {
    fn read(&self, reference: &Path) -> Result<SpectralTable> {
        table::load_file(reference)
    }
}

// ---------------------------------------------------------------------------
// SpectralModel
// ---------------------------------------------------------------------------

/// Holds the spectral table used to turn a DEM into spectra.
#[derive(Debug, Clone)]
pub struct SpectralModel {
    spectral_table: SpectralTable,
}

impl SpectralModel {
    /// Resolve the spectral table from `source`.
    ///
    /// `params` only matters for [`TableSource::Default`]. Tables given
    /// directly or read through `reader` are taken as they come, and errors
    /// from either collaborator are returned untouched.
    pub fn new<R, C>(
        source: TableSource,
        params: SpectralParameters,
        reader: &R,
        computer: &C,
    ) -> Result<Self>
    where
        R: TableReader + ?Sized,
        C: TableComputer + ?Sized,
    {
        let spectral_table = match source {
            TableSource::Default => Self::build_spectral_table(params, computer)?,
            TableSource::Table(table) => table,
            TableSource::Reference(path) => {
                info!("reading spectral table from {}", path.display());
                reader.read(&path)?
            }
        };
        Ok(SpectralModel { spectral_table })
    }

    /// Wrap an existing table.
    pub fn from_table(spectral_table: SpectralTable) -> Self {
        SpectralModel { spectral_table }
    }

    /// Compute a table from `params`, with defaults for anything unset.
    pub fn build_spectral_table<C>(params: SpectralParameters, computer: &C) -> Result<SpectralTable>
    where
        C: TableComputer + ?Sized,
    {
        let resolved = params.resolve();
        computer.compute(&resolved)
    }

    pub fn spectral_table(&self) -> &SpectralTable {
        &self.spectral_table
    }

    pub fn into_spectral_table(self) -> SpectralTable {
        self.spectral_table
    }

    /// Spectrum in every pixel of `dem`.
    pub fn run(&self, dem: &DemCube) -> Result<SpectralCube, DemError> {
        dem::synthesize(&self.spectral_table, dem)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use anyhow::bail;
    use ndarray::array;

    use super::*;
    use crate::params::{default_temperature, ResolvedParameters};
    use crate::table::{TableMetadata, DEFAULT_INTENSITY_UNIT};

    fn table(marker: f64) -> SpectralTable {
        SpectralTable::new(
            vec![1e6],
            vec![1e9],
            vec![1.0, 2.0],
            array![[marker, marker]],
            DEFAULT_INTENSITY_UNIT,
            TableMetadata::default(),
        )
        .unwrap()
    }

    #[derive(Default)]
    struct RecordingReader {
        calls: RefCell<Vec<PathBuf>>,
    }

    impl TableReader for RecordingReader {
        fn read(&self, reference: &Path) -> Result<SpectralTable> {
            self.calls.borrow_mut().push(reference.to_path_buf());
            Ok(table(2.0))
        }
    }

    #[derive(Default)]
    struct RecordingComputer {
        calls: RefCell<Vec<ResolvedParameters>>,
    }

    impl TableComputer for RecordingComputer {
        fn compute(&self, params: &ResolvedParameters) -> Result<SpectralTable> {
            self.calls.borrow_mut().push(params.clone());
            Ok(table(3.0))
        }
    }

    struct FailingComputer;

    impl TableComputer for FailingComputer {
        fn compute(&self, _: &ResolvedParameters) -> Result<SpectralTable> {
            bail!("atomic database not found")
        }
    }

    #[test]
    fn existing_table_is_used_unchanged() {
        let reader = RecordingReader::default();
        let computer = RecordingComputer::default();
        let given = table(1.0);

        let model = SpectralModel::new(
            TableSource::Table(given.clone()),
            SpectralParameters::default(),
            &reader,
            &computer,
        )
        .unwrap();

        assert_eq!(model.spectral_table(), &given);
        assert!(reader.calls.borrow().is_empty());
        assert!(computer.calls.borrow().is_empty());
    }

    #[test]
    fn reference_goes_to_reader_verbatim() {
        let reader = RecordingReader::default();
        let computer = RecordingComputer::default();

        let model = SpectralModel::new(
            TableSource::Reference(PathBuf::from("tables/moxsi.parquet")),
            SpectralParameters::default(),
            &reader,
            &computer,
        )
        .unwrap();

        assert_eq!(*reader.calls.borrow(), [PathBuf::from("tables/moxsi.parquet")]);
        assert!(computer.calls.borrow().is_empty());
        assert_eq!(model.into_spectral_table(), table(2.0));
    }

    #[test]
    fn no_table_computes_with_defaults() {
        let reader = RecordingReader::default();
        let computer = RecordingComputer::default();

        let model = SpectralModel::new(
            TableSource::Default,
            SpectralParameters::default(),
            &reader,
            &computer,
        )
        .unwrap();

        assert!(reader.calls.borrow().is_empty());
        let calls = computer.calls.borrow();
        assert_eq!(calls.len(), 1);
        let p = &calls[0];
        assert_eq!(p.temperature, default_temperature());
        assert_eq!(p.temperature.len(), 21);
        assert_eq!(p.temperature[0], 5.5);
        assert_eq!(p.temperature[20], 7.5);
        assert_eq!(p.density[0], 1e15 / 5.5);
        assert_eq!(p.wave_min, 0.5);
        assert_eq!(p.wave_max, 60.5);
        assert_eq!(p.delta_wave, 25.0);
        assert_eq!(p.ioneq_filename, "chianti.ioneq");
        assert_eq!(p.abundance_filename, "sun_coronal_1992_feldman.abund");
        assert_eq!(p.ion_list, None);
        assert!(p.include_continuum);
        assert_eq!(model.spectral_table(), &table(3.0));
    }

    #[test]
    fn overrides_reach_the_computer() {
        let computer = RecordingComputer::default();
        let params = SpectralParameters {
            include_continuum: Some(false),
            ion_list: Some(vec!["fe_18".into()]),
            ..Default::default()
        };

        SpectralModel::new(TableSource::Default, params, &FileTableReader, &computer).unwrap();

        let calls = computer.calls.borrow();
        assert_eq!(
            calls[0],
            ResolvedParameters {
                include_continuum: false,
                ion_list: Some(vec!["fe_18".into()]),
                ..ResolvedParameters::default()
            }
        );
    }

    #[test]
    fn computer_errors_propagate() {
        let err = SpectralModel::new(
            TableSource::Default,
            SpectralParameters::default(),
            &FileTableReader,
            &FailingComputer,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "atomic database not found");
    }

    #[test]
    fn unreadable_reference_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = SpectralModel::new(
            TableSource::Reference(dir.path().join("missing.parquet")),
            SpectralParameters::default(),
            &FileTableReader,
            &FailingComputer,
        );
        assert!(result.is_err());
    }

    #[test]
    fn run_folds_dem_through_stored_table() {
        let model = SpectralModel::from_table(table(4.0));
        let dem = DemCube::new(vec![1e6], ndarray::Array3::from_elem((2, 1, 1), 0.5)).unwrap();

        let cube = model.run(&dem).unwrap();
        assert_eq!(cube.data.dim(), (2, 1, 2));
        assert!(cube.data.iter().all(|&v| v == 2.0));
    }

    #[test]
    fn run_on_malformed_injected_table_is_an_error() {
        let malformed = SpectralTable {
            temperature: vec![1e6, 2e6],
            density: vec![1e9, 5e8],
            wavelength: vec![1.0],
            intensity: ndarray::Array2::zeros((1, 1)),
            intensity_unit: DEFAULT_INTENSITY_UNIT.to_string(),
            metadata: TableMetadata::default(),
        };
        let model = SpectralModel::new(
            TableSource::Table(malformed.clone()),
            SpectralParameters::default(),
            &FileTableReader,
            &FailingComputer,
        )
        .unwrap();
        assert_eq!(model.spectral_table(), &malformed);

        let dem = DemCube::new(vec![1.5e6], ndarray::Array3::ones((1, 1, 1))).unwrap();
        assert!(matches!(
            model.run(&dem),
            Err(DemError::TableShape { .. })
        ));
    }

    #[test]
    fn option_converts_to_source() {
        assert!(matches!(TableSource::from(None), TableSource::Default));
        assert!(matches!(
            TableSource::from(Some(table(1.0))),
            TableSource::Table(_)
        ));
    }
}
