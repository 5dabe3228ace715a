//! Spectral response tables for synthesizing solar X-ray / EUV spectra from a
//! differential emission measure.
//!
//! ```text
//!   TableSource ──► SpectralModel ──► SpectralTable
//!    Default ─────► TableComputer (params resolved with defaults)
//!    Table ───────► used as is
//!    Reference ───► TableReader
//!
//!   DemCube ──► SpectralModel::run ──► SpectralCube
//! ```

pub mod compute;
pub mod dem;
pub mod model;
pub mod params;
pub mod table;

pub use compute::{CommandTableComputer, ComputeError, TableComputer};
pub use dem::{DemCube, DemError, SpectralCube};
pub use model::{FileTableReader, SpectralModel, TableReader, TableSource};
pub use params::{ResolvedParameters, SpectralParameters};
pub use table::{SpectralTable, TableError, TableMetadata};
