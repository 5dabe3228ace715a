/// Spectral tables: core type and file formats.
///
/// Architecture:
/// ```text
///  .parquet / .json / .csv
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file ⇄ SpectralTable
///   └──────────┘
///        │
///        ▼
///   ┌───────────────┐
///   │ SpectralTable  │  (temperature × wavelength) grid, density per row
///   └───────────────┘
/// ```

pub mod loader;
pub mod model;

pub use loader::{load_file, write_file};
pub use model::{SpectralTable, TableError, TableMetadata, DEFAULT_INTENSITY_UNIT};
