use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{
    Array, ArrayRef, Float32Array, Float64Array, Float64Builder, LargeListArray, ListArray,
    ListBuilder,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use log::debug;
use ndarray::Array2;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use serde::{Deserialize, Serialize};

use super::model::{SpectralTable, TableMetadata, DEFAULT_INTENSITY_UNIT};

const UNIT_KEY: &str = "intensity_unit";
const METADATA_KEY: &str = "spectral_table_metadata";

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Csv,
    Parquet,
}

fn format_of(path: &Path) -> Result<Format> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "parquet" | "pq" => Ok(Format::Parquet),
        "json" => Ok(Format::Json),
        "csv" => Ok(Format::Csv),
        other => bail!("Unsupported spectral table extension: .{other}"),
    }
}

/// Load a spectral table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – one row per temperature, `wavelength`/`intensity` list columns
/// * `.json`    – `{ "temperature": [...], "intensity": [[...], ...], ... }`
/// * `.csv`     – long format `temperature,density,wavelength,intensity`
pub fn load_file(path: &Path) -> Result<SpectralTable> {
    debug!("loading spectral table from {}", path.display());
    let table = match format_of(path)? {
        Format::Parquet => load_parquet(path),
        Format::Json => load_json(path),
        Format::Csv => load_csv(path),
    }
    .with_context(|| format!("loading spectral table {}", path.display()))?;
    debug!("loaded {table}");
    Ok(table)
}

/// Write a spectral table, choosing the format from the extension.
pub fn write_file(path: &Path, table: &SpectralTable) -> Result<()> {
    debug!("writing {table} to {}", path.display());
    check_axes(table).with_context(|| format!("writing spectral table {}", path.display()))?;
    match format_of(path)? {
        Format::Parquet => write_parquet(path, table),
        Format::Json => write_json(path, table),
        Format::Csv => write_csv(path, table),
    }
    .with_context(|| format!("writing spectral table {}", path.display()))
}

/// Axis lengths must agree with the intensity grid, or rows would be dropped.
fn check_axes(table: &SpectralTable) -> Result<()> {
    let (rows, cols) = table.intensity.dim();
    if table.temperature.len() != rows || table.density.len() != rows {
        bail!(
            "{} temperatures and {} densities for {rows} intensity rows",
            table.temperature.len(),
            table.density.len()
        );
    }
    if table.wavelength.len() != cols {
        bail!(
            "{} wavelengths for {cols} intensity columns",
            table.wavelength.len()
        );
    }
    Ok(())
}

fn default_unit() -> String {
    DEFAULT_INTENSITY_UNIT.to_string()
}

/// Stack equal-length rows into a `(rows, cols)` grid.
fn rows_to_grid(rows: Vec<Vec<f64>>, cols: usize) -> Result<Array2<f64>> {
    let n_rows = rows.len();
    let mut flat = Vec::with_capacity(n_rows * cols);
    for (i, row) in rows.into_iter().enumerate() {
        if row.len() != cols {
            bail!("Row {i}: intensity has {} values but wavelength has {cols}", row.len());
        }
        flat.extend(row);
    }
    Array2::from_shape_vec((n_rows, cols), flat).context("assembling intensity grid")
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

/// JSON layout:
///
/// ```json
/// {
///   "temperature": [1e6, 2e6],
///   "density": [1e9, 5e8],
///   "wavelength": [0.5, 0.525, ...],
///   "intensity": [[...], [...]],
///   "intensity_unit": "cm3 ph Angstrom-1 s-1 sr-1",
///   "metadata": { "ioneq_filename": "chianti.ioneq" }
/// }
/// ```
#[derive(Debug, Serialize, Deserialize)]
struct JsonTable {
    temperature: Vec<f64>,
    density: Vec<f64>,
    wavelength: Vec<f64>,
    intensity: Vec<Vec<f64>>,
    #[serde(default = "default_unit")]
    intensity_unit: String,
    #[serde(default)]
    metadata: TableMetadata,
}

fn load_json(path: &Path) -> Result<SpectralTable> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let raw: JsonTable = serde_json::from_str(&text).context("parsing JSON")?;

    let intensity = rows_to_grid(raw.intensity, raw.wavelength.len())?;
    Ok(SpectralTable::new(
        raw.temperature,
        raw.density,
        raw.wavelength,
        intensity,
        raw.intensity_unit,
        raw.metadata,
    )?)
}

fn write_json(path: &Path, table: &SpectralTable) -> Result<()> {
    let raw = JsonTable {
        temperature: table.temperature.clone(),
        density: table.density.clone(),
        wavelength: table.wavelength.clone(),
        intensity: table.intensity.rows().into_iter().map(|r| r.to_vec()).collect(),
        intensity_unit: table.intensity_unit.clone(),
        metadata: table.metadata.clone(),
    };
    let file = std::fs::File::create(path).context("creating JSON file")?;
    serde_json::to_writer(std::io::BufWriter::new(file), &raw).context("serializing JSON")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// One `(temperature, wavelength)` cell of the table.
///
/// Rows for a temperature must be contiguous and list the same wavelengths in
/// the same order as every other temperature. Unit and metadata are not
/// stored; loaded tables get the default unit.
#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    temperature: f64,
    density: f64,
    wavelength: f64,
    intensity: f64,
}

struct CsvBlock {
    temperature: f64,
    density: f64,
    wavelength: Vec<f64>,
    intensity: Vec<f64>,
}

fn load_csv(path: &Path) -> Result<SpectralTable> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;

    let mut blocks: Vec<CsvBlock> = Vec::new();
    for (row_no, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("CSV row {row_no}"))?;
        match blocks.last_mut() {
            Some(block) if block.temperature == row.temperature => {
                if block.density != row.density {
                    bail!(
                        "CSV row {row_no}: density {} differs from {} at T = {}",
                        row.density,
                        block.density,
                        row.temperature
                    );
                }
                block.wavelength.push(row.wavelength);
                block.intensity.push(row.intensity);
            }
            _ => blocks.push(CsvBlock {
                temperature: row.temperature,
                density: row.density,
                wavelength: vec![row.wavelength],
                intensity: vec![row.intensity],
            }),
        }
    }

    let Some(first) = blocks.first() else {
        bail!("CSV contains no rows");
    };
    let wavelength = first.wavelength.clone();
    for block in &blocks {
        if block.wavelength != wavelength {
            bail!(
                "CSV: wavelength axis at T = {} differs from the first temperature block",
                block.temperature
            );
        }
    }

    let temperature = blocks.iter().map(|b| b.temperature).collect();
    let density = blocks.iter().map(|b| b.density).collect();
    let rows = blocks.into_iter().map(|b| b.intensity).collect();
    let intensity = rows_to_grid(rows, wavelength.len())?;

    Ok(SpectralTable::new(
        temperature,
        density,
        wavelength,
        intensity,
        DEFAULT_INTENSITY_UNIT,
        TableMetadata::default(),
    )?)
}

fn write_csv(path: &Path, table: &SpectralTable) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).context("creating CSV")?;
    let rows = table
        .temperature
        .iter()
        .zip(&table.density)
        .zip(table.intensity.rows());
    for ((&temperature, &density), row) in rows {
        for (&wavelength, &intensity) in table.wavelength.iter().zip(row.iter()) {
            writer.serialize(CsvRow {
                temperature,
                density,
                wavelength,
                intensity,
            })?;
        }
    }
    writer.flush().context("flushing CSV")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Parquet
// ---------------------------------------------------------------------------

/// Load a Parquet spectral table.
///
/// Expected schema:
/// - `temperature`: Float64
/// - `density`: Float64
/// - `wavelength`: List<Float64> or LargeList<Float64>, identical on every row
/// - `intensity`: List<Float64> or LargeList<Float64>
///
/// Unit and metadata live in the Arrow schema key-value metadata.
fn load_parquet(path: &Path) -> Result<SpectralTable> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let kv = builder.schema().metadata().clone();
    let reader = builder.build().context("building parquet reader")?;

    let mut temperature = Vec::new();
    let mut density = Vec::new();
    let mut wavelength: Option<Vec<f64>> = None;
    let mut rows = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let t_col = f64_column(&batch, "temperature")?;
        let d_col = f64_column(&batch, "density")?;
        let w_col = column(&batch, "wavelength")?;
        let i_col = column(&batch, "intensity")?;

        for row in 0..batch.num_rows() {
            let row_no = temperature.len();
            let w = extract_f64_list(w_col, row)
                .with_context(|| format!("Row {row_no}: failed to read 'wavelength'"))?;
            if let Some(axis) = &wavelength {
                if *axis != w {
                    bail!("Row {row_no}: wavelength axis differs from row 0");
                }
            } else {
                wavelength = Some(w);
            }
            rows.push(
                extract_f64_list(i_col, row)
                    .with_context(|| format!("Row {row_no}: failed to read 'intensity'"))?,
            );
            temperature.push(t_col.value(row));
            density.push(d_col.value(row));
        }
    }

    let wavelength = wavelength.context("Parquet file contains no rows")?;
    let intensity = rows_to_grid(rows, wavelength.len())?;
    let unit = kv.get(UNIT_KEY).cloned().unwrap_or_else(default_unit);
    let metadata = match kv.get(METADATA_KEY) {
        Some(json) => serde_json::from_str(json).context("parsing table metadata")?,
        None => TableMetadata::default(),
    };

    Ok(SpectralTable::new(
        temperature,
        density,
        wavelength,
        intensity,
        unit,
        metadata,
    )?)
}

fn write_parquet(path: &Path, table: &SpectralTable) -> Result<()> {
    let list_type = DataType::List(Arc::new(Field::new("item", DataType::Float64, true)));
    let mut kv = HashMap::new();
    kv.insert(UNIT_KEY.to_string(), table.intensity_unit.clone());
    kv.insert(
        METADATA_KEY.to_string(),
        serde_json::to_string(&table.metadata).context("serializing table metadata")?,
    );
    let schema = Arc::new(
        Schema::new(vec![
            Field::new("temperature", DataType::Float64, false),
            Field::new("density", DataType::Float64, false),
            Field::new("wavelength", list_type.clone(), false),
            Field::new("intensity", list_type, false),
        ])
        .with_metadata(kv),
    );

    let mut w_builder = ListBuilder::new(Float64Builder::new());
    let mut i_builder = ListBuilder::new(Float64Builder::new());
    for row in table.intensity.rows() {
        w_builder.values().append_slice(&table.wavelength);
        w_builder.append(true);
        for &v in row {
            i_builder.values().append_value(v);
        }
        i_builder.append(true);
    }

    let columns: Vec<ArrayRef> = vec![
        Arc::new(Float64Array::from(table.temperature.clone())),
        Arc::new(Float64Array::from(table.density.clone())),
        Arc::new(w_builder.finish()),
        Arc::new(i_builder.finish()),
    ];
    let batch = RecordBatch::try_new(schema.clone(), columns).context("building record batch")?;

    let file = std::fs::File::create(path).context("creating parquet file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing record batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

// -- Parquet / Arrow helpers --

fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    batch
        .column_by_name(name)
        .with_context(|| format!("Parquet file missing '{name}' column"))
}

fn f64_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Float64Array> {
    column(batch, name)?
        .as_any()
        .downcast_ref::<Float64Array>()
        .with_context(|| format!("'{name}' column is not Float64"))
}

/// Extract a `Vec<f64>` from a List or LargeList column at the given row.
fn extract_f64_list(col: &ArrayRef, row: usize) -> Result<Vec<f64>> {
    if col.is_null(row) {
        bail!("null value in list column");
    }

    let values_array = match col.data_type() {
        DataType::List(_) => col
            .as_any()
            .downcast_ref::<ListArray>()
            .context("expected ListArray")?
            .value(row),
        DataType::LargeList(_) => col
            .as_any()
            .downcast_ref::<LargeListArray>()
            .context("expected LargeListArray")?
            .value(row),
        other => bail!("Expected List or LargeList column, got {other:?}"),
    };

    // The inner array can be Float64 or Float32
    if let Some(f64_arr) = values_array.as_any().downcast_ref::<Float64Array>() {
        Ok(f64_arr.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    } else if let Some(f32_arr) = values_array.as_any().downcast_ref::<Float32Array>() {
        Ok(f32_arr.iter().map(|v| v.unwrap_or(f32::NAN) as f64).collect())
    } else {
        bail!(
            "List inner type is {:?}, expected Float64 or Float32",
            values_array.data_type()
        )
    }
}
