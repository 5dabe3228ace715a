//! Table computation, delegated to an external atomic-physics code.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use anyhow::{Context, Result};
use log::{debug, info};
use thiserror::Error;

use crate::params::ResolvedParameters;
use crate::table::{self, SpectralTable};

/// Environment variable holding the atomic database root.
pub const CHIANTI_DIR_ENV: &str = "XUVTOP";

/// Computes a spectral table from fully resolved parameters.
pub trait TableComputer {
    fn compute(&self, params: &ResolvedParameters) -> Result<SpectralTable>;
}

impl<C: TableComputer + ?Sized> TableComputer for &C {
    fn compute(&self, params: &ResolvedParameters) -> Result<SpectralTable> {
        (**self).compute(params)
    }
}

#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("{program} finished but wrote no table to {path}")]
    MissingOutput { program: String, path: PathBuf },
}

/// Runs an external program to compute the table.
///
/// The program is invoked as `program [args..] <params.json> <output>` inside
/// a fresh temporary directory. `params.json` holds the serialized
/// [`ResolvedParameters`]; the program must write the table to `<output>` in
/// any format [`table::load_file`] reads. When `chianti_dir` is set it is
/// exported as `XUVTOP`; otherwise the program's environment is left alone.
#[derive(Debug, Clone)]
pub struct CommandTableComputer {
    program: OsString,
    args: Vec<OsString>,
    output_name: String,
}

impl CommandTableComputer {
    pub fn new(program: impl Into<OsString>) -> Self {
        CommandTableComputer {
            program: program.into(),
            args: Vec::new(),
            output_name: "spectral_table.parquet".to_string(),
        }
    }

    /// Extra arguments placed before the parameter and output paths.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// File name the program writes; the extension selects the format.
    pub fn output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = name.into();
        self
    }

    fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    fn command(&self, params: &ResolvedParameters, input: &Path, output: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).arg(input).arg(output);
        if let Some(dir) = &params.chianti_dir {
            cmd.env(CHIANTI_DIR_ENV, dir);
        }
        cmd
    }
}

impl TableComputer for CommandTableComputer {
    fn compute(&self, params: &ResolvedParameters) -> Result<SpectralTable> {
        let workdir = tempfile::tempdir().context("creating working directory")?;
        let input = workdir.path().join("params.json");
        let output = workdir.path().join(&self.output_name);

        let json = serde_json::to_vec_pretty(params).context("serializing parameters")?;
        std::fs::write(&input, json).context("writing parameter file")?;

        info!(
            "computing spectral table with {} ({} temperatures, {}-{} Å, Δλ = {} mÅ)",
            self.program_name(),
            params.temperature.len(),
            params.wave_min,
            params.wave_max,
            params.delta_wave,
        );
        let result = self
            .command(params, &input, &output)
            .current_dir(workdir.path())
            .output()
            .map_err(|source| ComputeError::Spawn {
                program: self.program_name(),
                source,
            })?;
        debug!(
            "{} stdout: {}",
            self.program_name(),
            String::from_utf8_lossy(&result.stdout).trim_end()
        );

        if !result.status.success() {
            return Err(ComputeError::Failed {
                program: self.program_name(),
                status: result.status,
                stderr: String::from_utf8_lossy(&result.stderr).trim_end().to_string(),
            }
            .into());
        }
        if !output.exists() {
            return Err(ComputeError::MissingOutput {
                program: self.program_name(),
                path: output,
            }
            .into());
        }

        table::load_file(&output)
    }
}
