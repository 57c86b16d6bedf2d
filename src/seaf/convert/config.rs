//! Optional YAML configuration for a conversion run.
//!
//! ```yaml
//! dialect: seaf1
//! target_dialect: seaf2
//! inputs: [xlsx/regions_az_dc_offices.xlsx, xlsx/segments_nets_netdevices.xlsx]
//! output: out
//! report: out/report.json
//! location_prefix: sbs
//! normalizer:
//!   newline_separator: " "
//!   max_substitutions: 1
//!   ambiguity: reject
//! ```
//!
//! Relative paths are resolved against the directory holding the file.
//! Command-line flags take precedence over every value here.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::seaf::convert::error::{Result, ToolError};
use crate::seaf::convert::flatten::IngestOptions;
use crate::seaf::convert::normalize::NormalizerConfig;
use crate::seaf::convert::schema::Dialect;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConversionConfig {
    pub dialect: Option<Dialect>,
    pub target_dialect: Option<Dialect>,
    pub inputs: Vec<PathBuf>,
    pub output: Option<PathBuf>,
    pub report: Option<PathBuf>,
    /// Prefix of inferred site identifiers; defaults to the first part of the
    /// network identifier.
    pub location_prefix: Option<String>,
    pub normalizer: NormalizerConfig,
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub dialect: Option<Dialect>,
    pub target_dialect: Option<Dialect>,
    pub inputs: Vec<PathBuf>,
    pub output: Option<PathBuf>,
    pub report: Option<PathBuf>,
}

impl ConversionConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ToolError::MissingInput(path.to_path_buf()));
        }
        let text = fs::read_to_string(path)?;
        let mut config: ConversionConfig = serde_yaml::from_str(&text)?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        config.resolve_paths(base);
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        self.inputs.iter_mut().for_each(resolve);
        self.output.iter_mut().for_each(resolve);
        self.report.iter_mut().for_each(resolve);
    }

    /// Applies command-line values; non-empty inputs replace the configured list.
    pub fn apply(mut self, overrides: Overrides) -> Self {
        if overrides.dialect.is_some() {
            self.dialect = overrides.dialect;
        }
        if overrides.target_dialect.is_some() {
            self.target_dialect = overrides.target_dialect;
        }
        if !overrides.inputs.is_empty() {
            self.inputs = overrides.inputs;
        }
        if overrides.output.is_some() {
            self.output = overrides.output;
        }
        if overrides.report.is_some() {
            self.report = overrides.report;
        }
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect.unwrap_or(Dialect::Seaf1)
    }

    /// Dialect of written YAML; falls back to the source dialect.
    pub fn target_dialect(&self) -> Dialect {
        self.target_dialect.unwrap_or_else(|| self.dialect())
    }

    pub fn output(&self) -> Result<&Path> {
        self.output
            .as_deref()
            .ok_or_else(|| ToolError::Config("no output directory given".into()))
    }

    /// The single input of a YAML conversion.
    pub fn single_input(&self) -> Result<&Path> {
        match self.inputs.as_slice() {
            [input] => Ok(input),
            [] => Err(ToolError::Config("no input given".into())),
            _ => Err(ToolError::Config(
                "YAML conversions take exactly one input file or directory".into(),
            )),
        }
    }

    pub fn ingest_options(&self) -> Result<IngestOptions> {
        IngestOptions::new(self.normalizer.clone(), self.location_prefix.clone())
    }
}
