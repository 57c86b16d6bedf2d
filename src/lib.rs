//! Core library for the seaf-convert command line application.
//!
//! The library converts SEAF infrastructure inventories between YAML document
//! trees and XLSX workbooks. Responsibilities are kept narrow: IO adapters live
//! under [`seaf::convert::io`], the canonical data model inside
//! [`seaf::convert::model`], the sheet projection logic in
//! [`seaf::convert::flatten`], and the file-level pipelines under
//! [`seaf::convert::sync`].

pub mod seaf;

pub use seaf::convert::{
    Result, ToolError, config, error, flatten, io, locate, model, normalize, report, schema,
    split, sync, validate,
};
