pub mod config;
pub mod error;
pub mod flatten;
pub mod io;
pub mod locate;
pub mod model;
pub mod normalize;
pub mod report;
pub mod schema;
pub mod split;
pub mod sync;
pub mod validate;

pub use error::{Result, ToolError};
