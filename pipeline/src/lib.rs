//! Three-stage pipeline tracking IT tutorial videos on YouTube:
//! `collect` queries the Data API into raw JSON, `clean` flattens it into a CSV
//! table and `analyze` turns the table into trend charts and a report.

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use error::{PipelineError, Result};
