pub mod cli;
pub mod commands;
pub mod config;
pub mod coordinates;
pub mod error;
pub mod report;
pub mod tree;
pub mod utils;

pub use error::{ReportError, ReportResult};
