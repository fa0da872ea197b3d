pub mod axis;
pub mod card;
pub mod cli;
pub mod collector;
pub mod config;
pub mod context;
pub mod error;
pub mod matching;
pub mod netcdf;
pub mod overlap;
pub mod time;
pub mod tracing;

pub use error::{NcTimeError, Result};
