//! Multi-symbol daily price tables and their resampling into chart-ready bars.
//!
//! Data flows one way: observations from a data source are loaded into a
//! [`Table`](structs::Table), sliced by date, projected onto one symbol and
//! resampled into a [`TimeSeries`](structs::TimeSeries) for rendering.

pub mod error;
pub mod flat_file;
pub mod resample;
pub mod source;
pub mod structs;

pub use error::{ChartingError, Result};
