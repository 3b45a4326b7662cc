mod date_range;
mod field;
mod point;
mod symbol_view;
pub(crate) mod table;
mod time_range;
mod time_series;

pub use date_range::{month_end, DateRange};
pub use field::Field;
pub use point::{Bar, Point};
pub use symbol_view::SymbolView;
pub use table::{ColumnKey, Observation, Table};
pub use time_range::TimeRange;
pub use time_series::TimeSeries;
