use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::structs::{Bar, SymbolView, TimeRange};

/// Chart-ready series for one symbol, as handed to the rendering side.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct TimeSeries {
    symbol: String,
    time_range_unit: TimeRange,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    data: Vec<Bar>,
}

impl TimeSeries {
    pub fn new(symbol: impl Into<String>, time_range_unit: TimeRange, data: Vec<Bar>) -> Self {
        let start = data.first().map(|b| b.date);
        let end = data.last().map(|b| b.date);
        Self {
            symbol: symbol.into(),
            time_range_unit,
            start,
            end,
            data,
        }
    }

    pub fn daily(view: &SymbolView) -> Self {
        TimeSeries::new(view.symbol(), TimeRange::Day, view.bars())
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn time_range_unit(&self) -> &TimeRange {
        &self.time_range_unit
    }

    pub fn start(&self) -> Option<NaiveDate> {
        self.start
    }

    pub fn end(&self) -> Option<NaiveDate> {
        self.end
    }

    pub fn data(&self) -> &[Bar] {
        &self.data
    }
}
