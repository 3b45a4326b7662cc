use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::Result;
use crate::structs::table::bounds;
use crate::structs::{Bar, DateRange, Field, Point};

/// One symbol's columns keyed by field, sharing the table's date axis.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct SymbolView {
    symbol: String,
    dates: Vec<NaiveDate>,
    columns: BTreeMap<Field, Vec<Option<f64>>>,
}

impl SymbolView {
    pub(crate) fn new(
        symbol: String,
        dates: Vec<NaiveDate>,
        columns: BTreeMap<Field, Vec<Option<f64>>>,
    ) -> Self {
        Self { symbol, dates, columns }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn fields(&self) -> Vec<Field> {
        self.columns.keys().copied().collect()
    }

    pub fn column(&self, field: Field) -> Option<&[Option<f64>]> {
        self.columns.get(&field).map(Vec::as_slice)
    }

    pub fn point(&self, idx: usize) -> Point {
        let mut point = Point::blank();
        for (field, values) in &self.columns {
            point.set(*field, values.get(idx).copied().flatten());
        }
        point
    }

    pub fn bars(&self) -> Vec<Bar> {
        self.dates
            .iter()
            .enumerate()
            .map(|(idx, date)| Bar::new(*date, self.point(idx)))
            .collect()
    }

    /// Ordered `(date, field, value)` triples, date-major.
    pub fn triples(&self) -> impl Iterator<Item = (NaiveDate, Field, Option<f64>)> + '_ {
        self.dates.iter().enumerate().flat_map(move |(idx, date)| {
            self.columns
                .iter()
                .map(move |(field, values)| (*date, *field, values[idx]))
        })
    }

    pub fn slice(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<SymbolView> {
        let range = DateRange::new(start, end)?;
        Ok(self.slice_range(&range))
    }

    pub fn slice_range(&self, range: &DateRange) -> SymbolView {
        let (lo, hi) = bounds(&self.dates, range);
        SymbolView {
            symbol: self.symbol.clone(),
            dates: self.dates[lo..hi].to_vec(),
            columns: self
                .columns
                .iter()
                .map(|(f, v)| (*f, v[lo..hi].to_vec()))
                .collect(),
        }
    }
}

#[test]
pub fn test_view_bars_and_triples() {
    let d1 = NaiveDate::from_ymd_opt(2017, 5, 1).unwrap();
    let d2 = NaiveDate::from_ymd_opt(2017, 5, 2).unwrap();
    let mut columns = BTreeMap::new();
    columns.insert(Field::Close, vec![Some(30.0), Some(31.0)]);
    columns.insert(Field::Open, vec![Some(29.5), None]);
    let view = SymbolView::new("GE".into(), vec![d1, d2], columns);

    let bars = view.bars();
    assert_eq!(bars[1].point.close, Some(31.0));
    assert_eq!(bars[1].point.open, None);

    let triples: Vec<_> = view.triples().collect();
    assert_eq!(
        triples,
        vec![
            (d1, Field::Open, Some(29.5)),
            (d1, Field::Close, Some(30.0)),
            (d2, Field::Open, None),
            (d2, Field::Close, Some(31.0)),
        ]
    );

    let tail = view.slice(Some(d2), None).unwrap();
    assert_eq!(tail.dates(), &[d2]);
    assert_eq!(tail.column(Field::Open).unwrap(), &[None]);
}
