use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::structs::Field;

/// OHLCV values for one row. A `None` field is "no data" for that row.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub open: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub high: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub low: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub close: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub volume: Option<f64>,
}

impl Point {
    pub fn new(open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            open: Some(open),
            high: Some(high),
            low: Some(low),
            close: Some(close),
            volume: Some(volume),
        }
    }

    pub fn blank() -> Self {
        Self::default()
    }

    pub fn get(&self, field: Field) -> Option<f64> {
        match field {
            Field::Open => self.open,
            Field::High => self.high,
            Field::Low => self.low,
            Field::Close => self.close,
            Field::Volume => self.volume,
        }
    }

    pub fn set(&mut self, field: Field, value: Option<f64>) {
        match field {
            Field::Open => self.open = value,
            Field::High => self.high = value,
            Field::Low => self.low = value,
            Field::Close => self.close = value,
            Field::Volume => self.volume = value,
        }
    }

    /// Present fields in canonical order.
    pub fn values(&self) -> impl Iterator<Item = (Field, f64)> + '_ {
        Field::ALL
            .into_iter()
            .filter_map(move |field| self.get(field).map(|v| (field, v)))
    }
}

/// A dated point, the unit handed to a chart.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq)]
pub struct Bar {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub point: Point,
}

impl Bar {
    pub fn new(date: NaiveDate, point: Point) -> Self {
        Self { date, point }
    }
}

#[test]
pub fn test_point_get_set() {
    let mut p = Point::blank();
    p.set(Field::High, Some(12.5));
    assert_eq!(p.get(Field::High), Some(12.5));
    assert_eq!(p.get(Field::Low), None);
    assert_eq!(p.values().collect::<Vec<_>>(), vec![(Field::High, 12.5)]);
}

#[test]
pub fn test_bar_serializes_flat() {
    let date = NaiveDate::from_ymd_opt(2017, 5, 1).unwrap();
    let bar = Bar::new(date, Point::new(9.0, 14.0, 8.0, 13.0, 100.0));
    let json = serde_json::to_value(bar).unwrap();
    assert_eq!(json["date"], "2017-05-01");
    assert_eq!(json["close"], 13.0);

    let partial = Bar::new(date, Point { close: Some(1.0), ..Point::blank() });
    let json = serde_json::to_value(partial).unwrap();
    assert!(json.get("volume").is_none());
}
