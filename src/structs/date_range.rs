use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{ChartingError, Result};

/// Inclusive, optionally open-ended date bounds.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Self> {
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(ChartingError::Range { start, end });
            }
        }
        Ok(Self { start, end })
    }

    pub fn all() -> Self {
        Self::default()
    }

    /// Parses a partial date ("2017", "2017-05", "5-2017", "2017-05-12") into the
    /// bounds it covers. "A:B" spans from the start of A to the end of B; either
    /// side may be empty for an open bound.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some((left, right)) = s.split_once(':') {
            let start = match left.trim() {
                "" => None,
                l => Some(partial_bounds(l)?.0),
            };
            let end = match right.trim() {
                "" => None,
                r => Some(partial_bounds(r)?.1),
            };
            return Self::new(start, end);
        }
        let (start, end) = partial_bounds(s)?;
        Self::new(Some(start), Some(end))
    }

    /// Combines a partial-date `period` with explicit bounds; explicit bounds win.
    pub fn resolve(
        period: Option<&str>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Self> {
        let base = match period {
            Some(p) => Self::parse(p)?,
            None => Self::all(),
        };
        Self::new(start.or(base.start), end.or(base.end))
    }
}

fn partial_bounds(s: &str) -> Result<(NaiveDate, NaiveDate)> {
    let bad = || ChartingError::malformed(format!("cannot read '{s}' as a date or period"));
    let parts: Vec<&str> = s.split('-').collect();
    let num = |p: &str| p.parse::<u32>().map_err(|_| bad());
    match parts.as_slice() {
        &[y] => {
            let year = num(y)? as i32;
            let start = NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(bad)?;
            let end = NaiveDate::from_ymd_opt(year, 12, 31).ok_or_else(bad)?;
            Ok((start, end))
        }
        &[a, b] => {
            // "2017-05" or "5-2017"
            let (year, month) = if a.len() == 4 { (num(a)?, num(b)?) } else { (num(b)?, num(a)?) };
            let start = NaiveDate::from_ymd_opt(year as i32, month, 1).ok_or_else(bad)?;
            Ok((start, month_end(start)))
        }
        &[_, _, _] => {
            let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| bad())?;
            Ok((date, date))
        }
        _ => Err(bad()),
    }
}

/// Last calendar day of `date`'s month.
pub fn month_end(date: NaiveDate) -> NaiveDate {
    let (y, m) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(y, m, 1)
        .and_then(|d| d.pred_opt())
        .unwrap_or(date)
}

#[test]
pub fn test_parse_partial_dates() {
    let d = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();
    assert_eq!(DateRange::parse("2012").unwrap(), DateRange::new(Some(d(2012, 1, 1)), Some(d(2012, 12, 31))).unwrap());
    assert_eq!(DateRange::parse("5-2017").unwrap(), DateRange::parse("2017-05").unwrap());
    assert_eq!(DateRange::parse("2016-02").unwrap().end, Some(d(2016, 2, 29)));
    assert_eq!(DateRange::parse("2013-06-24").unwrap().start, Some(d(2013, 6, 24)));

    let span = DateRange::parse("5-2017:9-2017").unwrap();
    assert_eq!(span.start, Some(d(2017, 5, 1)));
    assert_eq!(span.end, Some(d(2017, 9, 30)));

    let open = DateRange::parse("2020-06:").unwrap();
    assert_eq!(open.start, Some(d(2020, 6, 1)));
    assert_eq!(open.end, None);
}

#[test]
pub fn test_parse_rejects_garbage_and_inverted() {
    assert!(matches!(DateRange::parse("may"), Err(ChartingError::MalformedInput(_))));
    assert!(matches!(DateRange::parse("2018:2017"), Err(ChartingError::Range { .. })));
}

#[test]
pub fn test_month_end_december() {
    let d = NaiveDate::from_ymd_opt(2019, 12, 5).unwrap();
    assert_eq!(month_end(d), NaiveDate::from_ymd_opt(2019, 12, 31).unwrap());
}
