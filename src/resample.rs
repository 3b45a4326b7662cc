//! Daily to lower-frequency bars.
//!
//! Resampling runs in three steps: the date axis is cut into periods, each period's
//! rows are folded field by field, and the resulting labels are optionally shifted
//! (e.g. from the closing Friday back to the week's Monday).

use std::collections::BTreeMap;

use chrono::{Datelike, Days, NaiveDate, TimeDelta, Weekday};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ChartingError, Result};
use crate::structs::{month_end, Bar, Field, Point, SymbolView, TimeRange, TimeSeries};

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    /// Weeks closing on the given weekday.
    Weekly(Weekday),
    /// Calendar months.
    Monthly,
}

impl Frequency {
    /// First period close at or after `date`.
    pub fn close_for(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Frequency::Weekly(anchor) => {
                let ahead = (anchor.num_days_from_monday() + 7
                    - date.weekday().num_days_from_monday())
                    % 7;
                date + Days::new(ahead as u64)
            }
            Frequency::Monthly => month_end(date),
        }
    }

    pub fn time_range(&self) -> TimeRange {
        match self {
            Frequency::Weekly(anchor) => TimeRange::Week { anchor: *anchor },
            Frequency::Monthly => TimeRange::Month,
        }
    }
}

/// A run of consecutive input dates folded into one output row. `close` is the
/// nominal end of the period; it need not be one of `dates`.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Period {
    close: NaiveDate,
    dates: Vec<NaiveDate>,
}

impl Period {
    pub(crate) fn new(close: NaiveDate, dates: Vec<NaiveDate>) -> Self {
        Self { close, dates }
    }

    pub fn close(&self) -> NaiveDate {
        self.close
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn first(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }
}

/// Cuts `dates` into periods, each running from its first date up to and
/// including the next close of `frequency`. The trailing period ends at the last
/// date even when its close lies beyond the data.
pub fn define_periods(dates: &[NaiveDate], frequency: Frequency) -> Result<Vec<Period>> {
    if dates.is_empty() {
        return Err(ChartingError::EmptyInput);
    }
    if let Some(pair) = dates.windows(2).find(|w| w[0] >= w[1]) {
        return Err(ChartingError::malformed(format!(
            "dates not strictly increasing at {} -> {}",
            pair[0], pair[1]
        )));
    }

    let mut periods = Vec::new();
    let mut i = 0;
    while i < dates.len() {
        let close = frequency.close_for(dates[i]);
        let len = dates[i..].partition_point(|d| *d <= close);
        periods.push(Period::new(close, dates[i..i + len].to_vec()));
        i += len;
    }
    Ok(periods)
}

/// Weekly periods closing on `anchor`.
pub fn define_weekly_periods(dates: &[NaiveDate], anchor: Weekday) -> Result<Vec<Period>> {
    define_periods(dates, Frequency::Weekly(anchor))
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    First,
    Last,
    Max,
    Min,
    Sum,
}

impl Aggregation {
    /// The usual bar fold for a field.
    pub fn standard(field: Field) -> Self {
        match field {
            Field::Open => Aggregation::First,
            Field::High => Aggregation::Max,
            Field::Low => Aggregation::Min,
            Field::Close => Aggregation::Last,
            Field::Volume => Aggregation::Sum,
        }
    }

    /// Folds the present values; `None` when there are none.
    pub fn apply<I>(&self, values: I) -> Option<f64>
    where
        I: IntoIterator<Item = f64>,
    {
        let mut values = values.into_iter();
        match self {
            Aggregation::First => values.next(),
            Aggregation::Last => values.last(),
            Aggregation::Max => values.reduce(f64::max),
            Aggregation::Min => values.reduce(f64::min),
            Aggregation::Sum => values.reduce(|a, b| a + b),
        }
    }
}

/// Field -> aggregation used when folding a period.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct AggregationRules(BTreeMap<Field, Aggregation>);

impl AggregationRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Standard folds for exactly the given fields.
    pub fn for_fields<I>(fields: I) -> Self
    where
        I: IntoIterator<Item = Field>,
    {
        Self(fields.into_iter().map(|f| (f, Aggregation::standard(f))).collect())
    }

    pub fn ohlc() -> Self {
        Self::for_fields([Field::Open, Field::High, Field::Low, Field::Close])
    }

    pub fn ohlcv() -> Self {
        Self::for_fields(Field::ALL)
    }

    pub fn with(mut self, field: Field, aggregation: Aggregation) -> Self {
        self.0.insert(field, aggregation);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, Aggregation)> + '_ {
        self.0.iter().map(|(f, a)| (*f, *a))
    }
}

/// One aggregated period. `date` is the label; `first`/`last` are the trading
/// dates the row was built from and never change on relabel.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq)]
pub struct ResampledRow {
    pub date: NaiveDate,
    pub first: NaiveDate,
    pub last: NaiveDate,
    #[serde(flatten)]
    pub point: Point,
}

impl ResampledRow {
    pub fn bar(&self) -> Bar {
        Bar::new(self.date, self.point)
    }
}

/// Folds each period of `view` with `rules`, labelling rows by period close.
pub fn aggregate(
    view: &SymbolView,
    periods: &[Period],
    rules: &AggregationRules,
) -> Result<Vec<ResampledRow>> {
    let mut columns = Vec::new();
    for (field, aggregation) in rules.iter() {
        let column = view.column(field).ok_or(ChartingError::MissingField(field))?;
        columns.push((field, aggregation, column));
    }

    let dates = view.dates();
    let mut rows = Vec::with_capacity(periods.len());
    for period in periods {
        let (first, last) = match (period.first(), period.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => {
                return Err(ChartingError::InternalConsistency(format!(
                    "period closing {} has no dates",
                    period.close()
                )))
            }
        };
        let lo = dates.partition_point(|d| *d < first);
        let hi = dates.partition_point(|d| *d <= last);
        if lo == hi {
            return Err(ChartingError::InternalConsistency(format!(
                "period closing {} matched no rows of {}",
                period.close(),
                view.symbol()
            )));
        }
        if dates[lo..hi] != *period.dates() {
            return Err(ChartingError::InternalConsistency(format!(
                "period closing {} does not match the date axis of {}",
                period.close(),
                view.symbol()
            )));
        }

        let mut point = Point::blank();
        for (field, aggregation, column) in &columns {
            let value = aggregation.apply(column[lo..hi].iter().flatten().copied());
            point.set(*field, value);
        }
        rows.push(ResampledRow { date: period.close(), first, last, point });
    }
    Ok(rows)
}

/// Shifts every label by `offset` days. A shifted label must stay after the
/// previous row's last date and before the next row's first date.
///
/// The bound uses the trading dates each row was built from, so whether an
/// offset is accepted depends on the holiday calendar: `+3` on Friday weeks
/// lands on the next Monday and fails in a regular week, but passes when that
/// Monday is a holiday and the next week opens on Tuesday.
pub fn relabel(rows: &[ResampledRow], offset: i64) -> Result<Vec<ResampledRow>> {
    let delta = TimeDelta::try_days(offset)
        .ok_or_else(|| ChartingError::malformed(format!("offset of {offset} days out of range")))?;

    let mut out: Vec<ResampledRow> = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let label = row.date.checked_add_signed(delta).ok_or_else(|| {
            ChartingError::malformed(format!("{} shifted by {offset} days is out of range", row.date))
        })?;
        if let Some(prev) = out.last() {
            if label <= prev.date {
                return Err(ChartingError::Overlap { label, neighbour: prev.date });
            }
            if label <= prev.last {
                return Err(ChartingError::Overlap { label, neighbour: prev.last });
            }
        }
        if let Some(next) = rows.get(i + 1) {
            if label >= next.first {
                return Err(ChartingError::Overlap { label, neighbour: next.first });
            }
        }
        out.push(ResampledRow { date: label, ..*row });
    }
    Ok(out)
}

/// The full define-aggregate-relabel pipeline.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Resampler {
    pub frequency: Frequency,
    pub rules: AggregationRules,
    /// Days added to each label after aggregation.
    pub offset: i64,
}

impl Resampler {
    pub fn new(frequency: Frequency, rules: AggregationRules, offset: i64) -> Self {
        Self { frequency, rules, offset }
    }

    /// OHLC weeks closing on `anchor`, labelled by the close.
    pub fn weekly(anchor: Weekday) -> Self {
        Self::new(Frequency::Weekly(anchor), AggregationRules::ohlc(), 0)
    }

    pub fn monthly() -> Self {
        Self::new(Frequency::Monthly, AggregationRules::ohlc(), 0)
    }

    pub fn with_rules(mut self, rules: AggregationRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    pub fn rows(&self, view: &SymbolView) -> Result<Vec<ResampledRow>> {
        let periods = define_periods(view.dates(), self.frequency)?;
        let rows = aggregate(view, &periods, &self.rules)?;
        let rows = if self.offset == 0 { rows } else { relabel(&rows, self.offset)? };
        debug!(
            symbol = view.symbol(),
            days = view.len(),
            periods = rows.len(),
            offset = self.offset,
            "resampled"
        );
        Ok(rows)
    }

    pub fn resample(&self, view: &SymbolView) -> Result<TimeSeries> {
        let bars = self.rows(view)?.iter().map(ResampledRow::bar).collect();
        Ok(TimeSeries::new(view.symbol(), self.frequency.time_range(), bars))
    }
}

#[cfg(test)]
fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Mon 2017-05-01 .. Fri 2017-05-05 with the reference OHLC values.
#[cfg(test)]
fn one_week() -> SymbolView {
    use crate::structs::Observation;

    let opens = [9.0, 11.0, 9.0, 11.0, 12.0];
    let highs = [10.0, 12.0, 9.0, 13.0, 14.0];
    let lows = [9.0, 10.0, 8.0, 11.0, 12.0];
    let closes = [10.0, 11.0, 9.0, 12.0, 13.0];
    let mut rows = Vec::new();
    for i in 0..5 {
        let date = day(2017, 5, 1 + i as u32);
        rows.push(Observation::new(date, "GE", Field::Open, opens[i]));
        rows.push(Observation::new(date, "GE", Field::High, highs[i]));
        rows.push(Observation::new(date, "GE", Field::Low, lows[i]));
        rows.push(Observation::new(date, "GE", Field::Close, closes[i]));
    }
    crate::structs::Table::load(rows).unwrap().project("GE").unwrap()
}

#[test]
pub fn test_weekly_close_for() {
    let fri = Frequency::Weekly(Weekday::Fri);
    assert_eq!(fri.close_for(day(2017, 5, 1)), day(2017, 5, 5));
    assert_eq!(fri.close_for(day(2017, 5, 5)), day(2017, 5, 5));
    assert_eq!(fri.close_for(day(2017, 5, 6)), day(2017, 5, 12));
    assert_eq!(Frequency::Monthly.close_for(day(2017, 2, 3)), day(2017, 2, 28));
}

#[test]
pub fn test_define_periods_partitions_trading_days() {
    // Thu, Fri | Mon, Tue, (Good Friday off) Thu | Mon
    let dates = vec![
        day(2017, 4, 6),
        day(2017, 4, 7),
        day(2017, 4, 10),
        day(2017, 4, 11),
        day(2017, 4, 13),
        day(2017, 4, 17),
    ];
    let periods = define_weekly_periods(&dates, Weekday::Fri).unwrap();
    assert_eq!(periods.len(), 3);
    assert_eq!(periods[0].close(), day(2017, 4, 7));
    assert_eq!(periods[1].close(), day(2017, 4, 14));
    assert_eq!(periods[1].dates(), &dates[2..5]);
    // Trailing partial week closes at the last date but keeps its nominal label.
    assert_eq!(periods[2].dates(), &dates[5..]);
    assert_eq!(periods[2].close(), day(2017, 4, 21));

    let joined: Vec<_> = periods.iter().flat_map(|p| p.dates().to_vec()).collect();
    assert_eq!(joined, dates);
}

#[test]
pub fn test_define_periods_empty_and_unordered() {
    for wd in [Weekday::Mon, Weekday::Wed, Weekday::Sun] {
        assert!(matches!(define_weekly_periods(&[], wd), Err(ChartingError::EmptyInput)));
    }
    let unordered = [day(2017, 5, 2), day(2017, 5, 1)];
    assert!(matches!(
        define_weekly_periods(&unordered, Weekday::Fri),
        Err(ChartingError::MalformedInput(_))
    ));
}

#[test]
pub fn test_aggregate_single_week() {
    let view = one_week();
    let periods = define_weekly_periods(view.dates(), Weekday::Fri).unwrap();
    let rows = aggregate(&view, &periods, &AggregationRules::ohlc()).unwrap();
    assert_eq!(rows.len(), 1);
    let row = rows[0];
    assert_eq!(row.date, day(2017, 5, 5));
    assert_eq!(row.first, day(2017, 5, 1));
    assert_eq!(row.last, day(2017, 5, 5));
    assert_eq!(row.point.open, Some(9.0));
    assert_eq!(row.point.high, Some(14.0));
    assert_eq!(row.point.low, Some(8.0));
    assert_eq!(row.point.close, Some(13.0));
    assert_eq!(row.point.volume, None);
}

#[test]
pub fn test_aggregate_missing_field() {
    let view = one_week();
    let periods = define_weekly_periods(view.dates(), Weekday::Fri).unwrap();
    let result = aggregate(&view, &periods, &AggregationRules::ohlcv());
    assert!(matches!(result, Err(ChartingError::MissingField(Field::Volume))));
}

#[test]
pub fn test_aggregate_foreign_periods() {
    let view = one_week();
    let foreign = vec![Period::new(day(2018, 1, 5), vec![day(2018, 1, 5)])];
    let result = aggregate(&view, &foreign, &AggregationRules::ohlc());
    assert!(matches!(result, Err(ChartingError::InternalConsistency(_))));

    let empty = vec![Period::new(day(2017, 5, 5), vec![])];
    let result = aggregate(&view, &empty, &AggregationRules::ohlc());
    assert!(matches!(result, Err(ChartingError::InternalConsistency(_))));
}

#[test]
pub fn test_aggregation_skips_missing() {
    assert_eq!(Aggregation::Sum.apply(Vec::<f64>::new()), None);
    assert_eq!(Aggregation::Sum.apply(vec![1.0, 2.5]), Some(3.5));
    assert_eq!(Aggregation::Max.apply(vec![1.0, 7.0, 2.0]), Some(7.0));
    assert_eq!(Aggregation::Last.apply(vec![1.0, 7.0, 2.0]), Some(2.0));
}

#[test]
pub fn test_relabel_to_monday() {
    let view = one_week();
    let rows = Resampler::weekly(Weekday::Fri).rows(&view).unwrap();
    let shifted = relabel(&rows, -4).unwrap();
    assert_eq!(shifted[0].date, day(2017, 5, 1));
    assert_eq!(shifted[0].point, rows[0].point);
    assert_eq!(shifted[0].first, rows[0].first);
}

#[test]
pub fn test_relabel_overlap() {
    let row = |label, first, last| ResampledRow { date: label, first, last, point: Point::blank() };
    let rows = vec![
        row(day(2017, 5, 5), day(2017, 5, 1), day(2017, 5, 5)),
        row(day(2017, 5, 12), day(2017, 5, 8), day(2017, 5, 12)),
    ];
    assert!(relabel(&rows, -4).is_ok());
    assert!(matches!(relabel(&rows, -7), Err(ChartingError::Overlap { .. })));
    assert!(matches!(relabel(&rows, 3), Err(ChartingError::Overlap { .. })));
    assert!(relabel(&rows, 2).is_ok());
}

#[test]
pub fn test_relabel_depends_on_holidays() {
    let row = |label, first, last| ResampledRow { date: label, first, last, point: Point::blank() };
    // Mon 2017-05-29 is Memorial Day.
    let regular = vec![
        row(day(2017, 5, 19), day(2017, 5, 15), day(2017, 5, 19)),
        row(day(2017, 5, 26), day(2017, 5, 22), day(2017, 5, 26)),
    ];
    let holiday = vec![
        row(day(2017, 5, 26), day(2017, 5, 22), day(2017, 5, 26)),
        row(day(2017, 6, 2), day(2017, 5, 30), day(2017, 6, 2)),
    ];
    assert!(matches!(relabel(&regular, 3), Err(ChartingError::Overlap { .. })));
    let shifted = relabel(&holiday, 3).unwrap();
    assert_eq!(shifted[0].date, day(2017, 5, 29));
    assert_eq!(shifted[1].date, day(2017, 6, 5));
}

#[test]
pub fn test_rules_for_fields() {
    assert_eq!(AggregationRules::for_fields(Field::ALL), AggregationRules::ohlcv());
    let close_only = AggregationRules::for_fields([Field::Close]);
    assert_eq!(close_only.iter().collect::<Vec<_>>(), vec![(Field::Close, Aggregation::Last)]);

    let view = one_week();
    let periods = define_weekly_periods(view.dates(), Weekday::Fri).unwrap();
    let rows = aggregate(&view, &periods, &AggregationRules::for_fields(view.fields())).unwrap();
    assert_eq!(rows[0].point.close, Some(13.0));
    assert_eq!(rows[0].point.volume, None);
}

#[test]
pub fn test_resampler_series() {
    let view = one_week();
    let series = Resampler::weekly(Weekday::Fri).with_offset(-4).resample(&view).unwrap();
    assert_eq!(series.time_range_unit(), &TimeRange::Week { anchor: Weekday::Fri });
    assert_eq!(series.start(), Some(day(2017, 5, 1)));
    assert_eq!(series.data().len(), 1);
    assert_eq!(series.data()[0].point.close, Some(13.0));
}
