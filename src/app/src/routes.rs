use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use rusty_charting::resample::{AggregationRules, Resampler};
use rusty_charting::structs::{DateRange, Field, SymbolView, Table, TimeSeries};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::error::ApiError;

/// Loaded once at startup and never mutated.
#[derive(Clone)]
pub struct AppState {
    pub table: Arc<Table>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(table: Table, config: AppConfig) -> Self {
        Self {
            table: Arc::new(table),
            config: Arc::new(config),
        }
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct RangeQuery {
    period: Option<String>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    offset: Option<i64>,
}

impl RangeQuery {
    fn range(&self) -> Result<DateRange, ApiError> {
        Ok(DateRange::resolve(self.period.as_deref(), self.start, self.end)?)
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct FieldQuery {
    /// Comma separated; all symbols when absent.
    symbols: Option<String>,
    period: Option<String>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
}

#[derive(Serialize, Debug)]
pub struct FieldSeries {
    symbol: String,
    values: Vec<Option<f64>>,
}

#[derive(Serialize, Debug)]
pub struct FieldResponse {
    field: Field,
    dates: Vec<NaiveDate>,
    series: Vec<FieldSeries>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "Hello, World!" }))
        .route("/symbols", get(symbols))
        .route("/daily/:symbol", get(daily))
        .route("/weekly/:symbol", get(weekly))
        .route("/monthly/:symbol", get(monthly))
        .route("/field/:field", get(field))
        .route("/export", get(export))
        .with_state(state)
}

fn view(state: &AppState, symbol: &str, query: &RangeQuery) -> Result<SymbolView, ApiError> {
    let range = query.range()?;
    Ok(state.table.project(symbol)?.slice_range(&range))
}

async fn symbols(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.table.symbols().to_vec())
}

async fn daily(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<TimeSeries>, ApiError> {
    let view = view(&state, &symbol, &query)?;
    Ok(Json(TimeSeries::daily(&view)))
}

async fn weekly(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<TimeSeries>, ApiError> {
    let view = view(&state, &symbol, &query)?;
    let resampler = Resampler::weekly(state.config.anchor)
        .with_rules(rules_for(&view))
        .with_offset(query.offset.unwrap_or(state.config.offset));
    Ok(Json(resampler.resample(&view)?))
}

async fn monthly(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<TimeSeries>, ApiError> {
    let view = view(&state, &symbol, &query)?;
    let resampler = Resampler::monthly()
        .with_rules(rules_for(&view))
        .with_offset(query.offset.unwrap_or(0));
    Ok(Json(resampler.resample(&view)?))
}

/// Bars carry only the fields the symbol has.
fn rules_for(view: &SymbolView) -> AggregationRules {
    AggregationRules::for_fields(view.fields())
}

async fn field(
    State(state): State<AppState>,
    Path(field): Path<String>,
    Query(query): Query<FieldQuery>,
) -> Result<Json<FieldResponse>, ApiError> {
    let field: Field = field.parse().map_err(|_| ApiError::NotFound(format!("no field '{field}'")))?;
    let range = DateRange::resolve(query.period.as_deref(), query.start, query.end)?;

    let mut table = state.table.select_field(field);
    if let Some(list) = query.symbols.as_deref() {
        let wanted: Vec<&str> = list.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
        table = table.select_symbols(&wanted)?;
    }
    let table = table.slice_range(&range);

    let series = table
        .columns()
        .map(|(key, values)| FieldSeries {
            symbol: key.symbol.clone(),
            values: values.to_vec(),
        })
        .collect();
    Ok(Json(FieldResponse {
        field,
        dates: table.dates().to_vec(),
        series,
    }))
}

async fn export(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let body = state.table.slice_range(&query.range()?).export_to_string()?;
    Ok(([(header::CONTENT_TYPE, "text/csv")], body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use chrono::Weekday;
    use rusty_charting::structs::{Observation, TimeRange};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Two weeks of GE (Mon 2017-05-01 .. Fri 2017-05-12) plus one MSFT close.
    fn state() -> AppState {
        let mut rows = Vec::new();
        for (i, date) in (1..=5).chain(8..=12).map(|d| day(2017, 5, d)).enumerate() {
            let base = 30.0 + i as f64;
            rows.push(Observation::new(date, "GE", Field::Open, base));
            rows.push(Observation::new(date, "GE", Field::High, base + 1.0));
            rows.push(Observation::new(date, "GE", Field::Low, base - 1.0));
            rows.push(Observation::new(date, "GE", Field::Close, base + 0.5));
            rows.push(Observation::new(date, "GE", Field::Volume, 100.0));
            if i == 0 {
                rows.push(Observation::new(date, "MSFT", Field::Close, 68.0));
            }
        }
        AppState::new(Table::load(rows).unwrap(), AppConfig::default())
    }

    fn range(period: &str) -> RangeQuery {
        RangeQuery {
            period: Some(period.to_string()),
            ..RangeQuery::default()
        }
    }

    #[tokio::test]
    async fn weekly_bars_labelled_by_monday() {
        let Json(series) = weekly(State(state()), Path("GE".to_string()), Query(range("5-2017")))
            .await
            .unwrap();
        assert_eq!(series.time_range_unit(), &TimeRange::Week { anchor: Weekday::Fri });
        let data = series.data();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0].date, day(2017, 5, 1));
        assert_eq!(data[1].date, day(2017, 5, 8));
        assert_eq!(data[0].point.open, Some(30.0));
        assert_eq!(data[0].point.close, Some(34.5));
        assert_eq!(data[1].point.high, Some(40.0));
        assert_eq!(data[1].point.volume, Some(500.0));
    }

    #[tokio::test]
    async fn daily_slices_by_query() {
        let query = RangeQuery {
            start: Some(day(2017, 5, 10)),
            ..RangeQuery::default()
        };
        let Json(series) = daily(State(state()), Path("GE".to_string()), Query(query)).await.unwrap();
        assert_eq!(series.data().len(), 3);
        assert_eq!(series.start(), Some(day(2017, 5, 10)));
    }

    #[tokio::test]
    async fn unknown_symbol_is_not_found() {
        let err = daily(State(state()), Path("ZZZ".to_string()), Query(RangeQuery::default()))
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn empty_range_is_bad_request() {
        let err = weekly(State(state()), Path("GE".to_string()), Query(range("2018")))
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn field_cross_section() {
        let Json(body) = field(State(state()), Path("close".to_string()), Query(FieldQuery::default()))
            .await
            .unwrap();
        assert_eq!(body.series.len(), 2);
        assert_eq!(body.series[1].symbol, "MSFT");
        assert_eq!(body.series[1].values[1], None);

        let query = FieldQuery {
            symbols: Some("GE".to_string()),
            ..FieldQuery::default()
        };
        let Json(body) = field(State(state()), Path("Close".to_string()), Query(query)).await.unwrap();
        assert_eq!(body.series.len(), 1);
    }

    #[tokio::test]
    async fn export_round_trips() {
        let state = state();
        let response = export(State(state.clone()), Query(RangeQuery::default()))
            .await
            .unwrap()
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(Table::import(&body[..]).unwrap(), *state.table);
    }

    #[tokio::test]
    async fn weekly_close_only_symbol() {
        let Json(series) = weekly(State(state()), Path("MSFT".to_string()), Query(RangeQuery::default()))
            .await
            .unwrap();
        let data = series.data();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0].point.close, Some(68.0));
        assert_eq!((data[0].point.open, data[0].point.volume), (None, None));
        assert_eq!(data[1].point.close, None);
    }
}
