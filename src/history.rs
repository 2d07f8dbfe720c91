//! Read path: latest reading, time-range history and daily rollups.
//!
//! Conversion to display units happens here, never on stored rows.

use crate::error::{AppError, Result};
use crate::models::{DailySummary, Reading, ReadingView};
use crate::repositories::ReadingStore;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use std::collections::BTreeMap;
use std::collections::HashMap;

pub const DEFAULT_HISTORY_DAYS: i64 = 7;

/// Time-of-day filter applied to every calendar day of a range (UTC).
/// `start > end` wraps past midnight, e.g. 22:00-06:00.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeOfDayWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeOfDayWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, t: NaiveTime) -> bool {
        if self.start <= self.end {
            self.start <= t && t <= self.end
        } else {
            t >= self.start || t <= self.end
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryQuery {
    pub days: Option<i64>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub window: Option<TimeOfDayWindow>,
}

impl HistoryQuery {
    /// Build from loose query-string parameters, as the HTTP layer receives them.
    ///
    /// Recognised keys: `days`, `start`, `end` (RFC 3339), `time_from`,
    /// `time_to` (`HH:MM` or `HH:MM:SS`). The window needs both bounds.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self> {
        let days = params
            .get("days")
            .map(|d| {
                d.trim()
                    .parse::<i64>()
                    .map_err(|_| AppError::InvalidInput(format!("invalid days: {}", d)))
            })
            .transpose()?;
        let start = params.get("start").map(|s| parse_timestamp(s)).transpose()?;
        let end = params.get("end").map(|s| parse_timestamp(s)).transpose()?;

        let time_from = params.get("time_from").map(|s| parse_time(s)).transpose()?;
        let time_to = params.get("time_to").map(|s| parse_time(s)).transpose()?;
        let window = match (time_from, time_to) {
            (Some(from), Some(to)) => Some(TimeOfDayWindow::new(from, to)),
            (None, None) => None,
            _ => {
                return Err(AppError::InvalidInput(
                    "time_from and time_to must be given together".into(),
                ))
            }
        };

        Ok(Self {
            days,
            start,
            end,
            window,
        })
    }

    /// Concrete `[start, end]` for this query relative to `now`.
    pub fn resolve(&self, now: DateTime<Utc>) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let days = self.days.unwrap_or(DEFAULT_HISTORY_DAYS);
        if days < 0 {
            return Err(AppError::InvalidInput("days must not be negative".into()));
        }
        let end = self.end.unwrap_or(now);
        let start = match self.start {
            Some(start) => start,
            None => Duration::try_days(days)
                .and_then(|span| end.checked_sub_signed(span))
                .ok_or_else(|| AppError::InvalidInput(format!("days out of range: {}", days)))?,
        };
        if start > end {
            return Err(AppError::InvalidInput(
                "start must not be after end".into(),
            ));
        }
        Ok((start, end))
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| AppError::InvalidInput(format!("invalid timestamp: {}", s)))
}

fn parse_time(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .map_err(|_| AppError::InvalidInput(format!("invalid time of day: {}", s)))
}

/// Stored readings in range, oldest first.
pub async fn readings_in_range(
    store: &dyn ReadingStore,
    query: &HistoryQuery,
    now: DateTime<Utc>,
) -> Result<Vec<Reading>> {
    let (start, end) = query.resolve(now)?;
    let mut readings = store.between(start, end).await?;
    if let Some(window) = query.window {
        readings.retain(|r| window.contains(r.captured_at.time()));
    }
    Ok(readings)
}

/// Readings in range with display units. Empty, never absent, when nothing matches.
pub async fn query_history(
    store: &dyn ReadingStore,
    query: &HistoryQuery,
    now: DateTime<Utc>,
) -> Result<Vec<ReadingView>> {
    let readings = readings_in_range(store, query, now).await?;
    Ok(readings.into_iter().map(ReadingView::from).collect())
}

pub async fn latest(store: &dyn ReadingStore) -> Result<Option<ReadingView>> {
    Ok(store.latest().await?.map(ReadingView::from))
}

pub async fn record_count(store: &dyn ReadingStore) -> Result<i64> {
    store.count().await
}

#[derive(Default)]
struct DayAccumulator {
    battery_sum: f64,
    battery_n: u32,
    battery_min: Option<f64>,
    battery_max: Option<f64>,
    outside_sum: f64,
    outside_n: u32,
    points: i64,
}

/// Per UTC day: battery level avg/min/max, average outside temperature and
/// number of readings, ascending by day.
pub fn summarize_daily(readings: &[Reading]) -> Vec<DailySummary> {
    let mut days: BTreeMap<NaiveDate, DayAccumulator> = BTreeMap::new();

    for r in readings {
        let acc = days.entry(r.captured_at.date_naive()).or_default();
        acc.points += 1;
        if let Some(level) = r.battery_level {
            acc.battery_sum += level;
            acc.battery_n += 1;
            acc.battery_min = Some(acc.battery_min.map_or(level, |m| m.min(level)));
            acc.battery_max = Some(acc.battery_max.map_or(level, |m| m.max(level)));
        }
        if let Some(temp) = r.outside_temp {
            acc.outside_sum += temp;
            acc.outside_n += 1;
        }
    }

    days.into_iter()
        .map(|(day, acc)| DailySummary {
            day,
            avg_battery_level: (acc.battery_n > 0).then(|| acc.battery_sum / f64::from(acc.battery_n)),
            min_battery_level: acc.battery_min,
            max_battery_level: acc.battery_max,
            avg_outside_temp: (acc.outside_n > 0).then(|| acc.outside_sum / f64::from(acc.outside_n)),
            data_points: acc.points,
        })
        .collect()
}
