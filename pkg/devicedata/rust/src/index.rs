// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Multidimensional filtering over a record set.
//!
//! Two query styles are offered. The stateful one keeps one active filter per
//! dimension: filtering a dimension replaces only that dimension's filter, so
//! callers sharing an index must clear what they set once they have read the
//! result. [`CrossIndex::select`] evaluates a filter list without touching
//! that state.

use chrono::{DateTime, Datelike, Utc};
use log::error;
use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use crate::datetime;
use crate::datum::{Datum, SharedDatum};
use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dimension {
    DateTime,
    Id,
    /// Local weekday, 0 for Sunday through 6 for Saturday.
    DayOfWeek,
}

impl Dimension {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::DateTime => "datetime",
            Dimension::Id => "id",
            Dimension::DayOfWeek => "dayOfWeek",
        }
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "datetime" => Ok(Dimension::DateTime),
            "id" => Ok(Dimension::Id),
            "dayOfWeek" => Ok(Dimension::DayOfWeek),
            other => Err(Error::UnknownDimension(other.to_string())),
        }
    }
}

/// A value on one dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Time(DateTime<Utc>),
    Id(String),
    Weekday(u32),
}

impl Key {
    fn fits(&self, dimension: Dimension) -> bool {
        matches!(
            (dimension, self),
            (Dimension::DateTime, Key::Time(_))
                | (Dimension::Id, Key::Id(_))
                | (Dimension::DayOfWeek, Key::Weekday(_))
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// `lo <= key <= hi`
    Range { dimension: Dimension, lo: Key, hi: Key },
    Exact { dimension: Dimension, key: Key },
}

impl Filter {
    pub fn range(dimension: Dimension, lo: Key, hi: Key) -> Self {
        Filter::Range { dimension, lo, hi }
    }

    pub fn exact(dimension: Dimension, key: Key) -> Self {
        Filter::Exact { dimension, key }
    }

    pub fn dimension(&self) -> Dimension {
        match self {
            Filter::Range { dimension, .. } | Filter::Exact { dimension, .. } => *dimension,
        }
    }

    fn keys_fit(&self) -> bool {
        match self {
            Filter::Range { dimension, lo, hi } => lo.fits(*dimension) && hi.fits(*dimension),
            Filter::Exact { dimension, key } => key.fits(*dimension),
        }
    }

    /// Time bounds implied by this filter, if any.
    fn time_bounds(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        match self {
            Filter::Range {
                dimension: Dimension::DateTime,
                lo: Key::Time(lo),
                hi: Key::Time(hi),
            } => Some((*lo, *hi)),
            Filter::Exact {
                dimension: Dimension::DateTime,
                key: Key::Time(t),
            } => Some((*t, *t)),
            _ => None,
        }
    }

    fn exact_id(&self) -> Option<&str> {
        match self {
            Filter::Exact {
                dimension: Dimension::Id,
                key: Key::Id(id),
            } => Some(id.as_str()),
            _ => None,
        }
    }
}

/// Local weekday, from the calendar fields of glucose readings when present.
fn local_weekday(datum: &Datum) -> u32 {
    let named = datum
        .local
        .as_ref()
        .and_then(|l| datetime::weekday_from_name(&l.day_of_week));
    match named {
        Some(day) => day.num_days_from_sunday(),
        None => datum
            .normal_time
            .with_timezone(&datum.zone())
            .weekday()
            .num_days_from_sunday(),
    }
}

/// Index over a time ordered record set.
#[derive(Debug, Clone, Default)]
pub struct CrossIndex {
    records: Vec<SharedDatum>,
    dimensions: Vec<Dimension>,
    /// Positions in `records` per id, ascending.
    by_id: FxHashMap<String, Vec<usize>>,
    /// Local weekday per record, when `DayOfWeek` is indexed.
    weekdays: Vec<u32>,
    active: BTreeMap<Dimension, Filter>,
}

impl CrossIndex {
    pub fn new(records: &[SharedDatum], dimensions: &[Dimension]) -> Self {
        let mut records = records.to_vec();
        records.sort_by_key(|d| d.normal_time);

        let mut by_id: FxHashMap<String, Vec<usize>> = FxHashMap::default();
        if dimensions.contains(&Dimension::Id) {
            for (pos, datum) in records.iter().enumerate() {
                by_id.entry(datum.id.clone()).or_default().push(pos);
            }
        }
        let weekdays = if dimensions.contains(&Dimension::DayOfWeek) {
            records.iter().map(|d| local_weekday(d)).collect()
        } else {
            Vec::new()
        };

        Self {
            records,
            dimensions: dimensions.to_vec(),
            by_id,
            weekdays,
            active: BTreeMap::new(),
        }
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    /// Number of indexed records, regardless of filters.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Resolve a dimension by name. Unknown or unindexed names are logged.
    pub fn dimension(&self, name: &str) -> Option<Dimension> {
        match name.parse::<Dimension>() {
            Ok(dimension) if self.dimensions.contains(&dimension) => Some(dimension),
            Ok(dimension) => {
                error!("dimension {dimension} is not indexed");
                None
            }
            Err(err) => {
                error!("{err}");
                None
            }
        }
    }

    /// Set the range filter of `dimension` and return the records passing
    /// every active filter.
    pub fn filter_range(&mut self, dimension: Dimension, lo: Key, hi: Key) -> Vec<SharedDatum> {
        self.apply(Filter::range(dimension, lo, hi))
    }

    /// Set the exact filter of `dimension` and return the records passing
    /// every active filter.
    pub fn filter_exact(&mut self, dimension: Dimension, key: Key) -> Vec<SharedDatum> {
        self.apply(Filter::exact(dimension, key))
    }

    pub fn clear(&mut self, dimension: Dimension) {
        self.active.remove(&dimension);
    }

    pub fn clear_all(&mut self) {
        self.active.clear();
    }

    /// Records passing every active filter, ordered by time.
    pub fn records(&self) -> Vec<SharedDatum> {
        let filters: Vec<&Filter> = self.active.values().collect();
        self.matching(&filters)
    }

    /// Evaluate `filters` against the whole set. Active filters are ignored
    /// and left untouched.
    pub fn select(&self, filters: &[Filter]) -> Vec<SharedDatum> {
        if let Some(bad) = filters.iter().find(|f| !self.accepts(f)) {
            error!("invalid filter on dimension {}: {:?}", bad.dimension(), bad);
            return Vec::new();
        }
        let filters: Vec<&Filter> = filters.iter().collect();
        self.matching(&filters)
    }

    /// Earliest `n` records passing the active filters.
    pub fn bottom(&self, n: usize) -> Vec<SharedDatum> {
        let mut records = self.records();
        records.truncate(n);
        records
    }

    /// Latest `n` records passing the active filters, most recent first.
    pub fn top(&self, n: usize) -> Vec<SharedDatum> {
        self.records().into_iter().rev().take(n).collect()
    }

    fn apply(&mut self, filter: Filter) -> Vec<SharedDatum> {
        if !self.accepts(&filter) {
            error!("invalid filter on dimension {}: {:?}", filter.dimension(), filter);
            return Vec::new();
        }
        self.active.insert(filter.dimension(), filter);
        self.records()
    }

    fn accepts(&self, filter: &Filter) -> bool {
        self.dimensions.contains(&filter.dimension()) && filter.keys_fit()
    }

    /// Narrow by the time bounds and exact ids of `filters`, then check
    /// every filter on what is left.
    fn matching(&self, filters: &[&Filter]) -> Vec<SharedDatum> {
        let mut lo = 0;
        let mut hi = self.records.len();
        for (from, to) in filters.iter().filter_map(|f| f.time_bounds()) {
            lo = lo.max(self.records.partition_point(|d| d.normal_time < from));
            hi = hi.min(self.records.partition_point(|d| d.normal_time <= to));
        }
        if lo >= hi {
            return Vec::new();
        }

        let keep = |pos: &usize| filters.iter().all(|f| self.matches(f, *pos));
        let positions: Vec<usize> = match filters.iter().find_map(|f| f.exact_id()) {
            Some(id) => self
                .by_id
                .get(id)
                .map(Vec::as_slice)
                .unwrap_or(&[])
                .iter()
                .copied()
                .filter(|pos| (lo..hi).contains(pos))
                .filter(keep)
                .collect(),
            None => (lo..hi).filter(keep).collect(),
        };
        positions
            .into_iter()
            .filter_map(|pos| self.records.get(pos).map(Arc::clone))
            .collect()
    }

    fn matches(&self, filter: &Filter, pos: usize) -> bool {
        let Some(datum) = self.records.get(pos) else {
            return false;
        };
        let weekday = self.weekdays.get(pos).copied();
        match filter {
            Filter::Range { dimension, lo, hi } => {
                compare(*dimension, datum, weekday, lo).is_some_and(Ordering::is_ge)
                    && compare(*dimension, datum, weekday, hi).is_some_and(Ordering::is_le)
            }
            Filter::Exact { dimension, key } => {
                compare(*dimension, datum, weekday, key) == Some(Ordering::Equal)
            }
        }
    }
}

fn compare(
    dimension: Dimension,
    datum: &Datum,
    weekday: Option<u32>,
    key: &Key,
) -> Option<Ordering> {
    match (dimension, key) {
        (Dimension::DateTime, Key::Time(t)) => Some(datum.normal_time.cmp(t)),
        (Dimension::Id, Key::Id(id)) => Some(datum.id.as_str().cmp(id.as_str())),
        (Dimension::DayOfWeek, Key::Weekday(day)) => weekday.map(|w| w.cmp(day)),
        _ => None,
    }
}
