// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Compact per-series projection consumed by the daily chart.

use log::error;
use serde::Serialize;

use crate::datum::{Datum, DatumKind, SharedDatum};

const RESCUE_CARBS: &str = "rescuecarbs";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyEntry {
    pub id: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub timezone: String,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_value: Option<f64>,
}

impl DailyEntry {
    fn new(datum: &Datum, value: f64) -> Self {
        Self {
            id: datum.id.clone(),
            timestamp: datum.timestamp_ms(),
            timezone: datum.timezone.clone(),
            value,
            expected_value: None,
        }
    }
}

/// Entries ordered by timestamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DailySeries {
    entries: Vec<DailyEntry>,
}

impl DailySeries {
    pub fn entries(&self) -> &[DailyEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries with `lo <= timestamp <= hi`.
    pub fn range(&self, lo: i64, hi: i64) -> &[DailyEntry] {
        let start = self.entries.partition_point(|e| e.timestamp < lo);
        let end = self.entries.partition_point(|e| e.timestamp <= hi);
        self.entries.get(start..end.max(start)).unwrap_or(&[])
    }

    fn push(&mut self, entry: DailyEntry) {
        self.entries.push(entry);
    }

    fn sort(&mut self) {
        self.entries.sort_by_key(|e| e.timestamp);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyData {
    pub cbg: DailySeries,
    pub bolus: DailySeries,
    pub wizard: DailySeries,
    pub food: DailySeries,
    /// Negative infinity while there is no reading.
    pub cbg_max: f64,
    pub bolus_max: f64,
}

impl Default for DailyData {
    fn default() -> Self {
        Self {
            cbg: DailySeries::default(),
            bolus: DailySeries::default(),
            wizard: DailySeries::default(),
            food: DailySeries::default(),
            cbg_max: f64::NEG_INFINITY,
            bolus_max: f64::NEG_INFINITY,
        }
    }
}

/// Fold the merged timeline into the daily projection.
pub fn build(data: &[SharedDatum]) -> DailyData {
    let mut daily = DailyData::default();

    for datum in data {
        match datum.kind {
            DatumKind::Cbg => {
                let Some(value) = datum.value else { continue };
                daily.cbg_max = daily.cbg_max.max(value);
                daily.cbg.push(DailyEntry::new(datum, value));
            }
            DatumKind::Bolus => {
                let Some(normal) = datum.number("normal") else {
                    continue;
                };
                let expected = datum.number("expectedNormal");
                daily.bolus_max = daily.bolus_max.max(normal.max(expected.unwrap_or(normal)));
                daily.bolus.push(DailyEntry {
                    expected_value: expected,
                    ..DailyEntry::new(datum, normal)
                });
            }
            DatumKind::Wizard => {
                if let Some(carbs) = datum.number("carbInput") {
                    daily.wizard.push(DailyEntry::new(datum, carbs));
                }
            }
            DatumKind::Food => match datum.text("meal") {
                Some(RESCUE_CARBS) => {
                    let net = datum
                        .extra
                        .get("nutrition")
                        .and_then(|n| n.pointer("/carbohydrate/net"))
                        .and_then(serde_json::Value::as_f64);
                    if let Some(net) = net {
                        daily.food.push(DailyEntry::new(datum, net));
                    }
                }
                meal => error!("food {}: unsupported meal {:?}", datum.id, meal),
            },
            _ => {}
        }
    }

    for series in [&mut daily.cbg, &mut daily.bolus, &mut daily.wizard, &mut daily.food] {
        series.sort();
    }
    daily
}
