// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! The ingestion pipeline and its derived views.

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use serde_json::Value;
use std::sync::Arc;

use crate::basics::{self, BasicsWindow};
use crate::config::{BgClasses, Options, TimePrefs};
use crate::daily::{self, DailyData};
use crate::datetime::{self, UTC_ZONE};
use crate::datum::{DatumKind, SharedDatum};
use crate::device_params::{DeviceParameterCluster, cluster_parameters};
use crate::error::{Error, json_kind};
use crate::fill;
use crate::index::{CrossIndex, Dimension, Filter, Key};
use crate::ingest::{self, Diagnostics, Endpoints, GroupIndex, Ingested};
use crate::normalize::{IdGenerator, Normalizer};
use crate::units::BgUnits;
use crate::validate::ShapeValidator;

const TIMELINE_DIMENSIONS: &[Dimension] = &[Dimension::DateTime, Dimension::Id];
const GLUCOSE_DIMENSIONS: &[Dimension] = &[Dimension::DateTime, Dimension::DayOfWeek];

/// Normalized, deduplicated and indexed device data of one patient.
///
/// Raw records accumulate across [`DeviceData::add_data`] calls. Every call
/// rebuilds all derived views from the whole buffer.
#[derive(Debug)]
pub struct DeviceData {
    options: Options,
    time_prefs: TimePrefs,
    normalizer: Normalizer,
    ids: IdGenerator,
    buffer: Vec<Ingested>,

    data: Vec<SharedDatum>,
    grouped: GroupIndex,
    diabetes_data: Vec<SharedDatum>,
    endpoints: Option<Endpoints>,
    device_parameters: Vec<DeviceParameterCluster>,
    daily_data: DailyData,
    basics_data: BasicsWindow,
    diagnostics: Diagnostics,
    data_by_date: CrossIndex,
    cbg_index: CrossIndex,
    smbg_index: CrossIndex,
}

impl DeviceData {
    pub fn new(records: Vec<Value>, options: Options) -> Self {
        Self::with_id_source(records, options, IdGenerator::from_entropy())
    }

    /// Like [`DeviceData::new`], drawing synthetic ids from `ids`.
    pub fn with_id_source(records: Vec<Value>, options: Options, ids: IdGenerator) -> Self {
        let normalizer = Normalizer::new(options.bg_units, &options.source, Box::new(ShapeValidator));
        let mut device_data = Self {
            time_prefs: options.time_prefs.clone(),
            options,
            normalizer,
            ids,
            buffer: Vec::new(),
            data: Vec::new(),
            grouped: GroupIndex::new(),
            diabetes_data: Vec::new(),
            endpoints: None,
            device_parameters: Vec::new(),
            daily_data: DailyData::default(),
            basics_data: BasicsWindow::default(),
            diagnostics: Diagnostics::default(),
            data_by_date: CrossIndex::new(&[], TIMELINE_DIMENSIONS),
            cbg_index: CrossIndex::new(&[], GLUCOSE_DIMENSIONS),
            smbg_index: CrossIndex::new(&[], GLUCOSE_DIMENSIONS),
        };
        device_data.add_data(records);
        device_data
    }

    /// Build from JSON documents. `records` must be an array; `options` is
    /// merged over the defaults.
    pub fn from_json(records: &Value, options: Option<&Value>) -> Result<Self, Error> {
        let options = match options {
            Some(value) => Options::from_json(value)?,
            None => Options::default(),
        };
        Self::from_records(records, options)
    }

    /// Build from a JSON array of records with already parsed options.
    pub fn from_records(records: &Value, options: Options) -> Result<Self, Error> {
        match records {
            Value::Array(records) => Ok(Self::new(records.clone(), options)),
            other => Err(Error::InvalidData {
                found: json_kind(other),
            }),
        }
    }

    /// Append `records` to the buffer and rebuild everything. Empty input
    /// leaves the state untouched.
    pub fn add_data(&mut self, records: Vec<Value>) {
        if records.is_empty() {
            debug!("add_data: nothing to add");
            return;
        }

        let count = records.len();
        for raw in records {
            let entry = match self.normalizer.normalize(raw, &mut self.ids) {
                Ok(datum) => Ingested::Normalized(Arc::new(datum)),
                Err(quarantined) => {
                    warn!("Invalid datum {:?}: {}", quarantined.id, quarantined.reason);
                    Ingested::Quarantined(quarantined)
                }
            };
            self.buffer.push(entry);
        }
        self.buffer.sort_by_key(Ingested::sort_key);
        info!("add_data: {} new records, {} buffered", count, self.buffer.len());

        self.recompute();
    }

    fn recompute(&mut self) {
        let mut merged = ingest::merge(&self.buffer, &self.options);

        if let Some(zone) = merged.timezone.take() {
            self.time_prefs.timezone_name = zone;
        }

        let fills: Vec<SharedDatum> = match merged.endpoints {
            Some(endpoints) if merged.treatment_count >= 2 => fill::synthesize(
                &endpoints,
                datetime::zone_or_utc(&self.time_prefs.timezone_name),
                &self.options.fill_opts,
                &self.options.source,
            )
            .into_iter()
            .map(Arc::new)
            .collect(),
            _ => Vec::new(),
        };
        debug!("{} fill records", fills.len());
        merged.data.extend(fills.iter().cloned());
        merged.data.sort_by_key(|d| d.normal_time);
        merged.grouped.replace(DatumKind::Fill, fills);

        self.device_parameters =
            cluster_parameters(&merged.data, self.options.device_params_offset);
        self.daily_data = daily::build(&merged.data);
        self.data_by_date = CrossIndex::new(&merged.data, TIMELINE_DIMENSIONS);
        self.cbg_index = CrossIndex::new(merged.grouped.get(&DatumKind::Cbg), GLUCOSE_DIMENSIONS);
        self.smbg_index = CrossIndex::new(merged.grouped.get(&DatumKind::Smbg), GLUCOSE_DIMENSIONS);
        self.basics_data = basics::build(
            &merged.data,
            &self.data_by_date,
            merged.grouped.get(&DatumKind::Upload),
            &self.options,
            &mut merged.diagnostics,
        );

        self.data = merged.data;
        self.grouped = merged.grouped;
        self.diabetes_data = merged.diabetes_data;
        self.endpoints = merged.endpoints;
        self.diagnostics = merged.diagnostics;
    }

    /// Zone in effect at `instant`: the zone of the nearest record. Fills
    /// carry the latest zone of the dataset and are not considered.
    pub fn get_timezone(&self, instant: DateTime<Utc>) -> String {
        let is_record = |d: &&SharedDatum| d.kind != DatumKind::Fill;
        let (Some(first), Some(last)) = (
            self.data.iter().find(is_record),
            self.data.iter().rfind(is_record),
        ) else {
            return UTC_ZONE.to_string();
        };
        if instant <= first.normal_time {
            return first.timezone.clone();
        }
        if instant >= last.normal_time {
            return last.timezone.clone();
        }

        let mut half = Duration::hours(1);
        loop {
            let found = self.data_by_date.select(&[Filter::range(
                Dimension::DateTime,
                Key::Time(instant - half),
                Key::Time(instant + half),
            )]);
            let nearest = found
                .iter()
                .filter(is_record)
                .min_by_key(|d| (d.normal_time - instant).num_milliseconds().abs());
            if let Some(nearest) = nearest {
                return nearest.timezone.clone();
            }
            half = half + half;
        }
    }

    /// Merged timeline, fills included, uploads excluded.
    pub fn data(&self) -> &[SharedDatum] {
        &self.data
    }

    pub fn grouped(&self) -> &GroupIndex {
        &self.grouped
    }

    pub fn diabetes_data(&self) -> &[SharedDatum] {
        &self.diabetes_data
    }

    pub fn device_parameters(&self) -> &[DeviceParameterCluster] {
        &self.device_parameters
    }

    pub fn daily_data(&self) -> &DailyData {
        &self.daily_data
    }

    pub fn basics_data(&self) -> &BasicsWindow {
        &self.basics_data
    }

    pub fn endpoints(&self) -> Option<&Endpoints> {
        self.endpoints.as_ref()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Index over the timeline, by datetime and id.
    pub fn data_by_date(&self) -> &CrossIndex {
        &self.data_by_date
    }

    pub fn data_by_date_mut(&mut self) -> &mut CrossIndex {
        &mut self.data_by_date
    }

    /// Index over cbg readings, by datetime and local weekday.
    pub fn cbg_index(&self) -> &CrossIndex {
        &self.cbg_index
    }

    pub fn cbg_index_mut(&mut self) -> &mut CrossIndex {
        &mut self.cbg_index
    }

    pub fn smbg_index(&self) -> &CrossIndex {
        &self.smbg_index
    }

    pub fn smbg_index_mut(&mut self) -> &mut CrossIndex {
        &mut self.smbg_index
    }

    pub fn bg_units(&self) -> BgUnits {
        self.options.bg_units
    }

    pub fn bg_classes(&self) -> BgClasses {
        self.options.bg_classes()
    }

    /// Display preferences. The zone follows the latest record.
    pub fn time_prefs(&self) -> &TimePrefs {
        &self.time_prefs
    }

    pub fn options(&self) -> &Options {
        &self.options
    }
}
