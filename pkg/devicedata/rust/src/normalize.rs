// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Per-record normalization: validation, enrichment and unit conversion.
//!
//! Each raw record goes through here exactly once, when it is appended to
//! the cumulative buffer. The resulting `normalTime` is never recomputed.

use chrono::{DateTime, Datelike, Duration, Utc};
use log::debug;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde_json::{Map, Value};
use std::fmt::Write;

use crate::datetime::{self, UTC_ZONE};
use crate::datum::{Datum, DatumKind, LocalDay};
use crate::error::QuarantineReason;
use crate::units::BgUnits;
use crate::validate::SchemaValidator;

/// Fields computed here. Incoming values for them are discarded.
/// Longest accepted `basal` or `physicalActivity` duration: one week.
pub const MAX_DURATION_MS: f64 = 7.0 * 24.0 * 60.0 * 60.0 * 1000.0;

const DERIVED_FIELDS: &[&str] = &[
    "normalTime",
    "normalEnd",
    "displayOffset",
    "source",
    "localDayOfWeek",
    "localDate",
    "msPer24",
];

/// Source of synthetic record ids: 16 random bytes, hex encoded.
#[derive(Debug)]
pub struct IdGenerator {
    rng: StdRng,
}

impl IdGenerator {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Deterministic generator, for tests and reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn next_id(&mut self) -> String {
        let mut bytes = [0u8; 16];
        self.rng.fill_bytes(&mut bytes);
        bytes.iter().fold(String::with_capacity(32), |mut hex, b| {
            let _ = write!(hex, "{b:02x}");
            hex
        })
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::from_entropy()
    }
}

/// A record that could not be normalized.
#[derive(Debug, Clone)]
pub struct Quarantined {
    pub id: Option<String>,
    pub reason: QuarantineReason,
    pub record: Value,
}

/// `[A-Za-z0-9_-]+`
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

pub struct Normalizer {
    bg_units: BgUnits,
    source: String,
    validator: Box<dyn SchemaValidator>,
}

impl std::fmt::Debug for Normalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Normalizer")
            .field("bg_units", &self.bg_units)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl Normalizer {
    pub fn new(bg_units: BgUnits, source: &str, validator: Box<dyn SchemaValidator>) -> Self {
        Self {
            bg_units,
            source: source.to_string(),
            validator,
        }
    }

    /// Normalize one raw record.
    pub fn normalize(&self, raw: Value, ids: &mut IdGenerator) -> Result<Datum, Quarantined> {
        let Value::Object(mut fields) = raw else {
            return Err(Quarantined {
                id: None,
                reason: QuarantineReason::NotAnObject,
                record: raw,
            });
        };

        rewrite_message(&mut fields);

        let id = match fields.remove("id") {
            Some(Value::String(id)) if is_valid_id(&id) => id,
            _ => {
                let id = ids.next_id();
                debug!(
                    "datum {} missing id, generated: {}",
                    fields.get("type").and_then(Value::as_str).unwrap_or("?"),
                    id
                );
                id
            }
        };

        let time = fields
            .get("time")
            .and_then(Value::as_str)
            .map(str::to_string);
        let Some(time) = time else {
            return Err(quarantine(id, QuarantineReason::MissingTime, fields));
        };
        let Some(normal_time) = datetime::parse_time(&time) else {
            return Err(quarantine(id, QuarantineReason::InvalidTime(time), fields));
        };
        fields.remove("time");

        let zone_name = match fields.remove("timezone") {
            Some(Value::String(name)) if datetime::resolve_zone(&name).is_some() => name,
            Some(other) => {
                debug!("datum {id}: invalid timezone {other}, using UTC");
                UTC_ZONE.to_string()
            }
            None => UTC_ZONE.to_string(),
        };
        let tz = datetime::zone_or_utc(&zone_name);

        let kind = match fields.remove("type") {
            Some(Value::String(name)) => DatumKind::parse(&name),
            _ => DatumKind::Other(String::new()),
        };
        let sub_type = match fields.remove("subType") {
            Some(Value::String(s)) => Some(s),
            _ => None,
        };
        let units = match fields.remove("units") {
            Some(Value::String(u)) => Some(u),
            _ => None,
        };
        // Non numeric values (device parameters) stay with the other fields.
        let value = fields.get("value").and_then(Value::as_f64);
        if value.is_some() {
            fields.remove("value");
        }
        for key in DERIVED_FIELDS {
            fields.remove(*key);
        }

        let mut datum = Datum {
            id,
            kind,
            sub_type,
            time,
            normal_time,
            normal_end: None,
            timezone: zone_name,
            display_offset: datetime::display_offset(&normal_time, tz),
            source: self.source.clone(),
            units,
            value,
            local: None,
            fill: None,
            time_change: None,
            extra: fields,
        };

        let duration = match datum.kind {
            DatumKind::Basal => datum.number("duration"),
            DatumKind::PhysicalActivity => activity_duration_ms(&datum.extra),
            _ => None,
        };
        if let Some(ms) = duration {
            match end_after(&normal_time, ms) {
                Some(end) => datum.normal_end = Some(end),
                None => {
                    let id = datum.id.clone();
                    return Err(quarantine(
                        id,
                        QuarantineReason::InvalidDuration(format!("{} {ms:e} ms", datum.kind)),
                        datum.extra,
                    ));
                }
            }
        }

        match datum.kind {
            DatumKind::Cbg | DatumKind::Smbg => {
                self.convert_glucose(&mut datum);
                datum.local = Some(LocalDay {
                    day_of_week: datetime::weekday_name(normal_time.with_timezone(&tz).weekday())
                        .to_string(),
                    date: datetime::local_date(&normal_time, tz),
                    ms_per_24: datetime::ms_since_local_midnight(&normal_time, tz),
                });
            }
            DatumKind::Wizard => self.convert_wizard(&mut datum),
            _ => {}
        }

        if let Err(msg) = self.validator.validate(&datum) {
            let id = datum.id.clone();
            return Err(Quarantined {
                id: Some(id),
                reason: QuarantineReason::Schema(msg),
                record: serde_json::to_value(&datum).unwrap_or(Value::Null),
            });
        }

        Ok(datum)
    }

    fn convert_glucose(&self, datum: &mut Datum) {
        let Some(stored) = datum.units.as_deref().and_then(BgUnits::parse) else {
            return;
        };
        if stored != self.bg_units {
            datum.value = datum.value.map(|v| self.bg_units.convert(v, stored));
        }
        datum.units = Some(self.bg_units.as_str().to_string());
    }

    fn convert_wizard(&self, datum: &mut Datum) {
        let Some(stored) = datum.units.as_deref().and_then(BgUnits::parse) else {
            return;
        };
        if stored != self.bg_units {
            if let Some(bg) = datum.number("bgInput") {
                let converted = self.bg_units.convert(bg, stored);
                if let Some(n) = serde_json::Number::from_f64(converted) {
                    datum.extra.insert("bgInput".to_string(), Value::Number(n));
                }
            }
        }
        datum.units = Some(self.bg_units.as_str().to_string());
    }
}

/// Messages come from a different service with their own layout.
fn rewrite_message(fields: &mut Map<String, Value>) {
    let is_message_text = matches!(fields.get("messagetext"), Some(Value::String(_)));
    let is_message_type = fields.get("type").and_then(Value::as_str) == Some("message");
    if !is_message_text || is_message_type {
        return;
    }
    fields.insert("type".to_string(), Value::String("message".to_string()));
    match fields.remove("timestamp") {
        Some(Value::String(ts)) => match datetime::parse_time(&ts) {
            Some(t) => {
                fields.insert("time".to_string(), Value::String(datetime::iso(&t)));
            }
            None => {
                fields.remove("time");
            }
        },
        _ => {
            fields.remove("time");
        }
    }
    if let Some(parent) = fields.remove("parentmessage") {
        fields.insert("parentMessage".to_string(), parent);
    }
}

/// `duration: {value, units}` of physical activities, in milliseconds.
fn activity_duration_ms(fields: &Map<String, Value>) -> Option<f64> {
    let duration = fields.get("duration")?;
    let value = duration.get("value")?.as_f64()?;
    let ms_per_unit = match duration.get("units").and_then(Value::as_str) {
        Some("seconds") => 1_000.0,
        Some("hours") => 3_600_000.0,
        _ => 60_000.0,
    };
    Some(value * ms_per_unit)
}

/// `instant + ms`, `None` unless `0 <= ms <= MAX_DURATION_MS`.
fn end_after(instant: &DateTime<Utc>, ms: f64) -> Option<DateTime<Utc>> {
    if !(0.0..=MAX_DURATION_MS).contains(&ms) {
        return None;
    }
    let delta = Duration::try_milliseconds(ms.round() as i64)?;
    instant.checked_add_signed(delta)
}

fn quarantine(id: String, reason: QuarantineReason, fields: Map<String, Value>) -> Quarantined {
    Quarantined {
        id: Some(id),
        reason,
        record: Value::Object(fields),
    }
}
