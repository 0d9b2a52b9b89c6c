// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Pipeline options.
//!
//! Every struct carries `#[serde(default)]`, so a partial JSON document is
//! deep-merged with the defaults below: only the keys present override.

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::datetime::UTC_ZONE;
use crate::datum::DatumKind;
use crate::error::Error;
use crate::units::BgUnits;

/// Device parameter changes closer than this to a cluster anchor join it.
pub const DEVICE_PARAMS_OFFSET_MS: i64 = 30 * 60 * 1000;

/// Label written to the `source` field of every normalized record.
pub const DEFAULT_SOURCE: &str = "Diabeloop";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TimePrefs {
    pub timezone_aware: bool,
    pub timezone_name: String,
}

impl Default for TimePrefs {
    fn default() -> Self {
        Self {
            timezone_aware: true,
            timezone_name: UTC_ZONE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BgClass {
    pub boundary: f64,
}

/// Glucose range boundaries, in the configured display unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BgClasses {
    #[serde(rename = "very-low", alias = "veryLow")]
    pub very_low: BgClass,
    pub low: BgClass,
    pub target: BgClass,
    pub high: BgClass,
    #[serde(rename = "very-high", alias = "veryHigh")]
    pub very_high: BgClass,
}

/// `bgClasses` as configured. Absent classes keep the defaults of the
/// display unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BgClassOverrides {
    #[serde(rename = "very-low", alias = "veryLow", skip_serializing_if = "Option::is_none")]
    pub very_low: Option<BgClass>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low: Option<BgClass>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<BgClass>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high: Option<BgClass>,
    #[serde(rename = "very-high", alias = "veryHigh", skip_serializing_if = "Option::is_none")]
    pub very_high: Option<BgClass>,
}

impl BgClassOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overrides applied over `defaults`.
    pub fn resolve(&self, defaults: BgClasses) -> BgClasses {
        BgClasses {
            very_low: self.very_low.unwrap_or(defaults.very_low),
            low: self.low.unwrap_or(defaults.low),
            target: self.target.unwrap_or(defaults.target),
            high: self.high.unwrap_or(defaults.high),
            very_high: self.very_high.unwrap_or(defaults.very_high),
        }
    }
}

impl BgClasses {
    /// Default boundaries for `units`. `very_high` is the clamp threshold.
    pub fn defaults_for(units: BgUnits) -> Self {
        let [very_low, low, target, high, very_high] = match units {
            BgUnits::MgDl => [54.0, 70.0, 180.0, 250.0, 400.0],
            BgUnits::MmolL => [3.0, 3.9, 10.0, 13.9, 22.5],
        };
        Self {
            very_low: BgClass { boundary: very_low },
            low: BgClass { boundary: low },
            target: BgClass { boundary: target },
            high: BgClass { boundary: high },
            very_high: BgClass {
                boundary: very_high,
            },
        }
    }
}

/// Background shading of the daily chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FillOpts {
    /// Local starting hour to shading class. Hours absent here get no fill.
    pub classes: BTreeMap<u32, String>,
    /// Length of one fill interval, in hours.
    pub duration: u32,
}

impl Default for FillOpts {
    fn default() -> Self {
        let classes = [
            (0, "darkest"),
            (3, "dark"),
            (6, "lighter"),
            (9, "light"),
            (12, "lightest"),
            (15, "lighter"),
            (18, "dark"),
            (21, "darker"),
        ]
        .into_iter()
        .map(|(hour, class)| (hour, class.to_string()))
        .collect();
        Self {
            classes,
            duration: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Options {
    pub time_prefs: TimePrefs,
    #[serde(rename = "CBG_PERCENT_FOR_ENOUGH")]
    pub cbg_percent_for_enough: f64,
    #[serde(rename = "CBG_MAX_DAILY")]
    pub cbg_max_daily: u32,
    #[serde(rename = "SMBG_DAILY_MIN")]
    pub smbg_daily_min: u32,
    /// Treatment-relevant types: they define the dataset endpoints and are
    /// the only types routed into basics buckets.
    pub basics_types: Vec<DatumKind>,
    pub bg_units: BgUnits,
    /// Explicit boundaries. Classes left out use the defaults for `bg_units`.
    #[serde(skip_serializing_if = "BgClassOverrides::is_empty")]
    pub bg_classes: BgClassOverrides,
    pub fill_opts: FillOpts,
    pub diabetes_data_types: Vec<DatumKind>,
    /// Clustering threshold for device parameter changes, in milliseconds.
    pub device_params_offset: i64,
    pub source: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            time_prefs: TimePrefs::default(),
            cbg_percent_for_enough: 0.75,
            cbg_max_daily: 288,
            smbg_daily_min: 4,
            basics_types: vec![
                DatumKind::Basal,
                DatumKind::Bolus,
                DatumKind::Cbg,
                DatumKind::Smbg,
                DatumKind::DeviceEvent,
                DatumKind::Wizard,
                DatumKind::Upload,
            ],
            bg_units: BgUnits::MgDl,
            bg_classes: BgClassOverrides::default(),
            fill_opts: FillOpts::default(),
            diabetes_data_types: vec![
                DatumKind::Basal,
                DatumKind::Bolus,
                DatumKind::Cbg,
                DatumKind::Smbg,
                DatumKind::Wizard,
            ],
            device_params_offset: DEVICE_PARAMS_OFFSET_MS,
            source: DEFAULT_SOURCE.to_string(),
        }
    }
}

impl Options {
    /// Build options from a JSON document merged over the defaults.
    /// `null` yields the defaults.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, Error> {
        if value.is_null() {
            return Ok(Self::default());
        }
        Ok(Self::deserialize(value)?)
    }

    /// Glucose boundaries in effect.
    pub fn bg_classes(&self) -> BgClasses {
        self.bg_classes
            .resolve(BgClasses::defaults_for(self.bg_units))
    }

    /// Minimum number of cbg readings for a day to count as fully covered.
    pub fn cbg_daily_min(&self) -> f64 {
        self.cbg_percent_for_enough * f64::from(self.cbg_max_daily)
    }

    pub fn is_basics_type(&self, kind: &DatumKind) -> bool {
        self.basics_types.contains(kind)
    }

    pub fn is_diabetes_type(&self, kind: &DatumKind) -> bool {
        self.diabetes_data_types.contains(kind)
    }
}

/// Load options from a JSON file.
pub fn load_options(path: &Path) -> Result<Options> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))?;
    let options = Options::from_json(&value)
        .with_context(|| format!("invalid options in {}", path.display()))?;
    debug!("loaded options from {}", path.display());
    Ok(options)
}
