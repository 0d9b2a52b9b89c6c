// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Blood glucose units and conversion between them.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Number of mg/dL in one mmol/L of glucose.
pub const MGDL_PER_MMOLL: f64 = 18.01559;

pub const MGDL_UNITS: &str = "mg/dL";
pub const MMOLL_UNITS: &str = "mmol/L";

/// Display unit for blood glucose values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BgUnits {
    #[default]
    MgDl,
    MmolL,
}

impl BgUnits {
    pub fn as_str(&self) -> &'static str {
        match self {
            BgUnits::MgDl => MGDL_UNITS,
            BgUnits::MmolL => MMOLL_UNITS,
        }
    }

    /// Parse a unit label. Devices are not consistent about casing, so
    /// `mg/dl` and `mmol/l` are accepted too.
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            MGDL_UNITS | "mg/dl" => Some(BgUnits::MgDl),
            MMOLL_UNITS | "mmol/l" => Some(BgUnits::MmolL),
            _ => None,
        }
    }

    /// Convert `value`, expressed in `from`, into this unit.
    pub fn convert(&self, value: f64, from: BgUnits) -> f64 {
        match (from, self) {
            (BgUnits::MgDl, BgUnits::MmolL) => to_mmol(value),
            (BgUnits::MmolL, BgUnits::MgDl) => to_mgdl(value),
            _ => value,
        }
    }
}

impl std::fmt::Display for BgUnits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl<'de> Deserialize<'de> for BgUnits {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        BgUnits::parse(&s).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "unknown bg units: {}, expected {} or {}",
                s, MGDL_UNITS, MMOLL_UNITS
            ))
        })
    }
}

impl Serialize for BgUnits {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// mg/dL to mmol/L.
pub fn to_mmol(mgdl: f64) -> f64 {
    mgdl / MGDL_PER_MMOLL
}

/// mmol/L to mg/dL.
pub fn to_mgdl(mmol: f64) -> f64 {
    mmol * MGDL_PER_MMOLL
}
