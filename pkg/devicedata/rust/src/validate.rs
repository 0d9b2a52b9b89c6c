// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Structural checks run on normalized records.

use crate::datum::{Datum, DatumKind};
use crate::units::BgUnits;

/// Shape check applied after normalization. A record that fails it is
/// quarantined exactly like a record with an unparsable time.
pub trait SchemaValidator: Send + Sync {
    fn validate(&self, datum: &Datum) -> Result<(), String>;
}

/// Default validator: per-type required fields and their JSON kinds.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShapeValidator;

impl SchemaValidator for ShapeValidator {
    fn validate(&self, datum: &Datum) -> Result<(), String> {
        if datum.id.is_empty() {
            return Err("empty id".to_string());
        }
        if datum.timezone.is_empty() {
            return Err("empty timezone".to_string());
        }
        if datum.kind.as_str().is_empty() {
            return Err("missing type".to_string());
        }

        match datum.kind {
            DatumKind::Cbg | DatumKind::Smbg => {
                match datum.value {
                    Some(v) if v.is_finite() => {}
                    _ => return Err(format!("{} without a numeric value", datum.kind)),
                }
                if datum.units.as_deref().and_then(BgUnits::parse).is_none() {
                    return Err(format!("{} with unknown units {:?}", datum.kind, datum.units));
                }
            }
            DatumKind::Basal => match datum.number("duration") {
                Some(d) if d >= 0.0 => {}
                _ => return Err("basal without a non-negative duration".to_string()),
            },
            DatumKind::Bolus => {
                require_number_if_present(datum, "normal")?;
                require_number_if_present(datum, "expectedNormal")?;
            }
            DatumKind::Wizard => require_number_if_present(datum, "carbInput")?,
            DatumKind::DeviceEvent => {
                if datum.sub_type.as_deref().is_none_or(str::is_empty) {
                    return Err("deviceEvent without subType".to_string());
                }
            }
            DatumKind::Message => {
                if datum.text("messagetext").is_none() {
                    return Err("message without messagetext".to_string());
                }
            }
            _ => {}
        }
        Ok(())
    }
}

fn require_number_if_present(datum: &Datum, key: &str) -> Result<(), String> {
    match datum.extra.get(key) {
        Some(v) if !v.is_number() => Err(format!("{}.{} is not a number", datum.kind, key)),
        _ => Ok(()),
    }
}
