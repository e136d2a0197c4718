//! Typed application settings stored as text in the `settings` table.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{Setting, SettingType};

pub const SUBMISSION_DEADLINE_DAYS: &str = "sakip.submission_deadline_days";
pub const ACHIEVEMENT_WARNING_THRESHOLD: &str = "sakip.achievement_warning_threshold";
pub const MAX_EVIDENCE_BYTES: &str = "upload.max_evidence_bytes";
pub const ALLOWED_EXTENSIONS: &str = "upload.allowed_extensions";

/// Settings inserted by `admin init`: (key, raw value, type, description).
pub const DEFAULTS: &[(&str, &str, SettingType, &str)] = &[
    ("app.name", "SAKIP", SettingType::String, "Application name"),
    (
        SUBMISSION_DEADLINE_DAYS,
        "7",
        SettingType::Integer,
        "Days after a period ends before an entry counts as late",
    ),
    (
        ACHIEVEMENT_WARNING_THRESHOLD,
        "150",
        SettingType::Float,
        "Achievement percentage above which quality checks warn",
    ),
    (
        MAX_EVIDENCE_BYTES,
        "5242880",
        SettingType::Integer,
        "Maximum size of one evidence file in bytes",
    ),
    (
        ALLOWED_EXTENSIONS,
        r#"["pdf","doc","docx","xls","xlsx","jpg","jpeg","png"]"#,
        SettingType::Array,
        "File extensions accepted as evidence",
    ),
];

/// Inclusive bounds for integer settings the server computes with.
const INTEGER_BOUNDS: &[(&str, i64, i64)] = &[
    (SUBMISSION_DEADLINE_DAYS, 0, 366),
    (MAX_EVIDENCE_BYTES, 0, i64::MAX),
];

fn invalid(key: &str, reason: impl Into<String>) -> Error {
    Error::InvalidSetting {
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// Reads a stored raw value as its declared type.
pub fn cast(key: &str, raw: &str, ty: SettingType) -> Result<Value> {
    let value = match ty {
        SettingType::String => Value::String(raw.to_string()),
        SettingType::Integer => raw
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|e| invalid(key, e.to_string()))?,
        SettingType::Float => raw
            .trim()
            .parse::<f64>()
            .map(Value::from)
            .map_err(|e| invalid(key, e.to_string()))?,
        SettingType::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Value::Bool(true),
            "0" | "false" | "no" | "off" | "" => Value::Bool(false),
            other => return Err(invalid(key, format!("'{other}' is not a boolean"))),
        },
        SettingType::Array => match serde_json::from_str(raw)? {
            arr @ Value::Array(_) => arr,
            _ => return Err(invalid(key, "expected a JSON array")),
        },
        SettingType::Json => serde_json::from_str(raw)?,
    };
    Ok(value)
}

/// Checks a submitted value against the declared type and renders it as text.
pub fn serialize(key: &str, value: &Value, ty: SettingType) -> Result<String> {
    match (ty, value) {
        (SettingType::String, Value::String(s)) => Ok(s.clone()),
        (SettingType::Integer, Value::Number(n)) if n.is_i64() || n.is_u64() => {
            check_bounds(key, n.as_i64())?;
            Ok(n.to_string())
        }
        (SettingType::Float, Value::Number(n)) => Ok(n.to_string()),
        (SettingType::Boolean, Value::Bool(b)) => Ok(b.to_string()),
        (SettingType::Array, Value::Array(_)) | (SettingType::Json, _) => {
            Ok(serde_json::to_string(value)?)
        }
        // Form-style input: accept strings that cast cleanly.
        (_, Value::String(s)) => cast(key, s, ty).and_then(|v| serialize(key, &v, ty)),
        _ => Err(invalid(key, format!("expected a {ty} value"))),
    }
}

fn check_bounds(key: &str, value: Option<i64>) -> Result<()> {
    let Some((_, min, max)) = INTEGER_BOUNDS.iter().find(|(k, _, _)| *k == key) else {
        return Ok(());
    };
    match value {
        Some(v) if (*min..=*max).contains(&v) => Ok(()),
        _ => Err(invalid(key, format!("must be between {min} and {max}"))),
    }
}

/// The typed value of a stored setting, falling back to the raw text.
#[must_use]
pub fn typed_value(setting: &Setting) -> Value {
    cast(&setting.key, &setting.value, setting.setting_type).unwrap_or_else(|e| {
        tracing::warn!("Setting '{}' does not match its type: {e}", setting.key);
        Value::String(setting.value.clone())
    })
}

fn lookup(store: &dyn Store, key: &str) -> Option<Value> {
    match store.get_setting(key) {
        Ok(Some(setting)) => Some(typed_value(&setting)),
        Ok(None) => None,
        Err(e) => {
            tracing::error!("Failed to read setting '{key}': {e}");
            None
        }
    }
}

#[must_use]
pub fn get_i64(store: &dyn Store, key: &str, default: i64) -> i64 {
    lookup(store, key)
        .and_then(|v| v.as_i64())
        .unwrap_or(default)
}

#[must_use]
pub fn get_f64(store: &dyn Store, key: &str, default: f64) -> f64 {
    lookup(store, key)
        .and_then(|v| v.as_f64())
        .unwrap_or(default)
}

#[must_use]
pub fn get_string_list(store: &dyn Store, key: &str, default: &[&str]) -> Vec<String> {
    lookup(store, key)
        .and_then(|v| {
            v.as_array().map(|items| {
                items
                    .iter()
                    .filter_map(|i| i.as_str().map(str::to_ascii_lowercase))
                    .collect()
            })
        })
        .unwrap_or_else(|| default.iter().map(|s| (*s).to_string()).collect())
}
