use std::str::FromStr;

use chrono::NaiveDate;

use crate::server::response::{ApiError, FieldMessages};
use crate::types::ParseEnumError;

pub const MAX_CODE_LEN: usize = 50;
pub const MAX_NAME_LEN: usize = 255;
pub const MAX_TEXT_LEN: usize = 5000;

/// Collects per-field messages and turns them into a 422.
#[derive(Debug, Default)]
pub struct FieldErrors(FieldMessages);

impl FieldErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    /// Returns the trimmed value, or records a "required" message.
    pub fn required(&mut self, field: &str, value: Option<&str>) -> Option<String> {
        match value.map(str::trim) {
            Some(v) if !v.is_empty() => Some(v.to_string()),
            _ => {
                self.add(field, format!("The {field} field is required."));
                None
            }
        }
    }

    pub fn required_value<T: Copy>(&mut self, field: &str, value: Option<T>) -> Option<T> {
        if value.is_none() {
            self.add(field, format!("The {field} field is required."));
        }
        value
    }

    pub fn max_len(&mut self, field: &str, value: Option<&str>, max: usize) {
        if value.is_some_and(|v| v.chars().count() > max) {
            self.add(
                field,
                format!("The {field} may not be greater than {max} characters."),
            );
        }
    }

    pub fn range(&mut self, field: &str, value: Option<f64>, min: f64, max: f64) {
        if let Some(v) = value {
            if !v.is_finite() || v < min || v > max {
                self.add(field, format!("The {field} must be between {min} and {max}."));
            }
        }
    }

    pub fn min(&mut self, field: &str, value: Option<f64>, min: f64) {
        if let Some(v) = value {
            if !v.is_finite() || v < min {
                self.add(field, format!("The {field} must be at least {min}."));
            }
        }
    }

    pub fn year(&mut self, field: &str, value: Option<i32>) {
        if value.is_some_and(|y| !(2000..=2100).contains(&y)) {
            self.add(field, format!("The {field} must be between 2000 and 2100."));
        }
    }

    /// Parses an enumerated value; `None` input is not an error.
    pub fn parse<T>(&mut self, field: &str, value: Option<&str>) -> Option<T>
    where
        T: FromStr<Err = ParseEnumError>,
    {
        value.map(str::trim).filter(|v| !v.is_empty()).and_then(|v| {
            v.parse::<T>()
                .map_err(|e| self.add(field, format!("The selected {field} is invalid ({e}).")))
                .ok()
        })
    }

    pub fn date(&mut self, field: &str, value: Option<&str>) -> Option<NaiveDate> {
        value.filter(|v| !v.is_empty()).and_then(|v| {
            NaiveDate::parse_from_str(v, "%Y-%m-%d")
                .map_err(|_| self.add(field, format!("The {field} must be a date (YYYY-MM-DD).")))
                .ok()
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn finish(self) -> Result<(), ApiError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ApiError::validation(self.0))
        }
    }
}
