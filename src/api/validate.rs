//! Request body parsing and field validation.
//!
//! Handlers receive the raw JSON body and turn it into a typed DTO with
//! [`parse_valid`], so malformed JSON and failed field checks both surface as
//! [`ApiError`]s with the standard error body.

use std::collections::HashMap;

use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use serde_json::Value;

use crate::error::ApiError;

pub trait Validate {
    fn validate(&self) -> Result<(), ApiError>;
}

/// Deserialize a body into `T` and run its field checks
pub fn parse_valid<T: DeserializeOwned + Validate>(payload: Value) -> Result<T, ApiError> {
    let parsed: T = serde_json::from_value(payload)
        .map_err(|e| ApiError::invalid_json(format!("Invalid request body: {}", e)))?;
    parsed.validate()?;
    Ok(parsed)
}

/// Distinguish an absent key (`None`) from an explicit `null` (`Some(None)`).
/// Pair with `#[serde(default)]`.
pub fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Collects per-field messages; the first message recorded for a field wins
#[derive(Debug, Default)]
pub struct FieldErrors(HashMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_insert_with(|| message.into());
    }

    pub fn length(&mut self, field: &str, value: &str, min: usize, max: Option<usize>) {
        let len = value.trim().chars().count();
        if len < min {
            if min == 1 {
                self.add(field, "Must not be empty");
            } else {
                self.add(field, format!("Must be at least {} characters", min));
            }
        } else if let Some(max) = max.filter(|max| len > *max) {
            self.add(field, format!("Must be at most {} characters", max));
        }
    }

    pub fn optional_length(&mut self, field: &str, value: Option<&str>, min: usize, max: Option<usize>) {
        if let Some(value) = value {
            self.length(field, value, min, max);
        }
    }

    pub fn non_negative(&mut self, field: &str, value: Option<i32>) {
        if value.is_some_and(|v| v < 0) {
            self.add(field, "Must be zero or greater");
        }
    }

    pub fn positive(&mut self, field: &str, value: Option<i32>) {
        if value.is_some_and(|v| v <= 0) {
            self.add(field, "Must be greater than zero");
        }
    }

    /// `#RRGGBB`
    pub fn hex_color(&mut self, field: &str, value: Option<&str>) {
        if let Some(value) = value {
            if !is_hex_color(value) {
                self.add(field, "Invalid color (use hex format: #RRGGBB)");
            }
        }
    }

    pub fn email(&mut self, field: &str, value: Option<&str>) {
        if let Some(value) = value {
            if !is_email(value) {
                self.add(field, "Invalid email");
            }
        }
    }

    /// 24-hour `HH:mm`
    pub fn clock_time(&mut self, field: &str, value: Option<&str>) {
        if let Some(value) = value {
            if !is_clock_time(value) {
                self.add(field, "Time must use the HH:mm format");
            }
        }
    }

    pub fn finish(self, message: &str) -> Result<(), ApiError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ApiError::validation_error(message, Some(self.0)))
        }
    }
}

fn is_hex_color(value: &str) -> bool {
    value.len() == 7 && value.starts_with('#') && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}

fn is_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !value.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

fn is_clock_time(value: &str) -> bool {
    let Some((hours, minutes)) = value.split_once(':') else {
        return false;
    };
    let digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    if !digits(hours) || hours.len() > 2 || !digits(minutes) || minutes.len() != 2 {
        return false;
    }
    matches!((hours.parse::<u8>(), minutes.parse::<u8>()), (Ok(h), Ok(m)) if h < 24 && m < 60)
}
