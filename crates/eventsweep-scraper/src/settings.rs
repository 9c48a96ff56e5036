//! Typed reads over a source's opaque `settings` map.
//!
//! Every accessor fails with a configuration-class [`ScraperError`] so a
//! misconfigured source is caught before anything is fetched.

use std::collections::BTreeMap;

use chrono_tz::Tz;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::ScraperError;

/// Keys read outside the strategy itself: request building, date rules,
/// and name rules.
const SHARED_KEYS: &[&str] = &[
    "headers",
    "query",
    "query_date_format",
    "date_formats",
    "date_pattern",
    "past_tolerance_days",
    "timezone",
    "name_denylist",
    "name_prefixes",
];

#[derive(Debug, Clone, Copy)]
pub struct Settings<'a> {
    map: &'a BTreeMap<String, Value>,
}

fn invalid(setting: &str, reason: impl Into<String>) -> ScraperError {
    ScraperError::InvalidSetting {
        setting: setting.to_owned(),
        reason: reason.into(),
    }
}

impl<'a> Settings<'a> {
    #[must_use]
    pub fn new(map: &'a BTreeMap<String, Value>) -> Self {
        Self { map }
    }

    /// Fails on the first key that neither the strategy nor the shared
    /// request, date, and name rules read, so a misspelled setting is a
    /// configuration error instead of a silently empty field.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidSetting`] naming the unknown key.
    pub fn check_keys(&self, strategy_keys: &[&str]) -> Result<(), ScraperError> {
        let unknown = self.map.keys().find(|key| {
            let key = key.as_str();
            !strategy_keys.contains(&key) && !SHARED_KEYS.contains(&key)
        });
        match unknown {
            Some(key) => Err(invalid(key, "unknown setting for this strategy")),
            None => Ok(()),
        }
    }

    /// Raw value of `key`; `null` reads as absent.
    #[must_use]
    pub fn optional_value(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key).filter(|v| !v.is_null())
    }

    /// Returns the string value of `key`, or `None` when absent or `null`.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidSetting`] if the value is not a string.
    pub fn optional_str(&self, key: &str) -> Result<Option<&'a str>, ScraperError> {
        match self.map.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(invalid(key, format!("expected a string, got {other}"))),
        }
    }

    /// # Errors
    ///
    /// Returns [`ScraperError::MissingSetting`] when absent or blank, and
    /// [`ScraperError::InvalidSetting`] when not a string.
    pub fn required_str(&self, key: &str) -> Result<&'a str, ScraperError> {
        match self.optional_str(key)? {
            Some(s) if !s.trim().is_empty() => Ok(s),
            _ => Err(ScraperError::MissingSetting {
                setting: key.to_owned(),
            }),
        }
    }

    /// Reads a list of strings. A single string is accepted as a one-element
    /// list; an absent key is an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidSetting`] for any other shape.
    pub fn str_list(&self, key: &str) -> Result<Vec<String>, ScraperError> {
        match self.map.get(key) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::String(s)) => Ok(vec![s.clone()]),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(invalid(key, format!("expected string entries, got {other}"))),
                })
                .collect(),
            Some(other) => Err(invalid(key, format!("expected a list of strings, got {other}"))),
        }
    }

    /// Reads a string-to-string map. Numbers and booleans are rendered as
    /// text so YAML like `limit: 50` works.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidSetting`] if the value is not an object
    /// of scalars.
    pub fn str_map(&self, key: &str) -> Result<BTreeMap<String, String>, ScraperError> {
        let Some(object) = self.optional_object(key)? else {
            return Ok(BTreeMap::new());
        };
        object
            .iter()
            .map(|(k, v)| {
                let rendered = match v {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    other => {
                        return Err(invalid(key, format!("entry \"{k}\" is not a scalar: {other}")))
                    }
                };
                Ok((k.clone(), rendered))
            })
            .collect()
    }

    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidSetting`] if the value is not a boolean.
    pub fn optional_bool(&self, key: &str) -> Result<Option<bool>, ScraperError> {
        match self.map.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(invalid(key, format!("expected true or false, got {other}"))),
        }
    }

    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidSetting`] if the value is not a
    /// non-negative integer.
    pub fn optional_u64(&self, key: &str) -> Result<Option<u64>, ScraperError> {
        match self.map.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n
                .as_u64()
                .map(Some)
                .ok_or_else(|| invalid(key, format!("expected a non-negative integer, got {n}"))),
            Some(other) => Err(invalid(key, format!("expected an integer, got {other}"))),
        }
    }

    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidSetting`] if the value is not an object.
    pub fn optional_object(&self, key: &str) -> Result<Option<&'a Map<String, Value>>, ScraperError> {
        match self.map.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(object)) => Ok(Some(object)),
            Some(other) => Err(invalid(key, format!("expected a mapping, got {other}"))),
        }
    }

    /// Reads an IANA zone name such as `America/Los_Angeles`.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidSetting`] for an unknown zone.
    pub fn optional_timezone(&self, key: &str) -> Result<Option<Tz>, ScraperError> {
        self.optional_str(key)?
            .map(|name| {
                name.trim()
                    .parse::<Tz>()
                    .map_err(|e| invalid(key, format!("unknown time zone \"{name}\": {e}")))
            })
            .transpose()
    }

    /// Compiles the regex stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidSetting`] if the pattern does not compile.
    pub fn optional_regex(&self, key: &str) -> Result<Option<Regex>, ScraperError> {
        self.optional_str(key)?
            .map(|pattern| Regex::new(pattern).map_err(|e| invalid(key, e.to_string())))
            .transpose()
    }
}
