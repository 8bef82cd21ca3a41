//! Property validation
//!
//! Checks identifiers, event names, and raw property maps against the
//! collector's rules and coerces accepted values into JSON:
//!
//! - identifiers (`distinct_id`, `original_id`): 1 to 255 bytes
//! - names (event names, property keys): `[A-Za-z_$][A-Za-z0-9_$]{0,99}`,
//!   excluding reserved words in any letter case
//! - values: string (at most 8191 bytes), number, bool, timestamp, or a flat
//!   list of strings

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{ValidationError, ValidationErrorKind as Kind};
use crate::types::{Properties, PropertyKey, PropertyValue};

/// Longest accepted `distinct_id` / `original_id`, in bytes
pub const MAX_ID_LEN: usize = 255;

/// Longest accepted string property value, in bytes
pub const MAX_VALUE_LEN: usize = 8191;

/// Format timestamps are sent in
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S.0";

/// Names the collector reserves for envelope fields
pub const RESERVED_NAMES: &[&str] = &[
    "distinct_id",
    "original_id",
    "time",
    "properties",
    "id",
    "first_id",
    "second_id",
    "users",
    "events",
    "event",
    "user_id",
    "date",
    "datetime",
];

static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]{0,99}$").expect("valid name pattern"));

/// Whether `name` is usable as an event name or property key.
pub fn is_valid_name(name: &str) -> bool {
    NAME_PATTERN.is_match(name)
        && !RESERVED_NAMES
            .iter()
            .any(|reserved| reserved.eq_ignore_ascii_case(name))
}

/// Check a `distinct_id`.
pub fn validate_distinct_id(distinct_id: &str) -> Result<(), ValidationError> {
    if distinct_id.is_empty() {
        return Err(ValidationError::new(
            Kind::EmptyDistinctId,
            "property [distinct_id] must not be empty",
        ));
    }
    if distinct_id.len() > MAX_ID_LEN {
        return Err(ValidationError::new(
            Kind::DistinctIdTooLong,
            format!("the max length of [distinct_id] is {}", MAX_ID_LEN),
        ));
    }
    Ok(())
}

/// Check the pre-signup `original_id` of a `track_signup` call.
pub fn validate_original_id(original_id: &str) -> Result<(), ValidationError> {
    if original_id.is_empty() {
        return Err(ValidationError::new(
            Kind::EmptyOriginalId,
            "property [original_id] must not be empty",
        ));
    }
    if original_id.len() > MAX_ID_LEN {
        return Err(ValidationError::new(
            Kind::OriginalIdTooLong,
            format!("the max length of [original_id] is {}", MAX_ID_LEN),
        ));
    }
    Ok(())
}

/// Check an event name.
pub fn validate_event_name(name: &str) -> Result<(), ValidationError> {
    if !is_valid_name(name) {
        return Err(ValidationError::new(
            Kind::InvalidEventName,
            format!("event name must be a valid variable name. [name='{}']", name),
        ));
    }
    Ok(())
}

/// Validate a `distinct_id`, optional event name, and raw properties.
///
/// Returns the properties as a JSON map in insertion order, with timestamps
/// rendered as strings. Stops at the first rule broken.
pub fn validate(
    distinct_id: &str,
    event_name: Option<&str>,
    properties: &Properties,
) -> Result<Map<String, Value>, ValidationError> {
    validate_distinct_id(distinct_id)?;
    if let Some(name) = event_name {
        validate_event_name(name)?;
    }
    validate_properties(properties)
}

/// Validate raw properties and coerce them into a JSON map.
pub fn validate_properties(properties: &Properties) -> Result<Map<String, Value>, ValidationError> {
    let mut out = Map::with_capacity(properties.len());

    for (key, value) in properties.iter() {
        let name = match key {
            PropertyKey::Name(name) => name,
            PropertyKey::Index(i) => {
                return Err(ValidationError::new(
                    Kind::PropertyKeyNotString,
                    format!("property key must be a str. [key={}]", i),
                ));
            }
        };

        if !is_valid_name(name) {
            return Err(ValidationError::new(
                Kind::InvalidPropertyKey,
                format!("property key must be a valid variable name. [key='{}']", name),
            ));
        }

        out.insert(name.clone(), coerce_value(name, value)?);
    }

    Ok(out)
}

fn coerce_value(key: &str, value: &PropertyValue) -> Result<Value, ValidationError> {
    match value {
        PropertyValue::Bool(b) => Ok(Value::Bool(*b)),
        PropertyValue::Number(n) => Ok(Value::Number(n.clone())),
        PropertyValue::String(s) => {
            if s.len() > MAX_VALUE_LEN {
                return Err(ValidationError::new(
                    Kind::PropertyValueTooLong,
                    format!(
                        "the max length of property value is {}. [key={}]",
                        MAX_VALUE_LEN, key
                    ),
                ));
            }
            Ok(Value::String(s.clone()))
        }
        PropertyValue::DateTime(dt) => Ok(Value::String(dt.format(DATETIME_FORMAT).to_string())),
        PropertyValue::List(items) => string_list(items.iter()),
        PropertyValue::Map(entries) => {
            let dense = entries
                .iter()
                .enumerate()
                .all(|(i, (k, _))| *k == PropertyKey::Index(i as u64));
            if !dense {
                return Err(ValidationError::new(
                    Kind::ListPropertyNotFlat,
                    format!("[list] property must not be associative. [key='{}']", key),
                ));
            }
            string_list(entries.iter().map(|(_, v)| v))
        }
        PropertyValue::Null => Err(ValidationError::new(
            Kind::PropertyValueInvalidType,
            format!(
                "property value must be a str/int/float/datetime/list. [key='{}' type={}]",
                key,
                value.type_name()
            ),
        )),
    }
}

fn string_list<'a>(
    items: impl Iterator<Item = &'a PropertyValue>,
) -> Result<Value, ValidationError> {
    items
        .map(|item| match item {
            PropertyValue::String(s) => Ok(Value::String(s.clone())),
            other => Err(ValidationError::new(
                Kind::ListElementNotString,
                format!(
                    "[list] property's value must be a str. [value type={}]",
                    other.type_name()
                ),
            )),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}
