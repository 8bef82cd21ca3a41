//! Core domain types for tally
//!
//! These types describe what callers hand to the [`Tracker`](crate::Tracker)
//! and what leaves it on the wire.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Distinct ID** | The identifier of the user an event belongs to |
//! | **Update type** | What kind of record an event is (`track`, `profile_set`, ...) |
//! | **Properties** | Caller-supplied key/value pairs attached to an event |
//! | **Super properties** | Defaults merged under every `track`/`track_signup` event |
//! | **Envelope** | The canonical, validated record handed to a consumer |
//!
//! Raw [`Properties`] are deliberately loose: keys may be integer indices and
//! values may be nested maps, because callers build them from arbitrary data.
//! The validator is what turns them into the strict JSON map of an [`Envelope`].

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ============================================
// Update Types
// ============================================

/// Kind of record an envelope carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateType {
    Track,
    TrackSignup,
    ProfileSet,
    ProfileSetOnce,
    ProfileIncrement,
    ProfileAppend,
    ProfileUnset,
    ProfileDelete,
}

impl UpdateType {
    /// Wire name of this update type
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateType::Track => "track",
            UpdateType::TrackSignup => "track_signup",
            UpdateType::ProfileSet => "profile_set",
            UpdateType::ProfileSetOnce => "profile_set_once",
            UpdateType::ProfileIncrement => "profile_increment",
            UpdateType::ProfileAppend => "profile_append",
            UpdateType::ProfileUnset => "profile_unset",
            UpdateType::ProfileDelete => "profile_delete",
        }
    }

    /// Whether envelopes of this type carry an `event` name
    pub fn has_event_name(&self) -> bool {
        matches!(self, UpdateType::Track | UpdateType::TrackSignup)
    }
}

impl std::fmt::Display for UpdateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================
// Raw Properties
// ============================================

/// Key of a raw property entry.
///
/// Only [`PropertyKey::Name`] is accepted on an event; indices show up when a
/// plain sequence is passed where a map was expected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    Name(String),
    Index(u64),
}

impl std::fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropertyKey::Name(name) => f.write_str(name),
            PropertyKey::Index(i) => write!(f, "{}", i),
        }
    }
}

impl From<&str> for PropertyKey {
    fn from(name: &str) -> Self {
        PropertyKey::Name(name.to_string())
    }
}

impl From<String> for PropertyKey {
    fn from(name: String) -> Self {
        PropertyKey::Name(name)
    }
}

impl From<u64> for PropertyKey {
    fn from(index: u64) -> Self {
        PropertyKey::Index(index)
    }
}

/// Value of a raw property entry, before validation.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    /// Local wall-clock timestamp, sent as `YYYY-MM-DD HH:MM:SS.0`
    DateTime(NaiveDateTime),
    /// Dense 0-based sequence
    List(Vec<PropertyValue>),
    /// Keyed entries; only valid as a list when keys are `0..n` in order
    Map(Vec<(PropertyKey, PropertyValue)>),
}

impl PropertyValue {
    /// Short type name used in validation messages
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::Null => "null",
            PropertyValue::Bool(_) => "bool",
            PropertyValue::Number(_) => "number",
            PropertyValue::String(_) => "str",
            PropertyValue::DateTime(_) => "datetime",
            PropertyValue::List(_) => "list",
            PropertyValue::Map(_) => "map",
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::String(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::String(v)
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<i32> for PropertyValue {
    fn from(v: i32) -> Self {
        PropertyValue::Number(v.into())
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Number(v.into())
    }
}

impl From<u64> for PropertyValue {
    fn from(v: u64) -> Self {
        PropertyValue::Number(v.into())
    }
}

impl From<f64> for PropertyValue {
    /// Non-finite floats have no JSON form and become `Null`.
    fn from(v: f64) -> Self {
        serde_json::Number::from_f64(v)
            .map(PropertyValue::Number)
            .unwrap_or(PropertyValue::Null)
    }
}

impl From<NaiveDateTime> for PropertyValue {
    fn from(v: NaiveDateTime) -> Self {
        PropertyValue::DateTime(v)
    }
}

impl<T: Into<PropertyValue>> From<Vec<T>> for PropertyValue {
    fn from(items: Vec<T>) -> Self {
        PropertyValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<serde_json::Value> for PropertyValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => PropertyValue::Null,
            serde_json::Value::Bool(b) => PropertyValue::Bool(b),
            serde_json::Value::Number(n) => PropertyValue::Number(n),
            serde_json::Value::String(s) => PropertyValue::String(s),
            serde_json::Value::Array(items) => {
                PropertyValue::List(items.into_iter().map(Into::into).collect())
            }
            serde_json::Value::Object(map) => PropertyValue::Map(
                map.into_iter()
                    .map(|(k, v)| (PropertyKey::Name(k), v.into()))
                    .collect(),
            ),
        }
    }
}

/// Ordered collection of raw properties.
///
/// Inserting an existing key replaces its value in place, so the original
/// position is kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    entries: Vec<(PropertyKey, PropertyValue)>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<PropertyKey>, value: impl Into<PropertyValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace a property, returning the previous value
    pub fn insert(
        &mut self,
        key: impl Into<PropertyKey>,
        value: impl Into<PropertyValue>,
    ) -> Option<PropertyValue> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.entries
            .iter()
            .find(|(k, _)| matches!(k, PropertyKey::Name(n) if n == name))
            .map(|(_, v)| v)
    }

    pub fn remove(&mut self, name: &str) -> Option<PropertyValue> {
        let pos = self
            .entries
            .iter()
            .position(|(k, _)| matches!(k, PropertyKey::Name(n) if n == name))?;
        Some(self.entries.remove(pos).1)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Shallow union: entries of `other` win on key collisions
    pub fn merge(&mut self, other: &Properties) {
        for (k, v) in &other.entries {
            self.insert(k.clone(), v.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &(PropertyKey, PropertyValue)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<PropertyKey>, V: Into<PropertyValue>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut props = Properties::new();
        for (k, v) in iter {
            props.insert(k, v);
        }
        props
    }
}

impl TryFrom<serde_json::Value> for Properties {
    type Error = crate::error::Error;

    /// Build properties from a JSON object. Arrays become index-keyed entries,
    /// which the validator later rejects as non-string keys.
    fn try_from(value: serde_json::Value) -> crate::error::Result<Self> {
        match value {
            serde_json::Value::Object(map) => Ok(map.into_iter().collect()),
            serde_json::Value::Array(items) => Ok(items
                .into_iter()
                .enumerate()
                .map(|(i, v)| (PropertyKey::Index(i as u64), PropertyValue::from(v)))
                .collect()),
            other => Err(crate::error::Error::Config(format!(
                "properties must be a JSON object, got {}",
                other
            ))),
        }
    }
}

// ============================================
// Envelope
// ============================================

/// Library metadata attached to every envelope under `lib`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibProperties {
    #[serde(rename = "$lib")]
    pub lib: String,
    #[serde(rename = "$lib_version")]
    pub lib_version: String,
    #[serde(rename = "$lib_method")]
    pub lib_method: String,
    #[serde(rename = "$app_version", skip_serializing_if = "Option::is_none", default)]
    pub app_version: Option<String>,
    /// Call site, `####<file>##<line>`; diagnostic only
    #[serde(rename = "$lib_detail", skip_serializing_if = "Option::is_none", default)]
    pub lib_detail: Option<String>,
}

/// A validated, normalized event ready for serialization.
///
/// Never mutated after [`normalize`](crate::normalize::normalize) returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub update_type: UpdateType,

    /// Present for `track` and `track_signup` only
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub event: Option<String>,

    /// Present for `track_signup` only
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub original_id: Option<String>,

    pub distinct_id: String,

    /// Milliseconds since the Unix epoch
    pub time: i64,

    pub properties: serde_json::Map<String, serde_json::Value>,

    pub lib: LibProperties,
}
