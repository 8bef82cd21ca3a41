//! The tracker facade
//!
//! [`Tracker`] is what applications call. Each tracking or profile call runs
//! the whole pipeline before returning:
//!
//! ```text
//! call → normalize (super properties, $time, lib metadata, validation)
//!      → serialize → consumer.send
//! ```
//!
//! Validation failures come back as `Err` and nothing is sent. Delivery
//! outcomes come back as `Ok(bool)`; in strict mode a `false` outcome is
//! turned into [`Error::Delivery`] instead.
//!
//! A tracker is a single-owner value: every operation takes `&mut self`, so
//! sharing one across threads needs a `Mutex` around it.

use std::panic::Location;

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::consumer::{self, Consumer};
use crate::error::{Error, Result};
use crate::normalize::{normalize, EventRequest, APP_VERSION_PROPERTY};
use crate::serialize::serialize;
use crate::super_props::SuperProperties;
use crate::types::{Properties, UpdateType};

/// Event name `track_signup` records under
pub const SIGNUP_EVENT: &str = "$SignUp";

/// Keys for [`Tracker::profile_unset`]: either plain names or a ready-made
/// `key → true` map.
#[derive(Debug, Clone, PartialEq)]
pub enum UnsetKeys {
    Keys(Vec<String>),
    Map(Properties),
}

impl UnsetKeys {
    fn into_properties(self) -> Properties {
        match self {
            UnsetKeys::Keys(keys) => keys.into_iter().map(|k| (k, true)).collect(),
            UnsetKeys::Map(map) => map,
        }
    }
}

impl From<Vec<String>> for UnsetKeys {
    fn from(keys: Vec<String>) -> Self {
        UnsetKeys::Keys(keys)
    }
}

impl From<Vec<&str>> for UnsetKeys {
    fn from(keys: Vec<&str>) -> Self {
        UnsetKeys::Keys(keys.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for UnsetKeys {
    fn from(keys: &[&str]) -> Self {
        UnsetKeys::Keys(keys.iter().map(|k| k.to_string()).collect())
    }
}

impl From<Properties> for UnsetKeys {
    fn from(map: Properties) -> Self {
        UnsetKeys::Map(map)
    }
}

/// Records events and profile updates through a consumer.
pub struct Tracker {
    consumer: Box<dyn Consumer>,
    super_properties: SuperProperties,
    clock: Box<dyn Clock>,
    strict: bool,
}

impl Tracker {
    /// Create a tracker delivering through `consumer`.
    pub fn new(consumer: impl Consumer + 'static) -> Self {
        Self {
            consumer: Box::new(consumer),
            super_properties: SuperProperties::new(),
            clock: Box::new(SystemClock),
            strict: false,
        }
    }

    /// Create a tracker with the consumer and options `config` selects.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut tracker = Self::new(consumer::from_config(&config.consumer)?)
            .with_strict(config.tracker.strict);

        if let Some(app_version) = &config.tracker.app_version {
            tracker.register_super_properties(
                &Properties::new().with(APP_VERSION_PROPERTY, app_version.as_str()),
            );
        }

        tracing::info!(
            consumer = ?config.consumer.kind,
            strict = config.tracker.strict,
            "Tracker created"
        );
        Ok(tracker)
    }

    /// Replace the clock used when events carry no `$time`.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Turn delivery failures into errors. Meant for integration testing.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Track an action of `distinct_id`.
    #[track_caller]
    pub fn track(
        &mut self,
        distinct_id: impl ToString,
        event_name: &str,
        properties: &Properties,
    ) -> Result<bool> {
        let distinct_id = distinct_id.to_string();
        self.send_event(EventRequest {
            update_type: UpdateType::Track,
            event_name: Some(event_name),
            distinct_id: &distinct_id,
            original_id: None,
            properties,
        })
    }

    /// Link the anonymous `original_id` to the signed-up `distinct_id`.
    #[track_caller]
    pub fn track_signup(
        &mut self,
        distinct_id: impl ToString,
        original_id: impl ToString,
        properties: &Properties,
    ) -> Result<bool> {
        let distinct_id = distinct_id.to_string();
        let original_id = original_id.to_string();
        self.send_event(EventRequest {
            update_type: UpdateType::TrackSignup,
            event_name: Some(SIGNUP_EVENT),
            distinct_id: &distinct_id,
            original_id: Some(&original_id),
            properties,
        })
    }

    /// Set profile properties, overwriting existing values.
    #[track_caller]
    pub fn profile_set(&mut self, distinct_id: impl ToString, profiles: &Properties) -> Result<bool> {
        self.send_profile(UpdateType::ProfileSet, distinct_id, profiles)
    }

    /// Set profile properties that are not set yet.
    #[track_caller]
    pub fn profile_set_once(
        &mut self,
        distinct_id: impl ToString,
        profiles: &Properties,
    ) -> Result<bool> {
        self.send_profile(UpdateType::ProfileSetOnce, distinct_id, profiles)
    }

    /// Add to numeric profile properties.
    #[track_caller]
    pub fn profile_increment(
        &mut self,
        distinct_id: impl ToString,
        profiles: &Properties,
    ) -> Result<bool> {
        self.send_profile(UpdateType::ProfileIncrement, distinct_id, profiles)
    }

    /// Append to list profile properties.
    #[track_caller]
    pub fn profile_append(
        &mut self,
        distinct_id: impl ToString,
        profiles: &Properties,
    ) -> Result<bool> {
        self.send_profile(UpdateType::ProfileAppend, distinct_id, profiles)
    }

    /// Remove profile properties. Plain key lists are sent as `key → true`.
    #[track_caller]
    pub fn profile_unset(
        &mut self,
        distinct_id: impl ToString,
        keys: impl Into<UnsetKeys>,
    ) -> Result<bool> {
        let profiles = keys.into().into_properties();
        self.send_profile(UpdateType::ProfileUnset, distinct_id, &profiles)
    }

    /// Delete the whole profile of `distinct_id`.
    #[track_caller]
    pub fn profile_delete(&mut self, distinct_id: impl ToString) -> Result<bool> {
        self.send_profile(UpdateType::ProfileDelete, distinct_id, &Properties::new())
    }

    /// Merge properties into every future `track`/`track_signup` event.
    pub fn register_super_properties(&mut self, properties: &Properties) {
        self.super_properties.register(properties);
    }

    /// Drop custom super properties, keeping only the library identity.
    pub fn clear_super_properties(&mut self) {
        self.super_properties.clear();
    }

    pub fn super_properties(&self) -> &SuperProperties {
        &self.super_properties
    }

    /// Deliver anything the consumer has buffered.
    pub fn flush(&mut self) -> Result<bool> {
        let delivered = self.consumer.flush();
        self.outcome(delivered, "flush")
    }

    /// Deliver anything buffered and release the consumer's resources.
    /// Call before the process exits.
    pub fn close(&mut self) -> Result<bool> {
        let delivered = self.consumer.close();
        tracing::info!(delivered, "Tracker closed");
        self.outcome(delivered, "close")
    }

    #[track_caller]
    fn send_profile(
        &mut self,
        update_type: UpdateType,
        distinct_id: impl ToString,
        profiles: &Properties,
    ) -> Result<bool> {
        let distinct_id = distinct_id.to_string();
        self.send_event(EventRequest {
            update_type,
            event_name: None,
            distinct_id: &distinct_id,
            original_id: None,
            properties: profiles,
        })
    }

    #[track_caller]
    fn send_event(&mut self, request: EventRequest<'_>) -> Result<bool> {
        let call_site = Location::caller();

        let envelope = normalize(
            &request,
            &self.super_properties,
            self.clock.now_millis(),
            Some(call_site),
        )
        .map_err(|e| {
            tracing::debug!(
                update_type = %request.update_type,
                error = %e,
                "Rejected event"
            );
            Error::Validation(e)
        })?;

        let payload = serialize(&envelope)?;
        let delivered = self.consumer.send(payload);
        self.outcome(delivered, request.update_type.as_str())
    }

    fn outcome(&self, delivered: bool, what: &str) -> Result<bool> {
        if !delivered && self.strict {
            return Err(Error::Delivery(format!("{} was not delivered", what)));
        }
        Ok(delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::error::ValidationErrorKind;
    use crate::types::PropertyValue;

    /// Keeps every payload in memory; fails when told to.
    #[derive(Clone, Default)]
    struct MemoryConsumer {
        sent: std::sync::Arc<std::sync::Mutex<Vec<String>>>,
        failing: bool,
    }

    impl Consumer for MemoryConsumer {
        fn send(&mut self, payload: String) -> bool {
            if self.failing {
                return false;
            }
            self.sent.lock().unwrap().push(payload);
            true
        }
    }

    fn tracker() -> (Tracker, MemoryConsumer) {
        let consumer = MemoryConsumer::default();
        let tracker = Tracker::new(consumer.clone()).with_clock(FixedClock(1437816376000));
        (tracker, consumer)
    }

    fn sent(consumer: &MemoryConsumer) -> Vec<serde_json::Value> {
        consumer
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(|p| serde_json::from_str(p).unwrap())
            .collect()
    }

    #[test]
    fn test_track_with_time() {
        let (mut tracker, consumer) = tracker();
        let props = Properties::new()
            .with("From", "Baidu")
            .with("$time", 1437816376000i64);

        assert!(tracker.track("1234", "Test", &props).unwrap());

        let events = sent(&consumer);
        let event = &events[0];
        assert_eq!(event["type"], "track");
        assert_eq!(event["event"], "Test");
        assert_eq!(event["distinct_id"], "1234");
        assert_eq!(event["time"], 1437816376000i64);
        assert_eq!(event["properties"]["From"], "Baidu");
        assert!(event["properties"].get("$time").is_none());
        assert_eq!(event["properties"]["$lib"], "rust");
    }

    #[test]
    fn test_numeric_distinct_id_and_seconds() {
        let (mut tracker, consumer) = tracker();
        let props = Properties::new().with("$time", 1437816376);

        tracker.track(1234, "Test", &props).unwrap();

        let events = sent(&consumer);
        let event = &events[0];
        assert_eq!(event["distinct_id"], "1234");
        assert_eq!(event["time"], 1437816376000i64);
    }

    #[test]
    fn test_lib_detail_points_at_caller() {
        let (mut tracker, consumer) = tracker();
        tracker.track("1234", "Test", &Properties::new()).unwrap();

        let detail = sent(&consumer)[0]["lib"]["$lib_detail"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(detail.contains("tracker.rs"), "{}", detail);
    }

    #[test]
    fn test_signup() {
        let (mut tracker, consumer) = tracker();
        tracker
            .track_signup("1234", "abcd", &Properties::new().with("Channel", "Hongbao"))
            .unwrap();

        let events = sent(&consumer);
        let event = &events[0];
        assert_eq!(event["type"], "track_signup");
        assert_eq!(event["event"], "$SignUp");
        assert_eq!(event["original_id"], "abcd");

        let err = tracker.track_signup("1234", "", &Properties::new()).unwrap_err();
        assert_eq!(err.validation_kind(), Some(ValidationErrorKind::EmptyOriginalId));
    }

    #[test]
    fn test_profile_unset_list_becomes_true_map() {
        let (mut tracker, consumer) = tracker();
        tracker.profile_unset("1234", vec!["City"]).unwrap();
        tracker
            .profile_unset("1234", Properties::new().with("Province", true))
            .unwrap();

        let events = sent(&consumer);
        assert_eq!(events[0]["type"], "profile_unset");
        assert_eq!(events[0]["properties"], serde_json::json!({"City": true}));
        assert_eq!(events[1]["properties"], serde_json::json!({"Province": true}));
    }

    #[test]
    fn test_profile_ops() {
        let (mut tracker, consumer) = tracker();
        tracker.register_super_properties(&Properties::new().with("Channel", "Ads"));

        tracker.profile_set("1234", &Properties::new().with("City", "北京")).unwrap();
        tracker
            .profile_set_once("1234", &Properties::new().with("First", "x"))
            .unwrap();
        tracker
            .profile_increment("1234", &Properties::new().with("CardNum", 1))
            .unwrap();
        tracker
            .profile_append("1234", &Properties::new().with("Tags", vec!["a"]))
            .unwrap();
        tracker.profile_delete("1234").unwrap();

        let events = sent(&consumer);
        let types: Vec<&str> = events.iter().map(|e| e["type"].as_str().unwrap()).collect();
        assert_eq!(
            types,
            vec![
                "profile_set",
                "profile_set_once",
                "profile_increment",
                "profile_append",
                "profile_delete"
            ]
        );
        assert_eq!(events[0]["properties"], serde_json::json!({"City": "北京"}));
        assert!(events.iter().all(|e| e.get("event").is_none()));
        assert_eq!(events[4]["properties"], serde_json::json!({}));
    }

    #[test]
    fn test_super_properties_register_and_clear() {
        let (mut tracker, consumer) = tracker();
        tracker.register_super_properties(
            &Properties::new().with("Channel", "Ads").with("$app_version", "2.3.1"),
        );
        tracker.track("1234", "Test", &Properties::new()).unwrap();

        tracker.clear_super_properties();
        tracker.track("1234", "Test", &Properties::new()).unwrap();

        let events = sent(&consumer);
        assert_eq!(events[0]["properties"]["Channel"], "Ads");
        assert_eq!(events[0]["lib"]["$app_version"], "2.3.1");
        assert!(events[1]["properties"].get("Channel").is_none());
        assert!(events[1]["lib"].get("$app_version").is_none());
        assert_eq!(tracker.super_properties(), &SuperProperties::new());
    }

    #[test]
    fn test_validation_error_sends_nothing() {
        let (mut tracker, consumer) = tracker();

        let err = tracker
            .track("1234", "Test", &Properties::new().with("$time", 1234))
            .unwrap_err();
        assert_eq!(err.validation_kind(), Some(ValidationErrorKind::InvalidTimestamp));

        let err = tracker.track("", "test", &Properties::new()).unwrap_err();
        assert_eq!(err.validation_kind(), Some(ValidationErrorKind::EmptyDistinctId));

        assert!(sent(&consumer).is_empty());
    }

    #[test]
    fn test_delivery_failure_is_false_unless_strict() {
        let consumer = MemoryConsumer {
            failing: true,
            ..Default::default()
        };
        let mut tracker = Tracker::new(consumer.clone());
        assert!(!tracker.track("1234", "Test", &Properties::new()).unwrap());

        let mut strict = Tracker::new(consumer).with_strict(true);
        let err = strict.track("1234", "Test", &Properties::new()).unwrap_err();
        assert!(matches!(err, Error::Delivery(_)));
    }

    #[test]
    fn test_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.log");
        let config: Config = toml::from_str(&format!(
            "[tracker]\napp_version = \"2.3.1\"\n\n[consumer]\nkind = \"file\"\nfile_path = {:?}\n",
            path.display().to_string()
        ))
        .unwrap();

        let mut tracker = Tracker::from_config(&config).unwrap();
        tracker.profile_set("1234", &Properties::new().with("City", "x")).unwrap();
        assert!(tracker.close().unwrap());

        let line: serde_json::Value =
            serde_json::from_str(std::fs::read_to_string(&path).unwrap().trim()).unwrap();
        assert_eq!(line["lib"]["$app_version"], "2.3.1");
        assert!(line["properties"].get("$app_version").is_none());
    }

    #[test]
    fn test_unset_keys_from_slice() {
        let keys: &[&str] = &["A", "B"];
        let props = UnsetKeys::from(keys).into_properties();
        assert_eq!(props.get("B"), Some(&PropertyValue::Bool(true)));
        assert_eq!(props.len(), 2);
    }
}
