//! Event normalization
//!
//! Turns one tracker call into an [`Envelope`]: merges super properties,
//! pulls the event time out of `$time`, stamps library metadata, and runs the
//! validator. Nothing is returned unless every check passes.

use std::panic::Location;

use crate::error::{ValidationError, ValidationErrorKind};
use crate::super_props::SuperProperties;
use crate::types::{Envelope, LibProperties, Properties, PropertyValue, UpdateType};
use crate::validate;

/// Library name sent as `$lib`
pub const LIB_NAME: &str = "rust";

/// Library version sent as `$lib_version`
pub const LIB_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Property callers set to override the event time
pub const TIME_PROPERTY: &str = "$time";

/// Property read from super properties into `lib.$app_version`
pub const APP_VERSION_PROPERTY: &str = "$app_version";

/// One tracker call, before normalization.
#[derive(Debug, Clone)]
pub struct EventRequest<'a> {
    pub update_type: UpdateType,
    pub event_name: Option<&'a str>,
    pub distinct_id: &'a str,
    pub original_id: Option<&'a str>,
    pub properties: &'a Properties,
}

/// Build a validated envelope.
///
/// For `track` and `track_signup`, `super_properties` are merged first and
/// `request.properties` win on key collisions. Profile updates carry only
/// `request.properties`; their super properties still supply `$app_version`.
/// `now_millis` is used when no `$time` property is given.
/// `call_site` feeds the diagnostic `$lib_detail` field.
pub fn normalize(
    request: &EventRequest<'_>,
    super_properties: &SuperProperties,
    now_millis: i64,
    call_site: Option<&Location<'_>>,
) -> Result<Envelope, ValidationError> {
    if request.update_type == UpdateType::TrackSignup {
        validate::validate_original_id(request.original_id.unwrap_or_default())?;
    }

    validate::validate_distinct_id(request.distinct_id)?;

    let mut merged = if request.update_type.has_event_name() {
        let mut merged = super_properties.properties().clone();
        merged.merge(request.properties);
        merged
    } else {
        request.properties.clone()
    };

    let time = match merged.remove(TIME_PROPERTY) {
        Some(raw) => normalize_time(&raw)?,
        None => now_millis,
    };

    let event = request
        .update_type
        .has_event_name()
        .then(|| request.event_name.unwrap_or_default().to_string());
    let original_id = (request.update_type == UpdateType::TrackSignup)
        .then(|| request.original_id.unwrap_or_default().to_string());

    let properties = validate::validate(request.distinct_id, event.as_deref(), &merged)?;

    Ok(Envelope {
        update_type: request.update_type,
        event,
        original_id,
        distinct_id: request.distinct_id.to_string(),
        time,
        properties,
        lib: lib_properties(super_properties, call_site),
    })
}

/// Convert a `$time` value to epoch milliseconds.
///
/// Integers with 10 digits are seconds and get scaled; 11 to 13 digits are
/// taken as milliseconds. Digit strings are parsed, floats are truncated.
pub fn normalize_time(raw: &PropertyValue) -> Result<i64, ValidationError> {
    let ts = match raw {
        PropertyValue::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        PropertyValue::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
    .filter(|ts| *ts > 0)
    .ok_or_else(|| invalid_timestamp(raw))?;

    match ts.to_string().len() {
        10 => Ok(ts * 1000),
        11..=13 => Ok(ts),
        _ => Err(invalid_timestamp(raw)),
    }
}

fn invalid_timestamp(raw: &PropertyValue) -> ValidationError {
    ValidationError::new(
        ValidationErrorKind::InvalidTimestamp,
        format!(
            "property [time] must be a timestamp in milliseconds. [value={:?}]",
            raw
        ),
    )
}

/// Library metadata for an envelope.
pub fn lib_properties(
    super_properties: &SuperProperties,
    call_site: Option<&Location<'_>>,
) -> LibProperties {
    let app_version = match super_properties.get(APP_VERSION_PROPERTY) {
        Some(PropertyValue::String(v)) => Some(v.clone()),
        Some(PropertyValue::Number(n)) => Some(n.to_string()),
        _ => None,
    };

    LibProperties {
        lib: LIB_NAME.to_string(),
        lib_version: LIB_VERSION.to_string(),
        lib_method: "code".to_string(),
        app_version,
        lib_detail: call_site.map(|loc| format!("####{}##{}", loc.file(), loc.line())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000_123;

    fn track<'a>(distinct_id: &'a str, event: &'a str, props: &'a Properties) -> EventRequest<'a> {
        EventRequest {
            update_type: UpdateType::Track,
            event_name: Some(event),
            distinct_id,
            original_id: None,
            properties: props,
        }
    }

    #[test]
    fn test_time_extracted_from_properties() {
        let props = Properties::new()
            .with("From", "Baidu")
            .with("$time", 1437816376000i64);
        let env = normalize(&track("1234", "Test", &props), &SuperProperties::new(), NOW, None)
            .unwrap();

        assert_eq!(env.time, 1437816376000);
        assert!(!env.properties.contains_key("$time"));
        assert_eq!(env.properties["From"], "Baidu");
        assert_eq!(env.event.as_deref(), Some("Test"));
        assert!(env.original_id.is_none());
    }

    #[test]
    fn test_time_defaults_to_now() {
        let props = Properties::new();
        let env = normalize(&track("1234", "Test", &props), &SuperProperties::new(), NOW, None)
            .unwrap();
        assert_eq!(env.time, NOW);
    }

    #[test]
    fn test_time_digit_counts() {
        assert_eq!(normalize_time(&1437816376i64.into()).unwrap(), 1437816376000);
        assert_eq!(normalize_time(&1437816376000i64.into()).unwrap(), 1437816376000);
        assert_eq!(normalize_time(&"1437816376".into()).unwrap(), 1437816376000);
        assert_eq!(normalize_time(&"1437816376000".into()).unwrap(), 1437816376000);
        assert_eq!(normalize_time(&1437816376.9f64.into()).unwrap(), 1437816376000);

        for bad in [
            PropertyValue::from(1234),
            PropertyValue::from(143781637i64),
            PropertyValue::from(14378163760000i64),
            PropertyValue::from(-1437816376i64),
            PropertyValue::from("soon"),
            PropertyValue::Bool(true),
            PropertyValue::Null,
        ] {
            assert_eq!(
                normalize_time(&bad).unwrap_err().kind,
                ValidationErrorKind::InvalidTimestamp,
                "{:?}",
                bad
            );
        }
    }

    #[test]
    fn test_super_properties_merged_under_call() {
        let mut supers = SuperProperties::new();
        supers.register(&Properties::new().with("From", "Super").with("Channel", "Ads"));
        let props = Properties::new().with("From", "Baidu");

        let env = normalize(&track("1234", "Test", &props), &supers, NOW, None).unwrap();

        assert_eq!(env.properties["From"], "Baidu");
        assert_eq!(env.properties["Channel"], "Ads");
        assert_eq!(env.properties["$lib"], LIB_NAME);
    }

    #[test]
    fn test_signup_requires_original_id() {
        let props = Properties::new();
        let mut req = EventRequest {
            update_type: UpdateType::TrackSignup,
            event_name: Some("$SignUp"),
            distinct_id: "1234",
            original_id: None,
            properties: &props,
        };
        let err = normalize(&req, &SuperProperties::new(), NOW, None).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::EmptyOriginalId);

        req.original_id = Some("abcd");
        let env = normalize(&req, &SuperProperties::new(), NOW, None).unwrap();
        assert_eq!(env.original_id.as_deref(), Some("abcd"));
        assert_eq!(env.event.as_deref(), Some("$SignUp"));
    }

    #[test]
    fn test_profile_envelope_has_no_event() {
        let props = Properties::new().with("City", "北京");
        let req = EventRequest {
            update_type: UpdateType::ProfileSet,
            event_name: None,
            distinct_id: "1234",
            original_id: None,
            properties: &props,
        };
        let mut supers = SuperProperties::new();
        supers.register(&Properties::new().with("$app_version", "2.3.1"));

        let env = normalize(&req, &supers, NOW, None).unwrap();
        assert!(env.event.is_none());
        assert_eq!(env.properties.len(), 1);
        assert!(!env.properties.contains_key("$lib"));
        assert_eq!(env.lib.app_version.as_deref(), Some("2.3.1"));
    }

    #[test]
    fn test_lib_properties() {
        let mut supers = SuperProperties::new();
        supers.register(&Properties::new().with("$app_version", "2.3.1"));

        let lib = lib_properties(&supers, Some(Location::caller()));
        assert_eq!(lib.lib, "rust");
        assert_eq!(lib.lib_method, "code");
        assert_eq!(lib.app_version.as_deref(), Some("2.3.1"));
        assert!(lib.lib_detail.unwrap().starts_with("####"));

        assert!(lib_properties(&SuperProperties::new(), None).app_version.is_none());
    }

    #[test]
    fn test_invalid_input_produces_no_envelope() {
        let props = Properties::new().with("time", 1);
        let err = normalize(&track("1234", "Test", &props), &SuperProperties::new(), NOW, None)
            .unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::InvalidPropertyKey);
    }
}
