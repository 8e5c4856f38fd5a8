//! Shared playback manifest and its per-session store

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The shared playback state broadcast to every participant of a session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Playhead position in seconds
    #[serde(default)]
    pub current_time: f64,

    /// Whether the room is currently playing
    #[serde(default)]
    pub is_playing: bool,

    /// Opaque selection chosen by a participant (a movie, track, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_item: Option<Value>,

    /// Opaque description of the participant currently driving playback
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_driver: Option<Value>,

    /// Participant that issued the most recent state-changing command
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,
}

impl Manifest {
    /// Participant id named by `current_driver`, if it names one
    pub fn current_driver_id(&self) -> Option<&str> {
        self.current_driver.as_ref().and_then(driver_id_of)
    }
}

/// Extract a participant id from an opaque driver value.
///
/// Clients send either the bare id or an object carrying a `userid` field.
pub fn driver_id_of(value: &Value) -> Option<&str> {
    match value {
        Value::String(id) => Some(id.as_str()),
        Value::Object(map) => map.get("userid").and_then(Value::as_str),
        _ => None,
    }
}

/// Holds the current manifest of one session.
///
/// Writes replace the whole value; callers apply the fields relevant to an
/// event to a copy obtained from [`ManifestStore::get_or_create`] and then
/// persist it with [`ManifestStore::set`].
#[derive(Debug, Default)]
pub struct ManifestStore {
    manifest: Option<Manifest>,
}

impl ManifestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the stored manifest, installing the zero-value default if absent
    pub fn get_or_create(&mut self) -> Manifest {
        self.manifest.get_or_insert_with(Manifest::default).clone()
    }

    /// Replace the stored manifest (last writer wins)
    pub fn set(&mut self, manifest: Manifest) {
        self.manifest = Some(manifest);
    }

    /// Borrow the stored manifest without creating one
    pub fn current(&self) -> Option<&Manifest> {
        self.manifest.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_or_create_installs_default() {
        let mut store = ManifestStore::new();
        assert!(store.current().is_none());

        let manifest = store.get_or_create();
        assert_eq!(manifest.current_time, 0.0);
        assert!(!manifest.is_playing);
        assert!(manifest.selected_item.is_none());
        assert!(manifest.current_driver.is_none());
        assert!(manifest.controller.is_none());
        assert!(store.current().is_some());
    }

    #[test]
    fn test_set_replaces_whole_value() {
        let mut store = ManifestStore::new();
        let mut manifest = store.get_or_create();
        manifest.is_playing = true;
        manifest.selected_item = Some(json!("movie42"));
        store.set(manifest);

        store.set(Manifest {
            current_time: 12.5,
            ..Manifest::default()
        });

        let stored = store.current().unwrap();
        assert_eq!(stored.current_time, 12.5);
        assert!(!stored.is_playing);
        assert!(stored.selected_item.is_none());
    }

    #[test]
    fn test_manifest_wire_format_omits_absent_fields() {
        let json = serde_json::to_value(Manifest::default()).unwrap();
        assert_eq!(json, json!({"currentTime": 0.0, "isPlaying": false}));

        let manifest = Manifest {
            current_time: 3.0,
            is_playing: true,
            selected_item: Some(json!({"id": 7})),
            current_driver: Some(json!("alice")),
            controller: Some("alice".into()),
        };
        let json = serde_json::to_value(&manifest).unwrap();
        assert_eq!(json["selectedItem"]["id"], 7);
        assert_eq!(json["currentDriver"], "alice");
        assert_eq!(json["controller"], "alice");
    }

    #[test]
    fn test_driver_id_of() {
        assert_eq!(driver_id_of(&json!("bob")), Some("bob"));
        assert_eq!(
            driver_id_of(&json!({"userid": "carol", "name": "Carol"})),
            Some("carol")
        );
        assert_eq!(driver_id_of(&json!({"name": "nobody"})), None);
        assert_eq!(driver_id_of(&json!(17)), None);
    }
}
