//! Named, ordered action sequences with loop and hotkey metadata

use crate::action::{sanitize_ms, Action, ActionKind};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A recorded or hand-edited macro.
///
/// The first action never waits: setup time before the first real gesture
/// must not leak into playback. Every mutator re-establishes that and
/// refreshes `updated_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "MacroRecord")]
pub struct Macro {
    id: String,
    name: String,
    #[serde(serialize_with = "hotkey_to_wire")]
    hotkey: Option<String>,
    actions: Vec<Action>,
    /// 0 = repeat until stopped
    loop_count: u32,
    /// Milliseconds between iterations
    loop_delay: f64,
    enabled: bool,
    created_at: f64,
    updated_at: f64,
}

/// Wire shape of a macro; every field may be missing
#[derive(Deserialize)]
struct MacroRecord {
    #[serde(default = "new_id")]
    id: String,
    #[serde(default = "default_name")]
    name: String,
    #[serde(default, deserialize_with = "hotkey_from_wire")]
    hotkey: Option<String>,
    #[serde(default)]
    actions: Vec<Action>,
    #[serde(default = "default_loop_count")]
    loop_count: u32,
    #[serde(default)]
    loop_delay: f64,
    #[serde(default = "default_enabled")]
    enabled: bool,
    #[serde(default = "now_secs")]
    created_at: f64,
    #[serde(default = "now_secs")]
    updated_at: f64,
}

impl From<MacroRecord> for Macro {
    fn from(r: MacroRecord) -> Self {
        let mut m = Self {
            id: r.id,
            name: r.name,
            hotkey: r.hotkey,
            actions: r.actions,
            loop_count: r.loop_count,
            loop_delay: r.loop_delay,
            enabled: r.enabled,
            created_at: r.created_at,
            updated_at: r.updated_at,
        };
        m.normalize();
        m
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn default_name() -> String {
    "New Macro".to_string()
}

fn default_loop_count() -> u32 {
    1
}

fn default_enabled() -> bool {
    true
}

/// Current UNIX time in fractional seconds
pub fn now_secs() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

fn hotkey_to_wire<S: Serializer>(hotkey: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(hotkey.as_deref().unwrap_or(""))
}

fn hotkey_from_wire<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let raw: Option<String> = Option::deserialize(d)?;
    Ok(raw.filter(|s| !s.trim().is_empty()))
}

impl Macro {
    pub fn new(name: impl Into<String>) -> Self {
        let now = now_secs();
        Self {
            id: new_id(),
            name: name.into(),
            hotkey: None,
            actions: Vec::new(),
            loop_count: default_loop_count(),
            loop_delay: 0.0,
            enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Build a macro from a finished recording
    pub fn from_recording(name: impl Into<String>, actions: Vec<Action>) -> Self {
        let mut m = Self::new(name);
        m.actions = actions;
        m.normalize();
        m
    }

    /// Deep copy with a fresh id and fresh timestamps
    pub fn duplicate(&self) -> Self {
        let now = now_secs();
        Self {
            id: new_id(),
            name: format!("{} (copy)", self.name),
            created_at: now,
            updated_at: now,
            ..self.clone()
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hotkey(&self) -> Option<&str> {
        self.hotkey.as_deref()
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn loop_count(&self) -> u32 {
        self.loop_count
    }

    pub fn loop_delay(&self) -> f64 {
        self.loop_delay
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn created_at(&self) -> f64 {
        self.created_at
    }

    pub fn updated_at(&self) -> f64 {
        self.updated_at
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.touch();
    }

    pub fn set_hotkey(&mut self, hotkey: Option<String>) {
        self.hotkey = hotkey.filter(|h| !h.trim().is_empty());
        self.touch();
    }

    pub fn set_loop_count(&mut self, loop_count: u32) {
        self.loop_count = loop_count;
        self.touch();
    }

    pub fn set_loop_delay(&mut self, loop_delay: f64) {
        self.loop_delay = sanitize_ms(loop_delay);
        self.touch();
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.touch();
    }

    pub fn add_action(&mut self, action: Action) {
        self.actions.push(action);
        self.touch();
    }

    /// Insert at `index`, clamped to the end of the list
    pub fn insert_action(&mut self, index: usize, action: Action) {
        let index = index.min(self.actions.len());
        self.actions.insert(index, action);
        self.touch();
    }

    pub fn remove_action(&mut self, index: usize) -> Option<Action> {
        if index >= self.actions.len() {
            return None;
        }
        let removed = self.actions.remove(index);
        self.touch();
        Some(removed)
    }

    pub fn move_action(&mut self, from: usize, to: usize) -> bool {
        let len = self.actions.len();
        if from >= len || to >= len {
            return false;
        }
        let action = self.actions.remove(from);
        self.actions.insert(to, action);
        self.touch();
        true
    }

    pub fn replace_action(&mut self, index: usize, action: Action) -> bool {
        let Some(slot) = self.actions.get_mut(index) else {
            return false;
        };
        *slot = action;
        self.touch();
        true
    }

    pub fn set_actions(&mut self, actions: Vec<Action>) {
        self.actions = actions;
        self.touch();
    }

    /// Estimated wall-clock length of one iteration in milliseconds
    pub fn total_duration_ms(&self) -> f64 {
        self.actions
            .iter()
            .map(|a| {
                let own = match a.kind {
                    ActionKind::Delay { ms } => ms,
                    _ => 0.0,
                };
                a.delay_before + own
            })
            .sum()
    }

    /// Zero the first delay and clamp the loop delay
    pub fn normalize(&mut self) {
        self.loop_delay = sanitize_ms(self.loop_delay);
        if let Some(first) = self.actions.first_mut() {
            first.delay_before = 0.0;
        }
    }

    fn touch(&mut self) {
        self.normalize();
        self.updated_at = now_secs().max(self.updated_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Macro {
        Macro::from_recording(
            "sample",
            vec![
                Action::key_press("a").with_delay(250.0),
                Action::delay(100.0),
                Action::click(50, 50, "left").with_delay(50.0),
            ],
        )
    }

    #[test]
    fn recording_drops_lead_time() {
        let m = sample();
        assert_eq!(m.actions()[0].delay_before, 0.0);
        assert_eq!(m.actions()[2].delay_before, 50.0);
    }

    #[test]
    fn removing_first_action_keeps_invariant() {
        let mut m = sample();
        m.remove_action(0);
        assert_eq!(m.actions()[0].delay_before, 0.0);
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn moving_an_action_to_the_front_zeroes_its_delay() {
        let mut m = sample();
        assert!(m.move_action(2, 0));
        assert_eq!(m.actions()[0].delay_before, 0.0);
        assert!(!m.move_action(0, 9));
    }

    #[test]
    fn mutations_refresh_updated_at() {
        let mut m = sample();
        m.updated_at = 0.0;
        m.add_action(Action::scroll(0, 1));
        assert!(m.updated_at() > 0.0);

        m.updated_at = 0.0;
        m.set_name("renamed");
        assert!(m.updated_at() > 0.0);

        m.updated_at = 0.0;
        assert!(m.remove_action(99).is_none());
        assert_eq!(m.updated_at(), 0.0);
    }

    #[test]
    fn duplicate_is_independent() {
        let original = sample();
        let mut copy = original.duplicate();
        assert_ne!(copy.id(), original.id());
        assert_eq!(copy.name(), "sample (copy)");
        assert_eq!(copy.actions(), original.actions());

        copy.add_action(Action::delay(5.0));
        assert_eq!(original.len(), 3);
        assert_eq!(copy.len(), 4);
    }

    #[test]
    fn total_duration_counts_delays_and_waits() {
        assert_eq!(sample().total_duration_ms(), 150.0);
    }

    #[test]
    fn wire_format_round_trip() {
        let mut m = sample();
        m.set_hotkey(Some("ctrl+shift+1".into()));
        m.set_loop_count(0);
        m.created_at = 1_700_000_000.5;
        m.updated_at = 1_700_000_100.25;
        let v = serde_json::to_value(&m).unwrap();
        for key in [
            "id",
            "name",
            "hotkey",
            "actions",
            "loop_count",
            "loop_delay",
            "enabled",
            "created_at",
            "updated_at",
        ] {
            assert!(v.get(key).is_some(), "missing {}", key);
        }
        let back: Macro = serde_json::from_value(v).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn empty_hotkey_is_none() {
        let m: Macro = serde_json::from_value(json!({"name": "x", "hotkey": ""})).unwrap();
        assert_eq!(m.hotkey(), None);
        assert_eq!(m.loop_count(), 1);
        assert!(m.enabled());
        assert_eq!(serde_json::to_value(&m).unwrap()["hotkey"], "");
    }

    #[test]
    fn decoding_zeroes_first_delay() {
        let m: Macro = serde_json::from_value(json!({
            "name": "late start",
            "actions": [
                {"action_type": "key_press", "data": {"key": "a"}, "delay_before": 500.0},
                {"action_type": "key_release", "data": {"key": "a"}, "delay_before": 40.0}
            ],
            "loop_delay": -5.0
        }))
        .unwrap();
        assert_eq!(m.actions()[0].delay_before, 0.0);
        assert_eq!(m.actions()[1].delay_before, 40.0);
        assert_eq!(m.loop_delay(), 0.0);
    }
}
