//! Global hotkey bindings
//!
//! The manager does not hook the keyboard itself. It is fed raw key events
//! (usually by [`MacroEngine`](crate::engine::MacroEngine)), tracks which
//! keys are held, and fires a binding on the key-down that completes its
//! combo.

use crate::events::{RawEvent, RawEventKind};
use macrowing_core::{Error, Key, NamedKey, Result};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Reserved binding id for the panic key
pub const PANIC_ID: &str = "__panic";

const MODIFIER_ORDER: [NamedKey; 4] = [
    NamedKey::Ctrl,
    NamedKey::Alt,
    NamedKey::Shift,
    NamedKey::Cmd,
];

/// Chars compare case-insensitively
fn normalize(key: Key) -> Key {
    match key {
        Key::Char(c) => Key::Char(c.to_lowercase().next().unwrap_or(c)),
        named => named,
    }
}

/// A normalized key combination such as `ctrl+shift+1`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HotkeyCombo {
    /// Generic modifiers in canonical order
    modifiers: Vec<NamedKey>,
    key: Key,
}

impl HotkeyCombo {
    pub fn parse(s: &str) -> Result<Self> {
        let compact: String = s
            .chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect();

        let mut held = HashSet::new();
        let mut key = None;
        for part in compact.split('+') {
            if part.is_empty() {
                return Err(Error::invalid_format(format!("Empty key in hotkey '{}'", s)));
            }
            let parsed = Key::parse(part)?;
            match parsed.modifier() {
                Some(m) => {
                    held.insert(m);
                }
                None if key.is_some() => {
                    return Err(Error::invalid_format(format!(
                        "Hotkey '{}' has more than one non-modifier key",
                        s
                    )));
                }
                None => key = Some(normalize(parsed)),
            }
        }

        let key = key.ok_or_else(|| {
            Error::invalid_format(format!("Hotkey '{}' needs a non-modifier key", s))
                .with_suggestions(vec!["e.g. ctrl+shift+1 or f9".to_string()])
        })?;
        let modifiers = MODIFIER_ORDER
            .iter()
            .copied()
            .filter(|m| held.contains(m))
            .collect();
        Ok(Self { modifiers, key })
    }

    pub fn key(&self) -> Key {
        self.key
    }

    pub fn modifiers(&self) -> &[NamedKey] {
        &self.modifiers
    }

    /// Lowercase form, e.g. `ctrl+shift+1`
    pub fn normalized(&self) -> String {
        let mut parts: Vec<String> = self.modifiers.iter().map(|m| m.name()).collect();
        parts.push(self.key.to_string());
        parts.join("+")
    }

    fn matches(&self, key: Key, modifiers: &HashSet<NamedKey>) -> bool {
        self.key == key
            && self.modifiers.len() == modifiers.len()
            && self.modifiers.iter().all(|m| modifiers.contains(m))
    }
}

fn title(part: &str) -> String {
    part.split('_')
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect()
}

impl fmt::Display for HotkeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.normalized().split('+').map(title).collect();
        f.write_str(&parts.join("+"))
    }
}

impl std::str::FromStr for HotkeyCombo {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

pub type HotkeyCallback = Arc<dyn Fn() + Send + Sync>;

/// Snapshot of one binding
#[derive(Debug, Clone, PartialEq)]
pub struct BindingInfo {
    pub id: String,
    pub combo: HotkeyCombo,
    pub description: String,
    pub enabled: bool,
}

struct Binding {
    id: String,
    combo: HotkeyCombo,
    callback: HotkeyCallback,
    description: String,
    enabled: bool,
}

#[derive(Default)]
struct Inner {
    bindings: Vec<Binding>,
    /// Physical modifier keys, so left and right are tracked apart
    held_modifier_keys: HashSet<Key>,
    held_keys: HashSet<Key>,
}

#[derive(Default)]
pub struct HotkeyManager {
    inner: Mutex<Inner>,
}

impl HotkeyManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `combo` to `callback` under `id`. Re-binding an id replaces it.
    ///
    /// Returns false if the combo does not parse or is held by another id.
    pub fn bind(
        &self,
        id: &str,
        combo: &str,
        callback: impl Fn() + Send + Sync + 'static,
        description: &str,
    ) -> bool {
        let combo = match HotkeyCombo::parse(combo) {
            Ok(c) => c,
            Err(e) => {
                warn!("Cannot bind '{}' for {}: {}", combo, id, e);
                return false;
            }
        };

        let mut inner = self.inner.lock();
        if let Some(other) = inner
            .bindings
            .iter()
            .find(|b| b.combo == combo && b.id != id)
        {
            warn!("Hotkey {} already bound to {}", combo, other.id);
            return false;
        }

        let binding = Binding {
            id: id.to_string(),
            combo,
            callback: Arc::new(callback),
            description: description.to_string(),
            enabled: true,
        };
        info!("Bound {} to {}", binding.combo, id);
        match inner.bindings.iter_mut().find(|b| b.id == id) {
            Some(existing) => *existing = binding,
            None => inner.bindings.push(binding),
        }
        true
    }

    pub fn unbind(&self, id: &str) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.bindings.len();
        inner.bindings.retain(|b| b.id != id);
        let removed = inner.bindings.len() != before;
        if removed {
            debug!("Unbound {}", id);
        }
        removed
    }

    pub fn unbind_all(&self) {
        let mut inner = self.inner.lock();
        inner.bindings.clear();
        debug!("Unbound all hotkeys");
    }

    pub fn enable(&self, id: &str) -> bool {
        self.set_enabled(id, true)
    }

    /// Keeps the binding but stops it firing
    pub fn disable(&self, id: &str) -> bool {
        self.set_enabled(id, false)
    }

    fn set_enabled(&self, id: &str, enabled: bool) -> bool {
        let mut inner = self.inner.lock();
        match inner.bindings.iter_mut().find(|b| b.id == id) {
            Some(b) => {
                b.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// True if `combo` parses and nobody holds it
    pub fn is_available(&self, combo: &str) -> bool {
        match HotkeyCombo::parse(combo) {
            Ok(combo) => !self.inner.lock().bindings.iter().any(|b| b.combo == combo),
            Err(_) => false,
        }
    }

    pub fn bindings(&self) -> Vec<BindingInfo> {
        self.inner
            .lock()
            .bindings
            .iter()
            .map(|b| BindingInfo {
                id: b.id.clone(),
                combo: b.combo.clone(),
                description: b.description.clone(),
                enabled: b.enabled,
            })
            .collect()
    }

    /// Bind the reserved panic id
    pub fn set_panic(&self, combo: &str, callback: impl Fn() + Send + Sync + 'static) -> bool {
        self.bind(PANIC_ID, combo, callback, "Stop all macros")
    }

    pub fn on_raw_event(&self, event: &RawEvent) {
        let fired: Vec<(String, HotkeyCallback)> = {
            let mut inner = self.inner.lock();
            match &event.kind {
                RawEventKind::KeyDown { key } => {
                    if key.modifier().is_some() {
                        inner.held_modifier_keys.insert(*key);
                        return;
                    }
                    let key = normalize(*key);
                    // Auto-repeat
                    if !inner.held_keys.insert(key) {
                        return;
                    }
                    let held: HashSet<NamedKey> = inner
                        .held_modifier_keys
                        .iter()
                        .filter_map(|k| k.modifier())
                        .collect();
                    inner
                        .bindings
                        .iter()
                        .filter(|b| b.enabled && b.combo.matches(key, &held))
                        .map(|b| (b.id.clone(), b.callback.clone()))
                        .collect()
                }
                RawEventKind::KeyUp { key } => {
                    if key.modifier().is_some() {
                        inner.held_modifier_keys.remove(key);
                    } else {
                        inner.held_keys.remove(&normalize(*key));
                    }
                    return;
                }
                _ => return,
            }
        };

        for (id, callback) in fired {
            debug!("Hotkey fired for {}", id);
            callback();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn down(name: &str) -> RawEvent {
        RawEvent::new(RawEventKind::KeyDown {
            key: Key::parse(name).unwrap(),
        })
    }

    fn up(name: &str) -> RawEvent {
        RawEvent::new(RawEventKind::KeyUp {
            key: Key::parse(name).unwrap(),
        })
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        (hits, move || {
            h.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn combos_normalize() {
        let combo = HotkeyCombo::parse("Shift + Ctrl + 1").unwrap();
        assert_eq!(combo.normalized(), "ctrl+shift+1");
        assert_eq!(combo.to_string(), "Ctrl+Shift+1");

        let combo = HotkeyCombo::parse("control+option+page_down").unwrap();
        assert_eq!(combo.normalized(), "ctrl+alt+page_down");
        assert_eq!(combo.to_string(), "Ctrl+Alt+PageDown");

        assert_eq!(
            HotkeyCombo::parse("ctrl_l+A").unwrap(),
            HotkeyCombo::parse("ctrl+a").unwrap()
        );
        assert_eq!(HotkeyCombo::parse("escape").unwrap().normalized(), "esc");
    }

    #[test]
    fn bad_combos() {
        assert!(HotkeyCombo::parse("").is_err());
        assert!(HotkeyCombo::parse("ctrl+shift").is_err());
        assert!(HotkeyCombo::parse("a+b").is_err());
        assert!(HotkeyCombo::parse("ctrl+hyper").is_err());
    }

    #[test]
    fn fires_on_completing_key_down() {
        let mgr = HotkeyManager::new();
        let (hits, cb) = counter();
        assert!(mgr.bind("m1", "ctrl+shift+1", cb, "macro one"));

        mgr.on_raw_event(&down("ctrl_l"));
        mgr.on_raw_event(&down("1"));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        mgr.on_raw_event(&up("1"));

        mgr.on_raw_event(&down("shift_r"));
        mgr.on_raw_event(&down("1"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // Held key repeating does not refire
        mgr.on_raw_event(&down("1"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        mgr.on_raw_event(&up("1"));
        mgr.on_raw_event(&down("1"));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn extra_modifiers_do_not_match() {
        let mgr = HotkeyManager::new();
        let (hits, cb) = counter();
        mgr.bind("m1", "ctrl+a", cb, "");
        mgr.on_raw_event(&down("ctrl"));
        mgr.on_raw_event(&down("alt"));
        mgr.on_raw_event(&down("a"));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn conflicting_combo_is_refused() {
        let mgr = HotkeyManager::new();
        assert!(mgr.bind("a", "f9", || {}, ""));
        assert!(!mgr.bind("b", "F9", || {}, ""));
        assert!(!mgr.is_available("f9"));
        assert!(mgr.is_available("f10"));
        assert!(!mgr.is_available("not+a+combo"));

        // Same id may rebind, including to the same combo
        assert!(mgr.bind("a", "f9", || {}, "again"));
        assert!(mgr.bind("a", "f10", || {}, ""));
        assert!(mgr.is_available("f9"));
        assert_eq!(mgr.bindings().len(), 1);
    }

    #[test]
    fn unparsable_combo_is_refused() {
        let mgr = HotkeyManager::new();
        assert!(!mgr.bind("a", "ctrl+", || {}, ""));
        assert!(mgr.bindings().is_empty());
    }

    #[test]
    fn disabled_bindings_stay_silent() {
        let mgr = HotkeyManager::new();
        let (hits, cb) = counter();
        mgr.bind("m1", "f2", cb, "");
        assert!(mgr.disable("m1"));
        mgr.on_raw_event(&down("f2"));
        mgr.on_raw_event(&up("f2"));
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        assert!(mgr.enable("m1"));
        mgr.on_raw_event(&down("f2"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!mgr.enable("missing"));
    }

    #[test]
    fn unbind_and_panic() {
        let mgr = HotkeyManager::new();
        let (hits, cb) = counter();
        assert!(mgr.set_panic("escape", cb));
        assert_eq!(mgr.bindings()[0].id, PANIC_ID);

        mgr.on_raw_event(&down("esc"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert!(mgr.unbind(PANIC_ID));
        assert!(!mgr.unbind(PANIC_ID));
        mgr.bind("x", "f1", || {}, "");
        mgr.unbind_all();
        assert!(mgr.bindings().is_empty());
    }

    #[test]
    fn callbacks_may_rebind() {
        let mgr = Arc::new(HotkeyManager::new());
        let weak = Arc::downgrade(&mgr);
        mgr.bind(
            "self",
            "f3",
            move || {
                if let Some(m) = weak.upgrade() {
                    m.unbind("self");
                }
            },
            "",
        );
        mgr.on_raw_event(&down("f3"));
        assert!(mgr.bindings().is_empty());
    }

    #[test]
    fn releasing_one_side_keeps_the_other_modifier() {
        let mgr = HotkeyManager::new();
        let (hits, cb) = counter();
        assert!(mgr.bind("m", "ctrl+f4", cb, ""));

        mgr.on_raw_event(&down("ctrl_l"));
        mgr.on_raw_event(&down("ctrl_r"));
        mgr.on_raw_event(&up("ctrl_r"));
        mgr.on_raw_event(&down("f4"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        mgr.on_raw_event(&up("f4"));
        mgr.on_raw_event(&up("ctrl_l"));
        mgr.on_raw_event(&down("f4"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
