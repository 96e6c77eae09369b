//! Keyboard shortcuts for tab management.
//!
//! The dispatcher holds only a chord-to-action table and a resolver picking the window a shortcut
//! applies to. Resolved shortcuts become [`TabCommand`]s executed by the session context.
//!
//! Browsers and host platforms reserve some chords (`Ctrl+Tab`, `Ctrl+W`); the `Alt` variants
//! are bound alongside them for that reason.

use std::{collections::BTreeMap, fmt};

use crate::{model::WindowId, tab_strip::TabCommand, window_registry::WindowRegistry};

/// Normalized key plus modifier state.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyChord {
    /// Lowercase key name (`"t"`, `"tab"`, `"1"`, `"]"`).
    pub key: String,
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
}

impl KeyChord {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_ascii_lowercase(),
            ctrl: false,
            alt: false,
            shift: false,
            meta: false,
        }
    }

    pub fn ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn alt(mut self) -> Self {
        self.alt = true;
        self
    }

    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn meta(mut self) -> Self {
        self.meta = true;
        self
    }

    /// Parses `"Ctrl+Shift+Tab"`-style chord strings. Returns `None` without exactly one
    /// non-modifier key.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut chord = Self::new("");
        let mut key = None;
        for part in raw.split('+').map(str::trim) {
            match part.to_ascii_lowercase().as_str() {
                "" => return None,
                "ctrl" | "control" => chord.ctrl = true,
                "alt" | "option" => chord.alt = true,
                "shift" => chord.shift = true,
                "meta" | "cmd" | "super" => chord.meta = true,
                other => {
                    if key.replace(other.to_string()).is_some() {
                        return None;
                    }
                }
            }
        }
        chord.key = key?;
        Some(chord)
    }

    /// Builds the chord of a DOM keydown event.
    pub fn from_keyboard_event(ev: &web_sys::KeyboardEvent) -> Self {
        Self {
            key: normalize_key(&ev.key(), &ev.code()),
            ctrl: ev.ctrl_key(),
            alt: ev.alt_key(),
            shift: ev.shift_key(),
            meta: ev.meta_key(),
        }
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (held, name) in [
            (self.ctrl, "Ctrl+"),
            (self.alt, "Alt+"),
            (self.shift, "Shift+"),
            (self.meta, "Meta+"),
        ] {
            if held {
                f.write_str(name)?;
            }
        }
        let mut chars = self.key.chars();
        match chars.next() {
            Some(first) => write!(f, "{}{}", first.to_ascii_uppercase(), chars.as_str()),
            None => Ok(()),
        }
    }
}

/// Prefers the physical key code for digits, letters, and brackets, since `Alt` combinations
/// produce composed characters on some layouts.
fn normalize_key(key: &str, code: &str) -> String {
    if let Some(digit) = code.strip_prefix("Digit") {
        return digit.to_string();
    }
    if let Some(letter) = code.strip_prefix("Key") {
        return letter.to_ascii_lowercase();
    }
    match code {
        "BracketLeft" => "[".to_string(),
        "BracketRight" => "]".to_string(),
        _ => key.to_ascii_lowercase(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    NewTab,
    CloseTab,
    NextTab,
    PreviousTab,
    /// Jumps to tab `n` (one-based); `9` always means the last tab.
    JumpToTab(u8),
}

type ContextResolver = Box<dyn Fn(&WindowRegistry) -> Option<WindowId>>;

pub struct ShortcutDispatcher {
    bindings: BTreeMap<KeyChord, ShortcutAction>,
    context: Option<ContextResolver>,
}

impl fmt::Debug for ShortcutDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShortcutDispatcher")
            .field("bindings", &self.bindings)
            .field("custom_context", &self.context.is_some())
            .finish()
    }
}

impl Default for ShortcutDispatcher {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ShortcutDispatcher {
    /// Dispatcher without bindings.
    pub fn empty() -> Self {
        Self {
            bindings: BTreeMap::new(),
            context: None,
        }
    }

    pub fn with_defaults() -> Self {
        let mut dispatcher = Self::empty();
        dispatcher.bind(KeyChord::new("t").alt(), ShortcutAction::NewTab);
        dispatcher.bind(KeyChord::new("w").alt(), ShortcutAction::CloseTab);
        dispatcher.bind(KeyChord::new("tab").ctrl(), ShortcutAction::NextTab);
        dispatcher.bind(KeyChord::new("]").alt(), ShortcutAction::NextTab);
        dispatcher.bind(KeyChord::new("tab").ctrl().shift(), ShortcutAction::PreviousTab);
        dispatcher.bind(KeyChord::new("[").alt(), ShortcutAction::PreviousTab);
        for n in 1..=9_u8 {
            dispatcher.bind(
                KeyChord::new(&n.to_string()).alt(),
                ShortcutAction::JumpToTab(n),
            );
        }
        dispatcher
    }

    /// Binds `chord`, returning the action it replaced.
    pub fn bind(&mut self, chord: KeyChord, action: ShortcutAction) -> Option<ShortcutAction> {
        self.bindings.insert(chord, action)
    }

    pub fn unbind(&mut self, chord: &KeyChord) -> Option<ShortcutAction> {
        self.bindings.remove(chord)
    }

    pub fn action_for(&self, chord: &KeyChord) -> Option<ShortcutAction> {
        self.bindings.get(chord).copied()
    }

    pub fn bindings(&self) -> impl Iterator<Item = (&KeyChord, &ShortcutAction)> {
        self.bindings.iter()
    }

    /// Replaces the rule choosing the window shortcuts apply to (default: active window).
    pub fn set_context_resolver(
        &mut self,
        resolver: impl Fn(&WindowRegistry) -> Option<WindowId> + 'static,
    ) {
        self.context = Some(Box::new(resolver));
    }

    /// Resolves `chord` against the current registry state.
    pub fn resolve(&self, chord: &KeyChord, registry: &WindowRegistry) -> Option<TabCommand> {
        let action = self.action_for(chord)?;
        let window = match &self.context {
            Some(resolver) => resolver(registry),
            None => registry.active_window(),
        }?;
        let instances = registry.window(window)?.instances();

        let command = match action {
            ShortcutAction::NewTab => TabCommand::NewInstance { window },
            ShortcutAction::CloseTab => TabCommand::Close {
                window,
                instance: instances.active_id()?,
            },
            ShortcutAction::NextTab => TabCommand::Cycle { window, delta: 1 },
            ShortcutAction::PreviousTab => TabCommand::Cycle { window, delta: -1 },
            ShortcutAction::JumpToTab(n) => {
                let count = instances.count();
                let index = if n >= 9 {
                    count.checked_sub(1)?
                } else {
                    usize::from(n).checked_sub(1)?
                };
                if index >= count {
                    return None;
                }
                TabCommand::ActivateIndex { window, index }
            }
        };
        Some(command)
    }
}

#[cfg(test)]
mod tests {
    use desktop_app_contract::{JsonInstance, MemoryMountProvider};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::model::WindowKind;

    fn registry_with(tabs: usize) -> (WindowRegistry, WindowId) {
        let mounts = MemoryMountProvider::default();
        let mut registry = WindowRegistry::new(100);
        let window = registry.open(WindowKind::Terminal, 0, &mounts).expect("open");
        for _ in 0..tabs {
            registry
                .create_instance(window, Box::new(JsonInstance::new(json!({}))))
                .expect("create");
        }
        (registry, window)
    }

    #[test]
    fn parse_accepts_modifier_aliases_and_rejects_double_keys() {
        assert_eq!(
            KeyChord::parse("Ctrl+Shift+Tab"),
            Some(KeyChord::new("tab").ctrl().shift())
        );
        assert_eq!(KeyChord::parse("option + T"), Some(KeyChord::new("t").alt()));
        assert_eq!(KeyChord::parse("Ctrl+A+B"), None);
        assert_eq!(KeyChord::parse("Ctrl+"), None);
        assert_eq!(KeyChord::parse("Alt"), None);
        assert_eq!(
            KeyChord::new("tab").ctrl().shift().to_string(),
            "Ctrl+Shift+Tab"
        );
    }

    #[test]
    fn physical_codes_win_over_composed_characters() {
        assert_eq!(normalize_key("¡", "Digit1"), "1");
        assert_eq!(normalize_key("†", "KeyT"), "t");
        assert_eq!(normalize_key("“", "BracketLeft"), "[");
        assert_eq!(normalize_key("Tab", "Tab"), "tab");
    }

    #[test]
    fn default_bindings_resolve_against_active_window() {
        let (registry, window) = registry_with(3);
        let dispatcher = ShortcutDispatcher::with_defaults();
        let resolve = |raw: &str| {
            dispatcher.resolve(&KeyChord::parse(raw).expect("chord"), &registry)
        };

        assert_eq!(resolve("Alt+T"), Some(TabCommand::NewInstance { window }));
        assert_eq!(resolve("Ctrl+Tab"), Some(TabCommand::Cycle { window, delta: 1 }));
        assert_eq!(resolve("Alt+["), Some(TabCommand::Cycle { window, delta: -1 }));
        assert_eq!(resolve("Alt+2"), Some(TabCommand::ActivateIndex { window, index: 1 }));
        assert_eq!(resolve("Alt+9"), Some(TabCommand::ActivateIndex { window, index: 2 }));
        assert_eq!(resolve("Alt+5"), None);
        assert_eq!(resolve("Alt+Q"), None);
        assert!(matches!(resolve("Alt+W"), Some(TabCommand::Close { .. })));
    }

    #[test]
    fn shortcuts_are_ignored_without_a_target_window() {
        let registry = WindowRegistry::new(100);
        let dispatcher = ShortcutDispatcher::with_defaults();
        let chord = KeyChord::new("t").alt();
        assert_eq!(dispatcher.resolve(&chord, &registry), None);
    }

    #[test]
    fn custom_context_and_rebinding() {
        let (registry, window) = registry_with(1);
        let mut dispatcher = ShortcutDispatcher::empty();
        let chord = KeyChord::new("n").ctrl();
        assert_eq!(dispatcher.bind(chord.clone(), ShortcutAction::NewTab), None);

        dispatcher.set_context_resolver(|_| None);
        assert_eq!(dispatcher.resolve(&chord, &registry), None);

        dispatcher.set_context_resolver(move |_| Some(window));
        assert_eq!(
            dispatcher.resolve(&chord, &registry),
            Some(TabCommand::NewInstance { window })
        );

        assert_eq!(dispatcher.unbind(&chord), Some(ShortcutAction::NewTab));
        assert_eq!(dispatcher.resolve(&chord, &registry), None);
    }
}
