//! Keyboard shortcuts.
//!
//! Each editor state owns its own table, so a key only fires while its state
//! is active. Global bindings apply in every state after the state table. The
//! dispatcher remembers recently handled event ids and ignores repeats of the
//! same physical key press.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{debug, trace};

use crate::action::{ActionState, Tool, Trigger};

/// How many handled event ids the dispatcher remembers.
const HANDLED_MEMORY: usize = 64;

// ── Shortcut representation ─────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub command: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        ctrl: false,
        shift: false,
        alt: false,
        command: false,
    };
    pub const CTRL: Self = Self {
        ctrl: true,
        shift: false,
        alt: false,
        command: false,
    };
}

/// A modifier set plus a normalized key name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shortcut {
    pub modifiers: Modifiers,
    pub key: String,
}

impl Shortcut {
    pub fn new(modifiers: Modifiers, key: impl AsRef<str>) -> Self {
        Self {
            modifiers,
            key: normalize_key(key.as_ref()),
        }
    }

    /// Parse `"ctrl+z"`, `"space"`, `"Escape"`. Returns `None` for an empty
    /// key or an unknown modifier.
    pub fn parse(text: &str) -> Option<Self> {
        let mut modifiers = Modifiers::NONE;
        let mut parts: Vec<&str> = text.split('+').map(str::trim).collect();
        let key = parts.pop().filter(|k| !k.is_empty())?;
        for part in parts {
            match part.to_ascii_lowercase().as_str() {
                "ctrl" | "control" => modifiers.ctrl = true,
                "shift" => modifiers.shift = true,
                "alt" | "option" => modifiers.alt = true,
                "cmd" | "command" | "meta" => modifiers.command = true,
                _ => return None,
            }
        }
        Some(Self::new(modifiers, key))
    }

    /// Format for display: "Ctrl+Z", "Space".
    pub fn display(&self) -> String {
        let mut s = String::new();
        if self.modifiers.ctrl {
            s.push_str("Ctrl+");
        }
        if self.modifiers.alt {
            s.push_str("Alt+");
        }
        if self.modifiers.shift {
            s.push_str("Shift+");
        }
        if self.modifiers.command {
            s.push_str("Cmd+");
        }
        let mut chars = self.key.chars();
        if let Some(first) = chars.next() {
            s.extend(first.to_uppercase());
            s.push_str(chars.as_str());
        }
        s
    }
}

/// Lowercase the key and give whitespace keys a name.
fn normalize_key(key: &str) -> String {
    match key {
        " " => "space".to_string(),
        "Esc" => "escape".to_string(),
        other => other.to_lowercase(),
    }
}

/// One key-down as delivered by the host. `id` is unique per physical press;
/// a press delivered twice carries the same id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub id: u64,
    pub key: String,
    pub modifiers: Modifiers,
}

impl KeyEvent {
    pub fn new(id: u64, key: impl Into<String>, modifiers: Modifiers) -> Self {
        Self {
            id,
            key: key.into(),
            modifiers,
        }
    }

    pub fn shortcut(&self) -> Shortcut {
        Shortcut::new(self.modifiers, &self.key)
    }
}

// ── Bindings ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    /// Display name, e.g. "Remove selected".
    pub name: &'static str,
    pub shortcut: Shortcut,
    pub trigger: Trigger,
}

#[derive(Debug, Clone, Default)]
pub struct ShortcutTable {
    bindings: Vec<Binding>,
    by_shortcut: HashMap<Shortcut, usize>,
}

impl ShortcutTable {
    /// Add a binding. A later binding for the same shortcut replaces the
    /// earlier one.
    pub fn register(&mut self, name: &'static str, shortcut: Shortcut, trigger: Trigger) {
        if let Some(&idx) = self.by_shortcut.get(&shortcut) {
            self.bindings[idx] = Binding { name, shortcut, trigger };
            return;
        }
        let idx = self.bindings.len();
        self.by_shortcut.insert(shortcut.clone(), idx);
        self.bindings.push(Binding { name, shortcut, trigger });
    }

    pub fn get(&self, shortcut: &Shortcut) -> Option<&Binding> {
        self.by_shortcut.get(shortcut).map(|&i| &self.bindings[i])
    }

    pub fn all(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

// ── Dispatcher ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ShortcutDispatcher {
    tables: HashMap<ActionState, ShortcutTable>,
    global: ShortcutTable,
    handled: VecDeque<u64>,
    handled_set: HashSet<u64>,
}

impl ShortcutDispatcher {
    /// Dispatcher with no bindings.
    pub fn empty() -> Self {
        Self {
            tables: HashMap::new(),
            global: ShortcutTable::default(),
            handled: VecDeque::with_capacity(HANDLED_MEMORY),
            handled_set: HashSet::with_capacity(HANDLED_MEMORY),
        }
    }

    /// The default key map.
    pub fn new() -> Self {
        let mut d = Self::empty();
        d.register_builtins();
        d
    }

    fn register_builtins(&mut self) {
        let key = |k: &str| Shortcut::new(Modifiers::NONE, k);
        let ctrl = |k: &str| Shortcut::new(Modifiers::CTRL, k);

        let select = self.table_mut(ActionState::SelectMask);
        select.register("Remove selected", key("r"), Trigger::Remove);
        select.register("Create mask", key("w"), Trigger::ActivateTool(Tool::CreateMask));
        select.register("Create quadrat", key("q"), Trigger::ActivateTool(Tool::CreateQuadrat));
        select.register("Undo", ctrl("z"), Trigger::Undo);
        select.register("Redo", ctrl("y"), Trigger::Redo);
        select.register("Previous image", key("a"), Trigger::PrevImage);
        select.register("Next image", key("d"), Trigger::NextImage);

        let create = self.table_mut(ActionState::CreateMask);
        create.register("Undo prompt", ctrl("z"), Trigger::Undo);
        create.register("Reset prompts", key("r"), Trigger::Reset);
        create.register("Confirm mask", key("space"), Trigger::Confirm);
        create.register("Back", key("w"), Trigger::Back);
        create.register("Back", key("escape"), Trigger::Back);

        let quadrat = self.table_mut(ActionState::CreateQuadrat);
        quadrat.register("Reset quadrat", key("r"), Trigger::Reset);
        quadrat.register("Confirm quadrat", key("space"), Trigger::Confirm);
        quadrat.register("Back", key("q"), Trigger::Back);
        quadrat.register("Back", key("escape"), Trigger::Back);

        self.global.register("Toggle masks", key("v"), Trigger::ToggleMasks);
    }

    pub fn table(&self, state: ActionState) -> Option<&ShortcutTable> {
        self.tables.get(&state)
    }

    pub fn table_mut(&mut self, state: ActionState) -> &mut ShortcutTable {
        self.tables.entry(state).or_default()
    }

    pub fn global_mut(&mut self) -> &mut ShortcutTable {
        &mut self.global
    }

    /// Resolve `event` in `state`. An event id already handled yields `None`.
    pub fn dispatch(&mut self, state: ActionState, event: &KeyEvent) -> Option<Trigger> {
        if self.handled_set.contains(&event.id) {
            trace!(id = event.id, "Key event already handled");
            return None;
        }
        let shortcut = event.shortcut();
        let binding = self
            .tables
            .get(&state)
            .and_then(|t| t.get(&shortcut))
            .or_else(|| self.global.get(&shortcut))?;
        let trigger = binding.trigger;
        debug!(key = %shortcut.display(), action = binding.name, ?state, "Shortcut");
        self.remember(event.id);
        Some(trigger)
    }

    fn remember(&mut self, id: u64) {
        if self.handled.len() == HANDLED_MEMORY {
            if let Some(old) = self.handled.pop_front() {
                self.handled_set.remove(&old);
            }
        }
        self.handled.push_back(id);
        self.handled_set.insert(id);
    }
}

impl Default for ShortcutDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
