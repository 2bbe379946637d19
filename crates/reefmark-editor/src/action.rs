//! Editor modes and the transition table between them.
//!
//! `transition` is a pure function of `(state, trigger)`. Pairs that are not
//! listed leave the state alone and have no effect, so every input is safe to
//! feed in any mode.

use reefmark_core::Prompt;
use tracing::debug;

/// What the primary pointer button currently does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ActionState {
    /// Clicks toggle masks in and out of the selection.
    #[default]
    SelectMask,
    /// Clicks place prompts for an assisted mask.
    CreateMask,
    /// Clicks place quadrat corners.
    CreateQuadrat,
}

/// A tool that takes over the pointer until the user goes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    CreateMask,
    CreateQuadrat,
}

impl Tool {
    pub fn state(self) -> ActionState {
        match self {
            Self::CreateMask => ActionState::CreateMask,
            Self::CreateQuadrat => ActionState::CreateQuadrat,
        }
    }
}

/// User intent, from a shortcut, a button, or a click in image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    ActivateTool(Tool),
    Confirm,
    Undo,
    Redo,
    Reset,
    Back,
    Remove,
    NextImage,
    PrevImage,
    ToggleMasks,
    LeftClick { x: i32, y: i32 },
    RightClick { x: i32, y: i32 },
}

/// Which way to move through the project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Prev,
}

/// Side effect the session carries out for a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    ToggleMasksAt { x: i32, y: i32 },
    /// Clear the selection and hide the select-mode controls.
    EnterTool(Tool),
    /// Drop the tool's pending input, clear the selection, show the controls.
    ExitTool(Tool),
    HistoryUndo,
    HistoryRedo,
    RemoveSelected,
    Navigate(Direction),
    ToggleMaskLayer,
    AddPrompt(Prompt),
    UndoPrompt,
    ResetPrompts,
    ConfirmPrompt,
    PlaceQuadratCorner { x: i32, y: i32 },
    ResetQuadrat,
    ConfirmQuadrat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: ActionState,
    pub effect: Effect,
}

impl Transition {
    fn stay(state: ActionState, effect: Effect) -> Self {
        Self { next: state, effect }
    }
}

pub fn transition(state: ActionState, trigger: Trigger) -> Transition {
    use ActionState::*;

    if trigger == Trigger::ToggleMasks {
        return Transition::stay(state, Effect::ToggleMaskLayer);
    }

    match (state, trigger) {
        (SelectMask, Trigger::LeftClick { x, y }) => Transition::stay(state, Effect::ToggleMasksAt { x, y }),
        (SelectMask, Trigger::ActivateTool(tool)) => Transition {
            next: tool.state(),
            effect: Effect::EnterTool(tool),
        },
        (SelectMask, Trigger::Undo) => Transition::stay(state, Effect::HistoryUndo),
        (SelectMask, Trigger::Redo) => Transition::stay(state, Effect::HistoryRedo),
        (SelectMask, Trigger::Remove) => Transition::stay(state, Effect::RemoveSelected),
        (SelectMask, Trigger::NextImage) => Transition::stay(state, Effect::Navigate(Direction::Next)),
        (SelectMask, Trigger::PrevImage) => Transition::stay(state, Effect::Navigate(Direction::Prev)),

        (CreateMask, Trigger::LeftClick { x, y }) => {
            Transition::stay(state, Effect::AddPrompt(Prompt::positive(x, y)))
        }
        (CreateMask, Trigger::RightClick { x, y }) => {
            Transition::stay(state, Effect::AddPrompt(Prompt::negative(x, y)))
        }
        (CreateMask, Trigger::Undo) => Transition::stay(state, Effect::UndoPrompt),
        (CreateMask, Trigger::Reset) => Transition::stay(state, Effect::ResetPrompts),
        (CreateMask, Trigger::Confirm) => Transition::stay(state, Effect::ConfirmPrompt),
        (CreateMask, Trigger::Back | Trigger::ActivateTool(Tool::CreateMask)) => Transition {
            next: SelectMask,
            effect: Effect::ExitTool(Tool::CreateMask),
        },

        (CreateQuadrat, Trigger::LeftClick { x, y }) => {
            Transition::stay(state, Effect::PlaceQuadratCorner { x, y })
        }
        (CreateQuadrat, Trigger::Reset) => Transition::stay(state, Effect::ResetQuadrat),
        (CreateQuadrat, Trigger::Confirm) => Transition::stay(state, Effect::ConfirmQuadrat),
        (CreateQuadrat, Trigger::Back | Trigger::ActivateTool(Tool::CreateQuadrat)) => Transition {
            next: SelectMask,
            effect: Effect::ExitTool(Tool::CreateQuadrat),
        },

        _ => Transition::stay(state, Effect::None),
    }
}

/// Current state plus the visibility of the select-mode controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionMachine {
    state: ActionState,
    controls_visible: bool,
}

impl ActionMachine {
    pub fn new() -> Self {
        Self {
            state: ActionState::SelectMask,
            controls_visible: true,
        }
    }

    pub fn state(&self) -> ActionState {
        self.state
    }

    pub fn controls_visible(&self) -> bool {
        self.controls_visible
    }

    /// Advance on `trigger` and hand back the effect to carry out.
    pub fn apply(&mut self, trigger: Trigger) -> Effect {
        let t = transition(self.state, trigger);
        match t.effect {
            Effect::EnterTool(_) => self.controls_visible = false,
            Effect::ExitTool(_) => self.controls_visible = true,
            _ => {}
        }
        if t.next != self.state {
            debug!(from = ?self.state, to = ?t.next, "Action state changed");
        }
        self.state = t.next;
        t.effect
    }

    /// Back to `SelectMask` with controls shown, e.g. after loading an image.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for ActionMachine {
    fn default() -> Self {
        Self::new()
    }
}
