//! Reefmark Editor - The interactive editing session
//!
//! Ties the annotation model, history, selection, assisted segmentation and
//! the compositor together behind one [`EditorSession`]:
//! - Editor modes and their transition table
//! - Per-mode keyboard shortcuts
//! - Pointer, wheel and key input
//! - Async calls to the inference and project services, applied on the next
//!   draw tick

pub mod action;
pub mod session;
pub mod shortcuts;

pub use action::{ActionMachine, ActionState, Direction, Effect, Tool, Transition, Trigger};
pub use session::{
    EditorSession, Notification, NotificationLevel, PointerButton, QuadratDraft, SessionConfig,
};
pub use shortcuts::{Binding, KeyEvent, Modifiers, Shortcut, ShortcutDispatcher, ShortcutTable};
