//! Integration tests for undo/redo through the editing session.
//!
//! Exercises reefmark-edit's history manager as driven by reefmark-editor,
//! over frames and taxonomies from reefmark-core.

use reefmark_core::{Category, Frame, NewCategory};
use reefmark_editor::{EditorSession, SessionConfig};

use crate::support::{ctrl, session, session_with};

fn state(s: &EditorSession) -> (Frame, Vec<Category>) {
    (s.frame().clone(), s.taxonomy().to_list())
}

// ── Inverse law ────────────────────────────────────────────────

#[test]
fn undo_then_redo_walks_every_state() {
    let mut s = session();
    let mut states = vec![state(&s)];

    let (healthy, bleached) = s.add_coral_category("Acropora").unwrap();
    states.push(state(&s));

    s.toggle_masks_at(1, 1);
    s.assign_category(healthy).unwrap();
    states.push(state(&s));

    s.toggle_masks_at(12, 12);
    s.assign_category(bleached).unwrap();
    states.push(state(&s));

    s.rename_category(healthy, "Montipora").unwrap();
    states.push(state(&s));

    s.toggle_masks_at(12, 12);
    assert_eq!(s.remove_selected(), 1);
    states.push(state(&s));

    for expected in states.iter().rev().skip(1) {
        assert!(s.undo());
        assert_eq!(&state(&s), expected);
    }
    assert!(!s.undo());

    for expected in states.iter().skip(1) {
        assert!(s.redo());
        assert_eq!(&state(&s), expected);
    }
    assert!(!s.redo());
}

#[test]
fn restore_clears_selection_and_prompts() {
    let mut s = session();
    s.add_category(NewCategory::new("Sand")).unwrap();
    s.toggle_masks_at(1, 1);
    assert!(!s.selection().is_empty());
    s.undo();
    assert!(s.selection().is_empty());
    assert!(s.prompts().is_empty());
}

// ── Capacity ───────────────────────────────────────────────────

#[test]
fn oldest_record_is_evicted() {
    let mut s = session_with(SessionConfig {
        history_capacity: 3,
        ..SessionConfig::default()
    });
    for name in ["Sand", "Rock", "Rubble", "Algae"] {
        s.add_category(NewCategory::new(name)).unwrap();
    }
    assert_eq!(s.history().undo_count(), 3);
    for _ in 0..3 {
        assert!(s.undo());
    }
    assert!(!s.undo());
    // The state before "Sand" was added is gone.
    assert!(s.taxonomy().contains_name("Sand"));
    assert!(!s.taxonomy().contains_name("Rock"));
}

#[test]
fn new_edit_discards_redo() {
    let mut s = session();
    s.add_category(NewCategory::new("Sand")).unwrap();
    s.undo();
    assert!(s.history().can_redo());
    s.add_category(NewCategory::new("Rock")).unwrap();
    assert!(!s.history().can_redo());
    assert!(!s.redo());
}

#[test]
fn empty_stacks_are_noops() {
    let mut s = session();
    assert!(!s.undo());
    assert!(!s.redo());
    assert_eq!(s.history().undo_count(), 0);
    assert_eq!(s.history().redo_count(), 0);
}

// ── Keyboard ───────────────────────────────────────────────────

#[test]
fn ctrl_z_and_ctrl_y_in_select_mode() {
    let mut s = session();
    s.toggle_masks_at(1, 1);
    s.remove_selected();
    assert_eq!(s.frame().masks().len(), 1);

    assert!(s.key(&ctrl(1, "z")));
    assert_eq!(s.frame().masks().len(), 2);
    assert!(s.key(&ctrl(2, "y")));
    assert_eq!(s.frame().masks().len(), 1);
}

#[test]
fn failed_rename_records_nothing() {
    let mut s = session();
    let (healthy, bleached) = s.add_coral_category("Acropora").unwrap();
    s.add_coral_category("Porites").unwrap();
    let before = s.history().undo_count();

    assert!(s.rename_category(healthy, "Porites").is_err());
    assert!(s.rename_category(bleached, "Anything").is_err());
    assert_eq!(s.history().undo_count(), before);
    assert_eq!(s.taxonomy().get(healthy).map(|c| c.name.as_str()), Some("Acropora"));
}
