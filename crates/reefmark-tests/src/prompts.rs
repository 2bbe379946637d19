//! Integration tests for assisted mask creation, detection and quadrat depth.
//!
//! Exercises reefmark-editor's session against a scripted inference service,
//! checking how out-of-order and failed answers are handled.

use std::sync::Arc;

use glam::Vec2;
use reefmark_ai::{Quadrat, QuadratDepth};
use reefmark_core::category::PREDICTED_ID;
use reefmark_core::{Prompt, ReefError};
use reefmark_editor::{ActionState, EditorSession, NotificationLevel, PointerButton, Tool, Trigger};

use crate::support::{frame, key, rect_mask, session, two_masks, MockInference};

fn with_mock() -> (EditorSession, Arc<MockInference>) {
    let mock = MockInference::new();
    let mut s = session().with_inference(mock.clone());
    s.trigger(Trigger::ActivateTool(Tool::CreateMask));
    (s, mock)
}

fn errors(s: &EditorSession) -> usize {
    s.notifications()
        .iter()
        .filter(|n| n.level == NotificationLevel::Error)
        .count()
}

// ── Preview ordering ───────────────────────────────────────────

#[tokio::test]
async fn newest_preview_wins_over_late_answer() {
    let (mut s, mock) = with_mock();
    mock.delay_next(60);
    s.add_prompt(Prompt::positive(2, 2));
    s.add_prompt(Prompt::positive(3, 3));
    assert_eq!(mock.prompt_calls(), 2);

    s.settle().await;
    assert_eq!(s.in_flight(), 0);
    // Two prompts were in the newest request; the one-prompt answer came last.
    assert_eq!(s.preview().map(|m| m.area()), Some(2));
}

#[tokio::test]
async fn clearing_prompts_drops_pending_answers() {
    let (mut s, mock) = with_mock();
    for i in 0..3 {
        s.add_prompt(Prompt::positive(i, i));
    }
    s.clear_prompts();
    assert_eq!(mock.prompt_calls(), 3);

    s.settle().await;
    assert!(s.preview().is_none());
    assert!(s.prompts().is_empty());
    assert_eq!(mock.prompt_calls(), 3);
}

#[tokio::test]
async fn undo_prompt_requests_again() {
    let (mut s, mock) = with_mock();
    s.add_prompt(Prompt::positive(2, 2));
    s.add_prompt(Prompt::negative(12, 12));
    s.settle().await;
    assert_eq!(s.preview().map(|m| m.area()), Some(2));

    s.undo_prompt();
    assert_eq!(mock.prompt_calls(), 3);
    s.settle().await;
    assert_eq!(s.preview().map(|m| m.area()), Some(1));

    // Removing the last prompt clears the preview without a request.
    s.undo_prompt();
    s.settle().await;
    assert_eq!(mock.prompt_calls(), 3);
    assert!(s.preview().is_none());
}

#[tokio::test]
async fn leaving_create_mode_drops_late_preview() {
    let (mut s, mock) = with_mock();
    mock.delay_next(30);
    s.pointer_down(PointerButton::Primary, Vec2::new(2.5, 2.5));
    assert_eq!(s.prompts(), &[Prompt::positive(2, 2)]);

    s.trigger(Trigger::Back);
    assert_eq!(s.state(), ActionState::SelectMask);
    assert!(s.controls_visible());

    s.settle().await;
    assert!(s.preview().is_none());
    assert_eq!(errors(&s), 0);
}

#[tokio::test]
async fn right_click_places_negative_prompt() {
    let (mut s, _mock) = with_mock();
    s.pointer_down(PointerButton::Secondary, Vec2::new(7.5, 8.5));
    s.pointer_up(PointerButton::Secondary, Vec2::new(8.0, 9.0));
    assert_eq!(s.prompts(), &[Prompt::negative(7, 8)]);
    s.settle().await;
}

// ── Failures ───────────────────────────────────────────────────

#[tokio::test]
async fn failed_request_is_reported() {
    let (mut s, mock) = with_mock();
    mock.set_failing(true);
    s.add_prompt(Prompt::positive(2, 2));
    s.settle().await;

    assert_eq!(errors(&s), 1);
    assert!(s.preview().is_none());
    assert_eq!(s.confirm_prompt().unwrap(), None);
    assert_eq!(s.frame().masks().len(), 2);
    assert_eq!(s.history().undo_count(), 0);
}

// ── Confirm ────────────────────────────────────────────────────

#[tokio::test]
async fn confirm_adds_mask_with_active_category() {
    let (mut s, _mock) = with_mock();
    let (healthy, _) = s.add_coral_category("Acropora").unwrap();
    s.set_active_category(healthy).unwrap();

    s.add_prompt(Prompt::positive(18, 18));
    s.settle().await;
    assert!(s.key(&key(1, "space")));

    assert_eq!(s.frame().masks().len(), 3);
    let created = s.frame().mask(2).unwrap();
    assert_eq!(created.category_id, healthy);
    assert_eq!(created.area(), 1);
    // Prompts start over but the tool stays active.
    assert!(s.prompts().is_empty());
    assert!(s.preview().is_none());
    assert_eq!(s.state(), ActionState::CreateMask);

    assert!(s.undo());
    assert_eq!(s.frame().masks().len(), 2);
}

#[tokio::test]
async fn confirm_without_preview_changes_nothing() {
    let (mut s, _mock) = with_mock();
    assert_eq!(s.confirm_prompt().unwrap(), None);
    assert_eq!(s.frame().masks().len(), 2);
    assert_eq!(
        s.notifications().last().map(|n| n.level),
        Some(NotificationLevel::Warning)
    );
}

// ── Detection ──────────────────────────────────────────────────

#[tokio::test]
async fn detection_merges_and_undoes() {
    let mock = MockInference::new();
    mock.set_detections(vec![
        rect_mask(0, PREDICTED_ID, 2, 12, 5, 15),
        rect_mask(1, PREDICTED_ID, 14, 2, 18, 6),
    ]);
    let mut s = session().with_inference(mock.clone());

    assert!(s.detect_corals(serde_json::Map::new()));
    assert!(s.is_busy());
    // A second detection is refused while the first runs.
    assert!(!s.detect_corals(serde_json::Map::new()));
    assert_eq!(mock.detection_calls(), 1);

    s.settle().await;
    assert!(!s.is_busy());
    let ids: Vec<_> = s.frame().masks().iter().map(|m| m.id()).collect();
    assert_eq!(ids, vec![0, 1, 2, 3]);

    assert!(s.undo());
    assert_eq!(s.frame().masks().len(), 2);
}

#[tokio::test]
async fn detection_for_previous_frame_is_dropped() {
    let mock = MockInference::new();
    mock.set_detections(vec![rect_mask(0, PREDICTED_ID, 2, 12, 5, 15)]);
    let mut s = session().with_inference(mock.clone());

    assert!(s.detect_corals(serde_json::Map::new()));
    s.load_frame(frame(1, two_masks()), None);
    s.settle().await;

    assert_eq!(s.frame().image.idx, 1);
    assert_eq!(s.frame().masks().len(), 2);
    assert!(!s.history().can_undo());
    assert!(!s.is_busy());
}

#[tokio::test]
async fn failed_detection_keeps_frame() {
    let mock = MockInference::new();
    mock.set_failing(true);
    let mut s = session().with_inference(mock.clone());
    assert!(s.detect_corals(serde_json::Map::new()));
    s.settle().await;
    assert_eq!(s.frame().masks().len(), 2);
    assert_eq!(errors(&s), 1);
    assert!(!s.is_busy());
}

#[tokio::test]
async fn edits_wait_for_detection() {
    let mock = MockInference::new();
    mock.set_detections(vec![rect_mask(0, PREDICTED_ID, 2, 12, 5, 15)]);
    let mut s = session().with_inference(mock.clone());
    let (healthy, _) = s.add_coral_category("Acropora").unwrap();
    s.toggle_masks_at(1, 1);

    assert!(s.detect_corals(serde_json::Map::new()));
    assert!(matches!(s.assign_category(healthy), Err(ReefError::Busy(_))));
    assert!(!s.undo());
    assert!(s.selection().is_selected(0));

    s.settle().await;
    assert_eq!(s.frame().masks().len(), 3);
    assert_eq!(s.assign_category(healthy).unwrap(), 1);
}

#[tokio::test]
async fn confirm_waits_for_detection() {
    let (mut s, mock) = with_mock();
    s.add_prompt(Prompt::positive(18, 18));
    s.settle().await;
    assert!(s.detect_corals(serde_json::Map::new()));
    assert_eq!(mock.detection_calls(), 1);

    assert!(matches!(s.confirm_prompt(), Err(ReefError::Busy(_))));
    assert_eq!(s.frame().masks().len(), 2);
    // The preview is kept for when the detection is done.
    assert!(s.preview().is_some());

    s.settle().await;
    assert!(s.confirm_prompt().unwrap().is_some());
    assert_eq!(s.frame().masks().len(), 3);
}

#[tokio::test]
async fn crashed_detection_releases_controls() {
    let mock = MockInference::new();
    mock.set_crashing(true);
    let mut s = session().with_inference(mock.clone());
    assert!(s.detect_corals(serde_json::Map::new()));

    s.settle().await;
    assert_eq!(s.in_flight(), 0);
    assert!(!s.is_busy());
    assert_eq!(errors(&s), 1);
    assert_eq!(s.frame().masks().len(), 2);

    mock.set_crashing(false);
    assert!(s.detect_corals(serde_json::Map::new()));
    s.settle().await;
    assert!(!s.is_busy());
}

// ── Quadrat ────────────────────────────────────────────────────

#[tokio::test]
async fn quadrat_depth_is_requested_normalized() {
    let mock = MockInference::new();
    let mut s = session().with_inference(mock.clone());
    assert!(s.key(&key(1, "q")));
    assert_eq!(s.state(), ActionState::CreateQuadrat);

    s.trigger(Trigger::LeftClick { x: 15, y: 12 });
    s.trigger(Trigger::LeftClick { x: 3, y: 4 });
    assert_eq!(s.quadrat().rect, Some(Quadrat::new(15, 12, 3, 4)));
    assert!(s.key(&key(2, "space")));

    s.settle().await;
    assert_eq!(mock.depth_requests(), vec![Quadrat::new(3, 4, 15, 12)]);
    let depth = s.last_depth().unwrap();
    assert_eq!((depth.rows, depth.cols), (2, 3));
}

#[tokio::test]
async fn quadrat_depth_is_saved_in_wire_form() {
    let mock = MockInference::new();
    let mut s = session().with_inference(mock.clone());
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("depth.json");
    assert!(!s.save_quadrat_depth(&path));

    s.trigger(Trigger::ActivateTool(Tool::CreateQuadrat));
    s.trigger(Trigger::LeftClick { x: 2, y: 2 });
    s.trigger(Trigger::LeftClick { x: 9, y: 8 });
    assert!(s.request_quadrat_depth());
    s.settle().await;

    assert!(s.save_quadrat_depth(&path));
    s.settle().await;
    assert_eq!(
        s.notifications().last().map(|n| n.level),
        Some(NotificationLevel::Info)
    );
    let doc: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(doc["rows"], 2);
    assert_eq!(doc["cols"], 3);
    let saved: QuadratDepth = serde_json::from_value(doc).unwrap();
    assert_eq!(Some(&saved), s.last_depth());
}

#[tokio::test]
async fn quadrat_needs_two_corners() {
    let mock = MockInference::new();
    let mut s = session().with_inference(mock.clone());
    s.trigger(Trigger::ActivateTool(Tool::CreateQuadrat));
    s.trigger(Trigger::LeftClick { x: 5, y: 5 });
    assert!(!s.request_quadrat_depth());

    // Same corner twice has no area.
    s.trigger(Trigger::LeftClick { x: 5, y: 5 });
    assert!(!s.request_quadrat_depth());
    assert!(mock.depth_requests().is_empty());

    // A third click starts over.
    s.trigger(Trigger::LeftClick { x: 1, y: 1 });
    assert_eq!(s.quadrat().first, Some((1, 1)));
    assert_eq!(s.quadrat().rect, None);
}
