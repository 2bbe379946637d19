//! Integration tests for project navigation, saving and export.
//!
//! Drives reefmark-editor's session against reefmark-edit's in-memory store,
//! with datasets written to temporary files where disk is involved.

use std::sync::Arc;

use reefmark_core::{NewCategory, ReefError};
use reefmark_edit::{DatasetFile, ExportKind, InMemoryStore};
use reefmark_editor::{EditorSession, NotificationLevel, SessionConfig, Tool, Trigger};

use crate::support::{dataset, key, H, W};

fn open(frames: usize) -> (EditorSession, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::from_dataset(dataset(frames)));
    let s = EditorSession::new(SessionConfig::default(), W, H)
        .with_store(store.clone())
        .with_exporter(store.clone());
    (s, store)
}

async fn opened_at_first(frames: usize) -> (EditorSession, Arc<InMemoryStore>) {
    let (mut s, store) = open(frames);
    assert!(s.jump_to(0));
    s.settle().await;
    (s, store)
}

fn last_level(s: &EditorSession) -> Option<NotificationLevel> {
    s.notifications().last().map(|n| n.level)
}

// ── Opening ────────────────────────────────────────────────────

#[tokio::test]
async fn open_project_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reef.json");
    dataset(3).save_to_file(&path).unwrap();

    let store = Arc::new(InMemoryStore::new());
    let mut s = EditorSession::new(SessionConfig::default(), W, H).with_store(store.clone());
    assert!(s.open_project(path.clone()));
    assert!(s.is_busy());
    s.settle().await;

    assert!(!s.is_busy());
    assert_eq!(s.gallery().len(), 3);
    assert!(s.taxonomy().contains_name("Porites"));
    assert_eq!(s.frame().image.idx, 0);
    assert_eq!(s.frame().masks().len(), 2);
    assert_eq!(store.len(), 3);
}

#[tokio::test]
async fn open_missing_project_reports_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(InMemoryStore::new());
    let mut s = EditorSession::new(SessionConfig::default(), W, H).with_store(store);
    assert!(s.open_project(dir.path().join("missing.json")));
    s.settle().await;
    assert_eq!(last_level(&s), Some(NotificationLevel::Error));
    assert!(!s.is_busy());
    assert!(s.gallery().is_empty());
}

// ── Moving between frames ──────────────────────────────────────

#[tokio::test]
async fn next_saves_edits_before_leaving() {
    let (mut s, store) = opened_at_first(3).await;
    s.toggle_masks_at(1, 1);
    assert_eq!(s.remove_selected(), 1);

    assert!(s.next_image());
    s.settle().await;

    assert_eq!(s.frame().image.idx, 1);
    assert_eq!(store.cursor(), 1);
    let saved = store.dataset();
    assert_eq!(saved.frames[0].segmentation.annotations.len(), 1);
    assert_eq!(saved.frames[1].segmentation.annotations.len(), 2);
    // Each frame starts with its own history.
    assert!(!s.history().can_undo());
}

#[tokio::test]
async fn navigation_is_serialized() {
    let (mut s, store) = opened_at_first(3).await;
    assert!(s.next_image());
    assert!(!s.next_image());
    assert!(!s.save());
    assert_eq!(last_level(&s), Some(NotificationLevel::Warning));

    s.settle().await;
    assert_eq!(s.frame().image.idx, 1);
    assert_eq!(store.cursor(), 1);
    assert!(s.next_image());
    s.settle().await;
    assert_eq!(s.frame().image.idx, 2);
}

#[tokio::test]
async fn same_key_event_navigates_once() {
    let (mut s, _store) = opened_at_first(3).await;
    let d = key(7, "d");
    assert!(s.key(&d));
    s.settle().await;
    assert!(!s.key(&d));
    s.settle().await;
    assert_eq!(s.frame().image.idx, 1);

    assert!(s.key(&key(8, "a")));
    s.settle().await;
    assert_eq!(s.frame().image.idx, 0);
}

#[tokio::test]
async fn navigation_keys_are_off_in_create_mode() {
    let (mut s, store) = opened_at_first(3).await;
    s.trigger(Trigger::ActivateTool(Tool::CreateMask));
    assert!(!s.key(&key(1, "d")));
    assert!(!s.is_busy());
    assert_eq!(s.in_flight(), 0);
    assert_eq!(store.cursor(), 0);
}

#[tokio::test]
async fn navigation_clamps_at_the_ends() {
    let (mut s, _store) = opened_at_first(2).await;
    for _ in 0..3 {
        assert!(s.next_image());
        s.settle().await;
    }
    assert_eq!(s.frame().image.idx, 1);

    for _ in 0..3 {
        assert!(s.prev_image());
        s.settle().await;
    }
    assert_eq!(s.frame().image.idx, 0);
}

#[tokio::test]
async fn failed_navigation_reenables_controls() {
    let (mut s, _store) = opened_at_first(2).await;
    assert!(s.jump_to(99));
    s.settle().await;

    assert_eq!(last_level(&s), Some(NotificationLevel::Error));
    assert!(!s.is_busy());
    assert_eq!(s.frame().image.idx, 0);
    assert!(s.jump_to(1));
    s.settle().await;
    assert_eq!(s.frame().image.idx, 1);
}

#[tokio::test]
async fn edits_wait_for_navigation() {
    let (mut s, store) = opened_at_first(3).await;
    assert!(s.next_image());
    assert!(s.is_busy());

    s.toggle_masks_at(1, 1);
    assert_eq!(s.remove_selected(), 0);
    assert_eq!(last_level(&s), Some(NotificationLevel::Warning));
    assert!(matches!(
        s.add_category(NewCategory::new("Sand")),
        Err(ReefError::Busy(_))
    ));
    assert!(matches!(s.assign_category(-1), Err(ReefError::Busy(_))));
    assert_eq!(s.frame().masks().len(), 2);
    assert!(!s.history().can_undo());

    s.settle().await;
    assert_eq!(s.frame().image.idx, 1);
    // Frame 0 was stored as it was when navigation started.
    assert_eq!(store.dataset().frames[0].segmentation.annotations.len(), 2);
    assert!(!s.taxonomy().contains_name("Sand"));
}

#[tokio::test]
async fn history_waits_for_save() {
    let (mut s, store) = opened_at_first(2).await;
    s.toggle_masks_at(1, 1);
    assert_eq!(s.remove_selected(), 1);

    let dir = tempfile::tempdir().unwrap();
    assert!(s.save_dataset(dir.path().join("out.json")));
    assert!(!s.undo());
    assert!(!s.redo());
    assert!(matches!(s.rename_category(0, "Montipora"), Err(ReefError::Busy(_))));
    assert_eq!(s.frame().masks().len(), 1);

    s.settle().await;
    assert_eq!(store.dataset().frames[0].segmentation.annotations.len(), 1);
    // Once the save is done the edit can be undone again.
    assert!(s.undo());
    assert_eq!(s.frame().masks().len(), 2);
}

#[test]
fn navigation_without_store_warns() {
    let mut s = EditorSession::new(SessionConfig::default(), W, H);
    assert!(!s.next_image());
    assert_eq!(last_level(&s), Some(NotificationLevel::Warning));
}

// ── Saving and export ──────────────────────────────────────────

#[tokio::test]
async fn save_dataset_writes_current_edits() {
    let (mut s, _store) = opened_at_first(2).await;
    s.add_coral_category("Acropora").unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.json");
    assert!(s.save_dataset(path.clone()));
    s.settle().await;
    assert_eq!(last_level(&s), Some(NotificationLevel::Info));

    let written = DatasetFile::load_from_file(&path).unwrap();
    assert_eq!(written.frames.len(), 2);
    assert!(written.category_info.iter().any(|c| c.name == "Acropora"));
    // The saved frame hands its taxonomy to the project instead of keeping a copy.
    assert!(written.frames[0].category_info.is_none());
}

#[tokio::test]
async fn coco_export_writes_file() {
    let (mut s, _store) = opened_at_first(2).await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("coco.json");

    assert!(s.export(ExportKind::Coco, path.clone()));
    s.settle().await;
    assert_eq!(last_level(&s), Some(NotificationLevel::Info));

    let doc: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(doc["images"].as_array().map(Vec::len), Some(2));
    assert_eq!(doc["annotations"].as_array().map(Vec::len), Some(4));
}

#[tokio::test]
async fn unsupported_export_fails() {
    let (mut s, _store) = opened_at_first(1).await;
    let dir = tempfile::tempdir().unwrap();
    assert!(s.export(ExportKind::Excel, dir.path().join("report.xlsx")));
    s.settle().await;
    assert_eq!(last_level(&s), Some(NotificationLevel::Error));
    assert!(!s.is_busy());
}
