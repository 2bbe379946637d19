//! Integration tests for what a draw tick puts on the surface.
//!
//! Sessions here draw onto a surface the size of the image, so surface and
//! image pixels coincide until the view is zoomed or panned.

use glam::Vec2;
use reefmark_core::color::palette;
use reefmark_core::Prompt;
use reefmark_editor::{EditorSession, PointerButton, Tool, Trigger};
use reefmark_render::raster::{blend_over, RasterBuffer};

use crate::support::{key, session, MockInference, H, W};

fn draw(s: &mut EditorSession) -> RasterBuffer {
    let mut surface = RasterBuffer::new(W, H);
    s.draw(&mut surface);
    surface
}

fn base(s: &EditorSession, x: i64, y: i64) -> [u8; 4] {
    s.compositor().image().get(x, y).unwrap()
}

fn tinted(s: &EditorSession, x: i64, y: i64, color: reefmark_core::Color) -> [u8; 4] {
    let opacity = s.compositor().config().mask_opacity;
    blend_over(base(s, x, y), color.to_rgba8(), opacity)
}

// ── Viewport ───────────────────────────────────────────────────

#[test]
fn wheel_zoom_keeps_point_under_cursor() {
    let mut s = session();
    let anchor = Vec2::new(5.0, 7.0);
    let before = s.viewport().screen_to_image(anchor);

    assert!(s.wheel(anchor, -120.0));
    assert!(s.viewport().scale() > 1.0);
    assert!((s.viewport().screen_to_image(anchor) - before).length() < 1e-4);

    assert!(s.wheel(anchor, 120.0));
    assert!((s.viewport().scale() - 1.0).abs() < 1e-4);
    assert!(!s.wheel(anchor, 0.0));
}

#[test]
fn secondary_drag_pans_without_clicking() {
    let mut s = session();
    s.pointer_down(PointerButton::Secondary, Vec2::new(10.0, 10.0));
    s.pointer_move(Vec2::new(14.0, 12.0));
    s.pointer_up(PointerButton::Secondary, Vec2::new(16.0, 12.0));
    assert_eq!(s.viewport().origin(), Vec2::new(-6.0, -2.0));
    assert!(s.selection().is_empty());

    s.reset_viewpoint();
    assert_eq!(s.viewport().origin(), Vec2::ZERO);
    assert_eq!(s.viewport().scale(), 1.0);
}

#[test]
fn clicks_follow_the_view() {
    let mut s = session();
    // Shift the view so screen (1, 1) shows image (11, 11).
    s.pointer_down(PointerButton::Secondary, Vec2::new(15.0, 15.0));
    s.pointer_up(PointerButton::Secondary, Vec2::new(5.0, 5.0));
    s.pointer_down(PointerButton::Primary, Vec2::new(1.5, 1.5));
    assert!(s.selection().is_selected(1));
    assert!(!s.selection().is_selected(0));
}

// ── Mask layer ─────────────────────────────────────────────────

#[test]
fn unassigned_masks_are_tinted_red() {
    let mut s = session();
    let surface = draw(&mut s);
    assert_eq!(surface.get(3, 1), Some(tinted(&s, 3, 1, palette::PREDICTED)));
    assert_eq!(surface.get(12, 11), Some(tinted(&s, 12, 11, palette::PREDICTED)));
    // Outside every mask the image shows through untouched.
    assert_eq!(surface.get(8, 1), Some(base(&s, 8, 1)));
}

#[test]
fn v_hides_and_shows_masks() {
    let mut s = session();
    assert!(s.key(&key(1, "v")));
    let hidden = draw(&mut s);
    assert_eq!(hidden.get(3, 1), Some(base(&s, 3, 1)));

    // The toggle works in every mode.
    s.trigger(Trigger::ActivateTool(Tool::CreateMask));
    assert!(s.key(&key(2, "v")));
    let shown = draw(&mut s);
    assert_eq!(shown.get(3, 1), Some(tinted(&s, 3, 1, palette::PREDICTED)));
}

#[test]
fn selected_masks_use_focus_color() {
    let mut s = session();
    s.toggle_masks_at(1, 1);
    let surface = draw(&mut s);
    assert_eq!(surface.get(3, 1), Some(tinted(&s, 3, 1, palette::FOCUS)));
    assert_eq!(surface.get(12, 11), Some(tinted(&s, 12, 11, palette::PREDICTED)));

    // Deselecting restores the category color on the next tick.
    s.toggle_masks_at(1, 1);
    let surface = draw(&mut s);
    assert_eq!(surface.get(3, 1), Some(tinted(&s, 3, 1, palette::PREDICTED)));
}

#[test]
fn bleached_masks_get_a_border() {
    let mut s = session();
    let (_, bleached) = s.add_coral_category("Acropora").unwrap();
    s.toggle_masks_at(12, 12);
    s.assign_category(bleached).unwrap();
    let fill = s.taxonomy().mask_color(bleached);

    let surface = draw(&mut s);
    // Edge pixels carry the gray stamp, the interior the category color.
    for (x, y) in [(10, 14), (15, 13), (11, 10)] {
        assert_eq!(surface.get(x, y), Some(tinted(&s, x, y, palette::BLEACHED_BORDER)));
    }
    assert_eq!(surface.get(11, 11), Some(tinted(&s, 11, 11, fill)));
}

#[test]
fn hidden_mask_is_not_drawn() {
    let mut s = session();
    let mut frame = s.frame().clone();
    if let Some(mask) = frame.mask_mut(0) {
        mask.visible = false;
    }
    s.load_frame(frame, None);
    let surface = draw(&mut s);
    assert_eq!(surface.get(3, 1), Some(base(&s, 3, 1)));
    // Clicking where only a hidden mask lies selects nothing.
    assert_eq!(s.toggle_masks_at(3, 1), 0);
}

// ── Overlay ────────────────────────────────────────────────────

#[test]
fn quadrat_outline_is_drawn_on_top() {
    let mut s = session();
    s.trigger(Trigger::ActivateTool(Tool::CreateQuadrat));
    s.trigger(Trigger::LeftClick { x: 2, y: 2 });
    s.trigger(Trigger::LeftClick { x: 8, y: 7 });

    let surface = draw(&mut s);
    let focus = palette::FOCUS.to_rgba8();
    for (x, y) in [(2, 2), (5, 2), (8, 5), (4, 7)] {
        assert_eq!(surface.get(x, y), Some(focus), "({x}, {y})");
    }
    // Inside the outline the masks still show.
    assert_eq!(surface.get(5, 4), Some(tinted(&s, 5, 4, palette::PREDICTED)));

    s.trigger(Trigger::Back);
    let surface = draw(&mut s);
    assert_eq!(surface.get(5, 2), Some(tinted(&s, 5, 2, palette::PREDICTED)));
}

#[tokio::test]
async fn preview_is_drawn_over_masks() {
    let mock = MockInference::new();
    let mut s = session().with_inference(mock);
    s.trigger(Trigger::ActivateTool(Tool::CreateMask));
    s.add_prompt(Prompt::positive(15, 2));
    s.settle().await;

    let surface = draw(&mut s);
    let preview = palette::PROMPT
        .with_alpha(s.compositor().config().mask_opacity)
        .to_rgba8();
    // The one-prompt preview covers pixel (0, 0), which mask 0 also covers.
    let under = tinted(&s, 0, 0, palette::PREDICTED);
    assert_eq!(surface.get(0, 0), Some(blend_over(under, preview, 1.0)));
    // The prompt marker sits on its pixel.
    let marker = palette::POSITIVE_POINT.to_rgba8();
    assert_eq!(surface.get(15, 2), Some(marker));
}
