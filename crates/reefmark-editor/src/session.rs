//! The editing session.
//!
//! [`EditorSession`] owns the live frame and taxonomy plus every subsystem
//! that reads or changes them. Input arrives as pointer, wheel and key calls;
//! collaborator calls are spawned on the ambient tokio runtime and their
//! results are applied by [`EditorSession::poll_events`] at the start of the
//! next draw tick, so nothing here ever blocks drawing.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use glam::Vec2;
use reefmark_ai::{
    AiResult, CoralDetectionConfig, InferenceClient, PreviewRequest, PromptMaskCreator, Quadrat,
    QuadratDepth,
};
use reefmark_core::category::PREDICTED_ID;
use reefmark_core::{
    Category, CategoryId, Frame, ImageRef, Mask, MaskId, NewCategory, Prompt, ReefError, Result,
    Taxonomy,
};
use reefmark_edit::{
    ExportKind, Exporter, FrameResponse, GalleryItem, HistoryManager, ProjectInfo, ProjectStore,
    Record, SelectionManager, DEFAULT_HISTORY_SIZE,
};
use reefmark_render::{
    Compositor, CompositorConfig, Overlay, RasterBuffer, Viewport, ViewportConfig,
};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::action::{ActionMachine, ActionState, Direction, Effect, Tool, Trigger};
use crate::shortcuts::{KeyEvent, ShortcutDispatcher};

// ── Configuration ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub history_capacity: usize,
    pub compositor: CompositorConfig,
    pub viewport: ViewportConfig,
    /// Secondary-button travel, in screen pixels, under which a release still
    /// counts as a right click.
    pub click_slop: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_SIZE,
            compositor: CompositorConfig::default(),
            viewport: ViewportConfig::default(),
            click_slop: 3.0,
        }
    }
}

// ── Notifications ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// Transient message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

// ── Input ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    /// Select masks, place prompts and corners.
    Primary,
    /// Pan; a press released in place is a right click.
    Secondary,
}

#[derive(Debug, Clone, Copy)]
struct PanDrag {
    start: Vec2,
    last: Vec2,
    dragged: bool,
}

/// Corners placed so far for a quadrat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuadratDraft {
    pub first: Option<(i32, i32)>,
    pub rect: Option<Quadrat>,
}

impl QuadratDraft {
    /// The first click starts a rectangle, the second completes it, a third
    /// starts over.
    fn place(&mut self, x: i32, y: i32) {
        match self.first.take() {
            Some((x1, y1)) if self.rect.is_none() => self.rect = Some(Quadrat::new(x1, y1, x, y)),
            _ => {
                self.first = Some((x, y));
                self.rect = None;
            }
        }
    }

    fn outline(&self) -> Option<(Vec2, Vec2)> {
        if let Some(q) = self.rect {
            return Some((
                Vec2::new(q.x1 as f32, q.y1 as f32),
                Vec2::new(q.x2 as f32, q.y2 as f32),
            ));
        }
        self.first.map(|(x, y)| {
            let p = Vec2::new(x as f32, y as f32);
            (p, p)
        })
    }
}

// ── Async plumbing ──────────────────────────────────────────────

#[derive(Debug)]
struct LoadedFrame {
    response: FrameResponse,
    image: Option<RasterBuffer>,
}

#[derive(Debug, Clone, Copy)]
enum Fetch {
    Current,
    Next,
    Prev,
    Index(usize),
}

enum SessionEvent {
    Preview { version: u64, result: AiResult<Mask> },
    Detection { generation: u64, result: AiResult<Vec<Mask>> },
    Depth { generation: u64, result: AiResult<QuadratDepth> },
    FrameLoaded(Result<LoadedFrame>),
    ProjectOpened(Result<(ProjectInfo, LoadedFrame)>),
    Saved(Result<()>),
    Exported { kind: ExportKind, result: Result<()> },
    /// The task ended without an answer (it panicked or was cancelled).
    Abandoned { busy: bool },
}

/// Sends the task's event, or [`SessionEvent::Abandoned`] if dropped first.
struct Completion {
    tx: Option<mpsc::UnboundedSender<SessionEvent>>,
    busy: bool,
}

impl Completion {
    fn finish(mut self, event: SessionEvent) {
        if let Some(tx) = self.tx.take() {
            // The receiver lives as long as the session.
            let _ = tx.send(event);
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(SessionEvent::Abandoned { busy: self.busy });
        }
    }
}

fn load_image(path: &str) -> Option<RasterBuffer> {
    if path.is_empty() {
        return None;
    }
    match RasterBuffer::load(Path::new(path)) {
        Ok(image) => Some(image),
        Err(e) => {
            warn!(path, error = %e, "Image not readable, using a placeholder");
            None
        }
    }
}

async fn fetch_frame(
    store: Arc<dyn ProjectStore>,
    save: Option<FrameResponse>,
    fetch: Fetch,
) -> Result<LoadedFrame> {
    if let Some(save) = save {
        store.save_data(save).await?;
    }
    let response = match fetch {
        Fetch::Current => store.current_data().await?,
        Fetch::Next => store.next_data().await?,
        Fetch::Prev => store.prev_data().await?,
        Fetch::Index(idx) => store.data_by_index(idx).await?,
    };
    let image = load_image(&response.image_path);
    Ok(LoadedFrame { response, image })
}

async fn load_project_and_frame(
    store: Arc<dyn ProjectStore>,
    path: PathBuf,
) -> Result<(ProjectInfo, LoadedFrame)> {
    let info = store.load_project(path).await?;
    let loaded = fetch_frame(store, None, Fetch::Current).await?;
    Ok((info, loaded))
}

// ── Session ─────────────────────────────────────────────────────

pub struct EditorSession {
    config: SessionConfig,
    frame: Frame,
    taxonomy: Taxonomy,
    history: HistoryManager,
    selection: SelectionManager,
    creator: PromptMaskCreator,
    machine: ActionMachine,
    shortcuts: ShortcutDispatcher,
    viewport: Viewport,
    compositor: Compositor,
    quadrat: QuadratDraft,
    last_depth: Option<QuadratDepth>,
    active_category: CategoryId,
    gallery: Vec<GalleryItem>,

    inference: Option<Arc<dyn InferenceClient>>,
    store: Option<Arc<dyn ProjectStore>>,
    exporter: Option<Arc<dyn Exporter>>,

    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    in_flight: usize,
    /// Save, export, detection or navigation running; those controls are off.
    busy: bool,
    /// Bumped on every frame load so late results for an old frame are dropped.
    generation: u64,

    pan: Option<PanDrag>,
    layers_dirty: bool,
    overlay_dirty: bool,
    notifications: Vec<Notification>,
}

impl EditorSession {
    /// Empty session drawing onto a `surface_width x surface_height` surface.
    pub fn new(config: SessionConfig, surface_width: u32, surface_height: u32) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            history: HistoryManager::new(config.history_capacity),
            viewport: Viewport::new(config.viewport, surface_width, surface_height),
            compositor: Compositor::new(config.compositor.clone(), RasterBuffer::new(0, 0)),
            config,
            frame: Frame::new(ImageRef::default(), 0, 0),
            taxonomy: Taxonomy::new(),
            selection: SelectionManager::new(),
            creator: PromptMaskCreator::new(0, 0),
            machine: ActionMachine::new(),
            shortcuts: ShortcutDispatcher::new(),
            quadrat: QuadratDraft::default(),
            last_depth: None,
            active_category: PREDICTED_ID,
            gallery: Vec::new(),
            inference: None,
            store: None,
            exporter: None,
            events_tx,
            events_rx,
            in_flight: 0,
            busy: false,
            generation: 0,
            pan: None,
            layers_dirty: true,
            overlay_dirty: true,
            notifications: Vec::new(),
        }
    }

    pub fn with_inference(mut self, client: Arc<dyn InferenceClient>) -> Self {
        self.inference = Some(client);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn ProjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_exporter(mut self, exporter: Arc<dyn Exporter>) -> Self {
        self.exporter = Some(exporter);
        self
    }

    // ── Accessors ───────────────────────────────────────────────

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn selection(&self) -> &SelectionManager {
        &self.selection
    }

    pub fn prompts(&self) -> &[Prompt] {
        self.creator.prompts()
    }

    pub fn preview(&self) -> Option<&Mask> {
        self.creator.preview()
    }

    pub fn state(&self) -> ActionState {
        self.machine.state()
    }

    pub fn controls_visible(&self) -> bool {
        self.machine.controls_visible()
    }

    pub fn shortcuts_mut(&mut self) -> &mut ShortcutDispatcher {
        &mut self.shortcuts
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    pub fn quadrat(&self) -> QuadratDraft {
        self.quadrat
    }

    pub fn last_depth(&self) -> Option<&QuadratDepth> {
        self.last_depth.as_ref()
    }

    pub fn gallery(&self) -> &[GalleryItem] {
        &self.gallery
    }

    pub fn active_category(&self) -> CategoryId {
        self.active_category
    }

    /// Category given to masks confirmed from prompts.
    pub fn set_active_category(&mut self, id: CategoryId) -> Result<()> {
        if id != PREDICTED_ID && self.taxonomy.get(id).is_none() {
            error!(category = id, "Cannot activate unknown category");
            return Err(ReefError::CategoryNotFound(id));
        }
        self.active_category = id;
        Ok(())
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    fn notify(&mut self, level: NotificationLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            NotificationLevel::Info => info!("{message}"),
            NotificationLevel::Warning => warn!("{message}"),
            NotificationLevel::Error => error!("{message}"),
        }
        self.notifications.push(Notification { level, message });
    }

    fn invalidate(&mut self) {
        self.layers_dirty = true;
        self.overlay_dirty = true;
    }

    // ── Loading ─────────────────────────────────────────────────

    /// Replace the taxonomy wholesale, e.g. when a project opens.
    pub fn set_taxonomy(&mut self, taxonomy: Taxonomy) {
        self.taxonomy = taxonomy;
        if self.taxonomy.get(self.active_category).is_none() {
            self.active_category = PREDICTED_ID;
        }
        self.invalidate();
    }

    /// Show `frame` over `image`. A missing or mis-sized image is replaced by
    /// a test pattern of the frame's size. History, selection, prompts and
    /// the quadrat are reset.
    pub fn load_frame(&mut self, frame: Frame, image: Option<RasterBuffer>) {
        let (width, height) = (frame.width(), frame.height());
        let image = match image {
            Some(image) if (image.width(), image.height()) == (width, height) => image,
            Some(image) => {
                warn!(
                    image = ?(image.width(), image.height()),
                    frame = ?(width, height),
                    "Image size does not match annotations, using a placeholder"
                );
                RasterBuffer::test_pattern(width, height)
            }
            None => RasterBuffer::test_pattern(width, height),
        };
        if let Some(client) = &self.inference {
            client.image_loaded(width, height, image.as_bytes());
        }

        self.viewport.set_image_size(width, height);
        self.compositor.set_image(image);
        self.creator.reset(width, height);
        self.selection.clear();
        self.history.clear();
        self.quadrat = QuadratDraft::default();
        self.last_depth = None;
        self.pan = None;
        self.machine.reset();
        self.generation += 1;
        info!(
            image = %frame.image.image_name,
            idx = frame.image.idx,
            masks = frame.masks().len(),
            width,
            height,
            "Frame loaded"
        );
        self.frame = frame;
        self.invalidate();
    }

    /// Decode a backend frame, take its category and status lists if it
    /// carries them, and show it.
    pub fn load_response(&mut self, response: FrameResponse, image: Option<RasterBuffer>) -> Result<()> {
        let frame = response.to_frame()?;
        if let Some(categories) = response.category_info {
            self.taxonomy.replace_categories(categories);
        }
        if let Some(statuses) = response.status_info {
            self.taxonomy.set_statuses(statuses);
        }
        if self.taxonomy.get(self.active_category).is_none() {
            self.active_category = PREDICTED_ID;
        }
        self.load_frame(frame, image);
        Ok(())
    }

    /// The current frame in wire form, ready for saving.
    pub fn frame_response(&self) -> FrameResponse {
        FrameResponse::from_frame(&self.frame, &self.taxonomy)
    }

    fn has_frame(&self) -> bool {
        self.generation > 0
    }

    // ── History ─────────────────────────────────────────────────

    fn snapshot(&self) -> Record {
        Record::capture(&self.frame, &self.taxonomy)
    }

    /// Push the current state as an undo point.
    pub fn record(&mut self) {
        let record = self.snapshot();
        self.history.record(record);
    }

    /// Run `mutate`, recording the state from before it only when it
    /// succeeds. `mutate` must leave the session untouched on failure.
    fn commit<T>(&mut self, what: &str, mutate: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.ensure_idle(what)?;
        let before = self.snapshot();
        match mutate(self) {
            Ok(value) => {
                self.history.record(before);
                self.invalidate();
                Ok(value)
            }
            Err(e) => {
                self.notify(NotificationLevel::Error, format!("{what} failed: {e}"));
                Err(e)
            }
        }
    }

    fn restore(&mut self, record: Record) {
        self.frame = record.frame;
        self.taxonomy.replace_categories(record.categories);
        if self.taxonomy.get(self.active_category).is_none() {
            self.active_category = PREDICTED_ID;
        }
        self.selection.clear();
        self.creator.clear_prompts();
        self.invalidate();
    }

    pub fn undo(&mut self) -> bool {
        if !self.ready_for("Undo") {
            return false;
        }
        let current = self.snapshot();
        match self.history.undo(current) {
            Some(record) => {
                self.restore(record);
                debug!(undo = self.history.undo_count(), redo = self.history.redo_count(), "Undo");
                true
            }
            None => {
                debug!("Nothing to undo");
                false
            }
        }
    }

    pub fn redo(&mut self) -> bool {
        if !self.ready_for("Redo") {
            return false;
        }
        let current = self.snapshot();
        match self.history.redo(current) {
            Some(record) => {
                self.restore(record);
                debug!(undo = self.history.undo_count(), redo = self.history.redo_count(), "Redo");
                true
            }
            None => {
                debug!("Nothing to redo");
                false
            }
        }
    }

    // ── Categories ──────────────────────────────────────────────

    pub fn add_coral_category(&mut self, name: &str) -> Result<(CategoryId, CategoryId)> {
        self.commit("Adding category", |s| s.taxonomy.add_coral_category(name))
    }

    pub fn add_category(&mut self, new: NewCategory) -> Result<CategoryId> {
        self.commit("Adding category", move |s| s.taxonomy.add_category(new))
    }

    pub fn rename_category(&mut self, id: CategoryId, new_name: &str) -> Result<()> {
        self.commit("Renaming category", |s| s.taxonomy.rename_category(id, new_name))
    }

    /// Remove categories; masks that used them go back to unassigned.
    pub fn remove_categories(&mut self, ids: &[CategoryId]) -> Result<Vec<Category>> {
        self.commit("Removing categories", |s| {
            let removed = s.taxonomy.remove_categories(ids)?;
            for category in &removed {
                let moved = s.frame.reassign_category(category.id, PREDICTED_ID);
                if moved > 0 {
                    debug!(category = category.id, masks = moved, "Masks unassigned");
                }
                if s.active_category == category.id {
                    s.active_category = PREDICTED_ID;
                }
            }
            Ok(removed)
        })
    }

    /// Give every selected mask `category`, then clear the selection.
    /// Returns how many masks changed.
    pub fn assign_category(&mut self, category: CategoryId) -> Result<usize> {
        if self.selection.is_empty() {
            return Ok(0);
        }
        self.ensure_idle("Assigning category")?;
        if category != PREDICTED_ID && self.taxonomy.get(category).is_none() {
            error!(category, "Cannot assign unknown category");
            return Err(ReefError::CategoryNotFound(category));
        }
        let ids = self.selection.ids();
        let changed = self.commit("Assigning category", |s| Ok(s.frame.set_category(&ids, category)))?;
        self.selection.clear();
        info!(category, masks = changed, "Category assigned");
        Ok(changed)
    }

    // ── Masks ───────────────────────────────────────────────────

    /// Toggle every visible mask covering `(x, y)`.
    pub fn toggle_masks_at(&mut self, x: i32, y: i32) -> usize {
        let hits: Vec<MaskId> = self
            .frame
            .masks_at(x as i64, y as i64)
            .into_iter()
            .filter(|&id| self.frame.mask(id).is_some_and(|m| m.visible))
            .collect();
        for &id in &hits {
            self.selection.toggle(id);
        }
        if !hits.is_empty() {
            debug!(x, y, toggled = hits.len(), selected = self.selection.len(), "Selection toggled");
            self.layers_dirty = true;
        }
        hits.len()
    }

    /// Delete the selected masks. Returns how many were removed.
    pub fn remove_selected(&mut self) -> usize {
        if self.selection.is_empty() || !self.ready_for("Removing masks") {
            return 0;
        }
        let ids = self.selection.ids();
        let removed = self
            .commit("Removing masks", |s| Ok(s.frame.remove_masks(&ids).len()))
            .unwrap_or(0);
        self.selection.clear();
        info!(removed, "Masks removed");
        removed
    }

    // ── Prompts ─────────────────────────────────────────────────

    pub fn add_prompt(&mut self, prompt: Prompt) {
        let request = self.creator.add_prompt(prompt);
        self.overlay_dirty = true;
        self.request_preview(request);
    }

    pub fn undo_prompt(&mut self) {
        let request = self.creator.undo_prompt();
        self.overlay_dirty = true;
        self.request_preview(request);
    }

    pub fn clear_prompts(&mut self) {
        self.creator.clear_prompts();
        self.overlay_dirty = true;
    }

    fn request_preview(&mut self, request: Option<PreviewRequest>) {
        let Some(request) = request else { return };
        let Some(client) = self.inference.clone() else {
            self.notify(NotificationLevel::Warning, "No segmentation service configured");
            return;
        };
        let version = request.version;
        let pending = client.request_mask_from_prompts(request.prompts, request.width, request.height);
        self.spawn(async move {
            SessionEvent::Preview {
                version,
                result: pending.await,
            }
        });
    }

    /// Append the preview to the frame with the active category. Returns the
    /// new mask id, or `None` when there is no preview yet. The frame is left
    /// unchanged when the mask cannot be added.
    pub fn confirm_prompt(&mut self) -> Result<Option<MaskId>> {
        self.ensure_idle("Confirming mask")?;
        let id = match self.frame.next_mask_id() {
            Ok(id) => id,
            Err(e) => {
                self.notify(NotificationLevel::Error, format!("Confirming mask failed: {e}"));
                return Err(e);
            }
        };
        let Some(mask) = self.creator.confirm(id, self.active_category) else {
            self.notify(NotificationLevel::Warning, "No preview mask to confirm yet");
            return Ok(None);
        };
        self.overlay_dirty = true;
        let id = self.commit("Confirming mask", move |s| s.frame.add_mask(mask))?;
        info!(mask = id, category = self.active_category, "Mask created from prompts");
        Ok(Some(id))
    }

    // ── Quadrat ─────────────────────────────────────────────────

    pub fn place_quadrat_corner(&mut self, x: i32, y: i32) {
        self.quadrat.place(x, y);
        self.overlay_dirty = true;
    }

    pub fn clear_quadrat(&mut self) {
        self.quadrat = QuadratDraft::default();
        self.overlay_dirty = true;
    }

    /// Ask for the depth map under the placed quadrat.
    pub fn request_quadrat_depth(&mut self) -> bool {
        let Some(quadrat) = self.quadrat.rect else {
            self.notify(NotificationLevel::Warning, "Place both quadrat corners first");
            return false;
        };
        if quadrat.is_degenerate() {
            self.notify(NotificationLevel::Warning, "Quadrat has no area");
            return false;
        }
        let Some(client) = self.inference.clone() else {
            self.notify(NotificationLevel::Warning, "No depth service configured");
            return false;
        };
        let generation = self.generation;
        let pending = client.request_quadrat_depth(quadrat.normalized());
        self.spawn(async move {
            SessionEvent::Depth {
                generation,
                result: pending.await,
            }
        })
    }

    // ── Detection ───────────────────────────────────────────────

    /// Run automatic coral detection on the current image; the found masks
    /// are merged into the frame when they arrive.
    pub fn detect_corals(&mut self, options: serde_json::Map<String, serde_json::Value>) -> bool {
        if !self.ready_for("Detection") {
            return false;
        }
        let Some(client) = self.inference.clone() else {
            self.notify(NotificationLevel::Warning, "No detection service configured");
            return false;
        };
        let config = CoralDetectionConfig {
            image_idx: self.frame.image.idx,
            image_path: self.frame.image.image_path.clone(),
            options,
        };
        let generation = self.generation;
        let pending = client.request_coral_detection(config);
        self.spawn_busy(async move {
            SessionEvent::Detection {
                generation,
                result: pending.await,
            }
        })
    }

    // ── Project ─────────────────────────────────────────────────

    /// Controls that serialize through the busy flag refuse while another
    /// such operation runs.
    fn ready_for(&mut self, what: &str) -> bool {
        if self.busy {
            self.notify(NotificationLevel::Warning, format!("{what} ignored, another operation is running"));
            return false;
        }
        true
    }

    /// Edits and history steps are refused while a busy operation runs.
    fn ensure_idle(&mut self, what: &str) -> Result<()> {
        if self.ready_for(what) {
            Ok(())
        } else {
            Err(ReefError::Busy(what.to_string()))
        }
    }

    fn store_for(&mut self, what: &str) -> Option<Arc<dyn ProjectStore>> {
        if !self.ready_for(what) {
            return None;
        }
        let store = self.store.clone();
        if store.is_none() {
            self.notify(NotificationLevel::Warning, format!("{what} needs an open project"));
        }
        store
    }

    pub fn open_project(&mut self, path: impl Into<PathBuf>) -> bool {
        let Some(store) = self.store_for("Opening project") else {
            return false;
        };
        let path = path.into();
        info!(path = %path.display(), "Opening project");
        self.spawn_busy(async move { SessionEvent::ProjectOpened(load_project_and_frame(store, path).await) })
    }

    pub fn next_image(&mut self) -> bool {
        self.navigate(Fetch::Next)
    }

    pub fn prev_image(&mut self) -> bool {
        self.navigate(Fetch::Prev)
    }

    pub fn jump_to(&mut self, idx: usize) -> bool {
        self.navigate(Fetch::Index(idx))
    }

    /// Save the current frame, then fetch another one.
    fn navigate(&mut self, fetch: Fetch) -> bool {
        let Some(store) = self.store_for("Navigation") else {
            return false;
        };
        let save = self.has_frame().then(|| self.frame_response());
        debug!(?fetch, "Navigating");
        self.spawn_busy(async move { SessionEvent::FrameLoaded(fetch_frame(store, save, fetch).await) })
    }

    pub fn save(&mut self) -> bool {
        let Some(store) = self.store_for("Saving") else {
            return false;
        };
        let data = self.frame_response();
        self.spawn_busy(async move { SessionEvent::Saved(store.save_data(data).await) })
    }

    /// Save the current frame, then write the whole project to `path`.
    pub fn save_dataset(&mut self, path: impl Into<PathBuf>) -> bool {
        let Some(store) = self.store_for("Saving") else {
            return false;
        };
        let data = self.has_frame().then(|| self.frame_response());
        let path = path.into();
        self.spawn_busy(async move {
            let result = match data {
                Some(data) => match store.save_data(data).await {
                    Ok(()) => store.save_dataset(path).await,
                    Err(e) => Err(e),
                },
                None => store.save_dataset(path).await,
            };
            SessionEvent::Saved(result)
        })
    }

    pub fn export(&mut self, kind: ExportKind, output: impl Into<PathBuf>) -> bool {
        if !self.ready_for("Export") {
            return false;
        }
        let Some(exporter) = self.exporter.clone() else {
            self.notify(NotificationLevel::Warning, "No exporter configured");
            return false;
        };
        let output = output.into();
        info!(?kind, path = %output.display(), "Exporting");
        self.spawn_busy(async move {
            SessionEvent::Exported {
                kind,
                result: exporter.export(kind, output).await,
            }
        })
    }

    /// Write the last quadrat depth map to `path` in its wire form, for
    /// downstream complexity analysis.
    pub fn save_quadrat_depth(&mut self, path: impl Into<PathBuf>) -> bool {
        if !self.ready_for("Saving depth map") {
            return false;
        }
        let Some(depth) = self.last_depth.as_ref() else {
            self.notify(NotificationLevel::Warning, "No quadrat depth map to save");
            return false;
        };
        let json = match serde_json::to_vec_pretty(depth) {
            Ok(json) => json,
            Err(e) => {
                self.notify(NotificationLevel::Error, format!("Depth map could not be encoded: {e}"));
                return false;
            }
        };
        let path = path.into();
        info!(path = %path.display(), "Saving quadrat depth");
        self.spawn_busy(async move { SessionEvent::Saved(std::fs::write(&path, json).map_err(ReefError::from)) })
    }

    // ── Async ───────────────────────────────────────────────────

    /// Run `task` on the ambient runtime; its event is applied by
    /// [`poll_events`](Self::poll_events).
    fn spawn<F>(&mut self, task: F) -> bool
    where
        F: Future<Output = SessionEvent> + Send + 'static,
    {
        self.spawn_tracked(task, false)
    }

    fn spawn_busy<F>(&mut self, task: F) -> bool
    where
        F: Future<Output = SessionEvent> + Send + 'static,
    {
        let spawned = self.spawn_tracked(task, true);
        self.busy = spawned;
        spawned
    }

    fn spawn_tracked<F>(&mut self, task: F, busy: bool) -> bool
    where
        F: Future<Output = SessionEvent> + Send + 'static,
    {
        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                self.notify(NotificationLevel::Warning, "No async runtime, request not sent");
                return false;
            }
        };
        let completion = Completion {
            tx: Some(self.events_tx.clone()),
            busy,
        };
        self.in_flight += 1;
        handle.spawn(async move {
            let event = task.await;
            completion.finish(event);
        });
        true
    }

    /// Apply every finished async result. Never waits. Returns how many were
    /// applied.
    pub fn poll_events(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.apply_event(event);
            applied += 1;
        }
        applied
    }

    /// Wait until nothing is in flight, applying results as they arrive.
    pub async fn settle(&mut self) {
        while self.in_flight > 0 {
            match self.events_rx.recv().await {
                Some(event) => self.apply_event(event),
                None => break,
            }
        }
    }

    fn apply_event(&mut self, event: SessionEvent) {
        self.in_flight = self.in_flight.saturating_sub(1);
        match event {
            SessionEvent::Preview { version, result } => match result {
                Ok(mask) => {
                    if self.creator.apply_preview(version, mask) {
                        self.overlay_dirty = true;
                    }
                }
                Err(e) if self.creator.is_current(version) => {
                    self.notify(NotificationLevel::Error, format!("Segmentation failed: {e}"));
                }
                Err(e) => debug!(version, error = %e, "Ignoring failure of a stale preview"),
            },
            SessionEvent::Detection { generation, result } => {
                self.busy = false;
                if generation != self.generation {
                    debug!("Dropping detection for a previous frame");
                    return;
                }
                match result {
                    Ok(masks) => {
                        let found = masks.len();
                        let merged = self.commit("Merging detections", move |s| {
                            let mut frame = s.frame.clone();
                            frame.merge_masks(masks)?;
                            s.frame = frame;
                            Ok(())
                        });
                        if merged.is_ok() {
                            self.notify(NotificationLevel::Info, format!("Detected {found} corals"));
                        }
                    }
                    Err(e) => self.notify(NotificationLevel::Error, format!("Detection failed: {e}")),
                }
            }
            SessionEvent::Depth { generation, result } => {
                if generation != self.generation {
                    debug!("Dropping depth map for a previous frame");
                    return;
                }
                match result {
                    Ok(depth) => {
                        self.notify(
                            NotificationLevel::Info,
                            format!("Quadrat depth ready ({}x{})", depth.cols, depth.rows),
                        );
                        self.last_depth = Some(depth);
                    }
                    Err(e) => self.notify(NotificationLevel::Error, format!("Depth request failed: {e}")),
                }
            }
            SessionEvent::FrameLoaded(result) => {
                self.busy = false;
                match result {
                    Ok(loaded) => {
                        if let Err(e) = self.load_response(loaded.response, loaded.image) {
                            self.notify(NotificationLevel::Error, format!("Frame could not be decoded: {e}"));
                        }
                    }
                    Err(e) => self.notify(NotificationLevel::Error, format!("Navigation failed: {e}")),
                }
            }
            SessionEvent::ProjectOpened(result) => {
                self.busy = false;
                match result {
                    Ok((info, loaded)) => {
                        info!(images = info.gallery.len(), categories = info.category_info.len(), "Project opened");
                        self.gallery = info.gallery;
                        self.taxonomy.replace(info.category_info, info.status_info);
                        if let Err(e) = self.load_response(loaded.response, loaded.image) {
                            self.notify(NotificationLevel::Error, format!("Frame could not be decoded: {e}"));
                        }
                    }
                    Err(e) => self.notify(NotificationLevel::Error, format!("Opening project failed: {e}")),
                }
            }
            SessionEvent::Saved(result) => {
                self.busy = false;
                match result {
                    Ok(()) => self.notify(NotificationLevel::Info, "Saved"),
                    Err(e) => self.notify(NotificationLevel::Error, format!("Saving failed: {e}")),
                }
            }
            SessionEvent::Exported { kind, result } => {
                self.busy = false;
                match result {
                    Ok(()) => self.notify(NotificationLevel::Info, format!("{kind:?} export finished")),
                    Err(e) => self.notify(NotificationLevel::Error, format!("{kind:?} export failed: {e}")),
                }
            }
            SessionEvent::Abandoned { busy } => {
                if busy {
                    self.busy = false;
                }
                self.notify(NotificationLevel::Error, "A background request stopped without an answer");
            }
        }
    }

    // ── Input ───────────────────────────────────────────────────

    /// Feed a trigger through the mode machine and carry out its effect.
    pub fn trigger(&mut self, trigger: Trigger) {
        let effect = self.machine.apply(trigger);
        self.run_effect(effect);
    }

    fn run_effect(&mut self, effect: Effect) {
        match effect {
            Effect::None => {}
            Effect::ToggleMasksAt { x, y } => {
                self.toggle_masks_at(x, y);
            }
            Effect::EnterTool(tool) => {
                debug!(?tool, "Tool active");
                self.selection.clear();
                self.layers_dirty = true;
            }
            Effect::ExitTool(tool) => {
                match tool {
                    Tool::CreateMask => self.creator.clear_prompts(),
                    Tool::CreateQuadrat => self.quadrat = QuadratDraft::default(),
                }
                self.selection.clear();
                self.invalidate();
            }
            Effect::HistoryUndo => {
                self.undo();
            }
            Effect::HistoryRedo => {
                self.redo();
            }
            Effect::RemoveSelected => {
                self.remove_selected();
            }
            Effect::Navigate(Direction::Next) => {
                self.next_image();
            }
            Effect::Navigate(Direction::Prev) => {
                self.prev_image();
            }
            Effect::ToggleMaskLayer => {
                self.toggle_masks();
            }
            Effect::AddPrompt(prompt) => self.add_prompt(prompt),
            Effect::UndoPrompt => self.undo_prompt(),
            Effect::ResetPrompts => self.clear_prompts(),
            Effect::ConfirmPrompt => {
                // Failures are already reported as notifications.
                let _ = self.confirm_prompt();
            }
            Effect::PlaceQuadratCorner { x, y } => self.place_quadrat_corner(x, y),
            Effect::ResetQuadrat => self.clear_quadrat(),
            Effect::ConfirmQuadrat => {
                self.request_quadrat_depth();
            }
        }
    }

    /// Image pixel under a screen position, if it lies on the image.
    fn image_pixel(&self, screen: Vec2) -> Option<(i32, i32)> {
        let p = self.viewport.screen_to_image(screen).floor();
        let (x, y) = (p.x as i64, p.y as i64);
        self.frame.contains(x, y).then_some((x as i32, y as i32))
    }

    pub fn pointer_down(&mut self, button: PointerButton, pos: Vec2) {
        match button {
            PointerButton::Primary => {
                if let Some((x, y)) = self.image_pixel(pos) {
                    self.trigger(Trigger::LeftClick { x, y });
                }
            }
            PointerButton::Secondary => {
                self.pan = Some(PanDrag {
                    start: pos,
                    last: pos,
                    dragged: false,
                });
            }
        }
    }

    pub fn pointer_move(&mut self, pos: Vec2) {
        if let Some(drag) = &mut self.pan {
            let delta = pos - drag.last;
            drag.last = pos;
            if pos.distance(drag.start) > self.config.click_slop {
                drag.dragged = true;
            }
            self.viewport.pan_by(delta);
        }
    }

    pub fn pointer_up(&mut self, button: PointerButton, pos: Vec2) {
        if button != PointerButton::Secondary {
            return;
        }
        self.pointer_move(pos);
        let Some(drag) = self.pan.take() else { return };
        if drag.dragged {
            return;
        }
        if let Some((x, y)) = self.image_pixel(drag.start) {
            self.trigger(Trigger::RightClick { x, y });
        }
    }

    pub fn wheel(&mut self, pos: Vec2, delta_y: f32) -> bool {
        self.viewport.zoom_at(pos, delta_y)
    }

    pub fn zoom_step(&mut self, zoom_in: bool) -> bool {
        self.viewport.zoom_step(zoom_in)
    }

    pub fn reset_viewpoint(&mut self) {
        self.viewport.reset_viewpoint();
    }

    /// Returns whether the key was bound in the current mode.
    pub fn key(&mut self, event: &KeyEvent) -> bool {
        match self.shortcuts.dispatch(self.machine.state(), event) {
            Some(trigger) => {
                self.trigger(trigger);
                true
            }
            None => false,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport.resize(width, height);
    }

    pub fn toggle_masks(&mut self) -> bool {
        let shown = self.compositor.toggle_masks();
        debug!(shown, "Mask visibility toggled");
        shown
    }

    // ── Drawing ─────────────────────────────────────────────────

    /// Rebuild whatever layers changed since the last call.
    pub fn refresh_layers(&mut self) {
        if self.layers_dirty {
            self.selection.retain_existing(&self.frame);
            self.compositor
                .update_masks(&self.frame, &self.taxonomy, &self.selection.ids());
            self.layers_dirty = false;
        }
        if self.overlay_dirty {
            self.compositor.update_overlay(Overlay {
                preview: self.creator.preview(),
                prompts: self.creator.prompts(),
                quadrat: self.quadrat.outline(),
            });
            self.overlay_dirty = false;
        }
    }

    /// One draw tick: apply finished async work, rebuild stale layers and
    /// compose onto `surface`.
    pub fn draw(&mut self, surface: &mut RasterBuffer) {
        self.poll_events();
        self.refresh_layers();
        self.compositor.draw(&self.viewport, surface);
    }
}
