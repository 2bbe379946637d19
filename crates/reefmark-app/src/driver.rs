//! Drives one editing session without a window.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use reefmark_ai::LocalSegmenter;
use reefmark_core::Taxonomy;
use reefmark_edit::{DatasetFile, ExportKind, InMemoryStore};
use reefmark_editor::{EditorSession, NotificationLevel, SessionConfig};
use reefmark_render::RasterBuffer;
use tracing::info;

pub const SURFACE_WIDTH: u32 = 1280;
pub const SURFACE_HEIGHT: u32 = 720;

/// Image paths in a dataset are relative to the dataset file.
fn resolve_image_paths(dataset: &mut DatasetFile, base: &Path) {
    for frame in &mut dataset.frames {
        let path = Path::new(&frame.image_path);
        if !frame.image_path.is_empty() && path.is_relative() {
            frame.image_path = base.join(path).to_string_lossy().into_owned();
        }
    }
}

/// Open the dataset at `dataset_path`, show its first frame, write the view
/// to `output` and a COCO export next to it.
pub async fn run(dataset_path: &Path, output: &Path) -> Result<()> {
    let mut dataset = DatasetFile::load_from_file(dataset_path)
        .with_context(|| format!("Failed to load {}", dataset_path.display()))?;
    if dataset.frames.is_empty() {
        bail!("{} has no frames", dataset_path.display());
    }
    if let Some(base) = dataset_path.parent() {
        resolve_image_paths(&mut dataset, base);
    }
    let taxonomy = Taxonomy::from_parts(dataset.category_info.clone(), dataset.status_info.clone());
    let store = Arc::new(InMemoryStore::from_dataset(dataset));

    let mut session = EditorSession::new(SessionConfig::default(), SURFACE_WIDTH, SURFACE_HEIGHT)
        .with_inference(Arc::new(LocalSegmenter::new()))
        .with_store(store.clone())
        .with_exporter(store.clone());
    session.set_taxonomy(taxonomy);

    session.jump_to(0);
    session.settle().await;
    check(&mut session)?;

    let mut surface = RasterBuffer::new(SURFACE_WIDTH, SURFACE_HEIGHT);
    session.draw(&mut surface);
    surface
        .save_png(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    info!(
        path = %output.display(),
        image = %session.frame().image.image_name,
        masks = session.frame().masks().len(),
        categories = session.taxonomy().len(),
        "View written"
    );

    session.export(ExportKind::Coco, output.with_extension("coco.json"));
    session.settle().await;
    check(&mut session)
}

/// Turn the first error the session reported into a failure.
fn check(session: &mut EditorSession) -> Result<()> {
    match session
        .take_notifications()
        .into_iter()
        .find(|n| n.level == NotificationLevel::Error)
    {
        Some(n) => bail!("{}", n.message),
        None => Ok(()),
    }
}
