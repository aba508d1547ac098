//! Batch rendering of template/data pairs into numbered slide images

use crate::assets;
use crate::document::{ResolutionPreset, SizeSpec};
use crate::engine::{OutputTarget, RenderEngine};
use crate::template::{DataRecord, TemplateResolver, TemplateSource};
use crate::{BrowserBackend, Result};
use log::info;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// One slide in a batch: a manifest template name and its data
#[derive(Debug, Clone, Deserialize)]
pub struct BatchItem {
    pub template: String,
    #[serde(default)]
    pub data: DataRecord,
}

/// Output file name for the item at `index` (zero-based): `slide-01.png`, …
pub fn output_name(index: usize) -> String {
    format!("slide-{:02}.png", index + 1)
}

/// Parse a JSON array of `{template, data}` objects.
pub fn parse_items(json: &str) -> Result<Vec<BatchItem>> {
    Ok(serde_json::from_str(json)?)
}

/// Render `items` one after another into `out_dir`.
///
/// The directory is created if needed. Items are rendered strictly in order
/// and the first failure aborts the batch; files already written for earlier
/// items are kept. Returns the written paths in input order.
pub fn render_batch<B: BrowserBackend>(
    engine: &RenderEngine<B>,
    resolver: &TemplateResolver,
    items: &[BatchItem],
    out_dir: &Path,
    preset: ResolutionPreset,
) -> Result<Vec<PathBuf>> {
    render_batch_with_assets(engine, resolver, items, out_dir, preset, None)
}

/// Like [`render_batch`], but local `<img>` sources in each resolved
/// fragment are first inlined relative to `assets_dir`.
pub fn render_batch_with_assets<B: BrowserBackend>(
    engine: &RenderEngine<B>,
    resolver: &TemplateResolver,
    items: &[BatchItem],
    out_dir: &Path,
    preset: ResolutionPreset,
    assets_dir: Option<&Path>,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir)?;
    let size = SizeSpec::from_preset(preset);

    let mut written = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let mut fragment = resolver.resolve(&TemplateSource::Named(item.template.clone()), &item.data)?;
        if let Some(dir) = assets_dir {
            fragment = assets::inline_local_images(&fragment, dir)?;
        }
        let path = out_dir.join(output_name(i));
        info!("Rendering {} -> {} ({})", item.template, path.display(), preset);
        engine.render(&fragment, &OutputTarget::File(path.clone()), &size)?;
        written.push(path);
    }
    info!("Batch complete: {} slide(s) in {}", written.len(), out_dir.display());
    Ok(written)
}
