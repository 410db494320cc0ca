//! Raster figure downscaling.
//!
//! Papers routinely ship multi-megapixel figures that a 6-inch panel can
//! only show at a few hundred pixels across. Re-encoding them to the page's
//! pixel budget shrinks the PDF and spares the e-reader's CPU at render
//! time. Vector formats (PDF, EPS, SVG) scale losslessly and are left
//! untouched.
//!
//! ## Guarantees
//!
//! * Never upscales: images already inside the budget are skipped.
//! * Never grows a file: the rewrite is kept only when the new encoding is
//!   no larger than the original.
//! * Never fatal: an undecodable figure becomes a [`TransformWarning`] and
//!   the run continues.
//!
//! Decoding and re-encoding are CPU-bound, so the batch runs under
//! `tokio::task::spawn_blocking` to keep the async workers free.

use crate::config::ConvertOptions;
use crate::error::TransformWarning;
use crate::pipeline::extract::{walk_files, SourceTree};
use image::ImageFormat;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Downscale every raster figure in the tree to the page's pixel budget.
///
/// Returns the number of figures rewritten plus any warnings.
pub async fn downscale_images(
    tree: &SourceTree,
    options: &ConvertOptions,
) -> (usize, Vec<TransformWarning>) {
    if !options.downscale_images {
        return (0, Vec::new());
    }

    let files: Vec<PathBuf> = walk_files(tree.dir())
        .into_iter()
        .filter(|p| raster_format(p).is_some())
        .collect();
    if files.is_empty() {
        return (0, Vec::new());
    }

    let (max_w, max_h) = options.image_pixel_budget();
    match tokio::task::spawn_blocking(move || downscale_batch(&files, max_w, max_h)).await {
        Ok(result) => result,
        Err(e) => {
            warn!("Image downscale task panicked: {e}");
            (0, Vec::new())
        }
    }
}

/// Blocking implementation: process each file independently.
fn downscale_batch(files: &[PathBuf], max_w: u32, max_h: u32) -> (usize, Vec<TransformWarning>) {
    let mut rewritten = 0usize;
    let mut warnings = Vec::new();

    for path in files {
        match downscale_one(path, max_w, max_h) {
            Ok(true) => rewritten += 1,
            Ok(false) => {}
            Err(detail) => {
                warn!("Leaving {} untouched: {detail}", path.display());
                warnings.push(TransformWarning::ImageSkipped {
                    file: path.display().to_string(),
                    detail,
                });
            }
        }
    }

    if rewritten > 0 {
        info!("Downscaled {rewritten} figure(s) to {max_w}×{max_h}px budget");
    }
    (rewritten, warnings)
}

/// Downscale a single figure in place. Returns `Ok(true)` when the file was
/// rewritten, `Ok(false)` when it was already small enough (or the smaller
/// encoding did not actually save bytes).
fn downscale_one(path: &Path, max_w: u32, max_h: u32) -> Result<bool, String> {
    let format = raster_format(path).ok_or_else(|| "not a raster format".to_string())?;

    let original = std::fs::read(path).map_err(|e| format!("read: {e}"))?;
    let img = image::load_from_memory_with_format(&original, format)
        .map_err(|e| format!("decode: {e}"))?;

    if img.width() <= max_w && img.height() <= max_h {
        debug!(
            "{} already within budget ({}×{})",
            path.display(),
            img.width(),
            img.height()
        );
        return Ok(false);
    }

    // `thumbnail` preserves aspect ratio and never upscales.
    let scaled = img.thumbnail(max_w, max_h);
    let mut encoded = Vec::with_capacity(original.len() / 2);
    scaled
        .write_to(&mut Cursor::new(&mut encoded), format)
        .map_err(|e| format!("encode: {e}"))?;

    // A downscale that grows the file (tiny palettes re-encoded as
    // truecolour, already heavily-optimised PNGs) is not worth keeping.
    if encoded.len() >= original.len() {
        debug!(
            "{}: re-encoding larger than original ({} ≥ {} bytes), skipped",
            path.display(),
            encoded.len(),
            original.len()
        );
        return Ok(false);
    }

    std::fs::write(path, &encoded).map_err(|e| format!("write: {e}"))?;
    debug!(
        "{}: {}×{} → {}×{}, {} → {} bytes",
        path.display(),
        img.width(),
        img.height(),
        scaled.width(),
        scaled.height(),
        original.len(),
        encoded.len()
    );
    Ok(true)
}

/// Raster formats this stage rewrites. Everything else is left alone.
fn raster_format(path: &Path) -> Option<ImageFormat> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some(ImageFormat::Png),
        "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
        _ => None,
    }
}
