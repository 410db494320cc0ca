//! Conversion entry points: the whole pipeline behind one call.
//!
//! The pipeline is strictly sequential — fetch, extract, transform,
//! downscale, compile, place — and stateless between runs; each invocation
//! owns a fresh working directory, so concurrent runs on different inputs
//! never interact.

use crate::config::ConvertOptions;
use crate::error::{Arxiv2KindleError, TransformWarning};
use crate::output::{Conversion, ConversionStats};
use crate::pipeline::{compile, extract, fetch, images, place, transform};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

pub use crate::pipeline::place::Destination;

/// Convert an arXiv paper to an e-reader-sized PDF.
///
/// This is the primary entry point for the library. The returned
/// [`Conversion`] keeps the working directory (and thus the PDF) alive;
/// read or place the file before dropping it.
///
/// # Arguments
/// * `reference` — arXiv id, abstract/PDF URL, or free-text query
/// * `options`   — page geometry and pipeline knobs
///
/// # Errors
/// Any [`Arxiv2KindleError`]: the paper cannot be resolved, has no LaTeX
/// source, the archive is unreadable, or the compile fails. Transform-level
/// trouble never errors; it lands in [`Conversion::warnings`].
pub async fn convert(
    reference: impl AsRef<str>,
    options: &ConvertOptions,
) -> Result<Conversion, Arxiv2KindleError> {
    let total_start = Instant::now();
    let reference = reference.as_ref();
    info!("Starting conversion: {reference}");

    // ── Step 1: Resolve and download ─────────────────────────────────────
    let fetch_start = Instant::now();
    let paper = fetch::resolve_paper(reference, options).await?;
    let archive = fetch::download_source(&paper, options).await?;
    let fetch_duration_ms = fetch_start.elapsed().as_millis() as u64;

    // ── Step 2: Extract into a working directory ─────────────────────────
    let (tree, mut warnings) = extract::extract_source(&archive, options.keep_workdir)?;

    // ── Step 3+4: Rewrite sources, downscale figures ─────────────────────
    let transform_start = Instant::now();
    warnings.extend(transform::apply_transforms(&tree, options));
    let (images_downscaled, image_warnings) = images::downscale_images(&tree, options).await;
    warnings.extend(image_warnings);
    let transform_duration_ms = transform_start.elapsed().as_millis() as u64;

    // ── Step 5: Compile ──────────────────────────────────────────────────
    let compile_start = Instant::now();
    let outcome = compile::compile(&tree, options).await?;
    let compile_duration_ms = compile_start.elapsed().as_millis() as u64;

    // ── Step 6: Landscape rotation (best effort) ─────────────────────────
    if options.landscape {
        if let Err(detail) = compile::rotate_east(&outcome.pdf_path).await {
            warn!("Landscape rotation skipped: {detail}");
            warnings.push(TransformWarning::RotationSkipped { detail });
        }
    }

    let pdf_bytes = std::fs::metadata(&outcome.pdf_path)
        .map(|m| m.len())
        .unwrap_or(0);

    let stats = ConversionStats {
        fetch_duration_ms,
        transform_duration_ms,
        compile_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        passes_run: outcome.passes_run,
        images_downscaled,
        pdf_bytes,
    };

    info!(
        "Converted [{}] in {}ms ({} warnings)",
        paper.id,
        stats.total_duration_ms,
        warnings.len()
    );

    Ok(Conversion {
        pdf_path: outcome.pdf_path,
        paper,
        warnings,
        stats,
        tree,
    })
}

/// Convert and place the PDF at a destination in one call.
///
/// Returns the conversion (for stats and warnings) and the written path,
/// `None` when the destination was stdout.
pub async fn convert_to_dest(
    reference: impl AsRef<str>,
    dest: &Destination,
    options: &ConvertOptions,
) -> Result<(Conversion, Option<PathBuf>), Arxiv2KindleError> {
    let conversion = convert(reference, options).await?;
    let written = place::place_pdf(&conversion.pdf_path, &conversion.paper, dest).await?;
    Ok((conversion, written))
}

/// Convert and write the PDF at exactly `output_path`.
pub async fn convert_to_file(
    reference: impl AsRef<str>,
    output_path: impl Into<PathBuf>,
    options: &ConvertOptions,
) -> Result<Conversion, Arxiv2KindleError> {
    let dest = Destination::File(output_path.into());
    let (conversion, _) = convert_to_dest(reference, &dest, options).await?;
    Ok(conversion)
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    reference: impl AsRef<str>,
    options: &ConvertOptions,
) -> Result<Conversion, Arxiv2KindleError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Arxiv2KindleError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(convert(reference, options))
}
