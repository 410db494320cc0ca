//! Result types returned by the `convert*` entry points.

use crate::error::TransformWarning;
use crate::pipeline::extract::SourceTree;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Metadata of the paper, resolved from the arXiv Atom API.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PaperMetadata {
    /// Canonical arXiv identifier, version suffix stripped (e.g. "1802.08395").
    pub id: String,
    /// Paper title as published.
    pub title: String,
    /// Author names, in publication order. May be empty for sparse feeds.
    pub authors: Vec<String>,
}

/// Timing and size statistics for one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversionStats {
    /// Wall-clock time resolving the paper and downloading the source bundle.
    pub fetch_duration_ms: u64,
    /// Wall-clock time of the textual transforms and image downscaling.
    pub transform_duration_ms: u64,
    /// Wall-clock time of all LaTeX passes combined.
    pub compile_duration_ms: u64,
    /// Total wall-clock time of the run.
    pub total_duration_ms: u64,
    /// LaTeX passes actually executed.
    pub passes_run: u32,
    /// Raster figures rewritten to a smaller encoding.
    pub images_downscaled: usize,
    /// Size of the produced PDF in bytes.
    pub pdf_bytes: u64,
}

/// A completed conversion: the compiled PDF plus everything a caller needs
/// to report on the run.
///
/// The PDF lives inside the run's working directory; `Conversion` keeps that
/// directory alive, so read or place the file before dropping this value
/// (the [`crate::convert_to_file`] and CLI paths do exactly that). With
/// `keep_workdir` the directory survives the drop instead.
#[derive(Debug, Serialize)]
pub struct Conversion {
    /// Path to the compiled PDF.
    pub pdf_path: PathBuf,
    /// Resolved paper metadata.
    pub paper: PaperMetadata,
    /// Non-fatal issues from the best-effort transforms.
    pub warnings: Vec<TransformWarning>,
    /// Run statistics.
    pub stats: ConversionStats,
    /// Working directory handle; dropping it removes the directory unless
    /// the run asked to keep it.
    #[serde(skip)]
    pub(crate) tree: SourceTree,
}

impl Conversion {
    /// Directory the sources were extracted and compiled in.
    pub fn workdir(&self) -> &Path {
        self.tree.dir()
    }

    /// Read the compiled PDF into memory.
    pub fn pdf_bytes(&self) -> std::io::Result<Vec<u8>> {
        std::fs::read(&self.pdf_path)
    }

    /// Filename the PDF gets when placed into a destination directory:
    /// the slugified title, falling back to the arXiv id.
    pub fn output_filename(&self) -> String {
        crate::pipeline::place::derive_filename(&self.paper)
    }

    /// Whether the working directory survives this value being dropped
    /// (`keep_workdir` was set).
    pub fn tree_kept(&self) -> bool {
        self.tree.is_kept()
    }
}
