//! Error types for the arxiv2kindle library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Arxiv2KindleError`] — **Fatal**: the conversion cannot proceed at all
//!   (paper not found, no LaTeX source, compiler missing or failing).
//!   Returned as `Err(Arxiv2KindleError)` from the top-level `convert*`
//!   functions.
//!
//! * [`TransformWarning`] — **Non-fatal**: a single source transform or image
//!   rewrite did not apply (unexpected markup, unreadable figure). The
//!   transforms are best-effort heuristics over arbitrary user LaTeX, so
//!   these are collected into [`crate::output::Conversion`] and the run
//!   continues.
//!
//! The separation keeps the contract of the original tool: a transform that
//! silently does nothing is accepted behaviour, while a fetch or compile
//! failure aborts the run with a human-readable message.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the arxiv2kindle library.
///
/// Transform-level issues use [`TransformWarning`] and are stored in
/// [`crate::output::Conversion`] rather than propagated here.
#[derive(Debug, Error)]
pub enum Arxiv2KindleError {
    // ── Fetch errors ──────────────────────────────────────────────────────
    /// The arXiv API returned no entry for the query.
    #[error("No arXiv paper found for '{query}'\nTry the bare identifier (e.g. 1802.08395) or the abstract page URL.")]
    PaperNotFound { query: String },

    /// Network request errored or returned a non-success status.
    #[error("Failed to fetch '{url}': {reason}\nCheck your internet connection.")]
    Fetch { url: String, reason: String },

    /// The download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    FetchTimeout { url: String, secs: u64 },

    /// arXiv has no LaTeX source for this paper (PDF-only submission).
    ///
    /// Not recoverable: this tool re-typesets from source and cannot work
    /// from a finished PDF.
    #[error("arXiv has no LaTeX source for '{id}' (PDF-only submission).\nThis tool needs the source bundle to re-typeset the paper.")]
    NoSourceAvailable { id: String },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// The downloaded archive could not be read or its format recognised.
    #[error("Could not unpack the source archive: {detail}")]
    Extraction { detail: String },

    /// No `.tex` file containing `\documentclass` was found after extraction.
    #[error("No compilable root .tex file in '{}'\nThe bundle has no file containing \\documentclass.", dir.display())]
    NoRootFile { dir: PathBuf },

    // ── Compile errors ────────────────────────────────────────────────────
    /// The LaTeX engine binary is not on PATH.
    #[error("LaTeX engine '{engine}' not found.\nInstall a TeX distribution (e.g. TeX Live) or point --latex at an engine.")]
    CompilerNotFound { engine: String },

    /// The LaTeX engine exited non-zero. The log tail is attached because
    /// the source transforms are heuristic and may be what broke the build.
    #[error("'{engine}' failed on {root}.\n──── log tail ────\n{log_tail}")]
    CompileFailed {
        engine: String,
        root: String,
        log_tail: String,
    },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not write the PDF to the requested destination.
    #[error("Failed to write output '{}': {source}", path.display())]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Arxiv2KindleError {
    /// Process exit code for this failure class.
    ///
    /// The CLI maps each class to its own non-zero code so scripts can tell
    /// "no source available" apart from a broken compile.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::PaperNotFound { .. } | Self::Fetch { .. } | Self::FetchTimeout { .. } => 2,
            Self::NoSourceAvailable { .. } => 3,
            Self::Extraction { .. } | Self::NoRootFile { .. } => 4,
            Self::CompilerNotFound { .. } | Self::CompileFailed { .. } => 5,
            Self::OutputWriteFailed { .. } => 6,
            Self::InvalidOptions(_) => 64,
            Self::Internal(_) => 70,
        }
    }
}

/// A non-fatal issue from one best-effort transform.
///
/// Collected in [`crate::output::Conversion::warnings`]; the run continues.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum TransformWarning {
    /// A textual rewrite rule failed on a file (I/O or encoding trouble).
    #[error("Transform '{rule}' skipped on {file}: {detail}")]
    RuleSkipped {
        rule: String,
        file: String,
        detail: String,
    },

    /// A raster figure could not be decoded or re-encoded.
    #[error("Image '{file}' left untouched: {detail}")]
    ImageSkipped { file: String, detail: String },

    /// Several root candidates existed; one was picked heuristically.
    #[error("Multiple root candidates; picked '{picked}'")]
    AmbiguousRoot { picked: String },

    /// Landscape rotation was requested but pdftk is unavailable or failed.
    #[error("Landscape rotation skipped: {detail}")]
    RotationSkipped { detail: String },
}
