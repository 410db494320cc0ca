//! # arxiv2kindle
//!
//! Convert arXiv papers to e-reader-sized PDFs.
//!
//! ## Why this crate?
//!
//! Papers are typeset for letter/A4 paper; on a 6-inch e-ink screen that
//! means illegible type or constant panning. Instead of shrinking the
//! finished PDF, this crate fetches the paper's LaTeX *source*, rewrites it
//! for a small page (target geometry, one-sided layout, breakable formulas,
//! shrunken figures), downscales the raster figures, and re-typesets the
//! whole thing at the requested size.
//!
//! ## Pipeline Overview
//!
//! ```text
//! reference (id / URL / free text)
//!  │
//!  ├─ 1. Fetch      resolve via the arXiv API, download the source bundle
//!  ├─ 2. Extract    sniff gzip/tar, unpack to a TempDir, pick the root .tex
//!  ├─ 3. Transform  regex rewrites: geometry, oneside, breqn, figure caps
//!  ├─ 4. Images     re-encode raster figures to the page's pixel budget
//!  ├─ 5. Compile    pdflatex, two passes, captured log
//!  └─ 6. Place      stdout, directory, or explicit path
//! ```
//!
//! The transforms are deliberately heuristic — regex rules over arbitrary
//! user LaTeX. A rule that does not match a document's idiom silently does
//! nothing, and per-file trouble is reported as a warning, not a failure.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use arxiv2kindle::{convert, ConvertOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = ConvertOptions::builder()
//!         .width(4.0)
//!         .height(6.0)
//!         .margin(0.2)
//!         .build()?;
//!     let conversion = convert("1802.08395", &options).await?;
//!     std::fs::write("paper.pdf", conversion.pdf_bytes()?)?;
//!     eprintln!("{} warnings", conversion.warnings.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Requirements
//!
//! A LaTeX toolchain (`pdflatex` or compatible) on PATH. `pdftk` is used
//! opportunistically for landscape page rotation and is optional.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `arxiv2kindle` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only
//! deps:
//! ```toml
//! arxiv2kindle = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConvertOptions, ConvertOptionsBuilder};
pub use convert::{convert, convert_sync, convert_to_dest, convert_to_file, Destination};
pub use error::{Arxiv2KindleError, TransformWarning};
pub use output::{Conversion, ConversionStats, PaperMetadata};
