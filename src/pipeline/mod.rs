//! Pipeline stages for arXiv-to-e-reader conversion.
//!
//! Each submodule implements exactly one step. Keeping stages separate makes
//! each independently testable and lets us swap implementations (e.g. a
//! different LaTeX engine) without touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! fetch ──▶ extract ──▶ transform ──▶ images ──▶ compile ──▶ place
//! (arXiv)   (tar/gz)    (regex)       (downscale) (pdflatex)  (stdout/dir)
//! ```
//!
//! 1. [`fetch`]     — resolve the paper reference via the arXiv API and
//!    download the source bundle; the only stage with network I/O
//! 2. [`extract`]   — sniff the archive format, unpack into a scoped
//!    working directory, pick the root `.tex` file
//! 3. [`transform`] — best-effort regex rewrites of the LaTeX source
//!    (geometry, one-sided, formula breaking, figure shrinking)
//! 4. [`images`]    — re-encode raster figures to the page's pixel budget;
//!    runs in `spawn_blocking` because image codecs are CPU-bound
//! 5. [`compile`]   — drive the external LaTeX engine, usually two passes
//! 6. [`place`]     — stream the PDF to stdout or copy it to a directory
//!
//! The stages run strictly in sequence; each completes before the next
//! begins, and nothing is shared across concurrent invocations.

pub mod compile;
pub mod extract;
pub mod fetch;
pub mod images;
pub mod place;
pub mod transform;
