//! Output placement: stream the PDF to stdout or copy it to a destination.
//!
//! The PDF lives in the run's temporary working directory, which vanishes
//! when the run ends, so placement always copies the bytes out. Writes to a
//! path are atomic (temp file + rename) to prevent a half-written PDF when
//! the destination is on a slow or full disk.

use crate::error::Arxiv2KindleError;
use crate::output::PaperMetadata;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Where the compiled PDF goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Raw PDF bytes on standard output (`-`).
    Stdout,
    /// Copy into this directory as `<title slug>.pdf`.
    Directory(PathBuf),
    /// Write at exactly this path.
    File(PathBuf),
}

impl Destination {
    /// Interpret a CLI destination argument.
    ///
    /// `-` is stdout; an existing directory (or a trailing separator) is a
    /// directory; everything else is an explicit file path.
    pub fn parse(s: &str) -> Self {
        if s == "-" {
            return Self::Stdout;
        }
        let path = PathBuf::from(s);
        if path.is_dir() || s.ends_with('/') {
            Self::Directory(path)
        } else {
            Self::File(path)
        }
    }
}

/// Place the compiled PDF at the destination.
///
/// Returns the written path, or `None` for stdout.
pub async fn place_pdf(
    pdf_path: &Path,
    paper: &PaperMetadata,
    dest: &Destination,
) -> Result<Option<PathBuf>, Arxiv2KindleError> {
    let bytes = tokio::fs::read(pdf_path)
        .await
        .map_err(|e| Arxiv2KindleError::Internal(format!("read compiled PDF: {e}")))?;

    match dest {
        Destination::Stdout => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(&bytes)
                .and_then(|_| handle.flush())
                .map_err(|e| Arxiv2KindleError::OutputWriteFailed {
                    path: PathBuf::from("-"),
                    source: e,
                })?;
            debug!("Streamed {} bytes to stdout", bytes.len());
            Ok(None)
        }
        Destination::Directory(dir) => {
            let target = dir.join(derive_filename(paper));
            write_atomic(&target, &bytes).await?;
            info!("Wrote {}", target.display());
            Ok(Some(target))
        }
        Destination::File(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    Arxiv2KindleError::OutputWriteFailed {
                        path: path.clone(),
                        source: e,
                    }
                })?;
            }
            write_atomic(path, &bytes).await?;
            info!("Wrote {}", path.display());
            Ok(Some(path.clone()))
        }
    }
}

/// Atomic write: temp file in the same directory, then rename.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Arxiv2KindleError> {
    let tmp_path = path.with_extension("pdf.tmp");
    tokio::fs::write(&tmp_path, bytes)
        .await
        .map_err(|e| Arxiv2KindleError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Arxiv2KindleError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Derive the output filename from the paper title, falling back to the id.
///
/// Path separators and control characters are dropped, whitespace runs are
/// collapsed, and the stem is capped so exotic titles cannot overflow
/// filesystem limits.
pub(crate) fn derive_filename(paper: &PaperMetadata) -> String {
    let cleaned: String = paper
        .title
        .chars()
        .map(|c| match c {
            '/' | '\\' => ' ',
            c if c.is_control() => ' ',
            c => c,
        })
        .collect();
    let mut stem = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if stem.is_empty() {
        stem = paper.id.replace('/', "_");
    }
    if stem.len() > 128 {
        let cut = stem
            .char_indices()
            .take_while(|(i, _)| *i <= 128)
            .last()
            .map(|(i, _)| i)
            .unwrap_or(0);
        stem.truncate(cut);
        stem = stem.trim_end().to_string();
    }
    format!("{stem}.pdf")
}
