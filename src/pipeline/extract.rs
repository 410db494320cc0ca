//! Archive extraction and root-file selection.
//!
//! arXiv's e-print endpoint serves several shapes of payload and does not
//! say which: a gzipped tar bundle (the common case), a single gzipped
//! `.tex` file, rarely a bare tar or bare LaTeX text. The format is sniffed
//! from magic bytes rather than trusted from headers.
//!
//! ## Why a TempDir?
//!
//! The LaTeX toolchain needs a real directory to compile in, and the tree
//! is mutated destructively by the transforms. Extracting into a
//! `tempfile::TempDir` gives each run an exclusive scope that is removed on
//! every exit path, including compile failure — unless the caller asked to
//! keep it for inspection.

use crate::error::{Arxiv2KindleError, TransformWarning};
use flate2::read::GzDecoder;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// The extracted LaTeX project: working directory plus the chosen root file.
#[derive(Debug)]
pub struct SourceTree {
    dir: WorkdirHandle,
    root: PathBuf,
}

#[derive(Debug)]
enum WorkdirHandle {
    /// Removed on drop.
    Ephemeral(TempDir),
    /// Survives the run (`keep_workdir`).
    Kept(PathBuf),
}

impl SourceTree {
    /// The working directory.
    pub fn dir(&self) -> &Path {
        match &self.dir {
            WorkdirHandle::Ephemeral(d) => d.path(),
            WorkdirHandle::Kept(p) => p,
        }
    }

    /// Absolute path of the root `.tex` file.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether the directory outlives the run.
    pub fn is_kept(&self) -> bool {
        matches!(self.dir, WorkdirHandle::Kept(_))
    }
}

/// Unpack the downloaded bytes into a fresh working directory and locate
/// the root file.
///
/// `keep_workdir` detaches the directory from the run's lifetime.
pub fn extract_source(
    bytes: &[u8],
    keep_workdir: bool,
) -> Result<(SourceTree, Vec<TransformWarning>), Arxiv2KindleError> {
    let tempdir = tempfile::Builder::new()
        .prefix("arxiv2kindle_")
        .tempdir()
        .map_err(|e| Arxiv2KindleError::Internal(format!("tempdir: {e}")))?;

    populate(tempdir.path(), bytes)?;

    let mut warnings = Vec::new();
    let root = select_root(tempdir.path(), &mut warnings)?;
    info!("Root tex file: {}", root.display());

    let dir = if keep_workdir {
        let path = tempdir.keep();
        info!("Keeping working directory: {}", path.display());
        WorkdirHandle::Kept(path)
    } else {
        WorkdirHandle::Ephemeral(tempdir)
    };

    Ok((SourceTree { dir, root }, warnings))
}

/// Sniff the payload format and write the project files under `dir`.
fn populate(dir: &Path, bytes: &[u8]) -> Result<(), Arxiv2KindleError> {
    if is_gzip(bytes) {
        let mut inner = Vec::new();
        GzDecoder::new(bytes)
            .read_to_end(&mut inner)
            .map_err(|e| Arxiv2KindleError::Extraction {
                detail: format!("gunzip failed: {e}"),
            })?;
        debug!("Gunzipped {} → {} bytes", bytes.len(), inner.len());
        return populate_plain(dir, &inner);
    }
    populate_plain(dir, bytes)
}

/// Handle the non-gzip cases: tar bundle or bare LaTeX text.
fn populate_plain(dir: &Path, bytes: &[u8]) -> Result<(), Arxiv2KindleError> {
    if is_tar(bytes) {
        let mut archive = tar::Archive::new(bytes);
        archive.set_preserve_permissions(false);
        // `unpack` rejects entries that escape `dir`.
        archive
            .unpack(dir)
            .map_err(|e| Arxiv2KindleError::Extraction {
                detail: format!("untar failed: {e}"),
            })?;
        return Ok(());
    }

    if looks_like_tex(bytes) {
        // Single-file submission: the payload is the document itself.
        std::fs::write(dir.join("main.tex"), bytes)
            .map_err(|e| Arxiv2KindleError::Extraction {
                detail: format!("write main.tex: {e}"),
            })?;
        return Ok(());
    }

    Err(Arxiv2KindleError::Extraction {
        detail: "unrecognised archive format (not gzip, tar, or LaTeX text)".into(),
    })
}

fn is_gzip(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0x1f && bytes[1] == 0x8b
}

/// POSIX/GNU tar puts "ustar" at offset 257 of the first header block.
fn is_tar(bytes: &[u8]) -> bool {
    bytes.len() > 262 && &bytes[257..262] == b"ustar"
}

/// Bare LaTeX text starts with a comment or a control sequence.
fn looks_like_tex(bytes: &[u8]) -> bool {
    let text = String::from_utf8_lossy(&bytes[..bytes.len().min(512)]);
    matches!(
        text.trim_start_matches('\u{feff}').trim_start().as_bytes().first(),
        Some(b'%') | Some(b'\\')
    )
}

/// Pick the root `.tex` file among the extracted candidates.
///
/// A candidate is any `.tex` file containing `\documentclass`. Ties break
/// by presence of `\begin{document}`, then conventional names, then the
/// largest file (with a warning, since that last step is a guess).
fn select_root(
    dir: &Path,
    warnings: &mut Vec<TransformWarning>,
) -> Result<PathBuf, Arxiv2KindleError> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    for path in walk_files(dir) {
        if path.extension().is_some_and(|e| e == "tex") {
            let text = read_lossy(&path);
            if text.contains("\\documentclass") {
                candidates.push(path);
            }
        }
    }

    match candidates.len() {
        0 => Err(Arxiv2KindleError::NoRootFile {
            dir: dir.to_path_buf(),
        }),
        1 => Ok(candidates.remove(0)),
        _ => {
            let picked = break_tie(candidates, warnings);
            Ok(picked)
        }
    }
}

fn break_tie(mut candidates: Vec<PathBuf>, warnings: &mut Vec<TransformWarning>) -> PathBuf {
    // Prefer files that actually begin a document.
    let with_begin: Vec<PathBuf> = candidates
        .iter()
        .filter(|p| read_lossy(p).contains("\\begin{document}"))
        .cloned()
        .collect();
    if with_begin.len() == 1 {
        return with_begin.into_iter().next().unwrap();
    }
    if !with_begin.is_empty() {
        candidates = with_begin;
    }

    // Conventional names beat everything else.
    for name in ["main.tex", "ms.tex", "paper.tex"] {
        if let Some(p) = candidates
            .iter()
            .find(|p| p.file_name().is_some_and(|f| f == name))
        {
            return p.clone();
        }
    }

    // Last resort: the largest candidate is usually the document body.
    candidates.sort_by_key(|p| {
        std::cmp::Reverse(std::fs::metadata(p).map(|m| m.len()).unwrap_or(0))
    });
    let picked = candidates.remove(0);
    let name = picked
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    warn!("Multiple root candidates; picked {name} by size");
    warnings.push(TransformWarning::AmbiguousRoot { picked: name });
    picked
}

/// Recursively list regular files under `dir`.
///
/// Shared by root selection, the source transforms, and image downscaling.
pub(crate) fn walk_files(dir: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(d) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&d) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.is_file() {
                out.push(path);
            }
        }
    }
    out.sort();
    out
}

pub(crate) fn read_lossy(path: &Path) -> String {
    std::fs::read(path)
        .map(|b| String::from_utf8_lossy(&b).into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn gzip(bytes: &[u8]) -> Vec<u8> {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(bytes).unwrap();
        enc.finish().unwrap()
    }

    fn tarball(files: &[(&str, &str)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, name, content.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap()
    }

    const MAIN: &str = "\\documentclass{article}\n\\begin{document}\nhi\n\\end{document}\n";

    #[test]
    fn extracts_gzipped_tarball() {
        let archive = gzip(&tarball(&[("paper.tex", MAIN), ("refs.bib", "@misc{x}")]));
        let (tree, warnings) = extract_source(&archive, false).unwrap();
        assert!(warnings.is_empty());
        assert!(tree.root().ends_with("paper.tex"));
        assert!(tree.dir().join("refs.bib").exists());
    }

    #[test]
    fn extracts_single_gzipped_tex() {
        let archive = gzip(MAIN.as_bytes());
        let (tree, _) = extract_source(&archive, false).unwrap();
        assert!(tree.root().ends_with("main.tex"));
    }

    #[test]
    fn extracts_bare_tex_text() {
        let (tree, _) = extract_source(MAIN.as_bytes(), false).unwrap();
        assert_eq!(read_lossy(tree.root()), MAIN);
    }

    #[test]
    fn rejects_unknown_format() {
        let err = extract_source(&[0u8; 600], false).unwrap_err();
        assert!(matches!(err, Arxiv2KindleError::Extraction { .. }));
    }

    #[test]
    fn errors_when_no_documentclass() {
        let archive = gzip(&tarball(&[("notes.tex", "no class here")]));
        let err = extract_source(&archive, false).unwrap_err();
        assert!(matches!(err, Arxiv2KindleError::NoRootFile { .. }));
    }

    #[test]
    fn root_selection_prefers_begin_document() {
        // Both declare a class; only one begins a document (the other is an
        // \input'd preamble fragment some bundles ship).
        let preamble = "\\documentclass{article}\n% shared preamble\n";
        let archive = gzip(&tarball(&[("preamble.tex", preamble), ("body.tex", MAIN)]));
        let (tree, warnings) = extract_source(&archive, false).unwrap();
        assert!(tree.root().ends_with("body.tex"));
        assert!(warnings.is_empty());
    }

    #[test]
    fn root_selection_falls_back_to_largest_with_warning() {
        let a = "\\documentclass{article}\n\\begin{document}\nshort\n\\end{document}\n";
        let b = "\\documentclass{article}\n\\begin{document}\nmuch longer body text here\n\\end{document}\n";
        let archive = gzip(&tarball(&[("a.tex", a), ("b.tex", b)]));
        let (tree, warnings) = extract_source(&archive, false).unwrap();
        assert!(tree.root().ends_with("b.tex"));
        assert!(matches!(
            warnings.as_slice(),
            [TransformWarning::AmbiguousRoot { .. }]
        ));
    }

    #[test]
    fn kept_workdir_survives_drop() {
        let (tree, _) = extract_source(MAIN.as_bytes(), true).unwrap();
        let dir = tree.dir().to_path_buf();
        assert!(tree.is_kept());
        drop(tree);
        assert!(dir.exists());
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn ephemeral_workdir_removed_on_drop() {
        let (tree, _) = extract_source(MAIN.as_bytes(), false).unwrap();
        let dir = tree.dir().to_path_buf();
        drop(tree);
        assert!(!dir.exists());
    }
}
