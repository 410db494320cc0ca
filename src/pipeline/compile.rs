//! LaTeX compilation: drive the external engine over the transformed tree.
//!
//! The engine is an opaque subprocess: we hand it the root file, read its
//! exit status, and keep the captured log. Cross-references settle on the
//! second pass, so the engine runs `passes` times (default 2) and only the
//! last pass's log is reported.
//!
//! There is no retry policy. The transforms are heuristics over arbitrary
//! LaTeX, so when a compile breaks the right fix is a different set of
//! options, and the log tail in [`Arxiv2KindleError::CompileFailed`] is the
//! user's diagnostic for that.

use crate::config::ConvertOptions;
use crate::error::Arxiv2KindleError;
use crate::pipeline::extract::SourceTree;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Lines of engine output attached to a compile failure.
const LOG_TAIL_LINES: usize = 40;

/// Result of a successful compilation.
#[derive(Debug)]
pub struct CompileOutcome {
    /// The produced PDF, inside the working directory.
    pub pdf_path: PathBuf,
    /// Captured output of the final pass.
    pub log: String,
    /// Passes actually executed.
    pub passes_run: u32,
}

/// Compile the root file, running the engine `options.passes` times.
pub async fn compile(
    tree: &SourceTree,
    options: &ConvertOptions,
) -> Result<CompileOutcome, Arxiv2KindleError> {
    let engine = options.latex_engine.as_str();
    let root = tree.root();
    let root_name = root
        .file_name()
        .ok_or_else(|| Arxiv2KindleError::Internal("root file has no name".into()))?
        .to_string_lossy()
        .into_owned();

    let mut log = String::new();
    for pass in 1..=options.passes {
        info!("LaTeX pass {pass}/{} ({engine} {root_name})", options.passes);
        let output = Command::new(engine)
            .arg("-interaction=nonstopmode")
            .arg("-halt-on-error")
            .arg(&root_name)
            .current_dir(tree.dir())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Arxiv2KindleError::CompilerNotFound {
                        engine: engine.to_string(),
                    }
                } else {
                    Arxiv2KindleError::Internal(format!("spawn {engine}: {e}"))
                }
            })?;

        log = String::from_utf8_lossy(&output.stdout).into_owned();
        log.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            return Err(Arxiv2KindleError::CompileFailed {
                engine: engine.to_string(),
                root: root_name,
                log_tail: log_tail(&log, LOG_TAIL_LINES),
            });
        }
        debug!("Pass {pass} ok ({} bytes of log)", log.len());
    }

    let pdf_path = root.with_extension("pdf");
    if !pdf_path.exists() {
        return Err(Arxiv2KindleError::CompileFailed {
            engine: engine.to_string(),
            root: root_name,
            log_tail: format!(
                "engine exited 0 but produced no PDF\n{}",
                log_tail(&log, LOG_TAIL_LINES)
            ),
        });
    }

    Ok(CompileOutcome {
        pdf_path,
        log,
        passes_run: options.passes,
    })
}

/// Rotate every page east with `pdftk`, for landscape reading on devices
/// that do not auto-rotate.
///
/// Best effort: the geometry already has the landscape dimensions, so a
/// missing or failing `pdftk` degrades to an unrotated (still correctly
/// sized) PDF. The error string becomes a [`crate::error::TransformWarning`].
pub async fn rotate_east(pdf_path: &Path) -> Result<(), String> {
    let rotated = pdf_path.with_extension("rotated.pdf");

    let output = Command::new("pdftk")
        .arg(pdf_path)
        .arg("rotate")
        .arg("1-endeast")
        .arg("output")
        .arg(&rotated)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                "pdftk not found on PATH".to_string()
            } else {
                format!("spawn pdftk: {e}")
            }
        })?;

    if !output.status.success() {
        return Err(format!(
            "pdftk exited {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }

    std::fs::rename(&rotated, pdf_path).map_err(|e| format!("replace rotated PDF: {e}"))?;
    info!("Rotated pages east for landscape display");
    Ok(())
}

/// Last `n` lines of the engine log.
fn log_tail(log: &str, n: usize) -> String {
    let lines: Vec<&str> = log.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}
