//! Source transforms: regex rewrites that squeeze a paper onto a small screen.
//!
//! ## Why regex, not a LaTeX parser?
//!
//! The input is arbitrary user LaTeX. A real parser would reject half of
//! arXiv; cheap pattern rules applied to the common idioms convert the vast
//! majority of papers and *silently do nothing* on the rest. That
//! best-effort contract is deliberate: a rule that does not match is not an
//! error, and a rule that fails on a file is logged and skipped.
//!
//! Each rule is a pure `&str → String` function with no shared state, so the
//! set is easy to extend, re-order, and test in isolation.
//!
//! ## Rule order
//!
//! Comments are stripped first so the line-oriented figure and math rules
//! never fire inside commented-out code. Class options are scrubbed before
//! the one-sided conversion (both edit the same token list). Geometry is
//! injected after the class line is clean, and the scale-halving figure rule
//! must run *before* the bare-`\includegraphics` rule, whose output it would
//! otherwise halve again.

use crate::config::ConvertOptions;
use crate::error::TransformWarning;
use crate::pipeline::extract::{read_lossy, walk_files, SourceTree};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::{debug, warn};

/// Apply every source transform to the extracted tree, in place.
///
/// Returns the non-fatal warnings; the caller appends them to the run's
/// collection. Nothing here aborts the conversion.
pub fn apply_transforms(tree: &SourceTree, options: &ConvertOptions) -> Vec<TransformWarning> {
    let mut warnings = Vec::new();

    let root = tree.root();
    let original = read_lossy(root);
    if original.is_empty() {
        warnings.push(TransformWarning::RuleSkipped {
            rule: "root-rewrite".into(),
            file: root.display().to_string(),
            detail: "root file unreadable or empty".into(),
        });
        return warnings;
    }

    if !original.contains("\\begin{document}") {
        // Without an insertion point the geometry/math injections cannot
        // apply; leave the document alone rather than corrupt it.
        warnings.push(TransformWarning::RuleSkipped {
            rule: "root-rewrite".into(),
            file: root.display().to_string(),
            detail: "no \\begin{document} found".into(),
        });
        return warnings;
    }

    let rewritten = rewrite_root(&original, options);

    // Keep the pristine source next to the rewrite; with --keep-workdir
    // this is what makes a failed compile diagnosable.
    let backup = root.with_extension("tex.bak");
    if let Err(e) = std::fs::write(&backup, &original) {
        debug!("Could not write backup {}: {e}", backup.display());
    }
    if let Err(e) = std::fs::write(root, rewritten) {
        warnings.push(TransformWarning::RuleSkipped {
            rule: "root-rewrite".into(),
            file: root.display().to_string(),
            detail: e.to_string(),
        });
        return warnings;
    }

    // Conference style files often force two-column layout from inside the
    // .sty, out of reach of the documentclass scrub.
    for path in walk_files(tree.dir()) {
        if path.extension().is_some_and(|e| e == "sty") {
            let src = read_lossy(&path);
            let out = drop_twocolumn_lines(&src);
            if out != src {
                if let Err(e) = std::fs::write(&path, out) {
                    warn!("Could not rewrite {}: {e}", path.display());
                    warnings.push(TransformWarning::RuleSkipped {
                        rule: "single-column-sty".into(),
                        file: path.display().to_string(),
                        detail: e.to_string(),
                    });
                }
            }
        }
    }

    warnings
}

/// The full rewrite of the root file, as one pure function.
pub fn rewrite_root(src: &str, options: &ConvertOptions) -> String {
    let s = strip_comment_lines(src);
    let s = scrub_class_options(&s);
    let s = convert_to_oneside(&s);
    let (width, height) = options.page_size();
    let s = inject_geometry(&s, width, height, options.margin);
    let s = enable_math_breaking(&s);
    shrink_figures(&s)
}

// ── Rule 1: Strip comment and blank lines ────────────────────────────────────

/// Drop full-line `%` comments and blank lines from the root file.
///
/// The later rules are line-oriented; without this they would rewrite
/// commented-out figures and math.
fn strip_comment_lines(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for line in input.lines() {
        if line.starts_with('%') || line.trim().is_empty() {
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

// ── Rules 2+3: documentclass option editing ──────────────────────────────────

static RE_CLASS_OPTIONS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\documentclass\s*\[([^\]]*)\]").unwrap());
static RE_PT_OPTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+pt$").unwrap());
static RE_COLUMN_OPTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\w+column$").unwrap());
static RE_PAPER_OPTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\w+paper$").unwrap());

/// Rewrite the `\documentclass[...]` option list through `f`, normalising
/// commas and whitespace as a side effect.
fn map_class_options(input: &str, f: impl Fn(&str) -> Option<String>) -> String {
    RE_CLASS_OPTIONS
        .replace(input, |caps: &Captures<'_>| {
            let kept: Vec<String> = caps[1]
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .filter_map(&f)
                .collect();
            if kept.is_empty() {
                // An empty option list is valid but ugly; drop the brackets.
                "\\documentclass".to_string()
            } else {
                format!("\\documentclass[{}]", kept.join(","))
            }
        })
        .to_string()
}

/// Remove font-size, column, and paper-size class options: the injected
/// geometry overrides them all, and some classes error when both are given.
fn scrub_class_options(input: &str) -> String {
    map_class_options(input, |token| {
        if RE_PT_OPTION.is_match(token)
            || RE_COLUMN_OPTION.is_match(token)
            || RE_PAPER_OPTION.is_match(token)
        {
            None
        } else {
            Some(token.to_string())
        }
    })
}

/// Two-sided → one-sided: mirrored margins and alternating headers make no
/// sense on a screen. A document already one-sided is left unchanged.
fn convert_to_oneside(input: &str) -> String {
    map_class_options(input, |token| {
        if token == "twoside" {
            Some("oneside".to_string())
        } else {
            Some(token.to_string())
        }
    })
}

// ── Rule 4: Geometry injection ───────────────────────────────────────────────

static RE_GEOMETRY_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*\\usepackage(\[[^\]]*\])?\{geometry\}\s*$\n?").unwrap()
});

/// Replace the document's page geometry with the target screen size.
///
/// Any pre-existing `geometry` lines (the paper's own, or ours from an
/// earlier run) are removed first, which makes this rule idempotent: running
/// it twice yields one geometry declaration, not two conflicting ones.
fn inject_geometry(input: &str, width: f64, height: f64, margin: f64) -> String {
    let declaration = format!(
        "\\usepackage[paperwidth={width}in,paperheight={height}in,margin={margin}in]{{geometry}}"
    );

    // Fixed point: our declaration is already the only geometry line.
    if input.contains(&declaration) && RE_GEOMETRY_LINE.find_iter(input).count() == 1 {
        return input.to_string();
    }

    let cleaned = RE_GEOMETRY_LINE.replace_all(input, "").to_string();
    let preamble = format!(
        "{declaration}\n\
         \\usepackage{{times}}\n\
         \\pagestyle{{empty}}\n"
    );
    insert_before_begin_document(&cleaned, &preamble)
}

/// Insert `block` immediately before the `\begin{document}` line, skipping
/// lines already present (so repeated injections stay idempotent).
fn insert_before_begin_document(input: &str, block: &str) -> String {
    let Some(pos) = input.find("\\begin{document}") else {
        return input.to_string();
    };
    // Back up to the start of the line containing \begin{document}.
    let line_start = input[..pos].rfind('\n').map(|i| i + 1).unwrap_or(0);

    let mut out = String::with_capacity(input.len() + block.len());
    out.push_str(&input[..line_start]);
    for line in block.lines() {
        if !input.contains(line) {
            out.push_str(line);
            out.push('\n');
        }
    }
    out.push_str(&input[line_start..]);
    out
}

// ── Rule 5: Formula line-breaking ────────────────────────────────────────────

static RE_INLINE_MATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$.+\$").unwrap());

/// Let formulas break: `breqn` for displayed equations, `\allowdisplaybreaks`
/// for page breaks inside multi-line environments, and a `\sloppy` prefix on
/// every line carrying inline math so long formulas may wrap to a new line.
///
/// Heuristic and global; no per-formula analysis.
fn enable_math_breaking(input: &str) -> String {
    let s = insert_before_begin_document(input, "\\usepackage{breqn}\n");
    let s = insert_after_begin_document(&s, "\\allowdisplaybreaks[4]\n");

    let mut out = String::with_capacity(s.len());
    for line in s.lines() {
        if RE_INLINE_MATH.is_match(line) && !line.starts_with("\\sloppy") {
            out.push_str("\\sloppy ");
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Insert `block` on the line after `\begin{document}`, skipping lines
/// already present.
fn insert_after_begin_document(input: &str, block: &str) -> String {
    let Some(pos) = input.find("\\begin{document}") else {
        return input.to_string();
    };
    let line_end = input[pos..]
        .find('\n')
        .map(|i| pos + i + 1)
        .unwrap_or(input.len());

    let mut out = String::with_capacity(input.len() + block.len());
    out.push_str(&input[..line_end]);
    if !out.ends_with('\n') {
        out.push('\n');
    }
    for line in block.lines() {
        if !input.contains(line) {
            out.push_str(line);
            out.push('\n');
        }
    }
    out.push_str(&input[line_end..]);
    out
}

// ── Rule 6: Figure shrinking ─────────────────────────────────────────────────

static RE_GRAPHICS_RELATIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\includegraphics\[width=([.\d]+)\\(?:line|text)width\]").unwrap());
static RE_GRAPHICS_SCALED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\includegraphics\[scale=([.\d]+)\]").unwrap());
static RE_GRAPHICS_BARE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\includegraphics\{").unwrap());

/// Cap every figure at the page: relative widths gain a matching height cap
/// with `keepaspectratio`, absolute scales are halved, and unsized figures
/// get a conservative `scale=0.5`.
///
/// The scale-halving pass runs before the bare-figure pass so the `scale=0.5`
/// it inserts is not halved again.
fn shrink_figures(input: &str) -> String {
    let s = RE_GRAPHICS_RELATIVE.replace_all(input, |caps: &Captures<'_>| {
        let mul = &caps[1];
        format!(
            "\\includegraphics[width={mul}\\textwidth,height={mul}\\textheight,keepaspectratio]"
        )
    });
    let s = RE_GRAPHICS_SCALED.replace_all(&s, |caps: &Captures<'_>| {
        let scale: f64 = caps[1].parse().unwrap_or(1.0);
        format!("\\includegraphics[scale={}]", scale / 2.0)
    });
    RE_GRAPHICS_BARE
        .replace_all(&s, "\\includegraphics[scale=0.5]{")
        .to_string()
}

// ── Rule 7: Single-column style files ────────────────────────────────────────

/// Drop bare `\twocolumn` lines from a style file.
fn drop_twocolumn_lines(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for line in input.lines() {
        if line.trim() == "\\twocolumn" {
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> ConvertOptions {
        ConvertOptions::default()
    }

    #[test]
    fn strips_comment_and_blank_lines() {
        let input = "\\documentclass{article}\n% a comment\n\n  \ntext\n";
        assert_eq!(
            strip_comment_lines(input),
            "\\documentclass{article}\ntext\n"
        );
    }

    #[test]
    fn scrubs_size_column_paper_options() {
        let input = "\\documentclass[11pt,twocolumn,letterpaper,draft]{article}";
        assert_eq!(
            scrub_class_options(input),
            "\\documentclass[draft]{article}"
        );
    }

    #[test]
    fn scrub_drops_empty_bracket() {
        let input = "\\documentclass[10pt]{article}";
        assert_eq!(scrub_class_options(input), "\\documentclass{article}");
    }

    #[test]
    fn converts_twoside_to_oneside() {
        let input = "\\documentclass[twoside,11pt]{article}";
        assert_eq!(
            convert_to_oneside(input),
            "\\documentclass[oneside,11pt]{article}"
        );
    }

    #[test]
    fn oneside_document_left_unchanged() {
        let input = "\\documentclass[oneside,11pt]{article}";
        assert_eq!(convert_to_oneside(input), input);
    }

    #[test]
    fn geometry_is_injected_before_begin_document() {
        let input = "\\documentclass{article}\n\\begin{document}\nbody\n\\end{document}\n";
        let out = inject_geometry(input, 4.0, 6.0, 0.2);
        let geom_pos = out
            .find("\\usepackage[paperwidth=4in,paperheight=6in,margin=0.2in]{geometry}")
            .unwrap();
        assert!(geom_pos < out.find("\\begin{document}").unwrap());
        assert!(out.contains("\\usepackage{times}"));
        assert!(out.contains("\\pagestyle{empty}"));
    }

    #[test]
    fn geometry_injection_is_idempotent() {
        let input = "\\documentclass{article}\n\\begin{document}\nbody\n\\end{document}\n";
        let once = inject_geometry(input, 4.0, 6.0, 0.2);
        let twice = inject_geometry(&once, 4.0, 6.0, 0.2);
        assert_eq!(once, twice);
        assert_eq!(twice.matches("{geometry}").count(), 1);
    }

    #[test]
    fn geometry_replaces_existing_declaration() {
        let input = "\\documentclass{article}\n\
                     \\usepackage[a4paper,margin=1in]{geometry}\n\
                     \\begin{document}\nbody\n\\end{document}\n";
        let out = inject_geometry(input, 4.0, 6.0, 0.2);
        assert!(!out.contains("a4paper"));
        assert_eq!(out.matches("{geometry}").count(), 1);
    }

    #[test]
    fn landscape_swaps_geometry_dimensions() {
        let input = "\\documentclass{article}\n\\begin{document}\nx\n\\end{document}\n";
        let landscape = ConvertOptions::builder()
            .width(4.0)
            .height(6.0)
            .landscape(true)
            .build()
            .unwrap();
        let rotated = ConvertOptions::builder()
            .width(6.0)
            .height(4.0)
            .build()
            .unwrap();
        assert_eq!(
            rewrite_root(input, &landscape),
            rewrite_root(input, &rotated)
        );
    }

    #[test]
    fn math_lines_get_sloppy_prefix() {
        let input = "\\documentclass{article}\n\\begin{document}\n\
                     plain text\nlet $x = y$ hold\n\\end{document}\n";
        let out = enable_math_breaking(input);
        assert!(out.contains("\\sloppy let $x = y$ hold"));
        assert!(out.contains("plain text\n"));
        assert!(!out.contains("\\sloppy plain text"));
    }

    #[test]
    fn math_breaking_injects_breqn_and_displaybreaks() {
        let input = "\\documentclass{article}\n\\begin{document}\nx\n\\end{document}\n";
        let out = enable_math_breaking(input);
        let breqn = out.find("\\usepackage{breqn}").unwrap();
        let begin = out.find("\\begin{document}").unwrap();
        let brk = out.find("\\allowdisplaybreaks[4]").unwrap();
        assert!(breqn < begin);
        assert!(begin < brk);
    }

    #[test]
    fn sloppy_prefix_not_doubled() {
        let input = "\\documentclass{article}\n\\begin{document}\n\
                     $a$\n\\end{document}\n";
        let once = enable_math_breaking(input);
        let twice = enable_math_breaking(&once);
        assert_eq!(twice.matches("\\sloppy \\sloppy").count(), 0);
    }

    #[test]
    fn relative_width_figures_gain_height_cap() {
        let input = "\\includegraphics[width=0.8\\linewidth]{fig1}";
        assert_eq!(
            shrink_figures(input),
            "\\includegraphics[width=0.8\\textwidth,height=0.8\\textheight,keepaspectratio]{fig1}"
        );
    }

    #[test]
    fn textwidth_figures_also_match() {
        let input = "\\includegraphics[width=.95\\textwidth]{fig2}";
        let out = shrink_figures(input);
        assert!(out.contains("width=.95\\textwidth,height=.95\\textheight,keepaspectratio"));
    }

    #[test]
    fn scaled_figures_are_halved() {
        let input = "\\includegraphics[scale=0.8]{fig3}";
        assert_eq!(shrink_figures(input), "\\includegraphics[scale=0.4]{fig3}");
    }

    #[test]
    fn bare_figures_get_half_scale_once() {
        let input = "\\includegraphics{fig4}";
        // The inserted scale must not be halved by the scale rule.
        assert_eq!(
            shrink_figures(input),
            "\\includegraphics[scale=0.5]{fig4}"
        );
    }

    #[test]
    fn sized_figures_are_not_rescaled() {
        let input = "\\includegraphics[width=3cm]{fig5}";
        assert_eq!(shrink_figures(input), input);
    }

    #[test]
    fn twocolumn_lines_dropped_from_sty() {
        let input = "\\def\\x{1}\n\\twocolumn\n  \\twocolumn  \n\\def\\y{2}\n";
        assert_eq!(drop_twocolumn_lines(input), "\\def\\x{1}\n\\def\\y{2}\n");
    }

    #[test]
    fn full_rewrite_hits_every_rule() {
        let input = "\\documentclass[11pt,twoside,twocolumn,a4paper]{article}\n\
                     % setup\n\
                     \\usepackage[a4paper]{geometry}\n\
                     \\begin{document}\n\
                     Inline $e = mc^2$ math.\n\
                     \\includegraphics[width=0.5\\linewidth]{fig}\n\
                     \\end{document}\n";
        let out = rewrite_root(input, &opts());

        assert!(out.contains("\\documentclass[oneside]{article}"));
        assert!(!out.contains("% setup"));
        assert!(!out.contains("a4paper"));
        assert!(out.contains("paperwidth=4in,paperheight=6in,margin=0.2in"));
        assert!(out.contains("\\usepackage{breqn}"));
        assert!(out.contains("\\sloppy Inline $e = mc^2$ math."));
        assert!(out.contains("keepaspectratio"));
    }

    #[test]
    fn full_rewrite_is_idempotent_on_geometry() {
        let input = "\\documentclass{article}\n\\begin{document}\nx\n\\end{document}\n";
        let once = rewrite_root(input, &opts());
        let twice = rewrite_root(&once, &opts());
        assert_eq!(twice.matches("{geometry}").count(), 1);
        assert_eq!(twice.matches("{breqn}").count(), 1);
    }
}
