//! CLI binary for arxiv2kindle.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConvertOptions` and prints a run summary.

use anyhow::{Context, Result};
use arxiv2kindle::{convert_to_dest, Arxiv2KindleError, ConvertOptions, Destination};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Kindle-sized PDF on stdout
  arxiv2kindle --width 4 --height 6 --margin 0.2 1802.08395 - > out.pdf

  # Landscape, into the current directory (filename from the paper title)
  arxiv2kindle --width 6 --height 4 --margin 0.2 --landscape 1802.08395 ./

  # From the abstract page URL, to an explicit path
  arxiv2kindle https://arxiv.org/abs/1706.03762 attention.pdf

  # Free-text lookup (best effort, first hit wins)
  arxiv2kindle "attention is all you need" ./

  # Keep the rewritten sources around when a compile breaks
  arxiv2kindle --keep-workdir 1802.08395 ./

EXIT CODES:
  0  success
  2  fetch failure (network, HTTP, paper not found)
  3  paper has no LaTeX source (PDF-only submission)
  4  source archive unreadable / no root .tex file
  5  LaTeX engine missing or compile failed (log tail on stderr)
  6  destination not writable
  64 invalid options

REQUIREMENTS:
  pdflatex (or a compatible engine via --latex) must be on PATH.
  pdftk is optional; with --landscape it rotates pages for devices that
  do not auto-rotate, and is skipped with a warning when absent.

NOTES:
  The source transforms are regex heuristics over arbitrary LaTeX. On a
  document with unusual markup they silently do nothing; when they break
  the compile, rerun with --keep-workdir and read the .tex.bak diff."#;

/// Convert arXiv papers to e-reader-sized PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "arxiv2kindle",
    version,
    about = "Convert arXiv papers to e-reader-sized PDFs",
    long_about = "Fetch the LaTeX source of an arXiv paper, rewrite it for a small screen \
(page geometry, one-sided layout, breakable formulas, downscaled figures), and re-typeset \
it with pdflatex at the requested page size.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// arXiv identifier, abstract/PDF URL, or free-text query.
    query: String,

    /// Destination: `-` for stdout, a directory, or an explicit file path.
    #[arg(required_unless_present = "dest_dir", conflicts_with = "dest_dir")]
    dest: Option<String>,

    /// Target page width in inches.
    #[arg(short = 'W', long, default_value_t = 4.0)]
    width: f64,

    /// Target page height in inches.
    #[arg(short = 'H', long, default_value_t = 6.0)]
    height: f64,

    /// Page margin in inches.
    #[arg(short = 'm', long, default_value_t = 0.2)]
    margin: f64,

    /// Produce a landscape file (swaps width and height).
    #[arg(long, overrides_with = "portrait")]
    landscape: bool,

    /// Produce a portrait file (default).
    #[arg(long, overrides_with = "landscape")]
    portrait: bool,

    /// Write into this directory (alternative to the positional destination).
    #[arg(long, value_name = "PATH")]
    dest_dir: Option<PathBuf>,

    /// Target density for downscaled figures, in DPI.
    #[arg(long, env = "ARXIV2KINDLE_IMAGE_DPI", default_value_t = 167,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    image_dpi: u32,

    /// Keep figures at their original resolution.
    #[arg(long)]
    no_downscale: bool,

    /// LaTeX passes (cross-references settle on the second).
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u32).range(1..=4))]
    passes: u32,

    /// LaTeX engine binary name or path.
    #[arg(long, env = "ARXIV2KINDLE_LATEX", default_value = "pdflatex")]
    latex: String,

    /// Keep the temporary working directory for inspection.
    #[arg(long)]
    keep_workdir: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, default_value_t = 120)]
    download_timeout: u64,

    /// Print a machine-readable JSON run summary instead of the text one.
    #[arg(long)]
    json: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "ARXIV2KINDLE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Exit code for a failed argument parse.
///
/// `--help`/`--version` are successes; everything else is bad usage and maps
/// to 64, matching the EXIT CODES table (clap's own default of 2 would
/// collide with the fetch-failure class).
fn parse_failure_code(kind: clap::error::ErrorKind) -> u8 {
    use clap::error::ErrorKind;
    match kind {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => 64,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(parse_failure_code(e.kind()));
        }
    };

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner owns the terminal while it runs; suppress library INFO
    // logs unless the user asked for them.
    let writing_pdf_to_stdout = cli.dest.as_deref() == Some("-");
    let show_spinner = !cli.quiet && !cli.verbose && !writing_pdf_to_stdout;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_spinner {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    match run(&cli, show_spinner).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {e:#}", bold("error:"));
            match e.downcast_ref::<Arxiv2KindleError>() {
                Some(err) => ExitCode::from(err.exit_code()),
                None => ExitCode::FAILURE,
            }
        }
    }
}

async fn run(cli: &Cli, show_spinner: bool) -> Result<()> {
    let options = build_options(cli)?;
    let dest = match &cli.dest_dir {
        Some(dir) => Destination::Directory(dir.clone()),
        // required_unless_present guarantees dest is set here.
        None => Destination::parse(cli.dest.as_deref().unwrap_or("-")),
    };

    let spinner = show_spinner.then(|| {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(format!("Converting {}…", cli.query));
        bar.enable_steady_tick(Duration::from_millis(80));
        bar
    });

    let result = convert_to_dest(&cli.query, &dest, &options).await;

    if let Some(bar) = &spinner {
        bar.finish_and_clear();
    }

    let (conversion, written) = result.context("Conversion failed")?;

    if cli.json {
        let mut value = serde_json::to_value(&conversion).context("Failed to serialise summary")?;
        if let Some(map) = value.as_object_mut() {
            map.insert(
                "written_to".into(),
                serde_json::to_value(written.as_ref().map(|p| p.display().to_string()))?,
            );
        }
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    if !cli.quiet {
        let (w, h) = options.page_size();
        let target = written
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "stdout".to_string());
        eprintln!(
            "{} [{}] {}",
            green("✔"),
            conversion.paper.id,
            bold(&conversion.paper.title)
        );
        eprintln!(
            "   {w}in × {h}in  {}  →  {}",
            dim(&format!(
                "{} KiB, {} passes, {}ms",
                conversion.stats.pdf_bytes / 1024,
                conversion.stats.passes_run,
                conversion.stats.total_duration_ms
            )),
            bold(&target),
        );
        for warning in &conversion.warnings {
            eprintln!("   {} {warning}", yellow("⚠"));
        }
        if conversion.tree_kept() {
            eprintln!("   {} workdir: {}", dim("·"), conversion.workdir().display());
        }
    }

    Ok(())
}

/// Map CLI args to `ConvertOptions`.
fn build_options(cli: &Cli) -> Result<ConvertOptions> {
    ConvertOptions::builder()
        .width(cli.width)
        .height(cli.height)
        .margin(cli.margin)
        .landscape(cli.landscape && !cli.portrait)
        .image_dpi(cli.image_dpi)
        .downscale_images(!cli.no_downscale)
        .passes(cli.passes)
        .latex_engine(&cli.latex)
        .download_timeout_secs(cli.download_timeout)
        .keep_workdir(cli.keep_workdir)
        .build()
        .context("Invalid options")
}
