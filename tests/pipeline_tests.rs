//! Offline integration tests: the pipeline stages chained together on
//! in-memory fixtures. No network, no LaTeX toolchain.

use arxiv2kindle::pipeline::{extract, images, place, transform};
use arxiv2kindle::{ConvertOptions, Destination, PaperMetadata, TransformWarning};
use flate2::write::GzEncoder;
use flate2::Compression;
use image::{DynamicImage, RgbImage};
use std::io::Write;
use std::path::Path;

const ROOT_TEX: &str = "\\documentclass[11pt,twoside,twocolumn,letterpaper]{article}\n\
% submission notes, should vanish\n\
\\usepackage[a4paper,margin=1in]{geometry}\n\
\\usepackage{conference}\n\
\\begin{document}\n\
Inline math $E = mc^2$ on a long line.\n\
\\includegraphics[width=0.9\\linewidth]{fig}\n\
\\includegraphics{diagram}\n\
\\end{document}\n";

const CONFERENCE_STY: &str = "\\def\\conf{x}\n\\twocolumn\n\\def\\other{y}\n";

fn png_bytes(w: u32, h: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(w, h, |x, y| {
        image::Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut out = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    out
}

/// A gzipped tarball shaped like a typical arXiv source bundle.
fn source_bundle() -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, bytes) in [
        ("main.tex", ROOT_TEX.as_bytes().to_vec()),
        ("conference.sty", CONFERENCE_STY.as_bytes().to_vec()),
        ("fig.png", png_bytes(1600, 1200)),
        ("diagram.pdf", b"%PDF-1.4 vector figure".to_vec()),
    ] {
        let mut header = tar::Header::new_gnu();
        header.set_size(bytes.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, bytes.as_slice()).unwrap();
    }
    let tarball = builder.into_inner().unwrap();

    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(&tarball).unwrap();
    enc.finish().unwrap()
}

fn read(path: &Path) -> String {
    String::from_utf8_lossy(&std::fs::read(path).unwrap()).into_owned()
}

#[tokio::test]
async fn bundle_to_placed_pdf_without_network_or_latex() {
    let options = ConvertOptions::default();

    // Extract.
    let (tree, warnings) = extract::extract_source(&source_bundle(), false).unwrap();
    assert!(warnings.is_empty());
    assert!(tree.root().ends_with("main.tex"));

    // Transform.
    let warnings = transform::apply_transforms(&tree, &options);
    assert!(warnings.is_empty(), "{warnings:?}");

    let rewritten = read(tree.root());
    assert!(rewritten.contains("\\documentclass[oneside]{article}"));
    assert!(rewritten.contains("paperwidth=4in,paperheight=6in,margin=0.2in"));
    assert!(!rewritten.contains("a4paper"));
    assert!(!rewritten.contains("% submission notes"));
    assert!(rewritten.contains("\\sloppy Inline math $E = mc^2$"));
    assert!(rewritten.contains("width=0.9\\textwidth,height=0.9\\textheight,keepaspectratio"));
    assert!(rewritten.contains("\\includegraphics[scale=0.5]{diagram}"));

    // The pristine source sits next to the rewrite.
    assert_eq!(read(&tree.root().with_extension("tex.bak")), ROOT_TEX);

    // The conference style lost its forced two-column switch.
    let sty = read(&tree.dir().join("conference.sty"));
    assert!(!sty.contains("\\twocolumn"));
    assert!(sty.contains("\\def\\conf{x}"));

    // Images: the oversized PNG shrinks, the vector figure is untouched.
    let (downscaled, warnings) = images::downscale_images(&tree, &options).await;
    assert_eq!(downscaled, 1);
    assert!(warnings.is_empty());
    let fig = image::open(tree.dir().join("fig.png")).unwrap();
    let (max_w, max_h) = options.image_pixel_budget();
    assert!(fig.width() <= max_w && fig.height() <= max_h);
    assert_eq!(
        std::fs::read(tree.dir().join("diagram.pdf")).unwrap(),
        b"%PDF-1.4 vector figure"
    );

    // Place a stand-in for the compiled PDF into a destination directory.
    let pdf = tree.dir().join("main.pdf");
    std::fs::write(&pdf, b"%PDF-1.5 compiled").unwrap();
    let paper = PaperMetadata {
        id: "1802.08395".into(),
        title: "A Paper About Things".into(),
        authors: vec!["A. Author".into()],
    };
    let dest_dir = tempfile::tempdir().unwrap();
    let written = place::place_pdf(&pdf, &paper, &Destination::Directory(dest_dir.path().into()))
        .await
        .unwrap()
        .unwrap();
    assert!(written.ends_with("A Paper About Things.pdf"));
    assert_eq!(std::fs::read(&written).unwrap(), b"%PDF-1.5 compiled");
}

#[tokio::test]
async fn rerunning_transforms_never_stacks_injections() {
    let options = ConvertOptions::default();
    let (tree, _) = extract::extract_source(&source_bundle(), false).unwrap();

    transform::apply_transforms(&tree, &options);
    transform::apply_transforms(&tree, &options);
    let rewritten = read(tree.root());

    assert_eq!(rewritten.matches("{geometry}").count(), 1);
    assert_eq!(rewritten.matches("{breqn}").count(), 1);
    assert_eq!(rewritten.matches("\\allowdisplaybreaks").count(), 1);
    assert!(!rewritten.contains("\\sloppy \\sloppy"));
}

#[tokio::test]
async fn landscape_run_swaps_page_dimensions() {
    let options = ConvertOptions::builder().landscape(true).build().unwrap();
    let (tree, _) = extract::extract_source(&source_bundle(), false).unwrap();
    transform::apply_transforms(&tree, &options);

    let rewritten = read(tree.root());
    assert!(rewritten.contains("paperwidth=6in,paperheight=4in,margin=0.2in"));
}

#[tokio::test]
async fn no_downscale_leaves_figures_alone() {
    let options = ConvertOptions::builder()
        .downscale_images(false)
        .build()
        .unwrap();
    let (tree, _) = extract::extract_source(&source_bundle(), false).unwrap();

    let before = std::fs::metadata(tree.dir().join("fig.png")).unwrap().len();
    let (downscaled, warnings) = images::downscale_images(&tree, &options).await;
    assert_eq!(downscaled, 0);
    assert!(warnings.is_empty());
    assert_eq!(
        std::fs::metadata(tree.dir().join("fig.png")).unwrap().len(),
        before
    );
}

#[test]
fn kept_workdir_outlives_the_run() {
    let (tree, _) = extract::extract_source(&source_bundle(), true).unwrap();
    let dir = tree.dir().to_path_buf();
    drop(tree);
    assert!(dir.join("main.tex").exists());
    std::fs::remove_dir_all(dir).unwrap();
}

#[tokio::test]
async fn tex_without_begin_document_is_left_alone() {
    // A fragment-only bundle: documentclass but no document body.
    let fragment = "\\documentclass{article}\n\\newcommand{\\x}{1}\n";
    let (tree, _) = extract::extract_source(fragment.as_bytes(), false).unwrap();

    let warnings = transform::apply_transforms(&tree, &ConvertOptions::default());
    assert!(matches!(
        warnings.as_slice(),
        [TransformWarning::RuleSkipped { .. }]
    ));
    assert_eq!(read(tree.root()), fragment);
}
