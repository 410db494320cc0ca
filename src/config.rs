//! Configuration types for arXiv-to-e-reader conversion.
//!
//! All conversion behaviour is controlled through [`ConvertOptions`], built
//! via its [`ConvertOptionsBuilder`]. Keeping every knob in one struct makes
//! it trivial to serialise a run for logging and to diff two runs to
//! understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A ten-field constructor is unreadable and breaks on every new field. The
//! builder lets callers set only what they care about and rely on documented
//! defaults for the rest.

use crate::error::Arxiv2KindleError;
use serde::{Deserialize, Serialize};

/// Options for one conversion run.
///
/// Built via [`ConvertOptions::builder()`] or [`ConvertOptions::default()`].
///
/// # Example
/// ```rust
/// use arxiv2kindle::ConvertOptions;
///
/// let options = ConvertOptions::builder()
///     .width(4.0)
///     .height(6.0)
///     .margin(0.2)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertOptions {
    /// Target page width in inches. Default: 4.0.
    ///
    /// 4 × 6 inches matches the usable screen of a 6-inch e-ink reader; the
    /// defaults come from the sizes that read well on a Kindle.
    pub width: f64,

    /// Target page height in inches. Default: 6.0.
    pub height: f64,

    /// Page margin in inches, applied on all sides. Default: 0.2.
    ///
    /// E-ink screens are small; generous margins waste a large fraction of
    /// them. 0.2 in leaves just enough border for the bezel shadow.
    pub margin: f64,

    /// Swap width/height for landscape reading. Default: false.
    ///
    /// `width(4).height(6).landscape(true)` produces exactly the page
    /// geometry of `width(6).height(4)` without the flag.
    pub landscape: bool,

    /// Target density for downscaled raster figures, in DPI. Default: 167.
    ///
    /// 167 DPI is the physical density of a 6-inch/800×600 e-ink panel.
    /// Figures denser than the panel cost decode time on a weak e-reader
    /// CPU without looking any sharper.
    pub image_dpi: u32,

    /// Re-encode raster figures down to the page's pixel budget. Default: true.
    ///
    /// Disable to keep the original figures byte-for-byte (larger PDF,
    /// slower page turns).
    pub downscale_images: bool,

    /// Number of LaTeX passes. Default: 2. Range: 1–4.
    ///
    /// Cross-references and the table of contents need a second pass to
    /// settle; documents with longtable or bibliography churn may need a
    /// third.
    pub passes: u32,

    /// LaTeX engine binary name or path. Default: "pdflatex".
    pub latex_engine: String,

    /// HTTP download timeout in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Keep the temporary working directory after the run. Default: false.
    ///
    /// Useful to inspect the rewritten sources when a heuristic transform
    /// broke the compile.
    pub keep_workdir: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            width: 4.0,
            height: 6.0,
            margin: 0.2,
            landscape: false,
            image_dpi: 167,
            downscale_images: true,
            passes: 2,
            latex_engine: "pdflatex".to_string(),
            download_timeout_secs: 120,
            keep_workdir: false,
        }
    }
}

impl ConvertOptions {
    /// Create a new builder for `ConvertOptions`.
    pub fn builder() -> ConvertOptionsBuilder {
        ConvertOptionsBuilder {
            options: Self::default(),
        }
    }

    /// Effective page size in inches, after the landscape swap.
    ///
    /// Returns `(paper_width, paper_height)`.
    pub fn page_size(&self) -> (f64, f64) {
        if self.landscape {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }

    /// Pixel budget for downscaled figures: the text block rendered at
    /// [`image_dpi`](Self::image_dpi).
    ///
    /// Returns `(max_width_px, max_height_px)`.
    pub fn image_pixel_budget(&self) -> (u32, u32) {
        let (w, h) = self.page_size();
        let text_w = (w - 2.0 * self.margin).max(0.5);
        let text_h = (h - 2.0 * self.margin).max(0.5);
        (
            (text_w * self.image_dpi as f64).round() as u32,
            (text_h * self.image_dpi as f64).round() as u32,
        )
    }
}

/// Builder for [`ConvertOptions`].
#[derive(Debug)]
pub struct ConvertOptionsBuilder {
    options: ConvertOptions,
}

impl ConvertOptionsBuilder {
    pub fn width(mut self, inches: f64) -> Self {
        self.options.width = inches;
        self
    }

    pub fn height(mut self, inches: f64) -> Self {
        self.options.height = inches;
        self
    }

    pub fn margin(mut self, inches: f64) -> Self {
        self.options.margin = inches;
        self
    }

    pub fn landscape(mut self, v: bool) -> Self {
        self.options.landscape = v;
        self
    }

    pub fn image_dpi(mut self, dpi: u32) -> Self {
        self.options.image_dpi = dpi.clamp(72, 400);
        self
    }

    pub fn downscale_images(mut self, v: bool) -> Self {
        self.options.downscale_images = v;
        self
    }

    pub fn passes(mut self, n: u32) -> Self {
        self.options.passes = n;
        self
    }

    pub fn latex_engine(mut self, engine: impl Into<String>) -> Self {
        self.options.latex_engine = engine.into();
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.options.download_timeout_secs = secs;
        self
    }

    pub fn keep_workdir(mut self, v: bool) -> Self {
        self.options.keep_workdir = v;
        self
    }

    /// Build the options, validating constraints.
    pub fn build(self) -> Result<ConvertOptions, Arxiv2KindleError> {
        let o = &self.options;
        if !(o.width > 0.0 && o.height > 0.0) {
            return Err(Arxiv2KindleError::InvalidOptions(format!(
                "Page size must be positive, got {}in × {}in",
                o.width, o.height
            )));
        }
        if o.margin < 0.0 {
            return Err(Arxiv2KindleError::InvalidOptions(format!(
                "Margin must be non-negative, got {}in",
                o.margin
            )));
        }
        if 2.0 * o.margin >= o.width.min(o.height) {
            return Err(Arxiv2KindleError::InvalidOptions(format!(
                "Margin {}in leaves no text area on a {}in × {}in page",
                o.margin, o.width, o.height
            )));
        }
        if !(1..=4).contains(&o.passes) {
            return Err(Arxiv2KindleError::InvalidOptions(format!(
                "Compile passes must be 1–4, got {}",
                o.passes
            )));
        }
        if o.latex_engine.trim().is_empty() {
            return Err(Arxiv2KindleError::InvalidOptions(
                "LaTeX engine name must not be empty".into(),
            ));
        }
        Ok(self.options)
    }
}
