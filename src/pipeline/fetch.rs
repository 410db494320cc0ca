//! Paper resolution and source download.
//!
//! Two round-trips to arXiv:
//!
//! 1. The Atom query API (`export.arxiv.org/api/query`) resolves whatever
//!    the user typed — bare id, abstract/PDF URL, or free text — to a
//!    canonical id and title. Free-text resolution is best effort: the
//!    first hit wins.
//! 2. The e-print endpoint (`arxiv.org/e-print/{id}`) serves the source
//!    bundle: usually a gzipped tar, sometimes a single gzipped `.tex`,
//!    and for PDF-only submissions the finished PDF — which this tool
//!    cannot use, so that case is surfaced as `NoSourceAvailable` here
//!    rather than as an extraction failure later.

use crate::config::ConvertOptions;
use crate::error::Arxiv2KindleError;
use crate::output::PaperMetadata;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

const ARXIV_API_URL: &str = "http://export.arxiv.org/api/query";
const ARXIV_EPRINT_URL: &str = "https://arxiv.org/e-print";

/// New-style identifier: `2301.12345`, optionally with a version suffix.
static RE_NEW_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}\.\d{4,5}(v\d+)?$").unwrap());

/// Old-style identifier: `cs/0112017`, `math.GT/0309136`.
static RE_OLD_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z-]+(\.[A-Za-z-]+)?/\d{7}(v\d+)?$").unwrap());

/// Normalise a user-supplied reference to an arXiv id, if it is one.
///
/// Handles:
/// - `2301.12345`, `2301.12345v2` (version stripped)
/// - `arxiv:2301.12345`
/// - `https://arxiv.org/abs/2301.12345v1`, `.../pdf/2301.12345.pdf`
/// - old-style `cs/0112017`
///
/// Returns `None` for anything else; the caller falls back to a free-text
/// search.
pub fn parse_reference(input: &str) -> Option<String> {
    let mut s = input.trim().to_string();

    // URL forms: keep the path segment after /abs/ or /pdf/.
    for marker in ["/abs/", "/pdf/"] {
        if let Some(pos) = s.find(marker) {
            s = s[pos + marker.len()..]
                .trim_end_matches('/')
                .trim_end_matches(".pdf")
                .to_string();
            break;
        }
    }

    let s = s.strip_prefix("arxiv:").unwrap_or(&s).trim().to_string();

    if RE_NEW_ID.is_match(&s) || RE_OLD_ID.is_match(&s) {
        Some(strip_version(&s))
    } else {
        None
    }
}

/// Drop a trailing `vN` version suffix.
fn strip_version(id: &str) -> String {
    static RE_VERSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"v\d+$").unwrap());
    RE_VERSION.replace(id, "").to_string()
}

/// Build the HTTP client shared by both round-trips.
///
/// arXiv's API terms ask for an identifying User-Agent.
fn build_client(options: &ConvertOptions) -> Result<reqwest::Client, Arxiv2KindleError> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(options.download_timeout_secs))
        .user_agent(concat!("arxiv2kindle/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Arxiv2KindleError::Internal(format!("HTTP client: {e}")))
}

/// Resolve the reference to paper metadata via the arXiv Atom API.
pub async fn resolve_paper(
    query: &str,
    options: &ConvertOptions,
) -> Result<PaperMetadata, Arxiv2KindleError> {
    let client = build_client(options)?;

    let request = match parse_reference(query) {
        Some(id) => {
            debug!("Resolving arXiv id {id}");
            client
                .get(ARXIV_API_URL)
                .query(&[("id_list", id.as_str()), ("max_results", "1")])
        }
        None => {
            debug!("Free-text search for '{query}'");
            client.get(ARXIV_API_URL).query(&[
                ("search_query", format!("all:{query}").as_str()),
                ("max_results", "1"),
            ])
        }
    };

    let response = request
        .send()
        .await
        .map_err(|e| map_request_error(ARXIV_API_URL, e, options.download_timeout_secs))?;

    if !response.status().is_success() {
        return Err(Arxiv2KindleError::Fetch {
            url: ARXIV_API_URL.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(|e| Arxiv2KindleError::Fetch {
        url: ARXIV_API_URL.to_string(),
        reason: e.to_string(),
    })?;

    let paper = parse_feed(&bytes, query)?;
    info!("Resolved paper: [{}] {}", paper.id, paper.title);
    Ok(paper)
}

/// Parse the Atom response into [`PaperMetadata`].
///
/// Split out of [`resolve_paper`] so it is testable without the network.
fn parse_feed(bytes: &[u8], query: &str) -> Result<PaperMetadata, Arxiv2KindleError> {
    let feed = feed_rs::parser::parse(bytes).map_err(|e| Arxiv2KindleError::Fetch {
        url: ARXIV_API_URL.to_string(),
        reason: format!("Unparseable Atom feed: {e}"),
    })?;

    let entry = feed
        .entries
        .first()
        .ok_or_else(|| Arxiv2KindleError::PaperNotFound {
            query: query.to_string(),
        })?;

    // Entry ids look like "http://arxiv.org/abs/1802.08395v1".
    let id = entry
        .id
        .rsplit("/abs/")
        .next()
        .map(|s| strip_version(s))
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Arxiv2KindleError::PaperNotFound {
            query: query.to_string(),
        })?;

    let title = entry
        .title
        .as_ref()
        .map(|t| normalise_whitespace(&t.content))
        .unwrap_or_else(|| id.clone());

    let authors = entry
        .authors
        .iter()
        .map(|a| a.name.clone())
        .filter(|n| !n.is_empty())
        .collect();

    Ok(PaperMetadata { id, title, authors })
}

/// Collapse runs of whitespace; Atom titles arrive with feed line wrapping.
fn normalise_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Download the LaTeX source bundle for a resolved paper.
///
/// Returns the raw archive bytes; format sniffing happens in
/// [`crate::pipeline::extract`]. A `%PDF` payload means arXiv has no LaTeX
/// source for this submission.
pub async fn download_source(
    paper: &PaperMetadata,
    options: &ConvertOptions,
) -> Result<Vec<u8>, Arxiv2KindleError> {
    let url = format!("{ARXIV_EPRINT_URL}/{}", paper.id);
    info!("Downloading source bundle: {url}");

    let client = build_client(options)?;
    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| map_request_error(&url, e, options.download_timeout_secs))?;

    if !response.status().is_success() {
        return Err(Arxiv2KindleError::Fetch {
            url,
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(|e| Arxiv2KindleError::Fetch {
        url: url.clone(),
        reason: e.to_string(),
    })?;

    ensure_latex_payload(&bytes, &paper.id)?;

    debug!("Downloaded {} bytes", bytes.len());
    Ok(bytes.to_vec())
}

/// Reject a `%PDF` payload: arXiv serves the finished PDF from the e-print
/// endpoint when a submission has no LaTeX source.
///
/// Split out of [`download_source`] so it is testable without the network.
fn ensure_latex_payload(bytes: &[u8], id: &str) -> Result<(), Arxiv2KindleError> {
    if bytes.starts_with(b"%PDF") {
        return Err(Arxiv2KindleError::NoSourceAvailable { id: id.to_string() });
    }
    Ok(())
}

fn map_request_error(url: &str, e: reqwest::Error, timeout_secs: u64) -> Arxiv2KindleError {
    if e.is_timeout() {
        Arxiv2KindleError::FetchTimeout {
            url: url.to_string(),
            secs: timeout_secs,
        }
    } else {
        Arxiv2KindleError::Fetch {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}
