//! Text search over a document's extracted runs.
//!
//! Each match becomes a highlight in the intrinsic frame. Extraction only
//! gives the transform and total advance width of a run, not per-glyph
//! boxes, so a match's horizontal extent is interpolated assuming uniform
//! character widths, and its vertical extent is derived from the font size
//! implied by the transform.

use std::collections::HashSet;
use std::sync::Arc;

use regex::{Regex, RegexBuilder};
use tracing::{debug, info, warn};

use crate::geometry::{Position, Rect};
use crate::highlight::{Comment, Content, Highlight};
use crate::ids::IdGenerator;
use crate::source::{TextRun, TextSource};
use crate::DocumentId;

pub const SEARCH_MARKER: &str = "🔍";

pub const FALLBACK_FONT_SIZE: f64 = 12.0;

const LEFT_PAD_CHARS: f64 = 0.5;
const RIGHT_PAD_CHARS: f64 = 1.0;
const DESCENT: f64 = 0.2;
const ASCENT: f64 = 0.8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOptions {
    pub case_insensitive: bool,
    pub marker: String,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            case_insensitive: false,
            marker: SEARCH_MARKER.to_owned(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompiledQuery {
    regex: Regex,
    literal_fallback: bool,
}

impl CompiledQuery {
    /// Compiles `query` as a regular expression. A query that is not a valid
    /// pattern is escaped and matched literally instead.
    pub fn compile(query: &str, case_insensitive: bool) -> Result<Self, regex::Error> {
        match build_regex(query, case_insensitive) {
            Ok(regex) => Ok(Self {
                regex,
                literal_fallback: false,
            }),
            Err(err) => {
                debug!(%query, error = %err, "query is not a valid pattern, matching literally");
                let regex = build_regex(&regex::escape(query), case_insensitive)?;
                Ok(Self {
                    regex,
                    literal_fallback: true,
                })
            }
        }
    }

    pub fn is_literal_fallback(&self) -> bool {
        self.literal_fallback
    }

    /// Non-empty, non-overlapping matches in `text` as
    /// `(start_char, char_len, matched)`. Offsets count characters, not bytes.
    pub fn find_in<'t>(&self, text: &'t str) -> Vec<(usize, usize, &'t str)> {
        let mut found = Vec::new();
        let mut chars_seen = 0;
        let mut bytes_seen = 0;
        for m in self.regex.find_iter(text) {
            if m.as_str().is_empty() {
                continue;
            }
            chars_seen += text[bytes_seen..m.start()].chars().count();
            bytes_seen = m.start();
            found.push((chars_seen, m.as_str().chars().count(), m.as_str()));
        }
        found
    }
}

fn build_regex(pattern: &str, case_insensitive: bool) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .build()
}

/// Vertical scale of a run: `|b|`, else `|d|`, else [`FALLBACK_FONT_SIZE`].
pub fn run_font_size(transform: &[f64; 6]) -> f64 {
    let usable = |v: f64| v != 0.0 && !v.is_nan();
    let [_, b, _, d, _, _] = *transform;
    if usable(b) {
        b.abs()
    } else if usable(d) {
        d.abs()
    } else {
        FALLBACK_FONT_SIZE
    }
}

/// Intrinsic-frame box of `len` characters starting at character `start`
/// of `run`, padded half a character on the left and one on the right.
pub fn match_rect(run: &TextRun, start: usize, len: usize, page_number: u32) -> Rect {
    let n = run.text.chars().count() as f64;
    let char_width = run.width / n;
    let match_start = (start as f64 / n) * run.width;
    let match_width = (len as f64 / n) * run.width;
    let font_size = run_font_size(&run.transform);
    let [_, _, _, _, e, f] = run.transform;

    Rect::new(
        e + match_start - LEFT_PAD_CHARS * char_width,
        f - DESCENT * font_size,
        e + match_start + match_width + RIGHT_PAD_CHARS * char_width,
        f + ASCENT * font_size,
        page_number,
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFailure {
    pub page: u32,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct SearchReport {
    pub highlights: Vec<Highlight>,
    pub literal_fallback: bool,
    pub failed_pages: Vec<PageFailure>,
    pub pages_scanned: u32,
}

impl SearchReport {
    pub fn is_empty(&self) -> bool {
        self.highlights.is_empty()
    }

    pub fn ids(&self) -> HashSet<String> {
        self.highlights.iter().map(|h| h.id.clone()).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchBatch {
    document: Option<DocumentId>,
    ids: HashSet<String>,
}

impl SearchBatch {
    pub fn new(document: impl Into<DocumentId>, ids: HashSet<String>) -> Self {
        Self {
            document: Some(document.into()),
            ids,
        }
    }

    pub fn document(&self) -> Option<&str> {
        self.document.as_deref()
    }

    pub fn ids(&self) -> &HashSet<String> {
        &self.ids
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.document = None;
        self.ids.clear();
    }
}

pub struct SearchEngine {
    ids: Arc<dyn IdGenerator>,
    options: SearchOptions,
}

impl SearchEngine {
    pub fn new(ids: Arc<dyn IdGenerator>) -> Self {
        Self::with_options(ids, SearchOptions::default())
    }

    pub fn with_options(ids: Arc<dyn IdGenerator>, options: SearchOptions) -> Self {
        Self { ids, options }
    }

    pub async fn search(&self, query: &str, color: &str, source: &dyn TextSource) -> SearchReport {
        let mut report = SearchReport::default();
        if query.is_empty() {
            return report;
        }

        let compiled = match CompiledQuery::compile(query, self.options.case_insensitive) {
            Ok(compiled) => compiled,
            Err(err) => {
                warn!(%query, error = %err, "unable to compile search query");
                return report;
            }
        };
        report.literal_fallback = compiled.is_literal_fallback();

        for page_number in 1..=source.page_count() {
            let page = match source.page(page_number).await {
                Ok(page) => page,
                Err(err) => {
                    let message = format!("{err:#}");
                    warn!(page = page_number, error = %message, "skipping page during search");
                    report.failed_pages.push(PageFailure {
                        page: page_number,
                        message,
                    });
                    continue;
                }
            };
            report.pages_scanned += 1;

            for run in page.runs.iter().filter(|run| !run.text.is_empty()) {
                for (start, len, matched) in compiled.find_in(&run.text) {
                    let rect = match_rect(run, start, len, page_number);
                    debug!(page = page_number, %matched, ?rect, "search match");
                    report.highlights.push(self.candidate(matched, rect, color));
                }
            }
        }

        info!(
            %query,
            matches = report.highlights.len(),
            failed_pages = report.failed_pages.len(),
            "search finished"
        );
        report
    }

    fn candidate(&self, matched: &str, rect: Rect, color: &str) -> Highlight {
        Highlight {
            id: self.ids.next_id(),
            position: Position {
                bounding_rect: rect,
                rects: vec![rect],
                page_number: rect.page_number,
                use_pdf_coordinates: true,
            },
            content: Content::text(matched),
            comment: Comment {
                text: format!("Match: {matched}"),
                emoji: self.options.marker.clone(),
                color: Some(color.to_owned()),
            },
        }
    }
}
