use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, instrument};

use crate::error::HighlightResult;
use crate::geometry::{to_intrinsic, Rect, Viewport};
use crate::highlight::{
    ContentPatch, Highlight, IncomingHighlight, NewHighlight, PositionPatch,
};
use crate::ids::IdGenerator;
use crate::link::parse_highlight_link;
use crate::search::{SearchBatch, SearchEngine, SearchOptions};
use crate::source::TextSource;
use crate::store::{DocumentPartition, HighlightList};
use crate::DocumentId;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    DocumentLoaded(DocumentId),
    HighlightsChanged(DocumentId),
    ScrollRequested(Highlight),
    NoMatches {
        query: String,
    },
    SearchFinished {
        document: DocumentId,
        matches: usize,
        literal_fallback: bool,
        failed_pages: Vec<u32>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Matches {
        /// First match in page order; a scroll to it has been requested.
        first: Highlight,
        count: usize,
        literal_fallback: bool,
        failed_pages: Vec<u32>,
    },
    NoMatches {
        literal_fallback: bool,
        failed_pages: Vec<u32>,
    },
}

/// The active list lives outside the partition until the next switch or
/// [`Session::flush`].
pub struct Session {
    partition: DocumentPartition,
    active_id: DocumentId,
    active: HighlightList,
    batch: SearchBatch,
    ids: Arc<dyn IdGenerator>,
    engine: SearchEngine,
    events: Arc<Mutex<Vec<SessionEvent>>>,
}

impl Session {
    pub fn new(document: impl Into<DocumentId>, ids: Arc<dyn IdGenerator>) -> Self {
        Self::with_partition(document, DocumentPartition::new(), ids, SearchOptions::default())
    }

    pub fn with_partition(
        document: impl Into<DocumentId>,
        mut partition: DocumentPartition,
        ids: Arc<dyn IdGenerator>,
        options: SearchOptions,
    ) -> Self {
        let active_id = document.into();
        for highlight in partition.highlights() {
            ids.observe(&highlight.id);
        }
        let active = partition.checkout(&active_id);
        Self {
            partition,
            active,
            batch: SearchBatch::default(),
            engine: SearchEngine::with_options(Arc::clone(&ids), options),
            ids,
            events: Arc::new(Mutex::new(vec![SessionEvent::DocumentLoaded(
                active_id.clone(),
            )])),
            active_id,
        }
    }

    pub fn drain_events(&self) -> Vec<SessionEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn active_document(&self) -> &str {
        &self.active_id
    }

    pub fn highlights(&self) -> &HighlightList {
        &self.active
    }

    pub fn highlight(&self, id: &str) -> Option<&Highlight> {
        self.active.get(id)
    }

    pub fn search_batch(&self) -> &SearchBatch {
        &self.batch
    }

    pub fn has_search_highlights(&self) -> bool {
        !self.batch.is_empty()
    }

    pub fn highlights_for(&self, document: &str) -> Option<&HighlightList> {
        if document == self.active_id {
            Some(&self.active)
        } else {
            self.partition.get(document)
        }
    }

    pub fn partition(&mut self) -> &DocumentPartition {
        self.flush();
        &self.partition
    }

    pub fn flush(&mut self) {
        self.partition.flush(&self.active_id, self.active.clone());
    }

    pub fn into_partition(mut self) -> DocumentPartition {
        self.flush();
        self.partition
    }

    #[instrument(skip_all)]
    pub fn load_document(&mut self, document: impl Into<DocumentId>) {
        let document = document.into();
        self.flush();
        self.active = self.partition.checkout(&document);
        debug!(
            previous = %self.active_id,
            %document,
            highlights = self.active.len(),
            "switched active document"
        );
        self.active_id = document;
        self.push(SessionEvent::DocumentLoaded(self.active_id.clone()));
    }

    pub fn add(&mut self, highlight: Highlight) -> HighlightResult<()> {
        let id = highlight.id.clone();
        self.active.add(highlight)?;
        self.ids.observe(&id);
        self.changed();
        Ok(())
    }

    pub fn add_new(&mut self, highlight: NewHighlight) -> HighlightResult<Highlight> {
        let highlight = highlight.with_id(self.ids.next_id());
        self.add(highlight.clone())?;
        Ok(highlight)
    }

    pub fn update(
        &mut self,
        id: &str,
        position: &PositionPatch,
        content: &ContentPatch,
    ) -> HighlightResult<Highlight> {
        let merged = self.active.update(id, position, content)?;
        self.changed();
        Ok(merged)
    }

    pub fn remove(&mut self, id: &str) -> HighlightResult<Highlight> {
        let removed = self.active.remove(id)?;
        self.changed();
        Ok(removed)
    }

    pub fn reset_all(&mut self) {
        self.active.reset_all();
        if self.batch.document() == Some(self.active_id.as_str()) {
            self.batch.clear();
        }
        self.changed();
    }

    pub fn import_merge(&mut self, incoming: Vec<IncomingHighlight>) -> usize {
        let appended = self.active.import_merge(incoming, self.ids.as_ref());
        info!(document = %self.active_id, appended, "imported highlights");
        if appended > 0 {
            self.changed();
        }
        appended
    }

    pub fn export_snapshot(&self) -> Vec<Highlight> {
        self.active.export_snapshot()
    }

    #[instrument(skip(self, color, source), fields(document = %self.active_id))]
    pub async fn search(
        &mut self,
        query: &str,
        color: &str,
        source: &dyn TextSource,
    ) -> HighlightResult<SearchOutcome> {
        if query.is_empty() {
            self.push(SessionEvent::NoMatches {
                query: String::new(),
            });
            return Ok(SearchOutcome::NoMatches {
                literal_fallback: false,
                failed_pages: Vec::new(),
            });
        }

        let report = self.engine.search(query, color, source).await;
        let failed_pages: Vec<u32> = report.failed_pages.iter().map(|f| f.page).collect();
        let ids = report.ids();
        let count = report.highlights.len();
        let first = report.highlights.first().cloned();

        self.active.prepend_all(report.highlights)?;
        self.batch = SearchBatch::new(self.active_id.clone(), ids);
        self.push(SessionEvent::SearchFinished {
            document: self.active_id.clone(),
            matches: count,
            literal_fallback: report.literal_fallback,
            failed_pages: failed_pages.clone(),
        });

        match first {
            Some(first) => {
                self.changed();
                self.on_scroll_requested(first.clone());
                Ok(SearchOutcome::Matches {
                    first,
                    count,
                    literal_fallback: report.literal_fallback,
                    failed_pages,
                })
            }
            None => {
                self.push(SessionEvent::NoMatches {
                    query: query.to_owned(),
                });
                Ok(SearchOutcome::NoMatches {
                    literal_fallback: report.literal_fallback,
                    failed_pages,
                })
            }
        }
    }

    pub fn clear_search_highlights(&mut self) -> usize {
        let Some(document) = self.batch.document().map(str::to_owned) else {
            return 0;
        };
        let removed = if document == self.active_id {
            self.active.remove_ids(self.batch.ids())
        } else {
            self.partition
                .get_mut(&document)
                .map(|list| list.remove_ids(self.batch.ids()))
                .unwrap_or(0)
        };
        self.batch.clear();
        if removed > 0 {
            self.push(SessionEvent::HighlightsChanged(document));
        }
        removed
    }

    /// Called by the renderer after an area highlight was dragged or
    /// resized. `display_rect` is in the display frame of `viewport`; the
    /// stored position is kept in the intrinsic frame.
    pub fn on_highlight_geometry_changed(
        &mut self,
        id: &str,
        display_rect: Rect,
        viewport: &Viewport,
        image: Option<String>,
    ) -> HighlightResult<Highlight> {
        let existing = self
            .active
            .get(id)
            .ok_or_else(|| crate::HighlightError::NotFound(id.to_owned()))?;
        let mut position = PositionPatch::bounding_rect(viewport.rect_to_intrinsic(&display_rect));
        if !existing.position.use_pdf_coordinates {
            position.rects = Some(to_intrinsic(&existing.position, viewport).rects);
            position.use_pdf_coordinates = Some(true);
        }
        let content = ContentPatch { text: None, image };
        self.update(id, &position, &content)
    }

    pub fn on_scroll_requested(&self, highlight: Highlight) {
        self.push(SessionEvent::ScrollRequested(highlight));
    }

    pub fn follow_link(&self, fragment: &str) -> Option<Highlight> {
        let id = parse_highlight_link(fragment)?;
        let highlight = self.active.get(id)?.clone();
        self.on_scroll_requested(highlight.clone());
        Some(highlight)
    }

    fn changed(&self) {
        self.push(SessionEvent::HighlightsChanged(self.active_id.clone()));
    }

    fn push(&self, event: SessionEvent) {
        self.events.lock().push(event);
    }
}
