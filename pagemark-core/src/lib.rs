//! Highlight geometry, storage and text search for paginated documents.

pub mod config;
pub mod error;
pub mod exchange;
pub mod geometry;
pub mod highlight;
pub mod ids;
pub mod link;
pub mod search;
pub mod session;
pub mod source;
pub mod store;

/// A document's source locator (path or URL).
pub type DocumentId = String;

pub use config::{Config, IdStrategy, DEFAULT_SEARCH_COLOR};
pub use error::{HighlightError, HighlightResult};
pub use exchange::{export_file_name, parse_highlights, read_highlights, write_highlights, ExportError};
pub use geometry::{to_display, to_intrinsic, Position, Rect, Rotation, Viewport};
pub use highlight::{
    Comment, Content, ContentPatch, Highlight, HighlightKind, IncomingHighlight, NewHighlight,
    PositionPatch,
};
pub use ids::{IdGenerator, SequentialIdGenerator, UuidIdGenerator};
pub use link::{highlight_link, parse_highlight_link};
pub use search::{
    CompiledQuery, PageFailure, SearchBatch, SearchEngine, SearchOptions, SearchReport,
    SEARCH_MARKER,
};
pub use session::{SearchOutcome, Session, SessionEvent};
pub use source::{JsonTextSource, PageText, TextRun, TextSource};
pub use store::{DocumentPartition, HighlightList};
