use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::error::{HighlightError, HighlightResult};
use crate::geometry::{Position, Rect};

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Content {
    pub text: Option<String>,
    pub image: Option<String>,
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            image: None,
        }
    }

    pub fn image(image: impl Into<String>) -> Self {
        Self {
            text: None,
            image: Some(image.into()),
        }
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Comment {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub emoji: String,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightKind {
    Text,
    Area,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    pub id: String,
    pub position: Position,
    pub content: Content,
    pub comment: Comment,
}

impl Highlight {
    /// An image snapshot makes the highlight area-based; otherwise the text is
    /// authoritative.
    pub fn kind(&self) -> HighlightKind {
        if self.content.image.is_some() {
            HighlightKind::Area
        } else {
            HighlightKind::Text
        }
    }

    pub fn page_number(&self) -> u32 {
        self.position.page_number
    }

    pub fn patched(
        &self,
        position: &PositionPatch,
        content: &ContentPatch,
    ) -> HighlightResult<Highlight> {
        let mut merged = self.clone();
        position.apply_to(&mut merged.position);
        content.apply_to(&mut merged.content);
        if let Some((expected, found)) = merged.position.page_conflict() {
            return Err(HighlightError::PageMismatch {
                id: self.id.clone(),
                expected,
                found,
            });
        }
        Ok(merged)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewHighlight {
    pub position: Position,
    pub content: Content,
    pub comment: Comment,
}

impl NewHighlight {
    pub fn with_id(self, id: impl Into<String>) -> Highlight {
        Highlight {
            id: id.into(),
            position: self.position,
            content: self.content,
            comment: self.comment,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingHighlight {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub position: Position,
    pub content: Content,
    pub comment: Comment,
}

impl IncomingHighlight {
    pub fn existing_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn into_highlight(self, id: String) -> Highlight {
        Highlight {
            id,
            position: self.position,
            content: self.content,
            comment: self.comment,
        }
    }
}

impl From<Highlight> for IncomingHighlight {
    fn from(highlight: Highlight) -> Self {
        Self {
            id: Some(highlight.id),
            position: highlight.position,
            content: highlight.content,
            comment: highlight.comment,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionPatch {
    pub bounding_rect: Option<Rect>,
    pub rects: Option<Vec<Rect>>,
    pub page_number: Option<u32>,
    pub use_pdf_coordinates: Option<bool>,
}

impl PositionPatch {
    pub fn bounding_rect(rect: Rect) -> Self {
        Self {
            bounding_rect: Some(rect),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bounding_rect.is_none()
            && self.rects.is_none()
            && self.page_number.is_none()
            && self.use_pdf_coordinates.is_none()
    }

    /// A new bounding rect without an explicit page number moves the
    /// position to the rect's page.
    fn apply_to(&self, position: &mut Position) {
        if let Some(rect) = self.bounding_rect {
            position.bounding_rect = rect;
            if self.page_number.is_none() {
                position.page_number = rect.page_number;
            }
        }
        if let Some(rects) = &self.rects {
            position.rects = rects.clone();
        }
        if let Some(page_number) = self.page_number {
            position.page_number = page_number;
        }
        if let Some(flag) = self.use_pdf_coordinates {
            position.use_pdf_coordinates = flag;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentPatch {
    pub text: Option<String>,
    pub image: Option<String>,
}

impl ContentPatch {
    pub fn image(image: impl Into<String>) -> Self {
        Self {
            text: None,
            image: Some(image.into()),
        }
    }

    fn apply_to(&self, content: &mut Content) {
        if let Some(text) = &self.text {
            content.text = Some(text.clone());
        }
        if let Some(image) = &self.image {
            content.image = Some(image.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_highlight() -> Highlight {
        Highlight {
            id: "h1".to_owned(),
            position: Position::from_rects(vec![Rect::new(10.0, 10.0, 50.0, 22.0, 1)]).unwrap(),
            content: Content::text("hello"),
            comment: Comment {
                text: "greeting".to_owned(),
                emoji: "👋".to_owned(),
                color: Some("#00ff00".to_owned()),
            },
        }
    }

    #[test]
    fn patch_keeps_untouched_fields() {
        let original = text_highlight();
        let patch = PositionPatch {
            rects: Some(vec![Rect::new(12.0, 10.0, 48.0, 22.0, 1)]),
            ..Default::default()
        };

        let merged = original.patched(&patch, &ContentPatch::default()).unwrap();

        assert_eq!(merged.comment, original.comment);
        assert_eq!(merged.content, original.content);
        assert_eq!(merged.position.bounding_rect, original.position.bounding_rect);
        assert_eq!(merged.position.rects[0].x1, 12.0);
    }

    #[test]
    fn area_move_follows_bounding_rect_page() {
        let mut area = text_highlight();
        area.position = Position::area(Rect::new(0.0, 0.0, 10.0, 10.0, 1));
        area.content = Content::image("data:image/png;base64,AAAA");

        let moved = area
            .patched(
                &PositionPatch::bounding_rect(Rect::new(5.0, 5.0, 20.0, 20.0, 3)),
                &ContentPatch::image("data:image/png;base64,BBBB"),
            )
            .unwrap();

        assert_eq!(moved.page_number(), 3);
        assert_eq!(moved.kind(), HighlightKind::Area);
        assert_eq!(moved.content.image.as_deref(), Some("data:image/png;base64,BBBB"));
    }

    #[test]
    fn patch_spanning_pages_is_rejected() {
        let original = text_highlight();
        let err = original
            .patched(
                &PositionPatch::bounding_rect(Rect::new(0.0, 0.0, 1.0, 1.0, 2)),
                &ContentPatch::default(),
            )
            .unwrap_err();
        assert_eq!(
            err,
            HighlightError::PageMismatch {
                id: "h1".to_owned(),
                expected: 2,
                found: 1,
            }
        );
    }

    #[test]
    fn serialized_fields_use_exchange_names() {
        let value = serde_json::to_value(text_highlight()).unwrap();
        assert_eq!(value["position"]["usePdfCoordinates"], true);
        assert_eq!(value["position"]["boundingRect"]["pageNumber"], 1);
        assert_eq!(value["content"]["text"], "hello");
        assert!(value["content"].get("image").is_none());
        assert_eq!(value["comment"]["color"], "#00ff00");
    }

    #[test]
    fn incoming_empty_id_counts_as_missing() {
        let mut incoming = IncomingHighlight::from(text_highlight());
        assert_eq!(incoming.existing_id(), Some("h1"));
        incoming.id = Some(String::new());
        assert_eq!(incoming.existing_id(), None);
    }
}
