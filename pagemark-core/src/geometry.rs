//! Highlight geometry in two reference frames.
//!
//! The *intrinsic* frame is the page's native unit system: origin at the
//! bottom-left corner, y growing upward, independent of zoom. The *display*
//! frame is the pixel space of one render: origin at the top-left corner,
//! y growing downward, valid only for the scale and rotation it was captured
//! at. Stored highlights always live in the intrinsic frame.

use serde::{Deserialize, Serialize};

use crate::error::{HighlightError, HighlightResult};

/// Width and height are always derived from the corners, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RectRecord", into = "RectRecord")]
pub struct Rect {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub page_number: u32,
}

impl Rect {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64, page_number: u32) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            page_number,
        }
    }

    pub fn from_ltwh(left: f64, top: f64, width: f64, height: f64, page_number: u32) -> Self {
        Self::new(left, top, left + width, top + height, page_number)
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    pub fn is_finite(&self) -> bool {
        self.x1.is_finite() && self.y1.is_finite() && self.x2.is_finite() && self.y2.is_finite()
    }

    pub fn union(rects: &[Rect]) -> Option<Rect> {
        let first = rects.first()?;
        let mut bounds = *first;
        for rect in &rects[1..] {
            bounds.x1 = bounds.x1.min(rect.x1);
            bounds.y1 = bounds.y1.min(rect.y1);
            bounds.x2 = bounds.x2.max(rect.x2);
            bounds.y2 = bounds.y2.max(rect.y2);
        }
        Some(bounds)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RectRecord {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    #[serde(default)]
    width: f64,
    #[serde(default)]
    height: f64,
    page_number: u32,
}

impl TryFrom<RectRecord> for Rect {
    type Error = String;

    fn try_from(record: RectRecord) -> Result<Self, Self::Error> {
        if record.page_number == 0 {
            return Err("pageNumber must be 1 or greater".to_owned());
        }
        Ok(Rect::new(
            record.x1,
            record.y1,
            record.x2,
            record.y2,
            record.page_number,
        ))
    }
}

impl From<Rect> for RectRecord {
    fn from(rect: Rect) -> Self {
        Self {
            x1: rect.x1,
            y1: rect.y1,
            x2: rect.x2,
            y2: rect.y2,
            width: rect.width(),
            height: rect.height(),
            page_number: rect.page_number,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub bounding_rect: Rect,
    pub rects: Vec<Rect>,
    pub page_number: u32,
    #[serde(default)]
    pub use_pdf_coordinates: bool,
}

impl Position {
    pub fn from_rects(rects: Vec<Rect>) -> Option<Self> {
        let bounding_rect = Rect::union(&rects)?;
        Some(Self {
            page_number: bounding_rect.page_number,
            bounding_rect,
            rects,
            use_pdf_coordinates: true,
        })
    }

    pub fn area(bounding_rect: Rect) -> Self {
        Self {
            page_number: bounding_rect.page_number,
            bounding_rect,
            rects: Vec::new(),
            use_pdf_coordinates: true,
        }
    }

    pub fn page_conflict(&self) -> Option<(u32, u32)> {
        std::iter::once(&self.bounding_rect)
            .chain(self.rects.iter())
            .find(|rect| rect.page_number != self.page_number)
            .map(|rect| (self.page_number, rect.page_number))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        if degrees % 90 != 0 {
            return None;
        }
        match degrees.rem_euclid(360) {
            0 => Some(Rotation::Deg0),
            90 => Some(Rotation::Deg90),
            180 => Some(Rotation::Deg180),
            270 => Some(Rotation::Deg270),
            _ => None,
        }
    }

    pub fn degrees(self) -> u16 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    X,
    Y,
}

/// Which intrinsic axis feeds a display axis, and whether it is mirrored
/// against the page extent on the way.
#[derive(Debug, Clone, Copy)]
struct AxisMap {
    source: Axis,
    mirrored: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    page_width: f64,
    page_height: f64,
    scale: f64,
    rotation: Rotation,
}

impl Viewport {
    pub fn new(
        page_width: f64,
        page_height: f64,
        scale: f64,
        rotation: Rotation,
    ) -> HighlightResult<Self> {
        for (name, value) in [
            ("page width", page_width),
            ("page height", page_height),
            ("scale", scale),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(HighlightError::InvalidViewport(format!(
                    "{name} must be finite and positive, got {value}"
                )));
            }
        }
        Ok(Self {
            page_width,
            page_height,
            scale,
            rotation,
        })
    }

    pub fn page_width(&self) -> f64 {
        self.page_width
    }

    pub fn page_height(&self) -> f64 {
        self.page_height
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn display_size(&self) -> (f64, f64) {
        match self.rotation {
            Rotation::Deg0 | Rotation::Deg180 => {
                (self.page_width * self.scale, self.page_height * self.scale)
            }
            Rotation::Deg90 | Rotation::Deg270 => {
                (self.page_height * self.scale, self.page_width * self.scale)
            }
        }
    }

    pub fn rect_to_display(&self, rect: &Rect) -> Rect {
        let (map_x, map_y) = self.axes();
        let (x1, x2) = self.forward(self.intrinsic_span(rect, map_x.source), map_x);
        let (y1, y2) = self.forward(self.intrinsic_span(rect, map_y.source), map_y);
        Rect::new(x1, y1, x2, y2, rect.page_number)
    }

    pub fn rect_to_intrinsic(&self, rect: &Rect) -> Rect {
        let (map_x, map_y) = self.axes();
        let from_display_x = self.inverse((rect.x1, rect.x2), map_x);
        let from_display_y = self.inverse((rect.y1, rect.y2), map_y);
        let (x_span, y_span) = match map_x.source {
            Axis::X => (from_display_x, from_display_y),
            Axis::Y => (from_display_y, from_display_x),
        };
        Rect::new(x_span.0, y_span.0, x_span.1, y_span.1, rect.page_number)
    }

    fn axes(&self) -> (AxisMap, AxisMap) {
        let map = |source, mirrored| AxisMap { source, mirrored };
        match self.rotation {
            Rotation::Deg0 => (map(Axis::X, false), map(Axis::Y, true)),
            Rotation::Deg90 => (map(Axis::Y, false), map(Axis::X, false)),
            Rotation::Deg180 => (map(Axis::X, true), map(Axis::Y, false)),
            Rotation::Deg270 => (map(Axis::Y, true), map(Axis::X, true)),
        }
    }

    fn extent(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.page_width,
            Axis::Y => self.page_height,
        }
    }

    fn intrinsic_span(&self, rect: &Rect, axis: Axis) -> (f64, f64) {
        match axis {
            Axis::X => (rect.x1, rect.x2),
            Axis::Y => (rect.y1, rect.y2),
        }
    }

    fn forward(&self, (lo, hi): (f64, f64), map: AxisMap) -> (f64, f64) {
        if map.mirrored {
            let extent = self.extent(map.source);
            ((extent - hi) * self.scale, (extent - lo) * self.scale)
        } else {
            (lo * self.scale, hi * self.scale)
        }
    }

    fn inverse(&self, (lo, hi): (f64, f64), map: AxisMap) -> (f64, f64) {
        if map.mirrored {
            let extent = self.extent(map.source);
            (extent - hi / self.scale, extent - lo / self.scale)
        } else {
            (lo / self.scale, hi / self.scale)
        }
    }
}

/// Projects an intrinsic-frame position into the display frame of
/// `viewport`. Positions already in the display frame are returned as-is.
pub fn to_display(position: &Position, viewport: &Viewport) -> Position {
    if !position.use_pdf_coordinates {
        return position.clone();
    }
    Position {
        bounding_rect: viewport.rect_to_display(&position.bounding_rect),
        rects: position
            .rects
            .iter()
            .map(|rect| viewport.rect_to_display(rect))
            .collect(),
        page_number: position.page_number,
        use_pdf_coordinates: false,
    }
}

pub fn to_intrinsic(position: &Position, viewport: &Viewport) -> Position {
    if position.use_pdf_coordinates {
        return position.clone();
    }
    Position {
        bounding_rect: viewport.rect_to_intrinsic(&position.bounding_rect),
        rects: position
            .rects
            .iter()
            .map(|rect| viewport.rect_to_intrinsic(rect))
            .collect(),
        page_number: position.page_number,
        use_pdf_coordinates: true,
    }
}
