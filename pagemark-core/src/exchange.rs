//! Serialized highlight documents: a JSON array of highlight records.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use thiserror::Error;

use crate::highlight::{Highlight, IncomingHighlight};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExportError {
    #[error("no highlights to export")]
    Empty,
}

pub fn to_json(highlights: &[Highlight]) -> Result<String> {
    Ok(serde_json::to_string_pretty(highlights)?)
}

pub fn parse_highlights(payload: &str) -> Result<Vec<IncomingHighlight>> {
    serde_json::from_str(payload).context("invalid highlights file")
}

pub fn read_highlights(path: &Path) -> Result<Vec<IncomingHighlight>> {
    let payload = fs::read_to_string(path)
        .with_context(|| format!("failed to read highlights file {:?}", path))?;
    parse_highlights(&payload).with_context(|| format!("failed to decode {:?}", path))
}

/// Writes `highlights` to `path` through a temporary sibling file, so a
/// failed write never leaves a truncated document behind.
pub fn write_highlights(path: &Path, highlights: &[Highlight]) -> Result<()> {
    if highlights.is_empty() {
        return Err(ExportError::Empty.into());
    }
    let payload = to_json(highlights)?;
    let tmp = path.with_extension("json.tmp");
    let mut file = File::create(&tmp)
        .with_context(|| format!("failed to open temp highlights file {:?}", tmp))?;
    file.write_all(payload.as_bytes())?;
    file.flush()?;
    fs::rename(&tmp, path)
        .with_context(|| format!("failed to move highlights into place at {:?}", path))?;
    Ok(())
}

pub fn export_file_name(document_name: &str, date: NaiveDate) -> String {
    let name: String = document_name
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect();
    format!("highlights-{}-{}.json", name, date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Position, Rect};
    use crate::highlight::{Comment, Content};
    use tempfile::tempdir;

    fn sample() -> Highlight {
        Highlight {
            id: "42".to_owned(),
            position: Position::from_rects(vec![Rect::new(1.0, 2.0, 3.0, 4.0, 1)]).unwrap(),
            content: Content::text("quoted"),
            comment: Comment {
                text: "remember".to_owned(),
                emoji: "💡".to_owned(),
                color: None,
            },
        }
    }

    #[test]
    fn written_document_reads_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.json");

        write_highlights(&path, &[sample()]).unwrap();
        let restored = read_highlights(&path).unwrap();

        assert_eq!(restored.len(), 1);
        assert_eq!(restored[0].existing_id(), Some("42"));
        assert_eq!(restored[0].comment.text, "remember");
        assert!(!dir.path().join("out.json.tmp").exists());
    }

    #[test]
    fn empty_export_is_refused() {
        let dir = tempdir().unwrap();
        let err = write_highlights(&dir.path().join("out.json"), &[]).unwrap_err();
        assert_eq!(err.downcast_ref::<ExportError>(), Some(&ExportError::Empty));
    }

    #[test]
    fn records_without_id_parse() {
        let payload = r#"[{
            "position": {
                "boundingRect": {"x1": 0, "y1": 0, "x2": 10, "y2": 10, "width": 10, "height": 10, "pageNumber": 2},
                "rects": [],
                "pageNumber": 2
            },
            "content": {"image": "data:image/png;base64,AAAA"},
            "comment": {"text": "figure", "emoji": ""}
        }]"#;
        let parsed = parse_highlights(payload).unwrap();
        assert_eq!(parsed[0].existing_id(), None);
        assert!(!parsed[0].position.use_pdf_coordinates);
        assert_eq!(parsed[0].position.bounding_rect.page_number, 2);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_highlights("{\"not\": \"a list\"}").is_err());
    }

    #[test]
    fn export_name_carries_document_and_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(
            export_file_name("papers/1708.08021", date),
            "highlights-papers_1708.08021-2024-03-09.json"
        );
    }
}
