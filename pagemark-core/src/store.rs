use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::error::{HighlightError, HighlightResult};
use crate::highlight::{ContentPatch, Highlight, IncomingHighlight, PositionPatch};
use crate::ids::IdGenerator;
use crate::DocumentId;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HighlightList {
    items: Vec<Highlight>,
}

impl HighlightList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(items: Vec<Highlight>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Highlight> {
        self.items.iter()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|h| h.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&Highlight> {
        self.items.iter().find(|h| h.id == id)
    }

    pub fn add(&mut self, highlight: Highlight) -> HighlightResult<()> {
        if self.contains(&highlight.id) {
            return Err(HighlightError::DuplicateId(highlight.id));
        }
        self.items.insert(0, highlight);
        Ok(())
    }

    /// Inserts `highlights` at the front, keeping their order. Nothing is
    /// inserted when any id collides with the list or within the batch.
    pub fn prepend_all(&mut self, highlights: Vec<Highlight>) -> HighlightResult<()> {
        let mut seen: HashSet<&str> = self.items.iter().map(|h| h.id.as_str()).collect();
        for highlight in &highlights {
            if !seen.insert(highlight.id.as_str()) {
                return Err(HighlightError::DuplicateId(highlight.id.clone()));
            }
        }
        let mut merged = highlights;
        merged.append(&mut self.items);
        self.items = merged;
        Ok(())
    }

    pub fn update(
        &mut self,
        id: &str,
        position: &PositionPatch,
        content: &ContentPatch,
    ) -> HighlightResult<Highlight> {
        let slot = self
            .items
            .iter_mut()
            .find(|h| h.id == id)
            .ok_or_else(|| HighlightError::NotFound(id.to_owned()))?;
        let merged = slot.patched(position, content)?;
        *slot = merged.clone();
        Ok(merged)
    }

    pub fn remove(&mut self, id: &str) -> HighlightResult<Highlight> {
        let index = self
            .items
            .iter()
            .position(|h| h.id == id)
            .ok_or_else(|| HighlightError::NotFound(id.to_owned()))?;
        Ok(self.items.remove(index))
    }

    pub fn remove_ids(&mut self, ids: &HashSet<String>) -> usize {
        let before = self.items.len();
        self.items.retain(|h| !ids.contains(&h.id));
        before - self.items.len()
    }

    pub fn reset_all(&mut self) {
        self.items.clear();
    }

    /// Appends incoming records whose id is not present yet. Records without
    /// an id get one from `ids` first. Existing records always win: an
    /// incoming duplicate is dropped, never merged. Returns the number of
    /// records appended.
    pub fn import_merge(
        &mut self,
        incoming: Vec<IncomingHighlight>,
        ids: &dyn IdGenerator,
    ) -> usize {
        let mut present: HashSet<String> = self.items.iter().map(|h| h.id.clone()).collect();
        let mut appended = 0;
        for record in incoming {
            let id = match record.existing_id() {
                Some(id) => {
                    ids.observe(id);
                    id.to_owned()
                }
                None => ids.next_id(),
            };
            if !present.insert(id.clone()) {
                debug!(%id, "skipping imported highlight with known id");
                continue;
            }
            self.items.push(record.into_highlight(id));
            appended += 1;
        }
        appended
    }

    pub fn export_snapshot(&self) -> Vec<Highlight> {
        self.items.clone()
    }
}

impl<'a> IntoIterator for &'a HighlightList {
    type Item = &'a Highlight;
    type IntoIter = std::slice::Iter<'a, Highlight>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Highlight lists of every document seen in this process. Entries are
/// created lazily and never removed.
#[derive(Debug, Clone, Default)]
pub struct DocumentPartition {
    entries: HashMap<DocumentId, HighlightList>,
}

impl DocumentPartition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, document: &str) -> Option<&HighlightList> {
        self.entries.get(document)
    }

    pub fn get_mut(&mut self, document: &str) -> Option<&mut HighlightList> {
        self.entries.get_mut(document)
    }

    pub fn flush(&mut self, document: &str, list: HighlightList) {
        self.entries.insert(document.to_owned(), list);
    }

    pub fn checkout(&mut self, document: &str) -> HighlightList {
        self.entries
            .entry(document.to_owned())
            .or_default()
            .clone()
    }

    pub fn highlights(&self) -> impl Iterator<Item = &Highlight> {
        self.entries.values().flat_map(HighlightList::iter)
    }

    pub fn contains(&self, document: &str) -> bool {
        self.entries.contains_key(document)
    }

    pub fn documents(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(DocumentId, Vec<Highlight>)> for DocumentPartition {
    fn from_iter<T: IntoIterator<Item = (DocumentId, Vec<Highlight>)>>(iter: T) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(document, items)| (document, HighlightList::from_vec(items)))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Position, Rect};
    use crate::highlight::{Comment, Content};
    use crate::ids::SequentialIdGenerator;

    fn highlight(id: &str, text: &str) -> Highlight {
        Highlight {
            id: id.to_owned(),
            position: Position::from_rects(vec![Rect::new(0.0, 0.0, 40.0, 12.0, 1)]).unwrap(),
            content: Content::text(text),
            comment: Comment {
                text: format!("note on {text}"),
                emoji: String::new(),
                color: None,
            },
        }
    }

    #[test]
    fn add_inserts_newest_first() {
        let mut list = HighlightList::new();
        list.add(highlight("a", "one")).unwrap();
        list.add(highlight("b", "two")).unwrap();
        let ids: Vec<_> = list.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, ["b", "a"]);
    }

    #[test]
    fn duplicate_add_is_rejected_and_list_unchanged() {
        let mut list = HighlightList::new();
        list.add(highlight("x", "one")).unwrap();
        let err = list.add(highlight("x", "two")).unwrap_err();
        assert_eq!(err, HighlightError::DuplicateId("x".to_owned()));
        assert_eq!(list.len(), 1);
        assert_eq!(list.get("x").unwrap().content.text.as_deref(), Some("one"));
    }

    #[test]
    fn prepend_all_is_atomic() {
        let mut list = HighlightList::from_vec(vec![highlight("a", "one")]);
        let err = list
            .prepend_all(vec![highlight("b", "two"), highlight("a", "again")])
            .unwrap_err();
        assert_eq!(err, HighlightError::DuplicateId("a".to_owned()));
        assert_eq!(list.len(), 1);

        list.prepend_all(vec![highlight("b", "two"), highlight("c", "three")])
            .unwrap();
        let ids: Vec<_> = list.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, ["b", "c", "a"]);
    }

    #[test]
    fn update_merges_and_returns_record() {
        let mut list = HighlightList::from_vec(vec![highlight("a", "one")]);
        let patch = ContentPatch {
            text: Some("uno".to_owned()),
            image: None,
        };
        let merged = list.update("a", &PositionPatch::default(), &patch).unwrap();
        assert_eq!(merged.content.text.as_deref(), Some("uno"));
        assert_eq!(merged.comment.text, "note on one");
        assert_eq!(list.get("a"), Some(&merged));
    }

    #[test]
    fn update_and_remove_report_missing_ids() {
        let mut list = HighlightList::new();
        assert_eq!(
            list.update("nope", &PositionPatch::default(), &ContentPatch::default()),
            Err(HighlightError::NotFound("nope".to_owned()))
        );
        assert_eq!(
            list.remove("nope"),
            Err(HighlightError::NotFound("nope".to_owned()))
        );
    }

    #[test]
    fn import_merge_never_overwrites_existing_records() {
        let mut list = HighlightList::from_vec(vec![highlight("a", "one")]);
        let mut clash = IncomingHighlight::from(highlight("a", "imposter"));
        clash.position = Position::area(Rect::new(1.0, 1.0, 2.0, 2.0, 9));
        let fresh = IncomingHighlight::from(highlight("b", "two"));

        let ids = SequentialIdGenerator::new("gen-");
        let appended = list.import_merge(vec![clash, fresh.clone()], &ids);

        assert_eq!(appended, 1);
        let kept = list.get("a").unwrap();
        assert_eq!(kept.comment.text, "note on one");
        assert_eq!(kept.position.page_number, 1);
        assert_eq!(list.iter().last().unwrap().id, "b");

        assert_eq!(list.import_merge(vec![fresh], &ids), 0);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn import_merge_mints_ids_for_anonymous_records() {
        let mut list = HighlightList::new();
        let mut anonymous = IncomingHighlight::from(highlight("ignored", "one"));
        anonymous.id = None;
        let ids = SequentialIdGenerator::new("gen-");

        assert_eq!(list.import_merge(vec![anonymous.clone()], &ids), 1);
        assert_eq!(list.import_merge(vec![anonymous], &ids), 1);
        let minted: Vec<_> = list.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(minted, ["gen-1", "gen-2"]);
    }

    #[test]
    fn import_merge_keeps_minted_ids_clear_of_imported_ones() {
        let mut list = HighlightList::new();
        let mut anonymous = IncomingHighlight::from(highlight("ignored", "two"));
        anonymous.id = None;
        let ids = SequentialIdGenerator::new("gen-");

        let appended = list.import_merge(
            vec![IncomingHighlight::from(highlight("gen-1", "one")), anonymous],
            &ids,
        );

        assert_eq!(appended, 2);
        let minted: Vec<_> = list.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(minted, ["gen-1", "gen-2"]);
        assert_eq!(ids.next_id(), "gen-3");
    }

    #[test]
    fn remove_ids_and_reset() {
        let mut list = HighlightList::from_vec(vec![
            highlight("a", "one"),
            highlight("b", "two"),
            highlight("c", "three"),
        ]);
        let doomed: HashSet<String> = ["a", "c", "zzz"].iter().map(|s| s.to_string()).collect();
        assert_eq!(list.remove_ids(&doomed), 2);
        assert_eq!(list.export_snapshot().len(), 1);
        list.reset_all();
        assert!(list.is_empty());
    }

    #[test]
    fn partition_checkout_creates_entry_lazily() {
        let mut partition = DocumentPartition::new();
        assert!(!partition.contains("doc.pdf"));
        assert!(partition.checkout("doc.pdf").is_empty());
        assert!(partition.contains("doc.pdf"));

        partition.flush("doc.pdf", HighlightList::from_vec(vec![highlight("a", "one")]));
        assert_eq!(partition.get("doc.pdf").unwrap().len(), 1);
        assert_eq!(partition.documents().collect::<Vec<_>>(), ["doc.pdf"]);
    }
}
