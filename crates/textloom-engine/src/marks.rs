//! Inline-annotation layer: non-destructive marks addressed by
//! (section, offset) anchors, independent of structural node identity.
//!
//! Marks never alter the underlying text and never participate in the AST
//! undo/redo history. Anchor resolution is best-effort: a stale or invalid
//! anchor degrades to a no-op or `None`, never an error. `verify_anchor_context`
//! detects staleness after edits; repairing is left to the caller.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::ast::text;

/// How many UTF-16 units of surrounding text an anchor captures on each side.
const CONTEXT_WINDOW: usize = 10;

/// Unique identifier for an inline mark.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct MarkId(pub Uuid);

impl MarkId {
    pub fn fresh() -> Self {
        MarkId(Uuid::new_v4())
    }
}

impl std::fmt::Display for MarkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Annotation category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MarkKind {
    KeyTerm,
    Highlight,
    Comment,
    Custom(String),
}

/// A logical text-offset reference into a section's flattened text.
///
/// Offsets are UTF-16 code units. `context_before`/`context_after` snapshot up
/// to [`CONTEXT_WINDOW`] units of surrounding text at creation time so later
/// edits can be detected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextAnchor {
    pub section_id: String,
    pub start_offset: usize,
    pub end_offset: usize,
    #[serde(default)]
    pub context_before: Option<String>,
    #[serde(default)]
    pub context_after: Option<String>,
}

impl TextAnchor {
    pub fn new(section_id: impl Into<String>, start_offset: usize, end_offset: usize) -> Self {
        TextAnchor {
            section_id: section_id.into(),
            start_offset,
            end_offset,
            context_before: None,
            context_after: None,
        }
    }

    /// Anchors must name a section and span a non-empty forward range.
    pub fn is_valid(&self) -> bool {
        !self.section_id.is_empty() && self.end_offset > self.start_offset
    }
}

/// A non-destructive annotation over a text anchor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineMark {
    pub id: MarkId,
    pub anchor: TextAnchor,
    pub kind: MarkKind,
    #[serde(default)]
    pub style: Option<String>,
    pub created_by: String,
    pub created_at: u64,
}

impl InlineMark {
    pub fn new(anchor: TextAnchor, kind: MarkKind, created_by: impl Into<String>) -> Self {
        InlineMark {
            id: MarkId::fresh(),
            anchor,
            kind,
            style: None,
            created_by: created_by.into(),
            created_at: now_millis(),
        }
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }
}

fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Scope selector for bulk mark removal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClearScope {
    Document,
    Section(String),
    Kind(MarkKind),
}

/// Container for all inline marks of one document: a by-id map plus a
/// by-section index. All mutators return a new state and never fail — invalid
/// input yields the unchanged state with a logged warning.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineMarkState {
    by_id: BTreeMap<MarkId, InlineMark>,
    by_section: BTreeMap<String, Vec<MarkId>>,
}

impl InlineMarkState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn get(&self, id: MarkId) -> Option<&InlineMark> {
        self.by_id.get(&id)
    }

    /// Marks of one section, in insertion order.
    pub fn marks_in_section(&self, section_id: &str) -> Vec<&InlineMark> {
        self.by_section
            .get(section_id)
            .map(|ids| ids.iter().filter_map(|id| self.by_id.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn add(&self, mark: InlineMark) -> Self {
        if !mark.anchor.is_valid() {
            log::warn!(
                "ignoring inline mark {} with invalid anchor in section {:?}",
                mark.id,
                mark.anchor.section_id
            );
            return self.clone();
        }
        let mut next = self.clone();
        next.by_section
            .entry(mark.anchor.section_id.clone())
            .or_default()
            .push(mark.id);
        next.by_id.insert(mark.id, mark);
        next
    }

    pub fn remove(&self, id: MarkId) -> Self {
        let mut next = self.clone();
        match next.by_id.remove(&id) {
            Some(mark) => {
                if let Some(ids) = next.by_section.get_mut(&mark.anchor.section_id) {
                    ids.retain(|m| *m != id);
                    if ids.is_empty() {
                        next.by_section.remove(&mark.anchor.section_id);
                    }
                }
            }
            None => {
                log::warn!("remove of unknown inline mark {id} ignored");
            }
        }
        next
    }

    pub fn clear(&self, scope: &ClearScope) -> Self {
        match scope {
            ClearScope::Document => Self::default(),
            ClearScope::Section(section_id) => {
                let mut next = self.clone();
                if let Some(ids) = next.by_section.remove(section_id) {
                    for id in ids {
                        next.by_id.remove(&id);
                    }
                }
                next
            }
            ClearScope::Kind(kind) => {
                let doomed: Vec<MarkId> = self
                    .by_id
                    .values()
                    .filter(|m| m.kind == *kind)
                    .map(|m| m.id)
                    .collect();
                let mut next = self.clone();
                for id in doomed {
                    next = next.remove(id);
                }
                next
            }
        }
    }
}

/// Locate the `occurrence`-th match of `phrase` in a section's flattened text
/// (1-based, scanning left to right) and build an anchor with surrounding
/// context. Returns `None` when the phrase is empty or the occurrence does not
/// exist.
pub fn find_phrase_anchor(
    section_id: &str,
    section_text: &str,
    phrase: &str,
    occurrence: usize,
) -> Option<TextAnchor> {
    if phrase.is_empty() || occurrence == 0 || section_id.is_empty() {
        return None;
    }

    let mut seen = 0;
    let mut search_from = 0; // byte position
    while let Some(found) = section_text[search_from..].find(phrase) {
        let byte_start = search_from + found;
        seen += 1;
        if seen == occurrence {
            let start = text::utf16_len(&section_text[..byte_start]);
            let end = start + text::utf16_len(phrase);
            let before_from = start.saturating_sub(CONTEXT_WINDOW);
            let total = text::utf16_len(section_text);
            let after_to = (end + CONTEXT_WINDOW).min(total);
            return Some(TextAnchor {
                section_id: section_id.to_string(),
                start_offset: start,
                end_offset: end,
                context_before: Some(text::slice(section_text, before_from, start).to_string()),
                context_after: Some(text::slice(section_text, end, after_to).to_string()),
            });
        }
        // Advance one character so overlapping matches are counted
        let step = section_text[byte_start..]
            .chars()
            .next()
            .map(|c| c.len_utf8())
            .unwrap_or(1);
        search_from = byte_start + step;
    }
    None
}

/// Re-check an anchor's stored context against the live section text.
///
/// Detection only: a `false` result says the text around the anchor has
/// drifted since the anchor was created; no repair is attempted. Anchors
/// without stored context verify on offsets alone.
pub fn verify_anchor_context(anchor: &TextAnchor, section_text: &str) -> bool {
    let total = text::utf16_len(section_text);
    if anchor.start_offset > total || anchor.end_offset > total {
        return false;
    }
    if let Some(before) = &anchor.context_before {
        let from = anchor.start_offset.saturating_sub(text::utf16_len(before));
        if text::slice(section_text, from, anchor.start_offset) != before {
            return false;
        }
    }
    if let Some(after) = &anchor.context_after {
        let to = (anchor.end_offset + text::utf16_len(after)).min(total);
        if text::slice(section_text, anchor.end_offset, to) != after {
            return false;
        }
    }
    true
}
