//! Selection model: point/range addressing into the document by block id and
//! UTF-16 character offset.
//!
//! Selections are caller-owned values; the engine never stores one. Anchor is
//! where the selection started, focus is where it ended — focus may precede
//! anchor in document order, and `normalize` is the one place that ordering is
//! resolved. An unknown block id degrades to a zero-length range at the anchor
//! rather than failing, so a stale selection from the rendering layer can never
//! take the engine down.

use serde::{Deserialize, Serialize};

use crate::ast::{self, DocumentAst, NodeId, text};

/// One end of a selection: a block plus a UTF-16 offset into its flattened
/// text.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub block_id: NodeId,
    pub offset: usize,
}

impl Point {
    pub fn new(block_id: NodeId, offset: usize) -> Self {
        Point { block_id, offset }
    }
}

/// A selection between two points. `anchor == focus` means a caret.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocSelection {
    pub anchor: Point,
    pub focus: Point,
}

impl DocSelection {
    /// Caret selection at a single point.
    pub fn collapsed(point: Point) -> Self {
        DocSelection {
            anchor: point,
            focus: point,
        }
    }

    pub fn range(anchor: Point, focus: Point) -> Self {
        DocSelection { anchor, focus }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    pub fn is_cross_block(&self) -> bool {
        self.anchor.block_id != self.focus.block_id
    }
}

/// A selection resolved into document order: start ≤ end.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalizedSelection {
    pub start_block: NodeId,
    pub start_index: usize,
    pub start_offset: usize,
    pub end_block: NodeId,
    pub end_index: usize,
    pub end_offset: usize,
}

impl NormalizedSelection {
    pub fn is_collapsed(&self) -> bool {
        self.start_block == self.end_block && self.start_offset == self.end_offset
    }

    pub fn is_cross_block(&self) -> bool {
        self.start_block != self.end_block
    }
}

/// Clamp a point's offset to the length of its block's flattened text.
/// Points into unknown blocks clamp to 0.
pub fn clamp_offset(ast: &DocumentAst, point: &Point) -> usize {
    match ast.find_block(point.block_id) {
        Some(block) => text::clamp_offset(&ast::block_text(block), point.offset),
        None => 0,
    }
}

/// Resolve a selection into document order.
///
/// Both ends are located by block index; whichever comes first in the document
/// (ties broken by offset) becomes the start. If either end references a block
/// that no longer exists, the selection degrades to a zero-length range at the
/// anchor (or the focus, when the anchor itself is the missing end).
pub fn normalize(ast: &DocumentAst, sel: &DocSelection) -> NormalizedSelection {
    let anchor_index = ast.block_index(sel.anchor.block_id);
    let focus_index = ast.block_index(sel.focus.block_id);

    let (point, index) = match (anchor_index, focus_index) {
        (Some(ai), Some(fi)) => {
            let anchor_key = (ai, sel.anchor.offset);
            let focus_key = (fi, sel.focus.offset);
            let ((start, si), (end, ei)) = if anchor_key <= focus_key {
                ((sel.anchor, ai), (sel.focus, fi))
            } else {
                ((sel.focus, fi), (sel.anchor, ai))
            };
            return NormalizedSelection {
                start_block: start.block_id,
                start_index: si,
                start_offset: clamp_offset(ast, &start),
                end_block: end.block_id,
                end_index: ei,
                end_offset: clamp_offset(ast, &end),
            };
        }
        (Some(ai), None) => (sel.anchor, ai),
        (None, Some(fi)) => (sel.focus, fi),
        // Both ends dangle; collapse to the start of the document.
        (None, None) => (Point::new(ast.blocks[0].id(), 0), 0),
    };

    let offset = clamp_offset(ast, &point);
    NormalizedSelection {
        start_block: point.block_id,
        start_index: index,
        start_offset: offset,
        end_block: point.block_id,
        end_index: index,
        end_offset: offset,
    }
}

/// The selected text. Same-block selections slice the flattened block text;
/// cross-block selections join the per-block parts with newlines.
pub fn snapshot(ast: &DocumentAst, sel: &DocSelection) -> String {
    let norm = normalize(ast, sel);
    if !norm.is_cross_block() {
        let block = match ast.find_block(norm.start_block) {
            Some(b) => b,
            None => return String::new(),
        };
        return text::slice(&ast::block_text(block), norm.start_offset, norm.end_offset)
            .to_string();
    }

    let mut parts = Vec::with_capacity(norm.end_index - norm.start_index + 1);
    for (i, block) in ast.blocks[norm.start_index..=norm.end_index].iter().enumerate() {
        let full = ast::block_text(block);
        let part = if i == 0 {
            text::slice(&full, norm.start_offset, text::utf16_len(&full)).to_string()
        } else if norm.start_index + i == norm.end_index {
            text::slice(&full, 0, norm.end_offset).to_string()
        } else {
            full
        };
        parts.push(part);
    }
    parts.join("\n")
}

/// Overlap test used by highlight rendering: does the UTF-16 range
/// `range_start..range_end` of `block_id` intersect the selection?
pub fn is_range_in_selection(
    ast: &DocumentAst,
    sel: &DocSelection,
    block_id: NodeId,
    range_start: usize,
    range_end: usize,
) -> bool {
    let norm = normalize(ast, sel);
    let block_index = match ast.block_index(block_id) {
        Some(i) => i,
        None => return false,
    };
    if block_index < norm.start_index || block_index > norm.end_index {
        return false;
    }

    // Effective selected sub-range within this block
    let sel_start = if block_index == norm.start_index {
        norm.start_offset
    } else {
        0
    };
    let sel_end = if block_index == norm.end_index {
        norm.end_offset
    } else {
        usize::MAX
    };

    range_start < sel_end && range_end > sel_start
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BlockNode;
    use pretty_assertions::assert_eq;

    fn two_paragraphs() -> DocumentAst {
        DocumentAst::from_blocks(vec![
            BlockNode::paragraph("First paragraph"),
            BlockNode::paragraph("Second paragraph"),
        ])
    }

    // ============ Normalize tests ============

    #[test]
    fn test_normalize_orders_reversed_same_block_selection() {
        let ast = two_paragraphs();
        let id = ast.blocks[0].id();
        let sel = DocSelection::range(Point::new(id, 10), Point::new(id, 2));

        let norm = normalize(&ast, &sel);

        assert_eq!(norm.start_offset, 2);
        assert_eq!(norm.end_offset, 10);
        assert!(!norm.is_cross_block());
    }

    #[test]
    fn test_normalize_orders_reversed_cross_block_selection() {
        let ast = two_paragraphs();
        let first = ast.blocks[0].id();
        let second = ast.blocks[1].id();
        // Anchor in the second block, focus in the first: backwards selection
        let sel = DocSelection::range(Point::new(second, 3), Point::new(first, 5));

        let norm = normalize(&ast, &sel);

        assert_eq!(norm.start_block, first);
        assert_eq!(norm.end_block, second);
        assert!(norm.start_index <= norm.end_index);
        assert_eq!(norm.start_offset, 5);
        assert_eq!(norm.end_offset, 3);
    }

    #[test]
    fn test_normalize_clamps_offsets_to_block_length() {
        let ast = two_paragraphs();
        let id = ast.blocks[0].id();
        let sel = DocSelection::range(Point::new(id, 0), Point::new(id, 999));

        let norm = normalize(&ast, &sel);

        assert_eq!(norm.end_offset, "First paragraph".len());
    }

    #[test]
    fn test_normalize_unknown_focus_degrades_to_anchor() {
        let ast = two_paragraphs();
        let id = ast.blocks[0].id();
        let sel = DocSelection::range(Point::new(id, 3), Point::new(NodeId::fresh(), 7));

        let norm = normalize(&ast, &sel);

        assert!(norm.is_collapsed());
        assert_eq!(norm.start_block, id);
        assert_eq!(norm.start_offset, 3);
    }

    #[test]
    fn test_normalize_both_ends_unknown_collapses_to_document_start() {
        let ast = two_paragraphs();
        let sel = DocSelection::range(
            Point::new(NodeId::fresh(), 3),
            Point::new(NodeId::fresh(), 7),
        );

        let norm = normalize(&ast, &sel);

        assert!(norm.is_collapsed());
        assert_eq!(norm.start_block, ast.blocks[0].id());
        assert_eq!(norm.start_offset, 0);
    }

    // ============ Snapshot tests ============

    #[test]
    fn test_snapshot_same_block_slice() {
        let ast = two_paragraphs();
        let id = ast.blocks[0].id();
        let sel = DocSelection::range(Point::new(id, 0), Point::new(id, 5));

        assert_eq!(snapshot(&ast, &sel), "First");
    }

    #[test]
    fn test_snapshot_cross_block_joins_with_newline() {
        let ast = two_paragraphs();
        let first = ast.blocks[0].id();
        let second = ast.blocks[1].id();
        let sel = DocSelection::range(Point::new(first, 6), Point::new(second, 6));

        assert_eq!(snapshot(&ast, &sel), "paragraph\nSecond");
    }

    #[test]
    fn test_snapshot_three_blocks_keeps_middle_whole() {
        let ast = DocumentAst::from_blocks(vec![
            BlockNode::paragraph("aaa"),
            BlockNode::paragraph("middle"),
            BlockNode::paragraph("zzz"),
        ]);
        let sel = DocSelection::range(
            Point::new(ast.blocks[0].id(), 1),
            Point::new(ast.blocks[2].id(), 2),
        );

        assert_eq!(snapshot(&ast, &sel), "aa\nmiddle\nzz");
    }

    #[test]
    fn test_snapshot_collapsed_is_empty() {
        let ast = two_paragraphs();
        let sel = DocSelection::collapsed(Point::new(ast.blocks[0].id(), 4));

        assert_eq!(snapshot(&ast, &sel), "");
    }

    // ============ Overlap tests ============

    #[test]
    fn test_range_overlap_within_selection() {
        let ast = two_paragraphs();
        let id = ast.blocks[0].id();
        let sel = DocSelection::range(Point::new(id, 2), Point::new(id, 10));

        assert!(is_range_in_selection(&ast, &sel, id, 4, 6));
        assert!(is_range_in_selection(&ast, &sel, id, 0, 3));
        assert!(!is_range_in_selection(&ast, &sel, id, 10, 12));
        assert!(!is_range_in_selection(&ast, &sel, id, 0, 2));
    }

    #[test]
    fn test_range_overlap_middle_block_of_cross_selection() {
        let ast = DocumentAst::from_blocks(vec![
            BlockNode::paragraph("aaa"),
            BlockNode::paragraph("middle"),
            BlockNode::paragraph("zzz"),
        ]);
        let sel = DocSelection::range(
            Point::new(ast.blocks[0].id(), 2),
            Point::new(ast.blocks[2].id(), 1),
        );

        // Any range in the middle block intersects
        assert!(is_range_in_selection(&ast, &sel, ast.blocks[1].id(), 0, 1));
        // Past the end offset in the last block does not
        assert!(!is_range_in_selection(&ast, &sel, ast.blocks[2].id(), 2, 3));
    }

    #[test]
    fn test_range_overlap_unknown_block_is_false() {
        let ast = two_paragraphs();
        let id = ast.blocks[0].id();
        let sel = DocSelection::range(Point::new(id, 0), Point::new(id, 5));

        assert!(!is_range_in_selection(&ast, &sel, NodeId::fresh(), 0, 5));
    }
}
