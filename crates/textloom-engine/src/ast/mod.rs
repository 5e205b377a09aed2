//! Structural document model: blocks, inline runs, marks.
//!
//! This module is data plus read-only accessors. Factories hand out nodes with
//! fresh unique ids and do no validation beyond type discrimination —
//! validating offsets and targets is the engine's job. The only sanctioned
//! mutation channel is the operation engine.

pub mod node;
pub mod text;

pub use node::{BlockNode, InlineNode, ListItem, NodeId, TextMarkKind, TextMarks, TextRun};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Free-form document metadata carried alongside the blocks.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocMetadata {
    pub title: Option<String>,
    pub extra: BTreeMap<String, String>,
}

/// The authoritative document tree: an ordered list of blocks plus a
/// monotonically increasing version.
///
/// Invariant: `blocks` is never empty. The engine re-inserts a blank paragraph
/// whenever a deletion would empty the document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentAst {
    pub version: u64,
    pub blocks: Vec<BlockNode>,
    #[serde(default)]
    pub metadata: DocMetadata,
}

impl DocumentAst {
    /// Canonical blank document: version 0, one empty paragraph.
    pub fn new_blank() -> Self {
        DocumentAst {
            version: 0,
            blocks: vec![BlockNode::empty_paragraph()],
            metadata: DocMetadata::default(),
        }
    }

    /// Build a document from pre-made blocks (import path). An empty list
    /// still yields a valid document with one blank paragraph.
    pub fn from_blocks(blocks: Vec<BlockNode>) -> Self {
        let blocks = if blocks.is_empty() {
            vec![BlockNode::empty_paragraph()]
        } else {
            blocks
        };
        DocumentAst {
            version: 0,
            blocks,
            metadata: DocMetadata::default(),
        }
    }

    pub fn find_block(&self, id: NodeId) -> Option<&BlockNode> {
        self.blocks.iter().find(|b| b.id() == id)
    }

    pub(crate) fn find_block_mut(&mut self, id: NodeId) -> Option<&mut BlockNode> {
        self.blocks.iter_mut().find(|b| b.id() == id)
    }

    pub fn block_index(&self, id: NodeId) -> Option<usize> {
        self.blocks.iter().position(|b| b.id() == id)
    }
}

/// Concatenated text of a sequence of inline nodes.
pub fn inline_text(children: &[InlineNode]) -> String {
    children.iter().map(|c| c.text()).collect()
}

/// Full flattened text of a block.
///
/// Placeholders render as `[label]`; list items are joined by newlines so that
/// offsets into the joined text address the whole list.
pub fn block_text(block: &BlockNode) -> String {
    match block {
        BlockNode::Paragraph { children, .. } | BlockNode::Heading { children, .. } => {
            inline_text(children)
        }
        BlockNode::List { items, .. } => items
            .iter()
            .map(|item| inline_text(&item.children))
            .collect::<Vec<_>>()
            .join("\n"),
        BlockNode::Placeholder { label, .. } => format!("[{label}]"),
    }
}
