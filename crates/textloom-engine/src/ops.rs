//! Atomic operation vocabulary.
//!
//! A [`DocOp`] is the only sanctioned mutation channel and the unit of
//! serialization for any persisted or replicated operation log. The wire shape
//! is `{type, payload, meta}` with a camelCase type tag, so logs interoperate
//! with the editing surface's own serializer.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ast::{NodeId, TextMarkKind};
use crate::marks::{ClearScope, InlineMark, MarkId};

/// Unique identifier stamped on every dispatched op.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub struct OpId(pub Uuid);

impl OpId {
    pub fn fresh() -> Self {
        OpId(Uuid::new_v4())
    }
}

/// Who produced an op.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OpSource {
    User,
    Agent,
    System,
}

/// Provenance attached to each op.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpMeta {
    pub source: OpSource,
    pub timestamp_ms: u64,
    pub op_id: OpId,
}

impl OpMeta {
    pub fn from_source(source: OpSource) -> Self {
        OpMeta {
            source,
            timestamp_ms: now_millis(),
            op_id: OpId::fresh(),
        }
    }
}

fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// The closed set of mutations the engine understands.
///
/// All offsets are UTF-16 code units into the target block's flattened text.
/// `Custom` is the forward-compatible escape hatch: the engine itself treats
/// it as a no-op and hosts translate custom intents upstream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum OpKind {
    /// Insert a paragraph at the document start (`after_id: None`) or after
    /// the given block. A missing target appends at the end.
    InsertParagraph {
        after_id: Option<NodeId>,
        text: Option<String>,
    },
    /// Splice text into a block's flattened text.
    InsertText {
        node_id: NodeId,
        offset: usize,
        text: String,
    },
    /// Delete within one block, or splice across blocks removing everything
    /// in between.
    DeleteRange {
        start_id: NodeId,
        start_offset: usize,
        end_id: NodeId,
        end_offset: usize,
    },
    /// Flip one boolean mark over a sub-range of a block. `force` pins the
    /// resulting value instead of toggling.
    ToggleMark {
        node_id: NodeId,
        start_offset: usize,
        end_offset: usize,
        mark: TextMarkKind,
        force: Option<bool>,
    },
    /// Level 0 converts to a paragraph; 1–6 to a heading. Id and children are
    /// preserved either way.
    SetHeadingLevel { node_id: NodeId, level: u8 },
    /// Remove a block. The engine re-inserts a blank paragraph if the
    /// document would become empty.
    DeleteNode { node_id: NodeId },
    /// Split a block in two at the given offset; the first half keeps the id.
    SplitBlock { node_id: NodeId, offset: usize },
    /// Insert a soft line break inside a block.
    InsertLineBreak { node_id: NodeId, offset: usize },
    /// Wholesale text replacement with a single unformatted run. Prior marks
    /// are discarded by design.
    ReplaceBlockText { node_id: NodeId, text: String },
    /// Annotation-layer ops: these mutate the inline-mark state only, never
    /// the AST.
    ApplyInlineMark { mark: InlineMark },
    RemoveInlineMark { mark_id: MarkId },
    ClearInlineMarks { scope: ClearScope },
    /// Extension escape hatch.
    Custom {
        custom_type: String,
        data: serde_json::Value,
    },
}

/// One atomic, serializable mutation descriptor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocOp {
    #[serde(flatten)]
    pub kind: OpKind,
    pub meta: OpMeta,
}

impl DocOp {
    /// Wrap an op kind with user-sourced metadata.
    pub fn new(kind: OpKind) -> Self {
        DocOp {
            kind,
            meta: OpMeta::from_source(OpSource::User),
        }
    }

    pub fn from_source(kind: OpKind, source: OpSource) -> Self {
        DocOp {
            kind,
            meta: OpMeta::from_source(source),
        }
    }

    // Shorthand constructors for the common ops; routers build these inline.

    pub fn insert_paragraph(after_id: Option<NodeId>, text: Option<String>) -> Self {
        DocOp::new(OpKind::InsertParagraph { after_id, text })
    }

    pub fn insert_text(node_id: NodeId, offset: usize, text: impl Into<String>) -> Self {
        DocOp::new(OpKind::InsertText {
            node_id,
            offset,
            text: text.into(),
        })
    }

    pub fn delete_range(
        start_id: NodeId,
        start_offset: usize,
        end_id: NodeId,
        end_offset: usize,
    ) -> Self {
        DocOp::new(OpKind::DeleteRange {
            start_id,
            start_offset,
            end_id,
            end_offset,
        })
    }

    pub fn toggle_mark(
        node_id: NodeId,
        start_offset: usize,
        end_offset: usize,
        mark: TextMarkKind,
    ) -> Self {
        DocOp::new(OpKind::ToggleMark {
            node_id,
            start_offset,
            end_offset,
            mark,
            force: None,
        })
    }

    pub fn set_heading_level(node_id: NodeId, level: u8) -> Self {
        DocOp::new(OpKind::SetHeadingLevel { node_id, level })
    }

    pub fn delete_node(node_id: NodeId) -> Self {
        DocOp::new(OpKind::DeleteNode { node_id })
    }

    pub fn split_block(node_id: NodeId, offset: usize) -> Self {
        DocOp::new(OpKind::SplitBlock { node_id, offset })
    }

    pub fn insert_line_break(node_id: NodeId, offset: usize) -> Self {
        DocOp::new(OpKind::InsertLineBreak { node_id, offset })
    }

    pub fn replace_block_text(node_id: NodeId, text: impl Into<String>) -> Self {
        DocOp::new(OpKind::ReplaceBlockText {
            node_id,
            text: text.into(),
        })
    }
}
