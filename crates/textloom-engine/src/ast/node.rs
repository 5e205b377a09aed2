use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for a block node. Ids survive non-structural edits and
/// only change on create/split/merge.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    pub fn fresh() -> Self {
        NodeId(Uuid::new_v4())
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Independent boolean text styles carried by a run.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TextMarks {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub code: bool,
}

/// Selector for one of the five boolean marks.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TextMarkKind {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Code,
}

impl TextMarks {
    pub fn get(&self, kind: TextMarkKind) -> bool {
        match kind {
            TextMarkKind::Bold => self.bold,
            TextMarkKind::Italic => self.italic,
            TextMarkKind::Underline => self.underline,
            TextMarkKind::Strikethrough => self.strikethrough,
            TextMarkKind::Code => self.code,
        }
    }

    pub fn set(&mut self, kind: TextMarkKind, value: bool) {
        match kind {
            TextMarkKind::Bold => self.bold = value,
            TextMarkKind::Italic => self.italic = value,
            TextMarkKind::Underline => self.underline = value,
            TextMarkKind::Strikethrough => self.strikethrough = value,
            TextMarkKind::Code => self.code = value,
        }
    }
}

/// Leaf inline unit: a span of text with one mark set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRun {
    pub text: String,
    #[serde(default)]
    pub marks: TextMarks,
}

impl TextRun {
    pub fn plain(text: impl Into<String>) -> Self {
        TextRun {
            text: text.into(),
            marks: TextMarks::default(),
        }
    }

    pub fn with_marks(text: impl Into<String>, marks: TextMarks) -> Self {
        TextRun {
            text: text.into(),
            marks,
        }
    }
}

/// Inline content of a block: plain runs, or links wrapping runs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum InlineNode {
    Run(TextRun),
    Link { href: String, children: Vec<TextRun> },
}

impl InlineNode {
    pub fn run(text: impl Into<String>) -> Self {
        InlineNode::Run(TextRun::plain(text))
    }

    pub fn link(href: impl Into<String>, children: Vec<TextRun>) -> Self {
        InlineNode::Link {
            href: href.into(),
            children,
        }
    }

    /// Concatenated text of this inline node.
    pub fn text(&self) -> String {
        match self {
            InlineNode::Run(run) => run.text.clone(),
            InlineNode::Link { children, .. } => {
                children.iter().map(|r| r.text.as_str()).collect()
            }
        }
    }
}

/// One item of a list block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListItem {
    pub children: Vec<InlineNode>,
}

impl ListItem {
    pub fn plain(text: impl Into<String>) -> Self {
        ListItem {
            children: vec![InlineNode::run(text)],
        }
    }
}

/// A top-level structural unit of the document.
///
/// Every block carries a stable id. Paragraphs and headings hold inline
/// children directly; lists hold items; placeholders stand in for content this
/// engine does not model (embeds, tables) and preserve its raw form verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BlockNode {
    Paragraph {
        id: NodeId,
        children: Vec<InlineNode>,
    },
    Heading {
        id: NodeId,
        level: u8,
        children: Vec<InlineNode>,
    },
    List {
        id: NodeId,
        ordered: bool,
        items: Vec<ListItem>,
    },
    Placeholder {
        id: NodeId,
        raw_content: String,
        label: String,
    },
}

impl BlockNode {
    /// Empty paragraph with a fresh id.
    pub fn empty_paragraph() -> Self {
        BlockNode::Paragraph {
            id: NodeId::fresh(),
            children: vec![InlineNode::run("")],
        }
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        BlockNode::Paragraph {
            id: NodeId::fresh(),
            children: vec![InlineNode::run(text)],
        }
    }

    pub fn paragraph_with(children: Vec<InlineNode>) -> Self {
        BlockNode::Paragraph {
            id: NodeId::fresh(),
            children,
        }
    }

    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        BlockNode::Heading {
            id: NodeId::fresh(),
            level: level.clamp(1, 6),
            children: vec![InlineNode::run(text)],
        }
    }

    pub fn list(ordered: bool, items: Vec<ListItem>) -> Self {
        BlockNode::List {
            id: NodeId::fresh(),
            ordered,
            items,
        }
    }

    pub fn placeholder(raw_content: impl Into<String>, label: impl Into<String>) -> Self {
        BlockNode::Placeholder {
            id: NodeId::fresh(),
            raw_content: raw_content.into(),
            label: label.into(),
        }
    }

    pub fn id(&self) -> NodeId {
        match self {
            BlockNode::Paragraph { id, .. }
            | BlockNode::Heading { id, .. }
            | BlockNode::List { id, .. }
            | BlockNode::Placeholder { id, .. } => *id,
        }
    }

    /// Whether this block holds inline children directly (paragraphs and
    /// headings). Lists hold them one level down; placeholders hold none.
    pub fn has_inline_children(&self) -> bool {
        matches!(self, BlockNode::Paragraph { .. } | BlockNode::Heading { .. })
    }

    pub fn inline_children(&self) -> Option<&[InlineNode]> {
        match self {
            BlockNode::Paragraph { children, .. } | BlockNode::Heading { children, .. } => {
                Some(children)
            }
            _ => None,
        }
    }

    pub(crate) fn inline_children_mut(&mut self) -> Option<&mut Vec<InlineNode>> {
        match self {
            BlockNode::Paragraph { children, .. } | BlockNode::Heading { children, .. } => {
                Some(children)
            }
            _ => None,
        }
    }
}
