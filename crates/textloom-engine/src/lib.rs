pub mod ast;
pub mod commands;
pub mod engine;
pub mod error;
pub mod marks;
pub mod ops;
pub mod selection;

// Re-export key types for easier usage
pub use ast::{
    BlockNode, DocMetadata, DocumentAst, InlineNode, ListItem, NodeId, TextMarkKind, TextMarks,
    TextRun,
};
pub use commands::{
    BlockTypeTarget, CommandId, CommandOutcome, CommandRouter, CommandState, EditorCommand,
};
pub use engine::{ApplyResult, Engine, EngineOptions};
pub use error::CommandError;
pub use marks::{ClearScope, InlineMark, InlineMarkState, MarkId, MarkKind, TextAnchor};
pub use ops::{DocOp, OpId, OpKind, OpMeta, OpSource};
pub use selection::{DocSelection, NormalizedSelection, Point};
