//! The operation engine: the only sanctioned way to mutate a document.
//!
//! `apply_ops` takes the current immutable AST plus a batch of ops and returns
//! a fresh AST, leaving the input untouched. Each engine instance owns its own
//! undo/redo history and inline-mark state, so hosts can run several documents
//! side by side.

mod handlers;
mod history;

use serde::{Deserialize, Serialize};

use crate::ast::DocumentAst;
use crate::marks::InlineMarkState;
use crate::ops::DocOp;
use history::{History, HistoryEntry};

pub(crate) use handlers::Outcome;

/// Default depth of the undo stack.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Tunables for a new engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineOptions {
    pub history_limit: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

/// Result of applying a batch of ops.
#[derive(Clone, Debug, PartialEq)]
pub struct ApplyResult {
    /// The next document state. Equal to the input when nothing changed.
    pub ast: DocumentAst,
    /// Whether any op in the batch mutated the AST.
    pub changed: bool,
    /// The new mark state, present only when an op touched the annotation
    /// layer.
    pub marks: Option<InlineMarkState>,
}

/// A document operation engine with bounded linear history.
#[derive(Debug)]
pub struct Engine {
    history: History,
    marks: InlineMarkState,
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Engine::with_options(EngineOptions::default())
    }

    pub fn with_options(options: EngineOptions) -> Self {
        Engine {
            history: History::new(options.history_limit),
            marks: InlineMarkState::new(),
        }
    }

    /// Apply a batch of ops atomically against `ast`.
    ///
    /// The whole batch produces at most one history entry: the pre-batch
    /// snapshot is recorded only if at least one op changed the AST, so no-op
    /// batches never pollute the undo stack and never bump the version.
    /// Annotation-layer ops update the mark state but do not participate in
    /// undo history.
    pub fn apply_ops(&mut self, ast: &DocumentAst, ops: &[DocOp]) -> ApplyResult {
        let mut next = ast.clone();
        let mut ast_changed = false;
        let mut marks_changed = false;

        for op in ops {
            match handlers::apply(&mut next, &mut self.marks, op) {
                Outcome::Ast => ast_changed = true,
                Outcome::Marks => marks_changed = true,
                Outcome::Nothing => {}
            }
        }

        if ast_changed {
            next.version = ast.version + 1;
            self.history.record(HistoryEntry {
                ast: ast.clone(),
                ops: ops.to_vec(),
            });
        }

        ApplyResult {
            ast: next,
            changed: ast_changed,
            marks: marks_changed.then(|| self.marks.clone()),
        }
    }

    /// Restore the snapshot preceding the last recorded batch. `None` when
    /// the undo stack is empty.
    pub fn undo(&mut self, current: &DocumentAst) -> Option<DocumentAst> {
        self.history.undo(current)
    }

    /// Re-apply the most recently undone state. `None` when the redo stack is
    /// empty.
    pub fn redo(&mut self, current: &DocumentAst) -> Option<DocumentAst> {
        self.history.redo(current)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Current annotation-layer state.
    pub fn marks(&self) -> &InlineMarkState {
        &self.marks
    }
}
