use std::collections::VecDeque;

use crate::ast::DocumentAst;
use crate::ops::DocOp;

/// One undo entry: the full pre-mutation document plus the ops that were
/// applied on top of it. Entries are deep copies; mutating the live AST can
/// never retroactively change them.
#[derive(Clone, Debug)]
pub(crate) struct HistoryEntry {
    pub ast: DocumentAst,
    pub ops: Vec<DocOp>,
}

/// Bounded linear history. The undo stack drops its oldest entry past the
/// limit; any new edit clears the redo stack (standard discard-on-new-edit
/// semantics).
#[derive(Debug)]
pub(crate) struct History {
    undo: VecDeque<HistoryEntry>,
    redo: Vec<DocumentAst>,
    limit: usize,
}

impl History {
    pub fn new(limit: usize) -> Self {
        History {
            undo: VecDeque::new(),
            redo: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// Record the pre-op snapshot for a batch that changed the document.
    pub fn record(&mut self, entry: HistoryEntry) {
        self.undo.push_back(entry);
        if self.undo.len() > self.limit {
            self.undo.pop_front();
        }
        self.redo.clear();
    }

    /// Pop the latest snapshot, stashing `current` for redo. `None` means
    /// nothing to undo — not an error.
    pub fn undo(&mut self, current: &DocumentAst) -> Option<DocumentAst> {
        let entry = self.undo.pop_back()?;
        self.redo.push(current.clone());
        Some(entry.ast)
    }

    /// Mirror of [`History::undo`].
    pub fn redo(&mut self, current: &DocumentAst) -> Option<DocumentAst> {
        let ast = self.redo.pop()?;
        self.undo.push_back(HistoryEntry {
            ast: current.clone(),
            ops: Vec::new(),
        });
        Some(ast)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    #[cfg(test)]
    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }
}
