//! Command router: translates editing intents plus the current selection into
//! op batches, applies them through the engine, and computes where the caret
//! lands afterwards.
//!
//! The router is the validation boundary. It rejects commands that need a
//! selection when none is given and cross-block formatting, and it maps empty
//! undo/redo stacks to errors; past that point the engine itself never fails.

use std::collections::BTreeMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::ast::{BlockNode, DocumentAst, InlineNode, TextMarkKind};
use crate::engine::{Engine, EngineOptions};
use crate::error::CommandError;
use crate::marks::{ClearScope, InlineMark, MarkId};
use crate::ops::DocOp;
use crate::selection::{self, DocSelection, NormalizedSelection, Point};
use crate::ast::text;

/// What a block should become under [`EditorCommand::SetBlockType`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BlockTypeTarget {
    Paragraph,
    Heading { level: u8 },
}

/// An editing intent, as dispatched by a toolbar, keymap, or agent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "command",
    content = "args",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum EditorCommand {
    InsertText { text: String },
    DeleteRange,
    /// Replace the selected text wholesale (the rewrite path).
    ReplaceRange { text: String },
    SplitBlock,
    InsertLineBreak,
    InsertParagraph { text: Option<String> },
    DeleteBlock,
    ToggleFormat { mark: TextMarkKind },
    SetBlockType { target: BlockTypeTarget },
    Undo,
    Redo,
    AddInlineMark { mark: InlineMark },
    RemoveInlineMark { mark_id: MarkId },
    ClearInlineMarks { scope: ClearScope },
}

/// Stable identifier per intent, used for telemetry and [`CommandRouter::command_state`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CommandId {
    InsertText,
    DeleteRange,
    ReplaceRange,
    SplitBlock,
    InsertLineBreak,
    InsertParagraph,
    DeleteBlock,
    ToggleBold,
    ToggleItalic,
    ToggleUnderline,
    ToggleStrikethrough,
    ToggleCode,
    SetBlockType,
    Undo,
    Redo,
    AddInlineMark,
    RemoveInlineMark,
    ClearInlineMarks,
}

impl CommandId {
    pub const ALL: [CommandId; 18] = [
        CommandId::InsertText,
        CommandId::DeleteRange,
        CommandId::ReplaceRange,
        CommandId::SplitBlock,
        CommandId::InsertLineBreak,
        CommandId::InsertParagraph,
        CommandId::DeleteBlock,
        CommandId::ToggleBold,
        CommandId::ToggleItalic,
        CommandId::ToggleUnderline,
        CommandId::ToggleStrikethrough,
        CommandId::ToggleCode,
        CommandId::SetBlockType,
        CommandId::Undo,
        CommandId::Redo,
        CommandId::AddInlineMark,
        CommandId::RemoveInlineMark,
        CommandId::ClearInlineMarks,
    ];

    fn toggle_mark(self) -> Option<TextMarkKind> {
        match self {
            CommandId::ToggleBold => Some(TextMarkKind::Bold),
            CommandId::ToggleItalic => Some(TextMarkKind::Italic),
            CommandId::ToggleUnderline => Some(TextMarkKind::Underline),
            CommandId::ToggleStrikethrough => Some(TextMarkKind::Strikethrough),
            CommandId::ToggleCode => Some(TextMarkKind::Code),
            _ => None,
        }
    }
}

impl EditorCommand {
    pub fn id(&self) -> CommandId {
        match self {
            EditorCommand::InsertText { .. } => CommandId::InsertText,
            EditorCommand::DeleteRange => CommandId::DeleteRange,
            EditorCommand::ReplaceRange { .. } => CommandId::ReplaceRange,
            EditorCommand::SplitBlock => CommandId::SplitBlock,
            EditorCommand::InsertLineBreak => CommandId::InsertLineBreak,
            EditorCommand::InsertParagraph { .. } => CommandId::InsertParagraph,
            EditorCommand::DeleteBlock => CommandId::DeleteBlock,
            EditorCommand::ToggleFormat { mark } => match mark {
                TextMarkKind::Bold => CommandId::ToggleBold,
                TextMarkKind::Italic => CommandId::ToggleItalic,
                TextMarkKind::Underline => CommandId::ToggleUnderline,
                TextMarkKind::Strikethrough => CommandId::ToggleStrikethrough,
                TextMarkKind::Code => CommandId::ToggleCode,
            },
            EditorCommand::SetBlockType { .. } => CommandId::SetBlockType,
            EditorCommand::Undo => CommandId::Undo,
            EditorCommand::Redo => CommandId::Redo,
            EditorCommand::AddInlineMark { .. } => CommandId::AddInlineMark,
            EditorCommand::RemoveInlineMark { .. } => CommandId::RemoveInlineMark,
            EditorCommand::ClearInlineMarks { .. } => CommandId::ClearInlineMarks,
        }
    }
}

/// Result of a successfully routed command.
#[derive(Clone, Debug, PartialEq)]
pub struct CommandOutcome {
    pub ast: DocumentAst,
    /// Where the caret lands. `None` means the caller should keep (or restore)
    /// its own selection, as after undo/redo.
    pub selection: Option<DocSelection>,
    pub changed: bool,
}

/// Per-command UI state: can it run right now, and is its formatting active at
/// the selection.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandState {
    pub enabled: bool,
    pub active: bool,
}

/// Routes [`EditorCommand`]s for one document through one [`Engine`].
#[derive(Debug, Default)]
pub struct CommandRouter {
    engine: Engine,
}

impl CommandRouter {
    pub fn new() -> Self {
        CommandRouter {
            engine: Engine::new(),
        }
    }

    pub fn with_options(options: EngineOptions) -> Self {
        CommandRouter {
            engine: Engine::with_options(options),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Execute one command against `ast` with the caller's selection.
    pub fn execute(
        &mut self,
        ast: &DocumentAst,
        sel: Option<&DocSelection>,
        command: &EditorCommand,
    ) -> Result<CommandOutcome, CommandError> {
        let started = Instant::now();
        let id = command.id();
        let result = self.dispatch(ast, sel, command);
        match &result {
            Ok(outcome) => log::debug!(
                "{id:?} handled in {:?} (changed: {})",
                started.elapsed(),
                outcome.changed
            ),
            Err(err) => log::debug!("{id:?} rejected in {:?}: {err}", started.elapsed()),
        }
        result
    }

    fn dispatch(
        &mut self,
        ast: &DocumentAst,
        sel: Option<&DocSelection>,
        command: &EditorCommand,
    ) -> Result<CommandOutcome, CommandError> {
        match command {
            EditorCommand::Undo => {
                let restored = self.engine.undo(ast).ok_or(CommandError::NothingToUndo)?;
                Ok(CommandOutcome {
                    ast: restored,
                    selection: None,
                    changed: true,
                })
            }
            EditorCommand::Redo => {
                let restored = self.engine.redo(ast).ok_or(CommandError::NothingToRedo)?;
                Ok(CommandOutcome {
                    ast: restored,
                    selection: None,
                    changed: true,
                })
            }

            // Annotation-layer commands need no selection
            EditorCommand::AddInlineMark { mark } => {
                if !mark.anchor.is_valid() {
                    return Err(CommandError::InvalidAnchor);
                }
                let ops = [DocOp::new(crate::ops::OpKind::ApplyInlineMark {
                    mark: mark.clone(),
                })];
                Ok(self.apply(ast, sel.copied(), &ops))
            }
            EditorCommand::RemoveInlineMark { mark_id } => {
                let ops = [DocOp::new(crate::ops::OpKind::RemoveInlineMark {
                    mark_id: *mark_id,
                })];
                Ok(self.apply(ast, sel.copied(), &ops))
            }
            EditorCommand::ClearInlineMarks { scope } => {
                let ops = [DocOp::new(crate::ops::OpKind::ClearInlineMarks {
                    scope: scope.clone(),
                })];
                Ok(self.apply(ast, sel.copied(), &ops))
            }

            _ => {
                let sel = sel.ok_or(CommandError::NoSelection)?;
                let norm = selection::normalize(ast, sel);
                self.dispatch_with_selection(ast, sel, &norm, command)
            }
        }
    }

    fn dispatch_with_selection(
        &mut self,
        ast: &DocumentAst,
        sel: &DocSelection,
        norm: &NormalizedSelection,
        command: &EditorCommand,
    ) -> Result<CommandOutcome, CommandError> {
        match command {
            EditorCommand::InsertText { text } => {
                log::debug!("insertText {}", preview(text));
                let mut ops = Vec::with_capacity(2);
                if !norm.is_collapsed() {
                    ops.push(DocOp::delete_range(
                        norm.start_block,
                        norm.start_offset,
                        norm.end_block,
                        norm.end_offset,
                    ));
                }
                ops.push(DocOp::insert_text(norm.start_block, norm.start_offset, text));
                let caret = Point::new(
                    norm.start_block,
                    norm.start_offset + text::utf16_len(text),
                );
                Ok(self.apply(ast, Some(DocSelection::collapsed(caret)), &ops))
            }

            EditorCommand::DeleteRange => {
                if norm.is_collapsed() {
                    return Ok(CommandOutcome {
                        ast: ast.clone(),
                        selection: Some(*sel),
                        changed: false,
                    });
                }
                let ops = [DocOp::delete_range(
                    norm.start_block,
                    norm.start_offset,
                    norm.end_block,
                    norm.end_offset,
                )];
                let caret = Point::new(norm.start_block, norm.start_offset);
                Ok(self.apply(ast, Some(DocSelection::collapsed(caret)), &ops))
            }

            EditorCommand::ReplaceRange { text } => {
                log::debug!("replaceRange {}", preview(text));
                let mut ops = Vec::with_capacity(2);
                if !norm.is_collapsed() {
                    ops.push(DocOp::delete_range(
                        norm.start_block,
                        norm.start_offset,
                        norm.end_block,
                        norm.end_offset,
                    ));
                }
                if !text.is_empty() {
                    ops.push(DocOp::insert_text(
                        norm.start_block,
                        norm.start_offset,
                        text,
                    ));
                }
                let caret = Point::new(
                    norm.start_block,
                    norm.start_offset + text::utf16_len(text),
                );
                Ok(self.apply(ast, Some(DocSelection::collapsed(caret)), &ops))
            }

            EditorCommand::SplitBlock => {
                let ops = [DocOp::split_block(norm.start_block, norm.start_offset)];
                let mut outcome = self.apply(ast, None, &ops);
                // Caret moves to the start of the successor block
                outcome.selection = outcome
                    .ast
                    .blocks
                    .get(norm.start_index + 1)
                    .map(|b| DocSelection::collapsed(Point::new(b.id(), 0)))
                    .or(Some(*sel));
                Ok(outcome)
            }

            EditorCommand::InsertLineBreak => {
                let ops = [DocOp::insert_line_break(norm.start_block, norm.start_offset)];
                let caret = Point::new(norm.start_block, norm.start_offset + 1);
                Ok(self.apply(ast, Some(DocSelection::collapsed(caret)), &ops))
            }

            EditorCommand::InsertParagraph { text } => {
                let ops = [DocOp::insert_paragraph(
                    Some(norm.start_block),
                    text.clone(),
                )];
                let mut outcome = self.apply(ast, None, &ops);
                outcome.selection = outcome
                    .ast
                    .blocks
                    .get(norm.start_index + 1)
                    .map(|b| DocSelection::collapsed(Point::new(b.id(), 0)))
                    .or(Some(*sel));
                Ok(outcome)
            }

            EditorCommand::DeleteBlock => {
                let ops = [DocOp::delete_node(norm.start_block)];
                let mut outcome = self.apply(ast, None, &ops);
                let index = norm.start_index.min(outcome.ast.blocks.len() - 1);
                outcome.selection = Some(DocSelection::collapsed(Point::new(
                    outcome.ast.blocks[index].id(),
                    0,
                )));
                Ok(outcome)
            }

            EditorCommand::ToggleFormat { mark } => {
                if norm.is_cross_block() {
                    return Err(CommandError::CrossBlockFormat);
                }
                if norm.is_collapsed() {
                    return Ok(CommandOutcome {
                        ast: ast.clone(),
                        selection: Some(*sel),
                        changed: false,
                    });
                }
                let ops = [DocOp::toggle_mark(
                    norm.start_block,
                    norm.start_offset,
                    norm.end_offset,
                    *mark,
                )];
                Ok(self.apply(ast, Some(*sel), &ops))
            }

            EditorCommand::SetBlockType { target } => {
                let level = match target {
                    BlockTypeTarget::Paragraph => 0,
                    BlockTypeTarget::Heading { level } => *level,
                };
                let ops = [DocOp::set_heading_level(norm.start_block, level)];
                Ok(self.apply(ast, Some(*sel), &ops))
            }

            // Selection-free commands are handled one level up
            EditorCommand::Undo
            | EditorCommand::Redo
            | EditorCommand::AddInlineMark { .. }
            | EditorCommand::RemoveInlineMark { .. }
            | EditorCommand::ClearInlineMarks { .. } => unreachable!(),
        }
    }

    fn apply(
        &mut self,
        ast: &DocumentAst,
        selection: Option<DocSelection>,
        ops: &[DocOp],
    ) -> CommandOutcome {
        let result = self.engine.apply_ops(ast, ops);
        CommandOutcome {
            ast: result.ast,
            selection,
            changed: result.changed || result.marks.is_some(),
        }
    }

    /// Reflect the enabled/active state of every command for toolbar rendering.
    ///
    /// `active` for the format toggles is computed from the first inline run of
    /// the selection's start block only (`active_of_first_run`): a cheap
    /// approximation that reads one run instead of resolving the full zone.
    pub fn command_state(
        &self,
        ast: &DocumentAst,
        sel: Option<&DocSelection>,
    ) -> BTreeMap<CommandId, CommandState> {
        let norm = sel.map(|s| selection::normalize(ast, s));
        let has_sel = norm.is_some();
        let single_block = norm.as_ref().is_some_and(|n| !n.is_cross_block());
        let editable_block = norm.as_ref().is_some_and(|n| {
            ast.find_block(n.start_block)
                .is_some_and(BlockNode::has_inline_children)
        });

        CommandId::ALL
            .iter()
            .map(|&id| {
                let state = match id {
                    CommandId::Undo => CommandState {
                        enabled: self.engine.can_undo(),
                        active: false,
                    },
                    CommandId::Redo => CommandState {
                        enabled: self.engine.can_redo(),
                        active: false,
                    },
                    CommandId::AddInlineMark
                    | CommandId::RemoveInlineMark
                    | CommandId::ClearInlineMarks => CommandState {
                        enabled: true,
                        active: false,
                    },
                    CommandId::SetBlockType => CommandState {
                        enabled: has_sel && editable_block,
                        active: false,
                    },
                    _ => match id.toggle_mark() {
                        Some(mark) => CommandState {
                            enabled: has_sel && single_block && editable_block,
                            active: norm
                                .as_ref()
                                .is_some_and(|n| active_of_first_run(ast, n, mark)),
                        },
                        None => CommandState {
                            enabled: has_sel,
                            active: false,
                        },
                    },
                };
                (id, state)
            })
            .collect()
    }
}

/// Whether `mark` is set on the first inline run of the selection's start
/// block. Deliberately ignores the rest of the zone.
fn active_of_first_run(ast: &DocumentAst, norm: &NormalizedSelection, mark: TextMarkKind) -> bool {
    ast.find_block(norm.start_block)
        .and_then(BlockNode::inline_children)
        .and_then(<[InlineNode]>::first)
        .map(|node| match node {
            InlineNode::Run(run) => run.marks.get(mark),
            InlineNode::Link { children, .. } => {
                children.first().is_some_and(|r| r.marks.get(mark))
            }
        })
        .unwrap_or(false)
}

const PREVIEW_LEN: usize = 16;

/// Short, privacy-safe preview of a text payload for logs.
fn preview(text: &str) -> String {
    let truncated: String = text.chars().take(PREVIEW_LEN).collect();
    if truncated.len() < text.len() {
        format!("{truncated:?}… ({} chars)", text.chars().count())
    } else {
        format!("{truncated:?}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{self, NodeId};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn doc(text: &str) -> DocumentAst {
        DocumentAst::from_blocks(vec![BlockNode::paragraph(text)])
    }

    fn caret(ast: &DocumentAst, offset: usize) -> DocSelection {
        DocSelection::collapsed(Point::new(ast.blocks[0].id(), offset))
    }

    fn range(ast: &DocumentAst, start: usize, end: usize) -> DocSelection {
        let id = ast.blocks[0].id();
        DocSelection::range(Point::new(id, start), Point::new(id, end))
    }

    // ============ Validation tests ============

    #[test]
    fn test_selection_commands_require_selection() {
        let mut router = CommandRouter::new();
        let ast = doc("Hello");

        let err = router
            .execute(&ast, None, &EditorCommand::InsertText { text: "x".into() })
            .unwrap_err();
        assert_eq!(err, CommandError::NoSelection);
        assert_eq!(err.to_string(), "No selection");
    }

    #[test]
    fn test_cross_block_format_is_rejected() {
        let mut router = CommandRouter::new();
        let ast = DocumentAst::from_blocks(vec![
            BlockNode::paragraph("one"),
            BlockNode::paragraph("two"),
        ]);
        let sel = DocSelection::range(
            Point::new(ast.blocks[0].id(), 0),
            Point::new(ast.blocks[1].id(), 3),
        );

        let err = router
            .execute(
                &ast,
                Some(&sel),
                &EditorCommand::ToggleFormat {
                    mark: TextMarkKind::Bold,
                },
            )
            .unwrap_err();
        assert_eq!(err, CommandError::CrossBlockFormat);
        assert!(err.to_string().contains("Cross-block"));
    }

    #[test]
    fn test_undo_redo_on_empty_stacks() {
        let mut router = CommandRouter::new();
        let ast = doc("Hello");

        assert_eq!(
            router.execute(&ast, None, &EditorCommand::Undo).unwrap_err(),
            CommandError::NothingToUndo
        );
        assert_eq!(
            router.execute(&ast, None, &EditorCommand::Redo).unwrap_err(),
            CommandError::NothingToRedo
        );
    }

    #[test]
    fn test_add_inline_mark_rejects_invalid_anchor() {
        let mut router = CommandRouter::new();
        let ast = doc("Hello");
        let mark = InlineMark::new(
            crate::marks::TextAnchor::new("sec", 4, 4),
            crate::marks::MarkKind::Highlight,
            "test",
        );

        let err = router
            .execute(&ast, None, &EditorCommand::AddInlineMark { mark })
            .unwrap_err();
        assert_eq!(err, CommandError::InvalidAnchor);
    }

    // ============ Caret repositioning tests ============

    #[test]
    fn test_insert_text_moves_caret_past_insertion() {
        let mut router = CommandRouter::new();
        let ast = doc("Held");
        let sel = caret(&ast, 3);

        let outcome = router
            .execute(&ast, Some(&sel), &EditorCommand::InsertText { text: "lo wor".into() })
            .unwrap();

        assert_eq!(ast::block_text(&outcome.ast.blocks[0]), "Hello word");
        let new_sel = outcome.selection.unwrap();
        assert!(new_sel.is_collapsed());
        assert_eq!(new_sel.anchor.offset, 9);
    }

    #[test]
    fn test_insert_text_over_range_replaces_it() {
        let mut router = CommandRouter::new();
        let ast = doc("Hello cruel World");
        let sel = range(&ast, 6, 12);

        let outcome = router
            .execute(&ast, Some(&sel), &EditorCommand::InsertText { text: "kind ".into() })
            .unwrap();

        assert_eq!(ast::block_text(&outcome.ast.blocks[0]), "Hello kind World");
        assert_eq!(outcome.selection.unwrap().anchor.offset, 11);
    }

    #[test]
    fn test_insert_text_caret_offset_counts_utf16_units() {
        let mut router = CommandRouter::new();
        let ast = doc("");
        let sel = caret(&ast, 0);

        let outcome = router
            .execute(&ast, Some(&sel), &EditorCommand::InsertText { text: "🦀".into() })
            .unwrap();

        assert_eq!(outcome.selection.unwrap().anchor.offset, 2);
    }

    #[test]
    fn test_delete_range_collapses_to_start() {
        let mut router = CommandRouter::new();
        let ast = doc("Hello World");
        let sel = range(&ast, 5, 11);

        let outcome = router
            .execute(&ast, Some(&sel), &EditorCommand::DeleteRange)
            .unwrap();

        assert_eq!(ast::block_text(&outcome.ast.blocks[0]), "Hello");
        let new_sel = outcome.selection.unwrap();
        assert!(new_sel.is_collapsed());
        assert_eq!(new_sel.anchor.offset, 5);
    }

    #[test]
    fn test_delete_range_collapsed_selection_is_noop() {
        let mut router = CommandRouter::new();
        let ast = doc("Hello");
        let sel = caret(&ast, 2);

        let outcome = router
            .execute(&ast, Some(&sel), &EditorCommand::DeleteRange)
            .unwrap();

        assert!(!outcome.changed);
        assert_eq!(outcome.ast, ast);
    }

    #[test]
    fn test_replace_range_rewrites_and_positions_caret() {
        let mut router = CommandRouter::new();
        let ast = doc("The quick brown fox");
        let sel = range(&ast, 4, 15);

        let outcome = router
            .execute(
                &ast,
                Some(&sel),
                &EditorCommand::ReplaceRange { text: "lazy".into() },
            )
            .unwrap();

        assert_eq!(ast::block_text(&outcome.ast.blocks[0]), "The lazy fox");
        assert_eq!(outcome.selection.unwrap().anchor.offset, 8);
    }

    #[test]
    fn test_split_block_puts_caret_in_successor() {
        let mut router = CommandRouter::new();
        let ast = doc("HelloWorld");
        let sel = caret(&ast, 5);

        let outcome = router
            .execute(&ast, Some(&sel), &EditorCommand::SplitBlock)
            .unwrap();

        assert_eq!(outcome.ast.blocks.len(), 2);
        let new_sel = outcome.selection.unwrap();
        assert_eq!(new_sel.anchor.block_id, outcome.ast.blocks[1].id());
        assert_eq!(new_sel.anchor.offset, 0);
    }

    #[test]
    fn test_insert_line_break_advances_caret_by_one() {
        let mut router = CommandRouter::new();
        let ast = doc("ab");
        let sel = caret(&ast, 1);

        let outcome = router
            .execute(&ast, Some(&sel), &EditorCommand::InsertLineBreak)
            .unwrap();

        assert_eq!(ast::block_text(&outcome.ast.blocks[0]), "a\nb");
        assert_eq!(outcome.selection.unwrap().anchor.offset, 2);
    }

    #[test]
    fn test_insert_paragraph_places_caret_in_new_block() {
        let mut router = CommandRouter::new();
        let ast = doc("existing");
        let sel = caret(&ast, 8);

        let outcome = router
            .execute(
                &ast,
                Some(&sel),
                &EditorCommand::InsertParagraph { text: Some("next".into()) },
            )
            .unwrap();

        assert_eq!(outcome.ast.blocks.len(), 2);
        assert_eq!(ast::block_text(&outcome.ast.blocks[1]), "next");
        assert_eq!(
            outcome.selection.unwrap().anchor.block_id,
            outcome.ast.blocks[1].id()
        );
    }

    #[test]
    fn test_delete_block_moves_caret_to_neighbor() {
        let mut router = CommandRouter::new();
        let ast = DocumentAst::from_blocks(vec![
            BlockNode::paragraph("first"),
            BlockNode::paragraph("second"),
        ]);
        let sel = DocSelection::collapsed(Point::new(ast.blocks[0].id(), 3));

        let outcome = router
            .execute(&ast, Some(&sel), &EditorCommand::DeleteBlock)
            .unwrap();

        assert_eq!(outcome.ast.blocks.len(), 1);
        let new_sel = outcome.selection.unwrap();
        assert_eq!(new_sel.anchor.block_id, outcome.ast.blocks[0].id());
        assert_eq!(new_sel.anchor.offset, 0);
    }

    #[test]
    fn test_toggle_format_keeps_selection() {
        let mut router = CommandRouter::new();
        let ast = doc("Hello");
        let sel = range(&ast, 0, 5);

        let outcome = router
            .execute(
                &ast,
                Some(&sel),
                &EditorCommand::ToggleFormat {
                    mark: TextMarkKind::Bold,
                },
            )
            .unwrap();

        assert!(outcome.changed);
        assert_eq!(outcome.selection, Some(sel));
    }

    // ============ Undo/redo flow tests ============

    #[test]
    fn test_command_undo_redo_round_trip() {
        let mut router = CommandRouter::new();
        let v0 = doc("Hello");
        let sel = caret(&v0, 5);

        let v1 = router
            .execute(&v0, Some(&sel), &EditorCommand::InsertText { text: "!".into() })
            .unwrap()
            .ast;
        assert_eq!(ast::block_text(&v1.blocks[0]), "Hello!");

        let undone = router.execute(&v1, None, &EditorCommand::Undo).unwrap();
        assert_eq!(undone.ast, v0);
        assert_eq!(undone.selection, None);

        let redone = router.execute(&undone.ast, None, &EditorCommand::Redo).unwrap();
        assert_eq!(redone.ast, v1);
    }

    // ============ Command state tests ============

    #[test]
    fn test_command_state_without_selection() {
        let router = CommandRouter::new();
        let ast = doc("Hello");

        let state = router.command_state(&ast, None);

        assert!(!state[&CommandId::InsertText].enabled);
        assert!(!state[&CommandId::ToggleBold].enabled);
        assert!(!state[&CommandId::Undo].enabled);
        assert!(state[&CommandId::AddInlineMark].enabled);
    }

    #[test]
    fn test_command_state_undo_enables_after_edit() {
        let mut router = CommandRouter::new();
        let ast = doc("Hello");
        let sel = caret(&ast, 5);
        let next = router
            .execute(&ast, Some(&sel), &EditorCommand::InsertText { text: "!".into() })
            .unwrap()
            .ast;

        let state = router.command_state(&next, Some(&sel));
        assert!(state[&CommandId::Undo].enabled);
        assert!(!state[&CommandId::Redo].enabled);
    }

    #[rstest]
    #[case(TextMarkKind::Bold, CommandId::ToggleBold)]
    #[case(TextMarkKind::Italic, CommandId::ToggleItalic)]
    #[case(TextMarkKind::Code, CommandId::ToggleCode)]
    fn test_command_state_active_reflects_first_run(
        #[case] mark: TextMarkKind,
        #[case] id: CommandId,
    ) {
        let mut router = CommandRouter::new();
        let ast = doc("Hello");
        let sel = range(&ast, 0, 5);
        let next = router
            .execute(&ast, Some(&sel), &EditorCommand::ToggleFormat { mark })
            .unwrap()
            .ast;

        let state = router.command_state(&next, Some(&sel));
        assert!(state[&id].active);
    }

    #[test]
    fn test_command_state_active_uses_first_run_only() {
        let mut router = CommandRouter::new();
        let ast = doc("Hello World");
        // Bold only " World": the first run stays plain
        let sel = range(&ast, 5, 11);
        let next = router
            .execute(
                &ast,
                Some(&sel),
                &EditorCommand::ToggleFormat {
                    mark: TextMarkKind::Bold,
                },
            )
            .unwrap()
            .ast;

        let state = router.command_state(&next, Some(&sel));
        // The approximation reads the first run, which is unbolded
        assert!(!state[&CommandId::ToggleBold].active);
    }

    #[test]
    fn test_command_state_toggles_disabled_on_cross_block_selection() {
        let router = CommandRouter::new();
        let ast = DocumentAst::from_blocks(vec![
            BlockNode::paragraph("one"),
            BlockNode::paragraph("two"),
        ]);
        let sel = DocSelection::range(
            Point::new(ast.blocks[0].id(), 0),
            Point::new(ast.blocks[1].id(), 2),
        );

        let state = router.command_state(&ast, Some(&sel));
        assert!(!state[&CommandId::ToggleBold].enabled);
        assert!(state[&CommandId::InsertText].enabled);
    }

    #[test]
    fn test_command_state_set_block_type_disabled_on_list() {
        let router = CommandRouter::new();
        let ast = DocumentAst::from_blocks(vec![BlockNode::list(
            false,
            vec![crate::ast::ListItem::plain("item")],
        )]);
        let sel = DocSelection::collapsed(Point::new(ast.blocks[0].id(), 0));

        let state = router.command_state(&ast, Some(&sel));
        assert!(!state[&CommandId::SetBlockType].enabled);
    }

    // ============ Stale selection tests ============

    #[test]
    fn test_stale_selection_degrades_instead_of_failing() {
        let mut router = CommandRouter::new();
        let ast = doc("Hello");
        // Selection pointing at a block that never existed
        let sel = DocSelection::collapsed(Point::new(NodeId::fresh(), 3));

        // Normalizes to the document start and inserts there
        let outcome = router
            .execute(&ast, Some(&sel), &EditorCommand::InsertText { text: ">".into() })
            .unwrap();
        assert_eq!(ast::block_text(&outcome.ast.blocks[0]), ">Hello");
    }

    // ============ Telemetry helper tests ============

    #[test]
    fn test_preview_truncates_long_payloads() {
        assert_eq!(preview("short"), "\"short\"");
        let long = "a".repeat(40);
        let shown = preview(&long);
        assert!(shown.contains("(40 chars)"));
        assert!(!shown.contains(&long));
    }
}
