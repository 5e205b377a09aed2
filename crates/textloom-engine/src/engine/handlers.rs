//! One handler per op kind.
//!
//! Handlers mutate a working copy the engine already cloned; they report what
//! they touched and never fail. A missing target or an inapplicable block type
//! is a logged no-op — the public surface of the engine stays total.

use crate::ast::{
    self, BlockNode, DocumentAst, InlineNode, ListItem, NodeId, TextMarkKind, TextMarks, TextRun,
    text,
};
use crate::marks::InlineMarkState;
use crate::ops::{DocOp, OpKind};

/// What a handler changed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Outcome {
    Ast,
    Marks,
    Nothing,
}

pub(crate) fn apply(ast: &mut DocumentAst, marks: &mut InlineMarkState, op: &DocOp) -> Outcome {
    match &op.kind {
        OpKind::InsertParagraph { after_id, text } => {
            insert_paragraph(ast, *after_id, text.as_deref())
        }
        OpKind::InsertText {
            node_id,
            offset,
            text,
        } => insert_text(ast, *node_id, *offset, text),
        OpKind::DeleteRange {
            start_id,
            start_offset,
            end_id,
            end_offset,
        } => delete_range(ast, *start_id, *start_offset, *end_id, *end_offset),
        OpKind::ToggleMark {
            node_id,
            start_offset,
            end_offset,
            mark,
            force,
        } => toggle_mark(ast, *node_id, *start_offset, *end_offset, *mark, *force),
        OpKind::SetHeadingLevel { node_id, level } => set_heading_level(ast, *node_id, *level),
        OpKind::DeleteNode { node_id } => delete_node(ast, *node_id),
        OpKind::SplitBlock { node_id, offset } => split_block(ast, *node_id, *offset),
        OpKind::InsertLineBreak { node_id, offset } => insert_line_break(ast, *node_id, *offset),
        OpKind::ReplaceBlockText { node_id, text } => replace_block_text(ast, *node_id, text),
        OpKind::ApplyInlineMark { mark } => {
            let next = marks.add(mark.clone());
            commit_marks(marks, next)
        }
        OpKind::RemoveInlineMark { mark_id } => {
            let next = marks.remove(*mark_id);
            commit_marks(marks, next)
        }
        OpKind::ClearInlineMarks { scope } => {
            let next = marks.clear(scope);
            commit_marks(marks, next)
        }
        OpKind::Custom { custom_type, .. } => {
            log::debug!("custom op {custom_type:?} has no engine handler, skipping");
            Outcome::Nothing
        }
    }
}

fn commit_marks(marks: &mut InlineMarkState, next: InlineMarkState) -> Outcome {
    if next == *marks {
        Outcome::Nothing
    } else {
        *marks = next;
        Outcome::Marks
    }
}

// ============ Structural handlers ============

fn insert_paragraph(ast: &mut DocumentAst, after_id: Option<NodeId>, text: Option<&str>) -> Outcome {
    let block = match text {
        Some(t) => BlockNode::paragraph(t),
        None => BlockNode::empty_paragraph(),
    };
    let index = match after_id {
        None => 0,
        Some(id) => match ast.block_index(id) {
            Some(i) => i + 1,
            // Missing target appends rather than failing
            None => ast.blocks.len(),
        },
    };
    ast.blocks.insert(index, block);
    Outcome::Ast
}

fn delete_node(ast: &mut DocumentAst, node_id: NodeId) -> Outcome {
    let index = match ast.block_index(node_id) {
        Some(i) => i,
        None => {
            log::warn!("DeleteNode: block {node_id} not found");
            return Outcome::Nothing;
        }
    };
    ast.blocks.remove(index);
    ensure_non_empty(ast);
    Outcome::Ast
}

fn ensure_non_empty(ast: &mut DocumentAst) {
    if ast.blocks.is_empty() {
        ast.blocks.push(BlockNode::empty_paragraph());
    }
}

fn set_heading_level(ast: &mut DocumentAst, node_id: NodeId, level: u8) -> Outcome {
    if level > 6 {
        log::warn!("SetHeadingLevel: level {level} out of range 0..=6");
        return Outcome::Nothing;
    }
    let block = match ast.find_block_mut(node_id) {
        Some(b) => b,
        None => {
            log::warn!("SetHeadingLevel: block {node_id} not found");
            return Outcome::Nothing;
        }
    };
    let (id, children) = match block {
        BlockNode::Paragraph { id, children } => {
            if level == 0 {
                return Outcome::Nothing;
            }
            (*id, std::mem::take(children))
        }
        BlockNode::Heading {
            id,
            level: current,
            children,
        } => {
            if *current == level {
                return Outcome::Nothing;
            }
            (*id, std::mem::take(children))
        }
        _ => {
            log::warn!("SetHeadingLevel: block {node_id} has no inline children");
            return Outcome::Nothing;
        }
    };
    *block = if level == 0 {
        BlockNode::Paragraph { id, children }
    } else {
        BlockNode::Heading {
            id,
            level,
            children,
        }
    };
    Outcome::Ast
}

fn split_block(ast: &mut DocumentAst, node_id: NodeId, offset: usize) -> Outcome {
    let index = match ast.block_index(node_id) {
        Some(i) => i,
        None => {
            log::warn!("SplitBlock: block {node_id} not found");
            return Outcome::Nothing;
        }
    };
    let successor = match &mut ast.blocks[index] {
        BlockNode::Paragraph { children, .. } => {
            let taken = std::mem::take(children);
            let (before, after) = split_inline_at(taken, offset);
            *children = non_empty_children(before);
            BlockNode::paragraph_with(non_empty_children(after))
        }
        BlockNode::Heading { level, children, .. } => {
            let level = *level;
            let taken = std::mem::take(children);
            let (before, after) = split_inline_at(taken, offset);
            *children = non_empty_children(before);
            BlockNode::Heading {
                id: NodeId::fresh(),
                level,
                children: non_empty_children(after),
            }
        }
        // Block types without splittable inline children get a trailing
        // empty paragraph instead of a true split
        BlockNode::List { .. } | BlockNode::Placeholder { .. } => BlockNode::empty_paragraph(),
    };
    ast.blocks.insert(index + 1, successor);
    Outcome::Ast
}

// ============ Text handlers ============

fn insert_text(ast: &mut DocumentAst, node_id: NodeId, offset: usize, inserted: &str) -> Outcome {
    if inserted.is_empty() {
        return Outcome::Nothing;
    }
    let block = match ast.find_block_mut(node_id) {
        Some(b) => b,
        None => {
            log::warn!("InsertText: block {node_id} not found");
            return Outcome::Nothing;
        }
    };
    let flat = ast::block_text(block);
    let at = text::clamp_offset(&flat, offset);
    let next = text::splice(&flat, at, at, inserted);
    if set_plain_text(block, &next) {
        Outcome::Ast
    } else {
        Outcome::Nothing
    }
}

fn delete_range(
    ast: &mut DocumentAst,
    start_id: NodeId,
    start_offset: usize,
    end_id: NodeId,
    end_offset: usize,
) -> Outcome {
    let (Some(start_index), Some(end_index)) =
        (ast.block_index(start_id), ast.block_index(end_id))
    else {
        log::warn!("DeleteRange: start or end block not found");
        return Outcome::Nothing;
    };

    // Normalize to document order
    let ((si, so), (ei, eo)) = if (start_index, start_offset) <= (end_index, end_offset) {
        ((start_index, start_offset), (end_index, end_offset))
    } else {
        ((end_index, end_offset), (start_index, start_offset))
    };

    if si == ei {
        let block = &mut ast.blocks[si];
        let flat = ast::block_text(block);
        let s = text::clamp_offset(&flat, so);
        let e = text::clamp_offset(&flat, eo);
        if s == e {
            return Outcome::Nothing;
        }
        let next = text::splice(&flat, s, e, "");
        return if set_plain_text(block, &next) {
            Outcome::Ast
        } else {
            Outcome::Nothing
        };
    }

    // Cross-block: keep head of the start block, tail of the end block, drop
    // everything in between. The start block keeps its id.
    let start_flat = ast::block_text(&ast.blocks[si]);
    let end_flat = ast::block_text(&ast.blocks[ei]);
    let s = text::clamp_offset(&start_flat, so);
    let e = text::clamp_offset(&end_flat, eo);
    let merged = format!(
        "{}{}",
        text::slice(&start_flat, 0, s),
        text::slice(&end_flat, e, text::utf16_len(&end_flat))
    );
    if !set_plain_text(&mut ast.blocks[si], &merged) {
        log::warn!("DeleteRange: start block {start_id} is not editable");
        return Outcome::Nothing;
    }
    ast.blocks.drain(si + 1..=ei);
    ensure_non_empty(ast);
    Outcome::Ast
}

/// Replace a block's content with unformatted text. Paragraphs and headings
/// collapse to a single plain run; lists rebuild one plain item per line.
/// Placeholder text is synthesized from the label and cannot be edited.
fn set_plain_text(block: &mut BlockNode, new_text: &str) -> bool {
    match block {
        BlockNode::Paragraph { children, .. } | BlockNode::Heading { children, .. } => {
            *children = vec![InlineNode::run(new_text)];
            true
        }
        BlockNode::List { items, .. } => {
            *items = new_text.split('\n').map(ListItem::plain).collect();
            true
        }
        BlockNode::Placeholder { .. } => {
            log::warn!("text edit on placeholder block {} ignored", block.id());
            false
        }
    }
}

fn replace_block_text(ast: &mut DocumentAst, node_id: NodeId, new_text: &str) -> Outcome {
    let block = match ast.find_block_mut(node_id) {
        Some(b) => b,
        None => {
            log::warn!("ReplaceBlockText: block {node_id} not found");
            return Outcome::Nothing;
        }
    };
    let before = block.clone();
    if !set_plain_text(block, new_text) {
        return Outcome::Nothing;
    }
    if *block == before {
        Outcome::Nothing
    } else {
        Outcome::Ast
    }
}

fn insert_line_break(ast: &mut DocumentAst, node_id: NodeId, offset: usize) -> Outcome {
    let block = match ast.find_block_mut(node_id) {
        Some(b) => b,
        None => {
            log::warn!("InsertLineBreak: block {node_id} not found");
            return Outcome::Nothing;
        }
    };
    let children = match block.inline_children_mut() {
        Some(c) => c,
        None => {
            log::warn!("InsertLineBreak: block {node_id} has no inline children");
            return Outcome::Nothing;
        }
    };
    let taken = std::mem::take(children);
    let (mut before, after) = split_inline_at(taken, offset);
    // The break inherits the marks of the run it lands after, so the merge
    // pass can fold it back in
    let marks = trailing_marks(&before);
    before.push(InlineNode::Run(TextRun::with_marks("\n", marks)));
    before.extend(after);
    *children = merge_adjacent_runs(before);
    Outcome::Ast
}

fn trailing_marks(nodes: &[InlineNode]) -> TextMarks {
    match nodes.last() {
        Some(InlineNode::Run(run)) => run.marks,
        Some(InlineNode::Link { children, .. }) => {
            children.last().map(|r| r.marks).unwrap_or_default()
        }
        None => TextMarks::default(),
    }
}

// ============ Mark toggling ============

fn toggle_mark(
    ast: &mut DocumentAst,
    node_id: NodeId,
    start_offset: usize,
    end_offset: usize,
    mark: TextMarkKind,
    force: Option<bool>,
) -> Outcome {
    let block = match ast.find_block_mut(node_id) {
        Some(b) => b,
        None => {
            log::warn!("ToggleMark: block {node_id} not found");
            return Outcome::Nothing;
        }
    };
    let children = match block.inline_children_mut() {
        Some(c) => c,
        None => {
            log::warn!("ToggleMark: block {node_id} has no inline children");
            return Outcome::Nothing;
        }
    };

    let flat = ast::inline_text(children);
    let (s, e) = {
        let a = text::clamp_offset(&flat, start_offset);
        let b = text::clamp_offset(&flat, end_offset);
        (a.min(b), a.max(b))
    };
    if s == e {
        return Outcome::Nothing;
    }

    let original = children.clone();
    let taken = std::mem::take(children);
    let (before, rest) = split_inline_at(taken, s);
    let (mut selected, after) = split_inline_at(rest, e - s);

    // Toggle semantics: the mark flips to "set" unless it is already present
    // on every selected run, so a partially marked selection becomes fully
    // marked. `force` pins the value outright.
    let all_marked = selected_runs(&selected).all(|run| run.marks.get(mark));
    let target = force.unwrap_or(!all_marked);
    for node in &mut selected {
        match node {
            InlineNode::Run(run) => run.marks.set(mark, target),
            InlineNode::Link { children, .. } => {
                for run in children {
                    run.marks.set(mark, target);
                }
            }
        }
    }

    let mut rebuilt = before;
    rebuilt.extend(selected);
    rebuilt.extend(after);
    let rebuilt = merge_adjacent_runs(rebuilt);

    if rebuilt == original {
        *children = rebuilt;
        Outcome::Nothing
    } else {
        *children = rebuilt;
        Outcome::Ast
    }
}

fn selected_runs(nodes: &[InlineNode]) -> impl Iterator<Item = &TextRun> {
    nodes.iter().flat_map(|node| match node {
        InlineNode::Run(run) => std::slice::from_ref(run).iter(),
        InlineNode::Link { children, .. } => children.iter(),
    })
}

// ============ Inline zone arithmetic ============

/// Split a sequence of inline nodes at a UTF-16 offset. A node straddling the
/// boundary is itself split; links split into two links sharing the href.
fn split_inline_at(nodes: Vec<InlineNode>, offset: usize) -> (Vec<InlineNode>, Vec<InlineNode>) {
    let mut left = Vec::new();
    let mut right = Vec::new();
    let mut remaining = offset;

    for node in nodes {
        if remaining == 0 {
            right.push(node);
            continue;
        }
        let len = text::utf16_len(&node.text());
        if len <= remaining {
            remaining -= len;
            left.push(node);
            continue;
        }
        match node {
            InlineNode::Run(run) => {
                let head = text::slice(&run.text, 0, remaining).to_string();
                let tail = text::slice(&run.text, remaining, len).to_string();
                left.push(InlineNode::Run(TextRun::with_marks(head, run.marks)));
                right.push(InlineNode::Run(TextRun::with_marks(tail, run.marks)));
            }
            InlineNode::Link { href, children } => {
                let (head, tail) = split_runs_at(children, remaining);
                if !head.is_empty() {
                    left.push(InlineNode::Link {
                        href: href.clone(),
                        children: head,
                    });
                }
                if !tail.is_empty() {
                    right.push(InlineNode::Link {
                        href,
                        children: tail,
                    });
                }
            }
        }
        remaining = 0;
    }
    (left, right)
}

fn split_runs_at(runs: Vec<TextRun>, offset: usize) -> (Vec<TextRun>, Vec<TextRun>) {
    let mut left = Vec::new();
    let mut right = Vec::new();
    let mut remaining = offset;
    for run in runs {
        if remaining == 0 {
            right.push(run);
            continue;
        }
        let len = text::utf16_len(&run.text);
        if len <= remaining {
            remaining -= len;
            left.push(run);
            continue;
        }
        let head = text::slice(&run.text, 0, remaining).to_string();
        let tail = text::slice(&run.text, remaining, len).to_string();
        left.push(TextRun::with_marks(head, run.marks));
        right.push(TextRun::with_marks(tail, run.marks));
        remaining = 0;
    }
    (left, right)
}

/// Normalization pass: drop empty fragments left over from splitting and merge
/// adjacent runs whose mark sets are identical. Invariant 3 of the data model:
/// no two adjacent runs share an identical mark set after a mark mutation.
fn merge_adjacent_runs(nodes: Vec<InlineNode>) -> Vec<InlineNode> {
    let mut merged: Vec<InlineNode> = Vec::with_capacity(nodes.len());
    for node in nodes {
        let empty = match &node {
            InlineNode::Run(run) => run.text.is_empty(),
            InlineNode::Link { children, .. } => children.iter().all(|r| r.text.is_empty()),
        };
        if empty {
            continue;
        }
        match (merged.last_mut(), node) {
            (Some(InlineNode::Run(prev)), InlineNode::Run(next)) if prev.marks == next.marks => {
                prev.text.push_str(&next.text);
            }
            (_, node) => merged.push(node),
        }
    }
    non_empty_children(merged)
}

/// A block always carries at least one (possibly empty) run.
fn non_empty_children(children: Vec<InlineNode>) -> Vec<InlineNode> {
    if children.is_empty() {
        vec![InlineNode::run("")]
    } else {
        children
    }
}
