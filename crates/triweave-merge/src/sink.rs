//! Merge-result sinks.
//!
//! The engine pushes deltas in source order into a [`MergeSink`]; the
//! text buffer implementation renders resolved runs directly and wraps
//! unresolved runs in conflict markers.

use triweave_diff::Selector;
use triweave_weave::{Weave, WeaveContext};

use crate::MergeDelta;

/// Receiver of the merge plan, written once per rebuild.
pub trait MergeSink {
    fn reset(&mut self);
    fn append_delta(&mut self, delta: &MergeDelta);
    fn finalize(&mut self);
}

/// Labels used in conflict markers.
#[derive(Debug, Clone, Copy)]
pub struct MergeLabels<'a> {
    pub a: &'a str,
    pub b: &'a str,
    pub c: &'a str,
}

impl Default for MergeLabels<'_> {
    fn default() -> Self {
        Self {
            a: "A",
            b: "B",
            c: "C",
        }
    }
}

/// Conflict marker style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictStyle {
    /// Show the two branch sides only.
    #[default]
    Merge,
    /// Include the base content between `|||||||` markers.
    Diff3,
}

/// Renders the merge plan into text with conflict markers.
pub struct TextMergeBuffer<'a> {
    ctx: &'a WeaveContext<'a>,
    weave: &'a Weave,
    labels: MergeLabels<'a>,
    style: ConflictStyle,
    out: String,
    conflicts: usize,
    finalized: bool,
}

impl<'a> TextMergeBuffer<'a> {
    pub fn new(
        ctx: &'a WeaveContext<'a>,
        weave: &'a Weave,
        labels: MergeLabels<'a>,
        style: ConflictStyle,
    ) -> Self {
        Self {
            ctx,
            weave,
            labels,
            style,
            out: String::new(),
            conflicts: 0,
            finalized: false,
        }
    }

    /// Number of conflict-marker blocks emitted.
    pub fn conflict_count(&self) -> usize {
        self.conflicts
    }

    pub fn text(&self) -> &str {
        &self.out
    }

    pub fn into_text(self) -> String {
        self.out
    }

    fn rows_of(&self, delta: &MergeDelta) -> std::ops::Range<usize> {
        let first = delta.first_row as usize;
        first..first + delta.row_count as usize
    }

    fn emit_source(&mut self, delta: &MergeDelta, sel: Selector) {
        for idx in self.rows_of(delta) {
            if let Some(line) = self.weave.rows[idx].line(sel) {
                if let Some(text) = self.ctx.line_text(sel, line) {
                    self.out.push_str(text);
                    self.out.push('\n');
                }
            }
        }
    }

    fn emit_conflict(&mut self, delta: &MergeDelta) {
        self.conflicts += 1;
        let three_way = self.ctx.has_c();

        self.out.push_str("<<<<<<< ");
        self.out.push_str(self.labels.a);
        self.out.push('\n');
        self.emit_source(delta, Selector::A);

        if three_way && self.style == ConflictStyle::Diff3 {
            self.out.push_str("||||||| ");
            self.out.push_str(self.labels.b);
            self.out.push('\n');
            self.emit_source(delta, Selector::B);
        }

        self.out.push_str("=======\n");

        if three_way {
            self.emit_source(delta, Selector::C);
            self.out.push_str(">>>>>>> ");
            self.out.push_str(self.labels.c);
        } else {
            self.emit_source(delta, Selector::B);
            self.out.push_str(">>>>>>> ");
            self.out.push_str(self.labels.b);
        }
        self.out.push('\n');
    }
}

impl MergeSink for TextMergeBuffer<'_> {
    fn reset(&mut self) {
        self.out.clear();
        self.conflicts = 0;
        self.finalized = false;
    }

    fn append_delta(&mut self, delta: &MergeDelta) {
        match delta.resolution {
            Selector::None | Selector::Invalid => self.emit_conflict(delta),
            sel => self.emit_source(delta, sel),
        }
    }

    fn finalize(&mut self) {
        self.finalized = true;
    }
}

/// Drive a sink over a whole plan.
pub fn render_plan(plan: &crate::MergePlan, sink: &mut dyn MergeSink) {
    sink.reset();
    for delta in &plan.deltas {
        sink.append_delta(delta);
    }
    sink.finalize();
}
