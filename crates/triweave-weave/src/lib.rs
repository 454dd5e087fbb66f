//! Three-way weaver: interleaves pairwise line diffs into a single
//! sequence of aligned triples.
//!
//! Each [`Diff3Line`] references at most one line per source. The weave
//! is built by seeding from the AB diff, folding in the AC diff, applying
//! manual alignment corrections, and trimming so identical content aligns
//! whenever possible; an optional BC overlay refines the result further.
//! Projecting the sequence onto any one source always yields that
//! source's lines exactly once, in order.

pub mod build;
pub mod hints;
pub mod trim;
pub mod wrap;

use triweave_diff::fine::FineDiff;
use triweave_diff::lines::{lines_equal, LineData};
use triweave_diff::{IgnoreMask, Selector};

/// One aligned triple: at most one line index per source, pairwise
/// equality flags under the active ignore-mask, whitespace flags, and the
/// fine-diff results written by the character differ.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diff3Line {
    pub line_a: Option<u32>,
    pub line_b: Option<u32>,
    pub line_c: Option<u32>,
    pub equal_ab: bool,
    pub equal_ac: bool,
    pub equal_bc: bool,
    pub white_a: bool,
    pub white_b: bool,
    pub white_c: bool,
    pub fine_ab: Option<FineDiff>,
    pub fine_bc: Option<FineDiff>,
    pub fine_ca: Option<FineDiff>,
}

impl Diff3Line {
    pub fn line(&self, sel: Selector) -> Option<u32> {
        match sel {
            Selector::A => self.line_a,
            Selector::B => self.line_b,
            Selector::C => self.line_c,
            Selector::None | Selector::Invalid => None,
        }
    }

    pub fn set_line(&mut self, sel: Selector, line: Option<u32>) {
        match sel {
            Selector::A => self.line_a = line,
            Selector::B => self.line_b = line,
            Selector::C => self.line_c = line,
            Selector::None | Selector::Invalid => {}
        }
    }

    pub fn has(&self, sel: Selector) -> bool {
        self.line(sel).is_some()
    }

    /// Number of sources with a line on this row.
    pub fn present_count(&self) -> usize {
        [self.line_a, self.line_b, self.line_c]
            .iter()
            .filter(|l| l.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.present_count() == 0
    }

    /// Stored equality flag for an unordered source pair.
    pub fn equal(&self, s1: Selector, s2: Selector) -> bool {
        match (s1, s2) {
            (Selector::A, Selector::B) | (Selector::B, Selector::A) => self.equal_ab,
            (Selector::A, Selector::C) | (Selector::C, Selector::A) => self.equal_ac,
            (Selector::B, Selector::C) | (Selector::C, Selector::B) => self.equal_bc,
            _ => false,
        }
    }
}

/// Borrowed view of the line data backing a weave. Line indices inside
/// [`Diff3Line`]s resolve against these externally owned arrays.
#[derive(Debug, Clone, Copy)]
pub struct WeaveContext<'a> {
    pub text_a: &'a str,
    pub lines_a: &'a [LineData],
    pub text_b: &'a str,
    pub lines_b: &'a [LineData],
    pub text_c: Option<&'a str>,
    pub lines_c: Option<&'a [LineData]>,
    pub mask: IgnoreMask,
}

impl<'a> WeaveContext<'a> {
    pub fn two_way(
        text_a: &'a str,
        lines_a: &'a [LineData],
        text_b: &'a str,
        lines_b: &'a [LineData],
        mask: IgnoreMask,
    ) -> Self {
        Self {
            text_a,
            lines_a,
            text_b,
            lines_b,
            text_c: None,
            lines_c: None,
            mask,
        }
    }

    pub fn three_way(
        text_a: &'a str,
        lines_a: &'a [LineData],
        text_b: &'a str,
        lines_b: &'a [LineData],
        text_c: &'a str,
        lines_c: &'a [LineData],
        mask: IgnoreMask,
    ) -> Self {
        Self {
            text_a,
            lines_a,
            text_b,
            lines_b,
            text_c: Some(text_c),
            lines_c: Some(lines_c),
            mask,
        }
    }

    pub fn has_c(&self) -> bool {
        self.lines_c.is_some()
    }

    pub fn source(&self, sel: Selector) -> Option<(&'a str, &'a [LineData])> {
        match sel {
            Selector::A => Some((self.text_a, self.lines_a)),
            Selector::B => Some((self.text_b, self.lines_b)),
            Selector::C => self.text_c.zip(self.lines_c),
            Selector::None | Selector::Invalid => None,
        }
    }

    pub fn line_count(&self, sel: Selector) -> usize {
        self.source(sel).map_or(0, |(_, lines)| lines.len())
    }

    /// The sources participating in this weave.
    pub fn selectors(&self) -> &'static [Selector] {
        if self.has_c() {
            &[Selector::A, Selector::B, Selector::C]
        } else {
            &[Selector::A, Selector::B]
        }
    }

    /// Equality of two lines under the context's ignore-mask.
    pub fn eq(&self, s1: Selector, i: u32, s2: Selector, j: u32) -> bool {
        match (self.source(s1), self.source(s2)) {
            (Some((t1, l1)), Some((t2, l2))) => {
                lines_equal(t1, &l1[i as usize], t2, &l2[j as usize], self.mask)
            }
            _ => false,
        }
    }

    pub fn line_text(&self, sel: Selector, i: u32) -> Option<&'a str> {
        self.source(sel)
            .and_then(|(text, lines)| lines.get(i as usize).map(|l| l.text(text)))
    }

    /// Whether a line is blank for merge purposes under the current mask.
    pub fn is_white_line(&self, sel: Selector, i: u32) -> bool {
        self.source(sel)
            .and_then(|(_, lines)| lines.get(i as usize))
            .map_or(false, |l| l.is_white(self.mask.comments))
    }
}

/// The aligned-triple sequence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Weave {
    pub rows: Vec<Diff3Line>,
}

impl Weave {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Recompute all equality flags from line data under the context's
    /// mask. The flags are properties of the weave, authoritative over
    /// whatever the construction passes recorded.
    pub fn recompute_flags(&mut self, ctx: &WeaveContext<'_>) {
        for row in &mut self.rows {
            row.equal_ab = match (row.line_a, row.line_b) {
                (Some(a), Some(b)) => ctx.eq(Selector::A, a, Selector::B, b),
                _ => false,
            };
            row.equal_ac = match (row.line_a, row.line_c) {
                (Some(a), Some(c)) => ctx.eq(Selector::A, a, Selector::C, c),
                _ => false,
            };
            row.equal_bc = match (row.line_b, row.line_c) {
                (Some(b), Some(c)) => ctx.eq(Selector::B, b, Selector::C, c),
                _ => false,
            };
        }
    }

    /// Fill in the per-source whitespace flags.
    pub fn compute_white(&mut self, ctx: &WeaveContext<'_>) {
        for row in &mut self.rows {
            row.white_a = row
                .line_a
                .map_or(false, |a| ctx.is_white_line(Selector::A, a));
            row.white_b = row
                .line_b
                .map_or(false, |b| ctx.is_white_line(Selector::B, b));
            row.white_c = row
                .line_c
                .map_or(false, |c| ctx.is_white_line(Selector::C, c));
        }
    }

    /// Check the line-projection invariant: for each source, the
    /// non-absent indices must be exactly `0..line_count`, in order.
    pub fn validate(&self, ctx: &WeaveContext<'_>) -> Result<(), WeaveError> {
        for &sel in ctx.selectors() {
            let mut expected = 0u32;
            for (row_idx, row) in self.rows.iter().enumerate() {
                if let Some(line) = row.line(sel) {
                    if line != expected {
                        return Err(WeaveError::BrokenProjection {
                            selector: sel,
                            expected,
                            found: line,
                            row: row_idx,
                        });
                    }
                    expected += 1;
                }
            }
            let count = ctx.line_count(sel) as u32;
            if expected != count {
                return Err(WeaveError::IncompleteProjection {
                    selector: sel,
                    covered: expected,
                    total: count,
                });
            }
        }
        Ok(())
    }
}

/// Errors from weave construction and validation.
#[derive(Debug, thiserror::Error)]
pub enum WeaveError {
    #[error("weave projection for {selector} expected line {expected} but found {found} at row {row}")]
    BrokenProjection {
        selector: Selector,
        expected: u32,
        found: u32,
        row: usize,
    },

    #[error("weave projection for {selector} covers {covered} of {total} lines")]
    IncompleteProjection {
        selector: Selector,
        covered: u32,
        total: u32,
    },

    #[error("manual alignment hint group {group} could not be satisfied")]
    InconsistentHints { group: usize },
}
