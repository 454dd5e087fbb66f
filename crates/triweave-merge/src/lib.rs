//! Merge planner: classifies every aligned triple of a weave and groups
//! maximal runs of one classification into merge deltas, optionally
//! auto-resolving them.
//!
//! Three-way classification treats B as the base (the `MINE OLDER YOURS`
//! convention): each non-conflict category names the unique source whose
//! content differs from the consensus of the other two, and resolving the
//! category takes that source. Two-way classification treats A as the old
//! version and B as the new one.

pub mod sink;

use tracing::debug;
use triweave_diff::Selector;
use triweave_weave::{Diff3Line, Weave, WeaveContext};

/// Resolution category of one run of aligned triples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeCategory {
    /// All present sources agree.
    Unchanged,
    /// Only A's content differs from the consensus.
    AOnlyChange,
    /// Only B's content differs from the consensus.
    BOnlyChange,
    /// Only C's content differs from the consensus.
    COnlyChange,
    /// A and B agree; C is absent.
    AbEqualVsC,
    /// A and C agree (or B alone is absent); B disagrees.
    AcEqualVsB,
    /// B and C agree; A is absent.
    BcEqualVsA,
    /// No two present sources agree.
    Conflict,
    /// The sources differ only in whitespace (or comments, when those
    /// are ignored).
    WhitespaceOnly,
}

impl MergeCategory {
    pub fn is_conflict(&self) -> bool {
        *self == Self::Conflict
    }
}

/// A maximal run of aligned triples sharing one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeDelta {
    /// Index of the first weave row of the run.
    pub first_row: u32,
    /// Number of rows in the run.
    pub row_count: u32,
    pub category: MergeCategory,
    /// Source whose lines the merge result takes for this run;
    /// `Selector::None` while unresolved.
    pub resolution: Selector,
}

/// Options controlling planning and auto-resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanOptions {
    /// Resolve every resolvable delta; conflicts stay open.
    pub auto_solve: bool,
    /// Source taken for whitespace-only runs when auto-solving.
    pub whitespace_source: Selector,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            auto_solve: false,
            whitespace_source: Selector::B,
        }
    }
}

/// The ordered delta list for one weave.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergePlan {
    pub deltas: Vec<MergeDelta>,
}

impl MergePlan {
    /// Deltas that still need a decision.
    pub fn unsolved_conflicts(&self) -> usize {
        self.deltas
            .iter()
            .filter(|d| d.resolution == Selector::None)
            .count()
    }

    /// Deltas that are not plain unchanged runs.
    pub fn change_count(&self) -> usize {
        self.deltas
            .iter()
            .filter(|d| d.category != MergeCategory::Unchanged)
            .count()
    }
}

/// Classify one aligned triple.
pub fn classify_row(row: &Diff3Line, three_way: bool) -> MergeCategory {
    let cat = if three_way {
        classify_three_way(row)
    } else {
        classify_two_way(row)
    };

    if cat != MergeCategory::Unchanged && cat != MergeCategory::Conflict && row_is_white(row) {
        MergeCategory::WhitespaceOnly
    } else {
        cat
    }
}

fn classify_two_way(row: &Diff3Line) -> MergeCategory {
    match (row.line_a.is_some(), row.line_b.is_some()) {
        (true, true) if row.equal_ab => MergeCategory::Unchanged,
        // B differs from the two-way base A.
        (true, true) => MergeCategory::BOnlyChange,
        (true, false) => MergeCategory::AOnlyChange,
        (false, true) => MergeCategory::BOnlyChange,
        (false, false) => MergeCategory::Unchanged,
    }
}

fn classify_three_way(row: &Diff3Line) -> MergeCategory {
    let a = row.line_a.is_some();
    let b = row.line_b.is_some();
    let c = row.line_c.is_some();

    match (a, b, c) {
        (true, true, true) => match (row.equal_ab, row.equal_ac, row.equal_bc) {
            (true, true, _) => MergeCategory::Unchanged,
            (true, false, false) => MergeCategory::COnlyChange,
            (false, true, false) => MergeCategory::BOnlyChange,
            (false, false, true) => MergeCategory::AOnlyChange,
            (false, false, false) => MergeCategory::Conflict,
            // equal_ab and equal_bc imply equal_ac under one mask.
            (true, _, true) | (_, true, true) => MergeCategory::Unchanged,
        },
        (true, true, false) => {
            if row.equal_ab {
                MergeCategory::AbEqualVsC
            } else {
                MergeCategory::Conflict
            }
        }
        (true, false, true) => {
            if row.equal_ac {
                MergeCategory::AcEqualVsB
            } else {
                MergeCategory::Conflict
            }
        }
        (false, true, true) => {
            if row.equal_bc {
                MergeCategory::BcEqualVsA
            } else {
                MergeCategory::Conflict
            }
        }
        (true, false, false) => MergeCategory::AOnlyChange,
        // Both branches dropped the base line.
        (false, true, false) => MergeCategory::AcEqualVsB,
        (false, false, true) => MergeCategory::COnlyChange,
        (false, false, false) => MergeCategory::Unchanged,
    }
}

/// Every present line of the row is blank under the mask.
fn row_is_white(row: &Diff3Line) -> bool {
    let mut any = false;
    for (line, white) in [
        (row.line_a, row.white_a),
        (row.line_b, row.white_b),
        (row.line_c, row.white_c),
    ] {
        if line.is_some() {
            if !white {
                return false;
            }
            any = true;
        }
    }
    any
}

/// The source a category resolves to, per the "unique changed source"
/// rule. `Unchanged` keeps the common content (via B, present in every
/// unchanged row); conflicts stay open.
fn resolution_for(category: MergeCategory, three_way: bool, opts: &PlanOptions) -> Selector {
    if !three_way {
        // Two-way: A is old, B is new; every change resolves to B.
        return match category {
            MergeCategory::Unchanged => Selector::B,
            MergeCategory::Conflict => Selector::None,
            MergeCategory::WhitespaceOnly => opts.whitespace_source,
            _ => Selector::B,
        };
    }
    match category {
        MergeCategory::Unchanged => Selector::B,
        MergeCategory::AOnlyChange => Selector::A,
        MergeCategory::BOnlyChange => Selector::A,
        MergeCategory::COnlyChange => Selector::C,
        MergeCategory::AbEqualVsC => Selector::C,
        MergeCategory::AcEqualVsB => Selector::A,
        MergeCategory::BcEqualVsA => Selector::A,
        MergeCategory::WhitespaceOnly => opts.whitespace_source,
        MergeCategory::Conflict => Selector::None,
    }
}

/// Build the merge plan for a weave: classify each row, group maximal
/// runs, and resolve what the options allow.
pub fn plan(weave: &Weave, ctx: &WeaveContext<'_>, opts: &PlanOptions) -> MergePlan {
    let three_way = ctx.has_c();
    let mut deltas: Vec<MergeDelta> = Vec::new();

    for (idx, row) in weave.rows.iter().enumerate() {
        let category = classify_row(row, three_way);
        match deltas.last_mut() {
            Some(last) if last.category == category => last.row_count += 1,
            _ => deltas.push(MergeDelta {
                first_row: idx as u32,
                row_count: 1,
                category,
                resolution: Selector::None,
            }),
        }
    }

    for delta in &mut deltas {
        delta.resolution = match delta.category {
            MergeCategory::Unchanged => resolution_for(delta.category, three_way, opts),
            _ if opts.auto_solve => resolution_for(delta.category, three_way, opts),
            _ => Selector::None,
        };
    }

    let plan = MergePlan { deltas };
    debug!(
        deltas = plan.deltas.len(),
        unsolved = plan.unsolved_conflicts(),
        "merge plan built"
    );
    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row3(
        lines: (Option<u32>, Option<u32>, Option<u32>),
        equals: (bool, bool, bool),
    ) -> Diff3Line {
        Diff3Line {
            line_a: lines.0,
            line_b: lines.1,
            line_c: lines.2,
            equal_ab: equals.0,
            equal_ac: equals.1,
            equal_bc: equals.2,
            ..Diff3Line::default()
        }
    }

    #[test]
    fn full_presence_flag_table() {
        let all = (Some(0), Some(0), Some(0));
        let cases = [
            ((true, true, true), MergeCategory::Unchanged),
            ((true, false, false), MergeCategory::COnlyChange),
            ((false, true, false), MergeCategory::BOnlyChange),
            ((false, false, true), MergeCategory::AOnlyChange),
            ((false, false, false), MergeCategory::Conflict),
        ];
        for (equals, expected) in cases {
            assert_eq!(
                classify_row(&row3(all, equals), true),
                expected,
                "flags {:?}",
                equals
            );
        }
    }

    #[test]
    fn partial_presence_three_way() {
        let cases = [
            (
                (Some(0), Some(0), None),
                (true, false, false),
                MergeCategory::AbEqualVsC,
            ),
            (
                (Some(0), Some(0), None),
                (false, false, false),
                MergeCategory::Conflict,
            ),
            (
                (Some(0), None, Some(0)),
                (false, true, false),
                MergeCategory::AcEqualVsB,
            ),
            (
                (None, Some(0), Some(0)),
                (false, false, true),
                MergeCategory::BcEqualVsA,
            ),
            (
                (None, Some(0), Some(0)),
                (false, false, false),
                MergeCategory::Conflict,
            ),
            (
                (Some(0), None, None),
                (false, false, false),
                MergeCategory::AOnlyChange,
            ),
            (
                (None, Some(0), None),
                (false, false, false),
                MergeCategory::AcEqualVsB,
            ),
            (
                (None, None, Some(0)),
                (false, false, false),
                MergeCategory::COnlyChange,
            ),
        ];
        for (lines, equals, expected) in cases {
            assert_eq!(classify_row(&row3(lines, equals), true), expected);
        }
    }

    #[test]
    fn two_way_classification() {
        let eq = row3((Some(0), Some(0), None), (true, false, false));
        assert_eq!(classify_row(&eq, false), MergeCategory::Unchanged);

        let both_differ = row3((Some(0), Some(0), None), (false, false, false));
        assert_eq!(classify_row(&both_differ, false), MergeCategory::BOnlyChange);

        let a_only = row3((Some(0), None, None), (false, false, false));
        assert_eq!(classify_row(&a_only, false), MergeCategory::AOnlyChange);

        let b_only = row3((None, Some(0), None), (false, false, false));
        assert_eq!(classify_row(&b_only, false), MergeCategory::BOnlyChange);
    }

    #[test]
    fn whitespace_overrides_changes_but_not_conflicts() {
        let mut change = row3((Some(0), Some(0), Some(0)), (true, false, false));
        change.white_a = true;
        change.white_b = true;
        change.white_c = true;
        assert_eq!(classify_row(&change, true), MergeCategory::WhitespaceOnly);

        let mut conflict = row3((Some(0), Some(0), Some(0)), (false, false, false));
        conflict.white_a = true;
        conflict.white_b = true;
        conflict.white_c = true;
        assert_eq!(classify_row(&conflict, true), MergeCategory::Conflict);

        let mut unchanged = row3((Some(0), Some(0), Some(0)), (true, true, true));
        unchanged.white_a = true;
        unchanged.white_b = true;
        unchanged.white_c = true;
        assert_eq!(classify_row(&unchanged, true), MergeCategory::Unchanged);
    }

    #[test]
    fn auto_resolution_targets() {
        let opts = PlanOptions {
            auto_solve: true,
            ..PlanOptions::default()
        };
        let cases = [
            (MergeCategory::AOnlyChange, Selector::A),
            (MergeCategory::BOnlyChange, Selector::A),
            (MergeCategory::COnlyChange, Selector::C),
            (MergeCategory::AbEqualVsC, Selector::C),
            (MergeCategory::AcEqualVsB, Selector::A),
            (MergeCategory::BcEqualVsA, Selector::A),
            (MergeCategory::WhitespaceOnly, Selector::B),
            (MergeCategory::Conflict, Selector::None),
        ];
        for (category, expected) in cases {
            assert_eq!(resolution_for(category, true, &opts), expected);
        }
    }

    fn weave_of(rows: Vec<Diff3Line>) -> Weave {
        Weave { rows }
    }

    fn two_way_ctx<'a>(
        ta: &'a str,
        la: &'a [triweave_diff::lines::LineData],
        tb: &'a str,
        lb: &'a [triweave_diff::lines::LineData],
    ) -> WeaveContext<'a> {
        WeaveContext::two_way(ta, la, tb, lb, triweave_diff::IgnoreMask::NONE)
    }

    #[test]
    fn plan_groups_runs() {
        use triweave_diff::lines::{build_line_data, PlainTextLexer};
        let ta = "a\nb\nc\nd\n";
        let tb = "a\nb\nX\nY\n";
        let mut lexer = PlainTextLexer;
        let la = build_line_data(ta, triweave_diff::IgnoreMask::NONE, &mut lexer, 8);
        let mut lexer = PlainTextLexer;
        let lb = build_line_data(tb, triweave_diff::IgnoreMask::NONE, &mut lexer, 8);

        let weave = weave_of(vec![
            row3((Some(0), Some(0), None), (true, false, false)),
            row3((Some(1), Some(1), None), (true, false, false)),
            row3((Some(2), Some(2), None), (false, false, false)),
            row3((Some(3), Some(3), None), (false, false, false)),
        ]);
        let ctx = two_way_ctx(ta, &la, tb, &lb);
        let plan = plan(&weave, &ctx, &PlanOptions::default());

        assert_eq!(plan.deltas.len(), 2);
        assert_eq!(plan.deltas[0].category, MergeCategory::Unchanged);
        assert_eq!(plan.deltas[0].row_count, 2);
        assert_eq!(plan.deltas[1].category, MergeCategory::BOnlyChange);
        assert_eq!(plan.deltas[1].row_count, 2);
        assert_eq!(plan.deltas[1].resolution, Selector::None);
        assert_eq!(plan.unsolved_conflicts(), 1);
    }

    #[test]
    fn plan_auto_solves_two_way_to_b() {
        use triweave_diff::lines::{build_line_data, PlainTextLexer};
        let ta = "a\n";
        let tb = "b\n";
        let mut lexer = PlainTextLexer;
        let la = build_line_data(ta, triweave_diff::IgnoreMask::NONE, &mut lexer, 8);
        let mut lexer = PlainTextLexer;
        let lb = build_line_data(tb, triweave_diff::IgnoreMask::NONE, &mut lexer, 8);

        let weave = weave_of(vec![row3((Some(0), Some(0), None), (false, false, false))]);
        let ctx = two_way_ctx(ta, &la, tb, &lb);
        let opts = PlanOptions {
            auto_solve: true,
            ..PlanOptions::default()
        };
        let plan = plan(&weave, &ctx, &opts);
        assert_eq!(plan.deltas[0].resolution, Selector::B);
        assert_eq!(plan.unsolved_conflicts(), 0);
    }
}
