//! Weave canonicalisation: greedy upward movement of lines into earlier
//! free slots, so identical content aligns whenever possible and
//! redundant empty alignments collapse.

use tracing::debug;
use triweave_diff::Selector;

use crate::hints::{covered, ManualDiffHint};
use crate::{Diff3Line, Weave, WeaveContext};

/// Trim the weave to a fixpoint.
///
/// A line may move upward only within the contiguous run of rows that are
/// empty in its column, never out of a row where it equals another
/// present line, and never when a manual hint pins it. Equality-creating
/// moves take precedence over compaction: each round first unites equal
/// content (earliest destination wins), then lets lines that sit alone on
/// their row compact into the earliest occupied row of their run. Rows
/// left empty are dropped.
pub fn trim(weave: &mut Weave, ctx: &WeaveContext<'_>, hints: &[ManualDiffHint]) {
    let mut rounds = 0usize;
    loop {
        rounds += 1;
        let mut moved = false;

        // Unite equal content first, to its own fixpoint, so a compaction
        // move can never claim a line whose equal partner sits further
        // down.
        loop {
            let mut united = false;
            for idx in 0..weave.rows.len() {
                for &sel in ctx.selectors() {
                    if try_move_up(weave, ctx, hints, idx, sel, MoveKind::Equality) {
                        united = true;
                        moved = true;
                    }
                }
            }
            if !united {
                break;
            }
        }

        for idx in 0..weave.rows.len() {
            for &sel in ctx.selectors() {
                if try_move_up(weave, ctx, hints, idx, sel, MoveKind::Compaction) {
                    moved = true;
                }
            }
        }

        weave.rows.retain(|row| !row.is_empty());

        if !moved {
            break;
        }
    }
    debug!(rounds, rows = weave.len(), "trimmed weave");
}

#[derive(Clone, Copy, PartialEq)]
enum MoveKind {
    /// Move only onto a row holding an equal line.
    Equality,
    /// Move a singleton line onto the earliest occupied row of its run.
    Compaction,
}

fn try_move_up(
    weave: &mut Weave,
    ctx: &WeaveContext<'_>,
    hints: &[ManualDiffHint],
    idx: usize,
    sel: Selector,
    kind: MoveKind,
) -> bool {
    let line = match weave.rows[idx].line(sel) {
        Some(line) => line,
        None => return false,
    };
    if covered(hints, sel, line) {
        return false;
    }
    if has_equal_partner(ctx, &weave.rows[idx], sel, line) {
        return false;
    }

    // The contiguous run of rows above that are free in this column.
    let mut first_free = idx;
    while first_free > 0 && weave.rows[first_free - 1].line(sel).is_none() {
        first_free -= 1;
    }
    if first_free == idx {
        return false;
    }

    let dest = match kind {
        MoveKind::Equality => (first_free..idx)
            .find(|&j| has_equal_partner(ctx, &weave.rows[j], sel, line)),
        MoveKind::Compaction => {
            if weave.rows[idx].present_count() != 1 {
                return false;
            }
            (first_free..idx).find(|&j| weave.rows[j].present_count() > 0)
        }
    };

    match dest {
        Some(j) => {
            weave.rows[j].set_line(sel, Some(line));
            weave.rows[idx].set_line(sel, None);
            true
        }
        None => false,
    }
}

/// Whether `line` equals a line of another source present on `row`.
fn has_equal_partner(
    ctx: &WeaveContext<'_>,
    row: &Diff3Line,
    sel: Selector,
    line: u32,
) -> bool {
    ctx.selectors()
        .iter()
        .filter(|&&other| other != sel)
        .any(|&other| {
            row.line(other)
                .map_or(false, |other_line| ctx.eq(sel, line, other, other_line))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{fold_in_ac, seed_from_ab};
    use crate::hints::ManualDiffHint;
    use triweave_diff::lines::{build_line_data, LineData, PlainTextLexer};
    use triweave_diff::myers::diff_lines;
    use triweave_diff::{DiffEdit, IgnoreMask};

    fn data(text: &str) -> Vec<LineData> {
        let mut lexer = PlainTextLexer;
        build_line_data(text, IgnoreMask::NONE, &mut lexer, 8)
    }

    fn pair_edits(t1: &str, l1: &[LineData], t2: &str, l2: &[LineData]) -> Vec<DiffEdit> {
        diff_lines(t1, l1, t2, l2, IgnoreMask::NONE, &[]).unwrap()
    }

    fn build_three(
        ta: &str,
        tb: &str,
        tc: &str,
    ) -> (Weave, Vec<LineData>, Vec<LineData>, Vec<LineData>) {
        let la = data(ta);
        let lb = data(tb);
        let lc = data(tc);
        let mut weave = seed_from_ab(&pair_edits(ta, &la, tb, &lb));
        fold_in_ac(&mut weave, &pair_edits(ta, &la, tc, &lc));
        (weave, la, lb, lc)
    }

    #[test]
    fn three_way_replacement_collapses_to_one_row() {
        let (ta, tb, tc) = ("1\na\n2\n", "1\nb\n2\n", "1\nc\n2\n");
        let (mut weave, la, lb, lc) = build_three(ta, tb, tc);
        let ctx = WeaveContext::three_way(ta, &la, tb, &lb, tc, &lc, IgnoreMask::NONE);

        trim(&mut weave, &ctx, &[]);

        assert_eq!(weave.len(), 3);
        let mid = &weave.rows[1];
        assert_eq!(mid.line_a, Some(1));
        assert_eq!(mid.line_b, Some(1));
        assert_eq!(mid.line_c, Some(1));
    }

    #[test]
    fn equal_content_wins_over_compaction() {
        // C's inserted line matches B's inserted line further down; trim
        // must unite them rather than compacting C onto the nearer row.
        let ta = "x\nz\ny\n";
        let tb = "x\nz\nnew\ny\n";
        let tc = "x\nnew\ny\n";
        let (mut weave, la, lb, lc) = build_three(ta, tb, tc);
        let ctx = WeaveContext::three_way(ta, &la, tb, &lb, tc, &lc, IgnoreMask::NONE);

        trim(&mut weave, &ctx, &[]);
        weave.recompute_flags(&ctx);

        let row = weave
            .rows
            .iter()
            .find(|r| r.line_c == Some(1))
            .expect("row carrying C line 1");
        assert_eq!(row.line_b, Some(2));
        assert!(row.equal_bc);
        weave.validate(&ctx).unwrap();
    }

    #[test]
    fn staircase_compacts_pairwise() {
        // Two A lines replaced by two C lines: the C rows pair up with
        // the A rows instead of trailing below them.
        let ta = "h\np\nq\nt\n";
        let tb = "h\np\nq\nt\n";
        let tc = "h\nr\ns\nt\n";
        let (mut weave, la, lb, lc) = build_three(ta, tb, tc);
        let ctx = WeaveContext::three_way(ta, &la, tb, &lb, tc, &lc, IgnoreMask::NONE);

        trim(&mut weave, &ctx, &[]);

        assert_eq!(weave.len(), 4);
        assert_eq!(weave.rows[1].line_a, Some(1));
        assert_eq!(weave.rows[1].line_c, Some(1));
        assert_eq!(weave.rows[2].line_a, Some(2));
        assert_eq!(weave.rows[2].line_c, Some(2));
        weave.validate(&ctx).unwrap();
    }

    #[test]
    fn trim_never_breaks_projection() {
        let ta = "a\nb\nc\nd\n";
        let tb = "a\nx\nc\ny\n";
        let tc = "a\nb\nz\nd\n";
        let (mut weave, la, lb, lc) = build_three(ta, tb, tc);
        let ctx = WeaveContext::three_way(ta, &la, tb, &lb, tc, &lc, IgnoreMask::NONE);

        trim(&mut weave, &ctx, &[]);
        weave.validate(&ctx).unwrap();
    }

    #[test]
    fn hinted_lines_stay_put() {
        let (ta, tb, tc) = ("1\na\n2\n", "1\nb\n2\n", "1\nc\n2\n");
        let (mut weave, la, lb, lc) = build_three(ta, tb, tc);
        let ctx = WeaveContext::three_way(ta, &la, tb, &lb, tc, &lc, IgnoreMask::NONE);
        let rows_before = weave.len();

        // Pin C's middle line: the collapse onto the A/B row is blocked.
        let hints = vec![ManualDiffHint::new(Selector::C, 1, 1)];
        trim(&mut weave, &ctx, &hints);

        assert_eq!(weave.len(), rows_before);
        weave.validate(&ctx).unwrap();
    }

    #[test]
    fn deterministic() {
        let (ta, tb, tc) = ("k\nl\nm\n", "k\nq\nm\n", "k\nl\nr\nm\n");
        let (mut w1, la, lb, lc) = build_three(ta, tb, tc);
        let (mut w2, _, _, _) = build_three(ta, tb, tc);
        let ctx = WeaveContext::three_way(ta, &la, tb, &lb, tc, &lc, IgnoreMask::NONE);
        trim(&mut w1, &ctx, &[]);
        trim(&mut w2, &ctx, &[]);
        assert_eq!(w1, w2);
    }
}
