//! Weave construction passes: seed from the AB diff, fold in the AC
//! diff, and overlay the BC diff.

use tracing::debug;
use triweave_diff::DiffEdit;

use crate::{Diff3Line, Weave};

/// Seed the weave from the AB pairwise diff. Within a change region the
/// first `min(diff1, diff2)` lines of each side share a row (unequal);
/// the leftover lines get single-side rows. C is absent throughout.
pub fn seed_from_ab(edits: &[DiffEdit]) -> Weave {
    let mut rows = Vec::new();
    let mut line_a = 0u32;
    let mut line_b = 0u32;

    for edit in edits {
        for _ in 0..edit.nof_equals {
            rows.push(Diff3Line {
                line_a: Some(line_a),
                line_b: Some(line_b),
                equal_ab: true,
                ..Diff3Line::default()
            });
            line_a += 1;
            line_b += 1;
        }
        let mut d1 = edit.diff1;
        let mut d2 = edit.diff2;
        while d1 > 0 && d2 > 0 {
            rows.push(Diff3Line {
                line_a: Some(line_a),
                line_b: Some(line_b),
                ..Diff3Line::default()
            });
            line_a += 1;
            line_b += 1;
            d1 -= 1;
            d2 -= 1;
        }
        while d1 > 0 {
            rows.push(Diff3Line {
                line_a: Some(line_a),
                ..Diff3Line::default()
            });
            line_a += 1;
            d1 -= 1;
        }
        while d2 > 0 {
            rows.push(Diff3Line {
                line_b: Some(line_b),
                ..Diff3Line::default()
            });
            line_b += 1;
            d2 -= 1;
        }
    }

    debug!(rows = rows.len(), "seeded weave from AB diff");
    Weave { rows }
}

/// Fold the AC pairwise diff into a weave seeded from AB. Matching pairs
/// attach their C index to the row carrying the A line; C-only lines are
/// inserted after the rows of the A lines they were diffed against.
pub fn fold_in_ac(weave: &mut Weave, edits: &[DiffEdit]) {
    let rows = &mut weave.rows;
    let mut cursor = 0usize;
    let mut line_a = 0u32;
    let mut line_c = 0u32;

    for edit in edits {
        for _ in 0..edit.nof_equals {
            while rows[cursor].line_a != Some(line_a) {
                cursor += 1;
            }
            rows[cursor].line_c = Some(line_c);
            rows[cursor].equal_ac = true;
            line_a += 1;
            line_c += 1;
            cursor += 1;
        }
        for _ in 0..edit.diff1 {
            while rows[cursor].line_a != Some(line_a) {
                cursor += 1;
            }
            line_a += 1;
            cursor += 1;
        }
        for _ in 0..edit.diff2 {
            rows.insert(
                cursor,
                Diff3Line {
                    line_c: Some(line_c),
                    ..Diff3Line::default()
                },
            );
            line_c += 1;
            cursor += 1;
        }
    }

    debug!(rows = rows.len(), "folded AC diff into weave");
}

/// Overlay the BC pairwise diff onto a woven triple sequence: for each
/// BC-matching pair try to unite the two lines on one row, moving a line
/// upward only when no same-source line sits in between and the vacated
/// row loses nothing else. Rows emptied by a move are dropped.
pub fn overlay_bc(weave: &mut Weave, edits: &[DiffEdit]) {
    let mut line_b = 0u32;
    let mut line_c = 0u32;
    let mut united = 0usize;

    for edit in edits {
        for _ in 0..edit.nof_equals {
            unite_pair(weave, line_b, line_c, &mut united);
            line_b += 1;
            line_c += 1;
        }
        line_b += edit.diff1;
        line_c += edit.diff2;
    }

    weave.rows.retain(|row| !row.is_empty());
    debug!(united, rows = weave.len(), "applied BC overlay");
}

fn unite_pair(weave: &mut Weave, line_b: u32, line_c: u32, united: &mut usize) {
    let rows = &mut weave.rows;
    let rb = match rows.iter().position(|r| r.line_b == Some(line_b)) {
        Some(i) => i,
        None => return,
    };
    let rc = match rows.iter().position(|r| r.line_c == Some(line_c)) {
        Some(i) => i,
        None => return,
    };

    if rb == rc {
        rows[rb].equal_bc = true;
        return;
    }

    if rb < rc {
        // Move the C line up into the B row if the gap is free of C lines.
        let free = rows[rb].line_c.is_none()
            && rows[rb + 1..rc].iter().all(|r| r.line_c.is_none());
        if free {
            rows[rb].line_c = Some(line_c);
            rows[rb].equal_bc = true;
            rows[rc].line_c = None;
            rows[rc].equal_bc = false;
            rows[rc].equal_ac = false;
            *united += 1;
        }
    } else {
        // Move the B line up into the C row if the gap is free of B lines.
        let free = rows[rc].line_b.is_none()
            && rows[rc + 1..rb].iter().all(|r| r.line_b.is_none());
        if free {
            rows[rc].line_b = Some(line_b);
            rows[rc].equal_bc = true;
            rows[rb].line_b = None;
            rows[rb].equal_bc = false;
            rows[rb].equal_ab = false;
            *united += 1;
        }
    }
}
