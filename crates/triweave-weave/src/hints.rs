//! Manual alignment hints: user-declared correspondences between line
//! ranges of different sources.
//!
//! Hints act twice: as anchored ranges for the pairwise differ, and as a
//! correction pass over the woven triples that forces the hinted first
//! lines onto one row. Shifts insert empty slots below; they never
//! discard a line index.

use tracing::warn;
use triweave_diff::myers::Anchor;
use triweave_diff::Selector;

use crate::{Diff3Line, Weave, WeaveError};

/// One manual correspondence entry: an inclusive 0-based line range in
/// one source. Consecutive entries with distinct selectors form a hint
/// group that is aligned together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManualDiffHint {
    pub selector: Selector,
    pub first_line: u32,
    pub last_line: u32,
}

impl ManualDiffHint {
    pub fn new(selector: Selector, first_line: u32, last_line: u32) -> Self {
        Self {
            selector,
            first_line,
            last_line,
        }
    }

    /// Serialised tuple form used by shells for persistence.
    pub fn to_tuple(self) -> (Selector, u32, u32) {
        (self.selector, self.first_line, self.last_line)
    }

    pub fn from_tuple(t: (Selector, u32, u32)) -> Self {
        Self::new(t.0, t.1, t.2)
    }

    pub fn contains(&self, sel: Selector, line: u32) -> bool {
        self.selector == sel && line >= self.first_line && line <= self.last_line
    }
}

/// Split a hint list into groups: maximal runs of consecutive hints with
/// pairwise-distinct selectors.
pub fn hint_groups(hints: &[ManualDiffHint]) -> Vec<&[ManualDiffHint]> {
    let mut groups = Vec::new();
    let mut start = 0usize;
    while start < hints.len() {
        let mut end = start + 1;
        while end < hints.len()
            && hints[start..end]
                .iter()
                .all(|h| h.selector != hints[end].selector)
        {
            end += 1;
        }
        groups.push(&hints[start..end]);
        start = end;
    }
    groups
}

/// Derive the anchored sub-ranges for one pairwise diff from the hint
/// list. Groups mentioning both sources contribute one anchor each;
/// out-of-bounds or out-of-order groups are skipped with a warning.
pub fn anchors_for_pair(
    hints: &[ManualDiffHint],
    s1: Selector,
    s2: Selector,
    len1: u32,
    len2: u32,
) -> Vec<Anchor> {
    let mut anchors: Vec<Anchor> = Vec::new();

    for group in hint_groups(hints) {
        let h1 = group.iter().find(|h| h.selector == s1);
        let h2 = group.iter().find(|h| h.selector == s2);
        let (h1, h2) = match (h1, h2) {
            (Some(a), Some(b)) => (a, b),
            _ => continue,
        };

        let anchor = Anchor {
            range1: (h1.first_line, h1.last_line + 1),
            range2: (h2.first_line, h2.last_line + 1),
        };

        let in_bounds = h1.first_line <= h1.last_line
            && h2.first_line <= h2.last_line
            && anchor.range1.1 <= len1
            && anchor.range2.1 <= len2;
        let ordered = anchors.last().map_or(true, |prev| {
            prev.range1.1 <= anchor.range1.0 && prev.range2.1 <= anchor.range2.0
        });

        if in_bounds && ordered {
            anchors.push(anchor);
        } else {
            warn!(?anchor, "skipping unusable manual hint group");
        }
    }

    anchors
}

/// Whether any hint pins this line of this source (trim must not move
/// hinted lines).
pub fn covered(hints: &[ManualDiffHint], sel: Selector, line: u32) -> bool {
    hints.iter().any(|h| h.contains(sel, line))
}

/// Force the hinted first lines of every hint group onto a shared row by
/// shifting the later-starting columns down. Returns an error naming the
/// first group that could not be satisfied; remaining groups are still
/// applied, and the weave is left usable (un-hinted) for failed groups.
pub fn correct_alignment(
    weave: &mut Weave,
    hints: &[ManualDiffHint],
) -> Result<(), WeaveError> {
    let mut failed: Option<usize> = None;

    for (group_idx, group) in hint_groups(hints).iter().enumerate() {
        // Row currently carrying each hinted selector's first line.
        let mut rows: Vec<(Selector, usize)> = Vec::new();
        let mut incomplete = false;
        for hint in *group {
            match find_row(weave, hint.selector, hint.first_line) {
                Some(row) => rows.push((hint.selector, row)),
                None => incomplete = true,
            }
        }
        if incomplete || rows.len() < 2 {
            if failed.is_none() {
                failed = Some(group_idx);
            }
            warn!(group = group_idx, "manual hint group left unapplied");
            continue;
        }

        let target = rows.iter().map(|&(_, r)| r).max().unwrap_or(0);
        for (sel, row) in rows {
            if row < target {
                shift_column_down(weave, sel, row, target - row);
            }
        }
    }

    drop_trailing_empty_rows(weave);

    match failed {
        Some(group) => Err(WeaveError::InconsistentHints { group }),
        None => Ok(()),
    }
}

fn find_row(weave: &Weave, sel: Selector, line: u32) -> Option<usize> {
    weave.rows.iter().position(|r| r.line(sel) == Some(line))
}

/// Shift every entry of one source column at `from_row` and below down by
/// `delta` rows, growing the weave as needed. Other columns stay put.
fn shift_column_down(weave: &mut Weave, sel: Selector, from_row: usize, delta: usize) {
    let rows = &mut weave.rows;
    for _ in 0..delta {
        rows.push(Diff3Line::default());
    }
    for i in (from_row..rows.len()).rev() {
        let value = if i >= from_row + delta {
            rows[i - delta].line(sel)
        } else {
            None
        };
        rows[i].set_line(sel, value);
    }
}

fn drop_trailing_empty_rows(weave: &mut Weave) {
    while weave.rows.last().map_or(false, Diff3Line::is_empty) {
        weave.rows.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hint(sel: Selector, first: u32, last: u32) -> ManualDiffHint {
        ManualDiffHint::new(sel, first, last)
    }

    fn row(a: Option<u32>, b: Option<u32>, c: Option<u32>) -> Diff3Line {
        Diff3Line {
            line_a: a,
            line_b: b,
            line_c: c,
            ..Diff3Line::default()
        }
    }

    #[test]
    fn groups_split_on_repeated_selector() {
        let hints = vec![
            hint(Selector::A, 0, 1),
            hint(Selector::B, 4, 5),
            hint(Selector::A, 7, 7),
            hint(Selector::C, 2, 2),
        ];
        let groups = hint_groups(&hints);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[1].len(), 2);
        assert_eq!(groups[1][0].selector, Selector::A);
    }

    #[test]
    fn anchors_only_for_matching_pairs() {
        let hints = vec![
            hint(Selector::A, 1, 2),
            hint(Selector::B, 3, 4),
            hint(Selector::A, 5, 5),
            hint(Selector::C, 0, 0),
        ];
        let ab = anchors_for_pair(&hints, Selector::A, Selector::B, 10, 10);
        assert_eq!(ab.len(), 1);
        assert_eq!(ab[0].range1, (1, 3));
        assert_eq!(ab[0].range2, (3, 5));

        let ac = anchors_for_pair(&hints, Selector::A, Selector::C, 10, 10);
        assert_eq!(ac.len(), 1);
        assert_eq!(ac[0].range1, (5, 6));

        assert!(anchors_for_pair(&hints, Selector::B, Selector::C, 10, 10).is_empty());
    }

    #[test]
    fn out_of_bounds_anchor_skipped() {
        let hints = vec![hint(Selector::A, 8, 9), hint(Selector::B, 0, 0)];
        assert!(anchors_for_pair(&hints, Selector::A, Selector::B, 5, 5).is_empty());
    }

    #[test]
    fn shift_moves_column_and_grows() {
        let mut weave = Weave {
            rows: vec![row(Some(0), Some(0), None), row(Some(1), Some(1), None)],
        };
        shift_column_down(&mut weave, Selector::A, 1, 2);
        assert_eq!(weave.rows.len(), 4);
        assert_eq!(weave.rows[1].line_a, None);
        assert_eq!(weave.rows[1].line_b, Some(1));
        assert_eq!(weave.rows[3].line_a, Some(1));
    }

    #[test]
    fn correction_aligns_hinted_lines() {
        // A line 1 currently sits above B line 1; the hint drags A down.
        let mut weave = Weave {
            rows: vec![
                row(Some(0), None, None),
                row(Some(1), Some(0), None),
                row(None, Some(1), None),
            ],
        };
        let hints = vec![hint(Selector::A, 1, 1), hint(Selector::B, 1, 1)];
        correct_alignment(&mut weave, &hints).unwrap();

        let row_a = weave
            .rows
            .iter()
            .position(|r| r.line_a == Some(1))
            .unwrap();
        let row_b = weave
            .rows
            .iter()
            .position(|r| r.line_b == Some(1))
            .unwrap();
        assert_eq!(row_a, row_b);
    }

    #[test]
    fn unsatisfiable_group_reports_error() {
        let mut weave = Weave {
            rows: vec![row(Some(0), Some(0), None)],
        };
        let hints = vec![hint(Selector::A, 5, 5), hint(Selector::B, 0, 0)];
        let err = correct_alignment(&mut weave, &hints);
        assert!(matches!(
            err,
            Err(WeaveError::InconsistentHints { group: 0 })
        ));
        // The weave is untouched for the failed group.
        assert_eq!(weave.rows.len(), 1);
    }

    #[test]
    fn covered_checks_range() {
        let hints = vec![hint(Selector::B, 2, 4)];
        assert!(covered(&hints, Selector::B, 3));
        assert!(!covered(&hints, Selector::B, 5));
        assert!(!covered(&hints, Selector::A, 3));
    }
}
