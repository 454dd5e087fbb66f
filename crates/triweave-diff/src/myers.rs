//! Myers shortest-edit-script core and the pairwise line differ.
//!
//! Implements Eugene Myers' O((n+m)·D) difference algorithm over an
//! abstract equality predicate. The same core serves the line differ
//! (equality of canonical line hashes with a full-compare tiebreak) and
//! the fine differ (equality of canonical characters).

use crate::lines::{canonical_chars, LineData};
use crate::{DiffEdit, DiffError, IgnoreMask};

/// An edit operation in the low-level edit script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOp {
    /// Element present in both sequences.
    Equal,
    /// Element present only in the first sequence.
    Delete,
    /// Element present only in the second sequence.
    Insert,
}

/// A pair of corresponding half-open sub-ranges, derived from manual
/// alignment hints. The differ runs independently on each anchored range
/// so hinted correspondences survive into the edit script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    /// Half-open line range in the first input.
    pub range1: (u32, u32),
    /// Half-open line range in the second input.
    pub range2: (u32, u32),
}

/// Compute the shortest edit script between two abstract sequences.
///
/// `eq(i, j)` decides whether element `i` of the first sequence matches
/// element `j` of the second. The returned ops cover both sequences
/// exactly: `Equal + Delete` counts sum to `n`, `Equal + Insert` to `m`.
pub fn edit_script<F>(n: usize, m: usize, eq: F) -> Result<Vec<EditOp>, DiffError>
where
    F: Fn(usize, usize) -> bool,
{
    if n == 0 && m == 0 {
        return Ok(Vec::new());
    }
    if n == 0 {
        return Ok(vec![EditOp::Insert; m]);
    }
    if m == 0 {
        return Ok(vec![EditOp::Delete; n]);
    }

    // Trim the common prefix and suffix before the quadratic search.
    let mut prefix = 0usize;
    while prefix < n && prefix < m && eq(prefix, prefix) {
        prefix += 1;
    }
    let mut suffix = 0usize;
    while suffix < n - prefix && suffix < m - prefix && eq(n - 1 - suffix, m - 1 - suffix) {
        suffix += 1;
    }

    let inner_n = n - prefix - suffix;
    let inner_m = m - prefix - suffix;
    let inner = myers_inner(inner_n, inner_m, |i, j| eq(prefix + i, prefix + j))?;

    let mut ops = Vec::new();
    ops.try_reserve(n + m).map_err(|_| DiffError::OutOfMemory)?;
    ops.extend(std::iter::repeat(EditOp::Equal).take(prefix));
    ops.extend(inner);
    ops.extend(std::iter::repeat(EditOp::Equal).take(suffix));
    Ok(ops)
}

/// Core search on the pre-trimmed sequences. Stores the full front trace
/// for backtracking; front growth is fallible so exhaustion surfaces as
/// an error instead of aborting.
fn myers_inner<F>(n: usize, m: usize, eq: F) -> Result<Vec<EditOp>, DiffError>
where
    F: Fn(usize, usize) -> bool,
{
    if n == 0 {
        return Ok(vec![EditOp::Insert; m]);
    }
    if m == 0 {
        return Ok(vec![EditOp::Delete; n]);
    }

    let max_d = n + m;
    let v_size = 2 * max_d + 1;
    let v_offset = max_d as isize;

    let mut trace: Vec<Vec<usize>> = Vec::new();
    let mut v = vec![0usize; v_size];

    'outer: for d in 0..=max_d {
        let mut v_next = v.clone();

        let k_min = -(d as isize);
        let k_max = d as isize;

        let mut k = k_min;
        while k <= k_max {
            let mut x = if k == k_min
                || (k != k_max
                    && v[((k - 1) + v_offset) as usize] < v[((k + 1) + v_offset) as usize])
            {
                v[((k + 1) + v_offset) as usize]
            } else {
                v[((k - 1) + v_offset) as usize] + 1
            };
            let mut y = (x as isize - k) as usize;

            // Follow the diagonal.
            while x < n && y < m && eq(x, y) {
                x += 1;
                y += 1;
            }

            v_next[(k + v_offset) as usize] = x;

            if x >= n && y >= m {
                trace.try_reserve(1).map_err(|_| DiffError::OutOfMemory)?;
                trace.push(v_next);
                break 'outer;
            }

            k += 2;
        }

        trace.try_reserve(1).map_err(|_| DiffError::OutOfMemory)?;
        trace.push(v_next);
        v.clone_from(trace.last().expect("trace row just pushed"));
    }

    Ok(backtrack(&trace, n, m, v_offset))
}

/// Backtrack through the trace to recover the edit path.
fn backtrack(trace: &[Vec<usize>], n: usize, m: usize, v_offset: isize) -> Vec<EditOp> {
    let mut ops = Vec::new();
    let mut x = n;
    let mut y = m;

    for d in (0..trace.len()).rev() {
        let k = x as isize - y as isize;

        let prev_k = if d == 0 {
            k
        } else if k == -(d as isize)
            || (k != d as isize
                && trace[d - 1][((k - 1) + v_offset) as usize]
                    < trace[d - 1][((k + 1) + v_offset) as usize])
        {
            k + 1
        } else {
            k - 1
        };

        let prev_x = if d == 0 {
            0
        } else {
            trace[d - 1][(prev_k + v_offset) as usize]
        };
        let prev_y = (prev_x as isize - prev_k) as usize;

        while x > prev_x && y > prev_y && x > 0 && y > 0 {
            x -= 1;
            y -= 1;
            ops.push(EditOp::Equal);
        }

        if d > 0 {
            if prev_k == k + 1 {
                if y > 0 {
                    y -= 1;
                    ops.push(EditOp::Insert);
                }
            } else if x > 0 {
                x -= 1;
                ops.push(EditOp::Delete);
            }
        }
    }

    ops.reverse();
    ops
}

/// Fold an op sequence into `(nof_equals, diff1, diff2)` records.
///
/// One record is emitted per change region plus one for trailing equals;
/// the counts cover both inputs exactly. No all-zero record is produced.
pub fn ops_to_edits(ops: &[EditOp]) -> Vec<DiffEdit> {
    let mut edits = Vec::new();
    let mut i = 0usize;

    while i < ops.len() {
        let mut nof_equals = 0u32;
        while i < ops.len() && ops[i] == EditOp::Equal {
            nof_equals += 1;
            i += 1;
        }
        let mut diff1 = 0u32;
        let mut diff2 = 0u32;
        while i < ops.len() && ops[i] != EditOp::Equal {
            match ops[i] {
                EditOp::Delete => diff1 += 1,
                EditOp::Insert => diff2 += 1,
                EditOp::Equal => unreachable!(),
            }
            i += 1;
        }
        edits.push(DiffEdit::new(nof_equals, diff1, diff2));
    }

    edits
}

/// Compute the pairwise line diff between two sources.
///
/// Equality is canonical-hash equality under `mask` with a full canonical
/// comparison as collision tiebreak. `anchors` (sorted, non-overlapping)
/// partition the inputs into independently diffed sub-ranges; record
/// boundaries at anchors are preserved so hinted lines stay aligned.
pub fn diff_lines(
    text1: &str,
    lines1: &[LineData],
    text2: &str,
    lines2: &[LineData],
    mask: IgnoreMask,
    anchors: &[Anchor],
) -> Result<Vec<DiffEdit>, DiffError> {
    let eq = |i: usize, j: usize| {
        let l1 = &lines1[i];
        let l2 = &lines2[j];
        l1.hash == l2.hash && {
            let c1 = canonical_chars(l1.text(text1), &l1.comment_ranges, mask);
            let c2 = canonical_chars(l2.text(text2), &l2.comment_ranges, mask);
            c1.len() == c2.len() && c1.iter().zip(c2.iter()).all(|(a, b)| a.1 == b.1)
        }
    };

    let n = lines1.len();
    let m = lines2.len();

    if anchors.is_empty() {
        let ops = edit_script(n, m, eq)?;
        return Ok(finish_edits(ops, n, m));
    }

    // Split both inputs at anchor boundaries and diff each segment
    // independently.
    let mut edits = Vec::new();
    let mut pos1 = 0usize;
    let mut pos2 = 0usize;

    for anchor in anchors {
        let (a0, a1) = (anchor.range1.0 as usize, anchor.range1.1 as usize);
        let (b0, b1) = (anchor.range2.0 as usize, anchor.range2.1 as usize);

        // Unanchored gap before this anchor.
        append_segment(&mut edits, pos1, a0, pos2, b0, &eq)?;
        // The anchored range itself.
        append_segment(&mut edits, a0, a1, b0, b1, &eq)?;
        pos1 = a1;
        pos2 = b1;
    }
    append_segment(&mut edits, pos1, n, pos2, m, &eq)?;

    Ok(edits)
}

/// Diff one segment and append its records without merging across the
/// segment boundary.
fn append_segment<F>(
    edits: &mut Vec<DiffEdit>,
    s1: usize,
    e1: usize,
    s2: usize,
    e2: usize,
    eq: &F,
) -> Result<(), DiffError>
where
    F: Fn(usize, usize) -> bool,
{
    let n = e1.saturating_sub(s1);
    let m = e2.saturating_sub(s2);
    if n == 0 && m == 0 {
        return Ok(());
    }
    if n == 0 || m == 0 {
        // Degenerate range: a single record carries the counts.
        edits.push(DiffEdit::new(0, n as u32, m as u32));
        return Ok(());
    }
    let ops = edit_script(n, m, |i, j| eq(s1 + i, s2 + j))?;
    edits.extend(finish_edits(ops, n, m));
    Ok(())
}

fn finish_edits(ops: Vec<EditOp>, n: usize, m: usize) -> Vec<DiffEdit> {
    if ops.is_empty() {
        if n == 0 && m == 0 {
            return Vec::new();
        }
        return vec![DiffEdit::new(0, n as u32, m as u32)];
    }
    ops_to_edits(&ops)
}

/// Sum an edit script's coverage of both inputs.
pub fn edit_coverage(edits: &[DiffEdit]) -> (u32, u32) {
    edits.iter().fold((0, 0), |(n, m), e| {
        (n + e.nof_equals + e.diff1, m + e.nof_equals + e.diff2)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lines::{build_line_data, PlainTextLexer};

    fn data(text: &str, mask: IgnoreMask) -> Vec<LineData> {
        let mut lexer = PlainTextLexer;
        build_line_data(text, mask, &mut lexer, 8)
    }

    fn diff(t1: &str, t2: &str) -> Vec<DiffEdit> {
        let l1 = data(t1, IgnoreMask::NONE);
        let l2 = data(t2, IgnoreMask::NONE);
        diff_lines(t1, &l1, t2, &l2, IgnoreMask::NONE, &[]).unwrap()
    }

    #[test]
    fn identical_inputs() {
        let edits = diff("a\nb\nc\n", "a\nb\nc\n");
        assert_eq!(edits, vec![DiffEdit::new(3, 0, 0)]);
    }

    #[test]
    fn both_empty() {
        assert!(diff("", "").is_empty());
    }

    #[test]
    fn one_side_empty() {
        assert_eq!(diff("", "x\ny\n"), vec![DiffEdit::new(0, 0, 2)]);
        assert_eq!(diff("x\ny\n", ""), vec![DiffEdit::new(0, 2, 0)]);
    }

    #[test]
    fn single_replacement() {
        let edits = diff("alpha\nbeta\ngamma\n", "alpha\nBETA\ngamma\n");
        assert_eq!(
            edits,
            vec![DiffEdit::new(1, 1, 1), DiffEdit::new(1, 0, 0)]
        );
    }

    #[test]
    fn insertion_in_middle() {
        let edits = diff("x\ny\n", "x\nq\ny\n");
        assert_eq!(
            edits,
            vec![DiffEdit::new(1, 0, 1), DiffEdit::new(1, 0, 0)]
        );
    }

    #[test]
    fn coverage_sums_to_input_lengths() {
        for (t1, t2) in [
            ("a\nb\nc\n", "c\nb\na\n"),
            ("1\n2\n3\n4\n", "1\n4\n"),
            ("", "x\n"),
            ("p\nq\nr\ns\n", "p\nX\nY\ns\n"),
        ] {
            let l1 = data(t1, IgnoreMask::NONE);
            let l2 = data(t2, IgnoreMask::NONE);
            let edits = diff_lines(t1, &l1, t2, &l2, IgnoreMask::NONE, &[]).unwrap();
            assert_eq!(
                edit_coverage(&edits),
                (l1.len() as u32, l2.len() as u32),
                "coverage mismatch for {:?} vs {:?}",
                t1,
                t2
            );
        }
    }

    #[test]
    fn deterministic() {
        let t1 = "m\nn\no\np\n";
        let t2 = "m\nz\no\nq\n";
        assert_eq!(diff(t1, t2), diff(t1, t2));
    }

    #[test]
    fn mask_changes_equality() {
        let t1 = "alpha\nbeta\n";
        let t2 = "alpha\nBETA\n";
        let mask = IgnoreMask {
            case: true,
            ..IgnoreMask::NONE
        };
        let l1 = data(t1, mask);
        let l2 = data(t2, mask);
        let edits = diff_lines(t1, &l1, t2, &l2, mask, &[]).unwrap();
        assert_eq!(edits, vec![DiffEdit::new(2, 0, 0)]);
    }

    #[test]
    fn anchors_preserve_boundaries() {
        // Force p/q in the first input to align against the second input's
        // tail even though unanchored diffing would match them earlier.
        let t1 = "p\nq\n";
        let t2 = "q\np\n";
        let l1 = data(t1, IgnoreMask::NONE);
        let l2 = data(t2, IgnoreMask::NONE);
        let anchors = [Anchor {
            range1: (1, 2),
            range2: (1, 2),
        }];
        let edits = diff_lines(t1, &l1, t2, &l2, IgnoreMask::NONE, &anchors).unwrap();
        assert_eq!(edit_coverage(&edits), (2, 2));
        // The anchored segment (q vs p) is diffed on its own: no record
        // pairs line 1 of input one with line 0 of input two.
        assert_eq!(
            edits,
            vec![DiffEdit::new(0, 1, 1), DiffEdit::new(0, 1, 1)]
        );
    }

    #[test]
    fn ops_to_edits_groups_runs() {
        use EditOp::*;
        let ops = vec![Equal, Equal, Delete, Insert, Insert, Equal];
        assert_eq!(
            ops_to_edits(&ops),
            vec![DiffEdit::new(2, 1, 2), DiffEdit::new(1, 0, 0)]
        );
    }
}
