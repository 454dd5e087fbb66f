//! Fine (character-level) diff within one aligned line pair.
//!
//! Runs the shortest-edit-script core over the canonical character
//! streams of two lines and maps the result back to original byte
//! offsets. The ignore-mask affects matching only; reported spans always
//! cover the original text of both lines completely.

use crate::lines::{canonical_chars, LineData};
use crate::myers::{edit_script, EditOp};
use crate::{DiffError, IgnoreMask};

/// One span of the fine diff. Byte ranges are relative to each line's
/// start and contiguous across the span list: ignored characters are
/// absorbed into the neighbouring span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FineSpan {
    /// Whether the span matched under the mask.
    pub equal: bool,
    /// Half-open byte range in the first line.
    pub range1: (u32, u32),
    /// Half-open byte range in the second line.
    pub range2: (u32, u32),
}

/// Fine diff of one line pair.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FineDiff {
    pub spans: Vec<FineSpan>,
    /// The whole pair matched under the mask.
    pub equal: bool,
}

/// Compute the character diff between two lines under a mask.
pub fn fine_diff(
    text1: &str,
    l1: &LineData,
    text2: &str,
    l2: &LineData,
    mask: IgnoreMask,
) -> Result<FineDiff, DiffError> {
    let line1 = l1.text(text1);
    let line2 = l2.text(text2);
    let c1 = canonical_chars(line1, &l1.comment_ranges, mask);
    let c2 = canonical_chars(line2, &l2.comment_ranges, mask);

    let ops = edit_script(c1.len(), c2.len(), |i, j| c1[i].1 == c2[j].1)?;
    let equal = ops.iter().all(|op| *op == EditOp::Equal);

    let mut spans: Vec<FineSpan> = Vec::new();
    let mut i = 0usize; // cursor into c1
    let mut j = 0usize; // cursor into c2
    let mut o1 = 0u32; // last covered byte offset in line1
    let mut o2 = 0u32;

    let mut op_idx = 0usize;
    while op_idx < ops.len() {
        let run_equal = ops[op_idx] == EditOp::Equal;
        let mut run_len_1 = 0usize;
        let mut run_len_2 = 0usize;
        while op_idx < ops.len() && (ops[op_idx] == EditOp::Equal) == run_equal {
            match ops[op_idx] {
                EditOp::Equal => {
                    run_len_1 += 1;
                    run_len_2 += 1;
                }
                EditOp::Delete => run_len_1 += 1,
                EditOp::Insert => run_len_2 += 1,
            }
            op_idx += 1;
        }

        i += run_len_1;
        j += run_len_2;
        let e1 = end_offset(line1, &c1, i, o1);
        let e2 = end_offset(line2, &c2, j, o2);
        push_span(&mut spans, run_equal, (o1, e1), (o2, e2));
        o1 = e1;
        o2 = e2;
    }

    // Trailing ignored characters (whitespace, comments) match by
    // definition of the mask.
    if (o1 as usize) < line1.len() || (o2 as usize) < line2.len() {
        push_span(
            &mut spans,
            true,
            (o1, line1.len() as u32),
            (o2, line2.len() as u32),
        );
    } else if spans.is_empty() && (!line1.is_empty() || !line2.is_empty()) {
        // Both canonical streams were empty but raw text exists.
        spans.push(FineSpan {
            equal: true,
            range1: (0, line1.len() as u32),
            range2: (0, line2.len() as u32),
        });
    }

    Ok(FineDiff { spans, equal })
}

/// Byte offset just past canonical element `idx - 1`, or `prev` when the
/// run consumed nothing on this side.
fn end_offset(line: &str, canonical: &[(u32, char)], idx: usize, prev: u32) -> u32 {
    if idx == 0 {
        return prev;
    }
    match canonical.get(idx) {
        // Extend up to (not including) the next canonical character.
        Some(&(next_off, _)) => next_off.max(prev),
        None => {
            let (off, _) = canonical[idx - 1];
            let ch_len = line[off as usize..]
                .chars()
                .next()
                .map_or(0, char::len_utf8);
            (off + ch_len as u32).max(prev)
        }
    }
}

fn push_span(spans: &mut Vec<FineSpan>, equal: bool, range1: (u32, u32), range2: (u32, u32)) {
    if range1.0 == range1.1 && range2.0 == range2.1 {
        return;
    }
    if let Some(last) = spans.last_mut() {
        if last.equal == equal {
            last.range1.1 = range1.1;
            last.range2.1 = range2.1;
            return;
        }
    }
    spans.push(FineSpan {
        equal,
        range1,
        range2,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lines::{build_line_data, PlainTextLexer};

    fn line(text: &str, mask: IgnoreMask) -> (String, LineData) {
        let owned = text.to_string();
        let mut lexer = PlainTextLexer;
        let mut lines = build_line_data(&owned, mask, &mut lexer, 8);
        (owned, lines.remove(0))
    }

    fn diff(t1: &str, t2: &str, mask: IgnoreMask) -> FineDiff {
        let (s1, l1) = line(t1, mask);
        let (s2, l2) = line(t2, mask);
        fine_diff(&s1, &l1, &s2, &l2, mask).unwrap()
    }

    #[test]
    fn equal_lines() {
        let fd = diff("same text", "same text", IgnoreMask::NONE);
        assert!(fd.equal);
        assert_eq!(fd.spans.len(), 1);
        assert_eq!(fd.spans[0].range1, (0, 9));
    }

    #[test]
    fn middle_change() {
        let fd = diff("one two three", "one TWO three", IgnoreMask::NONE);
        assert!(!fd.equal);
        let changed: Vec<&FineSpan> = fd.spans.iter().filter(|s| !s.equal).collect();
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].range1, (4, 7));
        assert_eq!(changed[0].range2, (4, 7));
    }

    #[test]
    fn spans_cover_both_lines() {
        for (a, b) in [
            ("abcdef", "abXdef"),
            ("", "xyz"),
            ("hello", ""),
            ("aaa", "bbb"),
        ] {
            let fd = diff(a, b, IgnoreMask::NONE);
            let last = fd.spans.last();
            if a.is_empty() && b.is_empty() {
                assert!(fd.spans.is_empty());
            } else {
                let last = last.unwrap();
                assert_eq!(last.range1.1 as usize, a.len());
                assert_eq!(last.range2.1 as usize, b.len());
                assert_eq!(fd.spans.first().unwrap().range1.0, 0);
                assert_eq!(fd.spans.first().unwrap().range2.0, 0);
            }
        }
    }

    #[test]
    fn case_mask_hides_case_change() {
        let mask = IgnoreMask {
            case: true,
            ..IgnoreMask::NONE
        };
        let fd = diff("Mixed Case", "mixed case", mask);
        assert!(fd.equal);
        assert!(fd.spans.iter().all(|s| s.equal));
    }

    #[test]
    fn whitespace_mask_hides_indent() {
        let mask = IgnoreMask {
            whitespace: true,
            ..IgnoreMask::NONE
        };
        let fd = diff("    indented", "indented", mask);
        assert!(fd.equal);
        let fd2 = diff("a  b", "a b", mask);
        assert!(fd2.equal);
    }

    #[test]
    fn whitespace_only_lines_equal_under_mask() {
        let mask = IgnoreMask {
            whitespace: true,
            ..IgnoreMask::NONE
        };
        let fd = diff("   ", "\t", mask);
        assert!(fd.equal);
        assert_eq!(fd.spans.len(), 1);
        assert!(fd.spans[0].equal);
    }

    #[test]
    fn offsets_refer_to_original_text() {
        let mask = IgnoreMask {
            whitespace: true,
            ..IgnoreMask::NONE
        };
        // The change is at original offsets 4..5 even though canonical
        // offsets differ after whitespace collapsing.
        let fd = diff("a   xb", "a   yb", mask);
        assert!(!fd.equal);
        let changed: Vec<&FineSpan> = fd.spans.iter().filter(|s| !s.equal).collect();
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].range1, (4, 5));
        assert_eq!(changed[0].range2, (4, 5));
    }
}
