//! Per-line data records and canonical-form computation.
//!
//! Each source line is described by a [`LineData`]: its byte range in the
//! source text, its display width, a hash of its canonical form under the
//! active ignore-mask, and classification flags (whitespace, comments).
//! Line arrays are built once per (source, mask) and are immutable
//! afterwards.

use crate::IgnoreMask;

/// Data for one source line.
///
/// Indices and ranges are byte offsets into the owning source text. The
/// range excludes the line terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineData {
    /// Byte offset of the first character of the line.
    pub start: u32,
    /// Byte offset one past the last character (before the terminator).
    pub end: u32,
    /// Display width in columns after tab expansion.
    pub width: u32,
    /// Hash of the canonical form under the mask the array was built with.
    pub hash: u64,
    /// The line contains only whitespace (or is empty).
    pub pure_whitespace: bool,
    /// The line begins inside a block comment.
    pub starts_in_comment: bool,
    /// The line ends inside a block comment.
    pub ends_in_comment: bool,
    /// Ignoring whitespace, the line consists of comment text only.
    pub only_comment: bool,
    /// Comment byte ranges, relative to `start`.
    pub comment_ranges: Vec<(u32, u32)>,
}

impl LineData {
    /// The line's text within its source.
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start as usize..self.end as usize]
    }

    /// Whether the line is blank for merge purposes: pure whitespace, or
    /// comment-only when comments are ignored.
    pub fn is_white(&self, ignore_comments: bool) -> bool {
        self.pure_whitespace || (ignore_comments && self.only_comment)
    }
}

/// Line-oriented comment scanner.
///
/// Implementations keep cross-line state (open block comments) between
/// calls; `scan_line` must be called once per line in source order.
pub trait CommentLexer {
    /// Comment byte ranges within `line` (relative offsets). The lexer's
    /// state at entry decides `starts_in_comment` for this line.
    fn scan_line(&mut self, line: &str) -> Vec<(u32, u32)>;

    /// Whether the scanner is inside a block comment after the last
    /// scanned line.
    fn in_comment(&self) -> bool;
}

/// Lexer for C-family comments: `//` to end of line and `/* ... */`
/// blocks spanning lines. String literals are not interpreted.
#[derive(Debug, Default)]
pub struct CLikeLexer {
    in_block: bool,
}

impl CommentLexer for CLikeLexer {
    fn scan_line(&mut self, line: &str) -> Vec<(u32, u32)> {
        let bytes = line.as_bytes();
        let mut ranges = Vec::new();
        let mut i = 0usize;

        if self.in_block {
            match find_seq(bytes, 0, b"*/") {
                Some(close) => {
                    ranges.push((0, (close + 2) as u32));
                    self.in_block = false;
                    i = close + 2;
                }
                None => {
                    if !line.is_empty() {
                        ranges.push((0, line.len() as u32));
                    }
                    return ranges;
                }
            }
        }

        while i + 1 < bytes.len() {
            if bytes[i] == b'/' && bytes[i + 1] == b'/' {
                ranges.push((i as u32, line.len() as u32));
                return ranges;
            }
            if bytes[i] == b'/' && bytes[i + 1] == b'*' {
                match find_seq(bytes, i + 2, b"*/") {
                    Some(close) => {
                        ranges.push((i as u32, (close + 2) as u32));
                        i = close + 2;
                        continue;
                    }
                    None => {
                        ranges.push((i as u32, line.len() as u32));
                        self.in_block = true;
                        return ranges;
                    }
                }
            }
            i += 1;
        }

        ranges
    }

    fn in_comment(&self) -> bool {
        self.in_block
    }
}

fn find_seq(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if bytes.len() < needle.len() {
        return None;
    }
    (from..=bytes.len() - needle.len()).find(|&i| &bytes[i..i + needle.len()] == needle)
}

/// Lexer that never reports comments (plain-text inputs).
#[derive(Debug, Default)]
pub struct PlainTextLexer;

impl CommentLexer for PlainTextLexer {
    fn scan_line(&mut self, _line: &str) -> Vec<(u32, u32)> {
        Vec::new()
    }

    fn in_comment(&self) -> bool {
        false
    }
}

/// Split source text into line ranges. A final line without a terminator
/// still counts; `\r\n` terminators are excluded from the range.
pub fn split_line_ranges(text: &str) -> Vec<(u32, u32)> {
    let mut ranges = Vec::new();
    let bytes = text.as_bytes();
    let mut start = 0usize;
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'\n' {
            let mut end = i;
            if end > start && bytes[end - 1] == b'\r' {
                end -= 1;
            }
            ranges.push((start as u32, end as u32));
            start = i + 1;
        }
    }
    if start < bytes.len() {
        let mut end = bytes.len();
        if end > start && bytes[end - 1] == b'\r' {
            end -= 1;
        }
        ranges.push((start as u32, end as u32));
    }
    ranges
}

/// Build the line-data array for one source under the given mask.
///
/// The canonical hash incorporates the mask, so arrays must be rebuilt
/// when the mask changes.
pub fn build_line_data(
    text: &str,
    mask: IgnoreMask,
    lexer: &mut dyn CommentLexer,
    tab_width: u32,
) -> Vec<LineData> {
    let ranges = split_line_ranges(text);
    let mut lines = Vec::with_capacity(ranges.len());

    for (start, end) in ranges {
        let line = &text[start as usize..end as usize];
        let starts_in_comment = lexer.in_comment();
        let comment_ranges = lexer.scan_line(line);
        let ends_in_comment = lexer.in_comment();

        let canonical = canonical_chars(line, &comment_ranges, mask);
        let hash = canonical_hash(&canonical);

        let pure_whitespace = line.chars().all(char::is_whitespace);
        let only_comment = !pure_whitespace
            && line
                .char_indices()
                .all(|(i, ch)| ch.is_whitespace() || in_ranges(&comment_ranges, i as u32));

        lines.push(LineData {
            start,
            end,
            width: display_width(line, tab_width),
            hash,
            pure_whitespace,
            starts_in_comment,
            ends_in_comment,
            only_comment,
            comment_ranges,
        });
    }

    lines
}

/// Display width of a line in columns, expanding tabs to the next
/// multiple of `tab_width`.
pub fn display_width(line: &str, tab_width: u32) -> u32 {
    let tab = tab_width.max(1);
    let mut col = 0u32;
    for ch in line.chars() {
        if ch == '\t' {
            col = (col / tab + 1) * tab;
        } else {
            col += 1;
        }
    }
    col
}

fn in_ranges(ranges: &[(u32, u32)], offset: u32) -> bool {
    ranges.iter().any(|&(s, e)| offset >= s && offset < e)
}

/// The canonical character stream of a line under a mask: each element is
/// the original byte offset of the character (relative to line start) and
/// the character it compares as.
pub fn canonical_chars(line: &str, comment_ranges: &[(u32, u32)], mask: IgnoreMask) -> Vec<(u32, char)> {
    let mut out: Vec<(u32, char)> = Vec::new();
    let mut pending_space: Option<u32> = None;

    for (i, ch) in line.char_indices() {
        let off = i as u32;
        if mask.comments && in_ranges(comment_ranges, off) {
            continue;
        }
        if mask.whitespace && ch.is_whitespace() {
            // Collapse runs; drop leading whitespace entirely.
            if !out.is_empty() && pending_space.is_none() {
                pending_space = Some(off);
            }
            continue;
        }
        if let Some(sp) = pending_space.take() {
            out.push((sp, ' '));
        }
        let folded = if mask.case {
            ch.to_lowercase().next().unwrap_or(ch)
        } else {
            ch
        };
        out.push((off, folded));
    }
    // A pending space at end of line is trailing whitespace: dropped.
    out
}

/// DJB2a (xor variant) over the canonical character stream.
pub fn canonical_hash(canonical: &[(u32, char)]) -> u64 {
    let mut hash: u64 = 5381;
    for &(_, ch) in canonical {
        hash = hash.wrapping_mul(33) ^ (ch as u64);
    }
    hash
}

/// Equality of two lines under a mask. Hashes decide; the canonical
/// streams are compared in full only as a collision tiebreak.
pub fn lines_equal(text1: &str, l1: &LineData, text2: &str, l2: &LineData, mask: IgnoreMask) -> bool {
    if l1.hash != l2.hash {
        return false;
    }
    let c1 = canonical_chars(l1.text(text1), &l1.comment_ranges, mask);
    let c2 = canonical_chars(l2.text(text2), &l2.comment_ranges, mask);
    c1.len() == c2.len() && c1.iter().zip(c2.iter()).all(|(a, b)| a.1 == b.1)
}
