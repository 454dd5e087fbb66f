//! Source texts and the line-source contract.
//!
//! The engine never opens files: shells hand it [`SourceText`] values
//! holding already-read bytes. Decoding is UTF-8 with lossy replacement;
//! inputs containing NUL bytes are classified as non-text and excluded
//! from line diffing.

use std::sync::Arc;

use triweave_diff::lines::{
    build_line_data, CLikeLexer, CommentLexer, LineData, PlainTextLexer,
};
use triweave_diff::IgnoreMask;

/// Line terminator style of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEndStyle {
    Lf,
    CrLf,
    Mixed,
    /// No terminator seen (empty or single unterminated line).
    Unknown,
}

/// One loaded input: raw bytes plus the decoded text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceText {
    name: String,
    raw: Vec<u8>,
    text: String,
    is_text: bool,
    incomplete_conversion: bool,
    encoding: String,
    line_ends: LineEndStyle,
}

impl SourceText {
    /// Classify and decode raw bytes.
    pub fn from_bytes(name: impl Into<String>, raw: Vec<u8>) -> Self {
        let is_text = !raw.contains(&0);
        let incomplete_conversion = std::str::from_utf8(&raw).is_err();
        let text = String::from_utf8_lossy(&raw).into_owned();
        let line_ends = detect_line_ends(&raw);
        Self {
            name: name.into(),
            raw,
            text,
            is_text,
            incomplete_conversion,
            encoding: "UTF-8".to_string(),
            line_ends,
        }
    }

    /// Wrap already-decoded text.
    pub fn from_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self::from_bytes(name.into(), text.into_bytes())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn is_text(&self) -> bool {
        self.is_text
    }

    pub fn size_bytes(&self) -> u64 {
        self.raw.len() as u64
    }

    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    pub fn line_end_style(&self) -> LineEndStyle {
        self.line_ends
    }

    pub fn is_incomplete_conversion(&self) -> bool {
        self.incomplete_conversion
    }
}

fn detect_line_ends(raw: &[u8]) -> LineEndStyle {
    let mut crlf = false;
    let mut lf = false;
    for (i, &b) in raw.iter().enumerate() {
        if b == b'\n' {
            if i > 0 && raw[i - 1] == b'\r' {
                crlf = true;
            } else {
                lf = true;
            }
        }
    }
    match (lf, crlf) {
        (true, true) => LineEndStyle::Mixed,
        (true, false) => LineEndStyle::Lf,
        (false, true) => LineEndStyle::CrLf,
        (false, false) => LineEndStyle::Unknown,
    }
}

/// The per-source contract the pipeline consumes.
pub trait LineSource {
    fn line_count(&self) -> usize;
    fn line_data(&self, index: usize) -> Option<&LineData>;
    fn is_text(&self) -> bool;
    fn size_bytes(&self) -> u64;
    fn encoding(&self) -> &str;
    fn line_end_style(&self) -> LineEndStyle;
    fn is_incomplete_conversion(&self) -> bool;
}

/// A source together with its line-data array, built for one ignore-mask.
/// Immutable once built; a published result keeps the source alive.
#[derive(Debug, Clone)]
pub struct SourceLines {
    pub source: Arc<SourceText>,
    pub lines: Vec<LineData>,
}

impl SourceLines {
    /// Build the line array for a source. Non-text sources get an empty
    /// array; they never reach the line differ.
    pub fn build(
        source: Arc<SourceText>,
        mask: IgnoreMask,
        lex_comments: bool,
        tab_width: u32,
    ) -> Self {
        let lines = if source.is_text() {
            let mut clike;
            let mut plain;
            let lexer: &mut dyn CommentLexer = if lex_comments {
                clike = CLikeLexer::default();
                &mut clike
            } else {
                plain = PlainTextLexer;
                &mut plain
            };
            build_line_data(source.text(), mask, lexer, tab_width)
        } else {
            Vec::new()
        };
        Self { source, lines }
    }
}

impl LineSource for SourceLines {
    fn line_count(&self) -> usize {
        self.lines.len()
    }

    fn line_data(&self, index: usize) -> Option<&LineData> {
        self.lines.get(index)
    }

    fn is_text(&self) -> bool {
        self.source.is_text()
    }

    fn size_bytes(&self) -> u64 {
        self.source.size_bytes()
    }

    fn encoding(&self) -> &str {
        self.source.encoding()
    }

    fn line_end_style(&self) -> LineEndStyle {
        self.source.line_end_style()
    }

    fn is_incomplete_conversion(&self) -> bool {
        self.source.is_incomplete_conversion()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_classification() {
        let text = SourceText::from_text("a", "plain text\n");
        assert!(text.is_text());
        assert!(!text.is_incomplete_conversion());
        assert_eq!(text.size_bytes(), 11);

        let binary = SourceText::from_bytes("b", vec![0x7f, 0x45, 0x4c, 0x46, 0x00, 0x01]);
        assert!(!binary.is_text());
    }

    #[test]
    fn invalid_utf8_is_incomplete_conversion() {
        let src = SourceText::from_bytes("x", vec![b'a', 0xff, b'b', b'\n']);
        assert!(src.is_text());
        assert!(src.is_incomplete_conversion());
        assert!(src.text().contains('\u{FFFD}'));
    }

    #[test]
    fn line_end_detection() {
        assert_eq!(
            SourceText::from_text("l", "a\nb\n").line_end_style(),
            LineEndStyle::Lf
        );
        assert_eq!(
            SourceText::from_text("c", "a\r\nb\r\n").line_end_style(),
            LineEndStyle::CrLf
        );
        assert_eq!(
            SourceText::from_text("m", "a\nb\r\n").line_end_style(),
            LineEndStyle::Mixed
        );
        assert_eq!(
            SourceText::from_text("u", "no newline").line_end_style(),
            LineEndStyle::Unknown
        );
    }

    #[test]
    fn source_lines_contract() {
        let src = Arc::new(SourceText::from_text("s", "one\ntwo\n"));
        let lines = SourceLines::build(src, IgnoreMask::NONE, true, 8);
        assert_eq!(lines.line_count(), 2);
        assert!(lines.line_data(0).is_some());
        assert!(lines.line_data(2).is_none());
        assert!(lines.is_text());
        assert_eq!(lines.encoding(), "UTF-8");
    }

    #[test]
    fn binary_source_has_no_lines() {
        let src = Arc::new(SourceText::from_bytes("bin", vec![1, 0, 2, 0]));
        let lines = SourceLines::build(src, IgnoreMask::NONE, true, 8);
        assert_eq!(lines.line_count(), 0);
        assert!(!lines.is_text());
    }
}
