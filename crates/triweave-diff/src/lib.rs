//! Diff primitives: line data model, ignore-mask canonicalisation,
//! pairwise line diffing, and fine (character-level) diffing.
//!
//! Provides the shortest-edit-script core shared by the line differ and
//! the fine differ, the per-line data records consumed by the three-way
//! weaver, and the comment lexer that feeds the ignore-comments
//! equivalence relation.

pub mod fine;
pub mod lines;
pub mod myers;

/// Which of the up-to-three input sources a value refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Selector {
    A,
    B,
    C,
    /// No source (e.g. an unresolved merge delta).
    None,
    /// Placeholder for not-yet-initialised state.
    Invalid,
}

impl Selector {
    /// Zero-based source index, if this selector names a real source.
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::A => Some(0),
            Self::B => Some(1),
            Self::C => Some(2),
            Self::None | Self::Invalid => None,
        }
    }

    /// Display letter for a real source.
    pub fn letter(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::None => "-",
            Self::Invalid => "?",
        }
    }

    /// Parse a source letter as used in serialised hints.
    pub fn from_letter(s: &str) -> Option<Self> {
        match s {
            "A" | "a" => Some(Self::A),
            "B" | "b" => Some(Self::B),
            "C" | "c" => Some(Self::C),
            _ => None,
        }
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.letter())
    }
}

/// An unordered pair of sources, naming one of the three pairwise diffs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffPair {
    Ab,
    Ac,
    Bc,
}

impl DiffPair {
    pub fn sources(&self) -> (Selector, Selector) {
        match self {
            Self::Ab => (Selector::A, Selector::B),
            Self::Ac => (Selector::A, Selector::C),
            Self::Bc => (Selector::B, Selector::C),
        }
    }
}

/// The equivalence relaxations in force for a diff run.
///
/// The mask affects equality only; reported ranges always refer to
/// original character offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IgnoreMask {
    /// Runs of whitespace compare as a single space; leading and
    /// trailing whitespace is ignored.
    pub whitespace: bool,
    /// Characters inside comments are elided from comparison.
    pub comments: bool,
    /// Alphabetic characters compare case-insensitively.
    pub case: bool,
}

impl IgnoreMask {
    pub const NONE: IgnoreMask = IgnoreMask {
        whitespace: false,
        comments: false,
        case: false,
    };

    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }
}

/// One record of a pairwise edit script.
///
/// `nof_equals` matching lines, then `diff1` lines present only in the
/// first input and `diff2` lines present only in the second. Summing
/// `nof_equals + diff1` over a whole script yields the first input's
/// length; `nof_equals + diff2` the second's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffEdit {
    pub nof_equals: u32,
    pub diff1: u32,
    pub diff2: u32,
}

impl DiffEdit {
    pub fn new(nof_equals: u32, diff1: u32, diff2: u32) -> Self {
        Self {
            nof_equals,
            diff1,
            diff2,
        }
    }
}

/// Error type for the diff algorithms.
///
/// The differ itself never fails on any input; the only failure mode is
/// allocation exhaustion while growing the search front.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    #[error("not enough memory to complete the diff")]
    OutOfMemory,
}
