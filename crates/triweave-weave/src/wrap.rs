//! Word-wrap remapper: a reversible mapping between (weave row, sub-row)
//! coordinates and display rows under a given visible width.
//!
//! Sub-row counting is the expensive half and may fan out across worker
//! threads; a cooperative cancellation flag is polled between rows and a
//! cancelled build leaves the caller's previous map untouched.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tracing::debug;

use crate::{Weave, WeaveContext};

/// The display map produced by a rewrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapMap {
    /// The width the map was built for; 0 means wrapping is off and the
    /// map is the identity.
    pub width: u32,
    /// First display row of each weave row.
    first_rows: Vec<u32>,
    /// Sub-row count of each weave row (always at least 1).
    sub_rows: Vec<u32>,
    /// Total number of display rows.
    pub total_rows: u32,
    /// Maximum unwrapped line width, for the horizontal scroll range.
    pub max_width: u32,
}

impl WrapMap {
    /// Identity map: one display row per weave row.
    pub fn identity(rows: usize, max_width: u32) -> Self {
        Self {
            width: 0,
            first_rows: (0..rows as u32).collect(),
            sub_rows: vec![1; rows],
            total_rows: rows as u32,
            max_width,
        }
    }

    pub fn len(&self) -> usize {
        self.sub_rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sub_rows.is_empty()
    }

    /// Sub-row count of one weave row.
    pub fn sub_row_count(&self, row: usize) -> u32 {
        self.sub_rows.get(row).copied().unwrap_or(0)
    }

    /// Map (weave row, sub-row) to a display row.
    pub fn display_row(&self, row: usize, sub_row: u32) -> Option<u32> {
        let first = *self.first_rows.get(row)?;
        if sub_row < self.sub_rows[row] {
            Some(first + sub_row)
        } else {
            None
        }
    }

    /// Map a display row back to (weave row, sub-row).
    pub fn weave_row(&self, display_row: u32) -> Option<(usize, u32)> {
        if display_row >= self.total_rows {
            return None;
        }
        let idx = self
            .first_rows
            .partition_point(|&first| first <= display_row)
            .saturating_sub(1);
        Some((idx, display_row - self.first_rows[idx]))
    }
}

/// Break one line into sub-row byte ranges for a visible width.
///
/// Breaks prefer the last whitespace within the width; a run without
/// whitespace breaks at the width. Width 0 disables wrapping.
pub fn wrap_line(line: &str, width: u32, tab_width: u32) -> Vec<(u32, u32)> {
    if width == 0 || line.is_empty() {
        return vec![(0, line.len() as u32)];
    }
    let tab = tab_width.max(1);
    let chars: Vec<(usize, char)> = line.char_indices().collect();
    let mut out = Vec::new();
    let mut start = 0usize;

    while start < chars.len() {
        let mut col = 0u32;
        let mut end = start;
        let mut last_ws: Option<usize> = None;

        while end < chars.len() {
            let ch = chars[end].1;
            let w = if ch == '\t' { tab - col % tab } else { 1 };
            if col + w > width && end > start {
                break;
            }
            if ch.is_whitespace() {
                last_ws = Some(end + 1);
            }
            col += w;
            end += 1;
        }

        if end >= chars.len() {
            out.push((chars[start].0 as u32, line.len() as u32));
            break;
        }

        let brk = match last_ws {
            Some(p) if p > start && p <= end => p,
            _ => end,
        };
        out.push((chars[start].0 as u32, chars[brk].0 as u32));
        start = brk;
    }

    out
}

/// Sub-row count of one weave row: the maximum over its present lines of
/// the wrapped segment count.
fn row_sub_rows(weave: &Weave, ctx: &WeaveContext<'_>, row: usize, width: u32, tab_width: u32) -> u32 {
    let mut max = 1u32;
    for &sel in ctx.selectors() {
        if let Some(line) = weave.rows[row].line(sel) {
            if let Some(text) = ctx.line_text(sel, line) {
                max = max.max(wrap_line(text, width, tab_width).len() as u32);
            }
        }
    }
    max
}

fn weave_max_width(weave: &Weave, ctx: &WeaveContext<'_>) -> u32 {
    let mut max = 0u32;
    for row in &weave.rows {
        for &sel in ctx.selectors() {
            if let Some(line) = row.line(sel) {
                if let Some((_, lines)) = ctx.source(sel) {
                    max = max.max(lines[line as usize].width);
                }
            }
        }
    }
    max
}

/// Build the display map for a width.
///
/// Phase one counts sub-rows per weave row, fanned out over `threads`
/// workers when more than one is requested; phase two prefix-sums the
/// counts into the map. Returns `None` when `cancel` was raised; the
/// `progress` counter tracks processed rows either way.
pub fn build_wrap_map(
    weave: &Weave,
    ctx: &WeaveContext<'_>,
    width: u32,
    tab_width: u32,
    threads: usize,
    cancel: &AtomicBool,
    progress: &AtomicUsize,
) -> Option<WrapMap> {
    let max_width = weave_max_width(weave, ctx);
    if width == 0 {
        return Some(WrapMap::identity(weave.len(), max_width));
    }

    let rows = weave.len();
    let mut counts = vec![1u32; rows];

    if threads > 1 && rows > 1 {
        let chunk_size = rows.div_ceil(threads);
        std::thread::scope(|scope| {
            for (chunk_idx, chunk) in counts.chunks_mut(chunk_size).enumerate() {
                let base = chunk_idx * chunk_size;
                scope.spawn(move || {
                    for (i, slot) in chunk.iter_mut().enumerate() {
                        if cancel.load(Ordering::Relaxed) {
                            return;
                        }
                        *slot = row_sub_rows(weave, ctx, base + i, width, tab_width);
                        progress.fetch_add(1, Ordering::Relaxed);
                    }
                });
            }
        });
    } else {
        for (i, slot) in counts.iter_mut().enumerate() {
            if cancel.load(Ordering::Relaxed) {
                break;
            }
            *slot = row_sub_rows(weave, ctx, i, width, tab_width);
            progress.fetch_add(1, Ordering::Relaxed);
        }
    }

    if cancel.load(Ordering::Relaxed) {
        debug!("rewrap cancelled, keeping previous map");
        return None;
    }

    let mut first_rows = Vec::with_capacity(rows);
    let mut total = 0u32;
    for &count in &counts {
        first_rows.push(total);
        total += count;
    }

    Some(WrapMap {
        width,
        first_rows,
        sub_rows: counts,
        total_rows: total,
        max_width,
    })
}
