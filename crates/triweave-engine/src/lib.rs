//! Engine driver: runs the diff/merge pipeline over loaded sources and
//! publishes immutable results.
//!
//! The pipeline is synchronous: pairwise diffs, the three-way weave and
//! the merge plan run to completion on the caller's thread; only the fine
//! differ and the rewrap fan out over scoped worker threads. A rebuild
//! constructs everything into fresh containers and publishes by swapping
//! one `Arc`, so observers see either the previous result or the new one,
//! never a partial state.

pub mod cancel;
pub mod error;
pub mod observe;
pub mod rewrap;
pub mod source;

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use tracing::{debug, info, warn};
use triweave_diff::fine::fine_diff;
use triweave_diff::myers::diff_lines;
use triweave_diff::{DiffError, DiffPair, IgnoreMask, Selector};
use triweave_merge::{plan as plan_merge, MergePlan, PlanOptions};
use triweave_weave::build::{fold_in_ac, overlay_bc, seed_from_ab};
use triweave_weave::hints::{anchors_for_pair, correct_alignment, ManualDiffHint};
use triweave_weave::trim::trim;
use triweave_weave::wrap::{build_wrap_map, WrapMap};
use triweave_weave::{Diff3Line, Weave, WeaveContext};

pub use cancel::CancelToken;
pub use error::{EngineError, ErrorKind};
pub use observe::{EngineObserver, NullObserver, SourceStats};
pub use rewrap::{RewrapController, RewrapState};
pub use source::{LineEndStyle, LineSource, SourceLines, SourceText};

/// Immutable configuration for a rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Equivalence relaxations for line and fine diffing.
    pub mask: IgnoreMask,
    /// Fold the BC pairwise diff into the weave as a refinement pass.
    pub align_bc: bool,
    /// Source taken for auto-resolved whitespace-only runs.
    pub whitespace_source: Selector,
    /// Tab stop width for display-column computation.
    pub tab_width: u32,
    /// Run the C-family comment lexer over the sources.
    pub lex_comments: bool,
    /// Worker threads for the parallel stages; 0 picks the available
    /// parallelism.
    pub worker_threads: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mask: IgnoreMask::NONE,
            align_bc: false,
            whitespace_source: Selector::B,
            tab_width: 8,
            lex_comments: true,
            worker_threads: 0,
        }
    }
}

impl EngineConfig {
    fn effective_threads(&self) -> usize {
        if self.worker_threads > 0 {
            self.worker_threads
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
                .min(8)
        }
    }
}

/// Flags for one rebuild round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebuildFlags {
    /// Report the sources as (re)loaded to the observer.
    pub reload_sources: bool,
    /// Keep the encoding the sources were decoded with. The engine holds
    /// already-decoded text, so this is recorded for the shell's benefit
    /// only.
    pub use_existing_encoding: bool,
    /// Auto-resolve every resolvable merge delta.
    pub auto_solve: bool,
    /// The shell intends to (re)initialise its views from this result.
    /// The engine emits the same events either way.
    pub init_gui: bool,
}

impl Default for RebuildFlags {
    fn default() -> Self {
        Self {
            reload_sources: true,
            use_existing_encoding: false,
            auto_solve: false,
            init_gui: false,
        }
    }
}

/// Binary and textual equality verdicts across the loaded sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiffStatus {
    pub binary_equal_ab: bool,
    pub binary_equal_bc: bool,
    pub binary_equal_ca: bool,
    pub text_equal_ab: bool,
    pub text_equal_bc: bool,
    pub text_equal_ca: bool,
}

/// One published pipeline result. Owns the sources (shared), their line
/// arrays, the weave and the merge plan; never mutated after publication.
#[derive(Debug, Clone)]
pub struct EngineResult {
    pub a: SourceLines,
    pub b: SourceLines,
    pub c: Option<SourceLines>,
    pub weave: Weave,
    pub plan: MergePlan,
    pub status: DiffStatus,
    pub mask: IgnoreMask,
}

impl EngineResult {
    pub fn is_three_way(&self) -> bool {
        self.c.is_some()
    }

    /// Borrowed view for resolving line indices against the sources.
    pub fn context(&self) -> WeaveContext<'_> {
        match &self.c {
            Some(c) => WeaveContext::three_way(
                self.a.source.text(),
                &self.a.lines,
                self.b.source.text(),
                &self.b.lines,
                c.source.text(),
                &c.lines,
                self.mask,
            ),
            None => WeaveContext::two_way(
                self.a.source.text(),
                &self.a.lines,
                self.b.source.text(),
                &self.b.lines,
                self.mask,
            ),
        }
    }
}

/// The engine driver.
pub struct Engine {
    config: EngineConfig,
    a: Option<Arc<SourceText>>,
    b: Option<Arc<SourceText>>,
    c: Option<Arc<SourceText>>,
    hints: Vec<ManualDiffHint>,
    published: Option<Arc<EngineResult>>,
    wrap: Option<Arc<WrapMap>>,
    rewrap: RewrapController,
    cancel: CancelToken,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            a: None,
            b: None,
            c: None,
            hints: Vec::new(),
            published: None,
            wrap: None,
            rewrap: RewrapController::default(),
            cancel: CancelToken::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replace the loaded sources. The previously published result stays
    /// available until the next rebuild succeeds.
    pub fn load_sources(&mut self, a: SourceText, b: SourceText, c: Option<SourceText>) {
        self.a = Some(Arc::new(a));
        self.b = Some(Arc::new(b));
        self.c = c.map(Arc::new);
    }

    /// Change the equivalence relaxations. Takes effect on the next
    /// rebuild; line data, pairwise diffs and equality flags are always
    /// recomputed together so they can never disagree on the mask.
    pub fn set_ignore_mask(&mut self, mask: IgnoreMask) {
        self.config.mask = mask;
    }

    pub fn add_manual_hint(&mut self, selector: Selector, first_line: u32, last_line: u32) {
        self.hints
            .push(ManualDiffHint::new(selector, first_line, last_line));
    }

    pub fn clear_manual_hints(&mut self) {
        self.hints.clear();
    }

    pub fn manual_hints(&self) -> &[ManualDiffHint] {
        &self.hints
    }

    /// The last successfully published result, if any.
    pub fn result(&self) -> Option<&Arc<EngineResult>> {
        self.published.as_ref()
    }

    /// The current display map, if a rewrap ran since the last rebuild.
    pub fn wrap_map(&self) -> Option<&Arc<WrapMap>> {
        self.wrap.as_ref()
    }

    /// Request cancellation of the operation in flight.
    pub fn cancel_current(&self) {
        self.cancel.cancel();
    }

    /// A clone of the engine's cancellation token, for shells that cancel
    /// from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run the full pipeline and publish the result. On failure the
    /// in-progress containers are discarded and the last published result
    /// remains in place.
    pub fn rebuild(
        &mut self,
        flags: RebuildFlags,
        observer: &mut dyn EngineObserver,
    ) -> Result<Arc<EngineResult>, EngineError> {
        self.cancel.reset();

        let (a, b) = match (&self.a, &self.b) {
            (Some(a), Some(b)) => (a.clone(), b.clone()),
            _ => return Err(EngineError::NotLoaded),
        };
        let c = self.c.clone();

        match self.build_result(a, b, c, flags, observer) {
            Ok(result) => {
                let result = Arc::new(result);
                observer.merge_plan_ready(&result.plan);
                self.published = Some(result.clone());
                // Any previous display map referred to the old weave.
                self.wrap = None;
                info!(
                    rows = result.weave.len(),
                    deltas = result.plan.deltas.len(),
                    "pipeline rebuilt"
                );
                Ok(result)
            }
            Err(err) => {
                if err.kind() != ErrorKind::Cancelled {
                    observer.error(err.kind(), &err.to_string());
                }
                Err(err)
            }
        }
    }

    fn build_result(
        &self,
        a: Arc<SourceText>,
        b: Arc<SourceText>,
        c: Option<Arc<SourceText>>,
        flags: RebuildFlags,
        observer: &mut dyn EngineObserver,
    ) -> Result<EngineResult, EngineError> {
        let cfg = &self.config;
        let mask = cfg.mask;

        let a = SourceLines::build(a, mask, cfg.lex_comments, cfg.tab_width);
        let b = SourceLines::build(b, mask, cfg.lex_comments, cfg.tab_width);
        let c = c.map(|c| SourceLines::build(c, mask, cfg.lex_comments, cfg.tab_width));

        for lines in [Some(&a), Some(&b), c.as_ref()].into_iter().flatten() {
            if u32::try_from(lines.line_count()).is_err() {
                return Err(EngineError::TooManyLines(lines.line_count()));
            }
        }

        if flags.reload_sources {
            observer.source_loaded(Selector::A, &stats_of(&a));
            observer.source_loaded(Selector::B, &stats_of(&b));
            if let Some(c) = &c {
                observer.source_loaded(Selector::C, &stats_of(c));
            }
        }

        let mut status = DiffStatus {
            binary_equal_ab: a.source.raw() == b.source.raw(),
            ..DiffStatus::default()
        };
        if let Some(c) = &c {
            status.binary_equal_ca = c.source.raw() == a.source.raw();
            status.binary_equal_bc = b.source.raw() == c.source.raw();
        }

        // Non-text input downgrades the whole run to the binary verdicts.
        let sources = [
            (Selector::A, a.is_text()),
            (Selector::B, b.is_text()),
            (Selector::C, c.as_ref().map_or(true, |c| c.is_text())),
        ];
        if let Some(&(sel, _)) = sources.iter().find(|&&(_, is_text)| !is_text) {
            warn!(source = %sel, "non-text input, skipping line diffs");
            let err = EngineError::SourceNotText(sel);
            observer.error(err.kind(), &err.to_string());
            return Ok(EngineResult {
                a,
                b,
                c,
                weave: Weave::default(),
                plan: MergePlan::default(),
                status,
                mask,
            });
        }

        let (weave, plan, text_equal) = {
            let ctx = match &c {
                Some(c) => WeaveContext::three_way(
                    a.source.text(),
                    &a.lines,
                    b.source.text(),
                    &b.lines,
                    c.source.text(),
                    &c.lines,
                    mask,
                ),
                None => WeaveContext::two_way(
                    a.source.text(),
                    &a.lines,
                    b.source.text(),
                    &b.lines,
                    mask,
                ),
            };

            let mut weave = self.weave_sources(&ctx, observer)?;

            if u32::try_from(weave.len()).is_err() {
                return Err(EngineError::TooManyLines(weave.len()));
            }

            weave.recompute_flags(&ctx);
            weave.validate(&ctx)?;
            observer.weave_computed(weave.len());
            weave.compute_white(&ctx);

            self.fine_pass(&mut weave, &ctx)?;
            observer.fine_diff_computed();

            let text_equal = (
                pair_text_equal(&weave, Selector::A, Selector::B, |r| &r.fine_ab),
                pair_text_equal(&weave, Selector::B, Selector::C, |r| &r.fine_bc),
                pair_text_equal(&weave, Selector::C, Selector::A, |r| &r.fine_ca),
            );

            let plan_opts = PlanOptions {
                auto_solve: flags.auto_solve,
                whitespace_source: cfg.whitespace_source,
            };
            let plan = plan_merge(&weave, &ctx, &plan_opts);

            (weave, plan, text_equal)
        };

        status.text_equal_ab = text_equal.0;
        if c.is_some() {
            status.text_equal_bc = text_equal.1;
            status.text_equal_ca = text_equal.2;
        }
        // An empty input never counts as text-equal.
        if a.size_bytes() == 0 {
            status.text_equal_ab = false;
            status.text_equal_ca = false;
        }
        if b.size_bytes() == 0 {
            status.text_equal_ab = false;
            status.text_equal_bc = false;
        }

        Ok(EngineResult {
            a,
            b,
            c,
            weave,
            plan,
            status,
            mask,
        })
    }

    /// Pairwise diffs plus the weave passes, in driver order.
    fn weave_sources(
        &self,
        ctx: &WeaveContext<'_>,
        observer: &mut dyn EngineObserver,
    ) -> Result<Weave, EngineError> {
        let mask = ctx.mask;
        let len_a = ctx.line_count(Selector::A) as u32;
        let len_b = ctx.line_count(Selector::B) as u32;

        let anchors_ab =
            anchors_for_pair(&self.hints, Selector::A, Selector::B, len_a, len_b);
        let edits_ab = diff_lines(
            ctx.text_a,
            ctx.lines_a,
            ctx.text_b,
            ctx.lines_b,
            mask,
            &anchors_ab,
        )?;
        observer.diff_computed(DiffPair::Ab);
        self.check_cancel()?;

        let mut weave = seed_from_ab(&edits_ab);

        let (text_c, lines_c) = match ctx.text_c.zip(ctx.lines_c) {
            Some(pair) => pair,
            None => return Ok(weave),
        };
        let len_c = lines_c.len() as u32;

        let anchors_ac =
            anchors_for_pair(&self.hints, Selector::A, Selector::C, len_a, len_c);
        let edits_ac = diff_lines(ctx.text_a, ctx.lines_a, text_c, lines_c, mask, &anchors_ac)?;
        observer.diff_computed(DiffPair::Ac);
        self.check_cancel()?;

        fold_in_ac(&mut weave, &edits_ac);
        self.apply_hints(&mut weave, observer);
        trim(&mut weave, ctx, &self.hints);

        let anchors_bc =
            anchors_for_pair(&self.hints, Selector::B, Selector::C, len_b, len_c);
        let edits_bc = diff_lines(ctx.text_b, ctx.lines_b, text_c, lines_c, mask, &anchors_bc)?;
        observer.diff_computed(DiffPair::Bc);
        self.check_cancel()?;

        if self.config.align_bc {
            overlay_bc(&mut weave, &edits_bc);
            self.apply_hints(&mut weave, observer);
            trim(&mut weave, ctx, &self.hints);
        }

        Ok(weave)
    }

    /// Manual hint correction is non-fatal: a group that cannot be
    /// satisfied is reported and left un-hinted.
    fn apply_hints(&self, weave: &mut Weave, observer: &mut dyn EngineObserver) {
        if self.hints.is_empty() {
            return;
        }
        if let Err(err) = correct_alignment(weave, &self.hints) {
            let err: EngineError = err.into();
            observer.error(err.kind(), &err.to_string());
        }
    }

    /// Character-level diff of every aligned pair, fanned out over worker
    /// threads. Each worker writes only the fine sub-structures of its
    /// own row chunk.
    fn fine_pass(&self, weave: &mut Weave, ctx: &WeaveContext<'_>) -> Result<(), EngineError> {
        let three_way = ctx.has_c();
        let threads = self.config.effective_threads();
        let rows = &mut weave.rows;
        let cancel = &self.cancel;

        if threads > 1 && rows.len() > 1 {
            let chunk_size = rows.len().div_ceil(threads);
            let results: Vec<Result<(), DiffError>> = std::thread::scope(|scope| {
                let handles: Vec<_> = rows
                    .chunks_mut(chunk_size)
                    .map(|chunk| scope.spawn(move || fine_rows(chunk, ctx, three_way, cancel)))
                    .collect();
                handles
                    .into_iter()
                    .map(|handle| {
                        handle
                            .join()
                            .unwrap_or(Err(DiffError::OutOfMemory))
                    })
                    .collect()
            });
            for result in results {
                result?;
            }
        } else {
            fine_rows(rows, ctx, three_way, cancel)?;
        }

        self.check_cancel()?;
        debug!(threads, rows = weave.len(), "fine diff complete");
        Ok(())
    }

    /// Compute the display map for a width. Cancellation keeps the
    /// previous map and reports nothing: the caller asked for it.
    pub fn request_rewrap(
        &mut self,
        width: u32,
        observer: &mut dyn EngineObserver,
    ) -> Result<Arc<WrapMap>, EngineError> {
        let published = self.published.clone().ok_or(EngineError::NotLoaded)?;

        if !self.rewrap.begin() {
            return Err(EngineError::Internal("rewrap already in flight".into()));
        }
        self.cancel.reset();

        let ctx = published.context();
        let progress = AtomicUsize::new(0);
        let map = build_wrap_map(
            &published.weave,
            &ctx,
            width,
            self.config.tab_width,
            self.config.effective_threads(),
            self.cancel.as_atomic(),
            &progress,
        );

        match map {
            Some(map) => {
                self.rewrap.finish();
                observer.rewrap_progress(100);
                observer.rewrap_done(&map);
                let map = Arc::new(map);
                self.wrap = Some(map.clone());
                self.rewrap.settle();
                Ok(map)
            }
            None => {
                self.rewrap.cancel();
                self.rewrap.settle();
                Err(EngineError::Cancelled)
            }
        }
    }

    fn check_cancel(&self) -> Result<(), EngineError> {
        if self.cancel.is_cancelled() {
            Err(EngineError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Fine-diff one chunk of rows.
fn fine_rows(
    chunk: &mut [Diff3Line],
    ctx: &WeaveContext<'_>,
    three_way: bool,
    cancel: &CancelToken,
) -> Result<(), DiffError> {
    for row in chunk {
        if cancel.is_cancelled() {
            return Ok(());
        }
        row.fine_ab = fine_for_pair(row, ctx, Selector::A, Selector::B)?;
        if three_way {
            row.fine_bc = fine_for_pair(row, ctx, Selector::B, Selector::C)?;
            row.fine_ca = fine_for_pair(row, ctx, Selector::C, Selector::A)?;
        }
    }
    Ok(())
}

fn fine_for_pair(
    row: &Diff3Line,
    ctx: &WeaveContext<'_>,
    s1: Selector,
    s2: Selector,
) -> Result<Option<triweave_diff::fine::FineDiff>, DiffError> {
    let (i, j) = match (row.line(s1), row.line(s2)) {
        (Some(i), Some(j)) => (i, j),
        _ => return Ok(None),
    };
    let (t1, l1) = match ctx.source(s1) {
        Some(src) => src,
        None => return Ok(None),
    };
    let (t2, l2) = match ctx.source(s2) {
        Some(src) => src,
        None => return Ok(None),
    };
    fine_diff(t1, &l1[i as usize], t2, &l2[j as usize], ctx.mask).map(Some)
}

/// A pair is text-equal when every row carries both lines and the fine
/// diff found them equal under the mask.
fn pair_text_equal<F>(weave: &Weave, s1: Selector, s2: Selector, fine: F) -> bool
where
    F: Fn(&Diff3Line) -> &Option<triweave_diff::fine::FineDiff>,
{
    weave.rows.iter().all(|row| {
        match (row.line(s1), row.line(s2)) {
            (Some(_), Some(_)) => fine(row).as_ref().map_or(false, |f| f.equal),
            (None, None) => true,
            _ => false,
        }
    })
}

fn stats_of(lines: &SourceLines) -> SourceStats {
    SourceStats {
        lines: lines.line_count(),
        size_bytes: lines.size_bytes(),
        is_text: lines.is_text(),
        encoding: lines.encoding().to_string(),
        line_end_style: lines.line_end_style(),
        incomplete_conversion: lines.is_incomplete_conversion(),
    }
}
