//! `triweave` — batch three-way text diff and merge.
//!
//! Compares two or three files, prints a comparison summary or the merge
//! result, and exits non-zero when differences or unresolved conflicts
//! remain. The heavy lifting lives in the engine crates; this binary is
//! the file-reading, decoding and rendering shell around them.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use bstr::ByteSlice;
use clap::Parser;
use tracing::debug;

use triweave_diff::{IgnoreMask, Selector};
use triweave_engine::{
    Engine, EngineConfig, EngineResult, LineSource, NullObserver, RebuildFlags, SourceText,
};
use triweave_merge::sink::{render_plan, ConflictStyle, MergeLabels, TextMergeBuffer};
use triweave_merge::MergeCategory;

#[derive(Parser)]
#[command(
    name = "triweave",
    about = "Three-way text diff and merge",
    version = concat!("version ", env!("CARGO_PKG_VERSION"))
)]
struct Cli {
    /// First input (the old version in two-way mode)
    file_a: PathBuf,

    /// Second input (the base version in three-way mode)
    file_b: PathBuf,

    /// Third input; enables three-way mode
    file_c: Option<PathBuf>,

    /// Write the merge result to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the merge result on standard output
    #[arg(short = 'p', long)]
    stdout: bool,

    /// Resolve every resolvable delta automatically
    #[arg(long)]
    auto: bool,

    /// Compare alphabetic characters case-insensitively
    #[arg(long)]
    ignore_case: bool,

    /// Treat runs of whitespace as a single space
    #[arg(long)]
    ignore_whitespace: bool,

    /// Exclude C-style comment text from comparison
    #[arg(long)]
    ignore_comments: bool,

    /// Also align matching B and C lines (three-way only)
    #[arg(long)]
    align_bc: bool,

    /// Show conflicts in diff3 style (includes the base version)
    #[arg(long)]
    diff3: bool,

    /// Labels for the inputs in conflict markers (up to 3)
    #[arg(short = 'L', number_of_values = 1, action = clap::ArgAction::Append)]
    label: Vec<String>,

    /// Report the display row count after word-wrapping to this width
    #[arg(long, value_name = "COLUMNS")]
    wrap: Option<u32>,

    /// Print the aligned rows instead of a summary
    #[arg(long)]
    show_alignment: bool,

    /// Suppress the conflict warning on standard error
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("triweave: {:#}", err);
            process::exit(2);
        }
    }
}

fn read_source(path: &PathBuf) -> Result<SourceText> {
    let raw = fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
    debug!(path = %path.display(), bytes = raw.len(), "read input");
    if raw.to_str().is_err() {
        tracing::warn!(path = %path.display(), "input is not valid UTF-8, decoding lossily");
    }
    Ok(SourceText::from_bytes(path.display().to_string(), raw))
}

fn run(cli: &Cli) -> Result<i32> {
    let a = read_source(&cli.file_a)?;
    let b = read_source(&cli.file_b)?;
    let c = cli.file_c.as_ref().map(read_source).transpose()?;

    let config = EngineConfig {
        mask: IgnoreMask {
            whitespace: cli.ignore_whitespace,
            comments: cli.ignore_comments,
            case: cli.ignore_case,
        },
        align_bc: cli.align_bc,
        lex_comments: cli.ignore_comments,
        ..EngineConfig::default()
    };

    let mut engine = Engine::new(config);
    engine.load_sources(a, b, c);

    let flags = RebuildFlags {
        auto_solve: cli.auto,
        ..RebuildFlags::default()
    };
    let result = engine.rebuild(flags, &mut NullObserver)?;

    if let Some(width) = cli.wrap {
        let map = engine.request_rewrap(width, &mut NullObserver)?;
        println!(
            "wrap: {} aligned rows -> {} display rows at width {}",
            result.weave.len(),
            map.total_rows,
            width
        );
    }

    if cli.show_alignment {
        print_alignment(&result);
    }

    let merging = cli.output.is_some() || cli.stdout;
    if merging {
        let (merged, conflicts) = render_merge(cli, &result);
        if let Some(path) = &cli.output {
            fs::write(path, &merged)
                .with_context(|| format!("cannot write {}", path.display()))?;
        }
        if cli.stdout {
            io::stdout().write_all(merged.as_bytes())?;
        }
        if conflicts > 0 {
            if !cli.quiet {
                eprintln!("triweave: {} unresolved conflict(s)", conflicts);
            }
            return Ok(1);
        }
        return Ok(0);
    }

    print_summary(&result);
    let differs = result.plan.change_count() > 0;
    Ok(if differs { 1 } else { 0 })
}

fn render_merge(cli: &Cli, result: &EngineResult) -> (String, usize) {
    let labels = MergeLabels {
        a: cli.label.first().map(String::as_str).unwrap_or("A"),
        b: cli.label.get(1).map(String::as_str).unwrap_or("B"),
        c: cli.label.get(2).map(String::as_str).unwrap_or("C"),
    };
    let style = if cli.diff3 {
        ConflictStyle::Diff3
    } else {
        ConflictStyle::Merge
    };
    let ctx = result.context();
    let mut buffer = TextMergeBuffer::new(&ctx, &result.weave, labels, style);
    render_plan(&result.plan, &mut buffer);
    let conflicts = buffer.conflict_count();
    (buffer.into_text(), conflicts)
}

fn print_summary(result: &EngineResult) {
    let status = &result.status;
    if !result.a.is_text() || !result.b.is_text() {
        println!(
            "binary comparison: A and B are {}",
            if status.binary_equal_ab {
                "equal"
            } else {
                "different"
            }
        );
        return;
    }

    let mut counts = std::collections::BTreeMap::new();
    for delta in &result.plan.deltas {
        *counts.entry(category_name(delta.category)).or_insert(0usize) += 1;
    }

    println!(
        "{} aligned rows, {} deltas",
        result.weave.len(),
        result.plan.deltas.len()
    );
    for (name, count) in counts {
        println!("  {}: {}", name, count);
    }
    if result.is_three_way() {
        println!(
            "text equal: A<->B {}, B<->C {}, C<->A {}",
            status.text_equal_ab, status.text_equal_bc, status.text_equal_ca
        );
    } else {
        println!("text equal: A<->B {}", status.text_equal_ab);
    }
}

fn print_alignment(result: &EngineResult) {
    let ctx = result.context();
    for (idx, row) in result.weave.rows.iter().enumerate() {
        let cell = |sel: Selector| {
            row.line(sel)
                .and_then(|l| ctx.line_text(sel, l))
                .unwrap_or("~")
        };
        let flags = format!(
            "{}{}{}",
            if row.equal_ab { "=" } else { "." },
            if row.equal_ac { "=" } else { "." },
            if row.equal_bc { "=" } else { "." },
        );
        if result.is_three_way() {
            println!(
                "{:4} [{}] {:<20} | {:<20} | {:<20}",
                idx,
                flags,
                cell(Selector::A),
                cell(Selector::B),
                cell(Selector::C)
            );
        } else {
            println!(
                "{:4} [{}] {:<20} | {:<20}",
                idx,
                &flags[..1],
                cell(Selector::A),
                cell(Selector::B)
            );
        }
    }
}

fn category_name(category: MergeCategory) -> &'static str {
    match category {
        MergeCategory::Unchanged => "unchanged",
        MergeCategory::AOnlyChange => "A-only change",
        MergeCategory::BOnlyChange => "B-only change",
        MergeCategory::COnlyChange => "C-only change",
        MergeCategory::AbEqualVsC => "A/B equal vs C",
        MergeCategory::AcEqualVsB => "A/C equal vs B",
        MergeCategory::BcEqualVsA => "B/C equal vs A",
        MergeCategory::Conflict => "conflict",
        MergeCategory::WhitespaceOnly => "whitespace only",
    }
}
