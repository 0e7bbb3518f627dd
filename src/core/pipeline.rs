//! Filepath: src/core/pipeline.rs
//! The `prefix` run end to end.
//!
//! Phases are separated by a barrier:
//! 1) discovery of packages and files
//! 2) symbol scan of every PHP file, then the finished rename table
//! 3) per-file rewrites against the read-only table (rayon)
//! 4) commit of the rewritten tree
//! 5) autoload files, planned against the in-memory rewrites, then committed
//!
//! Nothing is written before phase 4.

use std::{collections::HashMap, fs, path::PathBuf};

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::{
    cli::{AppContext, PrefixArgs},
    core::{
        autoload,
        commit::CommitPlan,
        error::{PrefixError, io_from_anyhow},
        locate::{self, Discovery, SourceFile},
        rewrite::{FileContext, RewriteOptions, model_of, rewrite_source},
        symbols::{self, Symbol},
        table::{RenameRules, TableConfig},
    },
    infra::{
        config::{self, FailurePolicy, PrefixSettings},
        io::{normalize_dir_mode, read_file_smart},
        walk::compile_globs,
    },
};

/// Everything known before the first rewrite.
#[derive(Debug)]
pub struct Analysis
{
    pub discovery: Discovery,
    pub symbols: Vec<Symbol>,
    pub rules: RenameRules,
}

/// Counts for the summary line.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunReport
{
    pub packages: usize,
    pub php_files: usize,
    /// PHP files whose content changed
    pub rewritten: usize,
    pub copied: usize,
    /// Outputs written to disk, autoload files included
    pub written: usize,
    pub unchanged: usize,
    pub removed: usize,
}

impl From<&PrefixSettings> for RewriteOptions
{
    fn from(s: &PrefixSettings) -> Self
    {
        Self {
            rewrite_strings: s.rewrite_strings,
            rewrite_docblocks: s.rewrite_docblocks,
            validate_syntax: s.validate_syntax,
        }
    }
}

/// One planned output of the rewrite phase.
enum Output
{
    Copy
    {
        dest: PathBuf,
        source: PathBuf,
    },
    Php
    {
        rel: String,
        dest: PathBuf,
        content: Vec<u8>,
        mode: Option<fs::Permissions>,
        changed: bool,
    },
}

fn progress_bar(
    ctx: &AppContext,
    len: usize,
    msg: &'static str,
) -> ProgressBar
{
    if ctx.quiet
    {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    let style =
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .map(|s| s.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.set_message(msg);
    pb
}

/// Run `f` over `files` on the rayon pool, or in order when `parallel` is off.
/// Results keep the order of `files` either way.
fn map_files<T, F>(
    parallel: bool,
    files: &[&SourceFile],
    f: F,
) -> Vec<T>
where
    T: Send,
    F: Fn(&SourceFile) -> T + Send + Sync,
{
    if parallel
    {
        files
            .par_iter()
            .map(|file| f(*file))
            .collect()
    }
    else
    {
        files
            .iter()
            .map(|file| f(*file))
            .collect()
    }
}

fn read_source(file: &SourceFile) -> Result<Vec<u8>, PrefixError>
{
    read_file_smart(&file.abs)
        .map(|c| c.as_ref().to_vec())
        .map_err(|e| io_from_anyhow(&file.abs, e))
}

/// Under collect-all, recoverable failures are set aside; anything else ends
/// the run.
fn defer(
    err: PrefixError,
    policy: FailurePolicy,
    failures: &mut Vec<PrefixError>,
) -> Result<(), PrefixError>
{
    if policy == FailurePolicy::CollectAll && err.is_recoverable()
    {
        warn!(error = %err, "file failed; continuing");
        failures.push(err);
        Ok(())
    }
    else
    {
        Err(err)
    }
}

/// Discover packages, scan every PHP file for declarations and build the
/// rename table.
///
/// Files that cannot be scanned are skipped under collect-all; the rewrite
/// phase reports them again.
pub fn analyze(
    settings: &PrefixSettings,
    ctx: &AppContext,
) -> Result<Analysis, PrefixError>
{
    let discovery = locate::discover(settings)?;
    let php_files: Vec<&SourceFile> = discovery
        .files
        .iter()
        .filter(|f| f.is_php)
        .collect();

    let progress = progress_bar(ctx, php_files.len(), "scanning symbols");
    let scanned = map_files(settings.parallel, &php_files, |file| -> Result<Vec<Symbol>, PrefixError> {
        let src = read_source(file)?;
        let model = model_of(&file.abs, &src, settings.validate_syntax)?;
        progress.inc(1);
        Ok(symbols::collect(&model, &file.package, &file.rel))
    });
    progress.finish_and_clear();

    let mut found = Vec::new();
    let mut skipped = Vec::new();
    for result in scanned
    {
        match result
        {
            Ok(symbols) => found.extend(symbols),
            Err(e) => defer(e, settings.failure_policy, &mut skipped)?,
        }
    }

    let rules = RenameRules::build(&found, &TableConfig::from(settings))?;
    info!(
        symbols = found.len(),
        rules = rules
            .rules()
            .len(),
        skipped = skipped.len(),
        "rename table built"
    );
    Ok(Analysis { discovery, symbols: found, rules })
}

/// Full run: analyze, rewrite, commit, then emit the autoload files.
///
/// Under collect-all the files that did rewrite are committed, the autoload
/// files are not generated, and the run ends with `Aggregate`.
pub fn prefix(
    settings: &PrefixSettings,
    ctx: &AppContext,
) -> Result<RunReport, PrefixError>
{
    let analysis = analyze(settings, ctx)?;
    let table = TableConfig::from(settings);
    let globs = compile_globs(&table.exclude_file_patterns).map_err(|e| PrefixError::config(format!("{e:#}")))?;
    let opts = RewriteOptions::from(settings);
    let rules = &analysis.rules;

    let files: Vec<&SourceFile> = analysis
        .discovery
        .files
        .iter()
        .collect();
    let progress = progress_bar(ctx, files.len(), "rewriting");
    let outcomes = map_files(settings.parallel, &files, |file| -> Result<Output, PrefixError> {
        let rel = file.target_rel();
        let dest = settings
            .target_dir
            .join(&rel);
        progress.inc(1);
        if !file.is_php
        {
            return Ok(Output::Copy { dest, source: file.abs.clone() });
        }

        let src = read_source(file)?;
        let excluded = table
            .file_exclusion(&globs, &file.package, &file.rel)
            .is_some();
        let out = rewrite_source(&file.abs, &src, rules, &opts, FileContext { excluded })?;
        let mode = fs::metadata(&file.abs)
            .ok()
            .map(|m| m.permissions());
        let changed = out.changed();
        Ok(Output::Php { rel, dest, content: out.content, mode, changed })
    });
    progress.finish_and_clear();

    let mut report = RunReport {
        packages: analysis
            .discovery
            .packages
            .len(),
        ..RunReport::default()
    };
    let mut plan = CommitPlan::default();
    let mut overlay: HashMap<String, Vec<u8>> = HashMap::new();
    let mut failures = Vec::new();
    for outcome in outcomes
    {
        match outcome
        {
            Ok(Output::Copy { dest, source }) =>
            {
                report.copied += 1;
                plan.copy(dest, source);
            }
            Ok(Output::Php { rel, dest, content, mode, changed }) =>
            {
                report.php_files += 1;
                if changed
                {
                    report.rewritten += 1;
                }
                overlay.insert(rel, content.clone());
                plan.write(dest, content, mode);
            }
            Err(e) => defer(e, settings.failure_policy, &mut failures)?,
        }
    }
    debug!(writes = plan.writes.len(), failures = failures.len(), "rewrite phase complete");

    let committed = plan.apply(&settings.target_dir, ctx)?;
    report.written += committed.written;
    report.unchanged += committed.unchanged;

    if !failures.is_empty()
    {
        finish_target(settings, ctx)?;
        return Err(PrefixError::Aggregate { failures });
    }

    let autoload = autoload::plan(settings, &analysis.discovery.registry, &overlay)?;
    let committed = autoload.apply(&settings.target_dir, ctx)?;
    report.written += committed.written;
    report.unchanged += committed.unchanged;
    report.removed += committed.removed;

    finish_target(settings, ctx)?;
    info!(?report, "prefix run complete");
    Ok(report)
}

fn finish_target(
    settings: &PrefixSettings,
    ctx: &AppContext,
) -> Result<(), PrefixError>
{
    if ctx.dry_run
        || !settings
            .target_dir
            .is_dir()
    {
        return Ok(());
    }
    normalize_dir_mode(&settings.target_dir).map_err(|e| io_from_anyhow(&settings.target_dir, e))
}

/// Public CLI entry point for `phprefix prefix`
pub fn run(
    args: PrefixArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let settings = config::load(&(&args).into())?;
    let report = prefix(&settings, ctx)?;

    if !ctx.quiet
    {
        let verb = if ctx.dry_run { "would write" } else { "written" };
        let msg = format!(
            "Prefixed {} packages: {} PHP files ({} rewritten), {} copied; {} {verb}, {} unchanged",
            report.packages, report.php_files, report.rewritten, report.copied, report.written, report.unchanged
        );
        if ctx.no_color
        {
            println!("✓ {msg}");
        }
        else
        {
            println!("{} {msg}", "✓".green());
        }
    }
    Ok(())
}
