//! Filepath: src/core/commit.rs
//! Commit phase: the only place that touches the target directory.
//!
//! Every output is planned in memory first. `apply` then writes each one
//! atomically, skipping files whose bytes already match, or, under
//! `--dry-run`, prints a unified diff per file and writes nothing.

use std::{
    fs,
    path::{Path, PathBuf},
};

use owo_colors::OwoColorize;
use rayon::prelude::*;
use similar::TextDiff;
use tracing::{debug, warn};

use crate::{
    cli::AppContext,
    core::error::{PrefixError, io_from_anyhow},
    infra::io::{read_file_smart, unchanged_on_disk, write_atomic},
};

#[derive(Debug, Clone)]
pub enum Content
{
    /// Rewritten bytes
    Bytes(Vec<u8>),
    /// Copied verbatim from this source file
    Copy(PathBuf),
}

#[derive(Debug, Clone)]
pub struct PlannedWrite
{
    pub path: PathBuf,
    pub content: Content,
    /// Permissions to carry over from the source file
    pub mode: Option<fs::Permissions>,
}

#[derive(Debug, Default)]
pub struct CommitPlan
{
    pub writes: Vec<PlannedWrite>,
    pub removals: Vec<PathBuf>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CommitReport
{
    pub written: usize,
    pub unchanged: usize,
    pub removed: usize,
}

impl CommitReport
{
    fn merge(
        self,
        other: Self,
    ) -> Self
    {
        Self {
            written: self.written + other.written,
            unchanged: self.unchanged + other.unchanged,
            removed: self.removed + other.removed,
        }
    }
}

impl CommitPlan
{
    pub fn write(
        &mut self,
        path: PathBuf,
        bytes: Vec<u8>,
        mode: Option<fs::Permissions>,
    )
    {
        self.writes
            .push(PlannedWrite { path, content: Content::Bytes(bytes), mode });
    }

    pub fn copy(
        &mut self,
        path: PathBuf,
        source: PathBuf,
    )
    {
        let mode = fs::metadata(&source)
            .ok()
            .map(|m| m.permissions());
        self.writes
            .push(PlannedWrite { path, content: Content::Copy(source), mode });
    }

    pub fn remove(
        &mut self,
        path: PathBuf,
    )
    {
        self.removals
            .push(path);
    }

    /// Write everything, or print diffs under `--dry-run`.
    ///
    /// `root` only shortens the paths shown in diffs.
    pub fn apply(
        &self,
        root: &Path,
        ctx: &AppContext,
    ) -> Result<CommitReport, PrefixError>
    {
        if ctx.dry_run
        {
            return self.preview(root, ctx);
        }

        let written = self
            .writes
            .par_iter()
            .map(apply_one)
            .try_reduce(CommitReport::default, |a, b| Ok(a.merge(b)))?;

        let mut report = written;
        for path in &self.removals
        {
            match fs::remove_file(path)
            {
                Ok(()) =>
                {
                    debug!(path = %path.display(), "removed stale output");
                    report.removed += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(PrefixError::io(path, e)),
            }
        }
        Ok(report)
    }

    fn preview(
        &self,
        root: &Path,
        ctx: &AppContext,
    ) -> Result<CommitReport, PrefixError>
    {
        let mut report = CommitReport::default();
        for planned in &self.writes
        {
            let new = load(planned)?;
            let old = fs::read(&planned.path).unwrap_or_default();
            if old == new
            {
                report.unchanged += 1;
                continue;
            }
            report.written += 1;
            if !ctx.quiet
            {
                print!("{}", render_diff(&display_path(root, &planned.path), &old, &new));
            }
        }
        for path in &self.removals
        {
            if path.exists()
            {
                report.removed += 1;
                if !ctx.quiet
                {
                    let line = format!("remove {}", display_path(root, path));
                    if ctx.no_color
                    {
                        println!("{line}");
                    }
                    else
                    {
                        println!("{}", line.red());
                    }
                }
            }
        }
        Ok(report)
    }
}

fn load(planned: &PlannedWrite) -> Result<Vec<u8>, PrefixError>
{
    match &planned.content
    {
        Content::Bytes(bytes) => Ok(bytes.clone()),
        Content::Copy(source) => read_file_smart(source)
            .map(|c| c.as_ref().to_vec())
            .map_err(|e| io_from_anyhow(source, e)),
    }
}

fn apply_one(planned: &PlannedWrite) -> Result<CommitReport, PrefixError>
{
    let data = load(planned)?;
    if unchanged_on_disk(&planned.path, &data)
    {
        return Ok(CommitReport { unchanged: 1, ..CommitReport::default() });
    }
    write_atomic(&planned.path, &data, planned.mode.clone()).map_err(|e| {
        warn!(path = %planned.path.display(), "write failed");
        io_from_anyhow(&planned.path, e)
    })?;
    Ok(CommitReport { written: 1, ..CommitReport::default() })
}

fn display_path(
    root: &Path,
    path: &Path,
) -> String
{
    crate::infra::walk::slash_path(path.strip_prefix(root).unwrap_or(path))
}

/// Unified diff of one output, `a/` for the disk state and `b/` for the plan.
pub fn render_diff(
    rel: &str,
    old: &[u8],
    new: &[u8],
) -> String
{
    let old = String::from_utf8_lossy(old);
    let new = String::from_utf8_lossy(new);
    let diff = TextDiff::from_lines(&*old, &*new);
    diff.unified_diff()
        .context_radius(3)
        .header(&format!("a/{rel}"), &format!("b/{rel}"))
        .to_string()
}

#[cfg(test)]
mod tests
{
    use super::*;
    use anyhow::Result;
    use tempfile::TempDir;

    #[test]
    fn apply_writes_copies_and_skips_unchanged() -> Result<()>
    {
        let dir = TempDir::new()?;
        let src = dir
            .path()
            .join("README.md");
        fs::write(&src, "readme")?;
        let target = dir
            .path()
            .join("out");

        let mut plan = CommitPlan::default();
        plan.write(target.join("a/A.php"), b"<?php // a".to_vec(), None);
        plan.copy(target.join("a/README.md"), src.clone());

        let ctx = AppContext { quiet: true, ..AppContext::default() };
        let first = plan.apply(&target, &ctx)?;
        assert_eq!(first, CommitReport { written: 2, unchanged: 0, removed: 0 });
        assert_eq!(fs::read_to_string(target.join("a/README.md"))?, "readme");

        let second = plan.apply(&target, &ctx)?;
        assert_eq!(second, CommitReport { written: 0, unchanged: 2, removed: 0 });
        Ok(())
    }

    #[test]
    fn dry_run_touches_nothing() -> Result<()>
    {
        let dir = TempDir::new()?;
        let stale = dir
            .path()
            .join("stale.php");
        fs::write(&stale, "<?php")?;

        let mut plan = CommitPlan::default();
        plan.write(
            dir.path()
                .join("new.php"),
            b"<?php\n".to_vec(),
            None,
        );
        plan.remove(stale.clone());

        let ctx = AppContext { quiet: true, dry_run: true, ..AppContext::default() };
        let report = plan.apply(dir.path(), &ctx)?;
        assert_eq!(report, CommitReport { written: 1, unchanged: 0, removed: 1 });
        assert!(
            !dir.path()
                .join("new.php")
                .exists()
        );
        assert!(stale.exists());
        Ok(())
    }

    #[test]
    fn diff_has_headers_and_hunks()
    {
        let diff = render_diff("psr/log/A.php", b"namespace Psr;\n", b"namespace Acme\\Psr;\n");
        assert!(diff.contains("--- a/psr/log/A.php"));
        assert!(diff.contains("+++ b/psr/log/A.php"));
        assert!(diff.contains("-namespace Psr;"));
        assert!(diff.contains("+namespace Acme\\Psr;"));
    }
}
