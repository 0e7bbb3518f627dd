//! Filepath: src/infra/walk.rs
//! Package-tree walker.
//! - Vendored packages are copied whole, so ignore files are never honoured
//!   (a package's own .gitignore must not hide shipped sources)
//! - `.git` directories of source installs are always pruned
//! - Extra exclude globs on package-relative paths (early prune + late filter)
//! - Hidden files included, symlinks not followed
//! - Deterministic ordering for stable output and tests
//!
//! Backed by ripgrep's `ignore` crate and `globset`.

use std::path::{Path, PathBuf};

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::{DirEntry, WalkBuilder};

/// One file found under a walk root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct WalkedFile
{
    /// Path relative to the root, always `/`-separated
    pub rel: String,
    pub abs: PathBuf,
}

impl WalkedFile
{
    pub fn is_php(&self) -> bool
    {
        is_php_path(&self.rel)
    }
}

/// `.php` extension check on a `/`-separated path (case-insensitive).
pub fn is_php_path(rel: &str) -> bool
{
    Path::new(rel)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("php"))
}

/// Join path components into a `/`-separated string.
pub fn slash_path(path: &Path) -> String
{
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

pub struct FileWalker
{
    /// Compiled set of exclude patterns, matched on relative paths
    exclude: GlobSet,
}

impl FileWalker
{
    /// Build a walker with exclude patterns such as `tests/**` or
    /// `**/*.md`. Patterns match on root-relative paths.
    pub fn new(excludes: &[String]) -> Result<Self>
    {
        Ok(Self { exclude: compile_globs(excludes)? })
    }

    fn build_walk(
        &self,
        root: &Path,
    ) -> WalkBuilder
    {
        let mut b = WalkBuilder::new(root);

        b.hidden(false);
        b.ignore(false);
        b.git_ignore(false);
        b.git_global(false);
        b.git_exclude(false);
        b.parents(false);
        b.follow_links(false);

        let extra = self
            .exclude
            .clone();
        let root_owned = root.to_path_buf();
        b.filter_entry(move |ent: &DirEntry| {
            let is_dir = ent
                .file_type()
                .is_some_and(|ft| ft.is_dir());
            if !is_dir
            {
                return true;
            }
            if ent.file_name() == ".git"
            {
                return false;
            }
            let rel = ent
                .path()
                .strip_prefix(&root_owned)
                .unwrap_or(ent.path());
            rel.as_os_str()
                .is_empty()
                || !extra.is_match(rel)
        });

        b
    }

    /// Traverse files under `root`. Missing roots yield an empty list.
    /// Returns a **sorted** list for determinism.
    pub fn walk<P: AsRef<Path>>(
        &self,
        root: P,
    ) -> Vec<WalkedFile>
    {
        let root_path = root.as_ref();
        if !root_path.is_dir()
        {
            return Vec::new();
        }

        let mut out: Vec<WalkedFile> = self
            .build_walk(root_path)
            .build()
            .filter_map(|res| res.ok())
            .filter(|entry| {
                entry
                    .file_type()
                    .is_some_and(|ft| ft.is_file())
            })
            .filter_map(|entry| {
                let abs = entry.into_path();
                let rel = abs
                    .strip_prefix(root_path)
                    .ok()?
                    .to_path_buf();
                if self
                    .exclude
                    .is_match(&rel)
                {
                    return None;
                }
                Some(WalkedFile { rel: slash_path(&rel), abs })
            })
            .collect();

        out.sort();
        out
    }

    /// Traverse and then apply a caller-provided filter on relative paths.
    pub fn walk_with_filter<P, F>(
        &self,
        root: P,
        filter: F,
    ) -> Vec<WalkedFile>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> bool,
    {
        self.walk(root)
            .into_iter()
            .filter(|f| filter(&f.rel))
            .collect()
    }
}

pub fn compile_globs(patterns: &[String]) -> Result<GlobSet>
{
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns
    {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
