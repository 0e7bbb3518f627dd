//! Filepath: src/core/autoload.rs
//! Autoload emitter: `autoload-classmap.php`, `autoload-files.php` and the
//! `autoload.php` bootstrap that loads both.
//!
//! Output is byte-stable: the classmap is sorted by class name and the files
//! autoloader follows registry order.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt::Write as _,
    path::Path,
};

use anyhow::Result;
use indexmap::IndexMap;
use owo_colors::OwoColorize;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::{
    cli::{AppContext, AutoloadArgs},
    core::{
        commit::CommitPlan,
        error::{PrefixError, io_from_anyhow},
        locate,
    },
    infra::{
        config::{self, PrefixSettings},
        io::{normalize_dir_mode, read_file_smart},
        walk::{FileWalker, is_php_path},
    },
    parsers::php,
};

pub const CLASSMAP_FILE: &str = "autoload-classmap.php";
pub const FILES_FILE: &str = "autoload-files.php";
pub const BOOTSTRAP_FILE: &str = "autoload.php";
pub const GENERATED_MARKER: &str = "@generated by phprefix";

/// Package path -> files to `require_once`, both in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilesRegistry(IndexMap<String, Vec<String>>);

impl FilesRegistry
{
    pub fn push(
        &mut self,
        package: &str,
        file: &str,
    )
    {
        let files = self
            .0
            .entry(package.to_string())
            .or_default();
        if !files
            .iter()
            .any(|f| f == file)
        {
            files.push(file.to_string());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)>
    {
        self.0
            .iter()
            .flat_map(|(pkg, files)| {
                files
                    .iter()
                    .map(move |f| (pkg.as_str(), f.as_str()))
            })
    }
}

/// Class name -> path relative to the target directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassMap(BTreeMap<String, String>);

impl ClassMap
{
    /// First declaration wins; later ones are logged and dropped.
    pub fn insert(
        &mut self,
        class: &str,
        rel: &str,
    )
    {
        match self
            .0
            .get(class)
        {
            Some(existing) if existing != rel =>
            {
                warn!(class, first = %existing, duplicate = rel, "class declared twice; keeping the first");
            }
            Some(_) => {}
            None =>
            {
                self.0
                    .insert(class.to_string(), rel.to_string());
            }
        }
    }

    pub fn len(&self) -> usize
    {
        self.0
            .len()
    }

    pub fn get(
        &self,
        class: &str,
    ) -> Option<&str>
    {
        self.0
            .get(class)
            .map(String::as_str)
    }
}

/// Escape a value for a single-quoted PHP string; backslashes are doubled
/// only where PHP would read them as an escape.
fn php_single_quoted(value: &str) -> String
{
    let mut out = String::with_capacity(value.len());
    let mut chars = value
        .chars()
        .peekable();
    while let Some(c) = chars.next()
    {
        match c
        {
            '\'' => out.push_str("\\'"),
            '\\' if matches!(chars.peek(), None | Some('\\') | Some('\'')) => out.push_str("\\\\"),
            c => out.push(c),
        }
    }
    out
}

pub fn render_classmap(map: &ClassMap) -> String
{
    let mut out = String::new();
    out.push_str("<?php\n\n");
    let _ = writeln!(out, "// {CLASSMAP_FILE} {GENERATED_MARKER}\n");
    out.push_str("$phprefix_src = dirname(__FILE__);\n\n");
    out.push_str("return array(\n");
    for (class, rel) in &map.0
    {
        let _ = writeln!(
            out,
            "   '{}' => $phprefix_src . '/{}',",
            php_single_quoted(class),
            php_single_quoted(rel)
        );
    }
    out.push_str(");\n");
    out
}

/// `None` when no registered file is PHP.
pub fn render_files_autoloader(registry: &FilesRegistry) -> Option<String>
{
    let lines: Vec<String> = registry
        .iter()
        .filter(|(_, file)| is_php_path(file))
        .map(|(pkg, file)| format!("require_once __DIR__ . '/{}/{}';", php_single_quoted(pkg), php_single_quoted(file)))
        .collect();
    if lines.is_empty()
    {
        return None;
    }
    let mut out = String::new();
    out.push_str("<?php\n\n");
    let _ = writeln!(out, "// {FILES_FILE} {GENERATED_MARKER}\n");
    for line in lines
    {
        out.push_str(&line);
        out.push('\n');
    }
    Some(out)
}

pub fn render_bootstrap() -> String
{
    format!(
        r#"<?php

// {BOOTSTRAP_FILE} {GENERATED_MARKER}

if ( file_exists( __DIR__ . '/{CLASSMAP_FILE}' ) ) {{
	$class_map = include __DIR__ . '/{CLASSMAP_FILE}';
	if ( is_array( $class_map ) ) {{
		spl_autoload_register(
			function ( $classname ) use ( $class_map ) {{
				if ( isset( $class_map[ $classname ] ) && file_exists( $class_map[ $classname ] ) ) {{
					require_once $class_map[ $classname ];
				}}
			}}
		);
	}}
	unset( $class_map, $phprefix_src );
}}

if ( file_exists( __DIR__ . '/{FILES_FILE}' ) ) {{
	require_once __DIR__ . '/{FILES_FILE}';
}}
"#
    )
}

/// Class declarations of every PHP file under `target_dir`.
///
/// `overlay` holds rewritten contents keyed by target-relative path; those
/// files are read from memory, whether or not they exist on disk yet.
pub fn build_classmap(
    target_dir: &Path,
    overlay: &HashMap<String, Vec<u8>>,
) -> Result<ClassMap, PrefixError>
{
    let generated = [CLASSMAP_FILE, FILES_FILE, BOOTSTRAP_FILE].map(String::from);
    let walker = FileWalker::new(&generated).map_err(|e| PrefixError::config(format!("{e:#}")))?;
    let mut rels: BTreeSet<String> = walker
        .walk_with_filter(target_dir, is_php_path)
        .into_iter()
        .map(|f| f.rel)
        .collect();
    rels.extend(
        overlay
            .keys()
            .filter(|rel| is_php_path(rel))
            .cloned(),
    );

    let rels: Vec<String> = rels
        .into_iter()
        .collect();
    let found = rels
        .par_iter()
        .map(|rel| -> Result<Vec<(String, String)>, PrefixError> {
            let disk;
            let bytes: &[u8] = match overlay.get(rel)
            {
                Some(b) => b,
                None =>
                {
                    let path = target_dir.join(rel);
                    disk = read_file_smart(&path).map_err(|e| io_from_anyhow(&path, e))?;
                    disk.as_ref()
                }
            };
            match php::parse(bytes)
            {
                Ok(parsed) =>
                {
                    if let Some(err) = parsed.errors.first()
                    {
                        debug!(file = %rel, offset = err.offset, error = %err, "classes scanned from a recovered parse");
                    }
                    Ok(parsed
                        .model
                        .class_like()
                        .map(|d| (d.name.clone(), rel.clone()))
                        .collect())
                }
                Err(e) =>
                {
                    warn!(file = %rel, error = %e, "cannot scan for classes; skipped");
                    Ok(Vec::new())
                }
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut map = ClassMap::default();
    for (class, rel) in found
        .into_iter()
        .flatten()
    {
        map.insert(&class, &rel);
    }
    debug!(classes = map.len(), "classmap built");
    Ok(map)
}

fn is_marked(path: &Path) -> bool
{
    read_file_smart(path).is_ok_and(|c| {
        memchr::memmem::find(c.as_ref(), GENERATED_MARKER.as_bytes()).is_some()
    })
}

/// Plan the three autoload outputs for `settings.target_dir`.
///
/// Nothing is planned when the target is the vendor directory. A generated
/// classmap or files autoloader left from an earlier run is removed when this
/// run does not emit it.
pub fn plan(
    settings: &PrefixSettings,
    registry: &FilesRegistry,
    overlay: &HashMap<String, Vec<u8>>,
) -> Result<CommitPlan, PrefixError>
{
    let mut plan = CommitPlan::default();
    if settings.target_is_vendor()
    {
        info!("target is the vendor directory; autoload files not generated");
        return Ok(plan);
    }
    let target = &settings.target_dir;

    let classmap_path = target.join(CLASSMAP_FILE);
    if settings.classmap_output
    {
        let map = build_classmap(target, overlay)?;
        plan.write(classmap_path, render_classmap(&map).into_bytes(), None);
    }
    else if is_marked(&classmap_path)
    {
        plan.remove(classmap_path);
    }

    let files_path = target.join(FILES_FILE);
    match render_files_autoloader(registry)
    {
        Some(text) => plan.write(files_path, text.into_bytes(), None),
        None if is_marked(&files_path) => plan.remove(files_path),
        None => {}
    }

    plan.write(target.join(BOOTSTRAP_FILE), render_bootstrap().into_bytes(), None);
    Ok(plan)
}

/// Public CLI entry point for `phprefix autoload`
pub fn run(
    args: AutoloadArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let settings = config::load(&(&args).into())?;
    if settings.target_is_vendor()
    {
        if !ctx.quiet
        {
            println!("Target is the vendor directory; nothing to generate");
        }
        return Ok(());
    }
    if !settings
        .target_dir
        .is_dir()
    {
        return Err(PrefixError::config(format!(
            "target directory {} does not exist; run `phprefix prefix` first",
            settings
                .target_dir
                .display()
        ))
        .into());
    }

    let packages = locate::selected_packages(&settings)?;
    let registry = locate::files_registry(&packages);
    let plan = plan(&settings, &registry, &HashMap::new())?;
    let report = plan.apply(&settings.target_dir, ctx)?;
    if !ctx.dry_run
    {
        normalize_dir_mode(&settings.target_dir)?;
    }

    if !ctx.quiet
    {
        let msg = format!("Autoload files: {} written, {} unchanged", report.written, report.unchanged);
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

#[cfg(test)]
mod tests
{
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn classmap_rendering_is_sorted_and_escaped()
    {
        let mut map = ClassMap::default();
        map.insert("Acme\\Psr\\Log\\NullLogger", "psr/log/Psr/Log/NullLogger.php");
        map.insert("Acme\\Psr\\Log\\AbstractLogger", "psr/log/Psr/Log/AbstractLogger.php");
        map.insert("Acme\\Psr\\Log\\AbstractLogger", "other/Dup.php");

        let text = render_classmap(&map);
        let expected = "<?php\n\n// autoload-classmap.php @generated by phprefix\n\n$phprefix_src = dirname(__FILE__);\n\nreturn array(\n   'Acme\\Psr\\Log\\AbstractLogger' => $phprefix_src . '/psr/log/Psr/Log/AbstractLogger.php',\n   'Acme\\Psr\\Log\\NullLogger' => $phprefix_src . '/psr/log/Psr/Log/NullLogger.php',\n);\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn files_autoloader_keeps_order_and_skips_non_php()
    {
        let mut registry = FilesRegistry::default();
        registry.push("z/last", "src/b.php");
        registry.push("a/first", "src/a.php");
        registry.push("z/last", "src/a.php");
        registry.push("z/last", "data.json");

        let text = render_files_autoloader(&registry).unwrap();
        let requires: Vec<_> = text
            .lines()
            .filter(|l| l.starts_with("require_once"))
            .collect();
        assert_eq!(
            requires,
            vec![
                "require_once __DIR__ . '/z/last/src/b.php';",
                "require_once __DIR__ . '/z/last/src/a.php';",
                "require_once __DIR__ . '/a/first/src/a.php';",
            ]
        );
        assert!(render_files_autoloader(&FilesRegistry::default()).is_none());
    }

    #[test]
    fn bootstrap_guards_both_includes()
    {
        let text = render_bootstrap();
        assert!(text.contains("file_exists( __DIR__ . '/autoload-classmap.php' )"));
        assert!(text.contains("isset( $class_map[ $classname ] ) && file_exists( $class_map[ $classname ] )"));
        assert!(text.contains("require_once __DIR__ . '/autoload-files.php';"));
    }

    #[test]
    fn classmap_prefers_overlay_and_skips_generated() -> Result<()>
    {
        let dir = TempDir::new()?;
        let root = dir.path();
        fs::create_dir_all(root.join("a/pkg"))?;
        fs::write(root.join("a/pkg/Old.php"), "<?php namespace Old; class Gone {}")?;
        fs::write(root.join(CLASSMAP_FILE), "<?php class NotAClass {}")?;

        let mut overlay = HashMap::new();
        overlay.insert("a/pkg/Old.php".to_string(), b"<?php namespace P\\Old; class Kept {}".to_vec());
        overlay.insert("a/pkg/New.php".to_string(), b"<?php interface P_Iface {}".to_vec());

        let map = build_classmap(root, &overlay)?;
        assert_eq!(map.get("P\\Old\\Kept"), Some("a/pkg/Old.php"));
        assert_eq!(map.get("P_Iface"), Some("a/pkg/New.php"));
        assert_eq!(map.get("Old\\Gone"), None);
        assert_eq!(map.get("NotAClass"), None);
        Ok(())
    }
}
