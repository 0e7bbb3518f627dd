//! Filepath: src/core/symbols.rs
//! Symbol records discovered in vendored sources, plus the `symbols`
//! subcommand that prints every rename rule derived from them.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use anyhow::{Context, Result};
use itertools::Itertools;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::debug;

use crate::{
    cli::{AppContext, SymbolsArgs},
    core::{
        pipeline,
        table::{Eligibility, Rule},
    },
    infra::config::{self, is_valid_qualified_name},
    parsers::php::{DeclKind, FileModel},
};

/// Kinds of symbol a PHP package can declare
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind
{
    Namespace,
    Class,
    Interface,
    Trait,
    Enum,
    Function,
    Constant,
}

impl SymbolKind
{
    pub fn is_class_like(self) -> bool
    {
        matches!(self, Self::Class | Self::Interface | Self::Trait | Self::Enum)
    }
}

impl From<DeclKind> for SymbolKind
{
    fn from(kind: DeclKind) -> Self
    {
        match kind
        {
            DeclKind::Class => Self::Class,
            DeclKind::Interface => Self::Interface,
            DeclKind::Trait => Self::Trait,
            DeclKind::Enum => Self::Enum,
            DeclKind::Function => Self::Function,
            DeclKind::Constant => Self::Constant,
        }
    }
}

/// One declared symbol
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Symbol
{
    /// Fully-qualified name without a leading separator
    pub name: String,

    pub kind: SymbolKind,

    /// Declaring file, relative to its package directory
    pub file: String,

    /// Composer package name
    pub package: String,
}

impl Symbol
{
    pub fn new(
        name: impl Into<String>,
        kind: SymbolKind,
        package: impl Into<String>,
        file: impl Into<String>,
    ) -> Self
    {
        Self { name: name.into(), kind, file: file.into(), package: package.into() }
    }

    /// Declared outside any namespace
    pub fn is_global(&self) -> bool
    {
        !self
            .name
            .contains('\\')
    }
}

/// Every namespace and declaration a file contributes, in source order.
///
/// `define()` calls whose name is not a valid identifier cannot be referenced
/// as constants and are left out.
pub fn collect(
    model: &FileModel,
    package: &str,
    file: &str,
) -> Vec<Symbol>
{
    let mut out = Vec::new();
    for region in &model.regions
    {
        if !region
            .name
            .is_empty()
        {
            out.push(Symbol::new(&region.name, SymbolKind::Namespace, package, file));
        }
    }
    for decl in &model.declarations
    {
        if !is_valid_qualified_name(&decl.name)
        {
            debug!(name = %decl.name, file, "skipping non-identifier define()");
            continue;
        }
        out.push(Symbol::new(&decl.name, decl.kind.into(), package, file));
    }
    out
}

/// Public CLI entry point for `phprefix symbols`
pub fn run(
    args: SymbolsArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let settings = config::load(&(&args).into())?;
    let analysis = pipeline::analyze(&settings, ctx)?;
    let rules = analysis
        .rules
        .rules();

    match &args.output
    {
        Some(path) =>
        {
            JsonlWriter::write(rules, path)?;
            if !ctx.quiet
            {
                let msg = format!("Wrote {} rules to {}", rules.len(), path.display());
                if ctx.no_color
                {
                    println!("✓ {msg}");
                }
                else
                {
                    println!("{} {msg}", "✓".green());
                }
            }
        }
        None =>
        {
            for rule in rules
            {
                print_rule(rule, ctx);
            }
            if !ctx.quiet
            {
                let counts = rules
                    .iter()
                    .counts_by(|r| r.eligibility == Eligibility::Prefixed);
                let prefixed = counts
                    .get(&true)
                    .copied()
                    .unwrap_or(0);
                let unchanged = counts
                    .get(&false)
                    .copied()
                    .unwrap_or(0);
                eprintln!("{} rules: {prefixed} prefixed, {unchanged} unchanged", rules.len());
            }
        }
    }
    Ok(())
}

fn print_rule(
    rule: &Rule,
    ctx: &AppContext,
)
{
    let kind = format!("{:?}", rule.kind).to_lowercase();
    match &rule.eligibility
    {
        Eligibility::Prefixed if ctx.no_color =>
        {
            println!("{kind:<10} {} -> {}", rule.original, rule.target);
        }
        Eligibility::Prefixed =>
        {
            println!("{kind:<10} {} -> {}", rule.original, rule.target.green());
        }
        Eligibility::PassThrough(reason) if ctx.no_color =>
        {
            println!("{kind:<10} {} (unchanged: {reason})", rule.original);
        }
        Eligibility::PassThrough(reason) =>
        {
            println!("{kind:<10} {} {}", rule.original, format!("(unchanged: {reason})").dimmed());
        }
    }
}

/// Stream rules to a JSON Lines file
struct JsonlWriter;

impl JsonlWriter
{
    /// Write one JSON object per line into `output_path`
    fn write(
        rules: &[Rule],
        output_path: &Path,
    ) -> Result<()>
    {
        if let Some(parent) = output_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
        {
            crate::infra::io::ensure_dir(parent)?;
        }

        let file = File::create(output_path)
            .with_context(|| format!("Failed to create {}", output_path.display()))?;
        let mut writer = BufWriter::new(file);

        for rule in rules
        {
            let json = serde_json::to_string(rule).context("Failed to serialize rule")?;
            writer
                .write_all(json.as_bytes())
                .context("Failed to write rule")?;
            writer
                .write_all(b"\n")
                .context("Failed to write newline")?;
        }

        writer
            .flush()
            .context("Failed to flush output")?;
        Ok(())
    }
}
