//! Filepath: src/core/rewrite/mod.rs
//! Per-file rewrite: structural model in, byte-span edits out.
//!
//! Flow
//! 1) Parse with tree-sitter and build the file model; grammar errors fail
//!    the file when validation is on, unclosed constructs always do
//! 2) Plan edits: namespace names, imports, declarations, references,
//!    `define()` arguments, class-name strings, doc-comment types
//! 3) Splice the edits; every other byte is copied verbatim
//! 4) Optional grammar check of the output
//!
//! Nothing here touches the filesystem.

pub mod docblock;
pub mod resolve;

use std::path::Path;

use tracing::{debug, trace, warn};

use crate::{
    core::{error::PrefixError, table::RenameRules},
    infra::line_index::NewlineIndex,
    parsers::php::{
        self, FileModel, NameKind, Span, UseStatement,
        literal::{self, Quote},
        model::last_segment,
    },
};
use resolve::{NameScope, map_name, plan_reference, same_name};

#[derive(Debug, Clone, Copy)]
pub struct RewriteOptions
{
    pub rewrite_strings: bool,
    pub rewrite_docblocks: bool,
    pub validate_syntax: bool,
}

impl Default for RewriteOptions
{
    fn default() -> Self
    {
        Self { rewrite_strings: true, rewrite_docblocks: true, validate_syntax: true }
    }
}

/// Facts about the file being rewritten that the table cannot know.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileContext
{
    /// Declared by an excluded package or matched by an excluded file
    /// pattern: its own namespace is kept, references are still rewritten.
    pub excluded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewritten
{
    pub content: Vec<u8>,
    pub edits: usize,
}

impl Rewritten
{
    pub fn changed(&self) -> bool
    {
        self.edits > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Edit
{
    span: Span,
    text: String,
}

/// Parse failure at byte `offset` of `src`, with a 1-based position.
pub fn parse_error(
    path: &Path,
    src: &[u8],
    offset: usize,
    message: impl Into<String>,
) -> PrefixError
{
    let (line, column) = NewlineIndex::build(src).position(offset, src);
    PrefixError::Parse { file: path.to_path_buf(), line, column, message: message.into() }
}

/// Parse `src` into its model.
///
/// With `strict` every grammar error fails the file. Otherwise only a
/// construct the grammar had to close itself does; other errors are logged
/// and the model is built from the recovered tree.
pub fn model_of(
    path: &Path,
    src: &[u8],
    strict: bool,
) -> Result<FileModel, PrefixError>
{
    let parsed = php::parse(src).map_err(|e| parse_error(path, src, 0, format!("{e:#}")))?;
    if let Some(err) = parsed.fatal(strict)
    {
        return Err(parse_error(path, src, err.offset, format!("syntax error: {}", err.message)));
    }
    if !parsed
        .errors
        .is_empty()
    {
        let index = NewlineIndex::build(src);
        for err in &parsed.errors
        {
            let (line, column) = index.position(err.offset, src);
            warn!(file = %path.display(), line, column, error = %err, "grammar error ignored");
        }
    }
    Ok(parsed.model)
}

fn check_output(
    path: &Path,
    content: &[u8],
) -> Result<(), PrefixError>
{
    let issue = php::check(content).map_err(|e| parse_error(path, content, 0, format!("{e:#}")))?;
    match issue
    {
        Some(issue) => Err(parse_error(
            path,
            content,
            issue.offset,
            format!("rewrite produced invalid PHP: {}", issue.message),
        )),
        None => Ok(()),
    }
}

/// Rewrite one PHP source against the finished rename table.
pub fn rewrite_source(
    path: &Path,
    src: &[u8],
    rules: &RenameRules,
    opts: &RewriteOptions,
    file: FileContext,
) -> Result<Rewritten, PrefixError>
{
    let model = model_of(path, src, opts.validate_syntax)?;
    let edits = plan_edits(src, &model, rules, opts, file);
    if edits.is_empty()
    {
        return Ok(Rewritten { content: src.to_vec(), edits: 0 });
    }

    let content = splice(src, &edits);
    if opts.validate_syntax
    {
        check_output(path, &content)?;
    }
    debug!(file = %path.display(), edits = edits.len(), "rewritten");
    Ok(Rewritten { content, edits: edits.len() })
}

fn plan_edits(
    src: &[u8],
    model: &FileModel,
    rules: &RenameRules,
    opts: &RewriteOptions,
    file: FileContext,
) -> Vec<Edit>
{
    let old_scopes: Vec<NameScope> = model
        .regions
        .iter()
        .map(NameScope::original)
        .collect();
    let new_scopes: Vec<NameScope> = model
        .regions
        .iter()
        .map(|r| NameScope::rewritten(r, rules, file.excluded))
        .collect();

    let mut edits = Vec::new();

    for (region, scope) in model
        .regions
        .iter()
        .zip(&new_scopes)
    {
        if let Some(span) = region
            .name_span
            .filter(|_| scope.namespace != region.name)
        {
            edits.push(Edit { span, text: scope.namespace.clone() });
        }
        for stmt in &region.uses
        {
            plan_use(stmt, rules, &mut edits);
        }
    }

    if !file.excluded
    {
        for decl in &model.declarations
        {
            let Some(span) = decl.span
            else
            {
                continue;
            };
            let target = map_name(rules, decl.kind.name_kind(), &decl.name);
            if let Some(short) = target
                .as_deref()
                .map(last_segment)
                .filter(|short| *short != last_segment(&decl.name))
            {
                edits.push(Edit { span, text: short.to_string() });
            }
        }
    }

    for reference in &model.references
    {
        let (old, new) = (&old_scopes[reference.region], &new_scopes[reference.region]);
        if let Some(text) = plan_reference(reference.kind, &reference.text, old, new, rules)
        {
            trace!(from = %reference.text, to = %text, "reference");
            edits.push(Edit { span: reference.span, text });
        }
    }

    for string in &model.strings
    {
        let raw = &src[string.span.start..string.span.end];
        let replacement = if string.define_arg
        {
            plan_constant_string(raw, string.quote, rules)
        }
        else if opts.rewrite_strings
        {
            plan_class_string(raw, string.quote, rules)
        }
        else
        {
            None
        };
        if let Some(text) = replacement
        {
            edits.push(Edit { span: string.span, text });
        }
    }

    if opts.rewrite_docblocks
    {
        for doc in &model.doc_comments
        {
            let bytes = &src[doc.span.start..doc.span.end];
            let (old, new) = (&old_scopes[doc.region], &new_scopes[doc.region]);
            for name in docblock::type_names(bytes)
            {
                let text = String::from_utf8_lossy(&bytes[name.start..name.end]);
                if let Some(replacement) = plan_reference(NameKind::Class, &text, old, new, rules)
                {
                    let span = Span { start: doc.span.start + name.start, end: doc.span.start + name.end };
                    edits.push(Edit { span, text: replacement });
                }
            }
        }
    }

    normalize(edits)
}

/// Sort edits and drop any that overlap an earlier one.
fn normalize(mut edits: Vec<Edit>) -> Vec<Edit>
{
    edits.sort_by_key(|e| (e.span.start, e.span.end));
    let mut out: Vec<Edit> = Vec::with_capacity(edits.len());
    for edit in edits
    {
        match out.last()
        {
            Some(prev) if edit.span.start < prev.span.end =>
            {
                debug!(start = edit.span.start, "overlapping edit dropped");
            }
            _ => out.push(edit),
        }
    }
    out
}

fn splice(
    src: &[u8],
    edits: &[Edit],
) -> Vec<u8>
{
    let mut out = Vec::with_capacity(src.len() + edits.len() * 16);
    let mut cursor = 0;
    for edit in edits
    {
        out.extend_from_slice(&src[cursor..edit.span.start]);
        out.extend_from_slice(
            edit.text
                .as_bytes(),
        );
        cursor = edit.span.end;
    }
    out.extend_from_slice(&src[cursor..]);
    out
}

fn use_keyword(kind: NameKind) -> &'static str
{
    match kind
    {
        NameKind::Class => "use ",
        NameKind::Function => "use function ",
        NameKind::Constant => "use const ",
    }
}

fn plan_use(
    stmt: &UseStatement,
    rules: &RenameRules,
    edits: &mut Vec<Edit>,
)
{
    let imports: Vec<_> = stmt
        .imports()
        .collect();
    let targets: Vec<String> = imports
        .iter()
        .map(|i| map_name(rules, i.kind, &i.name).unwrap_or_else(|| i.name.clone()))
        .collect();

    let Some((prefix_span, prefix)) = &stmt.prefix
    else
    {
        for ((item, import), target) in stmt
            .items
            .iter()
            .zip(&imports)
            .zip(&targets)
        {
            if *target == import.name
            {
                continue;
            }
            let lead = if item
                .text
                .starts_with('\\')
            {
                "\\"
            }
            else
            {
                ""
            };
            let mut text = format!("{lead}{target}");
            if !import.explicit_alias && last_segment(target) != import.alias
            {
                text.push_str(&format!(" as {}", import.alias));
            }
            edits.push(Edit { span: item.span, text });
        }
        return;
    };

    // Group use: rewrite the shared prefix when every member moved the same way
    let lead = if prefix.starts_with('\\') { "\\" } else { "" };
    let prefix = prefix.trim_start_matches('\\');
    let mut common: Option<&str> = None;
    let mut shared = true;
    for ((item, import), target) in stmt
        .items
        .iter()
        .zip(&imports)
        .zip(&targets)
    {
        let relative = item
            .text
            .trim_start_matches('\\');
        let head = target
            .strip_suffix(relative)
            .and_then(|h| h.strip_suffix('\\'));
        match (head, common)
        {
            (Some(h), None) => common = Some(h),
            (Some(h), Some(c)) if same_name(import.kind, h, c) || h == c => {}
            _ =>
            {
                shared = false;
                break;
            }
        }
    }

    if shared
    {
        if let Some(head) = common.filter(|h| *h != prefix)
        {
            edits.push(Edit { span: *prefix_span, text: format!("{lead}{head}\\") });
        }
        return;
    }

    let expanded: Vec<String> = imports
        .iter()
        .zip(&targets)
        .map(|(import, target)| {
            let alias = if last_segment(target) != import.alias || import.explicit_alias
            {
                format!(" as {}", import.alias)
            }
            else
            {
                String::new()
            };
            format!("{}{target}{alias};", use_keyword(import.kind))
        })
        .collect();
    edits.push(Edit { span: stmt.span, text: expanded.join(" ") });
}

fn plan_class_string(
    raw: &[u8],
    quote: Quote,
    rules: &RenameRules,
) -> Option<String>
{
    let value = literal::decode(raw, quote)?;
    let (lead, name) = match value.strip_prefix('\\')
    {
        Some(rest) => ("\\", rest),
        None => ("", value.as_str()),
    };
    if !rules.is_known_class(name)
    {
        return None;
    }
    let target = rules
        .map_class(name)
        .filter(|t| t != name)?;
    Some(literal::encode(raw, quote, &format!("{lead}{target}")))
}

fn plan_constant_string(
    raw: &[u8],
    quote: Quote,
    rules: &RenameRules,
) -> Option<String>
{
    let value = literal::decode(raw, quote)?;
    let (lead, name) = match value.strip_prefix('\\')
    {
        Some(rest) => ("\\", rest),
        None => ("", value.as_str()),
    };
    if !rules.is_declared_constant(name)
    {
        return None;
    }
    let target = rules
        .map_constant(name)
        .filter(|t| t != name)?;
    Some(literal::encode(raw, quote, &format!("{lead}{target}")))
}
