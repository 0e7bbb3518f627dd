//! Filepath: src/parsers/php/validate.rs
//! Grammar errors in a tree-sitter-php parse.
//!
//! A construct the grammar had to close on its own (a MISSING node) leaves
//! nothing sensible to model and always fails the file. Anything else the
//! grammar rejects is an ERROR node; whether that is fatal is the caller's
//! call. Bytes after `__halt_compiler();` are data and are never checked.

use thiserror::Error;
use tree_sitter::Node;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct SyntaxError
{
    pub offset: usize,
    pub message: String,
    /// The grammar inserted a token that is not in the source
    pub missing: bool,
}

/// Every outermost ERROR or MISSING node that starts before `halt`.
pub fn errors(
    root: Node<'_>,
    src: &[u8],
    halt: usize,
) -> Vec<SyntaxError>
{
    let mut out = Vec::new();
    if root.has_error()
    {
        collect(root, src, halt, &mut out);
    }
    out
}

fn collect(
    node: Node<'_>,
    src: &[u8],
    halt: usize,
    out: &mut Vec<SyntaxError>,
)
{
    if node.start_byte() >= halt
    {
        return;
    }
    if node.is_missing()
    {
        out.push(missing(node));
        return;
    }
    if node.is_error()
    {
        out.push(unexpected(node, src));
        return;
    }
    let mut cursor = node.walk();
    for child in node
        .children(&mut cursor)
        .filter(|child| child.has_error())
    {
        collect(child, src, halt, out);
    }
}

fn missing(node: Node<'_>) -> SyntaxError
{
    let opening = match node.kind()
    {
        "}" => Some("{"),
        ")" => Some("("),
        "]" => Some("["),
        _ => None,
    };
    match (opening, node.parent())
    {
        // Report the bracket that was never closed, not the end of file
        (Some(open), Some(parent)) => SyntaxError {
            offset: parent.start_byte(),
            message: format!("unclosed `{open}`"),
            missing: true,
        },
        _ => SyntaxError {
            offset: node.start_byte(),
            message: format!("missing `{}`", node.kind()),
            missing: true,
        },
    }
}

fn unexpected(
    node: Node<'_>,
    src: &[u8],
) -> SyntaxError
{
    let start = node
        .start_byte()
        .min(src.len());
    let end = node
        .end_byte()
        .min(start + 24)
        .min(src.len());
    let snippet = String::from_utf8_lossy(&src[start..end]);
    SyntaxError { offset: start, message: format!("unexpected `{}`", snippet.trim()), missing: false }
}
