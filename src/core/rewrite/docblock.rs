//! Class names inside doc-comment type expressions.

use crate::parsers::php::{
    Span,
    model::{is_builtin_type, is_ident_char, is_ident_start},
};

/// Tags whose first word is a type expression.
const TYPE_TAGS: &[&str] = &[
    "param",
    "return",
    "var",
    "throws",
    "property",
    "property-read",
    "property-write",
    "see",
    "uses",
    "mixin",
    "extends",
    "implements",
    "use",
    "template-extends",
    "template-implements",
    "template-use",
];

const TEMPLATE_TAGS: &[&str] = &["template", "template-covariant", "template-contravariant"];

/// Lowercase pseudo-types used by static analysers.
const PSEUDO_TYPES: &[&str] = &[
    "resource",
    "numeric",
    "scalar",
    "list",
    "boolean",
    "integer",
    "double",
    "real",
    "empty",
    "this",
    "class",
    "key",
    "value",
    "of",
    "is",
    "not",
    "as",
];

/// Spans (relative to `doc`) of every class-name candidate in `doc`.
pub fn type_names(doc: &[u8]) -> Vec<Span>
{
    let mut out = Vec::new();
    let mut line_start = 0;
    while line_start < doc.len()
    {
        let line_end = memchr::memchr(b'\n', &doc[line_start..]).map_or(doc.len(), |p| line_start + p);
        scan_line(doc, line_start, line_end, &mut out);
        line_start = line_end + 1;
    }
    out
}

fn scan_line(
    doc: &[u8],
    start: usize,
    end: usize,
    out: &mut Vec<Span>,
)
{
    let mut i = start;
    while let Some(at) = memchr::memchr(b'@', &doc[i..end]).map(|p| i + p)
    {
        let tag_start = at + 1;
        let mut tag_end = tag_start;
        while tag_end < end && (doc[tag_end].is_ascii_alphanumeric() || doc[tag_end] == b'-')
        {
            tag_end += 1;
        }
        let preceded_ok = at == start || matches!(doc[at - 1], b' ' | b'\t' | b'*' | b'{' | b'/');
        i = tag_end.max(at + 1);
        if !preceded_ok
        {
            continue;
        }

        let raw = String::from_utf8_lossy(&doc[tag_start..tag_end]).to_ascii_lowercase();
        let tag = raw
            .strip_prefix("psalm-")
            .or_else(|| raw.strip_prefix("phpstan-"))
            .unwrap_or(&raw);

        if tag == "method"
        {
            scan_types(doc, tag_end, end, out);
            return;
        }
        if TEMPLATE_TAGS.contains(&tag)
        {
            if let Some(of) = find_word(doc, tag_end, end, b"of")
            {
                let (s, e) = type_expression(doc, of + 2, end);
                scan_types(doc, s, e, out);
            }
            return;
        }
        if TYPE_TAGS.contains(&tag)
        {
            let (s, e) = type_expression(doc, tag_end, end);
            scan_types(doc, s, e, out);
            return;
        }
    }
}

/// Position of a standalone `word` in `doc[from..to]`.
fn find_word(
    doc: &[u8],
    from: usize,
    to: usize,
    word: &[u8],
) -> Option<usize>
{
    let mut i = from;
    while i + word.len() <= to
    {
        let before_ok = i == 0 || doc[i - 1].is_ascii_whitespace();
        let after_ok = doc
            .get(i + word.len())
            .is_none_or(|b| b.is_ascii_whitespace());
        if before_ok && after_ok && &doc[i..i + word.len()] == word
        {
            return Some(i);
        }
        i += 1;
    }
    None
}

/// The first whitespace-delimited type expression after `from`, allowing
/// whitespace inside `<>`, `()`, `{}` and `[]`.
fn type_expression(
    doc: &[u8],
    from: usize,
    to: usize,
) -> (usize, usize)
{
    let mut s = from;
    while s < to && doc[s].is_ascii_whitespace()
    {
        s += 1;
    }
    let mut depth = 0usize;
    let mut e = s;
    while e < to
    {
        match doc[e]
        {
            b'<' | b'(' | b'{' | b'[' => depth += 1,
            b'>' if e > s && doc[e - 1] == b'-' => {}
            b'>' | b')' | b'}' | b']' => depth = depth.saturating_sub(1),
            b if b.is_ascii_whitespace() && depth == 0 => break,
            _ => {}
        }
        e += 1;
    }
    (s, e)
}

fn scan_types(
    doc: &[u8],
    start: usize,
    end: usize,
    out: &mut Vec<Span>,
)
{
    if memchr::memmem::find(&doc[start..end], b"://").is_some()
    {
        return;
    }

    let mut i = start;
    while i < end
    {
        let b = doc[i];
        if b == b'\'' || b == b'"'
        {
            i = memchr::memchr(b, &doc[i + 1..end]).map_or(end, |p| i + 1 + p + 1);
            continue;
        }
        if !(is_ident_start(b) || b == b'\\')
        {
            i += 1;
            continue;
        }

        let s = i;
        while i < end && (is_ident_char(doc[i]) || doc[i] == b'\\')
        {
            i += 1;
        }
        let e = i;
        if keep_candidate(doc, s, e, end)
        {
            out.push(Span { start: s, end: e });
        }
    }
}

fn keep_candidate(
    doc: &[u8],
    s: usize,
    e: usize,
    end: usize,
) -> bool
{
    let word = &doc[s..e];
    let text = String::from_utf8_lossy(word);
    let trimmed = text.trim_end_matches('\\');
    if trimmed.is_empty() || trimmed.ends_with('\\') || trimmed.contains("\\\\")
    {
        return false;
    }
    if !text
        .trim_start_matches('\\')
        .bytes()
        .next()
        .is_some_and(is_ident_start)
    {
        return false;
    }

    let prev = s
        .checked_sub(1)
        .map(|p| doc[p]);
    let next = doc
        .get(e)
        .copied()
        .filter(|_| e < end);
    let shape_key = next == Some(b':') && doc.get(e + 1) != Some(&b':');
    // variables, class-string style pseudo-types, member names
    if matches!(prev, Some(b'$' | b'-' | b':' | b'.')) || matches!(next, Some(b'-' | b'(')) || shape_key
    {
        return false;
    }
    if !trimmed.contains('\\')
    {
        let lower = trimmed.to_ascii_lowercase();
        if is_builtin_type(&lower) || PSEUDO_TYPES.contains(&lower.as_str())
        {
            return false;
        }
        // Lowercase words are prose or pseudo-types, not class names
        if trimmed
            .bytes()
            .all(|b| !b.is_ascii_uppercase())
            && !trimmed.contains('_')
        {
            return false;
        }
    }
    true
}
