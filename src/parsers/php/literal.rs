//! Decoding and re-encoding of PHP string literals that may hold symbol names.
//!
//! Only plain literals are decoded. Anything with interpolation or an escape
//! sequence that can never appear in an identifier is reported as `None` and
//! left alone by the callers.

/// Quoting style of a literal as it appeared in source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quote
{
    Single,
    Double,
}

/// Decode the raw token text (quotes included).
pub fn decode(
    raw: &[u8],
    quote: Quote,
) -> Option<String>
{
    if raw.len() < 2
    {
        return None;
    }
    let body = &raw[1..raw.len() - 1];
    let mut out = Vec::with_capacity(body.len());
    let mut i = 0;

    while i < body.len()
    {
        let c = body[i];
        match quote
        {
            Quote::Single if c == b'\\' && matches!(body.get(i + 1), Some(b'\\' | b'\'')) =>
            {
                out.push(body[i + 1]);
                i += 2;
            }
            Quote::Double if c == b'\\' => match body.get(i + 1)
            {
                Some(&e @ (b'\\' | b'"' | b'$')) =>
                {
                    out.push(e);
                    i += 2;
                }
                Some(b'n' | b't' | b'r' | b'v' | b'e' | b'f' | b'x' | b'u' | b'0'..=b'7') =>
                {
                    return None;
                }
                _ =>
                {
                    out.push(c);
                    i += 1;
                }
            },
            Quote::Double if c == b'$' || (c == b'{' && body.get(i + 1) == Some(&b'$')) =>
            {
                return None;
            }
            _ =>
            {
                out.push(c);
                i += 1;
            }
        }
    }

    String::from_utf8(out).ok()
}

/// Encode `value` as a literal in the same style as `raw`.
///
/// Single-quoted literals keep their separator convention: if the original
/// doubled its backslashes, so does the replacement.
pub fn encode(
    raw: &[u8],
    quote: Quote,
    value: &str,
) -> String
{
    match quote
    {
        Quote::Single =>
        {
            let doubled = memchr::memmem::find(raw, b"\\\\").is_some();
            let body = if doubled { value.replace('\\', "\\\\") } else { value.to_string() };
            format!("'{}'", body.replace('\'', "\\'"))
        }
        Quote::Double =>
        {
            let body = value
                .replace('\\', "\\\\")
                .replace('"', "\\\"")
                .replace('$', "\\$");
            format!("\"{body}\"")
        }
    }
}
