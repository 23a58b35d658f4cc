//! Splitting raw strings into literal text and placeholder expressions
//!
//! Literal text keeps its escapes verbatim; only the strict pass reverses
//! them.

use crate::error::{ExpressionError, Result};
use crate::markers::{is_ident_char, is_ident_start};

/// Opening delimiter of the template syntax
pub const TEMPLATE_OPEN: &str = "<{";

/// Closing delimiter of the template syntax
pub const TEMPLATE_CLOSE: &str = "}>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RawSegment<'s> {
    Text(&'s str),
    Expr(&'s str),
}

fn push_text<'s>(segments: &mut Vec<RawSegment<'s>>, text: &'s str) {
    if !text.is_empty() {
        segments.push(RawSegment::Text(text));
    }
}

/// Position of `pattern` at or after `from`, skipping quoted strings
fn find_outside_quotes(bytes: &[u8], from: usize, pattern: &[u8]) -> Option<usize> {
    let mut quote: Option<u8> = None;
    let mut i = from;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(_) if b == b'\\' => i += 1,
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'\'' || b == b'"' => quote = Some(b),
            None if bytes[i..].starts_with(pattern) => return Some(i),
            None => {}
        }
        i += 1;
    }
    None
}

/// Position of the `}` closing a `${` opened just before `from`
fn matching_brace(bytes: &[u8], from: usize) -> Option<usize> {
    let mut depth = 1usize;
    let mut quote: Option<u8> = None;
    let mut i = from;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(_) if b == b'\\' => i += 1,
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'\'' | b'"' => quote = Some(b),
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            },
        }
        i += 1;
    }
    None
}

/// End of a dotted identifier path starting at `from`
fn dotted_path_end(bytes: &[u8], from: usize) -> usize {
    let mut i = from;
    loop {
        while i < bytes.len() && is_ident_char(bytes[i]) {
            i += 1;
        }
        if i + 1 < bytes.len() && bytes[i] == b'.' && is_ident_start(bytes[i + 1]) {
            i += 1;
        } else {
            return i;
        }
    }
}

/// Split a string written in the legacy interpolation syntax
pub(crate) fn scan_legacy(src: &str) -> Result<Vec<RawSegment<'_>>> {
    let bytes = src.as_bytes();
    let mut segments = Vec::new();
    let mut text_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' if matches!(bytes.get(i + 1), Some(b'\\' | b'$')) => i += 2,
            b'$' if bytes.get(i + 1) == Some(&b'{') => {
                let close = matching_brace(bytes, i + 2)
                    .ok_or_else(|| ExpressionError::syntax(src, "unclosed '${'"))?;
                push_text(&mut segments, &src[text_start..i]);
                segments.push(RawSegment::Expr(src[i + 2..close].trim()));
                i = close + 1;
                text_start = i;
            }
            b'$' if bytes.get(i + 1).is_some_and(|&b| is_ident_start(b)) => {
                let end = dotted_path_end(bytes, i + 1);
                push_text(&mut segments, &src[text_start..i]);
                segments.push(RawSegment::Expr(&src[i + 1..end]));
                i = end;
                text_start = i;
            }
            b'<' if bytes.get(i + 1) == Some(&b'%') => {
                let mut start = i + 2;
                if bytes.get(start) == Some(&b'=') {
                    start += 1;
                }
                let close = find_outside_quotes(bytes, start, b"%>")
                    .ok_or_else(|| ExpressionError::syntax(src, "unclosed '<%'"))?;
                push_text(&mut segments, &src[text_start..i]);
                segments.push(RawSegment::Expr(src[start..close].trim()));
                i = close + 2;
                text_start = i;
            }
            _ => i += 1,
        }
    }

    push_text(&mut segments, &src[text_start..]);
    Ok(segments)
}

/// Split a string written in the template syntax
pub(crate) fn scan_template(src: &str) -> Result<Vec<RawSegment<'_>>> {
    let bytes = src.as_bytes();
    let open = TEMPLATE_OPEN.as_bytes();
    let close_pattern = TEMPLATE_CLOSE.as_bytes();
    let mut segments = Vec::new();
    let mut text_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i..].starts_with(open) {
            let start = i + open.len();
            let close = find_outside_quotes(bytes, start, close_pattern)
                .ok_or_else(|| ExpressionError::syntax(src, "unclosed '<{'"))?;
            push_text(&mut segments, &src[text_start..i]);
            segments.push(RawSegment::Expr(src[start..close].trim()));
            i = close + close_pattern.len();
            text_start = i;
        } else {
            i += 1;
        }
    }

    push_text(&mut segments, &src[text_start..]);
    Ok(segments)
}

/// Rewrite legacy placeholders into the template syntax.
///
/// Existing template placeholders and literal text pass through unchanged.
pub fn translate_legacy(src: &str) -> Result<String> {
    let mut out = String::with_capacity(src.len() + 8);
    for segment in scan_legacy(src)? {
        match segment {
            RawSegment::Text(text) => out.push_str(text),
            RawSegment::Expr(expr) => {
                out.push_str(TEMPLATE_OPEN);
                out.push(' ');
                out.push_str(expr);
                out.push(' ');
                out.push_str(TEMPLATE_CLOSE);
            }
        }
    }
    Ok(out)
}
