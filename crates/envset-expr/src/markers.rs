//! Placeholder markers, escapes and secure sentinels

use once_cell::sync::Lazy;
use regex::Regex;

/// Opens a secured span inside a rendered string
pub const SECURE_START: char = '\u{0096}';

/// Closes a secured span inside a rendered string
pub const SECURE_END: char = '\u{0097}';

/// Maximum number of evaluations of one value
pub const MAX_NESTING: usize = 50;

/// `${VAR}`, `$VAR` and `<% VAR %>` as the whole (trimmed) value
static SINGLE_REFERENCE: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        r"^\$\{([A-Za-z_][A-Za-z0-9_]*)\}$",
        r"^\$([A-Za-z_][A-Za-z0-9_]*)$",
        r"^<%\s*([A-Za-z_][A-Za-z0-9_]*)\s*%>$",
    ]
    .map(|pattern| Regex::new(pattern).expect("reference pattern is valid"))
});

/// Name referenced when `text` is nothing but a single variable reference
#[must_use]
pub fn single_reference(text: &str) -> Option<&str> {
    SINGLE_REFERENCE
        .iter()
        .find_map(|re| re.captures(text).and_then(|c| c.get(1)))
        .map(|m| m.as_str())
}

#[inline]
pub(crate) fn is_ident_start(b: u8) -> bool {
    b == b'_' || b.is_ascii_alphabetic()
}

#[inline]
pub(crate) fn is_ident_char(b: u8) -> bool {
    b == b'_' || b.is_ascii_alphanumeric()
}

/// Check for an unescaped placeholder of either syntax.
///
/// `<{` and `<%` only count when their closing delimiter follows.
#[must_use]
pub fn has_placeholder(text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if matches!(bytes.get(i + 1), Some(b'\\' | b'$')) => {
                i += 2;
                continue;
            }
            b'$' if bytes
                .get(i + 1)
                .is_some_and(|&next| next == b'{' || is_ident_start(next)) =>
            {
                return true;
            }
            b'<' if bytes.get(i + 1) == Some(&b'{') && text[i + 2..].contains("}>") => {
                return true;
            }
            b'<' if bytes.get(i + 1) == Some(&b'%') && text[i + 2..].contains("%>") => {
                return true;
            }
            _ => {}
        }
        i += 1;
    }
    false
}

/// Reverse `\$` and `\\` escapes
#[must_use]
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next @ ('\\' | '$')) = chars.peek() {
                out.push(next);
                chars.next();
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// Wrap rendered text in secure sentinels
#[must_use]
pub fn wrap_secure(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 4);
    out.push(SECURE_START);
    out.push_str(text);
    out.push(SECURE_END);
    out
}

/// Remove secure sentinels.
///
/// Returns the cleaned text and whether a complete sentinel pair was found.
#[must_use]
pub fn strip_secure(text: &str) -> (String, bool) {
    let secured = text
        .find(SECURE_START)
        .is_some_and(|start| text[start..].contains(SECURE_END));
    if !secured {
        return (text.to_string(), false);
    }
    let cleaned = text
        .chars()
        .filter(|c| *c != SECURE_START && *c != SECURE_END)
        .collect();
    (cleaned, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_reference_forms() {
        assert_eq!(single_reference("${PORT}"), Some("PORT"));
        assert_eq!(single_reference("$PORT"), Some("PORT"));
        assert_eq!(single_reference("<% PORT %>"), Some("PORT"));
        assert_eq!(single_reference("<%PORT%>"), Some("PORT"));
        assert_eq!(single_reference("${PORT}x"), None);
        assert_eq!(single_reference("$a.b"), None);
        assert_eq!(single_reference("\\$PORT"), None);
    }

    #[test]
    fn placeholder_detection_respects_escapes() {
        assert!(has_placeholder("a ${B}"));
        assert!(has_placeholder("$B"));
        assert!(has_placeholder("<% B %>"));
        assert!(has_placeholder("<{ B }>"));
        assert!(has_placeholder("\\\\$B"));
        assert!(!has_placeholder("\\$B"));
        assert!(!has_placeholder("costs $5"));
        assert!(!has_placeholder("{{ .Values.x }}"));
        assert!(!has_placeholder("plain"));
    }

    #[test]
    fn unclosed_delimiters_are_text() {
        assert!(!has_placeholder("a <{b"));
        assert!(!has_placeholder("x <% y"));
        assert!(!has_placeholder("}> then <{"));
        assert!(has_placeholder("<%= y %>"));
    }

    #[test]
    fn unescape_pairs() {
        assert_eq!(unescape("\\$NOT_A_VAR"), "$NOT_A_VAR");
        assert_eq!(unescape("a\\\\b"), "a\\b");
        assert_eq!(unescape("\\n"), "\\n");
    }

    #[test]
    fn secure_round_trip() {
        let wrapped = format!("user:{}", wrap_secure("s3cr3t"));
        let (clean, secured) = strip_secure(&wrapped);
        assert!(secured);
        assert_eq!(clean, "user:s3cr3t");

        let (clean, secured) = strip_secure("plain");
        assert!(!secured);
        assert_eq!(clean, "plain");
    }

    #[test]
    fn unpaired_sentinel_is_not_secured() {
        let text = format!("{SECURE_END}x{SECURE_START}");
        assert!(!strip_secure(&text).1);
    }
}
