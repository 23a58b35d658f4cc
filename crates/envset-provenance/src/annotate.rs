//! Inline origin comments for serialized parameter files
//!
//! The serialized text is scanned line by line. A stack of open keys and
//! list items, keyed by indentation, gives the dotted path of every key
//! line. Comments never change what the text parses to:
//!
//! - a value on the key line gets the comment at the end of its last line
//! - a nested block gets the comment on its own line before the first child
//! - a block scalar gets the comment after its header; content is untouched

use once_cell::sync::Lazy;
use regex::Regex;

use crate::origins::OriginMap;

static BLOCK_SCALAR_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[|>]([1-9][-+]?|[-+][1-9]?)?$").expect("block scalar pattern is valid")
});

#[derive(Debug)]
enum Frame {
    Key { indent: usize, key: String },
    Item { indent: usize, index: usize },
}

impl Frame {
    fn indent(&self) -> usize {
        match self {
            Self::Key { indent, .. } | Self::Item { indent, .. } => *indent,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tail {
    /// Children follow on deeper lines
    Nested,
    /// Block scalar header; content follows on deeper lines
    BlockScalar,
    /// Value starts on this line and may fold onto deeper lines
    Inline,
}

#[derive(Debug)]
struct LineScan {
    comment: Option<String>,
    tail: Tail,
    /// Column that deeper value lines are indented past
    column: usize,
}

struct Annotator<'o> {
    origins: &'o OriginMap,
    stack: Vec<Frame>,
}

impl<'o> Annotator<'o> {
    fn new(origins: &'o OriginMap) -> Self {
        Self {
            origins,
            stack: Vec::new(),
        }
    }

    fn scan(&mut self, indent: usize, content: &str) -> LineScan {
        let mut column = indent;
        let mut rest = content;
        let mut item_column = None;
        loop {
            if rest == "-" {
                self.enter_item(column);
                return LineScan {
                    comment: None,
                    tail: Tail::Nested,
                    column,
                };
            }
            let Some(after) = rest.strip_prefix("- ") else {
                break;
            };
            self.enter_item(column);
            item_column = Some(column);
            let value = after.trim_start_matches(' ');
            column += rest.len() - value.len();
            rest = value;
        }

        let Some((key, value)) = split_key(rest) else {
            let tail = if BLOCK_SCALAR_HEADER.is_match(rest.trim_end()) {
                Tail::BlockScalar
            } else {
                Tail::Inline
            };
            return LineScan {
                comment: None,
                tail,
                column: item_column.unwrap_or(column),
            };
        };

        self.enter_key(column);
        let path = self.path_with(&key);
        let comment = self.origins.comment_for(&path, &key);
        let value = value.trim();
        let tail = if value.is_empty() {
            self.stack.push(Frame::Key {
                indent: column,
                key,
            });
            Tail::Nested
        } else if BLOCK_SCALAR_HEADER.is_match(value) {
            Tail::BlockScalar
        } else {
            Tail::Inline
        };
        LineScan {
            comment,
            tail,
            column,
        }
    }

    fn enter_key(&mut self, column: usize) {
        while self.stack.last().is_some_and(|f| f.indent() >= column) {
            self.stack.pop();
        }
    }

    /// A dash at `column` continues the list open at that column, if any.
    /// The key owning a list may sit at the same column as its dashes.
    fn enter_item(&mut self, column: usize) {
        let mut index = 0;
        loop {
            let (indent, previous) = match self.stack.last() {
                Some(Frame::Key { indent, .. }) => (*indent, None),
                Some(Frame::Item { indent, index }) => (*indent, Some(*index)),
                None => break,
            };
            if indent < column || (indent == column && previous.is_none()) {
                break;
            }
            self.stack.pop();
            if indent == column {
                index = previous.map_or(0, |i| i + 1);
                break;
            }
        }
        self.stack.push(Frame::Item {
            indent: column,
            index,
        });
    }

    fn path_with(&self, key: &str) -> String {
        let mut path = String::new();
        for frame in &self.stack {
            match frame {
                Frame::Key { key, .. } => {
                    if !path.is_empty() {
                        path.push('.');
                    }
                    path.push_str(key);
                }
                Frame::Item { index, .. } => path.push_str(&format!("[{index}]")),
            }
        }
        if !path.is_empty() {
            path.push('.');
        }
        path.push_str(key);
        path
    }
}

/// Add origin comments to serialized parameter text.
///
/// Text is returned unchanged when `origins` is empty.
#[must_use]
pub fn annotate(text: &str, origins: &OriginMap) -> String {
    if origins.is_empty() {
        return text.to_string();
    }

    let lines: Vec<&str> = text.split('\n').collect();
    let mut annotator = Annotator::new(origins);
    let mut out = Vec::with_capacity(lines.len() + 8);
    let mut pending: Option<String> = None;
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        let content = line.trim_start_matches(' ');
        if content.trim().is_empty() || content.starts_with('#') {
            out.push(line.to_string());
            i += 1;
            continue;
        }
        let indent = line.len() - content.len();
        if let Some(comment) = pending.take() {
            out.push(format!("{}{}", " ".repeat(indent), comment));
        }

        let scan = annotator.scan(indent, content);
        if scan.tail == Tail::Nested {
            pending = scan.comment;
            out.push(line.to_string());
            i += 1;
            continue;
        }

        let last = value_end(&lines, i, scan.column);
        for (j, value_line) in lines.iter().enumerate().take(last + 1).skip(i) {
            let target = match scan.tail {
                Tail::BlockScalar => i,
                _ => last,
            };
            match &scan.comment {
                Some(comment) if j == target => out.push(format!("{value_line} {comment}")),
                _ => out.push((*value_line).to_string()),
            }
        }
        i = last + 1;
    }

    out.join("\n")
}

/// Last line belonging to the value that starts on line `start`
fn value_end(lines: &[&str], start: usize, column: usize) -> usize {
    let mut last = start;
    for (j, line) in lines.iter().enumerate().skip(start + 1) {
        let content = line.trim_start_matches(' ');
        if content.trim().is_empty() {
            continue;
        }
        if line.len() - content.len() > column {
            last = j;
        } else {
            break;
        }
    }
    last
}

/// Split a key line into the unquoted key and the text after the colon
fn split_key(content: &str) -> Option<(String, &str)> {
    let (key, after) = match content.as_bytes().first()? {
        b'\'' => {
            let close = closing_quote(content, b'\'')?;
            (content[1..close].replace("''", "'"), &content[close + 1..])
        }
        b'"' => {
            let close = closing_quote(content, b'"')?;
            let key = content[1..close].replace("\\\"", "\"").replace("\\\\", "\\");
            (key, &content[close + 1..])
        }
        b'{' | b'[' => return None,
        _ => match content.find(": ") {
            Some(pos) => (content[..pos].to_string(), &content[pos..]),
            None => {
                let key = content.strip_suffix(':')?;
                (key.to_string(), ":")
            }
        },
    };
    let value = after.strip_prefix(':')?;
    if !value.is_empty() && !value.starts_with(' ') {
        return None;
    }
    Some((key, value))
}

/// Byte position of the quote closing the scalar that opens `content`
fn closing_quote(content: &str, quote: u8) -> Option<usize> {
    let bytes = content.as_bytes();
    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if quote == b'"' => i += 2,
            b if b == quote => {
                if quote == b'\'' && bytes.get(i + 1) == Some(&b'\'') {
                    i += 2;
                } else {
                    return Some(i);
                }
            }
            _ => i += 1,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use envset_param::ParamPath;
    use pretty_assertions::assert_eq;

    fn origins(entries: &[(&str, &str)]) -> OriginMap {
        let mut map = OriginMap::new();
        for (path, origin) in entries {
            let path: ParamPath = path.parse().unwrap();
            map.record(&path, origin);
        }
        map
    }

    #[test]
    fn inline_values() {
        let text = "A: 1\nB: x\n";
        let out = annotate(text, &origins(&[("A", "Env/Tenant: acme")]));
        assert_eq!(out, "A: 1 # tenant: acme\nB: x\n");
    }

    #[test]
    fn nested_block_comment_precedes_first_child() {
        let text = "services:\n  api:\n    PORT: 80\n";
        let out = annotate(
            text,
            &origins(&[
                ("services.api", "Application: billing"),
                ("services.api.PORT", "Env/Cloud: acme/prod"),
            ]),
        );
        assert_eq!(
            out,
            "services:\n  api:\n    # application: billing\n    PORT: 80 # cloud: prod\n"
        );
    }

    #[test]
    fn block_scalar_header_carries_comment() {
        let text = "CERT: |-\n  line one\n  KEY: not a key\nNEXT: 1\n";
        let out = annotate(
            text,
            &origins(&[("CERT", "Env/Cloud: t/c"), ("KEY", "Env/Tenant: t")]),
        );
        assert_eq!(
            out,
            "CERT: |- # cloud: c\n  line one\n  KEY: not a key\nNEXT: 1\n"
        );
    }

    #[test]
    fn list_items_use_indexed_paths() {
        let text = "hosts:\n- name: a\n  port: 1\n- name: b\n  port: 2\nafter: x\n";
        let out = annotate(
            text,
            &origins(&[
                ("hosts[0].port", "Env/Tenant: t"),
                ("hosts[1].port", "Env/Namespace: t/c/ns"),
                ("after", "envgene default"),
            ]),
        );
        assert_eq!(
            out,
            "hosts:\n- name: a\n  port: 1 # tenant: t\n- name: b\n  port: 2 # namespace: ns\nafter: x # envgene default\n"
        );
    }

    #[test]
    fn bare_key_fallback() {
        let text = "global:\n  REGION: eu\n";
        let out = annotate(text, &origins(&[("other.REGION", "Env/Tenant: t")]));
        assert_eq!(out, "global:\n  REGION: eu # tenant: t\n");
    }

    #[test]
    fn folded_value_gets_comment_on_last_line() {
        let text = "LONG: 'first part\n  second: part'\nB: 2\n";
        let out = annotate(
            text,
            &origins(&[("LONG", "Env/Tenant: t"), ("second", "Env/Cloud: t/c")]),
        );
        assert_eq!(out, "LONG: 'first part\n  second: part' # tenant: t\nB: 2\n");
    }

    #[test]
    fn quoted_keys() {
        assert_eq!(split_key("'a: b': 1"), Some(("a: b".to_string(), " 1")));
        assert_eq!(split_key("\"x\": y"), Some(("x".to_string(), " y")));
        assert_eq!(split_key("'just a value'"), None);
        assert_eq!(split_key("http://host"), None);
        assert_eq!(split_key("key:"), Some(("key".to_string(), "")));
    }

    #[test]
    fn nothing_to_annotate() {
        let text = "A: 1\n";
        assert_eq!(annotate(text, &OriginMap::new()), text);
    }
}
