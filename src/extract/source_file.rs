use compact_str::CompactString;
use regex::Regex;

use super::types::{Extracted, ExtractionWarning, SkippedCandidate, SourceArtifact};
use crate::statement::{SourceLocation, Statement, looks_like_sql};

/// Keywords that turn `name(` into a definition rather than a call
const DEFINITION_KEYWORDS: [&str; 4] = ["def", "fn", "function", "func"];

/// Outcome of reading the first argument of a call
enum Argument {
    /// Literal text and the byte offset where the first literal starts
    Literal { text: String, offset: usize },
    Dynamic(&'static str),
    Unterminated(usize)
}

pub(super) fn extract(
    artifact: &SourceArtifact,
    call_names: &[CompactString]
) -> Result<Vec<Extracted>, ExtractionWarning> {
    if call_names.is_empty() {
        return Ok(Vec::new());
    }
    let pattern = call_pattern(call_names).map_err(|e| ExtractionWarning {
        file:    artifact.path.clone(),
        line:    None,
        message: format!("invalid call name pattern: {e}")
    })?;

    let content = artifact.content.as_str();
    let lines = LineIndex::new(content);
    let mut events = Vec::new();

    for caps in pattern.captures_iter(content) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if is_definition(&content[..name.start()]) {
            continue;
        }

        match read_argument(content, whole.end()) {
            Argument::Literal {
                text,
                offset
            } => {
                if looks_like_sql(&text) {
                    let location = SourceLocation::new(artifact.path.clone(), lines.line_of(offset));
                    events.push(Extracted::Statement(Statement::new(text, location)));
                }
            }
            Argument::Dynamic(reason) => {
                tracing::debug!(file = %artifact.path, call = name.as_str(), reason, "skipped dynamic SQL");
                events.push(Extracted::Skipped(SkippedCandidate {
                    location: SourceLocation::new(artifact.path.clone(), lines.line_of(name.start())),
                    call:     name.as_str().into(),
                    reason:   reason.to_string()
                }));
            }
            Argument::Unterminated(offset) => {
                return Err(ExtractionWarning {
                    file:    artifact.path.clone(),
                    line:    Some(lines.line_of(offset)),
                    message: "unterminated string literal in call argument; no statements \
                              extracted from this file"
                        .to_string()
                });
            }
        }
    }
    Ok(events)
}

fn call_pattern(call_names: &[CompactString]) -> Result<Regex, regex::Error> {
    let alternatives: Vec<String> = call_names.iter().map(|n| regex::escape(n)).collect();
    Regex::new(&format!(r"\b({})\s*\(", alternatives.join("|")))
}

fn is_definition(before: &str) -> bool {
    let word = before
        .trim_end()
        .rsplit(|c: char| !(c.is_alphanumeric() || c == '_'))
        .next()
        .unwrap_or_default();
    DEFINITION_KEYWORDS.contains(&word)
}

/// Read the first call argument starting right after `(`.
///
/// Accepts a single literal, implicitly adjacent literals, or literals joined
/// with `+`. Anything else makes the argument dynamic.
fn read_argument(content: &str, start: usize) -> Argument {
    let bytes = content.as_bytes();
    let mut pos = skip_whitespace(bytes, start);
    let mut text = String::new();
    let mut first_offset = None;

    loop {
        match read_literal(content, pos) {
            LiteralRead::Text {
                value,
                end
            } => {
                first_offset.get_or_insert(pos);
                text.push_str(&value);
                pos = skip_whitespace(bytes, end);
            }
            LiteralRead::Formatted => return Argument::Dynamic("formatted string literal"),
            LiteralRead::Interpolated => return Argument::Dynamic("template literal with interpolation"),
            LiteralRead::Unterminated => return Argument::Unterminated(pos),
            LiteralRead::NotLiteral => {
                return Argument::Dynamic(if first_offset.is_none() {
                    "argument is not a string literal"
                } else {
                    "literal concatenated with a runtime value"
                });
            }
        }

        match bytes.get(pos).copied() {
            Some(b'+') => pos = skip_whitespace(bytes, pos + 1),
            Some(b',' | b')') => break,
            Some(b'%') => return Argument::Dynamic("literal formatted with %"),
            Some(b'.') => return Argument::Dynamic("literal transformed by a method call"),
            Some(_) if starts_literal(content, pos) => {}
            _ => return Argument::Dynamic("literal combined with a runtime expression")
        }
    }

    match first_offset {
        Some(offset) => Argument::Literal {
            text,
            offset
        },
        None => Argument::Dynamic("argument is not a string literal")
    }
}

enum LiteralRead {
    Text { value: String, end: usize },
    Formatted,
    Interpolated,
    Unterminated,
    NotLiteral
}

fn starts_literal(content: &str, pos: usize) -> bool {
    let (prefix_len, _) = literal_prefix(&content[pos..]);
    matches!(content.as_bytes().get(pos + prefix_len), Some(b'\'' | b'"' | b'`'))
}

/// Length of a string prefix like `r`, `b`, `u`, `f`, `rb`, and whether it formats
fn literal_prefix(rest: &str) -> (usize, bool) {
    let prefix: String = rest
        .chars()
        .take(2)
        .take_while(|c| matches!(c.to_ascii_lowercase(), 'r' | 'b' | 'u' | 'f'))
        .collect();
    let next = rest[prefix.len()..].chars().next();
    if matches!(next, Some('\'' | '"')) {
        let formatted = prefix.chars().any(|c| c.eq_ignore_ascii_case(&'f'));
        (prefix.len(), formatted)
    } else {
        (0, false)
    }
}

fn read_literal(content: &str, pos: usize) -> LiteralRead {
    let rest = &content[pos..];
    let (prefix_len, formatted) = literal_prefix(rest);
    let raw = rest[..prefix_len].chars().any(|c| c.eq_ignore_ascii_case(&'r'));
    let body = &rest[prefix_len..];

    let Some(quote) = body.chars().next().filter(|c| matches!(c, '\'' | '"' | '`')) else {
        return LiteralRead::NotLiteral;
    };
    if formatted {
        return LiteralRead::Formatted;
    }

    let triple: String = std::iter::repeat_n(quote, 3).collect();
    let (delimiter, open_len) = if quote != '`' && body.starts_with(&triple) {
        (triple.as_str(), 3)
    } else {
        (&body[..1], 1)
    };

    let inner_start = pos + prefix_len + open_len;
    let mut value = String::new();
    let mut chars = content[inner_start..].char_indices();
    while let Some((idx, c)) = chars.next() {
        if c == '\\' && !raw && quote != '`' {
            if let Some((_, escaped)) = chars.next() {
                value.push(unescape(escaped));
            }
            continue;
        }
        if content[inner_start + idx..].starts_with(delimiter) {
            if quote == '`' && value.contains("${") {
                return LiteralRead::Interpolated;
            }
            return LiteralRead::Text {
                value,
                end: inner_start + idx + delimiter.len()
            };
        }
        if c == '\n' && open_len == 1 && quote != '`' {
            return LiteralRead::Unterminated;
        }
        value.push(c);
    }
    LiteralRead::Unterminated
}

fn unescape(c: char) -> char {
    match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        other => other
    }
}

fn skip_whitespace(bytes: &[u8], mut pos: usize) -> usize {
    while bytes.get(pos).is_some_and(|b| b.is_ascii_whitespace()) {
        pos += 1;
    }
    pos
}

/// Byte offset to one-based line number
struct LineIndex {
    starts: Vec<usize>
}

impl LineIndex {
    fn new(content: &str) -> Self {
        let starts = std::iter::once(0)
            .chain(content.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            starts
        }
    }

    fn line_of(&self, offset: usize) -> usize {
        match self.starts.binary_search(&offset) {
            Ok(idx) => idx + 1,
            Err(idx) => idx
        }
    }
}
