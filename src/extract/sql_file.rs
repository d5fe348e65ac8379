use super::types::{Extracted, ExtractionWarning, SourceArtifact};
use crate::statement::{SourceLocation, Statement};

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    Quoted(char),
    LineComment,
    BlockComment,
    Dollar
}

struct Piece {
    text: String,
    line: usize
}

/// Split a SQL file into top-level statements.
///
/// Terminators inside quoted literals, comments and PostgreSQL dollar-quoted
/// bodies do not split. Each statement's line is the line of its first
/// significant character.
pub(super) fn extract(artifact: &SourceArtifact) -> Result<Vec<Extracted>, ExtractionWarning> {
    let pieces = split(&artifact.content).map_err(|(line, what)| ExtractionWarning {
        file:    artifact.path.clone(),
        line:    Some(line),
        message: format!("unterminated {what}; no statements extracted from this file")
    })?;

    Ok(pieces
        .into_iter()
        .map(|piece| {
            Extracted::Statement(Statement::new(
                piece.text,
                SourceLocation::new(artifact.path.clone(), piece.line)
            ))
        })
        .collect())
}

fn split(content: &str) -> Result<Vec<Piece>, (usize, &'static str)> {
    let chars: Vec<char> = content.chars().collect();
    let mut pieces = Vec::new();
    let mut state = State::Normal;
    let mut line = 1;
    let mut opened_at = 1;
    let mut dollar_tag = String::new();

    let mut current = String::new();
    let mut start_line: Option<usize> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        if c == '\n' {
            line += 1;
        }

        match state {
            State::Normal => {
                if c == ';' {
                    flush(&mut pieces, &mut current, &mut start_line);
                    i += 1;
                    continue;
                }
                if c == '-' && next == Some('-') {
                    state = State::LineComment;
                } else if c == '/' && next == Some('*') {
                    state = State::BlockComment;
                    opened_at = line;
                    current.push_str("/*");
                    i += 2;
                    continue;
                } else if matches!(c, '\'' | '"' | '`') {
                    state = State::Quoted(c);
                    opened_at = line;
                    start_line.get_or_insert(line);
                } else if c == '$'
                    && let Some(tag) = dollar_tag_at(&chars, i)
                {
                    start_line.get_or_insert(line);
                    current.push_str(&tag);
                    i += tag.chars().count();
                    dollar_tag = tag;
                    state = State::Dollar;
                    opened_at = line;
                    continue;
                } else if !c.is_whitespace() {
                    start_line.get_or_insert(line);
                }
            }
            State::Quoted(quote) => {
                if c == '\\' && quote != '`' {
                    current.push(c);
                    if let Some(escaped) = next {
                        if escaped == '\n' {
                            line += 1;
                        }
                        current.push(escaped);
                    }
                    i += 2;
                    continue;
                }
                if c == quote {
                    if next == Some(quote) {
                        current.push(c);
                        current.push(quote);
                        i += 2;
                        continue;
                    }
                    state = State::Normal;
                }
            }
            State::LineComment => {
                if c == '\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment => {
                if c == '*' && next == Some('/') {
                    current.push_str("*/");
                    state = State::Normal;
                    i += 2;
                    continue;
                }
            }
            State::Dollar => {
                if c == '$' && starts_with_at(&chars, i, &dollar_tag) {
                    current.push_str(&dollar_tag);
                    i += dollar_tag.chars().count();
                    state = State::Normal;
                    continue;
                }
            }
        }

        current.push(c);
        i += 1;
    }

    match state {
        State::Quoted(_) => Err((opened_at, "string literal")),
        State::BlockComment => Err((opened_at, "block comment")),
        State::Dollar => Err((opened_at, "dollar-quoted string")),
        State::Normal | State::LineComment => {
            flush(&mut pieces, &mut current, &mut start_line);
            Ok(pieces)
        }
    }
}

fn flush(pieces: &mut Vec<Piece>, current: &mut String, start_line: &mut Option<usize>) {
    let text = current.trim();
    if let Some(line) = start_line.take()
        && !text.is_empty()
    {
        pieces.push(Piece {
            text: text.to_string(),
            line
        });
    }
    current.clear();
}

/// `$tag$` or `$$` opening at `i`
fn dollar_tag_at(chars: &[char], i: usize) -> Option<String> {
    let mut j = i + 1;
    while j < chars.len() && (chars[j].is_alphanumeric() || chars[j] == '_') {
        j += 1;
    }
    if chars.get(j) != Some(&'$') {
        return None;
    }
    // `$1` is a positional parameter, not a tag
    if chars.get(i + 1).is_some_and(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(chars[i..=j].iter().collect())
}

fn starts_with_at(chars: &[char], i: usize, needle: &str) -> bool {
    needle
        .chars()
        .enumerate()
        .all(|(k, c)| chars.get(i + k) == Some(&c))
}
