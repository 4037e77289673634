//! Query annotation parsing.
//!
//! Queries are recognized by their leading comment: `/* name: Ident :cmd */`
//! or `-- name: Ident :cmd`. The parser always fails on malformed input;
//! deciding to skip statements with no annotation at all is the caller's
//! business.

use crate::error::{AnalyzeError, ErrorKind, Span};
use crate::ir::CmdKind;
use crate::source::CommentSyntax;

/// Whether a comment carries a `name:` marker and should be treated as a
/// query annotation at all.
pub(crate) fn has_name_marker(comment: &str, syntax: CommentSyntax) -> bool {
    match strip_delimiters(comment, syntax) {
        Some(body) => marker_rest(body).is_some(),
        None => false,
    }
}

/// Parse `name: <Ident> :<cmd>` out of a leading comment.
pub(crate) fn parse(
    comment: &str,
    syntax: CommentSyntax,
    line: usize,
) -> Result<(String, CmdKind), AnalyzeError> {
    let bad = |message: String| {
        AnalyzeError::new(ErrorKind::BadAnnotation, message).with_span(Span::at(line, 1))
    };

    let body = strip_delimiters(comment, syntax)
        .ok_or_else(|| bad(format!("malformed comment: {comment}")))?;

    let rest = marker_rest(body).ok_or_else(|| {
        bad("query annotation must start with 'name:'".to_string())
    })?;

    let rest = rest.trim_start();
    let name_len = ident_len(rest);
    if name_len == 0 {
        return Err(bad("query annotation is missing a name".to_string()));
    }
    let name = &rest[..name_len];
    let rest = rest[name_len..].trim_start();

    let rest = rest
        .strip_prefix(':')
        .ok_or_else(|| bad(format!("expected ':cmd' after query name '{name}'")))?;
    let (cmd_word, rest) = match rest.find(char::is_whitespace) {
        Some(i) => (&rest[..i], rest[i..].trim()),
        None => (rest, ""),
    };
    let cmd: CmdKind = cmd_word
        .parse()
        .map_err(|e: AnalyzeError| bad(e.message))?;

    if !rest.is_empty() {
        return Err(bad(format!(
            "unexpected trailing content in query annotation: '{rest}'"
        )));
    }

    Ok((name.to_string(), cmd))
}

fn strip_delimiters(comment: &str, syntax: CommentSyntax) -> Option<&str> {
    let comment = comment.trim();
    match syntax {
        CommentSyntax::Line => comment.strip_prefix("--"),
        CommentSyntax::Block => comment.strip_prefix("/*")?.strip_suffix("*/"),
    }
}

/// If the body opens with the `name:` marker, return everything after it
fn marker_rest(body: &str) -> Option<&str> {
    body.trim_start()
        .strip_prefix("name")?
        .trim_start()
        .strip_prefix(':')
}

/// Length of a leading `[A-Za-z_][A-Za-z0-9_]*` identifier
fn ident_len(s: &str) -> usize {
    let mut len = 0;
    for (i, c) in s.char_indices() {
        let ok = if i == 0 {
            c.is_ascii_alphabetic() || c == '_'
        } else {
            c.is_ascii_alphanumeric() || c == '_'
        };
        if !ok {
            break;
        }
        len = i + c.len_utf8();
    }
    len
}
