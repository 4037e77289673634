//! Source-level SQL segmentation.
//!
//! Splits a SQL file into statements by semicolons, respecting string
//! literals, quoted identifiers, dollar-quoted strings, and comments, while
//! tracking line numbers and capturing the comments immediately preceding
//! each statement (where query annotations live).

/// Which comment syntax a query annotation uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentSyntax {
    /// `-- name: Ident :cmd`
    Line,
    /// `/* name: Ident :cmd */`
    Block,
}

/// A comment found immediately before a statement, delimiters included
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeadingComment {
    pub syntax: CommentSyntax,
    pub text: String,
    pub line: usize,
}

/// A raw statement plus its leading comments and source position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStatement<'a> {
    pub text: &'a str,
    /// 1-indexed line the statement starts on
    pub start_line: usize,
    /// 1-indexed line the statement ends on
    pub end_line: usize,
    pub leading: Vec<LeadingComment>,
}

/// Split SQL text into statements with their leading comments.
///
/// A blank line between a comment and the following statement detaches the
/// comment: only comments on the line(s) immediately preceding a statement
/// are attached to it.
pub fn split_statements(sql: &str) -> Vec<RawStatement<'_>> {
    let bytes = sql.as_bytes();
    let len = bytes.len();

    let mut statements = Vec::new();
    let mut pending: Vec<LeadingComment> = Vec::new();
    let mut newlines_since_comment = 0usize;

    let mut i = 0;
    let mut line = 1;
    // (byte offset, start line) of the statement being scanned, if any
    let mut stmt: Option<(usize, usize)> = None;

    while i < len {
        if stmt.is_none() {
            match bytes[i] {
                b'\n' => {
                    line += 1;
                    i += 1;
                    if !pending.is_empty() {
                        newlines_since_comment += 1;
                        if newlines_since_comment >= 2 {
                            pending.clear();
                        }
                    }
                }
                c if c.is_ascii_whitespace() => {
                    i += 1;
                }
                b'-' if i + 1 < len && bytes[i + 1] == b'-' => {
                    let start = i;
                    while i < len && bytes[i] != b'\n' {
                        i += 1;
                    }
                    pending.push(LeadingComment {
                        syntax: CommentSyntax::Line,
                        text: sql[start..i].to_string(),
                        line,
                    });
                    newlines_since_comment = 0;
                }
                b'/' if i + 1 < len && bytes[i + 1] == b'*' => {
                    let start = i;
                    let start_line = line;
                    i += 2;
                    while i + 1 < len && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                        if bytes[i] == b'\n' {
                            line += 1;
                        }
                        i += 1;
                    }
                    i = (i + 2).min(len);
                    pending.push(LeadingComment {
                        syntax: CommentSyntax::Block,
                        text: sql[start..i].to_string(),
                        line: start_line,
                    });
                    newlines_since_comment = 0;
                }
                _ => {
                    stmt = Some((i, line));
                }
            }
            continue;
        }

        match bytes[i] {
            b'\'' | b'"' | b'`' => {
                let quote = bytes[i];
                i += 1;
                while i < len {
                    if bytes[i] == b'\n' {
                        line += 1;
                        i += 1;
                    } else if bytes[i] == b'\\' && quote != b'`' {
                        i = (i + 2).min(len);
                    } else if bytes[i] == quote {
                        i += 1;
                        // doubled quote stays inside the literal
                        if i < len && bytes[i] == quote {
                            i += 1;
                        } else {
                            break;
                        }
                    } else {
                        i += 1;
                    }
                }
            }
            b'$' => {
                if let Some(tag_end) = find_dollar_tag_end(sql, i) {
                    let tag = &sql[i..=tag_end];
                    i = tag_end + 1;
                    match sql[i..].find(tag) {
                        Some(close) => {
                            line += sql[i..i + close + tag.len()].matches('\n').count();
                            i += close + tag.len();
                        }
                        None => {
                            // unterminated, consume the rest
                            line += sql[i..].matches('\n').count();
                            i = len;
                        }
                    }
                } else {
                    i += 1;
                }
            }
            b'-' if i + 1 < len && bytes[i + 1] == b'-' => {
                while i < len && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if i + 1 < len && bytes[i + 1] == b'*' => {
                i += 2;
                while i + 1 < len && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    if bytes[i] == b'\n' {
                        line += 1;
                    }
                    i += 1;
                }
                i = (i + 2).min(len);
            }
            b';' => {
                let (start, start_line) = stmt.take().unwrap();
                statements.push(RawStatement {
                    text: &sql[start..i],
                    start_line,
                    end_line: line,
                    leading: std::mem::take(&mut pending),
                });
                i += 1;
            }
            b'\n' => {
                line += 1;
                i += 1;
            }
            _ => {
                i += 1;
            }
        }
    }

    // final statement without a trailing semicolon
    if let Some((start, start_line)) = stmt {
        if !sql[start..].trim().is_empty() {
            statements.push(RawStatement {
                text: &sql[start..],
                start_line,
                end_line: line,
                leading: std::mem::take(&mut pending),
            });
        }
    }

    statements
}

/// Find the end of a dollar-quote tag starting at `start`.
/// Returns the index of the closing `$` if a valid tag is found.
fn find_dollar_tag_end(sql: &str, start: usize) -> Option<usize> {
    let bytes = sql.as_bytes();
    let len = bytes.len();
    let mut i = start + 1;
    if i < len && bytes[i] == b'$' {
        return Some(i); // $$ tag
    }
    while i < len && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
        i += 1;
    }
    if i < len && bytes[i] == b'$' {
        Some(i)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_semicolons() {
        let sql = "CREATE TABLE a (id INT); CREATE TABLE b (id INT);";
        let stmts = split_statements(sql);
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[0].text, "CREATE TABLE a (id INT)");
    }

    #[test]
    fn preserves_string_literals() {
        let sql = "SELECT 'hello; world'; CREATE TABLE t (id INT);";
        let stmts = split_statements(sql);
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].text.contains("hello; world"));
    }

    #[test]
    fn captures_leading_comments() {
        let sql = "/* name: GetAll :many */\nSELECT * FROM users;";
        let stmts = split_statements(sql);
        assert_eq!(stmts.len(), 1);
        assert_eq!(stmts[0].leading.len(), 1);
        assert_eq!(stmts[0].leading[0].syntax, CommentSyntax::Block);
        assert_eq!(stmts[0].leading[0].text, "/* name: GetAll :many */");
        assert_eq!(stmts[0].start_line, 2);
    }

    #[test]
    fn captures_line_comments() {
        let sql = "-- name: GetAll :many\nSELECT * FROM users;";
        let stmts = split_statements(sql);
        assert_eq!(stmts[0].leading.len(), 1);
        assert_eq!(stmts[0].leading[0].syntax, CommentSyntax::Line);
        assert_eq!(stmts[0].leading[0].line, 1);
    }

    #[test]
    fn blank_line_detaches_comment() {
        let sql = "-- stray remark\n\n\nSELECT * FROM users;";
        let stmts = split_statements(sql);
        assert_eq!(stmts.len(), 1);
        assert!(stmts[0].leading.is_empty());
    }

    #[test]
    fn tracks_statement_lines() {
        let sql = "SELECT 1;\n\n-- name: Second :one\nSELECT 2\nFROM users;";
        let stmts = split_statements(sql);
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[0].start_line, 1);
        assert_eq!(stmts[1].start_line, 4);
        assert_eq!(stmts[1].end_line, 5);
    }

    #[test]
    fn last_statement_without_semicolon() {
        let sql = "-- name: GetAll :many\nSELECT * FROM users";
        let stmts = split_statements(sql);
        assert_eq!(stmts.len(), 1);
        assert_eq!(stmts[0].leading.len(), 1);
    }

    #[test]
    fn dollar_quoted_semicolon_does_not_split() {
        let sql = "CREATE FUNCTION f() AS $$ BEGIN; END; $$ LANGUAGE x; SELECT 1;";
        let stmts = split_statements(sql);
        assert_eq!(stmts.len(), 2);
    }
}
