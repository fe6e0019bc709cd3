//! Injection-safe quoting of text for the two literal contexts the
//! adapter emits into: Sphinx extended-query-syntax string literals
//! (double quoted) and SphinxQL statement literals (single quoted).
//!
//! Sphinx requires only that backslash and the quote character be
//! escaped; we escape both quote characters regardless of context so
//! a literal survives being nested inside the other context.

fn escape_with(text: &str, quote: char) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push(quote);
    for c in text.chars() {
        if c == '\\' || c == '\'' || c == '"' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push(quote);
    out
}

/// Quote `text` as a string literal inside a compiled full-text query.
pub fn escape_query_literal(text: &str) -> String {
    escape_with(text, '"')
}

/// Quote `text` as a string literal inside a SphinxQL statement.
pub fn escape_statement_literal(text: &str) -> String {
    escape_with(text, '\'')
}

/// Largest prefix length of `s` that is at most `max` bytes and falls
/// on a char boundary.
pub(crate) fn floor_char_boundary(s: &str, max: usize) -> usize {
    if max >= s.len() {
        return s.len();
    }
    (0..=max).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0)
}
