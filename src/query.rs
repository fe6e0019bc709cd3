//! Boolean query compiler
//!
//! Translates a nested AND/OR/NOT/field-match expression, delivered as
//! a stream of begin-group / match / end-group calls, into one string
//! in Sphinx extended query syntax.  The compiler keeps an explicit
//! operator stack mirroring the nesting depth; the compiled string has
//! balanced parentheses by construction.

use crate::escape::escape_query_literal;
use crate::types::SearchField;

/// Boolean operators of the expression tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
    Not,
}

/// Push-down interface for building a search expression.
///
/// Callers walk their expression tree depth-first, calling
/// `begin_group`/`end_group` around every boolean node and
/// `match_field` for every leaf.  Every `begin_group` must be paired
/// with an `end_group` of the same operator.
pub trait SearchBuilder {
    fn begin_group(&mut self, op: BoolOp);

    /// Add a field-match leaf.  `text` of `None` contributes no match
    /// literal but still advances sibling positioning inside the
    /// current group.
    fn match_field(&mut self, field: SearchField, text: Option<&str>);

    fn end_group(&mut self, op: BoolOp);
}

struct OpFrame {
    op: BoolOp,
    /// Number of children emitted so far for this group.
    child_idx: u32,
}

/// Compiles builder calls into Sphinx extended query syntax.
pub struct QueryCompiler {
    query: String,
    stack: Vec<OpFrame>,
    nmatches: u32,
    exclude_odd_headers: bool,
}

impl QueryCompiler {
    /// `exclude_odd_headers` restricts unqualified (`Any`) matches to
    /// the well-known header columns plus the body instead of every
    /// indexed column, which is closer to what users expect from a
    /// plain text search.
    pub fn new(exclude_odd_headers: bool) -> Self {
        Self {
            query: String::new(),
            stack: Vec::new(),
            nmatches: 0,
            exclude_odd_headers,
        }
    }

    /// Emit the separator a new child needs at its position in the
    /// enclosing group, and count it.
    fn begin_child(&mut self) {
        if let Some(top) = self.stack.last_mut() {
            // Operator precedence in the Sphinx text query language is
            // not what you would expect, so over-compensate by always
            // parenthesizing every group.
            if top.child_idx == 0 {
                self.query.push('(');
            } else if top.op == BoolOp::And {
                self.query.push(' ');
            } else {
                self.query.push('|');
            }
            top.child_idx += 1;
        }
    }

    /// Number of real (non-absent) match leaves seen so far.
    pub fn match_count(&self) -> u32 {
        self.nmatches
    }

    /// Take the compiled expression.  All groups must be closed.
    pub fn finalize(&mut self) -> String {
        debug_assert!(self.stack.is_empty(), "finalize with open groups");
        std::mem::take(&mut self.query)
    }
}

impl SearchBuilder for QueryCompiler {
    fn begin_group(&mut self, op: BoolOp) {
        self.begin_child();

        if op == BoolOp::Not {
            self.query.push('!');
        }

        self.stack.push(OpFrame { op, child_idx: 0 });
    }

    fn match_field(&mut self, field: SearchField, text: Option<&str>) {
        self.begin_child();

        if text.is_some() {
            self.nmatches += 1;
        }

        if let Some(column) = field.column() {
            self.query.push('@');
            self.query.push_str(column);
            self.query.push(' ');
        } else if self.exclude_odd_headers {
            // Restrict the unqualified match to the named header
            // columns and the body, leaving out the catch-all headers
            // column.
            let mut sep = '(';
            self.query.push('@');
            for f in SearchField::ALL {
                if f == SearchField::Headers {
                    continue;
                }
                if let Some(column) = f.column() {
                    self.query.push(sep);
                    self.query.push_str(column);
                    sep = ',';
                }
            }
            self.query.push_str(") ");
        }

        if let Some(text) = text {
            self.query.push_str(&escape_query_literal(text));
        }
    }

    fn end_group(&mut self, _op: BoolOp) {
        if let Some(frame) = self.stack.pop() {
            if frame.child_idx != 0 {
                self.query.push(')');
            }
        }
    }
}
