//! The diagnostic sink.
//!
//! Per this crate's error-handling design, semantic errors found while
//! checking statements are never propagated as `Result` — the checker
//! keeps traversing after an error so it can report as many problems
//! as possible in one pass, matching the reference checker's
//! `error(node, ...)` calls which return `void` and never abort
//! `check_stmt`.

use std::fmt;

use crate::ast::NodeId;
use crate::pos::Pos;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub pos: Pos,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.pos, self.message)
    }
}

#[derive(Debug, Default)]
pub struct DiagnosticSink {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, pos: Pos, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            pos,
            message: message.into(),
        });
    }

    /// Convenience for call sites that have a [`NodeId`] but resolve
    /// its position via the caller's own `Ast`; the position is
    /// supplied directly since `DiagnosticSink` does not borrow the
    /// `Ast`.
    pub fn error_at(&mut self, pos: Pos, node: NodeId, message: impl fmt::Display) {
        let _ = node;
        self.error(pos, message.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn messages(&self) -> Vec<String> {
        self.diagnostics.iter().map(|d| d.message.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_accumulate_without_aborting() {
        let mut sink = DiagnosticSink::new();
        sink.error(Pos::synthetic(), "first");
        sink.error(Pos::synthetic(), "second");
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.messages(), vec!["first", "second"]);
    }

    #[test]
    fn empty_sink_reports_empty() {
        let sink = DiagnosticSink::new();
        assert!(sink.is_empty());
    }
}
