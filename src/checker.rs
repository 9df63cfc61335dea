#![allow(dead_code)]

//! Per-function driver: decides whether a function is worth analyzing at
//! all, runs the interpreter, and turns its raw [`Exit`] values into
//! [`Diagnostic`] records.

use crate::ast::FuncDef;
use crate::catalog::LockCatalog;
use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::explorer::{Exit, ExplorationContext};
use crate::interpreter::PathInterpreter;

pub(crate) struct FunctionChecker<'c> {
    catalog: &'c LockCatalog,
    file: String,
}

impl<'c> FunctionChecker<'c> {
    pub(crate) fn new(catalog: &'c LockCatalog, file: impl Into<String>) -> Self {
        Self {
            catalog,
            file: file.into(),
        }
    }

    /// Checks one function, returning every diagnostic its paths produced.
    /// A function whose body never calls a catalog acquire/release function
    /// is skipped entirely: it cannot possibly be unbalanced.
    #[tracing::instrument(level = "debug", skip_all, fields(file = %self.file, function = %func.name))]
    pub(crate) fn check(&self, func: &FuncDef) -> Vec<Diagnostic> {
        if !body_mentions_catalog(&func.body, self.catalog) {
            tracing::debug!("skipping: no catalog-relevant call");
            return Vec::new();
        }

        let interp = PathInterpreter::new(self.catalog, &func.body);
        let ctx = ExplorationContext::new(self.catalog.len());
        let exits = interp.run(ctx, &func.body);
        tracing::debug!(path_count = exits.len(), "explored");

        exits
            .into_iter()
            .filter_map(|exit| self.classify(func, exit))
            .collect()
    }

    fn classify(&self, func: &FuncDef, exit: Exit) -> Option<Diagnostic> {
        match exit {
            Exit::NoError => None,
            Exit::Return(state) => (!state.balanced()).then(|| {
                self.diagnostic(func, DiagnosticKind::Return, "lock state unbalanced at return", state.snapshot())
            }),
            Exit::Forbidden(state) => Some(self.diagnostic(
                func,
                DiagnosticKind::Forbidden,
                "lock acquired or released while evaluating a condition",
                state.snapshot(),
            )),
            Exit::Fallthrough(ctx) => {
                // A path that is still mid-goto-skip at function exit never
                // reached its target label; that is a lowering-time concern
                // (an unresolved goto), not a balance finding to surface here.
                if ctx.ignore_until.is_some() {
                    return None;
                }
                (!ctx.state.balanced()).then(|| {
                    self.diagnostic(
                        func,
                        DiagnosticKind::EndOfFunction,
                        "lock state unbalanced at end of function",
                        ctx.state.snapshot(),
                    )
                })
            }
            // `break`/`continue` reaching the function root with no enclosing
            // loop or switch left to catch them is a malformed-AST condition,
            // not a lock-balance finding: surface it, but flagged distinctly.
            Exit::Break(ctx) => Some(self.diagnostic(
                func,
                DiagnosticKind::Internal,
                "`break` with no enclosing loop or switch",
                ctx.state.snapshot(),
            )),
            Exit::Continue(ctx) => Some(self.diagnostic(
                func,
                DiagnosticKind::Internal,
                "`continue` with no enclosing loop",
                ctx.state.snapshot(),
            )),
        }
    }

    fn diagnostic(&self, func: &FuncDef, kind: DiagnosticKind, reason: &str, state_snapshot: Vec<i64>) -> Diagnostic {
        Diagnostic {
            file: self.file.clone(),
            function: func.name.clone(),
            kind,
            reason: reason.to_string(),
            state_snapshot,
        }
    }
}

fn body_mentions_catalog(body: &crate::ast::Stmt, catalog: &LockCatalog) -> bool {
    crate::interpreter::stmt_contains_catalog_call(body, catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expr, Stmt, StmtKind, assign_node_ids};

    fn stmt(kind: StmtKind) -> Stmt {
        Stmt { id: 0, kind }
    }

    fn call(name: &str) -> Expr {
        Expr::Call(Box::new(Expr::Identifier(name.to_string())), vec![])
    }

    fn func(mut body: Stmt) -> FuncDef {
        let mut next = 0;
        assign_node_ids(&mut body, &mut next);
        FuncDef {
            name: "example".to_string(),
            body,
        }
    }

    #[test]
    fn functions_without_catalog_calls_are_skipped() {
        let catalog = LockCatalog::default_catalog();
        let checker = FunctionChecker::new(&catalog, "ex.c");
        let f = func(stmt(StmtKind::Compound(vec![stmt(StmtKind::Return(None))])));
        assert!(checker.check(&f).is_empty());
    }

    #[test]
    fn unbalanced_end_of_function_is_reported() {
        let catalog = LockCatalog::default_catalog();
        let checker = FunctionChecker::new(&catalog, "ex.c");
        let f = func(stmt(StmtKind::Compound(vec![stmt(StmtKind::Expr(Some(call("splraise"))))])));
        let diagnostics = checker.check(&f);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::EndOfFunction);
    }

    #[test]
    fn balanced_function_yields_no_diagnostics() {
        let catalog = LockCatalog::default_catalog();
        let checker = FunctionChecker::new(&catalog, "ex.c");
        let f = func(stmt(StmtKind::Compound(vec![
            stmt(StmtKind::Expr(Some(call("splraise")))),
            stmt(StmtKind::Expr(Some(call("spllower")))),
        ])));
        assert!(checker.check(&f).is_empty());
    }
}
