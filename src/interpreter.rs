#![allow(dead_code)]

//! Path-sensitive interpretation of one function body.
//!
//! Splits never clone the AST: the remainder of an enclosing statement
//! sequence is represented as `Cont`, a vector of borrowed statement
//! references, and only `ExplorationContext` is duplicated per sibling (see
//! `explorer`). `PathInterpreter::run` drives the whole walk and returns the
//! union of every path's [`Exit`].

use std::collections::HashMap;

use crate::ast::{CaseLabel, Expr, ForInit, NodeId, Stmt, StmtKind, SwitchCase, collect_label_ids};
use crate::catalog::{CallEffect, LockCatalog};
use crate::explorer::{Branch, BranchExplorer, Exit, ExplorationContext};
use crate::render::render_expr;

/// The statements still to visit after the node currently being processed,
/// borrowed from the one owned function body for the lifetime of a single
/// `PathInterpreter::run` call.
type Cont<'a> = Vec<&'a Stmt>;

/// Outcome of evaluating a (sub)expression in isolation: the context it
/// leaves behind, and `Some(exit)` if evaluating it already terminated the
/// path (a forbidden-position lock call, or a `panic` call).
type ExprOutcome = (ExplorationContext, Option<Exit>);

pub(crate) struct PathInterpreter<'c> {
    catalog: &'c LockCatalog,
    label_ids: HashMap<String, NodeId>,
}

impl<'c> PathInterpreter<'c> {
    pub(crate) fn new(catalog: &'c LockCatalog, body: &Stmt) -> Self {
        let mut label_ids = HashMap::new();
        collect_label_ids(body, &mut label_ids);
        Self { catalog, label_ids }
    }

    pub(crate) fn run(&self, ctx: ExplorationContext, body: &Stmt) -> Vec<Exit> {
        self.visit_seq(ctx, vec![body])
    }

    fn visit_seq<'a>(&self, mut ctx: ExplorationContext, mut seq: Cont<'a>) -> Vec<Exit> {
        loop {
            let Some(&stmt) = seq.first() else {
                return vec![Exit::Fallthrough(ctx)];
            };
            let rest: Cont<'a> = seq[1..].to_vec();
            match &stmt.kind {
                StmtKind::Compound(children) => {
                    let mut spliced: Cont<'a> = children.iter().collect();
                    spliced.extend(rest);
                    seq = spliced;
                }
                StmtKind::Expr(None) => {
                    seq = rest;
                }
                StmtKind::Expr(Some(expr)) => {
                    let outcomes = self.eval_expr(ctx, expr);
                    return self.continue_after(outcomes, rest);
                }
                StmtKind::Return(expr_opt) => {
                    if ctx.ignore_until.is_some() {
                        seq = rest;
                        continue;
                    }
                    let outcomes = match expr_opt {
                        Some(expr) => self.eval_expr(ctx, expr),
                        None => vec![(ctx, None)],
                    };
                    return outcomes
                        .into_iter()
                        .map(|(ctx, exit_opt)| {
                            exit_opt.unwrap_or_else(|| {
                                if ctx.state.balanced() {
                                    Exit::NoError
                                } else {
                                    Exit::Return(ctx.state.clone())
                                }
                            })
                        })
                        .collect();
                }
                StmtKind::Break => {
                    if ctx.ignore_until.is_some() {
                        seq = rest;
                        continue;
                    }
                    return vec![Exit::Break(ctx)];
                }
                StmtKind::Continue => {
                    if ctx.ignore_until.is_some() {
                        seq = rest;
                        continue;
                    }
                    return vec![Exit::Continue(ctx)];
                }
                StmtKind::Goto(name) => {
                    if ctx.ignore_until.is_some() {
                        seq = rest;
                        continue;
                    }
                    let target_is_earlier = self
                        .label_ids
                        .get(name)
                        .map(|&label_id| label_id < stmt.id)
                        .unwrap_or(false);
                    if target_is_earlier {
                        // Backward goto: a real re-entry into a loop body is out of
                        // scope (see the module-level note on unmodeled iteration);
                        // treat it as ending this path without a finding.
                        return vec![Exit::NoError];
                    }
                    ctx.ignore_until = Some(name.clone());
                    seq = rest;
                }
                StmtKind::Label { name, stmt: inner } => {
                    if ctx.ignore_until.as_deref() == Some(name.as_str()) {
                        ctx.ignore_until = None;
                    }
                    let mut spliced: Cont<'a> = vec![inner.as_ref()];
                    spliced.extend(rest);
                    seq = spliced;
                }
                StmtKind::If { .. }
                | StmtKind::Switch { .. }
                | StmtKind::While { .. }
                | StmtKind::DoWhile { .. }
                | StmtKind::For { .. } => {
                    if !self.needs_visit(stmt, &ctx) {
                        seq = rest;
                        continue;
                    }
                    return match &stmt.kind {
                        StmtKind::If {
                            cond,
                            then_branch,
                            else_branch,
                        } => self.visit_if(ctx, cond, then_branch, else_branch.as_deref(), rest),
                        StmtKind::Switch { cond, cases } => self.visit_switch(ctx, cond, cases, rest),
                        StmtKind::While { cond, body } => self.visit_while(ctx, cond, body, rest),
                        StmtKind::DoWhile { body, cond } => self.visit_do_while(ctx, body, cond, rest),
                        StmtKind::For {
                            init,
                            cond,
                            step,
                            body,
                        } => self.visit_for(ctx, init, cond.as_ref(), step.as_ref(), body, rest),
                        _ => unreachable!(),
                    };
                }
            }
        }
    }

    fn continue_after<'a>(&self, outcomes: Vec<ExprOutcome>, rest: Cont<'a>) -> Vec<Exit> {
        outcomes
            .into_iter()
            .flat_map(|(ctx, exit_opt)| match exit_opt {
                Some(exit) => vec![exit],
                None => self.visit_seq(ctx, rest.clone()),
            })
            .collect()
    }

    /// Resumes an enclosing loop or switch from its body's exits. `Break`
    /// always resumes at `rest`; `Continue` only does if `catches_continue`
    /// (true for loops, false for `switch`, which doesn't catch it).
    /// `Fallthrough` resumes at `rest` unless `endless`, in which case
    /// falling off the end of an infinite loop's body ends the path cleanly.
    fn resolve_body_exits<'a>(
        &self,
        body_exits: Vec<Exit>,
        rest: Cont<'a>,
        catches_continue: bool,
        endless: bool,
    ) -> Vec<Exit> {
        body_exits
            .into_iter()
            .flat_map(|exit| match exit {
                Exit::Break(ctx) => self.visit_seq(ctx, rest.clone()),
                Exit::Continue(ctx) if catches_continue => self.visit_seq(ctx, rest.clone()),
                Exit::Fallthrough(ctx) => {
                    if endless {
                        vec![Exit::NoError]
                    } else {
                        self.visit_seq(ctx, rest.clone())
                    }
                }
                other => vec![other],
            })
            .collect()
    }

    fn visit_if<'a>(
        &self,
        mut ctx: ExplorationContext,
        cond: &'a Expr,
        then_branch: &'a Stmt,
        else_branch: Option<&'a Stmt>,
        rest: Cont<'a>,
    ) -> Vec<Exit> {
        ctx.forbidden = true;
        let cond_outcomes = self.eval_expr(ctx, cond);
        let mut results = Vec::new();
        for (mut ctx, exit_opt) in cond_outcomes {
            ctx.forbidden = false;
            if let Some(exit) = exit_opt {
                results.push(exit);
                continue;
            }
            let key = render_expr(cond);
            match ctx.cond_memo.get(&key).copied() {
                Some(true) => {
                    let then_cont = splice(then_branch, &rest);
                    results.extend(self.visit_seq(ctx, then_cont));
                }
                Some(false) => {
                    let else_cont = splice_opt(else_branch, &rest);
                    results.extend(self.visit_seq(ctx, else_cont));
                }
                None => {
                    let mut true_ctx = ctx.clone();
                    true_ctx.cond_memo.insert(key.clone(), true);
                    let mut false_ctx = ctx;
                    false_ctx.cond_memo.insert(key, false);

                    let then_cont = splice(then_branch, &rest);
                    let else_cont = splice_opt(else_branch, &rest);

                    let branches: Vec<Branch<'a>> = vec![
                        Box::new(move || self.visit_seq(true_ctx, then_cont)),
                        Box::new(move || self.visit_seq(false_ctx, else_cont)),
                    ];
                    results.extend(BranchExplorer::explore_all(branches));
                }
            }
        }
        results
    }

    fn visit_switch<'a>(
        &self,
        mut ctx: ExplorationContext,
        cond: &'a Expr,
        cases: &'a [SwitchCase],
        rest: Cont<'a>,
    ) -> Vec<Exit> {
        ctx.forbidden = true;
        let cond_outcomes = self.eval_expr(ctx, cond);
        let mut results = Vec::new();
        for (mut ctx, exit_opt) in cond_outcomes {
            ctx.forbidden = false;
            if let Some(exit) = exit_opt {
                results.push(exit);
                continue;
            }

            let mut branches: Vec<Branch<'a>> = Vec::new();
            // No case selected at all: falls straight through the switch.
            {
                let ctx2 = ctx.clone();
                let rest2 = rest.clone();
                branches.push(Box::new(move || self.visit_seq(ctx2, rest2)));
            }
            for start in 0..cases.len() {
                let mut entered: Cont<'a> = Vec::new();
                for case in &cases[start..] {
                    entered.extend(case.body.iter());
                }
                let ctx2 = ctx.clone();
                let rest2 = rest.clone();
                branches.push(Box::new(move || {
                    let body_exits = self.visit_seq(ctx2, entered);
                    self.resolve_body_exits(body_exits, rest2, false, false)
                }));
            }
            results.extend(BranchExplorer::explore_all(branches));
        }
        results
    }

    fn visit_while<'a>(
        &self,
        mut ctx: ExplorationContext,
        cond: &'a Expr,
        body: &'a Stmt,
        rest: Cont<'a>,
    ) -> Vec<Exit> {
        let endless = cond.constant_truthiness() == Some(true);
        ctx.forbidden = true;
        let cond_outcomes = self.eval_expr(ctx, cond);
        let mut results = Vec::new();
        for (mut ctx, exit_opt) in cond_outcomes {
            ctx.forbidden = false;
            if let Some(exit) = exit_opt {
                results.push(exit);
                continue;
            }
            let skip_ctx = ctx.clone();
            let enter_ctx = ctx;
            let rest_skip = rest.clone();
            let rest_enter = rest.clone();
            let branches: Vec<Branch<'a>> = vec![
                Box::new(move || self.visit_seq(skip_ctx, rest_skip)),
                Box::new(move || {
                    let body_exits = self.visit_seq(enter_ctx, vec![body]);
                    self.resolve_body_exits(body_exits, rest_enter, true, endless)
                }),
            ];
            results.extend(BranchExplorer::explore_all(branches));
        }
        results
    }

    fn visit_do_while<'a>(
        &self,
        ctx: ExplorationContext,
        body: &'a Stmt,
        cond: &'a Expr,
        rest: Cont<'a>,
    ) -> Vec<Exit> {
        let endless = cond.constant_truthiness() == Some(true);
        let body_exits = self.visit_seq(ctx, vec![body]);
        body_exits
            .into_iter()
            .flat_map(|exit| match exit {
                Exit::Break(ctx) => self.visit_seq(ctx, rest.clone()),
                Exit::Continue(ctx) => self.visit_seq(ctx, rest.clone()),
                Exit::Fallthrough(mut ctx) => {
                    ctx.forbidden = true;
                    let cond_outcomes = self.eval_expr(ctx, cond);
                    cond_outcomes
                        .into_iter()
                        .flat_map(|(mut ctx, exit_opt)| {
                            ctx.forbidden = false;
                            if let Some(exit) = exit_opt {
                                return vec![exit];
                            }
                            if endless {
                                vec![Exit::NoError]
                            } else {
                                self.visit_seq(ctx, rest.clone())
                            }
                        })
                        .collect()
                }
                other => vec![other],
            })
            .collect()
    }

    fn visit_for<'a>(
        &self,
        mut ctx: ExplorationContext,
        init: &'a ForInit,
        cond: Option<&'a Expr>,
        step: Option<&'a Expr>,
        body: &'a Stmt,
        rest: Cont<'a>,
    ) -> Vec<Exit> {
        let endless = matches!(init, ForInit::Empty) && cond.is_none() && step.is_none();
        ctx.forbidden = true;
        let mut outcomes = self.eval_for_init(ctx, init);
        if let Some(cond_expr) = cond {
            outcomes = chain_eval(self, outcomes, cond_expr);
        }
        if let Some(step_expr) = step {
            outcomes = chain_eval(self, outcomes, step_expr);
        }

        let mut results = Vec::new();
        for (mut ctx, exit_opt) in outcomes {
            ctx.forbidden = false;
            if let Some(exit) = exit_opt {
                results.push(exit);
                continue;
            }
            let skip_ctx = ctx.clone();
            let enter_ctx = ctx;
            let rest_skip = rest.clone();
            let rest_enter = rest.clone();
            let branches: Vec<Branch<'a>> = vec![
                Box::new(move || self.visit_seq(skip_ctx, rest_skip)),
                Box::new(move || {
                    let body_exits = self.visit_seq(enter_ctx, vec![body]);
                    self.resolve_body_exits(body_exits, rest_enter, true, endless)
                }),
            ];
            results.extend(BranchExplorer::explore_all(branches));
        }
        results
    }

    fn eval_for_init(&self, ctx: ExplorationContext, init: &ForInit) -> Vec<ExprOutcome> {
        match init {
            ForInit::Empty => vec![(ctx, None)],
            ForInit::Expr(expr) => self.eval_expr(ctx, expr),
            ForInit::Declaration(exprs) => {
                let refs: Vec<&Expr> = exprs.iter().collect();
                self.eval_chain(ctx, &refs)
            }
        }
    }

    /// Evaluates one expression, forking on every `Conditional` encountered
    /// (ternary splits exactly like `if`) and ending the path early on a
    /// forbidden-position lock call or a `panic` call.
    fn eval_expr(&self, ctx: ExplorationContext, expr: &Expr) -> Vec<ExprOutcome> {
        match expr {
            Expr::Identifier(_) | Expr::Constant(_) | Expr::Opaque(_) => vec![(ctx, None)],
            Expr::Unary(_, operand) | Expr::Cast(_, operand) => self.eval_expr(ctx, operand),
            Expr::Member { base, .. } => self.eval_expr(ctx, base),
            Expr::Binary(_, lhs, rhs) | Expr::Assign(_, lhs, rhs) | Expr::Index(lhs, rhs) => {
                self.eval_chain(ctx, &[lhs.as_ref(), rhs.as_ref()])
            }
            Expr::Comma(items) => {
                let refs: Vec<&Expr> = items.iter().collect();
                self.eval_chain(ctx, &refs)
            }
            Expr::Conditional(cond, then_expr, else_expr) => {
                let cond_outcomes = self.eval_expr(ctx, cond);
                cond_outcomes
                    .into_iter()
                    .flat_map(|(ctx, exit_opt)| {
                        if exit_opt.is_some() {
                            return vec![(ctx, exit_opt)];
                        }
                        let key = render_expr(cond);
                        match ctx.cond_memo.get(&key).copied() {
                            Some(true) => self.eval_expr(ctx, then_expr),
                            Some(false) => self.eval_expr(ctx, else_expr),
                            None => {
                                let mut true_ctx = ctx.clone();
                                true_ctx.cond_memo.insert(key.clone(), true);
                                let mut false_ctx = ctx;
                                false_ctx.cond_memo.insert(key, false);
                                let mut out = self.eval_expr(true_ctx, then_expr);
                                out.extend(self.eval_expr(false_ctx, else_expr));
                                out
                            }
                        }
                    })
                    .collect()
            }
            Expr::Call(callee, args) => {
                if ctx.ignore_until.is_some() {
                    return vec![(ctx, None)];
                }
                let arg_refs: Vec<&Expr> = args.iter().collect();
                let after_args = self.eval_chain(ctx, &arg_refs);
                after_args
                    .into_iter()
                    .map(|(mut ctx, exit_opt)| {
                        if exit_opt.is_some() {
                            return (ctx, exit_opt);
                        }
                        let Expr::Identifier(name) = callee.as_ref() else {
                            return (ctx, None);
                        };
                        let effect = self.catalog.classify(name);
                        if effect == CallEffect::Panic {
                            return (ctx, Some(Exit::NoError));
                        }
                        let mutated = ctx.state.apply(effect);
                        if mutated && ctx.forbidden {
                            let snapshot = ctx.state.clone();
                            return (ctx, Some(Exit::Forbidden(snapshot)));
                        }
                        (ctx, None)
                    })
                    .collect()
            }
        }
    }

    fn eval_chain(&self, ctx: ExplorationContext, exprs: &[&Expr]) -> Vec<ExprOutcome> {
        let mut pending = vec![(ctx, None)];
        for expr in exprs {
            pending = chain_eval(self, pending, expr);
        }
        pending
    }

    /// Whether a branch/loop construct is worth visiting at all: with no
    /// pending goto, only a subtree actually containing a catalog call can
    /// change the lock state; while skipping forward toward a label, only a
    /// subtree containing that label (or any further goto) matters.
    fn needs_visit(&self, stmt: &Stmt, ctx: &ExplorationContext) -> bool {
        match &ctx.ignore_until {
            Some(target) => stmt_contains_label_or_goto(stmt, target),
            None => stmt_contains_catalog_call(stmt, self.catalog),
        }
    }
}

fn chain_eval<'e>(interp: &PathInterpreter<'_>, pending: Vec<ExprOutcome>, expr: &'e Expr) -> Vec<ExprOutcome> {
    pending
        .into_iter()
        .flat_map(|(ctx, exit_opt)| {
            if exit_opt.is_some() {
                vec![(ctx, exit_opt)]
            } else {
                interp.eval_expr(ctx, expr)
            }
        })
        .collect()
}

fn splice<'a>(head: &'a Stmt, rest: &Cont<'a>) -> Cont<'a> {
    let mut cont = vec![head];
    cont.extend(rest.iter().copied());
    cont
}

fn splice_opt<'a>(head: Option<&'a Stmt>, rest: &Cont<'a>) -> Cont<'a> {
    let mut cont: Cont<'a> = Vec::new();
    if let Some(head) = head {
        cont.push(head);
    }
    cont.extend(rest.iter().copied());
    cont
}

/// Whether any statement in `stmt`'s subtree calls a catalog acquire or
/// release function (or `panic`). Used both to gate `If`/`Switch`/loop
/// visiting inside the interpreter and, at the whole-function granularity,
/// by `checker` to skip functions that cannot possibly be unbalanced.
pub(crate) fn stmt_contains_catalog_call(stmt: &Stmt, catalog: &LockCatalog) -> bool {
    match &stmt.kind {
        StmtKind::Compound(children) => children.iter().any(|c| stmt_contains_catalog_call(c, catalog)),
        StmtKind::Expr(Some(expr)) | StmtKind::Return(Some(expr)) => expr_contains_catalog_call(expr, catalog),
        StmtKind::Expr(None) | StmtKind::Return(None) | StmtKind::Break | StmtKind::Continue | StmtKind::Goto(_) => {
            false
        }
        StmtKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            expr_contains_catalog_call(cond, catalog)
                || stmt_contains_catalog_call(then_branch, catalog)
                || else_branch
                    .as_ref()
                    .is_some_and(|e| stmt_contains_catalog_call(e, catalog))
        }
        StmtKind::Switch { cond, cases } => {
            expr_contains_catalog_call(cond, catalog)
                || cases.iter().any(|case| {
                    (matches!(&case.label, CaseLabel::Case(e) if expr_contains_catalog_call(e, catalog)))
                        || case.body.iter().any(|s| stmt_contains_catalog_call(s, catalog))
                })
        }
        StmtKind::While { cond, body } => {
            expr_contains_catalog_call(cond, catalog) || stmt_contains_catalog_call(body, catalog)
        }
        StmtKind::DoWhile { body, cond } => {
            stmt_contains_catalog_call(body, catalog) || expr_contains_catalog_call(cond, catalog)
        }
        StmtKind::For {
            init,
            cond,
            step,
            body,
        } => {
            for_init_contains_catalog_call(init, catalog)
                || cond.as_ref().is_some_and(|c| expr_contains_catalog_call(c, catalog))
                || step.as_ref().is_some_and(|s| expr_contains_catalog_call(s, catalog))
                || stmt_contains_catalog_call(body, catalog)
        }
        StmtKind::Label { stmt, .. } => stmt_contains_catalog_call(stmt, catalog),
    }
}

fn for_init_contains_catalog_call(init: &ForInit, catalog: &LockCatalog) -> bool {
    match init {
        ForInit::Empty => false,
        ForInit::Expr(e) => expr_contains_catalog_call(e, catalog),
        ForInit::Declaration(exprs) => exprs.iter().any(|e| expr_contains_catalog_call(e, catalog)),
    }
}

fn expr_contains_catalog_call(expr: &Expr, catalog: &LockCatalog) -> bool {
    match expr {
        Expr::Identifier(_) | Expr::Constant(_) | Expr::Opaque(_) => false,
        Expr::Call(callee, args) => {
            let is_relevant = matches!(callee.as_ref(), Expr::Identifier(name) if catalog.is_catalog_name(name) || name == "panic");
            is_relevant || args.iter().any(|a| expr_contains_catalog_call(a, catalog))
        }
        Expr::Conditional(cond, then_expr, else_expr) => {
            expr_contains_catalog_call(cond, catalog)
                || expr_contains_catalog_call(then_expr, catalog)
                || expr_contains_catalog_call(else_expr, catalog)
        }
        Expr::Binary(_, lhs, rhs) | Expr::Assign(_, lhs, rhs) | Expr::Index(lhs, rhs) => {
            expr_contains_catalog_call(lhs, catalog) || expr_contains_catalog_call(rhs, catalog)
        }
        Expr::Unary(_, operand) | Expr::Cast(_, operand) => expr_contains_catalog_call(operand, catalog),
        Expr::Member { base, .. } => expr_contains_catalog_call(base, catalog),
        Expr::Comma(items) => items.iter().any(|i| expr_contains_catalog_call(i, catalog)),
    }
}

fn stmt_contains_label_or_goto(stmt: &Stmt, target: &str) -> bool {
    match &stmt.kind {
        StmtKind::Label { name, stmt: inner } => name == target || stmt_contains_label_or_goto(inner, target),
        StmtKind::Goto(_) => true,
        StmtKind::Compound(children) => children.iter().any(|c| stmt_contains_label_or_goto(c, target)),
        StmtKind::If {
            then_branch,
            else_branch,
            ..
        } => {
            stmt_contains_label_or_goto(then_branch, target)
                || else_branch.as_ref().is_some_and(|e| stmt_contains_label_or_goto(e, target))
        }
        StmtKind::Switch { cases, .. } => cases
            .iter()
            .any(|case| case.body.iter().any(|s| stmt_contains_label_or_goto(s, target))),
        StmtKind::While { body, .. } | StmtKind::DoWhile { body, .. } | StmtKind::For { body, .. } => {
            stmt_contains_label_or_goto(body, target)
        }
        StmtKind::Expr(_) | StmtKind::Return(_) | StmtKind::Break | StmtKind::Continue => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinOp, Constant, assign_node_ids};

    fn stmt(kind: StmtKind) -> Stmt {
        Stmt { id: 0, kind }
    }

    fn ident(name: &str) -> Expr {
        Expr::Identifier(name.to_string())
    }

    fn call(name: &str) -> Expr {
        Expr::Call(Box::new(ident(name)), vec![])
    }

    fn catalog() -> LockCatalog {
        LockCatalog::default_catalog()
    }

    fn run_body(mut body: Stmt) -> Vec<Exit> {
        let mut next = 0;
        assign_node_ids(&mut body, &mut next);
        let catalog = catalog();
        let interp = PathInterpreter::new(&catalog, &body);
        interp.run(ExplorationContext::new(catalog.len()), &body)
    }

    /// Acquire and release in straight-line code balances: one clean exit.
    #[test]
    fn straight_line_acquire_release_balances() {
        let body = stmt(StmtKind::Compound(vec![
            stmt(StmtKind::Expr(Some(call("splraise")))),
            stmt(StmtKind::Expr(Some(call("spllower")))),
        ]));
        let exits = run_body(body);
        assert!(matches!(exits.as_slice(), [Exit::NoError]));
    }

    /// `if (cond) splraise(...);` with no matching release anywhere: the
    /// then-branch and the implicit empty else-branch must both be explored,
    /// producing two separate paths (one unbalanced, one balanced).
    #[test]
    fn if_with_call_in_then_branch_splits_into_two_paths() {
        let body = stmt(StmtKind::Compound(vec![stmt(StmtKind::If {
            cond: ident("cond"),
            then_branch: Box::new(stmt(StmtKind::Expr(Some(call("splraise"))))),
            else_branch: None,
        })]));
        let exits = run_body(body);
        assert_eq!(exits.len(), 2);
        let noerror_count = exits.iter().filter(|e| matches!(e, Exit::NoError)).count();
        assert_eq!(noerror_count, 1);
    }

    /// A lock held across a `return` is reported via `Exit::Return` with a
    /// non-zero state, never silently dropped.
    #[test]
    fn lock_held_across_return_is_reported() {
        let body = stmt(StmtKind::Compound(vec![
            stmt(StmtKind::Expr(Some(call("mtx_enter")))),
            stmt(StmtKind::Return(None)),
        ]));
        let exits = run_body(body);
        assert!(matches!(exits.as_slice(), [Exit::Return(state)] if state.snapshot() == vec![0, 0, 1]));
    }

    /// `panic()` ends the path cleanly regardless of outstanding locks.
    #[test]
    fn panic_silences_unbalanced_state() {
        let body = stmt(StmtKind::Compound(vec![
            stmt(StmtKind::Expr(Some(call("splraise")))),
            stmt(StmtKind::Expr(Some(call("panic")))),
        ]));
        let exits = run_body(body);
        assert!(matches!(exits.as_slice(), [Exit::NoError]));
    }

    /// Releasing a lock already in a forbidden condition position (acquiring
    /// inside an `if` condition) is reported at the call site, not deferred.
    #[test]
    fn acquire_in_condition_is_forbidden() {
        let body = stmt(StmtKind::Compound(vec![stmt(StmtKind::If {
            cond: Expr::Binary(BinOp::Ne, Box::new(call("splraise")), Box::new(Expr::Constant(Constant::Integer("0".to_string())))),
            then_branch: Box::new(stmt(StmtKind::Expr(None))),
            else_branch: None,
        })]));
        let exits = run_body(body);
        assert!(exits.iter().any(|e| matches!(e, Exit::Forbidden(_))));
    }

    /// A forward goto skips straight to its label, bypassing everything in
    /// between (including, here, a release that would otherwise balance it).
    #[test]
    fn forward_goto_skips_intervening_release() {
        let body = stmt(StmtKind::Compound(vec![
            stmt(StmtKind::Expr(Some(call("mtx_enter")))),
            stmt(StmtKind::Goto("out".to_string())),
            stmt(StmtKind::Expr(Some(call("mtx_leave")))),
            stmt(StmtKind::Label {
                name: "out".to_string(),
                stmt: Box::new(stmt(StmtKind::Return(None))),
            }),
        ]));
        let exits = run_body(body);
        assert!(matches!(exits.as_slice(), [Exit::Return(state)] if state.snapshot() == vec![0, 0, 1]));
    }

    /// `break` inside a `while` resumes after the loop, not at function exit.
    #[test]
    fn break_in_while_resumes_after_loop() {
        let body = stmt(StmtKind::Compound(vec![
            stmt(StmtKind::While {
                cond: ident("cond"),
                body: Box::new(stmt(StmtKind::Compound(vec![
                    stmt(StmtKind::Expr(Some(call("mtx_enter")))),
                    stmt(StmtKind::Break),
                ]))),
            }),
            stmt(StmtKind::Expr(Some(call("mtx_leave")))),
        ]));
        let exits = run_body(body);
        assert!(exits.iter().any(|e| matches!(e, Exit::NoError)));
    }

    /// A lock operation in a `while` condition is forbidden regardless of
    /// whether the loop body ever runs (spec.md §8 scenario 4, `While` form).
    #[test]
    fn acquire_in_while_condition_is_forbidden() {
        let body = stmt(StmtKind::Compound(vec![stmt(StmtKind::While {
            cond: call("splraise"),
            body: Box::new(stmt(StmtKind::Compound(vec![]))),
        })]));
        let exits = run_body(body);
        assert!(exits.iter().any(|e| matches!(e, Exit::Forbidden(_))));
    }

    /// A lock operation in a `for` condition is forbidden the same way as in
    /// a `while` condition; the init/step slots carry the same rule.
    #[test]
    fn acquire_in_for_condition_is_forbidden() {
        let body = stmt(StmtKind::Compound(vec![stmt(StmtKind::For {
            init: ForInit::Empty,
            cond: Some(call("mtx_enter")),
            step: None,
            body: Box::new(stmt(StmtKind::Compound(vec![]))),
        })]));
        let exits = run_body(body);
        assert!(exits.iter().any(|e| matches!(e, Exit::Forbidden(_))));
    }

    /// `switch` fallthrough: entering at `case 1` releases the lock acquired
    /// before the switch and falls through `case 2`'s `break` cleanly; entering
    /// directly at `case 2` (or matching no case at all) never runs the
    /// release, leaving the lock held (spec.md §8 scenario 5).
    #[test]
    fn switch_fallthrough_balances_only_through_case_one() {
        let cases = vec![
            SwitchCase {
                label: CaseLabel::Case(Expr::Constant(Constant::Integer("1".to_string()))),
                body: vec![stmt(StmtKind::Expr(Some(call("mtx_leave")))), stmt(StmtKind::Break)],
            },
            SwitchCase {
                label: CaseLabel::Case(Expr::Constant(Constant::Integer("2".to_string()))),
                body: vec![stmt(StmtKind::Break)],
            },
        ];
        let body = stmt(StmtKind::Compound(vec![
            stmt(StmtKind::Expr(Some(call("mtx_enter")))),
            stmt(StmtKind::Switch {
                cond: ident("x"),
                cases,
            }),
        ]));
        let exits = run_body(body);

        let balanced_count = exits
            .iter()
            .filter(|e| matches!(e, Exit::Fallthrough(ctx) if ctx.state.balanced()))
            .count();
        let unbalanced_count = exits
            .iter()
            .filter(|e| matches!(e, Exit::Fallthrough(ctx) if !ctx.state.balanced()))
            .count();
        // Entering at `case 1` is the only path that runs the release.
        assert_eq!(balanced_count, 1);
        // Entering directly at `case 2` and matching no case at all both
        // skip the release, so both leave `mtx` held.
        assert_eq!(unbalanced_count, 2);
    }

    /// A backward goto ends its path as `NoError` without re-checking the
    /// region it jumps back into, even though that region left a lock held.
    #[test]
    fn backward_goto_ends_path_without_balance_check() {
        let body = stmt(StmtKind::Compound(vec![
            stmt(StmtKind::Label {
                name: "top".to_string(),
                stmt: Box::new(stmt(StmtKind::Expr(None))),
            }),
            stmt(StmtKind::Expr(Some(call("mtx_enter")))),
            stmt(StmtKind::Goto("top".to_string())),
        ]));
        let exits = run_body(body);
        assert!(matches!(exits.as_slice(), [Exit::NoError]));
    }
}
