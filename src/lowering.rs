#![allow(dead_code)]

//! Converts a parsed C translation unit (via the `lang_c` crate) into this
//! crate's own [`crate::ast`] representation.
//!
//! `lang_c`'s AST is a faithful grammar-level tree: `switch` bodies, for
//! instance, are just a statement list with `case`/`default` labels sprinkled
//! through it (Duff's-device style), not pre-grouped by case. Grouping that
//! flat list into [`crate::ast::SwitchCase`] entries is this module's job,
//! not the parser's.
//!
//! Constructs this analyzer has no use for (string literals, compound
//! literals, inline asm, `_Generic`) are not errors; they lower to
//! [`crate::ast::Expr::Opaque`] carrying their rendered source text, since
//! the interpreter only ever needs to know whether a subtree *might* contain
//! a catalog call, and an opaque leaf plainly does not.

use anyhow::{Context, Result, anyhow, bail};
use lang_c::ast as c;
use lang_c::driver::{Config, Parse, parse_preprocessed};
use lang_c::span::Node;

use crate::ast::{AssignOp, BinOp, CaseLabel, Constant, Expr, ForInit, FuncDef, Stmt, StmtKind, SwitchCase, UnOp, assign_node_ids};

/// Parses `source` as a standalone translation unit (no external
/// preprocessor invoked) and lowers every function definition it contains.
#[tracing::instrument(level = "debug", skip_all)]
pub(crate) fn lower_source(source: &str) -> Result<Vec<FuncDef>> {
    let config = Config::default();
    let parsed: Parse = parse_preprocessed(&config, source.to_string())
        .map_err(|err| anyhow!("{err}"))
        .context("failed to parse C source")?;

    let mut funcs = Vec::new();
    for external in parsed.unit.0 {
        if let c::ExternalDeclaration::FunctionDefinition(def) = external.node {
            funcs.push(lower_function(def.node)?);
        }
    }
    tracing::debug!(function_count = funcs.len(), "lowered");
    Ok(funcs)
}

fn lower_function(def: c::FunctionDefinition) -> Result<FuncDef> {
    let name = declarator_name(&def.declarator.node)
        .ok_or_else(|| anyhow!("function definition with no identifiable name"))?;
    let mut body = lower_statement(def.statement.node)?;
    let mut next = 0;
    assign_node_ids(&mut body, &mut next);
    Ok(FuncDef { name, body })
}

fn declarator_name(declarator: &c::Declarator) -> Option<String> {
    match &declarator.kind.node {
        c::DeclaratorKind::Identifier(ident) => Some(ident.node.name.clone()),
        c::DeclaratorKind::Declarator(inner) => declarator_name(&inner.node),
        c::DeclaratorKind::Abstract => None,
    }
}

fn leaf(kind: StmtKind) -> Stmt {
    Stmt { id: 0, kind }
}

fn lower_statement(stmt: c::Statement) -> Result<Stmt> {
    match stmt {
        c::Statement::Expression(expr) => Ok(leaf(StmtKind::Expr(expr.map(|e| lower_expr(e.node)).transpose()?))),
        c::Statement::Return(expr) => Ok(leaf(StmtKind::Return(expr.map(|e| lower_expr(e.node)).transpose()?))),
        c::Statement::Break => Ok(leaf(StmtKind::Break)),
        c::Statement::Continue => Ok(leaf(StmtKind::Continue)),
        c::Statement::Goto(ident) => Ok(leaf(StmtKind::Goto(ident.node.name))),
        c::Statement::Compound(items) => lower_compound(items),
        c::Statement::If(inner) => {
            let inner = inner.node;
            let cond = lower_expr(inner.condition.node)?;
            let then_branch = Box::new(lower_statement(inner.then_statement.node)?);
            let else_branch = inner
                .else_statement
                .map(|e| lower_statement(e.node).map(Box::new))
                .transpose()?;
            Ok(leaf(StmtKind::If {
                cond,
                then_branch,
                else_branch,
            }))
        }
        c::Statement::While(inner) => {
            let inner = inner.node;
            Ok(leaf(StmtKind::While {
                cond: lower_expr(inner.expression.node)?,
                body: Box::new(lower_statement(inner.statement.node)?),
            }))
        }
        c::Statement::DoWhile(inner) => {
            let inner = inner.node;
            Ok(leaf(StmtKind::DoWhile {
                body: Box::new(lower_statement(inner.statement.node)?),
                cond: lower_expr(inner.expression.node)?,
            }))
        }
        c::Statement::For(inner) => {
            let inner = inner.node;
            let init = lower_for_init(inner.initializer.node)?;
            let cond = inner.condition.map(|e| lower_expr(e.node)).transpose()?;
            let step = inner.step.map(|e| lower_expr(e.node)).transpose()?;
            Ok(leaf(StmtKind::For {
                init,
                cond,
                step,
                body: Box::new(lower_statement(inner.statement.node)?),
            }))
        }
        c::Statement::Switch(inner) => {
            let inner = inner.node;
            let cond = lower_expr(inner.expression.node)?;
            let flat = flatten_labeled(inner.statement.node)?;
            let cases = group_switch_cases(flat)?;
            Ok(leaf(StmtKind::Switch { cond, cases }))
        }
        c::Statement::Labeled(inner) => {
            let inner = inner.node;
            match inner.label.node {
                c::Label::Identifier(ident) => Ok(leaf(StmtKind::Label {
                    name: ident.node.name,
                    stmt: Box::new(lower_statement(inner.statement.node)?),
                })),
                // A bare `case`/`default` outside any switch this function saw
                // (should not happen in well-formed C); surface as a lowering
                // error rather than silently dropping the statement.
                _ => bail!("`case`/`default` label outside of a `switch` statement"),
            }
        }
        c::Statement::Asm(_) => Ok(leaf(StmtKind::Expr(Some(Expr::Opaque("asm".to_string()))))),
    }
}

/// Collapses a `switch` body's statement tree into a flat, ordered sequence,
/// splitting compounds but preserving every `Labeled` node so case grouping
/// can see them. Local declarations directly inside a `switch` body are
/// unreachable at the point they'd run (the labels jump past them) in
/// standard C, so they are dropped rather than lowered.
fn flatten_labeled(stmt: c::Statement) -> Result<Vec<c::Statement>> {
    match stmt {
        c::Statement::Compound(items) => {
            let mut out = Vec::new();
            for item in items {
                if let c::BlockItem::Statement(s) = item.node {
                    out.extend(flatten_labeled(s.node)?);
                }
            }
            Ok(out)
        }
        other => Ok(vec![other]),
    }
}

/// Groups a flat, already-label-aware statement list into `case`/`default`
/// groups. Anything before the first label is an error: a `switch` body that
/// starts with unlabeled statements is unreachable code this analyzer has no
/// attachment point for.
fn group_switch_cases(flat: Vec<c::Statement>) -> Result<Vec<SwitchCase>> {
    let mut cases: Vec<SwitchCase> = Vec::new();
    for stmt in flat {
        match stmt {
            c::Statement::Labeled(inner) => {
                let inner = inner.node;
                let label = match inner.label.node {
                    c::Label::Case(expr) => CaseLabel::Case(lower_expr(expr.node)?),
                    c::Label::Default => CaseLabel::Default,
                    c::Label::Identifier(ident) => {
                        // A plain label nested inside a switch body (common
                        // for `goto`-based cleanup): attach it to the
                        // currently open case, wrapping the labeled
                        // statement itself rather than splitting a new case.
                        let wrapped = leaf(StmtKind::Label {
                            name: ident.node.name,
                            stmt: Box::new(lower_statement(inner.statement.node)?),
                        });
                        match cases.last_mut() {
                            Some(case) => case.body.push(wrapped),
                            None => bail!("label appears before the first `case`/`default` in a `switch` body"),
                        }
                        continue;
                    }
                };
                cases.push(SwitchCase { label, body: Vec::new() });
                let body_stmt = lower_statement(inner.statement.node)?;
                cases.last_mut().unwrap().body.push(body_stmt);
            }
            other => {
                let lowered = lower_statement(other)?;
                match cases.last_mut() {
                    Some(case) => case.body.push(lowered),
                    None => bail!("statement appears before the first `case`/`default` in a `switch` body"),
                }
            }
        }
    }
    Ok(cases)
}

fn lower_compound(items: Vec<Node<c::BlockItem>>) -> Result<Stmt> {
    let mut children = Vec::new();
    for item in items {
        match item.node {
            c::BlockItem::Statement(s) => children.push(lower_statement(s.node)?),
            c::BlockItem::Declaration(decl) => children.extend(declaration_as_statements(decl.node)?),
            c::BlockItem::StaticAssert(_) => {}
        }
    }
    Ok(leaf(StmtKind::Compound(children)))
}

/// A local declaration doesn't affect lock state except through whatever
/// call expressions appear in its initializers, so it lowers to zero or more
/// expression-statements (one per initializer with a plain expression form;
/// brace-initializer lists are not modeled and are skipped).
fn declaration_as_statements(decl: c::Declaration) -> Result<Vec<Stmt>> {
    let mut out = Vec::new();
    for declarator in decl.declarators {
        if let Some(initializer) = declarator.node.initializer {
            if let c::Initializer::Expression(expr) = initializer.node {
                out.push(leaf(StmtKind::Expr(Some(lower_expr(expr.node)?))));
            }
        }
    }
    Ok(out)
}

fn lower_for_init(init: c::ForInitializer) -> Result<ForInit> {
    match init {
        c::ForInitializer::Empty => Ok(ForInit::Empty),
        c::ForInitializer::Expression(expr) => Ok(ForInit::Expr(lower_expr(expr.node)?)),
        c::ForInitializer::Declaration(decl) => {
            let mut exprs = Vec::new();
            for declarator in decl.node.declarators {
                if let Some(initializer) = declarator.node.initializer {
                    if let c::Initializer::Expression(expr) = initializer.node {
                        exprs.push(lower_expr(expr.node)?);
                    }
                }
            }
            Ok(ForInit::Declaration(exprs))
        }
        c::ForInitializer::StaticAssert(_) => Ok(ForInit::Empty),
    }
}

fn lower_expr(expr: c::Expression) -> Result<Expr> {
    match expr {
        c::Expression::Identifier(ident) => Ok(Expr::Identifier(ident.node.name)),
        c::Expression::Constant(c) => Ok(Expr::Constant(lower_constant(c.node))),
        c::Expression::StringLiteral(_) => Ok(Expr::Opaque("<string-literal>".to_string())),
        c::Expression::Call(inner) => {
            let inner = inner.node;
            let callee = Box::new(lower_expr(inner.callee.node)?);
            let mut args = Vec::new();
            for arg in inner.arguments {
                args.push(lower_expr(arg.node)?);
            }
            Ok(Expr::Call(callee, args))
        }
        c::Expression::Member(inner) => {
            let inner = inner.node;
            let arrow = matches!(inner.operator.node, c::MemberOperator::Indirect);
            Ok(Expr::Member {
                base: Box::new(lower_expr(inner.expression.node)?),
                field: inner.identifier.node.name,
                arrow,
            })
        }
        c::Expression::UnaryOperator(inner) => {
            let inner = inner.node;
            // `sizeof expr` never evaluates its operand in C; lowering it
            // like any other unary operator would let the interpreter walk
            // straight into the operand and count a catalog call inside it
            // as executing. Treat the whole expression as opaque instead,
            // matching the type-form `sizeof(T)` case below.
            if matches!(inner.operator.node, c::UnaryOperator::SizeOf) {
                return Ok(Expr::Opaque("<sizeof>".to_string()));
            }
            let operand = Box::new(lower_expr(inner.operand.node)?);
            Ok(Expr::Unary(lower_unop(inner.operator.node), operand))
        }
        c::Expression::Cast(inner) => {
            let inner = inner.node;
            Ok(Expr::Cast("cast".to_string(), Box::new(lower_expr(inner.expression.node)?)))
        }
        c::Expression::BinaryOperator(inner) => {
            let inner = inner.node;
            let lhs = lower_expr(inner.lhs.node)?;
            let rhs = lower_expr(inner.rhs.node)?;
            lower_binary(inner.operator.node, lhs, rhs)
        }
        c::Expression::Conditional(inner) => {
            let inner = inner.node;
            Ok(Expr::Conditional(
                Box::new(lower_expr(inner.condition.node)?),
                Box::new(lower_expr(inner.then_expression.node)?),
                Box::new(lower_expr(inner.else_expression.node)?),
            ))
        }
        c::Expression::Comma(items) => {
            let mut out = Vec::new();
            for item in *items {
                out.push(lower_expr(item.node)?);
            }
            Ok(Expr::Comma(out))
        }
        c::Expression::SizeOf(_) | c::Expression::AlignOf(_) => Ok(Expr::Opaque("<sizeof>".to_string())),
        c::Expression::GenericSelection(_) => Ok(Expr::Opaque("<generic-selection>".to_string())),
        c::Expression::CompoundLiteral(_) => Ok(Expr::Opaque("<compound-literal>".to_string())),
        c::Expression::OffsetOf(_) => Ok(Expr::Opaque("<offsetof>".to_string())),
        c::Expression::VaArg(_) => Ok(Expr::Opaque("<va-arg>".to_string())),
        c::Expression::Statement(_) => Ok(Expr::Opaque("<statement-expression>".to_string())),
    }
}

fn lower_constant(c: c::Constant) -> Constant {
    match c {
        c::Constant::Integer(integer) => Constant::Integer(integer.number.to_string()),
        c::Constant::Float(float) => Constant::Float(float.number.to_string()),
        c::Constant::Character(text) => Constant::Character(text),
    }
}

fn lower_unop(op: c::UnaryOperator) -> UnOp {
    match op {
        c::UnaryOperator::PostIncrement => UnOp::PostIncr,
        c::UnaryOperator::PostDecrement => UnOp::PostDecr,
        c::UnaryOperator::PreIncrement => UnOp::PreIncr,
        c::UnaryOperator::PreDecrement => UnOp::PreDecr,
        c::UnaryOperator::Address => UnOp::AddressOf,
        c::UnaryOperator::Indirection => UnOp::Deref,
        c::UnaryOperator::Plus => UnOp::Plus,
        c::UnaryOperator::Minus => UnOp::Minus,
        c::UnaryOperator::Complement => UnOp::BitNot,
        c::UnaryOperator::Negate => UnOp::Not,
        // Intercepted in `lower_expr` before this is ever called; kept here
        // only so this match stays exhaustive over `c::UnaryOperator`.
        c::UnaryOperator::SizeOf => UnOp::Plus,
    }
}

fn lower_binary(op: c::BinaryOperator, lhs: Expr, rhs: Expr) -> Result<Expr> {
    use c::BinaryOperator as B;
    let bin = |b: BinOp| Ok(Expr::Binary(b, Box::new(lhs.clone()), Box::new(rhs.clone())));
    match op {
        B::Index => Ok(Expr::Index(Box::new(lhs), Box::new(rhs))),
        B::Multiply => bin(BinOp::Mul),
        B::Divide => bin(BinOp::Div),
        B::Modulo => bin(BinOp::Mod),
        B::Plus => bin(BinOp::Add),
        B::Minus => bin(BinOp::Sub),
        B::ShiftLeft => bin(BinOp::Shl),
        B::ShiftRight => bin(BinOp::Shr),
        B::Less => bin(BinOp::Lt),
        B::Greater => bin(BinOp::Gt),
        B::LessOrEqual => bin(BinOp::Le),
        B::GreaterOrEqual => bin(BinOp::Ge),
        B::Equals => bin(BinOp::Eq),
        B::NotEquals => bin(BinOp::Ne),
        B::BitwiseAnd => bin(BinOp::BitAnd),
        B::BitwiseXor => bin(BinOp::BitXor),
        B::BitwiseOr => bin(BinOp::BitOr),
        B::LogicalAnd => bin(BinOp::LogAnd),
        B::LogicalOr => bin(BinOp::LogOr),
        B::Assign => Ok(Expr::Assign(AssignOp::Assign, Box::new(lhs), Box::new(rhs))),
        B::AssignMultiply => Ok(Expr::Assign(AssignOp::Mul, Box::new(lhs), Box::new(rhs))),
        B::AssignDivide => Ok(Expr::Assign(AssignOp::Div, Box::new(lhs), Box::new(rhs))),
        B::AssignModulo => Ok(Expr::Assign(AssignOp::Mod, Box::new(lhs), Box::new(rhs))),
        B::AssignPlus => Ok(Expr::Assign(AssignOp::Add, Box::new(lhs), Box::new(rhs))),
        B::AssignMinus => Ok(Expr::Assign(AssignOp::Sub, Box::new(lhs), Box::new(rhs))),
        B::AssignShiftLeft => Ok(Expr::Assign(AssignOp::Shl, Box::new(lhs), Box::new(rhs))),
        B::AssignShiftRight => Ok(Expr::Assign(AssignOp::Shr, Box::new(lhs), Box::new(rhs))),
        B::AssignBitwiseAnd => Ok(Expr::Assign(AssignOp::BitAnd, Box::new(lhs), Box::new(rhs))),
        B::AssignBitwiseXor => Ok(Expr::Assign(AssignOp::BitXor, Box::new(lhs), Box::new(rhs))),
        B::AssignBitwiseOr => Ok(Expr::Assign(AssignOp::BitOr, Box::new(lhs), Box::new(rhs))),
    }
}
