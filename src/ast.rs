#![allow(dead_code)]

//! The analyzer's own representation of a C function body. Independent of whatever
//! crate parses the source text; see `lowering` for the conversion.

/// Source-order identifier assigned during lowering. Statements earlier in the
/// function body always receive a smaller id than statements that follow them,
/// which is all goto-direction classification needs.
pub(crate) type NodeId = u32;

#[derive(Clone, Debug)]
pub(crate) struct FuncDef {
    pub(crate) name: String,
    pub(crate) body: Stmt,
}

#[derive(Clone, Debug)]
pub(crate) struct Stmt {
    pub(crate) id: NodeId,
    pub(crate) kind: StmtKind,
}

#[derive(Clone, Debug)]
pub(crate) enum StmtKind {
    Compound(Vec<Stmt>),
    Expr(Option<Expr>),
    Return(Option<Expr>),
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    Switch {
        cond: Expr,
        cases: Vec<SwitchCase>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
    },
    For {
        init: ForInit,
        cond: Option<Expr>,
        step: Option<Expr>,
        body: Box<Stmt>,
    },
    Break,
    Continue,
    Label {
        name: String,
        stmt: Box<Stmt>,
    },
    Goto(String),
}

#[derive(Clone, Debug)]
pub(crate) struct SwitchCase {
    pub(crate) label: CaseLabel,
    pub(crate) body: Vec<Stmt>,
}

#[derive(Clone, Debug)]
pub(crate) enum CaseLabel {
    Case(Expr),
    Default,
}

#[derive(Clone, Debug)]
pub(crate) enum ForInit {
    Empty,
    Expr(Expr),
    /// A declaration with an initializer; the declared name is irrelevant to
    /// lock balance, only any call expressions inside initializers are.
    Declaration(Vec<Expr>),
}

#[derive(Clone, Debug)]
pub(crate) enum Expr {
    Identifier(String),
    Constant(Constant),
    Call(Box<Expr>, Vec<Expr>),
    /// condition, then, else — covers both the C ternary and, during lowering,
    /// is reused nowhere else.
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Unary(UnOp, Box<Expr>),
    Assign(AssignOp, Box<Expr>, Box<Expr>),
    Member {
        base: Box<Expr>,
        field: String,
        arrow: bool,
    },
    Index(Box<Expr>, Box<Expr>),
    Cast(String, Box<Expr>),
    Comma(Vec<Expr>),
    /// Anything the lowering stage chooses not to model structurally (string
    /// literals, compound literals, generic selections). Carries its rendered
    /// source text so it still participates in canonical cond-memo keys.
    Opaque(String),
}

#[derive(Clone, Debug)]
pub(crate) enum Constant {
    Integer(String),
    Float(String),
    Character(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Shl,
    Shr,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitXor,
    BitOr,
    LogAnd,
    LogOr,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum UnOp {
    Plus,
    Minus,
    Not,
    BitNot,
    Deref,
    AddressOf,
    PreIncr,
    PreDecr,
    PostIncr,
    PostDecr,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Shl,
    Shr,
    BitAnd,
    BitXor,
    BitOr,
}

impl Expr {
    /// `while(1)`/`for(;;)`-style truthiness: `Some(true)` for a nonzero integer
    /// constant, `Some(false)` for a zero one, `None` for anything else.
    pub(crate) fn constant_truthiness(&self) -> Option<bool> {
        match self {
            Expr::Constant(Constant::Integer(text)) => {
                let trimmed = text.trim_end_matches(['u', 'U', 'l', 'L']);
                parse_c_integer(trimmed).map(|value| value != 0)
            }
            _ => None,
        }
    }
}

fn parse_c_integer(text: &str) -> Option<i128> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        i128::from_str_radix(hex, 16).ok()
    } else if text.len() > 1 && text.starts_with('0') && text.bytes().all(|b| b.is_ascii_digit()) {
        i128::from_str_radix(text, 8).ok()
    } else {
        text.parse().ok()
    }
}

/// Assigns source-order ids to every statement in `stmt`, depth-first, matching
/// the textual order a human reading the function would encounter them in.
pub(crate) fn assign_node_ids(stmt: &mut Stmt, next: &mut NodeId) {
    stmt.id = *next;
    *next += 1;
    match &mut stmt.kind {
        StmtKind::Compound(children) => {
            for child in children {
                assign_node_ids(child, next);
            }
        }
        StmtKind::If {
            then_branch,
            else_branch,
            ..
        } => {
            assign_node_ids(then_branch, next);
            if let Some(else_branch) = else_branch {
                assign_node_ids(else_branch, next);
            }
        }
        StmtKind::Switch { cases, .. } => {
            for case in cases {
                for child in &mut case.body {
                    assign_node_ids(child, next);
                }
            }
        }
        StmtKind::While { body, .. } | StmtKind::DoWhile { body, .. } | StmtKind::For { body, .. } => {
            assign_node_ids(body, next);
        }
        StmtKind::Label { stmt, .. } => assign_node_ids(stmt, next),
        StmtKind::Expr(_)
        | StmtKind::Return(_)
        | StmtKind::Break
        | StmtKind::Continue
        | StmtKind::Goto(_) => {}
    }
}

/// Collects every label name in `stmt` together with the node id of the
/// `Label` statement itself, for goto direction classification.
pub(crate) fn collect_label_ids(stmt: &Stmt, out: &mut std::collections::HashMap<String, NodeId>) {
    if let StmtKind::Label { name, stmt: inner } = &stmt.kind {
        out.insert(name.clone(), stmt.id);
        collect_label_ids(inner, out);
        return;
    }
    match &stmt.kind {
        StmtKind::Compound(children) => {
            for child in children {
                collect_label_ids(child, out);
            }
        }
        StmtKind::If {
            then_branch,
            else_branch,
            ..
        } => {
            collect_label_ids(then_branch, out);
            if let Some(else_branch) = else_branch {
                collect_label_ids(else_branch, out);
            }
        }
        StmtKind::Switch { cases, .. } => {
            for case in cases {
                for child in &case.body {
                    collect_label_ids(child, out);
                }
            }
        }
        StmtKind::While { body, .. } | StmtKind::DoWhile { body, .. } | StmtKind::For { body, .. } => {
            collect_label_ids(body, out);
        }
        StmtKind::Label { .. }
        | StmtKind::Expr(_)
        | StmtKind::Return(_)
        | StmtKind::Break
        | StmtKind::Continue
        | StmtKind::Goto(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(kind: StmtKind) -> Stmt {
        Stmt { id: 0, kind }
    }

    #[test]
    fn constant_truthiness_recognizes_while_one() {
        let one = Expr::Constant(Constant::Integer("1".to_string()));
        assert_eq!(one.constant_truthiness(), Some(true));
        let zero = Expr::Constant(Constant::Integer("0".to_string()));
        assert_eq!(zero.constant_truthiness(), Some(false));
        let ident = Expr::Identifier("x".to_string());
        assert_eq!(ident.constant_truthiness(), None);
    }

    #[test]
    fn assign_node_ids_is_monotonic_in_source_order() {
        let mut body = leaf(StmtKind::Compound(vec![
            leaf(StmtKind::Expr(None)),
            leaf(StmtKind::If {
                cond: Expr::Identifier("x".to_string()),
                then_branch: Box::new(leaf(StmtKind::Break)),
                else_branch: None,
            }),
            leaf(StmtKind::Label {
                name: "done".to_string(),
                stmt: Box::new(leaf(StmtKind::Return(None))),
            }),
        ]));
        let mut next = 0;
        assign_node_ids(&mut body, &mut next);

        let mut labels = std::collections::HashMap::new();
        collect_label_ids(&body, &mut labels);
        let label_id = labels["done"];

        let StmtKind::Compound(children) = &body.kind else {
            unreachable!()
        };
        // the label statement is the third top-level child; its id must be
        // greater than the if-statement's id that precedes it.
        let StmtKind::If { .. } = &children[1].kind else {
            unreachable!()
        };
        assert!(children[1].id < label_id);
    }
}
