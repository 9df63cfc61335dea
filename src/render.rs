//! Canonical, deterministic rendering of `Expr` subtrees into the string keys
//! `cond_memo` is keyed on. Two structurally equal conditions always render
//! to the same text; parenthesization is derived from operator precedence
//! rather than carried in the AST, so there is no "redundant parens" case to
//! normalize away.

use std::fmt;

use crate::ast::{AssignOp, BinOp, Constant, Expr, UnOp};

pub(crate) fn render_expr(expr: &Expr) -> String {
    format!("{expr}")
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_expr(f, self, 0)
    }
}

/// Binding power used purely to decide when a child needs parentheses around
/// it; unrelated to any real precedence table beyond "higher binds tighter".
fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Comma(_) => 0,
        Expr::Assign(..) => 1,
        Expr::Conditional(..) => 2,
        Expr::Binary(op, ..) => binop_precedence(*op),
        Expr::Cast(..) | Expr::Unary(..) => 13,
        Expr::Call(..) | Expr::Member { .. } | Expr::Index(..) => 14,
        Expr::Identifier(_) | Expr::Constant(_) | Expr::Opaque(_) => 15,
    }
}

fn binop_precedence(op: BinOp) -> u8 {
    match op {
        BinOp::LogOr => 3,
        BinOp::LogAnd => 4,
        BinOp::BitOr => 5,
        BinOp::BitXor => 6,
        BinOp::BitAnd => 7,
        BinOp::Eq | BinOp::Ne => 8,
        BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => 9,
        BinOp::Shl | BinOp::Shr => 10,
        BinOp::Add | BinOp::Sub => 11,
        BinOp::Mul | BinOp::Div | BinOp::Mod => 12,
    }
}

fn write_child(f: &mut fmt::Formatter<'_>, child: &Expr, parent_prec: u8) -> fmt::Result {
    let child_prec = precedence(child);
    if child_prec < parent_prec {
        write!(f, "(")?;
        write_expr(f, child, 0)?;
        write!(f, ")")
    } else {
        write_expr(f, child, parent_prec)
    }
}

fn write_expr(f: &mut fmt::Formatter<'_>, expr: &Expr, parent_prec: u8) -> fmt::Result {
    let _ = parent_prec;
    match expr {
        Expr::Identifier(name) => write!(f, "{name}"),
        Expr::Constant(c) => write!(f, "{c}"),
        Expr::Opaque(text) => write!(f, "{text}"),
        Expr::Call(callee, args) => {
            write_child(f, callee, precedence(expr))?;
            write!(f, "(")?;
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write_child(f, arg, 1)?;
            }
            write!(f, ")")
        }
        Expr::Conditional(cond, then_expr, else_expr) => {
            write_child(f, cond, precedence(expr) + 1)?;
            write!(f, " ? ")?;
            write_child(f, then_expr, 1)?;
            write!(f, " : ")?;
            write_child(f, else_expr, precedence(expr))
        }
        Expr::Binary(op, lhs, rhs) => {
            let prec = precedence(expr);
            write_child(f, lhs, prec)?;
            write!(f, " {} ", binop_text(*op))?;
            write_child(f, rhs, prec + 1)
        }
        Expr::Unary(op, operand) => match op {
            UnOp::PostIncr => {
                write_child(f, operand, precedence(expr))?;
                write!(f, "++")
            }
            UnOp::PostDecr => {
                write_child(f, operand, precedence(expr))?;
                write!(f, "--")
            }
            _ => {
                write!(f, "{}", unop_text(*op))?;
                write_child(f, operand, precedence(expr))
            }
        },
        Expr::Assign(op, lhs, rhs) => {
            let prec = precedence(expr);
            write_child(f, lhs, prec + 1)?;
            write!(f, " {} ", assign_op_text(*op))?;
            write_child(f, rhs, prec)
        }
        Expr::Member { base, field, arrow } => {
            write_child(f, base, precedence(expr))?;
            write!(f, "{}{field}", if *arrow { "->" } else { "." })
        }
        Expr::Index(base, index) => {
            write_child(f, base, precedence(expr))?;
            write!(f, "[")?;
            write_expr(f, index, 0)?;
            write!(f, "]")
        }
        Expr::Cast(type_name, operand) => {
            write!(f, "({type_name})")?;
            write_child(f, operand, precedence(expr))
        }
        Expr::Comma(items) => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write_child(f, item, 1)?;
            }
            Ok(())
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Integer(text) | Constant::Float(text) => write!(f, "{text}"),
            Constant::Character(text) => write!(f, "'{text}'"),
        }
    }
}

fn binop_text(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Mod => "%",
        BinOp::Shl => "<<",
        BinOp::Shr => ">>",
        BinOp::Lt => "<",
        BinOp::Gt => ">",
        BinOp::Le => "<=",
        BinOp::Ge => ">=",
        BinOp::Eq => "==",
        BinOp::Ne => "!=",
        BinOp::BitAnd => "&",
        BinOp::BitXor => "^",
        BinOp::BitOr => "|",
        BinOp::LogAnd => "&&",
        BinOp::LogOr => "||",
    }
}

fn unop_text(op: UnOp) -> &'static str {
    match op {
        UnOp::Plus => "+",
        UnOp::Minus => "-",
        UnOp::Not => "!",
        UnOp::BitNot => "~",
        UnOp::Deref => "*",
        UnOp::AddressOf => "&",
        UnOp::PreIncr => "++",
        UnOp::PreDecr => "--",
        UnOp::PostIncr | UnOp::PostDecr => "",
    }
}

fn assign_op_text(op: AssignOp) -> &'static str {
    match op {
        AssignOp::Assign => "=",
        AssignOp::Add => "+=",
        AssignOp::Sub => "-=",
        AssignOp::Mul => "*=",
        AssignOp::Div => "/=",
        AssignOp::Mod => "%=",
        AssignOp::Shl => "<<=",
        AssignOp::Shr => ">>=",
        AssignOp::BitAnd => "&=",
        AssignOp::BitXor => "^=",
        AssignOp::BitOr => "|=",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Expr;

    fn ident(name: &str) -> Expr {
        Expr::Identifier(name.to_string())
    }

    #[test]
    fn renders_binary_without_redundant_parens() {
        let expr = Expr::Binary(BinOp::LogAnd, Box::new(ident("a")), Box::new(ident("b")));
        assert_eq!(render_expr(&expr), "a && b");
    }

    #[test]
    fn parenthesizes_lower_precedence_child() {
        let sum = Expr::Binary(BinOp::Add, Box::new(ident("a")), Box::new(ident("b")));
        let expr = Expr::Binary(BinOp::Mul, Box::new(sum), Box::new(ident("c")));
        assert_eq!(render_expr(&expr), "(a + b) * c");
    }

    #[test]
    fn two_structurally_equal_trees_render_identically() {
        let lhs = Expr::Binary(BinOp::Eq, Box::new(ident("x")), Box::new(ident("y")));
        let rhs = Expr::Binary(BinOp::Eq, Box::new(ident("x")), Box::new(ident("y")));
        assert_eq!(render_expr(&lhs), render_expr(&rhs));
    }

    #[test]
    fn renders_call_with_arguments() {
        let call = Expr::Call(Box::new(ident("splraise")), vec![ident("IPL_HIGH")]);
        assert_eq!(render_expr(&call), "splraise(IPL_HIGH)");
    }
}
