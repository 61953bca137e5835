use crate::syntax::{Builtin, Type};

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(i64),
    /// String literal, a global `char` array holding the text and its terminator.
    Str(String),
    Var(String),
    Null,
    SizeOf(Type),
    SizeOfVal(Box<Expr>),
    OffsetOf { ty: Type, field: String },
    AddrOf(Box<Expr>),
    Deref(Box<Expr>),
    Index { base: Box<Expr>, index: Box<Expr> },
    Field { base: Box<Expr>, name: String },
    BinOp { op: BinOp, left: Box<Expr>, right: Box<Expr> },
    UnOp { op: UnOp, expr: Box<Expr> },
    Cast { expr: Box<Expr>, ty: Type },
    Ite { cond: Box<Expr>, then_branch: Box<Expr>, else_branch: Option<Box<Expr>> },
    While { cond: Box<Expr>, body: Box<Expr> },
    For { var: String, start: Box<Expr>, end: Box<Expr>, body: Box<Expr> },
    Let { name: String, ty: Option<Type>, init: Option<Box<Expr>> },
    Assign { place: Box<Expr>, rhs: Box<Expr> },
    AssignOp { op: BinOp, place: Box<Expr>, rhs: Box<Expr> },
    Call { name: String, args: Box<[Expr]> },
    ObjectSize { ptr: Box<Expr>, kind: Box<Expr> },
    Check { actual: Box<Expr>, expected: Box<Expr>, site: Site },
    Return(Option<Box<Expr>>),
    Block(Box<[Expr]>),
    Unit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
}

/// Source location and text of a `check!` assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
    pub file: String,
    pub line: u32,
    pub actual: String,
    pub expected: String,
}

impl Expr {
    /// Whether evaluating the expression could change program state.
    ///
    /// `object_size` never evaluates such an argument.
    pub fn has_side_effects(&self) -> bool {
        match self {
            Self::Const(_)
            | Self::Str(_)
            | Self::Var(_)
            | Self::Null
            | Self::SizeOf(_)
            | Self::SizeOfVal(_)
            | Self::OffsetOf { .. }
            | Self::Unit => false,
            Self::AddrOf(expr) | Self::Deref(expr) | Self::UnOp { expr, .. } | Self::Cast { expr, .. } => {
                expr.has_side_effects()
            }
            Self::Index { base, index } => base.has_side_effects() || index.has_side_effects(),
            Self::Field { base, .. } => base.has_side_effects(),
            Self::BinOp { left, right, .. } => left.has_side_effects() || right.has_side_effects(),
            Self::Ite { cond, then_branch, else_branch } => {
                cond.has_side_effects()
                    || then_branch.has_side_effects()
                    || else_branch.as_ref().is_some_and(|e| e.has_side_effects())
            }
            Self::Call { name, args } => {
                let pure = name.parse::<Builtin>().is_ok_and(|b| b.is_pure());
                !pure || args.iter().any(Expr::has_side_effects)
            }
            Self::ObjectSize { .. } => false,
            Self::Block(stmts) => stmts.iter().any(Expr::has_side_effects),
            Self::While { .. }
            | Self::For { .. }
            | Self::Let { .. }
            | Self::Assign { .. }
            | Self::AssignOp { .. }
            | Self::Check { .. }
            | Self::Return(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Box<Expr> {
        Box::new(Expr::Var(name.to_string()))
    }

    #[test]
    fn side_effects() {
        let bump = Expr::Block(
            vec![
                Expr::AssignOp { op: BinOp::Add, place: var("p"), rhs: Box::new(Expr::Const(1)) },
                Expr::Var("p".into()),
            ]
            .into(),
        );
        assert!(bump.has_side_effects());
        assert!(!Expr::AddrOf(Box::new(Expr::Index { base: var("a"), index: Box::new(Expr::Const(1)) })).has_side_effects());

        let max = Expr::Call { name: "max".into(), args: vec![Expr::Const(1), Expr::Const(2)].into() };
        assert!(!max.has_side_effects());
        let alloc = Expr::Call { name: "malloc".into(), args: vec![Expr::Const(1)].into() };
        assert!(alloc.has_side_effects());
        let helper = Expr::Call { name: "pick".into(), args: Box::new([]) };
        assert!(helper.has_side_effects());
    }
}
