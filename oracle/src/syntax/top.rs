use std::collections::BTreeMap;

use crate::syntax::layout::{LayoutError, Layouts, Target};
use crate::syntax::{Builtin, Expr, FncType, StructType, Type};

/// A conformance suite: aggregate definitions, globals, helpers and scenarios.
#[derive(Debug, Clone, Default)]
pub struct Suite {
    pub name: String,
    pub structs: BTreeMap<String, StructType>,
    pub globals: BTreeMap<String, Global>,
    pub fncs: BTreeMap<String, Fnc>,
    pub externs: BTreeMap<String, ExternFnc>,
}

#[derive(Debug, Clone)]
pub struct Fnc {
    pub ty: FncType,
    pub body: Expr,
    /// Disabled scenario, skipped unless explicitly requested.
    pub ignored: bool,
}

#[derive(Debug, Clone)]
pub struct Global {
    pub ty: Type,
    pub thread_local: bool,
}

/// Function defined outside the suite, known only by its signature.
#[derive(Debug, Clone)]
pub struct ExternFnc {
    pub ty: FncType,
    pub alloc_size: Option<AllocSize>,
}

/// `alloc_size` attribute: 1-based positions of the argument(s) whose product
/// is the size of the returned allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocSize(pub usize, pub Option<usize>);

pub(super) type Ctx<'a> = im::HashMap<&'a str, &'a Type>;

// Placeholder types for bindings whose type is only known at evaluation time.
static INFERRED: Type = Type::Void;
static INDUCTION: Type = Type::LONG;

impl Suite {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), ..Default::default() }
    }

    /// Functions run as scenarios, in name order.
    pub fn scenarios(&self) -> impl Iterator<Item = (&str, &Fnc)> {
        self.fncs
            .iter()
            .filter(|(name, _)| is_scenario_name(name))
            .map(|(name, fnc)| (name.as_str(), fnc))
    }

    pub fn check(&self) -> Result<(), CheckError> {
        let layouts = Layouts::new(Target::default(), &self.structs);
        for name in self.structs.keys() {
            layouts.size_of(&Type::Name(name.clone()))?;
        }
        for global in self.globals.values() {
            layouts.size_of(&global.ty)?;
        }

        let checker = Checker { suite: self, layouts };
        for (name, fnc) in &self.fncs {
            if is_scenario_name(name) && !fnc.ty.params.is_empty() {
                return Err(CheckError::ScenarioParams(name.clone()));
            }

            let mut ctx: Ctx = Default::default();
            for param in fnc.ty.params.iter() {
                checker.check_type(&param.ty)?;
                ctx.insert(&param.name, &param.ty);
            }
            checker.check_expr(&fnc.body, &ctx)?;
        }

        Ok(())
    }
}

fn is_scenario_name(name: &str) -> bool {
    name.starts_with("check")
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckError {
    #[error("standalone let expression")]
    StandaloneLet,
    #[error("let '{0}' needs a type annotation or an initializer")]
    UntypedLet(String),
    #[error("unknown variable name: '{0}'")]
    UnknownVariable(String),
    #[error("unknown function name: '{0}'")]
    UnknownFunction(String),
    #[error("invalid number of argument in call to '{name}', expected {expected}, found {found}")]
    InvalidArgNum { name: String, expected: usize, found: usize },
    #[error("object size kind must be in 0..=3, found {0}")]
    InvalidKind(i64),
    #[error("scenario '{0}' must not take parameters")]
    ScenarioParams(String),
    #[error("alloc_size of '{name}' refers to argument {position}, which does not exist")]
    InvalidAllocSize { name: String, position: usize },
    #[error(transparent)]
    Layout(#[from] LayoutError),
}

struct Checker<'a> {
    suite: &'a Suite,
    layouts: Layouts<'a>,
}

impl<'a> Checker<'a> {
    fn check_type(&self, ty: &Type) -> Result<(), CheckError> {
        match ty {
            Type::Void => Ok(()),
            Type::Ptr(pointee) => self.check_pointee(pointee),
            _ => Ok(self.layouts.size_of(ty).map(drop)?),
        }
    }

    // Pointers may name incomplete or self-referential aggregates.
    fn check_pointee(&self, ty: &Type) -> Result<(), CheckError> {
        match ty {
            Type::Name(name) if self.suite.structs.contains_key(name) => Ok(()),
            Type::Ptr(inner) => self.check_pointee(inner),
            Type::Array(elem, _) => self.check_pointee(elem),
            _ => self.check_type(ty),
        }
    }

    fn check_args(&self, name: &str, expected: usize, args: &'a [Expr], ctx: &Ctx<'a>) -> Result<(), CheckError> {
        if args.len() != expected {
            return Err(CheckError::InvalidArgNum { name: name.to_string(), expected, found: args.len() });
        }
        args.iter().try_for_each(|arg| self.check_expr(arg, ctx))
    }

    fn check_expr(&self, expr: &'a Expr, ctx: &Ctx<'a>) -> Result<(), CheckError> {
        match expr {
            Expr::Const(_) | Expr::Str(_) | Expr::Null | Expr::Unit => Ok(()),
            Expr::Var(name) => {
                if ctx.contains_key(name.as_str()) || self.suite.globals.contains_key(name) {
                    Ok(())
                } else {
                    Err(CheckError::UnknownVariable(name.clone()))
                }
            }
            Expr::SizeOf(ty) => self.check_type(ty),
            Expr::OffsetOf { ty, field } => Ok(self.layouts.field_of(ty, field).map(drop)?),
            Expr::SizeOfVal(expr) | Expr::AddrOf(expr) | Expr::Deref(expr) | Expr::UnOp { expr, .. } => {
                self.check_expr(expr, ctx)
            }
            Expr::Cast { expr, ty } => {
                self.check_type(ty)?;
                self.check_expr(expr, ctx)
            }
            Expr::Index { base, index } => {
                self.check_expr(base, ctx)?;
                self.check_expr(index, ctx)
            }
            Expr::Field { base, .. } => self.check_expr(base, ctx),
            Expr::BinOp { left, right, .. }
            | Expr::Assign { place: left, rhs: right }
            | Expr::AssignOp { place: left, rhs: right, .. } => {
                self.check_expr(left, ctx)?;
                self.check_expr(right, ctx)
            }
            Expr::Ite { cond, then_branch, else_branch } => {
                self.check_expr(cond, ctx)?;
                self.check_expr(then_branch, ctx)?;
                match else_branch {
                    Some(else_branch) => self.check_expr(else_branch, ctx),
                    None => Ok(()),
                }
            }
            Expr::While { cond, body } => {
                self.check_expr(cond, ctx)?;
                self.check_expr(body, ctx)
            }
            Expr::For { var, start, end, body } => {
                self.check_expr(start, ctx)?;
                self.check_expr(end, ctx)?;
                let mut ctx = ctx.clone();
                ctx.insert(var, &INDUCTION);
                self.check_expr(body, &ctx)
            }
            Expr::Let { .. } => Err(CheckError::StandaloneLet),
            Expr::Call { name, args } => {
                if let Ok(builtin) = name.parse::<Builtin>() {
                    self.check_args(name, builtin.arity(), args, ctx)
                } else if let Some(fnc) = self.suite.fncs.get(name) {
                    self.check_args(name, fnc.ty.params.len(), args, ctx)
                } else if let Some(ext) = self.suite.externs.get(name) {
                    let arity = ext.ty.params.len();
                    if let Some(AllocSize(first, second)) = ext.alloc_size {
                        for position in std::iter::once(first).chain(second) {
                            if position == 0 || position > arity {
                                return Err(CheckError::InvalidAllocSize { name: name.clone(), position });
                            }
                        }
                    }
                    self.check_args(name, arity, args, ctx)
                } else {
                    Err(CheckError::UnknownFunction(name.clone()))
                }
            }
            Expr::ObjectSize { ptr, kind } => {
                if let Expr::Const(kind) = **kind {
                    if !(0..=3).contains(&kind) {
                        return Err(CheckError::InvalidKind(kind));
                    }
                }
                self.check_expr(ptr, ctx)?;
                self.check_expr(kind, ctx)
            }
            Expr::Check { actual, expected, .. } => {
                self.check_expr(actual, ctx)?;
                self.check_expr(expected, ctx)
            }
            Expr::Return(expr) => match expr {
                Some(expr) => self.check_expr(expr, ctx),
                None => Ok(()),
            },
            Expr::Block(stmts) => {
                let mut ctx: Ctx<'a> = ctx.clone();
                for stmt in stmts.iter() {
                    match stmt {
                        Expr::Let { name, ty, init } => {
                            if let Some(init) = init {
                                self.check_expr(init, &ctx)?;
                            }
                            match ty {
                                Some(ty) => {
                                    self.check_type(ty)?;
                                    ctx.insert(name, ty);
                                }
                                None if init.is_some() => {
                                    ctx.insert(name, &INFERRED);
                                }
                                None => return Err(CheckError::UntypedLet(name.clone())),
                            }
                        }
                        _ => self.check_expr(stmt, &ctx)?,
                    }
                }
                Ok(())
            }
        }
    }
}
