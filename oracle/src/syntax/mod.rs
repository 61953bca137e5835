mod builtin;
mod expr;
pub mod layout;
mod top;
mod ty;

pub use builtin::Builtin;
pub use expr::{BinOp, Expr, Site, UnOp};
pub use top::{AllocSize, CheckError, ExternFnc, Fnc, Global, Suite};
pub use ty::{FloatSize, FncParam, FncType, IntSize, StructField, StructKind, StructType, Type};
