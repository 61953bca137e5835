#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Bool,
    Int { size: IntSize, signed: bool },
    Float(FloatSize),
    Complex(FloatSize),
    Array(Box<Type>, u64),
    Ptr(Box<Type>),
    Name(String),
    Void,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntSize {
    I8,
    I16,
    I32,
    I64,
    /// Pointer-sized (`usize` / `isize`).
    Size,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatSize {
    F32,
    F64,
    LongDouble,
}

impl Type {
    pub const CHAR: Type = Type::Int { size: IntSize::I8, signed: true };
    pub const LONG: Type = Type::Int { size: IntSize::I64, signed: true };

    pub fn ptr(pointee: Type) -> Type {
        Type::Ptr(Box::new(pointee))
    }

    pub fn array(elem: Type, len: u64) -> Type {
        Type::Array(Box::new(elem), len)
    }

    pub fn pointee(&self) -> Option<&Type> {
        match self {
            Type::Ptr(ty) => Some(ty),
            _ => None,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Type::Bool | Type::Int { .. } | Type::Float(_) | Type::Ptr(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructKind {
    Struct,
    Union,
}

#[derive(Debug, Clone)]
pub struct FncType {
    pub params: Box<[FncParam]>,
    pub ret: Type,
}

#[derive(Debug, Clone)]
pub struct FncParam {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone)]
pub struct StructType {
    pub kind: StructKind,
    pub fields: Box<[StructField]>,
}

#[derive(Debug, Clone)]
pub struct StructField {
    pub name: String,
    pub ty: Type,
    /// Explicit `_Alignas` requirement, never lowers the natural alignment.
    pub align: Option<u64>,
}
