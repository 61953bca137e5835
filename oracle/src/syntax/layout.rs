//! C data layout: `sizeof` and `offsetof` for a target data model.

use std::collections::BTreeMap;

use crate::syntax::{FloatSize, IntSize, StructKind, StructType, Type};

/// Data model the scenarios are laid out for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub pointer_size: u64,
    /// Alignment of 8-byte integers and `double`.
    pub wide_align: u64,
    pub long_double_size: u64,
    pub long_double_align: u64,
}

impl Target {
    pub const X86_64: Self = Self { pointer_size: 8, wide_align: 8, long_double_size: 16, long_double_align: 16 };
    pub const I686: Self = Self { pointer_size: 4, wide_align: 4, long_double_size: 12, long_double_align: 4 };
    pub const AARCH64: Self = Self { pointer_size: 8, wide_align: 8, long_double_size: 16, long_double_align: 16 };

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "x86_64" => Some(Self::X86_64),
            "i686" | "i386" => Some(Self::I686),
            "aarch64" => Some(Self::AARCH64),
            _ => None,
        }
    }
}

impl Default for Target {
    fn default() -> Self {
        Self::X86_64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("unknown type name: '{0}'")]
    UnknownType(String),
    #[error("type '{0}' contains itself by value")]
    Recursive(String),
    #[error("type {0:?} has no size")]
    Unsized(Type),
    #[error("'{ty}' has no field '{field}'")]
    UnknownField { ty: String, field: String },
    #[error("type {0:?} is not a struct or union")]
    NotAnAggregate(Type),
    #[error("type {0:?} is too large")]
    TooLarge(Type),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub size: u64,
    pub align: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldLayout<'a> {
    pub offset: u64,
    pub ty: &'a Type,
}

#[derive(Clone, Copy)]
pub struct Layouts<'a> {
    target: Target,
    structs: &'a BTreeMap<String, StructType>,
}

impl<'a> Layouts<'a> {
    pub fn new(target: Target, structs: &'a BTreeMap<String, StructType>) -> Self {
        Self { target, structs }
    }

    pub fn size_of(&self, ty: &Type) -> Result<u64, LayoutError> {
        Ok(self.layout(ty, 0)?.size)
    }

    /// Step used by pointer arithmetic; `void` advances one byte as in GNU C.
    pub fn stride_of(&self, pointee: &Type) -> Result<u64, LayoutError> {
        match pointee {
            Type::Void => Ok(1),
            _ => self.size_of(pointee),
        }
    }

    pub fn field(&self, name: &str, field: &str) -> Result<FieldLayout<'a>, LayoutError> {
        let st = self.aggregate(name)?;
        let fields = self.fields(name, st, 0)?;
        st.fields
            .iter()
            .zip(fields)
            .find(|(fld, _)| fld.name == field)
            .map(|(fld, (offset, _))| FieldLayout { offset, ty: &fld.ty })
            .ok_or_else(|| LayoutError::UnknownField { ty: name.to_string(), field: field.to_string() })
    }

    /// Field layout for a value of type `ty`, which must name an aggregate.
    pub fn field_of(&self, ty: &Type, field: &str) -> Result<FieldLayout<'a>, LayoutError> {
        match ty {
            Type::Name(name) => self.field(name, field),
            _ => Err(LayoutError::NotAnAggregate(ty.clone())),
        }
    }

    fn aggregate(&self, name: &str) -> Result<&'a StructType, LayoutError> {
        self.structs
            .get(name)
            .ok_or_else(|| LayoutError::UnknownType(name.to_string()))
    }

    fn layout(&self, ty: &Type, depth: usize) -> Result<Layout, LayoutError> {
        let too_large = || LayoutError::TooLarge(ty.clone());
        let scalar = |size: u64| Layout { size, align: size };
        Ok(match ty {
            Type::Bool => scalar(1),
            Type::Int { size, .. } => match size {
                IntSize::I8 => scalar(1),
                IntSize::I16 => scalar(2),
                IntSize::I32 => scalar(4),
                IntSize::I64 => Layout { size: 8, align: self.target.wide_align },
                IntSize::Size => scalar(self.target.pointer_size),
            },
            Type::Float(fs) => self.float(*fs),
            Type::Complex(fs) => {
                let part = self.float(*fs);
                Layout { size: part.size.checked_mul(2).ok_or_else(too_large)?, align: part.align }
            }
            Type::Array(elem, len) => {
                let elem = self.layout(elem, depth)?;
                Layout { size: elem.size.checked_mul(*len).ok_or_else(too_large)?, align: elem.align }
            }
            Type::Ptr(_) => scalar(self.target.pointer_size),
            Type::Name(name) => {
                if depth > self.structs.len() {
                    return Err(LayoutError::Recursive(name.clone()));
                }
                let st = self.aggregate(name)?;
                self.struct_layout(name, st, depth)?
            }
            Type::Void => return Err(LayoutError::Unsized(Type::Void)),
        })
    }

    fn float(&self, fs: FloatSize) -> Layout {
        match fs {
            FloatSize::F32 => Layout { size: 4, align: 4 },
            FloatSize::F64 => Layout { size: 8, align: self.target.wide_align },
            FloatSize::LongDouble => Layout { size: self.target.long_double_size, align: self.target.long_double_align },
        }
    }

    fn field_align(&self, field_layout: Layout, explicit: Option<u64>) -> u64 {
        field_layout.align.max(explicit.unwrap_or(1))
    }

    fn struct_layout(&self, name: &str, st: &StructType, depth: usize) -> Result<Layout, LayoutError> {
        let too_large = || LayoutError::TooLarge(Type::Name(name.to_string()));
        let mut end = 0;
        let mut align = 1;
        for (fld, (offset, fl)) in st.fields.iter().zip(self.fields(name, st, depth)?) {
            align = align.max(self.field_align(fl, fld.align));
            end = end.max(offset.checked_add(fl.size).ok_or_else(too_large)?);
        }
        Ok(Layout { size: round_up(end, align).ok_or_else(too_large)?, align })
    }

    /// Offset and layout of every field, in declaration order.
    fn fields(&self, name: &str, st: &StructType, depth: usize) -> Result<Vec<(u64, Layout)>, LayoutError> {
        if depth > self.structs.len() {
            return Err(LayoutError::Recursive(name.to_string()));
        }
        let mut fields = Vec::with_capacity(st.fields.len());
        let mut offset = 0;
        for fld in st.fields.iter() {
            let fl = self.layout(&fld.ty, depth + 1)?;
            match st.kind {
                StructKind::Struct => {
                    let too_large = || LayoutError::TooLarge(Type::Name(name.to_string()));
                    offset = round_up(offset, self.field_align(fl, fld.align)).ok_or_else(too_large)?;
                    fields.push((offset, fl));
                    offset = offset.checked_add(fl.size).ok_or_else(too_large)?;
                }
                StructKind::Union => fields.push((0, fl)),
            }
        }
        Ok(fields)
    }
}

fn round_up(value: u64, align: u64) -> Option<u64> {
    value.div_ceil(align.max(1)).checked_mul(align.max(1))
}
