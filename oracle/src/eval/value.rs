use crate::provenance::{MergeSet, Provenance};
use crate::syntax::Type;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Value {
    Int(i64),
    /// Integer the analysis cannot resolve.
    Opaque,
    /// Integer obtained from a pointer; keeps the pointer's provenance.
    Addr(MergeSet),
    Ptr(PtrValue),
    /// Bytes of an aggregate object, copied on store.
    Bytes { from: MergeSet, size: u64 },
    Uninit,
    Unit,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PtrValue {
    pub pointee: Type,
    pub targets: MergeSet,
}

impl Value {
    pub fn ptr(pointee: Type, targets: MergeSet) -> Value {
        Value::Ptr(PtrValue { pointee, targets })
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Provenance of the value when used as an address.
    pub fn targets(&self) -> MergeSet {
        match self {
            Value::Ptr(ptr) => ptr.targets.clone(),
            Value::Addr(targets) => targets.clone(),
            Value::Int(0) => MergeSet::null(),
            _ => MergeSet::unknown(),
        }
    }

    /// Statically known truth value, if any.
    pub fn truth(&self) -> Option<bool> {
        match self {
            Value::Int(n) => Some(*n != 0),
            Value::Ptr(PtrValue { targets, .. }) | Value::Addr(targets) => {
                if targets.iter().all(|prov| *prov == Provenance::Null) {
                    Some(false)
                } else if !targets.contains_null() && !targets.contains_unknown() {
                    Some(true)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Reinterpret a value read from or written to an object of type `ty`.
    pub fn coerce(self, ty: &Type) -> Value {
        match ty {
            Type::Ptr(pointee) => match self {
                Value::Ptr(ptr) => Value::ptr((**pointee).clone(), ptr.targets),
                other => Value::ptr((**pointee).clone(), other.targets()),
            },
            Type::Bool | Type::Int { .. } | Type::Float(_) | Type::Complex(_) => match self {
                Value::Ptr(ptr) => Value::Addr(ptr.targets),
                Value::Uninit | Value::Bytes { .. } => Value::Opaque,
                other => other,
            },
            _ => self,
        }
    }

    /// Least value covering both `self` and `other`.
    pub fn join(&self, other: &Value) -> Value {
        match (self, other) {
            (a, b) if a == b => a.clone(),
            (Value::Ptr(a), Value::Ptr(b)) => Value::ptr(a.pointee.clone(), a.targets.join(&b.targets)),
            (Value::Ptr(p), other) | (other, Value::Ptr(p)) => {
                Value::ptr(p.pointee.clone(), p.targets.join(&other.targets()))
            }
            (Value::Addr(a), other) | (other, Value::Addr(a)) => Value::Addr(a.join(&other.targets())),
            _ => Value::Opaque,
        }
    }

    /// Join for loop back-edges: pointers that keep moving lose their offset.
    pub fn widen(&self, next: &Value) -> Value {
        match self.join(next) {
            Value::Ptr(ptr) => Value::ptr(ptr.pointee, ptr.targets.widen()),
            Value::Addr(targets) => Value::Addr(targets.widen()),
            other => other,
        }
    }

    /// The same kind of value with nothing known about it.
    pub fn forget(&self) -> Value {
        match self {
            Value::Ptr(ptr) => Value::ptr(ptr.pointee.clone(), MergeSet::unknown()),
            Value::Addr(_) => Value::Addr(MergeSet::unknown()),
            Value::Bytes { size, .. } => Value::Bytes { from: MergeSet::unknown(), size: *size },
            _ => Value::Opaque,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provenance::{Contents, Region, RegionClass, Regions};

    fn region(regions: &mut Regions) -> MergeSet {
        MergeSet::object(regions.alloc(Region {
            label: "r".into(),
            class: RegionClass::Stack,
            size: 4,
            contents: Contents::Uninit,
        }))
    }

    #[test]
    fn pointer_join_collects_candidates() {
        let mut regions = Regions::default();
        let (a, b) = (region(&mut regions), region(&mut regions));
        let joined = Value::ptr(Type::CHAR, a.clone()).join(&Value::ptr(Type::CHAR, b.clone()));
        assert_eq!(joined, Value::ptr(Type::CHAR, a.join(&b)));

        let maybe_uninit = Value::ptr(Type::CHAR, a.clone()).join(&Value::Uninit);
        assert_eq!(maybe_uninit.targets(), a.join(&MergeSet::unknown()));
        assert_eq!(Value::Int(1).join(&Value::Int(2)), Value::Opaque);
    }

    #[test]
    fn truthiness() {
        let mut regions = Regions::default();
        let a = region(&mut regions);
        assert_eq!(Value::ptr(Type::Void, MergeSet::null()).truth(), Some(false));
        assert_eq!(Value::ptr(Type::Void, a.clone()).truth(), Some(true));
        assert_eq!(Value::ptr(Type::Void, a.join(&MergeSet::null())).truth(), None);
        assert_eq!(Value::Opaque.truth(), None);
    }

    #[test]
    fn punning_keeps_provenance() {
        let mut regions = Regions::default();
        let a = region(&mut regions);
        let long = Value::ptr(Type::CHAR, a.clone()).coerce(&Type::LONG);
        assert_eq!(long, Value::Addr(a.clone()));
        assert_eq!(long.coerce(&Type::ptr(Type::Void)), Value::ptr(Type::Void, a));
        assert_eq!(
            Value::Int(7).coerce(&Type::ptr(Type::Void)).targets().as_single(),
            Some(Provenance::Unknown)
        );
    }

    #[test]
    fn forgetting_keeps_the_kind() {
        let mut regions = Regions::default();
        let a = region(&mut regions);
        let ptr = Value::ptr(Type::CHAR, a.clone()).forget();
        assert_eq!(ptr, Value::ptr(Type::CHAR, MergeSet::unknown()));
        assert_eq!(Value::Addr(a).forget(), Value::Addr(MergeSet::unknown()));
        assert_eq!(Value::Int(3).forget(), Value::Opaque);
    }
}
