use crate::provenance::{Contents, MergeSet, Offset, Provenance, Region, RegionClass};
use crate::syntax::{AllocSize, Builtin, ExternFnc, Type};

use super::value::Value;
use super::{EvalError, Interpreter, expect_args};

impl Interpreter<'_> {
    pub(super) fn call_builtin(&mut self, builtin: Builtin, args: Vec<Value>) -> Result<Value, EvalError> {
        expect_args(builtin.name(), builtin.arity(), args.len())?;
        let mut args = args.into_iter();
        let mut arg = || args.next().unwrap_or(Value::Uninit);

        Ok(match builtin {
            Builtin::Opaque | Builtin::Rand => Value::Opaque,
            Builtin::Malloc => {
                let size = size_arg(&arg());
                self.allocate("malloc", RegionClass::Heap, size, Contents::Uninit)
            }
            Builtin::Calloc => {
                let (count, elem) = (arg(), arg());
                self.allocate("calloc", RegionClass::Heap, product(&count, &elem), Contents::Zeroed)
            }
            Builtin::Realloc => {
                let (ptr, size) = (arg(), arg());
                self.reallocate(&ptr, &size)?
            }
            Builtin::AlignedAlloc => {
                let (_align, size) = (arg(), arg());
                self.allocate("aligned_alloc", RegionClass::Heap, size_arg(&size), Contents::Uninit)
            }
            Builtin::Alloca => {
                let size = size_arg(&arg());
                let val = self.allocate("alloca", RegionClass::Stack, size, Contents::Uninit);
                // Released when the calling function returns.
                if let (Some(region), Some(frame)) = (val.targets().as_single().and_then(|p| p.region()), self.frames.last_mut()) {
                    frame.scoped.push(region);
                }
                val
            }
            Builtin::Strdup => {
                let src = arg();
                self.duplicate_string(&src, None)
            }
            Builtin::Strndup => {
                let (src, bound) = (arg(), arg());
                self.duplicate_string(&src, Some(&bound))
            }
            Builtin::Free => {
                let ptr = arg();
                self.free(&ptr);
                Value::Unit
            }
            Builtin::Memcpy => {
                let (dst, src, len) = (arg(), arg(), arg());
                match size_arg(&len) {
                    Some(len) => self.copy_bytes(&dst.targets(), &src.targets(), len)?,
                    // Unknown length: any byte of the destination may have changed.
                    None => self.havoc(&dst.targets()),
                }
                dst
            }
            Builtin::Max | Builtin::Min => {
                let (a, b) = (arg(), arg());
                match (a.as_int(), b.as_int()) {
                    (Some(a), Some(b)) if builtin == Builtin::Max => Value::Int(a.max(b)),
                    (Some(a), Some(b)) => Value::Int(a.min(b)),
                    _ => Value::Opaque,
                }
            }
        })
    }

    pub(super) fn call_extern(&mut self, name: &str, ext: &ExternFnc, args: Vec<Value>) -> Result<Value, EvalError> {
        expect_args(name, ext.ty.params.len(), args.len())?;
        let val = match ext.alloc_size {
            Some(AllocSize(first, second)) => {
                let arg = |position: usize| position.checked_sub(1).and_then(|i| args.get(i)).cloned().unwrap_or(Value::Opaque);
                let size = match second {
                    Some(second) => product(&arg(first), &arg(second)),
                    None => size_arg(&arg(first)),
                };
                self.allocate(name, RegionClass::Heap, size, Contents::Uninit)
            }
            None => Value::Uninit,
        };
        Ok(match &ext.ty.ret {
            Type::Void => Value::Unit,
            ret => val.coerce(ret),
        })
    }

    fn allocate(&mut self, label: &str, class: RegionClass, size: Option<u64>, contents: Contents) -> Value {
        let targets = match size {
            Some(size) => {
                let region = Region { label: label.to_string(), class, size, contents };
                MergeSet::object(self.alloc_region(self.call_site, region))
            }
            None => MergeSet::unknown(),
        };
        Value::ptr(Type::Void, targets)
    }

    fn reallocate(&mut self, ptr: &Value, size: &Value) -> Result<Value, EvalError> {
        let old = ptr.targets();
        let size = size_arg(size);
        let new = self.allocate("realloc", RegionClass::Heap, size, Contents::Uninit);
        if let (Some(Provenance::Object { region, offset: Offset::Known(0) }), Some(size)) = (old.as_single(), size) {
            let kept = self.regions.get(region).size.min(size);
            self.copy_bytes(&new.targets(), &old, kept)?;
        }
        // A loop reallocating its own buffer gets the same region back.
        let fresh = new.targets().as_single().and_then(|prov| prov.region());
        for region in old.iter().filter_map(Provenance::region) {
            if Some(region) != fresh {
                self.state.freed.insert(region);
            }
        }
        Ok(new)
    }

    fn duplicate_string(&mut self, src: &Value, bound: Option<&Value>) -> Value {
        let len = match src.targets().as_single() {
            Some(Provenance::Object { region, offset: Offset::Known(offset) }) => match self.regions.get(region).contents {
                Contents::CStr(len) if offset >= 0 && offset as u64 <= len => Some(len - offset as u64),
                _ => None,
            },
            _ => None,
        };
        let len = match bound {
            None => len,
            Some(bound) => len.zip(size_arg(bound)).map(|(len, bound)| len.min(bound)),
        };
        let label = if bound.is_some() { "strndup" } else { "strdup" };
        let contents = len.map_or(Contents::Uninit, Contents::CStr);
        self.allocate(label, RegionClass::Heap, len.map(|len| len + 1), contents)
    }

    fn free(&mut self, ptr: &Value) {
        for region in ptr.targets().iter().filter_map(Provenance::region) {
            self.state.freed.insert(region);
        }
    }

    fn havoc(&mut self, targets: &MergeSet) {
        for region in targets.iter().filter_map(Provenance::region) {
            let touched: Vec<_> = self.state.cells.keys().filter(|cell| cell.region == region).copied().collect();
            for cell in touched {
                let val = self.state.read(cell, &self.regions).join(&Value::Opaque);
                self.state.cells.insert(cell, val);
            }
        }
    }
}

fn size_arg(val: &Value) -> Option<u64> {
    val.as_int().and_then(|n| u64::try_from(n).ok())
}

fn product(a: &Value, b: &Value) -> Option<u64> {
    size_arg(a)?.checked_mul(size_arg(b)?)
}
