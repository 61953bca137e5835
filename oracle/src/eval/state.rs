use crate::eval::value::Value;
use crate::provenance::{Contents, RegionId, Regions};

/// A scalar slot in memory, addressed by region and byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Cell {
    pub region: RegionId,
    pub offset: i64,
}

/// Abstract program state at one program point.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct State {
    pub cells: im::HashMap<Cell, Value>,
    pub freed: im::HashSet<RegionId>,
    /// No execution reaches this point (after a `return`).
    pub unreachable: bool,
}

impl State {
    pub fn read(&self, cell: Cell, regions: &Regions) -> Value {
        match self.cells.get(&cell) {
            Some(value) => value.clone(),
            None => initial_value(cell, regions),
        }
    }

    pub fn is_freed(&self, region: RegionId) -> bool {
        self.freed.contains(&region)
    }

    pub fn join(&self, other: &State, regions: &Regions) -> State {
        self.merge(other, regions, Value::join)
    }

    /// Join at a loop head, widening every cell the back-edge still changes.
    pub fn widen(&self, next: &State, regions: &Regions) -> State {
        let joined = self.join(next, regions);
        if self.unreachable || next.unreachable {
            return joined;
        }
        let mut cells = joined.cells.clone();
        for (cell, value) in joined.cells.iter() {
            if self.cells.get(cell) != Some(value) {
                cells.insert(*cell, self.read(*cell, regions).widen(value));
            }
        }
        State { cells, ..joined }
    }

    /// Last-resort loop head: cells the back-edge still changes after widening
    /// keep their kind but lose their provenance.
    pub fn forget_changed(&self, next: &State, regions: &Regions) -> State {
        let widened = self.widen(next, regions);
        if self.unreachable || next.unreachable {
            return widened;
        }
        let mut cells = widened.cells.clone();
        for (cell, value) in widened.cells.iter() {
            if self.cells.get(cell) != Some(value) {
                cells.insert(*cell, value.forget());
            }
        }
        State { cells, ..widened }
    }

    fn merge(&self, other: &State, regions: &Regions, op: impl Fn(&Value, &Value) -> Value) -> State {
        if self.unreachable {
            return other.clone();
        }
        if other.unreachable {
            return self.clone();
        }
        let mut cells = im::HashMap::new();
        for (cell, value) in self.cells.iter() {
            cells.insert(*cell, op(value, &other.read(*cell, regions)));
        }
        for (cell, value) in other.cells.iter() {
            if !self.cells.contains_key(cell) {
                cells.insert(*cell, op(&initial_value(*cell, regions), value));
            }
        }
        State { cells, freed: self.freed.clone().union(other.freed.clone()), unreachable: false }
    }
}

fn initial_value(cell: Cell, regions: &Regions) -> Value {
    match regions.get(cell.region).contents {
        Contents::Zeroed => Value::Int(0),
        Contents::Uninit | Contents::CStr(_) => Value::Uninit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provenance::{MergeSet, Offset, Provenance, Region, RegionClass};
    use crate::syntax::Type;

    fn alloc(regions: &mut Regions, contents: Contents) -> RegionId {
        regions.alloc(Region { label: "r".into(), class: RegionClass::Stack, size: 8, contents })
    }

    #[test]
    fn branch_join() {
        let mut regions = Regions::default();
        let slot = alloc(&mut regions, Contents::Uninit);
        let global = alloc(&mut regions, Contents::Zeroed);
        let (a, b) = (alloc(&mut regions, Contents::Uninit), alloc(&mut regions, Contents::Uninit));
        let cell = Cell { region: slot, offset: 0 };
        let zeroed = Cell { region: global, offset: 0 };

        let mut then_state = State::default();
        then_state.cells.insert(cell, Value::ptr(Type::CHAR, MergeSet::object(a)));
        then_state.cells.insert(zeroed, Value::ptr(Type::CHAR, MergeSet::object(a)));
        let mut else_state = State::default();
        else_state.cells.insert(cell, Value::ptr(Type::CHAR, MergeSet::object(b)));
        else_state.freed.insert(b);

        let joined = then_state.join(&else_state, &regions);
        assert_eq!(joined.read(cell, &regions).targets(), MergeSet::object(a).join(&MergeSet::object(b)));
        assert_eq!(joined.read(zeroed, &regions).targets(), MergeSet::object(a).join(&MergeSet::null()));
        assert!(joined.is_freed(b));
    }

    #[test]
    fn unreachable_side_is_ignored() {
        let mut regions = Regions::default();
        let slot = alloc(&mut regions, Contents::Uninit);
        let cell = Cell { region: slot, offset: 0 };
        let mut live = State::default();
        live.cells.insert(cell, Value::Int(3));
        let dead = State { unreachable: true, ..State::default() };
        assert_eq!(dead.join(&live, &regions).read(cell, &regions), Value::Int(3));
        assert_eq!(live.join(&dead, &regions).read(cell, &regions), Value::Int(3));
    }

    #[test]
    fn widen_moving_pointer() {
        let mut regions = Regions::default();
        let slot = alloc(&mut regions, Contents::Uninit);
        let buf = alloc(&mut regions, Contents::Uninit);
        let cell = Cell { region: slot, offset: 0 };
        let at = |offset| MergeSet::single(Provenance::Object { region: buf, offset: Offset::Known(offset) });

        let mut head = State::default();
        head.cells.insert(cell, Value::ptr(Type::CHAR, at(0).join(&at(1))));
        let mut next = State::default();
        next.cells.insert(cell, Value::ptr(Type::CHAR, at(1).join(&at(2))));

        let widened = head.widen(&next, &regions);
        assert_eq!(
            widened.read(cell, &regions).targets(),
            MergeSet::single(Provenance::Object { region: buf, offset: Offset::Variable })
        );

        let stable = head.widen(&head.clone(), &regions);
        assert_eq!(stable.read(cell, &regions).targets(), at(0).join(&at(1)));
    }

    #[test]
    fn forget_still_changing_cells() {
        let mut regions = Regions::default();
        let (moving, settled) = (alloc(&mut regions, Contents::Uninit), alloc(&mut regions, Contents::Uninit));
        let (a, b) = (alloc(&mut regions, Contents::Uninit), alloc(&mut regions, Contents::Uninit));
        let (moving, settled) = (Cell { region: moving, offset: 0 }, Cell { region: settled, offset: 0 });

        let mut head = State::default();
        head.cells.insert(moving, Value::ptr(Type::CHAR, MergeSet::object(a)));
        head.cells.insert(settled, Value::ptr(Type::CHAR, MergeSet::object(b)));
        let mut next = head.clone();
        next.cells.insert(moving, Value::ptr(Type::CHAR, MergeSet::object(b)));

        let last = head.forget_changed(&next, &regions);
        assert_eq!(last.read(moving, &regions), Value::ptr(Type::CHAR, MergeSet::unknown()));
        assert_eq!(last.read(settled, &regions).targets(), MergeSet::object(b));
        assert_eq!(head.forget_changed(&head.clone(), &regions), head);
    }
}
