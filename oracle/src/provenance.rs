//! What a pointer points into.
//!
//! A [`Region`] is one allocated object. A pointer value is a [`MergeSet`] of
//! [`Provenance`] candidates: a single candidate when its origin is statically
//! known, several after a control-flow join.

use std::fmt;

use itertools::Itertools;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionClass {
    Stack,
    Global,
    ThreadLocal,
    Heap,
}

/// Initial contents of a region, for loads of cells never written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contents {
    Uninit,
    Zeroed,
    /// NUL-terminated string of the given length starting at offset 0.
    CStr(u64),
}

#[derive(Debug, Clone)]
pub struct Region {
    pub label: String,
    pub class: RegionClass,
    pub size: u64,
    pub contents: Contents,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} '{}' ({} bytes)", self.class, self.label, self.size)
    }
}

/// Every region created while a scenario runs. A region is only handed out
/// again to the allocation site that created it; deallocation is tracked by
/// the interpreter state.
#[derive(Debug, Default)]
pub struct Regions {
    regions: Vec<Region>,
}

impl Regions {
    pub fn alloc(&mut self, region: Region) -> RegionId {
        let id = RegionId(self.regions.len() as u32);
        self.regions.push(region);
        id
    }

    pub fn get(&self, id: RegionId) -> &Region {
        &self.regions[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: RegionId) -> &mut Region {
        &mut self.regions[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

/// Byte offset of a pointer from the base of its region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Offset {
    Known(i64),
    /// Somewhere inside the region, not statically known.
    Variable,
}

impl Offset {
    pub fn add(self, delta: Offset) -> Offset {
        match (self, delta) {
            (Offset::Known(a), Offset::Known(b)) => a.checked_add(b).map_or(Offset::Variable, Offset::Known),
            _ => Offset::Variable,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Provenance {
    Null,
    /// Origin lost: integers of unknown source, opaque calls, uninitialized loads.
    Unknown,
    Object { region: RegionId, offset: Offset },
}

impl Provenance {
    pub fn region(&self) -> Option<RegionId> {
        match self {
            Self::Object { region, .. } => Some(*region),
            _ => None,
        }
    }

    fn offset_by(self, delta: Offset) -> Provenance {
        match self {
            Self::Object { region, offset } => Self::Object { region, offset: offset.add(delta) },
            // Arithmetic on a null pointer does not produce an object address.
            Self::Null | Self::Unknown => Self::Unknown,
        }
    }
}

/// Candidate provenances of one pointer value, sorted and without duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MergeSet(Vec<Provenance>);

impl MergeSet {
    pub fn single(prov: Provenance) -> Self {
        Self(vec![prov])
    }

    pub fn object(region: RegionId) -> Self {
        Self::single(Provenance::Object { region, offset: Offset::Known(0) })
    }

    pub fn null() -> Self {
        Self::single(Provenance::Null)
    }

    pub fn unknown() -> Self {
        Self::single(Provenance::Unknown)
    }

    pub fn from_candidates(candidates: impl IntoIterator<Item = Provenance>) -> Self {
        let set: Vec<_> = candidates.into_iter().sorted().dedup().collect();
        if set.is_empty() { Self::unknown() } else { Self(set) }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Provenance> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The only candidate, when the provenance is statically resolved.
    pub fn as_single(&self) -> Option<Provenance> {
        match self.0.as_slice() {
            [prov] => Some(*prov),
            _ => None,
        }
    }

    pub fn contains_null(&self) -> bool {
        self.0.contains(&Provenance::Null)
    }

    pub fn contains_unknown(&self) -> bool {
        self.0.contains(&Provenance::Unknown)
    }

    pub fn join(&self, other: &MergeSet) -> MergeSet {
        Self::from_candidates(self.0.iter().chain(other.0.iter()).copied())
    }

    pub fn offset_by(&self, delta: Offset) -> MergeSet {
        Self::from_candidates(self.0.iter().map(|prov| prov.offset_by(delta)))
    }

    /// Collapse every region reached at more than one offset to a variable
    /// offset into that region.
    pub fn widen(&self) -> MergeSet {
        let moving = self
            .0
            .iter()
            .filter_map(Provenance::region)
            .counts()
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(region, _)| region)
            .collect::<Vec<_>>();
        Self::from_candidates(self.0.iter().map(|prov| match prov {
            Provenance::Object { region, .. } if moving.contains(region) => {
                Provenance::Object { region: *region, offset: Offset::Variable }
            }
            _ => *prov,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regions() -> (Regions, RegionId, RegionId) {
        let mut regions = Regions::default();
        let region = |label: &str, size| Region {
            label: label.to_string(),
            class: RegionClass::Stack,
            size,
            contents: Contents::Uninit,
        };
        let a = regions.alloc(region("a", 8));
        let b = regions.alloc(region("b", 12));
        (regions, a, b)
    }

    #[test]
    fn join_deduplicates() {
        let (_, a, b) = regions();
        let set = MergeSet::object(a).join(&MergeSet::object(b)).join(&MergeSet::object(a));
        assert_eq!(set.len(), 2);
        assert_eq!(set.as_single(), None);
        assert_eq!(MergeSet::object(a).join(&MergeSet::object(a)).as_single().and_then(|p| p.region()), Some(a));
    }

    #[test]
    fn offsets_move_every_candidate() {
        let (_, a, b) = regions();
        let set = MergeSet::object(a).join(&MergeSet::object(b)).offset_by(Offset::Known(1));
        let offsets: Vec<_> = set
            .iter()
            .map(|p| match p {
                Provenance::Object { offset, .. } => *offset,
                _ => Offset::Variable,
            })
            .collect();
        assert_eq!(offsets, vec![Offset::Known(1), Offset::Known(1)]);

        let unknown = set.offset_by(Offset::Variable);
        assert!(unknown.iter().all(|p| matches!(p, Provenance::Object { offset: Offset::Variable, .. })));
    }

    #[test]
    fn null_arithmetic_loses_provenance() {
        assert_eq!(MergeSet::null().offset_by(Offset::Known(4)), MergeSet::unknown());
        assert!(MergeSet::null().join(&MergeSet::unknown()).contains_null());
    }

    #[test]
    fn widen_collapses_moving_regions_only() {
        let (_, a, b) = regions();
        let set = MergeSet::from_candidates([
            Provenance::Object { region: a, offset: Offset::Known(0) },
            Provenance::Object { region: a, offset: Offset::Known(1) },
            Provenance::Object { region: b, offset: Offset::Known(4) },
            Provenance::Null,
        ]);
        let widened = set.widen();
        assert_eq!(
            widened,
            MergeSet::from_candidates([
                Provenance::Null,
                Provenance::Object { region: a, offset: Offset::Variable },
                Provenance::Object { region: b, offset: Offset::Known(4) },
            ])
        );
    }
}
