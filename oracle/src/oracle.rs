//! Reference answers for `__builtin_object_size`.
//!
//! The oracle maps the resolved candidates of a pointer value and a [`Kind`]
//! to the byte count the intrinsic must report, or [`UNKNOWN_SIZE`].

use itertools::Itertools;

use crate::provenance::Offset;

/// All-ones result meaning the size cannot be determined.
pub const UNKNOWN_SIZE: u64 = u64::MAX;

/// Bound strictness selector, the second argument of the intrinsic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter, strum::FromRepr, strum::Display)]
#[repr(u8)]
pub enum Kind {
    /// Upper bound over the whole object.
    #[strum(to_string = "0")]
    Maximum = 0,
    /// Upper bound over the closest subobject; answered as kind 0.
    #[strum(to_string = "1")]
    MaximumSubobject = 1,
    /// Lower bound, the unknown sentinel when no guarantee exists.
    #[strum(to_string = "2")]
    Minimum = 2,
    /// Lower bound that reports 0 instead of the unknown sentinel.
    #[strum(to_string = "3")]
    MinimumSubobject = 3,
}

impl Kind {
    pub fn from_value(value: i64) -> Option<Kind> {
        u8::try_from(value).ok().and_then(Kind::from_repr)
    }

    pub fn is_minimum(self) -> bool {
        matches!(self, Self::Minimum | Self::MinimumSubobject)
    }

    /// Result when nothing can be said about the pointer.
    pub fn unknown(self) -> u64 {
        match self {
            Self::MinimumSubobject => 0,
            _ => UNKNOWN_SIZE,
        }
    }
}

/// A provenance candidate resolved against the regions it names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Candidate {
    Null,
    Unknown,
    Live { size: u64, offset: Offset },
    Freed { size: u64, offset: Offset },
}

/// How a deallocated region answers queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FreedPolicy {
    /// A freed region is not an object any more.
    #[default]
    Unknown,
    /// The region keeps reporting the size it had while live.
    Stale,
}

impl FreedPolicy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "unknown" => Some(Self::Unknown),
            "stale" => Some(Self::Stale),
            _ => None,
        }
    }
}

/// Bytes remaining from a candidate's offset to the end of its region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remaining {
    Exact(u64),
    /// Offset not statically known: anywhere from 0 up to the bound.
    AtMost(u64),
    Unknown,
}

impl Remaining {
    pub fn of(size: u64, offset: Offset) -> Remaining {
        match offset {
            Offset::Known(offset) if offset < 0 => Remaining::Unknown,
            Offset::Known(offset) => Remaining::Exact(size.saturating_sub(offset as u64)),
            Offset::Variable => Remaining::AtMost(size),
        }
    }

    fn upper(self) -> Option<u64> {
        match self {
            Self::Exact(n) | Self::AtMost(n) => Some(n),
            Self::Unknown => None,
        }
    }

    fn lower(self) -> Option<u64> {
        match self {
            Self::Exact(n) => Some(n),
            Self::AtMost(_) => Some(0),
            Self::Unknown => None,
        }
    }
}

/// An implementation of the intrinsic the scenarios are checked against.
pub trait SizeEstimator {
    /// Size for a pointer value with the given candidate provenances.
    fn object_size(&self, candidates: &[Candidate], kind: Kind) -> u64;

    /// Size for an argument whose evaluation would have side effects.
    fn side_effecting(&self, kind: Kind) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Oracle {
    freed: FreedPolicy,
}

impl Oracle {
    pub fn new(freed: FreedPolicy) -> Self {
        Self { freed }
    }

    pub fn remaining(&self, candidate: Candidate) -> Remaining {
        match candidate {
            Candidate::Null | Candidate::Unknown => Remaining::Unknown,
            Candidate::Live { size, offset } => Remaining::of(size, offset),
            Candidate::Freed { size, offset } => match self.freed {
                FreedPolicy::Unknown => Remaining::Unknown,
                FreedPolicy::Stale => Remaining::of(size, offset),
            },
        }
    }
}

impl SizeEstimator for Oracle {
    fn object_size(&self, candidates: &[Candidate], kind: Kind) -> u64 {
        let remaining = candidates.iter().map(|c| self.remaining(*c)).collect_vec();
        if remaining.is_empty() || remaining.contains(&Remaining::Unknown) {
            return kind.unknown();
        }
        let bound = if kind.is_minimum() {
            remaining.iter().filter_map(|r| r.lower()).min()
        } else {
            remaining.iter().filter_map(|r| r.upper()).max()
        };
        bound.unwrap_or_else(|| kind.unknown())
    }

    fn side_effecting(&self, kind: Kind) -> u64 {
        if kind.is_minimum() { 0 } else { UNKNOWN_SIZE }
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    fn live(size: u64, offset: i64) -> Candidate {
        Candidate::Live { size, offset: Offset::Known(offset) }
    }

    fn sizes(oracle: &Oracle, candidates: &[Candidate]) -> [u64; 4] {
        [Kind::Maximum, Kind::MaximumSubobject, Kind::Minimum, Kind::MinimumSubobject]
            .map(|kind| oracle.object_size(candidates, kind))
    }

    #[test]
    fn whole_object_for_every_kind() {
        let oracle = Oracle::default();
        for kind in Kind::iter() {
            assert_eq!(oracle.object_size(&[live(24, 0)], kind), 24);
        }
    }

    #[test]
    fn remaining_bytes_clamp_past_the_end() {
        let oracle = Oracle::default();
        let expected = [5, 4, 3, 2, 1, 0, 0];
        for (offset, expected) in expected.into_iter().enumerate() {
            assert_eq!(oracle.object_size(&[live(5, offset as i64)], Kind::Maximum), expected);
            assert_eq!(oracle.object_size(&[live(5, offset as i64)], Kind::Minimum), expected);
        }
    }

    #[test]
    fn null_and_unknown() {
        let oracle = Oracle::default();
        let expected = [UNKNOWN_SIZE, UNKNOWN_SIZE, UNKNOWN_SIZE, 0];
        assert_eq!(sizes(&oracle, &[Candidate::Null]), expected);
        assert_eq!(sizes(&oracle, &[Candidate::Unknown]), expected);
        assert_eq!(sizes(&oracle, &[live(8, -1)]), expected);
        assert_eq!(sizes(&oracle, &[]), expected);
    }

    #[test]
    fn merge_of_distinct_objects() {
        let oracle = Oracle::default();
        assert_eq!(sizes(&oracle, &[live(8, 0), live(12, 0)]), [12, 12, 8, 8]);
        assert_eq!(sizes(&oracle, &[live(8, 1), live(12, 1)]), [11, 11, 7, 7]);
    }

    #[test]
    fn conditional_null_poisons_every_kind() {
        let oracle = Oracle::default();
        assert_eq!(sizes(&oracle, &[Candidate::Null, live(64, 0)]), [UNKNOWN_SIZE, UNKNOWN_SIZE, UNKNOWN_SIZE, 0]);
    }

    #[test]
    fn variable_offset_bounds() {
        let oracle = Oracle::default();
        let var = Candidate::Live { size: 12, offset: Offset::Variable };
        assert_eq!(sizes(&oracle, &[var]), [12, 12, 0, 0]);
        assert_eq!(sizes(&oracle, &[var, live(20, 0)]), [20, 20, 0, 0]);
    }

    #[test]
    fn freed_policy() {
        let freed = Candidate::Freed { size: 16, offset: Offset::Known(4) };
        assert_eq!(sizes(&Oracle::new(FreedPolicy::Unknown), &[freed]), [UNKNOWN_SIZE, UNKNOWN_SIZE, UNKNOWN_SIZE, 0]);
        assert_eq!(sizes(&Oracle::new(FreedPolicy::Stale), &[freed]), [12, 12, 12, 12]);
    }

    #[test]
    fn side_effects() {
        let oracle = Oracle::default();
        let expected = [UNKNOWN_SIZE, UNKNOWN_SIZE, 0, 0];
        for (kind, expected) in Kind::iter().zip(expected) {
            assert_eq!(oracle.side_effecting(kind), expected);
        }
    }

    #[test]
    fn kind_values() {
        assert_eq!(Kind::from_value(2), Some(Kind::Minimum));
        assert_eq!(Kind::from_value(4), None);
        assert_eq!(Kind::from_value(-1), None);
        assert_eq!(Kind::MinimumSubobject.to_string(), "3");
    }
}
