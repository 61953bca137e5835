/// Library functions the scenario language knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::IntoStaticStr, strum::EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Builtin {
    /// A value the analysis cannot resolve statically.
    Opaque,
    Rand,
    Malloc,
    Calloc,
    Realloc,
    AlignedAlloc,
    Alloca,
    Strdup,
    Strndup,
    Free,
    Memcpy,
    Max,
    Min,
}

impl Builtin {
    pub fn arity(self) -> usize {
        match self {
            Self::Opaque | Self::Rand => 0,
            Self::Malloc | Self::Alloca | Self::Strdup | Self::Free => 1,
            Self::Calloc | Self::Realloc | Self::AlignedAlloc | Self::Strndup | Self::Max | Self::Min => 2,
            Self::Memcpy => 3,
        }
    }

    pub fn is_pure(self) -> bool {
        matches!(self, Self::Max | Self::Min)
    }

    pub fn name(self) -> &'static str {
        self.into()
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn names_round_trip() {
        for builtin in Builtin::iter() {
            assert_eq!(builtin.name().parse::<Builtin>(), Ok(builtin));
        }
        assert_eq!("aligned_alloc".parse::<Builtin>(), Ok(Builtin::AlignedAlloc));
        assert!("operator_new".parse::<Builtin>().is_err());
    }
}
