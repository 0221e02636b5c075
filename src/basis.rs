//! The bases every rate and load table is keyed by.

use serde::{Deserialize, Serialize};

/// General-account basis: which assumption set a rate or load was computed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GenBasis {
    Current,
    Midpoint,
    Guaranteed,
}

impl GenBasis {
    pub const ALL: [GenBasis; 3] = [GenBasis::Current, GenBasis::Midpoint, GenBasis::Guaranteed];

    pub fn index(self) -> usize {
        match self {
            GenBasis::Current => 0,
            GenBasis::Midpoint => 1,
            GenBasis::Guaranteed => 2,
        }
    }
}

/// Separate-account basis: how the separate-account rate is derived from case-level assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SepBasis {
    /// Use the input (illustrated) separate-account rate as given.
    Input,
    /// Use half of the input rate, a conservative midpoint convention.
    HalfInput,
    /// Assume a zero separate-account rate, the most conservative case.
    Zero,
}

impl SepBasis {
    pub const ALL: [SepBasis; 3] = [SepBasis::Input, SepBasis::HalfInput, SepBasis::Zero];

    pub fn index(self) -> usize {
        match self {
            SepBasis::Input => 0,
            SepBasis::HalfInput => 1,
            SepBasis::Zero => 2,
        }
    }
}

/// Annual vs. monthly rate period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RatePeriod {
    Annual,
    Monthly,
}
