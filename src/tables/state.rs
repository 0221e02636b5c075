//! The jurisdiction enumeration premium tax, and nothing else in this crate, cares about.

use crate::error::LmiError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The 50 states, DC, Puerto Rico, and fictitious state `XX` used for business written where
/// no premium tax applies (offshore, or not-yet-classified).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum State {
    AL, AK, AZ, AR, CA, CO, CT, DE, DC, FL, GA, HI, ID, IL, IN, IA, KS, KY, LA, ME, MD, MA, MI,
    MN, MS, MO, MT, NE, NV, NH, NJ, NM, NY, NC, ND, OH, OK, OR, PA, PR, RI, SC, SD, TN, TX, UT,
    VT, VA, WA, WV, WI, WY,
    /// No premium tax applies.
    XX,
}

impl State {
    pub const ALL: [State; 53] = [
        State::AL, State::AK, State::AZ, State::AR, State::CA, State::CO, State::CT, State::DE,
        State::DC, State::FL, State::GA, State::HI, State::ID, State::IL, State::IN, State::IA,
        State::KS, State::KY, State::LA, State::ME, State::MD, State::MA, State::MI, State::MN,
        State::MS, State::MO, State::MT, State::NE, State::NV, State::NH, State::NJ, State::NM,
        State::NY, State::NC, State::ND, State::OH, State::OK, State::OR, State::PA, State::PR,
        State::RI, State::SC, State::SD, State::TN, State::TX, State::UT, State::VT, State::VA,
        State::WA, State::WV, State::WI, State::WY, State::XX,
    ];

    pub fn code(self) -> &'static str {
        match self {
            State::AL => "AL", State::AK => "AK", State::AZ => "AZ", State::AR => "AR",
            State::CA => "CA", State::CO => "CO", State::CT => "CT", State::DE => "DE",
            State::DC => "DC", State::FL => "FL", State::GA => "GA", State::HI => "HI",
            State::ID => "ID", State::IL => "IL", State::IN => "IN", State::IA => "IA",
            State::KS => "KS", State::KY => "KY", State::LA => "LA", State::ME => "ME",
            State::MD => "MD", State::MA => "MA", State::MI => "MI", State::MN => "MN",
            State::MS => "MS", State::MO => "MO", State::MT => "MT", State::NE => "NE",
            State::NV => "NV", State::NH => "NH", State::NJ => "NJ", State::NM => "NM",
            State::NY => "NY", State::NC => "NC", State::ND => "ND", State::OH => "OH",
            State::OK => "OK", State::OR => "OR", State::PA => "PA", State::PR => "PR",
            State::RI => "RI", State::SC => "SC", State::SD => "SD", State::TN => "TN",
            State::TX => "TX", State::UT => "UT", State::VT => "VT", State::VA => "VA",
            State::WA => "WA", State::WV => "WV", State::WI => "WI", State::WY => "WY",
            State::XX => "XX",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for State {
    type Err = LmiError;

    fn from_str(s: &str) -> Result<State, LmiError> {
        State::ALL
            .iter()
            .copied()
            .find(|state| state.code().eq_ignore_ascii_case(s))
            .ok_or_else(|| LmiError::Invariant(format!("unrecognized state code: {s:?}")))
    }
}
