// src/physics/interactions/patterns.rs

use crate::error::{Error, Result};
use crate::model::{Subspecies, SubspeciesPair};
use crate::physics::neighbors::{Bond, NeighborData};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// +1 / −1. Serialized as the integer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum Sign {
    Plus,
    Minus,
}

/// Collinear spin orientation; up is `Plus`.
pub type Spin = Sign;

impl Sign {
    pub fn value(self) -> i64 {
        match self {
            Sign::Plus => 1,
            Sign::Minus => -1,
        }
    }

    pub fn times(self, other: Sign) -> Sign {
        if self == other {
            Sign::Plus
        } else {
            Sign::Minus
        }
    }

    pub fn flipped(self) -> Sign {
        self.times(Sign::Minus)
    }
}

impl TryFrom<i8> for Sign {
    type Error = String;

    fn try_from(value: i8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(Sign::Plus),
            -1 => Ok(Sign::Minus),
            other => Err(format!("sign must be 1 or -1, got {}", other)),
        }
    }
}

impl From<Sign> for i8 {
    fn from(sign: Sign) -> i8 {
        sign.value() as i8
    }
}

impl fmt::Display for Sign {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Sign::Plus => "+1",
            Sign::Minus => "-1",
        })
    }
}

fn plus() -> Sign {
    Sign::Plus
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PairSign {
    pub a: Subspecies,
    pub b: Subspecies,
    pub sign: Sign,
}

/// Maps one neighbor relation onto +1/−1 for a candidate magnetic
/// configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignRule {
    /// One spin per site; the sign is `spin_i * spin_j`.
    SiteSpins(Vec<Spin>),
    /// One spin per subspecies; unmapped subspecies are spin up.
    SubspeciesSpins(BTreeMap<Subspecies, Spin>),
    /// Sign per unordered subspecies pair, `default` elsewhere.
    PairSigns {
        signs: Vec<PairSign>,
        #[serde(default = "plus")]
        default: Sign,
    },
    /// One sign for bonds within a subspecies, another across subspecies.
    SameSubspecies { same: Sign, different: Sign },
    /// `base` flipped once per lattice translation between home cells along
    /// each flagged axis, i.e. a configuration doubled along those axes.
    Staggered { base: Box<SignRule>, axes: [bool; 3] },
}

impl SignRule {
    /// Ferromagnetic: every bond +1.
    pub fn ferromagnetic() -> Self {
        SignRule::SameSubspecies {
            same: Sign::Plus,
            different: Sign::Plus,
        }
    }

    pub fn sign(&self, bond: &Bond) -> Sign {
        match self {
            SignRule::SiteSpins(spins) => spins[bond.site].times(spins[bond.neighbor]),
            SignRule::SubspeciesSpins(spins) => {
                let spin = |label: &Subspecies| spins.get(label).copied().unwrap_or(Sign::Plus);
                spin(&bond.site_subspecies).times(spin(&bond.neighbor_subspecies))
            }
            SignRule::PairSigns { signs, default } => {
                let pair = bond.pair();
                signs
                    .iter()
                    .find(|s| SubspeciesPair::new(s.a.clone(), s.b.clone()) == pair)
                    .map_or(*default, |s| s.sign)
            }
            SignRule::SameSubspecies { same, different } => {
                if bond.site_subspecies == bond.neighbor_subspecies {
                    *same
                } else {
                    *different
                }
            }
            SignRule::Staggered { base, axes } => {
                let translations: i64 = (0..3)
                    .filter(|&k| axes[k])
                    .map(|k| bond.image[k] as i64)
                    .sum();
                let sign = base.sign(bond);
                if translations.rem_euclid(2) == 1 {
                    sign.flipped()
                } else {
                    sign
                }
            }
        }
    }

    /// Check that the rule only refers to sites, labels and pairs present
    /// in `data`.
    pub fn validate(&self, pattern: &str, data: &NeighborData) -> Result<()> {
        match self {
            SignRule::SiteSpins(spins) => {
                if spins.len() != data.num_sites() {
                    return Err(Error::PatternSiteMismatch {
                        pattern: pattern.to_string(),
                        given: spins.len(),
                        expected: data.num_sites(),
                    });
                }
            }
            SignRule::SubspeciesSpins(spins) => {
                if let Some(label) = spins.keys().find(|l| !data.labels().contains(*l)) {
                    return Err(Error::UnknownPattern {
                        pattern: pattern.to_string(),
                        detail: format!("subspecies '{}' is not in the structure", label),
                    });
                }
            }
            SignRule::PairSigns { signs, .. } => {
                let present = data.pairs();
                for s in signs {
                    let pair = SubspeciesPair::new(s.a.clone(), s.b.clone());
                    if !present.contains(&pair) {
                        return Err(Error::UnknownPattern {
                            pattern: pattern.to_string(),
                            detail: format!("subspecies pair {} has no neighbors", pair),
                        });
                    }
                }
            }
            SignRule::SameSubspecies { .. } => {}
            SignRule::Staggered { base, .. } => base.validate(pattern, data)?,
        }
        Ok(())
    }
}

/// Named sign patterns, iterated in name order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignPatternSpec {
    patterns: BTreeMap<String, SignRule>,
}

impl SignPatternSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, rule: SignRule) -> Self {
        self.insert(name, rule);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, rule: SignRule) -> Option<SignRule> {
        self.patterns.insert(name.into(), rule)
    }

    /// One `SiteSpins` pattern per entry, spins given as ±1.
    pub fn from_site_spins<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Vec<i8>)>,
        S: Into<String>,
    {
        let mut spec = SignPatternSpec::new();
        for (name, spins) in patterns {
            let name = name.into();
            let spins = spins
                .into_iter()
                .map(Sign::try_from)
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|reason| Error::UnknownPattern {
                    pattern: name.clone(),
                    detail: reason,
                })?;
            spec.insert(name, SignRule::SiteSpins(spins));
        }
        Ok(spec)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SignRule)> {
        self.patterns.iter().map(|(name, rule)| (name.as_str(), rule))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
