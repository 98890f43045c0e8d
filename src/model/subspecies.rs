// src/model/subspecies.rs

use super::structure::Site;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

/// Label distinguishing otherwise equivalent sites (e.g. spin-up and
/// spin-down sublattices of the same element).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Subspecies(String);

impl Subspecies {
    pub fn new(label: impl Into<String>) -> Self {
        Subspecies(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Subspecies {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Subspecies {
    fn from(label: &str) -> Self {
        Subspecies::new(label)
    }
}

/// Unordered pair of subspecies, stored sorted so that `(A, B) == (B, A)`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubspeciesPair {
    low: Subspecies,
    high: Subspecies,
}

impl SubspeciesPair {
    pub fn new(a: Subspecies, b: Subspecies) -> Self {
        if a <= b {
            SubspeciesPair { low: a, high: b }
        } else {
            SubspeciesPair { low: b, high: a }
        }
    }

    pub fn low(&self) -> &Subspecies {
        &self.low
    }

    pub fn high(&self) -> &Subspecies {
        &self.high
    }
}

impl fmt::Display for SubspeciesPair {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}-{}", self.low, self.high)
    }
}

/// Rule used by [`label_subspecies`] to derive labels from species and index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentRule {
    /// Every site is labelled with its species name.
    Species,
    /// Listed sites get `species + n`, counting per species in index order;
    /// the rest keep the bare species name.
    Indices(Vec<usize>),
    /// Every site of the listed species gets `species + n`.
    Enumerate(Vec<String>),
    /// One label per site. Blank entries fall back to the species name.
    Explicit(Vec<String>),
    /// One group id per site (e.g. a crystallographic orbit). Sites get
    /// `species + ordinal`, where the ordinal ranks the group among the
    /// species' groups by first occurrence.
    Groups(Vec<usize>),
}

impl Default for AssignmentRule {
    fn default() -> Self {
        AssignmentRule::Species
    }
}

/// Apply `rule` to `sites`, returning relabelled copies.
///
/// Labels depend only on species, site index and the rule, so applying the
/// same rule to already labelled sites returns the same labels.
pub fn label_subspecies(sites: &[Site], rule: &AssignmentRule) -> Result<Vec<Site>> {
    let labels = subspecies_labels_for(sites, rule)?;
    Ok(sites
        .iter()
        .zip(labels)
        .map(|(site, label)| site.with_subspecies(label))
        .collect())
}

/// Distinct labels present among `sites`, in label order.
pub fn get_subspecies_labels(sites: &[Site]) -> BTreeSet<Subspecies> {
    sites.iter().map(|s| s.subspecies().clone()).collect()
}

fn subspecies_labels_for(sites: &[Site], rule: &AssignmentRule) -> Result<Vec<Subspecies>> {
    let n = sites.len();
    match rule {
        AssignmentRule::Species => Ok(sites.iter().map(|s| Subspecies::new(s.species())).collect()),

        AssignmentRule::Indices(indices) => {
            if let Some(&bad) = indices.iter().find(|&&i| i >= n) {
                return Err(Error::Configuration(format!(
                    "subspecies site index {} out of range for {} sites",
                    bad, n
                )));
            }
            let selected: HashSet<usize> = indices.iter().copied().collect();
            Ok(enumerate_where(sites, |site| selected.contains(&site.index())))
        }

        AssignmentRule::Enumerate(species) => {
            let wanted: HashSet<&str> = species.iter().map(String::as_str).collect();
            Ok(enumerate_where(sites, |site| wanted.contains(site.species())))
        }

        AssignmentRule::Explicit(labels) => {
            check_len("explicit subspecies labels", labels.len(), n)?;
            Ok(sites
                .iter()
                .zip(labels)
                .map(|(site, label)| {
                    let label = label.trim();
                    if label.is_empty() {
                        Subspecies::new(site.species())
                    } else {
                        Subspecies::new(label)
                    }
                })
                .collect())
        }

        AssignmentRule::Groups(groups) => {
            check_len("subspecies group ids", groups.len(), n)?;
            let mut ordinals: BTreeMap<(&str, usize), usize> = BTreeMap::new();
            let mut per_species: BTreeMap<&str, usize> = BTreeMap::new();
            let mut labels = Vec::with_capacity(n);
            for (site, &group) in sites.iter().zip(groups) {
                let species = site.species();
                let ordinal = *ordinals.entry((species, group)).or_insert_with(|| {
                    let count = per_species.entry(species).or_insert(0);
                    *count += 1;
                    *count
                });
                labels.push(Subspecies::new(format!("{}{}", species, ordinal)));
            }
            Ok(labels)
        }
    }
}

fn enumerate_where(sites: &[Site], mut selected: impl FnMut(&Site) -> bool) -> Vec<Subspecies> {
    let mut counter: BTreeMap<&str, usize> = BTreeMap::new();
    sites
        .iter()
        .map(|site| {
            if selected(site) {
                let count = counter.entry(site.species()).or_insert(0);
                *count += 1;
                Subspecies::new(format!("{}{}", site.species(), count))
            } else {
                Subspecies::new(site.species())
            }
        })
        .collect()
}

fn check_len(what: &str, given: usize, expected: usize) -> Result<()> {
    if given != expected {
        return Err(Error::Configuration(format!(
            "{} has {} entries but the structure has {} sites",
            what, given, expected
        )));
    }
    Ok(())
}
