//! Signed aggregation of neighbor counts into interaction coefficients.
//!
//! Every bond contributes the sign its pattern assigns to it. Contributions
//! are summed over sites into one coefficient per subspecies pair, distance
//! group, local shell rank and pattern. Local ranks restart at 0 for each
//! pair, so `J1_A-B` is the closest A-B shell even when other pairs have
//! closer shells.

use super::patterns::{Sign, SignPatternSpec, SignRule};
use super::table::{parameter_name, InteractionCoefficients, InteractionKey, InteractionParameter};
use crate::error::{Error, Result};
use crate::model::SubspeciesPair;
use crate::physics::neighbors::NeighborData;
use crate::physics::shells::DistanceShell;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Named groups of distances. A shell belongs to a group when its bin
/// contains one of the group's distances; shells in no group are dropped.
pub type DistanceFilter = BTreeMap<String, Vec<f64>>;

/// Separators of `J{group}.{rank}_{a}-{b}` and `{pattern}:{name}`. Labels and
/// group names may not contain them, pattern names may not contain `:`.
const RESERVED: &[char] = &['-', '.', ':'];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// Plain sum over all sites of the cell.
    #[default]
    Total,
    /// Sum divided by the number of sites in the cell.
    PerSite,
}

#[derive(Clone, Debug, Default)]
pub struct InteractionModelBuilder {
    distance_filter: Option<DistanceFilter>,
    normalization: Normalization,
}

/// One coupling column: a (pair, group, local rank) slot backed by a global
/// shell.
#[derive(Debug)]
struct Slot {
    pair: SubspeciesPair,
    group: Option<String>,
    rank: usize,
    distance: f64,
}

/// Build coefficients with no distance filter and total normalization.
pub fn build_model(data: &NeighborData, spec: &SignPatternSpec) -> Result<InteractionCoefficients> {
    InteractionModelBuilder::new().build(data, spec)
}

impl InteractionModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn distance_filter(mut self, filter: Option<DistanceFilter>) -> Self {
        self.distance_filter = filter;
        self
    }

    pub fn normalization(mut self, normalization: Normalization) -> Self {
        self.normalization = normalization;
        self
    }

    pub fn build(&self, data: &NeighborData, spec: &SignPatternSpec) -> Result<InteractionCoefficients> {
        self.check_names(data, spec)?;
        for (name, rule) in spec.iter() {
            rule.validate(name, data)?;
        }
        if spec.is_empty() {
            return Err(Error::EmptyModel("no sign patterns were given".to_string()));
        }
        if data.is_empty() {
            return Err(Error::EmptyModel(format!(
                "no neighbors within the cutoff of {:.3} Å",
                data.cutoff()
            )));
        }

        let groups = self.shell_groups(data.shells());
        let (slots, bond_slots) = assign_slots(data, &groups);
        if slots.is_empty() {
            return Err(Error::EmptyModel(
                "the distance filter does not select any neighbor shell".to_string(),
            ));
        }
        log::debug!(
            "interaction model: {} couplings over {} distance group(s), {} pattern(s)",
            slots.len(),
            groups.len(),
            spec.len()
        );

        let scale = match self.normalization {
            Normalization::Total => 1.0,
            Normalization::PerSite => 1.0 / data.num_sites() as f64,
        };
        let prefixed = groups.len() > 1;
        let names: Vec<String> = slots
            .iter()
            .map(|s| parameter_name(&s.pair, s.group.as_deref(), s.rank, prefixed))
            .collect();

        let rules: Vec<(&str, &SignRule)> = spec.iter().collect();
        let parameters: Vec<InteractionParameter> = rules
            .par_iter()
            .flat_map_iter(|&(pattern, rule)| {
                let totals = signed_totals(data, rule, &bond_slots, slots.len());
                let names = &names;
                slots.iter().enumerate().map(move |(i, slot)| {
                    let key = InteractionKey {
                        pair: slot.pair.clone(),
                        group: slot.group.clone(),
                        rank: slot.rank,
                        pattern: pattern.to_string(),
                    };
                    InteractionParameter::new(key, names[i].clone(), slot.distance, totals[i] as f64 * scale)
                })
            })
            .collect();

        log::info!("interaction model: {} parameters", parameters.len());
        Ok(InteractionCoefficients::from_parameters(parameters))
    }

    /// Reject names that would make two parameter labels coincide.
    fn check_names(&self, data: &NeighborData, spec: &SignPatternSpec) -> Result<()> {
        if let Some(label) = data.labels().iter().find(|l| l.as_str().contains(RESERVED)) {
            return Err(Error::Configuration(format!(
                "subspecies label '{}' contains one of {:?}",
                label, RESERVED
            )));
        }
        if let Some((name, _)) = spec.iter().find(|(name, _)| name.contains(':')) {
            return Err(Error::UnknownPattern {
                pattern: name.to_string(),
                detail: "pattern names cannot contain ':'".to_string(),
            });
        }
        let mut groups = self.distance_filter.iter().flat_map(|f| f.keys());
        if let Some(group) = groups.find(|g| g.is_empty() || g.contains(RESERVED)) {
            return Err(Error::Configuration(format!(
                "distance group name '{}' is empty or contains one of {:?}",
                group, RESERVED
            )));
        }
        Ok(())
    }

    /// Global shell ranks per distance group. Without a filter there is a
    /// single unnamed group holding every shell.
    fn shell_groups(&self, shells: &[DistanceShell]) -> Vec<(Option<String>, BTreeSet<usize>)> {
        let Some(filter) = &self.distance_filter else {
            return vec![(None, shells.iter().map(|s| s.rank).collect())];
        };

        filter
            .iter()
            .map(|(name, distances)| {
                let selected: BTreeSet<usize> = shells
                    .iter()
                    .filter(|s| distances.iter().any(|&d| s.contains(d)))
                    .map(|s| s.rank)
                    .collect();
                if selected.is_empty() {
                    log::warn!("distance group '{}' matches no neighbor shell", name);
                }
                (Some(name.clone()), selected)
            })
            .collect()
    }
}

/// Re-rank the shells each pair actually occupies, per group, and map every
/// bond onto the slots it feeds. A bond feeds one slot per group containing
/// its shell.
fn assign_slots(data: &NeighborData, groups: &[(Option<String>, BTreeSet<usize>)]) -> (Vec<Slot>, Vec<Vec<usize>>) {
    let pairs: Vec<SubspeciesPair> = data.bonds().iter().map(|b| b.pair()).collect();

    let mut occupied: BTreeMap<(&SubspeciesPair, usize), BTreeSet<usize>> = BTreeMap::new();
    for (bond, pair) in data.bonds().iter().zip(&pairs) {
        for (g, (_, shells)) in groups.iter().enumerate() {
            if shells.contains(&bond.shell) {
                occupied.entry((pair, g)).or_default().insert(bond.shell);
            }
        }
    }

    let mut slots = Vec::new();
    let mut lookup: BTreeMap<(&SubspeciesPair, usize, usize), usize> = BTreeMap::new();
    for ((pair, g), shells) in &occupied {
        for (rank, &shell) in shells.iter().enumerate() {
            lookup.insert((*pair, *g, shell), slots.len());
            slots.push(Slot {
                pair: (*pair).clone(),
                group: groups[*g].0.clone(),
                rank,
                distance: data.shells()[shell].distance,
            });
        }
    }

    let bond_slots = data
        .bonds()
        .iter()
        .zip(&pairs)
        .map(|(bond, pair)| {
            (0..groups.len())
                .filter_map(|g| lookup.get(&(pair, g, bond.shell)).copied())
                .collect()
        })
        .collect();

    (slots, bond_slots)
}

/// Per-slot sum of sign × count, where counts are taken per
/// (site, slot, sign).
fn signed_totals(data: &NeighborData, rule: &SignRule, bond_slots: &[Vec<usize>], num_slots: usize) -> Vec<i64> {
    let mut counts: BTreeMap<(usize, usize, Sign), usize> = BTreeMap::new();
    for (bond, slots) in data.bonds().iter().zip(bond_slots) {
        let sign = rule.sign(bond);
        for &slot in slots {
            *counts.entry((bond.site, slot, sign)).or_insert(0) += 1;
        }
    }

    let mut totals = vec![0i64; num_slots];
    for ((_, slot, sign), count) in counts {
        totals[slot] += sign.value() * count as i64;
    }
    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{StructureModel, Subspecies};
    use crate::physics::interactions::patterns::PairSign;
    use crate::physics::count_neighbors;

    fn chain(cutoff: f64) -> NeighborData {
        let s = StructureModel::new(
            [[1.0, 0.0, 0.0], [0.0, 10.0, 0.0], [0.0, 0.0, 10.0]],
            vec![("Fe".to_string(), None, [0.0; 3])],
            [true; 3],
        )
        .unwrap();
        count_neighbors(&s, cutoff, 0.01).unwrap()
    }

    /// A-B-A-B chain with a = 2: A-B at 1 Å (global shell 0), A-A and B-B at
    /// 2 Å (global shell 1).
    fn ab_chain() -> NeighborData {
        let s = StructureModel::new(
            [[2.0, 0.0, 0.0], [0.0, 10.0, 0.0], [0.0, 0.0, 10.0]],
            vec![
                ("Mn".to_string(), Some("A".into()), [0.0, 0.0, 0.0]),
                ("Mn".to_string(), Some("B".into()), [1.0, 0.0, 0.0]),
            ],
            [true; 3],
        )
        .unwrap();
        count_neighbors(&s, 2.5, 0.01).unwrap()
    }

    fn afm() -> SignPatternSpec {
        SignPatternSpec::new().with(
            "antiferromagnetic",
            SignRule::SameSubspecies {
                same: Sign::Minus,
                different: Sign::Plus,
            },
        )
    }

    fn key(a: &str, b: &str, group: Option<&str>, rank: usize, pattern: &str) -> InteractionKey {
        InteractionKey {
            pair: SubspeciesPair::new(a.into(), b.into()),
            group: group.map(str::to_string),
            rank,
            pattern: pattern.to_string(),
        }
    }

    #[test]
    fn test_antiferromagnetic_chain() {
        let coeffs = build_model(&chain(1.5), &afm()).unwrap();
        assert_eq!(coeffs.len(), 1);
        let p = coeffs.get(&key("Fe", "Fe", None, 0, "antiferromagnetic")).unwrap();
        assert_eq!(p.value, -2.0);
        assert_eq!(p.name, "J1_Fe-Fe");
        assert_eq!(p.label, "antiferromagnetic:J1_Fe-Fe");
        assert!((p.distance - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_ranks_are_local_to_each_pair() {
        let spec = SignPatternSpec::new().with("fm", SignRule::ferromagnetic());
        let coeffs = build_model(&ab_chain(), &spec).unwrap();

        let names: Vec<&str> = coeffs.parameters().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["J1_A-A", "J1_A-B", "J1_B-B"]);
        let aa = coeffs.get(&key("A", "A", None, 0, "fm")).unwrap();
        assert!((aa.distance - 2.0).abs() < 1e-12);
        assert_eq!(aa.value, 2.0);
        // both sites see two neighbors of the other sublattice
        assert_eq!(coeffs.value("fm", "J1_A-B"), Some(4.0));
    }

    #[test]
    fn test_site_spins_and_per_site_normalization() {
        let spec = SignPatternSpec::from_site_spins(vec![("up-down", vec![1, -1])]).unwrap();
        let data = ab_chain();

        let total = build_model(&data, &spec).unwrap();
        assert_eq!(total.value("up-down", "J1_A-B"), Some(-4.0));
        assert_eq!(total.value("up-down", "J1_A-A"), Some(2.0));

        let per_site = InteractionModelBuilder::new()
            .normalization(Normalization::PerSite)
            .build(&data, &spec)
            .unwrap();
        assert_eq!(per_site.value("up-down", "J1_A-B"), Some(-2.0));
        assert_eq!(per_site.value("up-down", "J1_A-A"), Some(1.0));
    }

    #[test]
    fn test_labels_are_a_bijection_with_keys() {
        let spec = SignPatternSpec::new()
            .with("fm", SignRule::ferromagnetic())
            .with("afm", SignRule::SameSubspecies { same: Sign::Plus, different: Sign::Minus });
        let coeffs = build_model(&ab_chain(), &spec).unwrap();

        let labels: BTreeSet<&str> = coeffs.labels().collect();
        let keys: BTreeSet<&InteractionKey> = coeffs.parameters().iter().map(|p| &p.key).collect();
        assert_eq!(labels.len(), coeffs.len());
        assert_eq!(keys.len(), coeffs.len());
        // every pattern carries every coupling
        assert_eq!(coeffs.len(), 2 * 3);

        let again = build_model(&ab_chain(), &spec).unwrap();
        assert_eq!(coeffs, again);
    }

    #[test]
    fn test_wide_round_trip() {
        let spec = SignPatternSpec::new()
            .with("fm", SignRule::ferromagnetic())
            .with("afm", SignRule::SameSubspecies { same: Sign::Plus, different: Sign::Minus });
        let coeffs = build_model(&ab_chain(), &spec).unwrap();
        let wide = coeffs.to_wide();

        assert_eq!(wide.patterns, vec!["afm", "fm"]);
        assert_eq!(wide.columns.len(), 3);
        assert_eq!(wide.row("afm").unwrap(), &[Some(2.0), Some(-4.0), Some(2.0)]);
        assert_eq!(wide.to_long(), coeffs.parameters());
    }

    #[test]
    fn test_staggered_flips_intercell_bonds() {
        let spec = SignPatternSpec::new().with(
            "doubled-a",
            SignRule::Staggered {
                base: Box::new(SignRule::ferromagnetic()),
                axes: [true, false, false],
            },
        );
        let coeffs = build_model(&chain(2.5), &spec).unwrap();
        assert_eq!(coeffs.value("doubled-a", "J1_Fe-Fe"), Some(-2.0));
        assert_eq!(coeffs.value("doubled-a", "J2_Fe-Fe"), Some(2.0));
    }

    #[test]
    fn test_staggered_ignores_where_sites_are_stored() {
        let spec = SignPatternSpec::new().with(
            "doubled-a",
            SignRule::Staggered {
                base: Box::new(SignRule::ferromagnetic()),
                axes: [true, false, false],
            },
        );
        let value = |b_x: f64| {
            let s = StructureModel::new(
                [[3.0, 0.0, 0.0], [0.0, 10.0, 0.0], [0.0, 0.0, 10.0]],
                vec![
                    ("Mn".to_string(), Some("A".into()), [0.0, 0.0, 0.0]),
                    ("Mn".to_string(), Some("B".into()), [b_x, 0.0, 0.0]),
                ],
                [true; 3],
            )
            .unwrap();
            let data = count_neighbors(&s, 1.5, 0.01).unwrap();
            build_model(&data, &spec).unwrap().value("doubled-a", "J1_A-B")
        };
        // B at x = 1 and at x = -2 describe the same crystal
        assert_eq!(value(1.0), Some(2.0));
        assert_eq!(value(-2.0), Some(2.0));
    }

    #[test]
    fn test_separators_in_names_are_rejected() {
        let s = StructureModel::new(
            [[10.0, 0.0, 0.0], [0.0, 10.0, 0.0], [0.0, 0.0, 10.0]],
            vec![
                ("X".to_string(), Some("A-B".into()), [0.0, 0.0, 0.0]),
                ("X".to_string(), Some("C".into()), [1.0, 0.0, 0.0]),
                ("X".to_string(), Some("A".into()), [0.0, 5.0, 0.0]),
                ("X".to_string(), Some("B-C".into()), [1.0, 5.0, 0.0]),
            ],
            [true; 3],
        )
        .unwrap();
        let data = count_neighbors(&s, 1.5, 0.01).unwrap();
        let fm = SignPatternSpec::new().with("fm", SignRule::ferromagnetic());
        assert!(matches!(build_model(&data, &fm), Err(Error::Configuration(_))));

        let chain_data = chain(2.5);
        let spec = SignPatternSpec::new().with("fm:1", SignRule::ferromagnetic());
        assert!(matches!(build_model(&chain_data, &spec), Err(Error::UnknownPattern { .. })));

        let mut filter = DistanceFilter::new();
        filter.insert("near.1".to_string(), vec![1.0]);
        let err = InteractionModelBuilder::new()
            .distance_filter(Some(filter))
            .build(&chain_data, &fm)
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_distance_filter_groups() {
        let data = chain(2.5);
        let spec = SignPatternSpec::new().with("fm", SignRule::ferromagnetic());

        let mut single = DistanceFilter::new();
        single.insert("nn".to_string(), vec![1.0]);
        let coeffs = InteractionModelBuilder::new()
            .distance_filter(Some(single))
            .build(&data, &spec)
            .unwrap();
        assert_eq!(coeffs.len(), 1);
        assert_eq!(coeffs.parameters()[0].name, "J1_Fe-Fe");
        assert_eq!(coeffs.parameters()[0].key.group.as_deref(), Some("nn"));

        let mut two = DistanceFilter::new();
        two.insert("a".to_string(), vec![1.02]);
        two.insert("b".to_string(), vec![1.9]);
        let coeffs = InteractionModelBuilder::new()
            .distance_filter(Some(two))
            .build(&data, &spec)
            .unwrap();
        let names: Vec<&str> = coeffs.parameters().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Ja.1_Fe-Fe", "Jb.1_Fe-Fe"]);
        assert!((coeffs.get(&key("Fe", "Fe", Some("b"), 0, "fm")).unwrap().distance - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_filter_without_matching_shell_is_empty() {
        let mut filter = DistanceFilter::new();
        filter.insert("far".to_string(), vec![7.0]);
        let err = InteractionModelBuilder::new()
            .distance_filter(Some(filter))
            .build(&chain(2.5), &afm())
            .unwrap_err();
        assert!(matches!(err, Error::EmptyModel(_)));
    }

    #[test]
    fn test_empty_inputs() {
        assert!(matches!(build_model(&chain(0.5), &afm()), Err(Error::EmptyModel(_))));
        assert!(matches!(
            build_model(&chain(1.5), &SignPatternSpec::new()),
            Err(Error::EmptyModel(_))
        ));
    }

    #[test]
    fn test_pattern_validation() {
        let data = ab_chain();

        let spec = SignPatternSpec::from_site_spins(vec![("short", vec![1, -1, 1])]).unwrap();
        assert!(matches!(
            build_model(&data, &spec),
            Err(Error::PatternSiteMismatch { given: 3, expected: 2, .. })
        ));

        let mut spins = BTreeMap::new();
        spins.insert(Subspecies::from("C"), Sign::Minus);
        let spec = SignPatternSpec::new().with("ghost", SignRule::SubspeciesSpins(spins));
        assert!(matches!(build_model(&data, &spec), Err(Error::UnknownPattern { .. })));

        let spec = SignPatternSpec::new().with(
            "pairs",
            SignRule::PairSigns {
                signs: vec![PairSign {
                    a: "A".into(),
                    b: "C".into(),
                    sign: Sign::Minus,
                }],
                default: Sign::Plus,
            },
        );
        assert!(matches!(build_model(&data, &spec), Err(Error::UnknownPattern { .. })));
    }
}
