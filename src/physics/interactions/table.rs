// src/physics/interactions/table.rs

use crate::model::SubspeciesPair;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Composite key of one coefficient, ordered field by field.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InteractionKey {
    pub pair: SubspeciesPair,
    /// Distance group, when a distance filter was applied.
    pub group: Option<String>,
    /// Shell rank local to `pair` (and `group`), 0 = closest.
    pub rank: usize,
    pub pattern: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InteractionParameter {
    pub key: InteractionKey,
    /// Coupling name shared by every pattern, e.g. `J1_Fe1-Fe2`.
    pub name: String,
    /// `{pattern}:{name}`, unique per key.
    pub label: String,
    /// Representative distance of the shell.
    pub distance: f64,
    pub value: f64,
}

impl InteractionParameter {
    pub(crate) fn new(key: InteractionKey, name: String, distance: f64, value: f64) -> Self {
        let label = parameter_label(&key.pattern, &name);
        Self {
            key,
            name,
            label,
            distance,
            value,
        }
    }
}

/// Coupling name for a pair at a local shell rank.
///
/// `prefixed` adds the distance group when several groups exist:
/// `J{group}.{rank+1}_{a}-{b}`, otherwise `J{rank+1}_{a}-{b}`.
pub fn parameter_name(pair: &SubspeciesPair, group: Option<&str>, rank: usize, prefixed: bool) -> String {
    match group {
        Some(group) if prefixed => format!("J{}.{}_{}", group, rank + 1, pair),
        _ => format!("J{}_{}", rank + 1, pair),
    }
}

pub fn parameter_label(pattern: &str, name: &str) -> String {
    format!("{}:{}", pattern, name)
}

/// Coefficient table in long form, sorted by [`InteractionKey`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InteractionCoefficients {
    parameters: Vec<InteractionParameter>,
}

impl InteractionCoefficients {
    pub(crate) fn from_parameters(mut parameters: Vec<InteractionParameter>) -> Self {
        parameters.sort_by(|a, b| a.key.cmp(&b.key));
        Self { parameters }
    }

    pub fn parameters(&self) -> &[InteractionParameter] {
        &self.parameters
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn get(&self, key: &InteractionKey) -> Option<&InteractionParameter> {
        self.parameters
            .binary_search_by(|p| p.key.cmp(key))
            .ok()
            .map(|i| &self.parameters[i])
    }

    pub fn value(&self, pattern: &str, name: &str) -> Option<f64> {
        self.parameters
            .iter()
            .find(|p| p.key.pattern == pattern && p.name == name)
            .map(|p| p.value)
    }

    pub fn patterns(&self) -> BTreeSet<&str> {
        self.parameters.iter().map(|p| p.key.pattern.as_str()).collect()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.parameters.iter().map(|p| p.label.as_str())
    }

    pub fn to_wide(&self) -> WideTable {
        WideTable::from_long(&self.parameters)
    }
}

/// Column of the wide table: one coupling, all patterns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterColumn {
    pub name: String,
    pub pair: SubspeciesPair,
    pub group: Option<String>,
    pub rank: usize,
    pub distance: f64,
}

/// Rows are patterns, columns are coupling names. A missing combination is
/// `None` rather than zero so that the long form comes back unchanged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WideTable {
    pub columns: Vec<ParameterColumn>,
    pub patterns: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl WideTable {
    pub fn from_long(parameters: &[InteractionParameter]) -> Self {
        let mut columns: BTreeMap<(&SubspeciesPair, &Option<String>, usize), ParameterColumn> = BTreeMap::new();
        let mut patterns: BTreeSet<&str> = BTreeSet::new();
        for p in parameters {
            columns
                .entry((&p.key.pair, &p.key.group, p.key.rank))
                .or_insert_with(|| ParameterColumn {
                    name: p.name.clone(),
                    pair: p.key.pair.clone(),
                    group: p.key.group.clone(),
                    rank: p.key.rank,
                    distance: p.distance,
                });
            patterns.insert(&p.key.pattern);
        }

        let column_index: BTreeMap<_, usize> = columns.keys().enumerate().map(|(i, k)| (*k, i)).collect();
        let row_index: BTreeMap<&str, usize> = patterns.iter().enumerate().map(|(i, p)| (*p, i)).collect();

        let mut values = vec![vec![None; columns.len()]; patterns.len()];
        for p in parameters {
            let row = row_index[p.key.pattern.as_str()];
            let col = column_index[&(&p.key.pair, &p.key.group, p.key.rank)];
            values[row][col] = Some(p.value);
        }

        WideTable {
            columns: columns.into_values().collect(),
            patterns: patterns.into_iter().map(str::to_string).collect(),
            values,
        }
    }

    /// Long form in key order.
    pub fn to_long(&self) -> Vec<InteractionParameter> {
        let mut long = Vec::new();
        for (row, pattern) in self.patterns.iter().enumerate() {
            for (col, column) in self.columns.iter().enumerate() {
                if let Some(value) = self.values[row][col] {
                    let key = InteractionKey {
                        pair: column.pair.clone(),
                        group: column.group.clone(),
                        rank: column.rank,
                        pattern: pattern.clone(),
                    };
                    long.push(InteractionParameter::new(key, column.name.clone(), column.distance, value));
                }
            }
        }
        long.sort_by(|a, b| a.key.cmp(&b.key));
        long
    }

    pub fn row(&self, pattern: &str) -> Option<&[Option<f64>]> {
        let row = self.patterns.iter().position(|p| p == pattern)?;
        Some(&self.values[row])
    }
}
