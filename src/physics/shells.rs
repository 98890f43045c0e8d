use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A deduplicated neighbor distance, ranked by proximity (rank 0 = nearest).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DistanceShell {
    pub rank: usize,
    /// Mean of the merged raw distances.
    pub distance: f64,
    pub min_distance: f64,
    pub max_distance: f64,
    /// Bin interval `(lower, upper]` around `distance`.
    pub lower: f64,
    pub upper: f64,
}

impl DistanceShell {
    pub fn contains(&self, distance: f64) -> bool {
        self.lower < distance && distance <= self.upper
    }
}

/// Shells found among `distances` plus the shell rank of every input value.
#[derive(Clone, Debug, Default)]
pub struct ShellAssignment {
    pub shells: Vec<DistanceShell>,
    pub ranks: Vec<usize>,
}

/// Merge sorted distances into shells.
///
/// Distances are sorted stably, so equal values keep their input order.
/// Consecutive values at most `tolerance` apart share a shell; a zero
/// tolerance only merges exactly equal values. Because merging chains
/// through consecutive values, the gap between two neighboring shells is
/// always larger than `tolerance`, and so is the gap between their means.
pub fn group_into_shells(distances: &[f64], tolerance: f64) -> ShellAssignment {
    if distances.is_empty() {
        return ShellAssignment::default();
    }

    let mut order: Vec<usize> = (0..distances.len()).collect();
    order.sort_by(|&a, &b| {
        distances[a]
            .partial_cmp(&distances[b])
            .unwrap_or(Ordering::Equal)
    });

    let mut ranks = vec![0; distances.len()];
    let mut members: Vec<Vec<f64>> = Vec::new();
    let mut previous: Option<f64> = None;

    for &idx in &order {
        let d = distances[idx];
        let starts_shell = match previous {
            Some(prev) => d - prev > tolerance,
            None => true,
        };
        if starts_shell {
            members.push(Vec::new());
        }
        let rank = members.len() - 1;
        members[rank].push(d);
        ranks[idx] = rank;
        previous = Some(d);
    }

    let centers: Vec<f64> = members
        .iter()
        .map(|m| m.iter().sum::<f64>() / m.len() as f64)
        .collect();
    let (lowers, uppers) = bin_edges(&centers);

    let shells = members
        .iter()
        .enumerate()
        .map(|(rank, m)| DistanceShell {
            rank,
            distance: centers[rank],
            min_distance: m.iter().cloned().fold(f64::INFINITY, f64::min),
            max_distance: m.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            lower: lowers[rank],
            upper: uppers[rank],
        })
        .collect();

    ShellAssignment { shells, ranks }
}

/// Bin edges halfway between consecutive centers, with an implicit center at
/// zero below the first shell. The last bin extends past its center by half
/// of the previous gap.
fn bin_edges(centers: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let mut padded = Vec::with_capacity(centers.len() + 1);
    padded.push(0.0);
    padded.extend_from_slice(centers);

    let lowers: Vec<f64> = padded.windows(2).map(|w| w[0] + (w[1] - w[0]) / 2.0).collect();
    let mut uppers: Vec<f64> = lowers.iter().skip(1).cloned().collect();
    if let [.., before, last] = padded.as_slice() {
        uppers.push(last + (last - before) / 2.0);
    }
    (lowers, uppers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_input_has_no_shells() {
        let a = group_into_shells(&[], 0.01);
        assert!(a.shells.is_empty());
        assert!(a.ranks.is_empty());
    }

    #[test]
    fn test_near_equal_values_merge() {
        let a = group_into_shells(&[2.0, 1.0, 1.004, 2.0, 3.0], 0.01);
        assert_eq!(a.shells.len(), 3);
        assert_eq!(a.ranks, vec![1, 0, 0, 1, 2]);
        assert!((a.shells[0].distance - 1.002).abs() < 1e-12);
        assert!((a.shells[0].min_distance - 1.0).abs() < 1e-12);
        assert!((a.shells[0].max_distance - 1.004).abs() < 1e-12);
    }

    #[test]
    fn test_zero_tolerance_keeps_distinct_values() {
        let a = group_into_shells(&[1.0, 1.0 + 1e-9, 1.0], 0.0);
        assert_eq!(a.shells.len(), 2);
        assert_eq!(a.ranks, vec![0, 1, 0]);
    }

    #[test]
    fn test_bin_edges() {
        let a = group_into_shells(&[1.0, 2.0, 4.0], 0.01);
        let bins: Vec<(f64, f64)> = a.shells.iter().map(|s| (s.lower, s.upper)).collect();
        assert_eq!(bins, vec![(0.5, 1.5), (1.5, 3.0), (3.0, 5.0)]);
        assert!(a.shells[1].contains(3.0));
        assert!(!a.shells[2].contains(3.0));
    }

    #[test]
    fn test_single_shell_bin() {
        let a = group_into_shells(&[2.0, 2.0], 0.01);
        assert_eq!((a.shells[0].lower, a.shells[0].upper), (1.0, 3.0));
    }

    proptest! {
        #[test]
        fn test_shells_are_separated_by_more_than_tolerance(
            distances in prop::collection::vec(0.5f64..6.0, 1..80),
            tolerance in 0.0f64..0.3,
        ) {
            let a = group_into_shells(&distances, tolerance);
            for pair in a.shells.windows(2) {
                prop_assert!(pair[1].distance > pair[0].distance);
                prop_assert!(pair[1].distance - pair[0].distance > tolerance);
                prop_assert!(pair[1].min_distance - pair[0].max_distance > tolerance);
            }
            for (d, &rank) in distances.iter().zip(&a.ranks) {
                let shell = &a.shells[rank];
                prop_assert!(*d >= shell.min_distance && *d <= shell.max_distance);
            }
        }
    }
}
