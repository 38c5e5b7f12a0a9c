use log::{debug, info};

use std::collections::HashMap;
use std::hash::Hash;

use rand::seq::index;
use rand::Rng;

use crate::config::{ControlSizing, EngineError, EngineResult, SplitGroups};

/// Lowest control fraction accepted from callers.
pub const MIN_CONTROL_FRACTION: f64 = 0.10;
/// Highest control fraction accepted from callers.
pub const MAX_CONTROL_FRACTION: f64 = 0.50;

/// Partitions `records` into disjoint control and treatment groups.
///
/// The control group is a uniform draw without replacement; everything else
/// is treatment. The draw is governed by the caller's RNG so tests can seed
/// it. Empty and single-record lists are valid inputs: the fraction rounding
/// rule (half away from zero) decides whether the lone record lands in
/// control.
pub fn split_groups<T: Clone, R: Rng>(
    records: &[T],
    sizing: ControlSizing,
    rng: &mut R,
) -> EngineResult<SplitGroups<T>> {
    let n = records.len();
    let target = control_target(n, sizing)?;
    info!(
        "split_groups: drawing control of {} from {} records",
        target, n
    );

    let mut in_control = vec![false; n];
    for idx in index::sample(rng, n, target) {
        in_control[idx] = true;
    }
    let groups = partition_by_mask(records, &in_control);
    check_partition(n, &groups)?;
    Ok(groups)
}

/// Stratified variant: records are bucketed by `stratum_key` and the control
/// fraction is drawn independently within each bucket.
///
/// This is naive proportional stratification: subgroup proportions are
/// preserved between the arms, but subgroup sizes are not balanced across
/// strata. Strata with 0 or 1 members never error; the rounding rule applies
/// to each of them separately.
pub fn split_stratified<T, K, F, R>(
    records: &[T],
    sizing: ControlSizing,
    stratum_key: F,
    rng: &mut R,
) -> EngineResult<SplitGroups<T>>
where
    T: Clone,
    K: Hash + Eq,
    F: Fn(&T) -> K,
    R: Rng,
{
    let fraction = match sizing {
        ControlSizing::Fraction(f) => {
            validate_fraction(f)?;
            f
        }
        // Two unreconciled sizing mechanisms would be worse than one
        // restriction. An absolute count has no per-stratum meaning here.
        ControlSizing::Count(_) => return Err(EngineError::CountWithStratification),
    };

    let n = records.len();
    // Strata in encounter order, each holding the indices of its members.
    let mut stratum_pos: HashMap<K, usize> = HashMap::new();
    let mut strata: Vec<Vec<usize>> = Vec::new();
    for (idx, record) in records.iter().enumerate() {
        let key = stratum_key(record);
        let pos = *stratum_pos.entry(key).or_insert_with(|| {
            strata.push(Vec::new());
            strata.len() - 1
        });
        strata[pos].push(idx);
    }
    info!(
        "split_stratified: {} records across {} strata, fraction {}",
        n,
        strata.len(),
        fraction
    );

    let mut in_control = vec![false; n];
    for members in strata.iter() {
        let target = round_half_away(fraction * members.len() as f64);
        debug!(
            "split_stratified: stratum of {} draws {} controls",
            members.len(),
            target
        );
        for drawn in index::sample(rng, members.len(), target.min(members.len())) {
            in_control[members[drawn]] = true;
        }
    }
    let groups = partition_by_mask(records, &in_control);
    check_partition(n, &groups)?;
    Ok(groups)
}

fn control_target(n: usize, sizing: ControlSizing) -> EngineResult<usize> {
    match sizing {
        ControlSizing::Fraction(f) => {
            validate_fraction(f)?;
            Ok(round_half_away(f * n as f64).min(n))
        }
        ControlSizing::Count(c) => Ok(c.min(n)),
    }
}

fn validate_fraction(f: f64) -> EngineResult<()> {
    if !f.is_finite() || !(MIN_CONTROL_FRACTION..=MAX_CONTROL_FRACTION).contains(&f) {
        return Err(EngineError::InvalidControlFraction(f));
    }
    Ok(())
}

// Rounding rule for control sizing: round half away from zero.
// f64::round has exactly this behavior for the non-negative inputs here.
fn round_half_away(x: f64) -> usize {
    x.round() as usize
}

fn partition_by_mask<T: Clone>(records: &[T], in_control: &[bool]) -> SplitGroups<T> {
    let mut control = Vec::new();
    let mut treatment = Vec::new();
    for (record, flag) in records.iter().zip(in_control.iter()) {
        if *flag {
            control.push(record.clone());
        } else {
            treatment.push(record.clone());
        }
    }
    SplitGroups { control, treatment }
}

fn check_partition<T>(expected: usize, groups: &SplitGroups<T>) -> EngineResult<()> {
    if groups.control.len() + groups.treatment.len() != expected {
        return Err(EngineError::PartitionMismatch {
            expected,
            control: groups.control.len(),
            treatment: groups.treatment.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(0xC0FFEE)
    }

    #[test]
    fn partition_invariant_across_sizes() {
        for n in [0usize, 1, 2, 9, 10, 11, 100] {
            let records: Vec<usize> = (0..n).collect();
            let groups =
                split_groups(&records, ControlSizing::Fraction(0.10), &mut rng()).unwrap();
            assert_eq!(groups.control.len() + groups.treatment.len(), n);
            let control: HashSet<usize> = groups.control.iter().cloned().collect();
            let treatment: HashSet<usize> = groups.treatment.iter().cloned().collect();
            assert!(control.is_disjoint(&treatment), "overlap for n={}", n);
        }
    }

    #[test]
    fn default_fraction_draws_ten_percent() {
        let records: Vec<usize> = (0..200).collect();
        let groups = split_groups(&records, ControlSizing::DEFAULT, &mut rng()).unwrap();
        assert_eq!(groups.control.len(), 20);
        assert_eq!(groups.treatment.len(), 180);
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        // 0.10 * 5 = 0.5 rounds up to 1.
        let records: Vec<usize> = (0..5).collect();
        let groups = split_groups(&records, ControlSizing::Fraction(0.10), &mut rng()).unwrap();
        assert_eq!(groups.control.len(), 1);
    }

    #[test]
    fn absolute_count_is_capped_at_list_size() {
        let records: Vec<usize> = (0..7).collect();
        let groups = split_groups(&records, ControlSizing::Count(50), &mut rng()).unwrap();
        assert_eq!(groups.control.len(), 7);
        assert!(groups.treatment.is_empty());
    }

    #[test]
    fn fraction_outside_range_is_rejected() {
        let records: Vec<usize> = (0..10).collect();
        let err = split_groups(&records, ControlSizing::Fraction(0.7), &mut rng()).unwrap_err();
        assert_eq!(err, EngineError::InvalidControlFraction(0.7));
        let err = split_groups(&records, ControlSizing::Fraction(0.05), &mut rng()).unwrap_err();
        assert_eq!(err, EngineError::InvalidControlFraction(0.05));
    }

    #[test]
    fn seeded_draw_is_deterministic() {
        let records: Vec<usize> = (0..50).collect();
        let a = split_groups(&records, ControlSizing::DEFAULT, &mut rng()).unwrap();
        let b = split_groups(&records, ControlSizing::DEFAULT, &mut rng()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn stratified_preserves_subgroup_proportions() {
        // Two strata of 80 and 20 records at f=0.25 give 20 and 5 controls.
        let mut records: Vec<(&str, usize)> = Vec::new();
        records.extend((0..80).map(|i| ("a", i)));
        records.extend((0..20).map(|i| ("b", i)));
        let groups = split_stratified(
            &records,
            ControlSizing::Fraction(0.25),
            |r| r.0,
            &mut rng(),
        )
        .unwrap();
        let a_controls = groups.control.iter().filter(|r| r.0 == "a").count();
        let b_controls = groups.control.iter().filter(|r| r.0 == "b").count();
        assert_eq!(a_controls, 20);
        assert_eq!(b_controls, 5);
        assert_eq!(groups.control.len() + groups.treatment.len(), 100);
    }

    #[test]
    fn stratified_tolerates_tiny_strata() {
        // More strata than control slots; no stratum may error.
        let records: Vec<(usize, &str)> = (0..3).map(|i| (i, "x")).collect();
        let groups = split_stratified(
            &records,
            ControlSizing::Fraction(0.10),
            |r| r.0,
            &mut rng(),
        )
        .unwrap();
        assert_eq!(groups.control.len() + groups.treatment.len(), 3);
        // 0.10 * 1 rounds to zero in every stratum.
        assert!(groups.control.is_empty());
    }

    #[test]
    fn stratified_rejects_absolute_count() {
        let records: Vec<usize> = (0..10).collect();
        let err = split_stratified(&records, ControlSizing::Count(3), |r| *r % 2, &mut rng())
            .unwrap_err();
        assert_eq!(err, EngineError::CountWithStratification);
    }

    #[test]
    fn stratified_split_of_empty_list() {
        let records: Vec<usize> = Vec::new();
        let groups =
            split_stratified(&records, ControlSizing::DEFAULT, |r| *r, &mut rng()).unwrap();
        assert!(groups.control.is_empty());
        assert!(groups.treatment.is_empty());
    }
}
