use log::info;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::{EngineError, EngineResult};

/// Block length for the block-randomized outcome draw.
pub const BLOCK_SIZE: usize = 100;

/// Default range the injected treatment lift is drawn from.
pub const DEFAULT_LIFT_RANGE: (f64, f64) = (0.0, 0.05);

/// Assigns a 0/1 outcome to each of `n` records, block-randomized.
///
/// Each contiguous block of [`BLOCK_SIZE`] records (the final block may be
/// partial) receives exactly `round(rate * block_len)` positive outcomes,
/// shuffled within the block. Compared to a pure Bernoulli draw this trades
/// some statistical independence for a much tighter realized rate, which is
/// what makes it useful for exercising the analyzer: the realized lift stays
/// close to the injected one even at small n.
pub fn block_outcomes<R: Rng>(n: usize, rate: f64, rng: &mut R) -> EngineResult<Vec<u8>> {
    if !(0.0..=1.0).contains(&rate) || !rate.is_finite() {
        return Err(EngineError::RateOutOfRange(rate));
    }
    let mut outcomes: Vec<u8> = Vec::with_capacity(n);
    let mut start = 0;
    while start < n {
        let block_len = BLOCK_SIZE.min(n - start);
        let positives = (rate * block_len as f64).round() as usize;
        let mut block: Vec<u8> = vec![1; positives];
        block.resize(block_len, 0);
        block.shuffle(rng);
        outcomes.extend_from_slice(&block);
        start += block_len;
    }
    info!(
        "block_outcomes: {} records at rate {} -> {} positives",
        n,
        rate,
        outcomes.iter().filter(|&&b| b == 1).count()
    );
    Ok(outcomes)
}

/// Draws the injected treatment lift uniformly from `range`, both ends
/// included. Negative lifts are allowed; a reversed range is not, and a
/// degenerate range injects that exact lift.
pub fn draw_lift<R: Rng>(range: (f64, f64), rng: &mut R) -> EngineResult<f64> {
    let (lo, hi) = range;
    if !lo.is_finite() || !hi.is_finite() || lo > hi {
        return Err(EngineError::InvalidLiftRange(lo, hi));
    }
    if lo == hi {
        return Ok(lo);
    }
    Ok(rng.gen_range(lo..=hi))
}

/// The outcome rate for one arm: base rate, plus the lift for treatment.
/// The combined rate must still be a probability.
pub fn arm_rate(base_rate: f64, lift: Option<f64>) -> EngineResult<f64> {
    let rate = base_rate + lift.unwrap_or(0.0);
    if !(0.0..=1.0).contains(&rate) || !rate.is_finite() {
        return Err(EngineError::RateOutOfRange(rate));
    }
    Ok(rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn full_block_hits_the_rate_exactly() {
        let outcomes = block_outcomes(100, 0.3, &mut rng()).unwrap();
        assert_eq!(outcomes.len(), 100);
        let positives: usize = outcomes.iter().map(|&b| b as usize).sum();
        assert_eq!(positives, 30);
    }

    #[test]
    fn partial_final_block_rounds_its_own_count() {
        // 250 records: two full blocks of 30 positives, then round(0.3*50)=15.
        let outcomes = block_outcomes(250, 0.3, &mut rng()).unwrap();
        let positives: usize = outcomes.iter().map(|&b| b as usize).sum();
        assert_eq!(positives, 30 + 30 + 15);
        let tail: usize = outcomes[200..].iter().map(|&b| b as usize).sum();
        assert_eq!(tail, 15);
    }

    #[test]
    fn positives_are_shuffled_within_the_block() {
        let outcomes = block_outcomes(100, 0.3, &mut rng()).unwrap();
        // A sorted layout would put all 30 ones first.
        let head: usize = outcomes[..30].iter().map(|&b| b as usize).sum();
        assert!(head < 30);
    }

    #[test]
    fn empty_group_yields_no_outcomes() {
        let outcomes = block_outcomes(0, 0.3, &mut rng()).unwrap();
        assert!(outcomes.is_empty());
    }

    #[test]
    fn rate_outside_unit_interval_is_rejected() {
        assert_eq!(
            block_outcomes(10, 1.2, &mut rng()).unwrap_err(),
            EngineError::RateOutOfRange(1.2)
        );
        assert!(arm_rate(0.98, Some(0.07)).is_err());
        assert_eq!(arm_rate(0.3, Some(-0.02)).unwrap(), 0.3 - 0.02);
    }

    #[test]
    fn lift_draw_stays_in_range() {
        let mut r = rng();
        for _ in 0..100 {
            let lift = draw_lift((-0.02, 0.07), &mut r).unwrap();
            // Both endpoints are legal draws.
            assert!((-0.02..=0.07).contains(&lift));
        }
        assert_eq!(draw_lift((0.03, 0.03), &mut r).unwrap(), 0.03);
        assert!(draw_lift((0.07, -0.02), &mut r).is_err());
    }
}
