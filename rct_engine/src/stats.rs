use log::info;

use crate::config::{EngineError, EngineResult};

// ********* A/B significance test *********

/// Result of the two-proportion z-test.
#[derive(PartialEq, Debug, Clone)]
pub struct AbTestReport {
    pub p_treat: f64,
    pub p_control: f64,
    /// `p_treat - p_control`.
    pub lift: f64,
    /// `(1 - alpha)` confidence interval for the lift, unpooled standard error.
    pub ci_lift: (f64, f64),
    pub alpha: f64,
    /// z statistic under the pooled standard error.
    pub z: f64,
    /// H1: treatment > control.
    pub p_one_sided: f64,
    pub p_two_sided: f64,
}

/// Two-proportion z-test for treatment (`x_t` positives of `n_t`) against
/// control (`x_c` of `n_c`).
///
/// The confidence interval uses the unpooled standard error, the z statistic
/// the pooled one. Zero-size arms, counts exceeding their arm, and degenerate
/// pooled rates are explicit errors rather than NaN.
pub fn ab_test(x_t: u64, n_t: u64, x_c: u64, n_c: u64, alpha: f64) -> EngineResult<AbTestReport> {
    if n_t == 0 || n_c == 0 {
        return Err(EngineError::ZeroSampleSize);
    }
    if x_t > n_t {
        return Err(EngineError::CountExceedsSize { count: x_t, size: n_t });
    }
    if x_c > n_c {
        return Err(EngineError::CountExceedsSize { count: x_c, size: n_c });
    }
    if !(0.0 < alpha && alpha < 1.0) {
        return Err(EngineError::RateOutOfRange(alpha));
    }

    let (nt, nc) = (n_t as f64, n_c as f64);
    let p_t = x_t as f64 / nt;
    let p_c = x_c as f64 / nc;
    let lift = p_t - p_c;

    let se_unpooled = (p_t * (1.0 - p_t) / nt + p_c * (1.0 - p_c) / nc).sqrt();
    let z_crit = normal_ppf(1.0 - alpha / 2.0);
    let ci_lift = (lift - z_crit * se_unpooled, lift + z_crit * se_unpooled);

    let p_pool = (x_t + x_c) as f64 / (nt + nc);
    let se_pool = (p_pool * (1.0 - p_pool) * (1.0 / nt + 1.0 / nc)).sqrt();
    if se_pool == 0.0 {
        // All positives or all negatives across both arms.
        return Err(EngineError::ZeroVariance);
    }
    let z = lift / se_pool;
    let report = AbTestReport {
        p_treat: p_t,
        p_control: p_c,
        lift,
        ci_lift,
        alpha,
        z,
        p_one_sided: 1.0 - normal_cdf(z),
        p_two_sided: 2.0 * (1.0 - normal_cdf(z.abs())),
    };
    info!(
        "ab_test: lift={:.4} z={:.3} p_two_sided={:.5}",
        report.lift, report.z, report.p_two_sided
    );
    Ok(report)
}

// ********* Power / sample-size analysis *********

/// Required sample sizes for detecting a minimum lift, from the
/// normal-approximation two-independent-proportions power formula.
#[derive(PartialEq, Debug, Clone)]
pub struct SampleSizeRequirement {
    pub cohen_h: f64,
    /// Exact (ceiling) sizes.
    pub control: u64,
    pub treatment: u64,
    pub total: u64,
    /// The same sizes rounded up to the nearest 100 for reporting; the exact
    /// figures imply more precision than the approximation carries. Rounding
    /// is always upward so a requirement is never under-reported.
    pub control_rounded: u64,
    pub treatment_rounded: u64,
    pub total_rounded: u64,
    pub alpha: f64,
    pub power: f64,
}

/// Solves for the control-group size needed to detect `min_lift` (absolute,
/// in probability points) over `baseline_rate`, at the given power and
/// two-sided `alpha`, with the treatment:control allocation implied by
/// `control_proportion`.
///
/// Effect size is Cohen's h; the allocation-aware solution is
/// `n_c = ((z_crit + z_power) / h)^2 * (1 + 1/k)` with `k = n_t / n_c`.
pub fn power_analysis(
    baseline_rate: f64,
    min_lift: f64,
    control_proportion: f64,
    power: f64,
    alpha: f64,
) -> EngineResult<SampleSizeRequirement> {
    for p in [baseline_rate, baseline_rate + min_lift] {
        if !(0.0..=1.0).contains(&p) || !p.is_finite() {
            return Err(EngineError::RateOutOfRange(p));
        }
    }
    if !(0.0 < control_proportion && control_proportion < 1.0) {
        return Err(EngineError::RateOutOfRange(control_proportion));
    }
    if !(0.0 < power && power < 1.0) {
        return Err(EngineError::RateOutOfRange(power));
    }
    if !(0.0 < alpha && alpha < 1.0) {
        return Err(EngineError::RateOutOfRange(alpha));
    }
    let h = cohen_h(baseline_rate + min_lift, baseline_rate);
    if h == 0.0 {
        return Err(EngineError::ZeroEffectSize);
    }

    let k = (1.0 - control_proportion) / control_proportion;
    let z_sum = normal_ppf(1.0 - alpha / 2.0) + normal_ppf(power);
    let n_c = (z_sum / h).powi(2) * (1.0 + 1.0 / k);
    let n_t = k * n_c;

    let control = n_c.ceil() as u64;
    let treatment = n_t.ceil() as u64;
    let requirement = SampleSizeRequirement {
        cohen_h: h,
        control,
        treatment,
        total: control + treatment,
        control_rounded: round_up_hundred(control),
        treatment_rounded: round_up_hundred(treatment),
        total_rounded: round_up_hundred(control) + round_up_hundred(treatment),
        alpha,
        power,
    };
    info!(
        "power_analysis: h={:.4} control={} treatment={} total={}",
        h, requirement.control, requirement.treatment, requirement.total
    );
    Ok(requirement)
}

/// Cohen's effect size h for two proportions.
pub fn cohen_h(p1: f64, p2: f64) -> f64 {
    2.0 * (p1.sqrt().asin() - p2.sqrt().asin())
}

/// Comparison of an available list against a computed requirement.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SizeCheck {
    pub required: u64,
    pub available: u64,
    /// Present when the candidate falls short, with the missing count.
    pub shortfall: Option<u64>,
}

/// Flags whether a candidate list meets the (rounded) total requirement.
pub fn check_candidate(requirement: &SampleSizeRequirement, available: u64) -> SizeCheck {
    size_check(requirement.total_rounded, available)
}

/// Per-subgroup variant: every subgroup that should support its own analysis
/// is held to the full requirement independently.
pub fn check_subgroups(
    requirement: &SampleSizeRequirement,
    counts: &[(String, u64)],
) -> Vec<(String, SizeCheck)> {
    counts
        .iter()
        .map(|(name, available)| {
            (
                name.clone(),
                size_check(requirement.total_rounded, *available),
            )
        })
        .collect()
}

fn size_check(required: u64, available: u64) -> SizeCheck {
    SizeCheck {
        required,
        available,
        shortfall: required.checked_sub(available).filter(|&s| s > 0),
    }
}

fn round_up_hundred(n: u64) -> u64 {
    n.div_ceil(100) * 100
}

// ********* Standard normal distribution *********

// Abramowitz & Stegun 7.1.26, |error| <= 1.5e-7. Enough precision for
// p-values and critical values; the pack carries no statistics crate.
fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + 0.3275911 * x);
    let poly = t
        * (0.254829592
            + t * (-0.284496736 + t * (1.421413741 + t * (-1.453152027 + t * 1.061405429))));
    sign * (1.0 - poly * (-x * x).exp())
}

/// CDF of the standard normal distribution.
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / std::f64::consts::SQRT_2))
}

/// Quantile of the standard normal distribution (Acklam's approximation).
pub fn normal_ppf(p: f64) -> f64 {
    assert!(0.0 < p && p < 1.0, "quantile requires p in (0, 1)");
    const A: [f64; 6] = [
        -3.969683028665376e+01,
        2.209460984245205e+02,
        -2.759285104469687e+02,
        1.383577518672690e+02,
        -3.066479806614716e+01,
        2.506628277459239e+00,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e+01,
        1.615858368580409e+02,
        -1.556989798598866e+02,
        6.680131188771972e+01,
        -1.328068155288572e+01,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-03,
        -3.223964580411365e-01,
        -2.400758277161838e+00,
        -2.549732539343734e+00,
        4.374664141464968e+00,
        2.938163982698783e+00,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-03,
        3.224671290700398e-01,
        2.445134137142996e+00,
        3.754408661907416e+00,
    ];
    const P_LOW: f64 = 0.02425;

    if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -(((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn normal_distribution_reference_values() {
        assert!(close(normal_cdf(0.0), 0.5, 1e-7));
        assert!(close(normal_cdf(1.959964), 0.975, 1e-5));
        assert!(close(normal_cdf(-1.959964), 0.025, 1e-5));
        assert!(close(normal_ppf(0.975), 1.959964, 1e-5));
        assert!(close(normal_ppf(0.8), 0.841621, 1e-5));
        assert!(close(normal_ppf(0.5), 0.0, 1e-7));
    }

    #[test]
    fn ab_test_reference_fixture() {
        // 150/500 treatment against 100/500 control.
        let report = ab_test(150, 500, 100, 500, 0.05).unwrap();
        assert!(close(report.p_treat, 0.30, 1e-12));
        assert!(close(report.p_control, 0.20, 1e-12));
        assert!(close(report.lift, 0.10, 1e-12));
        // Pooled rate 0.25 gives z = 0.1 / sqrt(0.1875 * 0.004).
        assert!(close(report.z, 3.6515, 1e-3));
        assert!(report.p_two_sided < 0.001);
        assert!(report.p_one_sided < report.p_two_sided);
        // Unpooled CI: 0.10 +/- 1.95996 * sqrt(0.00042 + 0.00032).
        assert!(close(report.ci_lift.0, 0.0467, 1e-3));
        assert!(close(report.ci_lift.1, 0.1533, 1e-3));
    }

    #[test]
    fn ab_test_negative_lift_has_high_one_sided_p() {
        let report = ab_test(80, 500, 120, 500, 0.05).unwrap();
        assert!(report.lift < 0.0);
        assert!(report.p_one_sided > 0.5);
    }

    #[test]
    fn ab_test_rejects_degenerate_inputs() {
        assert_eq!(ab_test(0, 0, 10, 100, 0.05).unwrap_err(), EngineError::ZeroSampleSize);
        assert_eq!(ab_test(10, 100, 0, 0, 0.05).unwrap_err(), EngineError::ZeroSampleSize);
        assert_eq!(
            ab_test(101, 100, 10, 100, 0.05).unwrap_err(),
            EngineError::CountExceedsSize { count: 101, size: 100 }
        );
        assert_eq!(ab_test(0, 100, 0, 100, 0.05).unwrap_err(), EngineError::ZeroVariance);
        assert_eq!(
            ab_test(100, 100, 100, 100, 0.05).unwrap_err(),
            EngineError::ZeroVariance
        );
    }

    #[test]
    fn power_analysis_reference_fixture() {
        // Baseline 10%, minimum lift 5pp, even allocation, power 0.8, alpha 0.05.
        let req = power_analysis(0.10, 0.05, 0.5, 0.8, 0.05).unwrap();
        assert!(close(req.cohen_h, 0.151873, 1e-4));
        assert_eq!(req.control, req.treatment);
        // n_c = (2.80159 / 0.151873)^2 * 2, about 681 per arm.
        assert!((675..=690).contains(&req.control));
        assert_eq!(req.total, req.control + req.treatment);
        assert_eq!(req.control_rounded, 700);
        assert_eq!(req.total_rounded, 1400);
    }

    #[test]
    fn power_analysis_is_deterministic() {
        let a = power_analysis(0.10, 0.05, 0.5, 0.8, 0.05).unwrap();
        let b = power_analysis(0.10, 0.05, 0.5, 0.8, 0.05).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn required_size_decreases_as_min_lift_grows() {
        let mut last = u64::MAX;
        for lift in [0.02, 0.05, 0.10, 0.20] {
            let req = power_analysis(0.10, lift, 0.5, 0.8, 0.05).unwrap();
            assert!(req.total < last, "lift {} did not shrink the total", lift);
            last = req.total;
        }
    }

    #[test]
    fn allocation_ratio_shifts_the_arms() {
        // A 20% control share means four treatment records per control one.
        let req = power_analysis(0.10, 0.05, 0.2, 0.8, 0.05).unwrap();
        let ratio = req.treatment as f64 / req.control as f64;
        assert!(close(ratio, 4.0, 0.05));
    }

    #[test]
    fn power_analysis_rejects_degenerate_inputs() {
        assert_eq!(
            power_analysis(0.98, 0.05, 0.5, 0.8, 0.05).unwrap_err(),
            EngineError::RateOutOfRange(0.98 + 0.05)
        );
        assert_eq!(
            power_analysis(0.10, 0.0, 0.5, 0.8, 0.05).unwrap_err(),
            EngineError::ZeroEffectSize
        );
        assert!(power_analysis(0.10, 0.05, 0.0, 0.8, 0.05).is_err());
        assert!(power_analysis(0.10, 0.05, 0.5, 1.5, 0.05).is_err());
    }

    #[test]
    fn candidate_checks_flag_shortfalls() {
        let req = power_analysis(0.10, 0.05, 0.5, 0.8, 0.05).unwrap();
        let short = check_candidate(&req, 1000);
        assert_eq!(short.shortfall, Some(req.total_rounded - 1000));
        let ok = check_candidate(&req, 5000);
        assert_eq!(ok.shortfall, None);

        let checks = check_subgroups(
            &req,
            &[("W".to_string(), 2000), ("B".to_string(), 300)],
        );
        assert_eq!(checks[0].1.shortfall, None);
        assert_eq!(checks[1].1.shortfall, Some(req.total_rounded - 300));
    }
}
