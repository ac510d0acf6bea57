//! Scalar numerical helpers: normal CDF, log-space reductions, 1-D search
//! and quadrature.

use core::f64::consts::FRAC_1_SQRT_2;

use crate::constants::LOG_2PI;

/// Square (x^2).
#[inline]
pub fn sq(x: f64) -> f64 {
    x * x
}

/// Standard normal CDF: Φ(x) = (1 + erf(x/√2)) / 2
#[inline]
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + libm::erf(x * FRAC_1_SQRT_2))
}

/// Natural log of the standard normal CDF, accurate far into the lower tail.
///
/// Uses erfc for negative arguments and the Mills-ratio asymptote once erfc
/// underflows.
pub fn log_normal_cdf(x: f64) -> f64 {
    if x > -5.0 {
        return normal_cdf(x).ln();
    }
    let tail = 0.5 * libm::erfc(-x * FRAC_1_SQRT_2);
    if tail > 0.0 {
        return tail.ln();
    }
    // ln Φ(x) ≈ -x²/2 - ln(-x) - ½ln(2π)
    -0.5 * x * x - (-x).ln() - 0.5 * LOG_2PI
}

/// Log density of a zero-mean univariate normal.
#[inline]
pub fn normal_log_pdf(x: f64, sd: f64) -> f64 {
    -0.5 * (LOG_2PI + sq(x / sd)) - sd.ln()
}

/// Numerically stable ln(Σ exp(xᵢ)).
///
/// Returns `-inf` for an empty slice or when every term is `-inf`.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    if max == f64::INFINITY {
        return f64::INFINITY;
    }
    let sum: f64 = values.iter().map(|v| (v - max).exp()).sum();
    max + sum.ln()
}

/// Golden-section search for the maximum of a unimodal function on `[lo, hi]`.
pub fn golden_section_max<F>(f: F, mut lo: f64, mut hi: f64, tolerance: f64) -> f64
where
    F: Fn(f64) -> f64,
{
    const INV_PHI: f64 = 0.618_033_988_749_894_9;
    const MAX_ITERATIONS: usize = 200;

    let mut x1 = hi - INV_PHI * (hi - lo);
    let mut x2 = lo + INV_PHI * (hi - lo);
    let mut f1 = f(x1);
    let mut f2 = f(x2);

    for _ in 0..MAX_ITERATIONS {
        if (hi - lo).abs() <= tolerance {
            break;
        }
        // NaN compares false, which moves the bracket towards x1
        if f1 >= f2 || f2.is_nan() {
            hi = x2;
            x2 = x1;
            f2 = f1;
            x1 = hi - INV_PHI * (hi - lo);
            f1 = f(x1);
        } else {
            lo = x1;
            x1 = x2;
            f1 = f2;
            x2 = lo + INV_PHI * (hi - lo);
            f2 = f(x2);
        }
    }

    // The bracket ends are candidates too: a boundary maximum never enters the interior
    let mid = 0.5 * (lo + hi);
    [mid, lo, hi]
        .into_iter()
        .map(|x| (x, f(x)))
        .filter(|(_, v)| !v.is_nan())
        .fold((mid, f64::NEG_INFINITY), |best, cur| if cur.1 > best.1 { cur } else { best })
        .0
}

/// Composite Simpson rule on `[lo, hi]` with `intervals` sub-intervals
/// (rounded up to an even count).
pub fn simpson<F>(f: F, lo: f64, hi: f64, intervals: usize) -> f64
where
    F: Fn(f64) -> f64,
{
    let n = intervals.max(2).next_multiple_of(2);
    let h = (hi - lo) / n as f64;
    if h == 0.0 {
        return 0.0;
    }

    let mut sum = f(lo) + f(hi);
    for i in 1..n {
        let weight = if i % 2 == 1 { 4.0 } else { 2.0 };
        sum += weight * f(lo + i as f64 * h);
    }
    sum * h / 3.0
}

/// Shannon entropy (nats) of a probability vector.
pub fn entropy(probabilities: &[f64]) -> f64 {
    probabilities
        .iter()
        .filter(|&&p| p > 0.0)
        .map(|&p| -p * p.ln())
        .sum()
}
