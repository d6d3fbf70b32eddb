// Shapiro-Wilk normality test
//
// Royston's approximation (AS R94): coefficients from Blom scores with a
// polynomial correction of the outermost one or two, and a normalizing
// transform of W for the p-value. Valid for 3 <= n <= 5000.
//
// References:
// - Shapiro & Wilk (1965). An analysis of variance test for normality.
// - Royston (1995). Remark AS R94. Applied Statistics, 44(4), 547-551.

use crate::error::{GainError, Result};
use statrs::distribution::{ContinuousCDF, Normal};

/// Result of a Shapiro-Wilk test
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapiroWilk {
    /// W statistic in (0, 1]; values near 1 look normal
    pub w: f64,
    /// Upper-tail p-value; small values reject normality
    pub p_value: f64,
}

const C1: [f64; 6] = [0.0, 0.221157, -0.147981, -2.07119, 4.434685, -2.706056];
const C2: [f64; 6] = [0.0, 0.042981, -0.293762, -1.752461, 5.682633, -3.582633];
const C3: [f64; 4] = [0.544, -0.39978, 0.025054, -6.714e-4];
const C4: [f64; 4] = [1.3822, -0.77857, 0.062767, -0.0020322];
const C5: [f64; 4] = [-1.5861, -0.31082, -0.083751, 0.0038915];
const C6: [f64; 3] = [-0.4803, -0.082676, 0.0030302];
const G: [f64; 2] = [-2.273, 0.459];

const MAX_N: usize = 5000;

// c[0] + c[1]*x + c[2]*x^2 + ...
fn poly(c: &[f64], x: f64) -> f64 {
    c.iter().rev().fold(0.0, |acc, &ci| acc * x + ci)
}

pub(crate) fn standard_normal() -> Result<Normal> {
    Normal::new(0.0, 1.0).map_err(|e| GainError::Distribution(e.to_string()))
}

/// Run the Shapiro-Wilk test on one sample
///
/// Fails with [`GainError::EmptySample`] for no data,
/// [`GainError::InsufficientSampleSize`] for fewer than 3 values and
/// [`GainError::DegenerateSample`] for a constant or non-finite sample.
pub fn shapiro_wilk(sample: &[f64], label: &str) -> Result<ShapiroWilk> {
    let n = sample.len();
    if n == 0 {
        return Err(GainError::EmptySample {
            label: label.to_string(),
        });
    }
    if n < 3 {
        return Err(GainError::InsufficientSampleSize {
            label: label.to_string(),
            required: 3,
            actual: n,
        });
    }
    if sample.iter().any(|v| !v.is_finite()) {
        return Err(GainError::DegenerateSample {
            label: label.to_string(),
            reason: "contains non-finite values".to_string(),
        });
    }
    if n > MAX_N {
        tracing::warn!(label, n, "Shapiro-Wilk p-value may be inaccurate for n > 5000");
    }

    let mut x = sample.to_vec();
    x.sort_by(|a, b| a.total_cmp(b));

    let range = x[n - 1] - x[0];
    if range <= f64::EPSILON * x[0].abs().max(x[n - 1].abs()) {
        return Err(GainError::DegenerateSample {
            label: label.to_string(),
            reason: "all values are identical, normality is undefined".to_string(),
        });
    }

    if n == 3 {
        let a1 = std::f64::consts::FRAC_1_SQRT_2;
        let m = x.iter().sum::<f64>() / 3.0;
        let ss: f64 = x.iter().map(|v| (v - m).powi(2)).sum();
        let w = ((a1 * (x[2] - x[0])).powi(2) / ss).clamp(0.75, 1.0);
        let p_value = (6.0 / std::f64::consts::PI) * (w.sqrt().asin() - std::f64::consts::FRAC_PI_3);
        return Ok(ShapiroWilk {
            w,
            p_value: p_value.clamp(0.0, 1.0),
        });
    }

    let normal = standard_normal()?;
    let a = coefficients(n, &normal)?;

    let half = n / 2;
    let numerator: f64 = (0..half).map(|i| a[i] * (x[n - 1 - i] - x[i])).sum();
    let m = x.iter().sum::<f64>() / n as f64;
    let ss: f64 = x.iter().map(|v| (v - m).powi(2)).sum();
    let w = (numerator * numerator / ss).min(1.0);

    Ok(ShapiroWilk {
        w,
        p_value: p_value(w, n, &normal).clamp(0.0, 1.0),
    })
}

// Positive half of the antisymmetric coefficient vector, outermost first
fn coefficients(n: usize, normal: &Normal) -> Result<Vec<f64>> {
    let half = n / 2;
    let nf = n as f64;

    // Blom scores of the lower half (negative)
    let m: Vec<f64> = (0..half)
        .map(|i| normal.inverse_cdf((i as f64 + 1.0 - 0.375) / (nf + 0.25)))
        .collect();
    let summ2 = 2.0 * m.iter().map(|v| v * v).sum::<f64>();
    let ssumm2 = summ2.sqrt();
    let rsn = 1.0 / nf.sqrt();

    let a1 = poly(&C1, rsn) - m[0] / ssumm2;
    let mut a = vec![0.0; half];

    let (first_plain, fac_sq) = if n > 5 {
        let a2 = -m[1] / ssumm2 + poly(&C2, rsn);
        a[1] = a2;
        (
            2,
            (summ2 - 2.0 * m[0] * m[0] - 2.0 * m[1] * m[1]) / (1.0 - 2.0 * a1 * a1 - 2.0 * a2 * a2),
        )
    } else {
        (1, (summ2 - 2.0 * m[0] * m[0]) / (1.0 - 2.0 * a1 * a1))
    };

    if !(fac_sq.is_finite() && fac_sq > 0.0) {
        return Err(GainError::Distribution(format!(
            "Shapiro-Wilk coefficients undefined for n = {}",
            n
        )));
    }
    let fac = fac_sq.sqrt();

    a[0] = a1;
    for i in first_plain..half {
        a[i] = -m[i] / fac;
    }
    Ok(a)
}

fn p_value(w: f64, n: usize, normal: &Normal) -> f64 {
    let nf = n as f64;
    let w1 = 1.0 - w;
    if w1 <= 0.0 {
        return 1.0;
    }
    let mut y = w1.ln();

    let (mean, sd) = if n <= 11 {
        let gamma = poly(&G, nf);
        if y >= gamma {
            return 0.0;
        }
        y = -(gamma - y).ln();
        (poly(&C3, nf), poly(&C4, nf).exp())
    } else {
        let ln_n = nf.ln();
        (poly(&C5, ln_n), poly(&C6, ln_n).exp())
    };

    normal.sf((y - mean) / sd)
}
