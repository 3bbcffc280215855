//! Normality tests
//!
//! - Shapiro-Wilk W, with Royston's (1995) coefficient and p-value
//!   approximations (algorithm AS R94)
//! - D'Agostino-Pearson K², combining the skewness and kurtosis z-scores

use super::descriptive::central_moment;
use super::TestOutcome;
use crate::error::{AnalysisError, Result};
use statrs::distribution::{ChiSquared, ContinuousCDF, Normal};
use tracing::warn;

/// Largest sample for which the Shapiro-Wilk p-value approximation holds
pub const SHAPIRO_MAX_ACCURATE_N: usize = 5000;

const SMALL: f64 = 1e-19;

// Royston's polynomial coefficients
const C1: [f64; 6] = [0.0, 0.221157, -0.147981, -2.071190, 4.434685, -2.706056];
const C2: [f64; 6] = [0.0, 0.042981, -0.293762, -1.752461, 5.682633, -3.582633];
const C3: [f64; 4] = [0.5440, -0.39978, 0.025054, -6.714e-4];
const C4: [f64; 4] = [1.3822, -0.77857, 0.062767, -0.0020322];
const C5: [f64; 4] = [-1.5861, -0.31082, -0.083751, 0.0038915];
const C6: [f64; 3] = [-0.4803, -0.082676, 0.0030302];
const G: [f64; 2] = [-2.273, 0.459];

fn standard_normal() -> Result<Normal> {
    Normal::new(0.0, 1.0).map_err(|e| AnalysisError::DegenerateSample(e.to_string()))
}

/// `cc[0] + cc[1] x + cc[2] x^2 + ...`
fn poly(cc: &[f64], x: f64) -> f64 {
    cc.iter().rev().fold(0.0, |acc, &c| acc * x + c)
}

/// Shapiro-Wilk test for normality
pub fn shapiro_wilk(sample: &[f64]) -> Result<TestOutcome> {
    let n = sample.len();
    if n < 3 {
        return Err(AnalysisError::InsufficientData(format!(
            "Shapiro-Wilk needs at least 3 observations, got {}",
            n
        )));
    }
    if n > SHAPIRO_MAX_ACCURATE_N {
        warn!(
            "Shapiro-Wilk p-value may be inaccurate for n = {} > {}",
            n, SHAPIRO_MAX_ACCURATE_N
        );
    }

    let mut x = sample.to_vec();
    x.sort_by(f64::total_cmp);

    let range = x[n - 1] - x[0];
    if range < SMALL {
        return Err(AnalysisError::DegenerateSample(
            "all observations are identical".to_string(),
        ));
    }

    let coefficients = shapiro_coefficients(n)?;

    let mean = x.iter().sum::<f64>() / n as f64;
    let ssq: f64 = x.iter().map(|v| (v - mean).powi(2)).sum();
    let numerator: f64 = coefficients
        .iter()
        .enumerate()
        .map(|(i, a)| a * (x[n - 1 - i] - x[i]))
        .sum();
    let w = (numerator * numerator / ssq).min(1.0);

    let p_value = shapiro_p_value(w, n)?;
    Ok(TestOutcome {
        statistic: w,
        p_value,
    })
}

/// Positive half of the antisymmetric coefficient vector, length n/2
fn shapiro_coefficients(n: usize) -> Result<Vec<f64>> {
    let nn2 = n / 2;
    if n == 3 {
        return Ok(vec![std::f64::consts::FRAC_1_SQRT_2]);
    }

    let normal = standard_normal()?;
    let an25 = n as f64 + 0.25;
    let m: Vec<f64> = (1..=nn2)
        .map(|i| normal.inverse_cdf((i as f64 - 0.375) / an25))
        .collect();

    let summ2 = 2.0 * m.iter().map(|v| v * v).sum::<f64>();
    let ssumm2 = summ2.sqrt();
    let rsn = 1.0 / (n as f64).sqrt();
    let a1 = poly(&C1, rsn) - m[0] / ssumm2;

    let mut a = vec![0.0; nn2];
    a[0] = a1;

    let (first_scaled, fac) = if n > 5 {
        let a2 = -m[1] / ssumm2 + poly(&C2, rsn);
        a[1] = a2;
        let fac = ((summ2 - 2.0 * m[0] * m[0] - 2.0 * m[1] * m[1])
            / (1.0 - 2.0 * a1 * a1 - 2.0 * a2 * a2))
            .sqrt();
        (2, fac)
    } else {
        let fac = ((summ2 - 2.0 * m[0] * m[0]) / (1.0 - 2.0 * a1 * a1)).sqrt();
        (1, fac)
    };

    for i in first_scaled..nn2 {
        a[i] = -m[i] / fac;
    }

    Ok(a)
}

fn shapiro_p_value(w: f64, n: usize) -> Result<f64> {
    if n == 3 {
        // exact for n = 3
        let pi6 = 6.0 / std::f64::consts::PI;
        let stqr = std::f64::consts::FRAC_PI_3;
        return Ok((pi6 * (w.sqrt().asin() - stqr)).clamp(0.0, 1.0));
    }

    let w1 = 1.0 - w;
    if w1 <= 0.0 {
        return Ok(1.0);
    }

    let an = n as f64;
    let mut y = w1.ln();
    let (m, s) = if n <= 11 {
        let gamma = poly(&G, an);
        if y >= gamma {
            return Ok(1e-99);
        }
        y = -(gamma - y).ln();
        (poly(&C3, an), poly(&C4, an).exp())
    } else {
        let xx = an.ln();
        (poly(&C5, xx), poly(&C6, xx).exp())
    };

    let normal = Normal::new(m, s).map_err(|e| AnalysisError::DegenerateSample(e.to_string()))?;
    Ok(normal.sf(y))
}

/// D'Agostino-Pearson omnibus test for normality
pub fn dagostino_pearson(sample: &[f64]) -> Result<TestOutcome> {
    let n = sample.len();
    if n < 8 {
        return Err(AnalysisError::InsufficientData(format!(
            "D'Agostino-Pearson needs at least 8 observations, got {}",
            n
        )));
    }
    if n < 20 {
        warn!(
            "kurtosis test is only valid for n >= 20, continuing with n = {}",
            n
        );
    }

    let m2 = central_moment(sample, 2);
    if m2 <= 0.0 {
        return Err(AnalysisError::DegenerateSample(
            "sample has zero variance".to_string(),
        ));
    }

    let skewness = central_moment(sample, 3) / m2.powf(1.5);
    let kurtosis = central_moment(sample, 4) / (m2 * m2);

    let zs = skewness_z(skewness, n as f64);
    let zk = kurtosis_z(kurtosis, n as f64);
    let k2 = zs * zs + zk * zk;

    let chi2 = ChiSquared::new(2.0).map_err(|e| AnalysisError::DegenerateSample(e.to_string()))?;
    Ok(TestOutcome {
        statistic: k2,
        p_value: chi2.sf(k2),
    })
}

fn skewness_z(b2: f64, n: f64) -> f64 {
    let y = b2 * ((n + 1.0) * (n + 3.0) / (6.0 * (n - 2.0))).sqrt();
    let beta2 = 3.0 * (n * n + 27.0 * n - 70.0) * (n + 1.0) * (n + 3.0)
        / ((n - 2.0) * (n + 5.0) * (n + 7.0) * (n + 9.0));
    let w2 = -1.0 + (2.0 * (beta2 - 1.0)).sqrt();
    let delta = 1.0 / (0.5 * w2.ln()).sqrt();
    let alpha = (2.0 / (w2 - 1.0)).sqrt();
    delta * (y / alpha + ((y / alpha).powi(2) + 1.0).sqrt()).ln()
}

fn kurtosis_z(b2: f64, n: f64) -> f64 {
    let expected = 3.0 * (n - 1.0) / (n + 1.0);
    let variance = 24.0 * n * (n - 2.0) * (n - 3.0)
        / ((n + 1.0) * (n + 1.0) * (n + 3.0) * (n + 5.0));
    let x = (b2 - expected) / variance.sqrt();

    let sqrt_beta1 = 6.0 * (n * n - 5.0 * n + 2.0) / ((n + 7.0) * (n + 9.0))
        * (6.0 * (n + 3.0) * (n + 5.0) / (n * (n - 2.0) * (n - 3.0))).sqrt();
    let a = 6.0
        + 8.0 / sqrt_beta1 * (2.0 / sqrt_beta1 + (1.0 + 4.0 / (sqrt_beta1 * sqrt_beta1)).sqrt());

    let term1 = 1.0 - 2.0 / (9.0 * a);
    let denom = 1.0 + x * (2.0 / (a - 4.0)).sqrt();
    if denom == 0.0 {
        return f64::NAN;
    }
    let term2 = denom.signum() * ((1.0 - 2.0 / a) / denom.abs()).cbrt();

    (term1 - term2) / (2.0 / (9.0 * a)).sqrt()
}
