//! Rank-based tests comparing independent samples

use super::rank::average_ranks;
use super::TestOutcome;
use crate::error::{AnalysisError, Result};
use statrs::distribution::{ChiSquared, ContinuousCDF, Normal};

/// Two-sided Mann-Whitney U test
///
/// Normal approximation with tie and continuity corrections. The reported
/// statistic is U for the first sample.
pub fn mann_whitney_u(x: &[f64], y: &[f64]) -> Result<TestOutcome> {
    if x.is_empty() || y.is_empty() {
        return Err(AnalysisError::InsufficientData(
            "Mann-Whitney needs two non-empty samples".to_string(),
        ));
    }

    let n1 = x.len() as f64;
    let n2 = y.len() as f64;
    let n = n1 + n2;

    let pooled: Vec<f64> = x.iter().chain(y.iter()).copied().collect();
    let ranking = average_ranks(&pooled);

    let r1: f64 = ranking.ranks[..x.len()].iter().sum();
    let u1 = r1 - n1 * (n1 + 1.0) / 2.0;
    let u2 = n1 * n2 - u1;

    let mu = n1 * n2 / 2.0;
    let sigma = (n1 * n2 / 12.0 * ((n + 1.0) - ranking.tie_term() / (n * (n - 1.0)))).sqrt();
    if !(sigma > 0.0) {
        return Err(AnalysisError::DegenerateSample(
            "all observations are identical".to_string(),
        ));
    }

    let z = (u1.max(u2) - mu - 0.5) / sigma;
    let normal = Normal::new(0.0, 1.0).map_err(|e| AnalysisError::DegenerateSample(e.to_string()))?;
    let p_value = (2.0 * normal.sf(z)).clamp(0.0, 1.0);

    Ok(TestOutcome {
        statistic: u1,
        p_value,
    })
}

/// Kruskal-Wallis H test over any number of groups (at least two)
pub fn kruskal_wallis(groups: &[Vec<f64>]) -> Result<TestOutcome> {
    if groups.len() < 2 {
        return Err(AnalysisError::InsufficientData(format!(
            "Kruskal-Wallis needs at least 2 groups, got {}",
            groups.len()
        )));
    }
    if groups.iter().any(|g| g.is_empty()) {
        return Err(AnalysisError::InsufficientData(
            "Kruskal-Wallis groups must be non-empty".to_string(),
        ));
    }

    let pooled: Vec<f64> = groups.iter().flatten().copied().collect();
    let n = pooled.len() as f64;
    let ranking = average_ranks(&pooled);

    let mut offset = 0;
    let mut ssbn = 0.0;
    for group in groups {
        let rank_sum: f64 = ranking.ranks[offset..offset + group.len()].iter().sum();
        ssbn += rank_sum * rank_sum / group.len() as f64;
        offset += group.len();
    }

    let correction = 1.0 - ranking.tie_term() / (n * n * n - n);
    if correction <= 0.0 {
        return Err(AnalysisError::DegenerateSample(
            "all observations are identical".to_string(),
        ));
    }

    let h = (12.0 / (n * (n + 1.0)) * ssbn - 3.0 * (n + 1.0)) / correction;

    let dof = (groups.len() - 1) as f64;
    let chi2 = ChiSquared::new(dof).map_err(|e| AnalysisError::DegenerateSample(e.to_string()))?;

    Ok(TestOutcome {
        statistic: h,
        p_value: chi2.sf(h),
    })
}
