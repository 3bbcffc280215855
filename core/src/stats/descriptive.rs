//! Descriptive statistics used by imputation and the hypothesis tests

use std::cmp::Ordering;
use std::collections::HashMap;

/// Median of the values, `None` for an empty slice
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Most frequent value; ties go to the smallest value
///
/// Numeric codes compare as numbers, so `"2"` is smaller than `"10"`.
pub fn mode<'a, I>(values: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in values {
        *counts.entry(value).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .max_by(|(a_value, a_count), (b_value, b_count)| {
            a_count
                .cmp(b_count)
                .then_with(|| label_order(b_value, a_value))
        })
        .map(|(value, _)| value.to_string())
}

/// Numbers before text, numbers by value, text lexicographically
fn label_order(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.total_cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Central moment of order `k` (biased, divides by n)
pub fn central_moment(values: &[f64], k: i32) -> f64 {
    let m = mean(values);
    values.iter().map(|x| (x - m).powi(k)).sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_mode_prefers_smallest_on_tie() {
        assert_eq!(mode(["2", "1", "2", "1", "3"]), Some("1".to_string()));
        assert_eq!(mode(["b", "a", "b"]), Some("b".to_string()));
        assert_eq!(mode(Vec::<&str>::new()), None);
    }

    #[test]
    fn test_mode_orders_numeric_codes_by_value() {
        assert_eq!(mode(["10", "2", "10", "2"]), Some("2".to_string()));
        assert_eq!(mode(["x", "3", "x", "3"]), Some("3".to_string()));
    }

    #[test]
    fn test_central_moment() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert!((central_moment(&values, 2) - 1.25).abs() < 1e-12);
        assert!(central_moment(&values, 3).abs() < 1e-12);
    }
}
