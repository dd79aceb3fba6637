//! Item statistics over binary-scored questions.

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance (divides by `n`).
pub(crate) fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

/// Pearson correlation, `None` when either side has zero variance.
pub(crate) fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.is_empty() {
        return None;
    }
    let (mx, my) = (mean(x), mean(y));
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in x.iter().zip(y) {
        let (dx, dy) = (a - mx, b - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    let denom = (sxx * syy).sqrt();
    if denom <= f64::EPSILON {
        return None;
    }
    Some((sxy / denom).clamp(-1.0, 1.0))
}

/// Kuder–Richardson 20 from per-question proportions correct and the
/// per-sheet totals.
///
/// Undefined with fewer than two sheets, fewer than two questions, or
/// constant totals.
pub(crate) fn kr20(p_correct: &[f64], totals: &[f64]) -> Option<f64> {
    let k = p_correct.len();
    if totals.len() <= 1 || k <= 1 {
        return None;
    }
    let variance = population_variance(totals);
    if variance <= f64::EPSILON {
        return None;
    }
    let pq: f64 = p_correct.iter().map(|p| p * (1.0 - p)).sum();
    let k = k as f64;
    Some(k / (k - 1.0) * (1.0 - pq / variance))
}
