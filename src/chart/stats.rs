//! Small statistics helpers used by chart resolution and drawing.

use crate::data::model::CellValue;

/// Pearson correlation over the pairs where both values are present and finite.
/// `None` with fewer than two complete pairs or when either side is constant.
pub fn pearson(a: &[CellValue], b: &[CellValue]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b)
        .filter_map(|(x, y)| Some((x.as_f64()?, y.as_f64()?)))
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .collect();
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x <= 0.0 || var_y <= 0.0 {
        return None;
    }
    Some((cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0))
}

/// Equal-width bins between the minimum and maximum value.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramBins {
    /// `counts.len() + 1` edges; empty when there were no values.
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

impl HistogramBins {
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

/// Count finite values into `bins` equal-width bins; the last bin includes the maximum.
pub fn histogram(values: &[f64], bins: usize) -> HistogramBins {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() || bins == 0 {
        return HistogramBins {
            edges: Vec::new(),
            counts: Vec::new(),
        };
    }
    let mut lo = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let mut hi = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if (hi - lo).abs() < f64::EPSILON {
        lo -= 0.5;
        hi += 0.5;
    }
    let width = (hi - lo) / bins as f64;
    let edges = (0..=bins).map(|i| lo + width * i as f64).collect();
    let mut counts = vec![0usize; bins];
    for v in finite {
        let idx = (((v - lo) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }
    HistogramBins { edges, counts }
}

/// Linear-interpolated quartiles `(q1, median, q3)` of unsorted values.
pub fn quartiles(values: &[f64]) -> Option<(f64, f64, f64)> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);
    let at = |p: f64| interpolate(&sorted, p * (sorted.len() - 1) as f64);
    Some((at(0.25), at(0.5), at(0.75)))
}

fn interpolate(sorted: &[f64], idx: f64) -> f64 {
    let lower = idx.floor() as usize;
    let upper = idx.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let frac = idx - lower as f64;
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }
}

/// Box-plot whiskers: the most extreme values within 1.5 IQR of the quartiles.
pub fn whiskers(values: &[f64], q1: f64, q3: f64) -> (f64, f64) {
    let iqr = q3 - q1;
    let (lo_fence, hi_fence) = (q1 - 1.5 * iqr, q3 + 1.5 * iqr);
    let inside = values
        .iter()
        .copied()
        .filter(|v| v.is_finite() && *v >= lo_fence && *v <= hi_fence);
    let lo = inside.clone().fold(f64::INFINITY, f64::min);
    let hi = inside.fold(f64::NEG_INFINITY, f64::max);
    if lo.is_finite() && hi.is_finite() {
        (lo, hi)
    } else {
        (q1, q3)
    }
}

/// Gaussian kernel density sampled at `points` positions across the data
/// range (padded by two bandwidths each side). Silverman's rule for bandwidth.
pub fn kernel_density(values: &[f64], points: usize) -> Vec<(f64, f64)> {
    let data: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if data.is_empty() || points < 2 {
        return Vec::new();
    }
    let n = data.len() as f64;
    let mean = data.iter().sum::<f64>() / n;
    let std = (data.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
    let bandwidth = if std > 0.0 {
        1.06 * std * n.powf(-0.2)
    } else {
        1.0
    };

    let lo = data.iter().copied().fold(f64::INFINITY, f64::min) - 2.0 * bandwidth;
    let hi = data.iter().copied().fold(f64::NEG_INFINITY, f64::max) + 2.0 * bandwidth;
    let step = (hi - lo) / (points - 1) as f64;
    let norm = 1.0 / (n * bandwidth * (2.0 * std::f64::consts::PI).sqrt());

    (0..points)
        .map(|i| {
            let x = lo + step * i as f64;
            let density = data
                .iter()
                .map(|v| (-0.5 * ((x - v) / bandwidth).powi(2)).exp())
                .sum::<f64>()
                * norm;
            (x, density)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(values: &[Option<f64>]) -> Vec<CellValue> {
        values
            .iter()
            .map(|v| v.map_or(CellValue::Null, CellValue::Float))
            .collect()
    }

    #[test]
    fn pearson_perfect_and_inverse() {
        let a = cells(&[Some(1.0), Some(2.0), Some(3.0)]);
        let b = cells(&[Some(2.0), Some(4.0), Some(6.0)]);
        let c = cells(&[Some(3.0), Some(2.0), Some(1.0)]);
        assert!((pearson(&a, &b).unwrap() - 1.0).abs() < 1e-12);
        assert!((pearson(&a, &c).unwrap() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn pearson_uses_pairwise_complete_rows() {
        let a = cells(&[Some(1.0), None, Some(2.0), Some(3.0)]);
        let b = cells(&[Some(1.0), Some(100.0), Some(2.0), None]);
        assert!((pearson(&a, &b).unwrap() - 1.0).abs() < 1e-12);
        let constant = cells(&[Some(5.0), Some(5.0), Some(5.0), Some(5.0)]);
        assert_eq!(pearson(&a, &constant), None);
    }

    #[test]
    fn histogram_counts_every_value_once() {
        let bins = histogram(&[0.0, 1.0, 2.0, 3.0, 4.0, 10.0], 5);
        assert_eq!(bins.edges.len(), 6);
        assert_eq!(bins.counts, vec![2, 2, 1, 0, 1]);
        assert_eq!(bins.total(), 6);
    }

    #[test]
    fn histogram_of_constant_values() {
        let bins = histogram(&[3.0, 3.0], 5);
        assert_eq!(bins.total(), 2);
        assert_eq!(bins.edges.first().copied(), Some(2.5));
    }

    #[test]
    fn quartiles_interpolate() {
        assert_eq!(quartiles(&[4.0, 1.0, 3.0, 2.0, 5.0]), Some((2.0, 3.0, 4.0)));
        assert_eq!(quartiles(&[]), None);
    }

    #[test]
    fn whiskers_stop_at_fences() {
        let values = [1.0, 2.0, 3.0, 4.0, 100.0];
        assert_eq!(whiskers(&values, 2.0, 4.0), (1.0, 4.0));
    }

    #[test]
    fn density_integrates_to_about_one() {
        let kde = kernel_density(&[1.0, 2.0, 2.5, 3.0, 7.0], 400);
        let step = kde[1].0 - kde[0].0;
        let area: f64 = kde.iter().map(|(_, d)| d * step).sum();
        assert!((area - 1.0).abs() < 0.1, "{area}");
    }
}
