//! Per-patch brightness series for the body phase of a trial.

use crate::error::{DisplayError, Result};
use crate::layout::Layout;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sampling interval of compiled series, in seconds
pub const SAMPLING_INTERVAL: f64 = 0.01;

/// Largest sample grid `compile_series` builds per patch
pub const MAX_SAMPLES: usize = 1_000_000;

/// Raw series supplied from outside the engine, keyed by patch name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalSeries(BTreeMap<String, Vec<f64>>);

impl ExternalSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.0.insert(name.into(), values);
    }

    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.0.get(name).map(Vec::as_slice)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Vec<f64>)> for ExternalSeries {
    fn from_iter<I: IntoIterator<Item = (String, Vec<f64>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeriesOrigin {
    External,
    Synthesized,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesSample {
    pub name: String,
    pub origin: SeriesOrigin,
    pub values: Vec<f64>,
}

/// Pairwise |Pearson r| between patch value vectors, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    names: Vec<String>,
    values: Vec<f64>,
}

impl CorrelationMatrix {
    fn from_samples(samples: &[TimeSeriesSample]) -> Self {
        let k = samples.len();
        let mut values = vec![0.0; k * k];
        for i in 0..k {
            values[i * k + i] = 1.0;
            for j in (i + 1)..k {
                let r = pearson(&samples[i].values, &samples[j].values).abs();
                values[i * k + j] = r;
                values[j * k + i] = r;
            }
        }
        Self {
            names: samples.iter().map(|s| s.name.clone()).collect(),
            values,
        }
    }

    pub fn size(&self) -> usize {
        self.names.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.size() + j]
    }

    pub fn by_name(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.names.iter().position(|n| n == a)?;
        let j = self.names.iter().position(|n| n == b)?;
        Some(self.get(i, j))
    }

    /// Strongest coupling between two different patches
    pub fn max_off_diagonal(&self) -> Option<f64> {
        let k = self.size();
        (0..k)
            .flat_map(|i| (0..k).filter(move |&j| j != i).map(move |j| (i, j)))
            .map(|(i, j)| self.get(i, j))
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
    }
}

fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let mean_a = a[..n].iter().sum::<f64>() / n as f64;
    let mean_b = b[..n].iter().sum::<f64>() / n as f64;
    let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (x, y) in a[..n].iter().zip(&b[..n]) {
        let (dx, dy) = (x - mean_a, y - mean_b);
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    if var_a <= f64::EPSILON || var_b <= f64::EPSILON {
        return 0.0;
    }
    cov / (var_a.sqrt() * var_b.sqrt())
}

/// Compiled series of one run. Every sample holds exactly `seconds.len()` values.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSeries {
    pub seconds: Vec<f64>,
    pub samples: Vec<TimeSeriesSample>,
    pub correlation: CorrelationMatrix,
}

impl CompiledSeries {
    pub fn sample_count(&self) -> usize {
        self.seconds.len()
    }

    pub fn get(&self, name: &str) -> Option<&TimeSeriesSample> {
        self.samples.iter().find(|s| s.name == name)
    }

    /// Number of grid timestamps strictly before `local_t` (nearest-past lookup)
    pub fn index_at(&self, local_t: f64) -> usize {
        self.seconds.partition_point(|&s| s < local_t)
    }

    /// Value of patch `patch` at sample `j`; `None` once the series is exhausted
    pub fn value_at(&self, patch: usize, j: usize) -> Option<f64> {
        self.samples.get(patch)?.values.get(j).copied()
    }

    /// `(seconds, value)` pairs of one patch
    pub fn pairs<'a>(&'a self, name: &str) -> Option<impl Iterator<Item = (f64, f64)> + 'a> {
        let sample = self.get(name)?;
        Some(self.seconds.iter().copied().zip(sample.values.iter().copied()))
    }
}

pub fn compile_series(
    layout: &Layout,
    external: &ExternalSeries,
    body_length: f64,
    sampling_interval: f64,
) -> Result<CompiledSeries> {
    if !sampling_interval.is_finite() || sampling_interval <= 0.0 {
        return Err(DisplayError::command(format!(
            "sampling interval must be positive, got {sampling_interval}"
        )));
    }
    // epsilon keeps e.g. 2.0 / 0.01 from flooring to 199
    let samples = (body_length / sampling_interval + 1e-9).floor();
    if !samples.is_finite() || samples > MAX_SAMPLES as f64 {
        return Err(DisplayError::command(format!(
            "body_length {body_length}s needs more than {MAX_SAMPLES} samples of {sampling_interval}s"
        )));
    }
    let n = samples as usize;
    if n == 0 {
        return Err(DisplayError::command(format!(
            "body_length {body_length}s is shorter than one {sampling_interval}s sample"
        )));
    }
    let seconds: Vec<f64> = (0..n).map(|i| i as f64 * sampling_interval).collect();

    let mut samples = Vec::with_capacity(layout.len());
    for patch in layout.patches() {
        let sample = match external.get(&patch.name) {
            Some([]) => {
                return Err(DisplayError::format(format!(
                    "external series for `{}` is empty",
                    patch.name
                )));
            }
            Some(source) => {
                if let Some(bad) = source.iter().find(|v| !v.is_finite()) {
                    return Err(DisplayError::format(format!(
                        "external series for `{}` holds non-finite value {bad}",
                        patch.name
                    )));
                }
                TimeSeriesSample {
                    name: patch.name.clone(),
                    origin: SeriesOrigin::External,
                    values: source.iter().copied().cycle().take(n).collect(),
                }
            }
            None => TimeSeriesSample {
                name: patch.name.clone(),
                origin: SeriesOrigin::Synthesized,
                values: seconds.iter().map(|&t| patch.synthesized(t)).collect(),
            },
        };
        samples.push(sample);
    }

    let correlation = CorrelationMatrix::from_samples(&samples);
    Ok(CompiledSeries {
        seconds,
        samples,
        correlation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::parse_layout;

    fn layout() -> Layout {
        parse_layout("0,A,0,0,10,10,6.283185307179586,0;1,B,0,0,10,10,6.283185307179586,3.141592653589793;2,C,0,0,10,10,1,0").unwrap()
    }

    #[test]
    fn test_sample_count_is_floor_of_body_over_interval() {
        let c = compile_series(&layout(), &ExternalSeries::new(), 2.0, SAMPLING_INTERVAL).unwrap();
        assert_eq!(c.sample_count(), 200);
        assert!(c.samples.iter().all(|s| s.values.len() == 200));
        assert!((c.seconds[199] - 1.99).abs() < 1e-9);
    }

    #[test]
    fn test_external_series_is_tiled_not_interpolated() {
        let mut ext = ExternalSeries::new();
        ext.insert("A", vec![0.1, 0.9, 0.4]);
        let c = compile_series(&layout(), &ext, 0.1, SAMPLING_INTERVAL).unwrap();
        let a = c.get("A").unwrap();
        assert_eq!(a.origin, SeriesOrigin::External);
        assert_eq!(a.values, vec![0.1, 0.9, 0.4, 0.1, 0.9, 0.4, 0.1, 0.9, 0.4, 0.1]);
        assert_eq!(c.get("B").unwrap().origin, SeriesOrigin::Synthesized);
    }

    #[test]
    fn test_external_series_longer_than_needed_is_truncated() {
        let mut ext = ExternalSeries::new();
        ext.insert("C", (0..50).map(|i| i as f64 / 50.0).collect());
        let c = compile_series(&layout(), &ext, 0.05, SAMPLING_INTERVAL).unwrap();
        assert_eq!(c.get("C").unwrap().values, vec![0.0, 0.02, 0.04, 0.06, 0.08]);
    }

    #[test]
    fn test_synthesized_values_in_unit_range() {
        let c = compile_series(&layout(), &ExternalSeries::new(), 1.0, SAMPLING_INTERVAL).unwrap();
        let a = c.get("A").unwrap();
        assert!((a.values[0] - 1.0).abs() < 1e-12);
        assert!((a.values[50]).abs() < 1e-9);
        assert!(c.samples.iter().flat_map(|s| &s.values).all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_empty_or_non_finite_external_series() {
        let mut ext = ExternalSeries::new();
        ext.insert("A", vec![]);
        assert!(matches!(
            compile_series(&layout(), &ext, 1.0, SAMPLING_INTERVAL),
            Err(DisplayError::Format(_))
        ));
        let mut ext = ExternalSeries::new();
        ext.insert("A", vec![0.5, f64::NAN]);
        assert!(compile_series(&layout(), &ext, 1.0, SAMPLING_INTERVAL).is_err());
    }

    #[test]
    fn test_body_shorter_than_one_sample() {
        assert!(matches!(
            compile_series(&layout(), &ExternalSeries::new(), 0.001, SAMPLING_INTERVAL),
            Err(DisplayError::Command(_))
        ));
    }

    #[test]
    fn test_sample_grid_is_bounded() {
        for body in [1e30, f64::INFINITY, f64::NAN] {
            assert!(matches!(
                compile_series(&layout(), &ExternalSeries::new(), body, SAMPLING_INTERVAL),
                Err(DisplayError::Command(_))
            ));
        }
        let too_long = (MAX_SAMPLES + 10) as f64 * SAMPLING_INTERVAL;
        assert!(compile_series(&layout(), &ExternalSeries::new(), too_long, SAMPLING_INTERVAL).is_err());
    }

    #[test]
    fn test_correlation_matrix() {
        let c = compile_series(&layout(), &ExternalSeries::new(), 1.0, SAMPLING_INTERVAL).unwrap();
        let m = &c.correlation;
        assert_eq!(m.size(), 3);
        for i in 0..3 {
            assert!((m.get(i, i) - 1.0).abs() < 1e-12);
            for j in 0..3 {
                assert!((m.get(i, j) - m.get(j, i)).abs() < 1e-12);
                assert!(m.get(i, j) >= 0.0);
            }
        }
        // B is A shifted by pi: perfectly anti-correlated, absolute value 1
        assert!((m.by_name("A", "B").unwrap() - 1.0).abs() < 1e-9);
        assert!(m.max_off_diagonal().unwrap() > 0.99);
    }

    #[test]
    fn test_constant_series_correlates_zero() {
        let mut ext = ExternalSeries::new();
        ext.insert("C", vec![0.5]);
        let c = compile_series(&layout(), &ext, 1.0, SAMPLING_INTERVAL).unwrap();
        assert_eq!(c.correlation.by_name("A", "C"), Some(0.0));
        assert_eq!(c.correlation.by_name("C", "C"), Some(1.0));
    }

    #[test]
    fn test_index_lookup_is_nearest_past() {
        let c = compile_series(&layout(), &ExternalSeries::new(), 0.05, SAMPLING_INTERVAL).unwrap();
        assert_eq!(c.index_at(0.0), 0);
        assert_eq!(c.index_at(0.005), 1);
        assert_eq!(c.index_at(0.015), 2);
        assert_eq!(c.index_at(1.0), 5);
        assert_eq!(c.value_at(0, 5), None);
        assert!(c.value_at(0, 4).is_some());
        assert_eq!(c.value_at(7, 0), None);
    }

    #[test]
    fn test_pairs() {
        let c = compile_series(&layout(), &ExternalSeries::new(), 0.03, SAMPLING_INTERVAL).unwrap();
        let pairs: Vec<_> = c.pairs("A").unwrap().collect();
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0].0, 0.0);
        assert!(c.pairs("missing").is_none());
    }
}
