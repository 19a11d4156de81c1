//! Plot data returned by the solver

use crate::ci_table::CiEntry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One sample of a plotted series
///
/// `x` is optional: the solver leaves it undefined where the curve has no
/// solution (e.g. power unreachable at that sample size).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Abscissa, if defined
    #[serde(default)]
    pub x: Option<f64>,
    /// Ordinate
    pub y: f64,
}

impl Point {
    /// Point with a defined abscissa
    pub fn new(x: f64, y: f64) -> Self {
        Self { x: Some(x), y }
    }
}

/// Named series; `AVsB` plots `A` on the y axis against `B` on the x axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Series {
    /// Sample size against power
    NVsPower,
    /// Sample size against detectable alternative
    NVsDelta,
    /// Power against sample size
    PowerVsN,
    /// Power against detectable alternative
    PowerVsDelta,
    /// Detectable alternative against sample size
    DeltaVsN,
    /// Detectable alternative against power
    DeltaVsPower,
}

/// Sampling distribution drawn under the parameter-space axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingDistribution {
    /// Density samples
    pub data: Vec<Point>,
    /// Support `[min, max]`
    pub range: [f64; 2],
    /// Target value (the detectable alternative)
    pub target: f64,
}

/// Everything the solver returns besides the model attributes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlotData {
    /// Curves for the top plots
    #[serde(default)]
    pub series: BTreeMap<Series, Vec<Point>>,
    /// Sampling distribution for the bottom plot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampling: Option<SamplingDistribution>,
    /// Current 95% confidence interval `[lower, upper]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ci: Option<[f64; 2]>,
    /// Confidence intervals across sample sizes, used for bound dragging
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub confidence_intervals: Vec<CiEntry>,
}

impl PlotData {
    /// Samples of a series, if the solver provided it
    pub fn series(&self, series: Series) -> Option<&[Point]> {
        self.series.get(&series).map(Vec::as_slice)
    }

    /// Builder: add a series
    pub fn with_series(mut self, series: Series, points: Vec<Point>) -> Self {
        self.series.insert(series, points);
        self
    }

    /// Builder: set the sampling distribution
    pub fn with_sampling(mut self, sampling: SamplingDistribution) -> Self {
        self.sampling = Some(sampling);
        self
    }

    /// Builder: set the confidence interval table
    pub fn with_confidence_intervals(mut self, entries: Vec<CiEntry>) -> Self {
        self.confidence_intervals = entries;
        self
    }

    /// Whether no plot data has been received yet
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
            && self.sampling.is_none()
            && self.ci.is_none()
            && self.confidence_intervals.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plot_data_json() {
        let json = r#"{
            "series": { "powerVsN": [ { "x": 10, "y": 0.2 }, { "y": 0.3 } ] },
            "sampling": { "data": [], "range": [-3.0, 13.0], "target": 5.0 },
            "confidenceIntervals": [ { "ci1": 0.1, "ci2": 0.3, "n": 40 } ]
        }"#;
        let data: PlotData = serde_json::from_str(json).unwrap();
        let points = data.series(Series::PowerVsN).unwrap();
        assert_eq!(points[0].x, Some(10.0));
        assert_eq!(points[1].x, None);
        assert_eq!(data.sampling.unwrap().range, [-3.0, 13.0]);
        assert_eq!(data.confidence_intervals.len(), 1);
    }

    #[test]
    fn test_empty() {
        assert!(PlotData::default().is_empty());
        let data = PlotData::default().with_series(Series::NVsPower, vec![]);
        assert!(!data.is_empty());
    }
}
