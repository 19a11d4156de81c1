//! Shared axis range computation
//!
//! Every model contributes an interval per axis and contributions are merged
//! with [`Range::combine`]. The output axis is settled in a first pass so that
//! the derived axes read one final primary range: combination order never
//! changes the result.

use powerscope_domain::{Axis, Model, Output, Range, RangeSnapshot, Series};
use serde::{Deserialize, Serialize};

/// Half-width of the default detectable-alternative window, in sigmas
pub const SIGMA_SPAN: f64 = 2.5;

/// Fixed power axis used while solving for power
pub const POWER_DOMAIN: [f64; 2] = [0.01, 1.0];

/// User-adjustable plot slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlotSlot {
    /// Shared y axis of the top plots
    TopY,
    /// X axis of the top-left plot
    TopLeftX,
    /// X axis of the top-right plot
    TopRightX,
    /// X axis of the bottom (parameter space) plot
    BottomX,
}

impl PlotSlot {
    /// Axis shown in this slot while solving for `output`
    pub fn axis(&self, output: Output) -> Axis {
        match (self, output) {
            (PlotSlot::BottomX, _) => Axis::PSpace,
            (PlotSlot::TopY, Output::SampleSize | Output::SampleSizeByCi) => Axis::N,
            (PlotSlot::TopY, Output::Power) => Axis::Power,
            (PlotSlot::TopY, Output::DetectableAlternative) => Axis::Delta,
            (PlotSlot::TopLeftX, Output::SampleSize | Output::SampleSizeByCi) => Axis::Power,
            (PlotSlot::TopLeftX, _) => Axis::N,
            (PlotSlot::TopRightX, Output::DetectableAlternative) => Axis::Power,
            (PlotSlot::TopRightX, _) => Axis::Delta,
        }
    }
}

/// Compute every axis range for a set of models sharing one output
pub fn calculate(models: &[Model]) -> RangeSnapshot {
    let Some(output) = models.first().map(Model::output) else {
        return RangeSnapshot::default();
    };

    let mut ranges = RangeSnapshot::default();

    // primary pass: the output axis
    match output {
        Output::SampleSize | Output::SampleSizeByCi => {
            ranges.n = union(models.iter().filter_map(|m| {
                let n = m.number("n")?;
                Some(Range::new(floor2(0.5 * n), ceil2(1.5 * n)))
            }));
        }
        Output::Power => {
            ranges.power = Some(Range::from_array(POWER_DOMAIN));
        }
        Output::DetectableAlternative => {
            ranges.delta = union(models.iter().filter_map(|m| {
                let delta = m.det_alt()?;
                Some(Range::new(0.5 * delta, 1.5 * delta))
            }));
        }
    }

    // derived pass: read the settled primary range
    match output {
        Output::SampleSize | Output::SampleSizeByCi => {
            if let Some(n) = ranges.n.clone() {
                ranges.power = union(models.iter().filter_map(|m| x_range(m, Series::NVsPower, &n)));
                ranges.delta = union(models.iter().filter_map(|m| x_range(m, Series::NVsDelta, &n)));
            }
        }
        Output::Power => {
            if let Some(power) = ranges.power.clone() {
                ranges.n = union(models.iter().filter_map(|m| x_range(m, Series::PowerVsN, &power)));
            }
            ranges.delta = union(models.iter().filter_map(sigma_window_with_sampling));
        }
        Output::DetectableAlternative => {
            if let Some(delta) = ranges.delta.clone() {
                ranges.power =
                    union(models.iter().filter_map(|m| x_range(m, Series::DeltaVsPower, &delta)));
                ranges.n = union(models.iter().filter_map(|m| x_range(m, Series::DeltaVsN, &delta)));
            }
        }
    }

    ranges.p_space = parameter_space(models);

    for axis in Axis::ALL {
        if let Some(range) = ranges.slot_mut(axis) {
            range.description = Some(axis.description().to_string());
        }
    }
    ranges
}

/// Union of a parameter-space base `[-2.5σ, 2.5σ]` with every model's
/// confidence interval and sampling support
///
/// A bound lying outside the base is pushed out by half its magnitude.
fn parameter_space(models: &[Model]) -> Option<Range> {
    let base = union(models.iter().filter_map(sigma_window));
    let extents: Vec<[f64; 2]> = models
        .iter()
        .flat_map(|m| [m.ci_interval(), m.plot().sampling.as_ref().map(|s| s.range)])
        .flatten()
        .collect();

    let Some(base) = base else {
        return union(extents.into_iter().map(Range::from_array));
    };

    let widened = extents.into_iter().flat_map(|[lo, hi]| {
        let lo = (lo < base.min).then(|| widen_low(lo));
        let hi = (hi > base.max).then(|| widen_high(hi));
        [lo, hi].into_iter().flatten().map(|v| Range::new(v, v))
    });
    union(widened).map(|w| w.combine(&base)).or(Some(base))
}

fn sigma_window(model: &Model) -> Option<Range> {
    let sigma = model.number("sigma")?;
    Some(Range::new(-SIGMA_SPAN * sigma, SIGMA_SPAN * sigma))
}

/// `[-2.5σ, 2.5σ]`, each bound pushed out by half itself when the sampling
/// distribution reaches past it
fn sigma_window_with_sampling(model: &Model) -> Option<Range> {
    let window = sigma_window(model)?;
    let Some(sampling) = &model.plot().sampling else {
        return Some(window);
    };
    let [lo, hi] = sampling.range;
    let min = if lo < window.min { widen_low(window.min) } else { window.min };
    let max = if hi > window.max { widen_high(window.max) } else { window.max };
    Some(Range::new(min, max))
}

fn x_range(model: &Model, series: Series, y_range: &Range) -> Option<Range> {
    Range::x_range_for(model.plot().series(series)?, y_range)
}

fn union(ranges: impl IntoIterator<Item = Range>) -> Option<Range> {
    ranges
        .into_iter()
        .reduce(|acc, r| acc.combine(&r))
}

fn widen_low(value: f64) -> f64 {
    value - (value * 0.5).abs()
}

fn widen_high(value: f64) -> f64 {
    value + (value * 0.5).abs()
}

fn floor2(value: f64) -> f64 {
    (value * 100.0).floor() / 100.0
}

fn ceil2(value: f64) -> f64 {
    (value * 100.0).ceil() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use powerscope_domain::{
        attribs, ModelKind, PlotData, Point, SamplingDistribution, SolverResponse,
    };

    fn ttest(output: Output, n: f64, delta: f64, sigma: f64) -> Model {
        Model::new(
            ModelKind::TTest,
            output,
            attribs([
                ("alpha", 0.05),
                ("power", 0.8),
                ("delta", delta),
                ("sigma", sigma),
                ("n", n),
            ]),
        )
        .unwrap()
    }

    fn with_plot(mut model: Model, data: PlotData) -> Model {
        let response = SolverResponse {
            model: model.attribs(),
            data,
        };
        model.replace_from_solver(&response);
        model
    }

    #[test]
    fn test_empty_project_has_no_ranges() {
        assert_eq!(calculate(&[]), RangeSnapshot::default());
    }

    #[test]
    fn test_power_output_ranges() {
        let ranges = calculate(&[ttest(Output::Power, 33.0, 5.0, 10.0)]);
        assert_eq!(ranges.delta.as_ref().unwrap().to_array(), [-25.0, 25.0]);
        assert_eq!(ranges.power.as_ref().unwrap().to_array(), [0.01, 1.0]);
        assert_eq!(ranges.power.unwrap().description.as_deref(), Some("Power"));
        assert!(ranges.n.is_none());
    }

    #[test]
    fn test_sample_size_output_brackets_n() {
        let ranges = calculate(&[
            ttest(Output::SampleSize, 33.0, 5.0, 10.0),
            ttest(Output::SampleSize, 10.0, 5.0, 10.0),
        ]);
        assert_eq!(ranges.n.unwrap().to_array(), [5.0, 49.5]);
    }

    #[test]
    fn test_derived_axis_from_series() {
        let data = PlotData::default().with_series(
            Series::NVsPower,
            vec![
                Point::new(0.1, 5.0),
                Point::new(0.5, 20.0),
                Point::new(0.8, 33.0),
                Point::new(0.95, 60.0),
            ],
        );
        let model = with_plot(ttest(Output::SampleSize, 33.0, 5.0, 10.0), data);
        let ranges = calculate(&[model]);
        // n spans [16.5, 49.5]: first y >= 16.5 is at power 0.5, last y <= 49.5 at 0.8
        assert_eq!(ranges.power.unwrap().to_array(), [0.5, 0.8]);
        assert!(ranges.delta.is_none());
    }

    #[test]
    fn test_sampling_support_widens_delta_window() {
        let data = PlotData::default().with_sampling(SamplingDistribution {
            data: vec![],
            range: [-30.0, 10.0],
            target: 5.0,
        });
        let model = with_plot(ttest(Output::Power, 33.0, 5.0, 10.0), data);
        let ranges = calculate(&[model]);
        assert_eq!(ranges.delta.unwrap().to_array(), [-37.5, 25.0]);
    }

    #[test]
    fn test_parameter_space_widens_past_base() {
        let model = ttest(Output::Power, 33.0, 5.0, 1.0);
        let mut model = model;
        model.update(&attribs([("ci", 8.0)]), false).unwrap();
        // base [-2.5, 2.5]; interval [1, 9] → 9 pushed to 13.5
        let ranges = calculate(&[model]);
        assert_eq!(ranges.p_space.unwrap().to_array(), [-2.5, 13.5]);
    }

    #[test]
    fn test_plot_slot_axis() {
        assert_eq!(PlotSlot::TopY.axis(Output::SampleSizeByCi), Axis::N);
        assert_eq!(PlotSlot::TopLeftX.axis(Output::Power), Axis::N);
        assert_eq!(PlotSlot::TopRightX.axis(Output::DetectableAlternative), Axis::Power);
        assert_eq!(PlotSlot::BottomX.axis(Output::Power), Axis::PSpace);
    }
}
