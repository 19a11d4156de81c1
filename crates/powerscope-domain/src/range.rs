//! Axis ranges
//!
//! [`Range`] is a plain `[min, max]` value with union semantics.
//! [`AxisRanges`] holds one optional range per plotted axis and reports
//! changes through an embedded [`ChangeRecorder`].

use crate::observable::{ChangeEvent, ChangeRecorder, ChangeValue};
use crate::plot::Point;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

/// Closed interval `[min, max]`, with `min <= max`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Range {
    /// Lower bound
    pub min: f64,
    /// Upper bound
    pub max: f64,
    /// Axis label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Which coordinate of a [`Point`] to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coord {
    /// Abscissa (skipped where undefined)
    X,
    /// Ordinate
    Y,
}

impl Coord {
    fn of(&self, point: &Point) -> Option<f64> {
        match self {
            Coord::X => point.x,
            Coord::Y => Some(point.y),
        }
    }
}

impl Range {
    /// Create a range; arguments are ordered so `min <= max` always holds
    pub fn new(a: f64, b: f64) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
            description: None,
        }
    }

    /// Builder: attach an axis label
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// From a `[min, max]` pair
    pub fn from_array(bounds: [f64; 2]) -> Self {
        Self::new(bounds[0], bounds[1])
    }

    /// As a `[min, max]` pair
    pub fn to_array(&self) -> [f64; 2] {
        [self.min, self.max]
    }

    /// Union with another range; keeps this range's description
    ///
    /// # Examples
    ///
    /// ```
    /// use powerscope_domain::Range;
    ///
    /// let union = Range::new(0.0, 2.0).combine(&Range::new(1.0, 5.0));
    /// assert_eq!(union.to_array(), [0.0, 5.0]);
    /// ```
    pub fn combine(&self, other: &Range) -> Range {
        Range {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
            description: self
                .description
                .clone()
                .or_else(|| other.description.clone()),
        }
    }

    /// Whether `value` lies inside the range
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// `max - min`
    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    /// First and last index of `series` whose `coord` lies inside the range
    ///
    /// Samples with an undefined coordinate are skipped. `None` when no
    /// sample falls inside.
    pub fn find_indices(&self, series: &[Point], coord: Coord) -> Option<(usize, usize)> {
        let inside = |p: &Point| coord.of(p).is_some_and(|v| self.contains(v));
        let first = series.iter().position(inside)?;
        let last = series.iter().rposition(inside)?;
        Some((first, last))
    }

    /// Range spanned by `coord` over `series[span.0..=span.1]`
    pub fn from_data(span: (usize, usize), series: &[Point], coord: Coord) -> Option<Range> {
        let (start, end) = span;
        let slice = series.get(start..=end)?;
        let mut values = slice.iter().filter_map(|p| coord.of(p));
        let first = values.next()?;
        let (min, max) = values.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
        Some(Range::new(min, max))
    }

    /// X extent of `series` clipped to where its y values fall inside `y_range`
    ///
    /// Scans from the front for the first sample with a defined x and
    /// `y >= y_range.min`, and from the back for the last with a defined x and
    /// `y <= y_range.max`. `None` when no sample has a defined x.
    pub fn x_range_for(series: &[Point], y_range: &Range) -> Option<Range> {
        let defined: Vec<(f64, f64)> = series
            .iter()
            .filter_map(|p| p.x.map(|x| (x, p.y)))
            .collect();
        let (first_x, _) = *defined.first()?;
        let (last_x, _) = *defined.last()?;

        let lo = defined
            .iter()
            .find(|(_, y)| *y >= y_range.min)
            .map_or(first_x, |(x, _)| *x);
        let hi = defined
            .iter()
            .rev()
            .find(|(_, y)| *y <= y_range.max)
            .map_or(last_x, |(x, _)| *x);
        Some(Range::new(lo, hi))
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.description {
            Some(d) => write!(f, "{} [{}, {}]", d, self.min, self.max),
            None => write!(f, "[{}, {}]", self.min, self.max),
        }
    }
}

/// Plotted axes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// Sample size
    #[serde(rename = "n")]
    N,
    /// Power
    #[serde(rename = "power")]
    Power,
    /// Detectable alternative
    #[serde(rename = "delta")]
    Delta,
    /// Parameter space
    #[serde(rename = "pSpace")]
    PSpace,
}

impl Axis {
    /// All axes in display order
    pub const ALL: [Axis; 4] = [Axis::N, Axis::Power, Axis::Delta, Axis::PSpace];

    /// Field name used in change records
    pub fn as_str(&self) -> &'static str {
        match self {
            Axis::N => "n",
            Axis::Power => "power",
            Axis::Delta => "delta",
            Axis::PSpace => "pSpace",
        }
    }

    /// Human-readable axis label
    pub fn description(&self) -> &'static str {
        match self {
            Axis::N => "Sample Size",
            Axis::Power => "Power",
            Axis::Delta => "Detectable Alternative",
            Axis::PSpace => "Parameter Space",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value snapshot of every axis range
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeSnapshot {
    /// Sample size axis
    pub n: Option<Range>,
    /// Power axis
    pub power: Option<Range>,
    /// Detectable alternative axis
    pub delta: Option<Range>,
    /// Parameter space axis
    pub p_space: Option<Range>,
}

impl RangeSnapshot {
    /// Range of one axis
    pub fn get(&self, axis: Axis) -> Option<&Range> {
        match axis {
            Axis::N => self.n.as_ref(),
            Axis::Power => self.power.as_ref(),
            Axis::Delta => self.delta.as_ref(),
            Axis::PSpace => self.p_space.as_ref(),
        }
    }

    /// Mutable slot of one axis
    pub fn slot_mut(&mut self, axis: Axis) -> &mut Option<Range> {
        match axis {
            Axis::N => &mut self.n,
            Axis::Power => &mut self.power,
            Axis::Delta => &mut self.delta,
            Axis::PSpace => &mut self.p_space,
        }
    }
}

/// Observable set of axis ranges
#[derive(Debug, Clone, Default)]
pub struct AxisRanges {
    current: RangeSnapshot,
    recorder: ChangeRecorder,
}

impl AxisRanges {
    /// Empty ranges
    pub fn new() -> Self {
        Self::default()
    }

    /// Range of one axis
    pub fn get(&self, axis: Axis) -> Option<&Range> {
        self.current.get(axis)
    }

    /// Set one axis, recording the change if the value differs
    pub fn set(&mut self, axis: Axis, range: Option<Range>, emit: bool) -> Option<ChangeEvent> {
        self.assign(axis, range);
        if emit {
            self.recorder.emit(false)
        } else {
            None
        }
    }

    /// Replace every axis at once; one notification lists every changed axis
    pub fn apply(&mut self, next: RangeSnapshot, emit: bool) -> Option<ChangeEvent> {
        let RangeSnapshot {
            n,
            power,
            delta,
            p_space,
        } = next;
        self.assign(Axis::N, n);
        self.assign(Axis::Power, power);
        self.assign(Axis::Delta, delta);
        self.assign(Axis::PSpace, p_space);
        if emit {
            self.recorder.emit(false)
        } else {
            None
        }
    }

    /// Value copy of the current ranges
    pub fn snapshot(&self) -> RangeSnapshot {
        self.current.clone()
    }

    /// Subscribe to range change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.recorder.subscribe()
    }

    fn assign(&mut self, axis: Axis, range: Option<Range>) {
        let slot = self.current.slot_mut(axis);
        if *slot == range {
            return;
        }
        let value = match &range {
            Some(r) => ChangeValue::Range(r.clone()),
            None => ChangeValue::Cleared,
        };
        *slot = range;
        self.recorder.record(axis.as_str(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series() -> Vec<Point> {
        vec![
            Point { x: None, y: 0.0 },
            Point::new(10.0, 0.1),
            Point::new(20.0, 0.4),
            Point::new(30.0, 0.7),
            Point::new(40.0, 0.9),
            Point { x: None, y: 1.0 },
        ]
    }

    #[test]
    fn test_new_orders_bounds() {
        let r = Range::new(5.0, -2.0);
        assert_eq!(r.min, -2.0);
        assert_eq!(r.max, 5.0);
    }

    #[test]
    fn test_combine_union() {
        let a = Range::new(0.0, 1.0).with_description("Power");
        let b = Range::new(-1.0, 0.5);
        let u = a.combine(&b);
        assert_eq!(u.to_array(), [-1.0, 1.0]);
        assert_eq!(u.description.as_deref(), Some("Power"));
    }

    #[test]
    fn test_find_indices() {
        let r = Range::new(0.3, 0.95);
        assert_eq!(r.find_indices(&series(), Coord::Y), Some((2, 4)));
        assert_eq!(Range::new(15.0, 35.0).find_indices(&series(), Coord::X), Some((2, 3)));
        assert_eq!(Range::new(50.0, 60.0).find_indices(&series(), Coord::X), None);
    }

    #[test]
    fn test_from_data() {
        let r = Range::from_data((1, 3), &series(), Coord::X).unwrap();
        assert_eq!(r.to_array(), [10.0, 30.0]);
        assert!(Range::from_data((3, 9), &series(), Coord::X).is_none());
    }

    #[test]
    fn test_x_range_for_skips_undefined() {
        let r = Range::x_range_for(&series(), &Range::new(0.3, 0.8)).unwrap();
        assert_eq!(r.to_array(), [20.0, 30.0]);
    }

    #[test]
    fn test_x_range_for_falls_back_to_extremes() {
        let r = Range::x_range_for(&series(), &Range::new(2.0, 3.0)).unwrap();
        assert_eq!(r.to_array(), [10.0, 40.0]);
        let undefined = vec![Point { x: None, y: 0.5 }];
        assert!(Range::x_range_for(&undefined, &Range::new(0.0, 1.0)).is_none());
    }

    #[test]
    fn test_axis_ranges_single_notification() {
        let mut ranges = AxisRanges::new();
        let mut rx = ranges.subscribe();
        let event = ranges
            .apply(
                RangeSnapshot {
                    n: Some(Range::new(10.0, 20.0)),
                    power: Some(Range::new(0.01, 1.0)),
                    ..Default::default()
                },
                true,
            )
            .unwrap();
        assert_eq!(event.changes.len(), 2);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_axis_ranges_unchanged_is_silent() {
        let mut ranges = AxisRanges::new();
        ranges.set(Axis::N, Some(Range::new(1.0, 2.0)), true);
        assert!(ranges.set(Axis::N, Some(Range::new(1.0, 2.0)), true).is_none());
        let event = ranges.set(Axis::N, None, true).unwrap();
        assert_eq!(event.changes["n"], ChangeValue::Cleared);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn union_all(ranges: &[Range]) -> Range {
        let mut iter = ranges.iter();
        let first = iter.next().cloned().unwrap_or_else(|| Range::new(0.0, 0.0));
        iter.fold(first, |acc, r| acc.combine(r))
    }

    proptest! {
        /// Property: combining in any order gives the same bounds
        #[test]
        fn test_combine_order_independent(
            bounds in prop::collection::vec((-1e6f64..1e6, -1e6f64..1e6), 1..30),
            seed in any::<u64>(),
        ) {
            let ranges: Vec<Range> = bounds.iter().map(|(a, b)| Range::new(*a, *b)).collect();
            let forward = union_all(&ranges);

            let mut reversed = ranges.clone();
            reversed.reverse();
            prop_assert_eq!(union_all(&reversed).to_array(), forward.to_array());

            let mut rotated = ranges.clone();
            let k = (seed as usize) % rotated.len();
            rotated.rotate_left(k);
            prop_assert_eq!(union_all(&rotated).to_array(), forward.to_array());
        }

        /// Property: (a ∪ b) ∪ c == a ∪ (b ∪ c) and a ∪ b == b ∪ a
        #[test]
        fn test_combine_laws(
            a in (-1e3f64..1e3, -1e3f64..1e3),
            b in (-1e3f64..1e3, -1e3f64..1e3),
            c in (-1e3f64..1e3, -1e3f64..1e3),
        ) {
            let a = Range::new(a.0, a.1);
            let b = Range::new(b.0, b.1);
            let c = Range::new(c.0, c.1);
            prop_assert_eq!(a.combine(&b).to_array(), b.combine(&a).to_array());
            prop_assert_eq!(
                a.combine(&b).combine(&c).to_array(),
                a.combine(&b.combine(&c)).to_array()
            );
        }
    }
}
