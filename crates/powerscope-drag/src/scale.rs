//! Linear axis scale

use powerscope_domain::{AxisScale, Range};
use serde::{Deserialize, Serialize};

/// Affine map from a model-space domain onto a screen-space range
///
/// # Examples
///
/// ```
/// use powerscope_domain::AxisScale;
/// use powerscope_drag::LinearScale;
///
/// let scale = LinearScale::new([0.0, 1.0], [0.0, 100.0]);
/// assert_eq!(scale.apply(0.25), 25.0);
/// assert_eq!(scale.invert(50.0), 0.5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearScale {
    domain: [f64; 2],
    range: [f64; 2],
}

impl LinearScale {
    /// Map `domain` onto `range`
    pub fn new(domain: [f64; 2], range: [f64; 2]) -> Self {
        Self { domain, range }
    }

    /// Screen coordinates equal model values
    pub fn identity() -> Self {
        Self::new([0.0, 1.0], [0.0, 1.0])
    }

    /// Map an axis range onto `[0, width]` pixels
    pub fn from_range(range: &Range, width: f64) -> Self {
        Self::new(range.to_array(), [0.0, width])
    }

    /// Model-space extent
    pub fn domain(&self) -> [f64; 2] {
        self.domain
    }

    /// Screen-space extent
    pub fn range(&self) -> [f64; 2] {
        self.range
    }
}

impl Default for LinearScale {
    fn default() -> Self {
        Self::identity()
    }
}

impl AxisScale for LinearScale {
    fn apply(&self, value: f64) -> f64 {
        let [d0, d1] = self.domain;
        let [r0, r1] = self.range;
        if d1 == d0 {
            return r0;
        }
        r0 + (value - d0) / (d1 - d0) * (r1 - r0)
    }

    fn invert(&self, screen: f64) -> f64 {
        let [d0, d1] = self.domain;
        let [r0, r1] = self.range;
        if r1 == r0 {
            return d0;
        }
        d0 + (screen - r0) / (r1 - r0) * (d1 - d0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invert_undoes_apply() {
        let scale = LinearScale::new([-25.0, 25.0], [0.0, 500.0]);
        assert_eq!(scale.apply(0.0), 250.0);
        assert_eq!(scale.invert(250.0), 0.0);
        assert_eq!(scale.invert(scale.apply(12.5)), 12.5);
    }

    #[test]
    fn test_reversed_range() {
        // screen y grows downwards
        let scale = LinearScale::new([0.0, 1.0], [400.0, 0.0]);
        assert_eq!(scale.apply(1.0), 0.0);
        assert_eq!(scale.invert(100.0), 0.75);
    }

    #[test]
    fn test_degenerate_extents() {
        let flat_domain = LinearScale::new([3.0, 3.0], [0.0, 10.0]);
        assert_eq!(flat_domain.apply(7.0), 0.0);

        let flat_range = LinearScale::new([0.0, 1.0], [5.0, 5.0]);
        assert_eq!(flat_range.invert(5.0), 0.0);
    }

    #[test]
    fn test_from_range() {
        let scale = LinearScale::from_range(&Range::new(2.0, 6.0), 400.0);
        assert_eq!(scale.domain(), [2.0, 6.0]);
        assert_eq!(scale.range(), [0.0, 400.0]);
        assert_eq!(scale.invert(100.0), 3.0);
    }
}
