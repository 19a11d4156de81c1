//! Confidence interval table used to snap dragged CI bounds to a sample size

use serde::{Deserialize, Serialize};

/// One precomputed confidence interval and the sample size that yields it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CiEntry {
    /// Lower bound
    pub ci1: f64,
    /// Upper bound
    pub ci2: f64,
    /// Sample size
    pub n: f64,
}

impl CiEntry {
    /// Create an entry
    pub fn new(ci1: f64, ci2: f64, n: f64) -> Self {
        Self { ci1, ci2, n }
    }
}

/// Which bound of the interval is being searched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CiBound {
    /// `ci1`
    Lower,
    /// `ci2`
    Upper,
}

impl CiBound {
    fn key(&self, entry: &CiEntry) -> f64 {
        match self {
            CiBound::Lower => entry.ci1,
            CiBound::Upper => entry.ci2,
        }
    }
}

/// Two stable-sorted views of the same entries, one per bound
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CiTable {
    by_lower: Vec<CiEntry>,
    by_upper: Vec<CiEntry>,
}

impl CiTable {
    /// Build both views
    pub fn new(entries: &[CiEntry]) -> Self {
        let mut by_lower = entries.to_vec();
        by_lower.sort_by(|a, b| a.ci1.total_cmp(&b.ci1));
        let mut by_upper = entries.to_vec();
        by_upper.sort_by(|a, b| a.ci2.total_cmp(&b.ci2));
        Self { by_lower, by_upper }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.by_lower.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.by_lower.is_empty()
    }

    /// Entries sorted ascending by the given bound
    pub fn view(&self, bound: CiBound) -> &[CiEntry] {
        match bound {
            CiBound::Lower => &self.by_lower,
            CiBound::Upper => &self.by_upper,
        }
    }

    /// Leftmost insertion point of `x`: the smallest index whose key is not
    /// less than `x` (may equal `len()`)
    pub fn bisect(&self, bound: CiBound, x: f64) -> usize {
        self.view(bound).partition_point(|e| bound.key(e) < x)
    }

    /// Entry nearest to `x` from above, clamped into the table
    ///
    /// Index 0 is a valid hit. `None` only when the table is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use powerscope_domain::{CiBound, CiEntry, CiTable};
    ///
    /// let table = CiTable::new(&[CiEntry::new(0.04, 0.3, 40.0), CiEntry::new(0.10, 0.28, 45.0)]);
    /// let (index, entry) = table.lookup(CiBound::Lower, 0.12).unwrap();
    /// assert_eq!(index, 1);
    /// assert_eq!(entry.n, 45.0);
    /// ```
    pub fn lookup(&self, bound: CiBound, x: f64) -> Option<(usize, &CiEntry)> {
        let view = self.view(bound);
        if view.is_empty() {
            return None;
        }
        let index = self.bisect(bound, x).min(view.len() - 1);
        Some((index, &view[index]))
    }
}
