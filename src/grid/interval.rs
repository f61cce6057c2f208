//! Closed integer intervals over grid columns.

/// A closed interval `[inf, sup]` of tile-grid indices.
///
/// An interval with `inf > sup` is empty; [`IntervalI::empty`] is the
/// canonical empty value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalI {
    inf: i64,
    sup: i64,
}

/// Result of cutting one interval against another.
///
/// The overlap plus the leftover pieces on each side. An interval that
/// extends past the overlap on both ends contributes two leftover pieces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalCut {
    /// The shared sub-interval (empty when the two do not overlap).
    pub intersection: IntervalI,
    /// Pieces covered only by the interval `cut` was called on.
    pub only_self: Vec<IntervalI>,
    /// Pieces covered only by the other interval.
    pub only_other: Vec<IntervalI>,
}

impl IntervalI {
    /// Interval covering `inf..=sup`.
    pub fn new(inf: i64, sup: i64) -> Self {
        Self { inf, sup }
    }

    /// The canonical empty interval.
    pub fn empty() -> Self {
        Self { inf: 0, sup: -1 }
    }

    /// Lower bound (inclusive).
    pub fn inf(&self) -> i64 {
        self.inf
    }

    /// Upper bound (inclusive).
    pub fn sup(&self) -> i64 {
        self.sup
    }

    /// Extend the upper bound.
    pub fn set_sup(&mut self, sup: i64) {
        self.sup = sup;
    }

    /// Whether the interval contains no indices.
    pub fn is_empty(&self) -> bool {
        self.inf > self.sup
    }

    /// Number of indices covered.
    pub fn length(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            (self.sup - self.inf + 1) as u64
        }
    }

    /// Whether `value` falls inside the interval.
    pub fn contains(&self, value: i64) -> bool {
        self.inf <= value && value <= self.sup
    }

    /// Whether the two intervals share at least one index.
    pub fn intersects(&self, other: &IntervalI) -> bool {
        !self.intersection(other).is_empty()
    }

    /// The shared sub-interval, empty when disjoint.
    pub fn intersection(&self, other: &IntervalI) -> IntervalI {
        let inf = self.inf.max(other.inf);
        let sup = self.sup.min(other.sup);
        if inf <= sup {
            IntervalI::new(inf, sup)
        } else {
            IntervalI::empty()
        }
    }

    /// Cut this interval against `other`.
    ///
    /// Splits the union of the two into the shared overlap and the pieces
    /// unique to each side, attributing every leftover to the interval that
    /// actually covers it. When the intervals are disjoint each one is its
    /// own single leftover.
    pub fn cut(&self, other: &IntervalI) -> IntervalCut {
        let intersection = self.intersection(other);
        if intersection.is_empty() {
            return IntervalCut {
                intersection,
                only_self: vec![*self],
                only_other: vec![*other],
            };
        }

        let mut only_self = Vec::new();
        let mut only_other = Vec::new();

        if self.inf < intersection.inf {
            only_self.push(IntervalI::new(self.inf, intersection.inf - 1));
        } else if other.inf < intersection.inf {
            only_other.push(IntervalI::new(other.inf, intersection.inf - 1));
        }

        if self.sup > intersection.sup {
            only_self.push(IntervalI::new(intersection.sup + 1, self.sup));
        } else if other.sup > intersection.sup {
            only_other.push(IntervalI::new(intersection.sup + 1, other.sup));
        }

        IntervalCut {
            intersection,
            only_self,
            only_other,
        }
    }
}
