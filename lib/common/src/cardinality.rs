use std::fmt;

/// An estimate of how many items a stream will deliver.
///
/// Estimates flow alongside every resolved stream and drive the join
/// mediator's costing. An estimate never has to be a guarantee, but for exact
/// backends (in-memory sources, `VALUES`) it must equal the delivered count,
/// and for all backends it must upper-bound it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    /// The stream delivers exactly this many items.
    Exact(u64),
    /// The stream delivers at most roughly this many items.
    Estimate(u64),
    /// Nothing is known; treated as the worst case by cost-based mediation.
    Infinite,
}

impl Cardinality {
    /// The cardinality of the empty stream.
    pub const EMPTY: Cardinality = Cardinality::Exact(0);

    /// Returns the numeric value, if finite.
    pub fn value(self) -> Option<u64> {
        match self {
            Cardinality::Exact(value) | Cardinality::Estimate(value) => Some(value),
            Cardinality::Infinite => None,
        }
    }

    pub fn is_exact(self) -> bool {
        matches!(self, Cardinality::Exact(_))
    }

    pub fn is_infinite(self) -> bool {
        matches!(self, Cardinality::Infinite)
    }

    /// Downgrades an exact count to an estimate. Operators that can only
    /// upper-bound their output (filters, distinct) apply this to the input
    /// cardinality.
    pub fn weaken(self) -> Cardinality {
        match self {
            Cardinality::Exact(value) => Cardinality::Estimate(value),
            other => other,
        }
    }

    /// The cardinality of the concatenation or interleaving of two streams.
    pub fn sum(self, other: Cardinality) -> Cardinality {
        self.combine(other, u64::saturating_add)
    }

    /// The cardinality of the cross product of two streams.
    pub fn product(self, other: Cardinality) -> Cardinality {
        // 0 × ∞ is 0: an empty side annihilates the product.
        if self == Cardinality::Exact(0) || other == Cardinality::Exact(0) {
            return Cardinality::EMPTY;
        }
        self.combine(other, u64::saturating_mul)
    }

    /// The smaller of two cardinalities. Exactness survives only when both
    /// sides are exact.
    pub fn min(self, other: Cardinality) -> Cardinality {
        self.combine(other, u64::min)
    }

    /// The cardinality after dropping `start` items and keeping at most
    /// `length` of the remainder.
    pub fn slice(self, start: u64, length: Option<u64>) -> Cardinality {
        let apply = |value: u64| {
            let remaining = value.saturating_sub(start);
            match length {
                Some(length) => remaining.min(length),
                None => remaining,
            }
        };
        match self {
            Cardinality::Exact(value) => Cardinality::Exact(apply(value)),
            Cardinality::Estimate(value) => Cardinality::Estimate(apply(value)),
            Cardinality::Infinite => match length {
                Some(length) => Cardinality::Estimate(length),
                None => Cardinality::Infinite,
            },
        }
    }

    /// A total-order key for cost comparison; infinity sorts last.
    pub fn cost_key(self) -> u64 {
        self.value().unwrap_or(u64::MAX)
    }

    fn combine(self, other: Cardinality, op: impl FnOnce(u64, u64) -> u64) -> Cardinality {
        match (self, other) {
            (Cardinality::Exact(a), Cardinality::Exact(b)) => Cardinality::Exact(op(a, b)),
            (Cardinality::Infinite, _) | (_, Cardinality::Infinite) => Cardinality::Infinite,
            (a, b) => {
                // At least one side is an estimate.
                match (a.value(), b.value()) {
                    (Some(a), Some(b)) => Cardinality::Estimate(op(a, b)),
                    _ => Cardinality::Infinite,
                }
            }
        }
    }
}

impl From<usize> for Cardinality {
    fn from(value: usize) -> Self {
        Cardinality::Exact(value as u64)
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cardinality::Exact(value) => write!(f, "{value}"),
            Cardinality::Estimate(value) => write!(f, "~{value}"),
            Cardinality::Infinite => write!(f, "∞"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_with_empty_side_is_empty() {
        assert_eq!(
            Cardinality::Exact(0).product(Cardinality::Infinite),
            Cardinality::EMPTY
        );
        assert_eq!(
            Cardinality::Infinite.product(Cardinality::Exact(0)),
            Cardinality::EMPTY
        );
    }

    #[test]
    fn estimates_are_contagious() {
        assert_eq!(
            Cardinality::Exact(2).sum(Cardinality::Estimate(3)),
            Cardinality::Estimate(5)
        );
        assert_eq!(
            Cardinality::Exact(2).product(Cardinality::Exact(3)),
            Cardinality::Exact(6)
        );
    }

    #[test]
    fn slice_matches_the_streaming_law() {
        // totalItems = max(0, min(length, child − start))
        assert_eq!(
            Cardinality::Exact(4).slice(1, Some(2)),
            Cardinality::Exact(2)
        );
        assert_eq!(
            Cardinality::Exact(4).slice(3, Some(5)),
            Cardinality::Exact(1)
        );
        assert_eq!(
            Cardinality::Exact(4).slice(9, None),
            Cardinality::Exact(0)
        );
        assert_eq!(
            Cardinality::Infinite.slice(10, Some(7)),
            Cardinality::Estimate(7)
        );
    }

    #[test]
    fn infinity_sorts_last() {
        assert!(Cardinality::Exact(u64::MAX - 1).cost_key() < Cardinality::Infinite.cost_key());
    }
}
