//! Classifying a candidate's test result.  A confusion matrix from
//! the evaluator collapses into a pair of coarse outcomes, one for
//! the positive examples and one for the negative ones; the
//! constraint deriver dispatches on that pair (or on the raw counts,
//! under the default policy).
use std::fmt;

/// How much of one side of the example set a candidate covers.
///
/// A notional "all negative examples misclassified" outcome is never
/// distinguished from `Some`: minimal testing in the evaluator cannot
/// tell the two apart, so the classifier does not pretend to.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Outcome {
    All,
    Some,
    None,
}

/// (positive outcome, negative outcome) for one candidate.
pub type OutcomePair = (Outcome, Outcome);

/// Counts from evaluating one program against the fixed example set.
/// Counts are non-negative by construction; consistency with the
/// example-set cardinalities is checked by the evaluator adapter, not
/// here.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ConfusionMatrix {
    pub true_pos: usize,
    pub false_neg: usize,
    pub true_neg: usize,
    pub false_pos: usize,
}

impl ConfusionMatrix {
    #[must_use]
    pub fn new(true_pos: usize, false_neg: usize, true_neg: usize, false_pos: usize) -> Self {
        ConfusionMatrix {
            true_pos,
            false_neg,
            true_neg,
            false_pos,
        }
    }

    /// Collapses the counts into an outcome pair.
    ///
    /// Positive: `All` when no positive example is missed, `None`
    /// when no positive example is covered (and at least one is
    /// missed), `Some` otherwise.  Negative: `None` when no negative
    /// example is covered, `Some` otherwise.
    #[must_use]
    pub fn outcome(&self) -> OutcomePair {
        let positive = if self.false_neg == 0 {
            Outcome::All
        } else if self.true_pos == 0 {
            Outcome::None
        } else {
            Outcome::Some
        };

        let negative = if self.false_pos == 0 {
            Outcome::None
        } else {
            Outcome::Some
        };

        (positive, negative)
    }

    /// The ranking score for best-so-far bookkeeping: correctly
    /// classified examples on both sides.
    #[must_use]
    pub fn coverage_score(&self) -> usize {
        self.true_pos + self.true_neg
    }

    /// True when the candidate covers no example at all, positive or
    /// negative.  Under the evaluator's monotonicity contract, every
    /// structural extension of such a candidate covers nothing
    /// either, which is what makes specialisation pruning sound.
    #[must_use]
    pub fn covers_nothing(&self) -> bool {
        self.true_pos + self.false_pos == 0
    }

    /// A perfect candidate: complete on the positives, consistent on
    /// the negatives.
    #[must_use]
    pub fn is_perfect(&self) -> bool {
        self.outcome() == (Outcome::All, Outcome::None)
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "tp:{} fn:{} tn:{} fp:{}",
            self.true_pos, self.false_neg, self.true_neg, self.false_pos
        )
    }
}

#[test]
fn test_no_false_neg_is_all() {
    // FN = 0 forces a positive outcome of All, whatever FP says.
    for false_pos in 0..4 {
        let matrix = ConfusionMatrix::new(2, 0, 1, false_pos);
        assert_eq!(matrix.outcome().0, Outcome::All);
    }
    // Degenerate zero-positive example sets count as All too.
    assert_eq!(ConfusionMatrix::new(0, 0, 1, 0).outcome().0, Outcome::All);
}

#[test]
fn test_no_true_pos_is_none() {
    // TP = 0 with at least one miss is total incompleteness.
    let matrix = ConfusionMatrix::new(0, 3, 1, 2);
    assert_eq!(matrix.outcome().0, Outcome::None);
}

#[test]
fn test_partial_coverage_is_some() {
    let matrix = ConfusionMatrix::new(1, 2, 1, 0);
    assert_eq!(matrix.outcome(), (Outcome::Some, Outcome::None));
}

#[test]
fn test_negative_outcome_never_all() {
    // Even with every negative example misclassified, the negative
    // outcome stays Some.
    let matrix = ConfusionMatrix::new(1, 0, 0, 5);
    assert_eq!(matrix.outcome(), (Outcome::All, Outcome::Some));
}

#[test]
fn test_scores() {
    let matrix = ConfusionMatrix::new(3, 1, 2, 0);
    assert_eq!(matrix.coverage_score(), 5);
    assert!(!matrix.covers_nothing());
    assert!(!matrix.is_perfect());

    assert!(ConfusionMatrix::new(0, 2, 3, 0).covers_nothing());
    assert!(ConfusionMatrix::new(2, 0, 2, 0).is_perfect());
}
