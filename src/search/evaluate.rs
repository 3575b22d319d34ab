//! The scoring oracle's contract and its checked adapter.
//!
//! The evaluator is external; this module pins down the split the
//! loop relies on: a per-candidate timeout is "no result" and the
//! candidate is skipped, while an internal fault on a well-formed
//! program is an invariant violation that aborts the run with a dump
//! of the offending clauses.  The adapter also rejects confusion
//! matrices that disagree with the example-set cardinalities instead
//! of letting malformed counts reach the classifier.
use crate::outcome::ConfusionMatrix;
use crate::program::Program;
use thiserror::Error;

/// The result of scoring one candidate.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Evaluation {
    Scored(ConfusionMatrix),
    /// The per-candidate timeout fired: no result, not an error.
    TimedOut,
}

/// An internal evaluator failure on a well-formed program.
#[derive(Debug, Error, Eq, PartialEq)]
#[error("{0}")]
pub struct EvaluatorFault(pub String);

/// The scoring oracle.  `test` must be deterministic for a fixed
/// example set, and non-increasing in TP + FP as literals are added
/// to any clause of the program (the monotonicity contract);
/// violating that breaks the soundness of specialisation pruning.
pub trait Evaluator {
    fn test(&mut self, program: &Program) -> Result<Evaluation, EvaluatorFault>;
}

/// A labeled example set.  Payloads are opaque to the search core;
/// only the cardinalities matter here, and they are computed once at
/// startup.
#[derive(Clone, Debug)]
pub struct Examples<E> {
    pub pos: Vec<E>,
    pub neg: Vec<E>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ExampleCounts {
    pub num_pos: usize,
    pub num_neg: usize,
}

impl<E> Examples<E> {
    #[must_use]
    pub fn counts(&self) -> ExampleCounts {
        ExampleCounts {
            num_pos: self.pos.len(),
            num_neg: self.neg.len(),
        }
    }
}

/// A run-fatal failure of the search loop.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("evaluator fault while testing candidate:\n{program}\ncause: {fault}")]
    EvaluatorFault {
        program: Program,
        #[source]
        fault: EvaluatorFault,
    },
    #[error(
        "confusion matrix disagrees with example counts \
         (pos: {num_pos}, neg: {num_neg}): {matrix}"
    )]
    MalformedCounts {
        matrix: ConfusionMatrix,
        num_pos: usize,
        num_neg: usize,
    },
}

/// Invokes the evaluator on `program` and validates the result
/// against the example-set cardinalities.
///
/// # Errors
///
/// Returns `Err` when the evaluator reports an internal fault (the
/// error carries the offending clauses for the diagnostic dump), or
/// when the returned counts exceed the number of positive or negative
/// examples.
pub fn checked_test<V: Evaluator>(
    evaluator: &mut V,
    program: &Program,
    counts: ExampleCounts,
) -> Result<Evaluation, SearchError> {
    let evaluation = evaluator
        .test(program)
        .map_err(|fault| SearchError::EvaluatorFault {
            program: program.clone(),
            fault,
        })?;

    if let Evaluation::Scored(matrix) = &evaluation {
        if matrix.true_pos + matrix.false_neg > counts.num_pos
            || matrix.true_neg + matrix.false_pos > counts.num_neg
        {
            return Err(SearchError::MalformedCounts {
                matrix: *matrix,
                num_pos: counts.num_pos,
                num_neg: counts.num_neg,
            });
        }
    }

    Ok(evaluation)
}

#[cfg(test)]
struct ConstEvaluator(Result<Evaluation, EvaluatorFault>);

#[cfg(test)]
impl Evaluator for ConstEvaluator {
    fn test(&mut self, _: &Program) -> Result<Evaluation, EvaluatorFault> {
        match &self.0 {
            Ok(evaluation) => Ok(*evaluation),
            Err(EvaluatorFault(message)) => Err(EvaluatorFault(message.clone())),
        }
    }
}

#[cfg(test)]
fn one_clause_program() -> Program {
    use crate::program::{Clause, Literal};

    Program::new(vec![Clause::new(
        Literal::new("h", vec![]),
        vec![Literal::new("b", vec![])],
    )])
}

#[test]
fn test_checked_test_passes_valid_counts() {
    let counts = ExampleCounts {
        num_pos: 2,
        num_neg: 2,
    };
    let mut evaluator =
        ConstEvaluator(Ok(Evaluation::Scored(ConfusionMatrix::new(1, 1, 2, 0))));

    let evaluation =
        checked_test(&mut evaluator, &one_clause_program(), counts).expect("ok");
    assert_eq!(
        evaluation,
        Evaluation::Scored(ConfusionMatrix::new(1, 1, 2, 0))
    );
}

#[test]
fn test_checked_test_rejects_overcounts() {
    // TP + FN exceeding the positive example count is a precondition
    // violation, not something to coerce.
    let counts = ExampleCounts {
        num_pos: 1,
        num_neg: 1,
    };
    let mut evaluator =
        ConstEvaluator(Ok(Evaluation::Scored(ConfusionMatrix::new(2, 1, 0, 0))));

    match checked_test(&mut evaluator, &one_clause_program(), counts) {
        Err(SearchError::MalformedCounts { num_pos, .. }) => assert_eq!(num_pos, 1),
        other => panic!("expected malformed counts, got {:?}", other),
    }
}

#[test]
fn test_checked_test_dumps_offending_program_on_fault() {
    let counts = ExampleCounts {
        num_pos: 1,
        num_neg: 1,
    };
    let mut evaluator = ConstEvaluator(Err(EvaluatorFault("inference fault".into())));

    match checked_test(&mut evaluator, &one_clause_program(), counts) {
        Err(error @ SearchError::EvaluatorFault { .. }) => {
            let message = error.to_string();
            assert!(message.contains("h :- b."));
            assert!(message.contains("inference fault"));
        }
        other => panic!("expected evaluator fault, got {:?}", other),
    }
}

#[test]
fn test_timeout_is_not_an_error() {
    let counts = ExampleCounts {
        num_pos: 1,
        num_neg: 1,
    };
    let mut evaluator = ConstEvaluator(Ok(Evaluation::TimedOut));

    let evaluation =
        checked_test(&mut evaluator, &one_clause_program(), counts).expect("ok");
    assert_eq!(evaluation, Evaluation::TimedOut);
}

#[test]
fn test_example_counts() {
    let examples = Examples {
        pos: vec!["p1", "p2"],
        neg: vec!["n1"],
    };
    assert_eq!(
        examples.counts(),
        ExampleCounts {
            num_pos: 2,
            num_neg: 1
        }
    );
}
