//! Counterexample-guided search for clausal hypotheses.
//!
//! Given a space of candidate logic programs and a set of labelled
//! examples, the crate runs a generate-test-constrain loop: draw a
//! candidate from an enumeration backend, score it against the
//! examples, and when it misbehaves, derive constraints that rule
//! out the candidate together with every program that must fail the
//! same way.  Constraints are grounded into ordinary clauses and fed
//! back to the backend in batches, shrinking the space as the search
//! walks increasing structural size bounds.
//!
//! The crate owns the hypothesis representation, the outcome
//! classification, the constraint model, and the loop controller.
//! The enumeration backend and the example evaluator live behind
//! traits (`search::Enumerator`, `search::Evaluator`); scripted
//! in-memory implementations for tests are in `search::trivial`.
pub mod constrain;
pub mod outcome;
pub mod program;
pub mod search;
