//! The search layer: the backend and evaluator seams, the loop
//! controller that ties them together, and run bookkeeping.
//!
//! The two traits here are the crate's only contact points with
//! solver machinery.  `Enumerator` hides the combinatorial backend
//! behind a draw/constrain/restart session protocol; `Evaluator`
//! hides the inference engine behind a single scoring call.  The
//! `trivial` module provides scripted in-memory implementations of
//! both, sufficient to exercise every control path in the loop.
mod enumerate;
mod evaluate;
mod refine;
mod stats;
pub mod trivial;

pub use enumerate::Enumerator;
pub use enumerate::SearchBounds;
pub use evaluate::checked_test;
pub use evaluate::Evaluation;
pub use evaluate::Evaluator;
pub use evaluate::EvaluatorFault;
pub use evaluate::ExampleCounts;
pub use evaluate::Examples;
pub use evaluate::SearchError;
pub use refine::search;
pub use refine::SearchConfig;
pub use refine::SearchOutcome;
pub use refine::TerminationPolicy;
pub use stats::Phase;
pub use stats::SearchStats;
