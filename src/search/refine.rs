//! The refinement loop: iterate structural size bounds, drain
//! candidates from the enumeration backend, classify each against the
//! examples, turn rejections into grounded constraints, and feed
//! those back to the backend in batches.
//!
//! Control is single threaded: one candidate is fully processed
//! (classify, derive, ground, buffer or accept) before the next is
//! drawn.  The backend's knowledge base is mutated exclusively by the
//! flush step, which restarts the enumeration session so that no
//! candidate is ever drawn from a session that predates the flush.
//! Constraints sitting in the buffer are invisible to the backend, so
//! the same constraint may be derived more than once; the grounded
//! sets and the accepted list both deduplicate.
use super::enumerate::{Enumerator, SearchBounds};
use super::evaluate::{checked_test, Evaluation, Evaluator, ExampleCounts, SearchError};
use super::stats::{Phase, SearchStats};
use crate::constrain::{ground_constraints, BindingSearch, DerivePolicy, Deriver};
use crate::outcome::ConfusionMatrix;
use crate::program::{Clause, Program};
use log::{debug, info};
use rustc_hash::FxHashSet;
use std::time::{Duration, Instant};

/// Whether to stop on the first perfect candidate or keep
/// accumulating every accepted hypothesis until the size bounds are
/// exhausted.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TerminationPolicy {
    Exhaustive,
    EarlyExit,
}

pub struct SearchConfig {
    /// Upper bound on total literal count; the outer loop walks sizes
    /// `1..=max_literals`.
    pub max_literals: usize,
    pub max_clauses: usize,
    pub max_vars: usize,
    /// Flush the pending constraint batches once this many grounded
    /// sets are buffered.
    pub batch_threshold: usize,
    pub policy: DerivePolicy,
    pub termination: TerminationPolicy,
    /// Wall-clock budget for the whole run; accepted hypotheses
    /// recorded before expiry remain valid outputs.
    pub deadline: Option<Duration>,
}

impl SearchConfig {
    #[must_use]
    pub fn new(max_literals: usize, max_clauses: usize, max_vars: usize) -> Self {
        SearchConfig {
            max_literals,
            max_clauses,
            max_vars,
            batch_threshold: 1000,
            policy: DerivePolicy::ZeroCoverage,
            termination: TerminationPolicy::Exhaustive,
            deadline: None,
        }
    }
}

/// What a run produced: every accepted hypothesis in discovery order
/// (deduplicated), and the best-scoring one with its confusion
/// matrix, if any candidate was accepted at all.
#[derive(Debug)]
pub struct SearchOutcome {
    pub accepted: Vec<Program>,
    pub best: Option<(Program, ConfusionMatrix)>,
}

/// Running bookkeeping for accepted hypotheses: discovery order,
/// value dedup, and the best coverage score seen so far.
struct Accepted {
    programs: Vec<Program>,
    seen: FxHashSet<Program>,
    best: Option<(Program, ConfusionMatrix)>,
}

impl Accepted {
    fn new() -> Self {
        Accepted {
            programs: Vec::new(),
            seen: FxHashSet::default(),
            best: None,
        }
    }

    fn record(&mut self, program: &Program, matrix: &ConfusionMatrix, stats: &mut SearchStats) {
        if self.seen.insert(program.clone()) {
            info!("hypothesis:\n{}", program);
            self.programs.push(program.clone());
            stats.accepted += 1;
        }

        let improves = match &self.best {
            Some((_, current)) => matrix.coverage_score() > current.coverage_score(),
            None => true,
        };
        if improves {
            self.best = Some((program.clone(), *matrix));
        }
    }

    fn into_outcome(self) -> SearchOutcome {
        SearchOutcome {
            accepted: self.programs,
            best: self.best,
        }
    }
}

/// Runs the counterexample-guided search to completion (or deadline).
///
/// # Errors
///
/// Returns `Err` when the evaluator faults on a well-formed candidate
/// or reports counts that disagree with the example cardinalities.
/// Session exhaustion, per-candidate timeouts, and an empty result
/// set are all normal control flow.
pub fn search<E, V, B>(
    enumerator: &mut E,
    evaluator: &mut V,
    bindings: &B,
    counts: ExampleCounts,
    config: &SearchConfig,
    stats: &mut SearchStats,
) -> Result<SearchOutcome, SearchError>
where
    E: Enumerator,
    V: Evaluator,
    B: BindingSearch,
{
    let started = Instant::now();
    let mut deriver = Deriver::new();
    let mut buffer: Vec<FxHashSet<Clause>> = Vec::new();
    let mut accepted = Accepted::new();

    'sizes: for size in 1..=config.max_literals {
        let bounds = SearchBounds {
            max_clauses: config.max_clauses,
            max_vars: config.max_vars,
            size,
        };
        enumerator.configure(&bounds);
        // The buffer is per size.  Whatever is still pending was
        // never flushed and is dropped here; if those candidates come
        // back at this size, their constraints are re-derived and
        // re-deduplicated.
        buffer.clear();
        stats.max_size_reached = size;
        info!("searching programs of size {}", size);

        loop {
            let candidate = match stats.time(Phase::Generate, || enumerator.next_candidate()) {
                Some(candidate) => candidate,
                // Sequence exhausted for this size and constraint
                // set: advance the size bound.
                None => continue 'sizes,
            };

            if let Some(limit) = config.deadline {
                if started.elapsed() >= limit {
                    stats.cancelled = true;
                    info!(
                        "wall clock budget exhausted; keeping {} accepted hypotheses",
                        accepted.programs.len()
                    );
                    break 'sizes;
                }
            }

            let evaluation = stats.time(Phase::Test, || {
                checked_test(evaluator, &candidate.program, counts)
            })?;
            let matrix = match evaluation {
                Evaluation::Scored(matrix) => matrix,
                Evaluation::TimedOut => {
                    stats.timeouts += 1;
                    debug!("evaluation timed out; candidate skipped");
                    continue;
                }
            };
            stats.candidates_tested += 1;
            let pair = matrix.outcome();

            if config.termination == TerminationPolicy::EarlyExit && matrix.is_perfect() {
                accepted.record(&candidate.program, &matrix, stats);
                break 'sizes;
            }

            let templates = stats.time(Phase::Build, || {
                deriver.derive(config.policy, &candidate, pair, &matrix)
            });
            stats.constraints_derived += templates.len();

            let grounded = stats.time(Phase::Ground, || {
                ground_constraints(&templates, config.max_clauses, config.max_vars, bindings)
            });

            if grounded.is_empty() {
                accepted.record(&candidate.program, &matrix, stats);
            } else {
                stats.constraints_grounded += grounded.len();
                buffer.push(grounded);
                if buffer.len() >= config.batch_threshold {
                    flush(enumerator, &mut buffer, stats);
                }
            }
        }
    }

    Ok(accepted.into_outcome())
}

/// Pushes every buffered grounded-constraint set into the backend's
/// knowledge base and restarts the enumeration session, so that the
/// next candidate drawn already respects the new constraints.
fn flush<E: Enumerator>(
    enumerator: &mut E,
    buffer: &mut Vec<FxHashSet<Clause>>,
    stats: &mut SearchStats,
) {
    debug!("flushing {} constraint batches", buffer.len());
    enumerator.restart_session();
    stats.time(Phase::Add, || {
        for batch in buffer.drain(..) {
            enumerator.add_constraints(&batch);
        }
    });
    stats.flushes += 1;
}

#[cfg(test)]
fn test_counts() -> ExampleCounts {
    ExampleCounts {
        num_pos: 1,
        num_neg: 1,
    }
}

/// One clause per head name, each `h :- b`.
#[cfg(test)]
fn test_candidate(heads: &[&str]) -> crate::program::Candidate {
    use crate::program::{BeforeMap, Candidate, Literal};

    let clauses = heads.iter().map(|head| {
        Clause::new(
            Literal::new(head, vec![]),
            vec![Literal::new("b", vec![])],
        )
    });
    Candidate::new(Program::new(clauses), BeforeMap::new()).expect("ok")
}

#[cfg(test)]
fn scored(tp: usize, misses: usize, tn: usize, fp: usize) -> Evaluation {
    Evaluation::Scored(ConfusionMatrix::new(tp, misses, tn, fp))
}

#[test]
fn test_perfect_candidate_accepted_with_score_two() {
    use crate::search::trivial::{SlotBindingSearch, TableEvaluator, VecEnumerator};

    // numPos = numNeg = 1; a candidate scoring (1, 0, 1, 0) must be
    // classified (All, None), produce no constraint, and be recorded
    // with coverage score 2.
    let one = test_candidate(&["p"]);

    let mut enumerator = VecEnumerator::new();
    enumerator.script(2, one.clone());

    let mut evaluator = TableEvaluator::new(scored(0, 1, 1, 0));
    evaluator.score(one.program.clone(), scored(1, 0, 1, 0));

    let mut stats = SearchStats::new();
    let outcome = search(
        &mut enumerator,
        &mut evaluator,
        &SlotBindingSearch,
        test_counts(),
        &SearchConfig::new(2, 2, 2),
        &mut stats,
    )
    .expect("ok");

    assert_eq!(outcome.accepted, vec![one.program.clone()]);
    let (best, matrix) = outcome.best.expect("has best");
    assert_eq!(best, one.program);
    assert_eq!(matrix.coverage_score(), 2);
    assert_eq!(stats.accepted, 1);
    assert_eq!(stats.constraints_derived, 0);
}

#[test]
fn test_zero_coverage_candidate_constrained_not_accepted() {
    use crate::search::trivial::{SlotBindingSearch, TableEvaluator, VecEnumerator};

    // A candidate covering nothing must produce exactly one
    // specialisation constraint and no accepted hypothesis.
    let one = test_candidate(&["p"]);

    let mut enumerator = VecEnumerator::new();
    enumerator.script(2, one.clone());

    let mut evaluator = TableEvaluator::new(scored(0, 1, 1, 0));

    let mut stats = SearchStats::new();
    let outcome = search(
        &mut enumerator,
        &mut evaluator,
        &SlotBindingSearch,
        test_counts(),
        &SearchConfig::new(2, 2, 2),
        &mut stats,
    )
    .expect("ok");

    assert!(outcome.accepted.is_empty());
    assert!(outcome.best.is_none());
    assert_eq!(stats.constraints_derived, 1);
    assert!(stats.constraints_grounded >= 1);
    // Below the batch threshold: nothing was flushed.
    assert_eq!(stats.flushes, 0);
    assert_eq!(enumerator.knowledge_len(), 0);
}

#[test]
fn test_flush_fires_exactly_at_threshold() {
    use crate::search::trivial::{SlotBindingSearch, TableEvaluator, VecEnumerator};

    // Three zero-coverage candidates and a threshold of two: the
    // flush fires once, at the second buffered set, and the third set
    // stays buffered.
    let first = test_candidate(&["p"]);
    let second = test_candidate(&["q"]);
    let third = test_candidate(&["r"]);

    let mut enumerator = VecEnumerator::new();
    enumerator.script(2, first.clone());
    enumerator.script(2, second.clone());
    enumerator.script(2, third.clone());

    let mut evaluator = TableEvaluator::new(scored(0, 1, 1, 0));

    let mut config = SearchConfig::new(2, 2, 2);
    config.batch_threshold = 2;

    let mut stats = SearchStats::new();
    search(
        &mut enumerator,
        &mut evaluator,
        &SlotBindingSearch,
        test_counts(),
        &config,
        &mut stats,
    )
    .expect("ok");

    assert_eq!(stats.flushes, 1);
    // Only the two flushed constraints made it to the backend.
    assert_eq!(enumerator.knowledge_len(), 2);
}

#[test]
fn test_flushed_constraint_prunes_extensions() {
    use crate::search::trivial::{SlotBindingSearch, TableEvaluator, VecEnumerator};

    // Once the zero-coverage candidate's specialisation constraint is
    // flushed, neither the candidate nor its structural extension is
    // ever re-tested, and no redundant constraint is derived.
    let base = test_candidate(&["p"]);
    let extension = test_candidate(&["p", "q"]);

    let mut enumerator = VecEnumerator::new();
    enumerator.script(2, base.clone());
    enumerator.script(4, extension.clone());

    let mut evaluator = TableEvaluator::new(scored(0, 1, 1, 0));

    let mut config = SearchConfig::new(4, 2, 2);
    config.batch_threshold = 1;

    let mut stats = SearchStats::new();
    let outcome = search(
        &mut enumerator,
        &mut evaluator,
        &SlotBindingSearch,
        test_counts(),
        &config,
        &mut stats,
    )
    .expect("ok");

    assert!(outcome.accepted.is_empty());
    assert_eq!(evaluator.tested, vec![base.program]);
    assert_eq!(stats.constraints_derived, 1);
    assert_eq!(stats.flushes, 1);
}

#[test]
fn test_reoffered_hypothesis_deduplicated() {
    use crate::search::trivial::{SlotBindingSearch, TableEvaluator, VecEnumerator};

    // An accepted candidate re-offered by the fresh session after a
    // flush is re-tested but recorded only once.
    let good = test_candidate(&["p"]);
    let bad = test_candidate(&["q"]);

    let mut enumerator = VecEnumerator::new();
    enumerator.script(2, good.clone());
    enumerator.script(2, bad.clone());

    let mut evaluator = TableEvaluator::new(scored(0, 1, 1, 0));
    evaluator.score(good.program.clone(), scored(1, 0, 0, 1));

    let mut config = SearchConfig::new(2, 2, 2);
    config.batch_threshold = 1;

    let mut stats = SearchStats::new();
    let outcome = search(
        &mut enumerator,
        &mut evaluator,
        &SlotBindingSearch,
        test_counts(),
        &config,
        &mut stats,
    )
    .expect("ok");

    // `good` was tested before and after the flush restart.
    assert_eq!(
        evaluator.tested,
        vec![good.program.clone(), bad.program, good.program.clone()]
    );
    assert_eq!(outcome.accepted, vec![good.program]);
    assert_eq!(stats.accepted, 1);
}

#[test]
fn test_best_tracks_highest_coverage() {
    use crate::search::trivial::{SlotBindingSearch, TableEvaluator, VecEnumerator};

    let low = test_candidate(&["p"]);
    let high = test_candidate(&["q"]);

    let mut enumerator = VecEnumerator::new();
    enumerator.script(2, low.clone());
    enumerator.script(2, high.clone());

    let mut evaluator = TableEvaluator::new(scored(0, 1, 1, 0));
    evaluator.score(low.program.clone(), scored(1, 0, 0, 1));
    evaluator.score(high.program.clone(), scored(1, 0, 1, 0));

    let mut stats = SearchStats::new();
    let outcome = search(
        &mut enumerator,
        &mut evaluator,
        &SlotBindingSearch,
        test_counts(),
        &SearchConfig::new(2, 2, 2),
        &mut stats,
    )
    .expect("ok");

    assert_eq!(outcome.accepted.len(), 2);
    let (best, matrix) = outcome.best.expect("has best");
    assert_eq!(best, high.program);
    assert_eq!(matrix.coverage_score(), 2);
}

#[test]
fn test_timeout_skips_candidate() {
    use crate::search::trivial::{SlotBindingSearch, TableEvaluator, VecEnumerator};

    let slow = test_candidate(&["p"]);
    let fine = test_candidate(&["q"]);

    let mut enumerator = VecEnumerator::new();
    enumerator.script(2, slow.clone());
    enumerator.script(2, fine.clone());

    let mut evaluator = TableEvaluator::new(scored(1, 0, 1, 0));
    evaluator.score(slow.program.clone(), Evaluation::TimedOut);

    let mut stats = SearchStats::new();
    let outcome = search(
        &mut enumerator,
        &mut evaluator,
        &SlotBindingSearch,
        test_counts(),
        &SearchConfig::new(2, 2, 2),
        &mut stats,
    )
    .expect("ok");

    // The timed out candidate is neither accepted nor constrained;
    // the run continues.
    assert_eq!(outcome.accepted, vec![fine.program]);
    assert_eq!(stats.timeouts, 1);
    assert_eq!(stats.candidates_tested, 1);
}

#[test]
fn test_evaluator_fault_aborts_with_dump() {
    use crate::search::trivial::{SlotBindingSearch, TableEvaluator, VecEnumerator};

    let broken = test_candidate(&["p"]);

    let mut enumerator = VecEnumerator::new();
    enumerator.script(2, broken.clone());

    let mut evaluator = TableEvaluator::new(scored(1, 0, 1, 0));
    evaluator.fault(broken.program.clone(), "inference fault");

    let mut stats = SearchStats::new();
    let error = search(
        &mut enumerator,
        &mut evaluator,
        &SlotBindingSearch,
        test_counts(),
        &SearchConfig::new(2, 2, 2),
        &mut stats,
    )
    .expect_err("fault is fatal");

    assert!(error.to_string().contains("p :- b."));
}

#[test]
fn test_malformed_counts_rejected() {
    use crate::search::trivial::{SlotBindingSearch, TableEvaluator, VecEnumerator};

    let one = test_candidate(&["p"]);

    let mut enumerator = VecEnumerator::new();
    enumerator.script(2, one.clone());

    // Five true positives against a single positive example.
    let mut evaluator = TableEvaluator::new(scored(5, 0, 0, 0));

    let mut stats = SearchStats::new();
    let error = search(
        &mut enumerator,
        &mut evaluator,
        &SlotBindingSearch,
        test_counts(),
        &SearchConfig::new(2, 2, 2),
        &mut stats,
    )
    .expect_err("malformed counts are fatal");

    assert!(matches!(error, SearchError::MalformedCounts { .. }));
}

#[test]
fn test_exhausted_sizes_with_no_hypotheses_is_ok() {
    use crate::search::trivial::{SlotBindingSearch, TableEvaluator, VecEnumerator};

    let mut enumerator = VecEnumerator::new();
    let mut evaluator = TableEvaluator::new(scored(1, 0, 1, 0));

    let mut stats = SearchStats::new();
    let outcome = search(
        &mut enumerator,
        &mut evaluator,
        &SlotBindingSearch,
        test_counts(),
        &SearchConfig::new(3, 2, 2),
        &mut stats,
    )
    .expect("ok");

    assert!(outcome.accepted.is_empty());
    assert!(outcome.best.is_none());
    assert_eq!(stats.max_size_reached, 3);
}

#[test]
fn test_buffer_is_per_size() {
    use crate::search::trivial::{SlotBindingSearch, TableEvaluator, VecEnumerator};

    // One buffered set at size 2 and one at size 4 never add up to
    // the threshold of two: the buffer resets on each size
    // transition, and the dropped constraint is simply re-derivable.
    let first = test_candidate(&["p"]);
    let second = test_candidate(&["q", "r"]);

    let mut enumerator = VecEnumerator::new();
    enumerator.script(2, first.clone());
    enumerator.script(4, second.clone());

    let mut evaluator = TableEvaluator::new(scored(0, 1, 1, 0));

    let mut config = SearchConfig::new(4, 2, 2);
    config.batch_threshold = 2;

    let mut stats = SearchStats::new();
    search(
        &mut enumerator,
        &mut evaluator,
        &SlotBindingSearch,
        test_counts(),
        &config,
        &mut stats,
    )
    .expect("ok");

    assert_eq!(stats.flushes, 0);
    assert_eq!(enumerator.knowledge_len(), 0);
}

#[test]
fn test_early_exit_stops_on_perfect_candidate() {
    use crate::search::trivial::{SlotBindingSearch, TableEvaluator, VecEnumerator};

    // Under the early-exit policy the first (All, None) candidate
    // ends the run, even though the outcome-table policy would have
    // banished it and kept searching.
    let perfect = test_candidate(&["p"]);
    let untouched = test_candidate(&["q"]);

    let mut enumerator = VecEnumerator::new();
    enumerator.script(2, perfect.clone());
    enumerator.script(2, untouched.clone());

    let mut evaluator = TableEvaluator::new(scored(0, 1, 1, 0));
    evaluator.score(perfect.program.clone(), scored(1, 0, 1, 0));

    let mut config = SearchConfig::new(2, 2, 2);
    config.policy = DerivePolicy::OutcomeTable;
    config.termination = TerminationPolicy::EarlyExit;

    let mut stats = SearchStats::new();
    let outcome = search(
        &mut enumerator,
        &mut evaluator,
        &SlotBindingSearch,
        test_counts(),
        &config,
        &mut stats,
    )
    .expect("ok");

    assert_eq!(outcome.accepted, vec![perfect.program.clone()]);
    assert_eq!(outcome.best.expect("has best").0, perfect.program);
    assert_eq!(evaluator.tested.len(), 1);
}

#[test]
fn test_deadline_cancels_cleanly() {
    use crate::search::trivial::{SlotBindingSearch, TableEvaluator, VecEnumerator};

    // A zero wall-clock budget stops the run at the first drawn
    // candidate; cancellation is not an error and the (empty) result
    // set is intact.
    let one = test_candidate(&["p"]);

    let mut enumerator = VecEnumerator::new();
    enumerator.script(2, one.clone());

    let mut evaluator = TableEvaluator::new(scored(1, 0, 1, 0));

    let mut config = SearchConfig::new(2, 2, 2);
    config.deadline = Some(Duration::from_secs(0));

    let mut stats = SearchStats::new();
    let outcome = search(
        &mut enumerator,
        &mut evaluator,
        &SlotBindingSearch,
        test_counts(),
        &config,
        &mut stats,
    )
    .expect("ok");

    assert!(stats.cancelled);
    assert!(outcome.accepted.is_empty());
    assert!(evaluator.tested.is_empty());
}
