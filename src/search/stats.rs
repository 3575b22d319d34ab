//! Run counters and per-phase wall-clock accumulation.  Nothing here
//! affects the search; the loop controller records into this and the
//! caller reads it back out.
use std::time::{Duration, Instant};

/// The phases of processing one candidate, from pulling it out of the
/// backend to pushing constraint batches back in.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Phase {
    Generate,
    Test,
    Build,
    Ground,
    Add,
}

const NUM_PHASES: usize = 5;

impl Phase {
    fn index(self) -> usize {
        match self {
            Phase::Generate => 0,
            Phase::Test => 1,
            Phase::Build => 2,
            Phase::Ground => 3,
            Phase::Add => 4,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct SearchStats {
    /// Candidates that produced a confusion matrix.
    pub candidates_tested: usize,
    /// Candidates skipped on a per-candidate evaluation timeout.
    pub timeouts: usize,
    /// Abstract templates derived.
    pub constraints_derived: usize,
    /// Grounded clauses buffered for the backend.
    pub constraints_grounded: usize,
    /// Constraint batches pushed into the backend.
    pub flushes: usize,
    /// Accepted hypotheses recorded (after dedup).
    pub accepted: usize,
    /// Largest structural size bound reached.
    pub max_size_reached: usize,
    /// Set when the wall-clock governor cut the run short.
    pub cancelled: bool,
    durations: [Duration; NUM_PHASES],
}

impl SearchStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `body` and charges its wall-clock time to `phase`.
    pub fn time<R>(&mut self, phase: Phase, body: impl FnOnce() -> R) -> R {
        let start = Instant::now();
        let result = body();
        self.durations[phase.index()] += start.elapsed();
        result
    }

    #[must_use]
    pub fn duration(&self, phase: Phase) -> Duration {
        self.durations[phase.index()]
    }
}

#[test]
fn test_time_accumulates() {
    let mut stats = SearchStats::new();

    let value = stats.time(Phase::Test, || 42);
    assert_eq!(value, 42);
    stats.time(Phase::Test, || ());

    assert!(stats.duration(Phase::Test) >= Duration::from_secs(0));
    assert_eq!(stats.duration(Phase::Add), Duration::from_secs(0));
}
