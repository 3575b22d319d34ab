//! The enumeration backend's contract.  The backend owns the only
//! durable shared state of a run: a persistent knowledge base of
//! structural constraints, against which it hands out candidate
//! programs one session at a time.
use crate::program::{Candidate, Clause};
use rustc_hash::FxHashSet;

/// The structural bounds a session enumerates under: clause and
/// per-clause variable limits, and the total literal count for this
/// pass of the outer loop.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SearchBounds {
    pub max_clauses: usize,
    pub max_vars: usize,
    pub size: usize,
}

/// A candidate-enumeration backend.  The implementing value is the
/// owned session handle: `configure` and `restart_session` delimit
/// session lifetimes, and all calls are synchronous.
///
/// Contract:
///
/// - `next_candidate` draws from the session opened by the last
///   `configure` or `restart_session`; `None` signals that the
///   sequence for the current bounds and constraint set is exhausted
///   (normal control flow, not an error).
/// - `add_constraints` must only be called between sessions, i.e.
///   after `restart_session` (or `configure`) and before the next
///   `next_candidate`.  Constraints added to the knowledge base are
///   visible to subsequent sessions only; an open session never sees
///   them retroactively.
/// - The candidate stream must be sequential and order-stable for a
///   fixed knowledge base, however parallel the backend is inside.
pub trait Enumerator {
    /// Bounds the next sessions and opens a fresh session; any
    /// candidates the previous session still had to offer are
    /// abandoned.
    fn configure(&mut self, bounds: &SearchBounds);

    /// Draws the next candidate of the current session.
    fn next_candidate(&mut self) -> Option<Candidate>;

    /// Adds grounded constraint clauses to the persistent knowledge
    /// base.  Between sessions only.
    fn add_constraints(&mut self, constraints: &FxHashSet<Clause>);

    /// Terminates the current session; the next `next_candidate`
    /// opens a fresh one under the same bounds and the current
    /// knowledge base.
    fn restart_session(&mut self);
}
