//! A program is an order-irrelevant set of clauses; a candidate is a
//! program plus the ordering metadata the enumeration backend
//! attaches at generation time.
//!
//! Iteration over a program's clauses follows the `BTreeSet`'s
//! canonical order, so printing and hashing are reproducible no
//! matter how the backend assembled the clause set.
use super::Clause;
use rustc_hash::FxHasher;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};

/// For each clause, the set of clauses the enumeration backend
/// already considered "prior" to it.  Constraint templates use these
/// pairs to canonicalize slot ordering, so a constraint forbids the
/// candidate and its structural extensions rather than arbitrary
/// permutations of unrelated programs.
pub type BeforeMap = BTreeMap<Clause, BTreeSet<Clause>>;

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Program {
    clauses: BTreeSet<Clause>,
}

impl Program {
    #[must_use]
    pub fn new<I: IntoIterator<Item = Clause>>(clauses: I) -> Self {
        Program {
            clauses: clauses.into_iter().collect(),
        }
    }

    pub fn clauses(&self) -> impl Iterator<Item = &Clause> {
        self.clauses.iter()
    }

    #[must_use]
    pub fn num_clauses(&self) -> usize {
        self.clauses.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    #[must_use]
    pub fn contains(&self, clause: &Clause) -> bool {
        self.clauses.contains(clause)
    }

    /// The program's structural size: total literal count across all
    /// clauses.  This is the bound the outer search loop increases
    /// monotonically.
    #[must_use]
    pub fn size(&self) -> usize {
        self.clauses.iter().map(Clause::num_literals).sum()
    }

    /// Stable value hash; equal for programs with the same clause
    /// set, whatever the insertion order.
    #[must_use]
    pub fn content_hash(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (index, clause) in self.clauses.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", clause)?;
        }
        Ok(())
    }
}

/// A `Candidate` bundles a program proposed by the enumeration
/// backend with its generation-time ordering metadata: the before
/// relation and the lexicographically minimal clause, which serves as
/// the grounding anchor for constraint templates.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Candidate {
    pub program: Program,
    pub before: BeforeMap,
    pub min_clause: Clause,
}

impl Candidate {
    /// Bundles `program` with its `before` metadata; the minimal
    /// clause is derived from the program's canonical order.
    ///
    /// # Errors
    ///
    /// Returns `Err` for an empty program: there is nothing to anchor
    /// a constraint template on.
    pub fn new(program: Program, before: BeforeMap) -> Result<Self, &'static str> {
        let min_clause = match program.clauses().next() {
            Some(clause) => clause.clone(),
            None => return Err("candidate program has no clauses."),
        };

        Ok(Candidate {
            program,
            before,
            min_clause,
        })
    }
}

#[cfg(test)]
fn clause(head: &str, body: &[&str]) -> Clause {
    use super::Literal;

    Clause::new(
        Literal::new(head, vec![]),
        body.iter().map(|name| Literal::new(name, vec![])),
    )
}

#[test]
fn test_size_counts_all_literals() {
    let program = Program::new(vec![
        clause("h", &["a", "b"]),
        clause("g", &["c"]),
    ]);
    assert_eq!(program.num_clauses(), 2);
    assert_eq!(program.size(), 5);
}

#[test]
fn test_hash_stable_under_clause_reorder() {
    let forward = Program::new(vec![clause("h", &["a"]), clause("g", &["b"])]);
    let backward = Program::new(vec![clause("g", &["b"]), clause("h", &["a"])]);

    assert_eq!(forward, backward);
    assert_eq!(forward.content_hash(), backward.content_hash());
}

#[test]
fn test_candidate_min_clause() {
    // The minimal clause is the first in canonical order, not the
    // first handed to the constructor.
    let first = clause("a", &["x"]);
    let second = clause("b", &["y"]);

    let candidate = Candidate::new(
        Program::new(vec![second.clone(), first.clone()]),
        BeforeMap::new(),
    )
    .expect("ok");
    assert_eq!(candidate.min_clause, first);
}

#[test]
fn test_candidate_rejects_empty_program() {
    assert!(Candidate::new(Program::new(vec![]), BeforeMap::new()).is_err());
}

#[test]
fn test_display_one_clause_per_line() {
    let program = Program::new(vec![clause("a", &["x"]), clause("b", &[])]);
    assert_eq!(program.to_string(), "a :- x.\nb.");
}
