//! A clause is a head literal (or none, for headless constraint
//! clauses) plus a set of body literals.  Storing the body as a
//! `BTreeSet` makes equality, hashing, and iteration independent of
//! the order in which literals were inserted, which is what lets the
//! content hash double as a dedup key.
use super::{Binding, Literal};
use rustc_hash::FxHasher;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Clause {
    head: Option<Literal>,
    body: BTreeSet<Literal>,
}

impl Clause {
    /// Constructs a definite clause `head :- body`.
    #[must_use]
    pub fn new<I: IntoIterator<Item = Literal>>(head: Literal, body: I) -> Self {
        Clause {
            head: Some(head),
            body: body.into_iter().collect(),
        }
    }

    /// Constructs a headless constraint clause `:- body`.
    #[must_use]
    pub fn constraint<I: IntoIterator<Item = Literal>>(body: I) -> Self {
        Clause {
            head: None,
            body: body.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn head(&self) -> Option<&Literal> {
        self.head.as_ref()
    }

    #[must_use]
    pub fn body(&self) -> &BTreeSet<Literal> {
        &self.body
    }

    /// Total literal count, head included.  Programs sum this over
    /// their clauses to compute the structural size bound.
    #[must_use]
    pub fn num_literals(&self) -> usize {
        self.body.len() + if self.head.is_some() { 1 } else { 0 }
    }

    #[must_use]
    pub fn is_ground(&self) -> bool {
        self.head.iter().all(Literal::is_ground) && self.body.iter().all(Literal::is_ground)
    }

    /// A stable value hash over the normalized form.  Used for dedup
    /// of grounded constraint clauses and for "already examined"
    /// bookkeeping; insensitive to body insertion order by
    /// construction.
    #[must_use]
    pub fn content_hash(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.hash(&mut hasher);
        hasher.finish()
    }

    /// Returns the clause with every literal substituted under
    /// `binding`.
    #[must_use]
    pub fn substitute(&self, binding: &Binding) -> Clause {
        Clause {
            head: self.head.as_ref().map(|lit| lit.substitute(binding)),
            body: self.body.iter().map(|lit| lit.substitute(binding)).collect(),
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(head) = &self.head {
            write!(f, "{}", head)?;
            if !self.body.is_empty() {
                write!(f, " :- ")?;
            }
        } else {
            write!(f, ":- ")?;
        }

        for (index, lit) in self.body.iter().enumerate() {
            if index > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", lit)?;
        }
        write!(f, ".")
    }
}

#[cfg(test)]
fn atom(name: &str) -> Literal {
    Literal::new(name, vec![])
}

#[test]
fn test_hash_stable_under_body_reorder() {
    // The same body literals in a different insertion order must
    // yield an equal clause with an equal content hash.
    let forward = Clause::new(atom("h"), vec![atom("a"), atom("b"), atom("c")]);
    let backward = Clause::new(atom("h"), vec![atom("c"), atom("b"), atom("a")]);

    assert_eq!(forward, backward);
    assert_eq!(forward.content_hash(), backward.content_hash());
}

#[test]
fn test_hash_differs_on_content() {
    let base = Clause::new(atom("h"), vec![atom("a")]);
    let other = Clause::new(atom("h"), vec![atom("b")]);

    assert_ne!(base, other);
    assert_ne!(base.content_hash(), other.content_hash());
}

#[test]
fn test_num_literals() {
    assert_eq!(
        Clause::new(atom("h"), vec![atom("a"), atom("b")]).num_literals(),
        3
    );
    assert_eq!(Clause::constraint(vec![atom("a")]).num_literals(), 1);
}

#[test]
fn test_substitute_grounds() {
    use super::Term;

    let clause = Clause::new(
        Literal::new("p", vec![Term::variable("X")]),
        vec![Literal::new("q", vec![Term::variable("X")])],
    );
    assert!(!clause.is_ground());

    let mut binding = Binding::new();
    binding.insert("X".into(), Term::constant("a"));
    assert!(clause.substitute(&binding).is_ground());
}

#[test]
fn test_display() {
    use super::Term;

    let clause = Clause::new(
        Literal::new("p", vec![Term::variable("X")]),
        vec![
            Literal::new("q", vec![Term::variable("X")]),
            Literal::new("r", vec![Term::variable("X")]),
        ],
    );
    assert_eq!(clause.to_string(), "p(X) :- q(X),r(X).");
    assert_eq!(Clause::new(atom("h"), vec![]).to_string(), "h.");
    assert_eq!(Clause::constraint(vec![atom("a")]).to_string(), ":- a.");
}
