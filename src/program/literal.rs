//! Literals are predicate applications over terms: the atoms from
//! which candidate clauses and constraint templates are built.
//!
//! A literal is either a *domain* literal (subject to evaluation, and
//! allowed to appear in grounded constraint output), or a *meta*
//! literal (structural bookkeeping that only exists to drive binding
//! search; the grounder strips meta literals before emitting concrete
//! clauses).
use std::collections::BTreeMap;
use std::fmt;

/// A term is either a constant symbol, or a variable to be bound
/// during grounding.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Term {
    Constant(String),
    Variable(String),
}

/// A `Binding` assigns a concrete term to each variable of a
/// constraint template.
pub type Binding = BTreeMap<String, Term>;

impl Term {
    #[must_use]
    pub fn constant(name: &str) -> Self {
        Term::Constant(name.into())
    }

    #[must_use]
    pub fn variable(name: &str) -> Self {
        Term::Variable(name.into())
    }

    #[must_use]
    pub fn is_variable(&self) -> bool {
        matches!(self, Term::Variable(_))
    }

    /// Returns the term with any variable replaced by its image in
    /// `binding`.  Variables absent from the binding are left as is;
    /// the caller decides what a leftover variable means.
    #[must_use]
    pub fn substitute(&self, binding: &Binding) -> Term {
        match self {
            Term::Constant(_) => self.clone(),
            Term::Variable(name) => match binding.get(name) {
                Some(value) => value.clone(),
                None => self.clone(),
            },
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Term::Constant(name) => write!(f, "{}", name),
            Term::Variable(name) => write!(f, "{}", name),
        }
    }
}

/// A predicate applied to an ordered list of terms.  Equality and
/// hashing go through the normalized symbolic form, i.e., all three
/// fields.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Literal {
    predicate: String,
    args: Vec<Term>,
    meta: bool,
}

impl Literal {
    /// Constructs a domain literal.
    #[must_use]
    pub fn new(predicate: &str, args: Vec<Term>) -> Self {
        Literal {
            predicate: predicate.into(),
            args,
            meta: false,
        }
    }

    /// Constructs a meta literal: grounding bookkeeping only, never
    /// part of a grounded clause.
    #[must_use]
    pub fn meta(predicate: &str, args: Vec<Term>) -> Self {
        Literal {
            predicate: predicate.into(),
            args,
            meta: true,
        }
    }

    #[must_use]
    pub fn predicate(&self) -> &str {
        &self.predicate
    }

    #[must_use]
    pub fn args(&self) -> &[Term] {
        &self.args
    }

    #[must_use]
    pub fn arity(&self) -> usize {
        self.args.len()
    }

    #[must_use]
    pub fn is_meta(&self) -> bool {
        self.meta
    }

    /// A literal is ground when none of its arguments is a variable.
    #[must_use]
    pub fn is_ground(&self) -> bool {
        self.args.iter().all(|arg| !arg.is_variable())
    }

    /// Returns the literal with each argument substituted under
    /// `binding`.
    #[must_use]
    pub fn substitute(&self, binding: &Binding) -> Literal {
        Literal {
            predicate: self.predicate.clone(),
            args: self.args.iter().map(|arg| arg.substitute(binding)).collect(),
            meta: self.meta,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.args.is_empty() {
            return write!(f, "{}", self.predicate);
        }

        write!(f, "{}(", self.predicate)?;
        for (index, arg) in self.args.iter().enumerate() {
            if index > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", arg)?;
        }
        write!(f, ")")
    }
}

#[test]
fn test_substitute_full() {
    // Binding both variables yields a ground literal.
    let lit = Literal::new(
        "edge",
        vec![Term::variable("A"), Term::variable("B")],
    );
    assert!(!lit.is_ground());

    let mut binding = Binding::new();
    binding.insert("A".into(), Term::constant("a"));
    binding.insert("B".into(), Term::constant("b"));

    let ground = lit.substitute(&binding);
    assert!(ground.is_ground());
    assert_eq!(ground, Literal::new("edge", vec![Term::constant("a"), Term::constant("b")]));
}

#[test]
fn test_substitute_partial() {
    // A variable missing from the binding survives substitution, and
    // the result is not ground.
    let lit = Literal::new(
        "edge",
        vec![Term::variable("A"), Term::variable("B")],
    );

    let mut binding = Binding::new();
    binding.insert("A".into(), Term::constant("a"));

    let partial = lit.substitute(&binding);
    assert!(!partial.is_ground());
    assert_eq!(partial.args()[1], Term::variable("B"));
}

#[test]
fn test_meta_flag_distinguishes() {
    // Meta and domain literals with identical symbolic form must not
    // compare equal.
    let domain = Literal::new("slot", vec![Term::variable("C0")]);
    let meta = Literal::meta("slot", vec![Term::variable("C0")]);

    assert!(meta.is_meta());
    assert!(!domain.is_meta());
    assert_ne!(domain, meta);
}

#[test]
fn test_display() {
    let lit = Literal::new("edge", vec![Term::constant("a"), Term::variable("B")]);
    assert_eq!(lit.to_string(), "edge(a,B)");
    assert_eq!(Literal::new("halt", vec![]).to_string(), "halt");
}
