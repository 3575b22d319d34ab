//! Expanding abstract constraint templates into concrete,
//! backend-addable clauses.
//!
//! The binding search itself is an external facility (the backend
//! knows its own slot arithmetic); this module owns what happens
//! around it: stripping meta literals, substituting each binding, and
//! deduplicating the grounded output by clause value.
use super::Constraint;
use crate::program::{Binding, Clause, Literal};
use rustc_hash::FxHashSet;

/// The external binding-search facility: enumerates every assignment
/// of a template's variables that is consistent with the template's
/// meta literals under the current structural bounds.
pub trait BindingSearch {
    fn find_bindings(
        &self,
        template: &Constraint,
        max_clauses: usize,
        max_vars: usize,
    ) -> Vec<Binding>;
}

/// Grounds every template in `templates` under the current bounds.
///
/// Meta literals are dropped from the body before substitution: they
/// exist to steer binding search, not to appear in backend input.  A
/// binding that leaves any variable of the template unbound is
/// discarded rather than producing a partially substituted clause.
/// Equal grounded clauses collapse into one set entry, so grounding
/// is idempotent and insensitive to template order.  An empty
/// template set grounds to the empty set.
pub fn ground_constraints<S: BindingSearch>(
    templates: &[Constraint],
    max_clauses: usize,
    max_vars: usize,
    search: &S,
) -> FxHashSet<Clause> {
    let mut grounded = FxHashSet::default();

    for template in templates {
        let bindings = search.find_bindings(template, max_clauses, max_vars);

        let domain_body: Vec<&Literal> = template
            .body()
            .iter()
            .filter(|lit| !lit.is_meta())
            .collect();

        for binding in bindings {
            let clause = match template.head() {
                Some(head) => Clause::new(
                    head.substitute(&binding),
                    domain_body.iter().map(|lit| lit.substitute(&binding)),
                ),
                None => Clause::constraint(
                    domain_body.iter().map(|lit| lit.substitute(&binding)),
                ),
            };

            if !clause.is_ground() {
                continue;
            }

            grounded.insert(clause);
        }
    }

    grounded
}

#[cfg(test)]
mod stubs {
    use super::*;

    /// Returns a fixed list of bindings, template ignored.
    pub struct FixedBindings(pub Vec<Binding>);

    impl BindingSearch for FixedBindings {
        fn find_bindings(&self, _: &Constraint, _: usize, _: usize) -> Vec<Binding> {
            self.0.clone()
        }
    }
}

#[cfg(test)]
fn slot_template() -> Constraint {
    use super::ConstraintKind;
    use crate::program::Term;

    Constraint::new(
        ConstraintKind::Specialisation,
        None,
        vec![
            Literal::new(
                "included_clause",
                vec![Term::constant("c0"), Term::variable("C0")],
            ),
            Literal::meta("slot", vec![Term::variable("C0")]),
        ],
    )
}

#[cfg(test)]
fn binding_to(value: &str) -> Binding {
    use crate::program::Term;

    let mut binding = Binding::new();
    binding.insert("C0".into(), Term::constant(value));
    binding
}

#[test]
fn test_ground_strips_meta_literals() {
    use stubs::FixedBindings;

    let search = FixedBindings(vec![binding_to("0")]);
    let grounded = ground_constraints(&[slot_template()], 2, 2, &search);

    assert_eq!(grounded.len(), 1);
    let clause = grounded.iter().next().expect("one clause");
    assert!(clause.head().is_none());
    assert_eq!(clause.body().len(), 1);
    assert!(clause.body().iter().all(|lit| !lit.is_meta()));
    assert!(clause.is_ground());
}

#[test]
fn test_ground_idempotent_under_duplicate_bindings() {
    use stubs::FixedBindings;

    // The same binding offered twice grounds to a single clause.
    let search = FixedBindings(vec![binding_to("0"), binding_to("0")]);
    let grounded = ground_constraints(&[slot_template()], 2, 2, &search);
    assert_eq!(grounded.len(), 1);

    // And grounding the same template twice adds nothing new.
    let doubled = ground_constraints(&[slot_template(), slot_template()], 2, 2, &search);
    assert_eq!(doubled, grounded);
}

#[test]
fn test_ground_order_invariant() {
    use super::ConstraintKind;
    use crate::program::Term;
    use stubs::FixedBindings;

    let other = Constraint::new(
        ConstraintKind::Specialisation,
        None,
        vec![Literal::new(
            "included_clause",
            vec![Term::constant("c1"), Term::variable("C0")],
        )],
    );

    let search = FixedBindings(vec![binding_to("0"), binding_to("1")]);
    let forward = ground_constraints(&[slot_template(), other.clone()], 2, 2, &search);
    let backward = ground_constraints(&[other, slot_template()], 2, 2, &search);

    assert_eq!(forward.len(), 4);
    assert_eq!(forward, backward);
}

#[test]
fn test_partially_bound_template_yields_nothing() {
    use stubs::FixedBindings;

    // A binding that misses C0 must not produce a half-substituted
    // clause.
    let search = FixedBindings(vec![Binding::new()]);
    let grounded = ground_constraints(&[slot_template()], 2, 2, &search);
    assert!(grounded.is_empty());
}

#[test]
fn test_empty_input_grounds_to_empty_output() {
    use stubs::FixedBindings;

    let search = FixedBindings(vec![binding_to("0")]);
    assert!(ground_constraints(&[], 2, 2, &search).is_empty());
}
