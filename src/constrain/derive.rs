//! Turning a rejected candidate into abstract "no-good" constraint
//! templates.
//!
//! A template is a headless clause over *slot variables* `C0..Cn-1`,
//! one per clause of the candidate in canonical order.  Domain
//! literals (`included_clause`, `body_size`, `clause_count`,
//! `program_size`) survive grounding and are what the enumeration
//! backend consumes; meta literals (`slot`, `first_slot`, `precedes`)
//! only steer binding search and are stripped by the grounder.
//!
//! The fielded policy is minimal: one specialisation constraint when
//! a candidate covers nothing at all.  The other constraint kinds and
//! the outcome-pair dispatch table are kept as a selectable policy
//! variant; they are not exercised by default.
use crate::outcome::{ConfusionMatrix, Outcome, OutcomePair};
use crate::program::{BeforeMap, Candidate, Clause, Literal, Program, Term};
use rustc_hash::FxHashSet;
use std::collections::{BTreeMap, BTreeSet};

/// Domain predicate: the program includes the clause identified by
/// the first argument, at the slot bound to the second.
pub const INCLUDED_CLAUSE: &str = "included_clause";
/// Domain predicate: the identified clause has exactly this many body
/// literals.
pub const BODY_SIZE: &str = "body_size";
/// Domain predicate: the program has exactly this many clauses.
pub const CLAUSE_COUNT: &str = "clause_count";
/// Domain predicate: the program has exactly this many literals.
pub const PROGRAM_SIZE: &str = "program_size";
/// Meta predicate: marks a slot variable for binding search.
pub const SLOT: &str = "slot";
/// Meta predicate: the argument is the grounding anchor and binds to
/// the first slot.
pub const FIRST_SLOT: &str = "first_slot";
/// Meta predicate: the first slot must be bound below the second.
pub const PRECEDES: &str = "precedes";

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ConstraintKind {
    Specialisation,
    Generalisation,
    Redundancy,
    Banish,
}

/// An abstract constraint template: a kind, an optional head
/// template, and a body template mixing domain and meta literals.
/// Grounding one `Binding` into the template produces a concrete
/// backend-consumable clause.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Constraint {
    kind: ConstraintKind,
    head: Option<Literal>,
    body: BTreeSet<Literal>,
}

impl Constraint {
    #[must_use]
    pub fn new<I: IntoIterator<Item = Literal>>(
        kind: ConstraintKind,
        head: Option<Literal>,
        body: I,
    ) -> Self {
        Constraint {
            kind,
            head,
            body: body.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ConstraintKind {
        self.kind
    }

    #[must_use]
    pub fn head(&self) -> Option<&Literal> {
        self.head.as_ref()
    }

    #[must_use]
    pub fn body(&self) -> &BTreeSet<Literal> {
        &self.body
    }
}

/// Which constraint kinds to derive from a classified candidate.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DerivePolicy {
    /// The fielded policy: one specialisation constraint iff the
    /// candidate covers nothing (TP + FP = 0), nothing otherwise.
    ZeroCoverage,
    /// Dispatch on the outcome pair through the full kind table.
    /// Preserved as a selectable variant; not the default.
    OutcomeTable,
}

/// The outcome-pair dispatch table of the table-driven policy.  The
/// negative outcome must be collapsed (`All` to `Some`) before
/// lookup; `decide`'s classifier already never emits a negative
/// `All`.
#[must_use]
pub fn outcome_constraint_kinds(pair: OutcomePair) -> &'static [ConstraintKind] {
    use ConstraintKind::{Banish, Generalisation, Redundancy, Specialisation};

    let collapsed = match pair {
        (positive, Outcome::All) => (positive, Outcome::Some),
        other => other,
    };

    match collapsed {
        (Outcome::All, Outcome::None) => &[Banish],
        (Outcome::All, Outcome::Some) => &[Generalisation],
        (Outcome::Some, Outcome::None) => &[Specialisation],
        (Outcome::Some, Outcome::Some) => &[Specialisation, Generalisation],
        (Outcome::None, Outcome::None) => &[Specialisation, Redundancy],
        (Outcome::None, Outcome::Some) => &[Specialisation, Redundancy, Generalisation],
        (_, Outcome::All) => unreachable!("negative outcome collapsed above"),
    }
}

/// The constant term identifying `clause` in grounded constraints:
/// backends match candidates against constraints through these ids.
#[must_use]
pub fn clause_id(clause: &Clause) -> Term {
    Term::Constant(format!("c{:016x}", clause.content_hash()))
}

fn slot_var(index: usize) -> Term {
    Term::Variable(format!("C{}", index))
}

/// Maps each clause of `program` to its slot variable, following the
/// program's canonical clause order.
fn slot_map(program: &Program) -> BTreeMap<Clause, Term> {
    program
        .clauses()
        .enumerate()
        .map(|(index, clause)| (clause.clone(), slot_var(index)))
        .collect()
}

/// The body shared by every template kind: one `included_clause`
/// literal per clause, slot markers, the anchor on `min_clause`, and
/// the ordering pairs from the before relation.
fn structural_body(
    program: &Program,
    before: &BeforeMap,
    min_clause: &Clause,
) -> BTreeSet<Literal> {
    let slots = slot_map(program);
    let mut body = BTreeSet::new();

    for (clause, slot) in &slots {
        body.insert(Literal::new(
            INCLUDED_CLAUSE,
            vec![clause_id(clause), slot.clone()],
        ));
        body.insert(Literal::meta(SLOT, vec![slot.clone()]));
    }

    if let Some(anchor) = slots.get(min_clause) {
        body.insert(Literal::meta(FIRST_SLOT, vec![anchor.clone()]));
    }

    for (later, priors) in before {
        for prior in priors {
            match (slots.get(prior), slots.get(later)) {
                (Some(first), Some(second)) if first != second => {
                    body.insert(Literal::meta(
                        PRECEDES,
                        vec![first.clone(), second.clone()],
                    ));
                }
                _ => (),
            }
        }
    }

    body
}

/// Derives constraint templates from classified candidates.  The only
/// state is the "already examined clause" set that keeps redundancy
/// templates from being derived twice for the same clause body.
pub struct Deriver {
    seen_clauses: FxHashSet<u64>,
}

impl Deriver {
    #[must_use]
    pub fn new() -> Self {
        Deriver {
            seen_clauses: FxHashSet::default(),
        }
    }

    /// Applies `policy` to one classified candidate.  An empty result
    /// means the candidate is an accepted hypothesis.
    pub fn derive(
        &mut self,
        policy: DerivePolicy,
        candidate: &Candidate,
        outcome: OutcomePair,
        matrix: &ConfusionMatrix,
    ) -> Vec<Constraint> {
        let Candidate {
            program,
            before,
            min_clause,
        } = candidate;

        match policy {
            DerivePolicy::ZeroCoverage => {
                if matrix.covers_nothing() {
                    vec![self.specialisation_constraint(program, before, min_clause)]
                } else {
                    Vec::new()
                }
            }
            DerivePolicy::OutcomeTable => {
                let mut templates = Vec::new();
                for kind in outcome_constraint_kinds(outcome) {
                    match kind {
                        ConstraintKind::Specialisation => templates
                            .push(self.specialisation_constraint(program, before, min_clause)),
                        ConstraintKind::Generalisation => templates
                            .push(self.generalisation_constraint(program, before, min_clause)),
                        ConstraintKind::Redundancy => templates
                            .extend(self.redundancy_constraints(program, before, min_clause)),
                        ConstraintKind::Banish => {
                            templates.push(self.banish_constraint(program, before, min_clause))
                        }
                    }
                }
                templates
            }
        }
    }

    /// Forbids the candidate and all its structural extensions: any
    /// program that includes all of the candidate's clauses, in
    /// canonical slot order.  Sound whenever the candidate covers
    /// nothing, by the evaluator's monotonicity contract.
    pub fn specialisation_constraint(
        &mut self,
        program: &Program,
        before: &BeforeMap,
        min_clause: &Clause,
    ) -> Constraint {
        Constraint::new(
            ConstraintKind::Specialisation,
            None,
            structural_body(program, before, min_clause),
        )
    }

    /// Forbids generalisations: programs made of exactly these
    /// clauses with these body sizes.  Dormant under the default
    /// policy.
    pub fn generalisation_constraint(
        &mut self,
        program: &Program,
        before: &BeforeMap,
        min_clause: &Clause,
    ) -> Constraint {
        let mut body = structural_body(program, before, min_clause);
        for clause in program.clauses() {
            body.insert(Literal::new(
                BODY_SIZE,
                vec![clause_id(clause), Term::Constant(clause.body().len().to_string())],
            ));
        }
        body.insert(Literal::new(
            CLAUSE_COUNT,
            vec![Term::Constant(program.num_clauses().to_string())],
        ));

        Constraint::new(ConstraintKind::Generalisation, None, body)
    }

    /// Forbids the exact candidate, literal for literal.  Dormant
    /// under the default policy.
    pub fn banish_constraint(
        &mut self,
        program: &Program,
        before: &BeforeMap,
        min_clause: &Clause,
    ) -> Constraint {
        let generalisation = self.generalisation_constraint(program, before, min_clause);
        let mut body = generalisation.body().clone();
        body.insert(Literal::new(
            PROGRAM_SIZE,
            vec![Term::Constant(program.size().to_string())],
        ));

        Constraint::new(ConstraintKind::Banish, None, body)
    }

    /// Forbids programs containing any clause of `program` we have
    /// not already examined; the content hash of each clause keeps a
    /// redundancy template from being derived twice for the same
    /// body.  Dormant under the default policy.
    pub fn redundancy_constraints(
        &mut self,
        program: &Program,
        _before: &BeforeMap,
        _min_clause: &Clause,
    ) -> Vec<Constraint> {
        let mut templates = Vec::new();

        for clause in program.clauses() {
            if !self.seen_clauses.insert(clause.content_hash()) {
                continue;
            }

            let slot = slot_var(0);
            let body = vec![
                Literal::new(INCLUDED_CLAUSE, vec![clause_id(clause), slot.clone()]),
                Literal::meta(SLOT, vec![slot]),
            ];
            templates.push(Constraint::new(ConstraintKind::Redundancy, None, body));
        }

        templates
    }
}

impl Default for Deriver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
fn test_candidate(names: &[(&str, &[&str])]) -> Candidate {
    let clauses = names.iter().map(|(head, body)| {
        Clause::new(
            Literal::new(head, vec![]),
            body.iter().map(|name| Literal::new(name, vec![])),
        )
    });
    Candidate::new(Program::new(clauses), BeforeMap::new()).expect("ok")
}

#[test]
fn test_zero_coverage_emits_one_specialisation() {
    // A candidate with TP + FP = 0 yields exactly one specialisation
    // template under the default policy.
    let candidate = test_candidate(&[("h", &["a", "b"])]);
    let matrix = ConfusionMatrix::new(0, 1, 1, 0);

    let templates = Deriver::new().derive(
        DerivePolicy::ZeroCoverage,
        &candidate,
        matrix.outcome(),
        &matrix,
    );
    assert_eq!(templates.len(), 1);
    assert_eq!(templates[0].kind(), ConstraintKind::Specialisation);
    assert!(templates[0].head().is_none());

    // One included_clause domain literal, plus slot and anchor metas.
    let domain: Vec<_> = templates[0]
        .body()
        .iter()
        .filter(|lit| !lit.is_meta())
        .collect();
    assert_eq!(domain.len(), 1);
    assert_eq!(domain[0].predicate(), INCLUDED_CLAUSE);
}

#[test]
fn test_covering_candidate_is_accepted() {
    // Any coverage at all means no constraint: the candidate is a
    // valid hypothesis.
    let candidate = test_candidate(&[("h", &["a"])]);
    let matrix = ConfusionMatrix::new(1, 0, 0, 1);

    let templates = Deriver::new().derive(
        DerivePolicy::ZeroCoverage,
        &candidate,
        matrix.outcome(),
        &matrix,
    );
    assert!(templates.is_empty());
}

#[test]
fn test_outcome_table_dispatch() {
    use ConstraintKind::{Banish, Generalisation, Redundancy, Specialisation};

    assert_eq!(
        outcome_constraint_kinds((Outcome::All, Outcome::None)),
        &[Banish]
    );
    assert_eq!(
        outcome_constraint_kinds((Outcome::None, Outcome::Some)),
        &[Specialisation, Redundancy, Generalisation]
    );
    // A notional negative All collapses to Some before lookup.
    assert_eq!(
        outcome_constraint_kinds((Outcome::All, Outcome::All)),
        &[Generalisation]
    );
}

#[test]
fn test_outcome_table_policy_emits_all_kinds() {
    // Totally incomplete and inconsistent: specialisation, redundancy
    // (one per clause), and generalisation.
    let candidate = test_candidate(&[("h", &["a"])]);
    let matrix = ConfusionMatrix::new(0, 1, 0, 1);

    let templates = Deriver::new().derive(
        DerivePolicy::OutcomeTable,
        &candidate,
        matrix.outcome(),
        &matrix,
    );
    let kinds: Vec<_> = templates.iter().map(Constraint::kind).collect();
    assert_eq!(
        kinds,
        vec![
            ConstraintKind::Specialisation,
            ConstraintKind::Redundancy,
            ConstraintKind::Generalisation
        ]
    );
}

#[test]
fn test_redundancy_skips_seen_clauses() {
    // The second derivation for the same clause body yields nothing.
    let candidate = test_candidate(&[("h", &["a"])]);
    let mut deriver = Deriver::new();

    let first = deriver.redundancy_constraints(
        &candidate.program,
        &candidate.before,
        &candidate.min_clause,
    );
    assert_eq!(first.len(), 1);

    let second = deriver.redundancy_constraints(
        &candidate.program,
        &candidate.before,
        &candidate.min_clause,
    );
    assert!(second.is_empty());
}

#[test]
fn test_structural_body_orders_slots() {
    // A before pair between two clauses becomes a precedes meta
    // literal over their slot variables, and the minimal clause is
    // anchored to the first slot.
    let first = Clause::new(Literal::new("a", vec![]), vec![Literal::new("x", vec![])]);
    let second = Clause::new(Literal::new("b", vec![]), vec![Literal::new("y", vec![])]);

    let mut before = BeforeMap::new();
    before.insert(
        second.clone(),
        [first.clone()].iter().cloned().collect(),
    );

    let program = Program::new(vec![first.clone(), second.clone()]);
    let body = structural_body(&program, &before, &first);

    assert!(body.contains(&Literal::meta(
        PRECEDES,
        vec![slot_var(0), slot_var(1)]
    )));
    assert!(body.contains(&Literal::meta(FIRST_SLOT, vec![slot_var(0)])));
}

#[test]
fn test_banish_adds_exact_size_guard() {
    let candidate = test_candidate(&[("h", &["a", "b"])]);
    let mut deriver = Deriver::new();

    let banish = deriver.banish_constraint(
        &candidate.program,
        &candidate.before,
        &candidate.min_clause,
    );
    assert!(banish.body().contains(&Literal::new(
        PROGRAM_SIZE,
        vec![Term::Constant("3".into())]
    )));
    assert!(banish.body().contains(&Literal::new(
        CLAUSE_COUNT,
        vec![Term::Constant("1".into())]
    )));
}
