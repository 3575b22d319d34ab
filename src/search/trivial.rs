//! Naive, obviously-correct stand-ins for the external backends,
//! used by tests: a scripted enumerator that honours grounded
//! constraints, an exhaustive slot binding search, and a table-driven
//! evaluator with scoped fact assertion.
//!
//! None of these try to be fast or clever; their job is to implement
//! the contracts in `enumerate`, `evaluate`, and
//! `constrain::BindingSearch` in the most transparent way available.
use super::enumerate::{Enumerator, SearchBounds};
use super::evaluate::{Evaluation, Evaluator, EvaluatorFault};
use crate::constrain::{
    clause_id, BindingSearch, Constraint, CLAUSE_COUNT, FIRST_SLOT, INCLUDED_CLAUSE, PRECEDES,
    PROGRAM_SIZE, SLOT,
};
use crate::program::{Binding, Candidate, Clause, Program, Term};
use rustc_hash::FxHashSet;
use std::collections::{BTreeMap, BTreeSet};

/// Does a grounded constraint clause forbid `program`?
///
/// A constraint matches when every clause id in its `included_clause`
/// literals also identifies a clause of the program, and its exact
/// `clause_count` / `program_size` guards (if any) hold.  `body_size`
/// guards are implied by the ids and ignored, as is any literal with
/// an unexpected arity.
fn forbids(constraint: &Clause, program: &Program) -> bool {
    let program_ids: BTreeSet<Term> = program.clauses().map(clause_id).collect();
    let mut saw_included = false;

    for literal in constraint.body() {
        match (literal.predicate(), literal.args()) {
            (INCLUDED_CLAUSE, [id, _slot]) => {
                saw_included = true;
                if !program_ids.contains(id) {
                    return false;
                }
            }
            (CLAUSE_COUNT, [count]) => {
                if *count != Term::Constant(program.num_clauses().to_string()) {
                    return false;
                }
            }
            (PROGRAM_SIZE, [size]) => {
                if *size != Term::Constant(program.size().to_string()) {
                    return false;
                }
            }
            _ => (),
        }
    }

    saw_included
}

/// A scripted enumeration backend: a fixed candidate list per size,
/// replayed from the top on every session, minus whatever the
/// knowledge base forbids by now.
pub struct VecEnumerator {
    scripted: BTreeMap<usize, Vec<Candidate>>,
    knowledge: FxHashSet<Clause>,
    bounds: Option<SearchBounds>,
    cursor: usize,
}

impl VecEnumerator {
    #[must_use]
    pub fn new() -> Self {
        VecEnumerator {
            scripted: BTreeMap::new(),
            knowledge: FxHashSet::default(),
            bounds: None,
            cursor: 0,
        }
    }

    /// Scripts `candidate` to be offered (when not forbidden) in
    /// sessions at structural size `size`.
    pub fn script(&mut self, size: usize, candidate: Candidate) {
        self.scripted.entry(size).or_insert_with(Vec::new).push(candidate);
    }

    #[must_use]
    pub fn knowledge_len(&self) -> usize {
        self.knowledge.len()
    }
}

impl Default for VecEnumerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Enumerator for VecEnumerator {
    fn configure(&mut self, bounds: &SearchBounds) {
        self.bounds = Some(*bounds);
        self.cursor = 0;
    }

    fn next_candidate(&mut self) -> Option<Candidate> {
        let size = self.bounds.as_ref()?.size;
        let scripted = self.scripted.get(&size)?;

        while let Some(candidate) = scripted.get(self.cursor) {
            self.cursor += 1;
            if self
                .knowledge
                .iter()
                .any(|constraint| forbids(constraint, &candidate.program))
            {
                continue;
            }
            return Some(candidate.clone());
        }

        None
    }

    fn add_constraints(&mut self, constraints: &FxHashSet<Clause>) {
        self.knowledge.extend(constraints.iter().cloned());
    }

    fn restart_session(&mut self) {
        self.cursor = 0;
    }
}

/// Exhaustive binding search over slot variables: assigns each
/// `slot`-marked variable a distinct clause index below
/// `max_clauses`, pinning the `first_slot` anchor to index zero and
/// respecting every `precedes` pair.
pub struct SlotBindingSearch;

impl BindingSearch for SlotBindingSearch {
    fn find_bindings(
        &self,
        template: &Constraint,
        max_clauses: usize,
        _max_vars: usize,
    ) -> Vec<Binding> {
        let mut slots = Vec::new();
        let mut first = None;
        let mut precedes = Vec::new();

        for literal in template.body() {
            if !literal.is_meta() {
                continue;
            }
            match (literal.predicate(), literal.args()) {
                (SLOT, [Term::Variable(name)]) => slots.push(name.clone()),
                (FIRST_SLOT, [Term::Variable(name)]) => first = Some(name.clone()),
                (PRECEDES, [Term::Variable(a), Term::Variable(b)]) => {
                    precedes.push((a.clone(), b.clone()))
                }
                _ => (),
            }
        }
        slots.sort();
        slots.dedup();

        let mut found = Vec::new();
        let mut assignment = BTreeMap::new();
        extend_assignment(
            &slots,
            first.as_deref(),
            &precedes,
            max_clauses,
            &mut assignment,
            &mut found,
        );
        found
    }
}

fn extend_assignment(
    remaining: &[String],
    first: Option<&str>,
    precedes: &[(String, String)],
    max_clauses: usize,
    assignment: &mut BTreeMap<String, usize>,
    found: &mut Vec<Binding>,
) {
    let (var, rest) = match remaining.split_first() {
        Some(split) => split,
        None => {
            if precedes.iter().all(|(a, b)| assignment[a] < assignment[b]) {
                found.push(
                    assignment
                        .iter()
                        .map(|(name, index)| {
                            (name.clone(), Term::Constant(index.to_string()))
                        })
                        .collect(),
                );
            }
            return;
        }
    };

    for index in 0..max_clauses {
        if first == Some(var.as_str()) && index != 0 {
            continue;
        }
        if assignment.values().any(|taken| *taken == index) {
            continue;
        }

        assignment.insert(var.clone(), index);
        extend_assignment(rest, first, precedes, max_clauses, assignment, found);
        assignment.remove(var);
    }
}

/// Withdraws temporarily asserted clauses on every exit path,
/// including evaluator faults.
struct AssertedClauses<'a> {
    facts: &'a mut BTreeSet<Clause>,
    added: Vec<Clause>,
}

impl<'a> AssertedClauses<'a> {
    fn assert(facts: &'a mut BTreeSet<Clause>, program: &Program) -> Self {
        let mut added = Vec::new();
        for clause in program.clauses() {
            if facts.insert(clause.clone()) {
                added.push(clause.clone());
            }
        }
        AssertedClauses { facts, added }
    }
}

impl Drop for AssertedClauses<'_> {
    fn drop(&mut self) {
        for clause in &self.added {
            self.facts.remove(clause);
        }
    }
}

/// A table-driven scoring oracle: scripted rows per program, a
/// fallback evaluation for everything else, and a record of every
/// program it was asked about.  The candidate's clauses are asserted
/// into the fact base for the duration of each call and retracted on
/// the way out, fault or not.
pub struct TableEvaluator {
    rows: Vec<(Program, Result<Evaluation, String>)>,
    fallback: Evaluation,
    facts: BTreeSet<Clause>,
    pub tested: Vec<Program>,
}

impl TableEvaluator {
    #[must_use]
    pub fn new(fallback: Evaluation) -> Self {
        TableEvaluator {
            rows: Vec::new(),
            fallback,
            facts: BTreeSet::new(),
            tested: Vec::new(),
        }
    }

    pub fn score(&mut self, program: Program, evaluation: Evaluation) {
        self.rows.push((program, Ok(evaluation)));
    }

    pub fn fault(&mut self, program: Program, message: &str) {
        self.rows.push((program, Err(message.into())));
    }

    /// Preloads a background fact that must survive retraction.
    pub fn assert_background(&mut self, clause: Clause) {
        self.facts.insert(clause);
    }

    #[must_use]
    pub fn fact_count(&self) -> usize {
        self.facts.len()
    }
}

impl Evaluator for TableEvaluator {
    fn test(&mut self, program: &Program) -> Result<Evaluation, EvaluatorFault> {
        self.tested.push(program.clone());

        let _asserted = AssertedClauses::assert(&mut self.facts, program);
        match self.rows.iter().find(|(key, _)| key == program) {
            Some((_, Ok(evaluation))) => Ok(*evaluation),
            Some((_, Err(message))) => Err(EvaluatorFault(message.clone())),
            None => Ok(self.fallback),
        }
    }
}

#[cfg(test)]
fn named_candidate(heads: &[&str]) -> Candidate {
    use crate::program::{BeforeMap, Literal};

    let clauses = heads.iter().map(|head| {
        Clause::new(
            Literal::new(head, vec![]),
            vec![Literal::new("b", vec![])],
        )
    });
    Candidate::new(Program::new(clauses), BeforeMap::new()).expect("ok")
}

#[cfg(test)]
fn specialisation_for(program: &Program) -> Clause {
    // The grounded form of a specialisation constraint: one
    // included_clause literal per clause, slots bound.
    use crate::program::Literal;

    Clause::constraint(program.clauses().enumerate().map(|(index, clause)| {
        Literal::new(
            INCLUDED_CLAUSE,
            vec![clause_id(clause), Term::Constant(index.to_string())],
        )
    }))
}

#[test]
fn test_forbids_superset_only() {
    let small = named_candidate(&["p"]).program;
    let large = named_candidate(&["p", "q"]).program;
    let other = named_candidate(&["r"]).program;

    let constraint = specialisation_for(&small);
    assert!(forbids(&constraint, &small));
    assert!(forbids(&constraint, &large));
    assert!(!forbids(&constraint, &other));
}

#[test]
fn test_size_guards_narrow_a_match() {
    use crate::program::Literal;

    let small = named_candidate(&["p"]).program;
    let large = named_candidate(&["p", "q"]).program;

    // Banish-style constraint: ids plus an exact program size.
    let mut body: Vec<Literal> = specialisation_for(&small).body().iter().cloned().collect();
    body.push(Literal::new(
        PROGRAM_SIZE,
        vec![Term::Constant(small.size().to_string())],
    ));
    let banish = Clause::constraint(body);

    assert!(forbids(&banish, &small));
    assert!(!forbids(&banish, &large));
}

#[test]
fn test_wrong_arity_guards_do_not_match() {
    use crate::program::Literal;

    // Constraint clauses arrive through the public add_constraints
    // surface; a literal with a missing or extra argument must be
    // ignored as a guard rather than index out of bounds.
    let candidate = named_candidate(&["p"]);
    let malformed = Clause::constraint(vec![
        Literal::new(INCLUDED_CLAUSE, vec![]),
        Literal::new(CLAUSE_COUNT, vec![]),
        Literal::new(
            PROGRAM_SIZE,
            vec![Term::constant("2"), Term::constant("2")],
        ),
    ]);
    assert!(!forbids(&malformed, &candidate.program));

    let mut enumerator = VecEnumerator::new();
    enumerator.script(2, candidate.clone());
    enumerator.configure(&SearchBounds {
        max_clauses: 2,
        max_vars: 2,
        size: 2,
    });

    let mut constraints = FxHashSet::default();
    constraints.insert(malformed);
    enumerator.add_constraints(&constraints);

    // The malformed clause never forbids anything.
    assert_eq!(enumerator.next_candidate(), Some(candidate));
}

#[test]
fn test_vec_enumerator_sessions() {
    let first = named_candidate(&["p"]);
    let second = named_candidate(&["q"]);

    let mut enumerator = VecEnumerator::new();
    enumerator.script(2, first.clone());
    enumerator.script(2, second.clone());

    let bounds = SearchBounds {
        max_clauses: 2,
        max_vars: 2,
        size: 2,
    };
    enumerator.configure(&bounds);
    assert_eq!(enumerator.next_candidate(), Some(first.clone()));
    assert_eq!(enumerator.next_candidate(), Some(second.clone()));
    assert_eq!(enumerator.next_candidate(), None);

    // A restart replays the whole size from the top.
    enumerator.restart_session();
    assert_eq!(enumerator.next_candidate(), Some(first.clone()));
}

#[test]
fn test_vec_enumerator_honours_constraints() {
    let first = named_candidate(&["p"]);
    let second = named_candidate(&["q"]);

    let mut enumerator = VecEnumerator::new();
    enumerator.script(2, first.clone());
    enumerator.script(2, second.clone());
    enumerator.configure(&SearchBounds {
        max_clauses: 2,
        max_vars: 2,
        size: 2,
    });

    let mut constraints = FxHashSet::default();
    constraints.insert(specialisation_for(&first.program));
    enumerator.add_constraints(&constraints);

    // `first` and its extensions are gone; `second` survives.
    assert_eq!(enumerator.next_candidate(), Some(second));
    assert_eq!(enumerator.next_candidate(), None);
}

#[test]
fn test_slot_binding_search_orders_and_anchors() {
    use crate::constrain::ConstraintKind;
    use crate::program::Literal;

    // Two slots, anchored and ordered: only C0 = 0, C1 = 1 remains.
    let template = Constraint::new(
        ConstraintKind::Specialisation,
        None,
        vec![
            Literal::meta(SLOT, vec![Term::variable("C0")]),
            Literal::meta(SLOT, vec![Term::variable("C1")]),
            Literal::meta(FIRST_SLOT, vec![Term::variable("C0")]),
            Literal::meta(
                PRECEDES,
                vec![Term::variable("C0"), Term::variable("C1")],
            ),
        ],
    );

    let bindings = SlotBindingSearch.find_bindings(&template, 2, 2);
    assert_eq!(bindings.len(), 1);
    assert_eq!(bindings[0]["C0"], Term::Constant("0".into()));
    assert_eq!(bindings[0]["C1"], Term::Constant("1".into()));
}

#[test]
fn test_slot_binding_search_enumerates_free_slots() {
    use crate::constrain::ConstraintKind;
    use crate::program::Literal;

    // One unanchored slot and three positions: three bindings.
    let template = Constraint::new(
        ConstraintKind::Specialisation,
        None,
        vec![Literal::meta(SLOT, vec![Term::variable("C0")])],
    );

    let bindings = SlotBindingSearch.find_bindings(&template, 3, 2);
    assert_eq!(bindings.len(), 3);
}

#[test]
fn test_slot_binding_search_no_room() {
    use crate::constrain::ConstraintKind;
    use crate::program::Literal;

    // More slots than clause positions: no binding at all.
    let template = Constraint::new(
        ConstraintKind::Specialisation,
        None,
        vec![
            Literal::meta(SLOT, vec![Term::variable("C0")]),
            Literal::meta(SLOT, vec![Term::variable("C1")]),
        ],
    );

    assert!(SlotBindingSearch.find_bindings(&template, 1, 2).is_empty());
}

#[test]
fn test_table_evaluator_retracts_on_success() {
    use crate::outcome::ConfusionMatrix;

    let candidate = named_candidate(&["p"]);
    let mut evaluator = TableEvaluator::new(Evaluation::Scored(ConfusionMatrix::new(0, 1, 1, 0)));
    assert_eq!(evaluator.fact_count(), 0);

    evaluator.test(&candidate.program).expect("ok");
    assert_eq!(evaluator.fact_count(), 0);
    assert_eq!(evaluator.tested, vec![candidate.program]);
}

#[test]
fn test_table_evaluator_retracts_on_fault() {
    use crate::outcome::ConfusionMatrix;

    let candidate = named_candidate(&["p"]);
    let mut evaluator = TableEvaluator::new(Evaluation::Scored(ConfusionMatrix::new(0, 1, 1, 0)));
    evaluator.fault(candidate.program.clone(), "boom");

    assert!(evaluator.test(&candidate.program).is_err());
    assert_eq!(evaluator.fact_count(), 0);
}

#[test]
fn test_table_evaluator_keeps_background_facts() {
    use crate::outcome::ConfusionMatrix;
    use crate::program::Literal;

    // A background fact equal to an asserted clause must survive the
    // retraction of the temporary assertion.
    let candidate = named_candidate(&["p"]);
    let shared = candidate.program.clauses().next().expect("one").clone();
    let background = Clause::new(Literal::new("bg", vec![]), vec![]);

    let mut evaluator = TableEvaluator::new(Evaluation::Scored(ConfusionMatrix::new(1, 0, 1, 0)));
    evaluator.assert_background(shared.clone());
    evaluator.assert_background(background);

    evaluator.test(&candidate.program).expect("ok");
    assert_eq!(evaluator.fact_count(), 2);
}
