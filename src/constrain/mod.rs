//! The constraint model: deriving abstract no-good templates from
//! rejected candidates, and grounding them into concrete clauses the
//! enumeration backend can swallow.  Templates are ephemeral values;
//! they are consumed by the grounder and never retained.
mod derive;
mod ground;

pub use derive::clause_id;
pub use derive::outcome_constraint_kinds;
pub use derive::Constraint;
pub use derive::ConstraintKind;
pub use derive::DerivePolicy;
pub use derive::Deriver;
pub use derive::{
    BODY_SIZE, CLAUSE_COUNT, FIRST_SLOT, INCLUDED_CLAUSE, PRECEDES, PROGRAM_SIZE, SLOT,
};
pub use ground::ground_constraints;
pub use ground::BindingSearch;
