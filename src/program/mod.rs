//! The program model: terms, literals, clauses, and clause sets, all
//! value types with order-insensitive equality and stable content
//! hashes.  Everything the search loop, the constraint machinery, and
//! the backend contracts exchange is expressed in these types.
mod clause;
mod hypothesis;
mod literal;

pub use clause::Clause;
pub use hypothesis::BeforeMap;
pub use hypothesis::Candidate;
pub use hypothesis::Program;
pub use literal::Binding;
pub use literal::Literal;
pub use literal::Term;
