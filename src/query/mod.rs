//! Read-only navigation over the closure table
//!
//! Every query is a plain description until it is materialised; each
//! materialisation reads the store afresh inside its own transaction.

mod closure;
mod relation;
mod types;

pub use closure::ClosureQuery;
pub use relation::RelationQueries;
pub use types::{Direction, Related};
