//! Core hierarchy data structures and closure maintenance

mod closure;
mod edge;
mod engine;
mod vertex;


pub use edge::{EdgeRow, DIRECT, NOT_APPLICABLE};
pub use engine::{DagError, DagResult, TypedDag};
pub use vertex::VertexId;
