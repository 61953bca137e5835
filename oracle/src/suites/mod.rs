//! Built-in conformance suites, one per provenance category.

mod allocation;
mod control_flow;
mod memory;
mod pointer_arith;
mod static_objects;

use crate::syntax::Suite;

pub use allocation::allocation;
pub use control_flow::control_flow;
pub use memory::memory;
pub use pointer_arith::pointer_arith;
pub use static_objects::static_objects;

pub fn all() -> Vec<Suite> {
    vec![static_objects(), allocation(), pointer_arith(), control_flow(), memory()]
}
