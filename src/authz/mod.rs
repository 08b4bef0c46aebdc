//! Authorization engine and subject handle.

mod engine;
mod subject;
mod tree;

pub use engine::Engine;
pub use subject::Subject;
pub use tree::build_tree;
