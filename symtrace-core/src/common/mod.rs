//! Common utilities shared by the front-ends and the engines.

mod graph_trait;
mod path_builder;
pub mod paths;
mod visibility;

pub use graph_trait::GraphTraversal;
pub use path_builder::ModulePathBuilder;
pub use visibility::is_importable;
