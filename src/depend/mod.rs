//! Dependency engine: parses per-service dependency declarations, caches
//! the resulting graph to disk, and answers transitive closure and
//! runlevel-ordering queries over it.
pub mod cache;
pub mod parser;
pub mod query;
pub mod types;

pub use cache::{load, update_deptree};
pub use parser::build_graph;
pub use query::{get_depends, order_services, DepOptions};
pub use types::{get_depinfo, get_deptype, DepBucket, DependencyGraph, Relation};
