//! Detection stages
//!
//! The in-process analytical stages that need no external capability:
//! structural pattern matching against the declared type, the fraud
//! heuristic battery, and declared-metadata consistency. All three are
//! deterministic over their inputs; only the fraud stage carries state
//! (the shared fraud pattern cache).

pub mod consistency;
pub mod fraud;
pub mod structure;

pub use consistency::{check_consistency, ConsistencyResult};
pub use fraud::{FraudDetector, FraudResult};
pub use structure::{match_structure, MarkerCheck, StructureResult};
