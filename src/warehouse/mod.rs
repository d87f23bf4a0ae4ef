//! OLAP warehouse writers
//!
//! Dimension resolution, fact loading, and per-tenant mart rebuilds.
//! Dimensions and facts are append-only with conflict-free inserts; marts
//! are replaced per (tenant, window) partition.

pub mod dimensions;
pub mod facts;
pub mod marts;

pub use dimensions::{DimensionCounts, DimensionRepository};
pub use facts::{FactLoadOutcome, FactRepository};
pub use marts::MartBuilder;
