//! Integreat analytics warehouse pipeline
//!
//! A scheduled, incremental dimensional ETL engine. Each invocation covers
//! one half-open day window and runs a fixed stage sequence:
//!
//! 1. Provision the OLAP star schema and per-tenant mart tables
//!    (create-if-absent, never destructive).
//! 2. Derive and conflict-free-insert dimension rows (time, location,
//!    user, service) from the window's source records.
//! 3. Insert fact rows keyed by the source's immutable `log_id`, resolving
//!    the four dimension foreign keys.
//! 4. Rebuild each tenant's flat mart for the window (full replace per
//!    tenant/window partition).
//! 5. Export dated CSV extracts and deliver them to per-tenant buckets.
//!
//! Every warehouse write is idempotent, so re-invoking a window is always
//! safe. The engine never mutates the OLTP source table.

pub mod config;
pub mod database;
pub mod error;
pub mod export;
pub mod handler;
pub mod pipeline;
pub mod rules;
pub mod schema;
pub mod source;
pub mod tenant;
pub mod warehouse;
pub mod window;

pub use config::PipelineConfig;
pub use database::DatabaseManager;
pub use error::{EtlError, EtlResult};
pub use pipeline::{Pipeline, PipelineOptions, RunSummary};
pub use tenant::Tenant;
pub use window::ProcessingWindow;
