//! Data models for the agents of the humoral response.
//!
//! - [`antigen`] - Vaccine antigens: serotype, epitope signature and formulation metadata.
//! - [`bcell`] - B-cell agents with receptor profiles and lineage bookkeeping.
//! - [`ids`] - Strongly-typed identifiers shared across the crate.

pub mod antigen;
pub mod bcell;
pub mod ids;
