//! # Engine Module
//!
//! Stateful orchestration of the germinal-center simulation.
//!
//! ## Overview
//!
//! A vaccination hands a shared naive pool to the [`assignment`] protocol,
//! which partitions it across the vaccine's antigens without ever giving a
//! cell to two of them. Each partition seeds one
//! [`germinal_center::GerminalCenter`]. Every simulated day the
//! [`immune_system::ImmuneSystem`] runs one cycle per center, gathers the
//! emitted memory and plasma cells and updates the antibody levels.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Validated parameter bundle, builder and TOML loading
//! - **Capacity** ([`capacity`]) - Survivor caps applied by selection in each cycle
//! - **Assignment** ([`assignment`]) - Concurrent, exclusive antigen/B-cell matching
//! - **Germinal Centers** ([`germinal_center`]) - The select, differentiate, cull, mutate cycle
//! - **Orchestration** ([`immune_system`]) - Pools, antibody kinetics and the daily step
//! - **Progress Monitoring** ([`progress`]) - Optional observer callbacks
//! - **Error Handling** ([`error`]) - Engine-level error type
//!
//! Germinal centers share no mutable state, so with the `parallel` feature
//! their cycles run on the rayon thread pool. Each center owns its RNG, which
//! keeps results identical with and without the feature.

pub mod assignment;
pub mod capacity;
pub mod config;
pub mod error;
pub mod germinal_center;
pub mod immune_system;
pub mod progress;
