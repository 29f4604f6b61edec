//! # gcsim Core Library
//!
//! An agent-based simulator of the humoral response to conjugate vaccination.
//! B-cells mature inside per-serotype germinal centers through rounds of
//! Boltzmann selection, somatic hypermutation and fate differentiation, and
//! the resulting plasma and memory pools drive a daily antibody recurrence.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture.
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Antigen`, `BCell`) and the pure
//!   stochastic processes acting on them: affinity, mutation, selection and differentiation.
//!
//! - **[`engine`]: The Logic Core.** The stateful layer. It owns configuration, germinal
//!   centers, the concurrent antigen assignment protocol and the `ImmuneSystem` orchestrator
//!   with its `vaccinate`/`step` lifecycle.
//!
//! - **[`workflows`]: The Public API.** Complete procedures built on the engine: scheduled
//!   simulations with a `SimulationReport`, cohort runs, TOML scenarios and the calibration
//!   objective used by external parameter searches.

pub mod core;
pub mod engine;
pub mod workflows;
