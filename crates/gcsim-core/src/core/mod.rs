//! # Core Module
//!
//! Stateless building blocks of the germinal-center simulation.
//!
//! ## Architecture
//!
//! - **Agents** ([`models`]) - Antigens, B-cells and their identifiers
//! - **Processes** ([`processes`]) - Affinity, mutation, Boltzmann selection and differentiation
//! - **Read-outs** ([`metrics`]) - Protection classification and avidity
//!
//! Nothing in this module owns simulation state or draws from a global RNG;
//! randomness is always injected by the caller, so every process is
//! reproducible under a fixed seed.

pub mod metrics;
pub mod models;
pub mod processes;
