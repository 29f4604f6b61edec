//! # Workflows Module
//!
//! High-level entry points that drive the engine through complete runs.
//!
//! ## Overview
//!
//! A workflow takes a validated configuration and a vaccine formulation,
//! runs the daily vaccinate/step loop and hands back a
//! [`simulate::SimulationReport`]. Nothing here keeps global state, so an
//! external parameter search can call these functions repeatedly and get
//! reproducible answers for a fixed seed.
//!
//! ## Architecture
//!
//! - **Simulation** ([`simulate`]) - Scheduled single runs and independent cohort runs
//! - **Scenarios** ([`scenario`]) - TOML files bundling a configuration with its antigens
//! - **Calibration** ([`calibrate`]) - Chamfer-distance objective against observed titers

pub mod calibrate;
pub mod scenario;
pub mod simulate;
