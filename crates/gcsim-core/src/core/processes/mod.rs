//! Stochastic processes of the germinal-center reaction.
//!
//! Each process is a pure transform: it reads cells and returns new values,
//! and every random draw comes from a caller-supplied RNG.
//!
//! - [`affinity`] - Receptor/epitope binding strength.
//! - [`mutation`] - Somatic hypermutation of receptor profiles.
//! - [`selection`] - Boltzmann-weighted survivor sampling.
//! - [`differentiation`] - Affinity-driven memory/plasma fate decisions.

pub mod affinity;
pub mod differentiation;
pub mod mutation;
pub mod selection;
