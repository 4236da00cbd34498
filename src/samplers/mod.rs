//! Minimal-sample drawing strategies.
//!
//! The benchmark protocol draws uniformly; the [`Sampler`](crate::core::Sampler)
//! trait keeps the engine open to guided strategies.

pub mod uniform;

pub use uniform::UniformRandomSampler;
