//! The `utils` module provides a collection of utility functions and common
//! definitions used across the `shardsub` application.
//!
//! It holds the error taxonomy shared by every layer and the tracing
//! initialisation used by the binary and by tests.

pub mod error;
pub mod logging;

#[cfg(test)]
mod tests;
