//! Integration test crate for creditwipe.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! It depends on every creditwipe library crate to verify they work together.

#[cfg(test)]
mod pipeline;

#[cfg(test)]
mod session;

#[cfg(test)]
mod export;
