//! Test utilities for the Head Amp decoder
//!
//! Provides synthetic capture-log generation for validating the decode
//! pipeline without a recorded capture.

pub mod capture_generator;

pub use capture_generator::*;
