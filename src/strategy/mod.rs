//! Parsing Strategy Module
//!
//! - Single: one DTD per call (`dtd::parse_str`, `dtd::parse_source`)
//! - Parallel: independent DTDs parsed across the Rayon pool

pub mod parallel;

pub use parallel::{parse_batch, parse_bytes};
