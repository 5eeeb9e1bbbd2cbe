//! Core DTD scanning primitives
//!
//! - Error: structured parse errors with source positions
//! - Encoding: UTF-8/UTF-16 detection and decoding of raw input
//! - Source: inline text, file and http(s) inputs
//! - Entities: parameter/general entity replacement text
//! - Scanner: tokenizer with inline parameter entity expansion

pub mod encoding;
pub mod entities;
pub mod error;
pub mod scanner;
pub mod source;
