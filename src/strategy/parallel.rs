//! Parallel Batch Parsing
//!
//! Uses Rayon to parse many independent DTDs at once. Each parse owns its
//! scanner and entity table, so inputs never share state.

use rayon::prelude::*;
use crate::core::encoding;
use crate::core::error::{ParseError, Result};
use crate::dtd::{parse_str, Dtd};

/// Decode and parse one raw input
pub fn parse_bytes(input: &[u8], guess_root: bool) -> Result<Dtd> {
    let text = encoding::decode(input.to_vec()).map_err(|e| ParseError::io(None, e))?;
    parse_str(&text, guess_root)
}

/// Parse every input in parallel; results keep input order
pub fn parse_batch(inputs: &[&[u8]], guess_root: bool) -> Vec<Result<Dtd>> {
    inputs
        .par_iter()
        .map(|input| parse_bytes(input, guess_root))
        .collect()
}
