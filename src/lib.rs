//! RustyDTD - DTD grammar parsing for Elixir
//!
//! Entry points:
//! - parse_dtd: inline DTD text
//! - parse_dtd_source: file path or http(s) URL
//! - parse_dtd_batch: many inputs across the Rayon pool
//! - write_dtd: parse and re-serialize in canonical form

use rustler::{Binary, Env, NifResult, Term};

pub mod core;
pub mod dtd;
pub mod strategy;
mod term;

use term::{dtd_to_term, error_to_term, ok_tuple, str_to_binary};

// ============================================================================
// Allocator Configuration
// ============================================================================

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

// ============================================================================
// Parsing
// ============================================================================

fn result_to_term<'a>(env: Env<'a>, result: crate::core::error::Result<dtd::Dtd>) -> NifResult<Term<'a>> {
    match result {
        Ok(dtd) => Ok(ok_tuple(env, dtd_to_term(env, &dtd)?)),
        Err(err) => Ok(error_to_term(env, &err)),
    }
}

/// Parse DTD text (returns {:ok, dtd} or {:error, {source, line, column, message}})
#[rustler::nif]
fn parse_dtd<'a>(env: Env<'a>, input: Binary<'a>, guess_root: bool) -> NifResult<Term<'a>> {
    result_to_term(env, strategy::parse_bytes(input.as_slice(), guess_root))
}

/// Read a DTD from a file path or URL and parse it
#[rustler::nif(schedule = "DirtyIo")]
fn parse_dtd_source<'a>(env: Env<'a>, location: &str, guess_root: bool) -> NifResult<Term<'a>> {
    result_to_term(env, dtd::parse_source(location, guess_root))
}

/// Parse several independent DTDs in parallel
#[rustler::nif(schedule = "DirtyCpu")]
fn parse_dtd_batch<'a>(
    env: Env<'a>,
    inputs: Vec<Binary<'a>>,
    guess_root: bool,
) -> NifResult<Term<'a>> {
    let slices: Vec<&[u8]> = inputs.iter().map(|b| b.as_slice()).collect();
    let results = strategy::parse_batch(&slices, guess_root);

    let mut list = Term::list_new_empty(env);
    for result in results.into_iter().rev() {
        list = list.list_prepend(result_to_term(env, result)?);
    }
    Ok(list)
}

/// Parse, then serialize in canonical form (parameter entities expanded)
#[rustler::nif]
fn write_dtd<'a>(env: Env<'a>, input: Binary<'a>) -> NifResult<Term<'a>> {
    match strategy::parse_bytes(input.as_slice(), false) {
        Ok(dtd) => {
            let text = dtd::write_dtd(&dtd);
            Ok(ok_tuple(env, str_to_binary(env, &text)))
        }
        Err(err) => Ok(error_to_term(env, &err)),
    }
}

// ============================================================================
// NIF Initialization
// ============================================================================

rustler::init!("Elixir.RustyDTD.Native");
