//! String construction and symbol conversions.

use std::cell::Cell;

use tarn_gc::letroot;
use tarn_gc::object::{car, cdr, int_value, tag_of, text_bytes, text_string};
use tarn_gc::{Ref, Tag};

use crate::error::{ErrorKind, LispError};
use crate::eval::eval_list;
use crate::machine::Machine;
use crate::prims::{expect_arity, list_length};

/// `(gensym)` allocates a fresh uninterned symbol `G__N`.
pub(crate) fn prim_gensym(
    m: &mut Machine,
    _env: &Cell<Ref>,
    args: &Cell<Ref>,
) -> Result<Ref, LispError> {
    if list_length(args.get()) != Some(0) {
        return Err(m.error(ErrorKind::MalformedForm, "malformed gensym"));
    }
    let name = m.next_gensym();
    m.heap
        .text(Tag::Symbol, name.as_bytes())
        .map_err(|e| m.oom(e))
}

/// `(string-concat ...)` concatenates strings and decimal-formatted
/// integers into a new string.
pub(crate) fn prim_string_concat(
    m: &mut Machine,
    env: &Cell<Ref>,
    args: &Cell<Ref>,
) -> Result<Ref, LispError> {
    letroot!(m.heap => vals = eval_list(m, env, args)?);
    let mut buf = Vec::new();
    let mut p = vals.get();
    while tag_of(p) == Tag::Cell {
        let v = car(p);
        match tag_of(v) {
            Tag::Str => buf.extend_from_slice(text_bytes(v)),
            Tag::Int => buf.extend_from_slice(int_value(v).to_string().as_bytes()),
            _ => {
                return Err(m.error(
                    ErrorKind::TypeError,
                    "string-concat takes strings and integers",
                ))
            }
        }
        p = cdr(p);
    }
    m.heap.text(Tag::Str, &buf).map_err(|e| m.oom(e))
}

pub(crate) fn prim_symbol_to_string(
    m: &mut Machine,
    env: &Cell<Ref>,
    args: &Cell<Ref>,
) -> Result<Ref, LispError> {
    letroot!(m.heap => vals = eval_list(m, env, args)?);
    expect_arity(m, vals.get(), 1, "symbol->string")?;
    let v = car(vals.get());
    if tag_of(v) != Tag::Symbol {
        return Err(m.error(ErrorKind::TypeError, "symbol->string takes a symbol"));
    }
    let bytes = text_bytes(v).to_vec();
    m.heap.text(Tag::Str, &bytes).map_err(|e| m.oom(e))
}

/// `(string->symbol s)` interns the string's content.
pub(crate) fn prim_string_to_symbol(
    m: &mut Machine,
    env: &Cell<Ref>,
    args: &Cell<Ref>,
) -> Result<Ref, LispError> {
    letroot!(m.heap => vals = eval_list(m, env, args)?);
    expect_arity(m, vals.get(), 1, "string->symbol")?;
    let v = car(vals.get());
    if tag_of(v) != Tag::Str {
        return Err(m.error(ErrorKind::TypeError, "string->symbol takes a string"));
    }
    let name = text_string(v);
    m.intern(&name)
}
