//! Environment frames and variable binding.
//!
//! An environment is a chain of heap-allocated `Env` objects linked through
//! their `up` field; each frame holds an association list of
//! `(symbol . value)` pairs. Lookup walks from the innermost frame outward
//! and compares symbols by identity, which suffices because symbols are
//! interned. Function application extends the chain with a fresh frame
//! binding parameters to arguments.

use std::cell::Cell;
use std::ptr;

use tarn_gc::letroot;
use tarn_gc::object::{car, cdr, env_up, env_vars, tag_of};
use tarn_gc::{Ref, Tag};

use crate::error::{ErrorKind, LispError};
use crate::machine::Machine;

/// Finds the `(symbol . value)` binding pair for `sym`, innermost frame
/// first. Performs no allocation.
pub fn find(mut env: Ref, sym: Ref) -> Option<Ref> {
    while tag_of(env) == Tag::Env {
        let mut vars = env_vars(env);
        while tag_of(vars) == Tag::Cell {
            let bind = car(vars);
            if car(bind) == sym {
                return Some(bind);
            }
            vars = cdr(vars);
        }
        env = env_up(env);
    }
    None
}

/// Creates a child frame of `up` binding `params` to `args` pairwise.
///
/// A parameter list that is a bare symbol, or that ends in a dotted symbol,
/// binds that symbol to the remaining arguments (possibly nil). Any other
/// length mismatch is an arity error.
pub fn push_env(
    m: &mut Machine,
    up: &Cell<Ref>,
    params: &Cell<Ref>,
    args: &Cell<Ref>,
) -> Result<Ref, LispError> {
    letroot!(m.heap =>
        map = m.nil(),
        p = params.get(),
        a = args.get(),
        sym = ptr::null_mut(),
        val = ptr::null_mut(),
        pair = ptr::null_mut()
    );
    while tag_of(p.get()) == Tag::Cell {
        if tag_of(a.get()) != Tag::Cell {
            return Err(m.error(ErrorKind::ArityMismatch, "too few arguments"));
        }
        sym.set(car(p.get()));
        val.set(car(a.get()));
        let binding = m.heap.cons(sym, val).map_err(|e| m.oom(e))?;
        pair.set(binding);
        let list = m.heap.cons(pair, map).map_err(|e| m.oom(e))?;
        map.set(list);
        p.set(cdr(p.get()));
        a.set(cdr(a.get()));
    }
    if tag_of(p.get()) == Tag::Symbol {
        // Variadic tail: bind the symbol to the rest of the argument list.
        let binding = m.heap.cons(p, a).map_err(|e| m.oom(e))?;
        pair.set(binding);
        let list = m.heap.cons(pair, map).map_err(|e| m.oom(e))?;
        map.set(list);
    } else if tag_of(a.get()) != Tag::Nil {
        return Err(m.error(ErrorKind::ArityMismatch, "too many arguments"));
    }
    m.heap.env_frame(map, up).map_err(|e| m.oom(e))
}
