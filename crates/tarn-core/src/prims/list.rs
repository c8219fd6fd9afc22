//! Cell construction and list operations.

use std::cell::Cell;
use std::ptr;

use tarn_gc::letroot;
use tarn_gc::object::{car, cdr, nreverse, set_car, tag_of, text_len, text_reverse_in_place};
use tarn_gc::{Ref, Tag};

use crate::error::{ErrorKind, LispError};
use crate::eval::eval_list;
use crate::machine::Machine;
use crate::prims::{expect_arity, expect_min_arity, list_length};

/// `(cons a b)` allocates the pair `(a . b)`.
pub(crate) fn prim_cons(
    m: &mut Machine,
    env: &Cell<Ref>,
    args: &Cell<Ref>,
) -> Result<Ref, LispError> {
    letroot!(m.heap => vals = eval_list(m, env, args)?);
    expect_arity(m, vals.get(), 2, "cons")?;
    letroot!(m.heap => head = car(vals.get()), tail = car(cdr(vals.get())));
    m.heap.cons(head, tail).map_err(|e| m.oom(e))
}

pub(crate) fn prim_car(
    m: &mut Machine,
    env: &Cell<Ref>,
    args: &Cell<Ref>,
) -> Result<Ref, LispError> {
    letroot!(m.heap => vals = eval_list(m, env, args)?);
    expect_arity(m, vals.get(), 1, "car")?;
    let cell = car(vals.get());
    if tag_of(cell) != Tag::Cell {
        return Err(m.error(ErrorKind::TypeError, "car takes a cell"));
    }
    Ok(car(cell))
}

pub(crate) fn prim_cdr(
    m: &mut Machine,
    env: &Cell<Ref>,
    args: &Cell<Ref>,
) -> Result<Ref, LispError> {
    letroot!(m.heap => vals = eval_list(m, env, args)?);
    expect_arity(m, vals.get(), 1, "cdr")?;
    let cell = car(vals.get());
    if tag_of(cell) != Tag::Cell {
        return Err(m.error(ErrorKind::TypeError, "cdr takes a cell"));
    }
    Ok(cdr(cell))
}

/// `(setcar cell value)` mutates the head field of a cell.
pub(crate) fn prim_setcar(
    m: &mut Machine,
    env: &Cell<Ref>,
    args: &Cell<Ref>,
) -> Result<Ref, LispError> {
    letroot!(m.heap => vals = eval_list(m, env, args)?);
    expect_arity(m, vals.get(), 2, "setcar")?;
    let cell = car(vals.get());
    if tag_of(cell) != Tag::Cell {
        return Err(m.error(ErrorKind::TypeError, "setcar takes a cell"));
    }
    set_car(cell, car(cdr(vals.get())));
    Ok(cell)
}

/// `(length x)`: element count of a proper list or byte length of a
/// string. A dotted list is a type error.
pub(crate) fn prim_length(
    m: &mut Machine,
    env: &Cell<Ref>,
    args: &Cell<Ref>,
) -> Result<Ref, LispError> {
    letroot!(m.heap => vals = eval_list(m, env, args)?);
    expect_arity(m, vals.get(), 1, "length")?;
    let v = car(vals.get());
    match tag_of(v) {
        Tag::Str => {
            let n = text_len(v) as i64;
            m.heap.int(n).map_err(|e| m.oom(e))
        }
        Tag::Nil | Tag::Cell => match list_length(v) {
            Some(n) => m.heap.int(n as i64).map_err(|e| m.oom(e)),
            None => Err(m.error(ErrorKind::TypeError, "length of a dotted list")),
        },
        _ => Err(m.error(ErrorKind::TypeError, "length takes a list or a string")),
    }
}

/// `(reverse x)`: a reversed copy of a list, an in-place reversed string,
/// or, with several arguments, the argument list reversed.
pub(crate) fn prim_reverse(
    m: &mut Machine,
    env: &Cell<Ref>,
    args: &Cell<Ref>,
) -> Result<Ref, LispError> {
    letroot!(m.heap => vals = eval_list(m, env, args)?);
    expect_min_arity(m, vals.get(), 1, "reverse")?;
    if list_length(vals.get()) != Some(1) {
        // Several arguments: the freshly built value list is reversed
        // destructively, which no one else can observe.
        return Ok(nreverse(vals.get(), m.nil()));
    }
    let v = car(vals.get());
    match tag_of(v) {
        Tag::Nil => Ok(m.nil()),
        Tag::Str => {
            text_reverse_in_place(v);
            Ok(v)
        }
        Tag::Cell => reverse_copy(m, vals),
        _ => Err(m.error(ErrorKind::TypeError, "reverse takes a list or a string")),
    }
}

fn reverse_copy(m: &mut Machine, vals: &Cell<Ref>) -> Result<Ref, LispError> {
    letroot!(m.heap => src = car(vals.get()), out = m.nil(), item = ptr::null_mut());
    while tag_of(src.get()) == Tag::Cell {
        item.set(car(src.get()));
        let cell = m.heap.cons(item, out).map_err(|e| m.oom(e))?;
        out.set(cell);
        src.set(cdr(src.get()));
    }
    if tag_of(src.get()) != Tag::Nil {
        return Err(m.error(ErrorKind::TypeError, "reverse of a dotted list"));
    }
    Ok(out.get())
}
