//! The evaluator.
//!
//! `eval` dispatches on the tag of its operand: most values are
//! self-evaluating, symbols are looked up, and cells are applications. An
//! application first attempts macro expansion; if the form changed it is
//! re-entered through `eval`, so nested macro output keeps expanding until
//! it reaches a fixed shape. Otherwise the operator is evaluated and either
//! receives the raw argument forms (primitives decide evaluation
//! themselves) or the arguments evaluated left to right (functions).
//!
//! Every local that lives across a possible allocation sits in a root
//! frame; values are re-read from their slots after each call that can
//! collect.

use std::cell::Cell;
use std::ptr;

use tarn_gc::letroot;
use tarn_gc::object::{car, cdr, closure_body, closure_env, closure_params, nreverse, prim_index, tag_of};
use tarn_gc::{Ref, Tag};

use crate::env::{find, push_env};
use crate::error::{ErrorKind, LispError};
use crate::machine::Machine;
use crate::print::print_to_string;

/// Evaluates `obj` in `env`.
pub fn eval(m: &mut Machine, env: &Cell<Ref>, obj: &Cell<Ref>) -> Result<Ref, LispError> {
    match tag_of(obj.get()) {
        Tag::Int | Tag::Str | Tag::Primitive | Tag::Function | Tag::True | Tag::Nil => Ok(obj.get()),
        Tag::Symbol => match find(env.get(), obj.get()) {
            Some(bind) => Ok(cdr(bind)),
            None => Err(m.error(
                ErrorKind::UnboundSymbol,
                tarn_gc::object::text_string(obj.get()),
            )),
        },
        Tag::Cell => {
            letroot!(m.heap => expanded = ptr::null_mut(), fun = ptr::null_mut(), args = ptr::null_mut());
            let exp = macroexpand(m, env, obj)?;
            if exp != obj.get() {
                expanded.set(exp);
                return eval(m, env, expanded);
            }
            letroot!(m.heap => head = car(obj.get()));
            let f = eval(m, env, head)?;
            fun.set(f);
            args.set(cdr(obj.get()));
            if !matches!(tag_of(fun.get()), Tag::Primitive | Tag::Function) {
                return Err(m.error(
                    ErrorKind::NotCallable,
                    format!(
                        "head of a form must be a function, got {}",
                        print_to_string(fun.get())
                    ),
                ));
            }
            apply(m, env, fun, args)
        }
        _ => Err(m.error(ErrorKind::InternalBug, "eval: unexpected tag")),
    }
}

/// Expands `obj` by one macro application if its head symbol is bound to a
/// macro, returning the form unchanged otherwise.
pub fn macroexpand(m: &mut Machine, env: &Cell<Ref>, obj: &Cell<Ref>) -> Result<Ref, LispError> {
    let o = obj.get();
    if tag_of(o) != Tag::Cell || tag_of(car(o)) != Tag::Symbol {
        return Ok(o);
    }
    let Some(bind) = find(env.get(), car(o)) else {
        return Ok(o);
    };
    if tag_of(cdr(bind)) != Tag::Macro {
        return Ok(o);
    }
    letroot!(m.heap => fun = cdr(bind), args = cdr(o));
    apply_func(m, env, fun, args)
}

/// Applies an operator to an argument list. Primitives receive the forms
/// unevaluated; functions get them evaluated left to right.
pub(crate) fn apply(
    m: &mut Machine,
    env: &Cell<Ref>,
    fun: &Cell<Ref>,
    args: &Cell<Ref>,
) -> Result<Ref, LispError> {
    match tag_of(fun.get()) {
        Tag::Primitive => {
            let index = prim_index(fun.get());
            let Some(func) = m.prim_fn(index) else {
                return Err(m.error(ErrorKind::InternalBug, "primitive index out of range"));
            };
            func(m, env, args)
        }
        Tag::Function => {
            letroot!(m.heap => eargs = eval_list(m, env, args)?);
            apply_func(m, env, fun, eargs)
        }
        _ => Err(m.error(ErrorKind::NotCallable, "object is not callable")),
    }
}

/// Binds already-evaluated (or, for macros, raw) arguments in a fresh frame
/// over the closure's captured environment and runs the body as an implicit
/// sequence.
pub(crate) fn apply_func(
    m: &mut Machine,
    _env: &Cell<Ref>,
    fun: &Cell<Ref>,
    args: &Cell<Ref>,
) -> Result<Ref, LispError> {
    letroot!(m.heap =>
        params = closure_params(fun.get()),
        fenv = closure_env(fun.get()),
        body = closure_body(fun.get()),
        newenv = ptr::null_mut()
    );
    let e = push_env(m, fenv, params, args)?;
    newenv.set(e);
    progn(m, newenv, body)
}

/// Evaluates each element of `list` left to right, returning a fresh list
/// of the results.
pub(crate) fn eval_list(
    m: &mut Machine,
    env: &Cell<Ref>,
    list: &Cell<Ref>,
) -> Result<Ref, LispError> {
    letroot!(m.heap =>
        head = m.nil(),
        lp = list.get(),
        expr = ptr::null_mut(),
        val = ptr::null_mut()
    );
    while tag_of(lp.get()) == Tag::Cell {
        expr.set(car(lp.get()));
        let v = eval(m, env, expr)?;
        val.set(v);
        let cell = m.heap.cons(val, head).map_err(|e| m.oom(e))?;
        head.set(cell);
        lp.set(cdr(lp.get()));
    }
    if tag_of(lp.get()) != Tag::Nil {
        return Err(m.error(ErrorKind::MalformedForm, "argument list is improper"));
    }
    Ok(nreverse(head.get(), m.nil()))
}

/// Evaluates a body sequence in order, returning the last value or nil for
/// an empty body.
pub(crate) fn progn(m: &mut Machine, env: &Cell<Ref>, body: &Cell<Ref>) -> Result<Ref, LispError> {
    letroot!(m.heap => lp = body.get(), expr = ptr::null_mut(), val = m.nil());
    while tag_of(lp.get()) == Tag::Cell {
        expr.set(car(lp.get()));
        let v = eval(m, env, expr)?;
        val.set(v);
        lp.set(cdr(lp.get()));
    }
    Ok(val.get())
}
