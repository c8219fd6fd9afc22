//! Quoting, conditionals, sequencing, binding forms and macro machinery.

use std::cell::Cell;
use std::ptr;

use tarn_gc::letroot;
use tarn_gc::object::{car, cdr, set_cdr, tag_of, text_string};
use tarn_gc::{Ref, Tag};

use crate::env::find;
use crate::error::{ErrorKind, LispError};
use crate::eval::{eval, macroexpand, progn};
use crate::machine::Machine;
use crate::prims::{expect_arity, expect_min_arity};

/// `(quote expr)` returns its argument unevaluated.
pub(crate) fn prim_quote(
    m: &mut Machine,
    _env: &Cell<Ref>,
    args: &Cell<Ref>,
) -> Result<Ref, LispError> {
    expect_arity(m, args.get(), 1, "quote")?;
    Ok(car(args.get()))
}

/// `(setq sym expr)` mutates an existing binding.
pub(crate) fn prim_setq(
    m: &mut Machine,
    env: &Cell<Ref>,
    args: &Cell<Ref>,
) -> Result<Ref, LispError> {
    expect_arity(m, args.get(), 2, "setq")?;
    let sym = car(args.get());
    if tag_of(sym) != Tag::Symbol {
        return Err(m.error(ErrorKind::MalformedForm, "setq variable must be a symbol"));
    }
    let Some(binding) = find(env.get(), sym) else {
        return Err(m.error(ErrorKind::UnboundSymbol, text_string(sym)));
    };
    letroot!(m.heap => bind = binding, expr = car(cdr(args.get())));
    let value = eval(m, env, expr)?;
    set_cdr(bind.get(), value);
    Ok(value)
}

/// `(while cond body...)` loops while `cond` is non-nil; returns nil.
pub(crate) fn prim_while(
    m: &mut Machine,
    env: &Cell<Ref>,
    args: &Cell<Ref>,
) -> Result<Ref, LispError> {
    expect_min_arity(m, args.get(), 2, "while")?;
    letroot!(m.heap => cond = car(args.get()), body = cdr(args.get()));
    loop {
        let test = eval(m, env, cond)?;
        if tag_of(test) == Tag::Nil {
            break;
        }
        progn(m, env, body)?;
    }
    Ok(m.nil())
}

/// `(and ...)` evaluates left to right until a nil; yields the last value.
pub(crate) fn prim_and(
    m: &mut Machine,
    env: &Cell<Ref>,
    args: &Cell<Ref>,
) -> Result<Ref, LispError> {
    letroot!(m.heap => lp = args.get(), expr = ptr::null_mut(), last = m.t());
    while tag_of(lp.get()) == Tag::Cell {
        expr.set(car(lp.get()));
        let value = eval(m, env, expr)?;
        if tag_of(value) == Tag::Nil {
            return Ok(m.nil());
        }
        last.set(value);
        lp.set(cdr(lp.get()));
    }
    Ok(last.get())
}

/// `(or ...)` evaluates left to right until a non-nil; yields it or nil.
pub(crate) fn prim_or(
    m: &mut Machine,
    env: &Cell<Ref>,
    args: &Cell<Ref>,
) -> Result<Ref, LispError> {
    letroot!(m.heap => lp = args.get(), expr = ptr::null_mut());
    while tag_of(lp.get()) == Tag::Cell {
        expr.set(car(lp.get()));
        let value = eval(m, env, expr)?;
        if tag_of(value) != Tag::Nil {
            return Ok(value);
        }
        lp.set(cdr(lp.get()));
    }
    Ok(m.nil())
}

/// `(if test then else...)` with the else branch an implicit sequence.
pub(crate) fn prim_if(
    m: &mut Machine,
    env: &Cell<Ref>,
    args: &Cell<Ref>,
) -> Result<Ref, LispError> {
    expect_min_arity(m, args.get(), 2, "if")?;
    letroot!(m.heap => cond = car(args.get()), rest = cdr(args.get()));
    let test = eval(m, env, cond)?;
    if tag_of(test) != Tag::Nil {
        letroot!(m.heap => then = car(rest.get()));
        eval(m, env, then)
    } else {
        letroot!(m.heap => els = cdr(rest.get()));
        progn(m, env, els)
    }
}

/// `(progn body...)` implicit sequence.
pub(crate) fn prim_progn(
    m: &mut Machine,
    env: &Cell<Ref>,
    args: &Cell<Ref>,
) -> Result<Ref, LispError> {
    progn(m, env, args)
}

/// A parameter list is a bare symbol, or a chain of symbols optionally
/// ending in a dotted symbol.
fn validate_params(m: &Machine, params: Ref) -> Result<(), LispError> {
    if tag_of(params) == Tag::Symbol {
        return Ok(());
    }
    let mut p = params;
    while tag_of(p) == Tag::Cell {
        if tag_of(car(p)) != Tag::Symbol {
            return Err(m.error(ErrorKind::MalformedForm, "parameter must be a symbol"));
        }
        p = cdr(p);
    }
    match tag_of(p) {
        Tag::Nil | Tag::Symbol => Ok(()),
        _ => Err(m.error(ErrorKind::MalformedForm, "malformed parameter list")),
    }
}

/// `(lambda params body...)` captures the current environment.
pub(crate) fn prim_lambda(
    m: &mut Machine,
    env: &Cell<Ref>,
    args: &Cell<Ref>,
) -> Result<Ref, LispError> {
    expect_min_arity(m, args.get(), 2, "lambda")?;
    validate_params(m, car(args.get()))?;
    letroot!(m.heap => params = car(args.get()), body = cdr(args.get()));
    m.heap
        .closure(Tag::Function, params, body, env)
        .map_err(|e| m.oom(e))
}

fn define_callable(
    m: &mut Machine,
    env: &Cell<Ref>,
    args: &Cell<Ref>,
    tag: Tag,
    name: &str,
) -> Result<Ref, LispError> {
    expect_min_arity(m, args.get(), 3, name)?;
    if tag_of(car(args.get())) != Tag::Symbol {
        return Err(m.error(
            ErrorKind::MalformedForm,
            format!("{name} name must be a symbol"),
        ));
    }
    validate_params(m, car(cdr(args.get())))?;
    letroot!(m.heap =>
        sym = car(args.get()),
        params = car(cdr(args.get())),
        body = cdr(cdr(args.get())),
        fun = ptr::null_mut()
    );
    let f = m.heap.closure(tag, params, body, env).map_err(|e| m.oom(e))?;
    fun.set(f);
    m.add_variable(env, sym, fun)?;
    Ok(fun.get())
}

/// `(defun name params body...)`.
pub(crate) fn prim_defun(
    m: &mut Machine,
    env: &Cell<Ref>,
    args: &Cell<Ref>,
) -> Result<Ref, LispError> {
    define_callable(m, env, args, Tag::Function, "defun")
}

/// `(defmacro name params body...)`.
pub(crate) fn prim_defmacro(
    m: &mut Machine,
    env: &Cell<Ref>,
    args: &Cell<Ref>,
) -> Result<Ref, LispError> {
    define_callable(m, env, args, Tag::Macro, "defmacro")
}

/// `(define sym expr)` binds in the current frame.
pub(crate) fn prim_define(
    m: &mut Machine,
    env: &Cell<Ref>,
    args: &Cell<Ref>,
) -> Result<Ref, LispError> {
    expect_arity(m, args.get(), 2, "define")?;
    if tag_of(car(args.get())) != Tag::Symbol {
        return Err(m.error(ErrorKind::MalformedForm, "define variable must be a symbol"));
    }
    letroot!(m.heap =>
        sym = car(args.get()),
        expr = car(cdr(args.get())),
        val = ptr::null_mut()
    );
    let value = eval(m, env, expr)?;
    val.set(value);
    m.add_variable(env, sym, val)?;
    Ok(val.get())
}

/// `(macroexpand form)` expands one macro level without evaluating the
/// result.
pub(crate) fn prim_macroexpand(
    m: &mut Machine,
    env: &Cell<Ref>,
    args: &Cell<Ref>,
) -> Result<Ref, LispError> {
    expect_arity(m, args.get(), 1, "macroexpand")?;
    letroot!(m.heap => form = car(args.get()));
    macroexpand(m, env, form)
}
