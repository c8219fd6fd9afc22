//! Printing, file loading and process exit.

use std::cell::Cell;
use std::io::Write;

use tarn_gc::letroot;
use tarn_gc::object::{car, cdr, int_value, tag_of, text_string};
use tarn_gc::{Ref, Tag};

use crate::error::{ErrorKind, LispError};
use crate::eval::eval_list;
use crate::machine::Machine;
use crate::print::print_to_string;
use crate::prims::expect_arity;
use crate::source::MemSource;

fn print_values(
    m: &mut Machine,
    env: &Cell<Ref>,
    args: &Cell<Ref>,
    newline: bool,
) -> Result<Ref, LispError> {
    letroot!(m.heap => vals = eval_list(m, env, args)?);
    let mut text = String::new();
    let mut p = vals.get();
    let mut first = true;
    while tag_of(p) == Tag::Cell {
        if !first {
            text.push(' ');
        }
        first = false;
        text.push_str(&print_to_string(car(p)));
        p = cdr(p);
    }
    if newline {
        text.push('\n');
    }
    let _ = write!(m.out(), "{text}");
    let _ = m.out().flush();
    Ok(m.nil())
}

/// `(print ...)` renders its values space-separated without a newline.
pub(crate) fn prim_print(
    m: &mut Machine,
    env: &Cell<Ref>,
    args: &Cell<Ref>,
) -> Result<Ref, LispError> {
    print_values(m, env, args, false)
}

/// `(println ...)` is `print` with a trailing newline.
pub(crate) fn prim_println(
    m: &mut Machine,
    env: &Cell<Ref>,
    args: &Cell<Ref>,
) -> Result<Ref, LispError> {
    print_values(m, env, args, true)
}

/// `(load "path")` reads and evaluates every form in a file. Errors inside
/// the file are reported at the nested driver boundary and do not abort
/// the caller; bindings made before a failure persist.
pub(crate) fn prim_load(
    m: &mut Machine,
    env: &Cell<Ref>,
    args: &Cell<Ref>,
) -> Result<Ref, LispError> {
    letroot!(m.heap => vals = eval_list(m, env, args)?);
    expect_arity(m, vals.get(), 1, "load")?;
    let v = car(vals.get());
    if tag_of(v) != Tag::Str {
        return Err(m.error(ErrorKind::TypeError, "load takes a string path"));
    }
    let path = text_string(v);
    let data = std::fs::read(&path).map_err(|err| {
        m.error(
            ErrorKind::MalformedForm,
            format!("load: cannot open {path}: {err}"),
        )
    })?;
    log::debug!("loading {path}");
    let mut src = MemSource::new(path, data);
    let _ = m.eval_input(&mut src);
    Ok(m.nil())
}

/// `(exit status)` terminates the process.
pub(crate) fn prim_exit(
    m: &mut Machine,
    env: &Cell<Ref>,
    args: &Cell<Ref>,
) -> Result<Ref, LispError> {
    letroot!(m.heap => vals = eval_list(m, env, args)?);
    expect_arity(m, vals.get(), 1, "exit")?;
    let v = car(vals.get());
    if tag_of(v) != Tag::Int {
        return Err(m.error(ErrorKind::TypeError, "exit takes an integer status"));
    }
    std::process::exit(int_value(v) as i32)
}
