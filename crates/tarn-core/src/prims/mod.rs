//! Built-in primitives and special forms.
//!
//! Every primitive has the same shape: it receives the machine, the rooted
//! cell holding the caller's environment, and the rooted cell holding the
//! unevaluated argument list. Forms that evaluate their arguments do so
//! through `eval_list` as their first step; special forms pick and choose.
//!
//! - `control` - quoting, conditionals, sequencing, binding and macros
//! - `arith` - integer arithmetic and comparisons
//! - `list` - cell construction and list operations
//! - `string` - string construction and symbol conversions
//! - `system` - printing, file loading, process exit

mod arith;
mod control;
mod list;
mod string;
mod system;

use std::cell::Cell;

use tarn_gc::object::{cdr, tag_of};
use tarn_gc::{Ref, Tag};

use crate::error::{ErrorKind, LispError};
use crate::machine::Machine;

/// A primitive: machine, caller environment, unevaluated argument list.
pub type PrimFn = fn(&mut Machine, &Cell<Ref>, &Cell<Ref>) -> Result<Ref, LispError>;

/// Registers every primitive in the global environment.
pub fn install(m: &mut Machine) -> Result<(), LispError> {
    m.define_primitive("quote", control::prim_quote)?;
    m.define_primitive("cons", list::prim_cons)?;
    m.define_primitive("car", list::prim_car)?;
    m.define_primitive("cdr", list::prim_cdr)?;
    m.define_primitive("setq", control::prim_setq)?;
    m.define_primitive("setcar", list::prim_setcar)?;
    m.define_primitive("while", control::prim_while)?;
    m.define_primitive("gensym", string::prim_gensym)?;
    m.define_primitive("length", list::prim_length)?;
    m.define_primitive("reverse", list::prim_reverse)?;
    m.define_primitive("+", arith::prim_add)?;
    m.define_primitive("-", arith::prim_sub)?;
    m.define_primitive("*", arith::prim_mul)?;
    m.define_primitive("/", arith::prim_div)?;
    m.define_primitive("mod", arith::prim_mod)?;
    m.define_primitive("=", arith::prim_num_eq)?;
    m.define_primitive("<", arith::prim_lt)?;
    m.define_primitive("<=", arith::prim_le)?;
    m.define_primitive(">", arith::prim_gt)?;
    m.define_primitive(">=", arith::prim_ge)?;
    m.define_primitive("eq", arith::prim_eq)?;
    m.define_primitive("not", arith::prim_not)?;
    m.define_primitive("and", control::prim_and)?;
    m.define_primitive("or", control::prim_or)?;
    m.define_primitive("if", control::prim_if)?;
    m.define_primitive("progn", control::prim_progn)?;
    m.define_primitive("lambda", control::prim_lambda)?;
    m.define_primitive("defun", control::prim_defun)?;
    m.define_primitive("defmacro", control::prim_defmacro)?;
    m.define_primitive("define", control::prim_define)?;
    m.define_primitive("macroexpand", control::prim_macroexpand)?;
    m.define_primitive("print", system::prim_print)?;
    m.define_primitive("println", system::prim_println)?;
    m.define_primitive("string-concat", string::prim_string_concat)?;
    m.define_primitive("symbol->string", string::prim_symbol_to_string)?;
    m.define_primitive("string->symbol", string::prim_string_to_symbol)?;
    m.define_primitive("load", system::prim_load)?;
    m.define_primitive("exit", system::prim_exit)?;
    Ok(())
}

/// Length of a proper list, `None` if the chain ends in a non-nil tail.
pub(crate) fn list_length(mut list: Ref) -> Option<usize> {
    let mut n = 0;
    loop {
        match tag_of(list) {
            Tag::Nil => return Some(n),
            Tag::Cell => {
                n += 1;
                list = cdr(list);
            }
            _ => return None,
        }
    }
}

pub(crate) fn expect_arity(
    m: &Machine,
    args: Ref,
    expected: usize,
    name: &str,
) -> Result<(), LispError> {
    if list_length(args) == Some(expected) {
        Ok(())
    } else {
        Err(m.error(ErrorKind::MalformedForm, format!("malformed {name}")))
    }
}

pub(crate) fn expect_min_arity(
    m: &Machine,
    args: Ref,
    at_least: usize,
    name: &str,
) -> Result<(), LispError> {
    match list_length(args) {
        Some(n) if n >= at_least => Ok(()),
        _ => Err(m.error(ErrorKind::MalformedForm, format!("malformed {name}"))),
    }
}
