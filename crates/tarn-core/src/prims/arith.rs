//! Integer arithmetic, comparisons, identity and boolean negation.
//!
//! All arithmetic is wrapping two's-complement on 64-bit signed integers.
//! The folding operators seed the accumulator with their first operand and
//! fold the rest in from the left.

use std::cell::Cell;

use tarn_gc::letroot;
use tarn_gc::object::{car, cdr, int_value, tag_of, text_bytes};
use tarn_gc::{Ref, Tag};

use crate::error::{ErrorKind, LispError};
use crate::eval::eval_list;
use crate::machine::Machine;
use crate::prims::{expect_arity, expect_min_arity};

/// Copies an evaluated argument list into native integers, failing on any
/// non-integer. The copy keeps the values safe across later allocation.
fn int_args(m: &Machine, mut list: Ref, name: &str) -> Result<Vec<i64>, LispError> {
    let mut out = Vec::new();
    while tag_of(list) == Tag::Cell {
        let v = car(list);
        if tag_of(v) != Tag::Int {
            return Err(m.error(
                ErrorKind::TypeError,
                format!("{name} takes integer arguments"),
            ));
        }
        out.push(int_value(v));
        list = cdr(list);
    }
    Ok(out)
}

fn fold(
    m: &mut Machine,
    env: &Cell<Ref>,
    args: &Cell<Ref>,
    name: &str,
    op: fn(&Machine, i64, i64) -> Result<i64, LispError>,
) -> Result<Ref, LispError> {
    letroot!(m.heap => vals = eval_list(m, env, args)?);
    expect_min_arity(m, vals.get(), 1, name)?;
    let nums = int_args(m, vals.get(), name)?;
    let mut acc = nums[0];
    for &n in &nums[1..] {
        acc = op(m, acc, n)?;
    }
    m.heap.int(acc).map_err(|e| m.oom(e))
}

pub(crate) fn prim_add(
    m: &mut Machine,
    env: &Cell<Ref>,
    args: &Cell<Ref>,
) -> Result<Ref, LispError> {
    fold(m, env, args, "+", |_, a, b| Ok(a.wrapping_add(b)))
}

/// `-` negates its single operand, otherwise folds subtraction.
pub(crate) fn prim_sub(
    m: &mut Machine,
    env: &Cell<Ref>,
    args: &Cell<Ref>,
) -> Result<Ref, LispError> {
    letroot!(m.heap => vals = eval_list(m, env, args)?);
    expect_min_arity(m, vals.get(), 1, "-")?;
    let nums = int_args(m, vals.get(), "-")?;
    let acc = if nums.len() == 1 {
        nums[0].wrapping_neg()
    } else {
        let mut acc = nums[0];
        for &n in &nums[1..] {
            acc = acc.wrapping_sub(n);
        }
        acc
    };
    m.heap.int(acc).map_err(|e| m.oom(e))
}

pub(crate) fn prim_mul(
    m: &mut Machine,
    env: &Cell<Ref>,
    args: &Cell<Ref>,
) -> Result<Ref, LispError> {
    fold(m, env, args, "*", |_, a, b| Ok(a.wrapping_mul(b)))
}

pub(crate) fn prim_div(
    m: &mut Machine,
    env: &Cell<Ref>,
    args: &Cell<Ref>,
) -> Result<Ref, LispError> {
    fold(m, env, args, "/", |m, a, b| {
        if b == 0 {
            Err(m.error(ErrorKind::DivisionByZero, "division by zero"))
        } else {
            Ok(a.wrapping_div(b))
        }
    })
}

pub(crate) fn prim_mod(
    m: &mut Machine,
    env: &Cell<Ref>,
    args: &Cell<Ref>,
) -> Result<Ref, LispError> {
    fold(m, env, args, "mod", |m, a, b| {
        if b == 0 {
            Err(m.error(ErrorKind::DivisionByZero, "division by zero"))
        } else {
            Ok(a.wrapping_rem(b))
        }
    })
}

fn compare(
    m: &mut Machine,
    env: &Cell<Ref>,
    args: &Cell<Ref>,
    name: &str,
    op: fn(i64, i64) -> bool,
) -> Result<Ref, LispError> {
    letroot!(m.heap => vals = eval_list(m, env, args)?);
    expect_arity(m, vals.get(), 2, name)?;
    let nums = int_args(m, vals.get(), name)?;
    Ok(if op(nums[0], nums[1]) { m.t() } else { m.nil() })
}

pub(crate) fn prim_num_eq(
    m: &mut Machine,
    env: &Cell<Ref>,
    args: &Cell<Ref>,
) -> Result<Ref, LispError> {
    compare(m, env, args, "=", |a, b| a == b)
}

pub(crate) fn prim_lt(
    m: &mut Machine,
    env: &Cell<Ref>,
    args: &Cell<Ref>,
) -> Result<Ref, LispError> {
    compare(m, env, args, "<", |a, b| a < b)
}

pub(crate) fn prim_le(
    m: &mut Machine,
    env: &Cell<Ref>,
    args: &Cell<Ref>,
) -> Result<Ref, LispError> {
    compare(m, env, args, "<=", |a, b| a <= b)
}

pub(crate) fn prim_gt(
    m: &mut Machine,
    env: &Cell<Ref>,
    args: &Cell<Ref>,
) -> Result<Ref, LispError> {
    compare(m, env, args, ">", |a, b| a > b)
}

pub(crate) fn prim_ge(
    m: &mut Machine,
    env: &Cell<Ref>,
    args: &Cell<Ref>,
) -> Result<Ref, LispError> {
    compare(m, env, args, ">=", |a, b| a >= b)
}

/// `(eq a b)`: identity, except two strings compare by content. Mixing a
/// string with a non-string is a type error.
pub(crate) fn prim_eq(
    m: &mut Machine,
    env: &Cell<Ref>,
    args: &Cell<Ref>,
) -> Result<Ref, LispError> {
    letroot!(m.heap => vals = eval_list(m, env, args)?);
    expect_arity(m, vals.get(), 2, "eq")?;
    let a = car(vals.get());
    let b = car(cdr(vals.get()));
    let a_is_str = tag_of(a) == Tag::Str;
    let b_is_str = tag_of(b) == Tag::Str;
    if a_is_str && b_is_str {
        return Ok(if text_bytes(a) == text_bytes(b) {
            m.t()
        } else {
            m.nil()
        });
    }
    if a_is_str || b_is_str {
        return Err(m.error(
            ErrorKind::TypeError,
            "eq cannot compare a string with a non-string",
        ));
    }
    Ok(if a == b { m.t() } else { m.nil() })
}

/// `(not x)` is true exactly when `x` is nil.
pub(crate) fn prim_not(
    m: &mut Machine,
    env: &Cell<Ref>,
    args: &Cell<Ref>,
) -> Result<Ref, LispError> {
    letroot!(m.heap => vals = eval_list(m, env, args)?);
    expect_arity(m, vals.get(), 1, "not")?;
    Ok(if tag_of(car(vals.get())) == Tag::Nil {
        m.t()
    } else {
        m.nil()
    })
}
