//! The printer.
//!
//! Renders a value to its external form: integers in decimal, symbols by
//! name, strings as their raw content with only `"` escaped, lists in
//! parenthesized form with ` . ` before an improper tail, and opaque tokens
//! for callables. Printing never allocates on the managed heap.

use std::fmt::Write;

use tarn_gc::object::{car, cdr, int_value, tag_of, text_string};
use tarn_gc::{Ref, Tag};

/// Renders `obj` to a `String`.
pub fn print_to_string(obj: Ref) -> String {
    let mut out = String::new();
    write_obj(&mut out, obj);
    out
}

fn write_obj(out: &mut String, obj: Ref) {
    match tag_of(obj) {
        Tag::Int => {
            let _ = write!(out, "{}", int_value(obj));
        }
        Tag::Symbol => out.push_str(&text_string(obj)),
        Tag::Str => {
            for ch in text_string(obj).chars() {
                if ch == '"' {
                    out.push('\\');
                }
                out.push(ch);
            }
        }
        Tag::Cell => {
            out.push('(');
            write_obj(out, car(obj));
            let mut rest = cdr(obj);
            loop {
                match tag_of(rest) {
                    Tag::Nil => break,
                    Tag::Cell => {
                        out.push(' ');
                        write_obj(out, car(rest));
                        rest = cdr(rest);
                    }
                    _ => {
                        out.push_str(" . ");
                        write_obj(out, rest);
                        break;
                    }
                }
            }
            out.push(')');
        }
        Tag::Primitive => out.push_str("<primitive>"),
        Tag::Function => out.push_str("<function>"),
        Tag::Macro => out.push_str("<macro>"),
        Tag::Env => out.push_str("<env>"),
        Tag::True => out.push('t'),
        Tag::Nil => out.push_str("()"),
        Tag::Moved | Tag::Dot | Tag::CloseParen => {
            unreachable!("transient tag escaped into a printable value")
        }
    }
}
