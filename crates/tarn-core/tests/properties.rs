//! Property tests for the reader, printer and arithmetic.

use std::io;
use std::ptr;

use proptest::prelude::*;
use tarn_core::{eval, print_to_string, GcConfig, Machine, MemSource, Reader};
use tarn_gc::letroot;

fn machine() -> Machine {
    Machine::with_output(GcConfig::default(), Box::new(io::sink())).unwrap()
}

/// Parses exactly one expression and returns its printed form.
fn parse_print(m: &mut Machine, text: &str) -> String {
    let mut src = MemSource::from_str("<prop>", text);
    let obj = {
        let mut reader = Reader::new(m, &mut src);
        reader.read_expr().unwrap().expect("one expression")
    };
    print_to_string(obj)
}

/// Evaluates one expression and returns its printed value.
fn eval_print(m: &mut Machine, text: &str) -> String {
    let mut src = MemSource::from_str("<prop>", text);
    letroot!(m.heap => env = m.global_env(), expr = ptr::null_mut());
    let obj = {
        let mut reader = Reader::new(m, &mut src);
        reader.read_expr().unwrap().expect("one expression")
    };
    expr.set(obj);
    let value = eval::eval(m, env, expr).unwrap();
    print_to_string(value)
}

/// A symbol token drawn from the accepted grammar.
fn symbol_token() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9?!-]{0,10}"
}

/// The text of an atom whose printed form is a valid input.
fn atom_text() -> impl Strategy<Value = String> {
    prop_oneof![
        any::<i64>().prop_map(|n| n.to_string()),
        symbol_token(),
        Just("()".to_string()),
    ]
}

/// Nested list text over round-trippable atoms.
fn expr_text() -> impl Strategy<Value = String> {
    atom_text().prop_recursive(3, 24, 6, |inner| {
        prop::collection::vec(inner, 0..6).prop_map(|items| format!("({})", items.join(" ")))
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Printing a parsed expression and re-parsing the result reaches a
    /// fixed point for integers, symbols, nil and nested lists of them.
    #[test]
    fn reader_round_trip(text in expr_text()) {
        let mut m = machine();
        let printed = parse_print(&mut m, &text);
        let reprinted = parse_print(&mut m, &printed);
        prop_assert_eq!(printed, reprinted);
    }

    /// Integer literals read back to the value that produced them.
    #[test]
    fn integer_literals_round_trip(n in any::<i64>()) {
        let mut m = machine();
        prop_assert_eq!(parse_print(&mut m, &n.to_string()), n.to_string());
    }

    /// Interning the same name twice yields the identical object, with
    /// arbitrary allocations in between.
    #[test]
    fn interning_is_stable(name in symbol_token(), filler in prop::collection::vec(any::<i64>(), 0..16)) {
        let mut m = machine();
        letroot!(m.heap => first = ptr::null_mut());
        let sym = m.intern(&name).unwrap();
        first.set(sym);
        for n in filler {
            m.heap.int(n).unwrap();
        }
        m.heap.collect();
        let second = m.intern(&name).unwrap();
        prop_assert_eq!(first.get(), second);
    }

    /// Two parses of the same symbol token are eq.
    #[test]
    fn quoted_symbols_are_identical(name in symbol_token()) {
        let mut m = machine();
        let text = format!("(eq (quote {name}) (quote {name}))");
        prop_assert_eq!(eval_print(&mut m, &text), "t");
    }

    /// 64-bit arithmetic identities.
    #[test]
    fn arithmetic_identities(x in any::<i64>()) {
        let mut m = machine();
        prop_assert_eq!(eval_print(&mut m, &format!("(+ {x} 0)")), x.to_string());
        prop_assert_eq!(eval_print(&mut m, &format!("(* {x} 1)")), x.to_string());
        prop_assert_eq!(eval_print(&mut m, &format!("(- {x} {x})")), "0");
        prop_assert_eq!(eval_print(&mut m, &format!("(= {x} {x})")), "t");
    }

    /// The default and always-gc policies evaluate list programs to the
    /// same printed result.
    #[test]
    fn always_gc_is_observably_equivalent(items in prop::collection::vec(any::<i64>(), 1..12)) {
        let text = format!(
            "(reverse (quote ({})))",
            items.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(" ")
        );
        let mut results = Vec::new();
        for always_gc in [false, true] {
            let config = GcConfig { always_gc, ..Default::default() };
            let mut m = Machine::with_output(config, Box::new(io::sink())).unwrap();
            results.push(eval_print(&mut m, &text));
        }
        prop_assert_eq!(&results[0], &results[1]);
    }
}
