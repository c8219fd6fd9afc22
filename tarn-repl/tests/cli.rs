//! End-to-end tests of the `tarn` binary.

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;

fn tarn() -> Command {
    Command::cargo_bin("tarn").unwrap()
}

#[test]
fn eval_prints_top_level_values() {
    tarn()
        .args(["--eval", "(+ 1 2)", "--no-repl"])
        .assert()
        .success()
        .stdout("3\n");
}

#[test]
fn factorial_from_a_script_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fact.lisp");
    fs::write(
        &path,
        "(define fact (lambda (n) (if (= n 0) 1 (* n (fact (- n 1))))))\n(fact 10)\n",
    )
    .unwrap();
    tarn()
        .arg(&path)
        .arg("--no-repl")
        .assert()
        .success()
        .stdout("<function>\n3628800\n");
}

#[test]
fn always_gc_output_matches_default() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("program.lisp");
    fs::write(
        &path,
        "(define i 0)\n\
         (define acc ())\n\
         (while (< i 50) (progn (setq i (+ i 1)) (setq acc (cons i acc))))\n\
         (length acc)\n\
         (reverse acc)\n",
    )
    .unwrap();

    let default_run = tarn().arg(&path).arg("--no-repl").assert().success();
    let default_out = default_run.get_output().stdout.clone();

    tarn()
        .arg(&path)
        .args(["--no-repl", "--always-gc"])
        .assert()
        .success()
        .stdout(String::from_utf8(default_out).unwrap());
}

#[test]
fn errors_go_to_stderr_and_fail_the_run() {
    tarn()
        .args(["--eval", "(car 5)", "--no-repl"])
        .assert()
        .failure()
        .stdout("")
        .stderr(predicate::str::contains("type error"));
}

#[test]
fn driver_resumes_after_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mixed.lisp");
    fs::write(&path, "(load \"no-such-file.lisp\")\n(+ 2 3)\n").unwrap();
    tarn()
        .arg(&path)
        .arg("--no-repl")
        .assert()
        .failure()
        .stdout("5\n")
        .stderr(predicate::str::contains("cannot open"));
}

#[test]
fn stray_close_paren_is_reported() {
    tarn()
        .args(["--eval", ")", "--no-repl"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("close parenthesis"));
}

#[test]
fn heap_exhaustion_terminates_the_process() {
    tarn()
        .args([
            "--heap-size",
            "8192",
            "--no-repl",
            "--eval",
            "(define i 0) (define acc ()) \
             (while (< i 100000) (progn (setq i (+ i 1)) (setq acc (cons i acc))))",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("memory exhausted"));
}

#[test]
fn repl_reads_lines_from_stdin() {
    tarn()
        .write_stdin("(define x 21)\n(* x 2)\n")
        .assert()
        .success()
        .stdout("21\n42\n");
}

#[test]
fn missing_script_fails() {
    tarn()
        .arg("does-not-exist.lisp")
        .arg("--no-repl")
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot read"));
}
