//! The S-expression reader.
//!
//! A recursive-descent parser over a [`ByteSource`] with one byte of
//! lookahead. Lists, dotted pairs, the `'` quote sugar, decimal integers,
//! symbols, strings and `;` comments are recognized; symbols are interned
//! immediately on completion. The reader allocates while parsing, so its
//! partial results are kept in root frames throughout.
//!
//! Internally `)` and `.` read as the `CloseParen` and `Dot` sentinels: the
//! list reader consumes them as terminators, and [`Reader::read_expr`]
//! rejects them anywhere else.

use std::cell::Cell;
use std::ptr;

use tarn_gc::letroot;
use tarn_gc::object::{nreverse, tag_of};
use tarn_gc::{Ref, Tag};

use crate::error::{ErrorKind, LispError};
use crate::machine::Machine;
use crate::source::ByteSource;

/// Longest accepted symbol name.
pub const SYMBOL_MAX_LEN: usize = 200;

/// Longest accepted string literal, the size of the reader buffer.
pub const STRING_MAX_LEN: usize = 1024;

/// Non-alphanumeric bytes that may appear in symbols.
const SYMBOL_CHARS: &[u8] = b"~!@#$%^&*-_=+:/?<>";

fn is_symbol_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || SYMBOL_CHARS.contains(&b)
}

fn is_symbol_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || SYMBOL_CHARS.contains(&b)
}

/// Parser state: the machine to allocate into and the byte source.
pub struct Reader<'m, 's> {
    m: &'m mut Machine,
    src: &'s mut dyn ByteSource,
}

impl<'m, 's> Reader<'m, 's> {
    pub fn new(m: &'m mut Machine, src: &'s mut dyn ByteSource) -> Reader<'m, 's> {
        Reader { m, src }
    }

    /// Reads one top-level expression. `Ok(None)` signals end of input; a
    /// stray `)` or `.` is an error at this level.
    pub fn read_expr(&mut self) -> Result<Option<Ref>, LispError> {
        match self.read_any()? {
            None => Ok(None),
            Some(obj) if obj == self.m.cparen() => {
                Err(self.fail(ErrorKind::MalformedToken, "stray close parenthesis"))
            }
            Some(obj) if obj == self.m.dot() => {
                Err(self.fail(ErrorKind::MalformedToken, "stray dot"))
            }
            Some(obj) => Ok(Some(obj)),
        }
    }

    /// Reads the next expression or sentinel, skipping whitespace and
    /// comments.
    fn read_any(&mut self) -> Result<Option<Ref>, LispError> {
        loop {
            let Some(byte) = self.src.next() else {
                return Ok(None);
            };
            match byte {
                b' ' | b'\t' | b'\r' | b'\n' => continue,
                b';' => self.skip_line(),
                b'(' => return self.read_list().map(Some),
                b')' => return Ok(Some(self.m.cparen())),
                b'.' => return Ok(Some(self.m.dot())),
                b'\'' => return self.read_quote().map(Some),
                b'"' => return self.read_string().map(Some),
                b'0'..=b'9' => return self.read_number(false, i64::from(byte - b'0')).map(Some),
                b'-' => {
                    // A minus is a number only when a digit follows.
                    return if self.peek_is_digit() {
                        self.read_number(true, 0).map(Some)
                    } else {
                        self.read_symbol(b'-').map(Some)
                    };
                }
                b if is_symbol_start(b) => return self.read_symbol(b).map(Some),
                b => {
                    return Err(self.fail(
                        ErrorKind::MalformedToken,
                        format!("unexpected character '{}'", b as char),
                    ))
                }
            }
        }
    }

    /// Reads the remainder of a list after `(`. Handles the dotted form
    /// `(a b . c)` by requiring exactly one expression and a `)` after the
    /// dot.
    fn read_list(&mut self) -> Result<Ref, LispError> {
        letroot!(self.m.heap => head = self.m.nil(), item = ptr::null_mut());
        loop {
            let Some(obj) = self.read_any()? else {
                return Err(self.fail(ErrorKind::UnclosedInput, "unclosed parenthesis"));
            };
            if obj == self.m.cparen() {
                return Ok(nreverse(head.get(), self.m.nil()));
            }
            if obj == self.m.dot() {
                if tag_of(head.get()) != Tag::Cell {
                    return Err(self.fail(ErrorKind::MalformedToken, "dotted pair without a head"));
                }
                letroot!(self.m.heap => tail = ptr::null_mut());
                let Some(value) = self.read_any()? else {
                    return Err(self.fail(ErrorKind::UnclosedInput, "end of input after dot"));
                };
                if value == self.m.dot() || value == self.m.cparen() {
                    return Err(self.fail(ErrorKind::MalformedToken, "malformed dotted pair"));
                }
                tail.set(value);
                match self.read_any()? {
                    Some(close) if close == self.m.cparen() => {}
                    Some(_) => {
                        return Err(self.fail(
                            ErrorKind::MalformedToken,
                            "expected close parenthesis after dotted tail",
                        ))
                    }
                    None => {
                        return Err(self.fail(ErrorKind::UnclosedInput, "unclosed dotted pair"))
                    }
                }
                return Ok(nreverse(head.get(), tail.get()));
            }
            item.set(obj);
            let cell = self.m.heap.cons(item, head).map_err(|e| self.m.oom(e))?;
            head.set(cell);
        }
    }

    /// Reads `'expr` as `(quote expr)`.
    fn read_quote(&mut self) -> Result<Ref, LispError> {
        letroot!(self.m.heap => sym = ptr::null_mut(), tmp = ptr::null_mut());
        let s = self.m.intern("quote")?;
        sym.set(s);
        let Some(expr) = self.read_any()? else {
            return Err(self.fail(ErrorKind::UnclosedInput, "end of input after quote"));
        };
        if expr == self.m.dot() || expr == self.m.cparen() {
            return Err(self.fail(ErrorKind::MalformedToken, "malformed quote"));
        }
        tmp.set(expr);
        let nil = Cell::new(self.m.nil());
        let cell = self.m.heap.cons(tmp, &nil).map_err(|e| self.m.oom(e))?;
        tmp.set(cell);
        self.m.heap.cons(sym, tmp).map_err(|e| self.m.oom(e))
    }

    /// Reads the digits of an integer literal. Overflow wraps silently in
    /// two's complement, which also makes the most negative literal read
    /// back exactly.
    fn read_number(&mut self, negative: bool, mut value: i64) -> Result<Ref, LispError> {
        while let Some(b) = self.src.peek() {
            if !b.is_ascii_digit() {
                break;
            }
            self.src.next();
            value = value.wrapping_mul(10).wrapping_add(i64::from(b - b'0'));
        }
        if negative {
            value = value.wrapping_neg();
        }
        self.m.heap.int(value).map_err(|e| self.m.oom(e))
    }

    fn read_symbol(&mut self, first: u8) -> Result<Ref, LispError> {
        let mut name = String::new();
        name.push(first as char);
        while let Some(b) = self.src.peek() {
            if !is_symbol_char(b) {
                break;
            }
            self.src.next();
            if name.len() >= SYMBOL_MAX_LEN {
                return Err(self.fail(ErrorKind::MalformedToken, "symbol name too long"));
            }
            name.push(b as char);
        }
        self.m.intern(&name)
    }

    /// Reads a string literal after the opening `"`. Recognized escapes are
    /// `\n`, `\t` and `\r`; any other escaped byte is taken literally,
    /// which covers `\"` and `\\`.
    fn read_string(&mut self) -> Result<Ref, LispError> {
        let mut buf = Vec::with_capacity(32);
        loop {
            let Some(b) = self.src.next() else {
                return Err(self.fail(ErrorKind::UnclosedInput, "unterminated string literal"));
            };
            match b {
                b'"' => break,
                b'\\' => {
                    let Some(e) = self.src.next() else {
                        return Err(
                            self.fail(ErrorKind::UnclosedInput, "unterminated string literal")
                        );
                    };
                    let c = match e {
                        b'n' => b'\n',
                        b't' => b'\t',
                        b'r' => b'\r',
                        other => other,
                    };
                    buf.push(c);
                }
                _ => buf.push(b),
            }
            if buf.len() > STRING_MAX_LEN {
                return Err(self.fail(ErrorKind::MalformedToken, "string literal too long"));
            }
        }
        self.m.heap.text(Tag::Str, &buf).map_err(|e| self.m.oom(e))
    }

    /// Skips a `;` comment to end of line (`\n`, `\r` or `\r\n`).
    fn skip_line(&mut self) {
        while let Some(b) = self.src.next() {
            match b {
                b'\n' => return,
                b'\r' => {
                    if self.src.peek() == Some(b'\n') {
                        self.src.next();
                    }
                    return;
                }
                _ => {}
            }
        }
    }

    fn peek_is_digit(&mut self) -> bool {
        self.src.peek().is_some_and(|b| b.is_ascii_digit())
    }

    fn fail(&self, kind: ErrorKind, message: impl Into<String>) -> LispError {
        LispError {
            kind,
            message: message.into(),
            file: self.src.name().to_string(),
            line: self.src.line(),
        }
    }
}
