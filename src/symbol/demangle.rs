// Tue Jan 13 2026 - Alex

use itertools::Itertools;
use std::collections::VecDeque;

/// Turns a decorated symbol into a readable type name.
pub trait SymbolDemangler: Send + Sync {
    fn demangle(&self, mangled: &str) -> Option<String>;
}

/// Name-only MSVC undecoration: `?Inner@Outer@@` becomes `Outer::Inner`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsvcDemangler;

impl SymbolDemangler for MsvcDemangler {
    fn demangle(&self, mangled: &str) -> Option<String> {
        demangle_msvc(mangled)
    }
}

pub fn demangle_msvc(mangled: &str) -> Option<String> {
    let body = mangled.strip_prefix('?')?;
    let mut parser = MsvcParser::new(body);
    let name = parser.parse_qualified_name()?;
    Some(name)
}

struct MsvcParser<'a> {
    input: &'a [u8],
    pos: usize,
    backrefs: Vec<String>,
}

impl<'a> MsvcParser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            pos: 0,
            backrefs: Vec::new(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.input.get(self.pos + ahead).copied()
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn remember(&mut self, name: &str) {
        if self.backrefs.len() < 10 && !self.backrefs.iter().any(|n| n == name) {
            self.backrefs.push(name.to_string());
        }
    }

    /// Fragments innermost-first, terminated by `@`; joined outermost-first.
    fn parse_qualified_name(&mut self) -> Option<String> {
        let mut parts = VecDeque::new();

        loop {
            match self.peek()? {
                b'@' => {
                    self.advance();
                    break;
                }
                b'0'..=b'9' => {
                    let index = (self.peek()? - b'0') as usize;
                    self.advance();
                    parts.push_front(self.backrefs.get(index)?.clone());
                }
                b'?' if self.peek_at(1) == Some(b'$') => {
                    self.pos += 2;
                    let template = self.parse_template_name()?;
                    self.remember(&template);
                    parts.push_front(template);
                }
                b'?' => {
                    self.advance();
                    parts.push_front(self.parse_special_name()?);
                }
                _ => {
                    let name = self.parse_simple_name()?;
                    self.remember(&name);
                    parts.push_front(name);
                }
            }
        }

        if parts.is_empty() {
            None
        } else {
            Some(parts.into_iter().join("::"))
        }
    }

    /// Reads up to and consumes the next `@`.
    fn parse_simple_name(&mut self) -> Option<String> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == b'@' {
                let name = std::str::from_utf8(&self.input[start..self.pos]).ok()?.to_string();
                self.advance();
                return if name.is_empty() { None } else { Some(name) };
            }
            self.advance();
        }
        None
    }

    fn parse_template_name(&mut self) -> Option<String> {
        let outer = std::mem::take(&mut self.backrefs);
        let name = self.parse_simple_name();
        if let Some(ref n) = name {
            self.remember(n);
        }
        let mut args = Vec::new();
        let ok = loop {
            match self.peek() {
                Some(b'@') => {
                    self.advance();
                    break true;
                }
                Some(_) => match self.parse_type() {
                    Some(arg) => args.push(arg),
                    None => break false,
                },
                None => break false,
            }
        };
        self.backrefs = outer;

        if !ok {
            return None;
        }
        Some(format!("{}<{}>", name?, args.join(", ")))
    }

    fn parse_type(&mut self) -> Option<String> {
        let code = self.peek()?;
        self.advance();
        let primitive = match code {
            b'C' => "signed char",
            b'D' => "char",
            b'E' => "unsigned char",
            b'F' => "short",
            b'G' => "unsigned short",
            b'H' => "int",
            b'I' => "unsigned int",
            b'J' => "long",
            b'K' => "unsigned long",
            b'M' => "float",
            b'N' => "double",
            b'O' => "long double",
            b'X' => "void",
            b'_' => {
                let extended = self.peek()?;
                self.advance();
                match extended {
                    b'J' => "__int64",
                    b'K' => "unsigned __int64",
                    b'N' => "bool",
                    b'W' => "wchar_t",
                    _ => return None,
                }
            }
            b'V' => return Some(format!("class {}", self.parse_qualified_name()?)),
            b'U' => return Some(format!("struct {}", self.parse_qualified_name()?)),
            b'W' => {
                // W4 = enum with int underlying type
                self.advance();
                return Some(format!("enum {}", self.parse_qualified_name()?));
            }
            b'$' if self.peek() == Some(b'0') => {
                self.advance();
                return self.parse_number().map(|n| n.to_string());
            }
            _ => return None,
        };
        Some(primitive.to_string())
    }

    fn parse_number(&mut self) -> Option<i64> {
        let negative = self.peek() == Some(b'?');
        if negative {
            self.advance();
        }
        let c = self.peek()?;
        let value = match c {
            b'0'..=b'9' => {
                self.advance();
                (c - b'0') as i64 + 1
            }
            _ => {
                let mut value: i64 = 0;
                loop {
                    let digit = self.peek()?;
                    self.advance();
                    match digit {
                        b'A'..=b'P' => value = value * 16 + (digit - b'A') as i64,
                        b'@' => break,
                        _ => return None,
                    }
                }
                value
            }
        };
        Some(if negative { -value } else { value })
    }

    fn parse_special_name(&mut self) -> Option<String> {
        let c = self.peek()?;
        self.advance();

        let name = match c {
            b'0' => "{ctor}",
            b'1' => "{dtor}",
            b'2' => "operator new",
            b'3' => "operator delete",
            b'4' => "operator=",
            b'5' => "operator>>",
            b'6' => "operator<<",
            b'7' => "operator!",
            b'8' => "operator==",
            b'9' => "operator!=",
            b'A' => "operator[]",
            b'C' => "operator->",
            b'D' => "operator*",
            b'E' => "operator++",
            b'F' => "operator--",
            b'G' => "operator-",
            b'H' => "operator+",
            _ => return None,
        };
        Some(name.to_string())
    }
}
