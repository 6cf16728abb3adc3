//! Literal values of a legacy settings module
//!
//! Only a small, side-effect free subset of Python expressions is
//! understood: strings, booleans, `None`, integers, floats and
//! lists/tuples of those. Anything else is left to the caller to treat as
//! an opaque expression.
//!
//! [`SettingValue`]'s `Display` renders a value the way Python's `str()`
//! does, which is the representation written to the output files.

use std::fmt;

/// A literal value bound at module level
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Str(String),
    Bool(bool),
    None,
    Int(i128),
    Float(f64),
    List(Vec<SettingValue>),
    Tuple(Vec<SettingValue>),
}

impl SettingValue {
    /// Evaluate an expression, returning `None` when it is not a literal
    pub fn evaluate(expression: &str) -> Option<SettingValue> {
        let mut scanner = Scanner::new(expression);
        let first = scanner.value()?;
        scanner.skip_trivia();
        if scanner.at_end() {
            return Some(first);
        }

        // `'a', 'b'` is a tuple without parentheses
        let mut items = vec![first];
        while scanner.eat(',') {
            scanner.skip_trivia();
            if scanner.at_end() {
                break;
            }
            items.push(scanner.value()?);
            scanner.skip_trivia();
        }
        scanner.at_end().then_some(SettingValue::Tuple(items))
    }

    /// Python `repr()` of the value, used for container elements
    pub fn repr(&self) -> String {
        match self {
            SettingValue::Str(text) => repr_str(text),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Str(text) => f.write_str(text),
            SettingValue::Bool(true) => f.write_str("True"),
            SettingValue::Bool(false) => f.write_str("False"),
            SettingValue::None => f.write_str("None"),
            SettingValue::Int(n) => write!(f, "{}", n),
            SettingValue::Float(x) => f.write_str(&format_float(*x)),
            SettingValue::List(items) => write!(f, "[{}]", join_repr(items)),
            SettingValue::Tuple(items) if items.len() == 1 => {
                write!(f, "({},)", items[0].repr())
            }
            SettingValue::Tuple(items) => write!(f, "({})", join_repr(items)),
        }
    }
}

fn join_repr(items: &[SettingValue]) -> String {
    items
        .iter()
        .map(SettingValue::repr)
        .collect::<Vec<_>>()
        .join(", ")
}

fn repr_str(text: &str) -> String {
    let quote = if text.contains('\'') && !text.contains('"') {
        '"'
    } else {
        '\''
    };

    let mut out = String::with_capacity(text.len() + 2);
    out.push(quote);
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

fn format_float(x: f64) -> String {
    if x.is_nan() {
        return "nan".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let abs = x.abs();
    if abs != 0.0 && !(1e-4..1e16).contains(&abs) {
        // Scientific notation with a signed, two-digit exponent: 1e+16, 2.5e-05
        let formatted = format!("{:e}", x);
        if let Some((mantissa, exponent)) = formatted.split_once('e') {
            if let Ok(exponent) = exponent.parse::<i32>() {
                let sign = if exponent < 0 { '-' } else { '+' };
                return format!("{}e{}{:02}", mantissa, sign, exponent.abs());
            }
        }
        return formatted;
    }

    let formatted = format!("{}", x);
    if formatted.contains('.') {
        formatted
    } else {
        format!("{}.0", formatted)
    }
}

/// Recursive-descent scanner over a single expression
struct Scanner<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    /// Skip whitespace, newlines, comments and line continuations
    fn skip_trivia(&mut self) {
        while let Some(ch) = self.peek() {
            match ch {
                ' ' | '\t' | '\n' | '\r' | '\x0c' => {
                    self.pos += 1;
                }
                '\\' if self.rest()[1..].starts_with('\n')
                    || self.rest()[1..].starts_with("\r\n") =>
                {
                    self.pos += 1;
                }
                '#' => match self.rest().find('\n') {
                    Some(offset) => self.pos += offset,
                    None => self.pos = self.src.len(),
                },
                _ => break,
            }
        }
    }

    fn value(&mut self) -> Option<SettingValue> {
        self.skip_trivia();
        match self.peek()? {
            '[' => {
                self.bump();
                let (items, _) = self.sequence(']')?;
                Some(SettingValue::List(items))
            }
            '(' => {
                self.bump();
                let (mut items, trailing_comma) = self.sequence(')')?;
                if items.len() == 1 && !trailing_comma {
                    items.pop()
                } else {
                    Some(SettingValue::Tuple(items))
                }
            }
            '-' | '+' => {
                let negative = self.bump()? == '-';
                self.skip_trivia();
                match self.number()? {
                    SettingValue::Int(n) if negative => Some(SettingValue::Int(-n)),
                    SettingValue::Float(x) if negative => Some(SettingValue::Float(-x)),
                    other => Some(other),
                }
            }
            c if c.is_ascii_digit() => self.number(),
            '.' if self.rest()[1..].starts_with(|c: char| c.is_ascii_digit()) => self.number(),
            '\'' | '"' => self.strings(),
            c if c.is_ascii_alphabetic() || c == '_' => {
                if self.string_prefix().is_some() {
                    return self.strings();
                }
                let word = self.identifier();
                match word {
                    "True" => Some(SettingValue::Bool(true)),
                    "False" => Some(SettingValue::Bool(false)),
                    "None" => Some(SettingValue::None),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Comma separated items up to `close`. Returns the items and whether
    /// the last one was followed by a comma.
    fn sequence(&mut self, close: char) -> Option<(Vec<SettingValue>, bool)> {
        let mut items = Vec::new();
        let mut trailing_comma = false;
        loop {
            self.skip_trivia();
            if self.eat(close) {
                return Some((items, trailing_comma));
            }
            items.push(self.value()?);
            self.skip_trivia();
            if self.eat(',') {
                trailing_comma = true;
            } else if self.eat(close) {
                return Some((items, false));
            } else {
                return None;
            }
        }
    }

    fn identifier(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                self.pos += ch.len_utf8();
            } else {
                break;
            }
        }
        &self.src[start..self.pos]
    }

    /// Length of a string prefix (`r`, `u`, `b`, `f`, `rb`, ...) directly
    /// followed by a quote
    fn string_prefix(&self) -> Option<usize> {
        let rest = self.rest();
        let len = rest
            .chars()
            .take_while(|c| matches!(c, 'r' | 'R' | 'u' | 'U' | 'b' | 'B' | 'f' | 'F'))
            .count();
        if (1..=2).contains(&len) && rest[len..].starts_with(['\'', '"']) {
            Some(len)
        } else {
            None
        }
    }

    /// One or more adjacent string literals, concatenated
    fn strings(&mut self) -> Option<SettingValue> {
        let mut out = self.string()?;
        loop {
            let checkpoint = self.pos;
            self.skip_trivia();
            let next_is_string = matches!(self.peek(), Some('\'' | '"'))
                || self.string_prefix().is_some();
            if !next_is_string {
                self.pos = checkpoint;
                return Some(SettingValue::Str(out));
            }
            out.push_str(&self.string()?);
        }
    }

    fn string(&mut self) -> Option<String> {
        let prefix_len = self.string_prefix().unwrap_or(0);
        let prefix = &self.rest()[..prefix_len];
        // Bytes and f-strings do not evaluate to plain text without running code
        if prefix.contains(['b', 'B', 'f', 'F']) {
            return None;
        }
        let raw = prefix.contains(['r', 'R']);
        self.pos += prefix_len;

        let quote = self.bump()?;
        let triple = self.rest().starts_with(&format!("{0}{0}", quote));
        if triple {
            self.pos += 2;
        }

        let mut out = String::new();
        loop {
            let ch = self.bump()?;
            if ch == quote {
                if !triple {
                    return Some(out);
                }
                if self.rest().starts_with(&format!("{0}{0}", quote)) {
                    self.pos += 2;
                    return Some(out);
                }
                out.push(ch);
                continue;
            }
            match ch {
                '\n' if !triple => return None,
                '\\' if raw => {
                    out.push('\\');
                    if let Some(next) = self.bump() {
                        out.push(next);
                    }
                }
                '\\' => self.escape(&mut out)?,
                _ => out.push(ch),
            }
        }
    }

    fn escape(&mut self, out: &mut String) -> Option<()> {
        let ch = self.bump()?;
        match ch {
            '\n' => {}
            '\r' => {
                self.eat('\n');
            }
            '\\' | '\'' | '"' => out.push(ch),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\x0b'),
            '0'..='7' => {
                let mut code = ch.to_digit(8)?;
                for _ in 0..2 {
                    match self.peek().and_then(|c| c.to_digit(8)) {
                        Some(digit) => {
                            code = code * 8 + digit;
                            self.bump();
                        }
                        None => break,
                    }
                }
                out.push(char::from_u32(code)?);
            }
            'x' => out.push(self.hex_escape(2)?),
            'u' => out.push(self.hex_escape(4)?),
            'U' => out.push(self.hex_escape(8)?),
            // \N{NAME} needs the unicode name database
            'N' => return None,
            other => {
                out.push('\\');
                out.push(other);
            }
        }
        Some(())
    }

    fn hex_escape(&mut self, digits: usize) -> Option<char> {
        let hex = self.rest().get(..digits)?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        self.pos += digits;
        char::from_u32(u32::from_str_radix(hex, 16).ok()?)
    }

    fn number(&mut self) -> Option<SettingValue> {
        let start = self.pos;
        let mut previous = '\0';
        while let Some(ch) = self.peek() {
            let exponent_sign =
                matches!(ch, '+' | '-') && matches!(previous, 'e' | 'E') && !self.is_radix(start);
            if ch.is_ascii_alphanumeric() || ch == '_' || ch == '.' || exponent_sign {
                previous = ch;
                self.pos += 1;
            } else {
                break;
            }
        }

        let literal: String = self.src[start..self.pos]
            .chars()
            .filter(|c| *c != '_')
            .collect();
        let lower = literal.to_ascii_lowercase();

        for (prefix, radix) in [("0x", 16), ("0o", 8), ("0b", 2)] {
            if let Some(digits) = lower.strip_prefix(prefix) {
                return i128::from_str_radix(digits, radix)
                    .ok()
                    .map(SettingValue::Int);
            }
        }

        // Complex literals have no plain-text equivalent
        if lower.ends_with('j') {
            return None;
        }

        if lower.contains(['.', 'e']) {
            return lower.parse::<f64>().ok().map(SettingValue::Float);
        }

        if lower.len() > 1 && lower.starts_with('0') && lower.chars().any(|c| c != '0') {
            return None;
        }
        lower.parse::<i128>().ok().map(SettingValue::Int)
    }

    fn is_radix(&self, start: usize) -> bool {
        let literal = &self.src[start..self.pos];
        literal.len() >= 2
            && literal.starts_with('0')
            && matches!(&literal[1..2], "x" | "X" | "o" | "O" | "b" | "B")
    }
}
