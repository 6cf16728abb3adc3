//! Statement splitter for legacy settings modules
//!
//! The source is cut into logical statements the way the Python tokenizer
//! does it: newlines inside brackets, triple-quoted strings and backslash
//! continuations do not end a statement, `;` does. Each statement keeps its
//! byte span so callers can rewrite the source structurally.

use crate::error::{Error, Result};
use regex::Regex;
use std::ops::Range;

/// A logical statement of the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// Byte range of the statement text, without indentation or trailing comment
    pub span: Range<usize>,
    /// 1-based line the statement starts on
    pub line: usize,
    /// Whether the statement sits inside a block rather than at module level
    pub indented: bool,
}

impl Statement {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.span.clone()]
    }
}

/// Split `source` into logical statements
pub fn split_statements(source: &str) -> Result<Vec<Statement>> {
    let bytes = source.as_bytes();
    let mut statements = Vec::new();
    let mut open_brackets: Vec<(u8, usize)> = Vec::new();

    let mut line = 1;
    let mut line_start = 0;
    let mut line_indented = false;
    let mut line_has_code = false;
    let mut current: Option<(usize, usize, bool)> = None;
    let mut code_end = 0;
    let mut i = 0;

    let mut finish = |current: &mut Option<(usize, usize, bool)>, code_end: usize| {
        if let Some((start, start_line, indented)) = current.take() {
            statements.push(Statement {
                span: start..code_end,
                line: start_line,
                indented,
            });
        }
    };

    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b'\n' => {
                if open_brackets.is_empty() {
                    finish(&mut current, code_end);
                }
                line += 1;
                line_start = i + 1;
                line_has_code = false;
                i += 1;
                continue;
            }
            b' ' | b'\t' | b'\r' | b'\x0c' => {
                i += 1;
                continue;
            }
            b'#' => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                continue;
            }
            b'\\' if bytes[i + 1..].starts_with(b"\n") || bytes[i + 1..].starts_with(b"\r\n") => {
                i += if bytes[i + 1] == b'\r' { 3 } else { 2 };
                line += 1;
                line_start = i;
                continue;
            }
            _ => {}
        }

        if !line_has_code {
            line_has_code = true;
            if current.is_none() {
                line_indented = i > line_start;
            }
        }
        if c == b';' && open_brackets.is_empty() {
            finish(&mut current, code_end);
            i += 1;
            continue;
        }
        if current.is_none() {
            current = Some((i, line, line_indented));
        }

        match c {
            b'\'' | b'"' => {
                let (end, newlines) = skip_string(bytes, i, line)?;
                line += newlines;
                if newlines > 0 {
                    line_start = source[..end].rfind('\n').map_or(0, |p| p + 1);
                }
                i = end;
            }
            b'(' | b'[' | b'{' => {
                open_brackets.push((c, line));
                i += 1;
            }
            b')' | b']' | b'}' => {
                let expected = match c {
                    b')' => b'(',
                    b']' => b'[',
                    _ => b'{',
                };
                match open_brackets.pop() {
                    Some((open, _)) if open == expected => {}
                    _ => {
                        return Err(Error::Parse {
                            line,
                            message: format!("unmatched '{}'", c as char),
                        })
                    }
                }
                i += 1;
            }
            _ => {
                i += 1;
            }
        }
        code_end = i;
    }

    if let Some((open, open_line)) = open_brackets.last() {
        return Err(Error::Parse {
            line: *open_line,
            message: format!("'{}' was never closed", *open as char),
        });
    }
    finish(&mut current, code_end);
    Ok(statements)
}

/// Skip a string literal starting at the quote at `start`. Returns the byte
/// offset after the closing quote and the number of newlines crossed.
fn skip_string(bytes: &[u8], start: usize, line: usize) -> Result<(usize, usize)> {
    let quote = bytes[start];
    let triple = bytes[start..].starts_with(&[quote, quote, quote]);
    let mut i = start + if triple { 3 } else { 1 };
    let mut newlines = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                if bytes[i + 1..].starts_with(b"\n") {
                    newlines += 1;
                } else if bytes[i + 1..].starts_with(b"\r\n") {
                    newlines += 1;
                    i += 1;
                }
                i += 2;
            }
            b'\n' if !triple => break,
            b'\n' => {
                newlines += 1;
                i += 1;
            }
            q if q == quote => {
                if !triple {
                    return Ok((i + 1, newlines));
                }
                if bytes[i..].starts_with(&[quote, quote, quote]) {
                    return Ok((i + 3, newlines));
                }
                i += 1;
            }
            _ => i += 1,
        }
    }

    Err(Error::Parse {
        line,
        message: if triple {
            "unterminated triple-quoted string literal".to_string()
        } else {
            "unterminated string literal".to_string()
        },
    })
}

/// What a statement does to the namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementKind<'a> {
    /// `A = expression`, `A = B = expression`, `A, B = expression` or
    /// `NAME: annotation = expression`
    Assign {
        targets: Vec<Target<'a>>,
        expression: &'a str,
    },
    /// `NAME += expression` and the other augmented operators
    AugAssign { name: &'a str },
    /// `import ...` or `from ... import ...`
    Import(Import),
    /// `del NAME, ...`
    Delete(Vec<&'a str>),
    /// Header of an `if`, `for`, `try`, `def`, ... block
    Compound(Compound<'a>),
    /// Anything else: expressions, calls, `pass`
    Other,
}

/// One `=` separated target of an assignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target<'a> {
    /// `NAME`
    Name(&'a str),
    /// `A, B` or `(A, B)`, one name per item of the assigned sequence
    Unpack(Vec<&'a str>),
    /// Starred, nested, attribute or subscript targets. The listed names
    /// are bound to values that are not known without running code.
    Other(Vec<&'a str>),
}

impl<'a> Target<'a> {
    /// Every name the target binds
    pub fn names(&self) -> Vec<&'a str> {
        match self {
            Target::Name(name) => vec![*name],
            Target::Unpack(names) | Target::Other(names) => names.clone(),
        }
    }
}

/// The header of a compound statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compound<'a> {
    /// `def` and `class` bodies bind names in their own scope
    pub opens_scope: bool,
    /// Target of a `for` loop
    pub loop_target: Option<Target<'a>>,
    /// Statement after the colon on the header line (`if X: A = 1`)
    pub body: Option<&'a str>,
}

/// A parsed import statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    /// Module of a `from X import ...` statement
    pub from: Option<String>,
    /// Imported names, aliases dropped
    pub names: Vec<String>,
}

impl Import {
    /// Whether this statement imports `module` or names from it
    pub fn references(&self, module: &str) -> bool {
        match &self.from {
            Some(from) => {
                from == module
                    || self
                        .names
                        .iter()
                        .any(|name| format!("{}.{}", from, name) == module)
            }
            None => self.names.iter().any(|name| name == module),
        }
    }

    pub fn is_star(&self) -> bool {
        self.names.iter().any(|name| name == "*")
    }
}

const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield",
];

/// Bytes that turn a following `=` into part of another operator
const OPERATOR_PREFIXES: &[u8] = b"=!<>:+-*/%@&^|";

/// Classifies statement text into [`StatementKind`]
pub struct StatementClassifier {
    aug_assign: Regex,
    import_from: Regex,
    import: Regex,
    delete: Regex,
    compound: Regex,
    loop_target: Regex,
    reference: Regex,
}

impl StatementClassifier {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| Error::Internal(format!("invalid statement pattern {pattern}: {e}")))
        };
        Ok(Self {
            aug_assign: compile(
                r"^([A-Za-z_][A-Za-z0-9_]*)\s*(?:\*\*|//|>>|<<|[-+*/%@&^|])=",
            )?,
            import_from: compile(r"(?s)^from\s+(\S+)\s+import\s+(.+)$")?,
            import: compile(r"(?s)^import\s+(.+)$")?,
            delete: compile(r"(?s)^del\s+(.+)$")?,
            compound: compile(
                r"^(?:async\s+)?(if|elif|else|while|for|try|except|finally|with|def|class)\b",
            )?,
            loop_target: compile(r"(?s)^(?:async\s+)?for\s+(.+?)\s+in\b")?,
            reference: compile(
                r"(?s)^[A-Za-z_][A-Za-z0-9_]*(?:\s*\.\s*[A-Za-z_][A-Za-z0-9_]*|\s*\[.*\])+$",
            )?,
        })
    }

    pub fn classify<'a>(&self, text: &'a str) -> StatementKind<'a> {
        if let Some(caps) = self.import_from.captures(text) {
            return StatementKind::Import(Import {
                from: Some(caps[1].to_string()),
                names: import_names(&caps[2]),
            });
        }
        if let Some(caps) = self.import.captures(text) {
            return StatementKind::Import(Import {
                from: None,
                names: import_names(&caps[1]),
            });
        }
        if let Some(caps) = self.delete.captures(text) {
            let names = caps
                .get(1)
                .map(|m| m.as_str())
                .unwrap_or_default()
                .split(',')
                .map(|name| name.trim().trim_matches(|c: char| c == '(' || c == ')').trim())
                .filter(|name| is_identifier(name))
                .collect();
            return StatementKind::Delete(names);
        }
        if let Some(caps) = self.compound.captures(text) {
            let keyword = caps.get(1).map_or("", |m| m.as_str());
            let body = top_level_bytes(text)
                .into_iter()
                .find(|&(_, c)| c == b':')
                .map(|(offset, _)| text[offset + 1..].trim())
                .filter(|body| !body.is_empty());
            let loop_target = self
                .loop_target
                .captures(text)
                .and_then(|caps| caps.get(1))
                .and_then(|m| self.target(m.as_str()));
            return StatementKind::Compound(Compound {
                opens_scope: matches!(keyword, "def" | "class"),
                loop_target,
                body,
            });
        }
        if let Some(caps) = self.aug_assign.captures(text) {
            if let Some(name) = caps.get(1).map(|m| m.as_str()) {
                if !KEYWORDS.contains(&name) {
                    return StatementKind::AugAssign { name };
                }
            }
        }
        self.assignment(text).unwrap_or(StatementKind::Other)
    }

    /// Split `text` at its top-level `=` signs. Every segment but the last
    /// must be a valid target; the first invalid one starts the expression,
    /// as in `F = lambda x=1: x`.
    fn assignment<'a>(&self, text: &'a str) -> Option<StatementKind<'a>> {
        let bytes = text.as_bytes();
        let mut targets = Vec::new();
        let mut start = 0;

        for (offset, c) in top_level_bytes(text) {
            if c != b'=' || bytes.get(offset + 1) == Some(&b'=') {
                continue;
            }
            if offset > 0 && OPERATOR_PREFIXES.contains(&bytes[offset - 1]) {
                continue;
            }
            let mut segment = &text[start..offset];
            if targets.is_empty() {
                // `NAME: annotation = value`
                if let Some((colon, _)) = top_level_bytes(segment)
                    .into_iter()
                    .find(|&(_, c)| c == b':')
                {
                    segment = &segment[..colon];
                }
            }
            match self.target(segment) {
                Some(target) => {
                    targets.push(target);
                    start = offset + 1;
                }
                None => break,
            }
        }

        if targets.is_empty() {
            return None;
        }
        Some(StatementKind::Assign {
            targets,
            expression: text[start..].trim(),
        })
    }

    fn target<'a>(&self, text: &'a str) -> Option<Target<'a>> {
        let text = text.trim();
        if is_name(text) {
            return Some(Target::Name(text));
        }

        let wrapped = unwrap_brackets(text);
        let (items, trailing_comma) = split_items(wrapped.unwrap_or(text));
        if items.len() == 1 && !trailing_comma {
            match wrapped {
                None => {
                    return self
                        .reference
                        .is_match(text)
                        .then_some(Target::Other(Vec::new()))
                }
                Some(inner) if text.starts_with('(') => return self.target(inner),
                // `[A] = [value]` unpacks a single item
                Some(_) => {}
            }
        }
        if items.is_empty() {
            return None;
        }

        let mut names = Vec::new();
        let mut plain = true;
        for item in items {
            if is_name(item) {
                names.push(item);
                continue;
            }
            plain = false;
            let nested = item.strip_prefix('*').map_or(item, str::trim);
            names.extend(self.target(nested)?.names());
        }
        Some(if plain {
            Target::Unpack(names)
        } else {
            Target::Other(names)
        })
    }
}

/// Offsets and bytes of `text` outside strings, comments and brackets.
/// Outermost brackets themselves are included.
fn top_level_bytes(text: &str) -> Vec<(usize, u8)> {
    let bytes = text.as_bytes();
    let mut found = Vec::new();
    let mut depth = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b'\'' | b'"' => {
                i = skip_string(bytes, i, 0).map_or(bytes.len(), |(end, _)| end);
                continue;
            }
            b'#' => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                continue;
            }
            b'(' | b'[' | b'{' => {
                if depth == 0 {
                    found.push((i, c));
                }
                depth += 1;
            }
            b')' | b']' | b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    found.push((i, c));
                }
            }
            _ if depth == 0 => found.push((i, c)),
            _ => {}
        }
        i += 1;
    }
    found
}

/// Contents of `text` when one pair of brackets encloses all of it
fn unwrap_brackets(text: &str) -> Option<&str> {
    if !(text.starts_with('(') || text.starts_with('[')) {
        return None;
    }
    match top_level_bytes(text).as_slice() {
        [_, (close, _)] if *close == text.len() - 1 => Some(&text[1..*close]),
        _ => None,
    }
}

/// Top-level comma separated items, and whether a comma trails the last one
fn split_items(text: &str) -> (Vec<&str>, bool) {
    let mut items = Vec::new();
    let mut start = 0;
    for (offset, c) in top_level_bytes(text) {
        if c == b',' {
            items.push(text[start..offset].trim());
            start = offset + 1;
        }
    }
    let last = text[start..].trim();
    let trailing_comma = last.is_empty() && !items.is_empty();
    if !last.is_empty() {
        items.push(last);
    }
    (items, trailing_comma)
}

fn import_names(list: &str) -> Vec<String> {
    list.lines()
        .map(|line| line.split('#').next().unwrap_or_default())
        .collect::<Vec<_>>()
        .join(" ")
        .replace(['(', ')', '\\'], " ")
        .split(',')
        .filter_map(|item| item.split_whitespace().next())
        .map(str::to_string)
        .collect()
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_name(text: &str) -> bool {
    is_identifier(text) && !KEYWORDS.contains(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(source: &str) -> Vec<&str> {
        split_statements(source)
            .unwrap()
            .iter()
            .map(|s| s.text(source))
            .collect()
    }

    #[test]
    fn test_split_simple_lines() {
        let source = "A = 1\n\nB = 'two'  # trailing comment\n# only a comment\n";
        assert_eq!(texts(source), vec!["A = 1", "B = 'two'"]);
    }

    #[test]
    fn test_split_tracks_lines_and_indent() {
        let source = "A = 1\nif DEBUG:\n    B = 2\nC = 3\n";
        let statements = split_statements(source).unwrap();
        assert_eq!(statements.len(), 4);
        assert_eq!(statements[2].line, 3);
        assert!(statements[2].indented);
        assert!(!statements[3].indented);
        assert_eq!(statements[3].line, 4);
    }

    #[test]
    fn test_split_multiline_brackets() {
        let source = "APPS = [\n    'a',  # first\n    'b',\n]\nNEXT = 1\n";
        let statements = split_statements(source).unwrap();
        assert_eq!(statements.len(), 2);
        assert!(statements[0].text(source).starts_with("APPS = ["));
        assert!(statements[0].text(source).ends_with(']'));
        assert_eq!(statements[1].line, 5);
    }

    #[test]
    fn test_split_triple_quoted_string() {
        let source = "DOC = \"\"\"\nSECRET_KEY = 'fake'\n\"\"\"\nSECRET_KEY = 'real'\n";
        let statements = split_statements(source).unwrap();
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[1].text(source), "SECRET_KEY = 'real'");
        assert_eq!(statements[1].line, 4);
    }

    #[test]
    fn test_split_semicolons_and_continuations() {
        let source = "A = 1; B = 2\nC = \\\n    3\n";
        assert_eq!(texts(source), vec!["A = 1", "B = 2", "C = \\\n    3"]);
    }

    #[test]
    fn test_split_hash_inside_string() {
        let source = "COLOR = '#fff'  # white\n";
        assert_eq!(texts(source), vec!["COLOR = '#fff'"]);
    }

    #[test]
    fn test_split_unterminated_string() {
        let err = split_statements("A = 1\nB = 'oops\n").unwrap_err();
        match err {
            Error::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_split_unclosed_bracket() {
        let err = split_statements("A = [\n  1,\n").unwrap_err();
        match err {
            Error::Parse { line, message } => {
                assert_eq!(line, 1);
                assert!(message.contains("never closed"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_split_unmatched_bracket() {
        assert!(matches!(
            split_statements("A = (1]\n"),
            Err(Error::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn test_classify_assignments() {
        let classifier = StatementClassifier::new().unwrap();
        assert_eq!(
            classifier.classify("SECRET_KEY = 'abc'"),
            StatementKind::Assign {
                targets: vec![Target::Name("SECRET_KEY")],
                expression: "'abc'"
            }
        );
        assert_eq!(
            classifier.classify("DEBUG: bool = False"),
            StatementKind::Assign {
                targets: vec![Target::Name("DEBUG")],
                expression: "False"
            }
        );
        assert_eq!(
            classifier.classify("JITSI_DOMAIN = 'a=b'"),
            StatementKind::Assign {
                targets: vec![Target::Name("JITSI_DOMAIN")],
                expression: "'a=b'"
            }
        );
        assert_eq!(
            classifier.classify("COUNT += 1"),
            StatementKind::AugAssign { name: "COUNT" }
        );
        assert_eq!(classifier.classify("DEBUG == True"), StatementKind::Other);
        assert_eq!(classifier.classify("print('x', sep='')"), StatementKind::Other);
    }

    #[test]
    fn test_classify_assignment_targets() {
        let classifier = StatementClassifier::new().unwrap();
        assert_eq!(
            classifier.classify("DEFAULT = ENABLE_SAML = True"),
            StatementKind::Assign {
                targets: vec![Target::Name("DEFAULT"), Target::Name("ENABLE_SAML")],
                expression: "True"
            }
        );
        assert_eq!(
            classifier.classify("JITSI_ROOM_NAME, JITSI_ROOM_PASSWORD = 'plenum', 'pw'"),
            StatementKind::Assign {
                targets: vec![Target::Unpack(vec!["JITSI_ROOM_NAME", "JITSI_ROOM_PASSWORD"])],
                expression: "'plenum', 'pw'"
            }
        );
        assert_eq!(
            classifier.classify("(A, *REST) = ITEMS"),
            StatementKind::Assign {
                targets: vec![Target::Other(vec!["A", "REST"])],
                expression: "ITEMS"
            }
        );
        assert_eq!(
            classifier.classify("obj.attr = CACHE['k'] = 1"),
            StatementKind::Assign {
                targets: vec![Target::Other(vec![]), Target::Other(vec![])],
                expression: "1"
            }
        );
        assert_eq!(
            classifier.classify("HANDLER = lambda x=1: x"),
            StatementKind::Assign {
                targets: vec![Target::Name("HANDLER")],
                expression: "lambda x=1: x"
            }
        );
    }

    #[test]
    fn test_classify_compound_headers() {
        let classifier = StatementClassifier::new().unwrap();
        assert_eq!(
            classifier.classify("if DEBUG: SECRET_KEY = 'dev'"),
            StatementKind::Compound(Compound {
                opens_scope: false,
                loop_target: None,
                body: Some("SECRET_KEY = 'dev'"),
            })
        );
        assert_eq!(
            classifier.classify("else:"),
            StatementKind::Compound(Compound {
                opens_scope: false,
                loop_target: None,
                body: None,
            })
        );
        assert_eq!(
            classifier.classify("def build(options: dict) -> dict:"),
            StatementKind::Compound(Compound {
                opens_scope: true,
                loop_target: None,
                body: None,
            })
        );
        assert_eq!(
            classifier.classify("for JITSI_DOMAIN in DOMAINS:"),
            StatementKind::Compound(Compound {
                opens_scope: false,
                loop_target: Some(Target::Name("JITSI_DOMAIN")),
                body: None,
            })
        );
        assert!(matches!(
            classifier.classify("if_enabled = True"),
            StatementKind::Assign { .. }
        ));
    }

    #[test]
    fn test_classify_imports() {
        let classifier = StatementClassifier::new().unwrap();
        let StatementKind::Import(star) =
            classifier.classify("from openslides.global_settings import *")
        else {
            panic!("expected import");
        };
        assert!(star.is_star());
        assert!(star.references("openslides.global_settings"));

        let StatementKind::Import(submodule) =
            classifier.classify("from openslides import global_settings as base")
        else {
            panic!("expected import");
        };
        assert!(submodule.references("openslides.global_settings"));

        let StatementKind::Import(plain) =
            classifier.classify("import os, openslides.global_settings")
        else {
            panic!("expected import");
        };
        assert!(plain.references("openslides.global_settings"));

        let StatementKind::Import(other) =
            classifier.classify("from openslides.utils import (\n    a,  # note\n    b,\n)")
        else {
            panic!("expected import");
        };
        assert_eq!(other.names, vec!["a", "b"]);
        assert!(!other.references("openslides.global_settings"));
    }

    #[test]
    fn test_classify_delete() {
        let classifier = StatementClassifier::new().unwrap();
        assert_eq!(
            classifier.classify("del JITSI_DOMAIN, ENABLE_SAML"),
            StatementKind::Delete(vec!["JITSI_DOMAIN", "ENABLE_SAML"])
        );
    }
}
