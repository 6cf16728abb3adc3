//! Legacy settings module loading
//!
//! A legacy settings file is a Python module. Instead of executing it, the
//! loader walks its statements and records the module-level bindings made by
//! assignments. Right-hand sides outside the literal subset understood by
//! [`SettingValue`] are kept as opaque expression text. Names assigned inside
//! `if`/`for`/`try` blocks are marked conditional, since their value depends
//! on code that never runs here. Function and class bodies are skipped.

pub mod parser;
pub mod sanitize;
pub mod value;

pub use parser::StatementClassifier;
pub use sanitize::sanitize;
pub use value::SettingValue;

use crate::error::Result;
use parser::{split_statements, Compound, StatementKind, Target};
use std::collections::HashMap;

/// What a module-level name is bound to
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    /// A literal value
    Value(SettingValue),
    /// An expression that cannot be evaluated without running code
    Opaque(String),
    /// Assigned inside a block that may or may not run
    Conditional,
}

/// A binding and the line that made it
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub binding: Binding,
    pub line: usize,
}

/// Where a statement runs relative to the module namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Module,
    /// Body of an `if`, `for`, `try`, ... block at module level
    Conditional,
    /// Body of a `def` or `class`
    Local,
}

/// Module-level names defined by a settings module
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    entries: HashMap<String, Entry>,
}

impl Namespace {
    /// Load the namespace defined by `source`
    pub fn load(source: &str, classifier: &StatementClassifier) -> Result<Self> {
        let mut namespace = Self::default();
        // Scope of the indented block opened by the last module-level header
        let mut block = Scope::Conditional;
        // Line and scope of a header with an inline body, `if X: A = 1; B = 2`
        let mut inline: Option<(usize, Scope)> = None;

        for statement in split_statements(source)? {
            let text = statement.text(source);
            let kind = classifier.classify(text);
            let scope = match inline {
                Some((line, scope)) if line == statement.line => scope,
                _ if statement.indented => block,
                _ => Scope::Module,
            };

            match scope {
                Scope::Local => {}
                Scope::Conditional => {
                    for name in bound_names(&kind, classifier) {
                        namespace.bind(name, Binding::Conditional, statement.line);
                    }
                }
                Scope::Module => match kind {
                    StatementKind::Assign {
                        targets,
                        expression,
                    } => namespace.assign(&targets, expression, statement.line),
                    StatementKind::AugAssign { name } => {
                        namespace.bind(name, Binding::Opaque(text.to_string()), statement.line);
                    }
                    StatementKind::Delete(names) => {
                        for name in names {
                            namespace.entries.remove(name);
                        }
                    }
                    StatementKind::Compound(compound) => {
                        for name in compound_names(&compound, classifier) {
                            namespace.bind(name, Binding::Conditional, statement.line);
                        }
                        block = if compound.opens_scope {
                            Scope::Local
                        } else {
                            Scope::Conditional
                        };
                        inline = compound.body.map(|_| (statement.line, block));
                    }
                    StatementKind::Import(import) if import.is_star() => {
                        tracing::debug!(
                            "Ignoring star import on line {}, its names stay undefined",
                            statement.line
                        );
                    }
                    StatementKind::Import(_) | StatementKind::Other => {}
                },
            }
        }

        tracing::debug!("Loaded {} module-level bindings", namespace.len());
        Ok(namespace)
    }

    /// Bind every target of an unconditional assignment
    fn assign(&mut self, targets: &[Target<'_>], expression: &str, line: usize) {
        let value = SettingValue::evaluate(expression);
        let opaque = || Binding::Opaque(expression.to_string());

        for target in targets {
            match target {
                Target::Name(name) => {
                    let binding = value.clone().map_or_else(opaque, Binding::Value);
                    self.bind(name, binding, line);
                }
                Target::Unpack(names) => {
                    let items = match &value {
                        Some(SettingValue::Tuple(items) | SettingValue::List(items))
                            if items.len() == names.len() =>
                        {
                            Some(items)
                        }
                        _ => None,
                    };
                    match items {
                        Some(items) => {
                            for (name, item) in names.iter().zip(items) {
                                self.bind(name, Binding::Value(item.clone()), line);
                            }
                        }
                        None => {
                            for name in names {
                                self.bind(name, opaque(), line);
                            }
                        }
                    }
                }
                Target::Other(names) => {
                    for name in names {
                        self.bind(name, opaque(), line);
                    }
                }
            }
        }
    }

    fn bind(&mut self, name: &str, binding: Binding, line: usize) {
        self.entries.insert(name.to_string(), Entry { binding, line });
    }

    /// Remove and return the binding of `name`
    pub fn take(&mut self, name: &str) -> Option<Entry> {
        self.entries.remove(name)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Names a statement binds or unbinds when it runs
fn bound_names<'a>(kind: &StatementKind<'a>, classifier: &StatementClassifier) -> Vec<&'a str> {
    match kind {
        StatementKind::Assign { targets, .. } => {
            targets.iter().flat_map(|target| target.names()).collect()
        }
        StatementKind::AugAssign { name } => vec![*name],
        StatementKind::Delete(names) => names.clone(),
        StatementKind::Compound(compound) => compound_names(compound, classifier),
        StatementKind::Import(_) | StatementKind::Other => Vec::new(),
    }
}

/// Names a block header binds in the enclosing scope: the loop target and
/// anything its inline body binds
fn compound_names<'a>(compound: &Compound<'a>, classifier: &StatementClassifier) -> Vec<&'a str> {
    if compound.opens_scope {
        return Vec::new();
    }
    let mut names = compound
        .loop_target
        .as_ref()
        .map(|target| target.names())
        .unwrap_or_default();
    if let Some(body) = compound.body {
        names.extend(bound_names(&classifier.classify(body), classifier));
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(source: &str) -> Namespace {
        let classifier = StatementClassifier::new().unwrap();
        Namespace::load(source, &classifier).unwrap()
    }

    fn binding<'a>(namespace: &'a Namespace, name: &str) -> Option<&'a Binding> {
        namespace.entries.get(name).map(|entry| &entry.binding)
    }

    fn value(namespace: &Namespace, name: &str) -> SettingValue {
        match binding(namespace, name) {
            Some(Binding::Value(value)) => value.clone(),
            other => panic!("{name} is not a literal: {other:?}"),
        }
    }

    #[test]
    fn test_load_literals() {
        let namespace = load(
            "SECRET_KEY = 'abc123'\nENABLE_SAML = True\nJITSI_DOMAIN = \"meet.example.com\"\n",
        );
        assert_eq!(namespace.len(), 3);
        assert_eq!(value(&namespace, "SECRET_KEY"), SettingValue::Str("abc123".into()));
        assert_eq!(value(&namespace, "ENABLE_SAML"), SettingValue::Bool(true));
    }

    #[test]
    fn test_last_assignment_wins() {
        let mut namespace = load("JITSI_DOMAIN = 'old'\nJITSI_DOMAIN = 'new'\n");
        assert_eq!(value(&namespace, "JITSI_DOMAIN"), SettingValue::Str("new".into()));
        assert_eq!(namespace.take("JITSI_DOMAIN").unwrap().line, 2);
        assert!(namespace.take("JITSI_DOMAIN").is_none());
    }

    #[test]
    fn test_chained_assignment_binds_every_target() {
        let namespace = load("DEFAULT = ENABLE_SAML = True\n");
        assert_eq!(value(&namespace, "DEFAULT"), SettingValue::Bool(true));
        assert_eq!(value(&namespace, "ENABLE_SAML"), SettingValue::Bool(true));
    }

    #[test]
    fn test_tuple_unpacking() {
        let namespace = load(
            "JITSI_ROOM_NAME, JITSI_ROOM_PASSWORD = 'plenum', 'pw'\n[A, B] = [1, 2]\n",
        );
        assert_eq!(value(&namespace, "JITSI_ROOM_NAME"), SettingValue::Str("plenum".into()));
        assert_eq!(value(&namespace, "JITSI_ROOM_PASSWORD"), SettingValue::Str("pw".into()));
        assert_eq!(value(&namespace, "B"), SettingValue::Int(2));
    }

    #[test]
    fn test_unpacking_without_known_items_is_opaque() {
        let namespace = load(
            "JITSI_DOMAIN, JITSI_ROOM_NAME = load_jitsi()\nA, B = 1, 2, 3\nFIRST, *REST = (1, 2)\n",
        );
        for name in ["JITSI_DOMAIN", "JITSI_ROOM_NAME", "A", "B", "FIRST", "REST"] {
            assert!(
                matches!(binding(&namespace, name), Some(Binding::Opaque(_))),
                "{name}"
            );
        }
    }

    #[test]
    fn test_indented_assignments_are_conditional() {
        let namespace = load(
            "if DEBUG:\n    SECRET_KEY = 'dev'\n\
             try:\n    JITSI_DOMAIN = 'meet'\nexcept ImportError:\n    pass\n",
        );
        let entry = namespace.entries.get("SECRET_KEY").unwrap();
        assert_eq!(entry.binding, Binding::Conditional);
        assert_eq!(entry.line, 2);
        assert_eq!(binding(&namespace, "JITSI_DOMAIN"), Some(&Binding::Conditional));
    }

    #[test]
    fn test_inline_block_bodies_are_conditional() {
        let namespace = load(
            "ENABLE_SAML = False\nif SAML: ENABLE_SAML = True; JITSI_DOMAIN = 'meet'\n\
             for JITSI_ROOM_NAME in ROOMS: pass\n",
        );
        for name in ["ENABLE_SAML", "JITSI_DOMAIN", "JITSI_ROOM_NAME"] {
            assert_eq!(binding(&namespace, name), Some(&Binding::Conditional), "{name}");
        }
    }

    #[test]
    fn test_conditional_then_unconditional() {
        let namespace = load("if DEBUG:\n    ENABLE_SAML = True\nENABLE_SAML = False\n");
        assert_eq!(value(&namespace, "ENABLE_SAML"), SettingValue::Bool(false));
    }

    #[test]
    fn test_function_and_class_bodies_skipped() {
        let namespace = load(
            "def configure():\n    SECRET_KEY = 'local'\n    return SECRET_KEY\n\
             class Defaults:\n    ENABLE_SAML = True\n\
             def inline(): JITSI_DOMAIN = 'x'\n\
             SECRET_KEY = 'module'\n",
        );
        assert_eq!(value(&namespace, "SECRET_KEY"), SettingValue::Str("module".into()));
        assert!(binding(&namespace, "ENABLE_SAML").is_none());
        assert!(binding(&namespace, "JITSI_DOMAIN").is_none());
    }

    #[test]
    fn test_opaque_bindings() {
        let namespace = load(
            "import os\nSECRET_KEY = os.environ['KEY']\nINSTALLED_APPS = []\nINSTALLED_APPS += ['x']\n",
        );
        assert_eq!(
            binding(&namespace, "SECRET_KEY"),
            Some(&Binding::Opaque("os.environ['KEY']".to_string()))
        );
        assert!(matches!(
            binding(&namespace, "INSTALLED_APPS"),
            Some(Binding::Opaque(_))
        ));
        assert!(binding(&namespace, "os").is_none());
    }

    #[test]
    fn test_delete_removes_binding() {
        let namespace = load("ENABLE_SAML = True\ndel ENABLE_SAML\n");
        assert!(binding(&namespace, "ENABLE_SAML").is_none());
        assert_eq!(namespace.len(), 0);
    }

    #[test]
    fn test_multiline_list_binding() {
        let namespace = load("STATICFILES_DIRS = [\n    '/static',  # main\n    '/extra',\n]\n");
        assert_eq!(
            value(&namespace, "STATICFILES_DIRS").to_string(),
            "['/static', '/extra']"
        );
    }

    #[test]
    fn test_malformed_source_fails() {
        let classifier = StatementClassifier::new().unwrap();
        assert!(Namespace::load("SECRET_KEY = 'abc\n", &classifier).is_err());
    }
}
