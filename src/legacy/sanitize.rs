//! Neutralization of the legacy base settings import
//!
//! Legacy settings modules start with a star import of the framework's
//! global settings, which cannot be resolved outside a full installation.
//! The import statement is replaced with empty bindings for the list
//! settings that later statements extend (`INSTALLED_APPS += [...]`).

use super::parser::{split_statements, StatementClassifier, StatementKind};
use crate::error::Result;

/// Bindings injected in place of the base settings import
const NEUTRAL_BINDINGS: [&str; 3] = ["INSTALLED_APPS", "INSTALLED_PLUGINS", "STATICFILES_DIRS"];

/// Result of sanitizing a settings module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sanitized {
    /// Source text with the base settings import replaced
    pub text: String,
    /// Number of import statements replaced
    pub replaced: usize,
}

/// Replace every import of `base_module` in `source` with empty list bindings
pub fn sanitize(
    source: &str,
    base_module: &str,
    classifier: &StatementClassifier,
) -> Result<Sanitized> {
    let statements = split_statements(source)?;
    let mut text = String::with_capacity(source.len());
    let mut copied = 0;
    let mut replaced = 0;

    for statement in &statements {
        let StatementKind::Import(import) = classifier.classify(statement.text(source)) else {
            continue;
        };
        if !import.references(base_module) {
            continue;
        }

        tracing::debug!(
            "Neutralizing import of {} on line {}",
            base_module,
            statement.line
        );
        let separator = format!("\n{}", line_indent(source, statement.span.start));
        let replacement = NEUTRAL_BINDINGS
            .iter()
            .map(|name| format!("{} = []", name))
            .collect::<Vec<_>>()
            .join(separator.as_str());

        text.push_str(&source[copied..statement.span.start]);
        text.push_str(&replacement);
        copied = statement.span.end;
        replaced += 1;
    }
    text.push_str(&source[copied..]);

    if replaced == 0 {
        tracing::debug!("No import of {} found", base_module);
    }

    Ok(Sanitized { text, replaced })
}

/// Leading whitespace of the physical line containing `offset`
fn line_indent(source: &str, offset: usize) -> &str {
    let line_start = source[..offset].rfind('\n').map_or(0, |p| p + 1);
    let line = &source[line_start..];
    let width = line.len() - line.trim_start_matches([' ', '\t']).len();
    &line[..width]
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "openslides.global_settings";

    fn run(source: &str) -> Sanitized {
        let classifier = StatementClassifier::new().unwrap();
        sanitize(source, BASE, &classifier).unwrap()
    }

    #[test]
    fn test_star_import_replaced() {
        let sanitized = run("from openslides.global_settings import *\n\nDEBUG = False\n");
        assert_eq!(sanitized.replaced, 1);
        assert_eq!(
            sanitized.text,
            "INSTALLED_APPS = []\nINSTALLED_PLUGINS = []\nSTATICFILES_DIRS = []\n\nDEBUG = False\n"
        );
    }

    #[test]
    fn test_other_lines_unchanged() {
        let source = "import os\n\nSECRET_KEY = 'abc'  # keep me\nENABLE_SAML = True\n";
        let sanitized = run(source);
        assert_eq!(sanitized.replaced, 0);
        assert_eq!(sanitized.text, source);
    }

    #[test]
    fn test_mentions_in_comments_and_strings_kept() {
        let source = "# from openslides.global_settings import *\n\
                      NOTE = 'openslides.global_settings'\n";
        let sanitized = run(source);
        assert_eq!(sanitized.replaced, 0);
        assert_eq!(sanitized.text, source);
    }

    #[test]
    fn test_indented_import_keeps_indent() {
        let source = "try:\n    from openslides.global_settings import *  # base\nexcept ImportError:\n    pass\n";
        let sanitized = run(source);
        assert_eq!(sanitized.replaced, 1);
        assert_eq!(
            sanitized.text,
            "try:\n    INSTALLED_APPS = []\n    INSTALLED_PLUGINS = []\n    STATICFILES_DIRS = []  # base\nexcept ImportError:\n    pass\n"
        );
    }

    #[test]
    fn test_submodule_import_form() {
        let sanitized = run("from openslides import global_settings\nX = 1\n");
        assert_eq!(sanitized.replaced, 1);
        assert!(sanitized.text.starts_with("INSTALLED_APPS = []\n"));
        assert!(sanitized.text.ends_with("X = 1\n"));
    }

    #[test]
    fn test_similar_module_not_replaced() {
        let source = "from openslides.global_settings_extra import *\n";
        assert_eq!(run(source).replaced, 0);
    }

    #[test]
    fn test_parse_error_propagates() {
        let classifier = StatementClassifier::new().unwrap();
        assert!(sanitize("A = 'open\n", BASE, &classifier).is_err());
    }
}
