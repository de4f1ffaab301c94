//! Checks shared by rules that validate expression attributes

use once_cell::sync::Lazy;
use regex::Regex;

use crate::el::{Expression, ExpressionLanguage, EXPRESSION_MARKER};

/// Variable path accepted as a mapping target
pub const PATH_PATTERN: &str = r"[a-zA-Z][a-zA-Z0-9_]*(\.[a-zA-Z][a-zA-Z0-9_]*)*";

static PATH_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!("^{}$", PATH_PATTERN)).expect("path pattern is a valid regex")
});

pub struct ExpressionVerifier<'a> {
    language: &'a dyn ExpressionLanguage,
}

impl<'a> ExpressionVerifier<'a> {
    pub fn new(language: &'a dyn ExpressionLanguage) -> Self {
        Self { language }
    }

    /// The attribute must be a non-empty, parsable expression
    pub fn expression_required(&self, text: &str) -> Result<Expression, String> {
        if text.is_empty() {
            return Err("Expected expression but not found.".to_string());
        }

        let expression = self.language.parse_expression(text);
        if expression.is_static() {
            return Err(format!(
                "Expected expression but found static value '{}'. An expression must start with '{}' (e.g. '{}{}').",
                text, EXPRESSION_MARKER, EXPRESSION_MARKER, text
            ));
        }

        Self::parsed(expression)
    }

    /// The attribute may be a static value; if it is an expression it must parse
    pub fn static_or_expression(&self, text: &str) -> Result<Expression, String> {
        Self::parsed(self.language.parse_expression(text))
    }

    /// The attribute must be a variable path such as `order.total`
    pub fn path_required(&self, text: &str) -> Result<(), String> {
        if text.is_empty() {
            return Err("Expected path expression but not found.".to_string());
        }

        if !PATH_REGEX.is_match(text) {
            return Err(format!(
                "Expected path expression '{}' but doesn't match the pattern '{}'.",
                text, PATH_PATTERN
            ));
        }

        Ok(())
    }

    fn parsed(expression: Expression) -> Result<Expression, String> {
        match expression.failure_message() {
            Some(message) => Err(message.to_string()),
            None => Ok(expression),
        }
    }
}
