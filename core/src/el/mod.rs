//! Expression language
//!
//! Workflow attributes may be given either as a static value (`order-created`)
//! or as an expression prefixed with `=` (`="order-" + "created"`). This module
//! parses both forms and evaluates them against a variable resolver.
//!
//! The engine never reaches for a global evaluator: callers hold an
//! `Arc<dyn ExpressionLanguage>` so tests can swap in their own.
//!
//! # Example
//!
//! ```
//! use tempo_core::el::{EmptyVariables, ExpressionLanguage, FeelExpressionLanguage, ResultType};
//!
//! let language = FeelExpressionLanguage;
//! let expression = language.parse_expression("=\"order-\" + \"created\"");
//! let result = language.evaluate_expression(&expression, &EmptyVariables);
//!
//! assert_eq!(result.result_type(), ResultType::String);
//! assert_eq!(result.string(), Some("order-created"));
//! ```

mod eval;
mod parser;

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::fmt;

use serde_json::Value as JsonValue;

pub use parser::{BinaryOp, Expr, ParseFailure};

/// Marker that turns an attribute value into an expression
pub const EXPRESSION_MARKER: char = '=';

/* ===================== Expressions ===================== */

/// A parsed attribute value: static, a valid expression, or a parse failure.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    text: String,
    kind: ExpressionKind,
}

#[derive(Debug, Clone, PartialEq)]
enum ExpressionKind {
    Static(String),
    Feel(Expr),
    Invalid(String),
}

impl Expression {
    /// The expression text as written, without the leading marker
    pub fn expression(&self) -> &str {
        &self.text
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self.kind, ExpressionKind::Invalid(_))
    }

    /// True for values written without the `=` marker
    pub fn is_static(&self) -> bool {
        matches!(self.kind, ExpressionKind::Static(_))
    }

    pub fn failure_message(&self) -> Option<&str> {
        match &self.kind {
            ExpressionKind::Invalid(message) => Some(message),
            _ => None,
        }
    }

    /// The syntax tree of a valid, non-static expression
    pub fn ast(&self) -> Option<&Expr> {
        match &self.kind {
            ExpressionKind::Feel(expr) => Some(expr),
            _ => None,
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ExpressionKind::Static(_) => write!(f, "{}", self.text),
            _ => write!(f, "{}{}", EXPRESSION_MARKER, self.text),
        }
    }
}

/* ===================== Evaluation Results ===================== */

/// Type of an evaluation result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultType {
    Null,
    Boolean,
    Number,
    String,
    Array,
    Object,
}

impl ResultType {
    pub fn of(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => ResultType::Null,
            JsonValue::Bool(_) => ResultType::Boolean,
            JsonValue::Number(_) => ResultType::Number,
            JsonValue::String(_) => ResultType::String,
            JsonValue::Array(_) => ResultType::Array,
            JsonValue::Object(_) => ResultType::Object,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ResultType::Null => "NULL",
            ResultType::Boolean => "BOOLEAN",
            ResultType::Number => "NUMBER",
            ResultType::String => "STRING",
            ResultType::Array => "ARRAY",
            ResultType::Object => "OBJECT",
        }
    }
}

impl fmt::Display for ResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of evaluating an expression
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationResult {
    expression: String,
    outcome: Result<JsonValue, String>,
}

impl EvaluationResult {
    pub fn success(expression: impl Into<String>, value: JsonValue) -> Self {
        Self {
            expression: expression.into(),
            outcome: Ok(value),
        }
    }

    pub fn failure(expression: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            outcome: Err(message.into()),
        }
    }

    /// The evaluated expression text
    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn is_failure(&self) -> bool {
        self.outcome.is_err()
    }

    pub fn failure_message(&self) -> Option<&str> {
        self.outcome.as_ref().err().map(String::as_str)
    }

    /// Result type; failures report `Null`
    pub fn result_type(&self) -> ResultType {
        self.outcome
            .as_ref()
            .map(ResultType::of)
            .unwrap_or(ResultType::Null)
    }

    pub fn value(&self) -> Option<&JsonValue> {
        self.outcome.as_ref().ok()
    }

    /// The result if it is a string
    pub fn string(&self) -> Option<&str> {
        self.value().and_then(JsonValue::as_str)
    }
}

/* ===================== Variables ===================== */

/// Resolves variable names during evaluation. `None` means unknown.
pub trait VariableResolver {
    fn resolve(&self, name: &str) -> Option<JsonValue>;
}

/// Resolver without any variables
///
/// Used wherever there is no execution scope, e.g. for start events at
/// deployment time.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyVariables;

impl VariableResolver for EmptyVariables {
    fn resolve(&self, _name: &str) -> Option<JsonValue> {
        None
    }
}

impl VariableResolver for HashMap<String, JsonValue> {
    fn resolve(&self, name: &str) -> Option<JsonValue> {
        self.get(name).cloned()
    }
}

impl<F> VariableResolver for F
where
    F: Fn(&str) -> Option<JsonValue>,
{
    fn resolve(&self, name: &str) -> Option<JsonValue> {
        self(name)
    }
}

/* ===================== Expression Language ===================== */

/// Capability to parse and evaluate attribute expressions
pub trait ExpressionLanguage: Send + Sync {
    fn parse_expression(&self, text: &str) -> Expression;

    fn evaluate_expression(
        &self,
        expression: &Expression,
        variables: &dyn VariableResolver,
    ) -> EvaluationResult;
}

/// Built-in FEEL subset
#[derive(Debug, Clone, Copy, Default)]
pub struct FeelExpressionLanguage;

impl ExpressionLanguage for FeelExpressionLanguage {
    fn parse_expression(&self, text: &str) -> Expression {
        let Some(body) = text.strip_prefix(EXPRESSION_MARKER) else {
            return Expression {
                text: text.to_string(),
                kind: ExpressionKind::Static(text.to_string()),
            };
        };

        let kind = match parser::parse(body) {
            Ok(expr) => ExpressionKind::Feel(expr),
            Err(detail) => ExpressionKind::Invalid(format!(
                "failed to parse expression '{}': {}",
                body, detail
            )),
        };

        Expression {
            text: body.to_string(),
            kind,
        }
    }

    fn evaluate_expression(
        &self,
        expression: &Expression,
        variables: &dyn VariableResolver,
    ) -> EvaluationResult {
        let text = expression.expression();
        match &expression.kind {
            ExpressionKind::Static(value) => {
                EvaluationResult::success(text, JsonValue::String(value.clone()))
            }
            ExpressionKind::Invalid(message) => EvaluationResult::failure(text, message.clone()),
            ExpressionKind::Feel(expr) => match eval::evaluate(expr, variables) {
                Ok(value) => EvaluationResult::success(text, value),
                Err(message) => EvaluationResult::failure(text, message),
            },
        }
    }
}
