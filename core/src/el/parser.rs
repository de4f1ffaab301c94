//! Pest-backed parser for expression bodies

use pest::error::{ErrorVariant, LineColLocation};
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;

#[derive(Parser)]
#[grammar = "el/feel.pest"]
struct FeelParser;

/* ===================== AST ===================== */

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<Expr>),
    /// Variable reference, optionally followed by member accesses
    Path(Vec<String>),
    Negate(Box<Expr>),
    Not(Box<Expr>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    fn from_symbol(symbol: &str) -> Option<Self> {
        let op = match symbol {
            "or" => BinaryOp::Or,
            "and" => BinaryOp::And,
            "=" => BinaryOp::Eq,
            "!=" => BinaryOp::Ne,
            "<" => BinaryOp::Lt,
            "<=" => BinaryOp::Lte,
            ">" => BinaryOp::Gt,
            ">=" => BinaryOp::Gte,
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            _ => return None,
        };
        Some(op)
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Or => "or",
            BinaryOp::And => "and",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Lte => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Gte => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }
}

/* ===================== Errors ===================== */

/// Parser detail for an expression that could not be parsed
///
/// Rendered as `[line.col] failure: <detail>` followed by the body and a
/// caret pointing at the failing column.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{line}.{column}] failure: {detail}\n\n{source_line}\n{caret}")]
pub struct ParseFailure {
    pub line: usize,
    pub column: usize,
    pub detail: String,
    source_line: String,
    caret: String,
}

impl ParseFailure {
    fn at(body: &str, line: usize, column: usize, detail: impl Into<String>) -> Self {
        let source_line = body.lines().nth(line.saturating_sub(1)).unwrap_or("").to_string();
        let caret = format!("{}^", " ".repeat(column.saturating_sub(1)));
        Self {
            line,
            column,
            detail: detail.into(),
            source_line,
            caret,
        }
    }

    fn from_pest(body: &str, error: pest::error::Error<Rule>) -> Self {
        let (line, column) = match error.line_col {
            LineColLocation::Pos(position) => position,
            LineColLocation::Span(start, _) => start,
        };
        let detail = match error.variant {
            ErrorVariant::ParsingError { positives, .. } if positives.contains(&Rule::EOI) => {
                "end of input expected".to_string()
            }
            ErrorVariant::ParsingError { positives, .. } if !positives.is_empty() => {
                let mut names: Vec<&str> = positives.iter().map(rule_name).collect();
                names.sort_unstable();
                names.dedup();
                format!("{} expected", names.join(" or "))
            }
            ErrorVariant::ParsingError { .. } => "unexpected input".to_string(),
            ErrorVariant::CustomError { message } => message,
        };
        Self::at(body, line, column, detail)
    }
}

fn rule_name(rule: &Rule) -> &'static str {
    match rule {
        Rule::or_op | Rule::and_op => "logical operator",
        Rule::comp_op => "comparison",
        Rule::sum_op | Rule::prod_op => "arithmetic operator",
        Rule::string | Rule::inner | Rule::string_char => "string",
        Rule::number => "number",
        Rule::boolean => "boolean",
        Rule::null => "null",
        Rule::name | Rule::path => "name",
        Rule::list => "list",
        Rule::not_call => "not(..)",
        _ => "expression",
    }
}

/* ===================== Public API ===================== */

/// Parse an expression body (text after the `=` marker)
pub fn parse(body: &str) -> Result<Expr, ParseFailure> {
    if body.trim().is_empty() {
        return Err(ParseFailure::at(body, 1, 1, "expression expected"));
    }

    let mut pairs =
        FeelParser::parse(Rule::expression, body).map_err(|e| ParseFailure::from_pest(body, e))?;

    let root = pairs
        .next()
        .and_then(|expression| expression.into_inner().next())
        .ok_or_else(|| ParseFailure::at(body, 1, 1, "empty expression"))?;

    build(root, body)
}

/* ===================== AST Builder ===================== */

fn build(pair: Pair<Rule>, body: &str) -> Result<Expr, ParseFailure> {
    match pair.as_rule() {
        Rule::disjunction
        | Rule::conjunction
        | Rule::comparison
        | Rule::sum
        | Rule::product => build_binary(pair, body),
        Rule::unary => build_unary(pair, body),
        Rule::null => Ok(Expr::Null),
        Rule::boolean => Ok(Expr::Bool(pair.as_str() == "true")),
        Rule::number => pair
            .as_str()
            .parse::<f64>()
            .map(Expr::Number)
            .map_err(|e| failure_at(&pair, body, e.to_string())),
        Rule::string => {
            let raw = pair.into_inner().next().map(|inner| inner.as_str()).unwrap_or("");
            Ok(Expr::String(unescape(raw)))
        }
        Rule::path => Ok(Expr::Path(
            pair.into_inner().map(|name| name.as_str().to_string()).collect(),
        )),
        Rule::list => pair
            .into_inner()
            .map(|item| build(item, body))
            .collect::<Result<Vec<_>, _>>()
            .map(Expr::List),
        Rule::not_call => {
            let inner = next_inner(pair, body)?;
            Ok(Expr::Not(Box::new(build(inner, body)?)))
        }
        rule => Err(failure_at(&pair, body, format!("unexpected {:?}", rule))),
    }
}

fn build_binary(pair: Pair<Rule>, body: &str) -> Result<Expr, ParseFailure> {
    let mut inner = pair.clone().into_inner();
    let first = inner
        .next()
        .ok_or_else(|| failure_at(&pair, body, "empty expression"))?;
    let mut left = build(first, body)?;

    while let Some(op_pair) = inner.next() {
        let op = BinaryOp::from_symbol(op_pair.as_str())
            .ok_or_else(|| failure_at(&op_pair, body, "unknown operator"))?;
        let right_pair = inner
            .next()
            .ok_or_else(|| failure_at(&op_pair, body, "missing right operand"))?;
        let right = build(right_pair, body)?;

        left = Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
    }

    Ok(left)
}

fn build_unary(pair: Pair<Rule>, body: &str) -> Result<Expr, ParseFailure> {
    let mut negations = 0;
    let mut operand = None;

    for inner in pair.clone().into_inner() {
        match inner.as_rule() {
            Rule::neg_op => negations += 1,
            _ => operand = Some(build(inner, body)?),
        }
    }

    let mut expr = operand.ok_or_else(|| failure_at(&pair, body, "missing operand"))?;
    for _ in 0..negations {
        expr = Expr::Negate(Box::new(expr));
    }
    Ok(expr)
}

fn next_inner<'a>(pair: Pair<'a, Rule>, body: &str) -> Result<Pair<'a, Rule>, ParseFailure> {
    let fallback = failure_at(&pair, body, "missing operand");
    pair.into_inner().next().ok_or(fallback)
}

fn failure_at(pair: &Pair<Rule>, body: &str, detail: impl Into<String>) -> ParseFailure {
    let (line, column) = pair.as_span().start_pos().line_col();
    ParseFailure::at(body, line, column, detail)
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
