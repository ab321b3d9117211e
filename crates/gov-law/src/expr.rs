//! # Condition Expressions
//!
//! A restricted boolean language over a fixed variable namespace:
//!
//! | variable            | type                     |
//! |---------------------|--------------------------|
//! | `now`               | timestamp                |
//! | `deadline_at`       | timestamp or null        |
//! | `accepted`          | bool or null             |
//! | `approvals.count`   | number                   |
//! | `quorum`            | number                   |
//! | `evidence.missing`  | bool or null             |
//! | `user.settings.*`   | any scalar, or null      |
//!
//! Text is parsed into an [`Expr`] tree by a hand-written recursive-descent
//! parser and evaluated by a pure interpreter. Nothing is ever compiled or
//! executed dynamically.
//!
//! ## Semantics
//!
//! - Precedence, tightest first: comparison, `not`, `and`, `or`.
//! - Unset variables are `null`.
//! - A comparison between different types is `false`, whatever the
//!   operator (so `accepted != null` is false when `accepted` is set).
//! - Ordering (`<`, `<=`, `>`, `>=`) applies to numbers, strings and
//!   timestamps. `null` and booleans only support `==` and `!=`.
//! - A logical operand that is not a boolean counts as `false`.
//! - [`evaluate_expression`] never fails: a parse fault yields `false`.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use gov_core::{parse_timestamp, EvaluationContext};

use crate::error::ExprError;

/// Deepest supported nesting of parentheses and `not`.
pub const MAX_DEPTH: usize = 64;

const USER_SETTINGS_PREFIX: &str = "user.settings.";

const FIXED_VARIABLES: [&str; 6] = [
    "now",
    "deadline_at",
    "accepted",
    "approvals.count",
    "quorum",
    "evidence.missing",
];

/// A runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent or unset.
    Null,
    /// Boolean.
    Bool(bool),
    /// Number.
    Number(f64),
    /// String.
    Text(String),
    /// Instant in UTC.
    Time(DateTime<Utc>),
}

impl Value {
    /// Truthiness for logical operators: only `Bool(true)` is true.
    pub fn is_true(&self) -> bool {
        matches!(self, Value::Bool(true))
    }

    fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => n.as_f64().map_or(Value::Null, Value::Number),
            serde_json::Value::String(s) => Value::Text(s.clone()),
            _ => Value::Null,
        }
    }
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl CompareOp {
    fn holds(self, ord: Ordering) -> bool {
        match self {
            Self::Eq => ord == Ordering::Equal,
            Self::Ne => ord != Ordering::Equal,
            Self::Lt => ord == Ordering::Less,
            Self::Le => ord != Ordering::Greater,
            Self::Gt => ord == Ordering::Greater,
            Self::Ge => ord != Ordering::Less,
        }
    }

    fn is_equality(self) -> bool {
        matches!(self, Self::Eq | Self::Ne)
    }
}

/// Parsed expression tree.
///
/// `And` and `Or` are n-ary so that long chains stay shallow.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Constant.
    Literal(Value),
    /// Variable from the namespace.
    Variable(String),
    /// Logical negation.
    Not(Box<Expr>),
    /// Conjunction of two or more operands.
    And(Vec<Expr>),
    /// Disjunction of two or more operands.
    Or(Vec<Expr>),
    /// Binary comparison.
    Compare(CompareOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Parse expression source.
    pub fn parse(source: &str) -> Result<Expr, ExprError> {
        let tokens = tokenize(source)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_or(0)?;
        match parser.tokens.get(parser.pos) {
            None => Ok(expr),
            Some(tok) => Err(ExprError::UnexpectedToken {
                found: tok.describe(),
                index: parser.pos,
            }),
        }
    }

    /// Evaluate against `ctx`.
    pub fn eval(&self, ctx: &EvaluationContext) -> Value {
        match self {
            Expr::Literal(v) => v.clone(),
            Expr::Variable(name) => resolve(name, ctx),
            Expr::Not(inner) => Value::Bool(!inner.eval(ctx).is_true()),
            Expr::And(items) => Value::Bool(items.iter().all(|e| e.eval(ctx).is_true())),
            Expr::Or(items) => Value::Bool(items.iter().any(|e| e.eval(ctx).is_true())),
            Expr::Compare(op, lhs, rhs) => Value::Bool(compare(*op, &lhs.eval(ctx), &rhs.eval(ctx))),
        }
    }
}

/// Parse and evaluate, reporting parse faults.
pub fn try_evaluate_expression(source: &str, ctx: &EvaluationContext) -> Result<bool, ExprError> {
    Ok(Expr::parse(source)?.eval(ctx).is_true())
}

/// Parse and evaluate; any fault is logged and treated as `false`.
pub fn evaluate_expression(source: &str, ctx: &EvaluationContext) -> bool {
    match try_evaluate_expression(source, ctx) {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(expression = source, error = %e, "condition fault, treated as false");
            false
        }
    }
}

/// Whether `name` belongs to the variable namespace.
pub fn is_known_variable(name: &str) -> bool {
    FIXED_VARIABLES.contains(&name)
        || name
            .strip_prefix(USER_SETTINGS_PREFIX)
            .is_some_and(|rest| !rest.is_empty() && rest.split('.').all(|seg| !seg.is_empty()))
}

fn resolve(name: &str, ctx: &EvaluationContext) -> Value {
    let resource = &ctx.resource;
    match name {
        "now" => Value::Time(ctx.now),
        "deadline_at" => resource
            .deadline_at
            .as_deref()
            .and_then(parse_timestamp)
            .map_or(Value::Null, Value::Time),
        "accepted" => resource.accepted.map_or(Value::Null, Value::Bool),
        "approvals.count" => Value::Number(resource.approvals.len() as f64),
        "quorum" => Value::Number(f64::from(ctx.tenant.quorum)),
        "evidence.missing" => resource
            .evidence
            .as_ref()
            .and_then(|e| e.missing)
            .map_or(Value::Null, Value::Bool),
        _ => name
            .strip_prefix(USER_SETTINGS_PREFIX)
            .and_then(|path| user_setting(ctx, path))
            .unwrap_or(Value::Null),
    }
}

fn user_setting(ctx: &EvaluationContext, path: &str) -> Option<Value> {
    let settings = &ctx.user.as_ref()?.settings;
    let mut segments = path.split('.');
    let mut current = settings.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(Value::from_json(current))
}

fn compare(op: CompareOp, lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Null, Value::Null) => op == CompareOp::Eq,
        (Value::Bool(a), Value::Bool(b)) => op.is_equality() && op.holds(a.cmp(b)),
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b).is_some_and(|ord| op.holds(ord)),
        (Value::Text(a), Value::Text(b)) => op.holds(a.cmp(b)),
        (Value::Time(a), Value::Time(b)) => op.holds(a.cmp(b)),
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Text(String),
    True,
    False,
    Null,
    And,
    Or,
    Not,
    Op(CompareOp),
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(name) => format!("identifier \"{name}\""),
            Token::Number(n) => format!("number {n}"),
            Token::Text(s) => format!("string \"{s}\""),
            Token::True | Token::False => "boolean literal".to_string(),
            Token::Null => "null".to_string(),
            Token::And => "'and'".to_string(),
            Token::Or => "'or'".to_string(),
            Token::Not => "'not'".to_string(),
            Token::Op(op) => format!("operator {op:?}"),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
        }
    }
}

fn tokenize(source: &str) -> Result<Vec<Token>, ExprError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let two = bytes.get(i..i + 2);
        match c {
            b' ' | b'\t' | b'\r' | b'\n' => i += 1,
            b'(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            b')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            b'\'' | b'"' => {
                let start = i;
                let end = source[i + 1..]
                    .find(c as char)
                    .ok_or(ExprError::UnterminatedString(start))?;
                tokens.push(Token::Text(source[i + 1..i + 1 + end].to_string()));
                i += end + 2;
            }
            _ if two == Some(b"==") => push_op(&mut tokens, &mut i, CompareOp::Eq, 2),
            _ if two == Some(b"!=") => push_op(&mut tokens, &mut i, CompareOp::Ne, 2),
            _ if two == Some(b"<=") => push_op(&mut tokens, &mut i, CompareOp::Le, 2),
            _ if two == Some(b">=") => push_op(&mut tokens, &mut i, CompareOp::Ge, 2),
            _ if two == Some(b"&&") => {
                tokens.push(Token::And);
                i += 2;
            }
            _ if two == Some(b"||") => {
                tokens.push(Token::Or);
                i += 2;
            }
            b'<' => push_op(&mut tokens, &mut i, CompareOp::Lt, 1),
            b'>' => push_op(&mut tokens, &mut i, CompareOp::Gt, 1),
            b'!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            b'0'..=b'9' | b'-' => {
                let start = i;
                i += 1;
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                    i += 1;
                }
                let literal = &source[start..i];
                let n: f64 = literal
                    .parse()
                    .map_err(|_| ExprError::InvalidNumber(literal.to_string()))?;
                tokens.push(Token::Number(n));
            }
            _ if c.is_ascii_alphabetic() || c == b'_' => {
                let start = i;
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || bytes[i] == b'.')
                {
                    i += 1;
                }
                tokens.push(keyword_or_ident(&source[start..i]));
            }
            _ => {
                let ch = source[i..].chars().next().unwrap_or('\u{fffd}');
                return Err(ExprError::UnexpectedChar { ch, offset: i });
            }
        }
    }
    Ok(tokens)
}

fn push_op(tokens: &mut Vec<Token>, i: &mut usize, op: CompareOp, width: usize) {
    tokens.push(Token::Op(op));
    *i += width;
}

fn keyword_or_ident(word: &str) -> Token {
    const KEYWORDS: [(&str, Token); 6] = [
        ("and", Token::And),
        ("or", Token::Or),
        ("not", Token::Not),
        ("true", Token::True),
        ("false", Token::False),
        ("null", Token::Null),
    ];
    KEYWORDS
        .iter()
        .find(|(kw, _)| word.eq_ignore_ascii_case(kw))
        .map(|(_, tok)| tok.clone())
        .unwrap_or_else(|| Token::Ident(word.to_string()))
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Result<Token, ExprError> {
        let tok = self.tokens.get(self.pos).cloned().ok_or(ExprError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(tok)
    }

    fn parse_or(&mut self, depth: usize) -> Result<Expr, ExprError> {
        let mut items = vec![self.parse_and(depth)?];
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            items.push(self.parse_and(depth)?);
        }
        Ok(if items.len() == 1 {
            items.remove(0)
        } else {
            Expr::Or(items)
        })
    }

    fn parse_and(&mut self, depth: usize) -> Result<Expr, ExprError> {
        let mut items = vec![self.parse_not(depth)?];
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            items.push(self.parse_not(depth)?);
        }
        Ok(if items.len() == 1 {
            items.remove(0)
        } else {
            Expr::And(items)
        })
    }

    fn parse_not(&mut self, depth: usize) -> Result<Expr, ExprError> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            let depth = descend(depth)?;
            return Ok(Expr::Not(Box::new(self.parse_not(depth)?)));
        }
        self.parse_compare(depth)
    }

    fn parse_compare(&mut self, depth: usize) -> Result<Expr, ExprError> {
        let lhs = self.parse_primary(depth)?;
        if let Some(Token::Op(op)) = self.peek() {
            let op = *op;
            self.pos += 1;
            let rhs = self.parse_primary(depth)?;
            return Ok(Expr::Compare(op, Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn parse_primary(&mut self, depth: usize) -> Result<Expr, ExprError> {
        let index = self.pos;
        match self.next()? {
            Token::True => Ok(Expr::Literal(Value::Bool(true))),
            Token::False => Ok(Expr::Literal(Value::Bool(false))),
            Token::Null => Ok(Expr::Literal(Value::Null)),
            Token::Number(n) => Ok(Expr::Literal(Value::Number(n))),
            Token::Text(s) => Ok(Expr::Literal(Value::Text(s))),
            Token::Ident(name) if is_known_variable(&name) => Ok(Expr::Variable(name)),
            Token::Ident(name) => Err(ExprError::UnknownVariable(name)),
            Token::LParen => {
                let inner = self.parse_or(descend(depth)?)?;
                match self.next()? {
                    Token::RParen => Ok(inner),
                    other => Err(ExprError::UnexpectedToken {
                        found: other.describe(),
                        index: self.pos - 1,
                    }),
                }
            }
            other => Err(ExprError::UnexpectedToken {
                found: other.describe(),
                index,
            }),
        }
    }
}

fn descend(depth: usize) -> Result<usize, ExprError> {
    if depth >= MAX_DEPTH {
        Err(ExprError::TooDeep(MAX_DEPTH))
    } else {
        Ok(depth + 1)
    }
}
