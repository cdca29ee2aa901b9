use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::rc::Rc;
use thiserror::Error;

use crate::state::FieldValue;

/// Price formulas are a closed arithmetic subset: numeric literals, field
/// names as variables, `+ - * /` and parentheses. The formula is tokenized
/// and parsed into an explicit expression tree; field references resolve as
/// whole identifier tokens, so a field named `width` is never confused with
/// a fragment of `width2`, and no general-purpose interpreter is involved.

#[derive(Debug, Error, PartialEq)]
pub enum FormulaError {
    #[error("formula is empty")]
    Empty,
    #[error("unexpected character '{0}' in formula")]
    UnexpectedChar(char),
    #[error("unexpected token '{0}' in formula")]
    UnexpectedToken(String),
    #[error("formula ended unexpectedly")]
    UnexpectedEnd,
    #[error("formula did not produce a finite number")]
    NotFinite,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => n.to_string(),
            Token::Ident(name) => name.clone(),
            Token::Plus => "+".to_string(),
            Token::Minus => "-".to_string(),
            Token::Star => "*".to_string(),
            Token::Slash => "/".to_string(),
            Token::LParen => "(".to_string(),
            Token::RParen => ")".to_string(),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, FormulaError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                chars.next();
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '0'..='9' => {
                let mut literal = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        literal.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let number = literal
                    .parse::<f64>()
                    .map_err(|_| FormulaError::UnexpectedToken(literal.clone()))?;
                tokens.push(Token::Number(number));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some(&i) = chars.peek() {
                    if i.is_ascii_alphanumeric() || i == '_' {
                        name.push(i);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(name));
            }
            other => return Err(FormulaError::UnexpectedChar(other)),
        }
    }

    Ok(tokens)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Var(String),
    Neg(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Evaluate against live field values. Unknown or non-numeric variables
    /// read as 0, matching the storefront behavior the authoring UI relies on.
    pub fn eval(&self, values: &HashMap<String, FieldValue>) -> f64 {
        match self {
            Expr::Number(n) => *n,
            Expr::Var(name) => values
                .get(name)
                .and_then(FieldValue::as_number)
                .unwrap_or(0.0),
            Expr::Neg(inner) => -inner.eval(values),
            Expr::Add(lhs, rhs) => lhs.eval(values) + rhs.eval(values),
            Expr::Sub(lhs, rhs) => lhs.eval(values) - rhs.eval(values),
            Expr::Mul(lhs, rhs) => lhs.eval(values) * rhs.eval(values),
            Expr::Div(lhs, rhs) => lhs.eval(values) / rhs.eval(values),
        }
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.term()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Plus => {
                    self.next();
                    lhs = Expr::Add(Box::new(lhs), Box::new(self.term()?));
                }
                Token::Minus => {
                    self.next();
                    lhs = Expr::Sub(Box::new(lhs), Box::new(self.term()?));
                }
                _ => break,
            }
        }
        Ok(lhs)
    }

    // term := factor (('*' | '/') factor)*
    fn term(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.factor()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Star => {
                    self.next();
                    lhs = Expr::Mul(Box::new(lhs), Box::new(self.factor()?));
                }
                Token::Slash => {
                    self.next();
                    lhs = Expr::Div(Box::new(lhs), Box::new(self.factor()?));
                }
                _ => break,
            }
        }
        Ok(lhs)
    }

    // factor := NUMBER | IDENT | '(' expr ')' | ('+' | '-') factor
    fn factor(&mut self) -> Result<Expr, FormulaError> {
        match self.next() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Ident(name)) => Ok(Expr::Var(name)),
            Some(Token::Minus) => Ok(Expr::Neg(Box::new(self.factor()?))),
            Some(Token::Plus) => self.factor(),
            Some(Token::LParen) => {
                let inner = self.expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    Some(other) => Err(FormulaError::UnexpectedToken(other.describe())),
                    None => Err(FormulaError::UnexpectedEnd),
                }
            }
            Some(other) => Err(FormulaError::UnexpectedToken(other.describe())),
            None => Err(FormulaError::UnexpectedEnd),
        }
    }
}

pub fn parse(formula: &str) -> Result<Expr, FormulaError> {
    if formula.trim().is_empty() {
        return Err(FormulaError::Empty);
    }

    let tokens = tokenize(formula)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.expr()?;
    if let Some(trailing) = parser.peek() {
        return Err(FormulaError::UnexpectedToken(trailing.describe()));
    }
    Ok(expr)
}

/// One-shot evaluation: parse, evaluate, reject non-finite results, and
/// round to the 2 decimal places the price display uses.
pub fn evaluate(
    formula: &str,
    values: &HashMap<String, FieldValue>,
) -> Result<f64, FormulaError> {
    let expr = parse(formula)?;
    finish(expr.eval(values))
}

fn finish(raw: f64) -> Result<f64, FormulaError> {
    if !raw.is_finite() {
        return Err(FormulaError::NotFinite);
    }
    Ok((raw * 100.0).round() / 100.0)
}

/// Stateful evaluator that caches parsed expression trees. Recompute fires
/// on every edit while the formula text almost never changes, so the parse
/// is paid once per formula.
pub struct Evaluator {
    cache: LruCache<String, Rc<Expr>>,
}

impl Evaluator {
    pub fn new() -> Self {
        Self {
            cache: LruCache::new(NonZeroUsize::new(16).expect("nonzero cache size")),
        }
    }

    pub fn evaluate(
        &mut self,
        formula: &str,
        values: &HashMap<String, FieldValue>,
    ) -> Result<f64, FormulaError> {
        if formula.trim().is_empty() {
            return Err(FormulaError::Empty);
        }

        if let Some(expr) = self.cache.get(formula) {
            return finish(expr.eval(values));
        }

        let expr = Rc::new(parse(formula)?);
        let result = finish(expr.eval(values));
        self.cache.put(formula.to_string(), expr);
        result
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}
