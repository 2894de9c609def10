//! Arithmetic tool.
//!
//! Evaluates expressions built from numbers, `+ - * /`, unary signs and
//! parentheses. Nothing else is accepted.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::Result;
use crate::schema::{ToolSchema, TypeSpec};
use crate::tool::Tool;

use super::{invocation_error, required_str};

pub struct Calculate;

#[async_trait]
impl Tool for Calculate {
    fn schema(&self) -> Result<ToolSchema> {
        ToolSchema::builder("calculate")
            .description("Perform a calculation.")
            .required(
                "formula",
                TypeSpec::of::<str>().describe(
                    "A simple mathematical expression containing only numbers and basic operators (+, -, *, /).",
                ),
            )
            .returns(TypeSpec::of::<str>())
            .build()
    }

    async fn call(&self, arguments: Value) -> Result<Value> {
        let formula = required_str(&arguments, "formula", "calculate")?;
        let value = evaluate(formula).map_err(|err| invocation_error("calculate", err))?;
        Ok(json!(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    Open,
    Close,
}

fn tokenize(input: &str) -> std::result::Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();
    while let Some(&(start, c)) = chars.peek() {
        let token = match c {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '0'..='9' | '.' => {
                let mut end = start;
                while let Some(&(idx, d)) = chars.peek() {
                    if !(d.is_ascii_digit() || d == '.') {
                        break;
                    }
                    end = idx + d.len_utf8();
                    chars.next();
                }
                let literal = &input[start..end];
                let number = literal
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number `{literal}`"))?;
                tokens.push(Token::Number(number));
                continue;
            }
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '(' => Token::Open,
            ')' => Token::Close,
            other => return Err(format!("unexpected character `{other}` at {start}")),
        };
        tokens.push(token);
        chars.next();
    }
    Ok(tokens)
}

/// Deepest nesting of parentheses and unary signs accepted.
const MAX_DEPTH: usize = 64;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.peek();
        self.pos += 1;
        token
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> std::result::Result<f64, String> {
        let mut value = self.term()?;
        while let Some(op @ (Token::Plus | Token::Minus)) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            value = if op == Token::Plus { value + rhs } else { value - rhs };
        }
        Ok(value)
    }

    // term := factor (('*' | '/') factor)*
    fn term(&mut self) -> std::result::Result<f64, String> {
        let mut value = self.factor()?;
        while let Some(op @ (Token::Star | Token::Slash)) = self.peek() {
            self.pos += 1;
            let rhs = self.factor()?;
            value = if op == Token::Star {
                value * rhs
            } else {
                if rhs == 0.0 {
                    return Err("division by zero".into());
                }
                value / rhs
            };
        }
        Ok(value)
    }

    fn factor(&mut self) -> std::result::Result<f64, String> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err("expression nested too deeply".into());
        }
        let value = self.operand();
        self.depth -= 1;
        value
    }

    fn operand(&mut self) -> std::result::Result<f64, String> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::Minus) => Ok(-self.factor()?),
            Some(Token::Plus) => self.factor(),
            Some(Token::Open) => {
                let value = self.expr()?;
                match self.advance() {
                    Some(Token::Close) => Ok(value),
                    _ => Err("missing closing parenthesis".into()),
                }
            }
            Some(other) => Err(format!("unexpected token {other:?}")),
            None => Err("unexpected end of expression".into()),
        }
    }
}

/// Evaluates an arithmetic expression.
pub fn evaluate(formula: &str) -> std::result::Result<f64, String> {
    let tokens = tokenize(formula)?;
    if tokens.is_empty() {
        return Err("empty expression".into());
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    if let Some(extra) = parser.peek() {
        return Err(format!("unexpected token {extra:?}"));
    }
    Ok(value)
}
