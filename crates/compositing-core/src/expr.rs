//! Arithmetic expressions over named variables.
//!
//! Supports decimal numbers, named variables, the constants `PI` and `E`,
//! `+ - * / ^` with the usual precedence (`^` is right associative),
//! unary signs, parentheses and a small set of functions:
//! `abs floor ceil trunc round sqrt not` (one argument) and
//! `min max mod eq gt gte lt lte` (two arguments).

use vidlay_common::error::{VidlayError, VidlayResult};

/// A parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    /// Index into the variable table the expression was parsed against.
    Var(usize),
    Neg(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call(Function, Vec<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Abs,
    Floor,
    Ceil,
    Trunc,
    Round,
    Sqrt,
    Not,
    Min,
    Max,
    Mod,
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Function {
    fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "abs" => Self::Abs,
            "floor" => Self::Floor,
            "ceil" => Self::Ceil,
            "trunc" => Self::Trunc,
            "round" => Self::Round,
            "sqrt" => Self::Sqrt,
            "not" => Self::Not,
            "min" => Self::Min,
            "max" => Self::Max,
            "mod" => Self::Mod,
            "eq" => Self::Eq,
            "gt" => Self::Gt,
            "gte" => Self::Gte,
            "lt" => Self::Lt,
            "lte" => Self::Lte,
            _ => return None,
        })
    }

    fn arity(self) -> usize {
        match self {
            Self::Abs | Self::Floor | Self::Ceil | Self::Trunc | Self::Round | Self::Sqrt
            | Self::Not => 1,
            _ => 2,
        }
    }

    fn apply(self, args: &[f64]) -> f64 {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        match self {
            Self::Abs => args[0].abs(),
            Self::Floor => args[0].floor(),
            Self::Ceil => args[0].ceil(),
            Self::Trunc => args[0].trunc(),
            Self::Round => args[0].round(),
            Self::Sqrt => args[0].sqrt(),
            Self::Not => flag(args[0] == 0.0),
            Self::Min => args[0].min(args[1]),
            Self::Max => args[0].max(args[1]),
            Self::Mod => args[0] - (args[0] / args[1]).floor() * args[1],
            Self::Eq => flag(args[0] == args[1]),
            Self::Gt => flag(args[0] > args[1]),
            Self::Gte => flag(args[0] >= args[1]),
            Self::Lt => flag(args[0] < args[1]),
            Self::Lte => flag(args[0] <= args[1]),
        }
    }
}

impl Expr {
    /// Parse `text`, resolving identifiers against `var_names`.
    ///
    /// Errors name the offending expression.
    pub fn parse(text: &str, var_names: &[&str]) -> VidlayResult<Self> {
        let tokens = tokenize(text).map_err(|msg| VidlayError::expression(text, msg))?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            var_names,
        };
        let expr = parser
            .expr()
            .map_err(|msg| VidlayError::expression(text, msg))?;
        if let Some(tok) = parser.peek() {
            return Err(VidlayError::expression(
                text,
                format!("unexpected {} after end of expression", tok.describe()),
            ));
        }
        Ok(expr)
    }

    /// Evaluate with `values[i]` bound to the i-th variable name used when
    /// parsing.
    pub fn eval(&self, values: &[f64]) -> f64 {
        match self {
            Self::Number(n) => *n,
            Self::Var(i) => values[*i],
            Self::Neg(inner) => -inner.eval(values),
            Self::Binary(op, lhs, rhs) => {
                let (a, b) = (lhs.eval(values), rhs.eval(values));
                match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                    BinaryOp::Pow => a.powf(b),
                }
            }
            Self::Call(func, args) => {
                let args: Vec<f64> = args.iter().map(|a| a.eval(values)).collect();
                func.apply(&args)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(char),
    LParen,
    RParen,
    Comma,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Self::Number(n) => format!("number {n}"),
            Self::Ident(name) => format!("'{name}'"),
            Self::Op(c) => format!("'{c}'"),
            Self::LParen => "'('".to_string(),
            Self::RParen => "')'".to_string(),
            Self::Comma => "','".to_string(),
        }
    }
}

fn tokenize(text: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '+' | '-' | '*' | '/' | '^' => {
                tokens.push(Token::Op(c));
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        i = j;
                        while i < chars.len() && chars[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let literal: String = chars[start..i].iter().collect();
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number '{literal}'"))?;
                tokens.push(Token::Number(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(format!("unexpected character '{other}'")),
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    var_names: &'a [&'a str],
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), String> {
        match self.bump() {
            Some(tok) if tok == expected => Ok(()),
            Some(tok) => Err(format!(
                "expected {}, found {}",
                expected.describe(),
                tok.describe()
            )),
            None => Err(format!("expected {}, found end of input", expected.describe())),
        }
    }

    fn expr(&mut self) -> Result<Expr, String> {
        let mut lhs = self.term()?;
        loop {
            let op = if self.eat(&Token::Op('+')) {
                BinaryOp::Add
            } else if self.eat(&Token::Op('-')) {
                BinaryOp::Sub
            } else {
                return Ok(lhs);
            };
            let rhs = self.term()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn term(&mut self) -> Result<Expr, String> {
        let mut lhs = self.unary()?;
        loop {
            let op = if self.eat(&Token::Op('*')) {
                BinaryOp::Mul
            } else if self.eat(&Token::Op('/')) {
                BinaryOp::Div
            } else {
                return Ok(lhs);
            };
            let rhs = self.unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn unary(&mut self) -> Result<Expr, String> {
        if self.eat(&Token::Op('-')) {
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        if self.eat(&Token::Op('+')) {
            return self.unary();
        }
        self.power()
    }

    fn power(&mut self) -> Result<Expr, String> {
        let base = self.primary()?;
        if self.eat(&Token::Op('^')) {
            let exponent = self.unary()?;
            return Ok(Expr::Binary(
                BinaryOp::Pow,
                Box::new(base),
                Box::new(exponent),
            ));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Expr, String> {
        match self.bump() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::LParen) => {
                let inner = self.expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    return self.call(&name);
                }
                if let Some(i) = self.var_names.iter().position(|v| *v == name) {
                    return Ok(Expr::Var(i));
                }
                match name.as_str() {
                    "PI" => Ok(Expr::Number(std::f64::consts::PI)),
                    "E" => Ok(Expr::Number(std::f64::consts::E)),
                    _ => Err(format!("unknown variable '{name}'")),
                }
            }
            Some(tok) => Err(format!("unexpected {}", tok.describe())),
            None => Err("unexpected end of input".to_string()),
        }
    }

    fn call(&mut self, name: &str) -> Result<Expr, String> {
        let func = Function::lookup(name).ok_or_else(|| format!("unknown function '{name}'"))?;
        self.expect(Token::LParen)?;

        let mut args = vec![self.expr()?];
        while self.eat(&Token::Comma) {
            args.push(self.expr()?);
        }
        self.expect(Token::RParen)?;

        if args.len() != func.arity() {
            return Err(format!(
                "{name}() takes {} argument(s), got {}",
                func.arity(),
                args.len()
            ));
        }
        Ok(Expr::Call(func, args))
    }
}
