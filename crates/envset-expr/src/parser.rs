//! Expression lexer and parser for both dialects
//!
//! The template dialect knows paths, literals, `~` and `|` filters. The
//! legacy dialect adds `+`, comparisons, `?:`, the conditional operator and
//! method calls.

use envset_param::ParamValue;
use serde_json::Number;

use crate::error::{ExpressionError, Result};

/// Which placeholder grammar an expression was written in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `<{ expr }>` syntax
    Template,
    /// `${expr}`, `$path` and `<% expr %>` syntax
    Legacy,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Literal(ParamValue),
    Variable(String),
    Attr(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call {
        target: Box<Expr>,
        name: String,
        args: Vec<Expr>,
    },
    Concat(Vec<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Compare {
        left: Box<Expr>,
        right: Box<Expr>,
        negated: bool,
    },
    Elvis(Box<Expr>, Box<Expr>),
    Conditional {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    Dot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Pipe,
    Tilde,
    Plus,
    EqEq,
    NotEq,
    Question,
    Colon,
    Elvis,
}

fn tokenize(src: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            c if c.is_whitespace() => i += 1,
            '\'' | '"' => {
                let mut value = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(ExpressionError::syntax(src, "unterminated string")),
                        Some(&q) if q == c => break,
                        Some('\\') => {
                            i += 1;
                            match chars.get(i) {
                                Some('n') => value.push('\n'),
                                Some('t') => value.push('\t'),
                                Some(&other) => value.push(other),
                                None => {
                                    return Err(ExpressionError::syntax(src, "unterminated string"))
                                }
                            }
                        }
                        Some(&other) => value.push(other),
                    }
                    i += 1;
                }
                i += 1;
                tokens.push(Token::Str(value));
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while chars.get(i).is_some_and(char::is_ascii_digit) {
                    i += 1;
                }
                let is_float = chars.get(i) == Some(&'.')
                    && chars.get(i + 1).is_some_and(char::is_ascii_digit);
                if is_float {
                    i += 1;
                    while chars.get(i).is_some_and(char::is_ascii_digit) {
                        i += 1;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let token = if is_float {
                    text.parse().map(Token::Float).ok()
                } else {
                    text.parse().map(Token::Int).ok()
                };
                tokens.push(token.ok_or_else(|| {
                    ExpressionError::syntax(src, format!("invalid number '{text}'"))
                })?);
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while chars.get(i).is_some_and(|c| c.is_alphanumeric() || *c == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            '=' if next == Some('=') => {
                tokens.push(Token::EqEq);
                i += 2;
            }
            '!' if next == Some('=') => {
                tokens.push(Token::NotEq);
                i += 2;
            }
            '?' if next == Some(':') => {
                tokens.push(Token::Elvis);
                i += 2;
            }
            _ => {
                let token = match c {
                    '.' => Token::Dot,
                    ',' => Token::Comma,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    '|' => Token::Pipe,
                    '~' => Token::Tilde,
                    '+' => Token::Plus,
                    '?' => Token::Question,
                    ':' => Token::Colon,
                    other => {
                        return Err(ExpressionError::syntax(
                            src,
                            format!("unexpected character '{other}'"),
                        ))
                    }
                };
                tokens.push(token);
                i += 1;
            }
        }
    }

    Ok(tokens)
}

/// Parse one expression in the given dialect
pub(crate) fn parse(src: &str, dialect: Dialect) -> Result<Expr> {
    let tokens = tokenize(src)?;
    if tokens.is_empty() {
        return Err(ExpressionError::syntax(src, "empty expression"));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        src,
        dialect,
    };
    let expr = match dialect {
        Dialect::Template => parser.concat()?,
        Dialect::Legacy => parser.conditional()?,
    };
    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(parser.error(format!("unexpected token {token:?}"))),
    }
}

struct Parser<'s> {
    tokens: Vec<Token>,
    pos: usize,
    src: &'s str,
    dialect: Dialect,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<()> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(format!("expected {expected:?}")))
        }
    }

    fn error(&self, message: impl Into<String>) -> ExpressionError {
        ExpressionError::syntax(self.src, message)
    }

    fn ident(&mut self) -> Result<String> {
        match self.advance() {
            Some(Token::Ident(name)) => Ok(name),
            other => Err(self.error(format!("expected identifier, found {other:?}"))),
        }
    }

    fn root(&mut self) -> Result<Expr> {
        match self.dialect {
            Dialect::Template => self.concat(),
            Dialect::Legacy => self.conditional(),
        }
    }

    // template: filtered ('~' filtered)*
    fn concat(&mut self) -> Result<Expr> {
        let mut parts = vec![self.filtered()?];
        while self.eat(&Token::Tilde) {
            parts.push(self.filtered()?);
        }
        Ok(if parts.len() == 1 {
            parts.remove(0)
        } else {
            Expr::Concat(parts)
        })
    }

    // template: postfix ('|' name args?)*
    fn filtered(&mut self) -> Result<Expr> {
        let mut expr = self.postfix()?;
        while self.eat(&Token::Pipe) {
            let name = self.ident()?;
            let args = if self.peek() == Some(&Token::LParen) {
                self.arguments()?
            } else {
                Vec::new()
            };
            expr = Expr::Call {
                target: Box::new(expr),
                name,
                args,
            };
        }
        Ok(expr)
    }

    // legacy: elvis ('?' conditional ':' conditional)?
    fn conditional(&mut self) -> Result<Expr> {
        let cond = self.elvis()?;
        if !self.eat(&Token::Question) {
            return Ok(cond);
        }
        let then = self.conditional()?;
        self.expect(&Token::Colon)?;
        let otherwise = self.conditional()?;
        Ok(Expr::Conditional {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    // legacy: equality ('?:' elvis)?
    fn elvis(&mut self) -> Result<Expr> {
        let left = self.equality()?;
        if self.eat(&Token::Elvis) {
            let right = self.elvis()?;
            return Ok(Expr::Elvis(Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    // legacy: additive (('==' | '!=') additive)?
    fn equality(&mut self) -> Result<Expr> {
        let left = self.additive()?;
        let negated = match self.peek() {
            Some(Token::EqEq) => false,
            Some(Token::NotEq) => true,
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.additive()?;
        Ok(Expr::Compare {
            left: Box::new(left),
            right: Box::new(right),
            negated,
        })
    }

    // legacy: postfix ('+' postfix)*
    fn additive(&mut self) -> Result<Expr> {
        let mut expr = self.postfix()?;
        while self.eat(&Token::Plus) {
            let right = self.postfix()?;
            expr = Expr::Add(Box::new(expr), Box::new(right));
        }
        Ok(expr)
    }

    fn postfix(&mut self) -> Result<Expr> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(&Token::Dot) {
                let name = self.ident()?;
                if self.dialect == Dialect::Legacy && self.peek() == Some(&Token::LParen) {
                    let args = self.arguments()?;
                    expr = Expr::Call {
                        target: Box::new(expr),
                        name,
                        args,
                    };
                } else {
                    expr = Expr::Attr(Box::new(expr), name);
                }
            } else if self.eat(&Token::LBracket) {
                let index = self.root()?;
                self.expect(&Token::RBracket)?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else {
                return Ok(expr);
            }
        }
    }

    fn arguments(&mut self) -> Result<Vec<Expr>> {
        self.expect(&Token::LParen)?;
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.root()?);
            if self.eat(&Token::RParen) {
                return Ok(args);
            }
            self.expect(&Token::Comma)?;
        }
    }

    fn primary(&mut self) -> Result<Expr> {
        match self.advance() {
            Some(Token::Str(s)) => Ok(Expr::Literal(ParamValue::String(s))),
            Some(Token::Int(i)) => Ok(Expr::Literal(ParamValue::Number(Number::from(i)))),
            Some(Token::Float(f)) => Ok(Expr::Literal(
                Number::from_f64(f).map_or(ParamValue::Null, ParamValue::Number),
            )),
            Some(Token::Ident(name)) => Ok(match (self.dialect, name.as_str()) {
                (_, "true") | (Dialect::Template, "True") => Expr::Literal(ParamValue::Bool(true)),
                (_, "false") | (Dialect::Template, "False") => {
                    Expr::Literal(ParamValue::Bool(false))
                }
                (_, "null") | (Dialect::Template, "none" | "None") => {
                    Expr::Literal(ParamValue::Null)
                }
                _ => Expr::Variable(name),
            }),
            Some(Token::LParen) => {
                let expr = self.root()?;
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            other => Err(self.error(format!("unexpected token {other:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Box<Expr> {
        Box::new(Expr::Variable(name.into()))
    }

    #[test]
    fn template_path_and_filter() {
        let expr = parse("db.host | upper", Dialect::Template).unwrap();
        assert_eq!(
            expr,
            Expr::Call {
                target: Box::new(Expr::Attr(var("db"), "host".into())),
                name: "upper".into(),
                args: vec![],
            }
        );
    }

    #[test]
    fn template_concat_and_default() {
        let expr = parse("A ~ '-' ~ (B | default('x'))", Dialect::Template).unwrap();
        let Expr::Concat(parts) = expr else {
            panic!("expected concat")
        };
        assert_eq!(parts.len(), 3);
    }

    #[test]
    fn template_rejects_legacy_operators() {
        assert!(parse("A + B", Dialect::Template).is_err());
        assert!(parse("A ?: B", Dialect::Template).is_err());
        assert!(parse("A.toUpperCase()", Dialect::Template).is_err());
    }

    #[test]
    fn legacy_method_and_elvis() {
        let expr = parse("NAME.toUpperCase() ?: 'none'", Dialect::Legacy).unwrap();
        assert!(matches!(expr, Expr::Elvis(_, _)));
    }

    #[test]
    fn legacy_conditional() {
        let expr = parse("ENV == 'prod' ? 3 : 1", Dialect::Legacy).unwrap();
        let Expr::Conditional { cond, .. } = expr else {
            panic!("expected conditional")
        };
        assert!(matches!(*cond, Expr::Compare { negated: false, .. }));
    }

    #[test]
    fn literals() {
        assert_eq!(
            parse("'it\\'s'", Dialect::Legacy).unwrap(),
            Expr::Literal(ParamValue::String("it's".into()))
        );
        assert_eq!(
            parse("none", Dialect::Template).unwrap(),
            Expr::Literal(ParamValue::Null)
        );
        assert!(matches!(
            parse("1.5", Dialect::Legacy).unwrap(),
            Expr::Literal(ParamValue::Number(_))
        ));
    }

    #[test]
    fn index_access() {
        let expr = parse("hosts[0]['name']", Dialect::Template).unwrap();
        assert!(matches!(expr, Expr::Index(_, _)));
    }

    #[test]
    fn trailing_tokens_fail() {
        assert!(parse("A B", Dialect::Legacy).is_err());
        assert!(parse("", Dialect::Legacy).is_err());
        assert!(parse("'open", Dialect::Legacy).is_err());
    }
}
