//! Logos-based tokenizer for equation descriptions.

use logos::Logos;
use std::fmt;
use std::ops::Range;

use super::ParseError;

pub type Span = Range<usize>;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum Token {
    // --- Operators & Punctuation ---
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("^")]
    Caret,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
    #[token("=")]
    Eq,
    #[token("<>")]
    Ne,
    #[token(">=")]
    Ge,
    #[token("<=")]
    Le,
    #[token(">")]
    Gt,
    #[token("<")]
    Lt,

    // --- Literals ---
    /// Bare quarter literal: `2008Q1`, `2008q1` or `2008:1`.
    #[regex(r"[0-9]{4}([Qq][0-9]|:[0-9][0-9]?)", |lex| lex.slice().to_string())]
    Quarter(String),
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Integer(i64),
    #[regex(r"[0-9]+\.[0-9]*([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),
    #[regex(r#""[^"]*""#, |lex| {
        let s = lex.slice();
        s[1..s.len() - 1].to_string()
    })]
    Str(String),

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
    /// `@name`, stored without the sigil.
    #[regex(r"@[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice()[1..].to_string())]
    At(String),
}

impl Token {
    pub fn is_ident(&self, name: &str) -> bool {
        matches!(self, Token::Ident(s) if s.eq_ignore_ascii_case(name))
    }

    pub fn is_at(&self, name: &str) -> bool {
        matches!(self, Token::At(s) if s.eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Caret => write!(f, "^"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Comma => write!(f, ","),
            Token::Eq => write!(f, "="),
            Token::Ne => write!(f, "<>"),
            Token::Ge => write!(f, ">="),
            Token::Le => write!(f, "<="),
            Token::Gt => write!(f, ">"),
            Token::Lt => write!(f, "<"),
            Token::Quarter(s) | Token::Ident(s) => write!(f, "{}", s),
            Token::Integer(i) => write!(f, "{}", i),
            Token::Float(v) => write!(f, "{}", v),
            Token::Str(s) => write!(f, "\"{}\"", s),
            Token::At(s) => write!(f, "@{}", s),
        }
    }
}

pub fn tokenize(src: &str) -> Result<Vec<(Token, Span)>, ParseError> {
    let mut out = Vec::new();
    let mut lex = Token::lexer(src);
    while let Some(tok) = lex.next() {
        match tok {
            Ok(t) => out.push((t, lex.span())),
            Err(()) => {
                return Err(ParseError::Lex { offset: lex.span().start, text: lex.slice().to_string() })
            }
        }
    }
    Ok(out)
}
