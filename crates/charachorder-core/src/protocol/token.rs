//! Command tokens

use std::fmt;

/// One whitespace-free element of a command line
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Token {
    Int(i64),
    Str(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Int(value) => write!(f, "{}", value),
            Token::Str(value) => f.write_str(value),
        }
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Token::Str(value.to_string())
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Token::Str(value)
    }
}

macro_rules! int_token {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Token {
                fn from(value: $ty) -> Self {
                    Token::Int(i64::from(value))
                }
            }
        )*
    };
}

int_token!(u8, u16, u32, i32, i64);

/// Indices and counts; saturates at `i64::MAX`, far above any device index
impl From<usize> for Token {
    fn from(value: usize) -> Self {
        Token::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

/// Render a command the way it is written to the wire, without the line ending
pub fn render(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(Token::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}
