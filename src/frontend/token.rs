#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Number(u8),
    Char(u8),

    // Keywords
    Func,
    Var,
    Return,
    While,
    Do,
    If,
    Else,

    // Operators
    Assign, // =
    EqEq,   // ==
    Gt,     // >
    Plus,
    Minus,
    Star,
    Slash,

    // Delimiters
    LParen,    // (
    RParen,    // )
    LBrace,    // {
    RBrace,    // }
    Comma,     // ,
    Colon,     // :
    Semicolon, // ;

    // Identifier (variable, function or type name)
    Ident(String),

    // Special
    Comment(String),
    Newline,
    Eof,
}

impl Token {
    /// Short human-readable form for error messages.
    pub fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {}", n),
            Token::Char(c) => format!("character literal {:?}", char::from(*c)),
            Token::Ident(name) => format!("identifier '{}'", name),
            Token::Comment(_) => "comment".to_string(),
            Token::Newline => "newline".to_string(),
            Token::Eof => "end of file".to_string(),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Token::Func => "func",
            Token::Var => "var",
            Token::Return => "return",
            Token::While => "while",
            Token::Do => "do",
            Token::If => "if",
            Token::Else => "else",
            Token::Assign => "=",
            Token::EqEq => "==",
            Token::Gt => ">",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::Comma => ",",
            Token::Colon => ":",
            Token::Semicolon => ";",
            _ => "?",
        }
    }
}
