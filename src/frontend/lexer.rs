use thiserror::Error;

use crate::frontend::token::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub line: usize,
    pub col: usize,
}

#[derive(Debug, Clone)]
pub struct Spanned {
    pub token: Token,
    pub span: Span,
}

#[derive(Debug, Error)]
#[error("{line}:{col}: {message}")]
pub struct LexerError {
    pub message: String,
    pub line: usize,
    pub col: usize,
}

pub struct Lexer {
    source: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            source: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn current(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    fn peek(&self) -> Option<char> {
        self.source.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current();
        if ch == Some('\n') {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        self.pos += 1;
        ch
    }

    fn span(&self) -> Span {
        Span {
            line: self.line,
            col: self.col,
        }
    }

    fn error_at(&self, span: Span, message: impl Into<String>) -> LexerError {
        LexerError {
            message: message.into(),
            line: span.line,
            col: span.col,
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current() {
            if ch == ' ' || ch == '\t' || ch == '\r' {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_comment(&mut self) -> Token {
        self.advance();
        self.advance();
        let mut comment = String::new();
        while let Some(ch) = self.current() {
            if ch == '\n' {
                break;
            }
            comment.push(ch);
            self.advance();
        }
        Token::Comment(comment.trim().to_string())
    }

    /// Reads `'x'` or an escaped `'\n'`, `'\r'`, `'\t'`, `'\\'`, `'\''`.
    fn read_char(&mut self) -> Result<Token, LexerError> {
        let start = self.span();
        self.advance();

        let value = match self.current() {
            Some('\\') => {
                self.advance();
                let escaped = match self.current() {
                    Some('n') => '\n',
                    Some('r') => '\r',
                    Some('t') => '\t',
                    Some('\\') => '\\',
                    Some('\'') => '\'',
                    Some(ch) => {
                        return Err(
                            self.error_at(self.span(), format!("unknown escape sequence: \\{}", ch))
                        );
                    }
                    None => {
                        return Err(self.error_at(self.span(), "unexpected EOF in escape sequence"));
                    }
                };
                self.advance();
                escaped
            }
            Some('\'') | Some('\n') | None => {
                return Err(self.error_at(start, "empty character literal"));
            }
            Some(ch) => {
                self.advance();
                ch
            }
        };

        if self.current() != Some('\'') {
            return Err(self.error_at(start, "unterminated character literal"));
        }
        self.advance();

        let byte = u8::try_from(u32::from(value)).map_err(|_| {
            self.error_at(start, format!("character {:?} does not fit in a cell", value))
        })?;
        Ok(Token::Char(byte))
    }

    fn read_number(&mut self) -> Result<Token, LexerError> {
        let start = self.span();

        let mut digits = String::new();
        while let Some(ch) = self.current() {
            if ch.is_ascii_digit() {
                digits.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if self.current().is_some_and(|c| c.is_alphabetic() || c == '_') {
            return Err(self.error_at(start, format!("invalid number: {}", digits)));
        }

        digits
            .parse::<u8>()
            .map(Token::Number)
            .map_err(|_| self.error_at(start, format!("integer literal out of range: {}", digits)))
    }

    fn read_identifier(&mut self) -> Token {
        let mut ident = String::new();
        while let Some(ch) = self.current() {
            if ch.is_alphanumeric() || ch == '_' {
                ident.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        match ident.as_str() {
            "func" => Token::Func,
            "var" => Token::Var,
            "return" => Token::Return,
            "while" => Token::While,
            "do" => Token::Do,
            "if" => Token::If,
            "else" => Token::Else,
            _ => Token::Ident(ident),
        }
    }

    fn read_operator(&mut self) -> Option<Token> {
        let ch = self.current()?;
        let next = self.peek();

        let token = match (ch, next) {
            ('=', Some('=')) => {
                self.advance();
                Token::EqEq
            }
            ('=', _) => Token::Assign,
            ('>', _) => Token::Gt,
            ('+', _) => Token::Plus,
            ('-', _) => Token::Minus,
            ('*', _) => Token::Star,
            ('/', _) => Token::Slash,
            ('(', _) => Token::LParen,
            (')', _) => Token::RParen,
            ('{', _) => Token::LBrace,
            ('}', _) => Token::RBrace,
            (',', _) => Token::Comma,
            (':', _) => Token::Colon,
            (';', _) => Token::Semicolon,
            _ => return None,
        };
        self.advance();

        Some(token)
    }

    pub fn tokenize(&mut self) -> Result<Vec<Spanned>, LexerError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace();
            let span = self.span();

            match self.current() {
                None => {
                    tokens.push(Spanned {
                        token: Token::Eof,
                        span,
                    });
                    break;
                }
                Some('\n') => {
                    tokens.push(Spanned {
                        token: Token::Newline,
                        span,
                    });
                    self.advance();
                }
                Some('/') if self.peek() == Some('/') => {
                    let token = self.read_comment();
                    tokens.push(Spanned { token, span });
                }
                Some('\'') => {
                    let token = self.read_char()?;
                    tokens.push(Spanned { token, span });
                }
                Some(ch) if ch.is_ascii_digit() => {
                    let token = self.read_number()?;
                    tokens.push(Spanned { token, span });
                }
                Some(ch) if ch.is_alphabetic() || ch == '_' => {
                    let token = self.read_identifier();
                    tokens.push(Spanned { token, span });
                }
                Some(ch) => {
                    if let Some(token) = self.read_operator() {
                        tokens.push(Spanned { token, span });
                    } else {
                        return Err(self.error_at(span, format!("unexpected character: '{}'", ch)));
                    }
                }
            }
        }

        Ok(tokens)
    }

    pub fn tokenize_clean(&mut self) -> Result<Vec<Spanned>, LexerError> {
        let tokens = self.tokenize()?;
        Ok(tokens
            .into_iter()
            .filter(|t| !matches!(t.token, Token::Comment(_) | Token::Newline))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(source);
        lexer
            .tokenize_clean()
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .filter(|t| !matches!(t, Token::Eof))
            .collect()
    }

    fn lex_err(source: &str) -> LexerError {
        Lexer::new(source).tokenize().unwrap_err()
    }

    #[test]
    fn test_print_call() {
        assert_eq!(
            tokens("print(72);"),
            vec![
                Token::Ident("print".to_string()),
                Token::LParen,
                Token::Number(72),
                Token::RParen,
                Token::Semicolon,
            ]
        );
    }

    #[test]
    fn test_keywords() {
        assert_eq!(
            tokens("func var return while do if else function"),
            vec![
                Token::Func,
                Token::Var,
                Token::Return,
                Token::While,
                Token::Do,
                Token::If,
                Token::Else,
                Token::Ident("function".to_string()),
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            tokens("a = b == c > 1 + 2 - 3 * 4 / 5"),
            vec![
                Token::Ident("a".to_string()),
                Token::Assign,
                Token::Ident("b".to_string()),
                Token::EqEq,
                Token::Ident("c".to_string()),
                Token::Gt,
                Token::Number(1),
                Token::Plus,
                Token::Number(2),
                Token::Minus,
                Token::Number(3),
                Token::Star,
                Token::Number(4),
                Token::Slash,
                Token::Number(5),
            ]
        );
    }

    #[test]
    fn test_function_header() {
        assert_eq!(
            tokens("func f(x:int):int {}"),
            vec![
                Token::Func,
                Token::Ident("f".to_string()),
                Token::LParen,
                Token::Ident("x".to_string()),
                Token::Colon,
                Token::Ident("int".to_string()),
                Token::RParen,
                Token::Colon,
                Token::Ident("int".to_string()),
                Token::LBrace,
                Token::RBrace,
            ]
        );
    }

    #[test]
    fn test_char_literals() {
        assert_eq!(
            tokens(r"'A' '\n' '\\' '\''"),
            vec![
                Token::Char(b'A'),
                Token::Char(b'\n'),
                Token::Char(b'\\'),
                Token::Char(b'\''),
            ]
        );
    }

    #[test]
    fn test_comments_are_dropped_by_clean() {
        assert_eq!(
            tokens("1 // one\n2"),
            vec![Token::Number(1), Token::Number(2)]
        );

        let raw: Vec<Token> = Lexer::new("// hi\n")
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect();
        assert_eq!(
            raw,
            vec![Token::Comment("hi".to_string()), Token::Newline, Token::Eof]
        );
    }

    #[test]
    fn test_spans() {
        let spanned = Lexer::new("var\n  x").tokenize_clean().unwrap();
        assert_eq!(spanned[0].span, Span { line: 1, col: 1 });
        assert_eq!(spanned[1].span, Span { line: 2, col: 3 });
    }

    #[test]
    fn test_number_out_of_range() {
        let err = lex_err("256");
        assert!(err.message.contains("out of range"));
        assert_eq!((err.line, err.col), (1, 1));
        assert_eq!(tokens("255"), vec![Token::Number(255)]);
    }

    #[test]
    fn test_bad_char_literals() {
        assert!(lex_err("''").message.contains("empty"));
        assert!(lex_err("'ab'").message.contains("unterminated"));
        assert!(lex_err(r"'\q'").message.contains("escape"));
    }

    #[test]
    fn test_unexpected_character() {
        let err = lex_err("a $ b");
        assert_eq!(err.to_string(), "1:3: unexpected character: '$'");
    }
}
