use crate::frontend::lexer::Spanned;
use crate::frontend::token::Token;

pub struct TokenDumper {
    pub color: bool,
    pub show_debug_repr: bool, // if false, prints a nicer value for some tokens
}

impl Default for TokenDumper {
    fn default() -> Self {
        Self {
            color: true,
            show_debug_repr: true,
        }
    }
}

impl TokenDumper {
    // ANSI colors
    const RESET: &'static str = "\x1b[0m";
    const DIM: &'static str = "\x1b[2m";
    const YEL: &'static str = "\x1b[33m";
    const CYN: &'static str = "\x1b[36m";
    const MAG: &'static str = "\x1b[35m";
    const BLU: &'static str = "\x1b[34m";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn no_color(mut self) -> Self {
        self.color = false;
        self
    }

    pub fn pretty(mut self) -> Self {
        self.show_debug_repr = false;
        self
    }

    pub fn dump(&self, tokens: &[Spanned]) {
        for s in tokens {
            println!("{}", self.format_one(s));
        }
    }

    pub fn format_one(&self, s: &Spanned) -> String {
        let line = s.span.line;
        let col = s.span.col;

        let kind = Self::kind(&s.token);
        let colr = if self.color { Self::color(&s.token) } else { "" };
        let reset = if self.color { Self::RESET } else { "" };

        let text = if self.show_debug_repr {
            format!("{:?}", s.token)
        } else {
            match &s.token {
                Token::Comment(c) => format!("COMMENT: {}", c),
                Token::Newline => "NEWLINE".to_string(),
                other => other.describe(),
            }
        };

        format!(
            "[{:02}:{:02}] {}{:<8} {}{}",
            line, col, colr, kind, text, reset
        )
    }

    fn kind(t: &Token) -> &'static str {
        use Token::*;
        match t {
            Newline => "NEWLINE",
            Comment(_) => "COMMENT",
            Eof => "EOF",

            Number(_) => "INT",
            Char(_) => "CHAR",

            Ident(_) => "IDENT",

            LParen | RParen => "PAREN",
            LBrace | RBrace => "BRACE",
            Comma | Colon | Semicolon => "PUNCT",

            Assign | Plus | Minus | Star | Slash => "OP",
            EqEq | Gt => "CMP",

            Func | Var | Return | While | Do | If | Else => "KEYWORD",
        }
    }

    fn color(t: &Token) -> &'static str {
        use Token::*;
        match t {
            Newline | Comment(_) | Eof => Self::DIM,
            Number(_) | Char(_) => Self::CYN,
            Ident(_) => Self::YEL,
            Assign | Plus | Minus | Star | Slash | EqEq | Gt => Self::MAG,
            Func | Var | Return | While | Do | If | Else => Self::BLU,
            _ => Self::RESET,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::Lexer;

    #[test]
    fn test_plain_dump() {
        let tokens = Lexer::new("var x").tokenize().unwrap();
        let dumper = TokenDumper::new().no_color();
        assert_eq!(dumper.format_one(&tokens[0]), "[01:01] KEYWORD  Var");
        assert_eq!(
            dumper.format_one(&tokens[1]),
            "[01:05] IDENT    Ident(\"x\")"
        );
    }

    #[test]
    fn test_pretty_dump() {
        let tokens = Lexer::new("'a' // c").tokenize().unwrap();
        let dumper = TokenDumper::new().no_color().pretty();
        assert_eq!(
            dumper.format_one(&tokens[0]),
            "[01:01] CHAR     character literal 'a'"
        );
        assert_eq!(dumper.format_one(&tokens[1]), "[01:05] COMMENT  COMMENT: c");
    }

    #[test]
    fn test_colored_output_resets() {
        let tokens = Lexer::new("42").tokenize().unwrap();
        let line = TokenDumper::new().format_one(&tokens[0]);
        assert!(line.starts_with("[01:01] \x1b[36m"));
        assert!(line.ends_with("\x1b[0m"));
    }
}
