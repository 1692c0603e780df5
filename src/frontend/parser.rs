use crate::frontend::lexer::{Span, Spanned};
use crate::frontend::parser_error::ParserError;
use crate::frontend::token::Token;
use crate::lang::data_type::DataType;
use crate::lang::node::{BinaryOp, Expr, ExprKind, FuncDecl, Param, Program, Stmt};

/// Recursive-descent parser.
///
/// The parser consumes a stream of lexed `Spanned` tokens and produces a
/// `Program`, the statement list of the main block.
///
/// Notes:
/// - Comments and newlines are filtered out in `Parser::new`.
/// - Binary operators use precedence climbing; every operator is
///   left-associative, including `=`, so `a = b = 1` is rejected later as an
///   assignment to a non-variable.
pub struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    /// Span of the most recently consumed token.
    ///
    /// Used to provide stable source locations for errors that occur at
    /// end of input.
    last_span: Option<Span>,
}

impl Parser {
    /// Creates a new parser from lexer output, dropping comments and newlines.
    pub fn new(tokens: Vec<Spanned>) -> Self {
        let tokens: Vec<Spanned> = tokens
            .into_iter()
            .filter(|t| !matches!(t.token, Token::Comment(_) | Token::Newline))
            .collect();
        Parser {
            tokens,
            pos: 0,
            last_span: None,
        }
    }

    /// Returns the current token without consuming it.
    fn current(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    /// Advances the token stream by one and returns the consumed token.
    fn advance(&mut self) -> Option<&Spanned> {
        let token = self.tokens.get(self.pos);
        if let Some(s) = token {
            self.last_span = Some(s.span);
        }
        self.pos += 1;
        token
    }

    /// Peeks the current token kind without consuming it.
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn at(&self, token: &Token) -> bool {
        self.peek() == Some(token)
    }

    fn at_end(&self) -> bool {
        matches!(self.peek(), None | Some(Token::Eof))
    }

    /// Span of the current token, or of the last consumed one at end of input.
    fn span(&self) -> Span {
        self.current()
            .map(|s| s.span)
            .or(self.last_span)
            .unwrap_or(Span { line: 1, col: 1 })
    }

    /// Constructs a `ParserError` at the most relevant location.
    fn error(&self, message: &str) -> ParserError {
        let span = self.span();
        ParserError {
            message: message.to_string(),
            line: span.line,
            col: span.col,
        }
    }

    /// Consumes `expected` or fails with "expected X, found Y".
    fn expect(&mut self, expected: Token) -> Result<(), ParserError> {
        if self.at(&expected) {
            self.advance();
            return Ok(());
        }
        let found = self
            .peek()
            .map(Token::describe)
            .unwrap_or_else(|| "end of file".to_string());
        Err(self.error(&format!(
            "expected {}, found {}",
            expected.describe(),
            found
        )))
    }

    fn expect_ident(&mut self, what: &str) -> Result<(String, Span), ParserError> {
        match self.current() {
            Some(Spanned {
                token: Token::Ident(name),
                span,
            }) => {
                let result = (name.clone(), *span);
                self.advance();
                Ok(result)
            }
            _ => Err(self.error(&format!("expected {}", what))),
        }
    }

    /// Parses a complete compilation unit up to `Token::Eof`.
    pub fn parse(&mut self) -> Result<Program, ParserError> {
        let mut statements = Vec::new();
        while !self.at_end() {
            statements.push(self.parse_statement()?);
        }
        Ok(Program { statements })
    }

    /// Parses one statement.
    pub fn parse_statement(&mut self) -> Result<Stmt, ParserError> {
        match self.peek() {
            Some(Token::Func) => self.parse_function().map(Stmt::Func),
            Some(Token::Return) => self.parse_return(),
            Some(Token::Var) => self.parse_variable(),
            Some(Token::LBrace) => self.parse_block(),
            Some(Token::While) => self.parse_while(),
            Some(Token::Do) => self.parse_do_while(),
            Some(Token::If) => self.parse_if(),
            None | Some(Token::Eof) => {
                Err(self.error("unexpected end of file, expected a statement"))
            }
            Some(_) => {
                let expr = self.parse_expression()?;
                self.expect(Token::Semicolon)?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    /// Parses a function declaration:
    ///
    /// ```text
    /// func <name>(<param>: <type>, ...) [: <type>] <statement>
    /// ```
    ///
    /// A missing return type means `void`.
    fn parse_function(&mut self) -> Result<FuncDecl, ParserError> {
        let span = self.span();
        self.advance(); // consume 'func'

        let (name, _) = self.expect_ident("function name after 'func'")?;
        self.expect(Token::LParen)?;

        let mut params = Vec::new();
        if !self.at(&Token::RParen) {
            loop {
                params.push(self.parse_parameter()?);
                if self.at(&Token::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(Token::RParen)?;

        let return_type = if self.at(&Token::Colon) {
            self.advance();
            self.parse_type()?
        } else {
            DataType::Void
        };

        let body = self.parse_statement()?;
        Ok(FuncDecl {
            name,
            params,
            return_type,
            body: Box::new(body),
            span,
        })
    }

    fn parse_parameter(&mut self) -> Result<Param, ParserError> {
        let (name, span) = self.expect_ident("parameter name")?;
        self.expect(Token::Colon)?;
        let ty = self.parse_type()?;
        Ok(Param { name, ty, span })
    }

    fn parse_type(&mut self) -> Result<DataType, ParserError> {
        let span = self.span();
        let (name, _) = self.expect_ident("type name")?;
        DataType::from_name(&name).ok_or_else(|| ParserError {
            message: format!("unknown type '{}'", name),
            line: span.line,
            col: span.col,
        })
    }

    /// `return [expr];`
    fn parse_return(&mut self) -> Result<Stmt, ParserError> {
        let span = self.span();
        self.advance(); // consume 'return'

        let value = if self.at(&Token::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(Token::Semicolon)?;
        Ok(Stmt::Return { value, span })
    }

    /// `var <name> = <expr>;`
    fn parse_variable(&mut self) -> Result<Stmt, ParserError> {
        self.advance(); // consume 'var'

        let (name, span) = self.expect_ident("variable name after 'var'")?;
        self.expect(Token::Assign)?;
        let value = self.parse_expression()?;
        self.expect(Token::Semicolon)?;
        Ok(Stmt::Var { name, value, span })
    }

    /// `{ <statement>* }`
    fn parse_block(&mut self) -> Result<Stmt, ParserError> {
        self.advance(); // consume '{'

        let mut statements = Vec::new();
        while !self.at(&Token::RBrace) {
            if self.at_end() {
                return Err(self.error("unexpected end of file, expected '}'"));
            }
            statements.push(self.parse_statement()?);
        }
        self.advance(); // consume '}'
        Ok(Stmt::Block(statements))
    }

    /// `while (<expr>) <statement>`
    fn parse_while(&mut self) -> Result<Stmt, ParserError> {
        self.advance(); // consume 'while'
        let cond = self.parse_parenthesis()?;
        let body = self.parse_statement()?;
        Ok(Stmt::While {
            cond,
            body: Box::new(body),
        })
    }

    /// `do <statement> while (<expr>);`
    fn parse_do_while(&mut self) -> Result<Stmt, ParserError> {
        self.advance(); // consume 'do'
        let body = self.parse_statement()?;
        self.expect(Token::While)?;
        let cond = self.parse_parenthesis()?;
        self.expect(Token::Semicolon)?;
        Ok(Stmt::DoWhile {
            body: Box::new(body),
            cond,
        })
    }

    /// `if (<expr>) <statement> [else <statement>]`
    fn parse_if(&mut self) -> Result<Stmt, ParserError> {
        self.advance(); // consume 'if'
        let cond = self.parse_parenthesis()?;
        let then_branch = self.parse_statement()?;
        let else_branch = if self.at(&Token::Else) {
            self.advance();
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Stmt::If {
            cond,
            then_branch: Box::new(then_branch),
            else_branch,
        })
    }

    fn parse_parenthesis(&mut self) -> Result<Expr, ParserError> {
        self.expect(Token::LParen)?;
        let expr = self.parse_expression()?;
        self.expect(Token::RParen)?;
        Ok(expr)
    }

    // ==========================================================================
    // Expressions
    // ==========================================================================

    pub fn parse_expression(&mut self) -> Result<Expr, ParserError> {
        self.parse_binary(0)
    }

    /// Precedence climbing: the right operand binds at `precedence + 1`.
    fn parse_binary(&mut self, min_precedence: u8) -> Result<Expr, ParserError> {
        let mut lhs = self.parse_primary()?;

        while let Some(op) = self.peek().and_then(binary_op) {
            if op.precedence() < min_precedence {
                break;
            }
            let span = self.span();
            self.advance();
            let rhs = self.parse_binary(op.precedence() + 1)?;
            lhs = Expr {
                kind: ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            };
        }

        Ok(lhs)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParserError> {
        let span = self.span();
        let token = match self.current() {
            Some(s) => s.token.clone(),
            None => return Err(self.error("unexpected end of file, expected an expression")),
        };

        match token {
            Token::Number(n) | Token::Char(n) => {
                self.advance();
                Ok(Expr {
                    kind: ExprKind::Number(n),
                    span,
                })
            }
            Token::Ident(name) => {
                self.advance();
                if !self.at(&Token::LParen) {
                    return Ok(Expr {
                        kind: ExprKind::Variable(name),
                        span,
                    });
                }

                self.advance(); // consume '('
                let mut args = Vec::new();
                if !self.at(&Token::RParen) {
                    loop {
                        args.push(self.parse_expression()?);
                        if self.at(&Token::Comma) {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                }
                self.expect(Token::RParen)?;
                Ok(Expr {
                    kind: ExprKind::Call { name, args },
                    span,
                })
            }
            Token::LParen => self.parse_parenthesis(),
            other => Err(self.error(&format!(
                "unexpected {}, expected an expression",
                other.describe()
            ))),
        }
    }
}

fn binary_op(token: &Token) -> Option<BinaryOp> {
    Some(match token {
        Token::Assign => BinaryOp::Assign,
        Token::EqEq => BinaryOp::Eq,
        Token::Gt => BinaryOp::Greater,
        Token::Plus => BinaryOp::Add,
        Token::Minus => BinaryOp::Sub,
        Token::Star => BinaryOp::Mul,
        Token::Slash => BinaryOp::Div,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::Lexer;

    fn parse(source: &str) -> Program {
        let mut lexer = Lexer::new(source);
        let tokens = lexer.tokenize().unwrap();
        let mut parser = Parser::new(tokens);
        parser.parse().unwrap()
    }

    fn parse_err(source: &str) -> ParserError {
        let mut lexer = Lexer::new(source);
        let tokens = lexer.tokenize().unwrap();
        let mut parser = Parser::new(tokens);
        parser.parse().unwrap_err()
    }

    /// Renders an expression with explicit parentheses.
    fn show(expr: &Expr) -> String {
        match &expr.kind {
            ExprKind::Number(n) => n.to_string(),
            ExprKind::Variable(name) => name.clone(),
            ExprKind::Call { name, args } => {
                let args: Vec<String> = args.iter().map(show).collect();
                format!("{}({})", name, args.join(","))
            }
            ExprKind::Binary { op, lhs, rhs } => {
                format!("({} {} {})", show(lhs), op.symbol(), show(rhs))
            }
        }
    }

    fn expr(source: &str) -> String {
        match &parse(&format!("{};", source)).statements[0] {
            Stmt::Expr(e) => show(e),
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn test_precedence() {
        assert_eq!(expr("1 + 2 * 3"), "(1 + (2 * 3))");
        assert_eq!(expr("1 * 2 + 3"), "((1 * 2) + 3)");
        assert_eq!(expr("a = b + 1 > 2 == 0"), "(a = (((b + 1) > 2) == 0))");
    }

    #[test]
    fn test_left_associative() {
        assert_eq!(expr("8 - 4 - 2"), "((8 - 4) - 2)");
        assert_eq!(expr("8 / 4 / 2"), "((8 / 4) / 2)");
    }

    #[test]
    fn test_parenthesis_and_calls() {
        assert_eq!(expr("(1 + 2) * f(3, g())"), "((1 + 2) * f(3,g()))");
        assert_eq!(expr("'A'"), "65");
    }

    #[test]
    fn test_statements() {
        let program = parse(
            "var a = 5; { a = a + 1; } while (a) a = a - 1; \
             do print(a); while (0); if (a) print(1); else print(0);",
        );
        assert_eq!(program.statements.len(), 5);
        assert!(matches!(program.statements[0], Stmt::Var { ref name, .. } if name == "a"));
        assert!(matches!(program.statements[1], Stmt::Block(ref s) if s.len() == 1));
        assert!(matches!(program.statements[2], Stmt::While { .. }));
        assert!(matches!(program.statements[3], Stmt::DoWhile { .. }));
        assert!(matches!(
            program.statements[4],
            Stmt::If {
                else_branch: Some(_),
                ..
            }
        ));
    }

    #[test]
    fn test_function_declaration() {
        let program =
            parse("func add(a: int, b: int): int { return a + b; } func hello() print('h');");
        match &program.statements[0] {
            Stmt::Func(f) => {
                assert_eq!(f.name, "add");
                assert_eq!(f.params.len(), 2);
                assert_eq!(f.params[1].name, "b");
                assert_eq!(f.return_type, DataType::Int);
            }
            other => panic!("expected function, got {:?}", other),
        }
        match &program.statements[1] {
            Stmt::Func(f) => {
                assert!(f.params.is_empty());
                assert_eq!(f.return_type, DataType::Void);
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_return_forms() {
        let program = parse("func f() { return; } func g(): int { return 1; }");
        assert_eq!(program.statements.len(), 2);
    }

    #[test]
    fn test_missing_semicolon() {
        let err = parse_err("print(1)");
        assert!(err.message.contains("expected ';'"), "{}", err.message);
        assert_eq!(err.line, 1);
    }

    #[test]
    fn test_unclosed_block() {
        let err = parse_err("{ print(1);");
        assert!(err.message.contains("expected '}'"), "{}", err.message);
    }

    #[test]
    fn test_unknown_type() {
        let err = parse_err("func f(x: float) {}");
        assert_eq!(err.message, "unknown type 'float'");
        assert_eq!((err.line, err.col), (1, 11));
    }

    #[test]
    fn test_unexpected_token_in_expression() {
        let err = parse_err("var a = ;");
        assert!(err.message.contains("unexpected ';'"), "{}", err.message);
    }

    #[test]
    fn test_error_location_on_second_line() {
        let err = parse_err("print(1);\nvar = 3;");
        assert_eq!(err.line, 2);
        assert_eq!(err.col, 5);
    }
}
