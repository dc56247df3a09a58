use cursor::{Cursor, Line};
use errors::{Diagnostic, Diagnostics};

pub mod token;
pub use token::{Token, TokenKind};
use TokenKind::*;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ScanErrorType {
    #[error("Unexpected character.")]
    UnexpectedCharacter(char),
    #[error("Unterminated string.")]
    UnterminatedString,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("[line {line}] Error: {error}")]
pub struct ScanError {
    pub error: ScanErrorType,
    pub line: Line,
}

impl From<ScanError> for Diagnostic {
    fn from(e: ScanError) -> Self {
        Diagnostic::compile(e.line, "", e.error)
    }
}

/// Scans `source` into tokens, always terminated by an `Eof` token.
///
/// Lexical errors are reported to `diagnostics`; the offending characters are
/// dropped and scanning carries on.
pub fn scan_tokens(source: &str, diagnostics: &mut Diagnostics) -> Vec<Token> {
    Scanner::new(source).scan_tokens(diagnostics)
}

pub struct Scanner<'a> {
    start: Cursor<'a>,
    current: Cursor<'a>,
    tokens: Vec<Token>,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { start: Cursor::new(source), current: Cursor::new(source), tokens: Vec::new() }
    }

    pub fn scan_tokens(mut self, diagnostics: &mut Diagnostics) -> Vec<Token> {
        while !self.current.is_at_end() {
            self.start = self.current.clone();
            if let Err(error) = self.scan_token() {
                log::trace!("Scan error: {:?}", error);
                diagnostics.report(error);
            }
        }

        self.tokens.push(Token::new(Eof, "", self.current.line()));
        log::trace!("Scanned {} tokens", self.tokens.len());

        self.tokens
    }

    fn lexeme(&self) -> &'a str {
        self.start.slice_until(&self.current)
    }

    fn error(&self, error: ScanErrorType) -> ScanError {
        ScanError { error, line: self.current.line() }
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        // Multi-line string literals report the line they end on.
        Token::new(kind, self.lexeme(), self.current.line())
    }

    fn push(&mut self, token: Token) -> Result<(), ScanError> {
        self.tokens.push(token);
        Ok(())
    }

    fn one_or_two(&mut self, single: TokenKind, double: TokenKind) -> Result<(), ScanError> {
        let kind = if self.current.advance_if('=') { double } else { single };
        let token = self.make_token(kind);
        self.push(token)
    }

    fn scan_token(&mut self) -> Result<(), ScanError> {
        let Some(c) = self.current.next() else {
            return Ok(());
        };

        let kind = match c {
            '(' => LeftParen,
            ')' => RightParen,
            '{' => LeftBrace,
            '}' => RightBrace,
            ',' => Comma,
            '.' => Dot,
            '-' => Minus,
            '+' => Plus,
            ';' => Semicolon,
            '*' => Star,

            '!' => return self.one_or_two(Bang, BangEqual),
            '=' => return self.one_or_two(Equal, EqualEqual),
            '<' => return self.one_or_two(Less, LessEqual),
            '>' => return self.one_or_two(Greater, GreaterEqual),

            '/' => {
                if self.current.advance_if('/') {
                    // Comment
                    self.current.advance_while(|c| c != '\n');
                    return Ok(());
                }
                Slash
            }

            ' ' | '\r' | '\t' | '\n' => return Ok(()),

            '"' => return self.string(),
            d if d.is_ascii_digit() => return self.number(),
            a if is_alpha(a) => return self.identifier(),

            c => return Err(self.error(ScanErrorType::UnexpectedCharacter(c))),
        };

        let token = self.make_token(kind);
        self.push(token)
    }

    fn string(&mut self) -> Result<(), ScanError> {
        self.current.advance_while(|c| c != '"');
        if !self.current.advance_if('"') {
            return Err(self.error(ScanErrorType::UnterminatedString));
        }

        let lexeme = self.lexeme();
        let literal = &lexeme[1..lexeme.len() - 1];
        let token = self.make_token(Str).with_literal(literal);
        self.push(token)
    }

    fn number(&mut self) -> Result<(), ScanError> {
        self.current.advance_while(|c| c.is_ascii_digit());

        // A trailing '.' is only part of the number if digits follow it.
        if self.current.peek() == Some('.')
            && self.current.peek_next().is_some_and(|c| c.is_ascii_digit())
        {
            self.current.next();
            self.current.advance_while(|c| c.is_ascii_digit());
        }

        let value: f64 = self.lexeme().parse().unwrap_or_default();

        let token = self.make_token(Number).with_literal(value);
        self.push(token)
    }

    fn identifier(&mut self) -> Result<(), ScanError> {
        self.current.advance_while(|c| is_alpha(c) || c.is_ascii_digit());

        let kind = TokenKind::keyword(self.lexeme()).unwrap_or(Identifier);
        let token = self.make_token(kind);
        self.push(token)
    }
}

fn is_alpha(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use value::Value;

    use super::*;

    fn scan(source: &str) -> (Vec<Token>, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let tokens = scan_tokens(source, &mut diagnostics);
        (tokens, diagnostics)
    }

    fn scan_ok(source: &str) -> Vec<Token> {
        let (tokens, diagnostics) = scan(source);
        assert!(diagnostics.is_empty(), "{diagnostics}");
        tokens
    }

    fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
        tokens.iter().map(|t| t.kind).collect()
    }

    fn eof(line: usize) -> Token {
        Token::new(Eof, "", line)
    }

    #[test]
    fn string_literals() {
        assert_eq!(
            scan_ok("\"hello world\""),
            vec![Token::new(Str, "\"hello world\"", 1).with_literal("hello world"), eof(1)]
        );

        assert_eq!(
            scan_ok("\"two\nlines\""),
            vec![Token::new(Str, "\"two\nlines\"", 2).with_literal("two\nlines"), eof(2)]
        );

        assert_eq!(scan_ok("\"\"")[0].literal, Value::from(""));
    }

    #[test]
    fn unterminated_string() {
        let (tokens, diagnostics) = scan("\"hello world\nprint");
        assert_eq!(tokens, vec![eof(2)]);
        assert_eq!(
            diagnostics.into_inner(),
            vec![Diagnostic::from(ScanError {
                error: ScanErrorType::UnterminatedString,
                line: Line(2)
            })]
        );
    }

    #[test]
    fn two_char_tokens() {
        let tokens = scan_ok("! != = == < <= > >=");
        assert_eq!(
            kinds(&tokens),
            vec![Bang, BangEqual, Equal, EqualEqual, Less, LessEqual, Greater, GreaterEqual, Eof]
        );
        assert_eq!(
            tokens.iter().map(|t| t.lexeme()).collect::<Vec<_>>(),
            vec!["!", "!=", "=", "==", "<", "<=", ">", ">=", ""]
        );
    }

    #[test]
    fn single_char_tokens() {
        assert_eq!(
            kinds(&scan_ok("=(){},.-+;*/!<>")),
            vec![
                Equal, LeftParen, RightParen, LeftBrace, RightBrace, Comma, Dot, Minus, Plus,
                Semicolon, Star, Slash, Bang, Less, Greater, Eof
            ]
        );
    }

    #[test]
    fn comments() {
        assert_eq!(
            scan_ok("a // comment\nb"),
            vec![Token::new(Identifier, "a", 1), Token::new(Identifier, "b", 2), eof(2)]
        );
        assert_eq!(scan_ok("// only a comment"), vec![eof(1)]);
    }

    #[test]
    fn numbers() {
        assert_eq!(
            scan_ok("123 4.5"),
            vec![
                Token::new(Number, "123", 1).with_literal(123.0),
                Token::new(Number, "4.5", 1).with_literal(4.5),
                eof(1)
            ]
        );

        // The trailing dot is not part of the number
        assert_eq!(
            scan_ok("7."),
            vec![Token::new(Number, "7", 1).with_literal(7.0), Token::new(Dot, ".", 1), eof(1)]
        );

        assert_eq!(kinds(&scan_ok(".5")), vec![Dot, Number, Eof]);
    }

    #[test]
    fn every_number_lexeme_decodes() {
        let tokens = scan_ok("007 1.2.3 123456789012345678901234567890");
        let literals: Vec<_> = tokens.iter().map(|t| (t.kind, t.literal.clone())).collect();
        assert_eq!(
            literals,
            vec![
                (Number, Value::Number(7.0)),
                (Number, Value::Number(1.2)),
                (Dot, Value::Nil),
                (Number, Value::Number(3.0)),
                (Number, Value::Number(1.2345678901234568e29)),
                (Eof, Value::Nil),
            ]
        );
    }

    #[test]
    fn keywords_and_identifiers() {
        let tokens = scan_ok(
            "and class else false for fun if nil or print return super this true var while",
        );
        assert_eq!(
            kinds(&tokens),
            vec![
                And, Class, Else, False, For, Fun, If, Nil, Or, Print, Return, Super, This, True,
                Var, While, Eof
            ]
        );

        let tokens = scan_ok("_under score9 orchid variable");
        assert_eq!(kinds(&tokens), vec![Identifier, Identifier, Identifier, Identifier, Eof]);
        assert_eq!(tokens[1].lexeme(), "score9");
        assert_eq!(tokens[2].lexeme(), "orchid");
    }

    #[test]
    fn lines() {
        let tokens = scan_ok("var a;\n\n  print a;\r\n\tb");
        assert_eq!(
            tokens.iter().map(|t| t.line().0).collect::<Vec<_>>(),
            vec![1, 1, 1, 3, 3, 3, 4, 4]
        );
    }

    #[test]
    fn unexpected_characters_do_not_stop_scanning() {
        let (tokens, diagnostics) = scan("var @ = 3;\nprint $<4;");
        assert_eq!(
            kinds(&tokens),
            vec![Var, Equal, Number, Semicolon, Print, Less, Number, Semicolon, Eof]
        );
        assert_eq!(
            diagnostics.iter().map(|d| d.to_string()).collect::<Vec<_>>(),
            vec!["[line 1] Error: Unexpected character.", "[line 2] Error: Unexpected character."]
        );
    }

    #[test]
    fn token_kind_names() {
        assert_eq!(Eof.to_string(), "END_OF_FILE");
        assert_eq!(BangEqual.to_string(), "BANG_EQUAL");
        assert_eq!(Identifier.to_string(), "IDENTIFIER");
    }
}
