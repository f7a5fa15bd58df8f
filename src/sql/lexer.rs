/// SQL Lexer - converts MySQL-dialect text into tokens
use super::token::{Token, TokenType, VariableScope};
use crate::error::ParseError;

type LexResult<T> = std::result::Result<T, ParseError>;

/// Session-dependent lexing switches.
#[derive(Debug, Clone, Copy)]
pub struct LexerOptions {
    /// `NO_BACKSLASH_ESCAPES`: backslash is an ordinary character in strings
    pub no_backslash_escapes: bool,
    /// Five-digit server version compared against `/*!NNNNN */` guards
    pub server_version: u32,
}

impl Default for LexerOptions {
    fn default() -> Self {
        Self {
            no_backslash_escapes: false,
            server_version: 80038,
        }
    }
}

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    byte_offset: usize,
    line: usize,
    column: usize,
    options: LexerOptions,
    /// Open `/*! ... */` blocks whose content is being lexed as SQL
    open_version_blocks: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self::with_options(input, LexerOptions::default())
    }

    pub fn with_options(input: &str, options: LexerOptions) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            byte_offset: 0,
            line: 1,
            column: 1,
            options,
            open_version_blocks: 0,
        }
    }

    pub fn tokenize(&mut self) -> LexResult<Vec<Token>> {
        let mut tokens: Vec<Token> = Vec::new();

        loop {
            let token = self.next_token()?;
            let is_eof = matches!(token.token_type, TokenType::Eof);

            // Adjacent string literals form one literal
            if let TokenType::String(ref next) = token.token_type {
                if let Some(Token {
                    token_type: TokenType::String(prev),
                    end,
                    ..
                }) = tokens.last_mut()
                {
                    prev.push_str(next);
                    *end = token.end;
                    continue;
                }
            }

            tokens.push(token);
            if is_eof {
                break;
            }
        }

        Ok(tokens)
    }

    pub fn next_token(&mut self) -> LexResult<Token> {
        self.skip_trivia()?;

        let line = self.line;
        let column = self.column;
        let start = self.byte_offset;

        if self.is_eof() {
            return Ok(Token::new(TokenType::Eof, line, column).with_span(start, start));
        }

        let ch = self.current_char();
        let next = self.peek_char();

        let token_type = match ch {
            '\'' | '"' => TokenType::String(self.read_string(ch)?),

            '`' => TokenType::QuotedIdentifier(self.read_quoted_identifier('`', '`')?),
            '[' => TokenType::QuotedIdentifier(self.read_quoted_identifier('[', ']')?),

            // X'..' / B'..' / N'..' prefixes
            'x' | 'X' if next == Some('\'') => {
                self.advance();
                let digits = self.read_string('\'')?;
                TokenType::HexString(self.decode_hex(&digits, line, column)?)
            }
            'b' | 'B' if next == Some('\'') => {
                self.advance();
                let digits = self.read_string('\'')?;
                TokenType::BitString(self.decode_bits(&digits, line, column)?)
            }
            'n' | 'N' if next == Some('\'') => {
                self.advance();
                TokenType::String(self.read_string('\'')?)
            }

            '0' if next == Some('x') && self.peek_at(2).map_or(false, |c| c.is_ascii_hexdigit()) => {
                self.advance();
                self.advance();
                let digits = self.take_while(|c| c.is_ascii_hexdigit());
                TokenType::HexString(self.decode_hex(&digits, line, column)?)
            }
            '0' if next == Some('b') && self.peek_at(2).map_or(false, |c| c == '0' || c == '1') => {
                self.advance();
                self.advance();
                let digits = self.take_while(|c| c == '0' || c == '1');
                TokenType::BitString(self.decode_bits(&digits, line, column)?)
            }

            '0'..='9' => self.read_number(),
            '.' if next.map_or(false, |c| c.is_ascii_digit()) => self.read_number(),

            '_' if self.is_charset_introducer() => {
                // `_utf8mb4'text'`: the introducer does not change the value
                self.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
                TokenType::String(self.read_string('\'')?)
            }

            c if c.is_ascii_alphabetic() || c == '_' || c == '$' => self.read_identifier(line, column)?,
            c if c.is_alphabetic() => {
                let word = self.take_while(|c| c.is_alphanumeric() || c == '_' || c == '$');
                return Err(ParseError::NonAsciiIdentifier(word));
            }

            '@' => self.read_variable(line, column)?,

            '?' => {
                self.advance();
                TokenType::Placeholder
            }
            '=' => {
                self.advance();
                TokenType::Eq
            }
            '!' => {
                self.advance();
                if self.match_char('=') {
                    TokenType::Ne
                } else {
                    TokenType::Bang
                }
            }
            '<' => {
                self.advance();
                if self.match_char('=') {
                    if self.match_char('>') {
                        TokenType::NullSafeEq
                    } else {
                        TokenType::Le
                    }
                } else if self.match_char('>') {
                    TokenType::Ne
                } else if self.match_char('<') {
                    TokenType::ShiftLeft
                } else {
                    TokenType::Lt
                }
            }
            '>' => {
                self.advance();
                if self.match_char('=') {
                    TokenType::Ge
                } else if self.match_char('>') {
                    TokenType::ShiftRight
                } else {
                    TokenType::Gt
                }
            }
            '-' => {
                self.advance();
                if self.match_char('>') {
                    if self.match_char('>') {
                        TokenType::LongArrow
                    } else {
                        TokenType::Arrow
                    }
                } else {
                    TokenType::Minus
                }
            }
            '+' => {
                self.advance();
                TokenType::Plus
            }
            '*' => {
                self.advance();
                TokenType::Star
            }
            '/' => {
                self.advance();
                TokenType::Slash
            }
            '%' => {
                self.advance();
                TokenType::Percent
            }
            '&' => {
                self.advance();
                if self.match_char('&') {
                    TokenType::LogicalAnd
                } else {
                    TokenType::Ampersand
                }
            }
            '|' => {
                self.advance();
                if self.match_char('|') {
                    TokenType::LogicalOr
                } else {
                    TokenType::Pipe
                }
            }
            '^' => {
                self.advance();
                TokenType::Caret
            }
            '~' => {
                self.advance();
                TokenType::Tilde
            }
            ':' if next == Some('=') => {
                self.advance();
                self.advance();
                TokenType::Assign
            }
            '(' => {
                self.advance();
                TokenType::LParen
            }
            ')' => {
                self.advance();
                TokenType::RParen
            }
            ',' => {
                self.advance();
                TokenType::Comma
            }
            ';' => {
                self.advance();
                TokenType::Semicolon
            }
            '.' => {
                self.advance();
                TokenType::Dot
            }
            _ => {
                return Err(ParseError::syntax(
                    format!("unexpected character '{}'", ch),
                    line,
                    column,
                ));
            }
        };

        Ok(Token::new(token_type, line, column).with_span(start, self.byte_offset))
    }

    fn current_char(&self) -> char {
        self.input[self.position]
    }

    fn peek_char(&self) -> Option<char> {
        self.peek_at(1)
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        if let Some(&ch) = self.input.get(self.position) {
            self.byte_offset += ch.len_utf8();
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            self.position += 1;
        }
    }

    fn match_char(&mut self, expected: char) -> bool {
        if !self.is_eof() && self.current_char() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    fn is_eof(&self) -> bool {
        self.position >= self.input.len()
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut value = String::new();
        while !self.is_eof() && pred(self.current_char()) {
            value.push(self.current_char());
            self.advance();
        }
        value
    }

    /// Whitespace, comments and version-comment delimiters.
    fn skip_trivia(&mut self) -> LexResult<()> {
        loop {
            while !self.is_eof() && self.current_char().is_whitespace() {
                self.advance();
            }
            if self.is_eof() {
                return Ok(());
            }
            let ch = self.current_char();
            let next = self.peek_char();

            // `--` starts a comment only when followed by whitespace
            if ch == '-' && next == Some('-') && self.peek_at(2).map_or(true, |c| c.is_whitespace()) {
                self.skip_line_comment();
            } else if ch == '#' {
                self.skip_line_comment();
            } else if ch == '/' && next == Some('*') {
                if self.peek_at(2) == Some('!') {
                    self.enter_version_comment()?;
                } else {
                    self.skip_block_comment()?;
                }
            } else if ch == '*' && next == Some('/') && self.open_version_blocks > 0 {
                self.advance();
                self.advance();
                self.open_version_blocks -= 1;
            } else {
                return Ok(());
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while !self.is_eof() && self.current_char() != '\n' {
            self.advance();
        }
    }

    fn skip_block_comment(&mut self) -> LexResult<()> {
        let (line, column) = (self.line, self.column);
        self.advance();
        self.advance();
        while !self.is_eof() {
            if self.current_char() == '*' && self.peek_char() == Some('/') {
                self.advance();
                self.advance();
                return Ok(());
            }
            self.advance();
        }
        Err(ParseError::syntax("unterminated comment", line, column))
    }

    /// `/*!NNNNN ... */` is SQL when the guard is satisfied, a comment otherwise.
    fn enter_version_comment(&mut self) -> LexResult<()> {
        let (line, column) = (self.line, self.column);
        let saved = (self.position, self.byte_offset, self.line, self.column);
        self.advance();
        self.advance();
        self.advance();
        let digits = self.take_while(|c| c.is_ascii_digit());
        let required = if digits.len() >= 5 {
            digits.parse::<u32>().unwrap_or(0)
        } else {
            0
        };
        if required > self.options.server_version {
            // Rewind so the whole block is skipped as an ordinary comment
            self.position = saved.0;
            self.byte_offset = saved.1;
            self.line = saved.2;
            self.column = saved.3;
            return self.skip_block_comment();
        }
        if digits.len() < 5 {
            // Unversioned block: the digits belong to the SQL text
            let back = digits.chars().count();
            self.position -= back;
            self.byte_offset -= back;
            self.column -= back;
        }
        if !self.input[self.position..].windows(2).any(|w| w == ['*', '/']) {
            return Err(ParseError::syntax("unterminated comment", line, column));
        }
        self.open_version_blocks += 1;
        Ok(())
    }

    fn read_string(&mut self, quote: char) -> LexResult<String> {
        let (line, column) = (self.line, self.column);
        self.advance(); // opening quote
        let mut value = String::new();

        loop {
            if self.is_eof() {
                return Err(ParseError::syntax("unterminated string literal", line, column));
            }
            let ch = self.current_char();
            if ch == quote {
                if self.peek_char() == Some(quote) {
                    value.push(quote);
                    self.advance();
                    self.advance();
                    continue;
                }
                self.advance();
                return Ok(value);
            }
            if ch == '\\' && !self.options.no_backslash_escapes {
                self.advance();
                if self.is_eof() {
                    return Err(ParseError::syntax("unterminated string literal", line, column));
                }
                let escaped = self.current_char();
                match escaped {
                    '0' => value.push('\0'),
                    'b' => value.push('\u{8}'),
                    'n' => value.push('\n'),
                    'r' => value.push('\r'),
                    't' => value.push('\t'),
                    'Z' => value.push('\u{1a}'),
                    // Kept for the LIKE pass, which applies its own escaping
                    '%' | '_' => {
                        value.push('\\');
                        value.push(escaped);
                    }
                    other => value.push(other),
                }
                self.advance();
                continue;
            }
            value.push(ch);
            self.advance();
        }
    }

    fn read_quoted_identifier(&mut self, open: char, close: char) -> LexResult<String> {
        let (line, column) = (self.line, self.column);
        debug_assert_eq!(self.current_char(), open);
        self.advance();
        let mut value = String::new();
        loop {
            if self.is_eof() {
                return Err(ParseError::syntax("unterminated quoted identifier", line, column));
            }
            let ch = self.current_char();
            if ch == close {
                if close == '`' && self.peek_char() == Some('`') {
                    value.push('`');
                    self.advance();
                    self.advance();
                    continue;
                }
                self.advance();
                break;
            }
            value.push(ch);
            self.advance();
        }
        if !value.is_ascii() {
            return Err(ParseError::NonAsciiIdentifier(value));
        }
        if value.is_empty() {
            return Err(ParseError::syntax("empty identifier", line, column));
        }
        Ok(value)
    }

    fn read_number(&mut self) -> TokenType {
        let mut value = self.take_while(|c| c.is_ascii_digit());

        if !self.is_eof() && self.current_char() == '.' {
            value.push('.');
            self.advance();
            value.push_str(&self.take_while(|c| c.is_ascii_digit()));
        }

        // Exponent only when digits follow, so `1e` stays a number then a word
        if !self.is_eof() && (self.current_char() == 'e' || self.current_char() == 'E') {
            let sign = matches!(self.peek_char(), Some('+') | Some('-'));
            let digit_at = if sign { 2 } else { 1 };
            if self.peek_at(digit_at).map_or(false, |c| c.is_ascii_digit()) {
                value.push('e');
                self.advance();
                if sign {
                    value.push(self.current_char());
                    self.advance();
                }
                value.push_str(&self.take_while(|c| c.is_ascii_digit()));
            }
        }

        if value.starts_with('.') {
            value.insert(0, '0');
        }
        TokenType::Number(value)
    }

    fn read_identifier(&mut self, line: usize, column: usize) -> LexResult<TokenType> {
        let value = self.take_while(|c| c.is_alphanumeric() || c == '_' || c == '$');
        if !value.is_ascii() {
            return Err(ParseError::NonAsciiIdentifier(value));
        }
        if value.is_empty() {
            return Err(ParseError::syntax("expected identifier", line, column));
        }

        Ok(TokenType::from_keyword(&value).unwrap_or(TokenType::Identifier(value)))
    }

    fn read_variable(&mut self, line: usize, column: usize) -> LexResult<TokenType> {
        self.advance(); // @
        if self.match_char('@') {
            let mut name = self.read_variable_name(line, column)?;
            let mut scope = None;
            if !self.is_eof() && self.current_char() == '.' {
                scope = match name.to_ascii_lowercase().as_str() {
                    "global" => Some(VariableScope::Global),
                    "session" | "local" => Some(VariableScope::Session),
                    _ => None,
                };
                if scope.is_some() {
                    self.advance();
                    name = self.read_variable_name(line, column)?;
                }
            }
            return Ok(TokenType::SystemVariable { scope, name });
        }
        let name = match self.peek_current() {
            Some(q @ ('\'' | '"')) => self.read_string(q)?,
            Some('`') => self.read_quoted_identifier('`', '`')?,
            _ => self.take_while(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.'),
        };
        if name.is_empty() {
            return Err(ParseError::syntax("expected variable name after '@'", line, column));
        }
        Ok(TokenType::UserVariable(name))
    }

    fn read_variable_name(&mut self, line: usize, column: usize) -> LexResult<String> {
        if self.peek_current() == Some('`') {
            return self.read_quoted_identifier('`', '`');
        }
        let name = self.take_while(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
        if name.is_empty() {
            return Err(ParseError::syntax("expected variable name after '@@'", line, column));
        }
        Ok(name)
    }

    fn peek_current(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn is_charset_introducer(&self) -> bool {
        let rest: String = self.input[self.position..]
            .iter()
            .take_while(|c| c.is_ascii_alphanumeric() || **c == '_')
            .collect();
        let after = self.input.get(self.position + rest.len()).copied();
        after == Some('\'')
            && matches!(
                rest.to_ascii_lowercase().as_str(),
                "_utf8mb4" | "_utf8mb3" | "_utf8" | "_latin1" | "_binary" | "_ascii"
            )
    }

    fn decode_hex(&self, digits: &str, line: usize, column: usize) -> LexResult<Vec<u8>> {
        let digits = if digits.len() % 2 == 1 {
            format!("0{}", digits)
        } else {
            digits.to_string()
        };
        (0..digits.len())
            .step_by(2)
            .map(|i| {
                u8::from_str_radix(&digits[i..i + 2], 16)
                    .map_err(|_| ParseError::syntax("invalid hexadecimal literal", line, column))
            })
            .collect()
    }

    fn decode_bits(&self, digits: &str, line: usize, column: usize) -> LexResult<Vec<u8>> {
        if digits.chars().any(|c| c != '0' && c != '1') {
            return Err(ParseError::syntax("invalid bit literal", line, column));
        }
        let pad = (8 - digits.len() % 8) % 8;
        let padded = format!("{}{}", "0".repeat(pad), digits);
        Ok((0..padded.len())
            .step_by(8)
            .map(|i| u8::from_str_radix(&padded[i..i + 8], 2).unwrap_or(0))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::token::Keyword;

    fn lex(sql: &str) -> Vec<TokenType> {
        Lexer::new(sql)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.token_type)
            .collect()
    }

    #[test]
    fn test_lexer_simple_select() {
        let tokens = lex("SELECT * FROM users");
        assert_eq!(tokens.len(), 5); // SELECT, *, FROM, users, EOF
        assert!(tokens[0].is_keyword(Keyword::Select));
        assert_eq!(tokens[1], TokenType::Star);
        assert!(tokens[2].is_keyword(Keyword::From));
        assert_eq!(tokens[3], TokenType::Identifier("users".into()));
        assert_eq!(tokens[4], TokenType::Eof);
    }

    #[test]
    fn test_quoted_identifiers() {
        let tokens = lex("SELECT `select`, [my col], `a``b` FROM t");
        assert_eq!(tokens[1], TokenType::QuotedIdentifier("select".into()));
        assert_eq!(tokens[3], TokenType::QuotedIdentifier("my col".into()));
        assert_eq!(tokens[5], TokenType::QuotedIdentifier("a`b".into()));
    }

    #[test]
    fn test_string_escapes() {
        let tokens = lex(r#"'it''s' "a\"b" 'x\ny' 'abc\%'"#);
        // adjacent literals are joined into one
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0], TokenType::String("it'sa\"bx\nyabc\\%".into()));
    }

    #[test]
    fn test_no_backslash_escapes() {
        let options = LexerOptions {
            no_backslash_escapes: true,
            ..Default::default()
        };
        let tokens = Lexer::with_options(r"'a\nb'", options).tokenize().unwrap();
        assert_eq!(tokens[0].token_type, TokenType::String("a\\nb".into()));
    }

    #[test]
    fn test_hex_and_bit_literals() {
        let tokens = lex("0x4142 X'43' b'101' 0b1");
        assert_eq!(tokens[0], TokenType::HexString(b"AB".to_vec()));
        assert_eq!(tokens[1], TokenType::HexString(b"C".to_vec()));
        assert_eq!(tokens[2], TokenType::BitString(vec![5]));
        assert_eq!(tokens[3], TokenType::BitString(vec![1]));
    }

    #[test]
    fn test_comments() {
        let tokens = lex("SELECT 1 -- trailing\n# hash\n/* block */ + 2");
        assert_eq!(tokens.len(), 5);
        assert_eq!(tokens[2], TokenType::Plus);

        // `--1` is minus minus one
        let tokens = lex("SELECT 1--1");
        assert_eq!(tokens[2], TokenType::Minus);
    }

    #[test]
    fn test_version_comments() {
        let tokens = lex("CREATE TABLE t (a INT) /*!40101 ENGINE=InnoDB */");
        assert!(tokens.contains(&TokenType::Identifier("ENGINE".into())));

        let tokens = lex("SELECT 1 /*!99999 + 2 */");
        assert_eq!(tokens.len(), 3);

        let tokens = lex("SELECT /*! 2 */");
        assert_eq!(tokens[1], TokenType::Number("2".into()));
    }

    #[test]
    fn test_variables() {
        let tokens = lex("@x @@sql_mode @@GLOBAL.autocommit @'odd name'");
        assert_eq!(tokens[0], TokenType::UserVariable("x".into()));
        assert_eq!(
            tokens[1],
            TokenType::SystemVariable {
                scope: None,
                name: "sql_mode".into()
            }
        );
        assert_eq!(
            tokens[2],
            TokenType::SystemVariable {
                scope: Some(VariableScope::Global),
                name: "autocommit".into()
            }
        );
        assert_eq!(tokens[3], TokenType::UserVariable("odd name".into()));
    }

    #[test]
    fn test_operators() {
        let tokens = lex("<=> <> != <= >= << >> && || := -> ->>");
        assert_eq!(
            &tokens[..12],
            &[
                TokenType::NullSafeEq,
                TokenType::Ne,
                TokenType::Ne,
                TokenType::Le,
                TokenType::Ge,
                TokenType::ShiftLeft,
                TokenType::ShiftRight,
                TokenType::LogicalAnd,
                TokenType::LogicalOr,
                TokenType::Assign,
                TokenType::Arrow,
                TokenType::LongArrow,
            ]
        );
    }

    #[test]
    fn test_non_ascii_identifier() {
        let err = Lexer::new("SELECT * FROM tablé").tokenize().unwrap_err();
        assert!(matches!(err, ParseError::NonAsciiIdentifier(_)));

        let err = Lexer::new("SELECT `naïve`").tokenize().unwrap_err();
        assert!(matches!(err, ParseError::NonAsciiIdentifier(_)));

        // non-ASCII text inside strings is fine
        assert!(Lexer::new("SELECT 'naïve'").tokenize().is_ok());
    }

    #[test]
    fn test_introducers_and_numbers() {
        let tokens = lex("_utf8mb4'abc', N'x', 1.5e3, .5, 1e");
        assert_eq!(tokens[0], TokenType::String("abc".into()));
        assert_eq!(tokens[2], TokenType::String("x".into()));
        assert_eq!(tokens[4], TokenType::Number("1.5e3".into()));
        assert_eq!(tokens[6], TokenType::Number("0.5".into()));
        assert_eq!(tokens[8], TokenType::Number("1".into()));
        assert_eq!(tokens[9], TokenType::Identifier("e".into()));
    }

    #[test]
    fn test_spans() {
        let tokens = Lexer::new("SELECT a+1 AS x").tokenize().unwrap();
        assert_eq!((tokens[1].start, tokens[3].end), (7, 10));
    }
}
